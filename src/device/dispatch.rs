//! Data-parallel dispatch on a rayon pool
//!
//! A dispatch runs `ceil(invocations / workgroup_size)` workgroups. Each
//! workgroup runs every local invocation in turn, including ids past the
//! requested count, so kernels bounds-check their own id exactly as the WGSL
//! programs do. Workgroups run in any order on any worker. Returning from
//! `dispatch` is the memory barrier between stages.

use rayon::prelude::*;
use std::sync::atomic::{fence, Ordering};

use crate::config::WORKGROUP_SIZE;
use crate::error::Result;

pub struct Dispatcher {
    pool: rayon::ThreadPool,
    workgroup_size: u32,
}

impl Dispatcher {
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("quadswarm-worker-{}", i));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        Ok(Self {
            pool: builder.build()?,
            workgroup_size: WORKGROUP_SIZE,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn workgroup_count(&self, invocations: u32) -> u32 {
        invocations.div_ceil(self.workgroup_size)
    }

    /// Run `kernel` once per global invocation id
    pub fn dispatch<F>(&self, label: &str, invocations: u32, kernel: F)
    where
        F: Fn(u32) + Sync + Send,
    {
        let groups = self.workgroup_count(invocations);
        let size = self.workgroup_size;
        log::trace!("dispatch '{}': {} workgroups of {}", label, groups, size);

        self.pool.install(|| {
            (0..groups).into_par_iter().for_each(|group| {
                let base = group * size;
                for local in 0..size {
                    kernel(base + local);
                }
            });
        });
        fence(Ordering::SeqCst);
    }
}
