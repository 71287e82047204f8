//! Counter read-back through a dedicated copy buffer
//!
//! Mapping a counter block that later dispatches still bind would serialise
//! the whole pipeline. Instead the counters are copied into a small
//! `MAP_READ` buffer right after the stage that wrote them, and only that
//! copy is ever mapped. It is unmapped as soon as the values are read.
//!
//! While a map is in flight the copy buffer cannot be written, so a new copy
//! is skipped until the previous map completes.

use futures::channel::oneshot;

use crate::error::{Error, Result};

type MapReceiver = oneshot::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>;

pub struct CounterReadback {
    label: &'static str,
    buffer: wgpu::Buffer,
    words: usize,
    copied: bool,
    pending: Option<MapReceiver>,
    last: Vec<u32>,
}

impl CounterReadback {
    pub fn new(device: &wgpu::Device, label: &'static str, words: usize) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (words.max(1) * 4) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            label,
            buffer,
            words,
            copied: false,
            pending: None,
            last: vec![0; words],
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Values from the most recent completed map
    pub fn last(&self) -> &[u32] {
        &self.last
    }

    /// Record a copy of `words` counters starting at `source_offset`.
    /// Returns `false` when skipped because a map is still in flight.
    pub fn record_copy(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Buffer,
        source_offset: u64,
    ) -> bool {
        if self.pending.is_some() {
            return false;
        }
        encoder.copy_buffer_to_buffer(
            source,
            source_offset,
            &self.buffer,
            0,
            (self.words * 4) as u64,
        );
        self.copied = true;
        true
    }

    /// Start mapping after the copy has been submitted
    pub fn begin_map(&mut self) {
        if !self.copied || self.pending.is_some() {
            return;
        }
        let (sender, receiver) = oneshot::channel();
        self.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        self.copied = false;
        self.pending = Some(receiver);
    }

    /// Wait for the map in flight and return fresh values
    pub fn wait(&mut self, device: &wgpu::Device) -> Result<&[u32]> {
        let Some(receiver) = self.pending.take() else {
            return Ok(&self.last);
        };
        let _ = device.poll(wgpu::MaintainBase::Wait);
        match futures::executor::block_on(receiver) {
            Ok(result) => {
                result?;
                self.read_mapped();
                Ok(&self.last)
            }
            Err(_) => Err(Error::ReadbackChannel(self.label)),
        }
    }

    /// Pick up a completed map without waiting. Returns the newest values
    /// available, which may be from an earlier frame.
    pub fn poll(&mut self, device: &wgpu::Device) -> Result<&[u32]> {
        let _ = device.poll(wgpu::MaintainBase::Poll);
        let Some(receiver) = self.pending.as_mut() else {
            return Ok(&self.last);
        };
        match receiver.try_recv() {
            Ok(None) => Ok(&self.last),
            Ok(Some(result)) => {
                self.pending = None;
                result?;
                self.read_mapped();
                Ok(&self.last)
            }
            Err(_) => {
                self.pending = None;
                Err(Error::ReadbackChannel(self.label))
            }
        }
    }

    fn read_mapped(&mut self) {
        {
            let view = self.buffer.slice(..).get_mapped_range();
            let values: &[u32] = bytemuck::cast_slice(&view);
            let count = self.words.min(values.len());
            self.last[..count].copy_from_slice(&values[..count]);
        }
        self.buffer.unmap();
    }
}
