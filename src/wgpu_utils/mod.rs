// src/wgpu_utils/mod.rs
//! WGPU utility functions and helpers
//!
//! Headless device setup, typed buffers, compute binding shorthands and the
//! copy-buffer counter read-back.

pub mod binding_types;
pub mod context;
pub mod readback;
pub mod uniform_buffer;

pub use binding_types::*;
pub use context::GpuContext;
pub use readback::CounterReadback;
pub use uniform_buffer::{ArrayBuffer, UniformBuffer};
