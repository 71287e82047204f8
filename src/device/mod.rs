//! CPU emulation of the compute device
//!
//! Storage arrays, counter blocks, dispatch and the crude mutex behave the
//! way their GPU counterparts do, so the compute kernels run unchanged on a
//! machine without an adapter.

pub mod dispatch;
pub mod memory;
pub mod mutex;

pub use dispatch::Dispatcher;
pub use memory::{CounterBlock, DeviceArray};
pub use mutex::{CrudeMutex, CrudeMutexGuard};
