//! Shared buffer set
//!
//! Each device array the compute stages write is exposed to render consumers
//! through a [`BufferSlot`]: an opaque handle, a vertex count and a draw
//! style. Consumers read the configuration but never write the buffer.

/// How a render consumer should draw a buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawStyle {
    Points,
    Lines,
    Triangles,
}

/// What a render consumer needs to issue a draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferConfig {
    pub vertex_count: u32,
    pub draw_style: DrawStyle,
}

/// Buffers a backend exposes to render consumers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharedBuffer {
    Particles,
    RegionFaces,
    QuadTreeNodes,
    QuadTreeGeometry,
}

/// A device buffer handle plus its draw configuration
#[derive(Debug)]
pub struct BufferSlot<H> {
    label: &'static str,
    handle: Option<H>,
    vertex_count: u32,
    draw_style: DrawStyle,
}

impl<H> BufferSlot<H> {
    /// An uninitialised slot
    pub fn new(label: &'static str, draw_style: DrawStyle) -> Self {
        Self {
            label,
            handle: None,
            vertex_count: 0,
            draw_style,
        }
    }

    pub fn init(&mut self, handle: H, vertex_count: u32) {
        self.handle = Some(handle);
        self.vertex_count = vertex_count;
    }

    pub fn with_handle(label: &'static str, draw_style: DrawStyle, handle: H, vertex_count: u32) -> Self {
        let mut slot = Self::new(label, draw_style);
        slot.init(handle, vertex_count);
        slot
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    /// Update the drawable count. Ignored with a diagnostic before `init`.
    pub fn set_vertex_count(&mut self, vertex_count: u32) {
        if self.handle.is_none() {
            log::error!("buffer '{}' is not initialized; vertex count not set", self.label);
            return;
        }
        self.vertex_count = vertex_count;
    }

    /// Render configuration, or `None` with a diagnostic before `init`
    pub fn configure(&self) -> Option<BufferConfig> {
        if self.handle.is_none() {
            log::error!("buffer '{}' is not initialized; cannot configure", self.label);
            return None;
        }
        Some(BufferConfig {
            vertex_count: self.vertex_count,
            draw_style: self.draw_style,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_before_init_is_a_no_op() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut slot: BufferSlot<u32> = BufferSlot::new("particles", DrawStyle::Points);
        assert_eq!(slot.configure(), None);
        slot.set_vertex_count(10);
        slot.init(7, 0);
        assert_eq!(
            slot.configure(),
            Some(BufferConfig {
                vertex_count: 0,
                draw_style: DrawStyle::Points
            })
        );
    }

    #[test]
    fn test_vertex_count_updates_after_init() {
        let mut slot = BufferSlot::with_handle("faces", DrawStyle::Lines, (), 4);
        slot.set_vertex_count(8);
        assert_eq!(slot.configure().map(|c| c.vertex_count), Some(8));
        assert_eq!(slot.handle(), Some(&()));
    }
}
