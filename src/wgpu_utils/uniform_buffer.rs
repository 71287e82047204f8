//! Typed uniform and storage buffers
use std::marker::PhantomData;
use std::mem::size_of;

fn short_type_name<T>() -> &'static str {
    let type_name = std::any::type_name::<T>();
    type_name
        .rfind(':')
        .map_or(type_name, |pos| &type_name[(pos + 1)..])
}

/// Storage usage; writable arrays can also be copied out of
fn storage_usage(read_only: bool) -> wgpu::BufferUsages {
    let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
    if read_only {
        usage
    } else {
        usage | wgpu::BufferUsages::COPY_SRC
    }
}

/// Uniform buffer holding one `Content` value
pub struct UniformBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    previous_content: Vec<u8>,
}

impl<Content: bytemuck::Pod> UniformBuffer<Content> {
    pub fn new(device: &wgpu::Device) -> Self {
        let label = format!("{} uniforms", short_type_name::<Content>());
        UniformBuffer {
            buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&label),
                size: size_of::<Content>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            content_type: PhantomData,
            previous_content: Vec::new(),
        }
    }

    /// Queue a write unless the content is unchanged
    pub fn update_content(&mut self, queue: &wgpu::Queue, content: Content) {
        let bytes = bytemuck::bytes_of(&content);
        if self.previous_content.as_slice() != bytes {
            queue.write_buffer(&self.buffer, 0, bytes);
            self.previous_content = bytes.to_vec();
        }
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}

/// Fixed-capacity storage array of `Content` records, zeroed at creation
pub struct ArrayBuffer<Content> {
    buffer: wgpu::Buffer,
    content_type: PhantomData<Content>,
    capacity: usize,
    current_size: usize,
}

impl<Content: bytemuck::Pod> ArrayBuffer<Content> {
    pub fn new(device: &wgpu::Device, label: &str, capacity: usize, read_only: bool) -> Self {
        let label = format!("{} [{}; {}]", label, short_type_name::<Content>(), capacity);
        ArrayBuffer {
            buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&label),
                size: Self::byte_size(capacity),
                usage: storage_usage(read_only),
                mapped_at_creation: false,
            }),
            content_type: PhantomData,
            capacity,
            current_size: 0,
        }
    }

    /// Bytes needed for `capacity` records. Never zero, since wgpu rejects
    /// empty bindings.
    pub fn byte_size(capacity: usize) -> u64 {
        (capacity.max(1) * size_of::<Content>()) as u64
    }

    /// Write into the front of the array, truncating at capacity. Returns
    /// the number of records written.
    pub fn update_data(&mut self, queue: &wgpu::Queue, data: &[Content]) -> usize {
        let count = data.len().min(self.capacity);
        if count > 0 {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&data[..count]));
        }
        self.current_size = count;
        count
    }

    pub fn binding_resource(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Records written by the last upload
    pub fn len(&self) -> usize {
        self.current_size
    }

    pub fn is_empty(&self) -> bool {
        self.current_size == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_type_name_strips_path() {
        assert_eq!(short_type_name::<crate::particle::Particle>(), "Particle");
        assert_eq!(short_type_name::<u32>(), "u32");
    }

    #[test]
    fn test_byte_size_is_never_zero() {
        assert_eq!(ArrayBuffer::<u32>::byte_size(0), 4);
        assert_eq!(ArrayBuffer::<crate::particle::Particle>::byte_size(10), 480);
        assert!(!storage_usage(true).contains(wgpu::BufferUsages::COPY_SRC));
        assert!(storage_usage(false).contains(wgpu::BufferUsages::COPY_SRC));
    }
}
