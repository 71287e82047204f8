//! Device memory emulation
//!
//! Every storage array is a boxed slice of `AtomicU32` words with the same
//! byte layout the WGSL programs see. Kernels address individual words when
//! they need atomics and load or store whole records otherwise.

use bytemuck::{Pod, Zeroable};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};

fn allocate_words(label: &'static str, words: usize, limit_bytes: u64) -> Result<Box<[AtomicU32]>> {
    let requested = (words as u64).saturating_mul(4);
    if requested > limit_bytes {
        return Err(Error::Allocation {
            label,
            requested,
            limit: limit_bytes,
        });
    }
    let mut storage: Vec<AtomicU32> = Vec::new();
    storage
        .try_reserve_exact(words)
        .map_err(|_| Error::Allocation {
            label,
            requested,
            limit: limit_bytes,
        })?;
    storage.extend((0..words).map(|_| AtomicU32::new(0)));
    Ok(storage.into_boxed_slice())
}

/// Fixed-capacity array of `T` records
pub struct DeviceArray<T: Pod> {
    label: &'static str,
    words: Box<[AtomicU32]>,
    len: usize,
    _record: PhantomData<T>,
}

impl<T: Pod> DeviceArray<T> {
    const STRIDE: usize = {
        assert!(std::mem::size_of::<T>() % 4 == 0);
        std::mem::size_of::<T>() / 4
    };

    /// Allocate `len` zeroed records, failing past `limit_bytes`
    pub fn zeroed(label: &'static str, len: usize, limit_bytes: u64) -> Result<Self> {
        let words = len.checked_mul(Self::STRIDE).ok_or(Error::Allocation {
            label,
            requested: u64::MAX,
            limit: limit_bytes,
        })?;
        Ok(Self {
            label,
            words: allocate_words(label, words, limit_bytes)?,
            len,
            _record: PhantomData,
        })
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size_bytes(&self) -> u64 {
        self.words.len() as u64 * 4
    }

    /// One word of record `index`
    #[inline]
    pub fn word(&self, index: usize, word: usize) -> &AtomicU32 {
        debug_assert!(word < Self::STRIDE);
        &self.words[index * Self::STRIDE + word]
    }

    /// Relaxed load of a whole record
    pub fn load(&self, index: usize) -> T {
        let mut value = <T as Zeroable>::zeroed();
        let dst: &mut [u32] = bytemuck::cast_slice_mut(std::slice::from_mut(&mut value));
        let base = index * Self::STRIDE;
        for (i, word) in dst.iter_mut().enumerate() {
            *word = self.words[base + i].load(Ordering::Relaxed);
        }
        value
    }

    /// Relaxed store of a whole record
    pub fn store(&self, index: usize, value: T) {
        let src: &[u32] = bytemuck::cast_slice(std::slice::from_ref(&value));
        let base = index * Self::STRIDE;
        for (i, word) in src.iter().enumerate() {
            self.words[base + i].store(*word, Ordering::Relaxed);
        }
    }

    /// Host upload into the front of the array. Records past capacity are
    /// ignored; returns how many were written.
    pub fn write(&self, values: &[T]) -> usize {
        let count = values.len().min(self.len);
        for (i, value) in values[..count].iter().enumerate() {
            self.store(i, *value);
        }
        count
    }

    /// Host read-back of every record
    pub fn snapshot(&self) -> Vec<T> {
        (0..self.len).map(|i| self.load(i)).collect()
    }

    pub fn clear(&self) {
        for word in self.words.iter() {
            word.store(0, Ordering::Relaxed);
        }
    }
}

/// Small block of atomic counters addressed by byte offset
pub struct CounterBlock {
    words: DeviceArray<u32>,
}

impl CounterBlock {
    pub fn new(label: &'static str, size_bytes: u64, limit_bytes: u64) -> Result<Self> {
        let len = size_bytes.div_ceil(4) as usize;
        Ok(Self {
            words: DeviceArray::zeroed(label, len, limit_bytes)?,
        })
    }

    #[inline]
    pub fn at(&self, byte_offset: u64) -> &AtomicU32 {
        self.words.word((byte_offset / 4) as usize, 0)
    }

    pub fn load(&self, byte_offset: u64) -> u32 {
        self.at(byte_offset).load(Ordering::Acquire)
    }

    /// Overwrite the leading words, as the host does before a dispatch
    pub fn reset(&self, values: &[u32]) {
        self.words.write(values);
    }

    pub fn clear(&self) {
        self.words.clear();
    }

    pub fn size_bytes(&self) -> u64 {
        self.words.size_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle;
    use crate::quadtree::{node::word, QuadTreeNode};

    const LIMIT: u64 = 1 << 20;

    #[test]
    fn test_record_round_trip_through_words() {
        let array = DeviceArray::<Particle>::zeroed("particles", 4, LIMIT).unwrap();
        let particle = Particle::active([0.5, -0.25], [1.0, 2.0]);
        array.store(2, particle);
        assert_eq!(array.load(2), particle);
        assert_eq!(array.load(1), Particle::default());
        assert_eq!(array.size_bytes(), 4 * 48);
    }

    #[test]
    fn test_field_words_match_record_layout() {
        let nodes = DeviceArray::<QuadTreeNode>::zeroed("nodes", 2, LIMIT).unwrap();
        nodes.word(1, word::COUNT).store(7, Ordering::Relaxed);
        nodes.word(1, word::BOUNDS + 2).store(1.5f32.to_bits(), Ordering::Relaxed);
        let node = nodes.load(1);
        assert_eq!(node.count, 7);
        assert_eq!(node.bounds[2], 1.5);
    }

    #[test]
    fn test_allocation_past_limit_fails() {
        let result = DeviceArray::<Particle>::zeroed("particles", 1 << 20, LIMIT);
        assert!(matches!(result, Err(Error::Allocation { label: "particles", .. })));
    }

    #[test]
    fn test_upload_truncates_at_capacity() {
        let array = DeviceArray::<u32>::zeroed("values", 2, LIMIT).unwrap();
        assert_eq!(array.write(&[1, 2, 3]), 2);
        assert_eq!(array.snapshot(), vec![1, 2]);
    }

    #[test]
    fn test_counter_block_offsets() {
        let block = CounterBlock::new("counters", 24, LIMIT).unwrap();
        block.reset(&[16, 0, 0, 0]);
        block.at(20).fetch_add(1, Ordering::Relaxed);
        assert_eq!(block.load(0), 16);
        assert_eq!(block.load(20), 1);
        assert_eq!(block.size_bytes(), 24);
    }
}
