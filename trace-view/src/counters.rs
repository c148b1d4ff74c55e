// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::MemoryMap;

/// Cumulative per-instruction execution counters for one traced region.
///
/// The length is fixed at construction. The probe overwrites the contents in place on every
/// read, and counts only go back to zero when a new buffer is created for a new connection.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CounterBuffer {
    counts: Box<[u64]>,
}

impl CounterBuffer {
    pub fn new(map: &MemoryMap, unit: u32) -> Self {
        let counts = vec![0; map.slots(unit)].into_boxed_slice();
        Self { counts }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.counts
    }

    /// Raw view handed to the probe for it to fill.
    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        &mut self.counts
    }

    /// Number of slots that have executed at least once.
    pub fn hit(&self) -> usize {
        self.counts.iter().filter(|c| **c != 0).count()
    }
}

impl From<Vec<u64>> for CounterBuffer {
    fn from(counts: Vec<u64>) -> Self {
        let counts = counts.into_boxed_slice();
        Self { counts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_matches_region() {
        let buffer = CounterBuffer::new(&MemoryMap::new(0, 8), 2);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.as_slice(), &[0, 0, 0, 0]);

        let buffer = CounterBuffer::new(&MemoryMap::new(0x0800_0000, 0x2_0000), 2);
        assert_eq!(buffer.len(), 0x1_0000);
    }

    #[test]
    fn test_fill_in_place() {
        let mut buffer = CounterBuffer::new(&MemoryMap::new(0, 8), 2);
        buffer.as_mut_slice().copy_from_slice(&[5, 3, 0, 0]);

        assert_eq!(buffer.as_slice(), &[5, 3, 0, 0]);
        assert_eq!(buffer.hit(), 2);
        assert_eq!(buffer.len(), 4);
    }
}
