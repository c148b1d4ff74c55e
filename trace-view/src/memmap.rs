// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One traceable memory region of the selected target device.
#[derive(Clone, Copy, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct MemoryMap {
    pub address: u32,
    pub size: u32,
}

impl fmt::Debug for MemoryMap {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("MemoryMap")
            .field("address", &format_args!("{:#x}", self.address))
            .field("size", &format_args!("{:#x}", self.size))
            .finish()
    }
}

impl fmt::Display for MemoryMap {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{:#010x}+{:x}", self.address, self.size)
    }
}

impl MemoryMap {
    pub fn new(address: u32, size: u32) -> Self {
        Self { address, size }
    }

    /// Number of counter slots in the region for the given instruction unit size.
    ///
    /// A trailing partial unit does not get a slot. `unit` must be non-zero.
    pub fn slots(&self, unit: u32) -> usize {
        (self.size / unit) as usize
    }

    /// Slot index of `address`, or `None` if the address lies outside the region.
    pub fn index_of(&self, address: u32, unit: u32) -> Option<usize> {
        let offset = address.checked_sub(self.address)?;
        let index = (offset / unit) as usize;

        if index < self.slots(unit) {
            Some(index)
        } else {
            None
        }
    }
}
