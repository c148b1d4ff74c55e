// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use log::*;
use serde::{Deserialize, Serialize};

use crate::MemoryMap;

/// A function known to the symbol provider, and the source file it is defined in.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct FunctionSymbol {
    pub name: String,
    pub file: String,
}

impl FunctionSymbol {
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
        }
    }
}

/// One disassembled instruction and the source line it was generated from.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub address: u32,
    pub line: u32,
}

impl Instruction {
    pub fn new(address: u32, line: u32) -> Self {
        Self { address, line }
    }
}

/// Source location of one traced instruction slot.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub address: u32,
    pub file: String,
    pub line: u32,
}

impl SymbolEntry {
    pub fn new(address: u32, file: impl Into<String>, line: u32) -> Self {
        Self {
            address,
            file: file.into(),
            line,
        }
    }

    /// Placeholder for a slot with no known source location.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        !self.file.is_empty() && self.line != 0
    }
}

/// Address-indexed table of source locations, one slot per counter slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SymbolTable {
    map: MemoryMap,
    unit: u32,
    entries: Vec<SymbolEntry>,
    empty: SymbolEntry,
}

impl SymbolTable {
    /// Create a table with an empty placeholder in every slot of `map`.
    pub fn new(map: &MemoryMap, unit: u32) -> Self {
        let entries = vec![SymbolEntry::empty(); map.slots(unit)];

        Self {
            map: *map,
            unit,
            entries,
            empty: SymbolEntry::empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    /// Number of slots with a known source location.
    pub fn resolved(&self) -> usize {
        self.entries.iter().filter(|e| e.is_resolved()).count()
    }

    /// Look up the source location of the slot containing `address`.
    ///
    /// Returns the empty placeholder when nothing is known, including for addresses outside the
    /// traced region.
    pub fn resolve(&self, address: u32) -> &SymbolEntry {
        match self.map.index_of(address, self.unit) {
            Some(index) => &self.entries[index],
            None => &self.empty,
        }
    }

    /// Record the source location of every instruction of one function.
    ///
    /// Slots are overwritten, so the last function to claim an address wins. Instructions outside
    /// the traced region are dropped. Returns the number of slots written.
    pub fn ingest(&mut self, function: &str, file: &str, instructions: &[Instruction]) -> usize {
        let mut written = 0;
        let mut dropped = 0;

        for instruction in instructions {
            match self.map.index_of(instruction.address, self.unit) {
                Some(index) => {
                    self.entries[index] = SymbolEntry::new(instruction.address, file, instruction.line);
                    written += 1;
                }
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(
                "dropped {} instructions of `{}` outside traced region {}",
                dropped, function, self.map
            );
        }

        debug!("ingested {} instructions of `{}` ({})", written, function, file);

        written
    }
}
