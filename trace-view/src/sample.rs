// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

use crate::SymbolEntry;

#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    /// Source file of the instruction, or empty if unresolved.
    pub file: String,

    /// Line number in `file` (1-indexed), or 0 if unresolved.
    pub line: u32,

    /// Cumulative execution count of the instruction.
    pub count: u64,
}

impl TraceSample {
    pub fn new(file: impl Into<String>, line: u32, count: u64) -> Self {
        Self {
            file: file.into(),
            line,
            count,
        }
    }
}

/// Merge counters with their source locations.
///
/// Emits one sample per non-zero counter, in slot order, over the common prefix of both slices.
/// Unresolved slots produce samples with an empty file and line 0. No grouping is done here.
pub fn aggregate(counters: &[u64], symbols: &[SymbolEntry]) -> Vec<TraceSample> {
    counters
        .iter()
        .zip(symbols)
        .filter(|(count, _)| **count != 0)
        .map(|(count, symbol)| TraceSample::new(symbol.file.clone(), symbol.line, *count))
        .collect()
}
