// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! # trace-view
//!
//! trace-view is a crate for converting raw per-instruction execution counters, as captured by a
//! hardware trace unit, to source file and line number such that they can be shown inline in an
//! editor. Its job is split into two parts: first building a `SymbolTable` from disassembly or
//! debug info, then combining that table with a `CounterBuffer` into `TraceSample`s and grouping
//! those per line for display.
//!
//! ## SymbolTable
//!
//! A traced memory region (`MemoryMap`) is divided into fixed-size instruction units. Every unit
//! has exactly one counter slot and exactly one symbol slot:
//!
//! ```text
//!   MemoryMap { address: 0x0800_0000, size: 8 }, unit size 2
//!
//!   index      0            1            2        3
//!            ┌────────────┬────────────┬────────┬────────┐
//!   counters │ 5          │ 3          │ 0      │ 0      │
//!            ├────────────┼────────────┼────────┼────────┤
//!   symbols  │ main.c:10  │ main.c:10  │ <none> │ <none> │
//!            └────────────┴────────────┴────────┴────────┘
//! ```
//!
//! The table is pre-sized, so a slot with no known source location holds an empty placeholder
//! rather than being absent. Slots are filled one function at a time with `SymbolTable::ingest`,
//! usually as disassembly results trickle in, so a table may be partially populated for a while.
//!
//! ## Aggregation
//!
//! `aggregate` is a single linear pass over both slices which emits one `TraceSample` per
//! non-zero counter. It does not deduplicate: several instructions commonly map to the same
//! source line, and `annotate::group` is the one place where those samples are combined.
//!
mod counters;
mod memmap;
mod sample;
mod srcline;
mod symbols;

pub mod annotate;
pub mod elf;

pub use counters::CounterBuffer;
pub use memmap::MemoryMap;
pub use sample::{aggregate, TraceSample};
pub use srcline::SrcLine;
pub use symbols::{FunctionSymbol, Instruction, SymbolEntry, SymbolTable};

/// Bytes covered by one counter slot on the traced cores (one Thumb half-word).
pub const DEFAULT_INSTRUCTION_UNIT_SIZE: u32 = 2;
