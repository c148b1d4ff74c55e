// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Function and line information read straight from an ELF executable.
//!
//! This is an in-process alternative to asking the debug adapter for disassembly: function
//! extents come from the ELF symbol table, and source lines from the DWARF line program.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gimli::{EndianSlice, RunTimeEndian, SectionId};
use goblin::elf::{sym::STT_FUNC, Elf};
use log::*;

use crate::{FunctionSymbol, Instruction};

/// One row of a DWARF line program.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineRow {
    pub address: u64,
    pub file: String,
    pub line: u32,

    /// First address past the end of a sequence. Bounds the previous row only.
    pub end_sequence: bool,
}

impl LineRow {
    pub fn new(address: u64, file: impl Into<String>, line: u32) -> Self {
        Self {
            address,
            file: file.into(),
            line,
            end_sequence: false,
        }
    }

    pub fn end(address: u64) -> Self {
        Self {
            address,
            file: String::new(),
            line: 0,
            end_sequence: true,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct FunctionLines {
    file: String,
    range: Range<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LineTable {
    functions: BTreeMap<String, FunctionLines>,
    rows: Vec<LineRow>,
}

impl LineTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .with_context(|| format!("unable to read executable: {}", path.display()))?;

        Self::parse(&data).with_context(|| format!("invalid executable: {}", path.display()))
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let elf = Elf::parse(data)?;

        let functions = elf_functions(&elf);
        let rows = line_rows(&elf, data)?;

        info!(
            "loaded {} functions and {} line rows from executable",
            functions.len(),
            rows.len()
        );

        Ok(Self::from_parts(functions, rows))
    }

    /// Build a table from function extents and line program rows in any order.
    pub fn from_parts(functions: Vec<(String, Range<u64>)>, mut rows: Vec<LineRow>) -> Self {
        rows.sort_by_key(|row| row.address);

        let mut table = Self {
            functions: BTreeMap::new(),
            rows,
        };

        for (name, range) in functions {
            if table.functions.contains_key(&name) {
                debug!("ignoring duplicate function symbol: {}", name);
                continue;
            }

            let file = table
                .rows_in(&range)
                .iter()
                .find(|row| !row.end_sequence)
                .map(|row| row.file.clone())
                .unwrap_or_default();

            table.functions.insert(name, FunctionLines { file, range });
        }

        table
    }

    /// Functions that have at least one line row.
    pub fn functions(&self) -> Vec<FunctionSymbol> {
        self.functions
            .iter()
            .filter(|(_, f)| !f.file.is_empty())
            .map(|(name, f)| FunctionSymbol::new(name.clone(), f.file.clone()))
            .collect()
    }

    /// Every `unit`-sized instruction slot of `function` paired with its source line.
    ///
    /// A row covers the addresses up to the next row, so instructions that do not start a new
    /// line still get one. Returns `None` for an unknown function.
    pub fn instructions(&self, function: &str, unit: u32) -> Option<Vec<Instruction>> {
        let f = self.functions.get(function)?;
        let rows = self.rows_in(&f.range);
        let step = u64::from(unit.max(1));

        let mut instructions = vec![];

        for (i, row) in rows.iter().enumerate() {
            if row.end_sequence || row.line == 0 {
                continue;
            }

            let end = rows
                .get(i + 1)
                .map(|next| next.address)
                .unwrap_or(f.range.end)
                .min(f.range.end);

            let mut address = row.address;
            while address < end {
                if let Ok(address) = u32::try_from(address) {
                    instructions.push(Instruction::new(address, row.line));
                }
                address += step;
            }
        }

        // Later rows at the same address describe it more precisely.
        instructions.reverse();
        instructions.dedup_by_key(|i| i.address);
        instructions.reverse();

        Some(instructions)
    }

    fn rows_in(&self, range: &Range<u64>) -> &[LineRow] {
        let lo = self.rows.partition_point(|row| row.address < range.start);
        let hi = self.rows.partition_point(|row| row.address < range.end);
        &self.rows[lo..hi]
    }
}

fn elf_functions(elf: &Elf) -> Vec<(String, Range<u64>)> {
    let mut functions = vec![];

    for sym in elf.syms.iter() {
        if sym.st_type() != STT_FUNC || sym.st_size == 0 {
            continue;
        }

        let name = match elf.strtab.get_at(sym.st_name) {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };

        // Thumb function symbols have the low bit set.
        let start = sym.st_value & !1;
        let end = start.saturating_add(sym.st_size);

        functions.push((name.to_owned(), start..end));
    }

    functions
}

fn line_rows(elf: &Elf, data: &[u8]) -> Result<Vec<LineRow>> {
    let endian = if elf.little_endian {
        RunTimeEndian::Little
    } else {
        RunTimeEndian::Big
    };

    let loader = |id| -> Result<_> { Ok(load_section(elf, data, id, endian)) };
    let dwarf = gimli::Dwarf::load(loader)?;

    let mut rows = vec![];

    let mut headers = dwarf.units();
    while let Some(header) = headers.next()? {
        let unit = dwarf.unit(header)?;

        let program = match unit.line_program.clone() {
            Some(program) => program,
            None => continue,
        };

        let comp_dir = unit
            .comp_dir
            .map(|dir| dir.to_string_lossy().into_owned());

        let mut program_rows = program.rows();
        while let Some((header, row)) = program_rows.next_row()? {
            if row.end_sequence() {
                rows.push(LineRow::end(row.address()));
                continue;
            }

            let file = match row.file(header) {
                Some(file) => file,
                None => continue,
            };

            let mut path = PathBuf::new();

            if let Some(comp_dir) = &comp_dir {
                path.push(comp_dir);
            }

            if let Some(dir) = file.directory(header) {
                let dir = dwarf.attr_string(&unit, dir)?;
                path.push(dir.to_string_lossy().as_ref());
            }

            let name = dwarf.attr_string(&unit, file.path_name())?;
            path.push(name.to_string_lossy().as_ref());

            let line = row
                .line()
                .map(|line| u32::try_from(line.get()).unwrap_or(u32::MAX))
                .unwrap_or(0);

            rows.push(LineRow::new(
                row.address(),
                path.display().to_string(),
                line,
            ));
        }
    }

    Ok(rows)
}

fn load_section<'data>(
    elf: &Elf,
    data: &'data [u8],
    section: SectionId,
    endian: RunTimeEndian,
) -> EndianSlice<'data, RunTimeEndian> {
    for shdr in &elf.section_headers {
        if let Some(name) = elf.shdr_strtab.get_at(shdr.sh_name) {
            if name == section.name() {
                if let Some(range) = shdr.file_range() {
                    if let Some(data) = data.get(range) {
                        return EndianSlice::new(data, endian);
                    }
                }
            }
        }
    }

    EndianSlice::new(&[], endian)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> LineTable {
        let functions = vec![
            ("main".to_owned(), 0x100..0x10c),
            ("helper".to_owned(), 0x10c..0x110),
            ("no_lines".to_owned(), 0x200..0x204),
        ];

        let rows = vec![
            LineRow::new(0x10c, "src/helper.c", 3),
            LineRow::new(0x100, "src/main.c", 10),
            LineRow::new(0x104, "src/main.c", 11),
            LineRow::new(0x108, "src/main.c", 11),
            LineRow::new(0x108, "src/main.c", 12),
            LineRow::end(0x110),
        ];

        LineTable::from_parts(functions, rows)
    }

    #[test]
    fn test_functions_with_lines() {
        assert_eq!(
            table().functions(),
            vec![
                FunctionSymbol::new("helper", "src/helper.c"),
                FunctionSymbol::new("main", "src/main.c"),
            ]
        );
    }

    #[test]
    fn test_instructions_cover_every_unit() {
        let instructions = table().instructions("main", 2).unwrap();

        assert_eq!(
            instructions,
            vec![
                Instruction::new(0x100, 10),
                Instruction::new(0x102, 10),
                Instruction::new(0x104, 11),
                Instruction::new(0x106, 11),
                Instruction::new(0x108, 12),
                Instruction::new(0x10a, 12),
            ]
        );
    }

    #[test]
    fn test_instructions_stop_at_sequence_end() {
        let instructions = table().instructions("helper", 2).unwrap();

        assert_eq!(
            instructions,
            vec![Instruction::new(0x10c, 3), Instruction::new(0x10e, 3)]
        );
    }

    #[test]
    fn test_unknown_function() {
        assert!(table().instructions("missing", 2).is_none());
        assert_eq!(table().instructions("no_lines", 2), Some(vec![]));
    }

    #[test]
    fn test_parse_rejects_non_elf() {
        assert!(LineTable::parse(b"definitely not an executable").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LineTable::load(dir.path().join("firmware.elf")).unwrap_err();

        assert!(err.to_string().contains("unable to read executable"));
    }
}
