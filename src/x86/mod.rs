// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The x86 instruction codec.
//!
//! An [`InstructionSet`] holds an ordered list of [`Template`]s loaded from a
//! textual table and answers single-instruction assembly and disassembly
//! queries. Template order is significant: the disassembler returns the
//! first template that decodes, and lazy assembly returns the first that
//! encodes.

mod decode;
mod encode;
pub mod operand;
pub mod template;

use std::fs;
use std::io;
use std::path::Path;

pub use operand::{MemOperand, Operand, OperandPattern};
pub use template::{Emit, Template};

/// The instruction table bundled with the library.
const BASE_TABLE: &str = include_str!("base.tbl");

/// A successful single-instruction assembly: the matched template and the
/// bytes it produced.
#[derive(Debug, Clone)]
pub struct Encoded<'a> {
    pub template: &'a Template,
    pub bytes: Vec<u8>,
}

/// An ordered collection of instruction templates.
pub struct InstructionSet {
    templates: Vec<Template>,
}

impl InstructionSet {
    /// Create an instruction set from the bundled table.
    pub fn new() -> Self {
        let mut set = Self {
            templates: Vec::new(),
        };
        set.parse_table(BASE_TABLE);
        set
    }

    /// Replace the template list from table text. Comment (`#`) and blank
    /// lines are skipped; malformed lines are dropped.
    pub fn parse_table(&mut self, text: &str) {
        self.templates = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(Template::parse)
            .collect();
    }

    /// Replace the template list from a table file.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let text = fs::read_to_string(path)?;
        self.parse_table(&text);
        Ok(())
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Try every template in strict mode and return the shortest encoding;
    /// when nothing matches strictly, retry the whole table lazily.
    pub fn assemble_smallest(&self, line: &str) -> Option<Encoded<'_>> {
        for strict in [true, false] {
            let smallest = self
                .templates
                .iter()
                .filter_map(|template| {
                    template.encode(line, strict).map(|bytes| Encoded { template, bytes })
                })
                .min_by_key(|encoded| encoded.bytes.len());
            if smallest.is_some() {
                return smallest;
            }
        }
        None
    }

    /// Return the first template that encodes the line in lazy mode.
    pub fn assemble_lazy(&self, line: &str) -> Option<Encoded<'_>> {
        self.templates.iter().find_map(|template| {
            template
                .encode(line, false)
                .map(|bytes| Encoded { template, bytes })
        })
    }

    /// Assemble one instruction line to bytes (first lazy match).
    pub fn assemble(&self, line: &str) -> Option<Vec<u8>> {
        self.assemble_lazy(line).map(|encoded| encoded.bytes)
    }

    /// Assemble one instruction line to lowercase hex.
    pub fn assemble_hex(&self, line: &str) -> Option<String> {
        self.assemble(line).map(|bytes| to_hex(&bytes))
    }

    /// Disassemble a byte sequence: the first template that decodes the
    /// whole input wins.
    pub fn disassemble(&self, bytes: &[u8]) -> Option<String> {
        if bytes.is_empty() {
            return None;
        }
        self.templates
            .iter()
            .find_map(|template| template.decode(bytes))
    }

    /// Disassemble a hex string. Odd-length or empty input is a structural
    /// error and yields `None`.
    pub fn disassemble_hex(&self, hex: &str) -> Option<String> {
        self.disassemble(&from_hex(hex)?)
    }
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase hex, two chars per byte, no separators.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Parse a hex string; `None` for empty, odd-length or non-hex input.
pub fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}
