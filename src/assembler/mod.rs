// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The multi-line program assembler.
//!
//! Source lines are classified into [`Node`]s (labels, instructions, data,
//! macros), then [`Assembler::process_nodes`] runs the two-pass encoding:
//! pass one sizes every node with a conservative estimate and encodes with
//! guessed label positions, pass two re-encodes with the actual positions.
//! A node whose size still changes after the second pass is reported; the
//! engine does not iterate to a fixed point.

pub mod cli;
pub mod eval;
mod labels;
#[cfg(test)]
mod tests;

use std::fs;
use std::io;
use std::path::Path;

use crate::core::error::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::x86::{to_hex, InstructionSet};

use eval::evaluate_math;
use labels::{relative_literal, replace_whole_words};

/// Size estimate for a not-yet-encoded instruction, used only by the first
/// sizing pass.
const SIZE_ESTIMATE: i64 = 4;

/// One statement of the program.
#[derive(Debug, Clone)]
pub enum Node {
    /// A symbolic name for the current output position.
    Label { name: String, line_nr: u32 },
    /// A symbolic name bound to a fixed absolute address.
    Address { name: String, value: u32 },
    /// An instruction (or expanded data value) awaiting encoding.
    Instruction(InstNode),
    /// A macro invocation; reserved, currently diagnosed and skipped.
    Macro { text: String, line_nr: u32 },
}

/// An instruction node and its encoding state.
#[derive(Debug, Clone)]
pub struct InstNode {
    pub text: String,
    pub line_nr: u32,
    data: Vec<u8>,
    processed: bool,
}

impl InstNode {
    fn new(text: impl Into<String>, line_nr: u32) -> Self {
        Self {
            text: text.into(),
            line_nr,
            data: Vec::new(),
            processed: false,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Whether this instruction encodes its target as a displacement from
    /// its own end (jumps and calls) rather than an absolute value.
    pub fn is_relative(&self) -> bool {
        let text = self.text.trim_start().to_lowercase();
        text.starts_with('j') || text.starts_with("call")
    }
}

impl Node {
    /// Encoded size of this node; unprocessed instructions contribute the
    /// conservative estimate used by the first sizing pass.
    pub fn size(&self) -> i64 {
        match self {
            Node::Instruction(inst) => {
                if inst.processed {
                    inst.data.len() as i64
                } else {
                    SIZE_ESTIMATE
                }
            }
            _ => 0,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            Node::Instruction(inst) => &inst.data,
            _ => &[],
        }
    }

    /// The text this node is known by during label scanning.
    fn line_text(&self) -> &str {
        match self {
            Node::Label { name, .. } | Node::Address { name, .. } => name,
            Node::Instruction(inst) => &inst.text,
            Node::Macro { text, .. } => text,
        }
    }

    fn line_nr(&self) -> u32 {
        match self {
            Node::Label { line_nr, .. } | Node::Macro { line_nr, .. } => *line_nr,
            Node::Instruction(inst) => inst.line_nr,
            Node::Address { .. } => 0,
        }
    }
}

/// The program assembler: node list, codec handle, diagnostics.
pub struct Assembler<'a> {
    iset: &'a InstructionSet,
    nodes: Vec<Node>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Assembler<'a> {
    pub fn new(iset: &'a InstructionSet) -> Self {
        Self {
            iset,
            nodes: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity() == Severity::Error)
    }

    fn node_error(&mut self, line_nr: u32, kind: AsmErrorKind, msg: &str, source: &str) {
        self.diagnostics.push(
            Diagnostic::new(line_nr, Severity::Error, AsmError::new(kind, msg, None))
                .with_source(source),
        );
    }

    /// Bind a fixed absolute address to a name, the way a host environment
    /// provides external symbols.
    pub fn define_address(&mut self, name: impl Into<String>, value: u32) {
        self.nodes.push(Node::Address {
            name: name.into(),
            value,
        });
    }

    /// Read a program file and append its nodes.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let text = fs::read_to_string(path)?;
        self.parse_source(&text);
        Ok(())
    }

    /// Classify source lines into nodes. Comments (`; ...`) are stripped,
    /// blank lines skipped, `label:` split off, `#macro` diagnosed,
    /// `d[bwdq]` value lists expanded into one instruction node per value.
    pub fn parse_source(&mut self, source: &str) {
        for (i, raw) in source.lines().enumerate() {
            let line_nr = (i + 1) as u32;
            let line = raw.split(';').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if line.contains(':') {
                // trailing empty pieces do not count, so a bare `label:`
                // splits into one piece
                let mut parts: Vec<&str> = line.split(':').collect();
                while parts.last().is_some_and(|part| part.is_empty()) {
                    parts.pop();
                }
                self.nodes.push(Node::Label {
                    name: parts.first().unwrap_or(&"").trim().to_string(),
                    line_nr,
                });
                if parts.len() == 2 {
                    let rest = parts[1].trim();
                    if !rest.is_empty() {
                        self.push_statement(rest, line_nr);
                    }
                } else if parts.len() > 2 {
                    self.node_error(
                        line_nr,
                        AsmErrorKind::Parser,
                        "More than one ':' on line",
                        line,
                    );
                }
                continue;
            }

            if let Some(text) = line.strip_prefix('#') {
                self.nodes.push(Node::Macro {
                    text: text.to_string(),
                    line_nr,
                });
                self.node_error(line_nr, AsmErrorKind::Parser, "Macro not found", line);
                continue;
            }

            self.push_statement(line, line_nr);
        }
    }

    fn push_statement(&mut self, line: &str, line_nr: u32) {
        if is_data_list(line) {
            let mut parts = line.split(',');
            if let Some(first) = parts.next() {
                self.nodes
                    .push(Node::Instruction(InstNode::new(first.trim(), line_nr)));
            }
            for value in parts {
                let text = format!("{} {}", &line[..2], value.trim());
                self.nodes
                    .push(Node::Instruction(InstNode::new(text, line_nr)));
            }
        } else {
            self.nodes
                .push(Node::Instruction(InstNode::new(line, line_nr)));
        }
    }

    /// Two-pass encoding with label resolution and arithmetic folding.
    pub fn process_nodes(&mut self, code_base: u32) {
        let count = self.nodes.len();
        let mut positions = vec![0i64; count];
        let mut uses_label = vec![false; count];
        let mut uses_math = vec![false; count];

        // Sizing with estimates, plus label and arithmetic marking.
        let mut offset = 0i64;
        for (i, node) in self.nodes.iter().enumerate() {
            positions[i] = offset;
            offset += node.size();
        }
        let mut duplicate_labels = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Label { name, .. } | Node::Address { name, .. } => {
                    for (j, other) in self.nodes.iter().enumerate() {
                        if i == j || !other.line_text().contains(name.as_str()) {
                            continue;
                        }
                        if other.line_text() == name {
                            duplicate_labels.push((node.line_nr(), name.clone()));
                            break;
                        }
                        uses_label[j] = true;
                    }
                }
                Node::Instruction(inst) => {
                    if inst.text.contains(['+', '-', '*', '/', '%']) {
                        uses_math[i] = true;
                    }
                }
                Node::Macro { .. } => {}
            }
        }
        for (line_nr, name) in duplicate_labels {
            self.node_error(line_nr, AsmErrorKind::Symbol, "Label already defined", &name);
        }

        // First encoding with guessed positions.
        self.encode_pass(&positions, &uses_label, &uses_math, code_base, false);

        // Positions are now exact; encode once more and flag instructions
        // whose size still moved.
        let mut offset = 0i64;
        for (i, node) in self.nodes.iter().enumerate() {
            positions[i] = offset;
            offset += node.size();
        }
        self.encode_pass(&positions, &uses_label, &uses_math, code_base, true);
    }

    fn encode_pass(
        &mut self,
        positions: &[i64],
        uses_label: &[bool],
        uses_math: &[bool],
        code_base: u32,
        check_size: bool,
    ) {
        for i in 0..self.nodes.len() {
            let (line_nr, size_before) = match &self.nodes[i] {
                Node::Instruction(inst) => {
                    if check_size && !inst.processed {
                        continue;
                    }
                    (inst.line_nr, self.nodes[i].size())
                }
                _ => continue,
            };

            let mut text = match &self.nodes[i] {
                Node::Instruction(inst) => inst.text.clone(),
                _ => continue,
            };
            if uses_label[i] {
                text = self.substitute_labels(i, positions, code_base);
            }
            if uses_math[i] {
                match evaluate_math(&text) {
                    Ok(folded) => text = folded,
                    Err(_) => {
                        self.node_error(line_nr, AsmErrorKind::Expression, "Error processing", &text);
                    }
                }
            }

            let encoded = self.iset.assemble(&text);
            let Some(Node::Instruction(inst)) = self.nodes.get_mut(i) else {
                continue;
            };
            match encoded {
                Some(bytes) => {
                    inst.data = bytes;
                    inst.processed = true;
                }
                None => {
                    inst.processed = false;
                    self.node_error(line_nr, AsmErrorKind::Instruction, "Instruction not found", &text);
                    continue;
                }
            }

            if check_size && self.nodes[i].size() != size_before {
                let source = self.nodes[i].line_text().to_string();
                self.node_error(line_nr, AsmErrorKind::Assembler, "Size changed", &source);
            }
        }
    }

    /// Rewrite every label reference in node `idx` into a literal, using the
    /// current position table. Substitution is whole-word only; reference
    /// checks run against the node's original text.
    fn substitute_labels(&self, idx: usize, positions: &[i64], code_base: u32) -> String {
        let inst = match &self.nodes[idx] {
            Node::Instruction(inst) => inst,
            _ => return String::new(),
        };
        let node_end = positions[idx] + self.nodes[idx].size();
        let mut line = inst.text.clone();
        for (i, other) in self.nodes.iter().enumerate() {
            let (name, fixed) = match other {
                Node::Label { name, .. } => (name, None),
                Node::Address { name, value } => (name, Some(*value)),
                _ => continue,
            };
            if name.is_empty() || !inst.text.contains(name.as_str()) {
                continue;
            }
            let replace = if inst.is_relative() {
                match fixed {
                    Some(addr) => format!("dword [0x{addr:x}]"),
                    None => relative_literal(positions[i], node_end),
                }
            } else {
                let value = match fixed {
                    Some(addr) => i64::from(addr),
                    None => positions[i] + i64::from(code_base),
                };
                format!("0x{value:x}")
            };
            line = replace_whole_words(&line, name, &replace);
        }
        line
    }

    /// Total size of the program in its current encoding state.
    pub fn size(&self) -> i64 {
        self.nodes.iter().map(Node::size).sum()
    }

    /// Concatenate every node's encoded bytes.
    pub fn assemble(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for node in &self.nodes {
            out.extend_from_slice(node.data());
        }
        out
    }

    /// The assembled program as lowercase hex.
    pub fn hexify(&self) -> String {
        to_hex(&self.assemble())
    }
}

/// A `db`/`dw`/`dd`/`dq` line carrying a comma-separated value list.
fn is_data_list(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 2
        && bytes[0].eq_ignore_ascii_case(&b'd')
        && (bytes[1].eq_ignore_ascii_case(&b'b')
            || bytes[1].eq_ignore_ascii_case(&b'w')
            || bytes[1].eq_ignore_ascii_case(&b'd')
            || bytes[1].eq_ignore_ascii_case(&b'q'))
        && line.contains(',')
}
