// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction templates.
//!
//! One line of the instruction table describes one encodable form:
//!
//! ```text
//! mov r32, imm32 ; b8 +r id
//! ```
//!
//! Left of the `;` is the mnemonic and operand pattern, right of it the
//! emit-directive sequence the encoder executes and the decoder replays.

use crate::core::register::RegWidth;

use super::operand::{Operand, OperandPattern};
use super::{decode, encode};

/// One emit-directive of an opcode descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    /// A fixed byte, written as a two-digit hex literal in the table.
    Byte(u8),
    /// `+r`: OR the low three register bits into the preceding opcode byte.
    PlusReg,
    /// `/0`..`/7`: ModR/M with a fixed digit in the `reg` field.
    ModRmDigit(u8),
    /// `/r`: ModR/M with `reg` from a register slot and `mod`/`rm` from the
    /// register-or-memory slot.
    ModRmReg,
    /// `ib`/`iw`/`id`/`iq`: little-endian immediate of 1/2/4/8 bytes.
    Imm(RegWidth),
    /// `cb`/`cw`/`cd`: little-endian relative displacement of 1/2/4 bytes.
    Rel(RegWidth),
}

impl Emit {
    fn parse(token: &str) -> Option<Emit> {
        let emit = match token {
            "+r" => Emit::PlusReg,
            "/r" => Emit::ModRmReg,
            "ib" => Emit::Imm(RegWidth::W8),
            "iw" => Emit::Imm(RegWidth::W16),
            "id" => Emit::Imm(RegWidth::W32),
            "iq" => Emit::Imm(RegWidth::W64),
            "cb" => Emit::Rel(RegWidth::W8),
            "cw" => Emit::Rel(RegWidth::W16),
            "cd" => Emit::Rel(RegWidth::W32),
            _ => {
                if let Some(digit) = token.strip_prefix('/') {
                    let digit: u8 = digit.parse().ok()?;
                    if digit > 7 {
                        return None;
                    }
                    Emit::ModRmDigit(digit)
                } else {
                    if token.len() != 2 {
                        return None;
                    }
                    Emit::Byte(u8::from_str_radix(token, 16).ok()?)
                }
            }
        };
        Some(emit)
    }
}

/// One instruction template: mnemonic, operand pattern, emit sequence.
#[derive(Debug, Clone)]
pub struct Template {
    mnemonic: String,
    pattern: Vec<OperandPattern>,
    emits: Vec<Emit>,
}

impl Template {
    /// Parse a template line. Comment handling and blank-line skipping is the
    /// table loader's job; this returns `None` for anything malformed.
    pub fn parse(line: &str) -> Option<Template> {
        let (head, descriptor) = line.split_once(';')?;
        let (mnemonic, operand_text) = split_mnemonic(head);
        if mnemonic.is_empty() {
            return None;
        }

        let mut pattern = Vec::new();
        for token in split_operands(&operand_text) {
            pattern.push(OperandPattern::parse(&token)?);
        }

        let mut emits = Vec::new();
        for token in descriptor.split_whitespace() {
            emits.push(Emit::parse(token)?);
        }
        if emits.is_empty() {
            return None;
        }
        // +r modifies the byte before it; a descriptor starting with +r or
        // chaining two of them can never encode.
        for (i, emit) in emits.iter().enumerate() {
            if *emit == Emit::PlusReg && !matches!(emits.get(i.wrapping_sub(1)), Some(Emit::Byte(_)))
            {
                return None;
            }
        }

        Some(Template {
            mnemonic,
            pattern,
            emits,
        })
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn pattern(&self) -> &[OperandPattern] {
        &self.pattern
    }

    pub(crate) fn emits(&self) -> &[Emit] {
        &self.emits
    }

    /// Encode one source line against this template.
    ///
    /// Returns `None` unless the mnemonic, arity and every operand match;
    /// strict mode additionally rejects immediates that fit a narrower slot.
    pub fn encode(&self, line: &str, strict: bool) -> Option<Vec<u8>> {
        let operands = self.match_line(line, strict)?;
        encode::emit(self, &operands)
    }

    /// Decode a byte sequence against this template, requiring the whole
    /// input to be consumed. Returns the canonical text form.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        decode::decode(self, bytes)
    }

    /// Match a source line against the pattern, yielding resolved operands.
    pub(crate) fn match_line(&self, line: &str, strict: bool) -> Option<Vec<Operand>> {
        let (mnemonic, operand_text) = split_mnemonic(line);
        if mnemonic != self.mnemonic {
            return None;
        }
        let tokens = split_operands(&operand_text);
        if tokens.len() != self.pattern.len() {
            return None;
        }
        self.pattern
            .iter()
            .zip(&tokens)
            .map(|(slot, token)| slot.matches(token, strict))
            .collect()
    }
}

/// Normalise a line and split off the mnemonic: lowercase, collapsed
/// whitespace, first space separates mnemonic from operand text.
fn split_mnemonic(line: &str) -> (String, String) {
    let collapsed = line
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    match collapsed.split_once(' ') {
        Some((mnemonic, rest)) => (mnemonic.to_string(), rest.to_string()),
        None => (collapsed, String::new()),
    }
}

/// Split operand text on top-level commas, keeping `[...]` groups whole.
fn split_operands(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                tokens.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    tokens.push(current.trim().to_string());
    tokens
}
