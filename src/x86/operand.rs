// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Operand patterns and operand matching.
//!
//! A template slot (`r32`, `imm8`, `m32`, a literal register name, ...) is an
//! [`OperandPattern`]; matching a source token against a pattern yields an
//! [`Operand`] carrying the resolved value. Any mismatch is a `None` — match
//! failure is normal control flow during the template scan, never an error.

use crate::core::number::parse_number;
use crate::core::register::{by_name, RegWidth, Register};

/// One slot of a template's operand pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandPattern {
    /// Any register of the given width (`r8`/`r16`/`r32`/`r64`).
    Reg(RegWidth),
    /// One specific register, e.g. a literal `eax` or `cl` in the table.
    FixedReg(&'static Register),
    /// Memory reference of the given access width (`m8`..`m64`).
    Mem(RegWidth),
    /// Immediate of the given width (`imm8`..`imm64`).
    Imm(RegWidth),
    /// Relative displacement of the given width (`rel8`/`rel16`/`rel32`).
    Rel(RegWidth),
}

/// A matched operand with its resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(&'static Register),
    Imm(i64),
    Mem(MemOperand),
}

/// A matched memory reference: `[base]`, `[base+disp]` or `[disp]`.
///
/// At least one of `base` and `disp` is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemOperand {
    pub width: RegWidth,
    pub base: Option<&'static Register>,
    pub disp: Option<i64>,
}

/// Whether `value` is representable in `width` bits, reading the slot as
/// either unsigned or two's-complement signed.
pub fn fits_width(value: i64, width: RegWidth) -> bool {
    let bits = u32::from(width.bits());
    if bits >= 64 {
        return true;
    }
    value >= -(1i64 << (bits - 1)) && value < (1i64 << bits)
}

fn narrower(width: RegWidth) -> Option<RegWidth> {
    match width {
        RegWidth::W8 => None,
        RegWidth::W16 => Some(RegWidth::W8),
        RegWidth::W32 => Some(RegWidth::W16),
        RegWidth::W64 => Some(RegWidth::W32),
    }
}

impl OperandPattern {
    /// Parse one pattern token from a template line.
    pub(crate) fn parse(token: &str) -> Option<OperandPattern> {
        let pattern = match token {
            "r8" => OperandPattern::Reg(RegWidth::W8),
            "r16" => OperandPattern::Reg(RegWidth::W16),
            "r32" => OperandPattern::Reg(RegWidth::W32),
            "r64" => OperandPattern::Reg(RegWidth::W64),
            "m8" => OperandPattern::Mem(RegWidth::W8),
            "m16" => OperandPattern::Mem(RegWidth::W16),
            "m32" => OperandPattern::Mem(RegWidth::W32),
            "m64" => OperandPattern::Mem(RegWidth::W64),
            "imm8" => OperandPattern::Imm(RegWidth::W8),
            "imm16" => OperandPattern::Imm(RegWidth::W16),
            "imm32" => OperandPattern::Imm(RegWidth::W32),
            "imm64" => OperandPattern::Imm(RegWidth::W64),
            "rel8" => OperandPattern::Rel(RegWidth::W8),
            "rel16" => OperandPattern::Rel(RegWidth::W16),
            "rel32" => OperandPattern::Rel(RegWidth::W32),
            name => OperandPattern::FixedReg(by_name(name)?),
        };
        Some(pattern)
    }

    /// Match a source token against this slot.
    ///
    /// In strict mode an immediate or relative value that would also fit the
    /// next narrower slot is rejected, so the template scan can prefer the
    /// smallest encoding.
    pub(crate) fn matches(&self, token: &str, strict: bool) -> Option<Operand> {
        match *self {
            OperandPattern::Reg(width) => {
                let reg = by_name(token)?;
                (reg.width == width).then_some(Operand::Reg(reg))
            }
            OperandPattern::FixedReg(reg) => {
                token.eq_ignore_ascii_case(reg.name).then_some(Operand::Reg(reg))
            }
            OperandPattern::Imm(width) | OperandPattern::Rel(width) => {
                let value = parse_number(token)?;
                if !fits_width(value, width) {
                    return None;
                }
                if strict {
                    if let Some(narrow) = narrower(width) {
                        if fits_width(value, narrow) {
                            return None;
                        }
                    }
                }
                Some(Operand::Imm(value))
            }
            OperandPattern::Mem(width) => parse_memory(token, width).map(Operand::Mem),
        }
    }
}

/// Parse a memory operand token: `dword [eax+8]`, `byte [0x1000]`, `[ecx]`.
///
/// The width keyword is optional; when present it must name the pattern
/// width exactly. The base must be a 32-bit register, and `esp`-based forms
/// are rejected here because the generic emitter has no SIB path.
fn parse_memory(token: &str, width: RegWidth) -> Option<MemOperand> {
    let open = token.find('[')?;
    let keyword = token[..open].trim();
    if !keyword.is_empty() && keyword != width.name() {
        return None;
    }
    let rest = token[open + 1..].trim_end();
    let inner = rest.strip_suffix(']')?;
    let inner: String = inner.chars().filter(|c| !c.is_whitespace()).collect();
    if inner.is_empty() {
        return None;
    }

    if let Some(base) = base_register(&inner) {
        return Some(MemOperand {
            width,
            base: Some(base),
            disp: None,
        });
    }

    // register +/- displacement; the sign position is after the base name
    if let Some(split) = inner[1..].find(['+', '-']).map(|i| i + 1) {
        if let Some(base) = base_register(&inner[..split]) {
            let mut disp = parse_number(&inner[split + 1..])?;
            if inner.as_bytes()[split] == b'-' {
                disp = disp.wrapping_neg();
            }
            if !fits_width(disp, RegWidth::W32) {
                return None;
            }
            return Some(MemOperand {
                width,
                base: Some(base),
                disp: Some(disp),
            });
        }
    }

    let disp = parse_number(&inner)?;
    if !fits_width(disp, RegWidth::W32) {
        return None;
    }
    Some(MemOperand {
        width,
        base: None,
        disp: Some(disp),
    })
}

fn base_register(name: &str) -> Option<&'static Register> {
    let reg = by_name(name)?;
    // 32-bit addressing; rm=100 would need a SIB byte the emitter does not
    // produce, so esp never matches as a base.
    (reg.width == RegWidth::W32 && reg.enc != 0b100).then_some(reg)
}
