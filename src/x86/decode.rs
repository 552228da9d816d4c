// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Byte-stream decoding for a template.
//!
//! The decoder replays the template's directive list over the input: fixed
//! bytes must match (a byte followed by `+r` matches on its top five bits),
//! ModR/M directives reconstruct the register-or-memory operand, immediate
//! and relative directives read little-endian values. The whole input must
//! be consumed for the template to apply.
//!
//! Two SIB shapes are accepted because conventional assemblers emit them for
//! addressing this operand model can express: `0x25` under `mod=00` (absolute
//! disp32) and an index-free SIB (`index=100`) giving `[base(+disp)]`. A SIB
//! with a real index register has no representable operand and rejects the
//! template.

use crate::core::register::{by_encoding, RegWidth, Register};

use super::encode::modrm_reg_slots;
use super::operand::OperandPattern;
use super::template::{Emit, Template};

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn le(&mut self, bytes: u8) -> Option<u64> {
        let mut value = 0u64;
        for i in 0..bytes {
            value |= u64::from(self.u8()?) << (8 * i);
        }
        Some(value)
    }

    fn done(&self) -> bool {
        self.pos == self.bytes.len()
    }
}

/// A decoded operand, kept as display-ready pieces.
enum Decoded {
    Reg(&'static Register),
    Imm(u64),
    Mem {
        width: RegWidth,
        base: Option<&'static Register>,
        disp: Option<u64>,
    },
    /// Absolute memory reference, printed with a full 8-digit displacement.
    MemAbs { width: RegWidth, disp: u32 },
}

impl Decoded {
    fn format(&self) -> String {
        match self {
            Decoded::Reg(reg) => reg.name.to_string(),
            Decoded::Imm(value) => format!("0x{value:x}"),
            Decoded::Mem { width, base, disp } => {
                let mut inner = String::new();
                if let Some(base) = base {
                    inner.push_str(base.name);
                }
                if let Some(disp) = disp {
                    inner.push_str(&format!("+0x{disp:x}"));
                }
                format!("{} [{}]", width.name(), inner)
            }
            Decoded::MemAbs { width, disp } => {
                format!("{} [0x{disp:08x}]", width.name())
            }
        }
    }
}

/// Decode the register-or-memory side of a ModR/M byte into the operand the
/// pattern slot expects.
fn decode_rm(reader: &mut Reader<'_>, modrm: u8, slot: OperandPattern) -> Option<Decoded> {
    let mod_bits = modrm >> 6;
    let rm = modrm & 7;

    match slot {
        OperandPattern::Reg(width) => {
            if mod_bits != 0b11 {
                return None;
            }
            Some(Decoded::Reg(by_encoding(rm, width)?))
        }
        OperandPattern::Mem(width) => {
            if mod_bits == 0b11 {
                return None;
            }
            let mut base_enc = rm;
            if rm == 0b100 {
                let sib = reader.u8()?;
                let index = (sib >> 3) & 7;
                base_enc = sib & 7;
                if index != 0b100 {
                    return None;
                }
                if mod_bits == 0b00 && base_enc == 0b101 {
                    let disp = reader.le(4)? as u32;
                    return Some(Decoded::MemAbs { width, disp });
                }
            } else if mod_bits == 0b00 && rm == 0b101 {
                let disp = reader.le(4)? as u32;
                return Some(Decoded::MemAbs { width, disp });
            }
            let base = by_encoding(base_enc, RegWidth::W32)?;
            let disp = match mod_bits {
                0b00 => None,
                0b01 => Some(reader.le(1)?),
                0b10 => Some(reader.le(4)?),
                _ => unreachable!(),
            };
            Some(Decoded::Mem {
                width,
                base: Some(base),
                disp,
            })
        }
        _ => None,
    }
}

fn first_reg_slot(pattern: &[OperandPattern]) -> Option<usize> {
    pattern
        .iter()
        .position(|slot| matches!(slot, OperandPattern::Reg(_)))
}

fn rm_slot(pattern: &[OperandPattern]) -> Option<usize> {
    pattern
        .iter()
        .position(|slot| matches!(slot, OperandPattern::Mem(_)))
        .or_else(|| first_reg_slot(pattern))
}

pub(crate) fn decode(template: &Template, bytes: &[u8]) -> Option<String> {
    let pattern = template.pattern();
    let mut reader = Reader { bytes, pos: 0 };
    let mut slots: Vec<Option<Decoded>> = pattern.iter().map(|_| None).collect();
    let mut imm_slots = pattern
        .iter()
        .enumerate()
        .filter(|(_, slot)| {
            matches!(slot, OperandPattern::Imm(_) | OperandPattern::Rel(_))
        })
        .map(|(i, _)| i);

    let emits = template.emits();
    let mut i = 0;
    while i < emits.len() {
        match emits[i] {
            Emit::Byte(expected) => {
                let byte = reader.u8()?;
                if matches!(emits.get(i + 1), Some(Emit::PlusReg)) {
                    if byte & 0xf8 != expected & 0xf8 {
                        return None;
                    }
                    let slot = first_reg_slot(pattern)?;
                    let width = match pattern[slot] {
                        OperandPattern::Reg(width) => width,
                        _ => return None,
                    };
                    slots[slot] = Some(Decoded::Reg(by_encoding(byte & 7, width)?));
                    i += 1; // the +r directive is consumed here
                } else if byte != expected {
                    return None;
                }
            }
            Emit::PlusReg => return None, // unreachable for parsed templates
            Emit::ModRmDigit(digit) => {
                let modrm = reader.u8()?;
                if (modrm >> 3) & 7 != digit {
                    return None;
                }
                let slot = rm_slot(pattern)?;
                slots[slot] = Some(decode_rm(&mut reader, modrm, pattern[slot])?);
            }
            Emit::ModRmReg => {
                let modrm = reader.u8()?;
                let (rm, reg) = modrm_reg_slots(pattern)?;
                let reg_enc = (modrm >> 3) & 7;
                match pattern[reg] {
                    OperandPattern::Reg(width) => {
                        slots[reg] = Some(Decoded::Reg(by_encoding(reg_enc, width)?));
                    }
                    OperandPattern::FixedReg(fixed) => {
                        if reg_enc != fixed.enc {
                            return None;
                        }
                    }
                    _ => return None,
                }
                slots[rm] = Some(decode_rm(&mut reader, modrm, pattern[rm])?);
            }
            Emit::Imm(width) | Emit::Rel(width) => {
                let slot = imm_slots.next()?;
                slots[slot] = Some(Decoded::Imm(reader.le(width.bytes())?));
            }
        }
        i += 1;
    }

    if !reader.done() {
        return None;
    }

    let mut text = template.mnemonic().to_string();
    for (slot, decoded) in pattern.iter().zip(slots.iter()) {
        let piece = match (slot, decoded) {
            // a fixed register is implied by the opcode, nothing was read
            (OperandPattern::FixedReg(reg), None) => reg.name.to_string(),
            (_, Some(decoded)) => decoded.format(),
            (_, None) => return None,
        };
        if text.len() == template.mnemonic().len() {
            text.push(' ');
        } else {
            text.push_str(", ");
        }
        text.push_str(&piece);
    }
    Some(text)
}
