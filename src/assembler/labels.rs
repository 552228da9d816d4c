// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Label substitution in instruction text.
//!
//! A referenced label becomes a literal before the instruction reaches the
//! codec. Relative instructions (jumps, `call`) get the distance from their
//! own end; the distance is masked to 8/16/32 bits by magnitude so a short
//! backward jump stays a one-byte literal. Positive distances keep their
//! natural width. Fixed labels referenced from a relative instruction turn
//! into an indirect `dword [0x..]` target instead.

/// Replace whole-word occurrences of `find` in `line`. A match may not touch
/// alphanumerics, `_`, `$` or `.` on either side, so `foo` never rewrites
/// `foobar` or `x.foo`.
pub(crate) fn replace_whole_words(line: &str, find: &str, replace: &str) -> String {
    if find.is_empty() {
        return line.to_string();
    }
    let boundary = |c: Option<char>| {
        c.map_or(true, |c| {
            !c.is_alphanumeric() && !matches!(c, '_' | '$' | '.')
        })
    };

    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(at) = rest.find(find) {
        let before = rest[..at].chars().next_back();
        let after = rest[at + find.len()..].chars().next();
        out.push_str(&rest[..at]);
        if boundary(before) && boundary(after) {
            out.push_str(replace);
        } else {
            out.push_str(&rest[at..at + find.len()]);
        }
        rest = &rest[at + find.len()..];
    }
    out.push_str(rest);
    out
}

/// The literal a relative instruction uses for an offset label: the distance
/// from the instruction's end, masked by magnitude. The thresholds compare
/// magnitude only: -128 already widens to 16 bits, and positive distances
/// keep their natural width.
pub(crate) fn relative_literal(target: i64, node_end: i64) -> String {
    let value = target - node_end;
    let masked = if value < -32767 {
        value as u32 as i64
    } else if value < -127 {
        value & 0xffff
    } else if value < 0 {
        value & 0xff
    } else {
        value
    };
    format!("0x{masked:x}")
}

#[cfg(test)]
mod tests {
    use super::{relative_literal, replace_whole_words};

    #[test]
    fn whole_word_matches_only() {
        assert_eq!(replace_whole_words("jmp foo", "foo", "0x1"), "jmp 0x1");
        assert_eq!(replace_whole_words("jmp foobar", "foo", "0x1"), "jmp foobar");
        assert_eq!(replace_whole_words("jmp xfoo", "foo", "0x1"), "jmp xfoo");
        assert_eq!(replace_whole_words("jmp $foo", "foo", "0x1"), "jmp $foo");
        assert_eq!(replace_whole_words("jmp a.foo", "foo", "0x1"), "jmp a.foo");
        assert_eq!(
            replace_whole_words("mov eax, [foo+4]", "foo", "0x10"),
            "mov eax, [0x10+4]"
        );
    }

    #[test]
    fn every_occurrence_is_replaced() {
        assert_eq!(
            replace_whole_words("mov foo, foo", "foo", "0x1"),
            "mov 0x1, 0x1"
        );
    }

    #[test]
    fn backward_distances_mask_by_magnitude() {
        assert_eq!(relative_literal(0, 2), "0xfe"); // jmp to self, short
        assert_eq!(relative_literal(0, 4), "0xfc");
        assert_eq!(relative_literal(0, 300), "0xfed4"); // 16-bit mask
        assert_eq!(relative_literal(0, 40000), "0xffff63c0"); // 32-bit mask
    }

    #[test]
    fn forward_distances_keep_natural_width() {
        assert_eq!(relative_literal(0x10, 0), "0x10");
        assert_eq!(relative_literal(0x2000, 0), "0x2000");
    }

    #[test]
    fn the_minus_128_case_widens() {
        // -127 still masks to one byte, -128 crosses the threshold
        assert_eq!(relative_literal(0, 127), "0x81");
        assert_eq!(relative_literal(0, 128), "0xff80");
    }
}
