//! The predefined-constant table.
//!
//! When the lexer hands the parser a bare keyword the current scope doesn't
//! define, [`resolve`] is consulted before giving up with an unknown-keyword
//! error. Each reserved name synthesizes a literal token (number, float, or
//! string) rather than a symbol-table lookup, so these never occupy a
//! sibling slot and never participate in abbreviation matching.

use crate::eval::Value;
use crate::time::{self, StampField};
use rand::RngCore;
use std::cell::Cell;

/// A resolved predefined constant, tagged by the type position it's legal
/// in (only constants usable in the caller's expected type are considered
/// by [`resolve`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Predefined {
    Number(Value),
    Float(Value),
    Str(Value),
}

/// Per-handle RNG state for `RNDn`/`SnRNDn` constants: a 64-bit FNV-style
/// mix of a per-call counter and a `rand`-seeded state, so repeated
/// references within one parse produce different values without pulling in
/// a full CSPRNG dependency beyond what `rand` already provides.
pub struct RandomState {
    seed: u64,
    counter: Cell<u64>,
}

impl RandomState {
    pub fn new() -> Self {
        Self {
            seed: rand::thread_rng().next_u64(),
            counter: Cell::new(0),
        }
    }

    fn next_u64(&self) -> u64 {
        let c = self.counter.get();
        self.counter.set(c + 1);
        fnv_mix(self.seed ^ c)
    }

    fn next_bytes(&self, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            out.extend_from_slice(&self.next_u64().to_le_bytes());
        }
        out.truncate(n);
        out
    }

    fn next_digits(&self, n: usize, hex: bool) -> String {
        let alphabet: &[u8] = if hex {
            b"0123456789abcdef"
        } else {
            b"0123456789"
        };
        let mut s = String::with_capacity(n);
        let mut bits = self.next_u64();
        let mut consumed = 0u32;
        for _ in 0..n {
            if consumed >= 60 {
                bits = self.next_u64();
                consumed = 0;
            }
            let idx = (bits % alphabet.len() as u64) as usize;
            s.push(alphabet[idx] as char);
            bits /= alphabet.len() as u64;
            consumed += if hex { 4 } else { 4 };
        }
        s
    }
}

impl Default for RandomState {
    fn default() -> Self {
        Self::new()
    }
}

fn fnv_mix(mut x: u64) -> u64 {
    // FNV-1a style avalanche mix over a 64-bit input.
    const PRIME: u64 = 0x0000_0100_0000_01B3;
    x ^= x >> 33;
    x = x.wrapping_mul(PRIME);
    x ^= x >> 29;
    x = x.wrapping_mul(PRIME);
    x ^= x >> 32;
    x
}

/// Type position a predefined constant is being looked up for, matching
/// which descriptor kind is currently expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WantKind {
    Number,
    Float,
    Str,
}

/// Resolves `name` against the fixed predefined-constant table for the
/// requested type position. `now` is the open-time reference instant.
pub fn resolve(name: &str, want: WantKind, now: i64, rng: &RandomState) -> Option<Predefined> {
    match (name, want) {
        ("NOW", WantKind::Number) => Some(Predefined::Number(Value::Int(now))),
        ("MINUTE", WantKind::Number) => Some(Predefined::Number(Value::Int(60))),
        ("HOUR", WantKind::Number) => Some(Predefined::Number(Value::Int(3_600))),
        ("DAY", WantKind::Number) => Some(Predefined::Number(Value::Int(86_400))),
        ("YEAR", WantKind::Number) => Some(Predefined::Number(Value::Int(365 * 86_400))),

        ("KiB", WantKind::Number) => Some(Predefined::Number(Value::Int(1024))),
        ("MiB", WantKind::Number) => Some(Predefined::Number(Value::Int(1024 * 1024))),
        ("GiB", WantKind::Number) => Some(Predefined::Number(Value::Int(1024 * 1024 * 1024))),
        ("TiB", WantKind::Number) => Some(Predefined::Number(Value::Int(1024 * 1024 * 1024 * 1024))),

        ("RND1", _) => Some(random_bytes(rng, 1, want)),
        ("RND2", _) => Some(random_bytes(rng, 2, want)),
        ("RND4", _) => Some(random_bytes(rng, 4, want)),
        ("RND8", _) => Some(random_bytes(rng, 8, want)),

        ("PI", WantKind::Float) => Some(Predefined::Float(Value::Float(std::f64::consts::PI))),

        (_, WantKind::Str) if is_random_digit_name(name, false).is_some() => {
            let n = is_random_digit_name(name, false).unwrap();
            Some(Predefined::Str(Value::Str(rng.next_digits(n, false).into_bytes(), crate::eval::StrEnc::Default)))
        }
        (_, WantKind::Str) if is_random_digit_name(name, true).is_some() => {
            let n = is_random_digit_name(name, true).unwrap();
            Some(Predefined::Str(Value::Str(rng.next_digits(n, true).into_bytes(), crate::eval::StrEnc::Default)))
        }

        ("LCSTAMP", WantKind::Str) => Some(stamp(now, true, StampField::FullStamp)),
        ("LCDATE", WantKind::Str) => Some(stamp(now, true, StampField::Date)),
        ("LCYEAR", WantKind::Str) => Some(stamp(now, true, StampField::Year)),
        ("LCYEAR2", WantKind::Str) => Some(stamp(now, true, StampField::Year2)),
        ("LCMONTH", WantKind::Str) => Some(stamp(now, true, StampField::Month)),
        ("LCDAY", WantKind::Str) => Some(stamp(now, true, StampField::Day)),
        ("LCTIME", WantKind::Str) => Some(stamp(now, true, StampField::Time)),
        ("LCHOUR", WantKind::Str) => Some(stamp(now, true, StampField::Hour)),
        ("LCMINUTE", WantKind::Str) => Some(stamp(now, true, StampField::Minute)),
        ("LCSECOND", WantKind::Str) => Some(stamp(now, true, StampField::Second)),
        ("LCOFFSET", WantKind::Str) => Some(stamp(now, true, StampField::Offset)),
        ("LCOFFABS", WantKind::Str) => Some(stamp(now, true, StampField::OffsetAbs)),

        ("GMSTAMP", WantKind::Str) => Some(stamp(now, false, StampField::FullStamp)),
        ("GMDATE", WantKind::Str) => Some(stamp(now, false, StampField::Date)),
        ("GMYEAR", WantKind::Str) => Some(stamp(now, false, StampField::Year)),
        ("GMYEAR2", WantKind::Str) => Some(stamp(now, false, StampField::Year2)),
        ("GMMONTH", WantKind::Str) => Some(stamp(now, false, StampField::Month)),
        ("GMDAY", WantKind::Str) => Some(stamp(now, false, StampField::Day)),
        ("GMTIME", WantKind::Str) => Some(stamp(now, false, StampField::Time)),
        ("GMHOUR", WantKind::Str) => Some(stamp(now, false, StampField::Hour)),
        ("GMMINUTE", WantKind::Str) => Some(stamp(now, false, StampField::Minute)),
        ("GMSECOND", WantKind::Str) => Some(stamp(now, false, StampField::Second)),
        ("GMOFFSET", WantKind::Str) => Some(stamp(now, false, StampField::Offset)),
        ("GMOFFABS", WantKind::Str) => Some(stamp(now, false, StampField::OffsetAbs)),

        _ => None,
    }
}

fn stamp(now: i64, local: bool, field: StampField) -> Predefined {
    Predefined::Str(Value::Str(
        time::format_stamp_field(now, local, field).into_bytes(),
        crate::eval::StrEnc::Default,
    ))
}

fn random_bytes(rng: &RandomState, n: usize, want: WantKind) -> Predefined {
    let bytes = rng.next_bytes(n);
    match want {
        WantKind::Number => {
            let mut buf = [0u8; 8];
            buf[..n].copy_from_slice(&bytes);
            Predefined::Number(Value::Int(i64::from_le_bytes(buf)))
        }
        _ => Predefined::Str(Value::Str(bytes, crate::eval::StrEnc::Binary)),
    }
}

/// Matches `SnRND10`/`SnRND16` (n = 1..8 decimal/hex digit random strings).
fn is_random_digit_name(name: &str, hex: bool) -> Option<usize> {
    let suffix = if hex { "RND16" } else { "RND10" };
    let rest = name.strip_prefix('S')?.strip_suffix(suffix)?;
    let n: usize = rest.parse().ok()?;
    if (1..=8).contains(&n) {
        Some(n)
    } else {
        None
    }
}
