// SPDX-FileCopyrightText: [2023] Serokell <hi@serokell.io>
//
// SPDX-License-Identifier: MIT

//! Integer conventions on top of atoms.
//!
//! Integers are stored as their minimal big-endian two's complement
//! representation. A leading `0x00` is kept only when the next byte has its
//! high bit set (otherwise the value would read as negative), and zero is the
//! empty atom.

use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

use crate::allocator::{Allocator, SExp};

/// Canonical atom bytes for `value`.
pub fn bigint_to_atom(value: &BigInt) -> Vec<u8> {
    if value.sign() == Sign::NoSign {
        return Vec::new();
    }
    value.to_signed_bytes_be()
}

/// Interpret atom bytes as a signed big-endian integer. Accepts non-minimal
/// representations.
pub fn atom_to_bigint(bytes: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_be(bytes)
}

/// Canonical atom bytes for a `u64`, without going through [BigInt].
pub fn u64_to_atom(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let mut out = Vec::with_capacity(bytes.len() - skip + 1);
    if bytes.get(skip).is_some_and(|b| b & 0x80 != 0) {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

/// Canonical atom bytes for an `i64`.
pub fn i64_to_atom(value: i64) -> Vec<u8> {
    if value >= 0 {
        return u64_to_atom(value as u64);
    }
    let bytes = value.to_be_bytes();
    // drop redundant sign bytes
    let mut start = 0;
    while start + 1 < bytes.len() && bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0 {
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Whether `bytes` is the minimal encoding of the integer it represents.
pub fn is_canonical_int(bytes: &[u8]) -> bool {
    match bytes {
        [] => true,
        [0x00] => false,
        [0x00, next, ..] => next & 0x80 != 0,
        [0xff, next, ..] => next & 0x80 == 0,
        _ => true,
    }
}

impl<'a> Allocator<'a> {
    /// Allocate the canonical atom for an arbitrary-precision integer.
    pub fn new_bigint(&'a self, value: &BigInt) -> &'a SExp<'a> {
        self.new_atom(&bigint_to_atom(value))
    }

    /// Allocate the canonical atom for a `u64`.
    pub fn new_u64(&'a self, value: u64) -> &'a SExp<'a> {
        self.new_atom(&u64_to_atom(value))
    }

    /// Allocate the canonical atom for an `i64`.
    pub fn new_i64(&'a self, value: i64) -> &'a SExp<'a> {
        self.new_atom(&i64_to_atom(value))
    }
}

impl SExp<'_> {
    /// Read an atom as a signed integer. `None` for pairs.
    pub fn as_bigint(&self) -> Option<BigInt> {
        self.as_atom().map(atom_to_bigint)
    }

    /// Read an atom as a `u64`. `None` for pairs, negative values and values
    /// that don't fit.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_bigint()?.to_u64()
    }

    /// Read an atom as an `i64`. `None` for pairs and values that don't fit.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_bigint()?.to_i64()
    }
}
