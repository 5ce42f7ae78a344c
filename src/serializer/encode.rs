/******************************************************************************/
/*                                                                            */
/* SPDX-License-Identifier: MIT                                               */
/* Copyright (c) [2023] Serokell <hi@serokell.io>                             */
/*                                                                            */
/******************************************************************************/

//! CLVM serialization.

use tracing::trace;

use super::constants::*;
use crate::allocator::SExp;

/// Errors that can happen during serialization.
#[derive(PartialEq, Eq, Debug, Clone, Copy, thiserror::Error)]
pub enum EncodeError {
    /// Atom length is over the largest length prefix tier.
    #[error("atom of {0} bytes is longer than any length prefix can describe")]
    AtomTooLarge(u64),
}

/// Number of bytes of the length prefix for an atom of `len` bytes, i.e. the
/// smallest tier that fits.
fn prefix_tier(len: u64) -> Option<usize> {
    PREFIX_TIER_LIMITS
        .iter()
        .position(|limit| len <= *limit)
        .map(|idx| idx + 1)
}

/// Put the length prefix of an atom.
fn put_len(len: u64, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let num_bytes = prefix_tier(len).ok_or(EncodeError::AtomTooLarge(len))?;
    // `num_bytes` one bits followed by a zero, aligned to the top of the prefix
    let marker = (0xffu64 << (8 - num_bytes)) & 0xff;
    let prefix = (marker << (8 * (num_bytes - 1))) | len;
    out.extend_from_slice(&prefix.to_be_bytes()[8 - num_bytes..]);
    Ok(())
}

/// Number of bytes [put_atom] writes for `bytes`. Saturates for atoms no
/// prefix can describe.
pub(super) fn atom_serialized_len(bytes: &[u8]) -> u64 {
    match bytes {
        [] | [0x01..=MAX_SINGLE_BYTE] => 1,
        _ => {
            let len = bytes.len() as u64;
            prefix_tier(len).map_or(u64::MAX, |tier| tier as u64 + len)
        }
    }
}

/// Put an atom with its length prefix, unless it's self-delimiting.
pub(super) fn put_atom(bytes: &[u8], out: &mut Vec<u8>) -> Result<(), EncodeError> {
    match bytes {
        [] => out.push(NIL_MARKER),
        [b @ 0x01..=MAX_SINGLE_BYTE] => out.push(*b),
        _ => {
            put_len(bytes.len() as u64, out)?;
            out.extend_from_slice(bytes);
        }
    }
    Ok(())
}

/// Pre-order traversal with an explicit stack, so list length doesn't
/// translate into call depth.
fn encode_sexp(root: &SExp, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        match *node {
            SExp::Atom(bytes) => put_atom(bytes, out)?,
            SExp::Pair(first, rest) => {
                out.push(CONS_BOX_MARKER);
                pending.push(rest);
                pending.push(first);
            }
        }
    }
    Ok(())
}

impl SExp<'_> {
    /// Serialize the expression.
    pub fn serialize(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        self.serialize_into(&mut out)?;
        Ok(out)
    }

    /// Like [SExp::serialize], but appends to an existing buffer. Useful to
    /// concatenate several expressions into one stream.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let start = out.len();
        encode_sexp(self, out)?;
        trace!(bytes = out.len() - start, "serialized expression");
        Ok(())
    }

    /// Serialize and render as lowercase hex without a `0x` prefix.
    pub fn serialize_hex(&self) -> Result<String, EncodeError> {
        Ok(hex::encode(self.serialize()?))
    }
}
