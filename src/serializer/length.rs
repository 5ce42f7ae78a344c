/******************************************************************************/
/*                                                                            */
/* SPDX-License-Identifier: MIT                                               */
/* Copyright (c) [2023] Serokell <hi@serokell.io>                             */
/*                                                                            */
/******************************************************************************/

//! Measure serialized expressions without building them.

use super::constants::CONS_BOX_MARKER;
use super::decode::{decode_atom, BytesIt, DecodeError, DecodeLimits};

/// Number of bytes the expression at the start of `bytes` occupies. Performs
/// the same validation as [crate::Allocator::deserialize_with_limits], except
/// for the depth limit: no tree is built, so nesting costs nothing here.
pub fn serialized_length(bytes: &[u8], limits: &DecodeLimits) -> Result<usize, DecodeError> {
    let mut it: BytesIt = bytes.into();
    // nodes still to be read; a pair replaces itself with its two children
    let mut open: u64 = 1;
    while open > 0 {
        let lead = it.next_ref().ok_or(DecodeError::UnexpectedEndOfInput)?;
        if *lead == CONS_BOX_MARKER {
            open += 1;
        } else {
            decode_atom(lead, &mut it, limits)?;
            open -= 1;
        }
    }
    Ok(bytes.len() - it.remaining())
}
