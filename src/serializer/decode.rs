/******************************************************************************/
/*                                                                            */
/* SPDX-License-Identifier: MIT                                               */
/* Copyright (c) [2023] Serokell <hi@serokell.io>                             */
/* Copyright (c) [2022-2023] TriliTech <contact@trili.tech>                   */
/*                                                                            */
/******************************************************************************/

//! CLVM deserialization.

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::constants::*;
use crate::allocator::{Allocator, SExp};

/// Errors that can happen during deserialization.
#[derive(PartialEq, Debug, Clone, Copy, thiserror::Error)]
pub enum DecodeError {
    /// Input continues after a complete expression where it shouldn't.
    #[error("trailing bytes after decoding the value")]
    TrailingBytes,
    /// Input ended where a node or atom bytes were expected.
    #[error("expected more data, but got EOF")]
    UnexpectedEndOfInput,
    /// Leading byte doesn't start any valid node.
    #[error("invalid leading byte: 0x{0:02x}")]
    InvalidEncoding(u8),
    /// Declared atom length is over [DecodeLimits::max_atom_len].
    #[error("atom of {0} bytes exceeds the length limit")]
    AtomTooLarge(u64),
    /// Pairs are nested deeper than [DecodeLimits::max_depth].
    #[error("pair nesting exceeds the depth limit of {0}")]
    DepthLimitExceeded(usize),
    /// Strict mode only: an atom uses a longer length prefix than necessary.
    #[error("atom length prefix is not minimal")]
    NonCanonical,
    /// A back reference path is zero or leads into an atom.
    #[error("back reference doesn't point to a node read before")]
    InvalidBackReference,
    /// Input passed as hex is not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Guards against adversarial input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Longest atom accepted.
    pub max_atom_len: u64,
    /// Maximum nesting of pairs in `first` position. A chain of pairs along
    /// `rest`, i.e. a list, counts as one level regardless of its length.
    pub max_depth: usize,
    /// Reject atoms whose length prefix isn't the shortest possible one.
    pub strict: bool,
}

/// Default maximum pair nesting.
pub const DEFAULT_MAX_DEPTH: usize = 512;

impl Default for DecodeLimits {
    fn default() -> Self {
        DecodeLimits {
            max_atom_len: MAX_ATOM_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
            strict: false,
        }
    }
}

impl DecodeLimits {
    /// Default limits, but non-minimal length prefixes are rejected.
    pub fn strict() -> Self {
        DecodeLimits {
            strict: true,
            ..DecodeLimits::default()
        }
    }
}

impl<'a> Allocator<'a> {
    /// Decode one expression from the start of `bytes`. Returns the
    /// expression and the number of bytes it occupied; anything after that is
    /// left untouched, so several expressions can be read from one stream.
    pub fn deserialize(&'a self, bytes: &[u8]) -> Result<(&'a SExp<'a>, usize), DecodeError> {
        self.deserialize_with_limits(bytes, &DecodeLimits::default())
    }

    /// Like [Allocator::deserialize], with explicit limits.
    pub fn deserialize_with_limits(
        &'a self,
        bytes: &[u8],
        limits: &DecodeLimits,
    ) -> Result<(&'a SExp<'a>, usize), DecodeError> {
        let mut it: BytesIt = bytes.into();
        let res = decode_sexp(self, &mut it, limits)?;
        let consumed = bytes.len() - it.remaining();
        trace!(consumed, "deserialized expression");
        Ok((res, consumed))
    }

    /// Decode an expression that must span the whole of `bytes`.
    pub fn deserialize_exact(&'a self, bytes: &[u8]) -> Result<&'a SExp<'a>, DecodeError> {
        let (res, consumed) = self.deserialize(bytes)?;
        if consumed != bytes.len() {
            // didn't consume bytes entirely, fail
            return Err(DecodeError::TrailingBytes);
        }
        Ok(res)
    }

    /// Decode a hex string, with or without `0x` prefix, holding exactly one
    /// expression.
    pub fn deserialize_hex(&'a self, hex_str: &str) -> Result<&'a SExp<'a>, DecodeError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        self.deserialize_exact(&hex::decode(hex_str)?)
    }
}

pub(super) struct BytesIt<'a>(&'a [u8]);

impl<'a> BytesIt<'a> {
    pub(super) fn take(&mut self, num: usize) -> Option<&'a [u8]> {
        if self.0.len() < num {
            return None;
        }
        let (cur, rest) = self.0.split_at(num);
        self.0 = rest;
        Some(cur)
    }

    pub(super) fn next(&mut self) -> Option<u8> {
        self.next_ref().copied()
    }

    pub(super) fn next_ref(&mut self) -> Option<&'a u8> {
        let (res, rest) = self.0.split_first()?;
        self.0 = rest;
        Some(res)
    }

    pub(super) fn peek(&self) -> Option<u8> {
        self.0.first().copied()
    }

    pub(super) fn remaining(&self) -> usize {
        self.0.len()
    }
}

impl<'a> From<&'a [u8]> for BytesIt<'a> {
    fn from(value: &'a [u8]) -> Self {
        BytesIt(value)
    }
}

/// Read the length field of an atom whose leading byte `lead` has its top bit
/// set. The number of leading one bits is the number of prefix bytes.
fn decode_len(lead: u8, bytes: &mut BytesIt, strict: bool) -> Result<u64, DecodeError> {
    let num_bytes = lead.leading_ones() as usize;
    if num_bytes > PREFIX_TIER_LIMITS.len() {
        return Err(DecodeError::InvalidEncoding(lead));
    }
    let head = u64::from(lead & (0xffu8 >> (num_bytes + 1)));
    let tail = bytes
        .take(num_bytes - 1)
        .ok_or(DecodeError::UnexpectedEndOfInput)?;
    let len = tail.iter().fold(head, |acc, b| (acc << 8) | u64::from(*b));
    if strict && num_bytes > 1 && len <= PREFIX_TIER_LIMITS[num_bytes - 2] {
        return Err(DecodeError::NonCanonical);
    }
    Ok(len)
}

/// Read atom bytes given the already consumed leading byte. Doesn't allocate,
/// the result borrows from the input.
pub(super) fn decode_atom<'b>(
    lead: &'b u8,
    bytes: &mut BytesIt<'b>,
    limits: &DecodeLimits,
) -> Result<&'b [u8], DecodeError> {
    match *lead {
        NIL_MARKER => Ok(&[]),
        // never produced by the encoder, `0x00` is `0x8100`
        0x00 if limits.strict => Err(DecodeError::NonCanonical),
        0x00..=MAX_SINGLE_BYTE => Ok(std::slice::from_ref(lead)),
        CONS_BOX_MARKER => Err(DecodeError::InvalidEncoding(CONS_BOX_MARKER)),
        b => {
            let len = decode_len(b, bytes, limits.strict)?;
            if len > limits.max_atom_len {
                debug!(
                    len,
                    max_atom_len = limits.max_atom_len,
                    "atom length limit exceeded"
                );
                return Err(DecodeError::AtomTooLarge(len));
            }
            let len = usize::try_from(len).map_err(|_| DecodeError::AtomTooLarge(len))?;
            let atom = bytes.take(len).ok_or(DecodeError::UnexpectedEndOfInput)?;
            if limits.strict && matches!(atom, [0x01..=MAX_SINGLE_BYTE]) {
                return Err(DecodeError::NonCanonical);
            }
            Ok(atom)
        }
    }
}

/// Lists are short more often than not; avoid a heap allocation for them.
const EXPECTED_LIST_LEN: usize = 4;

/// A chain of pairs along `rest` that has been opened but not terminated yet.
struct PendingList<'a> {
    firsts: SmallVec<[&'a SExp<'a>; EXPECTED_LIST_LEN]>,
    /// Whether the next decoded node is the `first` of another pair in the
    /// chain, as opposed to the node terminating it.
    awaiting_first: bool,
}

impl<'a> PendingList<'a> {
    fn new() -> Self {
        PendingList {
            firsts: SmallVec::new(),
            awaiting_first: true,
        }
    }

    /// Build the pairs bottom-up now that the terminating node is known.
    fn close(self, allocator: &'a Allocator<'a>, terminator: &'a SExp<'a>) -> &'a SExp<'a> {
        self.firsts
            .into_iter()
            .rev()
            .fold(terminator, |rest, first| allocator.new_pair(first, rest))
    }
}

/// Iterative decoder. Each entry of `pending` is one level of nesting in
/// `first` position; consecutive pairs in `rest` position extend the same
/// entry, so the work stack grows with tree height and not with list length.
fn decode_sexp<'a>(
    allocator: &'a Allocator<'a>,
    bytes: &mut BytesIt,
    limits: &DecodeLimits,
) -> Result<&'a SExp<'a>, DecodeError> {
    let mut pending: Vec<PendingList<'a>> = Vec::new();
    loop {
        let lead = bytes
            .next_ref()
            .ok_or(DecodeError::UnexpectedEndOfInput)?;
        if *lead == CONS_BOX_MARKER {
            if pending.len() >= limits.max_depth {
                debug!(max_depth = limits.max_depth, "pair nesting limit exceeded");
                return Err(DecodeError::DepthLimitExceeded(limits.max_depth));
            }
            pending.push(PendingList::new());
            continue;
        }
        let mut node = allocator.new_atom(decode_atom(lead, bytes, limits)?);
        loop {
            match pending.pop() {
                None => return Ok(node),
                Some(mut list) if list.awaiting_first => {
                    list.firsts.push(node);
                    if bytes.peek() == Some(CONS_BOX_MARKER) {
                        // the rest is another pair of the same chain
                        bytes.next();
                    } else {
                        list.awaiting_first = false;
                    }
                    pending.push(list);
                    break;
                }
                Some(list) => node = list.close(allocator, node),
            }
        }
    }
}
