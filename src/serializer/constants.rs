// SPDX-FileCopyrightText: [2023] Serokell <hi@serokell.io>
// SPDX-FileCopyrightText: [2022-2023] TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

/// Prefix denoting an encoded pair, followed by `first` and `rest`.
pub const CONS_BOX_MARKER: u8 = 0xff;
/// Prefix of a back reference, only understood by the back reference aware
/// codec. Followed by a path atom.
pub const BACK_REFERENCE: u8 = 0xfe;
/// Encoding of the empty atom.
pub const NIL_MARKER: u8 = 0x80;
/// Largest byte that encodes a single-byte atom as itself.
pub const MAX_SINGLE_BYTE: u8 = 0x7f;

/// Largest atom length representable by any length prefix.
pub const MAX_ATOM_LEN: u64 = 0x3_ffff_ffff;

/// Largest atom length each prefix tier can carry. A tier with `n` prefix
/// bytes starts with `n` one bits followed by a zero bit, the remaining bits
/// hold the length.
pub const PREFIX_TIER_LIMITS: [u64; 5] = [0x3f, 0x1fff, 0xf_ffff, 0x7ff_ffff, MAX_ATOM_LEN];
