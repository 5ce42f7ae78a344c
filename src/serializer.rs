// SPDX-FileCopyrightText: [2023] Serokell <hi@serokell.io>
//
// SPDX-License-Identifier: MIT

//! Serialization to and deserialization from the canonical CLVM binary
//! format.
//!
//! Every node starts with a leading byte. `0xff` is a pair, followed by
//! `first` and then `rest`. Everything else is an atom: `0x80` is `nil`, a
//! byte in `0x00..=0x7f` is a one-byte atom standing for itself, and the
//! remaining patterns are length prefixes of one to five bytes followed by
//! the atom bytes. Encoded expressions are self-delimiting, so several of
//! them can be concatenated in a single stream.
//!
//! Serialization is defined on [crate::SExp], deserialization on
//! [crate::Allocator], see them for more. A separate pair of functions,
//! [crate::SExp::serialize_with_backrefs] and
//! [crate::Allocator::deserialize_with_backrefs], additionally writes
//! repeated subtrees as back references (`0xfe`), which the plain decoder
//! rejects.

mod backrefs;
mod constants;
mod decode;
mod encode;
mod integration_tests;
mod length;

pub use constants::MAX_ATOM_LEN;
pub use decode::{DecodeError, DecodeLimits, DEFAULT_MAX_DEPTH};
pub use encode::EncodeError;
pub use length::serialized_length;
