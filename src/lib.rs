// SPDX-FileCopyrightText: [2023] Serokell <hi@serokell.io>
//
// SPDX-License-Identifier: MIT
#![warn(clippy::redundant_clone)]
#![warn(missing_docs)]

//! # CLVM codec
//!
//! Canonical binary serialization of CLVM expressions: trees whose leaves are
//! byte strings (atoms) and whose inner nodes are cons pairs.
//!
//! # Usage
//!
//! Expressions live in an [Allocator], an arena that hands out `&SExp`
//! references and frees every node at once when dropped. Build trees with
//! [Allocator::new_atom], [Allocator::new_pair] and [Allocator::new_list],
//! or convert native values through [Value] with [Allocator::alloc].
//!
//! Once built, an expression is serialized with [SExp::serialize]. Bytes are
//! turned back into an expression with [Allocator::deserialize], which also
//! reports how many bytes the expression occupied; the [DecodeLimits]
//! accepted by [Allocator::deserialize_with_limits] bound the work done on
//! untrusted input. Decoded nodes are read back into native types with
//! [FromClvm], see [SExp::to_native]. [SExp::serialize_with_backrefs] and
//! [Allocator::deserialize_with_backrefs] speak the compressed variant of
//! the format, where repeated subtrees are written once.
//!
//! [tree_hash()] computes the commitment hash of an expression, which only
//! depends on its structure.
//!
//! ```
//! use clvm_codec::{Allocator, Value};
//!
//! let arena = Allocator::new();
//! let node = arena.alloc(vec![Value::from(42), "hello".into(), true.into()]);
//! let bytes = node.serialize().unwrap();
//! assert_eq!(hex::encode(&bytes), "ff2aff8568656c6c6fff0180");
//!
//! let (decoded, consumed) = arena.deserialize(&bytes).unwrap();
//! assert_eq!(consumed, bytes.len());
//! assert_eq!(decoded, node);
//! assert_eq!(decoded.to_string(), "(42 \"hello\" 1)");
//! ```

pub mod allocator;
pub mod conditions;
pub mod curry;
mod display;
pub mod number;
pub mod serializer;
pub mod tree_hash;
pub mod value;

pub use allocator::{Allocator, ListIter, NodeError, SExp, SExpType};
pub use curry::CurriedProgram;
pub use serializer::{
    serialized_length, DecodeError, DecodeLimits, EncodeError, DEFAULT_MAX_DEPTH, MAX_ATOM_LEN,
};
pub use tree_hash::{tree_hash, TreeHash};
pub use value::{FromClvm, FromClvmError, Value};
