// SPDX-FileCopyrightText: [2023] Serokell <hi@serokell.io>
//
// SPDX-License-Identifier: MIT

//! Human-readable rendering of expressions, for logs and test failures.
//!
//! Lists render as `(a b c)`, improper tails as `(a b . c)`. Atoms are shown
//! as quoted text when they look like text, as decimal when they are short
//! canonical integers, and as `0x`-prefixed hex otherwise. `nil` is `()`.
//! The rendering is lossy: `"abc"` and `0x616263` print differently, but
//! `1` and `true` don't.

use std::fmt;

use crate::allocator::SExp;
use crate::number::{atom_to_bigint, is_canonical_int};

/// Longest atom that is shown as a decimal number.
const MAX_DECIMAL_LEN: usize = 4;

fn is_text(bytes: &[u8]) -> bool {
    bytes.len() > 2 && bytes.iter().all(|b| (0x20..=0x7e).contains(b))
}

fn fmt_atom(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match bytes {
        [] => write!(f, "()"),
        _ if is_text(bytes) => {
            // checked above to be ASCII
            write!(f, "{:?}", String::from_utf8_lossy(bytes))
        }
        _ if bytes.len() <= MAX_DECIMAL_LEN && is_canonical_int(bytes) => {
            write!(f, "{}", atom_to_bigint(bytes))
        }
        _ => write!(f, "0x{}", hex::encode(bytes)),
    }
}

enum Op<'a> {
    /// Render a node in element position.
    Node(&'a SExp<'a>),
    /// Render what follows the elements seen so far of a list.
    Tail(&'a SExp<'a>),
    Close,
}

/// Iterative, so neither long lists nor deep nesting grow the call stack.
impl fmt::Display for SExp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ops = vec![Op::Node(self)];
        while let Some(op) = ops.pop() {
            match op {
                Op::Node(node) => match *node {
                    SExp::Atom(bytes) => fmt_atom(bytes, f)?,
                    SExp::Pair(first, rest) => {
                        f.write_str("(")?;
                        ops.push(Op::Close);
                        ops.push(Op::Tail(rest));
                        ops.push(Op::Node(first));
                    }
                },
                Op::Tail(node) => match *node {
                    SExp::Atom([]) => {}
                    SExp::Atom(_) => {
                        f.write_str(" . ")?;
                        ops.push(Op::Node(node));
                    }
                    SExp::Pair(first, rest) => {
                        f.write_str(" ")?;
                        ops.push(Op::Tail(rest));
                        ops.push(Op::Node(first));
                    }
                },
                Op::Close => f.write_str(")")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SExp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SExp({self})")
    }
}
