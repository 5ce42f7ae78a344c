// SPDX-FileCopyrightText: [2023] Serokell <hi@serokell.io>
//
// SPDX-License-Identifier: MIT

//! Commitment hash of an expression.
//!
//! An atom hashes as `sha256(0x01 || bytes)` and a pair as
//! `sha256(0x02 || hash(first) || hash(rest))`. The hash depends only on the
//! tree structure, never on how it was serialized.

use std::collections::HashMap;

use cryptoxide::hashing::sha256;

use crate::allocator::SExp;

/// A 32-byte tree hash.
pub type TreeHash = [u8; 32];

const ATOM_TAG: u8 = 1;
const PAIR_TAG: u8 = 2;

/// Hash of a single atom.
pub fn hash_atom(bytes: &[u8]) -> TreeHash {
    let mut buf = Vec::with_capacity(bytes.len() + 1);
    buf.push(ATOM_TAG);
    buf.extend_from_slice(bytes);
    sha256(&buf)
}

/// Hash of a pair given the hashes of its children.
pub fn hash_pair(first: &TreeHash, rest: &TreeHash) -> TreeHash {
    let mut buf = [0u8; 65];
    buf[0] = PAIR_TAG;
    buf[1..33].copy_from_slice(first);
    buf[33..].copy_from_slice(rest);
    sha256(&buf)
}

enum Op<'a> {
    Visit(&'a SExp<'a>),
    Combine(&'a SExp<'a>),
}

/// Tree hash of `root`. Iterative; subtrees shared between several parents
/// are hashed once.
pub fn tree_hash<'a>(root: &'a SExp<'a>) -> TreeHash {
    let mut ops = vec![Op::Visit(root)];
    let mut hashes: Vec<TreeHash> = Vec::new();
    let mut known: HashMap<*const SExp<'a>, TreeHash> = HashMap::new();
    while let Some(op) = ops.pop() {
        match op {
            Op::Visit(node) => match *node {
                SExp::Atom(bytes) => hashes.push(hash_atom(bytes)),
                SExp::Pair(first, rest) => {
                    if let Some(hash) = known.get(&(node as *const _)) {
                        hashes.push(*hash);
                        continue;
                    }
                    ops.push(Op::Combine(node));
                    ops.push(Op::Visit(rest));
                    ops.push(Op::Visit(first));
                }
            },
            Op::Combine(node) => {
                // both children were visited right before
                let (Some(rest), Some(first)) = (hashes.pop(), hashes.pop()) else {
                    unreachable!("pair hashed before its children")
                };
                let hash = hash_pair(&first, &rest);
                known.insert(node as *const _, hash);
                hashes.push(hash);
            }
        }
    }
    // exactly the root hash is left
    hashes.pop().unwrap_or_else(|| unreachable!("no hash computed for the root"))
}

impl<'a> SExp<'a> {
    /// See [tree_hash].
    pub fn tree_hash(&'a self) -> TreeHash {
        tree_hash(self)
    }
}
