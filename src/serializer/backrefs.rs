/******************************************************************************/
/*                                                                            */
/* SPDX-License-Identifier: MIT                                               */
/* Copyright (c) [2023] Serokell <hi@serokell.io>                             */
/*                                                                            */
/******************************************************************************/

//! Back reference compression.
//!
//! An extension of the plain format with one more node kind: `0xfe` followed
//! by a path atom. The decoder keeps every node it has read on a stack, and
//! views that stack as a list with the most recent node first. The path is
//! followed from the root of that list, and the node it lands on is repeated
//! in place. A subtree that occurs several times is thus written once.
//!
//! Paths are read from the least significant bit of the last byte: a zero bit
//! goes to `first`, a one bit to `rest`, and the highest set bit ends the
//! path.
//!
//! The plain decoder rejects `0xfe`; use the functions here on both ends.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::constants::*;
use super::decode::{decode_atom, BytesIt, DecodeError, DecodeLimits};
use super::encode::{atom_serialized_len, put_atom, EncodeError};
use crate::allocator::{Allocator, SExp};
use crate::tree_hash::{hash_atom, hash_pair, TreeHash};

const FIRST: u8 = 0;
const REST: u8 = 1;

impl<'a> Allocator<'a> {
    /// Like [Allocator::deserialize], but also accepts back references.
    ///
    /// The result may share subtrees, so its plain serialization can be much
    /// larger than the input. Use [crate::tree_hash()] rather than walking
    /// it when that matters.
    pub fn deserialize_with_backrefs(
        &'a self,
        bytes: &[u8],
    ) -> Result<(&'a SExp<'a>, usize), DecodeError> {
        self.deserialize_backrefs_with_limits(bytes, &DecodeLimits::default())
    }

    /// Like [Allocator::deserialize_with_backrefs], with explicit limits.
    /// [DecodeLimits::max_depth] doesn't apply: decoding never recurses, and
    /// its work stack is bounded by the input length.
    pub fn deserialize_backrefs_with_limits(
        &'a self,
        bytes: &[u8],
        limits: &DecodeLimits,
    ) -> Result<(&'a SExp<'a>, usize), DecodeError> {
        let mut it: BytesIt = bytes.into();
        let res = decode_sexp_backrefs(self, &mut it, limits)?;
        let consumed = bytes.len() - it.remaining();
        trace!(consumed, "deserialized expression with back references");
        Ok((res, consumed))
    }
}

impl<'a> SExp<'a> {
    /// Serialize, replacing repeated subtrees by back references wherever
    /// that is shorter.
    pub fn serialize_with_backrefs(&'a self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        encode_sexp_backrefs(self, &mut out)?;
        trace!(bytes = out.len(), "serialized expression with back references");
        Ok(out)
    }
}

/// Follow `path` from `root`.
fn traverse_path<'a>(path: &[u8], root: &'a SExp<'a>) -> Result<&'a SExp<'a>, DecodeError> {
    let skip = path.iter().take_while(|b| **b == 0).count();
    let path = &path[skip..];
    let Some(lead) = path.first() else {
        return Err(DecodeError::InvalidBackReference);
    };
    let end_bit = 7 - lead.leading_zeros();
    let mut node = root;
    for (idx, byte) in path.iter().enumerate().rev() {
        let bits = if idx == 0 { end_bit } else { 8 };
        for bit in 0..bits {
            let (first, rest) = node.as_pair().ok_or(DecodeError::InvalidBackReference)?;
            node = if (byte >> bit) & 1 == 0 { first } else { rest };
        }
    }
    Ok(node)
}

enum ParseOp {
    SExp,
    Cons,
}

fn decode_sexp_backrefs<'a>(
    allocator: &'a Allocator<'a>,
    bytes: &mut BytesIt,
    limits: &DecodeLimits,
) -> Result<&'a SExp<'a>, DecodeError> {
    // nodes read so far, most recent first
    let mut stack = allocator.nil();
    let mut ops = vec![ParseOp::SExp];
    while let Some(op) = ops.pop() {
        match op {
            ParseOp::SExp => {
                let lead = bytes
                    .next_ref()
                    .ok_or(DecodeError::UnexpectedEndOfInput)?;
                let node = match *lead {
                    CONS_BOX_MARKER => {
                        ops.push(ParseOp::Cons);
                        ops.push(ParseOp::SExp);
                        ops.push(ParseOp::SExp);
                        continue;
                    }
                    BACK_REFERENCE => {
                        let path_lead = bytes
                            .next_ref()
                            .ok_or(DecodeError::UnexpectedEndOfInput)?;
                        traverse_path(decode_atom(path_lead, bytes, limits)?, stack)?
                    }
                    _ => allocator.new_atom(decode_atom(lead, bytes, limits)?),
                };
                stack = allocator.new_pair(node, stack);
            }
            ParseOp::Cons => {
                // `rest` was read last, so it's on top
                let popped = stack
                    .as_pair()
                    .and_then(|(rest, below)| Some((rest, below.as_pair()?)));
                let Some((rest, (first, below))) = popped else {
                    unreachable!("both halves of a pair are read before it")
                };
                stack = allocator.new_pair(allocator.new_pair(first, rest), below);
            }
        }
    }
    let Some((res, _)) = stack.as_pair() else {
        unreachable!("a complete expression leaves exactly one node")
    };
    Ok(res)
}

/// Tree hash and plain serialized length of every distinct node under
/// `root`.
fn measure_subtrees<'a>(root: &'a SExp<'a>) -> HashMap<*const SExp<'a>, (TreeHash, u64)> {
    enum Op<'a> {
        Visit(&'a SExp<'a>),
        Combine(&'a SExp<'a>, &'a SExp<'a>, &'a SExp<'a>),
    }
    let mut info: HashMap<*const SExp<'a>, (TreeHash, u64)> = HashMap::new();
    let mut ops = vec![Op::Visit(root)];
    while let Some(op) = ops.pop() {
        match op {
            Op::Visit(node) => {
                if info.contains_key(&(node as *const _)) {
                    continue;
                }
                match *node {
                    SExp::Atom(bytes) => {
                        info.insert(node, (hash_atom(bytes), atom_serialized_len(bytes)));
                    }
                    SExp::Pair(first, rest) => {
                        ops.push(Op::Combine(node, first, rest));
                        ops.push(Op::Visit(rest));
                        ops.push(Op::Visit(first));
                    }
                }
            }
            Op::Combine(node, first, rest) => {
                let (Some((first_hash, first_len)), Some((rest_hash, rest_len))) = (
                    info.get(&(first as *const _)).copied(),
                    info.get(&(rest as *const _)).copied(),
                ) else {
                    unreachable!("pair measured before its halves")
                };
                let len = first_len.saturating_add(rest_len).saturating_add(1);
                info.insert(node, (hash_pair(&first_hash, &rest_hash), len));
            }
        }
    }
    info
}

/// The decoder's stack of read nodes as the encoder predicts it, tracked by
/// tree hash, so that paths to already written subtrees can be found.
struct ReadCache {
    /// Hash of the whole stack, viewed as a list.
    root: TreeHash,
    /// Pushed items, each with the root before the push.
    stack: Vec<(TreeHash, TreeHash)>,
    /// How many times a hash occurs in the current stack tree.
    count: HashMap<TreeHash, usize>,
    /// Child hash to `(parent hash, direction)` links ever created.
    parents: HashMap<TreeHash, Vec<(TreeHash, u8)>>,
}

impl ReadCache {
    fn new() -> Self {
        let root = hash_atom(&[]);
        ReadCache {
            root,
            stack: Vec::new(),
            count: HashMap::from([(root, 1)]),
            parents: HashMap::new(),
        }
    }

    fn push(&mut self, item: TreeHash) {
        let new_root = hash_pair(&item, &self.root);
        self.stack.push((item, self.root));
        *self.count.entry(item).or_default() += 1;
        *self.count.entry(new_root).or_default() += 1;
        self.parents.entry(item).or_default().push((new_root, FIRST));
        self.parents
            .entry(self.root)
            .or_default()
            .push((new_root, REST));
        self.root = new_root;
    }

    fn pop(&mut self) -> TreeHash {
        let Some((item, old_root)) = self.stack.pop() else {
            unreachable!("the encoder pops only what it pushed")
        };
        for hash in [item, self.root] {
            if let Some(count) = self.count.get_mut(&hash) {
                *count = count.saturating_sub(1);
            }
        }
        self.root = old_root;
        item
    }

    /// Replace the two topmost items by the pair they form.
    fn pop2_and_cons(&mut self) {
        let rest = self.pop();
        let first = self.pop();
        let pair = hash_pair(&first, &rest);
        for (child, direction) in [(first, FIRST), (rest, REST)] {
            *self.count.entry(child).or_default() += 1;
            self.parents.entry(child).or_default().push((pair, direction));
        }
        self.push(pair);
    }

    /// Path atom to a node hashing to `id`, if one exists and writing it as
    /// a back reference is shorter than `serialized_len`.
    fn find_path(&self, id: &TreeHash, serialized_len: u64) -> Option<Vec<u8>> {
        // a back reference takes at least two bytes
        if serialized_len < 3 {
            return None;
        }
        let max_steps = (serialized_len - 2).saturating_mul(8) - 1;
        let mut seen = HashSet::from([*id]);
        // breadth first, so the first path found is a shortest one
        let mut frontier: Vec<(TreeHash, Vec<u8>)> = vec![(*id, Vec::new())];
        let mut steps = 0;
        while !frontier.is_empty() {
            if let Some((_, path)) = frontier.iter().find(|(node, _)| *node == self.root) {
                let atom = path_to_atom(path);
                return (1 + atom_serialized_len(&atom) < serialized_len).then_some(atom);
            }
            if steps == max_steps {
                return None;
            }
            steps += 1;
            let mut next = Vec::new();
            for (node, path) in &frontier {
                for (parent, direction) in self.parents.get(node).into_iter().flatten() {
                    let present = self.count.get(parent).is_some_and(|c| *c > 0);
                    if present && seen.insert(*parent) {
                        let mut path = path.clone();
                        path.push(*direction);
                        next.push((*parent, path));
                    }
                }
            }
            frontier = next;
        }
        None
    }
}

/// Encode directions collected from a node up to the root. The step taken
/// from the root goes to the lowest bit.
fn path_to_atom(path: &[u8]) -> Vec<u8> {
    let steps = path.len();
    let mut atom = vec![0u8; steps / 8 + 1];
    let len = atom.len();
    let mut set = |bit: usize| atom[len - 1 - bit / 8] |= 1 << (bit % 8);
    set(steps);
    for (bit, direction) in path.iter().rev().enumerate() {
        if *direction == REST {
            set(bit);
        }
    }
    atom
}

#[derive(PartialEq)]
enum ReadOp {
    Parse,
    Cons,
}

/// Writes nodes in the same order as the plain encoder, while predicting the
/// decoder's read stack to find earlier copies of each subtree.
fn encode_sexp_backrefs<'a>(root: &'a SExp<'a>, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let info = measure_subtrees(root);
    let mut cache = ReadCache::new();
    let mut pending = vec![root];
    let mut ops = vec![ReadOp::Parse];
    while let Some(node) = pending.pop() {
        ops.pop();
        let Some(&(hash, len)) = info.get(&(node as *const _)) else {
            unreachable!("every node was measured")
        };
        match cache.find_path(&hash, len) {
            Some(path) => {
                out.push(BACK_REFERENCE);
                put_atom(&path, out)?;
                cache.push(hash);
            }
            None => match *node {
                SExp::Atom(bytes) => {
                    put_atom(bytes, out)?;
                    cache.push(hash);
                }
                SExp::Pair(first, rest) => {
                    out.push(CONS_BOX_MARKER);
                    pending.push(rest);
                    pending.push(first);
                    ops.push(ReadOp::Cons);
                    ops.push(ReadOp::Parse);
                    ops.push(ReadOp::Parse);
                }
            },
        }
        while ops.last() == Some(&ReadOp::Cons) {
            ops.pop();
            cache.pop2_and_cons();
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Value;

    #[track_caller]
    fn decode(hex_bytes: &str) -> Result<String, DecodeError> {
        let arena = Allocator::new();
        let hex_bytes: &str = hex_bytes
            .strip_prefix("0x")
            .expect("The `expected` argument must start from 0x");
        let bytes = hex::decode(hex_bytes).expect("Bad hex string in `expected` argument");
        let (node, consumed) = arena.deserialize_with_backrefs(&bytes)?;
        assert_eq!(consumed, bytes.len());
        Ok(node.to_string())
    }

    #[test]
    fn repeated_atom() {
        let arena = Allocator::new();
        let pair = arena.new_pair(arena.new_atom(b"abc"), arena.new_atom(b"abc"));
        assert_eq!(
            hex::encode(pair.serialize_with_backrefs().unwrap()),
            "ff83616263fe02"
        );
        assert_eq!(decode("0xff83616263fe02"), Ok("(\"abc\" . \"abc\")".to_owned()));
    }

    #[test]
    fn plain_decoder_rejects_back_references() {
        let arena = Allocator::new();
        assert_eq!(
            arena.deserialize(&hex::decode("ff83616263fe02").unwrap()),
            Err(DecodeError::InvalidEncoding(BACK_REFERENCE))
        );
    }

    #[test]
    fn short_nodes_are_written_as_is() {
        let arena = Allocator::new();
        let node = arena.alloc(vec![Value::from(1), 1.into(), Value::Nil, Value::Nil]);
        assert_eq!(node.serialize_with_backrefs(), node.serialize());
    }

    #[test]
    fn accepts_plain_encoding() {
        assert_eq!(decode("0xff01ff02ff0380"), Ok("(1 2 3)".to_owned()));
        assert_eq!(decode("0x80"), Ok("()".to_owned()));
    }

    #[test]
    fn paths() {
        // `1` is the whole stack, here empty
        assert_eq!(decode("0xfe01"), Ok("()".to_owned()));
        // `rest` of the stack holding only "abc"
        assert_eq!(decode("0xff83616263fe03"), Ok("(\"abc\")".to_owned()));
        // leading zero bytes of the path are skipped
        assert_eq!(decode("0xff83616263fe820002"), Ok("(\"abc\" . \"abc\")".to_owned()));
    }

    #[test]
    fn invalid_paths() {
        assert_eq!(decode("0xfe"), Err(DecodeError::UnexpectedEndOfInput));
        assert_eq!(decode("0xfe02"), Err(DecodeError::InvalidBackReference));
        assert_eq!(decode("0xfe80"), Err(DecodeError::InvalidBackReference));
        assert_eq!(decode("0xff01fe00"), Err(DecodeError::InvalidBackReference));
        assert_eq!(decode("0xff01fe06"), Err(DecodeError::InvalidBackReference));
        assert_eq!(decode("0xfeff"), Err(DecodeError::InvalidEncoding(0xff)));
    }

    #[test]
    fn repeated_subtree_round_trip() {
        let arena = Allocator::new();
        let big = || Value::List((0..100).map(Value::from).collect());
        let node = arena.alloc(vec![big(), "middle".into(), big(), big()]);
        let plain = node.serialize().unwrap();
        let compressed = node.serialize_with_backrefs().unwrap();
        assert!(compressed.len() * 2 < plain.len());
        let (decoded, consumed) = arena.deserialize_with_backrefs(&compressed).unwrap();
        assert_eq!(consumed, compressed.len());
        assert_eq!(decoded, node);
        assert_eq!(decoded.serialize().unwrap(), plain);
    }

    #[test]
    fn shared_subtrees_stay_small() {
        let arena = Allocator::new();
        let mut node = arena.new_atom(b"leaf");
        // 2^64 leaves when written out in full
        for _ in 0..64 {
            node = arena.new_pair(node, node);
        }
        let compressed = node.serialize_with_backrefs().unwrap();
        assert!(compressed.len() < 64 * 4 + 8);
        let (decoded, _) = arena.deserialize_with_backrefs(&compressed).unwrap();
        assert_eq!(decoded.tree_hash(), node.tree_hash());
    }

    #[test]
    fn path_encoding() {
        assert_eq!(path_to_atom(&[]), [0x01]);
        assert_eq!(path_to_atom(&[FIRST]), [0x02]);
        assert_eq!(path_to_atom(&[REST]), [0x03]);
        // first step from the root is the last one collected
        assert_eq!(path_to_atom(&[FIRST, REST]), [0x05]);
        assert_eq!(path_to_atom(&[REST; 8]), [0x01, 0xff]);
    }
}
