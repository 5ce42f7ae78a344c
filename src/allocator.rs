/******************************************************************************/
/*                                                                            */
/* SPDX-License-Identifier: MIT                                               */
/* Copyright (c) [2023] Serokell <hi@serokell.io>                             */
/*                                                                            */
/******************************************************************************/

//! Expression nodes and the arena that owns them.

use std::cell::Cell;

use typed_arena::Arena;

/// A CLVM expression: either an atom (a byte string) or a pair of two
/// expressions.
///
/// Nodes are only ever handed out as `&'a SExp<'a>` references into an
/// [Allocator]. References are `Copy`, and the borrow checker keeps them from
/// outliving the allocator that owns the storage. There is no way to mutate a
/// node after creation, so every tree built through the allocator is acyclic.
#[derive(Clone, Copy)]
pub enum SExp<'a> {
    /// A leaf value. The empty atom is `nil`.
    Atom(&'a [u8]),
    /// A cons cell. The first field is `first`, the second one is `rest`.
    Pair(&'a SExp<'a>, &'a SExp<'a>),
}

/// Kind of an [SExp] node, used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SExpType {
    /// [SExp::Atom]
    Atom,
    /// [SExp::Pair]
    Pair,
}

/// Errors raised when a node is accessed as the wrong kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// Asked for the content of one node type, but the node has the other one.
    #[error("expected {expected}, but got {found}")]
    WrongNodeType {
        /// The node type the caller asked for.
        expected: SExpType,
        /// The actual node type.
        found: SExpType,
    },
}

impl SExp<'static> {
    /// The canonical `nil`, i.e. the zero-length atom.
    pub const NIL: &'static SExp<'static> = &SExp::Atom(&[]);

    /// The single-byte atom `0x01`, used for `true` and the integer `1`.
    pub const ONE: &'static SExp<'static> = &SExp::Atom(&[1]);
}

impl<'a> SExp<'a> {
    /// Node kind.
    pub fn sexp_type(&self) -> SExpType {
        match self {
            SExp::Atom(_) => SExpType::Atom,
            SExp::Pair(..) => SExpType::Pair,
        }
    }

    /// Whether the node is an atom.
    pub fn is_atom(&self) -> bool {
        matches!(self, SExp::Atom(_))
    }

    /// Whether the node is a pair.
    pub fn is_pair(&self) -> bool {
        matches!(self, SExp::Pair(..))
    }

    /// Whether the node is the zero-length atom.
    pub fn is_nil(&self) -> bool {
        matches!(self, SExp::Atom([]))
    }

    /// Atom bytes, or `None` for a pair.
    pub fn as_atom(&self) -> Option<&'a [u8]> {
        match *self {
            SExp::Atom(bytes) => Some(bytes),
            SExp::Pair(..) => None,
        }
    }

    /// Pair halves, or `None` for an atom.
    pub fn as_pair(&self) -> Option<(&'a SExp<'a>, &'a SExp<'a>)> {
        match *self {
            SExp::Pair(first, rest) => Some((first, rest)),
            SExp::Atom(_) => None,
        }
    }

    /// Atom bytes, failing with [NodeError::WrongNodeType] for a pair.
    pub fn atom(&self) -> Result<&'a [u8], NodeError> {
        self.as_atom().ok_or(NodeError::WrongNodeType {
            expected: SExpType::Atom,
            found: SExpType::Pair,
        })
    }

    /// Pair halves, failing with [NodeError::WrongNodeType] for an atom.
    pub fn pair(&self) -> Result<(&'a SExp<'a>, &'a SExp<'a>), NodeError> {
        self.as_pair().ok_or(NodeError::WrongNodeType {
            expected: SExpType::Pair,
            found: SExpType::Atom,
        })
    }

    /// First half of a pair.
    pub fn first(&self) -> Result<&'a SExp<'a>, NodeError> {
        self.pair().map(|(first, _)| first)
    }

    /// Second half of a pair.
    pub fn rest(&self) -> Result<&'a SExp<'a>, NodeError> {
        self.pair().map(|(_, rest)| rest)
    }

    /// Iterate over the `first` elements along the `rest` chain. The
    /// terminating node (`nil` for a proper list) is not yielded; use
    /// [ListIter::terminator] after exhausting the iterator to inspect it.
    pub fn iter(&self) -> ListIter<'a> {
        ListIter { cur: *self }
    }
}

/// Iterator over the elements of a (possibly improper) list. See
/// [SExp::iter].
pub struct ListIter<'a> {
    cur: SExp<'a>,
}

impl<'a> ListIter<'a> {
    /// The node the chain of pairs ended in, once the iterator is exhausted.
    /// Before that, the remaining not-yet-visited tail.
    pub fn terminator(&self) -> SExp<'a> {
        self.cur
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a SExp<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (first, rest) = self.cur.as_pair()?;
        self.cur = *rest;
        Some(first)
    }
}

/// Structural equality. Implemented with an explicit work stack, as derived
/// equality would recurse once per list element.
impl PartialEq for SExp<'_> {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((lhs, rhs)) = stack.pop() {
            if std::ptr::eq(lhs, rhs) {
                continue;
            }
            match (lhs, rhs) {
                (SExp::Atom(l), SExp::Atom(r)) => {
                    if l != r {
                        return false;
                    }
                }
                (SExp::Pair(lf, lr), SExp::Pair(rf, rr)) => {
                    stack.push((*lr, *rr));
                    stack.push((*lf, *rf));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for SExp<'_> {}

/// Owner of all [SExp] nodes of a serialization session.
///
/// Nodes are allocated in a [typed_arena::Arena] and live as long as the
/// allocator itself; dropping the allocator releases the whole session at
/// once. The allocator is single-threaded; independent allocators can be used
/// from independent threads.
///
/// Methods creating nodes take `&'a self`, so the returned references are tied
/// to the allocator's lifetime:
///
/// ```
/// use clvm_codec::Allocator;
///
/// let allocator = Allocator::new();
/// let one = allocator.new_atom(&[1]);
/// let list = allocator.new_pair(one, allocator.nil());
/// assert_eq!(allocator.pair_value(list).unwrap(), (one, allocator.nil()));
/// ```
pub struct Allocator<'a> {
    nodes: Arena<SExp<'a>>,
    atom_bytes: Arena<u8>,
    atom_count: Cell<usize>,
    pair_count: Cell<usize>,
}

impl Default for Allocator<'_> {
    fn default() -> Self {
        Allocator::new()
    }
}

impl<'a> Allocator<'a> {
    /// Construct an empty allocator.
    pub fn new() -> Self {
        Allocator {
            nodes: Arena::new(),
            atom_bytes: Arena::new(),
            atom_count: Cell::new(0),
            pair_count: Cell::new(0),
        }
    }

    /// The canonical `nil`. Doesn't allocate.
    pub fn nil(&self) -> &'a SExp<'a> {
        SExp::NIL
    }

    /// The atom `0x01`. Doesn't allocate.
    pub fn one(&self) -> &'a SExp<'a> {
        SExp::ONE
    }

    /// Allocate an atom holding a copy of `bytes`. The empty atom is always
    /// the shared `nil` node.
    pub fn new_atom(&'a self, bytes: &[u8]) -> &'a SExp<'a> {
        match bytes {
            [] => self.nil(),
            [1] => self.one(),
            _ => {
                let stored: &'a [u8] = self.atom_bytes.alloc_extend(bytes.iter().copied());
                self.atom_count.set(self.atom_count.get() + 1);
                self.nodes.alloc(SExp::Atom(stored))
            }
        }
    }

    /// Allocate a pair.
    pub fn new_pair(&'a self, first: &'a SExp<'a>, rest: &'a SExp<'a>) -> &'a SExp<'a> {
        self.pair_count.set(self.pair_count.get() + 1);
        self.nodes.alloc(SExp::Pair(first, rest))
    }

    /// Right-fold `items` into a proper list terminated by `nil`.
    pub fn new_list<I>(&'a self, items: I) -> &'a SExp<'a>
    where
        I: IntoIterator<Item = &'a SExp<'a>>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(self.nil(), |rest, first| self.new_pair(first, rest))
    }

    /// Node kind of `node`.
    pub fn sexp_type(&self, node: &SExp<'a>) -> SExpType {
        node.sexp_type()
    }

    /// Bytes of an atom node.
    pub fn atom_value(&self, node: &SExp<'a>) -> Result<&'a [u8], NodeError> {
        node.atom()
    }

    /// `(first, rest)` of a pair node.
    pub fn pair_value(&self, node: &SExp<'a>) -> Result<(&'a SExp<'a>, &'a SExp<'a>), NodeError> {
        node.pair()
    }

    /// Number of atoms allocated so far. The shared `nil` and `1` atoms are
    /// not counted.
    pub fn atom_count(&self) -> usize {
        self.atom_count.get()
    }

    /// Number of pairs allocated so far.
    pub fn pair_count(&self) -> usize {
        self.pair_count.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms() {
        let arena = Allocator::new();
        let atom = arena.new_atom(b"abc");
        assert_eq!(arena.sexp_type(atom), SExpType::Atom);
        assert_eq!(arena.atom_value(atom), Ok(&b"abc"[..]));
        assert_eq!(
            arena.pair_value(atom),
            Err(NodeError::WrongNodeType {
                expected: SExpType::Pair,
                found: SExpType::Atom
            })
        );
        assert!(arena.new_atom(&[]).is_nil());
        assert!(std::ptr::eq(arena.new_atom(&[]), arena.nil()));
        assert_eq!(arena.atom_count(), 1);
    }

    #[test]
    fn pairs() {
        let arena = Allocator::new();
        let first = arena.new_atom(b"a");
        let rest = arena.new_atom(b"b");
        let pair = arena.new_pair(first, rest);
        assert_eq!(arena.sexp_type(pair), SExpType::Pair);
        assert_eq!(arena.pair_value(pair), Ok((first, rest)));
        assert_eq!(pair.first(), Ok(first));
        assert_eq!(pair.rest(), Ok(rest));
        assert_eq!(
            arena.atom_value(pair),
            Err(NodeError::WrongNodeType {
                expected: SExpType::Atom,
                found: SExpType::Pair
            })
        );
        assert_eq!(arena.pair_count(), 1);
    }

    #[test]
    fn wrong_node_type_message() {
        assert_eq!(
            SExp::NIL.pair().unwrap_err().to_string(),
            "expected pair, but got atom"
        );
    }

    #[test]
    fn list_is_nil_terminated() {
        let arena = Allocator::new();
        let items = [arena.new_atom(b"x"), arena.new_atom(b"y")];
        let list = arena.new_list(items);
        let mut it = list.iter();
        assert_eq!(it.by_ref().collect::<Vec<_>>(), items);
        assert!(it.terminator().is_nil());
        assert_eq!(arena.new_list([]), arena.nil());
    }

    fn sample<'a>(arena: &'a Allocator<'a>) -> &'a SExp<'a> {
        arena.new_list([
            arena.new_atom(b"x"),
            arena.new_pair(arena.one(), arena.nil()),
        ])
    }

    #[test]
    fn structural_equality() {
        let a1 = Allocator::new();
        let a2 = Allocator::new();
        assert_eq!(sample(&a1), sample(&a2));
        assert_ne!(sample(&a1), a1.new_list([a1.new_atom(b"x")]));
        assert_ne!(a1.nil(), a1.new_pair(a1.nil(), a1.nil()));
    }

    #[test]
    fn equality_of_long_lists_does_not_overflow() {
        let arena = Allocator::new();
        let mk = || arena.new_list(vec![arena.one(); 100_000]);
        assert_eq!(mk(), mk());
    }
}
