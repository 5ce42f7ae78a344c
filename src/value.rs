// SPDX-FileCopyrightText: [2023] Serokell <hi@serokell.io>
//
// SPDX-License-Identifier: MIT

//! Conversion between native values and [SExp] trees.
//!
//! [Value] is the closed set of shapes that can be turned into an expression.
//! Native types convert into it via [From], and [Allocator::alloc] builds the
//! corresponding tree. The reverse direction is [FromClvm].

use num_bigint::BigInt;

use crate::allocator::{Allocator, NodeError, SExp};
use crate::number::atom_to_bigint;

/// A native value ready to be allocated as an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<'a> {
    /// `nil`, `None`, `false` and `()` all end up here.
    Nil,
    /// `true` is `0x01`, `false` is `nil`.
    Bool(bool),
    /// Any integer, stored in canonical two's complement.
    Int(BigInt),
    /// Raw bytes, stored as-is.
    Bytes(Vec<u8>),
    /// Text, stored as its UTF-8 bytes.
    Text(String),
    /// A proper list of values.
    List(Vec<Value<'a>>),
    /// A single cons cell.
    Pair(Box<Value<'a>>, Box<Value<'a>>),
    /// An already allocated expression, embedded as-is.
    Expr(&'a SExp<'a>),
}

/// Pending step of [Value::alloc].
enum Build<'a> {
    Value(Value<'a>),
    /// Fold the last `n` built nodes into a list.
    List(usize),
    /// Pair up the last two built nodes.
    Pair,
}

impl<'a> Value<'a> {
    /// Build the tree for this value in `allocator`. Works off an explicit
    /// stack, so arbitrarily nested values are fine.
    pub fn alloc(self, allocator: &'a Allocator<'a>) -> &'a SExp<'a> {
        let mut ops = vec![Build::Value(self)];
        let mut built: Vec<&'a SExp<'a>> = Vec::new();
        while let Some(op) = ops.pop() {
            match op {
                Build::Value(value) => match value {
                    Value::List(items) => {
                        ops.push(Build::List(items.len()));
                        ops.extend(items.into_iter().rev().map(Build::Value));
                    }
                    Value::Pair(first, rest) => {
                        ops.push(Build::Pair);
                        ops.push(Build::Value(*rest));
                        ops.push(Build::Value(*first));
                    }
                    Value::Nil => built.push(allocator.nil()),
                    Value::Bool(b) => built.push(allocator.new_bool(b)),
                    Value::Int(n) => built.push(allocator.new_bigint(&n)),
                    Value::Bytes(bytes) => built.push(allocator.new_atom(&bytes)),
                    Value::Text(s) => built.push(allocator.new_string(&s)),
                    Value::Expr(node) => built.push(node),
                },
                Build::List(len) => {
                    // the elements were built right before, in order
                    let items = built.split_off(built.len() - len);
                    built.push(allocator.new_list(items));
                }
                Build::Pair => {
                    let (Some(rest), Some(first)) = (built.pop(), built.pop()) else {
                        unreachable!("pair built before its halves")
                    };
                    built.push(allocator.new_pair(first, rest));
                }
            }
        }
        built
            .pop()
            .unwrap_or_else(|| unreachable!("nothing built for the root value"))
    }
}

impl<'a> Allocator<'a> {
    /// Convert a native value and allocate it.
    ///
    /// ```
    /// use clvm_codec::{Allocator, Value};
    ///
    /// let allocator = Allocator::new();
    /// let node = allocator.alloc(vec![Value::from(1), "two".into(), Value::Nil]);
    /// assert_eq!(node.serialize_hex().unwrap(), "ff01ff8374776fff8080");
    /// ```
    pub fn alloc(&'a self, value: impl Into<Value<'a>>) -> &'a SExp<'a> {
        value.into().alloc(self)
    }

    /// Allocate UTF-8 bytes of `s`.
    pub fn new_string(&'a self, s: &str) -> &'a SExp<'a> {
        self.new_atom(s.as_bytes())
    }

    /// Allocate a boolean: `0x01` or `nil`.
    pub fn new_bool(&'a self, b: bool) -> &'a SExp<'a> {
        if b {
            self.one()
        } else {
            self.nil()
        }
    }
}

impl<'a> From<()> for Value<'a> {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

impl<'a> From<bool> for Value<'a> {
    fn from(x: bool) -> Self {
        Value::Bool(x)
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl<'a> From<$ty> for Value<'a> {
                fn from(x: $ty) -> Self {
                    Value::Int(BigInt::from(x))
                }
            }
        )*
    };
}

value_from_int!(i8, u8, i16, u16, i32, u32, i64, u64, i128, u128);

impl<'a> From<BigInt> for Value<'a> {
    fn from(x: BigInt) -> Self {
        Value::Int(x)
    }
}

impl<'a> From<Vec<u8>> for Value<'a> {
    fn from(x: Vec<u8>) -> Self {
        Value::Bytes(x)
    }
}

impl<'a> From<&[u8]> for Value<'a> {
    fn from(x: &[u8]) -> Self {
        Value::Bytes(x.to_vec())
    }
}

impl<'a, const N: usize> From<[u8; N]> for Value<'a> {
    fn from(x: [u8; N]) -> Self {
        Value::Bytes(x.to_vec())
    }
}

impl<'a, const N: usize> From<&[u8; N]> for Value<'a> {
    fn from(x: &[u8; N]) -> Self {
        Value::Bytes(x.to_vec())
    }
}

impl<'a> From<String> for Value<'a> {
    fn from(x: String) -> Self {
        Value::Text(x)
    }
}

impl<'a> From<&str> for Value<'a> {
    fn from(x: &str) -> Self {
        Value::Text(x.to_owned())
    }
}

impl<'a, T: Into<Value<'a>>> From<Option<T>> for Value<'a> {
    fn from(x: Option<T>) -> Self {
        x.map_or(Value::Nil, Into::into)
    }
}

impl<'a> From<Vec<Value<'a>>> for Value<'a> {
    fn from(x: Vec<Value<'a>>) -> Self {
        Value::List(x)
    }
}

impl<'a, A: Into<Value<'a>>, B: Into<Value<'a>>> From<(A, B)> for Value<'a> {
    fn from((first, rest): (A, B)) -> Self {
        Value::Pair(Box::new(first.into()), Box::new(rest.into()))
    }
}

impl<'a> From<&'a SExp<'a>> for Value<'a> {
    fn from(x: &'a SExp<'a>) -> Self {
        Value::Expr(x)
    }
}

/// Errors that can happen when reading a native value back from an
/// expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FromClvmError {
    /// Got an atom where a pair was expected or vice versa.
    #[error(transparent)]
    Node(#[from] NodeError),
    /// A chain of pairs didn't end in `nil`.
    #[error("expected a proper list")]
    NotAProperList,
    /// Atom bytes are not valid UTF-8.
    #[error("atom is not valid UTF-8")]
    InvalidUtf8,
    /// Atom or list has an unexpected length.
    #[error("expected length {expected}, but got {found}")]
    WrongLength {
        /// Required length.
        expected: usize,
        /// Actual length.
        found: usize,
    },
    /// Atom is neither `nil` nor `0x01`.
    #[error("atom 0x{} is not a boolean", hex::encode(.0))]
    NotABool(Vec<u8>),
    /// Integer doesn't fit into the target type.
    #[error("integer 0x{} is out of range", hex::encode(.0))]
    IntOutOfRange(Vec<u8>),
    /// A fixed field of a record has an unexpected value.
    #[error("expected 0x{}, but got 0x{}", hex::encode(.expected), hex::encode(.found))]
    UnexpectedAtom {
        /// The required atom bytes.
        expected: Vec<u8>,
        /// Bytes found.
        found: Vec<u8>,
    },
}

/// Types that can be read back from an expression.
pub trait FromClvm<'a>: Sized {
    /// Convert `node` into `Self`.
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError>;
}

impl<'a> FromClvm<'a> for &'a SExp<'a> {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        Ok(node)
    }
}

impl<'a> FromClvm<'a> for bool {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        match node.atom()? {
            [] => Ok(false),
            [1] => Ok(true),
            other => Err(FromClvmError::NotABool(other.to_vec())),
        }
    }
}

impl<'a> FromClvm<'a> for BigInt {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        Ok(atom_to_bigint(node.atom()?))
    }
}

macro_rules! int_from_clvm {
    ($($ty:ty => $to:ident),*) => {
        $(
            impl<'a> FromClvm<'a> for $ty {
                fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
                    use num_traits::ToPrimitive;
                    let bytes = node.atom()?;
                    atom_to_bigint(bytes)
                        .$to()
                        .ok_or_else(|| FromClvmError::IntOutOfRange(bytes.to_vec()))
                }
            }
        )*
    };
}

int_from_clvm!(i8 => to_i8, u8 => to_u8, i32 => to_i32, u32 => to_u32, i64 => to_i64, u64 => to_u64);

impl<'a, const N: usize> FromClvm<'a> for [u8; N] {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        let bytes = node.atom()?;
        bytes.try_into().map_err(|_| FromClvmError::WrongLength {
            expected: N,
            found: bytes.len(),
        })
    }
}

impl<'a> FromClvm<'a> for String {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        std::str::from_utf8(node.atom()?)
            .map(str::to_owned)
            .map_err(|_| FromClvmError::InvalidUtf8)
    }
}

/// `nil` reads as `None`. Note that this makes `Some(0)`, `Some(false)` and
/// `Some(vec![])` indistinguishable from `None`.
impl<'a, T: FromClvm<'a>> FromClvm<'a> for Option<T> {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        if node.is_nil() {
            Ok(None)
        } else {
            T::from_clvm(node).map(Some)
        }
    }
}

impl<'a, T: FromClvm<'a>> FromClvm<'a> for Vec<T> {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        node.as_list()?.into_iter().map(T::from_clvm).collect()
    }
}

impl<'a, A: FromClvm<'a>, B: FromClvm<'a>> FromClvm<'a> for (A, B) {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        let (first, rest) = node.pair()?;
        Ok((A::from_clvm(first)?, B::from_clvm(rest)?))
    }
}

impl<'a> SExp<'a> {
    /// Convert into a native value, see [FromClvm].
    pub fn to_native<T: FromClvm<'a>>(&'a self) -> Result<T, FromClvmError> {
        T::from_clvm(self)
    }

    /// Elements of a proper list. An atom other than `nil` is not a list.
    pub fn as_list(&self) -> Result<Vec<&'a SExp<'a>>, FromClvmError> {
        let mut it = self.iter();
        let items: Vec<_> = it.by_ref().collect();
        if it.terminator().is_nil() {
            Ok(items)
        } else {
            Err(FromClvmError::NotAProperList)
        }
    }

    /// Number of elements of a proper list.
    pub fn list_len(&self) -> Result<usize, FromClvmError> {
        let mut it = self.iter();
        let len = it.by_ref().count();
        if it.terminator().is_nil() {
            Ok(len)
        } else {
            Err(FromClvmError::NotAProperList)
        }
    }

    /// Atom as UTF-8 text. `None` for pairs and non-UTF-8 atoms.
    pub fn as_string(&self) -> Option<String> {
        std::str::from_utf8(self.as_atom()?)
            .ok()
            .map(str::to_owned)
    }

    /// `nil` is `false`, `0x01` is `true`, anything else is `None`.
    pub fn as_bool(&self) -> Option<bool> {
        match self.as_atom()? {
            [] => Some(false),
            [1] => Some(true),
            _ => None,
        }
    }
}
