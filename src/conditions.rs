// SPDX-FileCopyrightText: [2023] Serokell <hi@serokell.io>
//
// SPDX-License-Identifier: MIT

//! Spend condition records. Each record is a fixed-shape list whose first
//! element is the condition opcode.

use crate::allocator::SExp;
use crate::value::{FromClvm, FromClvmError, Value};

/// `CREATE_COIN` opcode. Also used by [RunCatTail], which is a `CREATE_COIN`
/// with a magic amount.
pub const CREATE_COIN: u8 = 51;

/// Amount marking a `CREATE_COIN` as a request to run the asset's TAIL
/// program.
pub const MELT_MAGIC_AMOUNT: i8 = -113;

/// Create a coin with the given puzzle hash and amount, optionally with memos.
///
/// Shape: `(51 puzzle_hash amount)` or `(51 puzzle_hash amount (memo ...))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCoin {
    /// Puzzle hash of the new coin.
    pub puzzle_hash: [u8; 32],
    /// Amount in mojos.
    pub amount: u64,
    /// Hints attached to the coin, if any.
    pub memos: Option<Vec<Vec<u8>>>,
}

/// Run the TAIL program of a CAT with the given solution.
///
/// Shape: `(51 () -113 program solution)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunCatTail<P, S> {
    /// The TAIL program.
    pub program: P,
    /// Its solution.
    pub solution: S,
}

impl<P, S> RunCatTail<P, S> {
    /// Construct the record.
    pub fn new(program: P, solution: S) -> Self {
        RunCatTail { program, solution }
    }
}

impl<'a> From<CreateCoin> for Value<'a> {
    fn from(c: CreateCoin) -> Self {
        let mut items = vec![
            Value::from(CREATE_COIN),
            c.puzzle_hash.into(),
            c.amount.into(),
        ];
        if let Some(memos) = c.memos {
            items.push(Value::List(memos.into_iter().map(Value::Bytes).collect()));
        }
        Value::List(items)
    }
}

impl<'a, P: Into<Value<'a>>, S: Into<Value<'a>>> From<RunCatTail<P, S>> for Value<'a> {
    fn from(c: RunCatTail<P, S>) -> Self {
        Value::List(vec![
            Value::from(CREATE_COIN),
            Value::Nil,
            MELT_MAGIC_AMOUNT.into(),
            c.program.into(),
            c.solution.into(),
        ])
    }
}

fn expect_atom(node: &SExp, expected: &[u8]) -> Result<(), FromClvmError> {
    let found = node.atom()?;
    if found == expected {
        Ok(())
    } else {
        Err(FromClvmError::UnexpectedAtom {
            expected: expected.to_vec(),
            found: found.to_vec(),
        })
    }
}

impl<'a> FromClvm<'a> for CreateCoin {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        match node.as_list()?.as_slice() {
            [opcode, puzzle_hash, amount, rest @ ..] if rest.len() <= 1 => {
                expect_atom(opcode, &[CREATE_COIN])?;
                let memos = match rest {
                    [memos] => Some(
                        memos
                            .as_list()?
                            .into_iter()
                            .map(|m| m.atom().map(<[u8]>::to_vec))
                            .collect::<Result<_, _>>()?,
                    ),
                    _ => None,
                };
                Ok(CreateCoin {
                    puzzle_hash: puzzle_hash.to_native()?,
                    amount: amount.to_native()?,
                    memos,
                })
            }
            items => Err(FromClvmError::WrongLength {
                // memos are optional, so either length is fine
                expected: if items.len() > 4 { 4 } else { 3 },
                found: items.len(),
            }),
        }
    }
}

impl<'a, P: FromClvm<'a>, S: FromClvm<'a>> FromClvm<'a> for RunCatTail<P, S> {
    fn from_clvm(node: &'a SExp<'a>) -> Result<Self, FromClvmError> {
        match node.as_list()?.as_slice() {
            [opcode, puzzle_hash, amount, program, solution] => {
                expect_atom(opcode, &[CREATE_COIN])?;
                expect_atom(puzzle_hash, &[])?;
                expect_atom(amount, &[MELT_MAGIC_AMOUNT as u8])?;
                Ok(RunCatTail {
                    program: P::from_clvm(program)?,
                    solution: S::from_clvm(solution)?,
                })
            }
            items => Err(FromClvmError::WrongLength {
                expected: 5,
                found: items.len(),
            }),
        }
    }
}
