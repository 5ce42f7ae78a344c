// SPDX-FileCopyrightText: [2023] Serokell <hi@serokell.io>
//
// SPDX-License-Identifier: MIT

//! Curried programs.
//!
//! Currying binds the leading arguments of a program without running it. The
//! result is the program `(a (q . program) env)`, where `env` is
//! `(c (q . arg1) (c (q . arg2) ... 1))`: the bound arguments consed in front
//! of the whole solution. Building and taking apart this shape is plain tree
//! manipulation.

use crate::allocator::{Allocator, SExp};

/// Opcode of `q` (quote).
pub const OP_QUOTE: u8 = 1;
/// Opcode of `a` (apply).
pub const OP_APPLY: u8 = 2;
/// Opcode of `c` (cons).
pub const OP_CONS: u8 = 4;

/// A program together with the arguments curried into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurriedProgram<'a> {
    /// The inner program.
    pub program: &'a SExp<'a>,
    /// Curried arguments, first bound argument first.
    pub args: Vec<&'a SExp<'a>>,
}

fn is_op(node: &SExp, op: u8) -> bool {
    node.as_atom() == Some(&[op][..])
}

/// `node` if it has the shape `(q . node)`.
fn unquote<'a>(node: &SExp<'a>) -> Option<&'a SExp<'a>> {
    let (q, quoted) = node.as_pair()?;
    is_op(q, OP_QUOTE).then_some(quoted)
}

impl<'a> Allocator<'a> {
    /// Bind `args` to `program`.
    pub fn curry(&'a self, program: &'a SExp<'a>, args: &[&'a SExp<'a>]) -> &'a SExp<'a> {
        let quote = |node| self.new_pair(self.new_atom(&[OP_QUOTE]), node);
        let env = args.iter().rev().fold(self.one(), |rest, arg| {
            self.new_list([self.new_atom(&[OP_CONS]), quote(*arg), rest])
        });
        self.new_list([self.new_atom(&[OP_APPLY]), quote(program), env])
    }
}

impl<'a> SExp<'a> {
    /// Take apart a program built by [Allocator::curry]. `None` when the
    /// expression doesn't have the curried shape.
    pub fn uncurry(&self) -> Option<CurriedProgram<'a>> {
        let items = self.as_list().ok()?;
        let [apply, quoted, mut env] = items[..] else {
            return None;
        };
        if !is_op(apply, OP_APPLY) {
            return None;
        }
        let program = unquote(quoted)?;
        let mut args = Vec::new();
        // the env ends in `1`, the path to the whole solution
        while env.as_atom() != Some(&[1][..]) {
            let items = env.as_list().ok()?;
            let [cons, quoted, rest] = items[..] else {
                return None;
            };
            if !is_op(cons, OP_CONS) {
                return None;
            }
            args.push(unquote(quoted)?);
            env = rest;
        }
        Some(CurriedProgram { program, args })
    }
}
