//! # Intermediate Representation Module
//!
//! This module contains the instructions every backend consumes, and the
//! compiler which produces them from source text.
//!
//! ### What does a program look like?
//!
//! A [`Program`] is a flat array of [`Op`]s. There is no tree: loops are
//! represented by a [`Op::LoopStart`] and a [`Op::LoopEnd`] which hold each
//! other's index, so entering, skipping or repeating a loop is a single
//! jump. A program can only be built by the [compiler](compile()), which
//! guarantees that pairing.
mod compile;
pub use self::compile::*;

use core::fmt;
use serde_derive::Serialize;

/// A single instruction of the intermediate program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Op {
    /// Move the data pointer by a (possibly negative) number of cells.
    Address(isize),
    /// Add a (possibly negative) delta to the current cell.
    Data(i32),
    /// Read one character into the current cell.
    Input,
    /// Write the current cell as a character.
    Output,
    /// Jump to the matching `LoopEnd` at the given index if the current cell is zero.
    LoopStart(usize),
    /// Jump back to the matching `LoopStart` at the given index if the current cell is non-zero.
    LoopEnd(usize),
    /// `[-]`
    SetZero,
    /// `[<]`
    ScanZeroLeft,
    /// `[>]`
    ScanZeroRight,
    /// Pause here when a debugger has breakpoints enabled.
    Breakpoint,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Address(n) => write!(f, "address {n:+}"),
            Self::Data(n) => write!(f, "data {n:+}"),
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::LoopStart(end) => write!(f, "loop-start -> {end}"),
            Self::LoopEnd(start) => write!(f, "loop-end -> {start}"),
            Self::SetZero => write!(f, "set-zero"),
            Self::ScanZeroLeft => write!(f, "scan-zero-left"),
            Self::ScanZeroRight => write!(f, "scan-zero-right"),
            Self::Breakpoint => write!(f, "breakpoint"),
        }
    }
}

/// A compiled program: a dense sequence of instructions with every loop
/// paired to its partner.
///
/// Programs are immutable once built. Backends which run on another thread
/// share them behind an `Arc`.
#[derive(Default, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Program(Vec<Op>);

impl Program {
    /// The instructions of the program, in source order.
    pub fn ops(&self) -> &[Op] {
        &self.0
    }

    /// Fetch the instruction at the given index.
    pub fn get(&self, i: usize) -> Option<&Op> {
        self.0.get(i)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Op> {
        self.0.iter()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut depth = 0;
        for (i, op) in self.0.iter().enumerate() {
            if let Op::LoopEnd(_) = op {
                depth -= 1;
            }
            writeln!(f, "{i:>6}  {}{op}", "  ".repeat(depth))?;
            if let Op::LoopStart(_) = op {
                depth += 1;
            }
        }
        Ok(())
    }
}
