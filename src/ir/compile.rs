//! # Compiler
//!
//! Turns source text into a [`Program`] in a single left-to-right pass.
//!
//! Brackets are paired with an explicit stack of open loop indices, so every
//! `LoopStart` and `LoopEnd` leaves the compiler already knowing where its
//! partner lives. On the way, two peephole passes shrink the program:
//!
//! 1. **Idiom folding**: the loop bodies `[-]`, `[<]` and `[>]` become a
//!    single [`Op::SetZero`], [`Op::ScanZeroLeft`] or [`Op::ScanZeroRight`].
//! 2. **Run coalescing**: a run of `>`/`<` becomes one [`Op::Address`] with
//!    the net displacement, and a run of `+`/`-` becomes one [`Op::Data`]
//!    with the net delta. Runs which net to zero vanish, and so does a data
//!    run immediately overwritten by `,`.
use super::{Op, Program};
use crate::BREAKPOINT;

use core::fmt;
use log::{debug, trace};
use serde_derive::{Deserialize, Serialize};

/// An error found while compiling source text. Compilation is
/// all-or-nothing: no program is produced alongside an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompileError {
    /// A `[` was never closed. The offset is that of the earliest one.
    UnmatchedOpen { offset: usize },
    /// A `]` closed a loop which was never opened.
    UnmatchedClose { offset: usize },
}

impl CompileError {
    /// The 1-based character position of the offending bracket in the source.
    pub fn offset(&self) -> usize {
        match self {
            Self::UnmatchedOpen { offset } | Self::UnmatchedClose { offset } => *offset,
        }
    }

    /// The offending bracket itself.
    pub fn bracket(&self) -> char {
        match self {
            Self::UnmatchedOpen { .. } => '[',
            Self::UnmatchedClose { .. } => ']',
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnmatchedOpen { offset } => {
                write!(f, "unmatched '[' at position {offset}: the loop is never closed")
            }
            Self::UnmatchedClose { offset } => {
                write!(f, "unmatched ']' at position {offset}: no loop is open")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Which peephole passes the compiler applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Optimizations {
    /// Replace `[-]`, `[<]` and `[>]` with single instructions.
    pub fold_idioms: bool,
    /// Merge runs of `+`/`-` and `>`/`<`, dropping no-ops and dead stores.
    pub coalesce: bool,
}

impl Optimizations {
    pub const fn all() -> Self {
        Self {
            fold_idioms: true,
            coalesce: true,
        }
    }

    /// One instruction per source command.
    pub const fn none() -> Self {
        Self {
            fold_idioms: false,
            coalesce: false,
        }
    }
}

impl Default for Optimizations {
    fn default() -> Self {
        Self::all()
    }
}

/// A command character together with its 1-based position in the source.
#[derive(Clone, Copy, Debug)]
struct Command {
    ch: char,
    offset: usize,
}

fn is_command(ch: char) -> bool {
    matches!(ch, '>' | '<' | '+' | '-' | '.' | ',' | '[' | ']') || ch == BREAKPOINT
}

/// Strip everything which is not a command, remembering where each command was.
fn commands(src: &str) -> Vec<Command> {
    src.chars()
        .enumerate()
        .filter(|(_, ch)| is_command(*ch))
        .map(|(i, ch)| Command { ch, offset: i + 1 })
        .collect()
}

/// Recognize a foldable loop at the start of `cmds`.
fn idiom(cmds: &[Command]) -> Option<Op> {
    match cmds {
        [Command { ch: '[', .. }, body, Command { ch: ']', .. }, ..] => match body.ch {
            '-' => Some(Op::SetZero),
            '<' => Some(Op::ScanZeroLeft),
            '>' => Some(Op::ScanZeroRight),
            _ => None,
        },
        _ => None,
    }
}

/// Measure the run of `up`/`down` commands at the start of `cmds`.
/// Returns the net count and the length of the run.
fn run(cmds: &[Command], up: char, down: char) -> (i64, usize) {
    let len = cmds
        .iter()
        .take_while(|cmd| cmd.ch == up || cmd.ch == down)
        .count();
    let net = cmds[..len]
        .iter()
        .map(|cmd| if cmd.ch == up { 1 } else { -1 })
        .sum();
    (net, len)
}

/// Compile source text with every optimization enabled.
pub fn compile(src: &str) -> Result<Program, CompileError> {
    compile_with(src, Optimizations::all())
}

/// Compile source text with the given optimizations.
pub fn compile_with(src: &str, opts: Optimizations) -> Result<Program, CompileError> {
    let cmds = commands(src);
    let mut ops = Vec::with_capacity(cmds.len());
    // The instruction index and source offset of every loop still open.
    let mut open: Vec<(usize, usize)> = vec![];

    let mut i = 0;
    while i < cmds.len() {
        if opts.fold_idioms {
            if let Some(op) = idiom(&cmds[i..]) {
                trace!("Folded loop at position {} into {op}", cmds[i].offset);
                ops.push(op);
                i += 3;
                continue;
            }
        }

        let cmd = cmds[i];
        match cmd.ch {
            '>' | '<' => {
                let (net, len) = if opts.coalesce {
                    run(&cmds[i..], '>', '<')
                } else {
                    run(&cmds[i..i + 1], '>', '<')
                };
                i += len;
                if net != 0 {
                    ops.push(Op::Address(net as isize));
                }
                continue;
            }
            '+' | '-' => {
                let (net, len) = if opts.coalesce {
                    run(&cmds[i..], '+', '-')
                } else {
                    run(&cmds[i..i + 1], '+', '-')
                };
                i += len;
                // Input overwrites the cell before the delta can be observed.
                let overwritten = opts.coalesce && matches!(cmds.get(i), Some(Command { ch: ',', .. }));
                if net != 0 && !overwritten {
                    ops.push(Op::Data(net as i32));
                }
                continue;
            }
            '.' => ops.push(Op::Output),
            ',' => ops.push(Op::Input),
            '[' => {
                open.push((ops.len(), cmd.offset));
                ops.push(Op::LoopStart(usize::MAX));
            }
            ']' => {
                let (start, _) = open
                    .pop()
                    .ok_or(CompileError::UnmatchedClose { offset: cmd.offset })?;
                ops[start] = Op::LoopStart(ops.len());
                ops.push(Op::LoopEnd(start));
            }
            _ => ops.push(Op::Breakpoint),
        }
        i += 1;
    }

    if let Some(&(_, offset)) = open.first() {
        return Err(CompileError::UnmatchedOpen { offset });
    }

    debug!(
        "Compiled {} commands into {} instructions",
        cmds.len(),
        ops.len()
    );
    Ok(Program(ops))
}
