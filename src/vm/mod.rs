//! # Virtual Machine Module
//!
//! This module contains all things related to executing a compiled program.
//!
//! ### What is this machine?
//!
//! This virtual machine is a simple turing tape machine. There is a data
//! pointer, a tape of cells, and an instruction pointer into the compiled
//! [`Program`](crate::ir::Program). There are no registers.
//!
//! ### What data can it use?
//!
//! The tape is a fixed number of cells, each 8, 16 or 32 bits wide. 8 and
//! 16 bit cells wrap around; 32 bit cells are plain integers. What happens
//! when the data pointer leaves the tape is decided by the [`BoundsPolicy`].
//!
//! ### How is it run?
//!
//! - [`Interpreter`] runs a program to completion on the calling thread.
//! - [`Session`] runs the interpreter on a worker thread which can be stopped.
//! - [`Debugger`] runs on a worker thread which can also be paused, resumed
//!   and stepped one instruction at a time.
mod cell;
pub use self::cell::*;

mod tape;
pub use self::tape::*;

mod interpreter;
pub use self::interpreter::*;

mod session;
pub use self::session::*;

mod debugger;
pub use self::debugger::*;

use crate::{ir::CompileError, DEFAULT_TAPE_SIZE};
use core::fmt;
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

/// What happens when the data pointer is moved off either end of the tape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundsPolicy {
    /// Reduce the pointer modulo the tape size.
    #[default]
    Wrap,
    /// Halt the run with a [`BoundsError`].
    Fatal,
}

impl fmt::Display for BoundsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Wrap => write!(f, "wrap"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// The machine's read-only configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Config {
    pub cell_width: CellWidth,
    pub tape_size: usize,
    pub bounds: BoundsPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cell_width: CellWidth::default(),
            tape_size: DEFAULT_TAPE_SIZE,
            bounds: BoundsPolicy::default(),
        }
    }
}

/// The ways a pointer move can leave the tape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundsFault {
    /// Moved left of the first cell.
    Underflow,
    /// Moved right of the last cell.
    Overflow,
    /// A scan for a zero cell went all the way around the tape.
    NoZeroCell,
}

/// The data pointer escaped the tape under [`BoundsPolicy::Fatal`], or a
/// scan found no zero cell at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundsError {
    pub fault: BoundsFault,
    /// The index of the instruction which faulted.
    pub instruction: usize,
    /// The data pointer before the instruction ran.
    pub pointer: usize,
    pub tape_size: usize,
}

impl fmt::Display for BoundsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Self {
            fault,
            instruction,
            pointer,
            tape_size,
        } = self;
        match fault {
            BoundsFault::Underflow => write!(
                f,
                "Bounds error: instruction #{instruction} moved the data pointer from cell {pointer} below cell 0"
            ),
            BoundsFault::Overflow => write!(
                f,
                "Bounds error: instruction #{instruction} moved the data pointer from cell {pointer} past the last cell ({})",
                tape_size - 1
            ),
            BoundsFault::NoZeroCell => write!(
                f,
                "Bounds error: instruction #{instruction} scanned from cell {pointer} for a zero cell, but none of the {tape_size} cells is zero"
            ),
        }
    }
}

impl std::error::Error for BoundsError {}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// The instruction pointer ran off the end of the program.
    Completed,
    /// The controller stopped the run.
    Stopped,
    /// The run hit a fatal error.
    Failed(BoundsError),
}

/// The outcome of a run: its status and how long it took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Report {
    pub status: RunStatus,
    pub elapsed: Duration,
}

impl Report {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }
}

/// The status line written to the terminal when a run ends.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let ms = self.elapsed.as_secs_f64() * 1000.0;
        match self.status {
            RunStatus::Completed => write!(f, "Program completed in {ms:.3} ms"),
            RunStatus::Stopped => write!(f, "Program stopped by user after {ms:.3} ms"),
            RunStatus::Failed(_) => write!(f, "Program terminated by an error after {ms:.3} ms"),
        }
    }
}

/// A control call which the engine could not honor in its current state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlError {
    /// The source did not compile. The engine stays idle.
    Compile(CompileError),
    /// `start` was called while a run is still live.
    AlreadyRunning,
    /// The call needs a paused run.
    NotPaused,
    /// The call needs a running run.
    NotRunning,
    /// The worker thread could not be spawned.
    Spawn(String),
}

impl From<CompileError> for ControlError {
    fn from(e: CompileError) -> Self {
        Self::Compile(e)
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Compile(e) => write!(f, "Compile error: {e}"),
            Self::AlreadyRunning => write!(f, "a program is already running"),
            Self::NotPaused => write!(f, "the program is not paused"),
            Self::NotRunning => write!(f, "the program is not running"),
            Self::Spawn(e) => write!(f, "could not start the worker thread: {e}"),
        }
    }
}

impl std::error::Error for ControlError {}
