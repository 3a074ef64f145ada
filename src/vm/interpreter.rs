//! # Interpreter Module
//!
//! This module implements the dispatch core shared by every executing
//! backend, and the plain interpreter built on it.
//!
//! The [`Machine`] is generic over its [`Cell`] type, so each width gets its
//! own monomorphized dispatch loop. [`Interpreter`] picks the width from its
//! [`Config`] when the run starts.
use super::{BoundsError, BoundsFault, BoundsPolicy, CellWidth, Cell, Config, Report, RunStatus, Tape};
use crate::{
    ir::{Op, Program},
    side_effects::Terminal,
};

use log::{debug, warn};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

/// What the machine did with one instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The instruction ran; there is more to do.
    Continue,
    /// A breakpoint instruction ran.
    Breakpoint,
    /// The instruction pointer is past the end of the program; nothing ran.
    Halted,
}

/// The state of one run: tape, data pointer and instruction pointer.
#[derive(Clone, Debug)]
pub struct Machine<C> {
    tape: Tape<C>,
    /// The data pointer.
    pointer: usize,
    /// The instruction pointer.
    i: usize,
    bounds: BoundsPolicy,
}

impl<C: Cell> Machine<C> {
    pub fn new(tape_size: usize, bounds: BoundsPolicy) -> Self {
        Self {
            tape: Tape::new(tape_size),
            pointer: 0,
            i: 0,
            bounds,
        }
    }

    /// Rewind to the first instruction with a zeroed tape.
    pub fn reset(&mut self) {
        self.tape.reset();
        self.pointer = 0;
        self.i = 0;
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn instruction_index(&self) -> usize {
        self.i
    }

    pub fn tape(&self) -> &Tape<C> {
        &self.tape
    }

    fn cell(&self) -> C {
        self.tape.get(self.pointer)
    }

    fn set_cell(&mut self, value: C) {
        *self.tape.get_mut(self.pointer) = value
    }

    fn fault(&self, fault: BoundsFault) -> BoundsError {
        BoundsError {
            fault,
            instruction: self.i,
            pointer: self.pointer,
            tape_size: self.tape.len(),
        }
    }

    /// Run the instruction under the instruction pointer.
    ///
    /// On a [`BoundsError`] the machine is left on the faulting instruction
    /// with the data pointer where it was before.
    pub fn step<T: Terminal + ?Sized>(
        &mut self,
        code: &Program,
        terminal: &T,
    ) -> Result<Step, BoundsError> {
        let Some(op) = code.get(self.i) else {
            return Ok(Step::Halted);
        };

        let mut step = Step::Continue;
        match *op {
            Op::Address(n) => {
                self.pointer = self
                    .tape
                    .offset(self.pointer, n, self.bounds)
                    .map_err(|f| self.fault(f))?
            }
            Op::Data(n) => self.set_cell(self.cell().wrapping_add(n)),
            Op::Output => {
                let ch = char::from_u32(self.cell().to_unsigned())
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                terminal.write(ch.encode_utf8(&mut [0; 4]));
            }
            Op::Input => {
                let code = terminal.read_char().map_or(0, u32::from);
                self.set_cell(C::from_code(code))
            }
            Op::SetZero => self.set_cell(C::zero()),
            Op::ScanZeroLeft | Op::ScanZeroRight => {
                let rightward = *op == Op::ScanZeroRight;
                self.pointer = self
                    .tape
                    .scan_zero(self.pointer, rightward, self.bounds)
                    .map_err(|f| self.fault(f))?
            }
            Op::LoopStart(end) => {
                debug_assert!(matches!(code.get(end), Some(Op::LoopEnd(start)) if *start == self.i));
                if self.cell().is_zero() {
                    self.i = end
                }
            }
            Op::LoopEnd(start) => {
                debug_assert!(matches!(code.get(start), Some(Op::LoopStart(end)) if *end == self.i));
                if !self.cell().is_zero() {
                    self.i = start
                }
            }
            Op::Breakpoint => step = Step::Breakpoint,
        }
        self.i += 1;
        Ok(step)
    }
}

/// Run a machine until the program ends, the kill flag is raised, or a
/// bounds error halts it. A bounds error is reported to the terminal.
fn run_machine<C: Cell, T: Terminal + ?Sized>(
    machine: &mut Machine<C>,
    code: &Program,
    terminal: &T,
    kill: &AtomicBool,
) -> RunStatus {
    loop {
        if kill.load(Ordering::Acquire) {
            return RunStatus::Stopped;
        }
        match machine.step(code, terminal) {
            Ok(Step::Halted) => return RunStatus::Completed,
            Ok(_) => {}
            Err(e) => {
                warn!("{e}");
                terminal.write_error(&e.to_string());
                return RunStatus::Failed(e);
            }
        }
    }
}

/// The interpreter which runs a compiled program against a terminal.
///
/// ```
/// use bfvm::{ir::compile, side_effects::BufferedTerminal, vm::Interpreter};
///
/// let program = compile("++++++++[>++++++++<-]>.").unwrap();
/// let mut interpreter = Interpreter::new(BufferedTerminal::new());
/// assert!(interpreter.run(&program).is_completed());
/// assert_eq!(interpreter.terminal().text(), "@");
/// ```
pub struct Interpreter<T> {
    /// The interpreter's I/O device.
    terminal: T,
    config: Config,
    /// The tape as it was when the last run ended.
    tape: Vec<u32>,
    /// The data pointer when the last run ended.
    pointer: usize,
}

impl<T: Terminal> Interpreter<T> {
    pub fn new(terminal: T) -> Self {
        Self::with_config(terminal, Config::default())
    }

    pub fn with_config(terminal: T, config: Config) -> Self {
        Self {
            terminal,
            config,
            tape: vec![],
            pointer: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn into_terminal(self) -> T {
        self.terminal
    }

    /// The final tape of the last run.
    pub fn tape(&self) -> &[u32] {
        &self.tape
    }

    /// The final data pointer of the last run.
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Run a program to completion on a fresh tape.
    pub fn run(&mut self, code: &Program) -> Report {
        self.run_until(code, &AtomicBool::new(false))
    }

    /// Run a program on a fresh tape until it completes or `kill` is raised.
    /// The status line is written to the terminal either way.
    pub fn run_until(&mut self, code: &Program, kill: &AtomicBool) -> Report {
        debug!(
            "Running {} instructions with {} cells, {} tape of {} cells",
            code.len(),
            self.config.cell_width,
            self.config.bounds,
            self.config.tape_size
        );
        let start = Instant::now();
        let status = match self.config.cell_width {
            CellWidth::Eight => self.dispatch::<u8>(code, kill),
            CellWidth::Sixteen => self.dispatch::<u16>(code, kill),
            CellWidth::ThirtyTwo => self.dispatch::<i32>(code, kill),
        };
        let report = Report {
            status,
            elapsed: start.elapsed(),
        };
        self.terminal.write_message(&report.to_string());
        report
    }

    fn dispatch<C: Cell>(&mut self, code: &Program, kill: &AtomicBool) -> RunStatus {
        let mut machine = Machine::<C>::new(self.config.tape_size, self.config.bounds);
        let status = run_machine(&mut machine, code, &self.terminal, kill);
        self.tape = machine.tape().snapshot();
        self.pointer = machine.pointer();
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::compile, side_effects::BufferedTerminal};

    fn machine(src: &str, tape_size: usize, bounds: BoundsPolicy) -> (Machine<u8>, Result<Step, BoundsError>) {
        let code = compile(src).unwrap();
        let terminal = BufferedTerminal::with_input("");
        let mut m = Machine::new(tape_size, bounds);
        let mut last = Ok(Step::Halted);
        for _ in 0..1000 {
            last = m.step(&code, &terminal);
            if !matches!(last, Ok(Step::Continue) | Ok(Step::Breakpoint)) {
                break;
            }
        }
        (m, last)
    }

    #[test]
    fn test_step_reports_halt_without_running() {
        let (m, last) = machine("+>", 4, BoundsPolicy::Wrap);
        assert_eq!(last, Ok(Step::Halted));
        assert_eq!(m.pointer(), 1);
        assert_eq!(m.tape().get(0), 1);
        assert_eq!(m.instruction_index(), 2);
    }

    #[test]
    fn test_breakpoint_is_reported() {
        let code = compile("#").unwrap();
        let terminal = BufferedTerminal::new();
        let mut m = Machine::<u8>::new(1, BoundsPolicy::Wrap);
        assert_eq!(m.step(&code, &terminal), Ok(Step::Breakpoint));
        assert_eq!(m.step(&code, &terminal), Ok(Step::Halted));
    }

    #[test]
    fn test_fault_keeps_state() {
        let (m, last) = machine(">>>", 2, BoundsPolicy::Fatal);
        let e = last.unwrap_err();
        assert_eq!(e.fault, BoundsFault::Overflow);
        assert_eq!(e.pointer, 0);
        assert_eq!(m.pointer(), 0);
        assert_eq!(m.instruction_index(), 0);
    }

    #[test]
    fn test_reset() {
        let (mut m, _) = machine("+++>++", 4, BoundsPolicy::Wrap);
        m.reset();
        assert_eq!(m.pointer(), 0);
        assert!(m.tape().cells().iter().all(|c| *c == 0));
    }
}
