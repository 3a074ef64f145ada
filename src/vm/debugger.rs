//! # Debugger
//!
//! The debugger runs the same dispatch core as the [`Interpreter`](super::Interpreter)
//! on a worker thread, with a run state machine the controller drives:
//!
//! ```text
//!            start            pause
//!   Idle ───────────▶ Running ─────▶ Paused ──┐
//!    ▲                   ▲  ◀─────────  │     │ step (one instruction,
//!    │ compile error     │    resume    │ ◀───┘  then paused again)
//!    └── start ──        │              │
//!                        └──── any ─────┴──▶ Stopped   (stop, end of program, error)
//! ```
//!
//! Pausing, stepping and resuming only ever take effect between two
//! instructions: the worker checks the state at the top of each iteration,
//! and blocks on a condition variable while paused. The only other place
//! the worker blocks is the terminal's `read_char`, which
//! [`stop`](Debugger::stop) releases before joining the worker.
use super::{
    BoundsPolicy, Cell, CellWidth, Config, ControlError, Machine, Report, RunStatus, Step,
};
use crate::{
    ir::{compile_with, Op, Optimizations, Program},
    side_effects::Terminal,
};

use log::{info, trace, warn};
use serde_derive::{Deserialize, Serialize};
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// The debugger's configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DebugConfig {
    /// The machine to run. Its bounds policy is ignored: debugging is always
    /// [`BoundsPolicy::Fatal`].
    pub machine: Config,
    /// Which passes to compile with. Without run coalescing, every `>`, `<`,
    /// `+` and `-` in the source is its own step.
    pub optimizations: Optimizations,
    /// How long to sleep after each instruction.
    pub step_delay: Duration,
    /// How many debug sessions the caller is running at once, this one included.
    pub concurrent_sessions: usize,
    /// The extra sleep per instruction for each other concurrent session.
    pub session_delay: Duration,
    /// Whether breakpoint instructions pause the run.
    pub breakpoints: bool,
    /// Start in the paused state, before the first instruction.
    pub pause_on_start: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            machine: Config::default(),
            optimizations: Optimizations {
                fold_idioms: true,
                coalesce: false,
            },
            step_delay: Duration::ZERO,
            concurrent_sessions: 1,
            session_delay: Duration::from_millis(5),
            breakpoints: true,
            pause_on_start: false,
        }
    }
}

impl DebugConfig {
    /// The total sleep after each instruction.
    pub fn throttle(&self) -> Duration {
        let others = self.concurrent_sessions.saturating_sub(1) as u32;
        self.step_delay + self.session_delay * others
    }
}

/// The state of a debugging run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Nothing has been started, or the last start failed to compile.
    Idle,
    Running,
    Paused,
    Stopped,
}

/// The state shared between the controller and the worker.
#[derive(Debug)]
struct Control {
    state: RunState,
    /// The worker must exit at the next instruction boundary.
    kill: bool,
    /// The worker may run one instruction while paused.
    step: bool,
    /// The worker is blocked at an instruction boundary while paused.
    parked: bool,
    /// The worker is about to block on terminal input.
    awaiting_input: bool,
    breakpoints: bool,
    /// The number of instructions executed so far.
    executed: u64,
    instruction: usize,
    pointer: usize,
    /// The tape as of the last time the worker paused or stopped.
    tape: Vec<u32>,
    report: Option<Report>,
}

impl Control {
    fn new(state: RunState, breakpoints: bool, tape_size: usize) -> Self {
        Self {
            state,
            kill: false,
            step: false,
            parked: false,
            awaiting_input: false,
            breakpoints,
            executed: 0,
            instruction: 0,
            pointer: 0,
            tape: vec![0; tape_size.max(1)],
            report: None,
        }
    }
}

#[derive(Debug)]
struct Shared {
    control: Mutex<Control>,
    /// Wakes the worker: resume, step, stop.
    wake: Condvar,
    /// Wakes the controller: the worker executed, parked or finished.
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, condvar: &Condvar, guard: MutexGuard<'a, Control>) -> MutexGuard<'a, Control> {
        condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_timeout<'a>(
        &self,
        condvar: &Condvar,
        guard: MutexGuard<'a, Control>,
        timeout: Duration,
    ) -> MutexGuard<'a, Control> {
        condvar
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner)
            .0
    }
}

/// The worker side of a debugging run.
struct Worker<C> {
    shared: Arc<Shared>,
    code: Arc<Program>,
    terminal: Arc<dyn Terminal>,
    machine: Machine<C>,
    throttle: Duration,
}

impl<C: Cell> Worker<C> {
    fn run(mut self) {
        let start = Instant::now();
        let status = self.dispatch();
        let report = Report {
            status,
            elapsed: start.elapsed(),
        };
        info!("Debug run ended: {report}");
        self.terminal.write_message(&report.to_string());

        let mut ctl = self.shared.lock();
        self.publish(&mut ctl);
        ctl.state = RunState::Stopped;
        ctl.parked = false;
        ctl.awaiting_input = false;
        ctl.report = Some(report);
        self.shared.changed.notify_all();
    }

    fn publish(&self, ctl: &mut Control) {
        ctl.instruction = self.machine.instruction_index();
        ctl.pointer = self.machine.pointer();
        ctl.tape = self.machine.tape().snapshot();
    }

    /// Block at the instruction boundary until the worker may run the next
    /// instruction. Returns `false` if the run was stopped.
    fn wait_for_turn(&self) -> bool {
        let mut ctl = self.shared.lock();
        loop {
            if ctl.kill {
                return false;
            }
            match ctl.state {
                RunState::Paused if ctl.step => {
                    ctl.step = false;
                    break;
                }
                RunState::Paused => {
                    if !ctl.parked {
                        self.publish(&mut ctl);
                        ctl.parked = true;
                        self.shared.changed.notify_all();
                    }
                    ctl = self.shared.wait(&self.shared.wake, ctl);
                }
                _ => break,
            }
        }
        ctl.parked = false;
        ctl.awaiting_input = self.code.get(self.machine.instruction_index()) == Some(&Op::Input);
        if ctl.awaiting_input {
            self.shared.changed.notify_all();
        }
        true
    }

    fn dispatch(&mut self) -> RunStatus {
        loop {
            if !self.wait_for_turn() {
                return RunStatus::Stopped;
            }

            let i = self.machine.instruction_index();
            let result = self.machine.step(&self.code, &*self.terminal);

            let mut ctl = self.shared.lock();
            ctl.awaiting_input = false;
            match result {
                Ok(Step::Halted) => return RunStatus::Completed,
                Ok(Step::Breakpoint) if ctl.breakpoints => {
                    info!("Hit a breakpoint at instruction #{i}");
                    ctl.state = RunState::Paused;
                }
                Ok(_) => {}
                Err(e) => {
                    drop(ctl);
                    warn!("{e}");
                    self.terminal.write_error(&e.to_string());
                    return RunStatus::Failed(e);
                }
            }
            trace!(
                "Executed #{i}, now at instruction #{} with pointer {}",
                self.machine.instruction_index(),
                self.machine.pointer()
            );
            ctl.executed += 1;
            ctl.instruction = self.machine.instruction_index();
            ctl.pointer = self.machine.pointer();
            let paused = ctl.state == RunState::Paused;
            if paused {
                self.publish(&mut ctl);
            }
            self.shared.changed.notify_all();

            if !paused && !self.throttle.is_zero() {
                self.sleep(ctl);
            }
        }
    }

    /// Throttle the run, waking early if stopped or paused.
    fn sleep(&self, mut ctl: MutexGuard<'_, Control>) {
        let deadline = Instant::now() + self.throttle;
        while !ctl.kill && ctl.state == RunState::Running {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            ctl = self
                .shared
                .wait_timeout(&self.shared.wake, ctl, deadline - now);
        }
    }
}

/// An interactive debugging session.
///
/// ```
/// use bfvm::{side_effects::BufferedTerminal, vm::{DebugConfig, Debugger, RunState}};
/// use std::{sync::Arc, time::Duration};
///
/// let config = DebugConfig { pause_on_start: true, ..DebugConfig::default() };
/// let mut debugger = Debugger::new(config, Arc::new(BufferedTerminal::new()));
/// debugger.start(">>>").unwrap();
/// debugger.step().unwrap();
/// assert_eq!(debugger.data_pointer(), 1);
/// debugger.resume().unwrap();
/// assert_eq!(debugger.wait(Duration::from_secs(5)), RunState::Stopped);
/// ```
pub struct Debugger {
    config: DebugConfig,
    terminal: Arc<dyn Terminal>,
    shared: Arc<Shared>,
    code: Option<Arc<Program>>,
    worker: Option<JoinHandle<()>>,
}

impl Debugger {
    pub fn new(config: DebugConfig, terminal: Arc<dyn Terminal>) -> Self {
        let tape_size = config.machine.tape_size;
        Self {
            config,
            terminal,
            shared: Arc::new(Shared {
                control: Mutex::new(Control::new(RunState::Idle, config.breakpoints, tape_size)),
                wake: Condvar::new(),
                changed: Condvar::new(),
            }),
            code: None,
            worker: None,
        }
    }

    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    /// Compile the source, reset the tape and start the worker.
    ///
    /// A compile error is written to the terminal and returned, and the
    /// debugger is left idle.
    pub fn start(&mut self, src: &str) -> Result<(), ControlError> {
        if matches!(self.state(), RunState::Running | RunState::Paused) {
            return Err(ControlError::AlreadyRunning);
        }

        let code = match compile_with(src, self.config.optimizations) {
            Ok(code) => Arc::new(code),
            Err(e) => {
                self.terminal.write_error(&format!("Compile error: {e}"));
                self.shared.lock().state = RunState::Idle;
                return Err(e.into());
            }
        };

        // Reap the previous run, and undo the release its stop left behind.
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if self.code.is_some() {
            self.terminal.reset();
        }

        let initial = if self.config.pause_on_start {
            RunState::Paused
        } else {
            RunState::Running
        };
        *self.shared.lock() = Control::new(
            initial,
            self.config.breakpoints,
            self.config.machine.tape_size,
        );

        info!(
            "Starting a {} debug session over {} instructions",
            self.config.machine.cell_width,
            code.len()
        );
        self.code = Some(code.clone());
        let worker = match self.config.machine.cell_width {
            CellWidth::Eight => self.spawn::<u8>(code),
            CellWidth::Sixteen => self.spawn::<u16>(code),
            CellWidth::ThirtyTwo => self.spawn::<i32>(code),
        };
        match worker {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                self.shared.lock().state = RunState::Idle;
                Err(ControlError::Spawn(e.to_string()))
            }
        }
    }

    fn spawn<C: Cell>(&self, code: Arc<Program>) -> std::io::Result<JoinHandle<()>> {
        let worker = Worker {
            shared: self.shared.clone(),
            code,
            terminal: self.terminal.clone(),
            machine: Machine::<C>::new(self.config.machine.tape_size, BoundsPolicy::Fatal),
            throttle: self.config.throttle(),
        };
        thread::Builder::new()
            .name("debugger".to_string())
            .spawn(move || worker.run())
    }

    /// Pause at the next instruction boundary.
    pub fn pause(&self) -> Result<(), ControlError> {
        let mut ctl = self.shared.lock();
        if ctl.state != RunState::Running {
            return Err(ControlError::NotRunning);
        }
        ctl.state = RunState::Paused;
        self.shared.wake.notify_all();
        Ok(())
    }

    pub fn resume(&self) -> Result<(), ControlError> {
        let mut ctl = self.shared.lock();
        if ctl.state != RunState::Paused {
            return Err(ControlError::NotPaused);
        }
        ctl.state = RunState::Running;
        ctl.step = false;
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Run exactly one instruction, then pause again.
    ///
    /// Returns once that instruction has executed, so the position and tape
    /// queries reflect it. If the instruction is an input, this returns as
    /// soon as the worker blocks waiting for the terminal.
    pub fn step(&self) -> Result<(), ControlError> {
        let mut ctl = self.shared.lock();
        if ctl.state != RunState::Paused {
            return Err(ControlError::NotPaused);
        }
        // A pause only lands at the next boundary; let the current instruction finish first.
        while !ctl.parked && !ctl.awaiting_input && ctl.state == RunState::Paused {
            ctl = self.shared.wait(&self.shared.changed, ctl);
        }
        if ctl.state != RunState::Paused {
            return Err(ControlError::NotPaused);
        }
        // The worker is already inside an input instruction; finishing it is the step.
        if ctl.awaiting_input {
            return Ok(());
        }

        let target = ctl.executed + 1;
        ctl.step = true;
        self.shared.wake.notify_all();
        while ctl.executed < target && !ctl.awaiting_input && ctl.state != RunState::Stopped {
            ctl = self.shared.wait(&self.shared.changed, ctl);
        }
        Ok(())
    }

    /// Stop the run from any state and wait for the worker to exit.
    /// Returns the run's report, if a run was live.
    pub fn stop(&mut self) -> Option<Report> {
        {
            let mut ctl = self.shared.lock();
            ctl.kill = true;
            if self.worker.is_none() {
                ctl.state = RunState::Stopped;
                return ctl.report;
            }
            self.shared.wake.notify_all();
        }
        self.terminal.release();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("The debugger thread panicked");
            }
        }

        let mut ctl = self.shared.lock();
        ctl.state = RunState::Stopped;
        info!("Debug session stopped");
        ctl.report
    }

    /// Wait until the run is parked at an instruction boundary or has ended,
    /// or the timeout passes. Returns the state at that point.
    pub fn wait(&self, timeout: Duration) -> RunState {
        let deadline = Instant::now() + timeout;
        let mut ctl = self.shared.lock();
        loop {
            let settled = match ctl.state {
                RunState::Idle | RunState::Stopped => true,
                RunState::Paused => ctl.parked,
                RunState::Running => false,
            };
            let now = Instant::now();
            if settled || now >= deadline {
                return ctl.state;
            }
            ctl = self
                .shared
                .wait_timeout(&self.shared.changed, ctl, deadline - now);
        }
    }

    /// Turn pausing on breakpoint instructions on or off, even mid-run.
    pub fn set_breakpoints(&mut self, enabled: bool) {
        self.config.breakpoints = enabled;
        self.shared.lock().breakpoints = enabled;
    }

    pub fn breakpoints(&self) -> bool {
        self.shared.lock().breakpoints
    }

    pub fn state(&self) -> RunState {
        self.shared.lock().state
    }

    pub fn is_alive(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// The index of the next instruction to run.
    pub fn instruction_index(&self) -> usize {
        self.shared.lock().instruction
    }

    /// The next instruction to run, if any.
    pub fn current_op(&self) -> Option<Op> {
        let i = self.instruction_index();
        self.code.as_ref()?.get(i).copied()
    }

    pub fn data_pointer(&self) -> usize {
        self.shared.lock().pointer
    }

    /// The tape as of the last pause or the end of the run.
    pub fn tape_snapshot(&self) -> Vec<u32> {
        self.shared.lock().tape.clone()
    }

    /// The program being debugged.
    pub fn program(&self) -> Option<&Program> {
        self.code.as_deref()
    }

    /// The report of the last run, once it has ended.
    pub fn report(&self) -> Option<Report> {
        self.shared.lock().report
    }
}

impl Drop for Debugger {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}
