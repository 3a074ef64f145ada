//! A background run of the plain interpreter.
use super::{Config, ControlError, Interpreter, Report};
use crate::{
    ir::{compile, Program},
    side_effects::Terminal,
};

use log::{info, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

/// Runs the [`Interpreter`] on a worker thread.
///
/// The controlling thread only starts, queries and stops the run; the tape
/// and the program's I/O belong to the worker. [`stop`](Session::stop)
/// releases the terminal, so a worker blocked on input wakes up, and returns
/// only after the worker has exited.
pub struct Session {
    config: Config,
    terminal: Arc<dyn Terminal>,
    kill: Arc<AtomicBool>,
    worker: Option<JoinHandle<Report>>,
    /// Whether a run has been started before, and so may have released the terminal.
    used: bool,
}

impl Session {
    pub fn new(config: Config, terminal: Arc<dyn Terminal>) -> Self {
        Self {
            config,
            terminal,
            kill: Arc::new(AtomicBool::new(false)),
            worker: None,
            used: false,
        }
    }

    /// Compile the source and start running it.
    ///
    /// A compile error is written to the terminal and returned; the session
    /// stays idle.
    pub fn start(&mut self, src: &str) -> Result<(), ControlError> {
        if self.is_alive() {
            return Err(ControlError::AlreadyRunning);
        }
        match compile(src) {
            Ok(code) => self.start_program(Arc::new(code)),
            Err(e) => {
                self.terminal.write_error(&format!("Compile error: {e}"));
                Err(e.into())
            }
        }
    }

    /// Start running an already compiled program.
    pub fn start_program(&mut self, code: Arc<Program>) -> Result<(), ControlError> {
        if self.is_alive() {
            return Err(ControlError::AlreadyRunning);
        }
        // Reap a previous run, and undo the release its stop left behind.
        self.join();
        if self.used {
            self.terminal.reset();
        }
        self.used = true;

        self.kill = Arc::new(AtomicBool::new(false));
        let kill = self.kill.clone();
        let terminal = self.terminal.clone();
        let config = self.config;
        info!("Starting a {} session", config.cell_width);
        let worker = thread::Builder::new()
            .name("interpreter".to_string())
            .spawn(move || Interpreter::with_config(terminal, config).run_until(&code, &kill))
            .map_err(|e| ControlError::Spawn(e.to_string()))?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Is the worker thread still running?
    pub fn is_alive(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Stop the run and wait for the worker to exit.
    /// Returns the run's report, if there was a run to stop.
    pub fn stop(&mut self) -> Option<Report> {
        self.worker.as_ref()?;
        self.kill.store(true, Ordering::Release);
        self.terminal.release();
        let report = self.join();
        info!("Session stopped");
        report
    }

    /// Wait for the run to end by itself.
    pub fn join(&mut self) -> Option<Report> {
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(report) => Some(report),
            Err(_) => {
                warn!("The interpreter thread panicked");
                None
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
