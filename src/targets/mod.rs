//! # Targets Module
//!
//! This module contains the code dealing with translating a compiled
//! [`Program`] into equivalent source code in another language.
//!
//! ## Current Structure
//!
//! Each language implements [`Target`]: a prologue which declares the tape
//! and the helper routines, one fragment per instruction, and an epilogue.
//! The generated program keeps the machine's configuration: the cell width
//! decides the cell type and its overflow, the tape size is baked in, and the
//! bounds policy decides whether pointer moves wrap or exit with an error.
//!
//! | Target     | Cell types                    | Zero scans                       |
//! |------------|-------------------------------|----------------------------------|
//! | [`C`]      | `uint8_t`, `uint16_t`, `int32_t` | `memchr` for 8-bit, loops otherwise |
//! | [`Rust`]   | `u8`, `u16`, `i32`            | `position` / `rposition`         |
//! | [`Python`] | masked `int`                  | `list.index` / loops             |
//!
//! [`translate`] drives a target over a program on the calling thread, and
//! [`TranslationJob`] does the same on a worker thread which can be stopped.
mod c;
pub use c::*;

mod rust;
pub use rust::*;

mod python;
pub use python::*;

use crate::{
    ir::{Op, Program},
    vm::Config,
};

use core::fmt;
use log::{debug, info};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

/// How many instructions are translated between checks of the cancel flag.
pub const BATCH_SIZE: usize = 256;

/// Implement a translator for the given language.
pub trait Target {
    /// The name of the language.
    fn name(&self) -> &'static str;

    /// The usual file extension for the language, without the dot.
    fn extension(&self) -> &'static str;

    /// The indentation added for each level of loop nesting.
    fn indentation(&self) -> &'static str {
        "    "
    }

    /// Everything before the first instruction, up to and including the
    /// opening of the entry point.
    fn prologue(&self, config: &Config) -> String;

    /// Everything after the last instruction.
    fn epilogue(&self, config: &Config) -> String;

    /// The code for one instruction, without indentation. A fragment may span
    /// several lines; each is indented to the current nesting level. Empty
    /// lines are dropped.
    fn op(&self, op: &Op, config: &Config) -> String;
}

/// An error which aborted a translation.
#[derive(Debug)]
pub enum TranslateError {
    /// Writing the output failed. Whatever was already written is left as is.
    Io(io::Error),
    /// The translation was stopped before it finished.
    Cancelled,
}

impl From<io::Error> for TranslateError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "could not write the translated program: {e}"),
            Self::Cancelled => write!(f, "the translation was cancelled"),
        }
    }
}

impl std::error::Error for TranslateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Cancelled => None,
        }
    }
}

/// Translate a program, writing the generated source to `out`.
///
/// `cancel` is checked before every batch of [`BATCH_SIZE`] instructions,
/// and `progress` is called after every batch with the fraction done.
pub fn translate(
    program: &Program,
    target: &dyn Target,
    config: &Config,
    out: &mut dyn Write,
    cancel: &AtomicBool,
    progress: &mut dyn FnMut(f32),
) -> Result<(), TranslateError> {
    info!(
        "Translating {} instructions to {} with {} cells",
        program.len(),
        target.name(),
        config.cell_width
    );
    out.write_all(target.prologue(config).as_bytes())?;

    let tab = target.indentation();
    let total = program.len() as f32;
    let mut indent = 1;
    let mut done = 0;
    for batch in program.ops().chunks(BATCH_SIZE) {
        if cancel.load(Ordering::Acquire) {
            info!("Translation cancelled after {done} instructions");
            return Err(TranslateError::Cancelled);
        }
        for op in batch {
            if let Op::LoopEnd(_) = op {
                indent -= 1;
            }
            for line in target.op(op, config).lines().filter(|l| !l.is_empty()) {
                writeln!(out, "{}{line}", tab.repeat(indent))?;
            }
            if let Op::LoopStart(_) = op {
                indent += 1;
            }
        }
        done += batch.len();
        debug!("Translated {done} of {} instructions", program.len());
        progress(done as f32 / total);
    }

    out.write_all(target.epilogue(config).as_bytes())?;
    out.flush()?;
    progress(1.0);
    Ok(())
}

/// A translation running on a worker thread.
///
/// The job owns the output until it ends; [`join`](TranslationJob::join)
/// hands it back.
pub struct TranslationJob<W> {
    cancel: Arc<AtomicBool>,
    /// The fraction done, as the bits of an `f32`.
    progress: Arc<AtomicU32>,
    worker: Option<JoinHandle<Result<W, TranslateError>>>,
}

impl<W: Write + Send + 'static> TranslationJob<W> {
    pub fn spawn(
        program: Arc<Program>,
        target: Box<dyn Target + Send>,
        config: Config,
        mut out: W,
    ) -> Result<Self, TranslateError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let progress = Arc::new(AtomicU32::new(0f32.to_bits()));

        let (job_cancel, job_progress) = (cancel.clone(), progress.clone());
        let worker = thread::Builder::new()
            .name("translator".to_string())
            .spawn(move || {
                let mut report =
                    |fraction: f32| job_progress.store(fraction.to_bits(), Ordering::Release);
                translate(&program, &*target, &config, &mut out, &job_cancel, &mut report)?;
                Ok(out)
            })?;

        Ok(Self {
            cancel,
            progress,
            worker: Some(worker),
        })
    }

    /// The fraction of the program translated so far, from 0 to 1.
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Acquire))
    }

    pub fn is_alive(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Cancel the translation and wait for the worker to exit.
    pub fn stop(mut self) -> Result<W, TranslateError> {
        self.cancel.store(true, Ordering::Release);
        self.finish()
    }

    /// Wait for the translation to end by itself.
    pub fn join(mut self) -> Result<W, TranslateError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<W, TranslateError> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("the translator thread panicked").into())),
            None => Err(TranslateError::Cancelled),
        }
    }
}

impl<W> Drop for TranslationJob<W> {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// The delta of a data instruction reduced to the range of an unsigned cell.
fn unsigned_delta(delta: i32, bits: u32) -> i64 {
    (delta as i64).rem_euclid(1 << bits)
}
