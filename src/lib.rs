//! # bfvm
//!
//! This crate implements a small toolchain for the eight-command tape
//! language: one data pointer, a tape of cells, and the commands
//! `> < + - . , [ ]`, plus a `#` breakpoint marker for the debugger.
//!
//! ## Index
//!
//! 1. [The Intermediate Representation and its compiler](./ir/index.html)
//! 2. [The Virtual Machine: interpreter, sessions and debugger](./vm/index.html)
//! 3. [The Terminal the machine talks to](./side_effects/index.html)
//! 4. [Target Backends](./targets/index.html)
//!
//! ## Pipeline
//!
//! Source text is compiled once into a [`Program`](ir::Program): a dense
//! array of [`Op`](ir::Op)s with every loop bracket already paired with its
//! partner, runs of `+`/`-` and `>`/`<` folded into single instructions, and
//! the `[-]`, `[<]`, `[>]` idioms replaced with direct instructions.
//!
//! Every backend consumes that same program:
//!
//! |            | Runs on                | Cell widths   | Bounds      |
//! |------------|------------------------|---------------|-------------|
//! | Interpreter| caller or a [`Session`](vm::Session) thread | 8, 16, 32 | Wrap or Fatal |
//! | Debugger   | a [`Debugger`](vm::Debugger) thread | 8, 16, 32 | always Fatal |
//! | Translator | a [`TranslationJob`](targets::TranslationJob) thread | 8, 16, 32 | Wrap or Fatal |
//!
//! The machine never touches stdin or stdout directly. All character I/O
//! goes through a [`Terminal`](side_effects::Terminal), which is what lets a
//! controlling thread stop a run that is blocked waiting for input.
pub mod ir;
pub mod side_effects;
pub mod targets;
pub mod vm;

/// The character which marks a breakpoint in source text.
pub const BREAKPOINT: char = '#';

/// The number of cells on the tape unless configured otherwise.
pub const DEFAULT_TAPE_SIZE: usize = 30_000;
