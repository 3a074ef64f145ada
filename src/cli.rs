use bfvm::{
    ir::{compile_with, CompileError, Optimizations, Program},
    side_effects::{BufferedTerminal, StandardTerminal, Tag},
    targets::{self, Target, TranslateError, TranslationJob},
    vm::*,
    DEFAULT_TAPE_SIZE,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFiles,
    term::{
        emit,
        termcolor::{ColorChoice, StandardStream},
    },
};
use log::{error, info, LevelFilter};
use std::{
    fmt,
    fs::{read_to_string, File},
    io::{stdin, stdout, BufRead, BufWriter, Write},
    path::Path,
    sync::Arc,
    thread,
    time::Duration,
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Width {
    #[value(name = "8")]
    Eight,
    #[value(name = "16")]
    Sixteen,
    #[value(name = "32")]
    ThirtyTwo,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Bounds {
    Wrap,
    Fatal,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TargetType {
    C,
    Rust,
    Python,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// The level of engine logging to print to stderr.
    #[arg(short, long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,
}

#[derive(Args, Debug, Clone)]
struct MachineArgs {
    /// The source file to compile.
    input: String,

    /// The width of each cell in bits.
    #[arg(short, long, value_enum, default_value = "8")]
    width: Width,

    /// The number of cells on the tape.
    #[arg(long, default_value_t = DEFAULT_TAPE_SIZE)]
    tape_size: usize,

    /// What happens when the data pointer leaves the tape.
    #[arg(short, long, value_enum, default_value = "wrap")]
    bounds: Bounds,

    /// Compile one instruction per command, without folding or coalescing.
    #[arg(long)]
    no_optimize: bool,
}

impl MachineArgs {
    fn config(&self) -> Config {
        Config {
            cell_width: match self.width {
                Width::Eight => CellWidth::Eight,
                Width::Sixteen => CellWidth::Sixteen,
                Width::ThirtyTwo => CellWidth::ThirtyTwo,
            },
            tape_size: self.tape_size,
            bounds: match self.bounds {
                Bounds::Wrap => BoundsPolicy::Wrap,
                Bounds::Fatal => BoundsPolicy::Fatal,
            },
        }
    }

    fn optimizations(&self) -> Optimizations {
        if self.no_optimize {
            Optimizations::none()
        } else {
            Optimizations::all()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a program to completion over stdin and stdout.
    Run(MachineArgs),
    /// Debug a program, reading debugger commands from stdin.
    /// The bounds policy is always fatal while debugging.
    Debug {
        #[command(flatten)]
        machine: MachineArgs,

        /// Milliseconds to sleep after each instruction.
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,

        /// Ignore breakpoints until `b on`.
        #[arg(long)]
        no_breakpoints: bool,

        /// Pause before the first instruction.
        #[arg(long)]
        pause: bool,
    },
    /// Translate a program to another language.
    Build {
        #[command(flatten)]
        machine: MachineArgs,

        /// The language to translate to.
        #[arg(short, long, value_enum, default_value = "c")]
        target: TargetType,

        /// The file to write. Defaults to the input's name with the target's extension.
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Print the compiled instruction listing.
    Ir(MachineArgs),
}

enum Error {
    IO(std::io::Error),
    Compile(CompileError),
    Control(ControlError),
    Bounds(BoundsError),
    Translate(TranslateError),
    WorkerPanicked,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IO(e) => write!(f, "IO error: {e}"),
            Error::Compile(e) => write!(f, "Compile error: {e}"),
            Error::Control(e) => write!(f, "Control error: {e}"),
            Error::Bounds(e) => write!(f, "{e}"),
            Error::Translate(e) => write!(f, "Translation error: {e}"),
            Error::WorkerPanicked => write!(f, "The worker thread panicked"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IO(e)
    }
}

fn read_file(name: &str) -> Result<String, Error> {
    read_to_string(name).map_err(Error::IO)
}

/// Compile a source file, rendering any error as a diagnostic on stderr.
fn compile_file(path: &str, src: &str, opts: Optimizations) -> Result<Program, Error> {
    compile_with(src, opts).map_err(|e| {
        report_compile_error(path, src, &e);
        Error::Compile(e)
    })
}

fn report_compile_error(path: &str, src: &str, e: &CompileError) {
    let mut files = SimpleFiles::new();
    let file_id = files.add(path, src);

    // The offset counts characters from 1; the label wants a byte range.
    let start = src
        .char_indices()
        .nth(e.offset().saturating_sub(1))
        .map_or(src.len(), |(byte, _)| byte);
    let label = match e {
        CompileError::UnmatchedOpen { .. } => "this loop is never closed",
        CompileError::UnmatchedClose { .. } => "no loop is open here",
    };
    let diagnostic = Diagnostic::error()
        .with_message(format!("unmatched '{}'", e.bracket()))
        .with_labels(vec![Label::primary(
            file_id,
            start..start + e.bracket().len_utf8(),
        )
        .with_message(label)]);

    let writer = StandardStream::stderr(ColorChoice::Auto);
    let config = codespan_reporting::term::Config::default();
    let mut lock = writer.lock();
    if let Err(err) = emit(&mut lock, &config, &files, &diagnostic) {
        error!("Could not render the diagnostic: {err}");
    }
}

fn run(args: MachineArgs) -> Result<(), Error> {
    let src = read_file(&args.input)?;
    let program = compile_file(&args.input, &src, args.optimizations())?;

    let mut session = Session::new(args.config(), Arc::new(StandardTerminal::new()));
    session
        .start_program(Arc::new(program))
        .map_err(Error::Control)?;
    match session.join().map(|report| report.status) {
        Some(RunStatus::Failed(e)) => Err(Error::Bounds(e)),
        Some(_) => Ok(()),
        None => Err(Error::WorkerPanicked),
    }
}

const DEBUG_HELP: &str = "\
commands:
  s             step one instruction
  c             continue
  p             pause
  b on|off      enable or disable breakpoints
  t             show the tape around the data pointer
  w             show the current instruction
  i TEXT        give a line of input to the program
  e             end the program's input
  q             quit";

/// Print everything the program and the engine wrote since the last call.
fn show_output(terminal: &BufferedTerminal) {
    for segment in terminal.drain() {
        match segment.tag {
            Tag::Output => print!("{}", segment.text),
            Tag::Message => eprintln!("{}", segment.text),
            Tag::Error => eprintln!("\x1b[31m{}\x1b[0m", segment.text),
        }
    }
    let _ = stdout().flush();
}

fn show_tape(debugger: &Debugger) {
    let tape = debugger.tape_snapshot();
    let pointer = debugger.data_pointer();
    let start = pointer.saturating_sub(8);
    let end = (pointer + 9).min(tape.len());
    for (i, cell) in tape.iter().enumerate().take(end).skip(start) {
        let marker = if i == pointer { ">" } else { " " };
        println!("{marker} [{i:>5}] {cell}");
    }
}

fn show_position(debugger: &Debugger) {
    let op = debugger
        .current_op()
        .map_or("(end of program)".to_string(), |op| op.to_string());
    println!(
        "{:?} at #{}: {op}, data pointer {}",
        debugger.state(),
        debugger.instruction_index(),
        debugger.data_pointer()
    );
}

fn debug(machine: MachineArgs, delay_ms: u64, no_breakpoints: bool, pause: bool) -> Result<(), Error> {
    let src = read_file(&machine.input)?;
    // Render a compile error before the debugger reports it tersely.
    compile_file(&machine.input, &src, machine.optimizations())?;

    let mut config = DebugConfig {
        machine: machine.config(),
        step_delay: Duration::from_millis(delay_ms),
        breakpoints: !no_breakpoints,
        pause_on_start: pause,
        ..DebugConfig::default()
    };
    if machine.no_optimize {
        config.optimizations = Optimizations::none();
    }

    let terminal = Arc::new(BufferedTerminal::new());
    let mut debugger = Debugger::new(config, terminal.clone());
    debugger.start(&src).map_err(Error::Control)?;
    eprintln!("{DEBUG_HELP}");

    for line in stdin().lock().lines() {
        let line = line?;
        let (command, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
        let result = match command {
            "" => Ok(()),
            "s" | "step" => debugger.step(),
            "c" | "continue" => debugger.resume(),
            "p" | "pause" => debugger.pause(),
            "b" | "breakpoints" => {
                debugger.set_breakpoints(rest.trim() != "off");
                Ok(())
            }
            "t" | "tape" => {
                show_tape(&debugger);
                Ok(())
            }
            "w" | "where" => {
                show_position(&debugger);
                Ok(())
            }
            "i" | "input" => {
                terminal.push_input(&format!("{rest}\n"));
                Ok(())
            }
            "e" | "eof" => {
                terminal.close_input();
                Ok(())
            }
            "q" | "quit" => break,
            _ => {
                eprintln!("{DEBUG_HELP}");
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("{e}");
        }

        debugger.wait(Duration::from_millis(100));
        show_output(&terminal);
        if debugger.state() == RunState::Paused {
            show_position(&debugger);
        }
    }

    debugger.stop();
    show_output(&terminal);
    Ok(())
}

fn build(machine: MachineArgs, target_type: TargetType, output: Option<String>) -> Result<(), Error> {
    let src = read_file(&machine.input)?;
    let program = compile_file(&machine.input, &src, machine.optimizations())?;

    let target: Box<dyn Target + Send> = match target_type {
        TargetType::C => Box::new(targets::C),
        TargetType::Rust => Box::new(targets::Rust),
        TargetType::Python => Box::new(targets::Python),
    };
    let output = output.unwrap_or_else(|| {
        Path::new(&machine.input)
            .with_extension(target.extension())
            .to_string_lossy()
            .into_owned()
    });

    let file = BufWriter::new(File::create(&output)?);
    let job = TranslationJob::spawn(Arc::new(program), target, machine.config(), file)
        .map_err(Error::Translate)?;
    while job.is_alive() {
        info!("{:.0}% translated", job.progress() * 100.0);
        thread::sleep(Duration::from_millis(50));
    }
    job.join().map_err(Error::Translate)?;
    info!("Wrote {output}");
    Ok(())
}

fn main() -> Result<(), Error> {
    let args = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    builder.format_timestamp(None);
    builder.filter(None, args.log_level.into());
    builder.init();

    match args.command {
        Command::Run(machine) => run(machine),
        Command::Debug {
            machine,
            delay_ms,
            no_breakpoints,
            pause,
        } => debug(machine, delay_ms, no_breakpoints, pause),
        Command::Build {
            machine,
            target,
            output,
        } => build(machine, target, output),
        Command::Ir(machine) => {
            let src = read_file(&machine.input)?;
            print!("{}", compile_file(&machine.input, &src, machine.optimizations())?);
            Ok(())
        }
    }
}
