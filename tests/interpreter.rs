use bfvm::{
    ir::{compile, compile_with, Optimizations},
    side_effects::{BufferedTerminal, Terminal},
    vm::*,
};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

const HELLO_WORLD: &str = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";

fn config(width: CellWidth, tape_size: usize, bounds: BoundsPolicy) -> Config {
    Config {
        cell_width: width,
        tape_size,
        bounds,
    }
}

/// Run a program and return the interpreter, for its terminal and final tape.
fn run_with(
    src: &str,
    input: &str,
    config: Config,
    opts: Optimizations,
) -> (Report, Interpreter<BufferedTerminal>) {
    let program = compile_with(src, opts).unwrap();
    let mut interpreter = Interpreter::with_config(BufferedTerminal::with_input(input), config);
    let report = interpreter.run(&program);
    (report, interpreter)
}

fn run(src: &str, input: &str, config: Config) -> (Report, Interpreter<BufferedTerminal>) {
    run_with(src, input, config, Optimizations::all())
}

#[test]
fn test_prints_at_sign() {
    let (report, interpreter) = run(
        "++++++++[>++++++++<-]>.",
        "",
        config(CellWidth::Eight, 2, BoundsPolicy::Wrap),
    );
    assert!(report.is_completed());
    assert_eq!(interpreter.terminal().text(), "@");
    assert_eq!(interpreter.tape(), &[0, 64]);
    assert_eq!(interpreter.pointer(), 1);
}

#[test]
fn test_hello_world() {
    let (report, interpreter) = run(HELLO_WORLD, "", Config::default());
    assert!(report.is_completed());
    assert_eq!(interpreter.terminal().text(), "Hello World!\n");
}

#[test]
fn test_status_line_is_written_once() {
    let (_, interpreter) = run("+.", "", Config::default());
    let messages = interpreter.terminal().messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Program completed in"));
    assert!(interpreter.terminal().errors().is_empty());
}

#[test]
fn test_optimized_matches_naive() {
    let programs = [
        (HELLO_WORLD, ""),
        ("+++++[>+++++<-]>[-]<,[.,]", "echo"),
        ("+++,.>--,.", "ab"),
        ("+>+>+>>+<<<<[>]+.", ""),
        ("-[<]+", ""),
        (">>+++[-<+>]<[<]#>>>-[>]", ""),
        ("++[>+++[>++<-]<-]>>[<+>-]", ""),
    ];
    for width in [CellWidth::Eight, CellWidth::Sixteen, CellWidth::ThirtyTwo] {
        for (src, input) in programs {
            let cfg = config(width, 64, BoundsPolicy::Wrap);
            let (fast_report, fast) = run_with(src, input, cfg, Optimizations::all());
            let (slow_report, slow) = run_with(src, input, cfg, Optimizations::none());
            assert!(fast_report.is_completed(), "{src} ({width})");
            assert!(slow_report.is_completed(), "{src} ({width})");
            assert_eq!(fast.terminal().text(), slow.terminal().text(), "{src} ({width})");
            assert_eq!(fast.tape(), slow.tape(), "{src} ({width})");
            assert_eq!(fast.pointer(), slow.pointer(), "{src} ({width})");
        }
    }
}

#[test]
fn test_eight_bit_wraps() {
    let (_, up) = run(&"+".repeat(256), "", config(CellWidth::Eight, 1, BoundsPolicy::Wrap));
    assert_eq!(up.tape(), &[0]);
    let (_, down) = run("-", "", config(CellWidth::Eight, 1, BoundsPolicy::Wrap));
    assert_eq!(down.tape(), &[255]);
}

#[test]
fn test_sixteen_bit_wraps() {
    let (_, up) = run(&"+".repeat(256), "", config(CellWidth::Sixteen, 1, BoundsPolicy::Wrap));
    assert_eq!(up.tape(), &[256]);
    let (_, down) = run("-", "", config(CellWidth::Sixteen, 1, BoundsPolicy::Wrap));
    assert_eq!(down.tape(), &[65535]);
    let (_, around) = run("-+", "", config(CellWidth::Sixteen, 1, BoundsPolicy::Wrap));
    assert_eq!(around.tape(), &[0]);
}

#[test]
fn test_thirty_two_bit_does_not_wrap() {
    let (_, up) = run(&"+".repeat(70000), "", config(CellWidth::ThirtyTwo, 1, BoundsPolicy::Wrap));
    assert_eq!(up.tape(), &[70000]);
    // Negative cells are still nonzero, so the loop runs until the cell is back at zero.
    let (report, down) = run("-[+]", "", config(CellWidth::ThirtyTwo, 1, BoundsPolicy::Wrap));
    assert!(report.is_completed());
    assert_eq!(down.tape(), &[0]);
    let (_, negative) = run("--", "", config(CellWidth::ThirtyTwo, 1, BoundsPolicy::Wrap));
    assert_eq!(negative.tape(), &[(-2i32) as u32]);
}

#[test]
fn test_wrap_keeps_pointer_on_tape() {
    let cfg = config(CellWidth::Eight, 10, BoundsPolicy::Wrap);
    let (_, left) = run("<", "", cfg);
    assert_eq!(left.pointer(), 9);
    let (_, right) = run(&">".repeat(25), "", cfg);
    assert_eq!(right.pointer(), 5);
    let (_, far_left) = run(&"<".repeat(103), "", cfg);
    assert_eq!(far_left.pointer(), 7);
}

#[test]
fn test_fatal_bounds_halt_with_one_message() {
    for src in ["<", ">>>>>>>>>>>", "+[>+]"] {
        let (report, interpreter) = run(src, "", config(CellWidth::Eight, 10, BoundsPolicy::Fatal));
        let RunStatus::Failed(e) = report.status else {
            panic!("{src} should have failed, got {report:?}");
        };
        assert_eq!(interpreter.terminal().errors(), vec![e.to_string()]);
        let messages = interpreter.terminal().messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Program terminated by an error"));
    }
}

#[test]
fn test_fatal_error_names_the_instruction() {
    let (report, _) = run("+>><<<", "", config(CellWidth::Eight, 10, BoundsPolicy::Fatal));
    // `+` is instruction 0; the moves coalesce into instruction 1.
    assert_eq!(
        report.status,
        RunStatus::Failed(BoundsError {
            fault: BoundsFault::Underflow,
            instruction: 1,
            pointer: 0,
            tape_size: 10,
        })
    );
}

#[test]
fn test_scan_without_zero_cell_fails() {
    // Every cell is nonzero, so the scan has nowhere to stop.
    let (report, interpreter) = run("+>+>+>+[>]", "", config(CellWidth::Eight, 4, BoundsPolicy::Wrap));
    assert!(matches!(
        report.status,
        RunStatus::Failed(BoundsError {
            fault: BoundsFault::NoZeroCell,
            ..
        })
    ));
    assert_eq!(interpreter.terminal().errors().len(), 1);
}

#[test]
fn test_scans_wrap_around() {
    let cfg = config(CellWidth::Eight, 5, BoundsPolicy::Wrap);
    // Only cell 0 is zero; scanning right from the last cell wraps to it.
    let (_, right) = run(">+>+>+>+[>]", "", cfg);
    assert_eq!(right.pointer(), 0);
    // Scanning left from cell 1 wraps to the nearest zero from the far end.
    let (_, left) = run("+>+[<]", "", cfg);
    assert_eq!(left.pointer(), 4);
}

#[test]
fn test_input_and_end_of_stream() {
    let (_, echo) = run(",.,.,", "hi", Config::default());
    assert_eq!(echo.terminal().text(), "hi");
    assert_eq!(echo.tape()[0], 0);

    let (_, eof) = run("+++,", "", Config::default());
    assert!(eof.tape().iter().all(|cell| *cell == 0));
}

#[test]
fn test_input_is_truncated_to_the_cell() {
    let (_, narrow) = run(",", "☺", config(CellWidth::Eight, 1, BoundsPolicy::Wrap));
    assert_eq!(narrow.tape(), &[0x3A]);
    let (_, wide) = run(",", "☺", config(CellWidth::Sixteen, 1, BoundsPolicy::Wrap));
    assert_eq!(wide.tape(), &[0x263A]);
    let (_, emoji) = run(",.", "😀", config(CellWidth::ThirtyTwo, 1, BoundsPolicy::Wrap));
    assert_eq!(emoji.terminal().text(), "😀");
}

#[test]
fn test_invalid_code_points_print_a_replacement() {
    let surrogate = "+".repeat(0xD800) + ".";
    let (_, interpreter) = run(&surrogate, "", config(CellWidth::ThirtyTwo, 1, BoundsPolicy::Wrap));
    assert_eq!(interpreter.terminal().text(), "\u{FFFD}");

    let (_, negative) = run("-.", "", config(CellWidth::ThirtyTwo, 1, BoundsPolicy::Wrap));
    assert_eq!(negative.terminal().text(), "\u{FFFD}");
}

#[test]
fn test_breakpoints_are_ignored() {
    let (report, interpreter) = run("+#+#.", "", config(CellWidth::Eight, 1, BoundsPolicy::Wrap));
    assert!(report.is_completed());
    assert_eq!(interpreter.tape(), &[2]);
}

#[test]
fn test_session_runs_in_the_background() {
    let terminal = Arc::new(BufferedTerminal::with_input(""));
    let mut session = Session::new(Config::default(), terminal.clone());
    session.start("++++++++[>++++++++<-]>+.").unwrap();
    let report = session.join().unwrap();
    assert!(report.is_completed());
    assert_eq!(terminal.text(), "A");
    assert!(!session.is_alive());
}

#[test]
fn test_session_rejects_bad_source() {
    let terminal = Arc::new(BufferedTerminal::new());
    let mut session = Session::new(Config::default(), terminal.clone());
    assert_eq!(
        session.start("+]"),
        Err(ControlError::Compile(
            bfvm::ir::CompileError::UnmatchedClose { offset: 2 }
        ))
    );
    assert!(!session.is_alive());
    assert_eq!(terminal.errors().len(), 1);
    assert!(terminal.errors()[0].starts_with("Compile error"));
}

#[test]
fn test_session_stop_releases_blocked_input() {
    let terminal = Arc::new(BufferedTerminal::new());
    let mut session = Session::new(Config::default(), terminal.clone());
    session.start(",[.,]").unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(session.is_alive());

    let start = Instant::now();
    let report = session.stop().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!session.is_alive());
    // The released read yields 0, so the program falls out of its loop.
    assert!(matches!(report.status, RunStatus::Stopped | RunStatus::Completed));
}

#[test]
fn test_session_stops_a_spinning_program() {
    let terminal = Arc::new(BufferedTerminal::new());
    let mut session = Session::new(Config::default(), terminal.clone());
    session.start("+[]").unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(session.start("+"), Err(ControlError::AlreadyRunning));
    let report = session.stop().unwrap();
    assert_eq!(report.status, RunStatus::Stopped);
    assert!(terminal.messages()[0].starts_with("Program stopped by user"));

    // The session can be reused after a stop.
    session.start("+.").unwrap();
    assert!(session.join().unwrap().is_completed());
}

#[test]
fn test_interpreter_accepts_shared_terminals() {
    let terminal = Arc::new(BufferedTerminal::with_input("x"));
    let program = compile(",.").unwrap();
    let mut interpreter = Interpreter::new(terminal.clone());
    interpreter.run(&program);
    assert_eq!(terminal.text(), "x");
    terminal.clear();
    assert!(terminal.output().is_empty());
}
