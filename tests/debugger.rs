use bfvm::{
    ir::{CompileError, Op, Optimizations},
    side_effects::BufferedTerminal,
    vm::*,
};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn debugger(config: DebugConfig) -> (Debugger, Arc<BufferedTerminal>) {
    let terminal = Arc::new(BufferedTerminal::new());
    (Debugger::new(config, terminal.clone()), terminal)
}

fn paused() -> DebugConfig {
    DebugConfig {
        pause_on_start: true,
        ..DebugConfig::default()
    }
}

#[test]
fn test_steps_one_command_at_a_time() {
    let (mut debugger, _) = debugger(paused());
    debugger.start(">>>").unwrap();
    assert_eq!(debugger.state(), RunState::Paused);

    for expected in 1..=3 {
        debugger.step().unwrap();
        assert_eq!(debugger.data_pointer(), expected);
        assert_eq!(debugger.instruction_index(), expected);
        assert_eq!(debugger.state(), RunState::Paused);
    }

    // Stepping never lets the program carry on by itself.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(debugger.state(), RunState::Paused);
    assert_eq!(debugger.data_pointer(), 3);
    assert_eq!(debugger.current_op(), None);

    debugger.resume().unwrap();
    assert_eq!(debugger.wait(TIMEOUT), RunState::Stopped);
    assert!(debugger.report().unwrap().is_completed());
}

#[test]
fn test_steps_coalesced_instructions_when_asked() {
    let (mut debugger, _) = debugger(DebugConfig {
        optimizations: Optimizations::all(),
        ..paused()
    });
    debugger.start(">>>+").unwrap();
    assert_eq!(debugger.program().map(|p| p.len()), Some(2));
    debugger.step().unwrap();
    assert_eq!(debugger.data_pointer(), 3);
    assert_eq!(debugger.current_op(), Some(Op::Data(1)));
    debugger.step().unwrap();
    assert_eq!(debugger.tape_snapshot()[3], 1);
    debugger.stop();
}

#[test]
fn test_stop_while_waiting_for_input() {
    let (mut debugger, terminal) = debugger(DebugConfig::default());
    debugger.start(",").unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(debugger.state(), RunState::Running);
    assert!(debugger.is_alive());

    let start = Instant::now();
    let report = debugger.stop().unwrap();
    assert!(start.elapsed() < TIMEOUT);
    assert!(!debugger.is_alive());
    assert_eq!(debugger.state(), RunState::Stopped);
    assert_eq!(report.status, RunStatus::Stopped);
    assert!(terminal.messages()[0].starts_with("Program stopped by user"));
}

#[test]
fn test_breakpoint_pauses_the_run() {
    let (mut debugger, _) = debugger(DebugConfig::default());
    debugger.start("+#+").unwrap();
    assert_eq!(debugger.wait(TIMEOUT), RunState::Paused);
    assert_eq!(debugger.tape_snapshot()[0], 1);
    assert_eq!(debugger.instruction_index(), 2);
    assert_eq!(debugger.current_op(), Some(Op::Data(1)));

    debugger.resume().unwrap();
    assert_eq!(debugger.wait(TIMEOUT), RunState::Stopped);
    assert_eq!(debugger.tape_snapshot()[0], 2);
}

#[test]
fn test_disabled_breakpoints_are_skipped() {
    let (mut debugger, _) = debugger(DebugConfig {
        breakpoints: false,
        ..DebugConfig::default()
    });
    assert!(!debugger.breakpoints());
    debugger.start("+#+#+").unwrap();
    assert_eq!(debugger.wait(TIMEOUT), RunState::Stopped);
    assert_eq!(debugger.tape_snapshot()[0], 3);
}

#[test]
fn test_breakpoints_toggle_mid_run() {
    let (mut debugger, _) = debugger(paused());
    debugger.start("#+#+").unwrap();
    debugger.set_breakpoints(false);
    debugger.resume().unwrap();
    assert_eq!(debugger.wait(TIMEOUT), RunState::Stopped);
    assert_eq!(debugger.tape_snapshot()[0], 2);
}

#[test]
fn test_bounds_are_always_fatal() {
    let (mut debugger, terminal) = debugger(DebugConfig {
        machine: Config {
            bounds: BoundsPolicy::Wrap,
            tape_size: 4,
            ..Config::default()
        },
        ..DebugConfig::default()
    });
    debugger.start("+<").unwrap();
    assert_eq!(debugger.wait(TIMEOUT), RunState::Stopped);

    let report = debugger.report().unwrap();
    let RunStatus::Failed(e) = report.status else {
        panic!("expected a bounds error, got {report:?}");
    };
    assert_eq!(e.fault, BoundsFault::Underflow);
    assert_eq!(e.instruction, 1);
    assert_eq!(terminal.errors(), vec![e.to_string()]);
    assert!(terminal.messages()[0].starts_with("Program terminated by an error"));
    // The tape is published when the run ends.
    assert_eq!(debugger.tape_snapshot(), vec![1, 0, 0, 0]);
}

#[test]
fn test_compile_error_leaves_debugger_idle() {
    let (mut debugger, terminal) = debugger(DebugConfig::default());
    assert_eq!(
        debugger.start("+["),
        Err(ControlError::Compile(CompileError::UnmatchedOpen { offset: 2 }))
    );
    assert_eq!(debugger.state(), RunState::Idle);
    assert!(!debugger.is_alive());
    assert!(terminal.errors()[0].starts_with("Compile error"));
}

#[test]
fn test_control_calls_check_the_state() {
    let (mut debugger, _) = debugger(DebugConfig::default());
    assert_eq!(debugger.step(), Err(ControlError::NotPaused));
    assert_eq!(debugger.resume(), Err(ControlError::NotPaused));
    assert_eq!(debugger.pause(), Err(ControlError::NotRunning));

    debugger.start("+[]").unwrap();
    assert_eq!(debugger.start("+"), Err(ControlError::AlreadyRunning));
    assert_eq!(debugger.step(), Err(ControlError::NotPaused));

    debugger.stop();
    assert_eq!(debugger.pause(), Err(ControlError::NotRunning));
    assert_eq!(debugger.state(), RunState::Stopped);
}

#[test]
fn test_pause_and_resume_a_spinning_program() {
    let (mut debugger, _) = debugger(DebugConfig::default());
    debugger.start("+[]").unwrap();
    thread::sleep(Duration::from_millis(20));

    debugger.pause().unwrap();
    assert_eq!(debugger.wait(TIMEOUT), RunState::Paused);
    assert!(matches!(
        debugger.current_op(),
        Some(Op::LoopStart(_)) | Some(Op::LoopEnd(_))
    ));
    assert_eq!(debugger.tape_snapshot()[0], 1);

    debugger.step().unwrap();
    assert_eq!(debugger.state(), RunState::Paused);

    debugger.resume().unwrap();
    assert_eq!(debugger.state(), RunState::Running);
    assert_eq!(debugger.stop().unwrap().status, RunStatus::Stopped);
}

#[test]
fn test_step_into_input() {
    let (mut debugger, terminal) = debugger(paused());
    debugger.start(",.").unwrap();
    // The step returns once the program is waiting on the terminal.
    debugger.step().unwrap();
    terminal.push_input("A");
    assert_eq!(debugger.wait(TIMEOUT), RunState::Paused);
    debugger.step().unwrap();
    assert_eq!(debugger.tape_snapshot()[0], 65);
    assert_eq!(terminal.text(), "A");
    debugger.stop();
}

#[test]
fn test_step_while_blocked_on_input_runs_only_the_input() {
    let (mut debugger, terminal) = debugger(DebugConfig::default());
    debugger.start(",>>").unwrap();
    thread::sleep(Duration::from_millis(50));
    debugger.pause().unwrap();
    debugger.step().unwrap();

    terminal.push_input("A");
    assert_eq!(debugger.wait(TIMEOUT), RunState::Paused);
    assert_eq!(debugger.tape_snapshot()[0], 65);
    assert_eq!(debugger.data_pointer(), 0);
    assert_eq!(debugger.instruction_index(), 1);

    // Nothing is left over to run a second instruction.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(debugger.data_pointer(), 0);
    debugger.step().unwrap();
    assert_eq!(debugger.data_pointer(), 1);
    debugger.stop();
}

#[test]
fn test_restart_after_stop() {
    let (mut debugger, terminal) = debugger(DebugConfig::default());
    debugger.start("+[]").unwrap();
    debugger.stop();

    debugger.start("++.").unwrap();
    assert_eq!(debugger.wait(TIMEOUT), RunState::Stopped);
    assert!(debugger.report().unwrap().is_completed());
    assert_eq!(debugger.tape_snapshot()[0], 2);
    // The restart discarded the first run's status line.
    assert_eq!(terminal.messages().len(), 1);
}

#[test]
fn test_throttle_adds_session_delay() {
    let config = DebugConfig {
        step_delay: Duration::from_millis(2),
        concurrent_sessions: 3,
        session_delay: Duration::from_millis(5),
        ..DebugConfig::default()
    };
    assert_eq!(config.throttle(), Duration::from_millis(12));
    assert_eq!(DebugConfig::default().throttle(), Duration::ZERO);
}

#[test]
fn test_step_delay_slows_the_run() {
    let (mut debugger, _) = debugger(DebugConfig {
        step_delay: Duration::from_millis(20),
        ..DebugConfig::default()
    });
    debugger.start(">>>>>").unwrap();
    assert_eq!(debugger.wait(TIMEOUT), RunState::Stopped);
    assert!(debugger.report().unwrap().elapsed >= Duration::from_millis(80));
}

#[test]
fn test_stop_interrupts_the_throttle() {
    let (mut debugger, _) = debugger(DebugConfig {
        step_delay: Duration::from_secs(60),
        ..DebugConfig::default()
    });
    debugger.start("++").unwrap();
    thread::sleep(Duration::from_millis(20));
    let start = Instant::now();
    debugger.stop();
    assert!(start.elapsed() < TIMEOUT);
}
