use super::{BufferedTerminal, Terminal};
use log::{debug, warn};
use std::{
    io::{stdin, stdout, BufRead, Write},
    sync::Arc,
    thread,
};

/// A terminal over the process's standard streams.
///
/// Program output goes to stdout, engine messages and errors to stderr.
/// Stdin is read by a pump thread into an internal buffer, so that a
/// blocked [`read_char`](Terminal::read_char) can still be released.
pub struct StandardTerminal {
    input: Arc<BufferedTerminal>,
}

impl StandardTerminal {
    pub fn new() -> Self {
        let input = Arc::new(BufferedTerminal::new());
        let pump = input.clone();
        let spawned = thread::Builder::new()
            .name("stdin-pump".to_string())
            .spawn(move || {
                let mut reader = stdin().lock();
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) => pump.push_input(&line),
                        Err(e) => {
                            warn!("Could not read from stdin: {e}");
                            break;
                        }
                    }
                }
                debug!("Reached the end of stdin");
                pump.close_input();
            });
        if let Err(e) = spawned {
            warn!("Could not spawn the stdin reader, input will be empty: {e}");
            input.close_input();
        }
        Self { input }
    }
}

impl Default for StandardTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for StandardTerminal {
    fn write(&self, text: &str) {
        let mut out = stdout().lock();
        if out.write_all(text.as_bytes()).and_then(|_| out.flush()).is_err() {
            warn!("Could not write program output to stdout");
        }
    }

    fn write_message(&self, text: &str) {
        eprintln!("{text}");
    }

    fn write_error(&self, text: &str) {
        eprintln!("\x1b[31m{text}\x1b[0m");
    }

    fn read_char(&self) -> Option<char> {
        // Anything printed so far must be visible before waiting on the user.
        let _ = stdout().flush();
        self.input.read_char()
    }

    fn release(&self) {
        self.input.release()
    }

    /// Stdin cannot be reopened, so its remaining input and its end carry
    /// over to the next run.
    fn reset(&self) {
        self.input.restart()
    }

    fn clear(&self) {
        let _ = stdout().flush();
    }
}
