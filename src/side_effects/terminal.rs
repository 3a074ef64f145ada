use core::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

/// The character device a running program talks to.
///
/// A terminal is shared between the worker thread running a program and the
/// controller driving it, so every method takes `&self`. Writes never block.
/// [`read_char`](Terminal::read_char) blocks until a character is available,
/// input ends, or a controller calls [`release`](Terminal::release).
pub trait Terminal: Send + Sync {
    /// Append program output.
    fn write(&self, text: &str);
    /// Append a status message from the engine.
    fn write_message(&self, text: &str);
    /// Append an error report from the engine.
    fn write_error(&self, text: &str);

    /// Read one character, blocking. `None` means end of stream.
    fn read_char(&self) -> Option<char>;

    /// Unblock any pending or future read as if input had ended, until the
    /// next [`reset`](Terminal::reset).
    fn release(&self);

    /// Discard all buffered output and unread input, and undo a release.
    fn reset(&self);

    /// Discard buffered output.
    fn clear(&self);
}

impl<T: Terminal + ?Sized> Terminal for Arc<T> {
    fn write(&self, text: &str) {
        (**self).write(text)
    }

    fn write_message(&self, text: &str) {
        (**self).write_message(text)
    }

    fn write_error(&self, text: &str) {
        (**self).write_error(text)
    }

    fn read_char(&self) -> Option<char> {
        (**self).read_char()
    }

    fn release(&self) {
        (**self).release()
    }

    fn reset(&self) {
        (**self).reset()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// Which channel a piece of terminal output was written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Written by the program.
    Output,
    /// A status message from the engine.
    Message,
    /// An error report from the engine.
    Error,
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Tag::Output => write!(f, "output"),
            Tag::Message => write!(f, "message"),
            Tag::Error => write!(f, "error"),
        }
    }
}

/// A run of terminal output written to one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub tag: Tag,
    pub text: String,
}
