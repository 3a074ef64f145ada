use super::{Segment, Tag, Terminal};
use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Default)]
struct Buffers {
    output: Vec<Segment>,
    input: VecDeque<char>,
    /// No more input will be pushed.
    closed: bool,
    /// A controller released all readers.
    released: bool,
}

/// An in-memory terminal.
///
/// Output is kept as a list of tagged [`Segment`]s for a front end to
/// render. Input is pushed in by the front end (or a test) and handed to the
/// running program one character at a time.
#[derive(Debug, Default)]
pub struct BufferedTerminal {
    buffers: Mutex<Buffers>,
    input_ready: Condvar,
}

impl BufferedTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a terminal whose entire input is already known.
    pub fn with_input(input: impl ToString) -> Self {
        let terminal = Self::new();
        terminal.push_input(&input.to_string());
        terminal.close_input();
        terminal
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        // The buffers are valid after any panic, so poisoning is ignored.
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Supply more input to the program.
    pub fn push_input(&self, text: &str) {
        self.lock().input.extend(text.chars());
        self.input_ready.notify_all();
    }

    /// Signal end of stream once the pushed input is consumed.
    pub fn close_input(&self) {
        self.lock().closed = true;
        self.input_ready.notify_all();
    }

    /// Program output merges into the previous output segment; every engine
    /// message and error is a segment of its own.
    fn append(&self, tag: Tag, text: &str) {
        let mut buffers = self.lock();
        match buffers.output.last_mut() {
            Some(last) if last.tag == Tag::Output && tag == Tag::Output => {
                last.text.push_str(text)
            }
            _ => buffers.output.push(Segment {
                tag,
                text: text.to_string(),
            }),
        }
    }

    /// Start over for a new run while the input stream carries on.
    ///
    /// Output and the release are cleared like [`reset`](Terminal::reset),
    /// but queued input is kept, and a stream which has ended stays ended.
    pub fn restart(&self) {
        let mut buffers = self.lock();
        buffers.output.clear();
        buffers.released = false;
    }

    /// All output written so far.
    pub fn output(&self) -> Vec<Segment> {
        self.lock().output.clone()
    }

    /// Take all output written so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Segment> {
        std::mem::take(&mut self.lock().output)
    }

    /// Everything the program itself printed.
    pub fn text(&self) -> String {
        self.tagged(Tag::Output).concat()
    }

    pub fn messages(&self) -> Vec<String> {
        self.tagged(Tag::Message)
    }

    pub fn errors(&self) -> Vec<String> {
        self.tagged(Tag::Error)
    }

    fn tagged(&self, tag: Tag) -> Vec<String> {
        self.lock()
            .output
            .iter()
            .filter(|segment| segment.tag == tag)
            .map(|segment| segment.text.clone())
            .collect()
    }
}

impl Terminal for BufferedTerminal {
    fn write(&self, text: &str) {
        self.append(Tag::Output, text)
    }

    fn write_message(&self, text: &str) {
        self.append(Tag::Message, text)
    }

    fn write_error(&self, text: &str) {
        self.append(Tag::Error, text)
    }

    fn read_char(&self) -> Option<char> {
        let mut buffers = self.lock();
        loop {
            if buffers.released {
                return None;
            }
            if let Some(ch) = buffers.input.pop_front() {
                return Some(ch);
            }
            if buffers.closed {
                return None;
            }
            buffers = self
                .input_ready
                .wait(buffers)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn release(&self) {
        self.lock().released = true;
        self.input_ready.notify_all();
    }

    fn reset(&self) {
        *self.lock() = Buffers::default();
    }

    fn clear(&self) {
        self.lock().output.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_merges_but_messages_do_not() {
        let t = BufferedTerminal::new();
        t.write("a");
        t.write("b");
        t.write_message("done");
        t.write_error("oops");
        t.write_error("again");
        t.write("c");
        assert_eq!(
            t.output(),
            vec![
                Segment { tag: Tag::Output, text: "ab".to_string() },
                Segment { tag: Tag::Message, text: "done".to_string() },
                Segment { tag: Tag::Error, text: "oops".to_string() },
                Segment { tag: Tag::Error, text: "again".to_string() },
                Segment { tag: Tag::Output, text: "c".to_string() },
            ]
        );
        assert_eq!(t.text(), "abc");
    }

    #[test]
    fn test_input_then_end_of_stream() {
        let t = BufferedTerminal::with_input("hé");
        assert_eq!(t.read_char(), Some('h'));
        assert_eq!(t.read_char(), Some('é'));
        assert_eq!(t.read_char(), None);
    }

    #[test]
    fn test_reset_discards_everything() {
        let t = BufferedTerminal::with_input("xyz");
        t.write("out");
        t.release();
        assert_eq!(t.read_char(), None);
        t.reset();
        assert!(t.output().is_empty());
        t.push_input("q");
        assert_eq!(t.read_char(), Some('q'));
    }

    #[test]
    fn test_restart_keeps_the_end_of_stream() {
        let t = BufferedTerminal::with_input("ab");
        assert_eq!(t.read_char(), Some('a'));
        t.write("out");
        t.release();
        t.restart();
        assert!(t.output().is_empty());
        assert_eq!(t.read_char(), Some('b'));
        // Nothing will push more input, so a read must not block.
        assert_eq!(t.read_char(), None);
    }
}
