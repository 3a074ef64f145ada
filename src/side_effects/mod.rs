//! # Side Effects Module
//!
//! All of the machine's contact with the outside world goes through a
//! [`Terminal`]: a character sink with three tagged channels, and a
//! character source whose blocking read can be released from another thread.
mod terminal;
pub use terminal::*;

mod buffered;
pub use buffered::*;

mod standard;
pub use standard::*;
