//! Inbound event handling: prefix parsing and dispatch

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{EventDispatcher, MessageOutcome, ReactionOutcome};
pub use parser::{MessageParser, ParsedCommand};
