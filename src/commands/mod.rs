//! Command handlers
//!
//! These commands are invoked by the console front end.

pub mod replay;

pub use replay::{handle_command, handle_line, CommandOutcome, CommandResponse, ConsoleCommand};
