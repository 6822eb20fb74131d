//! Command-line interpretation for phil-configured applications.
//!
//! The usual entry point is [`process_command_line`]: it consumes
//! presentation flags, resolves `path=value` overrides against the master
//! (suffix matching included), reads working phil files, merges
//! everything, and returns the merged tree together with its typed
//! extract. [`ArgumentInterpreter`] is the lower-level building block for
//! applications that need finer control.

mod interpret;
mod process;

pub use interpret::{ArgumentInterpreter, InterpretOutcome};
pub use process::{
    DisplayFlags, ProcessOptions, ProcessResult, process_command_line, process_command_line_with,
};
