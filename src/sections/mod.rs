//! Built-in section grammars
//!
//! Each module implements one section type against the reader/automaton
//! protocol. The engine knows nothing about them: they plug into the
//! driver through [`crate::reader::Reader`] alone.

mod command;
mod copy;
mod exit_code;
mod file;
mod include;
mod output;
mod readers;
mod run;
mod test_name;

pub use command::CommandReader;
pub use copy::CopyReader;
pub use exit_code::ExitCodeReader;
pub use file::FileReader;
pub use include::IncludeReader;
pub use output::{Channel, OutputReader};
pub use readers::ReadersReader;
pub use run::{RunReader, RunTestReader};
pub use test_name::TestReader;

use crate::reader::Reader;

/// Construct a fresh sequence of all built-in readers.
pub fn default_readers() -> Vec<Box<dyn Reader>> {
    vec![
        Box::new(CopyReader),
        Box::new(FileReader),
        Box::new(CommandReader),
        Box::new(OutputReader::stdout()),
        Box::new(OutputReader::stderr()),
        Box::new(ExitCodeReader),
        Box::new(TestReader),
        Box::new(RunReader),
        Box::new(RunTestReader),
        Box::new(IncludeReader),
        Box::new(ReadersReader),
    ]
}

/// Look up one built-in reader by its keyword, for the `readers:` section
/// to enable section types mid-parse.
pub fn reader_catalog(keyword: &str) -> Option<Box<dyn Reader>> {
    Some(match keyword {
        "copy" => Box::new(CopyReader) as Box<dyn Reader>,
        "file" => Box::new(FileReader),
        "command" => Box::new(CommandReader),
        "stdout" => Box::new(OutputReader::stdout()),
        "stderr" => Box::new(OutputReader::stderr()),
        "EXITCODE" => Box::new(ExitCodeReader),
        "test" => Box::new(TestReader),
        "RUN" => Box::new(RunReader),
        "RUNTEST" => Box::new(RunTestReader),
        "include" => Box::new(IncludeReader),
        "readers" => Box::new(ReadersReader),
        _ => return None,
    })
}
