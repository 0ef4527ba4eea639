//! Output checkers
//!
//! Checkers live in the runner and hold expectations about the test
//! command's outputs. Each one declares which output kinds it examines;
//! registration is mutually exclusive per kind, so installing a new
//! checker first clears the previous ones looking at the same kind.

use std::path::Path;

use crate::cursor::SourceContext;

/// Which part of a command's output a checker examines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Code,
    Stdout,
    Stderr,
}

/// Captured result of one command run.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Folder paths substituted for the `<TEST_FOLDER>` / `<INPUT_FOLDER>`
/// placeholders in expected outputs.
pub struct Placeholders<'r> {
    pub test_folder: &'r Path,
    pub input_folder: &'r Path,
}

impl Placeholders<'_> {
    pub fn expand(&self, expected: &str) -> String {
        expected
            .replace("<TEST_FOLDER>", &self.test_folder.to_string_lossy())
            .replace("<INPUT_FOLDER>", &self.input_folder.to_string_lossy())
    }
}

/// An expectation about the command output.
pub trait Checker {
    /// The output kinds this checker examines.
    fn expectations(&self) -> &[Expectation];

    /// Verify the output; `None` on success, a failure report otherwise.
    fn check(&self, output: &CommandOutput, placeholders: &Placeholders<'_>) -> Option<String>;

    /// Where this expectation was declared.
    fn context(&self) -> &SourceContext;
}
