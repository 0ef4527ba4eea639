//! Error tiers
//!
//! Three layers, one per altitude:
//! - [`ScanError`] — raw scan failure carrying only a consumed-offset.
//!   Always caught one layer up and re-raised as a positioned error,
//!   never shown to the user as-is.
//! - [`ParseError`] — positioned failure with file identity, line/column
//!   and the include chain. Fatal to the current parse.
//! - [`RunError`] — execution-time failure (missing file, failed command,
//!   bad include). Recorded against the current test and accumulated,
//!   except for sandbox preparation failures which abort the run.

use std::fmt;

use crate::cursor::SourceContext;

/// A scan failure detected by the low-level scanner.
///
/// `offset` is the absolute consumed-offset (bytes from the start of the
/// buffer) at which the problem was detected — possibly earlier than the
/// scanner's own position when the failing operation backtracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub message: String,
    pub offset: usize,
}

impl ScanError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self { message: message.into(), offset }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.offset)
    }
}

impl std::error::Error for ScanError {}

/// A parse failure with full position information.
///
/// Rendered as `<message> <file>:<line>:<column>`, followed by one
/// `included from <file>:<line>:<column>` line per link in the include
/// chain, innermost first.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub context: SourceContext,
}

impl ParseError {
    pub fn new(message: impl Into<String>, context: SourceContext) -> Self {
        Self { message: message.into(), context }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.message, self.context.position())?;
        for frame in self.context.include_chain() {
            write!(f, "\nincluded from {}", frame.position())?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// What kind of run failure this is — drives the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    /// Test-execution/organization error (exit code 3 when fatal).
    Execution,
    /// A parse error surfaced at execution time, e.g. from an included
    /// file (exit code 2).
    Parse,
}

/// An execution-time failure, carrying the position of the instruction
/// that caused it when known.
#[derive(Debug)]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
    pub context: Option<SourceContext>,
}

impl RunError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { kind: RunErrorKind::Execution, message: message.into(), context: None }
    }

    /// Fill the context if the error does not carry one yet.
    pub fn or_context(mut self, context: &SourceContext) -> Self {
        if self.context.is_none() {
            self.context = Some(context.clone());
        }
        self
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref cx) = self.context {
            write!(f, " {}", cx.position())?;
            for frame in cx.include_chain() {
                write!(f, "\nincluded from {}", frame.position())?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RunError {}

impl From<std::io::Error> for RunError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<ParseError> for RunError {
    fn from(e: ParseError) -> Self {
        Self {
            kind: RunErrorKind::Parse,
            context: Some(e.context.clone()),
            message: e.message,
        }
    }
}
