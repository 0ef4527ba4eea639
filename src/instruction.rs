//! Instructions
//!
//! The driver collects instructions as readers produce them. Most are
//! [`Action`]s, forwarded in encounter order to the runner; a
//! [`ParseEditor`] is intercepted by the driver itself and executed
//! immediately to mutate the active reader registry.

use crate::cursor::SourceContext;
use crate::driver::Driver;
use crate::error::{ParseError, RunError};
use crate::runner::Runner;

/// The unit collected by the driver. The variant decides interception:
/// editors never reach the runner.
pub enum Instruction {
    Action(Box<dyn Action>),
    Edit(Box<dyn ParseEditor>),
}

/// An instruction applied to the runner to modify the test environment,
/// run the command, or register expectations.
pub trait Action {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError>;

    /// Where this instruction was parsed, for failure reports.
    fn context(&self) -> &SourceContext;

    /// One-line form for the execution log.
    fn describe(&self) -> String;
}

/// An instruction executed against the driver itself, with scoped mutable
/// access to its reader registry, before any subsequent input is parsed.
pub trait ParseEditor {
    fn execute(&self, driver: &mut Driver) -> Result<(), ParseError>;
}
