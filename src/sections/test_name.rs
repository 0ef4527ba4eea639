//! The test section names the next running test:
//!
//! ```text
//! test: One-line name for the test.
//! ```

use crate::cursor::{Cursor, SourceContext};
use crate::error::RunError;
use crate::instruction::{Action, Instruction};
use crate::reader::{MatchResult, Reader, SectionMatch};
use crate::runner::Runner;

pub struct SetTestName {
    name: String,
    context: SourceContext,
}

impl Action for SetTestName {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        runner.update_test_name(self.name.clone(), self.context.clone());
        Ok(())
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        format!("test: {}", self.name)
    }
}

pub struct TestReader;

impl Reader for TestReader {
    fn keyword(&self) -> &str {
        "test"
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        self.check_colon(cursor)?;
        let name = cursor.read_line_expect("test name")?;
        Ok(SectionMatch::Hard(Instruction::Action(Box::new(SetTestName {
            name: name.to_string(),
            context,
        }))))
    }
}
