//! The RUN and RUNTEST statements launch the command under test:
//!
//! ```text
//! RUN                  # run the command, capture all output
//! RUNTEST              # run, check all expectations, record a result
//! RUNTEST: Test name.  # same, naming the recorded test
//! ```
//!
//! RUN only captures; no check runs and no result is recorded, so a
//! failing command is not an error here. RUNTEST additionally runs the
//! registered checkers, records a named test result, and restores all
//! backed-up files.

use crate::cursor::{Cursor, SourceContext};
use crate::error::RunError;
use crate::instruction::{Action, Instruction};
use crate::reader::{at_keyword_boundary, Flow, MatchResult, Reader, SectionMatch};
use crate::runner::Runner;
use crate::scanner::Token;

pub struct RunCommand {
    context: SourceContext,
}

impl Action for RunCommand {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        runner.run_command()
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        "run".to_string()
    }
}

pub struct RunReader;

impl Reader for RunReader {
    fn keyword(&self) -> &str {
        "RUN"
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        if !at_keyword_boundary(cursor) {
            return Err(Flow::Decline);
        }
        Ok(SectionMatch::Hard(Instruction::Action(Box::new(RunCommand { context }))))
    }
}

pub struct RunTest {
    name: Option<String>,
    context: SourceContext,
}

impl Action for RunTest {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        runner.run_test(&self.context, self.name.clone())
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("runtest: {name}"),
            None => "runtest".to_string(),
        }
    }
}

pub struct RunTestReader;

impl Reader for RunTestReader {
    fn keyword(&self) -> &str {
        "RUNTEST"
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        if !at_keyword_boundary(cursor) {
            return Err(Flow::Decline);
        }
        let name = if cursor.find(Token::Lit(":")) {
            Some(cursor.read_line_expect("test name")?.to_string())
        } else {
            // Bare statement: reuse the pending test name.
            cursor.check_empty_line()?;
            None
        };
        Ok(SectionMatch::Hard(Instruction::Action(Box::new(RunTest { name, context }))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::test_cursor;
    use crate::driver::Driver;

    fn both() -> Driver {
        Driver::new(vec![Box::new(RunReader), Box::new(RunTestReader)])
    }

    #[test]
    fn test_run_and_runtest_do_not_collide() {
        let mut cursor = test_cursor("RUN\nRUNTEST\nRUNTEST: named\n");
        let actions = both().parse(&mut cursor).unwrap();
        let described: Vec<String> = actions.iter().map(|a| a.describe()).collect();
        assert_eq!(described, vec!["run", "runtest", "runtest: named"]);
    }

    #[test]
    fn test_runtest_colon_requires_name() {
        let mut cursor = test_cursor("RUNTEST:\n");
        let e = both().parse(&mut cursor).unwrap_err();
        assert!(e.message.contains("missing expected data: \"test name\""));
    }

    #[test]
    fn test_runtest_rejects_trailing_garbage() {
        let mut cursor = test_cursor("RUNTEST with no colon\n");
        let e = both().parse(&mut cursor).unwrap_err();
        assert!(e.message.contains("unexpected data after end of line"));
    }
}
