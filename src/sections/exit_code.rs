//! The EXITCODE statement sets up the expected return code for the next
//! executed command:
//!
//! ```text
//! EXITCODE 0    # exact code expected
//! EXITCODE +    # any nonzero code expected
//! EXITCODE *    # clear return code expectations
//! ```

use crate::checker::{Checker, CommandOutput, Expectation, Placeholders};
use crate::cursor::{Cursor, SourceContext};
use crate::error::{ParseError, RunError};
use crate::instruction::{Action, Instruction};
use crate::reader::{at_keyword_boundary, Flow, MatchResult, Reader, SectionMatch};
use crate::runner::Runner;
use crate::scanner::Token;

#[derive(Debug, Clone, Copy)]
enum CodeExpect {
    Exact(i32),
    NonZero,
}

struct ExitCodeChecker {
    expect: CodeExpect,
    kinds: [Expectation; 1],
    context: SourceContext,
}

impl Checker for ExitCodeChecker {
    fn expectations(&self) -> &[Expectation] {
        &self.kinds
    }

    fn check(&self, output: &CommandOutput, _: &Placeholders<'_>) -> Option<String> {
        match self.expect {
            CodeExpect::Exact(code) => {
                if output.code == code {
                    return None;
                }
                Some(format!("expected return code {code}, got {} instead", output.code))
            }
            CodeExpect::NonZero => {
                if output.code != 0 {
                    return None;
                }
                Some("expected nonzero return code, got 0".to_string())
            }
        }
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }
}

struct ExpectCode {
    expect: CodeExpect,
    context: SourceContext,
}

impl Action for ExpectCode {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        runner.add_checkers(vec![Box::new(ExitCodeChecker {
            expect: self.expect,
            kinds: [Expectation::Code],
            context: self.context.clone(),
        })]);
        Ok(())
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        match self.expect {
            CodeExpect::Exact(code) => format!("EXITCODE {code}"),
            CodeExpect::NonZero => "EXITCODE +".to_string(),
        }
    }
}

struct ClearCode {
    context: SourceContext,
}

impl Action for ClearCode {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        runner.clear_checkers(&[Expectation::Code]);
        Ok(())
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        "EXITCODE *".to_string()
    }
}

pub struct ExitCodeReader;

impl Reader for ExitCodeReader {
    fn keyword(&self) -> &str {
        "EXITCODE"
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        if !at_keyword_boundary(cursor) {
            return Err(Flow::Decline);
        }
        if cursor.find(Token::Lit("*")) {
            return Ok(SectionMatch::Hard(Instruction::Action(Box::new(ClearCode {
                context,
            }))));
        }
        if cursor.find(Token::Lit("+")) {
            return Ok(SectionMatch::Hard(Instruction::Action(Box::new(ExpectCode {
                expect: CodeExpect::NonZero,
                context,
            }))));
        }
        cursor.lstrip();
        let word_context = cursor.context();
        let word = cursor.read_split();
        if word.is_empty() {
            return Err(Flow::Fatal(
                cursor.error("unexpected end of input while reading expected exit code"),
            ));
        }
        let code: i32 = word.parse().map_err(|_| {
            Flow::Fatal(ParseError::new(
                format!("expected exit code, found {word:?}"),
                word_context,
            ))
        })?;
        Ok(SectionMatch::Hard(Instruction::Action(Box::new(ExpectCode {
            expect: CodeExpect::Exact(code),
            context,
        }))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::test_cursor;
    use crate::driver::Driver;
    use std::path::Path;

    fn placeholders() -> Placeholders<'static> {
        Placeholders { test_folder: Path::new("/t"), input_folder: Path::new("/i") }
    }

    fn run_code(code: i32) -> CommandOutput {
        CommandOutput { code, stdout: String::new(), stderr: String::new() }
    }

    #[test]
    fn test_exact_code_checker() {
        let c = ExitCodeChecker {
            expect: CodeExpect::Exact(2),
            kinds: [Expectation::Code],
            context: SourceContext::mock(),
        };
        assert_eq!(c.check(&run_code(2), &placeholders()), None);
        let report = c.check(&run_code(0), &placeholders()).unwrap();
        assert_eq!(report, "expected return code 2, got 0 instead");
    }

    #[test]
    fn test_nonzero_code_checker() {
        let c = ExitCodeChecker {
            expect: CodeExpect::NonZero,
            kinds: [Expectation::Code],
            context: SourceContext::mock(),
        };
        assert_eq!(c.check(&run_code(7), &placeholders()), None);
        assert!(c.check(&run_code(0), &placeholders()).is_some());
    }

    fn parse(input: &str) -> Vec<String> {
        let mut driver = Driver::new(vec![Box::new(ExitCodeReader)]);
        let mut cursor = test_cursor(input);
        driver.parse(&mut cursor).unwrap().iter().map(|a| a.describe()).collect()
    }

    #[test]
    fn test_statement_forms() {
        assert_eq!(parse("EXITCODE 0\n"), vec!["EXITCODE 0"]);
        assert_eq!(parse("EXITCODE +\n"), vec!["EXITCODE +"]);
        assert_eq!(parse("EXITCODE *\n"), vec!["EXITCODE *"]);
    }

    #[test]
    fn test_bad_code_is_fatal() {
        let mut driver = Driver::new(vec![Box::new(ExitCodeReader)]);
        let mut cursor = test_cursor("EXITCODE nope\n");
        let e = driver.parse(&mut cursor).unwrap_err();
        assert!(e.message.contains("expected exit code, found \"nope\""));
        assert_eq!(e.context.col, 10);
    }
}
