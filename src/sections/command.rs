//! The command section specifies the shell command to be run as a test:
//!
//! ```text
//! command: path/to/exec arg1 arg2 | postprocess
//! ```
//!
//! Incremental lines are stripped and joined with single spaces into one
//! command line; lines starting with `#` are excluded, but mid-line
//! comment signs are passed through to the shell. To capture a command
//! verbatim instead (newlines included), make the match hard with a
//! double colon and a heredoc marker:
//!
//! ```text
//! command:: EOC
//!     read -r -d '' VAR <<'EOF'
//!     $(dont-execute-this)
//!     EOF
//! EOC # captured text is dedented
//! ```

use crate::cursor::{Cursor, SourceContext};
use crate::error::{ParseError, RunError};
use crate::instruction::{Action, Instruction};
use crate::reader::{Automaton, Colon, Feed, MatchResult, Reader, SectionMatch};
use crate::runner::Runner;

pub struct SetCommand {
    command: String,
    context: SourceContext,
}

impl Action for SetCommand {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        runner.update_command(self.command.clone(), self.context.clone());
        Ok(())
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        format!("command: {}", self.command)
    }
}

pub struct CommandReader;

impl Reader for CommandReader {
    fn keyword(&self) -> &str {
        "command"
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        match self.check_colon_type(cursor)? {
            Colon::Double => {
                let command = cursor.read_heredoc("command", None)?;
                Ok(SectionMatch::Hard(Instruction::Action(Box::new(SetCommand {
                    command,
                    context,
                }))))
            }
            Colon::Single => Ok(SectionMatch::Soft(Box::new(CommandAutomaton {
                lines: Vec::new(),
                context,
            }))),
        }
    }
}

struct CommandAutomaton {
    lines: Vec<String>,
    context: SourceContext,
}

impl Automaton for CommandAutomaton {
    fn feed(&mut self, bit: &mut Cursor<'_>) -> Result<Feed, ParseError> {
        // Blank lines and whole-line comments are excluded; mid-line
        // comment signs are part of the command.
        if bit.find_empty_line() {
            return Ok(Feed::Fed);
        }
        let line = bit.rest().trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
        Ok(Feed::Fed)
    }

    fn terminate(self: Box<Self>) -> Result<Option<Instruction>, ParseError> {
        Ok(Some(Instruction::Action(Box::new(SetCommand {
            command: self.lines.join(" "),
            context: self.context,
        }))))
    }
}
