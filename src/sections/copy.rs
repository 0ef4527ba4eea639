//! The copy section brings files from the input folder to the test folder:
//!
//! ```text
//! copy:
//!     # Files may be renamed, use the arrow '->' to this end.
//!     input_file -> renamed_into_test_file
//!     path/to/input_file2 -> test_file2
//!
//!     # Without the arrow, names are kept.
//!     plain_file_1
//!     plain_file_2 plain_file_3 # several names per line work too
//! ```
//!
//! Filenames are parsed verbatim. When that would break parsing, quote
//! them with string syntax:
//!
//! ```text
//! copy: "ambiguous -> arrow in filename" -> 'ambiguous#commentsign'
//! ```

use crate::cursor::{Cursor, SourceContext};
use crate::error::{ParseError, RunError};
use crate::instruction::{Action, Instruction};
use crate::reader::{Automaton, Feed, MatchResult, Reader, SectionMatch};
use crate::runner::Runner;
use crate::scanner::{Token, NEWLINE_GUARD};

pub struct Copy {
    sources: Vec<String>,
    targets: Vec<String>,
    context: SourceContext,
}

impl Action for Copy {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        for (source, target) in self.sources.iter().zip(&self.targets) {
            runner.check_input_file(source)?;
            runner.copy_from_input(source, target)?;
        }
        Ok(())
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        let pairs: Vec<String> = self
            .sources
            .iter()
            .zip(&self.targets)
            .map(|(s, t)| if s == t { s.clone() } else { format!("{s} -> {t}") })
            .collect();
        format!("copy {}", pairs.join(", "))
    }
}

pub struct CopyReader;

impl Reader for CopyReader {
    fn keyword(&self) -> &str {
        "copy"
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        self.check_colon(cursor)?;
        Ok(SectionMatch::Soft(Box::new(CopyAutomaton {
            sources: Vec::new(),
            targets: Vec::new(),
            context,
        })))
    }
}

/// Constructs the copy instruction line by line.
struct CopyAutomaton {
    sources: Vec<String>,
    targets: Vec<String>,
    context: SourceContext,
}

impl Automaton for CopyAutomaton {
    fn feed(&mut self, lex: &mut Cursor<'_>) -> Result<Feed, ParseError> {
        if lex.find_empty_line() {
            return Ok(Feed::Fed);
        }
        match lex.read_string_or_raw_until(Token::Lit("->"), NEWLINE_GUARD, true)? {
            None => {
                // No arrow: the line is a sequence of filenames, either
                // all quoted or none at all.
                match lex.read_string() {
                    None => {
                        for name in lex.read_line().split_whitespace() {
                            self.sources.push(name.to_string());
                            self.targets.push(name.to_string());
                        }
                    }
                    Some(first) => {
                        let mut names = vec![first];
                        while let Some(name) = lex.read_string() {
                            names.push(name);
                        }
                        lex.check_empty_line()?;
                        for name in names {
                            self.sources.push(name.clone());
                            self.targets.push(name);
                        }
                    }
                }
            }
            Some((source, raw)) => {
                if raw && source.is_empty() {
                    return Err(lex.error("could not find source filename in copy line"));
                }
                let target = lex.read_string_or_raw_line_expect("destination filename")?;
                self.sources.push(source);
                self.targets.push(target);
            }
        }
        Ok(Feed::Fed)
    }

    fn terminate(self: Box<Self>) -> Result<Option<Instruction>, ParseError> {
        Ok(Some(Instruction::Action(Box::new(Copy {
            sources: self.sources,
            targets: self.targets,
            context: self.context,
        }))))
    }
}
