//! The stdout/stderr sections set up expectations on either output
//! channel:
//!
//! ```text
//! stdout: # (or 'stderr:')
//!     Output lines to be matched
//!     irrespective of whitespace.
//!
//! stdout:: EOO # (or 'stderr::')
//!     (dedented) Exact output to be matched.
//! EOO
//!
//! stdout: *   # Clear expectations regarding stdout.
//! stdout:: *  # Expect exactly no output.
//! ```
//!
//! Expected outputs may use the `<TEST_FOLDER>` and `<INPUT_FOLDER>`
//! placeholders; terminal escape codes are removed from the actual output
//! before comparison.

use once_cell::sync::Lazy;
use regex::Regex;
use similar::TextDiff;

use crate::checker::{Checker, CommandOutput, Expectation, Placeholders};
use crate::cursor::{Cursor, SourceContext};
use crate::error::{ParseError, RunError};
use crate::instruction::{Action, Instruction};
use crate::reader::{Automaton, Colon, Feed, MatchResult, Reader, SectionMatch};
use crate::runner::Runner;
use crate::scanner::Token;

/// Terminal escape codes, removed from actual output before comparison.
static ESCAPES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B\[([0-9]{1,3}(;[0-9]{1,2})?)?[mGK]").unwrap());

fn unescape(output: &str) -> String {
    ESCAPES.replace_all(output, "").into_owned()
}

fn squish(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One of the two output channels a section can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
        }
    }

    fn expectation(self) -> Expectation {
        match self {
            Channel::Stdout => Expectation::Stdout,
            Channel::Stderr => Expectation::Stderr,
        }
    }

    fn pick(self, output: &CommandOutput) -> &str {
        match self {
            Channel::Stdout => &output.stdout,
            Channel::Stderr => &output.stderr,
        }
    }
}

/// How the expected output relates to the actual one.
#[derive(Debug, Clone)]
enum OutputExpect {
    /// The whole channel must equal this, whitespace included.
    Exact(String),
    /// This must occur within the channel, irrespective of whitespace.
    Substring(String),
    /// The channel must be empty.
    Empty,
}

struct OutputChecker {
    channel: Channel,
    expect: OutputExpect,
    kinds: [Expectation; 1],
    context: SourceContext,
}

impl Checker for OutputChecker {
    fn expectations(&self) -> &[Expectation] {
        &self.kinds
    }

    fn check(&self, output: &CommandOutput, placeholders: &Placeholders<'_>) -> Option<String> {
        let channel = self.channel.as_str();
        let raw = self.channel.pick(output);
        let actual = unescape(raw);
        match &self.expect {
            OutputExpect::Empty => {
                if actual.is_empty() {
                    return None;
                }
                Some(format!("expected no output on {channel}, but got:\n{raw}"))
            }
            OutputExpect::Exact(expected) => {
                let expected = placeholders.expand(expected);
                if actual == expected {
                    return None;
                }
                let diff = TextDiff::from_lines(&expected, &actual);
                let rendered = diff.unified_diff().header("expected", channel).to_string();
                Some(format!("expected exact output on {channel}:\n{rendered}"))
            }
            OutputExpect::Substring(needle) => {
                let needle = squish(&placeholders.expand(needle));
                let haystack = squish(&actual);
                if haystack.contains(&needle) {
                    return None;
                }
                let found = if raw.is_empty() {
                    "found nothing instead.".to_string()
                } else {
                    format!("found instead:\n{raw}")
                };
                Some(format!("expected to find on {channel}:\n{needle}\n{found}"))
            }
        }
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }
}

/// Registers an output expectation for one channel.
struct ExpectOutput {
    channel: Channel,
    expect: OutputExpect,
    context: SourceContext,
}

impl Action for ExpectOutput {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        runner.add_checkers(vec![Box::new(OutputChecker {
            channel: self.channel,
            expect: self.expect.clone(),
            kinds: [self.channel.expectation()],
            context: self.context.clone(),
        })]);
        Ok(())
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        let what = match &self.expect {
            OutputExpect::Exact(_) => "exact",
            OutputExpect::Substring(_) => "substring",
            OutputExpect::Empty => "empty",
        };
        format!("{}: expect {what}", self.channel.as_str())
    }
}

/// Removes any expectation regarding one channel.
struct ClearOutput {
    channel: Channel,
    context: SourceContext,
}

impl Action for ClearOutput {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        runner.clear_checkers(&[self.channel.expectation()]);
        Ok(())
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        format!("{}: clear expectations", self.channel.as_str())
    }
}

/// Parses both section types, one instance per channel.
pub struct OutputReader {
    channel: Channel,
}

impl OutputReader {
    pub fn stdout() -> Self {
        Self { channel: Channel::Stdout }
    }

    pub fn stderr() -> Self {
        Self { channel: Channel::Stderr }
    }
}

impl Reader for OutputReader {
    fn keyword(&self) -> &str {
        self.channel.as_str()
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        let channel = self.channel;
        match self.check_colon_type(cursor)? {
            Colon::Double => {
                if cursor.find(Token::Lit("*")) {
                    return Ok(SectionMatch::Hard(Instruction::Action(Box::new(
                        ExpectOutput { channel, expect: OutputExpect::Empty, context },
                    ))));
                }
                let expected = cursor.read_heredoc(channel.as_str(), None)?;
                Ok(SectionMatch::Hard(Instruction::Action(Box::new(ExpectOutput {
                    channel,
                    expect: OutputExpect::Exact(expected),
                    context,
                }))))
            }
            Colon::Single => {
                if cursor.find(Token::Lit("*")) {
                    return Ok(SectionMatch::Hard(Instruction::Action(Box::new(
                        ClearOutput { channel, context },
                    ))));
                }
                Ok(SectionMatch::Soft(Box::new(SubstringAutomaton {
                    channel,
                    context,
                    parts: Vec::new(),
                })))
            }
        }
    }
}

struct SubstringAutomaton {
    channel: Channel,
    context: SourceContext,
    parts: Vec<String>,
}

impl Automaton for SubstringAutomaton {
    fn feed(&mut self, bit: &mut Cursor<'_>) -> Result<Feed, ParseError> {
        let (text, _) = bit.read_string_or_raw_line()?;
        self.parts.push(text);
        Ok(Feed::Fed)
    }

    fn terminate(self: Box<Self>) -> Result<Option<Instruction>, ParseError> {
        let total = self.parts.join(" ");
        if total.trim().is_empty() {
            return Err(ParseError::new(
                format!("blank expected {} in last section", self.channel.as_str()),
                self.context,
            ));
        }
        Ok(Some(Instruction::Action(Box::new(ExpectOutput {
            channel: self.channel,
            expect: OutputExpect::Substring(total),
            context: self.context,
        }))))
    }
}
