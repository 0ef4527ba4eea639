//! Reader and automaton protocol
//!
//! Readers are responsible for matching one particular section of the
//! spec file, given a forked cursor handed to them by the driver. They are
//! free to consume it, but must not consume more than they need: the
//! winning fork is committed and offered to subsequent readers.
//!
//! "Hard" readers find the end of their own match and return a finished
//! [`Instruction`] directly. "Soft" readers only recognize that their
//! section started; they return an [`Automaton`] which the driver feeds
//! with subsequent input, bit by bit (one line at a time by default),
//! until another reader matches and takes over. The same reader may behave
//! hard or soft depending on the input, conventionally chosen by the
//! section introducer: `keyword:` is soft, `keyword::` is hard.

use crate::cursor::{Cursor, SourceContext};
use crate::error::ParseError;
use crate::instruction::Instruction;
use crate::scanner::Token;

/// Outcome of a successful section match.
pub enum SectionMatch {
    /// Parsing is complete: a finished instruction.
    Hard(Instruction),
    /// Parsing is incomplete: feed this automaton.
    Soft(Box<dyn Automaton>),
    /// Matched and consumed, but yields nothing (blank/comment skippers).
    Ignore,
}

/// The non-success channel of a match attempt: declining is control flow,
/// not an error, and must never be conflated with a genuine parse failure.
pub enum Flow {
    /// The reader does not recognize the input at this position.
    Decline,
    /// The reader recognized its section but the input is malformed.
    Fatal(ParseError),
}

impl From<ParseError> for Flow {
    fn from(e: ParseError) -> Self {
        Flow::Fatal(e)
    }
}

pub type MatchResult = Result<SectionMatch, Flow>;

/// Which introducer a section was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colon {
    /// `:` — incremental section, fed line by line.
    Single,
    /// `::` — self-delimited section.
    Double,
}

/// A section reader: a keyword plus a match procedure.
pub trait Reader {
    /// The keyword introducing this section, used in reports.
    fn keyword(&self) -> &str;

    /// Attempt a match at the fork's position: consume the keyword and
    /// commit, or decline without having consumed anything that matters
    /// (the fork is discarded on decline).
    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult;

    /// Section name for diagnostics.
    fn name(&self) -> &str {
        self.keyword()
    }

    /// Consume the keyword or decline. Returns the keyword's context for
    /// instructions to keep.
    fn check_keyword(&self, cursor: &mut Cursor<'_>) -> Result<SourceContext, Flow> {
        let context = cursor.context();
        if !cursor.match_token(Token::Lit(self.keyword())) {
            return Err(Flow::Decline);
        }
        Ok(context)
    }

    /// Require the single-colon introducer.
    fn check_colon(&self, cursor: &mut Cursor<'_>) -> Result<(), Flow> {
        if !cursor.find(Token::Lit(":")) {
            return Err(Flow::Fatal(cursor.error(format!(
                "missing colon ':' to introduce {} section",
                self.name()
            ))));
        }
        Ok(())
    }

    /// Require the double-colon introducer.
    fn check_double_colon(&self, cursor: &mut Cursor<'_>) -> Result<(), Flow> {
        if !cursor.find(Token::Lit("::")) {
            return Err(Flow::Fatal(cursor.error(format!(
                "missing double colon '::' to introduce {} section",
                self.name()
            ))));
        }
        Ok(())
    }

    /// Accept either introducer and report which one was written. The
    /// longest-match rule of `find_either` keeps `:` from winning over
    /// `::` when both start at the same place.
    fn check_colon_type(&self, cursor: &mut Cursor<'_>) -> Result<Colon, Flow> {
        match cursor.find_either(&[Token::Lit(":"), Token::Lit("::")]) {
            Some(Token::Lit("::")) => Ok(Colon::Double),
            Some(Token::Lit(":")) => Ok(Colon::Single),
            _ => Err(Flow::Fatal(cursor.error(format!(
                "missing colon ':' (incremental) or double colon '::' (delimited) \
                 to introduce {} section",
                self.name()
            )))),
        }
    }
}

/// True when the keyword just matched ends at a word boundary. Bare
/// statement keywords use this to decline on longer identifiers instead
/// of claiming their prefix.
pub fn at_keyword_boundary(cursor: &Cursor<'_>) -> bool {
    !cursor
        .rest()
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Outcome of feeding one bit to an automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// The bit was consumed into the object under construction.
    Fed,
    /// The bit belongs to someone else: stop feeding, finalize, and let
    /// candidate matching restart at the bit's start.
    NotMine,
}

/// Incremental object builder returned by soft-matching readers.
///
/// The driver feeds it one bit at a time — by default the next line,
/// handed as a cursor restricted to that line — until another reader's
/// start-match interrupts it or input runs out, then finalizes it with
/// [`Automaton::terminate`]. Termination consumes the automaton, so it
/// cannot run twice.
pub trait Automaton {
    /// How many bytes of the remaining input form the next bit, excluding
    /// the line terminator.
    fn split(&self, rest: &str) -> usize {
        rest.find('\n').unwrap_or(rest.len())
    }

    /// Consume one bit into the object under construction.
    fn feed(&mut self, bit: &mut Cursor<'_>) -> Result<Feed, ParseError>;

    /// Finalize into an instruction, or `None` to silently produce
    /// nothing. Must error when required parts were never fed, naming the
    /// construct left open.
    fn terminate(self: Box<Self>) -> Result<Option<Instruction>, ParseError>;
}
