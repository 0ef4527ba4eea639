//! The readers section edits the set of active section types while the
//! file is being parsed, from the catalog of built-in readers:
//!
//! ```text
//! readers: - copy - file     # forget some section types
//!
//! readers:
//!     + copy                 # re-enable them later
//!     + file + command
//! ```
//!
//! The produced instruction is intercepted by the driver and executed
//! immediately, so the edits apply to all subsequent sections and never
//! to the ones already parsed.

use crate::cursor::{Cursor, SourceContext};
use crate::error::ParseError;
use crate::instruction::{Instruction, ParseEditor};
use crate::reader::{Automaton, Feed, MatchResult, Reader, SectionMatch};
use crate::scanner::Token;
use crate::sections;

struct ReadersEdit {
    add: bool,
    keyword: String,
    context: SourceContext,
}

/// Applies the collected registry edits to the driver.
pub struct EditReaders {
    edits: Vec<ReadersEdit>,
}

impl ParseEditor for EditReaders {
    fn execute(&self, driver: &mut crate::driver::Driver) -> Result<(), ParseError> {
        for edit in &self.edits {
            if edit.add {
                let Some(reader) = sections::reader_catalog(&edit.keyword) else {
                    return Err(ParseError::new(
                        format!("unknown reader {:?} in readers section", edit.keyword),
                        edit.context.clone(),
                    ));
                };
                driver.add_reader(reader);
            } else {
                driver.remove_readers(|r| r.keyword() == edit.keyword);
            }
        }
        Ok(())
    }
}

pub struct ReadersReader;

impl Reader for ReadersReader {
    fn keyword(&self) -> &str {
        "readers"
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        self.check_colon(cursor)?;
        Ok(SectionMatch::Soft(Box::new(ReadersAutomaton {
            edits: Vec::new(),
            adding: None,
            context,
        })))
    }
}

struct ReadersAutomaton {
    edits: Vec<ReadersEdit>,
    /// Last sign seen; sticky across lines.
    adding: Option<bool>,
    context: SourceContext,
}

impl Automaton for ReadersAutomaton {
    fn feed(&mut self, lex: &mut Cursor<'_>) -> Result<Feed, ParseError> {
        if lex.find_empty_line() {
            return Ok(Feed::Fed);
        }
        loop {
            match lex.find_either(&[Token::Lit("+"), Token::Lit("-")]) {
                Some(Token::Lit("+")) => self.adding = Some(true),
                Some(Token::Lit("-")) => self.adding = Some(false),
                _ => {}
            }
            let Some(add) = self.adding else {
                return Err(lex.error("missing sign (+ or -) before reader names"));
            };
            lex.lstrip();
            let context = lex.context();
            let keyword = lex.read_split();
            if keyword.is_empty() {
                return Ok(Feed::Fed);
            }
            if keyword.starts_with('#') {
                // Rest of the line is a comment.
                let _ = lex.read_until_either(&[Token::Lit("\n"), Token::End], true);
                return Ok(Feed::Fed);
            }
            self.edits.push(ReadersEdit { add, keyword: keyword.to_string(), context });
        }
    }

    fn terminate(self: Box<Self>) -> Result<Option<Instruction>, ParseError> {
        if self.edits.is_empty() {
            return Err(ParseError::new("missing reader names", self.context));
        }
        Ok(Some(Instruction::Edit(Box::new(EditReaders { edits: self.edits }))))
    }
}
