//! Parse driver
//!
//! Coordinates all registered readers over one cursor. Each step forks the
//! cursor once per reader and asks for a start match; exactly one reader
//! may claim a position (ambiguity is a hard error), and only the winning
//! fork's consumption becomes real. A hard match contributes a finished
//! instruction; a soft match switches the driver into automaton-feeding
//! mode until another reader interrupts or input runs out.
//!
//! Parse-editor instructions are executed against the driver on the spot,
//! so registry edits are visible to every subsequent step and never to
//! steps already taken.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cursor::{Cursor, SourceContext, SourceFile};
use crate::error::ParseError;
use crate::instruction::{Action, Instruction};
use crate::reader::{Feed, Flow, Reader, SectionMatch};
use crate::scanner::Token;
use crate::sections;

/// The parsing loop and its mutable reader registry.
pub struct Driver {
    readers: Vec<Box<dyn Reader>>,
}

impl Driver {
    pub fn new(readers: Vec<Box<dyn Reader>>) -> Self {
        Self { readers }
    }

    /// A driver loaded with every built-in section reader.
    pub fn with_default_readers() -> Self {
        Self::new(sections::default_readers())
    }

    /// Teach the driver a new section type.
    pub fn add_reader(&mut self, reader: Box<dyn Reader>) {
        self.readers.push(reader);
    }

    /// Forget section types matching the predicate.
    pub fn remove_readers(&mut self, doomed: impl Fn(&dyn Reader) -> bool) {
        self.readers.retain(|r| !doomed(r.as_ref()));
    }

    /// Registered keywords, in registration order.
    pub fn reader_keywords(&self) -> Vec<&str> {
        self.readers.iter().map(|r| r.keyword()).collect()
    }

    /// Let every reader attempt a match on its own fork, enforce that at
    /// most one claims the position, and commit the winning fork.
    fn find_matching_reader(
        &self,
        cursor: &mut Cursor<'_>,
    ) -> Result<Option<SectionMatch>, ParseError> {
        let mut matches: Vec<(SectionMatch, &str, Cursor)> = Vec::new();
        for reader in &self.readers {
            let mut fork = cursor.clone();
            match reader.section_match(&mut fork) {
                Ok(m) => matches.push((m, reader.name(), fork)),
                Err(Flow::Decline) => {}
                Err(Flow::Fatal(e)) => return Err(e),
            }
        }
        if matches.len() > 1 {
            let names: Vec<&str> = matches.iter().map(|(_, name, _)| *name).collect();
            let listed = match names.as_slice() {
                [a, b] => format!("both readers {a} and {b} match"),
                [init @ .., last] => {
                    format!("all readers {} and {last} match", init.join(", "))
                }
                [] => unreachable!(),
            };
            return Err(ParseError::new(format!("ambiguity: {listed}"), cursor.context()));
        }
        match matches.pop() {
            Some((m, _, fork)) => {
                cursor.commit(fork);
                Ok(Some(m))
            }
            None => Ok(None),
        }
    }

    /// Route one produced instruction: editors run against the driver
    /// immediately, everything else is collected in encounter order.
    fn collect(
        &mut self,
        instruction: Instruction,
        out: &mut Vec<Box<dyn Action>>,
    ) -> Result<(), ParseError> {
        match instruction {
            Instruction::Action(action) => out.push(action),
            Instruction::Edit(editor) => editor.execute(self)?,
        }
        Ok(())
    }

    /// Iteratively hand the cursor to readers so they consume it section
    /// by section, collecting the produced instructions.
    pub fn parse(&mut self, cursor: &mut Cursor<'_>) -> Result<Vec<Box<dyn Action>>, ParseError> {
        let mut out = Vec::new();
        let mut pending: Option<SectionMatch> = None;
        loop {
            let matched = match pending.take() {
                Some(m) => Some(m),
                None => self.find_matching_reader(cursor)?,
            };
            let Some(matched) = matched else {
                // Unmatched blank or comment-only lines are consumed
                // silently; anything else is fatal.
                if cursor.find_empty_line() {
                    if cursor.is_consumed() {
                        break;
                    }
                    continue;
                }
                return Err(cursor.error("no reader matches input"));
            };
            match matched {
                SectionMatch::Ignore => {
                    if cursor.is_consumed() {
                        break;
                    }
                }
                SectionMatch::Hard(instruction) => {
                    self.collect(instruction, &mut out)?;
                    if cursor.is_consumed() {
                        break;
                    }
                }
                SectionMatch::Soft(mut automaton) => {
                    loop {
                        if cursor.is_consumed() {
                            if let Some(i) = automaton.terminate()? {
                                self.collect(i, &mut out)?;
                            }
                            break;
                        }
                        // Another reader may start a new section here,
                        // interrupting the automaton.
                        if let Some(next) = self.find_matching_reader(cursor)? {
                            if let Some(i) = automaton.terminate()? {
                                self.collect(i, &mut out)?;
                            }
                            pending = Some(next);
                            break;
                        }
                        // Extract one bit and feed it.
                        let before = cursor.clone();
                        let len = automaton.split(cursor.rest());
                        let mut bit = cursor.clone();
                        bit.truncate(len);
                        cursor.advance(len)?;
                        cursor.match_token(Token::Lit("\n"));
                        match automaton.feed(&mut bit)? {
                            Feed::Fed => {}
                            Feed::NotMine => {
                                // Un-consume the declined bit so candidate
                                // matching restarts at its beginning.
                                cursor.commit(before);
                                if let Some(i) = automaton.terminate()? {
                                    self.collect(i, &mut out)?;
                                }
                                break;
                            }
                        }
                    }
                    if pending.is_none() && cursor.is_consumed() {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Parse one file into its instruction sequence.
    ///
    /// `includer` chains the new context to the position of the include
    /// directive when this parse is nested under another file's.
    pub fn parse_file(
        &mut self,
        name: &str,
        path: PathBuf,
        includer: Option<SourceContext>,
    ) -> Result<Vec<Box<dyn Action>>, ParseError> {
        let file = Arc::new(SourceFile { name: name.to_string(), path, includer });
        let input = std::fs::read_to_string(&file.path).map_err(|e| {
            ParseError::new(
                format!("could not read spec file {:?}: {e}", file.name),
                SourceContext { file: file.clone(), line: 1, col: 1 },
            )
        })?;
        let mut cursor = Cursor::new(&input, file);
        self.parse(&mut cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::test_cursor;
    use crate::instruction::ParseEditor;
    use crate::reader::{Automaton, MatchResult};

    /// An action that only records its own tag, for order checks.
    struct Tag {
        tag: String,
        context: SourceContext,
    }

    impl Action for Tag {
        fn apply(&self, _runner: &mut crate::runner::Runner) -> Result<(), crate::error::RunError> {
            Ok(())
        }
        fn context(&self) -> &SourceContext {
            &self.context
        }
        fn describe(&self) -> String {
            self.tag.clone()
        }
    }

    fn tag(tag: impl Into<String>, context: SourceContext) -> Instruction {
        Instruction::Action(Box::new(Tag { tag: tag.into(), context }))
    }

    fn tags(actions: &[Box<dyn Action>]) -> Vec<String> {
        actions.iter().map(|a| a.describe()).collect()
    }

    /// Hard reader: `word <name>` on one line.
    struct WordReader {
        keyword: &'static str,
    }

    impl Reader for WordReader {
        fn keyword(&self) -> &str {
            self.keyword
        }
        fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
            let context = self.check_keyword(cursor)?;
            self.check_colon(cursor)?;
            let name = cursor.read_line_expect("a name")?;
            Ok(SectionMatch::Hard(tag(format!("{}={name}", self.keyword), context)))
        }
    }

    /// Soft reader: `lines:` collects subsequent non-blank lines.
    struct LinesReader;

    impl Reader for LinesReader {
        fn keyword(&self) -> &str {
            "lines"
        }
        fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
            let context = self.check_keyword(cursor)?;
            self.check_colon(cursor)?;
            Ok(SectionMatch::Soft(Box::new(LinesAutomaton {
                context,
                lines: Vec::new(),
                reject: None,
            })))
        }
    }

    struct LinesAutomaton {
        context: SourceContext,
        lines: Vec<String>,
        /// Lines equal to this are refused with `Feed::NotMine`.
        reject: Option<String>,
    }

    impl Automaton for LinesAutomaton {
        fn feed(&mut self, bit: &mut Cursor<'_>) -> Result<Feed, ParseError> {
            if bit.find_empty_line() {
                return Ok(Feed::Fed);
            }
            let line = bit.read_line().to_string();
            if self.reject.as_deref() == Some(line.as_str()) {
                return Ok(Feed::NotMine);
            }
            self.lines.push(line);
            Ok(Feed::Fed)
        }
        fn terminate(self: Box<Self>) -> Result<Option<Instruction>, ParseError> {
            if self.lines.is_empty() {
                return Err(ParseError::new(
                    "lines section left open with no content",
                    self.context,
                ));
            }
            Ok(Some(tag(format!("lines={}", self.lines.join("|")), self.context)))
        }
    }

    fn word(keyword: &'static str) -> Box<dyn Reader> {
        Box::new(WordReader { keyword })
    }

    #[test]
    fn test_hard_sections_collect_in_order() {
        let mut driver = Driver::new(vec![word("alpha"), word("beta")]);
        let mut cursor = test_cursor("alpha: one\nbeta: two\nalpha: three\n");
        let actions = driver.parse(&mut cursor).unwrap();
        assert_eq!(tags(&actions), vec!["alpha=one", "beta=two", "alpha=three"]);
    }

    #[test]
    fn test_blank_and_comment_lines_consumed_silently() {
        let mut driver = Driver::new(vec![word("alpha")]);
        let mut cursor = test_cursor("\n# comment\n\nalpha: one\n  # trailing\n");
        let actions = driver.parse(&mut cursor).unwrap();
        assert_eq!(tags(&actions), vec!["alpha=one"]);
    }

    #[test]
    fn test_no_reader_matches_is_fatal() {
        let mut driver = Driver::new(vec![word("alpha")]);
        let mut cursor = test_cursor("alpha: one\nunknown: two\n");
        let e = driver.parse(&mut cursor).unwrap_err();
        assert!(e.message.contains("no reader matches input"));
        assert_eq!(e.context.line, 2);
    }

    #[test]
    fn test_ambiguity_is_fatal_and_names_readers() {
        /// Bare statement: the keyword alone is a full match.
        struct BareReader {
            keyword: &'static str,
        }
        impl Reader for BareReader {
            fn keyword(&self) -> &str {
                self.keyword
            }
            fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
                let context = self.check_keyword(cursor)?;
                Ok(SectionMatch::Hard(tag(self.keyword, context)))
            }
        }
        // One keyword prefixes the other: both claim the same start.
        let mut driver = Driver::new(vec![
            Box::new(BareReader { keyword: "RUN" }),
            Box::new(BareReader { keyword: "RUNTEST" }),
        ]);
        let mut cursor = test_cursor("RUNTEST\n");
        let e = driver.parse(&mut cursor).unwrap_err();
        assert!(e.message.contains("ambiguity: both readers RUN and RUNTEST match"));
    }

    #[test]
    fn test_ambiguity_detected_between_hard_and_soft() {
        let mut driver = Driver::new(vec![word("lines"), Box::new(LinesReader)]);
        let mut cursor = test_cursor("lines: one\n");
        let e = driver.parse(&mut cursor).unwrap_err();
        assert!(e.message.contains("both readers lines and lines match"));
    }

    #[test]
    fn test_decline_leaves_cursor_untouched() {
        let mut driver = Driver::new(vec![word("alpha")]);
        let mut cursor = test_cursor("beta");
        let offset = cursor.offset();
        let r = driver.find_matching_reader(&mut cursor).unwrap();
        assert!(r.is_none());
        assert_eq!(cursor.offset(), offset);
    }

    #[test]
    fn test_soft_section_interrupted_by_next_reader() {
        let mut driver = Driver::new(vec![word("alpha"), Box::new(LinesReader)]);
        let mut cursor = test_cursor("lines:\n  one\n  two\nalpha: next\n");
        let actions = driver.parse(&mut cursor).unwrap();
        assert_eq!(tags(&actions), vec!["lines=one|two", "alpha=next"]);
    }

    #[test]
    fn test_soft_section_terminated_by_exhaustion() {
        let mut driver = Driver::new(vec![Box::new(LinesReader)]);
        let mut cursor = test_cursor("lines:\n  one\n  two");
        let actions = driver.parse(&mut cursor).unwrap();
        assert_eq!(tags(&actions), vec!["lines=one|two"]);
    }

    #[test]
    fn test_unterminated_automaton_errors_on_exhaustion() {
        let mut driver = Driver::new(vec![Box::new(LinesReader)]);
        let mut cursor = test_cursor("lines:\n\n");
        let e = driver.parse(&mut cursor).unwrap_err();
        assert!(e.message.contains("lines section left open"));
    }

    #[test]
    fn test_automaton_decline_unconsumes_the_bit() {
        // The automaton refuses "stop": the driver restores the cursor to
        // the bit's start and resumes candidate matching there. With no
        // reader claiming it, the line is a fatal parse error at its own
        // position, proving it was not consumed by the automaton.
        struct Rejecting;
        impl Reader for Rejecting {
            fn keyword(&self) -> &str {
                "lines"
            }
            fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
                let context = self.check_keyword(cursor)?;
                self.check_colon(cursor)?;
                Ok(SectionMatch::Soft(Box::new(LinesAutomaton {
                    context,
                    lines: Vec::new(),
                    reject: Some("stop".to_string()),
                })))
            }
        }
        let mut driver = Driver::new(vec![Box::new(Rejecting)]);
        let mut cursor = test_cursor("lines:\n  one\nstop\n");
        let e = driver.parse(&mut cursor).unwrap_err();
        assert!(e.message.contains("no reader matches input"));
        assert_eq!(e.context.line, 3);
        assert_eq!(e.context.col, 1);
    }

    #[test]
    fn test_ignorer_reader_consumes_without_output() {
        struct Skipper;
        impl Reader for Skipper {
            fn keyword(&self) -> &str {
                "skip"
            }
            fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
                self.check_keyword(cursor)?;
                cursor.check_empty_line().map_err(Flow::Fatal)?;
                Ok(SectionMatch::Ignore)
            }
        }
        let mut driver = Driver::new(vec![word("alpha"), Box::new(Skipper)]);
        let mut cursor = test_cursor("skip\nalpha: one\nskip\n");
        let actions = driver.parse(&mut cursor).unwrap();
        assert_eq!(tags(&actions), vec!["alpha=one"]);
    }

    #[test]
    fn test_editor_mutates_registry_for_subsequent_steps_only() {
        /// Editor registering a new word reader when executed.
        struct Enable(&'static str);
        impl ParseEditor for Enable {
            fn execute(&self, driver: &mut Driver) -> Result<(), ParseError> {
                driver.add_reader(word(self.0));
                Ok(())
            }
        }
        struct EnableReader;
        impl Reader for EnableReader {
            fn keyword(&self) -> &str {
                "enable"
            }
            fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
                self.check_keyword(cursor)?;
                self.check_colon(cursor)?;
                let name = cursor.read_line_expect("a reader name")?;
                let name: &'static str = match name {
                    "beta" => "beta",
                    other => {
                        return Err(Flow::Fatal(
                            cursor.error(format!("unknown reader {other:?}")),
                        ))
                    }
                };
                Ok(SectionMatch::Hard(Instruction::Edit(Box::new(Enable(name)))))
            }
        }

        // Before the editor runs, beta is unknown...
        let mut driver = Driver::new(vec![word("alpha"), Box::new(EnableReader)]);
        let mut cursor = test_cursor("beta: too-early\n");
        assert!(driver.parse(&mut cursor).is_err());

        // ...after it, beta parses; and the editor itself emits nothing.
        let mut driver = Driver::new(vec![word("alpha"), Box::new(EnableReader)]);
        let mut cursor = test_cursor("alpha: one\nenable: beta\nbeta: two\n");
        let actions = driver.parse(&mut cursor).unwrap();
        assert_eq!(tags(&actions), vec!["alpha=one", "beta=two"]);
        assert_eq!(driver.reader_keywords(), vec!["alpha", "enable", "beta"]);
    }

    #[test]
    fn test_every_consumed_character_is_accounted() {
        let mut driver = Driver::new(vec![word("alpha"), Box::new(LinesReader)]);
        let input = "alpha: one\nlines:\n  a\n\n  b\nalpha: two\n";
        let mut cursor = test_cursor(input);
        let actions = driver.parse(&mut cursor).unwrap();
        assert!(cursor.is_consumed());
        assert_eq!(cursor.offset(), input.len());
        assert_eq!(tags(&actions), vec!["alpha=one", "lines=a|b", "alpha=two"]);
    }
}
