//! Positioned cursor
//!
//! Wraps a [`Scanner`] with everything needed to turn a raw scan failure
//! into a user-facing diagnostic: the identity of the file being parsed,
//! a lazily maintained 1-based line/column position, and the chain of
//! inclusions that led here.
//!
//! The position is never recomputed from the start of the buffer on the
//! happy path: a trailing scanner snapshot marks the last synced offset,
//! and only the newlines in the delta since then are counted.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ParseError, ScanError};
use crate::scanner::{Scanner, Token};

/// Identity of one parsed source file, linked to the context that included
/// it (if any), forming a chain up to the root spec file.
#[derive(Debug)]
pub struct SourceFile {
    /// As given by the user.
    pub name: String,
    /// Canonicalized.
    pub path: PathBuf,
    /// Position of the include directive in the including file.
    pub includer: Option<SourceContext>,
}

/// A value-like snapshot of one position in a sourced file, taken at
/// specific moments for later error reporting, decoupled from the live
/// cursor.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub file: Arc<SourceFile>,
    pub line: u32,
    pub col: u32,
}

impl SourceContext {
    pub fn position(&self) -> String {
        format!("{}:{}:{}", self.file.name, self.line, self.col)
    }

    /// The include chain as contexts, innermost first.
    pub fn include_chain(&self) -> Vec<&SourceContext> {
        let mut chain = Vec::new();
        let mut includer = self.file.includer.as_ref();
        while let Some(cx) = includer {
            chain.push(cx);
            includer = cx.file.includer.as_ref();
        }
        chain
    }

    /// A context pointing nowhere in particular, for tests.
    pub fn mock() -> Self {
        Self {
            file: Arc::new(SourceFile {
                name: "<mock>".into(),
                path: PathBuf::from("<mock>"),
                includer: None,
            }),
            line: 1,
            col: 1,
        }
    }
}

/// The cursor handed to readers during parsing.
///
/// Forkable with `clone()` and committable with [`Cursor::commit`]; a fork
/// shares no mutable state with its parent, so speculative reads on a fork
/// never affect the original until explicitly committed.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    origin: &'a str,
    scanner: Scanner<'a>,
    synced: Scanner<'a>,
    file: Arc<SourceFile>,
    line: u32,
    col: u32,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str, file: Arc<SourceFile>) -> Self {
        let scanner = Scanner::new(input);
        let synced = scanner.clone();
        Self { origin: input, scanner, synced, file, line: 1, col: 1 }
    }

    /// Replace this cursor with a winning fork.
    pub fn commit(&mut self, other: Cursor<'a>) {
        *self = other;
    }

    /// Current position as a frozen context.
    pub fn context(&mut self) -> SourceContext {
        self.sync_position();
        SourceContext { file: self.file.clone(), line: self.line, col: self.col }
    }

    /// A parse error anchored at the current position.
    pub fn error(&mut self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.context())
    }

    pub fn rest(&self) -> &'a str {
        self.scanner.rest()
    }

    pub fn offset(&self) -> usize {
        self.scanner.offset()
    }

    pub fn is_consumed(&self) -> bool {
        self.scanner.is_consumed()
    }

    /// Restrict the remaining input to its first `len` bytes (used to hand
    /// automatons a cursor ending with the current line).
    pub fn truncate(&mut self, len: usize) {
        self.scanner.truncate(len);
    }

    /// Count the newlines between the last synced offset and the
    /// scanner's current one, then catch up.
    fn sync_position(&mut self) {
        let delta = self.scanner.offset() - self.synced.offset();
        if delta == 0 {
            return;
        }
        let consumed = &self.synced.rest()[..delta];
        let newlines = consumed.matches('\n').count() as u32;
        if newlines > 0 {
            self.line += newlines;
            let after_last = match consumed.rfind('\n') {
                Some(i) => &consumed[i + 1..],
                None => consumed,
            };
            self.col = after_last.chars().count() as u32 + 1;
        } else {
            self.col += consumed.chars().count() as u32;
        }
        self.synced = self.scanner.clone();
    }

    /// Upgrade a scan failure into a positioned parse error.
    ///
    /// The failing operation may have backtracked the reported offset
    /// behind the live scanner (speculative reads are undone), so first
    /// resynchronize the scanner to the reported offset, then count the
    /// position delta as usual.
    fn upgrade(&mut self, e: ScanError) -> ParseError {
        if e.offset != self.scanner.offset() {
            if e.offset >= self.synced.offset() {
                let mut resync = self.synced.clone();
                let delta = e.offset - resync.offset();
                if delta <= resync.rest().len() && resync.consume(delta).is_ok() {
                    self.scanner = resync;
                }
            } else {
                // Anchored before the last sync point: recount from the
                // buffer start (error path only).
                let anchored = &self.origin[..e.offset.min(self.origin.len())];
                self.line = anchored.matches('\n').count() as u32 + 1;
                let after_last = match anchored.rfind('\n') {
                    Some(i) => &anchored[i + 1..],
                    None => anchored,
                };
                self.col = after_last.chars().count() as u32 + 1;
                let mut resync = Scanner::new(self.origin);
                let _ = resync.consume(e.offset.min(self.origin.len()));
                self.scanner = resync;
                self.synced = self.scanner.clone();
                return ParseError::new(e.message, SourceContext {
                    file: self.file.clone(),
                    line: self.line,
                    col: self.col,
                });
            }
        }
        self.sync_position();
        ParseError::new(e.message, SourceContext {
            file: self.file.clone(),
            line: self.line,
            col: self.col,
        })
    }

    fn done<T>(&mut self, value: T) -> T {
        self.sync_position();
        value
    }

    fn wrap<T>(&mut self, result: Result<T, ScanError>) -> Result<T, ParseError> {
        match result {
            Ok(v) => Ok(self.done(v)),
            Err(e) => Err(self.upgrade(e)),
        }
    }

    // Deferred scanner operations, each syncing the position on success
    // and upgrading scan failures on the way out.

    pub fn lstrip(&mut self) {
        self.scanner.lstrip();
        self.sync_position();
    }

    pub fn advance(&mut self, n: usize) -> Result<&'a str, ParseError> {
        let r = self.scanner.consume(n);
        self.wrap(r)
    }

    pub fn match_token(&mut self, token: Token<'_>) -> bool {
        let r = self.scanner.match_token(token);
        self.done(r)
    }

    pub fn match_pattern(&mut self, pattern: &regex::Regex) -> Option<&'a str> {
        let r = self.scanner.match_pattern(pattern);
        self.done(r)
    }

    pub fn find(&mut self, token: Token<'_>) -> bool {
        let r = self.scanner.find(token);
        self.done(r)
    }

    pub fn find_either<'t>(&mut self, tokens: &[Token<'t>]) -> Option<Token<'t>> {
        let r = self.scanner.find_either(tokens);
        self.done(r)
    }

    pub fn read_split(&mut self) -> &'a str {
        let r = self.scanner.read_split();
        self.done(r)
    }

    pub fn read_string(&mut self) -> Option<String> {
        let r = self.scanner.read_string();
        self.done(r)
    }

    pub fn read_until(&mut self, stop: Token<'_>, consume_stop: bool) -> Option<&'a str> {
        let r = self.scanner.read_until(stop, consume_stop);
        self.done(r)
    }

    pub fn read_until_either<'t>(
        &mut self,
        stops: &[Token<'t>],
        consume_stop: bool,
    ) -> Option<(Token<'t>, &'a str)> {
        let r = self.scanner.read_until_either(stops, consume_stop);
        self.done(r)
    }

    pub fn read_string_or_raw_until<'t>(
        &mut self,
        stop: Token<'t>,
        raw_guards: &[Token<'t>],
        consume_stop: bool,
    ) -> Result<Option<(String, bool)>, ParseError> {
        let r = self.scanner.read_string_or_raw_until(stop, raw_guards, consume_stop);
        self.wrap(r)
    }

    pub fn read_string_or_raw_until_either<'t>(
        &mut self,
        stops: &[Token<'t>],
        raw_guards: &[Token<'t>],
        consume_stop: bool,
    ) -> Result<Option<(Token<'t>, String, bool)>, ParseError> {
        let r = self.scanner.read_string_or_raw_until_either(stops, raw_guards, consume_stop);
        self.wrap(r)
    }

    pub fn read_tuple(&mut self, accepted: &[usize]) -> Result<Vec<String>, ParseError> {
        let r = self.scanner.read_tuple(accepted);
        self.wrap(r)
    }

    pub fn read_tuple_opt(&mut self, accepted: &[usize]) -> Result<Option<Vec<String>>, ParseError> {
        let r = self.scanner.read_tuple_opt(accepted);
        self.wrap(r)
    }

    pub fn read_line(&mut self) -> &'a str {
        let r = self.scanner.read_line();
        self.done(r)
    }

    pub fn read_line_expect(&mut self, what: &str) -> Result<&'a str, ParseError> {
        let r = self.scanner.read_line_expect(what);
        self.wrap(r)
    }

    pub fn read_string_or_raw_line(&mut self) -> Result<(String, bool), ParseError> {
        let r = self.scanner.read_string_or_raw_line();
        self.wrap(r)
    }

    pub fn read_string_or_raw_line_expect(&mut self, what: &str) -> Result<String, ParseError> {
        let r = self.scanner.read_string_or_raw_line_expect(what);
        self.wrap(r)
    }

    pub fn find_empty_line(&mut self) -> bool {
        let r = self.scanner.find_empty_line();
        self.done(r)
    }

    pub fn check_empty_line(&mut self) -> Result<(), ParseError> {
        let r = self.scanner.check_empty_line();
        self.wrap(r)
    }

    pub fn read_heredoc(&mut self, name: &str, marker: Option<&str>) -> Result<String, ParseError> {
        let r = self.scanner.read_heredoc(name, marker);
        self.wrap(r)
    }
}

#[cfg(test)]
pub(crate) fn test_cursor(input: &str) -> Cursor<'_> {
    Cursor::new(
        input,
        Arc::new(SourceFile {
            name: "test.spec".into(),
            path: PathBuf::from("test.spec"),
            includer: None,
        }),
    )
}
