//! Primitive text scanner
//!
//! A cheap-to-fork cursor over a borrowed buffer, tokenizing on the fly and
//! counting consumed input. Every operation either fully commits or leaves
//! the scanner untouched, so speculative matches can be layered freely: fork
//! with `clone()`, try something, and either drop the fork or assign it back.
//!
//! Failures at this level are [`ScanError`]s carrying only a consumed-offset;
//! the positioned cursor upgrades them to user-facing diagnostics.

use regex::Regex;

use crate::error::ScanError;

/// A matchable token: literal text, or the end-of-input sentinel.
///
/// The sentinel is a valid stop everywhere a literal is: as a stop for
/// [`Scanner::read_until`] it always succeeds by consuming everything left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'t> {
    Lit(&'t str),
    End,
}

impl<'t> Token<'t> {
    /// Human-readable form for error messages.
    fn describe(&self) -> String {
        match self {
            Token::Lit(s) => format!("{s:?}"),
            Token::End => "end of input".to_string(),
        }
    }
}

impl<'t> From<&'t str> for Token<'t> {
    fn from(s: &'t str) -> Self {
        Token::Lit(s)
    }
}

/// Default raw guard: a raw field read must not cross a line boundary.
pub const NEWLINE_GUARD: &[Token<'static>] = &[Token::Lit("\n")];

/// The line-comment sign, recognized outside string literals.
pub const COMMENT_SIGN: &str = "#";

/// A forkable text cursor.
///
/// Invariant: `offset + rest.len()` equals the length of the original
/// buffer (unless the scanner was deliberately restricted to a sub-slice
/// with [`Scanner::truncate`]).
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    rest: &'a str,
    offset: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { rest: input, offset: 0 }
    }

    /// Remaining unconsumed input.
    pub fn rest(&self) -> &'a str {
        self.rest
    }

    /// Bytes consumed since the start of the original buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// True when no input is left.
    pub fn is_consumed(&self) -> bool {
        self.rest.is_empty()
    }

    /// Restrict the remaining input to its first `len` bytes. Used to hand
    /// an automaton a cursor that ends with the current line.
    pub fn truncate(&mut self, len: usize) {
        if len <= self.rest.len() && self.rest.is_char_boundary(len) {
            self.rest = &self.rest[..len];
        }
    }

    /// A scan error anchored at the current position.
    pub fn error(&self, message: impl Into<String>) -> ScanError {
        ScanError::new(message, self.offset)
    }

    fn advance(&mut self, n: usize) {
        self.rest = &self.rest[n..];
        self.offset += n;
    }

    /// Raw take of `n` bytes.
    pub fn consume(&mut self, n: usize) -> Result<&'a str, ScanError> {
        if n > self.rest.len() {
            return Err(self.error("attempt to read past end of input"));
        }
        if !self.rest.is_char_boundary(n) {
            return Err(self.error("read does not fall on a character boundary"));
        }
        let read = &self.rest[..n];
        self.advance(n);
        Ok(read)
    }

    /// Take everything left.
    pub fn consume_all(&mut self) -> &'a str {
        let read = self.rest;
        self.advance(read.len());
        read
    }

    /// Strip leading whitespace, newlines included.
    pub fn lstrip(&mut self) -> &mut Self {
        let stripped = self.rest.trim_start();
        let n = self.rest.len() - stripped.len();
        self.advance(n);
        self
    }

    /// Strip leading whitespace without crossing a line boundary.
    pub fn lstrip_inline(&mut self) -> &mut Self {
        let n = self
            .rest
            .char_indices()
            .find(|&(_, c)| !c.is_whitespace() || c == '\n' || c == '\r')
            .map_or(self.rest.len(), |(i, _)| i);
        self.advance(n);
        self
    }

    /// Consume the token if the input starts with it. The empty literal
    /// always matches; `End` matches only exhausted input.
    pub fn match_token(&mut self, token: Token<'_>) -> bool {
        match token {
            Token::End => self.rest.is_empty(),
            Token::Lit(s) => {
                if self.rest.starts_with(s) {
                    self.advance(s.len());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Pattern form of [`Scanner::match_token`]: consume and return the
    /// leading input matched by the regex, or consume nothing. The match
    /// must start at the current position.
    pub fn match_pattern(&mut self, pattern: &Regex) -> Option<&'a str> {
        let found = pattern.find(self.rest)?;
        if found.start() != 0 {
            return None;
        }
        let read = &self.rest[..found.end()];
        self.advance(found.end());
        Some(read)
    }

    /// Consume whitespace until the token is found; fail without consuming
    /// if anything but whitespace precedes it (or it is absent).
    pub fn find(&mut self, token: Token<'_>) -> bool {
        match token {
            Token::Lit("") => true,
            Token::End => {
                let mut fork = self.clone();
                fork.lstrip();
                if fork.rest.is_empty() {
                    *self = fork;
                    true
                } else {
                    false
                }
            }
            Token::Lit(s) => {
                let Some(idx) = self.rest.find(s) else {
                    return false;
                };
                if !self.rest[..idx].trim().is_empty() {
                    return false;
                }
                self.advance(idx + s.len());
                true
            }
        }
    }

    /// Like [`Scanner::find`] over several candidates. The longest matching
    /// token wins; any literal beats the end sentinel; ties go to the first
    /// listed. Returns the winner.
    pub fn find_either<'t>(&mut self, tokens: &[Token<'t>]) -> Option<Token<'t>> {
        let mut best: Option<(Token<'t>, Scanner<'a>)> = None;
        for &token in tokens {
            let skip = match (&best, token) {
                (None, _) => false,
                (Some((Token::End, _)), _) => false,
                (Some((Token::Lit(b), _)), Token::Lit(t)) => t.len() <= b.len(),
                (Some((Token::Lit(_), _)), Token::End) => true,
            };
            if skip {
                continue;
            }
            let mut fork = self.clone();
            if fork.find(token) {
                best = Some((token, fork));
            }
        }
        let (winner, fork) = best?;
        *self = fork;
        Some(winner)
    }

    /// Consume and return the next whitespace-delimited word, skipping
    /// leading whitespace. Empty when only whitespace is left.
    pub fn read_split(&mut self) -> &'a str {
        self.lstrip();
        let end = self
            .rest
            .char_indices()
            .find(|&(_, c)| c.is_whitespace())
            .map_or(self.rest.len(), |(i, _)| i);
        let read = &self.rest[..end];
        self.advance(end);
        read
    }

    /// Find and decode the next string literal, or consume nothing.
    pub fn read_string(&mut self) -> Option<String> {
        let (value, consumed) = find_string_literal(self.rest)?;
        self.advance(consumed);
        Some(value)
    }

    /// Raw read up to the stop. `None` (no consumption) when the stop is
    /// absent. With `consume_stop` false the stop is left in the input.
    pub fn read_until(&mut self, stop: Token<'_>, consume_stop: bool) -> Option<&'a str> {
        match stop {
            Token::End => Some(self.consume_all()),
            Token::Lit("") => Some(""),
            Token::Lit(s) => {
                let idx = self.rest.find(s)?;
                let read = &self.rest[..idx];
                self.advance(if consume_stop { idx + s.len() } else { idx });
                Some(read)
            }
        }
    }

    /// Raw read until the first of several stops, returning which one it
    /// was. First position wins; at equal positions the longest literal
    /// wins, and a literal always beats the end sentinel.
    pub fn read_until_either<'t>(
        &mut self,
        stops: &[Token<'t>],
        consume_stop: bool,
    ) -> Option<(Token<'t>, &'a str)> {
        let mut best: Option<(Token<'t>, usize)> = None;
        for &stop in stops {
            let found = match stop {
                Token::End => Some(self.rest.len()),
                Token::Lit(s) => self.rest.find(s),
            };
            let Some(pos) = found else { continue };
            best = match best {
                None => Some((stop, pos)),
                Some((b, bpos)) => {
                    if pos < bpos {
                        Some((stop, pos))
                    } else if pos == bpos && longer_literal(stop, b) {
                        Some((stop, pos))
                    } else {
                        Some((b, bpos))
                    }
                }
            };
        }
        let (winner, _) = best?;
        let read = self.read_until(winner, consume_stop)?;
        Some((winner, read))
    }

    /// The central field-disambiguation read: a quoted string followed by
    /// nothing but whitespace before the stop, or a raw read.
    ///
    /// Backtrackable: returns `None` without consuming when the stop cannot
    /// be reached (including when a raw read would first hit one of the
    /// `raw_guards`, newline by default). Errors when string and raw modes
    /// are mixed within the field. The boolean is true for a raw read.
    pub fn read_string_or_raw_until<'t>(
        &mut self,
        stop: Token<'t>,
        raw_guards: &[Token<'t>],
        consume_stop: bool,
    ) -> Result<Option<(String, bool)>, ScanError> {
        Ok(self
            .read_string_or_raw_until_either(&[stop], raw_guards, consume_stop)?
            .map(|(_, text, raw)| (text, raw)))
    }

    /// Same as [`Scanner::read_string_or_raw_until`] with several stops,
    /// returning the winning one.
    pub fn read_string_or_raw_until_either<'t>(
        &mut self,
        stops: &[Token<'t>],
        raw_guards: &[Token<'t>],
        consume_stop: bool,
    ) -> Result<Option<(Token<'t>, String, bool)>, ScanError> {
        let mut fork = self.clone();
        if let Some(string) = fork.read_string() {
            // Nothing but whitespace tolerated until the stop.
            let before = fork.offset();
            let Some((stop, between)) = fork.read_until_either(stops, consume_stop) else {
                return Ok(None);
            };
            let garbage = between.trim();
            if !garbage.is_empty() {
                let lead = between.len() - between.trim_start().len();
                return Err(ScanError::new(
                    format!(
                        "unexpected data found between string and {}: {:?}",
                        stop.describe(),
                        garbage
                    ),
                    before + lead,
                ));
            }
            *self = fork;
            return Ok(Some((stop, string, false)));
        }

        let mut guarded: Vec<Token<'t>> = stops.to_vec();
        guarded.extend_from_slice(raw_guards);
        let Some((stop, read)) = fork.read_until_either(&guarded, consume_stop) else {
            return Ok(None);
        };
        if !stops.contains(&stop) {
            // A raw guard fired first: treat as "stop not found here".
            return Ok(None);
        }
        // The raw read may hide unwanted data *then* a string: only accept
        // it as raw if no string literal parses anywhere within it.
        let mut sub = Scanner::new(read);
        loop {
            let quotes = [Token::Lit("\""), Token::Lit("'")];
            let Some((quote, before)) = sub.read_until_either(&quotes, false) else {
                break;
            };
            if sub.clone().read_string().is_some() {
                self.lstrip();
                return Err(self.error(format!(
                    "unexpected data found before string: {:?}",
                    before.trim()
                )));
            }
            sub.match_token(quote);
        }
        *self = fork;
        Ok(Some((stop, read.trim().to_string(), true)))
    }

    /// Parenthesized, comma-separated string-or-raw fields.
    ///
    /// `accepted` lists the accepted field counts (empty means any).
    /// A trailing comma keeps a singleton a tuple; the last empty raw read
    /// before the closing parenthesis is dropped.
    pub fn read_tuple(&mut self, accepted: &[usize]) -> Result<Vec<String>, ScanError> {
        match self.read_tuple_inner(accepted, false)? {
            Some(fields) => Ok(fields),
            None => Err(self.error("missing opening parenthesis")),
        }
    }

    /// Like [`Scanner::read_tuple`], returning `None` without consuming
    /// when no opening parenthesis follows.
    pub fn read_tuple_opt(&mut self, accepted: &[usize]) -> Result<Option<Vec<String>>, ScanError> {
        self.read_tuple_inner(accepted, true)
    }

    fn read_tuple_inner(
        &mut self,
        accepted: &[usize],
        optional: bool,
    ) -> Result<Option<Vec<String>>, ScanError> {
        let mut fork = self.clone();
        fork.lstrip();
        let opening = fork.offset();
        if !fork.match_token(Token::Lit("(")) {
            if optional {
                return Ok(None);
            }
            return Err(fork.error("missing opening parenthesis"));
        }
        let mut fields: Vec<String> = Vec::new();
        let mut last_was_empty_raw = false;
        loop {
            let separators = [Token::Lit(","), Token::Lit(")")];
            let Some((stop, read, raw)) =
                fork.read_string_or_raw_until_either(&separators, NEWLINE_GUARD, true)?
            else {
                return Err(ScanError::new(
                    "missing comma in tuple or unmatched parenthesis",
                    opening,
                ));
            };
            last_was_empty_raw = raw && read.is_empty();
            fields.push(read);
            if stop == Token::Lit(")") {
                break;
            }
        }
        let closing = fork.offset() - 1;
        if last_was_empty_raw {
            // Closing comma or empty tuple.
            fields.pop();
        }
        if !accepted.is_empty() && !accepted.contains(&fields.len()) {
            let expected = match accepted {
                [one] => one.to_string(),
                [init @ .., last] => format!(
                    "either {} or {}",
                    init.iter().map(usize::to_string).collect::<Vec<_>>().join(", "),
                    last
                ),
                [] => unreachable!(),
            };
            let plural = if accepted.last().copied().unwrap_or(0) > 1 { "s" } else { "" };
            let listed = fields
                .iter()
                .map(|f| format!("{f:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ScanError::new(
                format!(
                    "expected {expected} value{plural} in tuple, found {} instead: ({listed})",
                    fields.len()
                ),
                closing,
            ));
        }
        *self = fork;
        Ok(Some(fields))
    }

    /// Raw read until the first comment sign, end of line or end of input,
    /// consuming the whole line and returning the stripped payload.
    pub fn read_line(&mut self) -> &'a str {
        let stops = [Token::Lit(COMMENT_SIGN), Token::Lit("\n"), Token::End];
        let Some((stop, read)) = self.read_until_either(&stops, true) else {
            return "";
        };
        if stop == Token::Lit(COMMENT_SIGN) {
            // Dismiss the rest of the commented line.
            let _ = self.read_until_either(&[Token::Lit("\n"), Token::End], true);
        }
        read.trim()
    }

    /// [`Scanner::read_line`] erroring (without consuming) on a blank read.
    pub fn read_line_expect(&mut self, what: &str) -> Result<&'a str, ScanError> {
        let mut fork = self.clone();
        let read = fork.read_line();
        if read.is_empty() {
            return Err(self.error(format!("missing expected data: {what:?}")));
        }
        *self = fork;
        Ok(read)
    }

    /// Like [`Scanner::read_line`], but the payload may be one quoted
    /// string (so it can contain comment signs, arrows, parentheses...).
    /// The boolean is true for a raw (unquoted) read.
    pub fn read_string_or_raw_line(&mut self) -> Result<(String, bool), ScanError> {
        let stops = [Token::Lit(COMMENT_SIGN), Token::Lit("\n"), Token::End];
        let Some((stop, text, raw)) =
            self.read_string_or_raw_until_either(&stops, NEWLINE_GUARD, true)?
        else {
            return Ok((String::new(), true));
        };
        if stop == Token::Lit(COMMENT_SIGN) {
            let _ = self.read_until_either(&[Token::Lit("\n"), Token::End], true);
        }
        Ok((text, raw))
    }

    /// [`Scanner::read_string_or_raw_line`] erroring (without consuming) on
    /// a blank *raw* read. An explicitly quoted empty string is accepted.
    pub fn read_string_or_raw_line_expect(&mut self, what: &str) -> Result<String, ScanError> {
        let mut fork = self.clone();
        let (text, raw) = fork.read_string_or_raw_line()?;
        if raw && text.is_empty() {
            return Err(self.error(format!("missing expected data: {what:?}")));
        }
        *self = fork;
        Ok(text)
    }

    /// Consume a blank-or-comment-only line tail, or consume nothing.
    pub fn find_empty_line(&mut self) -> bool {
        let mut fork = self.clone();
        if !fork.read_line().is_empty() {
            return false;
        }
        *self = fork;
        true
    }

    /// Like [`Scanner::find_empty_line`], erroring on unexpected data.
    pub fn check_empty_line(&mut self) -> Result<(), ScanError> {
        let mut fork = self.clone();
        let read = fork.read_line();
        if !read.is_empty() {
            return Err(self.error(format!("unexpected data after end of line: {read:?}")));
        }
        *self = fork;
        Ok(())
    }

    /// Verbatim block extraction.
    ///
    /// Reads a terminator token from the input unless one is supplied,
    /// requires the rest of that line to be blank or comment-only, then
    /// captures everything up to the first line-start occurrence of the
    /// terminator. The capture is dedented unless the terminator is written
    /// in the bracketed `<...>` form. `name` labels the block in errors.
    pub fn read_heredoc(&mut self, name: &str, marker: Option<&str>) -> Result<String, ScanError> {
        let mut fork = self.clone();
        let owned;
        let marker = match marker {
            Some(m) => m,
            None => {
                fork.lstrip();
                let at = fork.offset();
                let m = fork.read_split();
                if m.is_empty() {
                    return Err(ScanError::new(
                        format!("unexpected end of input when reading end-of-{name} marker"),
                        at,
                    ));
                }
                fork.check_empty_line()?;
                owned = m.to_string();
                &owned
            }
        };
        let marker_at = fork.offset();
        let body = fork.rest();
        let end = if body.starts_with(marker) {
            Some(0)
        } else {
            body.find(&format!("\n{marker}")).map(|i| i + 1)
        };
        let Some(end) = end else {
            return Err(ScanError::new(
                format!("missing closing {name} marker: {marker:?}"),
                marker_at,
            ));
        };
        let read = &body[..end];
        fork.consume(end + marker.len())?;
        let text = if marker.starts_with('<') && marker.ends_with('>') {
            read.to_string()
        } else {
            dedent(read)
        };
        *self = fork;
        Ok(text)
    }
}

/// True when `a` is a literal strictly longer than `b` (or `b` is the end
/// sentinel) — the tie-break among stops matching at the same position.
fn longer_literal(a: Token<'_>, b: Token<'_>) -> bool {
    match (a, b) {
        (Token::Lit(a), Token::Lit(b)) => a.len() > b.len(),
        (Token::Lit(_), Token::End) => true,
        _ => false,
    }
}

/// Remove the common leading whitespace of all non-blank lines.
fn dedent(text: &str) -> String {
    let mut prefix: Option<&str> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let ws = &line[..line.len() - line.trim_start().len()];
        prefix = Some(match prefix {
            None => ws,
            Some(p) => {
                let common = p
                    .char_indices()
                    .zip(ws.chars())
                    .find(|((_, a), b)| a != b)
                    .map_or(p.len().min(ws.len()), |((i, _), _)| i);
                &p[..common]
            }
        });
    }
    let prefix = prefix.unwrap_or("");
    if prefix.is_empty() {
        return text.to_string();
    }
    text.split('\n')
        .map(|line| line.strip_prefix(prefix).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// If the input holds a string literal preceded only by whitespace, decode
/// it and report the byte count consumed through its closing delimiter.
///
/// Delimiters are `'`, `"` and their tripled forms; the tripled form wins
/// when both start at the same place. The candidate literal is extended
/// past escaped or embedded delimiters until it decodes as a whole, which
/// keeps adjacent literals (`'a''b'`) from being over-consumed.
pub fn find_string_literal(input: &str) -> Option<(String, usize)> {
    let mut best: Option<(usize, &str)> = None;
    for quote in ["'''", "\"\"\"", "'", "\""] {
        if let Some(pos) = input.find(quote) {
            // Strictly-earlier keeps the tripled form over its first char.
            if best.map_or(true, |(bp, _)| pos < bp) {
                best = Some((pos, quote));
            }
        }
    }
    let (start, quote) = best?;
    if !input[..start].trim().is_empty() {
        // Non-whitespace before the first quote: no candidate can decode.
        return None;
    }
    let body_start = start + quote.len();
    let mut search_from = body_start;
    loop {
        let close = search_from + input[search_from..].find(quote)?;
        let body = &input[body_start..close];
        if let Some(decoded) = decode_quoted(body, quote) {
            return Some((decoded, close + quote.len()));
        }
        search_from = close + quote.len();
    }
}

/// Decode the body of a delimited literal, or refuse it: a dangling escape
/// means the closing delimiter was escaped, and a raw newline is only legal
/// inside tripled delimiters. Unknown escapes are kept verbatim.
fn decode_quoted(body: &str, quote: &str) -> Option<String> {
    let triple = quote.len() == 3;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                None => return None,
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some('\\') => out.push('\\'),
                Some('\'') => out.push('\''),
                Some('"') => out.push('"'),
                Some('\n') => {}
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
            },
            '\n' | '\r' if !triple => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Token<'_> {
        Token::Lit(s)
    }

    #[test]
    fn test_match_and_lstrip() {
        let mut l = Scanner::new(" a b c ");
        assert!(!l.match_token(lit("a")));
        assert_eq!(l.offset(), 0);
        assert!(l.match_token(lit("")));
        assert!(l.lstrip().match_token(lit("a")));
        assert_eq!(l.offset(), 2);
        assert!(l.lstrip().match_token(lit("b c")));
        assert_eq!(l.offset(), 6);
        assert!(!l.match_token(Token::End));
        assert!(l.lstrip().match_token(Token::End));
        assert_eq!(l.offset(), 7);
    }

    #[test]
    fn test_match_pattern_is_anchored() {
        let re = Regex::new(r"[a-z]+\d*").unwrap();
        let mut l = Scanner::new("abc12 later abc");
        assert_eq!(l.match_pattern(&re), Some("abc12"));
        assert_eq!(l.offset(), 5);
        // The next occurrence is not at the current position.
        assert_eq!(l.match_pattern(&re), None);
        assert_eq!(l.offset(), 5);
        assert!(l.lstrip().match_pattern(&re).is_some());
    }

    #[test]
    fn test_lstrip_inline_stops_at_newline() {
        let mut l = Scanner::new(" \n begin");
        l.lstrip_inline();
        assert_eq!(l.rest(), "\n begin");
        assert_eq!(l.offset(), 1);
        l.lstrip();
        assert_eq!(l.rest(), "begin");
    }

    #[test]
    fn test_find() {
        let mut l = Scanner::new(" a b c d ");
        assert!(l.find(lit("a")));
        assert_eq!(l.offset(), 2);
        assert!(!l.find(lit("X")));
        assert!(!l.find(Token::End));
        assert_eq!(l.offset(), 2);
        assert!(l.find(lit(" b")));
        assert_eq!(l.offset(), 4);
        assert!(l.find(lit("")));
        assert_eq!(l.offset(), 4);
        assert!(l.find(lit("c d")));
        assert_eq!(l.offset(), 8);
        assert!(l.find(Token::End));
        assert_eq!(l.offset(), 9);
    }

    #[test]
    fn test_find_rejects_preceding_data() {
        let mut l = Scanner::new(" a b");
        assert!(!l.find(lit("b")));
        assert_eq!(l.offset(), 0);
    }

    #[test]
    fn test_find_either_first_wins() {
        let mut l = Scanner::new(" a :: b ");
        assert_eq!(l.find_either(&[lit("a"), lit(":")]), Some(lit("a")));
        assert_eq!(l.offset(), 2);
    }

    #[test]
    fn test_find_either_longest_wins() {
        let mut l = Scanner::new(" a :: b ");
        assert!(l.find(lit("a")));
        assert_eq!(l.find_either(&[lit(":"), lit("::")]), Some(lit("::")));
        assert_eq!(l.offset(), 5);
        assert_eq!(l.find_either(&[lit("X"), lit("Y")]), None);
        assert_eq!(l.offset(), 5);
    }

    #[test]
    fn test_find_either_literal_beats_end() {
        let mut l = Scanner::new("  ");
        assert_eq!(l.find_either(&[Token::End, lit("")]), Some(lit("")));
        assert_eq!(l.offset(), 0);
        assert_eq!(l.find_either(&[lit("X"), Token::End]), Some(Token::End));
        assert_eq!(l.offset(), 2);
    }

    #[test]
    fn test_read_split() {
        let mut l = Scanner::new(" a  b ce f ");
        assert_eq!(l.read_split(), "a");
        assert_eq!(l.offset(), 2);
        assert_eq!(l.read_split(), "b");
        assert_eq!(l.read_split(), "ce");
        assert_eq!(l.read_split(), "f");
        assert_eq!(l.read_split(), "");
        assert_eq!(l.offset(), 11);
    }

    #[test]
    fn test_read_until() {
        let mut l = Scanner::new(" raw read <marker> another read <mark>");
        assert_eq!(l.read_until(lit("<marker>"), true), Some(" raw read "));
        assert_eq!(l.offset(), 18);
        assert_eq!(l.read_until(lit("<notfound>"), true), None);
        assert_eq!(l.offset(), 18);
        assert_eq!(l.read_until(lit(""), true), Some(""));
        assert_eq!(l.read_until(lit("<mark>"), false), Some(" another read "));
        assert_eq!(l.offset(), 32);
        assert_eq!(l.read_until(Token::End, true), Some("<mark>"));
        assert_eq!(l.offset(), 38);
        assert_eq!(l.read_until(Token::End, true), Some(""));
    }

    #[test]
    fn test_read_until_either_tie_breaks() {
        let mut l = Scanner::new("a b c aa bb cc u v w uu vv ww");
        // First stop wins.
        assert_eq!(l.read_until_either(&[lit("b"), lit("cc")], true), Some((lit("b"), "a ")));
        assert_eq!(l.offset(), 3);
        // Closest stop wins.
        assert_eq!(l.read_until_either(&[lit("c"), lit("cc")], true), Some((lit("c"), " ")));
        assert_eq!(l.offset(), 5);
        // Longest stop wins at the same position.
        assert_eq!(
            l.read_until_either(&[lit("c"), lit("cc")], true),
            Some((lit("cc"), " aa bb "))
        );
        assert_eq!(l.offset(), 14);
        // No such stops.
        assert_eq!(l.read_until_either(&[lit("XX"), lit("XY")], true), None);
        assert_eq!(l.read_until_either(&[], true), None);
        // The empty literal always stops immediately.
        assert_eq!(l.read_until_either(&[lit(""), lit("u")], true), Some((lit(""), "")));
        // Stop found before end of input.
        assert_eq!(l.read_until_either(&[lit("u"), lit("v")], true), Some((lit("u"), " ")));
        assert_eq!(l.offset(), 16);
        assert_eq!(
            l.read_until_either(&[lit("uu"), Token::End], true),
            Some((lit("uu"), " v w "))
        );
        assert_eq!(l.offset(), 23);
        // End of input as a fallback stop.
        assert_eq!(
            l.read_until_either(&[lit("XX"), Token::End], true),
            Some((Token::End, " vv ww"))
        );
        assert_eq!(l.offset(), 29);
        assert_eq!(l.read_until_either(&[lit("after")], true), None);
        assert_eq!(
            l.read_until_either(&[lit("something"), Token::End], true),
            Some((Token::End, ""))
        );
    }

    #[test]
    fn test_read_until_either_stop_consumption() {
        let mut l = Scanner::new(" before :: after ");
        assert_eq!(
            l.read_until_either(&[lit(":"), lit("a")], false),
            Some((lit(":"), " before "))
        );
        assert_eq!(l.offset(), 8);
        assert_eq!(l.read_until_either(&[lit(":"), Token::End], false), Some((lit(":"), "")));
        assert_eq!(l.offset(), 8);
        assert_eq!(l.read_until_either(&[lit("::"), Token::End], true), Some((lit("::"), "")));
        assert_eq!(l.offset(), 10);
        assert_eq!(
            l.read_until_either(&[lit(":"), Token::End], true),
            Some((Token::End, " after "))
        );
        assert_eq!(l.offset(), 17);
    }

    #[test]
    fn test_find_string_literal() {
        assert_eq!(find_string_literal(""), None);
        assert_eq!(
            find_string_literal(" 'test' not-a-string "),
            Some(("test".to_string(), 7))
        );
        // Comments are not stripped here.
        assert_eq!(find_string_literal(" 'test' # comment"), Some(("test".to_string(), 7)));
        assert_eq!(
            find_string_literal(" '''triple ' quoted''' \"rest"),
            Some(("triple ' quoted".to_string(), 22))
        );
        assert_eq!(find_string_literal(" not starting 'with a string'"), None);
        assert_eq!(find_string_literal(" 'unfinished \"strings"), None);
    }

    #[test]
    fn test_find_string_literal_escapes() {
        assert_eq!(
            find_string_literal(r"'it\'s' rest"),
            Some(("it's".to_string(), 7))
        );
        assert_eq!(
            find_string_literal(r#" "a\nb" "#),
            Some(("a\nb".to_string(), 7))
        );
        // Adjacent literals: only the first is consumed.
        assert_eq!(find_string_literal("'a''b'"), Some(("a".to_string(), 3)));
        // Empty literal.
        assert_eq!(find_string_literal(" '' "), Some((String::new(), 3)));
        // Raw newline refuses a one-line literal but not a tripled one.
        assert_eq!(find_string_literal("'a\nb'"), None);
        assert_eq!(
            find_string_literal("'''a\nb'''"),
            Some(("a\nb".to_string(), 9))
        );
    }

    #[test]
    fn test_read_string() {
        let mut l = Scanner::new(" a 'b' '''multi\n''' notstring");
        assert_eq!(l.read_string(), None);
        assert_eq!(l.offset(), 0);
        assert!(l.find(lit("a")));
        assert_eq!(l.read_string(), Some("b".to_string()));
        assert_eq!(l.offset(), 6);
        assert_eq!(l.read_string(), Some("multi\n".to_string()));
        assert_eq!(l.read_string(), None);
    }

    #[test]
    fn test_string_or_raw_with_string() {
        let mut l = Scanner::new("  'string' :: next");
        let r = l.read_string_or_raw_until(lit("::"), NEWLINE_GUARD, true).unwrap();
        assert_eq!(r, Some(("string".to_string(), false)));
        assert_eq!(l.offset(), 13);
    }

    #[test]
    fn test_string_or_raw_with_raw() {
        let mut l = Scanner::new("  'raw\" :: next");
        let r = l.read_string_or_raw_until(lit("::"), NEWLINE_GUARD, true).unwrap();
        assert_eq!(r, Some(("'raw\"".to_string(), true)));
        assert_eq!(l.offset(), 10);
    }

    #[test]
    fn test_string_or_raw_without_stop_backtracks() {
        let mut l = Scanner::new("  'raw <nomark> next");
        let r = l.read_string_or_raw_until(lit("::"), NEWLINE_GUARD, true).unwrap();
        assert_eq!(r, None);
        assert_eq!(l.offset(), 0);
    }

    #[test]
    fn test_string_or_raw_until_end() {
        let mut l = Scanner::new("  'string'  ");
        let r = l.read_string_or_raw_until(Token::End, NEWLINE_GUARD, true).unwrap();
        assert_eq!(r, Some(("string".to_string(), false)));
        assert_eq!(l.offset(), 12);

        let mut l = Scanner::new("  'raw  ");
        let r = l.read_string_or_raw_until(Token::End, NEWLINE_GUARD, true).unwrap();
        assert_eq!(r, Some(("'raw".to_string(), true)));
        assert_eq!(l.offset(), 8);
    }

    #[test]
    fn test_string_or_raw_unwanted_after_string() {
        let mut l = Scanner::new("  'string' unwanted :: next");
        let e = l.read_string_or_raw_until(lit("::"), NEWLINE_GUARD, true).unwrap_err();
        assert!(e.message.contains("unexpected data found between string and \"::\""));
        assert!(e.message.contains("unwanted"));
    }

    #[test]
    fn test_string_or_raw_unwanted_before_string() {
        let mut l = Scanner::new(" unwanted 'string'");
        let e = l
            .read_string_or_raw_until(Token::End, NEWLINE_GUARD, true)
            .unwrap_err();
        assert!(e.message.contains("unexpected data found before string"));
        assert!(e.message.contains("unwanted"));
    }

    #[test]
    fn test_string_or_raw_adjacent_strings_regression() {
        // `'it''s'` decodes as two adjacent literals: the first is the
        // field, the second is trailing garbage before the stop.
        let mut l = Scanner::new("  'it''s' :: next");
        let e = l.read_string_or_raw_until(lit("::"), NEWLINE_GUARD, true).unwrap_err();
        assert!(e.message.contains("unexpected data found between string and \"::\""));
        assert!(e.message.contains("'s'"));
    }

    #[test]
    fn test_string_or_raw_unclosed_string_overflows_stop() {
        let mut l = Scanner::new(" 'unclosed string :: ne'xt");
        let r = l.read_string_or_raw_until(lit("::"), NEWLINE_GUARD, true).unwrap();
        assert_eq!(r, None);
        assert_eq!(l.offset(), 0);
    }

    #[test]
    fn test_string_or_raw_multiline_string_needs_no_guard() {
        let mut l = Scanner::new(" '''multiline string\n without a guard''' \n :: next");
        let r = l.read_string_or_raw_until(lit("::"), NEWLINE_GUARD, true).unwrap();
        assert_eq!(
            r,
            Some(("multiline string\n without a guard".to_string(), false))
        );
    }

    #[test]
    fn test_string_or_raw_guards_block_multiline_raw() {
        let mut l = Scanner::new(" multiline raw read\n blocked by guards \n :: next");
        let r = l.read_string_or_raw_until(lit("::"), NEWLINE_GUARD, true).unwrap();
        assert_eq!(r, None);
        assert_eq!(l.offset(), 0);

        let mut l = Scanner::new(" override guards \n to make this read \n :: next");
        let r = l.read_string_or_raw_until(lit("::"), &[], true).unwrap();
        assert_eq!(
            r,
            Some(("override guards \n to make this read".to_string(), true))
        );
    }

    #[test]
    fn test_string_or_raw_until_either() {
        let mut l = Scanner::new("  'string' :: next");
        let r = l
            .read_string_or_raw_until_either(&[lit("--"), lit("nosuchstop")], NEWLINE_GUARD, true)
            .unwrap();
        assert_eq!(r, None);
        assert_eq!(l.offset(), 0);
        let r = l
            .read_string_or_raw_until_either(&[lit("::"), Token::End], NEWLINE_GUARD, true)
            .unwrap();
        assert_eq!(r, Some((lit("::"), "string".to_string(), false)));
        assert_eq!(l.offset(), 13);
        let r = l
            .read_string_or_raw_until_either(&[lit("::"), Token::End], NEWLINE_GUARD, true)
            .unwrap();
        assert_eq!(r, Some((Token::End, "next".to_string(), true)));
        assert_eq!(l.offset(), 18);
    }

    #[test]
    fn test_read_tuple_basics() {
        let mut l = Scanner::new(" (raw read) ");
        assert_eq!(l.read_tuple(&[]).unwrap(), vec!["raw read"]);
        assert_eq!(l.offset(), 11);

        let mut l = Scanner::new(" (read, three, 'nice, (nice) values') ");
        assert_eq!(
            l.read_tuple(&[]).unwrap(),
            vec!["read", "three", "nice, (nice) values"]
        );

        let mut l = Scanner::new(" (two with, closing comma, ) ");
        assert_eq!(l.read_tuple(&[]).unwrap(), vec!["two with", "closing comma"]);

        let mut l = Scanner::new(" (singleton tuple,) ");
        assert_eq!(l.read_tuple(&[]).unwrap(), vec!["singleton tuple"]);

        let mut l = Scanner::new(" () ");
        assert_eq!(l.read_tuple(&[]).unwrap(), Vec::<String>::new());
        assert_eq!(l.offset(), 3);

        let mut l = Scanner::new(" ('') ");
        assert_eq!(l.read_tuple(&[]).unwrap(), vec![""]);
    }

    #[test]
    fn test_read_tuple_arity() {
        let mut l = Scanner::new("(a, b)");
        assert_eq!(l.read_tuple(&[1, 2]).unwrap(), vec!["a", "b"]);

        let mut l = Scanner::new("(a, b)");
        let e = l.read_tuple(&[3]).unwrap_err();
        assert!(e.message.contains("expected 3 values in tuple"));
        assert!(e.message.contains("found 2 instead"));
        assert_eq!(l.offset(), 0);

        let mut l = Scanner::new(" (wrong, number) ");
        let e = l.read_tuple(&[3, 4, 5]).unwrap_err();
        assert!(e.message.contains("expected either 3, 4 or 5 values in tuple"));
        assert!(e.message.contains("found 2 instead"));
        assert!(e.message.contains("\"wrong\", \"number\""));
    }

    #[test]
    fn test_read_tuple_errors() {
        let mut l = Scanner::new(" no opening) ");
        let e = l.read_tuple(&[]).unwrap_err();
        assert!(e.message.contains("missing opening parenthesis"));
        assert_eq!(l.offset(), 0);
        assert_eq!(l.read_tuple_opt(&[]).unwrap(), None);

        let mut l = Scanner::new(" (no closing ");
        let e = l.read_tuple(&[]).unwrap_err();
        assert!(e.message.contains("missing comma in tuple or unmatched parenthesis"));
        assert_eq!(l.offset(), 0);

        let mut l = Scanner::new(" (no, closing \n too late) ");
        let e = l.read_tuple(&[]).unwrap_err();
        assert!(e.message.contains("missing comma in tuple or unmatched parenthesis"));
        assert_eq!(l.offset(), 0);
    }

    #[test]
    fn test_read_line() {
        let mut l = Scanner::new("  raw-read this line # not this comment ");
        assert_eq!(l.read_line(), "raw-read this line");
        assert!(l.is_consumed());

        let mut l = Scanner::new("   # c ");
        assert_eq!(l.read_line(), "");
        assert!(l.is_consumed());

        let mut l = Scanner::new(" without a comment \n next");
        assert_eq!(l.read_line(), "without a comment");
        assert_eq!(l.offset(), 20);

        let mut l = Scanner::new("   # c ");
        let e = l.read_line_expect("anything").unwrap_err();
        assert!(e.message.contains("missing expected data: \"anything\""));
        assert_eq!(l.offset(), 0);
    }

    #[test]
    fn test_read_string_or_raw_line() {
        let mut l = Scanner::new("  raw-read this line # not this comment ");
        assert_eq!(
            l.read_string_or_raw_line().unwrap(),
            ("raw-read this line".to_string(), true)
        );

        let mut l = Scanner::new("  'quote-read #this one' # not comment ");
        assert_eq!(
            l.read_string_or_raw_line().unwrap(),
            ("quote-read #this one".to_string(), false)
        );

        let mut l = Scanner::new(" ''  # c ");
        assert_eq!(l.read_string_or_raw_line().unwrap(), (String::new(), false));
        // An explicit empty string satisfies an expected field.
        let mut l = Scanner::new(" ''  # c ");
        assert_eq!(l.read_string_or_raw_line_expect("anything").unwrap(), "");

        let mut l = Scanner::new("   # c ");
        let e = l.read_string_or_raw_line_expect("anything").unwrap_err();
        assert!(e.message.contains("missing expected data"));
    }

    #[test]
    fn test_empty_line() {
        let mut l = Scanner::new(" # finished line \n nextline");
        assert!(l.find_empty_line());
        assert_eq!(l.offset(), 18);

        let mut l = Scanner::new("  ");
        assert!(l.find_empty_line());
        assert!(l.is_consumed());

        let mut l = Scanner::new(" rest # unfinished line ");
        assert!(!l.find_empty_line());
        assert_eq!(l.offset(), 0);
        let e = l.check_empty_line().unwrap_err();
        assert!(e.message.contains("unexpected data after end of line: \"rest\""));
        assert_eq!(l.offset(), 0);
    }

    #[test]
    fn test_heredoc_dedent() {
        let mut l = Scanner::new(" EOR\n  one\n  two\nEOR");
        assert_eq!(l.read_heredoc("file", None).unwrap(), "one\ntwo\n");
        assert!(l.is_consumed());
    }

    #[test]
    fn test_heredoc_bracketed_marker_keeps_indent() {
        let mut l = Scanner::new(" <EOR> # opening no-dedent marker\n raw\n read\n<EOR> # close");
        assert_eq!(l.read_heredoc("file", None).unwrap(), " raw\n read\n");
        assert_eq!(l.rest(), " # close");
    }

    #[test]
    fn test_heredoc_errors() {
        let mut l = Scanner::new(" EOR # opening marker\n raw\n read\n # NO closing marker");
        let e = l.read_heredoc("file", None).unwrap_err();
        assert!(e.message.contains("missing closing file marker: \"EOR\""));

        let mut l = Scanner::new(" EOR extra data\n raw\n read\nEOR");
        let e = l.read_heredoc("file", None).unwrap_err();
        assert!(e.message.contains("unexpected data after end of line: \"extra data\""));

        let mut l = Scanner::new(" ");
        let e = l.read_heredoc("file", None).unwrap_err();
        assert!(e.message.contains("unexpected end of input when reading end-of-file marker"));
    }

    #[test]
    fn test_heredoc_marker_already_given() {
        let mut l = Scanner::new("marker\n already\n given\nEOR ");
        assert_eq!(
            l.read_heredoc("file", Some("EOR")).unwrap(),
            "marker\n already\n given\n"
        );

        let mut l = Scanner::new(" marker\n already\n given\n<EOR> ");
        assert_eq!(
            l.read_heredoc("file", Some("<EOR>")).unwrap(),
            " marker\n already\n given\n"
        );
    }

    #[test]
    fn test_heredoc_terminator_must_start_a_line() {
        let mut l = Scanner::new(" EOR\n  mid EOR line\n  two\nEOR\ntail");
        assert_eq!(l.read_heredoc("file", None).unwrap(), "mid EOR line\ntwo\n");
        assert_eq!(l.rest(), "\ntail");
    }

    #[test]
    fn test_truncate_restricts_input() {
        let mut l = Scanner::new("one line\nanother");
        l.truncate(8);
        assert_eq!(l.read_until(Token::End, true), Some("one line"));
        assert!(l.is_consumed());
    }

    #[test]
    fn test_consume() {
        let mut l = Scanner::new("abcdefg");
        assert_eq!(l.consume(2).unwrap(), "ab");
        assert_eq!(l.offset(), 2);
        assert_eq!(l.consume_all(), "cdefg");
        assert!(l.consume(1).is_err());
        assert_eq!(l.consume(0).unwrap(), "");
    }
}
