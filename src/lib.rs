//! sectest: a section-based test specification engine for CLI E2E testing
//!
//! A spec file describes file fixtures, a shell command, and expected
//! outputs in a small sectioned DSL; a runner executes the command in a
//! sandboxed folder and checks the results.
//!
//! # Spec syntax
//!
//! ```text
//! # Comment lines start with '#'.
//! copy:
//!     input_file -> renamed.txt
//!
//! file (extra.txt):: EOF
//!     fixture content, verbatim
//! EOF
//!
//! command: mytool renamed.txt extra.txt
//!
//! EXITCODE 0
//! stdout:
//!     expected fragment, irrespective of whitespace
//! stderr:: *
//!
//! RUNTEST: My first test.
//!
//! include (more_tests): Another batch.
//! ```
//!
//! # Sections
//!
//! | Section | Description |
//! |---------|-------------|
//! | `copy:` | Copy files from the input folder into the test folder |
//! | `file (name):: MARK` | Create a file from a verbatim block |
//! | `command:` / `command:: MARK` | Set the shell command under test |
//! | `stdout:` / `stderr:` | Expect a whitespace-insensitive fragment |
//! | `stdout:: MARK` / `stderr:: MARK` | Expect exact output |
//! | `stdout: *` | Clear expectations for a channel |
//! | `stdout:: *` | Expect exactly no output |
//! | `EXITCODE n` / `+` / `*` | Expect a return code |
//! | `test: name` | Name the next test |
//! | `RUN` | Run the command, capture output |
//! | `RUNTEST [: name]` | Run, check, record a test result |
//! | `include [*] (spec[, input]):` | Source another spec file |
//! | `readers: + x - y` | Enable/disable section types mid-parse |
//!
//! A single colon introduces an incremental section, fed line by line
//! until another section starts; a double colon introduces a
//! self-delimited section, typically paired with a heredoc-style marker.
//!
//! # Architecture
//!
//! The parsing engine is generic: a [`driver::Driver`] coordinates
//! independently-authored [`reader::Reader`]s over a positioned
//! [`cursor::Cursor`], with no knowledge of the section grammars. The
//! grammars in [`sections`] and the sandboxed [`runner::Runner`] are the
//! two collaborators plugged into that engine.

pub mod checker;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod instruction;
pub mod reader;
pub mod runner;
pub mod scanner;
pub mod sections;

pub use checker::{Checker, CommandOutput, Expectation, Placeholders};
pub use cursor::{Cursor, SourceContext, SourceFile};
pub use driver::Driver;
pub use error::{ParseError, RunError, RunErrorKind, ScanError};
pub use instruction::{Action, Instruction, ParseEditor};
pub use reader::{Automaton, Colon, Feed, Flow, MatchResult, Reader, SectionMatch};
pub use runner::{Runner, TestRecord};
pub use scanner::{Scanner, Token};
