//! The file section creates a file in the test folder with verbatim
//! heredoc-like quoting:
//!
//! ```text
//! file (filename.ext):: EOF # <- pick any marker with no whitespace inside.
//!     All lines here are dedented
//!     then introduced verbatim into the file # including comments
//!
//!     # and even other section triggers, because the match is hard:
//!     command: will appear in `filename.ext` without breaking the parse.
//! EOF
//! ```

use crate::cursor::{Cursor, SourceContext};
use crate::error::RunError;
use crate::instruction::{Action, Instruction};
use crate::reader::{MatchResult, Reader, SectionMatch};
use crate::runner::Runner;

pub struct CreateFile {
    name: String,
    content: String,
    context: SourceContext,
}

impl Action for CreateFile {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        runner.create_file(&self.name, &self.content)
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        format!("file ({})", self.name)
    }
}

pub struct FileReader;

impl Reader for FileReader {
    fn keyword(&self) -> &str {
        "file"
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        let mut fields = cursor.read_tuple(&[1])?;
        let name = fields.pop().unwrap_or_default();
        self.check_double_colon(cursor)?;
        let content = cursor.read_heredoc("file", None)?;
        Ok(SectionMatch::Hard(Instruction::Action(Box::new(CreateFile {
            name,
            content,
            context,
        }))))
    }
}
