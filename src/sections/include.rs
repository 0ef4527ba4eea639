//! The include section sources another specification file:
//!
//! ```text
//! include (other_spec): Optional section title.
//! include (other_spec.spec, other_input_folder): ...
//! include* (other_spec): ...
//! ```
//!
//! Paths are resolved relative to the including file, and the default
//! `.spec` extension is appended when that helps find the file. The plain
//! form splices the included instructions into the current run without
//! changing its state; the starred form runs them in a spawned
//! sub-environment (fresh test folder, clean command and checkers,
//! optionally a different input folder), with test reports still
//! accumulating in the current run.

use std::path::{Path, PathBuf};

use crate::cursor::{Cursor, SourceContext};
use crate::error::RunError;
use crate::instruction::{Action, Instruction};
use crate::reader::{MatchResult, Reader, SectionMatch};
use crate::runner::{color, Runner};
use crate::scanner::Token;

/// Default extension for specification files.
pub const SPEC_EXTENSION: &str = ".spec";

pub struct Include {
    spawn: bool,
    spec_file: String,
    input_folder: Option<String>,
    section: Option<String>,
    context: SourceContext,
}

impl Include {
    /// Resolve the included path relative to the including file, trying
    /// the default extension when the bare name is missing.
    fn resolve_spec(&self, parent: &Path) -> Result<PathBuf, RunError> {
        let bare = parent.join(&self.spec_file);
        let mut candidates = vec![bare.clone()];
        let name = bare.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if !name.ends_with(SPEC_EXTENSION) {
            candidates.push(bare.with_file_name(format!("{name}{SPEC_EXTENSION}")));
        }
        let Some(found) = candidates.into_iter().find(|c| c.exists()) else {
            return Err(RunError::new(format!("missing file to include: {}", self.spec_file)));
        };
        if found.is_dir() {
            return Err(RunError::new(format!(
                "the file to include is a directory: {}",
                self.spec_file
            )));
        }
        Ok(found.canonicalize().unwrap_or(found))
    }
}

impl Action for Include {
    fn apply(&self, runner: &mut Runner) -> Result<(), RunError> {
        let parent = self.context.file.path.parent().unwrap_or(Path::new("."));
        let spec_path = self.resolve_spec(parent)?;

        // Guard against circular inclusions along the include chain. Chain
        // paths may not be canonical (the root file's rarely is).
        let mut link = Some(&self.context);
        while let Some(cx) = link {
            let linked =
                cx.file.path.canonicalize().unwrap_or_else(|_| cx.file.path.clone());
            if linked == spec_path {
                return Err(RunError::new(format!(
                    "circular inclusion detected: {:?} includes {:?} again",
                    self.context.file.name, self.spec_file
                )));
            }
            link = cx.file.includer.as_ref();
        }

        let input_override = match &self.input_folder {
            Some(folder) => {
                let path = parent.join(folder);
                if !path.exists() {
                    return Err(RunError::new(format!(
                        "missing input folder {folder} to include from {}",
                        parent.display()
                    )));
                }
                if !path.is_dir() {
                    return Err(RunError::new(format!(
                        "input folder {folder} to include from {} is not a directory",
                        parent.display()
                    )));
                }
                Some(path.canonicalize().unwrap_or(path))
            }
            None => None,
        };

        if let Some(ref section) = self.section {
            if !runner.quiet {
                use color::{BLUE, GREY, RESET};
                println!(
                    "\n{BLUE}{}{RESET} {GREY}({}){RESET}{BLUE}:{RESET}",
                    section.trim_end_matches('.'),
                    self.spec_file
                );
            }
        }

        let instructions = runner.driver_mut().parse_file(
            &self.spec_file,
            spec_path,
            Some(self.context.clone()),
        )?;

        if self.spawn {
            runner.run_nested(&instructions, input_override)
        } else {
            runner.run_all(&instructions)
        }
    }

    fn context(&self) -> &SourceContext {
        &self.context
    }

    fn describe(&self) -> String {
        format!(
            "include{} ({})",
            if self.spawn { "*" } else { "" },
            self.spec_file
        )
    }
}

pub struct IncludeReader;

impl Reader for IncludeReader {
    fn keyword(&self) -> &str {
        "include"
    }

    fn section_match(&self, cursor: &mut Cursor<'_>) -> MatchResult {
        let context = self.check_keyword(cursor)?;
        let spawn = cursor.find(Token::Lit("*"));
        let mut fields = cursor.read_tuple(&[1, 2])?;
        let input_folder = if fields.len() == 2 { fields.pop() } else { None };
        let spec_file = fields.pop().unwrap_or_default();
        self.check_colon(cursor)?;
        let section = match cursor.read_line() {
            "" => None,
            title => Some(title.to_string()),
        };
        Ok(SectionMatch::Hard(Instruction::Action(Box::new(Include {
            spawn,
            spec_file,
            input_folder,
            section,
            context,
        }))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::test_cursor;
    use crate::driver::Driver;

    fn parse(input: &str) -> Vec<String> {
        let mut driver = Driver::new(vec![Box::new(IncludeReader)]);
        let mut cursor = test_cursor(input);
        driver.parse(&mut cursor).unwrap().iter().map(|a| a.describe()).collect()
    }

    #[test]
    fn test_include_forms() {
        assert_eq!(parse("include (sub): Section title.\n"), vec!["include (sub)"]);
        assert_eq!(parse("include* (sub.spec, inputs):\n"), vec!["include* (sub.spec)"]);
    }

    #[test]
    fn test_include_arity() {
        let mut driver = Driver::new(vec![Box::new(IncludeReader)]);
        let mut cursor = test_cursor("include (a, b, c):\n");
        let e = driver.parse(&mut cursor).unwrap_err();
        assert!(e.message.contains("expected either 1 or 2 values in tuple, found 3 instead"));
    }
}
