//! Test runner
//!
//! Executes the instruction sequence produced by the driver while holding
//! a consistent state: one temporary test folder inside the sandbox, one
//! input folder for fixture files, one shell command under test, and the
//! set of checkers verifying its output. Instructions mutate this state
//! through the runner API; run statements execute the command, check the
//! results, and record per-test reports for the final summary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::checker::{Checker, CommandOutput, Expectation, Placeholders};
use crate::cursor::SourceContext;
use crate::driver::Driver;
use crate::error::{RunError, RunErrorKind};
use crate::instruction::Action;

/// Raw ANSI color codes for terminal reports.
pub mod color {
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const GREY: &str = "\x1b[90m";
    pub const RESET: &str = "\x1b[0m";
}

/// One recorded test: a name, the position it ran from, and the failure
/// reports produced by its checkers (empty when it passed).
#[derive(Debug)]
pub struct TestRecord {
    pub name: String,
    pub context: SourceContext,
    pub failures: Vec<(SourceContext, String)>,
}

impl TestRecord {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Mutable state for one run of a spec's instruction sequence.
pub struct Runner {
    driver: Driver,
    input_folder: PathBuf,
    sandbox_root: Option<PathBuf>,
    test_dir: TempDir,
    command: Option<String>,
    command_context: Option<SourceContext>,
    checkers: Vec<Box<dyn Checker>>,
    output: Option<CommandOutput>,
    test_name: Option<String>,
    test_name_context: Option<SourceContext>,
    /// All recorded tests, nested includes contributing to the same list.
    pub tests: Vec<TestRecord>,
    backups: HashMap<PathBuf, Vec<u8>>,
    log: String,
    /// Suppress per-test terminal output.
    pub quiet: bool,
}

impl Runner {
    /// Create a runner with its own fresh test folder. The input folder
    /// must exist; the sandbox root is created when missing (`None` for
    /// the system temp directory).
    pub fn new(
        input_folder: impl Into<PathBuf>,
        sandbox_root: Option<PathBuf>,
        driver: Driver,
    ) -> Result<Self, RunError> {
        let input_folder = input_folder.into();
        if !input_folder.is_dir() {
            return Err(RunError::new(format!(
                "could not find input folder: {}",
                input_folder.display()
            )));
        }
        let test_dir = Self::create_test_dir(sandbox_root.as_deref())?;
        Ok(Self {
            driver,
            input_folder,
            sandbox_root,
            test_dir,
            command: None,
            command_context: None,
            checkers: Vec::new(),
            output: None,
            test_name: None,
            test_name_context: None,
            tests: Vec::new(),
            backups: HashMap::new(),
            log: String::new(),
            quiet: false,
        })
    }

    fn create_test_dir(root: Option<&Path>) -> Result<TempDir, RunError> {
        let builder_result = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                tempfile::Builder::new().prefix("sectest-").tempdir_in(root)
            }
            None => tempfile::Builder::new().prefix("sectest-").tempdir(),
        };
        builder_result.map_err(|e| RunError::new(format!("could not create test folder: {e}")))
    }

    /// The driver, for parsing included spec files mid-run.
    pub fn driver_mut(&mut self) -> &mut Driver {
        &mut self.driver
    }

    pub fn input_folder(&self) -> &Path {
        &self.input_folder
    }

    pub fn test_folder(&self) -> &Path {
        self.test_dir.path()
    }

    pub fn test_file_path(&self, name: &str) -> PathBuf {
        self.test_folder().join(name)
    }

    pub fn input_file_path(&self, name: &str) -> PathBuf {
        self.input_folder.join(name)
    }

    /// Error unless the file exists in the input folder.
    pub fn check_input_file(&self, name: &str) -> Result<PathBuf, RunError> {
        let path = self.input_file_path(name);
        if !path.exists() {
            return Err(RunError::new(format!(
                "could not find file {:?} in input folder {}",
                name,
                self.input_folder.display()
            )));
        }
        Ok(path)
    }

    /// Bring a file from the input folder into the test folder, replacing
    /// existing ones.
    pub fn copy_from_input(&mut self, source: &str, target: &str) -> Result<(), RunError> {
        let from = self.input_file_path(source);
        let to = self.test_file_path(target);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&from, &to).map_err(|e| {
            RunError::new(format!(
                "could not copy file {source} to {target}: {e} ({} to {})",
                from.display(),
                to.display()
            ))
        })?;
        self.logf(&format!("copy {source} -> {target}"));
        Ok(())
    }

    /// Create a file within the test folder, replacing existing ones.
    pub fn create_file(&mut self, name: &str, content: &str) -> Result<(), RunError> {
        let path = self.test_file_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content).map_err(|e| {
            RunError::new(format!("could not create file ({name}) ({}): {e}", path.display()))
        })?;
        self.logf(&format!("file {name}"));
        Ok(())
    }

    /// Replace the shell command under test.
    pub fn update_command(&mut self, command: String, context: SourceContext) {
        self.logf(&format!("command: {command}"));
        self.command = Some(command);
        self.command_context = Some(context);
    }

    /// Rename the next recorded test.
    pub fn update_test_name(&mut self, name: String, context: SourceContext) {
        self.test_name = Some(name);
        self.test_name_context = Some(context);
    }

    fn current_test_name(&self) -> String {
        self.test_name.clone().unwrap_or_else(|| "<unnamed test>".to_string())
    }

    /// Run the command and capture exit code, stdout and stderr.
    pub fn run_command(&mut self) -> Result<(), RunError> {
        let Some(command) = self.command.clone() else {
            return Err(RunError::new("no command to be run"));
        };
        self.logf(&format!("run: {command}"));
        let captured = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(self.test_folder())
            .output()
            .map_err(|e| {
                let defined = match &self.command_context {
                    Some(cx) => format!(" (defined at {})", cx.position()),
                    None => String::new(),
                };
                RunError::new(format!(
                    "could not run the testing command: {e}\nthe command is: {command}{defined}"
                ))
            })?;
        self.output = Some(CommandOutput {
            code: captured.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&captured.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&captured.stderr).into_owned(),
        });
        Ok(())
    }

    /// Last captured command output, if the command has run.
    pub fn last_output(&self) -> Option<&CommandOutput> {
        self.output.as_ref()
    }

    /// Install checkers, first clearing previous ones with overlapping
    /// expectations (registration per output kind is mutually exclusive).
    pub fn add_checkers(&mut self, checkers: Vec<Box<dyn Checker>>) {
        let kinds: Vec<Expectation> = checkers
            .iter()
            .flat_map(|c| c.expectations().iter().copied())
            .collect();
        self.clear_checkers(&kinds);
        self.checkers.extend(checkers);
    }

    /// Drop every checker examining one of the given output kinds.
    pub fn clear_checkers(&mut self, kinds: &[Expectation]) {
        self.checkers
            .retain(|c| !c.expectations().iter().any(|e| kinds.contains(e)));
    }

    pub fn checker_count(&self) -> usize {
        self.checkers.len()
    }

    /// Run all registered checkers and record one named test result.
    /// Returns true when all checks passed. The pending test name is
    /// consumed.
    pub fn run_checks(&mut self, run_context: &SourceContext) -> Result<bool, RunError> {
        let Some(ref output) = self.output else {
            return Err(RunError::new("no command output to check; run the command first"));
        };
        let placeholders =
            Placeholders { test_folder: self.test_dir.path(), input_folder: &self.input_folder };
        let mut failures = Vec::new();
        for checker in &self.checkers {
            if let Some(report) = checker.check(output, &placeholders) {
                failures.push((checker.context().clone(), report));
            }
        }
        let context = match (&self.test_name, &self.test_name_context) {
            (Some(_), Some(cx)) => cx.clone(),
            _ => run_context.clone(),
        };
        let passed = failures.is_empty();
        self.tests.push(TestRecord { name: self.current_test_name(), context, failures });
        self.test_name = None;
        self.test_name_context = None;
        Ok(passed)
    }

    /// Run one full test: command, checks, report line, file restoration.
    pub fn run_test(
        &mut self,
        context: &SourceContext,
        name: Option<String>,
    ) -> Result<(), RunError> {
        if let Some(name) = name {
            self.update_test_name(name, context.clone());
        }
        let message = self.current_test_name();
        if !self.quiet {
            use std::io::Write;
            print!("  {}..", message.trim_end_matches('.'));
            let _ = std::io::stdout().flush();
        }
        self.run_command()?;
        let passed = self.run_checks(context)?;
        if !self.quiet {
            use color::{GREEN, RED, RESET};
            if passed {
                println!(" {GREEN}PASS{RESET}");
            } else {
                println!(" {RED}FAIL{RESET}");
            }
        }
        self.restore_all_files(false)?;
        Ok(())
    }

    /// Snapshot a test-folder file so a later restore can undo edits.
    /// An existing backup is kept unless `replace` is set.
    pub fn backup_file(&mut self, name: &str, replace: bool) -> Result<(), RunError> {
        let path = self.test_file_path(name);
        if !path.exists() {
            return Err(RunError::new(format!(
                "cannot backup nonexistent file {}",
                path.display()
            )));
        }
        if self.backups.contains_key(&path) && !replace {
            return Ok(());
        }
        let data = std::fs::read(&path)?;
        self.backups.insert(path, data);
        Ok(())
    }

    /// Rewrite the file from its last backup. With `keep` the backup
    /// survives for further restores, otherwise it is consumed.
    pub fn restore_file(&mut self, name: &str, keep: bool, required: bool) -> Result<(), RunError> {
        let path = self.test_file_path(name);
        let Some(data) = self.backups.get(&path) else {
            if required {
                return Err(RunError::new(format!(
                    "no available backup to restore file {}",
                    path.display()
                )));
            }
            return Ok(());
        };
        std::fs::write(&path, data)?;
        if !keep {
            self.backups.remove(&path);
        }
        Ok(())
    }

    /// Restore every file with a backup.
    pub fn restore_all_files(&mut self, keep: bool) -> Result<(), RunError> {
        let paths: Vec<PathBuf> = self.backups.keys().cloned().collect();
        for path in paths {
            let data = match self.backups.get(&path) {
                Some(d) => d.clone(),
                None => continue,
            };
            std::fs::write(&path, &data)?;
            if !keep {
                self.backups.remove(&path);
            }
        }
        Ok(())
    }

    /// Give up ownership of the test folder so it survives the run, for
    /// debugging. Returns its path.
    pub fn keep_test_folder(self) -> PathBuf {
        self.test_dir.keep()
    }

    pub fn logf(&mut self, msg: &str) {
        self.log.push_str(msg);
        if !msg.ends_with('\n') {
            self.log.push('\n');
        }
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    /// Apply one instruction, filling its context into errors that lack
    /// one.
    pub fn execute(&mut self, action: &dyn Action) -> Result<(), RunError> {
        let described = action.describe();
        self.logf(&format!("> {described}"));
        action.apply(self).map_err(|e| e.or_context(action.context()))
    }

    /// Apply a whole instruction sequence. Execution errors are recorded
    /// against the current test and do not abort the remaining
    /// instructions; parse errors surfacing mid-run (from includes) are
    /// fatal.
    pub fn run_all(&mut self, instructions: &[Box<dyn Action>]) -> Result<(), RunError> {
        for action in instructions {
            if let Err(e) = self.execute(action.as_ref()) {
                if e.kind == RunErrorKind::Parse {
                    return Err(e);
                }
                let context = e.context.clone().unwrap_or_else(|| action.context().clone());
                if !self.quiet {
                    use color::{RED, RESET};
                    println!("  {RED}ERROR{RESET} {e}");
                }
                self.tests.push(TestRecord {
                    name: self.current_test_name(),
                    context: context.clone(),
                    failures: vec![(context, e.message)],
                });
                self.test_name = None;
                self.test_name_context = None;
            }
        }
        Ok(())
    }

    /// Run an included spec's instructions in a spawned sub-environment:
    /// a fresh test folder and clean command/checker/backup state, with
    /// test records still accumulating here. The previous environment is
    /// restored afterwards.
    pub fn run_nested(
        &mut self,
        instructions: &[Box<dyn Action>],
        input_override: Option<PathBuf>,
    ) -> Result<(), RunError> {
        let fresh_dir = Self::create_test_dir(self.sandbox_root.as_deref())?;
        let saved_dir = std::mem::replace(&mut self.test_dir, fresh_dir);
        let saved_input = match input_override {
            Some(p) => Some(std::mem::replace(&mut self.input_folder, p)),
            None => None,
        };
        let saved_command = self.command.take();
        let saved_command_context = self.command_context.take();
        let saved_checkers = std::mem::take(&mut self.checkers);
        let saved_output = self.output.take();
        let saved_backups = std::mem::take(&mut self.backups);
        let saved_test_name = self.test_name.take();
        let saved_test_name_context = self.test_name_context.take();

        let result = self.run_all(instructions);

        self.test_dir = saved_dir;
        if let Some(p) = saved_input {
            self.input_folder = p;
        }
        self.command = saved_command;
        self.command_context = saved_command_context;
        self.checkers = saved_checkers;
        self.output = saved_output;
        self.backups = saved_backups;
        self.test_name = saved_test_name;
        self.test_name_context = saved_test_name_context;
        result
    }

    /// Organize all recorded reports into a final summary. Returns false
    /// when some test failed.
    pub fn report(&self) -> bool {
        use color::{BLUE, GREEN, GREY, RED, RESET, YELLOW};
        fn plural<'s>(n: usize, p: &'s str, s: &'s str) -> &'s str {
            if n > 1 { p } else { s }
        }

        let failed: Vec<&TestRecord> = self.tests.iter().filter(|t| !t.passed()).collect();
        let n_total = self.tests.len();
        let n_failed = failed.len();
        let n_ok = n_total - n_failed;

        if !failed.is_empty() {
            eprintln!(
                "\n{RED}x{RESET} {n_failed} test{} ha{} failed:\n",
                plural(n_failed, "s", ""),
                plural(n_failed, "ve", "s"),
            );
            for record in &failed {
                eprintln!(
                    "{RED}{}{RESET} {GREY}<{}>{RESET}",
                    record.name,
                    record.context.position()
                );
                let mut last_line = record.context.line;
                for (context, report) in &record.failures {
                    if last_line != context.line {
                        eprintln!("{GREY}<{}>{RESET}", context.position());
                    }
                    eprintln!("{report}\n");
                    last_line = context.line;
                }
            }
            eprintln!(
                "{BLUE}{n_total}{RESET} test{} run: \
                 {GREEN}{n_ok}{RESET} success{}, {RED}{n_failed}{RESET} failure{}.",
                plural(n_total, "s", ""),
                plural(n_ok, "es", ""),
                plural(n_failed, "s", ""),
            );
            return false;
        }
        if !self.quiet {
            if n_ok > 0 {
                println!("\n{GREEN}v{RESET} Success: {n_total} test{} run.", plural(n_total, "s", ""));
            } else {
                println!("\n{YELLOW}?{RESET} Success? No test run.");
            }
        }
        true
    }
}
