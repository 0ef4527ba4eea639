//! sectest CLI
//!
//! Parse a spec file and run its tests in a sandboxed folder.
//!
//! Exit codes: 0 all tests passed, 1 some test failed, 2 specification
//! parse error, 3 test-execution/organization error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use sectest::runner::color::{RED, RESET};
use sectest::{Driver, Runner, RunErrorKind};

#[derive(Parser, Debug)]
#[command(name = "sectest")]
#[command(version)]
#[command(about = "Run section-based test specifications against CLI tools")]
struct Cli {
    /// Specification file to run
    spec: PathBuf,

    /// Input folder with fixture files [default: the spec file's folder]
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Sandbox folder for temporary test folders [default: system temp]
    #[arg(long)]
    sandbox: Option<PathBuf>,

    /// Suppress per-test terminal output
    #[arg(short, long)]
    quiet: bool,

    /// Show the instruction execution log after the run
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Keep the test folder after the run (for debugging)
    #[arg(short = 'k', long = "keep")]
    keep: bool,
}

fn resolve(cli: &Cli) -> anyhow::Result<(String, PathBuf, PathBuf)> {
    let spec_path = cli
        .spec
        .canonicalize()
        .with_context(|| format!("could not find spec file {}", cli.spec.display()))?;
    let input = match &cli.input {
        Some(p) => p
            .canonicalize()
            .with_context(|| format!("could not find input folder {}", p.display()))?,
        None => spec_path
            .parent()
            .map(PathBuf::from)
            .context("spec file has no parent folder")?,
    };
    let name = cli.spec.to_string_lossy().into_owned();
    Ok((name, spec_path, input))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (name, spec_path, input) = match resolve(&cli) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("{RED}error:{RESET} {e:#}");
            return ExitCode::from(3);
        }
    };

    let mut driver = Driver::with_default_readers();
    let instructions = match driver.parse_file(&name, spec_path, None) {
        Ok(instructions) => instructions,
        Err(e) => {
            eprintln!("{RED}{e}{RESET}");
            return ExitCode::from(2);
        }
    };

    let mut runner = match Runner::new(input, cli.sandbox.clone(), driver) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("{RED}error:{RESET} {e}");
            return ExitCode::from(3);
        }
    };
    runner.quiet = cli.quiet;

    if let Err(e) = runner.run_all(&instructions) {
        eprintln!("{RED}{e}{RESET}");
        return match e.kind {
            RunErrorKind::Parse => ExitCode::from(2),
            RunErrorKind::Execution => ExitCode::from(3),
        };
    }

    if cli.verbose {
        println!("--- execution log ---");
        for line in runner.log().lines() {
            println!("  {line}");
        }
    }

    let passed = runner.report();
    if cli.keep {
        let kept = runner.keep_test_folder();
        println!("test folder kept: {}", kept.display());
    }
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
