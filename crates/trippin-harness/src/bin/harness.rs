//! CLI entrypoint for the libtrippin test harness.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use trippin_exec::{Invocation, SystemRunner};
use trippin_harness::config::DEFAULT_BUILD_FILE;
use trippin_harness::harness::{CAMPAIGN, DEFAULT_BUILDER, DEFAULT_LIBRARY, build_artifact_index};
use trippin_harness::structured_log::{LogEmitter, validate_log_file};
use trippin_harness::{BuildConfig, Expectation, Harness, HarnessOptions, Palette, Registry};

/// Exit code for fatal configuration or builder errors.
const FATAL_EXIT: u8 = 2;

/// Test tooling for libtrippin.
#[derive(Debug, Parser)]
#[command(name = "trippin-harness")]
#[command(about = "Compile, run and classify the libtrippin test cases")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the library, then compile and run every case concurrently.
    Run {
        /// Persisted build description written by the configure step.
        #[arg(long, default_value = DEFAULT_BUILD_FILE)]
        build_file: PathBuf,
        /// Builder command line (split on whitespace).
        #[arg(long, default_value = DEFAULT_BUILDER)]
        builder: String,
        /// Library artifact linked into every case.
        #[arg(long, default_value = DEFAULT_LIBRARY)]
        library: PathBuf,
        /// Do not pass a library artifact to the compiler.
        #[arg(long)]
        no_library: bool,
        /// JSON case catalogue to use instead of the built-in suite.
        #[arg(long)]
        cases: Option<PathBuf>,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index JSON output path.
        #[arg(long)]
        artifact_index: Option<PathBuf>,
        /// Run identifier stamped into log trace ids.
        #[arg(long)]
        run_id: Option<String>,
        /// Disable ANSI colors (also honoured via NO_COLOR).
        #[arg(long)]
        no_color: bool,
        /// Exit with status 1 when any case fails.
        #[arg(long)]
        fail_on_case_failure: bool,
    },
    /// Print the registered cases grouped by expectation.
    List {
        /// JSON case catalogue to use instead of the built-in suite.
        #[arg(long)]
        cases: Option<PathBuf>,
    },
    /// Parse the build description and print it as JSON.
    ShowConfig {
        #[arg(long, default_value = DEFAULT_BUILD_FILE)]
        build_file: PathBuf,
    },
    /// Check a structured JSONL log written by `run --log`.
    ValidateLog {
        /// Structured JSONL log path.
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(FATAL_EXIT)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Run {
            build_file,
            builder,
            library,
            no_library,
            cases,
            log,
            artifact_index,
            run_id,
            no_color,
            fail_on_case_failure,
        } => {
            let registry = load_registry(cases.as_deref())?;
            let builder = Invocation::parse(&builder).ok_or("builder command must not be empty")?;
            let color = !no_color && std::env::var_os("NO_COLOR").is_none_or(|v| v.is_empty());
            let options = HarnessOptions {
                build_file,
                builder,
                library: (!no_library).then_some(library),
                palette: Palette::new(color),
            };
            let run_id = run_id.unwrap_or_else(default_run_id);

            let mut harness = Harness::new(SystemRunner::new(), options);
            if let Some(log_path) = &log {
                eprintln!("Writing structured log to {}", log_path.display());
                harness = harness.with_log(LogEmitter::to_file(log_path, CAMPAIGN, &run_id)?);
            }

            let mut stdout = std::io::stdout();
            let summary = harness.run(&registry, &mut stdout)?;
            stdout.flush()?;

            if let Some(index_path) = artifact_index {
                let index = build_artifact_index(&summary, &run_id, log.as_deref());
                std::fs::write(&index_path, index.to_json()?)?;
                eprintln!(
                    "Wrote artifact index ({} files) to {}",
                    index.artifacts.len(),
                    index_path.display()
                );
            }

            if fail_on_case_failure && !summary.all_passed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::List { cases } => {
            let registry = load_registry(cases.as_deref())?;
            for expectation in Expectation::ALL {
                let sources: Vec<_> = registry.with_expectation(expectation).collect();
                println!("{} ({}):", expectation.describe(), sources.len());
                for case in sources {
                    println!("  {}", case.source);
                }
            }
        }
        Command::ShowConfig { build_file } => {
            let config = BuildConfig::load(&build_file)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for error in &errors {
                eprintln!("{error}");
            }
            if !errors.is_empty() {
                return Err(format!(
                    "Structured log validation failed: {} violation(s) in {lines} line(s)",
                    errors.len()
                )
                .into());
            }
            println!("{}: {lines} valid line(s)", log.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_registry(cases: Option<&Path>) -> Result<Registry, trippin_harness::RegistryError> {
    match cases {
        Some(path) => Registry::from_file(path),
        None => Ok(Registry::builtin()),
    }
}

fn default_run_id() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("run-{secs}-{}", std::process::id())
}
