//! Concurrent compile-and-run driver.
//!
//! A run has two phases. The preparation phase is sequential and fatal on
//! error: load the build description, then invoke the builder once. The case
//! phase fans out one scoped thread per registered case; every worker compiles
//! its source, runs the produced binary when the expectation asks for it,
//! classifies the statuses and folds the verdict into the shared [`Aggregator`].
//! The summary is written only after every worker has joined.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use trippin_exec::{ExitStatus, Invocation, ProcessRunner, SpawnError};

use crate::config::{BuildConfig, BuildConfigError, DEFAULT_BUILD_FILE};
use crate::registry::{Registry, TestCase};
use crate::report::{CaseRecord, Palette, RunSummary, Tally, render_summary};
use crate::structured_log::{ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome};
use crate::verdict::{Verdict, classify};

/// Builder command used when none is configured.
pub const DEFAULT_BUILDER: &str = "ninja";
/// Library archive appended to every compile command by default.
pub const DEFAULT_LIBRARY: &str = "libtrippin.a";
/// Campaign name stamped on log entries and artifact indexes.
pub const CAMPAIGN: &str = "trippin-harness";

/// Fatal errors. Any of these aborts the run before a single case executes,
/// except [`HarnessError::Output`], which means the console became unwritable.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Configuration(#[from] BuildConfigError),
    #[error("builder `{command}` exited with status {status}")]
    BuilderFailed { command: String, status: ExitStatus },
    #[error("builder could not be started: {0}")]
    BuilderSpawn(#[source] SpawnError),
    #[error("cannot write harness output: {0}")]
    Output(#[from] std::io::Error),
}

/// Settings for one harness run.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    /// Persisted build description to read compiler and flags from.
    pub build_file: PathBuf,
    /// Command that brings the library artifact up to date.
    pub builder: Invocation,
    /// Library linked into every case, if any.
    pub library: Option<PathBuf>,
    pub palette: Palette,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            build_file: PathBuf::from(DEFAULT_BUILD_FILE),
            builder: Invocation::new(DEFAULT_BUILDER),
            library: Some(PathBuf::from(DEFAULT_LIBRARY)),
            palette: Palette::plain(),
        }
    }
}

/// What one worker observed for its case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome<'a> {
    pub case: &'a TestCase,
    pub compile_status: ExitStatus,
    /// Present only when the binary was executed.
    pub run_status: Option<ExitStatus>,
    pub verdict: Verdict,
    pub duration: Duration,
}

impl CaseOutcome<'_> {
    fn into_record(self, index: usize) -> CaseRecord {
        CaseRecord {
            index,
            source: self.case.source.clone(),
            output: self.case.output_path(),
            expectation: self.case.expectation,
            verdict: self.verdict,
            compile_status: self.compile_status,
            run_status: self.run_status,
            duration: self.duration,
        }
    }
}

struct AggregatorState<'w, W> {
    tally: Tally,
    records: Vec<CaseRecord>,
    out: &'w mut W,
    write_error: Option<std::io::Error>,
}

/// Single serialization point for results: the tally increment, the stored
/// record and the printed line for a case happen under one lock.
struct Aggregator<'w, W> {
    palette: Palette,
    state: Mutex<AggregatorState<'w, W>>,
}

impl<'w, W: Write> Aggregator<'w, W> {
    fn new(out: &'w mut W, palette: Palette, capacity: usize) -> Self {
        Self {
            palette,
            state: Mutex::new(AggregatorState {
                tally: Tally::default(),
                records: Vec::with_capacity(capacity),
                out,
                write_error: None,
            }),
        }
    }

    fn fold(&self, index: usize, outcome: CaseOutcome<'_>) {
        let line = self
            .palette
            .case_line(outcome.verdict, &outcome.case.source);
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.tally.record(outcome.verdict);
        state.records.push(outcome.into_record(index));
        if state.write_error.is_none()
            && let Err(err) = writeln!(state.out, "{line}").and_then(|()| state.out.flush())
        {
            state.write_error = Some(err);
        }
    }

    fn finish(self) -> Result<RunSummary, HarnessError> {
        let state = self.state.into_inner();
        if let Some(err) = state.write_error {
            return Err(HarnessError::Output(err));
        }
        let mut records = state.records;
        records.sort_by_key(|record| record.index);
        Ok(RunSummary {
            tally: state.tally,
            records,
        })
    }
}

/// Drives a full harness run through a [`ProcessRunner`].
pub struct Harness<R> {
    runner: R,
    options: HarnessOptions,
    log: Option<Mutex<LogEmitter>>,
}

impl<R: ProcessRunner> Harness<R> {
    #[must_use]
    pub fn new(runner: R, options: HarnessOptions) -> Self {
        Self {
            runner,
            options,
            log: None,
        }
    }

    /// Mirror run events to a structured JSONL log.
    #[must_use]
    pub fn with_log(mut self, emitter: LogEmitter) -> Self {
        self.log = Some(Mutex::new(emitter));
        self
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run every case in `registry`, streaming one line per case to `out`
    /// followed by the summary.
    pub fn run<W: Write + Send>(
        &self,
        registry: &Registry,
        out: &mut W,
    ) -> Result<RunSummary, HarnessError> {
        self.emit(
            LogEntry::event(LogLevel::Info, "harness.start").with_details(serde_json::json!({
                "cases": registry.len(),
                "build_file": self.options.build_file,
                "builder": self.options.builder.to_string(),
            })),
        );

        let config = match self.prepare() {
            Ok(config) => config,
            Err(err) => {
                self.emit(
                    LogEntry::event(LogLevel::Fatal, "harness.abort")
                        .with_outcome(Outcome::Error)
                        .with_details(serde_json::json!({ "error": err.to_string() })),
                );
                self.flush_log();
                return Err(err);
            }
        };

        let summary = self.run_cases(&config, registry, out)?;
        out.write_all(render_summary(&summary, self.options.palette).as_bytes())?;
        out.flush()?;

        let outcome = if summary.all_passed() {
            Outcome::Pass
        } else {
            Outcome::Fail
        };
        self.emit(
            LogEntry::event(LogLevel::Info, "harness.summary")
                .with_outcome(outcome)
                .with_details(serde_json::json!({
                    "passed": summary.tally.passed,
                    "failed": summary.tally.failed(),
                    "total": summary.tally.total,
                })),
        );
        self.flush_log();
        Ok(summary)
    }

    /// Load the build description and bring the library up to date.
    pub fn prepare(&self) -> Result<BuildConfig, HarnessError> {
        let config = BuildConfig::load(&self.options.build_file)?;
        self.emit(
            LogEntry::event(LogLevel::Debug, "harness.config")
                .with_details(serde_json::to_value(&config).unwrap_or_default()),
        );

        let builder = &self.options.builder;
        let started = Instant::now();
        let status = self.runner.run(builder).map_err(HarnessError::BuilderSpawn)?;
        self.emit(
            LogEntry::event(LogLevel::Info, "builder.finish")
                .with_command(builder.to_string())
                .with_exit_code(status.code())
                .with_duration_ms(millis(started.elapsed())),
        );
        if !status.success() {
            return Err(HarnessError::BuilderFailed {
                command: builder.to_string(),
                status,
            });
        }
        Ok(config)
    }

    /// Fan out one worker per case and fold their outcomes.
    pub fn run_cases<W: Write + Send>(
        &self,
        config: &BuildConfig,
        registry: &Registry,
        out: &mut W,
    ) -> Result<RunSummary, HarnessError> {
        let aggregator = Aggregator::new(out, self.options.palette, registry.len());
        thread::scope(|scope| {
            for (index, case) in registry.all_cases().iter().enumerate() {
                let aggregator = &aggregator;
                scope.spawn(move || {
                    let outcome = self.execute(config, case);
                    aggregator.fold(index, outcome);
                });
            }
        });
        aggregator.finish()
    }

    /// Compile, conditionally run, and classify a single case.
    pub fn execute<'c>(&self, config: &BuildConfig, case: &'c TestCase) -> CaseOutcome<'c> {
        let started = Instant::now();
        let output = case.output_path();
        let compile =
            config.compile_invocation(&case.source, &output, self.options.library.as_deref());
        let compile_status = self.step(case, "case.compile", &compile, Some(&output));

        // A failed compile leaves nothing to run.
        let run_status = (compile_status.success() && case.expectation.runs())
            .then(|| self.step(case, "case.run", &run_invocation(&output), None));

        let verdict = classify(case.expectation, compile_status, run_status);
        let duration = started.elapsed();
        let level = match verdict {
            Verdict::Pass => LogLevel::Info,
            Verdict::Fail => LogLevel::Warn,
        };
        self.emit(
            LogEntry::event(level, "case.verdict")
                .with_case(&case.source, case.expectation)
                .with_outcome(verdict.into())
                .with_duration_ms(millis(duration))
                .with_details(serde_json::json!({
                    "compile_exit": compile_status.code(),
                    "run_exit": run_status.map(ExitStatus::code),
                })),
        );

        CaseOutcome {
            case,
            compile_status,
            run_status,
            verdict,
            duration,
        }
    }

    /// Run one process for `case`. `produces` names the file a successful run
    /// leaves behind, recorded as the entry's artifact.
    fn step(
        &self,
        case: &TestCase,
        event: &str,
        invocation: &Invocation,
        produces: Option<&Path>,
    ) -> ExitStatus {
        let started = Instant::now();
        let (status, entry) = match self.runner.run(invocation) {
            Ok(status) => {
                let mut entry =
                    LogEntry::event(LogLevel::Info, event).with_exit_code(status.code());
                if let Some(path) = produces
                    && status.success()
                {
                    entry = entry.with_artifacts(vec![path.to_string_lossy().into_owned()]);
                }
                (status, entry)
            }
            Err(err) => {
                eprintln!("warning: {err}");
                (
                    ExitStatus::SPAWN_FAILURE,
                    LogEntry::event(LogLevel::Error, event)
                        .with_outcome(Outcome::Error)
                        .with_exit_code(ExitStatus::SPAWN_FAILURE.code())
                        .with_details(serde_json::json!({ "error": err.to_string() })),
                )
            }
        };
        self.emit(
            entry
                .with_case(&case.source, case.expectation)
                .with_command(invocation.to_string())
                .with_duration_ms(millis(started.elapsed())),
        );
        status
    }

    fn emit(&self, entry: LogEntry) {
        if let Some(log) = &self.log
            && let Err(err) = log.lock().emit_entry(entry)
        {
            eprintln!("warning: structured log write failed: {err}");
        }
    }

    fn flush_log(&self) {
        if let Some(log) = &self.log
            && let Err(err) = log.lock().flush()
        {
            eprintln!("warning: structured log flush failed: {err}");
        }
    }
}

/// Invocation that executes a produced binary. Relative paths are anchored at
/// the working directory so a bare name is never looked up on `PATH`.
#[must_use]
pub fn run_invocation(output: &Path) -> Invocation {
    let program = if output.is_relative() {
        Path::new(".").join(output)
    } else {
        output.to_path_buf()
    };
    Invocation::new(program.to_string_lossy().into_owned())
}

/// Index every binary the run produced, with its SHA-256 digest, followed by
/// the structured log when one was written.
#[must_use]
pub fn build_artifact_index(
    summary: &RunSummary,
    run_id: &str,
    log: Option<&Path>,
) -> ArtifactIndex {
    let mut index = ArtifactIndex::new(run_id, CAMPAIGN);
    for record in &summary.records {
        if !record.compile_status.success() || !record.output.is_file() {
            continue;
        }
        if let Err(err) = index.add_file(&record.output, "binary") {
            eprintln!("warning: cannot hash {}: {err}", record.output.display());
        }
    }
    if let Some(log) = log
        && let Err(err) = index.add_file(log, "log")
    {
        eprintln!("warning: cannot hash {}: {err}", log.display());
    }
    index
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
