//! Tally and terminal rendering.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use trippin_exec::ExitStatus;

use crate::registry::Expectation;
use crate::verdict::Verdict;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_RED: &str = "\x1b[0;91m";
const COLOR_GREEN: &str = "\x1b[0;32m";

/// Running count of passed vs. total cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub passed: usize,
    pub total: usize,
}

impl Tally {
    /// Fold one verdict in.
    pub fn record(&mut self, verdict: Verdict) {
        self.total += 1;
        if verdict.is_pass() {
            self.passed += 1;
        }
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} tests succeeded", self.passed, self.total)
    }
}

/// What is kept of a case once it has been folded into the tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    /// Position in the registry.
    pub index: usize,
    pub source: String,
    pub output: PathBuf,
    pub expectation: Expectation,
    pub verdict: Verdict,
    pub compile_status: ExitStatus,
    pub run_status: Option<ExitStatus>,
    pub duration: Duration,
}

impl CaseRecord {
    /// One-line explanation of what was observed.
    #[must_use]
    pub fn observed(&self) -> String {
        match self.run_status {
            Some(run) => format!("compile exit {}, run exit {run}", self.compile_status),
            None => format!("compile exit {}, not run", self.compile_status),
        }
    }
}

/// Result of a complete harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub tally: Tally,
    /// One record per case, in registry order.
    pub records: Vec<CaseRecord>,
}

impl RunSummary {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.tally.all_passed()
    }

    /// Records whose verdict is [`Verdict::Fail`], in registry order.
    pub fn failures(&self) -> impl Iterator<Item = &CaseRecord> {
        self.records.iter().filter(|r| !r.verdict.is_pass())
    }
}

/// Console coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    color: bool,
}

impl Palette {
    #[must_use]
    pub const fn new(color: bool) -> Self {
        Self { color }
    }

    #[must_use]
    pub const fn plain() -> Self {
        Self { color: false }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{COLOR_RESET}")
        } else {
            text.to_string()
        }
    }

    /// `* OK:     <source>` or `* FAILED: <source>`.
    #[must_use]
    pub fn case_line(&self, verdict: Verdict, source: &str) -> String {
        match verdict {
            Verdict::Pass => self.paint(COLOR_GREEN, &format!("* OK:     {source}")),
            Verdict::Fail => self.paint(COLOR_RED, &format!("* FAILED: {source}")),
        }
    }
}

/// Text printed after every case has reported: a recap of failed cases in
/// registry order (when there are any) followed by the summary line.
#[must_use]
pub fn render_summary(summary: &RunSummary, palette: Palette) -> String {
    let mut out = String::new();
    if !summary.all_passed() {
        out.push('\n');
        out.push_str(&palette.paint(COLOR_RED, "failed cases:"));
        out.push('\n');
        for record in summary.failures() {
            out.push_str(&format!(
                "  {}: {} ({})\n",
                record.source,
                record.expectation.describe(),
                record.observed()
            ));
        }
    }
    out.push('\n');
    out.push_str(&summary.tally.to_string());
    out.push('\n');
    out
}
