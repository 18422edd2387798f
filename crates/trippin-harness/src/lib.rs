//! Compile-and-run test harness for libtrippin.
//!
//! This crate provides:
//! - Build description parsing: compiler and flags persisted by the configure step
//! - Case registry: the fixed list of sources and what each must do
//! - Verdict classification: pure pass/fail decision from observed exit statuses
//! - Concurrent harness: one worker per case, race-free tally, terminal report
//! - Structured logging: JSONL run events and a SHA-256 artifact index

#![forbid(unsafe_code)]

pub mod config;
pub mod harness;
pub mod registry;
pub mod report;
pub mod structured_log;
pub mod verdict;

pub use config::{BuildConfig, BuildConfigError};
pub use harness::{CaseOutcome, Harness, HarnessError, HarnessOptions};
pub use registry::{Expectation, Registry, RegistryError, TestCase};
pub use report::{Palette, RunSummary, Tally};
pub use verdict::{Verdict, classify};
