//! Build description parsing.
//!
//! The configure step persists the compiler and flag strings at the top of the
//! generated build file:
//!
//! ```text
//! # generated by samurai
//! cxx = clang++
//! cflags = -std=c++17 -I. -O0 -g -DDEBUG
//! ldflags = -lm -lstdc++
//!
//! rule cc
//!   command = $cxx $cflags -c $in -o $out
//! ```
//!
//! The first line is a header and is never read, even when it looks like a
//! binding. Fields are looked up by name in the block of top-level bindings
//! that follows it. The block ends at the first statement that is not a
//! binding.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use trippin_exec::Invocation;

/// Default location of the persisted build description.
pub const DEFAULT_BUILD_FILE: &str = "build.ninja";

const CXX: &str = "cxx";
const CFLAGS: &str = "cflags";
const LDFLAGS: &str = "ldflags";

/// Compiler and flags the library was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
    pub compiler: String,
    pub cflags: String,
    pub ldflags: String,
}

/// The build description is absent or does not match the expected schema.
#[derive(Debug, Error)]
pub enum BuildConfigError {
    #[error("build description {path} not found; run the configure step first")]
    Missing { path: PathBuf },
    #[error("cannot read build description {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("build description does not bind `{field}`")]
    MissingField { field: &'static str },
    #[error("build description binds an empty `{field}`")]
    EmptyField { field: &'static str },
    #[error("line {line}: `{field}` is bound more than once")]
    DuplicateField { field: &'static str, line: usize },
    #[error("line {line}: binding has no name: `{content}`")]
    MalformedLine { line: usize, content: String },
}

enum Line<'a> {
    Blank,
    Binding { key: &'a str, value: &'a str },
    Statement,
}

fn classify_line(raw: &str) -> Line<'_> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Line::Blank;
    }
    // Indented lines belong to a rule or build block.
    if raw.starts_with(char::is_whitespace) {
        return Line::Statement;
    }
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().contains(char::is_whitespace) => Line::Binding {
            key: key.trim(),
            value: value.trim(),
        },
        _ => Line::Statement,
    }
}

impl BuildConfig {
    /// Load and parse the build description at `path`.
    pub fn load(path: &Path) -> Result<Self, BuildConfigError> {
        if !path.exists() {
            return Err(BuildConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| BuildConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse build description text.
    pub fn parse(text: &str) -> Result<Self, BuildConfigError> {
        let mut compiler = None;
        let mut cflags = None;
        let mut ldflags = None;

        // Line 1 is the configure step's header.
        for (idx, raw) in text.lines().enumerate().skip(1) {
            let line = idx + 1;
            let (key, value) = match classify_line(raw) {
                Line::Blank => continue,
                Line::Statement => break,
                Line::Binding { key, value } => (key, value),
            };
            if key.is_empty() {
                return Err(BuildConfigError::MalformedLine {
                    line,
                    content: raw.to_string(),
                });
            }
            let (field, slot) = match key {
                CXX => (CXX, &mut compiler),
                CFLAGS => (CFLAGS, &mut cflags),
                LDFLAGS => (LDFLAGS, &mut ldflags),
                _ => continue,
            };
            if slot.is_some() {
                return Err(BuildConfigError::DuplicateField { field, line });
            }
            *slot = Some(value.to_string());
        }

        let compiler = compiler.ok_or(BuildConfigError::MissingField { field: CXX })?;
        if compiler.is_empty() {
            return Err(BuildConfigError::EmptyField { field: CXX });
        }
        Ok(Self {
            compiler,
            cflags: cflags.ok_or(BuildConfigError::MissingField { field: CFLAGS })?,
            ldflags: ldflags.ok_or(BuildConfigError::MissingField { field: LDFLAGS })?,
        })
    }

    /// `<cxx> <cflags> <ldflags> <source> [<library>] -o <output>`
    #[must_use]
    pub fn compile_invocation(
        &self,
        source: &str,
        output: &Path,
        library: Option<&Path>,
    ) -> Invocation {
        let compiler =
            Invocation::parse(&self.compiler).unwrap_or_else(|| Invocation::new(&self.compiler));
        compiler
            .args(self.cflags.split_ascii_whitespace())
            .args(self.ldflags.split_ascii_whitespace())
            .arg(source)
            .args(library.map(|lib| lib.to_string_lossy().into_owned()))
            .arg("-o")
            .arg(output.to_string_lossy().into_owned())
    }
}
