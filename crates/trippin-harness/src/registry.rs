//! Declared test cases.
//!
//! The set of cases is fixed when the harness is defined: either the built-in
//! libtrippin suite or a JSON catalogue listing sources per expectation. Nothing
//! is discovered by walking the filesystem.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sources that must compile and exit with status zero.
const RUN_AND_SUCCEED: &[&str] = &[
    "test/memory.cpp",
    "test/memory_references.cpp",
    "test/buffer.cpp",
    "test/array.cpp",
];

/// Sources that must compile and then exit nonzero (caught by the library's
/// own checks or a sanitizer).
const RUN_AND_FAIL: &[&str] = &["test/buffer_overflow.cpp", "test/buffer_use_after_free.cpp"];

/// Sources whose compilation must be rejected.
const COMPILE_FAIL: &[&str] = &[];

/// What a case asserts about compiling and running its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    CompileAndRunSucceed,
    CompileAndRunFail,
    CompileFail,
}

impl Expectation {
    /// All expectation kinds, in catalogue order.
    pub const ALL: [Self; 3] = [
        Self::CompileAndRunSucceed,
        Self::CompileAndRunFail,
        Self::CompileFail,
    ];

    /// Whether the produced binary is executed after a successful compile.
    #[must_use]
    pub const fn runs(self) -> bool {
        matches!(self, Self::CompileAndRunSucceed | Self::CompileAndRunFail)
    }

    /// Stable snake_case name, as used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CompileAndRunSucceed => "compile_and_run_succeed",
            Self::CompileAndRunFail => "compile_and_run_fail",
            Self::CompileFail => "compile_fail",
        }
    }

    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::CompileAndRunSucceed => "must compile and run successfully",
            Self::CompileAndRunFail => "must compile and fail at runtime",
            Self::CompileFail => "must fail to compile",
        }
    }
}

/// One source file paired with its expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub source: String,
    pub expectation: Expectation,
}

impl TestCase {
    #[must_use]
    pub fn new(source: impl Into<String>, expectation: Expectation) -> Self {
        Self {
            source: source.into(),
            expectation,
        }
    }

    /// Path of the compiled binary: the source path with its extension stripped.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        Path::new(&self.source).with_extension("")
    }
}

/// Registry construction failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read case catalogue {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid case catalogue: {0}")]
    Json(#[from] serde_json::Error),
    #[error("case catalogue declares no cases")]
    Empty,
    #[error("case `{path}` is declared more than once")]
    Duplicate { path: String },
    #[error("case `{path}` has no file extension to strip for its output binary")]
    NoExtension { path: String },
    #[error("cases `{first}` and `{second}` would both compile to the same binary")]
    OutputCollision { first: String, second: String },
}

/// On-disk catalogue: source paths grouped by expectation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseCatalogue {
    #[serde(default)]
    pub run_and_succeed: Vec<String>,
    #[serde(default)]
    pub run_and_fail: Vec<String>,
    #[serde(default)]
    pub compile_fail: Vec<String>,
}

impl CaseCatalogue {
    fn into_cases(self) -> Vec<TestCase> {
        let groups = [
            (self.run_and_succeed, Expectation::CompileAndRunSucceed),
            (self.run_and_fail, Expectation::CompileAndRunFail),
            (self.compile_fail, Expectation::CompileFail),
        ];
        groups
            .into_iter()
            .flat_map(|(sources, expectation)| {
                sources
                    .into_iter()
                    .map(move |source| TestCase::new(source, expectation))
            })
            .collect()
    }
}

/// Ordered, immutable list of cases for one harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    cases: Vec<TestCase>,
}

impl Registry {
    /// The libtrippin test suite.
    #[must_use]
    pub fn builtin() -> Self {
        let catalogue = CaseCatalogue {
            run_and_succeed: RUN_AND_SUCCEED.iter().map(|s| (*s).to_string()).collect(),
            run_and_fail: RUN_AND_FAIL.iter().map(|s| (*s).to_string()).collect(),
            compile_fail: COMPILE_FAIL.iter().map(|s| (*s).to_string()).collect(),
        };
        Self {
            cases: catalogue.into_cases(),
        }
    }

    /// Build a registry from a catalogue, rejecting empty or ambiguous ones.
    pub fn from_catalogue(catalogue: CaseCatalogue) -> Result<Self, RegistryError> {
        Self::from_cases(catalogue.into_cases())
    }

    /// Build a registry from an explicit case list.
    pub fn from_cases(cases: Vec<TestCase>) -> Result<Self, RegistryError> {
        if cases.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        let mut outputs: HashMap<PathBuf, &str> = HashMap::new();
        for case in &cases {
            if Path::new(&case.source).extension().is_none() {
                return Err(RegistryError::NoExtension {
                    path: case.source.clone(),
                });
            }
            if !seen.insert(case.source.as_str()) {
                return Err(RegistryError::Duplicate {
                    path: case.source.clone(),
                });
            }
            // Workers run concurrently, so two cases must never share a binary.
            if let Some(first) = outputs.insert(case.output_path(), &case.source) {
                return Err(RegistryError::OutputCollision {
                    first: first.to_string(),
                    second: case.source.clone(),
                });
            }
        }
        Ok(Self { cases })
    }

    /// Parse a JSON catalogue.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let catalogue: CaseCatalogue = serde_json::from_str(json)?;
        Self::from_catalogue(catalogue)
    }

    /// Load a JSON catalogue from disk.
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Every case, in declaration order. Re-iterable.
    #[must_use]
    pub fn all_cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Cases declared with `expectation`.
    pub fn with_expectation(&self, expectation: Expectation) -> impl Iterator<Item = &TestCase> {
        self.cases
            .iter()
            .filter(move |case| case.expectation == expectation)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_suite_is_valid_and_partitioned() {
        let builtin = Registry::builtin();
        let revalidated = Registry::from_cases(builtin.all_cases().to_vec()).unwrap();
        assert_eq!(revalidated, builtin);

        assert_eq!(builtin.len(), 6);
        let succeed: Vec<_> = builtin
            .with_expectation(Expectation::CompileAndRunSucceed)
            .map(|c| c.source.as_str())
            .collect();
        assert_eq!(succeed, RUN_AND_SUCCEED);
        assert_eq!(
            builtin
                .with_expectation(Expectation::CompileAndRunFail)
                .count(),
            2
        );
        assert_eq!(builtin.with_expectation(Expectation::CompileFail).count(), 0);
    }

    #[test]
    fn all_cases_is_restartable() {
        let registry = Registry::builtin();
        let first: Vec<_> = registry.all_cases().iter().collect();
        let second: Vec<_> = registry.all_cases().iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn catalogue_preserves_group_then_declaration_order() {
        let registry = Registry::from_json(
            r#"{
                "compile_fail": ["bad/ref_to_temp.cpp"],
                "run_and_fail": ["c.src"],
                "run_and_succeed": ["a.src", "z.src"]
            }"#,
        )
        .unwrap();
        let cases: Vec<_> = registry
            .all_cases()
            .iter()
            .map(|c| (c.source.as_str(), c.expectation))
            .collect();
        assert_eq!(
            cases,
            [
                ("a.src", Expectation::CompileAndRunSucceed),
                ("z.src", Expectation::CompileAndRunSucceed),
                ("c.src", Expectation::CompileAndRunFail),
                ("bad/ref_to_temp.cpp", Expectation::CompileFail),
            ]
        );
    }

    #[test]
    fn empty_catalogue_is_rejected() {
        assert!(matches!(Registry::from_json("{}"), Err(RegistryError::Empty)));
    }

    #[test]
    fn duplicate_source_is_rejected_across_groups() {
        let err = Registry::from_json(r#"{"run_and_succeed":["a.cpp"],"compile_fail":["a.cpp"]}"#)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { ref path } if path == "a.cpp"));
    }

    #[test]
    fn sources_sharing_an_output_binary_are_rejected() {
        let err = Registry::from_json(r#"{"run_and_succeed":["t/a.cpp"],"run_and_fail":["t/a.c"]}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::OutputCollision { ref first, ref second }
                if first == "t/a.cpp" && second == "t/a.c"
        ));
        assert!(err.to_string().contains("same binary"));

        let distinct = Registry::from_json(r#"{"run_and_succeed":["t/a.cpp","u/a.cpp"]}"#);
        assert_eq!(distinct.unwrap().len(), 2);
    }

    #[test]
    fn source_without_extension_is_rejected() {
        let err = Registry::from_json(r#"{"run_and_succeed":["test/memory"]}"#).unwrap_err();
        assert!(matches!(err, RegistryError::NoExtension { .. }));
    }

    #[test]
    fn unknown_catalogue_keys_are_rejected() {
        let err = Registry::from_json(r#"{"should_run":["a.cpp"]}"#).unwrap_err();
        assert!(matches!(err, RegistryError::Json(_)));
    }

    #[test]
    fn output_path_strips_extension() {
        let case = TestCase::new("test/memory.cpp", Expectation::CompileAndRunSucceed);
        assert_eq!(case.output_path(), PathBuf::from("test/memory"));
        let case = TestCase::new("a.src", Expectation::CompileFail);
        assert_eq!(case.output_path(), PathBuf::from("a"));
    }

    #[test]
    fn only_run_kinds_execute() {
        assert!(Expectation::CompileAndRunSucceed.runs());
        assert!(Expectation::CompileAndRunFail.runs());
        assert!(!Expectation::CompileFail.runs());
    }
}
