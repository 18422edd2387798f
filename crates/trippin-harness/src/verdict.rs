//! Pass/fail classification of observed process statuses.

use serde::{Deserialize, Serialize};
use trippin_exec::ExitStatus;

use crate::registry::Expectation;

/// Final judgement for one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    #[must_use]
    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }

    const fn from_bool(pass: bool) -> Self {
        if pass { Self::Pass } else { Self::Fail }
    }
}

/// Decide whether the observed statuses satisfy `expectation`.
///
/// `run_status` is only meaningful when compilation succeeded; a run
/// expectation with a successful compile but no run status is a failure.
#[must_use]
pub fn classify(
    expectation: Expectation,
    compile_status: ExitStatus,
    run_status: Option<ExitStatus>,
) -> Verdict {
    match expectation {
        Expectation::CompileFail => Verdict::from_bool(!compile_status.success()),
        Expectation::CompileAndRunSucceed | Expectation::CompileAndRunFail
            if !compile_status.success() =>
        {
            Verdict::Fail
        }
        Expectation::CompileAndRunSucceed => {
            Verdict::from_bool(run_status.is_some_and(ExitStatus::success))
        }
        Expectation::CompileAndRunFail => {
            Verdict::from_bool(run_status.is_some_and(|status| !status.success()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK: ExitStatus = ExitStatus::SUCCESS;

    fn nonzero() -> impl Iterator<Item = ExitStatus> {
        [1, 2, 127, 134, 139, -1].into_iter().map(ExitStatus::from_code)
    }

    #[test]
    fn compile_fail_passes_only_when_compiler_rejects() {
        assert_eq!(classify(Expectation::CompileFail, OK, None), Verdict::Fail);
        // Whatever ran afterwards is irrelevant.
        assert_eq!(classify(Expectation::CompileFail, OK, Some(OK)), Verdict::Fail);
        for status in nonzero() {
            assert_eq!(classify(Expectation::CompileFail, status, None), Verdict::Pass);
            assert_eq!(
                classify(Expectation::CompileFail, status, Some(status)),
                Verdict::Pass
            );
        }
    }

    #[test]
    fn run_and_succeed_table() {
        let e = Expectation::CompileAndRunSucceed;
        assert_eq!(classify(e, OK, Some(OK)), Verdict::Pass);
        for status in nonzero() {
            assert_eq!(classify(e, status, None), Verdict::Fail);
            assert_eq!(classify(e, status, Some(OK)), Verdict::Fail);
            assert_eq!(classify(e, OK, Some(status)), Verdict::Fail);
        }
    }

    #[test]
    fn run_and_fail_table() {
        let e = Expectation::CompileAndRunFail;
        assert_eq!(classify(e, OK, Some(OK)), Verdict::Fail);
        for status in nonzero() {
            assert_eq!(classify(e, status, None), Verdict::Fail);
            assert_eq!(classify(e, status, Some(status)), Verdict::Fail);
            assert_eq!(classify(e, OK, Some(status)), Verdict::Pass);
        }
    }

    #[test]
    fn run_kinds_without_run_status_fail() {
        assert_eq!(
            classify(Expectation::CompileAndRunSucceed, OK, None),
            Verdict::Fail
        );
        assert_eq!(
            classify(Expectation::CompileAndRunFail, OK, None),
            Verdict::Fail
        );
    }

    #[test]
    fn verdict_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Verdict::Pass).unwrap(), "\"pass\"");
        assert!(!Verdict::Fail.is_pass());
    }
}
