//! Verdict policy - turns check failures into pass/fail and an exit code

use super::{CheckFailure, Severity};

/// Exit code for harness errors (config, schema, auth) and empty runs
pub const TOOL_ERROR_EXIT: i32 = 3;

/// Policy for judging failures
#[derive(Debug, Clone)]
pub struct VerdictPolicy {
    /// Strict mode: warnings fail the run
    pub strict: bool,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl VerdictPolicy {
    /// Warnings don't fail
    #[must_use]
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    /// Highest exit code among `failures`, 0 if none.
    #[must_use]
    pub fn exit_code(&self, failures: &[CheckFailure]) -> i32 {
        failures
            .iter()
            .map(|f| f.severity.exit_code(self.strict))
            .max()
            .unwrap_or(0)
    }

    /// Judge a run that performed `total_checks` checks.
    ///
    /// A run with no checks at all fails with [`TOOL_ERROR_EXIT`]: every
    /// scenario was skipped, so nothing was verified.
    #[must_use]
    pub fn verdict(&self, failures: &[CheckFailure], total_checks: usize) -> Verdict {
        if total_checks == 0 {
            return Verdict {
                status: VerdictStatus::Fail,
                exit_code: TOOL_ERROR_EXIT,
                reason: "No checks were run".to_string(),
            };
        }

        let exit_code = self.exit_code(failures);
        let count = |severity: Severity| failures.iter().filter(|f| f.severity == severity).count();
        let (critical, error, warning) = (
            count(Severity::Critical),
            count(Severity::Error),
            count(Severity::Warning),
        );

        if exit_code == 0 {
            let reason = if warning > 0 {
                format!("All {total_checks} checks passed ({warning} warnings)")
            } else {
                format!("All {total_checks} checks passed")
            };
            return Verdict {
                status: VerdictStatus::Pass,
                exit_code,
                reason,
            };
        }

        Verdict {
            status: VerdictStatus::Fail,
            exit_code,
            reason: format!(
                "{} of {total_checks} checks failed ({critical} critical, {error} error, {warning} warning)",
                failures.len()
            ),
        }
    }
}

/// Final verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub exit_code: i32,
    pub reason: String,
}

/// Pass or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{FailureKind, HttpMethod};

    fn failure(kind: FailureKind) -> CheckFailure {
        CheckFailure::new(HttpMethod::Get, "http://localhost/persons/1", kind)
    }

    fn critical() -> CheckFailure {
        failure(FailureKind::Timeout { limit: 30.0 })
    }

    fn error() -> CheckFailure {
        failure(FailureKind::UnexpectedStatus {
            expected: 200,
            actual: 404,
            body: String::new(),
        })
    }

    fn warning() -> CheckFailure {
        failure(FailureKind::LatencyExceeded {
            elapsed: 3.0,
            limit: 1.0,
        })
    }

    #[test]
    fn default_policy_is_strict() {
        assert!(VerdictPolicy::default().strict);
    }

    #[test]
    fn exit_code_highest_severity_wins() {
        let policy = VerdictPolicy::default();
        assert_eq!(policy.exit_code(&[]), 0);
        assert_eq!(policy.exit_code(&[warning(), error(), critical()]), 2);
        assert_eq!(policy.exit_code(&[warning(), error()]), 1);
    }

    #[test]
    fn warning_strict_vs_lenient() {
        assert_eq!(VerdictPolicy::default().exit_code(&[warning()]), 1);
        assert_eq!(VerdictPolicy::lenient().exit_code(&[warning()]), 0);
    }

    #[test]
    fn verdict_all_passed() {
        let v = VerdictPolicy::default().verdict(&[], 12);
        assert_eq!(v.status, VerdictStatus::Pass);
        assert_eq!(v.exit_code, 0);
        assert_eq!(v.reason, "All 12 checks passed");
    }

    #[test]
    fn verdict_no_checks_is_tool_error() {
        let v = VerdictPolicy::default().verdict(&[], 0);
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.exit_code, TOOL_ERROR_EXIT);
    }

    #[test]
    fn verdict_lenient_warning_passes() {
        let v = VerdictPolicy::lenient().verdict(&[warning()], 4);
        assert_eq!(v.status, VerdictStatus::Pass);
        assert!(v.reason.contains("1 warnings"));
    }

    #[test]
    fn verdict_reason_counts_severities() {
        let v = VerdictPolicy::default().verdict(&[critical(), error(), warning()], 10);
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.exit_code, 2);
        assert_eq!(
            v.reason,
            "3 of 10 checks failed (1 critical, 1 error, 1 warning)"
        );
    }
}
