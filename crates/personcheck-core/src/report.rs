//! Run report: per-scenario results, serialisable as JSON
//!
//! `personcheck schema` publishes the JSON Schema of [`SuiteReport`] so CI
//! tooling can consume `--output json` without guessing its shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::verdict::CheckFailure;

/// Outcome of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    /// Fixtures for the scenario were not configured
    Skipped,
    /// The scenario stopped before finishing (harness fault)
    Aborted,
}

impl ScenarioStatus {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
            Self::Aborted => "ABORT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ScenarioStatus,
    /// Checks performed (requests whose outcome was judged)
    pub checks: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<CheckFailure>,
    /// Why the scenario was skipped or aborted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ScenarioReport {
    /// Report for a scenario that ran; failed iff `failures` is non-empty.
    #[must_use]
    pub fn completed(name: impl Into<String>, checks: usize, failures: Vec<CheckFailure>) -> Self {
        let status = if failures.is_empty() {
            ScenarioStatus::Passed
        } else {
            ScenarioStatus::Failed
        };
        Self {
            name: name.into(),
            status,
            checks,
            failures,
            reason: None,
        }
    }

    #[must_use]
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Skipped,
            checks: 0,
            failures: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    /// Report for a scenario that stopped early; failures found so far are kept.
    #[must_use]
    pub fn aborted(
        name: impl Into<String>,
        checks: usize,
        failures: Vec<CheckFailure>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Aborted,
            checks,
            failures,
            reason: Some(reason.into()),
        }
    }
}

/// Top-level output of `personcheck run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuiteReport {
    /// API under test
    pub base_url: String,
    pub total_checks: usize,
    pub failure_count: usize,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    #[must_use]
    pub fn new(base_url: impl Into<String>, scenarios: Vec<ScenarioReport>) -> Self {
        let total_checks = scenarios.iter().map(|s| s.checks).sum();
        let failure_count = scenarios.iter().map(|s| s.failures.len()).sum();
        Self {
            base_url: base_url.into(),
            total_checks,
            failure_count,
            scenarios,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckFailure> {
        self.scenarios.iter().flat_map(|s| s.failures.iter())
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(ScenarioStatus::Skipped)
    }

    #[must_use]
    pub fn aborted(&self) -> usize {
        self.count(ScenarioStatus::Aborted)
    }

    fn count(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }

    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let mut lines = vec![format!("personcheck: {}", self.base_url), String::new()];

        for scenario in &self.scenarios {
            let tag = scenario.status.tag();
            match scenario.status {
                ScenarioStatus::Skipped => lines.push(format!(
                    "[{tag}] {}: {}",
                    scenario.name,
                    scenario.reason.as_deref().unwrap_or("no reason given")
                )),
                ScenarioStatus::Aborted => {
                    lines.push(format!(
                        "[{tag}] {} after {} checks: {}",
                        scenario.name,
                        scenario.checks,
                        scenario.reason.as_deref().unwrap_or("no reason given")
                    ));
                    push_failures(&mut lines, &scenario.failures);
                }
                ScenarioStatus::Passed => {
                    lines.push(format!("[{tag}] {} ({} checks)", scenario.name, scenario.checks));
                }
                ScenarioStatus::Failed => {
                    lines.push(format!(
                        "[{tag}] {} ({} checks, {} failures)",
                        scenario.name,
                        scenario.checks,
                        scenario.failures.len()
                    ));
                    push_failures(&mut lines, &scenario.failures);
                }
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "{} checks, {} failures, {} skipped",
            self.total_checks,
            self.failure_count,
            self.skipped()
        ));
        lines.join("\n")
    }
}

fn push_failures(lines: &mut Vec<String>, failures: &[CheckFailure]) {
    for failure in failures {
        let text = failure.to_string().replace('\n', "\n  ");
        lines.push(format!("  [{}] {text}", failure.severity));
    }
}

/// Generate JSON Schema for the report format.
///
/// # Errors
///
/// Returns error if the schema cannot be serialised.
pub fn generate_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(SuiteReport);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::FieldPath;
    use crate::validate::Violation;
    use crate::verdict::{FailureKind, HttpMethod};

    fn sample() -> SuiteReport {
        let schema_failure = CheckFailure::new(
            HttpMethod::Get,
            "https://api.example.edu/v2/persons/930000000/jobs",
            FailureKind::SchemaMismatch {
                schema: "JobsResource".into(),
                violations: vec![
                    Violation::new(
                        FieldPath::root().key("data").index(0).key("id"),
                        "string",
                        "integer 7",
                    ),
                    Violation::new(
                        FieldPath::root().key("data").index(1).key("attributes").key("fte"),
                        "non-null",
                        "null",
                    ),
                ],
            },
        )
        .with_status(200);
        let status_failure = CheckFailure::new(
            HttpMethod::Post,
            "https://api.example.edu/v2/persons/930000000/jobs",
            FailureKind::UnexpectedStatus {
                expected: 400,
                actual: 202,
                body: r#"{"data":{}}"#.into(),
            },
        )
        .with_status(202);

        SuiteReport::new(
            "https://api.example.edu/v2/persons",
            vec![
                ScenarioReport::completed("person_by_id", 3, vec![]),
                ScenarioReport::completed("jobs", 5, vec![schema_failure, status_failure]),
                ScenarioReport::skipped("image", "no image_person or valid_osu_ids configured"),
            ],
        )
    }

    #[test]
    fn totals_are_summed() {
        let report = sample();
        assert_eq!(report.total_checks, 8);
        assert_eq!(report.failure_count, 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failures().count(), 2);
        assert_eq!(report.scenarios[1].status, ScenarioStatus::Failed);
    }

    #[test]
    fn terminal_rendering() {
        insta::assert_snapshot!(sample().to_terminal(), @r#"
        personcheck: https://api.example.edu/v2/persons

        [PASS] person_by_id (3 checks)
        [FAIL] jobs (5 checks, 2 failures)
          [error] GET https://api.example.edu/v2/persons/930000000/jobs: response does not match JobsResource (2 violations)
            - data[0].id: expected string, got integer 7
            - data[1].attributes.fte: expected non-null, got null
          [error] POST https://api.example.edu/v2/persons/930000000/jobs: expected status 400, got 202
            body: {"data":{}}
        [SKIP] image: no image_person or valid_osu_ids configured

        8 checks, 2 failures, 1 skipped
        "#);
    }

    #[test]
    fn aborted_scenarios_are_counted_and_rendered() {
        let report = SuiteReport::new(
            "https://localhost:8080/v2/persons",
            vec![ScenarioReport::aborted("phones", 1, vec![], "scenario panicked: boom")],
        );
        assert_eq!(report.aborted(), 1);
        assert_eq!(report.skipped(), 0);
        assert!(
            report
                .to_terminal()
                .contains("[ABORT] phones after 1 checks: scenario panicked: boom")
        );
    }

    #[test]
    fn json_omits_empty_fields() {
        let json = serde_json::to_value(sample()).unwrap();
        let passed = &json["scenarios"][0];
        assert_eq!(passed["status"], "passed");
        assert!(passed.get("failures").is_none());
        assert!(passed.get("reason").is_none());
        assert_eq!(json["scenarios"][2]["status"], "skipped");
    }

    #[test]
    fn schema_generation_produces_valid_json() {
        let schema = generate_schema().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(
            parsed.get("title").and_then(|v| v.as_str()),
            Some("SuiteReport")
        );
    }
}
