//! Query parameter probing: configured valid values must succeed, invalid
//! ones must be rejected with 400

use std::collections::BTreeSet;

use personcheck_core::{CheckFailure, ERROR_OBJECT, QueryParamSpec};

use crate::checker::{CheckOptions, EndpointChecker};
use crate::context::HarnessContext;
use crate::http::query_value;

/// Placeholder replaced by the probed person's OSU ID.
pub const OSU_ID_PLACEHOLDER: &str = "{osuId}";

/// One probe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCase {
    pub param: String,
    pub value: String,
    pub expected_status: u16,
}

/// Expand specs into probe requests: parameters in name order, valid values
/// before invalid ones, one parameter per request.
#[must_use]
pub fn probe_cases(specs: &[QueryParamSpec]) -> Vec<ProbeCase> {
    let mut specs: Vec<&QueryParamSpec> = specs.iter().collect();
    specs.sort_by(|a, b| a.name.cmp(&b.name));

    let mut cases = Vec::new();
    for spec in specs {
        let valid = spec.valid.iter().map(|v| (v, 200));
        let invalid = spec.invalid.iter().map(|v| (v, 400));
        cases.extend(valid.chain(invalid).map(|(value, expected_status)| ProbeCase {
            param: spec.name.clone(),
            value: query_value(value),
            expected_status,
        }));
    }
    cases
}

pub struct QueryParameterProbe<'a> {
    checker: EndpointChecker<'a>,
}

impl<'a> QueryParameterProbe<'a> {
    #[must_use]
    pub fn new(ctx: &'a HarnessContext) -> Self {
        Self {
            checker: ctx.checker(),
        }
    }

    /// Probe `path` (with `{osuId}` replaced by `osu_id`) once per
    /// configured value and collect every failure.
    ///
    /// Valid values are checked against `schema_name`, invalid ones against
    /// the error object.
    #[must_use]
    pub fn probe(
        &self,
        path: &str,
        schema_name: &str,
        nullable_fields: Option<&BTreeSet<String>>,
        specs: &[QueryParamSpec],
        osu_id: &str,
    ) -> Vec<CheckFailure> {
        let path = path.replace(OSU_ID_PLACEHOLDER, osu_id);
        let mut failures = Vec::new();

        for case in probe_cases(specs) {
            let mut options = CheckOptions::get().with_query(&case.param, &case.value);
            let schema = if case.expected_status == 200 {
                if let Some(fields) = nullable_fields {
                    options = options.with_nullable_fields(fields.clone());
                }
                schema_name
            } else {
                ERROR_OBJECT
            };
            let found = self
                .checker
                .check_all(&path, schema, case.expected_status, &options);
            if !found.is_empty() {
                tracing::debug!(
                    param = %case.param,
                    value = %case.value,
                    failures = found.len(),
                    "probe failed"
                );
            }
            failures.extend(found);
        }
        failures
    }
}
