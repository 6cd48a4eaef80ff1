//! Endpoint checker: one request, every check on its response

mod checks;

use std::collections::BTreeSet;

use personcheck_core::{CheckFailure, ERROR_OBJECT, FailureKind, HttpMethod, Rule};
use serde_json::Value;

use crate::context::HarnessContext;
use crate::http::{HttpError, HttpRequest};

use checks::{CheckInput, run_checks};

/// Per-check options. Defaults: GET, no query, catalog nullable set,
/// context latency limit, no rules.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    /// Replaces the schema's nullable-field set when present
    pub nullable_fields: Option<BTreeSet<String>>,
    /// Overrides the context's soft latency limit
    pub max_elapsed: Option<f64>,
    pub rules: Vec<Rule>,
    /// Substring the error response's developer message must contain
    pub expected_message: Option<String>,
    /// Expected media type of the response
    pub content_type: Option<String>,
}

impl CheckOptions {
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn post(body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            body: Some(body),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_nullable_fields(mut self, fields: BTreeSet<String>) -> Self {
        self.nullable_fields = Some(fields);
        self
    }

    #[must_use]
    pub fn with_max_elapsed(mut self, seconds: f64) -> Self {
        self.max_elapsed = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_expected_message(mut self, message: impl Into<String>) -> Self {
        self.expected_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, media_type: impl Into<String>) -> Self {
        self.content_type = Some(media_type.into());
        self
    }
}

/// Failures of one check plus the decoded body, for scenarios that follow
/// links found in a response.
#[derive(Debug, Clone, Default)]
pub struct Inspection {
    pub failures: Vec<CheckFailure>,
    pub body: Option<Value>,
}

/// Issues requests through the context's client and judges the responses.
#[derive(Clone, Copy)]
pub struct EndpointChecker<'a> {
    ctx: &'a HarnessContext,
}

impl<'a> EndpointChecker<'a> {
    #[must_use]
    pub fn new(ctx: &'a HarnessContext) -> Self {
        Self { ctx }
    }

    /// Check one endpoint and stop at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`CheckFailure`] in check order: transport,
    /// status, body, content type, latency.
    pub fn check(
        &self,
        path: &str,
        schema_name: &str,
        expected_status: u16,
        options: &CheckOptions,
    ) -> Result<(), CheckFailure> {
        match self.check_all(path, schema_name, expected_status, options).into_iter().next() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Check one endpoint and collect every failure.
    #[must_use]
    pub fn check_all(
        &self,
        path: &str,
        schema_name: &str,
        expected_status: u16,
        options: &CheckOptions,
    ) -> Vec<CheckFailure> {
        self.inspect(path, schema_name, expected_status, options).failures
    }

    /// Like [`check_all`](Self::check_all), also returning the decoded body.
    #[must_use]
    pub fn inspect(
        &self,
        path: &str,
        schema_name: &str,
        expected_status: u16,
        options: &CheckOptions,
    ) -> Inspection {
        let request = HttpRequest {
            method: options.method,
            url: self.ctx.url(path),
            query: options.query.clone(),
            body: options.body.clone(),
        };
        let url = request.display_url();

        let response = match self.ctx.client().send(&request) {
            Ok(response) => response,
            Err(e) => {
                let kind = match e {
                    HttpError::Timeout(limit) => FailureKind::Timeout { limit },
                    other => FailureKind::Transport {
                        message: other.to_string(),
                    },
                };
                tracing::debug!(method = %options.method, %url, failure = %kind, "request failed");
                return Inspection {
                    failures: vec![CheckFailure::new(options.method, url, kind)],
                    body: None,
                };
            }
        };

        let catalog = self.ctx.catalog();
        let schema = catalog.get(schema_name);
        let error_schema = catalog.get(ERROR_OBJECT);
        let input = CheckInput {
            status: response.status,
            expected_status,
            body: &response.body,
            content_type: response.content_type.as_deref(),
            elapsed: response.elapsed,
            schema_name,
            schema: schema.as_deref(),
            error_schema: error_schema.as_deref(),
            nullable_override: options.nullable_fields.as_ref(),
            rules: &options.rules,
            expected_message: options.expected_message.as_deref(),
            expected_content_type: options.content_type.as_deref(),
            max_elapsed: options.max_elapsed.or_else(|| self.ctx.max_elapsed()),
        };
        let outcome = run_checks(&input);

        tracing::debug!(
            method = %options.method,
            %url,
            status = response.status,
            expected_status,
            failures = outcome.failures.len(),
            "checked"
        );

        let failures = outcome
            .failures
            .into_iter()
            .map(|kind| {
                CheckFailure::new(options.method, url.clone(), kind)
                    .with_status(response.status)
                    .with_elapsed(response.elapsed)
            })
            .collect();
        Inspection {
            failures,
            body: outcome.body,
        }
    }
}
