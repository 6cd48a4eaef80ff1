//! Failure types and structured representation

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Severity;
use crate::validate::Violation;

/// Longest response body excerpt kept in an [`FailureKind::UnexpectedStatus`].
pub const BODY_EXCERPT_CHARS: usize = 200;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong - determines default severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    /// Status differs from the expected one; body excerpt kept
    UnexpectedStatus {
        expected: u16,
        actual: u16,
        body: String,
    },
    /// Body does not match the named schema
    SchemaMismatch {
        schema: String,
        violations: Vec<Violation>,
    },
    /// Body matches its schema but breaks a business rule
    InvariantViolated { violations: Vec<Violation> },
    /// Response media type differs from the expected one
    ContentTypeMismatch {
        expected: String,
        actual: Option<String>,
    },
    /// Response arrived, but slower than allowed (seconds)
    LatencyExceeded { elapsed: f64, limit: f64 },
    /// No response within the client timeout (seconds)
    Timeout { limit: f64 },
    /// Connection, TLS or protocol error
    Transport { message: String },
    /// Schema needed by the check was unavailable
    Schema { message: String },
}

impl FailureKind {
    /// Default severity for this failure kind
    #[must_use]
    pub const fn default_severity(&self) -> Severity {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => Severity::Critical,
            Self::LatencyExceeded { .. } => Severity::Warning,
            Self::UnexpectedStatus { .. }
            | Self::SchemaMismatch { .. }
            | Self::InvariantViolated { .. }
            | Self::ContentTypeMismatch { .. }
            | Self::Schema { .. } => Severity::Error,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::InvariantViolated { .. } => "invariant_violated",
            Self::ContentTypeMismatch { .. } => "content_type_mismatch",
            Self::LatencyExceeded { .. } => "latency_exceeded",
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "transport",
            Self::Schema { .. } => "schema",
        }
    }

    /// Violations carried by this kind, if any
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::SchemaMismatch { violations, .. } | Self::InvariantViolated { violations } => {
                violations
            }
            _ => &[],
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedStatus {
                expected, actual, ..
            } => write!(f, "expected status {expected}, got {actual}"),
            Self::SchemaMismatch { schema, violations } => write!(
                f,
                "response does not match {schema} ({} violations)",
                violations.len()
            ),
            Self::InvariantViolated { violations } => {
                write!(f, "{} invariant violations", violations.len())
            }
            Self::ContentTypeMismatch { expected, actual } => write!(
                f,
                "expected content type {expected}, got {}",
                actual.as_deref().unwrap_or("none")
            ),
            Self::LatencyExceeded { elapsed, limit } => {
                write!(f, "took {elapsed:.3}s, limit {limit:.3}s")
            }
            Self::Timeout { limit } => write!(f, "timed out after {limit:.3}s"),
            Self::Transport { message } => write!(f, "transport error: {message}"),
            Self::Schema { message } => write!(f, "schema unavailable: {message}"),
        }
    }
}

/// One failed check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CheckFailure {
    pub method: HttpMethod,
    /// Full request URL, query string included
    pub url: String,
    /// Status received, if a response arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Seconds until the response completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
    pub kind: FailureKind,
    pub severity: Severity,
}

impl CheckFailure {
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>, kind: FailureKind) -> Self {
        let severity = kind.default_severity();
        Self {
            method,
            url: url.into(),
            status: None,
            elapsed: None,
            kind,
            severity,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed: f64) -> Self {
        self.elapsed = Some(elapsed);
        self
    }
}

impl std::fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.method, self.url, self.kind)?;
        for violation in self.kind.violations() {
            write!(f, "\n  - {violation}")?;
        }
        if let FailureKind::UnexpectedStatus { body, .. } = &self.kind {
            if !body.is_empty() {
                write!(f, "\n  body: {body}")?;
            }
        }
        Ok(())
    }
}

/// Lossy UTF-8 excerpt of a response body, at most [`BODY_EXCERPT_CHARS`] characters.
#[must_use]
pub fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(BODY_EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
