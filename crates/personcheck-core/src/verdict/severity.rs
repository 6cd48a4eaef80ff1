//! Severity levels for check failures
//!
//! The highest severity of a run decides the exit code.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Failure severity - maps directly to exit codes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Soft limit exceeded, e.g. latency (exit 0, or 1 if strict)
    Warning,
    /// Contract broken: status, schema, invariant, content type (exit 1)
    Error,
    /// No usable response: timeout, transport error (exit 2)
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn exit_code(self, strict: bool) -> i32 {
        match self {
            Self::Warning if strict => 1,
            Self::Warning => 0,
            Self::Error => 1,
            Self::Critical => 2,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
