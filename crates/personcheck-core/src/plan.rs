//! Dry run plan types and config validation
//!
//! Describes what the harness *would* do without sending any requests.
//! Used for pre-flight validation and CI previews.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{AuthConfig, Config};
use crate::schema::{ERROR_OBJECT, SchemaDocument};

// ── Plan types ──

/// Complete dry run plan: scenarios, schemas, and config warnings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DryRunPlan {
    pub base_url: String,
    pub scenarios: Vec<ScenarioPlan>,
    /// Config/schema validation results
    pub validations: Vec<Validation>,
}

/// What one scenario would do.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioPlan {
    pub name: String,
    /// Schemas the scenario validates against
    pub schemas: Vec<String>,
    /// Query parameters it would probe
    pub query_params: Vec<String>,
    /// Why it would be skipped, if fixtures are missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// A validation check result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    pub check: String,
    pub status: ValidationStatus,
    pub message: String,
}

impl Validation {
    fn new(check: &str, status: ValidationStatus, message: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            status,
            message: message.into(),
        }
    }
}

/// Status of a validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// ── Config validation ──

/// Patterns that suggest a placeholder value rather than a real credential.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-client",
    "your-secret",
    "CHANGEME",
    "changeme",
    "placeholder",
    "xxx",
    "XXX",
    "replace-me",
];

/// Validate config and produce validation results.
#[must_use]
pub fn validate_config(config: &Config) -> Vec<Validation> {
    let mut checks = Vec::new();

    let base_url = config.base_url();
    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        checks.push(Validation::new(
            "base_url",
            ValidationStatus::Ok,
            format!("base_url: {base_url}"),
        ));
    } else {
        checks.push(Validation::new(
            "base_url",
            ValidationStatus::Warning,
            format!("base_url: {base_url} (missing http:// or https:// prefix)"),
        ));
    }

    match config.auth() {
        Ok(AuthConfig::Basic { username, password }) => {
            checks.push(Validation::new(
                "auth",
                ValidationStatus::Ok,
                format!("auth: basic ({username})"),
            ));
            checks.extend(placeholder_warning("basic_auth_password", &password));
        }
        Ok(AuthConfig::ClientCredentials {
            token_url,
            client_id,
            client_secret,
        }) => {
            checks.push(Validation::new(
                "auth",
                ValidationStatus::Ok,
                format!("auth: client credentials via {token_url}"),
            ));
            checks.extend(placeholder_warning("client_id", &client_id));
            checks.extend(placeholder_warning("client_secret", &client_secret));
        }
        Ok(AuthConfig::Anonymous) => checks.push(Validation::new(
            "auth",
            ValidationStatus::Ok,
            "auth: none (local_test)",
        )),
        Err(e) => checks.push(Validation::new(
            "auth",
            ValidationStatus::Error,
            format!("auth: {e}"),
        )),
    }

    if config.local_test {
        checks.push(Validation::new(
            "local_test",
            ValidationStatus::Warning,
            "local_test: TLS certificate verification disabled",
        ));
    }

    if config.timeout_seconds > 0.0 {
        checks.push(Validation::new(
            "timeout",
            ValidationStatus::Ok,
            format!("timeout_seconds: {}", config.timeout_seconds),
        ));
    } else {
        checks.push(Validation::new(
            "timeout",
            ValidationStatus::Error,
            format!("timeout_seconds: {} (must be positive)", config.timeout_seconds),
        ));
    }

    if let Some(limit) = config.max_elapsed_seconds {
        let status = if limit > 0.0 {
            ValidationStatus::Ok
        } else {
            ValidationStatus::Error
        };
        checks.push(Validation::new(
            "max_elapsed",
            status,
            format!("max_elapsed_seconds: {limit}"),
        ));
    }

    if config.test_cases.valid_osu_ids.is_empty() {
        checks.push(Validation::new(
            "test_cases",
            ValidationStatus::Warning,
            "test_cases.valid_osu_ids: empty (scenarios without their own fixture will be skipped)",
        ));
    }

    for (endpoint, params) in &config.query_params {
        for (name, spec) in params {
            if spec.valid.is_empty() && spec.invalid.is_empty() {
                checks.push(Validation::new(
                    "query_params",
                    ValidationStatus::Warning,
                    format!("query_params.{endpoint}.{name}: no values"),
                ));
            }
        }
    }

    checks
}

fn placeholder_warning(key: &str, value: &str) -> Option<Validation> {
    if value.contains('<') && value.contains('>') {
        return Some(Validation::new(
            "auth",
            ValidationStatus::Warning,
            format!("{key}: contains '<...>' placeholder"),
        ));
    }
    PLACEHOLDER_PATTERNS
        .iter()
        .find(|pattern| value.contains(*pattern))
        .map(|pattern| {
            Validation::new(
                "auth",
                ValidationStatus::Warning,
                format!("{key}: contains '{pattern}', may be placeholder"),
            )
        })
}

/// Check that every schema a run needs is declared in the document.
#[must_use]
pub fn validate_schemas<'a>(
    doc: &SchemaDocument,
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<Validation> {
    let mut checks = vec![Validation::new(
        "schema",
        ValidationStatus::Ok,
        format!(
            "document: {} ({} schemas)",
            doc.dialect(),
            doc.schema_names().len()
        ),
    )];
    for name in names {
        let check = match doc.resolve(name) {
            Ok(_) => Validation::new("schema", ValidationStatus::Ok, format!("schema {name}: resolved")),
            Err(e) => Validation::new("schema", ValidationStatus::Error, format!("schema {name}: {e}")),
        };
        checks.push(check);
    }
    if !doc.contains(ERROR_OBJECT) {
        checks.push(Validation::new(
            "schema",
            ValidationStatus::Ok,
            format!("schema {ERROR_OBJECT}: not declared, built-in definition used"),
        ));
    }
    checks
}

// ── Display helpers ──

impl DryRunPlan {
    /// Format as human-readable terminal output.
    #[must_use]
    pub fn to_terminal(&self) -> String {
        let runnable = self
            .scenarios
            .iter()
            .filter(|s| s.skip_reason.is_none())
            .count();
        let mut lines = vec![format!(
            "Dry run: {} scenarios ({runnable} runnable) against {}\n",
            self.scenarios.len(),
            self.base_url
        )];

        for scenario in &self.scenarios {
            match &scenario.skip_reason {
                Some(reason) => lines.push(format!("{} (skip: {reason})", scenario.name)),
                None => lines.push(format!("{}:", scenario.name)),
            }
            if !scenario.schemas.is_empty() {
                lines.push(format!("  Schemas: {}", scenario.schemas.join(", ")));
            }
            if !scenario.query_params.is_empty() {
                lines.push(format!("  Probes: {}", scenario.query_params.join(", ")));
            }
        }
        lines.push(String::new());

        lines.push("Config validation:".into());
        for v in &self.validations {
            lines.push(format!("  [{}] {}", v.status, v.message));
        }

        lines.join("\n")
    }

    /// Returns true if any validation has Error status.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Error)
    }

    /// Returns true if any validation has Warning status.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.validations
            .iter()
            .any(|v| v.status == ValidationStatus::Warning)
    }
}
