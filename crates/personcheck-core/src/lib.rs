//! personcheck-core: schema resolution and response validation for the persons API harness
//!
//! Everything here is pure: no network, no global state. Schema documents
//! are resolved into reference-free trees, response bodies are checked
//! structurally and against business rules, and check failures are judged
//! into a verdict.

pub mod config;
pub mod formats;
pub mod path;
pub mod plan;
pub mod report;
pub mod rules;
pub mod schema;
pub mod validate;
pub mod verdict;

pub use config::{
    AuthConfig, Config, ConfigError, IdentifierNames, PersonIds, QueryParamSpec, TestCases,
};
pub use path::{FieldPath, PathSegment};
pub use plan::DryRunPlan;
pub use report::{ScenarioReport, ScenarioStatus, SuiteReport};
pub use rules::{Rule, Selector};
pub use schema::{
    ERROR_OBJECT, ResolvedSchema, SchemaCatalog, SchemaDefinition, SchemaDocument, SchemaError,
    nullable_fields,
};
pub use validate::{Violation, validate};
pub use verdict::{
    CheckFailure, FailureKind, HttpMethod, Severity, Verdict, VerdictPolicy, VerdictStatus,
};
