//! Schema resolution: API description document → reference-free definitions
//!
//! [`SchemaDocument`] loads a Swagger 2.0 or OpenAPI 3.x file, [`SchemaDocument::resolve`]
//! turns a named schema into a [`SchemaDefinition`] tree with every `$ref`
//! followed, and [`nullable_fields`] lists the paths where `null` is allowed.

mod catalog;
mod document;
mod node;
mod resolve;

use std::collections::BTreeSet;
use std::path::PathBuf;

pub use catalog::{ERROR_OBJECT, ResolvedSchema, SchemaCatalog};
pub use document::{DialectKind, SchemaDocument};
pub use node::{Constraints, NodeKind, ScalarType, SchemaDefinition, SchemaNode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unknown document dialect: expected a top-level `swagger` or `openapi` key")]
    UnknownDialect,
    #[error("Schema not found: {0}")]
    NotFound(String),
    #[error("Reference cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },
    #[error("Dangling reference {reference} at {location}")]
    DanglingReference { reference: String, location: String },
    #[error("Unsupported schema at {location}: {reason}")]
    Unsupported { location: String, reason: String },
    #[error("Invalid constraint at {location}: {message}")]
    InvalidConstraint { location: String, message: String },
}

/// Pattern paths (`data.attributes.jobs[].endDate`) of every node that accepts `null`.
///
/// The root is reported as `""` when the whole document may be `null`.
#[must_use]
pub fn nullable_fields(definition: &SchemaDefinition) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_nullable(&definition.root, String::new(), &mut out);
    out
}

fn collect_nullable(node: &SchemaNode, pattern: String, out: &mut BTreeSet<String>) {
    if node.nullable {
        out.insert(pattern.clone());
    }
    match &node.kind {
        NodeKind::Object { properties, .. } => {
            for (name, child) in properties {
                let child_pattern = if pattern.is_empty() {
                    name.clone()
                } else {
                    format!("{pattern}.{name}")
                };
                collect_nullable(child, child_pattern, out);
            }
        }
        NodeKind::Array { items } => collect_nullable(items, format!("{pattern}[]"), out),
        NodeKind::Scalar(_) => {}
    }
}
