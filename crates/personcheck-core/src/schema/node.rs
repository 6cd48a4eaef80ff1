//! Resolved schema tree; no `$ref` survives into these types

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

/// Primitive type of a scalar node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Integer,
    Number,
    Boolean,
    /// No declared type: any non-null value is accepted
    Any,
}

impl ScalarType {
    /// Map a schema `type` keyword to a scalar type.
    ///
    /// Swagger 2.0 `file` responses are treated as strings.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" | "file" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Any => "any",
        }
    }

    /// Type check for a non-null JSON value. Integral floats count as integers.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Any => true,
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Object {
        properties: BTreeMap<String, SchemaNode>,
        required: BTreeSet<String>,
    },
    Array {
        items: Box<SchemaNode>,
    },
    Scalar(ScalarType),
}

/// One node of a resolved schema definition.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub nullable: bool,
    pub format: Option<String>,
    pub constraints: Option<Constraints>,
}

impl SchemaNode {
    #[must_use]
    pub const fn scalar(ty: ScalarType) -> Self {
        Self {
            kind: NodeKind::Scalar(ty),
            nullable: false,
            format: None,
            constraints: None,
        }
    }

    #[must_use]
    pub fn object(properties: BTreeMap<String, SchemaNode>, required: BTreeSet<String>) -> Self {
        Self {
            kind: NodeKind::Object {
                properties,
                required,
            },
            nullable: false,
            format: None,
            constraints: None,
        }
    }

    #[must_use]
    pub fn array(items: SchemaNode) -> Self {
        Self {
            kind: NodeKind::Array {
                items: Box::new(items),
            },
            nullable: false,
            format: None,
            constraints: None,
        }
    }

    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Binary payloads (`type: string, format: binary`) are not JSON documents.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar(ScalarType::String))
            && self.format.as_deref() == Some("binary")
    }

    /// Child node for an object property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        match &self.kind {
            NodeKind::Object { properties, .. } => properties.get(name),
            _ => None,
        }
    }

    /// Short label for diagnostics: "object", "array", "string (date)".
    #[must_use]
    pub fn describe(&self) -> String {
        let base = match &self.kind {
            NodeKind::Object { .. } => "object",
            NodeKind::Array { .. } => "array",
            NodeKind::Scalar(ty) => ty.as_str(),
        };
        match &self.format {
            Some(format) => format!("{base} ({format})"),
            None => base.to_string(),
        }
    }
}

/// Scalar keyword constraints (`enum`, `minimum`, `pattern`, ...) compiled once
/// at resolve time.
#[derive(Clone)]
pub struct Constraints {
    keywords: Value,
    validator: Arc<jsonschema::Validator>,
}

impl Constraints {
    /// Compile a keyword object. Draft-4 style boolean `exclusiveMinimum` /
    /// `exclusiveMaximum` must already be normalized to numbers.
    ///
    /// # Errors
    ///
    /// Returns the compiler's message if the keywords are not valid JSON Schema.
    pub fn compile(keywords: Value) -> Result<Self, String> {
        let validator = jsonschema::validator_for(&keywords).map_err(|e| e.to_string())?;
        Ok(Self {
            keywords,
            validator: Arc::new(validator),
        })
    }

    #[must_use]
    pub fn keywords(&self) -> &Value {
        &self.keywords
    }

    /// Error messages for every constraint `value` breaks.
    #[must_use]
    pub fn check(&self, value: &Value) -> Vec<String> {
        self.validator
            .iter_errors(value)
            .map(|e| e.to_string())
            .collect()
    }
}

impl std::fmt::Debug for Constraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraints")
            .field("keywords", &self.keywords)
            .finish_non_exhaustive()
    }
}

/// A named, fully resolved schema.
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub name: String,
    pub root: SchemaNode,
}
