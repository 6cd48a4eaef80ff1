//! Structural validation of a JSON body against a resolved schema

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::formats;
use crate::path::FieldPath;
use crate::schema::{NodeKind, ScalarType, SchemaDefinition, SchemaNode};

/// One mismatch between a response and its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    /// Where in the body; empty for the root
    pub path: FieldPath,
    pub expected: String,
    pub actual: String,
}

impl Violation {
    #[must_use]
    pub fn new(path: FieldPath, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            path,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_root() {
            "(root)".to_string()
        } else {
            self.path.to_string()
        };
        write!(f, "{path}: expected {}, got {}", self.expected, self.actual)
    }
}

/// Compare `value` against `definition`, reporting every violation.
///
/// `null` is accepted where the node is nullable or its pattern path is in
/// `nullable_fields`. Keys the schema does not declare are ignored.
#[must_use]
pub fn validate(
    value: &Value,
    definition: &SchemaDefinition,
    nullable_fields: &BTreeSet<String>,
) -> Vec<Violation> {
    let mut walker = Walker {
        nullable_fields,
        violations: Vec::new(),
    };
    let mut path = FieldPath::root();
    walker.visit(value, &definition.root, &mut path);
    walker.violations
}

struct Walker<'a> {
    nullable_fields: &'a BTreeSet<String>,
    violations: Vec<Violation>,
}

impl Walker<'_> {
    fn null_permitted(&self, node: Option<&SchemaNode>, path: &FieldPath) -> bool {
        node.is_some_and(|n| n.nullable) || self.nullable_fields.contains(&path.pattern())
    }

    fn report(&mut self, path: &FieldPath, expected: impl Into<String>, actual: impl Into<String>) {
        self.violations
            .push(Violation::new(path.clone(), expected, actual));
    }

    fn visit(&mut self, value: &Value, node: &SchemaNode, path: &mut FieldPath) {
        if value.is_null() {
            if !self.null_permitted(Some(node), path) {
                self.report(path, "non-null", "null");
            }
            return;
        }

        match &node.kind {
            NodeKind::Object {
                properties,
                required,
            } => {
                let Some(map) = value.as_object() else {
                    self.report(path, "object", describe(value));
                    return;
                };
                for name in required {
                    if map.contains_key(name) {
                        continue;
                    }
                    let child = path.key(name.as_str());
                    if !self.null_permitted(properties.get(name), &child) {
                        self.report(&child, "required property", "absent");
                    }
                }
                for (name, child_node) in properties {
                    if let Some(child_value) = map.get(name) {
                        path.push_key(name.as_str());
                        self.visit(child_value, child_node, path);
                        path.pop();
                    }
                }
            }
            NodeKind::Array { items } => {
                let Some(elements) = value.as_array() else {
                    self.report(path, "array", describe(value));
                    return;
                };
                for (idx, element) in elements.iter().enumerate() {
                    path.push_index(idx);
                    self.visit(element, items, path);
                    path.pop();
                }
            }
            NodeKind::Scalar(ty) => self.visit_scalar(value, *ty, node, path),
        }
    }

    fn visit_scalar(&mut self, value: &Value, ty: ScalarType, node: &SchemaNode, path: &FieldPath) {
        if !ty.accepts(value) {
            self.report(path, node.describe(), describe(value));
            return;
        }
        if let (Some(format @ ("date" | "date-time")), Some(text)) =
            (node.format.as_deref(), value.as_str())
        {
            if !formats::is_iso_date(text) {
                self.report(path, format!("string ({format})"), describe(value));
            }
        }
        if let Some(constraints) = &node.constraints {
            for message in constraints.check(value) {
                self.report(path, format!("value satisfying {}", constraints.keywords()), message);
            }
        }
    }
}

/// Short human description of a JSON value for the `actual` side of a violation.
#[must_use]
pub fn describe(value: &Value) -> String {
    const MAX_TEXT: usize = 40;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) if n.is_f64() => format!("number {n}"),
        Value::Number(n) => format!("integer {n}"),
        Value::String(s) if s.chars().count() > MAX_TEXT => {
            let head: String = s.chars().take(MAX_TEXT).collect();
            format!("string \"{head}...\"")
        }
        Value::String(s) => format!("string \"{s}\""),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}
