//! `$ref` resolution: depth-first, in place, with cycle detection

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::SchemaError;
use super::node::{Constraints, NodeKind, ScalarType, SchemaNode};

/// Keywords compiled into [`Constraints`] for scalar nodes.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "enum",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "pattern",
    "multipleOf",
];

pub(super) struct Resolver<'a> {
    definitions: &'a Map<String, Value>,
    prefix: &'static str,
    nullable_keywords: &'static [&'static str],
    /// Names currently being resolved, outermost first
    stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub(super) fn new(
        definitions: &'a Map<String, Value>,
        prefix: &'static str,
        nullable_keywords: &'static [&'static str],
    ) -> Self {
        Self {
            definitions,
            prefix,
            nullable_keywords,
            stack: Vec::new(),
        }
    }

    pub(super) fn resolve_named(
        &mut self,
        name: &str,
        location: &str,
    ) -> Result<SchemaNode, SchemaError> {
        if let Some(pos) = self.stack.iter().position(|n| n == name) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(name.to_string());
            return Err(SchemaError::Cycle { chain });
        }
        let definitions = self.definitions;
        let Some(raw) = definitions.get(name) else {
            return Err(SchemaError::DanglingReference {
                reference: format!("{}{name}", self.prefix),
                location: location.to_string(),
            });
        };

        self.stack.push(name.to_string());
        let node = self.resolve_node(raw, name);
        self.stack.pop();
        node
    }

    fn resolve_node(&mut self, raw: &Value, location: &str) -> Result<SchemaNode, SchemaError> {
        // Boolean schemas and other non-objects accept anything
        let Some(obj) = raw.as_object() else {
            return Ok(SchemaNode::scalar(ScalarType::Any));
        };
        let own_nullable = self.is_nullable(obj);

        if let Some(reference) = obj.get("$ref") {
            let node = self.follow_reference(reference, location)?;
            let nullable = node.nullable || own_nullable;
            return Ok(node.with_nullable(nullable));
        }

        if let Some(members) = obj.get("allOf").and_then(Value::as_array) {
            let node = self.merge_all_of(members, obj, location)?;
            let nullable = node.nullable || own_nullable;
            return Ok(node.with_nullable(nullable));
        }

        let (type_name, type_nullable) = declared_type(obj);
        let mut format = obj.get("format").and_then(Value::as_str).map(str::to_string);

        let mut node = match type_name {
            Some("object") => self.resolve_object(obj, location)?,
            Some("array") => self.resolve_array(obj, location)?,
            Some("null") => SchemaNode::scalar(ScalarType::Any),
            Some(other) => {
                let ty = ScalarType::from_type_name(other).ok_or_else(|| {
                    SchemaError::Unsupported {
                        location: location.to_string(),
                        reason: format!("unknown type `{other}`"),
                    }
                })?;
                if other == "file" && format.is_none() {
                    format = Some("binary".to_string());
                }
                let mut scalar = SchemaNode::scalar(ty);
                scalar.constraints = scalar_constraints(obj, location)?;
                scalar
            }
            None if obj.contains_key("properties") => self.resolve_object(obj, location)?,
            None if obj.contains_key("items") => self.resolve_array(obj, location)?,
            None => {
                let mut any = SchemaNode::scalar(ScalarType::Any);
                any.constraints = scalar_constraints(obj, location)?;
                any
            }
        };

        node.nullable = own_nullable || type_nullable || type_name == Some("null");
        node.format = format;
        Ok(node)
    }

    fn follow_reference(
        &mut self,
        reference: &Value,
        location: &str,
    ) -> Result<SchemaNode, SchemaError> {
        let reference = reference
            .as_str()
            .ok_or_else(|| SchemaError::Unsupported {
                location: location.to_string(),
                reason: "`$ref` is not a string".to_string(),
            })?;
        let dangling = || SchemaError::DanglingReference {
            reference: reference.to_string(),
            location: location.to_string(),
        };
        let target = reference.strip_prefix(self.prefix).ok_or_else(dangling)?;
        if !self.definitions.contains_key(target) {
            return Err(dangling());
        }
        self.resolve_named(target, location)
    }

    fn resolve_object(
        &mut self,
        obj: &Map<String, Value>,
        location: &str,
    ) -> Result<SchemaNode, SchemaError> {
        let mut properties = BTreeMap::new();
        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (name, raw) in props {
                let child = self.resolve_node(raw, &format!("{location}.{name}"))?;
                properties.insert(name.clone(), child);
            }
        }
        let required: BTreeSet<String> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(SchemaNode::object(properties, required))
    }

    fn resolve_array(
        &mut self,
        obj: &Map<String, Value>,
        location: &str,
    ) -> Result<SchemaNode, SchemaError> {
        let items = match obj.get("items") {
            Some(raw) => self.resolve_node(raw, &format!("{location}[]"))?,
            None => SchemaNode::scalar(ScalarType::Any),
        };
        Ok(SchemaNode::array(items))
    }

    /// Merge `allOf` members (and any sibling `properties`) into one object.
    fn merge_all_of(
        &mut self,
        members: &[Value],
        obj: &Map<String, Value>,
        location: &str,
    ) -> Result<SchemaNode, SchemaError> {
        let mut nodes = Vec::with_capacity(members.len() + 1);
        for (idx, member) in members.iter().enumerate() {
            nodes.push(self.resolve_node(member, &format!("{location}.allOf[{idx}]"))?);
        }
        if obj.contains_key("properties") || obj.contains_key("required") {
            nodes.push(self.resolve_object(obj, location)?);
        }
        if nodes.len() == 1 {
            if let Some(only) = nodes.pop() {
                return Ok(only);
            }
        }

        let mut properties = BTreeMap::new();
        let mut required = BTreeSet::new();
        let mut nullable = false;
        for node in nodes {
            nullable |= node.nullable;
            match node.kind {
                NodeKind::Object {
                    properties: p,
                    required: r,
                } => {
                    properties.extend(p);
                    required.extend(r);
                }
                NodeKind::Scalar(ScalarType::Any) => {}
                _ => {
                    return Err(SchemaError::Unsupported {
                        location: location.to_string(),
                        reason: "allOf mixes object and non-object members".to_string(),
                    });
                }
            }
        }
        Ok(SchemaNode::object(properties, required).with_nullable(nullable))
    }

    fn is_nullable(&self, obj: &Map<String, Value>) -> bool {
        self.nullable_keywords
            .iter()
            .any(|key| obj.get(*key).and_then(Value::as_bool) == Some(true))
    }
}

/// The declared `type`, plus whether a type list admits `null`.
fn declared_type(obj: &Map<String, Value>) -> (Option<&str>, bool) {
    match obj.get("type") {
        Some(Value::String(name)) => (Some(name.as_str()), false),
        Some(Value::Array(names)) => {
            let names: Vec<&str> = names.iter().filter_map(Value::as_str).collect();
            let has_null = names.contains(&"null");
            let first = names.iter().copied().find(|n| *n != "null");
            (first.or(has_null.then_some("null")), has_null)
        }
        _ => (None, false),
    }
}

/// Collect and compile the scalar keyword constraints of a schema object.
///
/// Draft-4 style boolean `exclusiveMinimum`/`exclusiveMaximum` flags are
/// rewritten to the numeric form before compiling.
fn scalar_constraints(
    obj: &Map<String, Value>,
    location: &str,
) -> Result<Option<Constraints>, SchemaError> {
    let mut keywords = Map::new();
    for key in CONSTRAINT_KEYWORDS {
        if let Some(value) = obj.get(*key) {
            keywords.insert((*key).to_string(), value.clone());
        }
    }
    for (flag, bound) in [("exclusiveMinimum", "minimum"), ("exclusiveMaximum", "maximum")] {
        if let Some(Value::Bool(exclusive)) = keywords.get(flag).cloned() {
            keywords.remove(flag);
            if exclusive {
                if let Some(limit) = keywords.remove(bound) {
                    keywords.insert(flag.to_string(), limit);
                }
            }
        }
    }
    if keywords.is_empty() {
        return Ok(None);
    }
    Constraints::compile(Value::Object(keywords))
        .map(Some)
        .map_err(|message| SchemaError::InvalidConstraint {
            location: location.to_string(),
            message,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(defs: Value, name: &str) -> Result<SchemaNode, SchemaError> {
        let defs = defs.as_object().unwrap().clone();
        let mut r = Resolver::new(&defs, "#/components/schemas/", &["nullable", "x-nullable"]);
        r.resolve_named(name, name)
    }

    #[test]
    fn nested_reference_resolved_in_place() {
        let node = resolve(
            json!({
                "Outer": {"type": "object", "properties": {"inner": {"$ref": "#/components/schemas/Inner"}}},
                "Inner": {"type": "object", "properties": {"v": {"type": "integer"}}, "required": ["v"]}
            }),
            "Outer",
        )
        .unwrap();
        let inner = node.property("inner").unwrap();
        assert!(matches!(inner.kind, NodeKind::Object { ref required, .. } if required.contains("v")));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let err = resolve(
            json!({"Node": {"type": "object", "properties": {"next": {"$ref": "#/components/schemas/Node"}}}}),
            "Node",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::Cycle {
                chain: vec!["Node".into(), "Node".into()]
            }
        );
    }

    #[test]
    fn indirect_cycle_reports_chain() {
        let err = resolve(
            json!({
                "A": {"$ref": "#/components/schemas/B"},
                "B": {"type": "array", "items": {"$ref": "#/components/schemas/C"}},
                "C": {"allOf": [{"$ref": "#/components/schemas/A"}]}
            }),
            "A",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::Cycle {
                chain: vec!["A".into(), "B".into(), "C".into(), "A".into()]
            }
        );
    }

    #[test]
    fn shared_reference_is_not_a_cycle() {
        let node = resolve(
            json!({
                "Pair": {"type": "object", "properties": {
                    "left": {"$ref": "#/components/schemas/Leaf"},
                    "right": {"$ref": "#/components/schemas/Leaf"}
                }},
                "Leaf": {"type": "string"}
            }),
            "Pair",
        );
        assert!(node.is_ok());
    }

    #[test]
    fn dangling_reference_rejected() {
        let err = resolve(
            json!({"A": {"type": "object", "properties": {"b": {"$ref": "#/components/schemas/Missing"}}}}),
            "A",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DanglingReference { ref reference, ref location }
            if reference == "#/components/schemas/Missing" && location == "A.b"));
    }

    #[test]
    fn swagger_definitions_cycle_and_dangling_reference() {
        let doc = crate::schema::SchemaDocument::from_value(json!({
            "swagger": "2.0",
            "definitions": {
                "Person": {"type": "object", "properties": {
                    "manager": {"$ref": "#/definitions/Manager"}
                }},
                "Manager": {"type": "object", "properties": {
                    "reports": {"type": "array", "items": {"$ref": "#/definitions/Person"}}
                }},
                "Job": {"type": "object", "properties": {
                    "position": {"$ref": "#/definitions/Position"}
                }}
            }
        }))
        .unwrap();

        assert_eq!(
            doc.resolve("Person").unwrap_err(),
            SchemaError::Cycle {
                chain: vec!["Person".into(), "Manager".into(), "Person".into()]
            }
        );
        assert!(matches!(doc.resolve("Job").unwrap_err(),
            SchemaError::DanglingReference { ref reference, ref location }
            if reference == "#/definitions/Position" && location == "Job.position"));
    }

    #[test]
    fn foreign_dialect_reference_is_dangling() {
        let err = resolve(
            json!({"A": {"$ref": "#/definitions/B"}, "B": {"type": "string"}}),
            "A",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DanglingReference { .. }));
    }

    #[test]
    fn all_of_merges_properties_and_required() {
        let node = resolve(
            json!({
                "Job": {"allOf": [
                    {"type": "object", "properties": {"beginDate": {"type": "string", "format": "date"}}, "required": ["beginDate"]},
                    {"type": "object", "properties": {"endDate": {"type": "string", "format": "date", "nullable": true}}}
                ]}
            }),
            "Job",
        )
        .unwrap();
        let NodeKind::Object { properties, required } = &node.kind else {
            panic!("expected object");
        };
        assert_eq!(properties.len(), 2);
        assert!(required.contains("beginDate"));
        assert!(properties["endDate"].nullable);
    }

    #[test]
    fn reference_sibling_nullable_wins() {
        let node = resolve(
            json!({
                "A": {"type": "object", "properties": {"b": {"$ref": "#/components/schemas/B", "x-nullable": true}}},
                "B": {"type": "string"}
            }),
            "A",
        )
        .unwrap();
        assert!(node.property("b").unwrap().nullable);
    }

    #[test]
    fn type_list_with_null_is_nullable() {
        let node = resolve(json!({"A": {"type": ["string", "null"]}}), "A").unwrap();
        assert!(node.nullable);
        assert!(matches!(node.kind, NodeKind::Scalar(ScalarType::String)));
    }

    #[test]
    fn draft4_exclusive_bounds_normalized() {
        let node = resolve(
            json!({"W": {"type": "integer", "minimum": 0, "exclusiveMinimum": true, "maximum": 2000}}),
            "W",
        )
        .unwrap();
        let c = node.constraints.unwrap();
        assert!(!c.check(&json!(0)).is_empty());
        assert!(c.check(&json!(1)).is_empty());
        assert!(c.check(&json!(2000)).is_empty());
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let err = resolve(json!({"A": {"type": "tuple"}}), "A").unwrap_err();
        assert!(matches!(err, SchemaError::Unsupported { .. }));
    }

    #[test]
    fn invalid_pattern_rejected_at_resolve_time() {
        let err = resolve(json!({"A": {"type": "string", "pattern": "(["}}), "A").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidConstraint { ref location, .. } if location == "A"));
    }

    #[test]
    fn array_without_items_accepts_anything() {
        let node = resolve(json!({"A": {"type": "array"}}), "A").unwrap();
        let NodeKind::Array { items } = &node.kind else {
            panic!("expected array");
        };
        assert!(matches!(items.kind, NodeKind::Scalar(ScalarType::Any)));
    }
}
