//! Pre-resolved schemas of a run

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::json;

use super::document::SchemaDocument;
use super::node::SchemaDefinition;
use super::{SchemaError, nullable_fields};

/// Name of the schema every error response is checked against.
pub const ERROR_OBJECT: &str = "ErrorObject";

/// A definition together with its nullable-field set.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub definition: SchemaDefinition,
    pub nullable_fields: BTreeSet<String>,
}

impl ResolvedSchema {
    #[must_use]
    pub fn new(definition: SchemaDefinition) -> Self {
        let nullable_fields = nullable_fields(&definition);
        Self {
            definition,
            nullable_fields,
        }
    }
}

/// Name → resolved schema. Built once, then only read.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<String, Arc<ResolvedSchema>>,
}

impl SchemaCatalog {
    /// Resolve every name in `names`, plus [`ERROR_OBJECT`].
    ///
    /// `ErrorObject` comes from the document when declared there, otherwise
    /// a built-in definition is used.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error.
    pub fn build<I, S>(doc: &SchemaDocument, names: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self::default();
        for name in names {
            let name = name.as_ref();
            if catalog.schemas.contains_key(name) {
                continue;
            }
            let resolved = ResolvedSchema::new(doc.resolve(name)?);
            tracing::debug!(
                schema = name,
                nullable = resolved.nullable_fields.len(),
                "resolved schema"
            );
            catalog.insert(resolved);
        }
        if catalog.get(ERROR_OBJECT).is_none() {
            let definition = if doc.contains(ERROR_OBJECT) {
                doc.resolve(ERROR_OBJECT)?
            } else {
                builtin_error_object()?
            };
            catalog.insert(ResolvedSchema::new(definition));
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, schema: ResolvedSchema) {
        self.schemas
            .insert(schema.definition.name.clone(), Arc::new(schema));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ResolvedSchema>> {
        self.schemas.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Error body used when the document declares no `ErrorObject`.
fn builtin_error_object() -> Result<SchemaDefinition, SchemaError> {
    let doc = SchemaDocument::from_value(json!({
        "openapi": "3.0.0",
        "components": {
            "schemas": {
                ERROR_OBJECT: {
                    "type": "object",
                    "properties": {
                        "status": {"type": "integer"},
                        "code": {"type": "integer"},
                        "developerMessage": {"type": "string"},
                        "userMessage": {"type": "string"},
                        "details": {"type": "string"}
                    },
                    "required": ["status", "developerMessage"]
                }
            }
        }
    }))?;
    doc.resolve(ERROR_OBJECT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeKind;

    fn doc(defs: serde_json::Value) -> SchemaDocument {
        SchemaDocument::from_value(json!({"swagger": "2.0", "definitions": defs})).unwrap()
    }

    #[test]
    fn build_adds_builtin_error_object() {
        let catalog = SchemaCatalog::build(&doc(json!({"A": {"type": "string"}})), ["A"]).unwrap();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["A", ERROR_OBJECT]);
        let err = catalog.get(ERROR_OBJECT).unwrap();
        let NodeKind::Object { required, .. } = &err.definition.root.kind else {
            panic!("expected object");
        };
        assert!(required.contains("developerMessage"));
        assert!(required.contains("status"));
    }

    #[test]
    fn document_error_object_preferred() {
        let d = doc(json!({
            "ErrorObject": {"type": "object", "properties": {"errors": {"type": "array"}}}
        }));
        let catalog = SchemaCatalog::build(&d, Vec::<String>::new()).unwrap();
        let err = catalog.get(ERROR_OBJECT).unwrap();
        assert!(err.definition.root.property("errors").is_some());
        assert!(err.definition.root.property("developerMessage").is_none());
    }

    #[test]
    fn build_fails_on_missing_name() {
        let err = SchemaCatalog::build(&doc(json!({})), ["PersonResource"]).unwrap_err();
        assert_eq!(err, SchemaError::NotFound("PersonResource".into()));
    }

    #[test]
    fn entries_are_shared() {
        let catalog = SchemaCatalog::build(&doc(json!({"A": {"type": "string"}})), ["A", "A"]).unwrap();
        let first = catalog.get("A").unwrap();
        let second = catalog.get("A").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(catalog.len(), 2);
    }
}
