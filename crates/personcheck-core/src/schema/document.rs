//! Schema document loading and dialect detection
//!
//! The dialect is decided once, from the top-level marker key:
//! `swagger` → Swagger 2.0 (`definitions`, `#/definitions/X`),
//! `openapi` → OpenAPI 3.x (`components.schemas`, `#/components/schemas/X`).
//! Callers only ever see [`SchemaDocument`].

use std::path::Path;

use serde_json::{Map, Value};

use super::SchemaError;
use super::node::SchemaDefinition;
use super::resolve::Resolver;

/// Which flavour of API description a document is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    Swagger2,
    OpenApi3,
}

impl DialectKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Swagger2 => "swagger 2.0",
            Self::OpenApi3 => "openapi 3",
        }
    }
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a dialect keeps its named schemas and how it spells references to them.
pub(super) trait Dialect: Send + Sync {
    fn kind(&self) -> DialectKind;

    fn definitions_root(&self) -> Option<&Map<String, Value>>;

    /// Prefix of a local reference, e.g. `#/definitions/`.
    fn reference_prefix(&self) -> &'static str;

    /// Keywords marking a schema as nullable.
    fn nullable_keywords(&self) -> &'static [&'static str];
}

struct Swagger2 {
    raw: Value,
}

impl Dialect for Swagger2 {
    fn kind(&self) -> DialectKind {
        DialectKind::Swagger2
    }

    fn definitions_root(&self) -> Option<&Map<String, Value>> {
        self.raw.get("definitions").and_then(Value::as_object)
    }

    fn reference_prefix(&self) -> &'static str {
        "#/definitions/"
    }

    fn nullable_keywords(&self) -> &'static [&'static str] {
        &["x-nullable"]
    }
}

struct OpenApi3 {
    raw: Value,
}

impl Dialect for OpenApi3 {
    fn kind(&self) -> DialectKind {
        DialectKind::OpenApi3
    }

    fn definitions_root(&self) -> Option<&Map<String, Value>> {
        self.raw
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(Value::as_object)
    }

    fn reference_prefix(&self) -> &'static str {
        "#/components/schemas/"
    }

    // Swagger-converted documents often keep `x-nullable` around
    fn nullable_keywords(&self) -> &'static [&'static str] {
        &["nullable", "x-nullable"]
    }
}

/// A parsed, read-only API description.
pub struct SchemaDocument {
    dialect: Box<dyn Dialect>,
}

impl SchemaDocument {
    /// Load a YAML or JSON document from disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if the dialect
    /// cannot be determined.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Io(path.to_path_buf(), e.to_string()))?;
        let raw = parse_document(path, &content)?;
        Self::from_value(raw)
    }

    /// Wrap an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownDialect`] if neither `swagger` nor
    /// `openapi` is a top-level key.
    pub fn from_value(raw: Value) -> Result<Self, SchemaError> {
        let dialect: Box<dyn Dialect> = if raw.get("swagger").is_some() {
            Box::new(Swagger2 { raw })
        } else if raw.get("openapi").is_some() {
            Box::new(OpenApi3 { raw })
        } else {
            return Err(SchemaError::UnknownDialect);
        };
        Ok(Self { dialect })
    }

    #[must_use]
    pub fn dialect(&self) -> DialectKind {
        self.dialect.kind()
    }

    /// Raw named schemas, or `None` if the document declares none.
    #[must_use]
    pub fn definitions_root(&self) -> Option<&Map<String, Value>> {
        self.dialect.definitions_root()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions_root()
            .is_some_and(|defs| defs.contains_key(name))
    }

    /// Names of all declared schemas, sorted.
    #[must_use]
    pub fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .definitions_root()
            .map(|defs| defs.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Resolve a named schema into a reference-free tree.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::NotFound`] if `name` is not declared
    /// - [`SchemaError::Cycle`] if its references loop
    /// - [`SchemaError::DanglingReference`] if it references a missing schema
    pub fn resolve(&self, name: &str) -> Result<SchemaDefinition, SchemaError> {
        let empty = Map::new();
        let definitions = self.definitions_root().unwrap_or(&empty);
        if !definitions.contains_key(name) {
            return Err(SchemaError::NotFound(name.to_string()));
        }
        let mut resolver = Resolver::new(
            definitions,
            self.dialect.reference_prefix(),
            self.dialect.nullable_keywords(),
        );
        let root = resolver.resolve_named(name, name)?;
        Ok(SchemaDefinition {
            name: name.to_string(),
            root,
        })
    }
}

impl std::fmt::Debug for SchemaDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaDocument")
            .field("dialect", &self.dialect())
            .field("schemas", &self.schema_names().len())
            .finish()
    }
}

/// Parse a document from JSON or YAML.
///
/// Extension first (`.yaml`/`.yml`/`.json`), then content sniffing:
/// a leading `{` means JSON, anything else YAML.
fn parse_document(path: &Path, content: &str) -> Result<Value, SchemaError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "json" => parse_json(content),
        _ if content.trim_start().starts_with('{') => parse_json(content),
        _ => parse_yaml(content),
    }
}

fn parse_json(content: &str) -> Result<Value, SchemaError> {
    serde_json::from_str(content).map_err(|e| SchemaError::Parse(format!("Invalid JSON: {e}")))
}

fn parse_yaml(content: &str) -> Result<Value, SchemaError> {
    serde_yml::from_str(content).map_err(|e| SchemaError::Parse(format!("Invalid YAML: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_swagger() {
        let doc = SchemaDocument::from_value(json!({
            "swagger": "2.0",
            "definitions": {"A": {"type": "string"}}
        }))
        .unwrap();
        assert_eq!(doc.dialect(), DialectKind::Swagger2);
        assert!(doc.contains("A"));
    }

    #[test]
    fn detects_openapi() {
        let doc = SchemaDocument::from_value(json!({
            "openapi": "3.0.0",
            "components": {"schemas": {"B": {"type": "integer"}}}
        }))
        .unwrap();
        assert_eq!(doc.dialect(), DialectKind::OpenApi3);
        assert_eq!(doc.schema_names(), vec!["B".to_string()]);
    }

    #[test]
    fn rejects_unknown_dialect() {
        let err = SchemaDocument::from_value(json!({"info": {}})).unwrap_err();
        assert_eq!(err, SchemaError::UnknownDialect);
    }

    #[test]
    fn document_without_schemas_resolves_nothing() {
        let doc = SchemaDocument::from_value(json!({"openapi": "3.0.0"})).unwrap();
        assert!(doc.definitions_root().is_none());
        assert_eq!(
            doc.resolve("PersonResource").unwrap_err(),
            SchemaError::NotFound("PersonResource".into())
        );
    }

    #[test]
    fn parse_json_by_extension() {
        let v = parse_document(Path::new("api.json"), r#"{"swagger": "2.0"}"#).unwrap();
        assert_eq!(v["swagger"], "2.0");
    }

    #[test]
    fn parse_yaml_by_extension() {
        let v = parse_document(Path::new("api.yml"), "openapi: '3.0.0'\n").unwrap();
        assert_eq!(v["openapi"], "3.0.0");
    }

    #[test]
    fn parse_sniffs_content() {
        let json = parse_document(Path::new("api"), r#"{"openapi": "3.0.0"}"#).unwrap();
        assert_eq!(json["openapi"], "3.0.0");
        let yaml = parse_document(Path::new("api.txt"), "swagger: '2.0'\n").unwrap();
        assert_eq!(yaml["swagger"], "2.0");
    }

    #[test]
    fn parse_errors_name_the_format() {
        let err = parse_document(Path::new("api.json"), "{ nope").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
        let err = parse_document(Path::new("api.yaml"), ":\n  :\n    - [nope").unwrap_err();
        assert!(err.to_string().contains("Invalid YAML"));
    }
}
