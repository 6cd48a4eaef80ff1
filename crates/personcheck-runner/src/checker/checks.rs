//! Response checks
//!
//! No I/O. Takes a completed response and returns every failure in a fixed
//! order: status, body, content type, latency.

use std::collections::BTreeSet;

use personcheck_core::path::FieldPath;
use personcheck_core::rules::{self, Rule, Selector};
use personcheck_core::verdict::body_excerpt;
use personcheck_core::{ERROR_OBJECT, FailureKind, ResolvedSchema, Violation, validate};
use serde_json::Value;

/// Input for response checks. Pure data.
pub(super) struct CheckInput<'a> {
    pub(super) status: u16,
    pub(super) expected_status: u16,
    pub(super) body: &'a [u8],
    pub(super) content_type: Option<&'a str>,
    pub(super) elapsed: f64,
    pub(super) schema_name: &'a str,
    /// `None` when `schema_name` is not in the catalog
    pub(super) schema: Option<&'a ResolvedSchema>,
    pub(super) error_schema: Option<&'a ResolvedSchema>,
    pub(super) nullable_override: Option<&'a BTreeSet<String>>,
    pub(super) rules: &'a [Rule],
    pub(super) expected_message: Option<&'a str>,
    pub(super) expected_content_type: Option<&'a str>,
    pub(super) max_elapsed: Option<f64>,
}

pub(super) struct CheckOutcome {
    pub(super) failures: Vec<FailureKind>,
    /// Decoded body, when it was JSON
    pub(super) body: Option<Value>,
}

pub(super) fn run_checks(input: &CheckInput) -> CheckOutcome {
    let mut failures = Vec::new();

    // ── Check 1: status ──
    if input.status != input.expected_status {
        failures.push(FailureKind::UnexpectedStatus {
            expected: input.expected_status,
            actual: input.status,
            body: body_excerpt(input.body),
        });
        return CheckOutcome {
            failures,
            body: None,
        };
    }

    // ── Check 2: body ──
    let body = if (200..300).contains(&input.status) {
        check_success_body(input, &mut failures)
    } else {
        check_error_body(input, &mut failures)
    };

    // ── Check 3: content type ──
    if let Some(expected) = input.expected_content_type {
        if !media_type_matches(expected, input.content_type) {
            failures.push(FailureKind::ContentTypeMismatch {
                expected: expected.to_string(),
                actual: input.content_type.map(str::to_string),
            });
        }
    }

    // ── Check 4: latency (soft) ──
    if let Some(limit) = input.max_elapsed {
        if input.elapsed > limit {
            failures.push(FailureKind::LatencyExceeded {
                elapsed: input.elapsed,
                limit,
            });
        }
    }

    CheckOutcome { failures, body }
}

fn check_success_body(input: &CheckInput, failures: &mut Vec<FailureKind>) -> Option<Value> {
    let Some(schema) = input.schema else {
        failures.push(FailureKind::Schema {
            message: format!("schema {} was not resolved", input.schema_name),
        });
        return None;
    };

    if schema.definition.root.is_binary() {
        if input.body.is_empty() {
            failures.push(FailureKind::SchemaMismatch {
                schema: input.schema_name.to_string(),
                violations: vec![Violation::new(
                    FieldPath::root(),
                    "non-empty binary body",
                    "empty body",
                )],
            });
        }
        return None;
    }

    let value = decode(input.body, input.schema_name, failures)?;

    let nullable = input.nullable_override.unwrap_or(&schema.nullable_fields);
    let violations = validate(&value, &schema.definition, nullable);
    if !violations.is_empty() {
        failures.push(FailureKind::SchemaMismatch {
            schema: input.schema_name.to_string(),
            violations,
        });
    }

    let violations = rules::evaluate(input.rules, &value);
    if !violations.is_empty() {
        failures.push(FailureKind::InvariantViolated { violations });
    }

    Some(value)
}

fn check_error_body(input: &CheckInput, failures: &mut Vec<FailureKind>) -> Option<Value> {
    let Some(schema) = input.error_schema else {
        failures.push(FailureKind::Schema {
            message: format!("schema {ERROR_OBJECT} was not resolved"),
        });
        return None;
    };

    let value = decode(input.body, ERROR_OBJECT, failures)?;

    let violations = validate(&value, &schema.definition, &schema.nullable_fields);
    if !violations.is_empty() {
        failures.push(FailureKind::SchemaMismatch {
            schema: ERROR_OBJECT.to_string(),
            violations,
        });
    }

    if let Some(expected) = input.expected_message {
        if let Some(violation) = check_message(&value, expected) {
            failures.push(FailureKind::InvariantViolated {
                violations: vec![violation],
            });
        }
    }

    Some(value)
}

fn decode(body: &[u8], schema_name: &str, failures: &mut Vec<FailureKind>) -> Option<Value> {
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(e) => {
            failures.push(FailureKind::SchemaMismatch {
                schema: schema_name.to_string(),
                violations: vec![Violation::new(
                    FieldPath::root(),
                    "JSON document",
                    format!("invalid JSON ({e})"),
                )],
            });
            None
        }
    }
}

/// Developer messages of an error body: `developerMessage` (flat error
/// object) or every `errors[].detail` (JSON:API).
fn developer_messages(value: &Value) -> Vec<&str> {
    let mut messages: Vec<&str> = value
        .get("developerMessage")
        .and_then(Value::as_str)
        .into_iter()
        .collect();
    messages.extend(
        Selector::parse("/errors/*/detail")
            .select(value)
            .into_iter()
            .filter_map(|(_, v)| v.as_str()),
    );
    messages
}

fn check_message(value: &Value, expected: &str) -> Option<Violation> {
    let messages = developer_messages(value);
    if messages.iter().any(|m| m.contains(expected)) {
        return None;
    }
    let actual = if messages.is_empty() {
        "absent".to_string()
    } else {
        messages
            .iter()
            .map(|m| format!("{m:?}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    Some(Violation::new(
        FieldPath::root().key("developerMessage"),
        format!("message containing {expected:?}"),
        actual,
    ))
}

/// Compare media types, ignoring parameters and case.
fn media_type_matches(expected: &str, actual: Option<&str>) -> bool {
    let media = |s: &str| s.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    actual.is_some_and(|actual| media(actual) == media(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use personcheck_core::SchemaDocument;
    use serde_json::json;

    fn doc() -> SchemaDocument {
        SchemaDocument::from_value(json!({
            "openapi": "3.0.0",
            "components": {"schemas": {
                "PersonResource": {
                    "type": "object",
                    "properties": {"data": {
                        "type": "object",
                        "required": ["id", "type"],
                        "properties": {
                            "id": {"type": "string"},
                            "type": {"type": "string"},
                            "attributes": {
                                "type": "object",
                                "properties": {"birthDate": {"type": "string", "format": "date", "nullable": true}}
                            }
                        }
                    }}
                },
                "ImageResource": {"type": "string", "format": "binary"}
            }}
        }))
        .unwrap()
    }

    fn resolved(name: &str) -> ResolvedSchema {
        ResolvedSchema::new(doc().resolve(name).unwrap())
    }

    fn error_object() -> ResolvedSchema {
        let catalog = personcheck_core::SchemaCatalog::build(&doc(), ["PersonResource"]).unwrap();
        (*catalog.get(ERROR_OBJECT).unwrap()).clone()
    }

    fn input<'a>(
        status: u16,
        expected_status: u16,
        body: &'a [u8],
        schema: &'a ResolvedSchema,
        error_schema: &'a ResolvedSchema,
    ) -> CheckInput<'a> {
        CheckInput {
            status,
            expected_status,
            body,
            content_type: Some("application/json; charset=utf-8"),
            elapsed: 0.1,
            schema_name: &schema.definition.name,
            schema: Some(schema),
            error_schema: Some(error_schema),
            nullable_override: None,
            rules: &[],
            expected_message: None,
            expected_content_type: None,
            max_elapsed: None,
        }
    }

    #[test]
    fn conforming_response_passes() {
        let person = resolved("PersonResource");
        let error = error_object();
        let body = json!({"data": {"id": "1", "type": "person", "attributes": {"birthDate": null}}})
            .to_string();
        let outcome = run_checks(&input(200, 200, body.as_bytes(), &person, &error));
        assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
        assert_eq!(outcome.body.unwrap()["data"]["id"], "1");
    }

    #[test]
    fn status_mismatch_stops_further_checks() {
        let person = resolved("PersonResource");
        let error = error_object();
        let mut check = input(500, 200, b"not json at all", &person, &error);
        check.max_elapsed = Some(0.01);
        let outcome = run_checks(&check);
        assert_eq!(
            outcome.failures,
            vec![FailureKind::UnexpectedStatus {
                expected: 200,
                actual: 500,
                body: "not json at all".into(),
            }]
        );
    }

    #[test]
    fn non_json_success_body_is_a_root_mismatch() {
        let person = resolved("PersonResource");
        let error = error_object();
        let outcome = run_checks(&input(200, 200, b"<html>", &person, &error));
        let [FailureKind::SchemaMismatch { violations, .. }] = outcome.failures.as_slice() else {
            panic!("unexpected failures: {:?}", outcome.failures);
        };
        assert!(violations[0].path.is_root());
        assert_eq!(violations[0].expected, "JSON document");
    }

    #[test]
    fn nullable_override_replaces_catalog_set() {
        let person = resolved("PersonResource");
        let error = error_object();
        let body = json!({"data": {"id": null, "type": "person"}}).to_string();
        let override_set: BTreeSet<String> = ["data.id".to_string()].into();

        let strict = run_checks(&input(200, 200, body.as_bytes(), &person, &error));
        assert_eq!(strict.failures.len(), 1);

        let mut lenient = input(200, 200, body.as_bytes(), &person, &error);
        lenient.nullable_override = Some(&override_set);
        assert!(run_checks(&lenient).failures.is_empty());
    }

    #[test]
    fn rules_run_after_schema() {
        let person = resolved("PersonResource");
        let error = error_object();
        let body = json!({"data": {"id": "1", "type": "persons"}}).to_string();
        let rules = [Rule::equals("/data/type", "person")];
        let mut check = input(200, 200, body.as_bytes(), &person, &error);
        check.rules = &rules;
        let outcome = run_checks(&check);
        assert!(matches!(
            outcome.failures.as_slice(),
            [FailureKind::InvariantViolated { .. }]
        ));
    }

    #[test]
    fn binary_schema_requires_non_empty_body() {
        let image = resolved("ImageResource");
        let error = error_object();
        let mut check = input(200, 200, b"\xff\xd8\xff", &image, &error);
        check.content_type = Some("image/jpeg");
        check.expected_content_type = Some("image/jpeg");
        let outcome = run_checks(&check);
        assert!(outcome.failures.is_empty());
        assert!(outcome.body.is_none());

        let empty = run_checks(&input(200, 200, b"", &image, &error));
        assert!(matches!(
            empty.failures.as_slice(),
            [FailureKind::SchemaMismatch { .. }]
        ));
    }

    #[test]
    fn error_body_checked_against_error_object() {
        let person = resolved("PersonResource");
        let error = error_object();
        let body = json!({"status": 404, "developerMessage": "Not found"}).to_string();
        assert!(run_checks(&input(404, 404, body.as_bytes(), &person, &error)).failures.is_empty());

        let bad = json!({"status": "404"}).to_string();
        let outcome = run_checks(&input(404, 404, bad.as_bytes(), &person, &error));
        let [FailureKind::SchemaMismatch { schema, violations }] = outcome.failures.as_slice() else {
            panic!("unexpected failures: {:?}", outcome.failures);
        };
        assert_eq!(schema, ERROR_OBJECT);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn expected_message_searched_in_developer_message() {
        let person = resolved("PersonResource");
        let error = error_object();
        let body = json!({
            "status": 400,
            "developerMessage": "endDate: date must be after begin date"
        })
        .to_string();
        let mut check = input(400, 400, body.as_bytes(), &person, &error);
        check.expected_message = Some("date must be after begin date");
        assert!(run_checks(&check).failures.is_empty());

        check.expected_message = Some("unknown position");
        let outcome = run_checks(&check);
        let [FailureKind::InvariantViolated { violations }] = outcome.failures.as_slice() else {
            panic!("unexpected failures: {:?}", outcome.failures);
        };
        assert_eq!(
            violations[0].actual,
            "\"endDate: date must be after begin date\""
        );
    }

    #[test]
    fn expected_message_found_in_json_api_errors() {
        let value = json!({"errors": [
            {"status": "400", "detail": "beginDate is required"},
            {"status": "400", "detail": "date must be after begin date"}
        ]});
        assert!(check_message(&value, "must be after").is_none());
        assert_eq!(check_message(&json!({}), "x").unwrap().actual, "absent");
    }

    #[test]
    fn content_type_parameters_ignored() {
        assert!(media_type_matches("application/json", Some("application/json; charset=utf-8")));
        assert!(media_type_matches("image/jpeg", Some("Image/JPEG")));
        assert!(!media_type_matches("image/jpeg", Some("application/json")));
        assert!(!media_type_matches("image/jpeg", None));
    }

    #[test]
    fn content_type_mismatch_reported() {
        let person = resolved("PersonResource");
        let error = error_object();
        let body = json!({"data": {"id": "1", "type": "person"}}).to_string();
        let mut check = input(200, 200, body.as_bytes(), &person, &error);
        check.expected_content_type = Some("image/jpeg");
        assert_eq!(
            run_checks(&check).failures,
            vec![FailureKind::ContentTypeMismatch {
                expected: "image/jpeg".into(),
                actual: Some("application/json; charset=utf-8".into()),
            }]
        );
    }

    #[test]
    fn latency_is_checked_last() {
        let person = resolved("PersonResource");
        let error = error_object();
        let body = json!({"data": {"id": 1, "type": "person"}}).to_string();
        let mut check = input(200, 200, body.as_bytes(), &person, &error);
        check.elapsed = 2.5;
        check.max_elapsed = Some(1.0);
        let outcome = run_checks(&check);
        assert_eq!(outcome.failures.len(), 2);
        assert!(matches!(outcome.failures[0], FailureKind::SchemaMismatch { .. }));
        assert_eq!(
            outcome.failures[1],
            FailureKind::LatencyExceeded {
                elapsed: 2.5,
                limit: 1.0
            }
        );
    }
}
