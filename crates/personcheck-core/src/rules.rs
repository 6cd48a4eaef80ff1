//! Cross-field invariants on response bodies
//!
//! Rules address values with pointer-like selectors where `*` matches every
//! member of an object or element of an array:
//!
//! ```text
//! /data/*/attributes/beginDate
//! /data/attributes/phones/*/phoneNumber
//! ```

use regex::Regex;
use serde_json::Value;

use crate::formats;
use crate::path::FieldPath;
use crate::validate::{Violation, describe};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Wildcard,
    Key(String),
}

/// Pointer with `*` wildcards. `""` or `"/"` selects the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    raw: String,
    steps: Vec<Step>,
}

impl Selector {
    #[must_use]
    pub fn parse(pointer: &str) -> Self {
        let steps = pointer
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Step::Wildcard,
                key => Step::Key(key.replace("~1", "/").replace("~0", "~")),
            })
            .collect();
        Self {
            raw: pointer.to_string(),
            steps,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Every value the selector reaches, with its path.
    #[must_use]
    pub fn select<'v>(&self, value: &'v Value) -> Vec<(FieldPath, &'v Value)> {
        let mut out = Vec::new();
        select_into(&self.steps, value, FieldPath::root(), &mut out);
        out
    }

    /// Path of the literal prefix, for reporting selections that reached nothing.
    fn literal_path(&self) -> FieldPath {
        let mut path = FieldPath::root();
        for step in &self.steps {
            match step {
                Step::Key(key) => path.push_key(key.as_str()),
                Step::Wildcard => break,
            }
        }
        path
    }
}

fn select_into<'v>(
    steps: &[Step],
    value: &'v Value,
    path: FieldPath,
    out: &mut Vec<(FieldPath, &'v Value)>,
) {
    let Some((step, rest)) = steps.split_first() else {
        out.push((path, value));
        return;
    };
    match (step, value) {
        (Step::Wildcard, Value::Object(map)) => {
            for (key, child) in map {
                select_into(rest, child, path.key(key.as_str()), out);
            }
        }
        (Step::Wildcard, Value::Array(items)) => {
            for (idx, child) in items.iter().enumerate() {
                select_into(rest, child, path.index(idx), out);
            }
        }
        (Step::Key(key), Value::Object(map)) => {
            if let Some(child) = map.get(key) {
                select_into(rest, child, path.key(key.as_str()), out);
            }
        }
        (Step::Key(key), Value::Array(items)) => {
            if let Some((idx, child)) = key
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx).map(|c| (idx, c)))
            {
                select_into(rest, child, path.index(idx), out);
            }
        }
        _ => {}
    }
}

/// A declarative business invariant.
#[derive(Debug, Clone)]
pub enum Rule {
    /// For every selected object holding both dates, `begin <= end`.
    DateOrder {
        collection: Selector,
        begin: String,
        end: String,
    },
    /// Every selected number lies in `[min, max]`.
    NumericRange { selector: Selector, min: f64, max: f64 },
    /// Every selected value equals `expected`; selecting nothing fails.
    Equals { selector: Selector, expected: Value },
    /// Every selected non-null string matches `pattern`.
    Matches {
        selector: Selector,
        pattern: Regex,
        label: String,
    },
    /// At least one selected string fails `pattern`. Pins fixtures with
    /// known-bad data, so a cleanup upstream shows up as a failure.
    Mismatches {
        selector: Selector,
        pattern: Regex,
        label: String,
    },
    MaxItems { selector: Selector, max: usize },
    MinItems { selector: Selector, min: usize },
}

impl Rule {
    #[must_use]
    pub fn date_order(collection: &str, begin: &str, end: &str) -> Self {
        Self::DateOrder {
            collection: Selector::parse(collection),
            begin: begin.to_string(),
            end: end.to_string(),
        }
    }

    #[must_use]
    pub fn numeric_range(selector: &str, min: f64, max: f64) -> Self {
        Self::NumericRange {
            selector: Selector::parse(selector),
            min,
            max,
        }
    }

    #[must_use]
    pub fn equals(selector: &str, expected: impl Into<Value>) -> Self {
        Self::Equals {
            selector: Selector::parse(selector),
            expected: expected.into(),
        }
    }

    /// # Errors
    ///
    /// Returns error if `pattern` is not a valid regex.
    pub fn matches(selector: &str, pattern: &str, label: &str) -> Result<Self, regex::Error> {
        Ok(Self::Matches {
            selector: Selector::parse(selector),
            pattern: Regex::new(pattern)?,
            label: label.to_string(),
        })
    }

    /// Phone numbers in E.164 form.
    #[must_use]
    pub fn e164(selector: &str) -> Self {
        Self::Matches {
            selector: Selector::parse(selector),
            pattern: formats::e164_regex(),
            label: "E.164 phone number".to_string(),
        }
    }

    /// At least one selected value is not an E.164 phone number.
    #[must_use]
    pub fn not_e164(selector: &str) -> Self {
        Self::Mismatches {
            selector: Selector::parse(selector),
            pattern: formats::e164_regex(),
            label: "E.164 phone number".to_string(),
        }
    }

    #[must_use]
    pub fn max_items(selector: &str, max: usize) -> Self {
        Self::MaxItems {
            selector: Selector::parse(selector),
            max,
        }
    }

    #[must_use]
    pub fn min_items(selector: &str, min: usize) -> Self {
        Self::MinItems {
            selector: Selector::parse(selector),
            min,
        }
    }

    fn evaluate_into(&self, body: &Value, out: &mut Vec<Violation>) {
        match self {
            Self::DateOrder {
                collection,
                begin,
                end,
            } => {
                for (path, item) in collection.select(body) {
                    let begin_date = item.get(begin).and_then(Value::as_str).and_then(formats::date_prefix);
                    let end_date = item.get(end).and_then(Value::as_str).and_then(formats::date_prefix);
                    if let (Some(b), Some(e)) = (begin_date, end_date) {
                        if b > e {
                            out.push(Violation::new(
                                path.key(end.as_str()),
                                format!("date on or after {begin} {b}"),
                                e,
                            ));
                        }
                    }
                }
            }
            Self::NumericRange { selector, min, max } => {
                for (path, value) in selector.select(body) {
                    if value.is_null() {
                        continue;
                    }
                    match value.as_f64() {
                        Some(n) if n >= *min && n <= *max => {}
                        _ => out.push(Violation::new(
                            path,
                            format!("number in [{min}, {max}]"),
                            describe(value),
                        )),
                    }
                }
            }
            Self::Equals { selector, expected } => {
                let selected = selector.select(body);
                if selected.is_empty() {
                    out.push(Violation::new(
                        selector.literal_path(),
                        expected.to_string(),
                        "absent",
                    ));
                }
                for (path, value) in selected {
                    if value != expected {
                        out.push(Violation::new(path, expected.to_string(), describe(value)));
                    }
                }
            }
            Self::Matches {
                selector,
                pattern,
                label,
            } => {
                for (path, value) in selector.select(body) {
                    match value {
                        Value::Null => {}
                        Value::String(s) if pattern.is_match(s) => {}
                        other => out.push(Violation::new(path, label.as_str(), describe(other))),
                    }
                }
            }
            Self::Mismatches {
                selector,
                pattern,
                label,
            } => {
                let selected = selector.select(body);
                let mismatch = selected
                    .iter()
                    .any(|(_, value)| value.as_str().is_some_and(|s| !pattern.is_match(s)));
                if !mismatch {
                    let actual = if selected.is_empty() {
                        "absent".to_string()
                    } else {
                        format!("{} matching values", selected.len())
                    };
                    out.push(Violation::new(
                        selector.literal_path(),
                        format!("at least one value that is not a valid {label}"),
                        actual,
                    ));
                }
            }
            Self::MaxItems { selector, max } => {
                for (path, value) in selector.select(body) {
                    match value.as_array() {
                        Some(items) if items.len() <= *max => {}
                        _ => out.push(Violation::new(
                            path,
                            format!("array of at most {max}"),
                            describe(value),
                        )),
                    }
                }
            }
            Self::MinItems { selector, min } => {
                let selected = selector.select(body);
                if selected.is_empty() && *min > 0 {
                    out.push(Violation::new(
                        selector.literal_path(),
                        format!("array of at least {min}"),
                        "absent",
                    ));
                }
                for (path, value) in selected {
                    match value.as_array() {
                        Some(items) if items.len() >= *min => {}
                        _ => out.push(Violation::new(
                            path,
                            format!("array of at least {min}"),
                            describe(value),
                        )),
                    }
                }
            }
        }
    }
}

/// Evaluate every rule against `body`, in order.
#[must_use]
pub fn evaluate(rules: &[Rule], body: &Value) -> Vec<Violation> {
    let mut out = Vec::new();
    for rule in rules {
        rule.evaluate_into(body, &mut out);
    }
    out
}
