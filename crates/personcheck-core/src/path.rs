//! Field paths into JSON documents
//!
//! A path is a sequence of object keys and array indices, rendered as
//! `data.attributes.jobs[0].endDate`. The *pattern* form drops indices
//! (`data.attributes.jobs[].endDate`) and is what nullable-field sets hold.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One step into a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a response body. The root path is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Extended copy with an object key appended.
    #[must_use]
    pub fn key(&self, name: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.push_key(name);
        next
    }

    /// Extended copy with an array index appended.
    #[must_use]
    pub fn index(&self, idx: usize) -> Self {
        let mut next = self.clone();
        next.push_index(idx);
        next
    }

    pub fn push_key(&mut self, name: impl Into<String>) {
        self.0.push(PathSegment::Key(name.into()));
    }

    pub fn push_index(&mut self, idx: usize) {
        self.0.push(PathSegment::Index(idx));
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    /// Index-free form used for nullable-field lookups.
    #[must_use]
    pub fn pattern(&self) -> String {
        render(&self.0, true)
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&render(&self.0, false))
    }
}

fn render(segments: &[PathSegment], as_pattern: bool) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            PathSegment::Index(_) if as_pattern => out.push_str("[]"),
            PathSegment::Index(idx) => {
                out.push('[');
                out.push_str(&idx.to_string());
                out.push(']');
            }
        }
    }
    out
}
