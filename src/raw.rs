//! The engine's result for one image, before any interpretation.
//!
//! Engine revisions disagree on what they return, so this is a closed set of
//! variants rather than a single struct. The JSON constructors describe how the
//! engine bridge encodes each variant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::NormalizeError;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawResult {
    /// Nothing detected, or an empty top-level sequence.
    #[default]
    Empty,
    /// `[[polygon, [text, score]], ...]`
    List(Vec<Value>),
    /// Result object of newer engine revisions.
    Object(RichObject),
    /// Any payload that is neither a sequence nor an object.
    Opaque(Value),
}

/// A rich result object together with the access styles it supports.
///
/// Each view is present only if the object offered that capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichObject {
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
    /// Key-style lookup: parallel sequences under recognized keys.
    #[serde(default)]
    pub keys: Option<Map<String, Value>>,
    /// Iteration: one entry per detection.
    #[serde(default)]
    pub items: Option<Vec<Value>>,
    /// Named attributes: parallel sequences, like `keys`.
    #[serde(default)]
    pub attrs: Option<Map<String, Value>>,
}

impl RichObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    pub fn with_keys(mut self, keys: Map<String, Value>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_items(mut self, items: Vec<Value>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn with_attrs(mut self, attrs: Map<String, Value>) -> Self {
        self.attrs = Some(attrs);
        self
    }
}

impl RawResult {
    /// Interprets the engine's per-page output. Only the first page is used.
    pub fn from_pages(pages: Value) -> Result<Self, NormalizeError> {
        match pages {
            Value::Null => Ok(RawResult::Empty),
            Value::Array(pages) => match pages.into_iter().next() {
                Some(first) => Self::from_payload(first),
                None => Ok(RawResult::Empty),
            },
            other => Self::from_payload(other),
        }
    }

    /// Interprets a single page payload.
    pub fn from_payload(payload: Value) -> Result<Self, NormalizeError> {
        Ok(match payload {
            Value::Null => RawResult::Empty,
            Value::Array(entries) if entries.is_empty() => RawResult::Empty,
            Value::Array(entries) => RawResult::List(entries),
            object @ Value::Object(_) => RawResult::Object(serde_json::from_value(object)?),
            other => RawResult::Opaque(other),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, NormalizeError> {
        let pages: Value = serde_json::from_str(json)?;
        Self::from_pages(pages)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawResult::Empty => true,
            RawResult::List(entries) => entries.is_empty(),
            RawResult::Object(_) | RawResult::Opaque(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn empty_pages_are_empty() {
        for pages in [json!(null), json!([]), json!([null]), json!([[]])] {
            assert_eq!(RawResult::from_pages(pages).unwrap(), RawResult::Empty);
        }
    }

    #[test]
    fn first_page_is_used() {
        let raw = RawResult::from_pages(json!([
            [[[[0, 0], [1, 1]], ["a", 0.9]]],
            [[[[0, 0], [1, 1]], ["b", 0.9]]]
        ]))
        .unwrap();
        let RawResult::List(entries) = raw else {
            panic!("expected a list payload");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0][1][0], json!("a"));
    }

    #[test]
    fn object_payload_reads_views() {
        let raw = RawResult::from_payload(json!({
            "type": "OCRResult",
            "keys": { "rec_texts": ["a"] },
            "items": []
        }))
        .unwrap();
        let RawResult::Object(object) = raw else {
            panic!("expected an object payload");
        };
        assert_eq!(object.type_name.as_deref(), Some("OCRResult"));
        assert!(object.keys.is_some());
        assert_eq!(object.items, Some(vec![]));
        assert_eq!(object.attrs, None);
    }

    #[test]
    fn scalar_payload_is_opaque() {
        assert_eq!(
            RawResult::from_payload(json!("nothing")).unwrap(),
            RawResult::Opaque(json!("nothing"))
        );
    }

    #[test]
    fn malformed_object_is_an_engine_failure() {
        let err = RawResult::from_payload(json!({ "type": 3 })).unwrap_err();
        assert!(matches!(err, NormalizeError::UnexpectedEngineFailure(_)));
    }
}
