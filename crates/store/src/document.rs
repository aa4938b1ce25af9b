use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored document: named fields mapping to JSON values.
///
/// Serializes transparently as a JSON object. Fields are kept in a
/// `BTreeMap` so serialized documents are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Document containing a single field (the shape of a one-field merge)
    pub fn single(field: impl Into<String>, value: Value) -> Self {
        let mut doc = Self::new();
        doc.0.insert(field.into(), value);
        doc
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Merge semantics: fields in `patch` overwrite, all other fields are kept
    pub fn apply(&mut self, patch: &Self) {
        for (field, value) in &patch.0 {
            self.0.insert(field.clone(), value.clone());
        }
    }

    /// Iterate fields in stable (sorted) order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for Document {
    type Error = serde_json::Error;

    /// Succeeds only for JSON objects
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Identifies one document: a collection name plus a document id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Change notification carrying the full post-change snapshot
#[derive(Debug, Clone)]
pub struct DocumentEvent {
    pub path: DocumentPath,
    pub document: Document,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_keeps_unrelated_fields() {
        let mut doc = Document::single("red", json!(10));
        doc.set("blue", json!(20));

        doc.apply(&Document::single("red", json!(99)));

        assert_eq!(doc.get("red"), Some(&json!(99)));
        assert_eq!(doc.get("blue"), Some(&json!(20)));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn serializes_as_bare_object() {
        let mut doc = Document::new();
        doc.set("red", json!(1));
        doc.set("distance", json!(2.5));
        let text = serde_json::to_string(&doc).unwrap();
        assert_eq!(text, r#"{"distance":2.5,"red":1}"#);
    }

    #[test]
    fn rejects_non_object_bodies() {
        assert!(Document::try_from(json!([1, 2, 3])).is_err());
        assert!(Document::try_from(json!("text")).is_err());
        assert!(Document::try_from(json!({"ok": true})).is_ok());
    }

    #[test]
    fn fields_iterate_in_sorted_order() {
        let mut doc = Document::new();
        doc.set("red", json!(1));
        doc.set("blue", json!(2));
        doc.set("green", json!(3));

        let names: Vec<&str> = doc.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["blue", "green", "red"]);
    }
}
