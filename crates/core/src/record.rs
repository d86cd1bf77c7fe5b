use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
    Flags(BTreeMap<String, bool>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

/// A persisted entity instance. Scalar fields live in `values`; relations
/// live in `links` as ordered, duplicate-free id collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub entity: String,
    #[serde(default)]
    pub values: IndexMap<String, Value>,
    #[serde(default)]
    pub links: IndexMap<String, Vec<RecordId>>,
}

impl Record {
    pub fn new(id: RecordId, entity: impl Into<String>) -> Self {
        Self {
            id,
            entity: entity.into(),
            values: IndexMap::new(),
            links: IndexMap::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.values.get("name").and_then(Value::as_text)
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn set_value(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    pub fn linked(&self, collection: &str) -> &[RecordId] {
        self.links
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Adds `target` to a to-many collection. Returns false when it was
    /// already present.
    pub fn add_link(&mut self, collection: impl Into<String>, target: RecordId) -> bool {
        let ids = self.links.entry(collection.into()).or_default();
        if ids.contains(&target) {
            return false;
        }
        ids.push(target);
        true
    }

    /// Points a to-one relation at `target`, replacing any previous value.
    pub fn set_link(&mut self, collection: impl Into<String>, target: RecordId) {
        self.links.insert(collection.into(), vec![target]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_link_is_set_like() {
        let mut record = Record::new(RecordId(1), "SoftMain");
        assert!(record.add_link("tags", RecordId(7)));
        assert!(!record.add_link("tags", RecordId(7)));
        assert!(record.add_link("tags", RecordId(8)));
        assert_eq!(record.linked("tags"), &[RecordId(7), RecordId(8)]);
        assert!(record.linked("missing").is_empty());
    }

    #[test]
    fn set_link_replaces_previous_target() {
        let mut record = Record::new(RecordId(1), "SoftMain");
        record.set_link("SoftInfo", RecordId(2));
        record.set_link("SoftInfo", RecordId(3));
        assert_eq!(record.linked("SoftInfo"), &[RecordId(3)]);
    }

    #[test]
    fn record_serializes_with_tagged_values() {
        let mut record = Record::new(RecordId(4), "Tag");
        record.set_value("name", Value::Text("Cloud".to_string()));
        record.set_value("weight", Value::Null);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["values"]["name"]["type"], "text");
        assert_eq!(json["values"]["weight"]["type"], "null");
        let parsed: Record = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.name(), Some("Cloud"));
    }
}
