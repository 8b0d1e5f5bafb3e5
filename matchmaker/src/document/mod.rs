// Source documents read from collections and the records materialized from them

use crate::error::{MatchmakerError, Result};
use crate::value::{DocumentId, Value};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Field name prefix marking a foreign-key field: `FK_<collection>`
pub const FOREIGN_KEY_PREFIX: &str = "FK_";

/// A document loaded from a collection. Fields are kept in key order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub id: DocumentId,
    pub fields: BTreeMap<String, Value>,
}

impl SourceDocument {
    pub fn new(id: DocumentId, fields: BTreeMap<String, Value>) -> Self {
        SourceDocument { id, fields }
    }

    /// Decode the JSON text stored for a document.
    pub fn from_json_str(id: DocumentId, data_json: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(data_json)?;
        match Value::from(json) {
            Value::Map(fields) => Ok(SourceDocument { id, fields }),
            other => Err(MatchmakerError::InvalidDocument(format!(
                "document {id} is a {} rather than a map",
                other.type_name()
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Foreign-key fields as `(key, target collection, value)`, in key order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.fields.iter().filter_map(|(key, value)| {
            key.strip_prefix(FOREIGN_KEY_PREFIX)
                .filter(|collection| !collection.is_empty())
                .map(|collection| (key.as_str(), collection, value))
        })
    }
}

/// The materialized view row for one source document.
/// Fields whose patterns all failed are absent, never null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterializedRecord {
    pub source_id: DocumentId,
    pub fields: BTreeMap<String, String>,
}

impl MaterializedRecord {
    pub fn new(source_id: DocumentId) -> Self {
        MaterializedRecord {
            source_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Records serialize as the plain field map.
impl Serialize for MaterializedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_foreign_keys_in_key_order() {
        let id = DocumentId::generate();
        let doc = SourceDocument::from_json_str(
            id,
            r#"{"title": "x", "FK_b": "1", "FK_a": "2", "FK_": "3", "fk_c": "4"}"#,
        )
        .unwrap();

        let fks: Vec<_> = doc.foreign_keys().map(|(k, c, _)| (k, c)).collect();
        assert_eq!(fks, vec![("FK_a", "a"), ("FK_b", "b")]);
    }

    #[test]
    fn test_non_map_document_is_rejected() {
        let err = SourceDocument::from_json_str(DocumentId::generate(), "[1, 2]").unwrap_err();
        assert!(matches!(err, MatchmakerError::InvalidDocument(_)));

        let err = SourceDocument::from_json_str(DocumentId::generate(), "{not json").unwrap_err();
        assert!(matches!(err, MatchmakerError::Json(_)));
    }

    #[test]
    fn test_record_serializes_as_field_map() {
        let mut record = MaterializedRecord::new(DocumentId::generate());
        record.fields.insert("id".into(), "X_Y".into());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "X_Y" }));
    }
}
