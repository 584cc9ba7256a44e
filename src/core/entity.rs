//! Rows: concrete instances of a registered model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored row of some model.
///
/// The row store only cares about the entity type and the numeric primary
/// key; the remaining columns travel as an opaque JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Entity type tag of the owning model (`app_label.model_name`)
    pub entity_type: String,

    /// Numeric primary key within that entity type
    pub pk: i64,

    /// Remaining columns
    #[serde(default)]
    pub data: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

impl Row {
    pub fn new(entity_type: impl Into<String>, pk: i64, data: serde_json::Value) -> Self {
        Self {
            entity_type: entity_type.into(),
            pk,
            data,
            created_at: Utc::now(),
        }
    }

    /// Whether this row belongs to the given entity type
    pub fn is_a(&self, entity_type: &str) -> bool {
        self.entity_type == entity_type
    }
}

/// A row returned by an annotated query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRow {
    #[serde(flatten)]
    pub row: Row,

    /// Public id computed by the query, `None` when the query was not
    /// annotated or the row has no mapping entry yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_id: Option<Uuid>,
}

impl AnnotatedRow {
    pub fn plain(row: Row) -> Self {
        Self {
            row,
            public_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_is_a() {
        let row = Row::new("catalog.widget", 42, json!({"name": "bolt"}));
        assert!(row.is_a("catalog.widget"));
        assert!(!row.is_a("catalog.gadget"));
    }

    #[test]
    fn test_annotated_row_serializes_flat() {
        let public_id = Uuid::new_v4();
        let annotated = AnnotatedRow {
            row: Row::new("catalog.widget", 42, json!({"name": "bolt"})),
            public_id: Some(public_id),
        };
        let value = serde_json::to_value(&annotated).unwrap();
        assert_eq!(value["pk"], 42);
        assert_eq!(value["public_id"], public_id.to_string());

        let plain = serde_json::to_value(AnnotatedRow::plain(annotated.row)).unwrap();
        assert!(plain.get("public_id").is_none());
    }
}
