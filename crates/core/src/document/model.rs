use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id;

/// Raw Sanity document as returned by the query endpoint.
///
/// Everything beyond the system fields is kept as an opaque field map;
/// the admin table and the migration tools only ever inspect a handful
/// of well-known fields by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "_updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Arbitrary document fields.
    #[serde(flatten)]
    pub content: serde_json::Map<String, Value>,
}

impl SanityDocument {
    pub fn base_id(&self) -> &str {
        id::base_id(&self.id)
    }

    pub fn is_draft(&self) -> bool {
        id::is_draft_id(&self.id)
    }

    /// Fetch a top-level string field, if present and a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.content.get(field).and_then(Value::as_str)
    }

    /// Convert back into a plain JSON value, system fields included.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_system_and_custom_fields() {
        let doc: SanityDocument = serde_json::from_value(json!({
            "_id": "drafts.review-1",
            "_type": "review",
            "_updatedAt": "2024-03-01T12:00:00Z",
            "title": "Pylon Diamond 25"
        }))
        .unwrap();

        assert_eq!(doc.base_id(), "review-1");
        assert!(doc.is_draft());
        assert_eq!(doc.get_str("title"), Some("Pylon Diamond 25"));
        assert!(doc.created_at.is_none());
    }
}
