/// Pre-flight checks applied to documents before they are sent to the
/// store. Migration transforms run these so a malformed record is skipped
/// and counted instead of failing a whole transaction.
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("document _id is required")]
    MissingId,
    #[error("document _type is required")]
    MissingType,
    #[error("document _id cannot be empty")]
    EmptyId,
    #[error("document _type cannot be empty")]
    EmptyType,
    #[error("required field `{0}` is missing or empty")]
    MissingField(String),
}

/// Validate that a document value carries non-empty `_id` and `_type`.
pub fn validate_document(doc: &Value) -> Result<(), ValidationError> {
    match doc.get("_id").and_then(Value::as_str) {
        None => return Err(ValidationError::MissingId),
        Some("") => return Err(ValidationError::EmptyId),
        Some(_) => {}
    }
    match doc.get("_type").and_then(Value::as_str) {
        None => return Err(ValidationError::MissingType),
        Some("") => return Err(ValidationError::EmptyType),
        Some(_) => {}
    }
    Ok(())
}

/// Require a non-empty string field on a document value.
pub fn require_str<'a>(doc: &'a Value, field: &str) -> Result<&'a str, ValidationError> {
    match doc.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ValidationError::MissingField(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_document() {
        assert!(validate_document(&json!({ "_id": "a", "_type": "brand" })).is_ok());
    }

    #[test]
    fn rejects_missing_or_empty_system_fields() {
        assert_eq!(
            validate_document(&json!({ "_type": "brand" })),
            Err(ValidationError::MissingId)
        );
        assert_eq!(
            validate_document(&json!({ "_id": "", "_type": "brand" })),
            Err(ValidationError::EmptyId)
        );
        assert_eq!(
            validate_document(&json!({ "_id": "a" })),
            Err(ValidationError::MissingType)
        );
    }

    #[test]
    fn require_str_rejects_blank() {
        let doc = json!({ "name": "  " });
        assert!(require_str(&doc, "name").is_err());
        assert!(require_str(&doc, "absent").is_err());
    }
}
