use serde::Deserialize;

pub use crate::config::ConfigError;

/// Client error taxonomy. Referential-integrity rejections get their own
/// variant so callers can tell the operator exactly which documents are
/// blocking a delete/unpublish instead of showing a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store rejected request ({status}): {message}")]
    Api {
        status: u16,
        error_type: String,
        message: String,
    },

    #[error("{} document(s) are still referenced by other documents", ids.len())]
    DocumentsInUse { ids: Vec<String> },

    #[error("write token missing: set SANITY_API_TOKEN to enable mutations")]
    MissingToken,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("listen stream error: {0}")]
    Listen(String),

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Interpret a non-2xx mutation/query response body.
    ///
    /// The store reports documents blocked by inbound references in a
    /// structured `items` list; when that shape is present the error
    /// becomes [`ClientError::DocumentsInUse`] carrying the implicated
    /// IDs, otherwise a generic [`ClientError::Api`].
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Result<ErrorEnvelope, _> = serde_json::from_str(body);
        let Ok(envelope) = parsed else {
            return ClientError::Api {
                status,
                error_type: "unknown".into(),
                message: truncate(body, 300),
            };
        };

        let mut blocked: Vec<String> = Vec::new();
        for item in &envelope.error.items {
            if let Some(inner) = &item.error {
                if let Some(id) = &inner.id {
                    blocked.push(id.clone());
                }
                blocked.extend(inner.referencing_ids.iter().cloned());
            }
        }
        if !blocked.is_empty() {
            blocked.sort();
            blocked.dedup();
            return ClientError::DocumentsInUse { ids: blocked };
        }

        ClientError::Api {
            status,
            error_type: envelope
                .error
                .error_type
                .unwrap_or_else(|| "unknown".into()),
            message: envelope
                .error
                .description
                .unwrap_or_else(|| truncate(body, 300)),
        }
    }

    /// IDs the operator should unselect before retrying, when known.
    pub fn blocking_ids(&self) -> &[String] {
        match self {
            ClientError::DocumentsInUse { ids } => ids,
            _ => &[],
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    description: Option<String>,
    #[serde(default)]
    items: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    error: Option<ItemError>,
}

#[derive(Debug, Deserialize)]
struct ItemError {
    id: Option<String>,
    #[serde(rename = "referencingIDs", default)]
    referencing_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_referencing_ids_from_structured_payload() {
        let body = r#"{
            "error": {
                "type": "mutationError",
                "description": "Mutation(s) failed with 1 error(s)",
                "items": [
                    { "error": {
                        "id": "brand-gato",
                        "referencingIDs": ["review-12", "review-99"],
                        "type": "documentHasExistingReferencesError"
                    } }
                ]
            }
        }"#;
        let err = ClientError::from_response(409, body);
        match err {
            ClientError::DocumentsInUse { ids } => {
                assert_eq!(ids, vec!["brand-gato", "review-12", "review-99"]);
            }
            other => panic!("expected DocumentsInUse, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_generic_api_error() {
        let err = ClientError::from_response(400, r#"{"error":{"type":"queryParseError","description":"expected ']'"}}"#);
        match err {
            ClientError::Api {
                status, error_type, ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(error_type, "queryParseError");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tolerates_non_json_bodies() {
        let err = ClientError::from_response(502, "Bad Gateway");
        assert!(matches!(err, ClientError::Api { status: 502, .. }));
    }
}
