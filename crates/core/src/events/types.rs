use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events arriving on the store's listen (SSE) channel for a query
/// subscription. The SSE event name selects the variant; `mutation`
/// events carry a payload describing the changed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ListenEvent {
    /// Sent once when the subscription is established.
    Welcome,
    /// A document matching the subscribed query changed.
    Mutation(MutationEvent),
    /// The server asked the client to re-establish the connection.
    Reconnect,
    /// The channel is closing; no further events will arrive.
    Disconnect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
    pub document_id: String,
    pub transition: Transition,
    #[serde(default)]
    pub previous_rev: Option<String>,
    #[serde(default)]
    pub result_rev: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Appear,
    Update,
    Disappear,
}

impl MutationEvent {
    pub fn base_id(&self) -> &str {
        crate::document::id::base_id(&self.document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_event_deserializes_listen_payload() {
        let event: MutationEvent = serde_json::from_str(
            r#"{
                "documentId": "drafts.review-7",
                "transition": "update",
                "resultRev": "abc",
                "timestamp": "2024-05-01T08:30:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(event.base_id(), "review-7");
        assert_eq!(event.transition, Transition::Update);
        assert!(event.previous_rev.is_none());
    }
}
