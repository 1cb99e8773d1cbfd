//! Draft/published reconciliation.
//!
//! The store may hold up to two physical records per base ID (a draft and
//! a published copy). The admin table always shows one row per base ID;
//! this module merges each pair into a single logical document and tags
//! it with its publication status.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::id;
use super::model::SanityDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Only a draft record exists.
    Draft,
    /// Only a published record exists.
    Published,
    /// Both records exist; the draft shadows the published copy.
    PublishedWithPendingChanges,
}

/// Ordering context the caller fetched the page under. `lastPublishedAt`
/// derivation depends on whether the page is sorted by the update
/// timestamp descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrder {
    UpdatedDesc,
    Other,
}

/// One user-facing row: a draft/published pair merged into a single entry.
#[derive(Debug, Clone, Serialize)]
pub struct LogicalDocument {
    /// Base ID, draft prefix stripped.
    pub id: String,
    pub doc_type: String,
    pub status: DocumentStatus,
    /// Timestamp of the published copy, when one exists. Draft-only
    /// documents report `None` under `UpdatedDesc` ordering so they do
    /// not claim a publish time they never had.
    pub last_published_at: Option<DateTime<Utc>>,
    /// The winning physical record (the draft, when both exist).
    pub document: SanityDocument,
}

/// Merge raw query results into logical documents, preserving the order
/// of `page_ids` (draft results sort into the position of their base ID).
///
/// Documents deleted between the ID fetch and the detail fetch are simply
/// absent from `raw` and produce no output row.
pub fn reconcile(
    page_ids: &[String],
    raw: Vec<SanityDocument>,
    order: PageOrder,
) -> Vec<LogicalDocument> {
    let mut drafts: HashMap<String, SanityDocument> = HashMap::new();
    let mut published: HashMap<String, SanityDocument> = HashMap::new();

    for doc in raw {
        let base = doc.base_id().to_string();
        if doc.is_draft() {
            drafts.insert(base, doc);
        } else {
            published.insert(base, doc);
        }
    }

    let position: HashMap<&str, usize> = page_ids
        .iter()
        .enumerate()
        .map(|(idx, raw_id)| (id::base_id(raw_id), idx))
        .collect();

    let mut merged: Vec<LogicalDocument> = Vec::with_capacity(drafts.len() + published.len());

    for (base, draft) in drafts {
        let sibling = published.remove(&base);
        let status = if sibling.is_some() {
            DocumentStatus::PublishedWithPendingChanges
        } else {
            DocumentStatus::Draft
        };
        let last_published_at = match (&sibling, order) {
            (Some(p), _) => p.updated_at,
            (None, PageOrder::UpdatedDesc) => None,
            (None, PageOrder::Other) => draft.updated_at,
        };
        merged.push(LogicalDocument {
            id: base,
            doc_type: draft.doc_type.clone(),
            status,
            last_published_at,
            document: draft,
        });
    }

    for (base, doc) in published {
        merged.push(LogicalDocument {
            id: base,
            doc_type: doc.doc_type.clone(),
            status: DocumentStatus::Published,
            last_published_at: doc.updated_at,
            document: doc,
        });
    }

    merged.sort_by_key(|doc| position.get(doc.id.as_str()).copied().unwrap_or(usize::MAX));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn doc(id: &str, updated: Option<&str>) -> SanityDocument {
        let mut value = json!({ "_id": id, "_type": "review" });
        if let Some(ts) = updated {
            value["_updatedAt"] = json!(ts);
        }
        serde_json::from_value(value).unwrap()
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn merges_draft_and_published_pair() {
        let out = reconcile(
            &ids(&["a"]),
            vec![doc("a", Some("2024-01-01T00:00:00Z")), doc("drafts.a", None)],
            PageOrder::Other,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, DocumentStatus::PublishedWithPendingChanges);
        // The draft record wins; the published timestamp survives.
        assert!(out[0].document.is_draft());
        assert_eq!(
            out[0].last_published_at.unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn no_duplicate_base_ids_in_output() {
        let raw = vec![
            doc("a", None),
            doc("drafts.a", None),
            doc("b", None),
            doc("drafts.c", None),
        ];
        let out = reconcile(&ids(&["a", "b", "c"]), raw, PageOrder::Other);
        let unique: HashSet<&str> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(unique.len(), out.len());
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn draft_only_status_and_timestamps() {
        let raw = vec![doc("drafts.x", Some("2024-02-02T00:00:00Z"))];

        let desc = reconcile(&ids(&["drafts.x"]), raw.clone(), PageOrder::UpdatedDesc);
        assert_eq!(desc[0].status, DocumentStatus::Draft);
        assert!(desc[0].last_published_at.is_none());

        let other = reconcile(&ids(&["drafts.x"]), raw, PageOrder::Other);
        assert!(other[0].last_published_at.is_some());
    }

    #[test]
    fn restores_page_order_for_draft_results() {
        // "b" appears on the page as a draft ID; its merged row must sort
        // into b's slot, not to the end.
        let raw = vec![doc("drafts.b", None), doc("a", None), doc("c", None)];
        let out = reconcile(&ids(&["a", "drafts.b", "c"]), raw, PageOrder::Other);
        let order: Vec<&str> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_documents_are_silently_absent() {
        let out = reconcile(&ids(&["a", "gone"]), vec![doc("a", None)], PageOrder::Other);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }
}
