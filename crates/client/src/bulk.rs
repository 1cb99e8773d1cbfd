//! Bulk publish/unpublish/discard/delete over a selection of logical IDs.
//!
//! Each operation resolves the physical records behind the selection and
//! commits exactly one transaction, so a user-triggered bulk action either
//! lands for every selected document or for none of them.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::{json, Value};

use audiofast_core::document::id;
use audiofast_core::mutation::Transaction;
use audiofast_core::SanityDocument;

use crate::error::ClientError;
use crate::source::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Number of logical documents the operation actually touched. A
    /// selection may include documents an operation does not apply to
    /// (e.g. discarding changes on a draft-only document); those are not
    /// counted.
    pub affected: usize,
    pub transaction_id: Option<String>,
}

impl BulkOutcome {
    fn empty() -> Self {
        Self {
            affected: 0,
            transaction_id: None,
        }
    }
}

pub struct BulkActions<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> BulkActions<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Promote drafts: create-or-replace the published copy from each
    /// draft body, then drop the draft. Selected IDs with no draft are
    /// untouched (there is nothing to publish).
    pub async fn publish(&self, selection: &[String]) -> Result<BulkOutcome, ClientError> {
        let draft_ids: Vec<String> = selection.iter().map(|s| id::draft_id(s)).collect();
        let drafts = self.store.fetch(&draft_ids).await?;
        if drafts.is_empty() {
            return Ok(BulkOutcome::empty());
        }

        let mut tx = Transaction::new();
        for doc in &drafts {
            tx = tx
                .create_or_replace(published_body(doc))
                .delete(doc.id.clone());
        }
        let affected = drafts.len();
        let response = self.store.commit(tx).await?;
        Ok(BulkOutcome {
            affected,
            transaction_id: Some(response.transaction_id),
        })
    }

    /// Retract published copies into drafts. Each published body becomes
    /// a draft (create-if-not-exists, so an existing draft wins), then
    /// the published record is deleted.
    pub async fn unpublish(&self, selection: &[String]) -> Result<BulkOutcome, ClientError> {
        let published_ids: Vec<String> = selection
            .iter()
            .map(|s| id::base_id(s).to_string())
            .collect();
        let published = self.store.fetch(&published_ids).await?;
        if published.is_empty() {
            return Ok(BulkOutcome::empty());
        }

        let mut tx = Transaction::new();
        for doc in &published {
            tx = tx
                .create_if_not_exists(draft_body(doc))
                .delete(doc.id.clone());
        }
        let affected = published.len();
        let response = self.store.commit(tx).await?;
        Ok(BulkOutcome {
            affected,
            transaction_id: Some(response.transaction_id),
        })
    }

    /// Drop the draft half of every selected document that has both a
    /// draft and a published copy. Draft-only documents are untouched;
    /// there is no published state to revert to.
    pub async fn discard_changes(&self, selection: &[String]) -> Result<BulkOutcome, ClientError> {
        let existing = self.fetch_both_variants(selection).await?;

        let with_published: HashSet<&str> = existing
            .iter()
            .filter(|doc| !doc.is_draft())
            .map(|doc| doc.base_id())
            .collect();

        let shadowing_drafts: Vec<&SanityDocument> = existing
            .iter()
            .filter(|doc| doc.is_draft() && with_published.contains(doc.base_id()))
            .collect();
        if shadowing_drafts.is_empty() {
            return Ok(BulkOutcome::empty());
        }

        let mut tx = Transaction::new();
        for doc in &shadowing_drafts {
            tx = tx.delete(doc.id.clone());
        }
        let affected = shadowing_drafts.len();
        let response = self.store.commit(tx).await?;
        Ok(BulkOutcome {
            affected,
            transaction_id: Some(response.transaction_id),
        })
    }

    /// Delete every physical record (draft and published) behind the
    /// selection.
    pub async fn delete(&self, selection: &[String]) -> Result<BulkOutcome, ClientError> {
        let existing = self.fetch_both_variants(selection).await?;
        if existing.is_empty() {
            return Ok(BulkOutcome::empty());
        }

        let affected: HashSet<&str> = existing.iter().map(|doc| doc.base_id()).collect();
        let mut tx = Transaction::new();
        for doc in &existing {
            tx = tx.delete(doc.id.clone());
        }
        let affected = affected.len();
        let response = self.store.commit(tx).await?;
        Ok(BulkOutcome {
            affected,
            transaction_id: Some(response.transaction_id),
        })
    }

    async fn fetch_both_variants(
        &self,
        selection: &[String],
    ) -> Result<Vec<SanityDocument>, ClientError> {
        let mut ids: Vec<String> = Vec::with_capacity(selection.len() * 2);
        for selected in selection {
            let base = id::base_id(selected).to_string();
            ids.push(id::draft_id(&base));
            ids.push(base);
        }
        self.store.fetch(&ids).await
    }
}

/// Draft body derived from a published record: prefixed ID, fresh update
/// timestamp, revision left for the store to assign.
fn draft_body(doc: &SanityDocument) -> Value {
    rebody(doc, id::draft_id(doc.base_id()))
}

/// Published body derived from a draft record.
fn published_body(doc: &SanityDocument) -> Value {
    rebody(doc, doc.base_id().to_string())
}

fn rebody(doc: &SanityDocument, new_id: String) -> Value {
    let mut value = doc.to_value();
    if let Some(map) = value.as_object_mut() {
        map.insert("_id".into(), json!(new_id));
        map.insert("_updatedAt".into(), json!(Utc::now()));
        map.remove("_rev");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::InMemoryLake;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn publish_replaces_published_and_drops_draft() {
        let lake = InMemoryLake::new();
        lake.insert_published("review-a", "review");
        lake.insert_draft("review-a", "review");
        lake.insert_draft("review-b", "review");

        let outcome = BulkActions::new(&lake)
            .publish(&ids(&["review-a", "review-b"]))
            .await
            .unwrap();

        assert_eq!(outcome.affected, 2);
        assert!(lake.contains("review-a"));
        assert!(lake.contains("review-b"));
        assert!(!lake.contains("drafts.review-a"));
        assert!(!lake.contains("drafts.review-b"));
    }

    #[tokio::test]
    async fn unpublish_creates_draft_and_deletes_published() {
        let lake = InMemoryLake::new();
        lake.insert_published("review-a", "review");

        let outcome = BulkActions::new(&lake)
            .unpublish(&ids(&["review-a"]))
            .await
            .unwrap();

        assert_eq!(outcome.affected, 1);
        assert!(!lake.contains("review-a"));
        assert!(lake.contains("drafts.review-a"));
    }

    #[tokio::test]
    async fn discard_changes_skips_draft_only_documents() {
        let lake = InMemoryLake::new();
        for base in ["review-a", "review-b"] {
            lake.insert_published(base, "review");
            lake.insert_draft(base, "review");
        }
        lake.insert_draft("review-c", "review");

        let outcome = BulkActions::new(&lake)
            .discard_changes(&ids(&["review-a", "review-b", "review-c"]))
            .await
            .unwrap();

        // Only the two shadowing drafts are reverted.
        assert_eq!(outcome.affected, 2);
        assert!(!lake.contains("drafts.review-a"));
        assert!(!lake.contains("drafts.review-b"));
        assert!(lake.contains("drafts.review-c"), "draft-only document must survive");
        assert!(lake.contains("review-a"));
    }

    #[tokio::test]
    async fn delete_removes_both_physical_records() {
        let lake = InMemoryLake::new();
        lake.insert_published("review-a", "review");
        lake.insert_draft("review-a", "review");
        lake.insert_published("review-b", "review");

        let outcome = BulkActions::new(&lake)
            .delete(&ids(&["review-a", "review-b"]))
            .await
            .unwrap();

        assert_eq!(outcome.affected, 2);
        assert_eq!(lake.len(), 0);
    }

    #[tokio::test]
    async fn referenced_document_fails_whole_transaction() {
        let lake = InMemoryLake::new();
        lake.insert_published("brand-a", "brand");
        lake.insert_published("brand-b", "brand");
        lake.mark_referenced("brand-a");

        let err = BulkActions::new(&lake)
            .delete(&ids(&["brand-a", "brand-b"]))
            .await
            .unwrap_err();

        assert_eq!(err.blocking_ids(), &["brand-a".to_string()]);
        // Atomicity: the unblocked document must survive too.
        assert!(lake.contains("brand-b"));
    }
}
