//! Batched transaction commits with a per-document fallback.
//!
//! Migration writes go out in fixed-size transactions. When a batch is
//! rejected, each of its mutations is retried alone so one bad document
//! does not sacrifice its batch-mates; the individually failing
//! documents are reported with their error messages.

use audiofast_client::source::DocumentStore;
use audiofast_core::mutation::{Mutation, Transaction};

use crate::error::MigrateError;

#[derive(Debug, Default)]
pub struct BatchReport {
    pub committed: usize,
    /// (document id, error message) for mutations that failed even when
    /// retried individually.
    pub failed: Vec<(String, String)>,
}

/// Commit `(doc id, mutation)` pairs in batches of `batch_size`.
pub async fn commit_batched<S: DocumentStore + ?Sized>(
    store: &S,
    mutations: Vec<(String, Mutation)>,
    batch_size: usize,
) -> Result<BatchReport, MigrateError> {
    let mut report = BatchReport::default();
    let batch_size = batch_size.max(1);

    for chunk in mutations.chunks(batch_size) {
        let mut tx = Transaction::new();
        for (_, mutation) in chunk {
            tx.push(mutation.clone());
        }

        match store.commit(tx).await {
            Ok(_) => report.committed += chunk.len(),
            Err(batch_err) => {
                tracing::warn!(
                    error = %batch_err,
                    size = chunk.len(),
                    "batch transaction failed; retrying documents individually"
                );
                for (doc_id, mutation) in chunk {
                    let mut single = Transaction::new();
                    single.push(mutation.clone());
                    match store.commit(single).await {
                        Ok(_) => report.committed += 1,
                        Err(e) => {
                            tracing::warn!(doc_id, error = %e, "document failed individually");
                            report.failed.push((doc_id.clone(), e.to_string()));
                        }
                    }
                }
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiofast_client::test_fixtures::InMemoryLake;
    use serde_json::json;

    fn create(id: &str) -> (String, Mutation) {
        (
            id.to_string(),
            Mutation::CreateOrReplace(json!({ "_id": id, "_type": "brand" })),
        )
    }

    #[tokio::test]
    async fn clean_batches_commit_as_transactions() {
        let lake = InMemoryLake::new();
        let report = commit_batched(&lake, vec![create("a"), create("b"), create("c")], 2)
            .await
            .unwrap();
        assert_eq!(report.committed, 3);
        assert!(report.failed.is_empty());
        assert_eq!(lake.len(), 3);
    }

    #[tokio::test]
    async fn failing_batch_falls_back_to_single_documents() {
        let lake = InMemoryLake::new();
        lake.poison("bad");

        let report = commit_batched(
            &lake,
            vec![create("a"), create("bad"), create("c")],
            10,
        )
        .await
        .unwrap();

        assert_eq!(report.committed, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        // Batch-mates of the bad document still landed.
        assert!(lake.contains("a"));
        assert!(lake.contains("c"));
        assert!(!lake.contains("bad"));
    }
}
