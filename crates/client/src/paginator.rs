//! Cursor-batched pagination over draft-inflated raw rows.
//!
//! Raw row counts and logical (draft-collapsed) counts differ, so a page
//! cannot be addressed by an exact offset. The paginator estimates a raw
//! starting offset, then accumulates batches forward until the page is
//! full. The estimate assumes full 2x draft inflation; when the real
//! ratio is lower the start can overshoot, which the batch loop bounds
//! but does not fully correct. Best effort by design.

use std::collections::HashSet;

use audiofast_core::document::id;
use audiofast_groq::{FilterExpr, Ordering};

use crate::error::ClientError;
use crate::source::DocumentSource;

/// Assumed worst-case raw-row inflation from draft/published pairs.
const OFFSET_INFLATION: usize = 2;
/// Batch size relative to the page size.
const BATCH_FACTOR: usize = 3;
/// Upper bound on batch fetches (including transient-error retries) per
/// page request. Bounds worst-case latency, not correctness.
const MAX_BATCHES: usize = 5;

pub struct EfficientPaginator<'a, S: DocumentSource + ?Sized> {
    source: &'a S,
    page_size: usize,
}

impl<'a, S: DocumentSource + ?Sized> EfficientPaginator<'a, S> {
    pub fn new(source: &'a S, page_size: usize) -> Self {
        Self { source, page_size }
    }

    /// Logical (deduplicated, prefix-stripped) IDs for the requested page.
    ///
    /// May return fewer than `page_size` IDs on the final page or when the
    /// retry ceiling is reached.
    pub async fn page_ids(
        &self,
        filter: &FilterExpr,
        order: &[Ordering],
        page: usize,
    ) -> Result<Vec<String>, ClientError> {
        let batch = self.page_size * BATCH_FACTOR;
        let mut offset = page * self.page_size * OFFSET_INFLATION;
        let mut collected: Vec<String> = Vec::with_capacity(self.page_size);
        let mut seen: HashSet<String> = HashSet::new();

        let mut attempt = 0;
        while attempt < MAX_BATCHES {
            attempt += 1;
            let rows = match self
                .source
                .ids(filter, order, Some((offset, offset + batch)))
                .await
            {
                Ok(rows) => rows,
                Err(e) if attempt < MAX_BATCHES => {
                    tracing::warn!(error = %e, offset, "batch fetch failed, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if rows.is_empty() {
                break;
            }

            // A published row whose draft sibling is present in the same
            // batch is shadowed by that draft.
            let draft_bases: HashSet<&str> = rows
                .iter()
                .filter(|raw| id::is_draft_id(raw))
                .map(|raw| id::base_id(raw))
                .collect();

            for raw in &rows {
                if !id::is_draft_id(raw) && draft_bases.contains(id::base_id(raw)) {
                    continue;
                }
                let base = id::base_id(raw).to_string();
                if seen.insert(base.clone()) {
                    collected.push(base);
                }
                if collected.len() == self.page_size {
                    return Ok(collected);
                }
            }

            offset += batch;
        }

        Ok(collected)
    }

    /// Logical total: `drafts − drafts with a published sibling + published`.
    pub async fn total(&self, filter: &FilterExpr) -> Result<usize, ClientError> {
        let drafts_filter = FilterExpr::and(vec![filter.clone(), FilterExpr::DraftsOnly]);
        let draft_ids = self.source.ids(&drafts_filter, &[], None).await?;
        let draft_count = draft_ids.len();

        let published_filter = FilterExpr::and(vec![filter.clone(), FilterExpr::NoDrafts]);
        let published_count = self.source.count(&published_filter).await?;

        let shadowed = if draft_ids.is_empty() {
            0
        } else {
            let bases: Vec<String> = draft_ids
                .iter()
                .map(|raw| id::base_id(raw).to_string())
                .collect();
            self.source
                .count(&FilterExpr::and(vec![
                    filter.clone(),
                    FilterExpr::NoDrafts,
                    FilterExpr::id_in(&bases),
                ]))
                .await?
        };

        Ok(draft_count + published_count - shadowed)
    }
}
