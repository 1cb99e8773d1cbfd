//! Page state behind the admin table: filter/sort/page-size state, the
//! current page snapshot, the selection, and named in-flight operation
//! tags.
//!
//! Every load captures a generation number up front and re-checks it
//! before committing results, so a stale slow response can never
//! overwrite the state of a newer request. The underlying network call
//! is not aborted; its result is simply discarded.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use audiofast_core::document::id;
use audiofast_core::{reconcile, LogicalDocument, PageOrder};
use audiofast_groq::{sanitize_groq_input, Direction, FilterExpr, Ordering};

use crate::bulk::{BulkActions, BulkOutcome};
use crate::error::ClientError;
use crate::paginator::EfficientPaginator;
use crate::source::DocumentStore;

/// Named in-flight operations. Tracked as a set so independent fetches
/// can overlap without one's completion clearing another's indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadingTag {
    TotalCount,
    PageIds,
    Results,
}

/// Filter/sort/page-size state for one document type's table.
#[derive(Debug, Clone)]
pub struct TableState {
    pub doc_type: String,
    /// Free-text search term; sanitized before it reaches a query.
    pub search_value: String,
    /// Field the search term matches against.
    pub search_field: String,
    /// Reference filters: field name → selected reference IDs.
    pub reference_filters: BTreeMap<String, BTreeSet<String>>,
    /// Additional filter clauses contributed by column filters.
    pub extra_filters: Vec<FilterExpr>,
    pub order: Ordering,
    pub page_size: usize,
}

impl TableState {
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            search_value: String::new(),
            search_field: "title".into(),
            reference_filters: BTreeMap::new(),
            extra_filters: Vec::new(),
            order: Ordering::new("_updatedAt", Direction::Desc),
            page_size: 20,
        }
    }

    fn filter(&self) -> FilterExpr {
        let mut clauses = vec![FilterExpr::type_is(self.doc_type.clone())];

        let term = sanitize_groq_input(self.search_value.trim());
        if !term.is_empty() {
            clauses.push(FilterExpr::matches(
                self.search_field.clone(),
                format!("{term}*"),
            ));
        }

        for (field, ids) in &self.reference_filters {
            if !ids.is_empty() {
                clauses.push(FilterExpr::in_values(
                    format!("{field}._ref"),
                    ids.iter().map(|id| Value::String(id.clone())).collect(),
                ));
            }
        }

        clauses.extend(self.extra_filters.iter().cloned());
        FilterExpr::and(clauses)
    }

    fn page_order(&self) -> PageOrder {
        if self.order.field == "_updatedAt" && self.order.direction == Direction::Desc {
            PageOrder::UpdatedDesc
        } else {
            PageOrder::Other
        }
    }
}

/// The currently displayed page.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub page: usize,
    pub total: usize,
    /// Logical IDs on this page, in display order.
    pub ids: Vec<String>,
    pub documents: Vec<LogicalDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Publish,
    Unpublish,
    DiscardChanges,
    Delete,
}

pub struct PageStore<S: DocumentStore + ?Sized> {
    source: Arc<S>,
    state: Mutex<TableState>,
    page: AtomicUsize,
    snapshot: Mutex<PageSnapshot>,
    selection: Mutex<BTreeSet<String>>,
    loading: Mutex<HashSet<LoadingTag>>,
    generation: AtomicU64,
}

impl<S: DocumentStore + ?Sized> PageStore<S> {
    pub fn new(source: Arc<S>, state: TableState) -> Self {
        Self {
            source,
            state: Mutex::new(state),
            page: AtomicUsize::new(0),
            snapshot: Mutex::new(PageSnapshot::default()),
            selection: Mutex::new(BTreeSet::new()),
            loading: Mutex::new(HashSet::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> PageSnapshot {
        self.snapshot.lock().unwrap().clone()
    }

    pub fn is_loading(&self, tag: LoadingTag) -> bool {
        self.loading.lock().unwrap().contains(&tag)
    }

    pub fn loading_any(&self) -> bool {
        !self.loading.lock().unwrap().is_empty()
    }

    // --- selection -------------------------------------------------------

    pub fn select(&self, logical_id: &str) {
        self.selection
            .lock()
            .unwrap()
            .insert(id::base_id(logical_id).to_string());
    }

    pub fn deselect(&self, logical_id: &str) {
        self.selection.lock().unwrap().remove(id::base_id(logical_id));
    }

    pub fn clear_selection(&self) {
        self.selection.lock().unwrap().clear();
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selection.lock().unwrap().iter().cloned().collect()
    }

    // --- state changes ---------------------------------------------------

    /// Jump to a page. Invalidates any in-flight load.
    pub fn set_page(&self, page: usize) {
        self.page.store(page, AtomicOrdering::SeqCst);
        self.generation.fetch_add(1, AtomicOrdering::SeqCst);
    }

    /// Mutate filter/sort state; resets to the first page and
    /// invalidates any in-flight load.
    pub fn update_state(&self, apply: impl FnOnce(&mut TableState)) {
        apply(&mut self.state.lock().unwrap());
        self.page.store(0, AtomicOrdering::SeqCst);
        self.generation.fetch_add(1, AtomicOrdering::SeqCst);
    }

    pub fn state(&self) -> TableState {
        self.state.lock().unwrap().clone()
    }

    // --- loading ---------------------------------------------------------

    /// Recompute total, page IDs, and results for the current page.
    pub async fn load_page(&self) -> Result<(), ClientError> {
        let generation = self.generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let state = self.state();
        let page = self.page.load(AtomicOrdering::SeqCst);
        let filter = state.filter();
        let order = vec![state.order.clone()];
        let paginator = EfficientPaginator::new(self.source.as_ref(), state.page_size);

        self.begin(LoadingTag::TotalCount);
        self.begin(LoadingTag::PageIds);
        let (total, page_ids) = tokio::join!(
            paginator.total(&filter),
            paginator.page_ids(&filter, &order, page)
        );
        self.finish(LoadingTag::TotalCount);
        self.finish(LoadingTag::PageIds);
        let total = total?;
        let ids = page_ids?;

        if self.generation.load(AtomicOrdering::SeqCst) != generation {
            return Ok(()); // superseded by a newer request
        }

        {
            let mut snap = self.snapshot.lock().unwrap();
            snap.page = page;
            snap.total = total;
            snap.ids = ids.clone();
        }

        self.load_results(generation, ids, state.page_order()).await
    }

    /// Re-fetch full documents for the current page ID list (used by the
    /// live subscriber after a debounce window).
    pub async fn refresh_results(&self) -> Result<(), ClientError> {
        let generation = self.generation.load(AtomicOrdering::SeqCst);
        let ids = self.snapshot.lock().unwrap().ids.clone();
        let order = self.state().page_order();
        self.load_results(generation, ids, order).await
    }

    /// Optimistic insert for a change notification: an unseen base ID is
    /// appended to the page ahead of query truth, and the results fetch
    /// is marked in-flight until the debounced refetch lands.
    pub fn note_change(&self, base_id: &str) {
        let mut snap = self.snapshot.lock().unwrap();
        if !snap.ids.iter().any(|existing| existing == base_id) {
            snap.ids.push(base_id.to_string());
        }
        drop(snap);
        self.begin(LoadingTag::Results);
    }

    async fn load_results(
        &self,
        generation: u64,
        ids: Vec<String>,
        order: PageOrder,
    ) -> Result<(), ClientError> {
        self.begin(LoadingTag::Results);
        let mut raw_ids: Vec<String> = Vec::with_capacity(ids.len() * 2);
        for base in &ids {
            raw_ids.push(base.clone());
            raw_ids.push(id::draft_id(base));
        }
        let fetched = self.source.fetch(&raw_ids).await;
        self.finish(LoadingTag::Results);
        let fetched = fetched?;

        if self.generation.load(AtomicOrdering::SeqCst) != generation {
            return Ok(());
        }
        let documents = reconcile(&ids, fetched, order);
        self.snapshot.lock().unwrap().documents = documents;
        Ok(())
    }

    fn begin(&self, tag: LoadingTag) {
        self.loading.lock().unwrap().insert(tag);
    }

    fn finish(&self, tag: LoadingTag) {
        self.loading.lock().unwrap().remove(&tag);
    }

    // --- bulk actions ----------------------------------------------------

    /// Run a bulk action over the current selection. On success the
    /// selection is cleared and the page reloaded; on failure both are
    /// left untouched so the operator can unselect the blocking
    /// documents and retry.
    pub async fn apply_bulk(&self, action: BulkAction) -> Result<BulkOutcome, ClientError> {
        let selection = self.selected_ids();
        if selection.is_empty() {
            return Ok(BulkOutcome {
                affected: 0,
                transaction_id: None,
            });
        }

        let actions = BulkActions::new(self.source.as_ref());
        let outcome = match action {
            BulkAction::Publish => actions.publish(&selection).await,
            BulkAction::Unpublish => actions.unpublish(&selection).await,
            BulkAction::DiscardChanges => actions.discard_changes(&selection).await,
            BulkAction::Delete => actions.delete(&selection).await,
        }?;

        tracing::info!(affected = outcome.affected, ?action, "bulk action committed");
        self.clear_selection();
        self.load_page().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::InMemoryLake;
    use audiofast_core::DocumentStatus;

    fn store_with(lake: InMemoryLake) -> PageStore<InMemoryLake> {
        let mut state = TableState::new("review");
        state.page_size = 10;
        PageStore::new(Arc::new(lake), state)
    }

    #[tokio::test]
    async fn load_page_builds_reconciled_snapshot() {
        let lake = InMemoryLake::new();
        lake.insert_published("review-a", "review");
        lake.insert_draft("review-a", "review");
        lake.insert_published("review-b", "review");

        let store = store_with(lake);
        store.load_page().await.unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.total, 2);
        assert_eq!(snap.ids.len(), 2);
        assert_eq!(snap.documents.len(), 2);
        let a = snap.documents.iter().find(|d| d.id == "review-a").unwrap();
        assert_eq!(a.status, DocumentStatus::PublishedWithPendingChanges);
        assert!(!store.loading_any());
    }

    #[tokio::test]
    async fn discard_changes_clears_selection_and_reports_affected() {
        let lake = InMemoryLake::new();
        for base in ["review-a", "review-b"] {
            lake.insert_published(base, "review");
            lake.insert_draft(base, "review");
        }
        lake.insert_draft("review-c", "review");

        let store = store_with(lake);
        store.load_page().await.unwrap();
        for id in ["review-a", "review-b", "review-c"] {
            store.select(id);
        }

        let outcome = store.apply_bulk(BulkAction::DiscardChanges).await.unwrap();
        assert_eq!(outcome.affected, 2);
        assert!(store.selected_ids().is_empty());
    }

    #[tokio::test]
    async fn failed_bulk_action_preserves_selection() {
        let lake = InMemoryLake::new();
        lake.insert_published("brand-a", "brand");
        lake.mark_referenced("brand-a");

        let mut state = TableState::new("brand");
        state.page_size = 10;
        let store = PageStore::new(Arc::new(lake), state);
        store.load_page().await.unwrap();
        store.select("brand-a");

        let err = store.apply_bulk(BulkAction::Delete).await.unwrap_err();
        assert_eq!(err.blocking_ids(), &["brand-a".to_string()]);
        assert_eq!(store.selected_ids(), vec!["brand-a".to_string()]);
    }

    #[tokio::test]
    async fn note_change_appends_unseen_id_once() {
        let lake = InMemoryLake::new();
        lake.insert_published("review-a", "review");
        let store = store_with(lake);
        store.load_page().await.unwrap();

        store.note_change("review-z");
        store.note_change("review-z");
        store.note_change("review-a");

        let snap = store.snapshot();
        assert_eq!(snap.ids, vec!["review-a".to_string(), "review-z".to_string()]);
        assert!(store.is_loading(LoadingTag::Results));
    }

    #[tokio::test]
    async fn search_term_is_sanitized_before_querying() {
        let lake = InMemoryLake::new();
        lake.insert_value(serde_json::json!({
            "_id": "review-a", "_type": "review", "title": "Gato Audio"
        }));
        let store = store_with(lake);
        store.update_state(|s| s.search_value = "gato\"]{ ".into());
        store.load_page().await.unwrap();
        assert_eq!(store.snapshot().ids, vec!["review-a".to_string()]);
    }
}
