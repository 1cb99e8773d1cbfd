//! In-memory document lake for tests, here and in downstream crates.
//! Implements the same source/store traits as the HTTP client, with a
//! minimal filter evaluator and call counters so tests can assert fetch
//! behavior.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use audiofast_core::document::id;
use audiofast_core::mutation::{
    DeleteTarget, Mutation, MutationResponse, MutationResult, Transaction,
};
use audiofast_core::SanityDocument;
use audiofast_groq::{Direction, FilterExpr, Ordering};

use crate::error::ClientError;
use crate::source::{DocumentSource, DocumentStore};

#[derive(Default)]
pub struct InMemoryLake {
    docs: Mutex<BTreeMap<String, SanityDocument>>,
    /// IDs that cannot be deleted because something references them.
    referenced: Mutex<HashSet<String>>,
    /// IDs that poison any transaction touching them.
    poisoned: Mutex<HashSet<String>>,
    fail_ids_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub commit_count: AtomicUsize,
}

impl InMemoryLake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_published(&self, base: &str, doc_type: &str) {
        self.insert_value(json!({ "_id": base, "_type": doc_type }));
    }

    pub fn insert_draft(&self, base: &str, doc_type: &str) {
        self.insert_value(json!({ "_id": id::draft_id(base), "_type": doc_type }));
    }

    pub fn insert_value(&self, value: Value) {
        let doc: SanityDocument = serde_json::from_value(value).unwrap();
        self.docs.lock().unwrap().insert(doc.id.clone(), doc);
    }

    pub fn mark_referenced(&self, doc_id: &str) {
        self.referenced.lock().unwrap().insert(doc_id.to_string());
    }

    /// Any transaction mutating `doc_id` fails as a whole.
    pub fn poison(&self, doc_id: &str) {
        self.poisoned.lock().unwrap().insert(doc_id.to_string());
    }

    pub fn get(&self, doc_id: &str) -> Option<SanityDocument> {
        self.docs.lock().unwrap().get(doc_id).cloned()
    }

    /// The next `n` calls to `ids()` fail with a transport-style error.
    pub fn fail_next_ids_calls(&self, n: usize) {
        self.fail_ids_calls.store(n, AtomicOrdering::SeqCst);
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.docs.lock().unwrap().contains_key(doc_id)
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(AtomicOrdering::SeqCst)
    }

    fn matching(&self, filter: &FilterExpr, order: &[Ordering]) -> Vec<SanityDocument> {
        let docs = self.docs.lock().unwrap();
        let mut rows: Vec<SanityDocument> = docs
            .values()
            .filter(|doc| eval(filter, doc))
            .cloned()
            .collect();

        // Default ordering groups a draft/published pair adjacently,
        // draft first, the way a shared sort key does in practice.
        let key = |doc: &SanityDocument| -> (String, bool) {
            let primary = order
                .first()
                .and_then(|o| {
                    let raw = doc.get_str(&o.field).map(str::to_string);
                    if o.case_insensitive {
                        raw.map(|s| s.to_lowercase())
                    } else {
                        raw
                    }
                })
                .unwrap_or_else(|| doc.base_id().to_string());
            (primary, !doc.is_draft())
        };
        rows.sort_by(|a, b| {
            let ord = key(a).cmp(&key(b));
            match order.first().map(|o| o.direction) {
                Some(Direction::Desc) => ord.reverse(),
                _ => ord,
            }
        });
        rows
    }
}

/// Minimal filter evaluation, just enough semantics for the expressions
/// the client layer builds.
fn eval(expr: &FilterExpr, doc: &SanityDocument) -> bool {
    match expr {
        FilterExpr::Eq { field, value } => field_value(doc, field).as_ref() == Some(value),
        FilterExpr::Match { field, pattern } => {
            let needle = pattern.trim_end_matches('*').to_lowercase();
            field_value(doc, field)
                .and_then(|v| v.as_str().map(str::to_lowercase))
                .is_some_and(|text| text.contains(&needle))
        }
        FilterExpr::In { field, values } => field_value(doc, field)
            .map(|v| values.contains(&v))
            .unwrap_or(false),
        FilterExpr::Defined { field } => field_value(doc, field).is_some(),
        FilterExpr::And(exprs) => exprs.iter().all(|e| eval(e, doc)),
        FilterExpr::Or(exprs) => exprs.iter().any(|e| eval(e, doc)),
        FilterExpr::Not(inner) => !eval(inner, doc),
        FilterExpr::DraftsOnly => doc.is_draft(),
        FilterExpr::NoDrafts => !doc.is_draft(),
    }
}

fn field_value(doc: &SanityDocument, field: &str) -> Option<Value> {
    match field {
        "_id" => Some(Value::String(doc.id.clone())),
        "_type" => Some(Value::String(doc.doc_type.clone())),
        other => doc.content.get(other).cloned(),
    }
}

#[async_trait]
impl DocumentSource for InMemoryLake {
    async fn ids(
        &self,
        filter: &FilterExpr,
        order: &[Ordering],
        range: Option<(usize, usize)>,
    ) -> Result<Vec<String>, ClientError> {
        let pending = self.fail_ids_calls.load(AtomicOrdering::SeqCst);
        if pending > 0 {
            self.fail_ids_calls.store(pending - 1, AtomicOrdering::SeqCst);
            return Err(ClientError::Listen("simulated transport failure".into()));
        }

        let rows = self.matching(filter, order);
        let ids: Vec<String> = rows.into_iter().map(|doc| doc.id).collect();
        Ok(match range {
            Some((start, end)) => ids
                .into_iter()
                .skip(start)
                .take(end.saturating_sub(start))
                .collect(),
            None => ids,
        })
    }

    async fn count(&self, filter: &FilterExpr) -> Result<usize, ClientError> {
        Ok(self.matching(filter, &[]).len())
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<SanityDocument>, ClientError> {
        self.fetch_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let docs = self.docs.lock().unwrap();
        Ok(ids.iter().filter_map(|id| docs.get(id).cloned()).collect())
    }
}

#[async_trait]
impl DocumentStore for InMemoryLake {
    async fn commit(&self, tx: Transaction) -> Result<MutationResponse, ClientError> {
        let mut docs = self.docs.lock().unwrap();
        let referenced = self.referenced.lock().unwrap();
        let poisoned = self.poisoned.lock().unwrap();

        for mutation in tx.mutations() {
            let touched = match mutation {
                Mutation::Create(v) | Mutation::CreateOrReplace(v) | Mutation::CreateIfNotExists(v) => {
                    v.get("_id").and_then(Value::as_str).map(str::to_string)
                }
                Mutation::Delete(DeleteTarget::ById { id }) => Some(id.clone()),
                Mutation::Delete(DeleteTarget::ByQuery { .. }) => None,
                Mutation::Patch(patch) => Some(patch.id.clone()),
            };
            if touched.is_some_and(|id| poisoned.contains(&id)) {
                return Err(ClientError::Api {
                    status: 409,
                    error_type: "mutationError".into(),
                    message: "simulated transaction failure".into(),
                });
            }
        }

        // Stage against a copy so a rejected transaction changes nothing.
        let mut staged = docs.clone();
        let mut results = Vec::new();
        let mut blocked: Vec<String> = Vec::new();

        for mutation in tx.mutations() {
            match mutation {
                Mutation::Create(value) | Mutation::CreateOrReplace(value) => {
                    let doc: SanityDocument =
                        serde_json::from_value(value.clone()).map_err(ClientError::Decode)?;
                    results.push(MutationResult {
                        id: doc.id.clone(),
                        operation: Some("create".into()),
                    });
                    staged.insert(doc.id.clone(), doc);
                }
                Mutation::CreateIfNotExists(value) => {
                    let doc: SanityDocument =
                        serde_json::from_value(value.clone()).map_err(ClientError::Decode)?;
                    staged.entry(doc.id.clone()).or_insert(doc);
                }
                Mutation::Delete(DeleteTarget::ById { id }) => {
                    if referenced.contains(id) {
                        blocked.push(id.clone());
                    }
                    staged.remove(id);
                    results.push(MutationResult {
                        id: id.clone(),
                        operation: Some("delete".into()),
                    });
                }
                Mutation::Delete(DeleteTarget::ByQuery { .. }) => {}
                Mutation::Patch(patch) => {
                    if let (Some(doc), Some(Value::Object(set))) =
                        (staged.get_mut(&patch.id), patch.set.as_ref())
                    {
                        for (k, v) in set {
                            doc.content.insert(k.clone(), v.clone());
                        }
                    }
                }
            }
        }

        if !blocked.is_empty() {
            return Err(ClientError::DocumentsInUse { ids: blocked });
        }

        *docs = staged;
        self.commit_count.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(MutationResponse {
            transaction_id: format!("tx-{}", self.commit_count.load(AtomicOrdering::SeqCst)),
            results,
        })
    }
}
