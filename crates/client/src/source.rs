//! Trait seam between the pagination/bulk logic and the store.
//!
//! `SanityClient` is the production implementation; tests drive the same
//! code paths against an in-memory document set.

use async_trait::async_trait;
use serde::Deserialize;

use audiofast_core::mutation::{MutationResponse, Transaction};
use audiofast_core::SanityDocument;
use audiofast_groq::{FilterExpr, Ordering, Query};

use crate::error::ClientError;
use crate::http::SanityClient;

/// Read access: raw ID windows, counts, and full-document fetches.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Raw document IDs (draft-prefixed and not) matching `filter`, in
    /// query order, optionally restricted to a raw-row range.
    async fn ids(
        &self,
        filter: &FilterExpr,
        order: &[Ordering],
        range: Option<(usize, usize)>,
    ) -> Result<Vec<String>, ClientError>;

    /// Raw-row count matching `filter`.
    async fn count(&self, filter: &FilterExpr) -> Result<usize, ClientError>;

    /// Fetch full documents for exactly the given raw IDs. IDs with no
    /// backing record are silently absent from the result.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<SanityDocument>, ClientError>;
}

/// Write access on top of [`DocumentSource`].
#[async_trait]
pub trait DocumentStore: DocumentSource {
    /// Commit a transaction atomically: all mutations apply or none do.
    async fn commit(&self, tx: Transaction) -> Result<MutationResponse, ClientError>;
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(rename = "_id")]
    id: String,
}

#[async_trait]
impl DocumentSource for SanityClient {
    async fn ids(
        &self,
        filter: &FilterExpr,
        order: &[Ordering],
        range: Option<(usize, usize)>,
    ) -> Result<Vec<String>, ClientError> {
        let mut query = Query::new().filter(filter.clone()).project("_id");
        for ordering in order {
            query = query.order(ordering.clone());
        }
        if let Some((start, end)) = range {
            query = query.slice(start, end);
        }
        let rows: Vec<IdRow> = self.query_built(query.build()).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn count(&self, filter: &FilterExpr) -> Result<usize, ClientError> {
        let built = Query::new().filter(filter.clone()).count().build();
        self.query_built(built).await
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<SanityDocument>, ClientError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let built = Query::new().filter(FilterExpr::id_in(ids)).build();
        self.query_built(built).await
    }
}

#[async_trait]
impl DocumentStore for SanityClient {
    async fn commit(&self, tx: Transaction) -> Result<MutationResponse, ClientError> {
        self.mutate(tx).await
    }
}
