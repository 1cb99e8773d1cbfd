//! HTTP client layer over the Sanity API, plus the machinery behind the
//! bulk-actions admin table: cursor-batched pagination, draft-aware page
//! state, live-query subscriptions, and transactional bulk operations.

pub mod bulk;
pub mod config;
pub mod error;
pub mod http;
pub mod paginator;
pub mod prefs;
pub mod source;
pub mod store;
pub mod subscriber;

pub mod test_fixtures;

pub use bulk::{BulkActions, BulkOutcome};
pub use config::SanityConfig;
pub use error::ClientError;
pub use http::SanityClient;
pub use paginator::EfficientPaginator;
pub use source::{DocumentSource, DocumentStore};
pub use store::{LoadingTag, PageSnapshot, PageStore};
