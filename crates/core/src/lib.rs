//! Core document model shared by the admin client and the migration tools.
//!
//! Everything here is store-agnostic: ID conventions, the raw document
//! shape, draft/published reconciliation, the mutation protocol, and the
//! Portable Text block model produced by the legacy-content parser.

pub mod document;
pub mod events;
pub mod mutation;
pub mod portable;

pub use document::id::DocumentIdKind;
pub use document::model::SanityDocument;
pub use document::reconcile::{reconcile, DocumentStatus, LogicalDocument, PageOrder};
