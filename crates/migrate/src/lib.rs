//! One-off legacy-content migration pipeline: SQL-dump and CSV
//! extraction, HTML-to-Portable-Text conversion, cached asset uploads,
//! and stale-link repair, shared by the `migrate-*` and `fix-links`
//! binaries.

pub mod assets;
pub mod cli;
pub mod context;
pub mod csvsrc;
pub mod error;
pub mod html;
pub mod links;
pub mod redirects;
pub mod report;
pub mod sqldump;
pub mod tx;

pub use context::MigrationContext;
pub use error::MigrateError;
