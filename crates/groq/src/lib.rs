//! GROQ query construction.
//!
//! Queries sent to the store are always assembled from typed expressions
//! and bound parameters; free-text search input passes through
//! [`sanitize::sanitize_groq_input`] before it may appear inside a
//! `match` pattern. Nothing in this crate talks to the network.

pub mod expr;
pub mod sanitize;

pub use expr::{BuiltQuery, Direction, FilterExpr, Ordering, Query};
pub use sanitize::sanitize_groq_input;
