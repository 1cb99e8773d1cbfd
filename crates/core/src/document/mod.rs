pub mod id;
pub mod model;
pub mod reconcile;
pub mod validate;
