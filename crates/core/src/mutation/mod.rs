pub mod types;

pub use types::{
    DeleteTarget, Mutation, MutationResponse, MutationResult, PatchMutation, Transaction,
};
