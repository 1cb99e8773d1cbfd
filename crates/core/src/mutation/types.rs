/// Mutation types matching Sanity's HTTP mutation protocol.
///
/// A transaction is an ordered list of mutations committed atomically by
/// the store: either every mutation applies or none does. Serialization
/// here must match the wire payload byte-for-byte in shape, e.g.
/// `{"createOrReplace": {...doc}}` and `{"delete": {"id": "..."}}`.
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutation {
    Create(Value),
    CreateOrReplace(Value),
    CreateIfNotExists(Value),
    Delete(DeleteTarget),
    Patch(PatchMutation),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeleteTarget {
    ById {
        id: String,
    },
    ByQuery {
        query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        params: Option<Value>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchMutation {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_revision_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_if_missing: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unset: Option<Vec<String>>,
}

/// Ordered mutation list committed as one atomic unit.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    mutations: Vec<Mutation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, document: Value) -> Self {
        self.mutations.push(Mutation::Create(document));
        self
    }

    pub fn create_or_replace(mut self, document: Value) -> Self {
        self.mutations.push(Mutation::CreateOrReplace(document));
        self
    }

    pub fn create_if_not_exists(mut self, document: Value) -> Self {
        self.mutations.push(Mutation::CreateIfNotExists(document));
        self
    }

    pub fn delete(mut self, id: impl Into<String>) -> Self {
        self.mutations
            .push(Mutation::Delete(DeleteTarget::ById { id: id.into() }));
        self
    }

    pub fn patch_set(mut self, id: impl Into<String>, set: Value) -> Self {
        self.mutations.push(Mutation::Patch(PatchMutation {
            id: id.into(),
            set: Some(set),
            ..Default::default()
        }));
        self
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }
}

/// Result of a committed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    pub transaction_id: String,
    #[serde(default)]
    pub results: Vec<MutationResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResult {
    pub id: String,
    #[serde(default)]
    pub operation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_or_replace_serializes_to_wire_shape() {
        let m = Mutation::CreateOrReplace(json!({ "_id": "a", "_type": "brand" }));
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({ "createOrReplace": { "_id": "a", "_type": "brand" } })
        );
    }

    #[test]
    fn delete_by_id_serializes_to_wire_shape() {
        let m = Mutation::Delete(DeleteTarget::ById { id: "a".into() });
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({ "delete": { "id": "a" } })
        );
    }

    #[test]
    fn delete_by_query_omits_missing_params() {
        let m = Mutation::Delete(DeleteTarget::ByQuery {
            query: "*[_type == $t]".into(),
            params: None,
        });
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({ "delete": { "query": "*[_type == $t]" } })
        );
    }

    #[test]
    fn patch_set_serializes_operations_inline() {
        let m = Mutation::Patch(PatchMutation {
            id: "a".into(),
            set: Some(json!({ "title": "x" })),
            unset: Some(vec!["old".into()]),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({ "patch": { "id": "a", "set": { "title": "x" }, "unset": ["old"] } })
        );
    }

    #[test]
    fn transaction_builder_keeps_order() {
        let tx = Transaction::new()
            .create_if_not_exists(json!({ "_id": "drafts.a", "_type": "brand" }))
            .delete("a");
        let shapes: Vec<String> = tx
            .mutations()
            .iter()
            .map(|m| match m {
                Mutation::CreateIfNotExists(_) => "createIfNotExists".into(),
                Mutation::Delete(_) => "delete".into(),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(shapes, vec!["createIfNotExists", "delete"]);
    }
}
