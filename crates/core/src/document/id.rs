/// Document ID parsing utilities.
///
/// Sanity document IDs follow conventions:
/// - Published: `{id}`
/// - Draft: `drafts.{id}`
///
/// The dataset this tooling targets never contains release-version IDs,
/// so only the draft prefix is recognized.

pub const DRAFT_PREFIX: &str = "drafts.";

/// Strip the draft prefix, if any, returning the base (published) ID.
pub fn base_id(id: &str) -> &str {
    id.strip_prefix(DRAFT_PREFIX).unwrap_or(id)
}

/// Prepend the draft prefix to a base ID. IDs that already carry the
/// prefix are returned unchanged.
pub fn draft_id(id: &str) -> String {
    if id.starts_with(DRAFT_PREFIX) {
        id.to_string()
    } else {
        format!("{DRAFT_PREFIX}{id}")
    }
}

pub fn is_draft_id(id: &str) -> bool {
    id.starts_with(DRAFT_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentIdKind {
    Published(String),
    Draft(String),
}

impl DocumentIdKind {
    /// Parse a Sanity document ID into its kind.
    pub fn parse(id: &str) -> Self {
        match id.strip_prefix(DRAFT_PREFIX) {
            Some(base) => DocumentIdKind::Draft(base.to_string()),
            None => DocumentIdKind::Published(id.to_string()),
        }
    }

    /// Get the base (published) document ID regardless of prefix.
    pub fn base_id(&self) -> &str {
        match self {
            DocumentIdKind::Published(id) => id,
            DocumentIdKind::Draft(id) => id,
        }
    }

    /// Get the full document ID with its prefix.
    pub fn full_id(&self) -> String {
        match self {
            DocumentIdKind::Published(id) => id.clone(),
            DocumentIdKind::Draft(id) => format!("{DRAFT_PREFIX}{id}"),
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, DocumentIdKind::Draft(_))
    }

    pub fn is_published(&self) -> bool {
        matches!(self, DocumentIdKind::Published(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_published_id() {
        let kind = DocumentIdKind::parse("brand-accuphase");
        assert_eq!(
            kind,
            DocumentIdKind::Published("brand-accuphase".to_string())
        );
        assert_eq!(kind.base_id(), "brand-accuphase");
        assert_eq!(kind.full_id(), "brand-accuphase");
        assert!(kind.is_published());
    }

    #[test]
    fn parse_draft_id() {
        let kind = DocumentIdKind::parse("drafts.brand-accuphase");
        assert_eq!(kind, DocumentIdKind::Draft("brand-accuphase".to_string()));
        assert_eq!(kind.base_id(), "brand-accuphase");
        assert_eq!(kind.full_id(), "drafts.brand-accuphase");
        assert!(kind.is_draft());
    }

    #[test]
    fn base_id_strips_only_one_prefix() {
        assert_eq!(base_id("drafts.abc"), "abc");
        assert_eq!(base_id("abc"), "abc");
        // A pathological double prefix strips one layer only.
        assert_eq!(base_id("drafts.drafts.abc"), "drafts.abc");
    }

    #[test]
    fn draft_id_is_idempotent() {
        assert_eq!(draft_id("abc"), "drafts.abc");
        assert_eq!(draft_id("drafts.abc"), "drafts.abc");
    }
}
