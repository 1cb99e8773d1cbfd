//! Redirect table and URL canonicalization.
//!
//! A candidate URL matches a redirect only after being normalized to a
//! canonical local path: known hosts and protocol stripped, foreign and
//! non-HTTP URLs rejected, case folded, exactly one leading and one
//! trailing slash. Sources are indexed both with and without the
//! trailing slash so sloppy legacy links still match.

use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use audiofast_client::SanityClient;

use crate::error::MigrateError;

/// Host spellings that mean "this site".
const KNOWN_HOSTS: &[&str] = &["audiofast.pl", "www.audiofast.pl"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedirectEntry {
    pub source: String,
    pub destination: String,
}

/// Normalize a candidate URL to its canonical local-path form, or
/// `None` when the URL cannot refer to a local page (foreign host,
/// `mailto:`/`tel:`, pure anchor, non-HTTP scheme).
pub fn normalize_to_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("tel:") || trimmed.starts_with('#') {
        return None;
    }

    let path = if trimmed.contains("://") || trimmed.starts_with("//") {
        let absolute = if let Some(rest) = trimmed.strip_prefix("//") {
            format!("https://{rest}")
        } else {
            trimmed.to_string()
        };
        let url = Url::parse(&absolute).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();
        if !KNOWN_HOSTS.contains(&host.as_str()) {
            return None;
        }
        url.path().to_string()
    } else {
        // Relative link: drop query and fragment, keep the path.
        trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string()
    };

    let core = path.trim_matches('/').to_lowercase();
    if core.is_empty() {
        Some("/".to_string())
    } else {
        Some(format!("/{core}/"))
    }
}

#[derive(Debug, Default)]
pub struct RedirectMap {
    index: HashMap<String, String>,
    entries: usize,
}

impl RedirectMap {
    pub fn new(entries: impl IntoIterator<Item = RedirectEntry>) -> Self {
        let mut map = Self::default();
        for entry in entries {
            let Some(canonical) = normalize_to_path(&entry.source) else {
                tracing::warn!(source = %entry.source, "redirect source is not a local path; ignored");
                continue;
            };
            let destination = entry.destination.trim().to_string();
            map.index
                .insert(canonical.trim_end_matches('/').to_string(), destination.clone());
            map.index.insert(canonical, destination);
            map.entries += 1;
        }
        map
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Destination path for a stale URL, if its canonical form appears
    /// in the table.
    pub fn lookup(&self, url: &str) -> Option<&str> {
        let canonical = normalize_to_path(url)?;
        self.index
            .get(&canonical)
            .or_else(|| self.index.get(canonical.trim_end_matches('/')))
            .map(String::as_str)
    }
}

/// Load the singleton redirects document. An absent document yields an
/// empty map (nothing to do) rather than an error.
pub async fn load_redirects(client: &SanityClient) -> Result<RedirectMap, MigrateError> {
    let entries: Option<Vec<RedirectEntry>> = client
        .query(
            r#"*[_type == "redirects"][0].redirects[]{source, destination}"#,
            &serde_json::Map::new(),
        )
        .await?;
    let entries = entries.unwrap_or_default();
    if entries.is_empty() {
        tracing::warn!("no redirects document found; redirect table is empty");
    }
    Ok(RedirectMap::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_case_and_slash_variants_normalize_identically() {
        let a = normalize_to_path("https://audiofast.pl/PL/O-NAS");
        let b = normalize_to_path("/pl/o-nas/");
        let c = normalize_to_path("pl/o-nas");
        assert_eq!(a.as_deref(), Some("/pl/o-nas/"));
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn foreign_and_non_http_urls_are_rejected() {
        assert_eq!(normalize_to_path("https://example.com/pl/o-nas"), None);
        assert_eq!(normalize_to_path("mailto:info@audiofast.pl"), None);
        assert_eq!(normalize_to_path("tel:+48123456789"), None);
        assert_eq!(normalize_to_path("#opinie"), None);
        assert_eq!(normalize_to_path("ftp://audiofast.pl/x"), None);
    }

    #[test]
    fn query_and_fragment_are_dropped_from_relative_links() {
        assert_eq!(
            normalize_to_path("/pl/produkty?page=2#top").as_deref(),
            Some("/pl/produkty/")
        );
    }

    #[test]
    fn lookup_matches_with_and_without_trailing_slash() {
        let map = RedirectMap::new([RedirectEntry {
            source: "/pl/stara-strona/".into(),
            destination: "/pl/nowa-strona/".into(),
        }]);
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.lookup("https://www.audiofast.pl/pl/STARA-STRONA"),
            Some("/pl/nowa-strona/")
        );
        assert_eq!(map.lookup("pl/stara-strona"), Some("/pl/nowa-strona/"));
        assert_eq!(map.lookup("/pl/inna/"), None);
    }
}
