//! Stale-link detection and repair over arbitrary document trees.
//!
//! Three URL-bearing shapes exist in the dataset, dispatched as an
//! explicit tagged union so a new shape cannot be half-handled:
//! `{_type: "link", href}` mark definitions inside rich text,
//! `{type: "external", external}` navigation targets, and the direct
//! `externalUrl` string field on review documents. Scanning is
//! read-only; patching mutates a deep copy and emits a minimal
//! top-level `set` patch per document.
//!
//! `serde_json::Value` trees cannot alias, so the cycle guard reduces
//! to a recursion-depth cap.

use serde_json::{Map, Value};

use crate::redirects::RedirectMap;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSite {
    /// `{type: "external", external: <url>}`
    ExternalLink,
    /// `{_type: "link", href: <url>}` rich-text mark definition
    LinkMark,
    /// The `externalUrl` string on review documents
    DirectField,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub doc_id: String,
    /// Dot path of the rewritten value within the document.
    pub path: String,
    pub site: UrlSite,
    pub from: String,
    pub to: String,
}

/// A minimal patch for one document: only the top-level fields that
/// contain at least one rewritten URL.
#[derive(Debug, Clone)]
pub struct PatchPlan {
    pub doc_id: String,
    pub set: Map<String, Value>,
    pub findings: Vec<Finding>,
}

/// Read-only scan: report every stale URL without touching anything.
pub fn scan_document(doc: &Value, redirects: &RedirectMap) -> Vec<Finding> {
    let mut copy = doc.clone();
    rewrite_document(&mut copy, redirects)
}

/// Compute the patch for one document, or `None` when it has no stale
/// links. The input value is never modified.
pub fn plan_patch(doc: &Value, redirects: &RedirectMap) -> Option<PatchPlan> {
    let doc_id = doc.get("_id")?.as_str()?.to_string();
    let mut patched = doc.clone();
    let findings = rewrite_document(&mut patched, redirects);
    if findings.is_empty() {
        return None;
    }

    // The mutation only ships the top-level fields that changed,
    // derived from the first segment of each finding's path.
    let mut set = Map::new();
    for finding in &findings {
        let field = finding.path.split('.').next().unwrap_or_default();
        if field.is_empty() || field.starts_with('_') {
            continue;
        }
        if let Some(value) = patched.get(field) {
            set.insert(field.to_string(), value.clone());
        }
    }
    Some(PatchPlan {
        doc_id,
        set,
        findings,
    })
}

/// Walk a document, rewriting stale URLs in place and returning one
/// finding per replacement.
fn rewrite_document(doc: &mut Value, redirects: &RedirectMap) -> Vec<Finding> {
    let doc_id = doc
        .get("_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let doc_type = doc
        .get("_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut findings = Vec::new();

    // The one hardcoded direct string field: review.externalUrl.
    if doc_type == "review" {
        if let Some(Value::String(url)) = doc.get_mut("externalUrl") {
            if let Some(to) = redirects.lookup(url) {
                findings.push(Finding {
                    doc_id: doc_id.clone(),
                    path: "externalUrl".into(),
                    site: UrlSite::DirectField,
                    from: std::mem::replace(url, to.to_string()),
                    to: to.to_string(),
                });
            }
        }
    }

    walk(doc, redirects, &doc_id, &mut Vec::new(), 0, &mut findings);
    findings
}

fn walk(
    value: &mut Value,
    redirects: &RedirectMap,
    doc_id: &str,
    path: &mut Vec<String>,
    depth: usize,
    findings: &mut Vec<Finding>,
) {
    if depth > MAX_DEPTH {
        tracing::warn!(doc_id, depth, "document tree deeper than guard; subtree skipped");
        return;
    }

    match value {
        Value::Object(map) => {
            rewrite_shape(map, redirects, doc_id, path, findings);
            for (key, child) in map.iter_mut() {
                path.push(key.clone());
                walk(child, redirects, doc_id, path, depth + 1, findings);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter_mut().enumerate() {
                path.push(index.to_string());
                walk(child, redirects, doc_id, path, depth + 1, findings);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Exhaustive dispatch over the recognized URL-bearing object shapes.
fn rewrite_shape(
    map: &mut Map<String, Value>,
    redirects: &RedirectMap,
    doc_id: &str,
    path: &[String],
    findings: &mut Vec<Finding>,
) {
    let site = if map.get("_type").and_then(Value::as_str) == Some("link") {
        Some((UrlSite::LinkMark, "href"))
    } else if map.get("type").and_then(Value::as_str) == Some("external") {
        Some((UrlSite::ExternalLink, "external"))
    } else {
        None
    };
    let Some((site, field)) = site else {
        return;
    };

    // Variants stay exhaustive: a new UrlSite must route a field here.
    match site {
        UrlSite::LinkMark | UrlSite::ExternalLink => {}
        UrlSite::DirectField => unreachable!("direct fields are handled at document level"),
    }

    if let Some(Value::String(url)) = map.get_mut(field) {
        if let Some(to) = redirects.lookup(url) {
            let mut full_path = path.to_vec();
            full_path.push(field.to_string());
            findings.push(Finding {
                doc_id: doc_id.to_string(),
                path: full_path.join("."),
                site,
                from: std::mem::replace(url, to.to_string()),
                to: to.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redirects::RedirectEntry;
    use serde_json::json;

    fn redirects() -> RedirectMap {
        RedirectMap::new([RedirectEntry {
            source: "/pl/stare/".into(),
            destination: "/pl/nowe/".into(),
        }])
    }

    fn review_doc() -> Value {
        json!({
            "_id": "review-1",
            "_type": "review",
            "externalUrl": "https://audiofast.pl/pl/stare",
            "content": [
                {
                    "_type": "block",
                    "markDefs": [
                        { "_type": "link", "_key": "k1", "href": "/pl/stare/" },
                        { "_type": "link", "_key": "k2", "href": "/pl/ok/" }
                    ]
                }
            ],
            "cta": { "type": "external", "external": "PL/STARE" },
            "title": "untouched"
        })
    }

    #[test]
    fn scan_reports_all_three_shapes_without_writing() {
        let doc = review_doc();
        let findings = scan_document(&doc, &redirects());
        let sites: Vec<UrlSite> = findings.iter().map(|f| f.site).collect();
        assert_eq!(findings.len(), 3);
        assert!(sites.contains(&UrlSite::DirectField));
        assert!(sites.contains(&UrlSite::LinkMark));
        assert!(sites.contains(&UrlSite::ExternalLink));
        // Source document untouched.
        assert_eq!(doc["externalUrl"], "https://audiofast.pl/pl/stare");
    }

    #[test]
    fn plan_patch_ships_only_changed_top_level_fields() {
        let doc = review_doc();
        let plan = plan_patch(&doc, &redirects()).unwrap();
        assert_eq!(plan.doc_id, "review-1");

        let mut fields: Vec<&str> = plan.set.keys().map(String::as_str).collect();
        fields.sort();
        assert_eq!(fields, vec!["content", "cta", "externalUrl"]);
        assert!(plan.set.get("title").is_none());

        assert_eq!(plan.set["externalUrl"], "/pl/nowe/");
        assert_eq!(plan.set["cta"]["external"], "/pl/nowe/");
        assert_eq!(
            plan.set["content"][0]["markDefs"][0]["href"],
            "/pl/nowe/"
        );
        // The healthy link is carried unchanged inside its field.
        assert_eq!(plan.set["content"][0]["markDefs"][1]["href"], "/pl/ok/");
    }

    #[test]
    fn document_without_stale_links_produces_no_plan() {
        let doc = json!({ "_id": "brand-1", "_type": "brand", "title": "x" });
        assert!(plan_patch(&doc, &redirects()).is_none());
    }

    #[test]
    fn depth_guard_survives_pathological_nesting() {
        let mut doc = json!({ "_id": "page-1", "_type": "page" });
        let mut cursor = &mut doc;
        for _ in 0..200 {
            cursor["child"] = json!({});
            cursor = &mut cursor["child"];
        }
        assert!(scan_document(&doc, &redirects()).is_empty());
    }
}
