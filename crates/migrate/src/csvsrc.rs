//! CSV export contracts: reviews, review authors, and brand content
//! blocks. Each file has a fixed header; rows that fail to deserialize
//! are skipped and counted rather than aborting the run.

use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use audiofast_core::document::validate::validate_document;
use audiofast_core::portable::ContentBlock;

use crate::error::MigrateError;

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRow {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "URLSegment", default)]
    pub url_segment: String,
    #[serde(rename = "Content", default)]
    pub content_html: String,
    /// "text", "pdf" or "external".
    #[serde(rename = "ReviewType", default)]
    pub review_type: String,
    #[serde(rename = "PDFFilename", default)]
    pub pdf_filename: Option<String>,
    #[serde(rename = "ExternalURL", default)]
    pub external_url: Option<String>,
    #[serde(rename = "AuthorID", default)]
    pub author_id: Option<u64>,
    #[serde(rename = "ProducerID", default)]
    pub producer_id: Option<u64>,
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorRow {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandBlockRow {
    #[serde(rename = "ProducerID")]
    pub producer_id: u64,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Content", default)]
    pub content_html: String,
    #[serde(rename = "SortOrder", default)]
    pub sort_order: Option<u32>,
}

#[derive(Debug)]
pub struct CsvOutcome<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<CsvOutcome<T>, MigrateError> {
    let file = std::fs::File::open(path).map_err(|e| {
        MigrateError::MissingInput(format!("cannot open {}: {e}", path.display()))
    })?;
    read_csv_from(file)
}

pub fn read_csv_from<T: DeserializeOwned, R: Read>(reader: R) -> Result<CsvOutcome<T>, MigrateError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut rows = Vec::new();
    let mut skipped = 0;
    for (line, result) in csv_reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                tracing::warn!(line = line + 2, error = %e, "skipping malformed CSV row");
            }
        }
    }
    Ok(CsvOutcome { rows, skipped })
}

/// Build the review document for one CSV row, or `None` when the row
/// cannot yield a complete document (which the caller counts as a skip).
///
/// A "pdf" review without a resolvable PDF asset is skipped outright:
/// a review document must never reference a file that does not exist.
pub fn transform_review(
    row: &ReviewRow,
    author_name: Option<&str>,
    content: &[ContentBlock],
    pdf_asset_id: Option<&str>,
) -> Option<Value> {
    let kind = row.review_type.trim().to_ascii_lowercase();
    let slug = if row.url_segment.is_empty() {
        slugify(&row.title)
    } else {
        row.url_segment.clone()
    };

    let mut doc = json!({
        "_id": format!("review-{}", row.id),
        "_type": "review",
        "title": row.title,
        "slug": { "_type": "slug", "current": slug },
        "legacyId": row.id,
        "reviewType": if kind.is_empty() { "text".to_string() } else { kind.clone() },
    });
    let fields = doc.as_object_mut()?;

    match kind.as_str() {
        "pdf" => {
            let asset_id = pdf_asset_id?;
            fields.insert(
                "pdfFile".into(),
                json!({ "_type": "file", "asset": { "_type": "reference", "_ref": asset_id } }),
            );
        }
        "external" => {
            let url = row.external_url.as_deref().filter(|u| !u.trim().is_empty())?;
            fields.insert("externalUrl".into(), json!(url));
        }
        _ => {
            fields.insert("content".into(), serde_json::to_value(content).ok()?);
        }
    }

    if let Some(name) = author_name {
        fields.insert("authorName".into(), json!(name));
    }
    if let Some(date) = row.date.as_deref().filter(|d| !d.is_empty()) {
        fields.insert("publishedAt".into(), json!(date));
    }
    if let Some(producer_id) = row.producer_id {
        fields.insert(
            "brand".into(),
            json!({ "_type": "reference", "_ref": format!("brand-{producer_id}") }),
        );
    }

    validate_document(&doc).ok()?;
    Some(doc)
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for ch in title.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            // Fold the Polish diacritics the legacy titles actually use.
            let folded = match ch {
                'ą' => 'a',
                'ć' => 'c',
                'ę' => 'e',
                'ł' => 'l',
                'ń' => 'n',
                'ó' => 'o',
                'ś' => 's',
                'ź' | 'ż' => 'z',
                other => other,
            };
            slug.push(folded);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVIEWS_CSV: &str = "\
ID,Title,URLSegment,Content,ReviewType,PDFFilename,ExternalURL,AuthorID,ProducerID,Date
1,Gato Audio DIA-250,gato-dia-250,<p>ok</p>,text,,,3,7,2019-05-01
2,Pylon Diamond,pylon-diamond,,pdf,,,3,8,2019-06-01
";

    fn rows() -> Vec<ReviewRow> {
        read_csv_from(REVIEWS_CSV.as_bytes()).unwrap().rows
    }

    #[test]
    fn parses_review_rows() {
        let rows = rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].review_type, "text");
        assert_eq!(rows[0].producer_id, Some(7));
        // csv maps empty fields to None for Option columns
        assert_eq!(rows[1].pdf_filename, None);
    }

    #[test]
    fn pdf_review_without_asset_is_skipped() {
        let rows = rows();
        assert!(transform_review(&rows[1], Some("Jan"), &[], None).is_none());
    }

    #[test]
    fn pdf_review_with_asset_references_it() {
        let rows = rows();
        let doc = transform_review(&rows[1], None, &[], Some("file-abc-pdf")).unwrap();
        assert_eq!(doc["pdfFile"]["asset"]["_ref"], "file-abc-pdf");
        assert!(doc.get("content").is_none());
    }

    #[test]
    fn text_review_carries_content_and_brand_reference() {
        let rows = rows();
        let doc = transform_review(&rows[0], Some("Jan Kowalski"), &[], None).unwrap();
        assert_eq!(doc["_id"], "review-1");
        assert_eq!(doc["brand"]["_ref"], "brand-7");
        assert_eq!(doc["authorName"], "Jan Kowalski");
        assert_eq!(doc["publishedAt"], "2019-05-01");
    }

    #[test]
    fn external_review_requires_url() {
        let mut row = rows()[0].clone();
        row.review_type = "external".into();
        row.external_url = None;
        assert!(transform_review(&row, None, &[], None).is_none());

        row.external_url = Some("https://hifi.example/review".into());
        let doc = transform_review(&row, None, &[], None).unwrap();
        assert_eq!(doc["externalUrl"], "https://hifi.example/review");
    }

    #[test]
    fn malformed_rows_are_counted_not_fatal() {
        let csv = "ID,Title\nnot-a-number,X\n2,Ok\n";
        let outcome: CsvOutcome<ReviewRow> = read_csv_from(csv.as_bytes()).unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn slugify_folds_diacritics_and_separators() {
        assert_eq!(slugify("Złoty Środek — test!"), "zloty-srodek-test");
    }
}
