//! Record extraction from raw SQL dump text.
//!
//! No SQL grammar here. `INSERT INTO … VALUES (…)` statements are
//! located by pattern, tuple lists are split with a quote-aware scanner,
//! and a column-position mapping pulls out only the fields the migration
//! needs. Each table has a primary strategy (column list from the INSERT
//! header, falling back to fixed positions) and a looser line-scan
//! fallback for the dump variants that put one tuple per line. A tuple
//! no strategy can parse is skipped and logged, never fatal.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerPageRecord {
    pub id: u64,
    pub content_html: String,
    pub logo_file_id: Option<u64>,
    pub banner_file_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteTreeRecord {
    pub id: u64,
    pub class_name: String,
    pub title: String,
    pub url_segment: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: u64,
    pub name: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxRecord {
    pub id: u64,
    pub producer_page_id: u64,
    pub title: String,
    pub content_html: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractionOutcome<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T> ExtractionOutcome<T> {
    fn log_discrepancy(&self, table: &str) {
        if self.skipped > 0 {
            tracing::warn!(
                table,
                parsed = self.records.len(),
                skipped = self.skipped,
                "some rows could not be parsed; review the dump manually"
            );
        }
    }
}

pub fn extract_producer_pages(dump: &str) -> ExtractionOutcome<ProducerPageRecord> {
    let outcome = extract(dump, "ProducerPage", |row| {
        Some(ProducerPageRecord {
            id: row.int("ID", 0)?,
            content_html: row.text("Content", 1).unwrap_or_default(),
            logo_file_id: row.int("LogoID", 2).filter(|id| *id != 0),
            banner_file_id: row.int("BannerID", 3).filter(|id| *id != 0),
        })
    });
    outcome.log_discrepancy("ProducerPage");
    outcome
}

pub fn extract_site_tree(dump: &str) -> ExtractionOutcome<SiteTreeRecord> {
    let outcome = extract(dump, "SiteTree", |row| {
        Some(SiteTreeRecord {
            id: row.int("ID", 0)?,
            class_name: row.text("ClassName", 1)?,
            title: row.text("Title", 2)?,
            url_segment: row.text("URLSegment", 3).unwrap_or_default(),
        })
    });
    outcome.log_discrepancy("SiteTree");
    outcome
}

pub fn extract_files(dump: &str) -> ExtractionOutcome<FileRecord> {
    let outcome = extract(dump, "File", |row| {
        Some(FileRecord {
            id: row.int("ID", 0)?,
            name: row.text("Name", 1).unwrap_or_default(),
            filename: row.text("Filename", 2)?,
        })
    });
    outcome.log_discrepancy("File");
    outcome
}

pub fn extract_boxes(dump: &str) -> ExtractionOutcome<BoxRecord> {
    let outcome = extract(dump, "Box", |row| {
        Some(BoxRecord {
            id: row.int("ID", 0)?,
            producer_page_id: row.int("ProducerPageID", 1)?,
            title: row.text("Title", 2).unwrap_or_default(),
            content_html: row.text("Content", 3).unwrap_or_default(),
            link: row.text("Link", 4).filter(|l| !l.is_empty()),
        })
    });
    outcome.log_discrepancy("Box");
    outcome
}

// --- shared machinery ----------------------------------------------------

/// One tuple's fields plus the optional column-name map from the INSERT
/// header.
struct Row<'a> {
    fields: Vec<Option<String>>,
    columns: Option<&'a HashMap<String, usize>>,
}

impl Row<'_> {
    fn index(&self, name: &str, fallback: usize) -> usize {
        self.columns
            .and_then(|map| map.get(&name.to_ascii_lowercase()).copied())
            .unwrap_or(fallback)
    }

    fn text(&self, name: &str, fallback: usize) -> Option<String> {
        self.fields.get(self.index(name, fallback))?.clone()
    }

    fn int(&self, name: &str, fallback: usize) -> Option<u64> {
        self.text(name, fallback)?.parse().ok()
    }
}

fn extract<T>(
    dump: &str,
    table: &str,
    parse: impl Fn(&Row<'_>) -> Option<T>,
) -> ExtractionOutcome<T> {
    let mut records = Vec::new();
    let mut skipped = 0;

    let statements = insert_statements(dump, table);
    let tuples: Vec<(Option<HashMap<String, usize>>, Vec<String>)> = if statements.is_empty() {
        // Looser fallback: one tuple per line after the INSERT header.
        vec![(None, line_scan_tuples(dump, table))]
    } else {
        statements
            .into_iter()
            .map(|(columns, body)| (columns, split_tuples(body)))
            .collect()
    };

    for (columns, statement_tuples) in tuples {
        for tuple in statement_tuples {
            let row = Row {
                fields: split_fields(&tuple),
                columns: columns.as_ref(),
            };
            match parse(&row) {
                Some(record) => records.push(record),
                None => {
                    skipped += 1;
                    tracing::warn!(table, tuple = %truncate(&tuple), "skipping unparsable row");
                }
            }
        }
    }

    ExtractionOutcome { records, skipped }
}

fn truncate(s: &str) -> &str {
    let mut end = s.len().min(120);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Locate every `INSERT INTO <table> … VALUES` statement and return its
/// optional column list plus the raw tuple-list text (up to the
/// statement-terminating semicolon outside any string literal).
fn insert_statements<'a>(dump: &'a str, table: &str) -> Vec<(Option<HashMap<String, usize>>, &'a str)> {
    static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?i)INSERT\s+INTO\s+[`"]?([A-Za-z0-9_]+)[`"]?\s*(\(([^)]*)\))?\s*VALUES\s*"#)
            .unwrap()
    });

    let mut statements = Vec::new();
    for caps in HEADER_RE.captures_iter(dump) {
        if !caps[1].eq_ignore_ascii_case(table) {
            continue;
        }
        let columns = caps.get(3).map(|list| {
            list.as_str()
                .split(',')
                .enumerate()
                .map(|(idx, name)| {
                    let name = name.trim().trim_matches('`').trim_matches('"');
                    (name.to_ascii_lowercase(), idx)
                })
                .collect()
        });
        let body_start = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let body = &dump[body_start..];
        let end = statement_end(body);
        statements.push((columns, &body[..end]));
    }
    statements
}

/// Index of the terminating semicolon (or end of input), respecting
/// single-quoted string literals with backslash escapes.
fn statement_end(body: &str) -> usize {
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '\'' {
                in_string = false;
            }
        } else if ch == '\'' {
            in_string = true;
        } else if ch == ';' {
            return idx;
        }
    }
    body.len()
}

/// Split a `(a,b),(c,d)` tuple list on record boundaries, respecting
/// quotes and nested parentheses.
fn split_tuples(body: &str) -> Vec<String> {
    let mut tuples = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0usize;

    for (idx, ch) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '\'' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '\'' => in_string = true,
            '(' => {
                depth += 1;
                if depth == 1 {
                    start = idx + 1;
                }
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    tuples.push(body[start..idx].to_string());
                }
            }
            _ => {}
        }
    }
    tuples
}

/// Quote-respecting split of one tuple into its fields. `NULL` becomes
/// `None`; quoted values are unescaped.
fn split_fields(tuple: &str) -> Vec<Option<String>> {
    let mut fields = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0usize;

    for (idx, ch) in tuple.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '\'' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '\'' => in_string = true,
            ',' => {
                fields.push(unquote(&tuple[start..idx]));
                start = idx + 1;
            }
            _ => {}
        }
    }
    fields.push(unquote(&tuple[start..]));
    fields
}

fn unquote(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("NULL") {
        return None;
    }
    let Some(inner) = raw
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    else {
        return Some(raw.to_string());
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            },
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                out.push('\'');
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Fallback for dumps that place one tuple per line below the INSERT
/// header, without a parsable single-statement body.
fn line_scan_tuples(dump: &str, table: &str) -> Vec<String> {
    static TUPLE_LINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*\((.*)\)\s*[,;]?\s*$").unwrap());

    let mut tuples = Vec::new();
    let mut in_section = false;
    let header = format!("insert into `{}`", table.to_ascii_lowercase());
    let header_bare = format!("insert into {}", table.to_ascii_lowercase());

    for line in dump.lines() {
        let lower = line.to_ascii_lowercase();
        if lower.contains(&header) || lower.contains(&header_bare) {
            in_section = true;
            continue;
        }
        if !in_section {
            continue;
        }
        match TUPLE_LINE_RE.captures(line) {
            Some(caps) => {
                tuples.push(caps[1].to_string());
                if line.trim_end().ends_with(';') {
                    in_section = false;
                }
            }
            None => in_section = false,
        }
    }
    tuples
}
