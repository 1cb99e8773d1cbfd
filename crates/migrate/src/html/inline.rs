//! Inline HTML to rich-text spans. Only bold and italic survive; every
//! other tag is dropped, entities are decoded, and whitespace is trimmed
//! on the first/last span only so interior spacing is preserved exactly.

use std::sync::LazyLock;

use regex::Regex;

use audiofast_core::portable::{Mark, Span};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static TAG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<\s*(/?)\s*([a-zA-Z0-9]+)").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x?[0-9a-fA-F]+);").unwrap());

#[derive(Debug, Clone, PartialEq)]
struct Run {
    text: String,
    bold: bool,
    italic: bool,
}

/// Convert an inline HTML fragment into marked spans.
pub fn inline_spans(html: &str) -> Vec<Span> {
    let mut runs: Vec<Run> = Vec::new();
    let mut bold = 0i32;
    let mut italic = 0i32;
    let mut cursor = 0;

    let mut push_text = |runs: &mut Vec<Run>, text: &str, bold: i32, italic: i32| {
        if text.is_empty() {
            return;
        }
        let bold = bold > 0;
        let italic = italic > 0;
        match runs.last_mut() {
            Some(last) if last.bold == bold && last.italic == italic => last.text.push_str(text),
            _ => runs.push(Run {
                text: text.to_string(),
                bold,
                italic,
            }),
        }
    };

    for tag in TAG_RE.find_iter(html) {
        let text = decode_entities(&html[cursor..tag.start()]);
        push_text(&mut runs, &text, bold, italic);
        cursor = tag.end();

        let Some(caps) = TAG_NAME_RE.captures(tag.as_str()) else {
            continue;
        };
        let closing = !caps[1].is_empty();
        match caps[2].to_ascii_lowercase().as_str() {
            "strong" | "b" => bold += if closing { -1 } else { 1 },
            "em" | "i" => italic += if closing { -1 } else { 1 },
            "br" => push_text(&mut runs, "\n", bold, italic),
            _ => {} // stripped
        }
    }
    let text = decode_entities(&html[cursor..]);
    push_text(&mut runs, &text, bold, italic);

    // Leading/trailing cleanup touches the outermost spans only.
    while runs.first().is_some_and(|r| r.text.trim().is_empty()) {
        runs.remove(0);
    }
    while runs.last().is_some_and(|r| r.text.trim().is_empty()) {
        runs.pop();
    }
    if let Some(first) = runs.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(last) = runs.last_mut() {
        last.text = last.text.trim_end().to_string();
    }

    runs.into_iter()
        .map(|run| {
            let mut marks = Vec::new();
            if run.bold {
                marks.push(Mark::Strong);
            }
            if run.italic {
                marks.push(Mark::Em);
            }
            Span::new(run.text, marks)
        })
        .collect()
}

/// Concatenated visible text across spans.
pub fn visible_text(spans: &[Span]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

/// Decode the handful of entities the legacy content actually uses,
/// plus numeric character references.
pub fn decode_entities(text: &str) -> String {
    let replaced = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let body = &caps[1];
        let code = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    replaced
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_attach_to_correct_substrings() {
        let spans = inline_spans("Warm <strong>and</strong> precise <em>sound</em>");
        let shapes: Vec<(&str, &[Mark])> = spans
            .iter()
            .map(|s| (s.text.as_str(), s.marks.as_slice()))
            .collect();
        assert_eq!(
            shapes,
            vec![
                ("Warm ", &[][..]),
                ("and", &[Mark::Strong][..]),
                (" precise ", &[][..]),
                ("sound", &[Mark::Em][..]),
            ]
        );
    }

    #[test]
    fn concatenated_text_round_trips_tag_stripped_source() {
        let html = "  Bardzo <b>dobry</b> wzmacniacz <i>lampowy</i>, <span>polecam</span>  ";
        let spans = inline_spans(html);
        assert_eq!(
            visible_text(&spans),
            "Bardzo dobry wzmacniacz lampowy, polecam"
        );
    }

    #[test]
    fn interior_whitespace_is_preserved() {
        let spans = inline_spans("<strong>a </strong> b");
        assert_eq!(visible_text(&spans), "a  b");
    }

    #[test]
    fn nested_bold_italic_combine() {
        let spans = inline_spans("<strong>loud <em>and clear</em></strong>");
        assert_eq!(spans[1].marks, vec![Mark::Strong, Mark::Em]);
    }

    #[test]
    fn entities_decode_including_numeric() {
        assert_eq!(decode_entities("Q&amp;A &#8211; ok&#x21;"), "Q&A – ok!");
        assert_eq!(decode_entities("&nbsp;x"), " x");
    }

    #[test]
    fn whitespace_only_input_yields_no_spans() {
        assert!(inline_spans("  <span> </span> ").is_empty());
    }

    #[test]
    fn br_becomes_newline_inside_span() {
        let spans = inline_spans("line one<br>line two");
        assert_eq!(visible_text(&spans), "line one\nline two");
    }
}
