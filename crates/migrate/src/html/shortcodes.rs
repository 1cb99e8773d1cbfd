//! Stage one of the HTML conversion: pull media out of the markup and
//! leave unique placeholder tokens behind, so the block splitter never
//! has to understand shortcode or iframe syntax.

use std::sync::LazyLock;

use regex::Regex;

/// Legacy bracketed image marker, e.g.
/// `[image src="assets/foo.jpg" width="300" title="Foo"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageShortcode {
    pub src: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub title: Option<String>,
    pub class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEmbed {
    Image(ImageShortcode),
    Youtube(String),
    Vimeo(String),
}

pub const PAGE_BREAK_TOKEN: &str = "@@page-break@@";

pub fn media_token(index: usize) -> String {
    format!("@@media-{index}@@")
}

static IMAGE_SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[image\s+([^\]]+)\]").unwrap());
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-zA-Z_-]+)\s*=\s*"([^"]*)""#).unwrap());
static IFRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<iframe[^>]*\bsrc\s*=\s*"([^"]+)"[^>]*>(?:\s*</iframe>)?"#).unwrap()
});
static PAGE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!--\s*pagebreak\s*-->").unwrap());

/// Replace every image shortcode with a placeholder token, appending the
/// parsed shortcode to `table`. The input is never mutated.
pub fn extract_image_shortcodes(html: &str, table: &mut Vec<MediaEmbed>) -> String {
    IMAGE_SHORTCODE_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let shortcode = parse_attrs(&caps[1]);
            table.push(MediaEmbed::Image(shortcode));
            media_token(table.len() - 1)
        })
        .into_owned()
}

/// Replace recognized YouTube/Vimeo iframes with placeholder tokens.
/// Iframes pointing anywhere else are left alone (and later stripped
/// with the rest of the unknown tags).
pub fn extract_video_embeds(html: &str, table: &mut Vec<MediaEmbed>) -> String {
    IFRAME_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            match classify_embed(&caps[1]) {
                Some(embed) => {
                    table.push(embed);
                    media_token(table.len() - 1)
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Replace explicit page-break comment markers with a placeholder token.
pub fn extract_page_breaks(html: &str) -> String {
    PAGE_BREAK_RE.replace_all(html, PAGE_BREAK_TOKEN).into_owned()
}

fn parse_attrs(attrs: &str) -> ImageShortcode {
    let mut shortcode = ImageShortcode {
        src: String::new(),
        width: None,
        height: None,
        title: None,
        class: None,
    };
    for caps in ATTR_RE.captures_iter(attrs) {
        let value = caps[2].to_string();
        match caps[1].to_ascii_lowercase().as_str() {
            "src" => shortcode.src = value,
            "width" => shortcode.width = value.parse().ok(),
            "height" => shortcode.height = value.parse().ok(),
            "title" => shortcode.title = Some(value),
            "class" => shortcode.class = Some(value),
            _ => {}
        }
    }
    shortcode
}

fn classify_embed(src: &str) -> Option<MediaEmbed> {
    let lower = src.to_ascii_lowercase();
    if lower.contains("youtube.com") || lower.contains("youtu.be") {
        Some(MediaEmbed::Youtube(src.to_string()))
    } else if lower.contains("vimeo.com") {
        Some(MediaEmbed::Vimeo(src.to_string()))
    } else {
        None
    }
}
