//! Legacy HTML to Portable Text conversion.
//!
//! Staged pipeline: media and page-break markers are first swapped for
//! placeholder tokens (side table keeps the payloads), the remaining
//! markup is split on block boundaries, and each segment is dispatched
//! to a typed block. Output order always matches source order, and the
//! input string is never modified.

pub mod inline;
pub mod shortcodes;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use audiofast_core::portable::{
    BlockStyle, ContentBlock, EmbedBlock, ImageBlock, PageBreakBlock, TextBlock,
};

use crate::error::MigrateError;
use shortcodes::{ImageShortcode, MediaEmbed, PAGE_BREAK_TOKEN};

/// Widest an image may declare and still render inline with the text.
pub const INLINE_WIDTH_MAX: u32 = 300;

/// Resolves a shortcode's source into a CMS asset ID. The live
/// implementation uploads through the asset cache; dry runs substitute a
/// deterministic placeholder.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve_image(&self, shortcode: &ImageShortcode) -> Result<String, MigrateError>;
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Heading(BlockStyle, String),
    Quote(String),
    Paragraph(String),
    PageBreak,
    Media(usize),
}

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)",
        r"<h([1-6])[^>]*>(.*?)</h[1-6]\s*>",
        r"|<blockquote[^>]*>(.*?)</blockquote\s*>",
        r"|<p[^>]*>(.*?)</p\s*>",
        r"|<hr[^>]*>",
        r"|@@page-break@@",
        r"|@@media-(\d+)@@",
    ))
    .unwrap()
});
static MEDIA_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@@media-(\d+)@@").unwrap());

/// Convert a legacy HTML fragment into an ordered block sequence.
pub async fn parse_html<R: ImageResolver + ?Sized>(
    html: &str,
    resolver: &R,
) -> Result<Vec<ContentBlock>, MigrateError> {
    let mut table: Vec<MediaEmbed> = Vec::new();
    let staged = shortcodes::extract_image_shortcodes(html, &mut table);
    let staged = shortcodes::extract_video_embeds(&staged, &mut table);
    let staged = shortcodes::extract_page_breaks(&staged);

    let mut blocks: Vec<ContentBlock> = Vec::new();
    for segment in split_segments(&staged) {
        match segment {
            Segment::PageBreak => blocks.push(ContentBlock::PageBreak(PageBreakBlock::new())),
            Segment::Media(index) => blocks.push(media_block(&table[index], resolver).await?),
            Segment::Heading(style, inner) => {
                text_segment(&inner, style, &table, resolver, &mut blocks).await?;
            }
            Segment::Quote(inner) => {
                text_segment(&inner, BlockStyle::Blockquote, &table, resolver, &mut blocks)
                    .await?;
            }
            Segment::Paragraph(inner) => {
                text_segment(&inner, BlockStyle::Normal, &table, resolver, &mut blocks).await?;
            }
        }
    }
    Ok(blocks)
}

/// Split token-staged markup on block boundaries, keeping bare text
/// between blocks as paragraph segments.
fn split_segments(staged: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    let mut push_gap = |segments: &mut Vec<Segment>, gap: &str| {
        if !gap.trim().is_empty() {
            segments.push(Segment::Paragraph(gap.to_string()));
        }
    };

    for caps in BLOCK_RE.captures_iter(staged) {
        let whole = caps.get(0).expect("group 0 always present");
        push_gap(&mut segments, &staged[cursor..whole.start()]);
        cursor = whole.end();

        if let Some(level) = caps.get(1) {
            let style = heading_style(level.as_str().parse::<u8>().unwrap_or(2));
            segments.push(Segment::Heading(style, caps[2].to_string()));
        } else if let Some(inner) = caps.get(3) {
            segments.push(Segment::Quote(inner.as_str().to_string()));
        } else if let Some(inner) = caps.get(4) {
            segments.push(Segment::Paragraph(inner.as_str().to_string()));
        } else if let Some(index) = caps.get(5) {
            if let Ok(index) = index.as_str().parse() {
                segments.push(Segment::Media(index));
            }
        } else if whole.as_str() == PAGE_BREAK_TOKEN {
            segments.push(Segment::PageBreak);
        }
        // <hr> is a boundary only; it emits nothing.
    }
    push_gap(&mut segments, &staged[cursor..]);
    segments
}

/// Legacy pages used h1 for titles rendered elsewhere; body headings
/// collapse into the three levels the schema supports.
fn heading_style(level: u8) -> BlockStyle {
    match level {
        1 | 2 => BlockStyle::H2,
        3 => BlockStyle::H3,
        _ => BlockStyle::H4,
    }
}

/// One text segment: media tokens inside it surface as their own blocks
/// (source order, ahead of the text); a segment with no visible text
/// after cleanup emits no text block at all.
async fn text_segment<R: ImageResolver + ?Sized>(
    inner: &str,
    style: BlockStyle,
    table: &[MediaEmbed],
    resolver: &R,
    blocks: &mut Vec<ContentBlock>,
) -> Result<(), MigrateError> {
    for caps in MEDIA_TOKEN_RE.captures_iter(inner) {
        if let Ok(index) = caps[1].parse::<usize>() {
            blocks.push(media_block(&table[index], resolver).await?);
        }
    }

    let without_tokens = MEDIA_TOKEN_RE.replace_all(inner, "");
    let spans = inline::inline_spans(&without_tokens);
    if !spans.is_empty() {
        blocks.push(ContentBlock::Text(TextBlock::new(style, spans)));
    }
    Ok(())
}

async fn media_block<R: ImageResolver + ?Sized>(
    embed: &MediaEmbed,
    resolver: &R,
) -> Result<ContentBlock, MigrateError> {
    Ok(match embed {
        MediaEmbed::Image(shortcode) => {
            let asset_id = resolver.resolve_image(shortcode).await?;
            let image = ImageBlock::new(asset_id, shortcode.title.clone());
            if shortcode.width.is_some_and(|w| w <= INLINE_WIDTH_MAX) {
                ContentBlock::InlineImage(image)
            } else {
                ContentBlock::FullWidthImage(image)
            }
        }
        MediaEmbed::Youtube(url) => ContentBlock::Youtube(EmbedBlock::new(url.clone())),
        MediaEmbed::Vimeo(url) => ContentBlock::Vimeo(EmbedBlock::new(url.clone())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubResolver;

    #[async_trait]
    impl ImageResolver for StubResolver {
        async fn resolve_image(&self, shortcode: &ImageShortcode) -> Result<String, MigrateError> {
            Ok(format!("image-stub-{}", shortcode.src.replace('/', "-")))
        }
    }

    async fn parse(html: &str) -> Vec<ContentBlock> {
        parse_html(html, &StubResolver).await.unwrap()
    }

    #[tokio::test]
    async fn paragraphs_headings_and_quotes_in_source_order() {
        let blocks = parse(
            "<h2>Recenzja</h2><p>Wstęp</p><blockquote>Cytat</blockquote><hr><p>Dalej</p>",
        )
        .await;
        let shapes: Vec<(String, String)> = blocks
            .iter()
            .map(|b| match b {
                ContentBlock::Text(t) => (format!("{:?}", t.style), b.plain_text()),
                other => (format!("{other:?}"), String::new()),
            })
            .collect();
        assert_eq!(
            shapes,
            vec![
                ("H2".to_string(), "Recenzja".to_string()),
                ("Normal".to_string(), "Wstęp".to_string()),
                ("Blockquote".to_string(), "Cytat".to_string()),
                ("Normal".to_string(), "Dalej".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn inline_and_full_width_classification_by_declared_width() {
        let blocks = parse(
            r#"[image src="a.jpg" width="200"]text[image src="b.jpg" width="500"]"#,
        )
        .await;
        assert!(matches!(blocks[0], ContentBlock::InlineImage(_)));
        assert_eq!(blocks[1].plain_text(), "text");
        assert!(matches!(blocks[2], ContentBlock::FullWidthImage(_)));
    }

    #[tokio::test]
    async fn media_only_paragraph_degrades_to_pure_media_block() {
        let blocks = parse(r#"<p> [image src="x.jpg" width="800"] <br> </p>"#).await;
        assert_eq!(blocks.len(), 1);
        assert!(matches!(blocks[0], ContentBlock::FullWidthImage(_)));
    }

    #[tokio::test]
    async fn media_with_text_emits_media_then_text() {
        let blocks =
            parse(r#"<p>[image src="x.jpg" width="800"]Opis zdjęcia</p>"#).await;
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0], ContentBlock::FullWidthImage(_)));
        assert_eq!(blocks[1].plain_text(), "Opis zdjęcia");
    }

    #[tokio::test]
    async fn page_break_comment_becomes_block() {
        let blocks = parse("<p>one</p><!-- pagebreak --><p>two</p>").await;
        assert!(matches!(blocks[1], ContentBlock::PageBreak(_)));
        assert_eq!(blocks.len(), 3);
    }

    #[tokio::test]
    async fn video_iframe_becomes_embed_block() {
        let blocks = parse(
            r#"<p>Zobacz:</p><iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ"></iframe>"#,
        )
        .await;
        match &blocks[1] {
            ContentBlock::Youtube(embed) => assert!(embed.url.contains("dQw4w9WgXcQ")),
            other => panic!("expected youtube block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_segments_are_dropped() {
        let blocks = parse("<p>  </p><p><span></span></p><p>real</p>").await;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].plain_text(), "real");
    }

    #[tokio::test]
    async fn marks_round_trip_through_blocks() {
        let blocks = parse("<p>Warm <strong>and</strong> precise <em>sound</em></p>").await;
        assert_eq!(blocks[0].plain_text(), "Warm and precise sound");
    }
}
