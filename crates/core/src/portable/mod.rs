//! Portable Text block model.
//!
//! The migration pipeline converts legacy HTML into this block sequence;
//! serialization matches the shapes the studio schema expects (`block`
//! text nodes plus the custom media block types).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Random `_key` in the short hex form the studio generates.
pub fn make_key() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..12].to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type")]
pub enum ContentBlock {
    #[serde(rename = "block")]
    Text(TextBlock),
    #[serde(rename = "inlineImage")]
    InlineImage(ImageBlock),
    #[serde(rename = "fullWidthImage")]
    FullWidthImage(ImageBlock),
    #[serde(rename = "youtube")]
    Youtube(EmbedBlock),
    #[serde(rename = "vimeo")]
    Vimeo(EmbedBlock),
    #[serde(rename = "pageBreak")]
    PageBreak(PageBreakBlock),
}

impl ContentBlock {
    /// Concatenated visible text, empty for media blocks. Used by tests
    /// and by the parser's empty-segment check.
    pub fn plain_text(&self) -> String {
        match self {
            ContentBlock::Text(block) => block
                .children
                .iter()
                .map(|span| span.text.as_str())
                .collect(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStyle {
    Normal,
    H2,
    H3,
    H4,
    Blockquote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(rename = "_key")]
    pub key: String,
    pub style: BlockStyle,
    #[serde(rename = "markDefs")]
    pub mark_defs: Vec<serde_json::Value>,
    pub children: Vec<Span>,
}

impl TextBlock {
    pub fn new(style: BlockStyle, children: Vec<Span>) -> Self {
        Self {
            key: make_key(),
            style,
            mark_defs: Vec::new(),
            children,
        }
    }

    pub fn paragraph(children: Vec<Span>) -> Self {
        Self::new(BlockStyle::Normal, children)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "_type")]
    pub span_type: SpanType,
    #[serde(rename = "_key")]
    pub key: String,
    pub text: String,
    pub marks: Vec<Mark>,
}

/// Fixed `"span"` discriminator on text children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanType {
    Span,
}

impl Span {
    pub fn new(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            span_type: SpanType::Span,
            key: make_key(),
            text: text.into(),
            marks,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Strong,
    Em,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    #[serde(rename = "_key")]
    pub key: String,
    pub asset: AssetReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

impl ImageBlock {
    pub fn new(asset_id: impl Into<String>, alt: Option<String>) -> Self {
        Self {
            key: make_key(),
            asset: AssetReference::new(asset_id),
            alt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetReference {
    #[serde(rename = "_type")]
    pub ref_type: ReferenceType,
    #[serde(rename = "_ref")]
    pub asset_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Reference,
}

impl AssetReference {
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            ref_type: ReferenceType::Reference,
            asset_id: asset_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedBlock {
    #[serde(rename = "_key")]
    pub key: String,
    pub url: String,
}

impl EmbedBlock {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            key: make_key(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBreakBlock {
    #[serde(rename = "_key")]
    pub key: String,
}

impl PageBreakBlock {
    pub fn new() -> Self {
        Self { key: make_key() }
    }
}

impl Default for PageBreakBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_block_serializes_with_type_tag() {
        let block = ContentBlock::Text(TextBlock::paragraph(vec![Span::plain("hello")]));
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["_type"], "block");
        assert_eq!(value["style"], "normal");
        assert_eq!(value["children"][0]["_type"], "span");
        assert_eq!(value["children"][0]["text"], "hello");
    }

    #[test]
    fn image_block_carries_asset_reference() {
        let block = ContentBlock::FullWidthImage(ImageBlock::new("image-abc-1400x900-jpg", None));
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["_type"], "fullWidthImage");
        assert_eq!(value["asset"]["_type"], "reference");
        assert_eq!(value["asset"]["_ref"], "image-abc-1400x900-jpg");
        assert!(value.get("alt").is_none());
    }

    #[test]
    fn keys_are_short_and_unique() {
        let a = make_key();
        let b = make_key();
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }

    #[test]
    fn plain_text_concatenates_spans() {
        let block = ContentBlock::Text(TextBlock::paragraph(vec![
            Span::plain("loud "),
            Span::new("and clear", vec![Mark::Strong]),
        ]));
        assert_eq!(block.plain_text(), "loud and clear");
    }
}
