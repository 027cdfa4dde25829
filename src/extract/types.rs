//! Response data model for page extraction

use serde::Serialize;

/// Font weight derived from the font name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

/// Font style derived from the font name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Normal,
    Italic,
}

/// One styled text span
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub font_family: String,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    /// Packed `0xRRGGBB`
    pub color: u32,
    /// Never known; always serialized as `null`
    pub background_color: Option<u32>,
}

/// One placed image with its bytes inlined as a `data:` URL
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub src: String,
    pub page_width: f32,
    pub page_height: f32,
}

/// Successful extraction of one page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub text_elements: Vec<TextElement>,
    pub image_elements: Vec<ImageElement>,
    pub page_width: f32,
    pub page_height: f32,
    pub success: bool,
}

/// Body of a failed extraction
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResult {
    pub error: String,
    pub success: bool,
}

impl ErrorResult {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            success: false,
        }
    }
}
