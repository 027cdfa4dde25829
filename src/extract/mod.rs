//! Page extraction
//!
//! Reformats what the engine reports about one page into the flat
//! text/image element lists the editor front-end consumes. No PDF parsing
//! happens here.

mod types;

pub use types::{
    ErrorResult, ExtractionResult, FontStyle, FontWeight, ImageElement, TextElement,
};

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

use crate::engine::{
    Block, EngineError, EnginePage, ExtractedImage, ImageInfo, PdfEngine, Rect, Span,
};

/// Font size reported when the engine does not know it
const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Font family reported when the engine does not know it
const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("page {page} not in document (document has {page_count} pages)")]
    PageOutOfRange { page: i64, page_count: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Turns one page of a PDF into an [`ExtractionResult`]
#[derive(Clone)]
pub struct PageExtractor {
    engine: Arc<dyn PdfEngine>,
}

impl PageExtractor {
    pub fn new(engine: Arc<dyn PdfEngine>) -> Self {
        Self { engine }
    }

    /// Extract page `page_number` (1-based) of `pdf_bytes`
    pub fn extract(
        &self,
        pdf_bytes: &[u8],
        page_number: i64,
    ) -> Result<ExtractionResult, ExtractError> {
        let document = self.engine.open(pdf_bytes).map_err(|e| match e {
            EngineError::Open(msg) => ExtractError::InvalidPdf(msg),
            other => ExtractError::Engine(other),
        })?;

        let page_count = document.page_count();
        tracing::debug!(page_count, page_number, "Opened document");

        if page_number < 1 || page_number as u64 > page_count as u64 {
            tracing::warn!(page_number, page_count, "Rejected page number");
            return Err(ExtractError::PageOutOfRange {
                page: page_number,
                page_count,
            });
        }

        let page = document.load_page((page_number - 1) as usize)?;
        let bounds = page.bounds();
        let (page_width, page_height) = (bounds.width(), bounds.height());

        let text_elements = text_elements(&*page)?;

        let listing = page.images()?;
        let mut image_elements = Vec::with_capacity(listing.len());
        for (index, info) in listing.iter().enumerate() {
            let rects = page.image_rects(info.xref)?;
            let Some(rect) = rects.first() else {
                tracing::debug!(
                    xref = %info.xref,
                    name = %info.name,
                    width = info.width,
                    height = info.height,
                    "Skipping unplaced image"
                );
                continue;
            };
            let element = image_element(
                document.extract_image(info.xref)?,
                info,
                index,
                rect,
                (page_width, page_height),
            );
            image_elements.push(element);
        }

        tracing::debug!(
            spans = text_elements.len(),
            images = image_elements.len(),
            skipped = listing.len() - image_elements.len(),
            "Extracted page {}",
            page_number
        );

        Ok(ExtractionResult {
            text_elements,
            image_elements,
            page_width,
            page_height,
            success: true,
        })
    }
}

fn text_elements(page: &dyn EnginePage) -> Result<Vec<TextElement>, ExtractError> {
    let structured = page.structured_text()?;
    let mut elements = Vec::with_capacity(structured.span_count());

    for block in &structured.blocks {
        let Block::Text { lines, .. } = block else {
            continue;
        };
        for line in lines {
            elements.extend(line.spans.iter().map(text_element));
        }
    }
    Ok(elements)
}

fn text_element(span: &Span) -> TextElement {
    let bbox = span.bbox.unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
    let font = span.font.as_deref().unwrap_or(DEFAULT_FONT_FAMILY);
    let lowered = font.to_lowercase();

    TextElement {
        text: span.text.clone().unwrap_or_default(),
        x: bbox.x0,
        y: bbox.y0,
        width: bbox.width(),
        height: bbox.height(),
        font_size: span.size.unwrap_or(DEFAULT_FONT_SIZE),
        font_family: font.to_string(),
        font_weight: if lowered.contains("bold") {
            FontWeight::Bold
        } else {
            FontWeight::Normal
        },
        font_style: if lowered.contains("italic") {
            FontStyle::Italic
        } else {
            FontStyle::Normal
        },
        color: span.color.unwrap_or(0),
        background_color: None,
    }
}

fn image_element(
    image: ExtractedImage,
    info: &ImageInfo,
    index: usize,
    rect: &Rect,
    (page_width, page_height): (f32, f32),
) -> ImageElement {
    tracing::trace!(
        xref = %info.xref,
        ext = %image.ext,
        bytes = image.data.len(),
        width = info.width,
        height = info.height,
        "Inlining image"
    );
    ImageElement {
        id: format!("image-{index}"),
        x: rect.x0,
        y: rect.y0,
        width: rect.width(),
        height: rect.height(),
        src: data_url(&image.ext, &image.data),
        page_width,
        page_height,
    }
}

/// MIME type for an engine format extension
pub fn mime_type(ext: &str) -> String {
    match ext {
        "jpeg" => "image/jpeg".to_string(),
        other => format!("image/{other}"),
    }
}

/// `data:` URL carrying `data` as standard base64
pub fn data_url(ext: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type(ext), BASE64.encode(data))
}
