//! PDF engine abstraction
//!
//! The extractor never touches PDF syntax directly. It talks to a
//! capability-based document/page model through the traits below, and
//! the production implementation lives in [`lopdf_backend`].
//!
//! # Design
//!
//! ```text
//! ┌──────────────┐  open(bytes)   ┌──────────────────┐  load_page(i)  ┌──────────────┐
//! │  PdfEngine   │ ─────────────▶ │  EngineDocument  │ ─────────────▶ │  EnginePage  │
//! │ (stateless)  │                │ (request scoped) │                │              │
//! └──────────────┘                └──────────────────┘                └──────────────┘
//!                                   page_count()                        bounds()
//!                                   extract_image(xref)                 structured_text()
//!                                                                       images()
//!                                                                       image_rects(xref)
//! ```
//!
//! Documents are handed out as `Box<dyn EngineDocument>`. Dropping the box
//! releases everything the engine allocated for that request.

mod geometry;
pub mod lopdf_backend;

use std::fmt;

use thiserror::Error;

pub use geometry::{Matrix, Rect};

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// The byte stream is not a readable PDF
    #[error("cannot open document: {0}")]
    Open(String),

    /// Page index outside `0..page_count`
    #[error("page index {index} out of range (document has {page_count} pages)")]
    PageNotFound { index: usize, page_count: usize },

    /// Missing or malformed PDF object
    #[error("object error: {0}")]
    Object(String),

    /// Content stream could not be decoded
    #[error("content stream error: {0}")]
    Content(String),

    /// Image data could not be extracted
    #[error("image error: {0}")]
    Image(String),
}

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Cross-reference identifier of an indirect object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub num: u32,
    pub gen: u16,
}

impl ObjectRef {
    pub fn new(num: u32, gen: u16) -> Self {
        Self { num, gen }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.gen)
    }
}

/// Structured text of one page: blocks → lines → spans
#[derive(Debug, Clone, Default)]
pub struct StructuredText {
    pub blocks: Vec<Block>,
}

impl StructuredText {
    /// Number of spans across all text blocks
    pub fn span_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| match block {
                Block::Text { lines, .. } => lines.iter().map(|l| l.spans.len()).sum(),
                Block::Image { .. } => 0,
            })
            .sum()
    }
}

/// A structured-text block
#[derive(Debug, Clone)]
pub enum Block {
    Text { bbox: Rect, lines: Vec<Line> },
    Image { bbox: Rect },
}

/// A line of text made of one or more spans
#[derive(Debug, Clone)]
pub struct Line {
    pub bbox: Rect,
    pub spans: Vec<Span>,
}

/// A contiguous run sharing font, size and color.
///
/// Every field is optional: engines report what they know and the
/// extractor supplies defaults for the rest.
#[derive(Debug, Clone, Default)]
pub struct Span {
    pub text: Option<String>,
    pub bbox: Option<Rect>,
    pub size: Option<f32>,
    pub font: Option<String>,
    /// Packed `0xRRGGBB`
    pub color: Option<u32>,
}

/// One entry of a page's image listing
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub xref: ObjectRef,
    /// Resource name the image is registered under (e.g. `Im0`)
    pub name: String,
    /// Intrinsic size in samples
    pub width: u32,
    pub height: u32,
}

/// Raw image payload plus the format extension the engine assigned to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub data: Vec<u8>,
    /// Format extension without a dot (`jpeg`, `png`, `jpx`, ...)
    pub ext: String,
}

/// Opens documents from bytes
pub trait PdfEngine: Send + Sync {
    fn open(&self, bytes: &[u8]) -> EngineResult<Box<dyn EngineDocument>>;
}

/// An opened document. Dropping it releases the engine's resources.
pub trait EngineDocument {
    fn page_count(&self) -> usize;

    /// Load the page at a 0-based index
    fn load_page(&self, index: usize) -> EngineResult<Box<dyn EnginePage + '_>>;

    /// Extract the raw bytes of an image XObject by cross-reference
    fn extract_image(&self, xref: ObjectRef) -> EngineResult<ExtractedImage>;
}

/// A loaded page
pub trait EnginePage {
    /// Page rectangle in page space, origin at (0, 0)
    fn bounds(&self) -> Rect;

    fn structured_text(&self) -> EngineResult<StructuredText>;

    /// Full image listing, including images referenced from nested forms
    fn images(&self) -> EngineResult<Vec<ImageInfo>>;

    /// Every rectangle the image is painted at on this page, in paint order
    fn image_rects(&self, xref: ObjectRef) -> EngineResult<Vec<Rect>>;
}
