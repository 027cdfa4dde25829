//! Page Extract Server Library
//!
//! Describes the text spans and placed images of a single PDF page so a
//! front-end editor can rebuild the page as positioned elements.
//!
//! # Modules
//!
//! - `engine`: PDF engine traits and the lopdf-backed implementation
//! - `extract`: Page extractor and the response data model
//! - `routes`: HTTP router (`/health`, `POST /api/extract-pdf`)

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;
