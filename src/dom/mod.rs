//! Read-only document model
//!
//! Pages are handled as HTML snapshots parsed with `scraper`; the extractor
//! only ever reads from them.

pub mod document;

pub use document::{Document, compact_ws, inner_text, next_element_sibling, parent_element, parse_selector};
