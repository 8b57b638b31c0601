//! hOCR layout model, parser and generator.
//!
//! The model mirrors the hOCR hierarchy Document → Page → Area → Paragraph →
//! Line → Word, where every intermediate level is optional: a word may hang
//! under a line, a paragraph, an area or directly under the page.

mod generate;
mod parse;
pub mod title;
mod tree;
mod types;

pub use generate::generate_hocr;
pub use parse::parse_hocr;
pub use tree::{ElementKind, Node, walk_post_order};
pub use types::{Area, BoundingBox, Document, Line, Metadata, Page, Paragraph, Word};
