//! PDF side: layer detection, word placement and the two overlay operations.

mod assemble;
mod content;
pub mod detect;
pub mod font;
mod image;
mod overlay;
pub mod render;

use std::borrow::Cow;

pub use assemble::assemble_with_ocr;
pub use content::ContentLayer;
pub use detect::{
    LayerCheck, LayerDetector, OcrDetection, PatternDetector, detect_ocr, detect_ocr_with,
};
pub use image::{ImageInfo, probe_image, validate_images};
pub use overlay::{apply_ocr, apply_ocr_with};
pub use render::{CoordinateMap, PlacedWord, RenderStats, TextLayer, WordRenderer};

use crate::error::{OcrError, OcrWarning, Result};
use crate::hocr::{Document, parse_hocr};

/// OCR data for one output document.
#[derive(Debug, Clone, Copy)]
pub enum HocrInput<'a> {
    /// Raw hOCR markup, parsed on use.
    Bytes(&'a [u8]),
    /// A model built in-process.
    Document(&'a Document),
}

impl<'a> HocrInput<'a> {
    pub(crate) fn resolve(self) -> Result<Cow<'a, Document>> {
        let document = match self {
            HocrInput::Bytes(bytes) => Cow::Owned(parse_hocr(bytes)?),
            HocrInput::Document(document) => Cow::Borrowed(document),
        };
        if document.pages.is_empty() {
            return Err(OcrError::InvalidInput("hOCR model has no pages".to_string()));
        }
        for (index, page) in document.pages.iter().enumerate() {
            if page.bbox.x2 <= 0.0 || page.bbox.y2 <= 0.0 {
                return Err(OcrError::InvalidInput(format!(
                    "page {} has an empty bounding box",
                    index + 1
                )));
            }
        }
        Ok(document)
    }
}

impl<'a> From<&'a Document> for HocrInput<'a> {
    fn from(document: &'a Document) -> Self {
        HocrInput::Document(document)
    }
}

impl<'a> From<&'a [u8]> for HocrInput<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        HocrInput::Bytes(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct OcrOutput {
    pub pdf: Vec<u8>,
    /// Conditions that were accepted without failing the operation.
    pub warnings: Vec<OcrWarning>,
    pub stats: RenderStats,
}

impl OcrOutput {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    pub(crate) use super::image::png_bytes;

    /// A letter-sized PDF with one line of text per page and, optionally, an
    /// optional content group called `layer`.
    pub(crate) fn sample_pdf(pages: usize, layer: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for index in 0..pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), Object::Integer(24)]),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(600)]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("Source page {}", index + 1))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(pages as i64),
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some(name) = layer {
            let ocg_id = doc.add_object(dictionary! {
                "Type" => "OCG",
                "Name" => Object::string_literal(name),
            });
            catalog.set(
                "OCProperties",
                dictionary! {
                    "OCGs" => vec![Object::Reference(ocg_id)],
                    "D" => dictionary! { "Order" => vec![Object::Reference(ocg_id)] },
                },
            );
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save sample pdf");
        bytes
    }
}
