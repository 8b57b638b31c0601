use lopdf::Object;
use lopdf::content::{Content, Operation};

use super::render::{PlacedWord, TextLayer};
use crate::error::{OcrError, Result};

/// Resource names the OCR stream refers to on every page.
pub const FONT_RESOURCE: &str = "FOcr";
pub const LAYER_RESOURCE: &str = "OCocr";

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// Builds the content stream of an OCR layer with raw PDF operators.
///
/// Input coordinates have a top-left origin; the stream flips them against
/// the page height.
#[derive(Debug, Default)]
pub struct ContentLayer {
    debug: bool,
    height: f64,
    operations: Vec<Operation>,
    pages: Vec<Vec<u8>>,
}

impl ContentLayer {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    /// Encoded streams, one per finished page.
    pub fn into_pages(self) -> Vec<Vec<u8>> {
        self.pages
    }

    fn op(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }
}

impl TextLayer for ContentLayer {
    fn begin_page(&mut self, _page_number: usize, _width: f64, height: f64) -> Result<()> {
        self.height = height;
        self.operations.clear();
        self.op("BDC", vec![name("OC"), name(LAYER_RESOURCE)]);
        if self.debug {
            self.op("rg", vec![real(1.0), real(0.0), real(0.0)]);
            self.op("RG", vec![real(1.0), real(0.0), real(0.0)]);
            self.op("w", vec![real(0.5)]);
        }
        Ok(())
    }

    fn draw_word(&mut self, word: &PlacedWord) -> Result<()> {
        let render_mode = if self.debug { 0 } else { 3 };
        self.op("BT", vec![]);
        self.op("Tf", vec![name(FONT_RESOURCE), real(word.font_size)]);
        self.op("Tr", vec![Object::Integer(render_mode)]);
        self.op(
            "Tm",
            vec![
                real(1.0),
                real(0.0),
                real(0.0),
                real(1.0),
                real(word.x),
                real(self.height - word.baseline),
            ],
        );
        self.op("Tj", vec![Object::string_literal(word.bytes.clone())]);
        self.op("ET", vec![]);

        if self.debug {
            let bbox = word.bbox;
            self.op(
                "re",
                vec![
                    real(bbox.x1),
                    real(self.height - bbox.y2),
                    real(bbox.width()),
                    real(bbox.height()),
                ],
            );
            self.op("S", vec![]);
        }
        Ok(())
    }

    fn end_page(&mut self) -> Result<()> {
        self.op("EMC", vec![]);
        let content = Content {
            operations: std::mem::take(&mut self.operations),
        };
        let bytes = content.encode().map_err(OcrError::pdf)?;
        self.pages.push(bytes);
        Ok(())
    }
}
