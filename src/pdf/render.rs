//! Word placement shared by both overlay operations.
//!
//! Every word is typeset so that its measured width equals the width of its
//! recognized box. The renderer only computes positions; drawing is delegated
//! to a [`TextLayer`] backend.

use tracing::debug;

use super::font::StandardFont;
use crate::error::{OcrError, OcrWarning, Result};
use crate::hocr::{BoundingBox, Page, Word};
use crate::settings::{EncodingPolicy, OcrConfig};

/// Fraction of a page's words that may fall back to raw text before the
/// page is reported.
pub const ENCODING_FAILURE_THRESHOLD: f64 = 0.10;

/// Linear map from hOCR pixel space to page space. Both use a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMap {
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateMap {
    pub fn identity() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Pages span `[0 0 x2 y2]` of the model page box.
    pub fn new(model: &BoundingBox, page_width: f64, page_height: f64) -> Self {
        let model_width = model.x2;
        let model_height = model.y2;
        if model_width <= 0.0 || model_height <= 0.0 {
            return Self::identity();
        }
        if model_width == page_width && model_height == page_height {
            return Self::identity();
        }
        Self {
            scale_x: page_width / model_width,
            scale_y: page_height / model_height,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.scale_x == 1.0 && self.scale_y == 1.0
    }

    pub fn map(&self, bbox: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            bbox.x1 * self.scale_x,
            bbox.y1 * self.scale_y,
            bbox.x2 * self.scale_x,
            bbox.y2 * self.scale_y,
        )
    }
}

/// A word ready to be drawn, in top-left page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub text: String,
    /// Bytes shown with the WinAnsi font. Raw UTF-8 when encoding failed.
    pub bytes: Vec<u8>,
    pub encoded: bool,
    pub x: f64,
    pub baseline: f64,
    pub font_size: f64,
    pub bbox: BoundingBox,
}

impl PlacedWord {
    /// Same bytes as `text` when encoding succeeded.
    pub fn display_text(&self) -> String {
        if self.encoded {
            self.bytes.iter().map(|b| *b as char).collect()
        } else {
            self.text.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub words: usize,
    pub fallbacks: usize,
}

impl PageStats {
    pub fn exceeds_threshold(&self) -> bool {
        self.words > 0
            && self.fallbacks as f64 / self.words as f64 > ENCODING_FAILURE_THRESHOLD
    }
}

/// Totals for a whole output document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub pages: usize,
    pub words: usize,
    pub fallbacks: usize,
}

impl RenderStats {
    pub fn add_page(&mut self, page: PageStats) {
        self.pages += 1;
        self.words += page.words;
        self.fallbacks += page.fallbacks;
    }
}

/// A drawing surface for one OCR layer per page.
pub trait TextLayer {
    fn begin_page(&mut self, page_number: usize, width: f64, height: f64) -> Result<()>;
    fn draw_word(&mut self, word: &PlacedWord) -> Result<()>;
    fn end_page(&mut self) -> Result<()>;
}

/// ISO-8859-1 bytes for `text`, or `None` when a character is outside it.
pub fn encode_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct WordRenderer {
    font: StandardFont,
    base_size: f64,
    ascent_ratio: f64,
}

impl WordRenderer {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            font: StandardFont::from_config(&config.font),
            base_size: config.font.size,
            ascent_ratio: config.font.ascent_ratio,
        }
    }

    pub fn font(&self) -> StandardFont {
        self.font
    }

    pub fn place(&self, word: &Word, map: &CoordinateMap) -> PlacedWord {
        let bbox = map.map(&word.bbox);
        let (bytes, encoded) = match encode_latin1(&word.text) {
            Some(bytes) => (bytes, true),
            None => (word.text.as_bytes().to_vec(), false),
        };

        let native = self.font.text_width(&bytes, self.base_size);
        let font_size = if native > 0.0 {
            self.base_size * (bbox.width() / native)
        } else {
            self.base_size
        };

        PlacedWord {
            text: word.text.clone(),
            bytes,
            encoded,
            x: bbox.x1,
            baseline: bbox.y1 + font_size * self.ascent_ratio,
            font_size,
            bbox,
        }
    }

    /// Draws every word of `page` into one layer page.
    pub fn render_page<L: TextLayer>(
        &self,
        page: &Page,
        page_number: usize,
        width: f64,
        height: f64,
        layer: &mut L,
    ) -> Result<PageStats> {
        let map = CoordinateMap::new(&page.bbox, width, height);
        let mut stats = PageStats::default();

        layer.begin_page(page_number, width, height)?;
        for word in page.all_words() {
            let placed = self.place(word, &map);
            if !placed.encoded {
                stats.fallbacks += 1;
            }
            stats.words += 1;
            layer.draw_word(&placed)?;
        }
        layer.end_page()?;

        debug!(
            "rendered page {}: {} words, {} encoding fallbacks",
            page_number, stats.words, stats.fallbacks
        );
        Ok(stats)
    }
}

/// Applies the encoding policy to one rendered page.
pub(crate) fn check_page_encoding(
    page_number: usize,
    stats: PageStats,
    config: &OcrConfig,
    warnings: &mut Vec<OcrWarning>,
) -> Result<()> {
    if !stats.exceeds_threshold() {
        return Ok(());
    }
    match config.encoding_policy {
        EncodingPolicy::Abort => Err(OcrError::EncodingFailure {
            page: page_number,
            failed: stats.fallbacks,
            total: stats.words,
        }),
        EncodingPolicy::Warn => {
            let warning = OcrWarning::EncodingIssues {
                page: page_number,
                failed: stats.fallbacks,
                total: stats.words,
            };
            config.emit(&warning);
            warnings.push(warning);
            Ok(())
        }
    }
}
