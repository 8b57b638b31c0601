use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Metadata = BTreeMap<String, String>;

/// Rectangle in page-pixel units, `(x1, y1)` top-left and `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn is_empty(&self) -> bool {
        self.x1 == 0.0 && self.y1 == 0.0 && self.x2 == 0.0 && self.y2 == 0.0
    }
}

/// `ocrx_word`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Word {
    pub id: String,
    pub text: String,
    pub bbox: BoundingBox,
    /// Recognition confidence 0-100, `0.0` when the engine did not report one.
    pub confidence: f64,
    pub lang: String,
    pub metadata: Metadata,
}

/// `ocr_line` and its Tesseract variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Line {
    pub id: String,
    pub lang: String,
    pub bbox: BoundingBox,
    pub baseline: Option<String>,
    pub words: Vec<Word>,
    pub metadata: Metadata,
}

/// `ocr_par`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paragraph {
    pub id: String,
    pub lang: String,
    pub bbox: BoundingBox,
    pub lines: Vec<Line>,
    /// Words without a parent line.
    pub words: Vec<Word>,
    pub metadata: Metadata,
}

/// `ocr_carea`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Area {
    pub id: String,
    pub lang: String,
    pub bbox: BoundingBox,
    pub paragraphs: Vec<Paragraph>,
    pub lines: Vec<Line>,
    pub words: Vec<Word>,
    pub metadata: Metadata,
}

/// `ocr_page`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    pub id: String,
    /// Raw `title` attribute as found in the source markup.
    pub title: String,
    pub page_number: u32,
    pub image_name: String,
    pub lang: String,
    pub bbox: BoundingBox,
    pub areas: Vec<Area>,
    pub paragraphs: Vec<Paragraph>,
    pub lines: Vec<Line>,
    pub words: Vec<Word>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub title: String,
    pub description: String,
    pub language: String,
    pub metadata: Metadata,
    pub pages: Vec<Page>,
}

impl Word {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
            ..Self::default()
        }
    }
}

impl Line {
    pub fn new(bbox: BoundingBox, words: Vec<Word>) -> Self {
        Self {
            bbox,
            words,
            ..Self::default()
        }
    }
}

impl Page {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            ..Self::default()
        }
    }
}

impl Document {
    pub fn from_json_slice(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|err| crate::OcrError::MalformedInput(format!("invalid JSON model: {}", err)))
    }
}
