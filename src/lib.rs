//! Invisible, selectable OCR text layers for PDFs.
//!
//! hOCR markup (or a [`hocr::Document`] built in-process) is turned into one
//! optional content group per page whose words are typeset to the exact width
//! of their recognized boxes. Two entry points exist:
//!
//! - [`apply_ocr`] overlays the layer onto the pages of an existing PDF;
//! - [`assemble_with_ocr`] builds a new PDF from page images.

pub mod batch;
pub mod error;
pub mod hocr;
pub mod logging;
pub mod pdf;
pub mod settings;
pub mod sink;

pub use batch::{AssembleJob, BatchOptions, OverlayJob, apply_many, assemble_many};
pub use error::{OcrError, OcrWarning, Result};
pub use hocr::{generate_hocr, parse_hocr};
pub use pdf::{
    HocrInput, LayerCheck, LayerDetector, OcrDetection, OcrOutput, PatternDetector, apply_ocr,
    apply_ocr_with, assemble_with_ocr, detect_ocr, detect_ocr_with,
};
pub use settings::{EncodingPolicy, FontConfig, OcrConfig, load_config};
pub use sink::{MemorySink, TracingSink, WarningSink};
