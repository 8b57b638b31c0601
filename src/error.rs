//! Error and warning types shared by the hOCR and PDF layers.

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OcrError>;

#[derive(Debug, Error)]
pub enum OcrError {
    /// The hOCR input carried no `ocr_page` element.
    #[error("malformed hOCR input: {0}")]
    MalformedInput(String),

    /// Too many words on a page could not be encoded for the PDF font.
    #[error("character encoding issues on page {page}: {failed} of {total} words")]
    EncodingFailure {
        page: usize,
        failed: usize,
        total: usize,
    },

    #[error("image {index} has invalid format: {reason}")]
    ImageFormat { index: usize, reason: String },

    #[error("not enough images ({images}) for hOCR pages ({pages})")]
    InsufficientImages { images: usize, pages: usize },

    #[error("file already has OCR (layer '{layer}') - set force to override")]
    ExistingLayerDetected { layer: String },

    #[error("OCR layer detection failed: {0}")]
    LayerDetection(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("source PDF has no page {page} (document has {available} pages)")]
    SourcePageMissing { page: usize, available: usize },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<lopdf::Error> for OcrError {
    fn from(err: lopdf::Error) -> Self {
        OcrError::Pdf(err.to_string())
    }
}

impl OcrError {
    pub(crate) fn pdf<E: fmt::Debug>(err: E) -> Self {
        OcrError::Pdf(format!("{:?}", err))
    }
}

impl From<anyhow::Error> for OcrError {
    fn from(err: anyhow::Error) -> Self {
        OcrError::Config(format!("{:#}", err))
    }
}

/// A condition that was accepted without aborting the operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrWarning {
    /// A layer name mentions OCR but is not one this crate would have written.
    PotentialOcrLayer(String),
    /// The target PDF already carries an OCR layer; processing continued.
    ExistingLayer(String),
    DetectionFailed(String),
    EncodingIssues {
        page: usize,
        failed: usize,
        total: usize,
    },
}

impl fmt::Display for OcrWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrWarning::PotentialOcrLayer(name) => {
                write!(f, "existing layer detected that might contain OCR: {}", name)
            }
            OcrWarning::ExistingLayer(name) => {
                write!(f, "file already has OCR (layer '{}')", name)
            }
            OcrWarning::DetectionFailed(reason) => {
                write!(f, "OCR layer detection failed: {}", reason)
            }
            OcrWarning::EncodingIssues {
                page,
                failed,
                total,
            } => write!(
                f,
                "character encoding issues on page {}: {} of {} words",
                page, failed, total
            ),
        }
    }
}
