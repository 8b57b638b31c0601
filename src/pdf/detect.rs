//! Heuristic detection of existing OCR layers.
//!
//! The scan works on the raw file bytes and looks for optional content group
//! declarations by pattern. Objects inside compressed object streams are not
//! visible to it.

use regex::Regex as TextRegex;
use regex::bytes::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{OcrError, OcrWarning, Result};
use crate::settings::OcrConfig;

// One level of balanced parentheses may appear unescaped inside a literal.
const LITERAL: &str = r"\(((?:\\.|\((?:\\.|[^\\()])*\)|[^\\()])*)\)";
const HEX: &str = r"<([0-9A-Fa-f\s]*)>";
// Up to 50 bytes that never cross a `>>` dictionary end.
const GAP: &str = r"(?:[^>]|>[^>]){1,50}?";

enum NameSyntax {
    Literal,
    Hex,
}

static OCG_PATTERNS: LazyLock<Vec<(Regex, NameSyntax)>> = LazyLock::new(|| {
    let literal = [
        format!(r"(?-u)/Type\s*/OCG\s*/Name\s*{LITERAL}"),
        format!(r"(?-u)/OCG\s*<<[^>]*?/Name\s*{LITERAL}"),
        format!(r"(?-u)<</Type/OCG/Name{LITERAL}"),
        format!(r"(?-u)/OCProperties.*?/OCGs\s*\[\s*.*?/Name\s*{LITERAL}"),
        format!(r"(?-u)/Name\s*{LITERAL}{GAP}/Type\s*/OCG"),
    ];
    let hex = [
        format!(r"(?-u)/Type\s*/OCG\s*/Name\s*{HEX}"),
        format!(r"(?-u)/Name\s*{HEX}{GAP}/Type\s*/OCG"),
    ];
    literal
        .iter()
        .map(|pattern| (pattern, NameSyntax::Literal))
        .chain(hex.iter().map(|pattern| (pattern, NameSyntax::Hex)))
        .filter_map(|(pattern, syntax)| match Regex::new(pattern) {
            Ok(regex) => Some((regex, syntax)),
            Err(err) => {
                debug!("skipping layer pattern {}: {}", pattern, err);
                None
            }
        })
        .collect()
});

/// Layers found in a PDF and how they relate to the configured base name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerCheck {
    /// Every layer name, deduplicated in first-seen order.
    pub layers: Vec<String>,
    pub has_ocr_layer: bool,
    pub ocr_layer_name: Option<String>,
    pub warnings: Vec<OcrWarning>,
}

/// Decides whether a PDF already carries an OCR layer.
pub trait LayerDetector: Send + Sync {
    fn detect(&self, pdf: &[u8], base_name: &str) -> Result<LayerCheck>;
}

/// Byte-pattern scan over the raw file.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternDetector;

impl LayerDetector for PatternDetector {
    fn detect(&self, pdf: &[u8], base_name: &str) -> Result<LayerCheck> {
        let layers = detect_layers(pdf)?;
        Ok(classify_layers(layers, base_name))
    }
}

/// Outcome of [`detect_ocr`]; detection failures end up in `warnings`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrDetection {
    pub has_ocr: bool,
    pub layers: LayerCheck,
    pub warnings: Vec<OcrWarning>,
}

/// All optional content group names declared in `pdf`.
pub fn detect_layers(pdf: &[u8]) -> Result<Vec<String>> {
    if pdf.is_empty() {
        return Err(OcrError::LayerDetection("empty PDF data".to_string()));
    }
    if find(pdf, b"%PDF-").is_none() {
        return Err(OcrError::LayerDetection("missing %PDF- header".to_string()));
    }

    let mut layers: Vec<String> = Vec::new();
    for (regex, syntax) in OCG_PATTERNS.iter() {
        for captures in regex.captures_iter(pdf) {
            let Some(raw) = captures.get(1) else {
                continue;
            };
            let bytes = match syntax {
                NameSyntax::Literal => unescape_literal(raw.as_bytes()),
                NameSyntax::Hex => decode_hex(raw.as_bytes()),
            };
            let name = decode_text_string(&bytes);
            if !name.is_empty() && !layers.contains(&name) {
                layers.push(name);
            }
        }
    }
    debug!("detected {} layer(s): {:?}", layers.len(), layers);
    Ok(layers)
}

/// Splits `layers` into hard matches on `base_name` and soft OCR hints.
pub fn classify_layers(layers: Vec<String>, base_name: &str) -> LayerCheck {
    let page_pattern = TextRegex::new(&format!(
        r"^{}\s*\(Page\s*\d+",
        regex::escape(base_name)
    ))
    .ok();

    let mut check = LayerCheck::default();
    for layer in &layers {
        let templated = page_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(layer));
        if layer == base_name || templated {
            if !check.has_ocr_layer {
                check.has_ocr_layer = true;
                check.ocr_layer_name = Some(layer.clone());
            }
            continue;
        }
        if layer.to_lowercase().contains("ocr") && !layer.starts_with(base_name) {
            check
                .warnings
                .push(OcrWarning::PotentialOcrLayer(layer.clone()));
        }
    }
    check.layers = layers;
    check
}

pub fn detect_ocr(pdf: &[u8], config: &OcrConfig) -> OcrDetection {
    detect_ocr_with(&PatternDetector, pdf, config)
}

/// Runs `detector`, turning a failed scan into a warning.
pub fn detect_ocr_with(
    detector: &dyn LayerDetector,
    pdf: &[u8],
    config: &OcrConfig,
) -> OcrDetection {
    if config.dump_pdf {
        debug!("PDF structure:\n{}", dump_structure(pdf, 1024));
    }
    match detector.detect(pdf, &config.layer_name) {
        Ok(layers) => OcrDetection {
            has_ocr: layers.has_ocr_layer,
            warnings: layers.warnings.clone(),
            layers,
        },
        Err(err) => {
            let reason = match err {
                OcrError::LayerDetection(reason) => reason,
                other => other.to_string(),
            };
            OcrDetection {
                warnings: vec![OcrWarning::DetectionFailed(reason)],
                ..OcrDetection::default()
            }
        }
    }
}

/// The first `byte_count` bytes of `pdf` plus the context around its first
/// `/OCG` token, with control bytes made visible.
pub fn dump_structure(pdf: &[u8], byte_count: usize) -> String {
    let mut out = String::new();
    let head = &pdf[..pdf.len().min(byte_count)];
    out.push_str(&format!("first {} of {} bytes:\n", head.len(), pdf.len()));
    out.push_str(&printable(head));

    match find(pdf, b"/OCG") {
        Some(pos) => {
            let start = pos.saturating_sub(200);
            let end = (pos + 200).min(pdf.len());
            out.push_str(&format!("\n\n/OCG at byte {}:\n", pos));
            out.push_str(&printable(&pdf[start..end]));
        }
        None => out.push_str("\n\nno /OCG token found"),
    }
    out
}

fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            b'\n' | b'\r' | b'\t' => *b as char,
            0x20..=0x7e => *b as char,
            _ => '.',
        })
        .collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn unescape_literal(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' || i + 1 >= raw.len() {
            out.push(b);
            i += 1;
            continue;
        }
        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'0'..=b'7' => {
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                    value = value * 8 + u32::from(raw[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                out.push((value & 0xff) as u8);
            }
            b'\r' | b'\n' => {
                if next == b'\r' && raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn decode_hex(raw: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = raw
        .iter()
        .filter_map(|b| (*b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xfe, 0xff]) {
        let (text, _) = encoding_rs::UTF_16BE.decode_without_bom_handling(rest);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|b| *b as char).collect(),
    }
}
