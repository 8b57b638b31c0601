//! Adding an OCR layer to the pages of an existing PDF.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info};

use super::content::{ContentLayer, FONT_RESOURCE, LAYER_RESOURCE};
use super::detect::{LayerDetector, OcrDetection, PatternDetector, detect_ocr_with};
use super::render::{PageStats, RenderStats, WordRenderer, check_page_encoding};
use super::{HocrInput, OcrOutput};
use crate::batch::{default_parallelism, map_ordered};
use crate::error::{OcrError, OcrWarning, Result};
use crate::hocr::Page;
use crate::settings::OcrConfig;

const LETTER: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Overlays one invisible text layer per hOCR page onto `pdf`.
///
/// hOCR page `i` lands on source page `start_page + i`; source pages outside
/// that range are dropped from the output.
pub fn apply_ocr(pdf: &[u8], input: HocrInput<'_>, config: &OcrConfig) -> Result<OcrOutput> {
    apply_ocr_with(&PatternDetector, pdf, input, config)
}

pub fn apply_ocr_with(
    detector: &dyn LayerDetector,
    pdf: &[u8],
    input: HocrInput<'_>,
    config: &OcrConfig,
) -> Result<OcrOutput> {
    if pdf.is_empty() {
        return Err(OcrError::InvalidInput("empty PDF data".to_string()));
    }
    if config.start_page == 0 {
        return Err(OcrError::InvalidInput(
            "start page must be 1 or greater".to_string(),
        ));
    }
    let document = input.resolve()?;
    let pages = &document.pages;

    let detection = detect_ocr_with(detector, pdf, config);
    let mut warnings = enforce_layer_policy(&detection, config)?;

    let mut doc = PdfDocument::load_mem(pdf)?;
    let page_ids = select_pages(&mut doc, config.start_page, pages.len())?;

    let renderer = WordRenderer::new(config);
    let rendered = render_streams(&renderer, pages, config.debug)?;

    let mut stats = RenderStats::default();
    for (index, (_, page_stats)) in rendered.iter().enumerate() {
        check_page_encoding(index + 1, *page_stats, config, &mut warnings)?;
        stats.add_page(*page_stats);
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => renderer.font().base_font_name(),
        "Encoding" => "WinAnsiEncoding",
    });

    let mut layers = Vec::with_capacity(pages.len());
    for (index, ((page_id, page), (stream, _))) in page_ids
        .iter()
        .zip(pages.iter())
        .zip(rendered)
        .enumerate()
    {
        let layer_id = doc.add_object(dictionary! {
            "Type" => "OCG",
            "Name" => Object::string_literal(config.page_layer_name(index + 1)),
        });
        overlay_page(&mut doc, *page_id, page, stream, font_id, layer_id)?;
        layers.push(layer_id);
    }
    register_layers(&mut doc, &layers)?;

    if doc.version.as_str() < "1.5" {
        doc.version = "1.5".to_string();
    }
    let pruned = doc.prune_objects();
    debug!("pruned {} unreferenced objects", pruned.len());

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(OcrError::pdf)?;

    info!(
        "added OCR layer to {} page(s), {} words",
        stats.pages, stats.words
    );
    Ok(OcrOutput {
        pdf: bytes,
        warnings,
        stats,
    })
}

/// Applies the Strict/Force policy to a detection result.
pub(crate) fn enforce_layer_policy(
    detection: &OcrDetection,
    config: &OcrConfig,
) -> Result<Vec<OcrWarning>> {
    let mut warnings = detection.warnings.clone();
    for warning in &warnings {
        config.emit(warning);
    }
    if detection.has_ocr {
        let layer = detection
            .layers
            .ocr_layer_name
            .clone()
            .unwrap_or_else(|| config.layer_name.clone());
        if config.strict && !config.force {
            return Err(OcrError::ExistingLayerDetected { layer });
        }
        let warning = OcrWarning::ExistingLayer(layer);
        config.emit(&warning);
        warnings.push(warning);
    }
    Ok(warnings)
}

/// Keeps `count` source pages starting at `start_page` and drops the rest.
fn select_pages(doc: &mut PdfDocument, start_page: usize, count: usize) -> Result<Vec<ObjectId>> {
    let source = doc.get_pages();
    let available = source.len();
    let last = start_page
        .checked_add(count.saturating_sub(1))
        .ok_or(OcrError::SourcePageMissing {
            page: usize::MAX,
            available,
        })?;
    if last > available {
        return Err(OcrError::SourcePageMissing {
            page: last,
            available,
        });
    }

    let mut keep = Vec::with_capacity(count);
    for number in start_page..=last {
        let id = source
            .get(&(number as u32))
            .copied()
            .ok_or(OcrError::SourcePageMissing {
                page: number,
                available,
            })?;
        keep.push(id);
    }

    let dropped: Vec<u32> = source
        .keys()
        .copied()
        .filter(|number| (*number as usize) < start_page || (*number as usize) > last)
        .collect();
    if !dropped.is_empty() {
        debug!("dropping {} source page(s) outside the OCR range", dropped.len());
        doc.delete_pages(&dropped);
    }
    Ok(keep)
}

fn render_streams(
    renderer: &WordRenderer,
    pages: &[Page],
    debug: bool,
) -> Result<Vec<(Vec<u8>, PageStats)>> {
    map_ordered(pages, default_parallelism(), |index, page| {
        let mut layer = ContentLayer::new(debug);
        let stats = renderer.render_page(page, index + 1, page.bbox.x2, page.bbox.y2, &mut layer)?;
        let stream = layer
            .into_pages()
            .pop()
            .ok_or_else(|| OcrError::Pdf(format!("no content rendered for page {}", index + 1)))?;
        Ok((stream, stats))
    })
    .into_iter()
    .collect()
}

fn overlay_page(
    doc: &mut PdfDocument,
    page_id: ObjectId,
    page: &Page,
    ocr_stream: Vec<u8>,
    font_id: ObjectId,
    layer_id: ObjectId,
) -> Result<()> {
    let width = page.bbox.x2;
    let height = page.bbox.y2;
    let [x0, y0, x1, y1] = media_box(doc, page_id);
    let source_width = x1 - x0;
    let scale = if source_width > 0.0 {
        width / source_width
    } else {
        1.0
    };
    let placed_height = (y1 - y0) * scale;

    // Source content is scaled to the page width and pinned to the top-left.
    let prefix = encode(vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                real(scale),
                real(0.0),
                real(0.0),
                real(scale),
                real(-x0 * scale),
                real(height - placed_height - y0 * scale),
            ],
        ),
    ])?;
    let mut suffix = encode(vec![Operation::new("Q", vec![])])?;
    suffix.push(b'\n');
    suffix.extend_from_slice(&ocr_stream);

    let prefix_id = doc.add_object(Stream::new(dictionary! {}, prefix));
    let suffix_id = doc.add_object(Stream::new(dictionary! {}, suffix));

    let mut contents = vec![Object::Reference(prefix_id)];
    contents.extend(existing_contents(doc, page_id));
    contents.push(Object::Reference(suffix_id));

    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, obj).as_dict().ok().cloned())
        .unwrap_or_default();
    let mut fonts = sub_dictionary(doc, &resources, b"Font");
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    let mut properties = sub_dictionary(doc, &resources, b"Properties");
    properties.set(LAYER_RESOURCE, Object::Reference(layer_id));
    resources.set("Font", fonts);
    resources.set("Properties", properties);

    let dict = doc.get_dictionary_mut(page_id)?;
    dict.set(
        "MediaBox",
        vec![real(0.0), real(0.0), real(width), real(height)],
    );
    for key in ["CropBox", "BleedBox", "TrimBox", "ArtBox", "Rotate"] {
        dict.remove(key.as_bytes());
    }
    dict.set("Contents", contents);
    dict.set("Resources", resources);
    Ok(())
}

fn register_layers(doc: &mut PdfDocument, layers: &[ObjectId]) -> Result<()> {
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let mut properties = doc
        .get_dictionary(root_id)?
        .get(b"OCProperties")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok().cloned())
        .unwrap_or_default();
    let refs = layers.iter().map(|id| Object::Reference(*id));

    let mut groups = array_of(doc, properties.get(b"OCGs").ok());
    groups.extend(refs.clone());
    properties.set("OCGs", groups);

    let mut defaults = properties
        .get(b"D")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok().cloned())
        .unwrap_or_default();
    let mut order = array_of(doc, defaults.get(b"Order").ok());
    order.extend(refs.clone());
    defaults.set("Order", order);
    let mut on = array_of(doc, defaults.get(b"ON").ok());
    on.extend(refs);
    defaults.set("ON", on);
    properties.set("D", defaults);

    doc.get_dictionary_mut(root_id)?
        .set("OCProperties", properties);
    Ok(())
}

fn encode(operations: Vec<Operation>) -> Result<Vec<u8>> {
    Content { operations }.encode().map_err(OcrError::pdf)
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a PdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Looks `key` up on the page and then on its ancestors.
fn inherited<'a>(doc: &'a PdfDocument, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..64 {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(doc: &PdfDocument, page_id: ObjectId) -> [f64; 4] {
    let values: Vec<f64> = inherited(doc, page_id, b"MediaBox")
        .map(|obj| array_of(doc, Some(obj)))
        .unwrap_or_default()
        .iter()
        .filter_map(|obj| number(resolve(doc, obj)))
        .collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)],
        _ => LETTER,
    }
}

fn array_of(doc: &PdfDocument, obj: Option<&Object>) -> Vec<Object> {
    obj.map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok().cloned())
        .unwrap_or_default()
}

fn sub_dictionary(doc: &PdfDocument, parent: &Dictionary, key: &[u8]) -> Dictionary {
    parent
        .get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok().cloned())
        .unwrap_or_default()
}

fn existing_contents(doc: &PdfDocument, page_id: ObjectId) -> Vec<Object> {
    let Some(contents) = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|dict| dict.get(b"Contents").ok())
    else {
        return Vec::new();
    };
    match contents {
        Object::Array(items) => items.clone(),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    }
}
