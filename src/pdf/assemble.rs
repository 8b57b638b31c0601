//! Building a new PDF from page images plus an OCR layer.

use printpdf::{
    Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, PdfPageIndex, Point, Rgb, TextRenderingMode,
};
use std::io::BufWriter;
use tracing::{debug, info};

use super::image::validate_images;
use super::render::{PlacedWord, RenderStats, TextLayer, WordRenderer, check_page_encoding};
use super::{HocrInput, OcrOutput};
use crate::error::{OcrError, Result};
use crate::settings::OcrConfig;

const BACKGROUND_LAYER: &str = "Background";

fn pt_to_mm(points: f64) -> Mm {
    Mm((points * 25.4 / 72.0) as f32)
}

fn red() -> Color {
    Color::Rgb(Rgb::new(1.0, 0.0, 0.0, None))
}

/// Creates one page per hOCR page with `images[i]` as its full-bleed
/// background and an invisible text layer on top.
///
/// `config.start_page` does not apply here: page `i` always uses image `i`.
pub fn assemble_with_ocr<I: AsRef<[u8]>>(
    input: HocrInput<'_>,
    images: &[I],
    config: &OcrConfig,
) -> Result<OcrOutput> {
    let document = input.resolve()?;
    let pages = &document.pages;
    if images.len() < pages.len() {
        return Err(OcrError::InsufficientImages {
            images: images.len(),
            pages: pages.len(),
        });
    }
    let infos = validate_images(images)?;

    let title = if document.title.trim().is_empty() {
        "OCR document"
    } else {
        document.title.trim()
    };

    let mut doc: Option<PdfDocumentReference> = None;
    let mut page_indices = Vec::with_capacity(pages.len());
    for (index, (page, info)) in pages.iter().zip(&infos).enumerate() {
        let width = page.bbox.x2;
        let height = page.bbox.y2;
        let (doc_handle, page_index, layer_index) = match doc.take() {
            None => {
                let (handle, page_index, layer_index) = PdfDocument::new(
                    title,
                    pt_to_mm(width),
                    pt_to_mm(height),
                    BACKGROUND_LAYER,
                );
                (handle, page_index, layer_index)
            }
            Some(handle) => {
                let (page_index, layer_index) =
                    handle.add_page(pt_to_mm(width), pt_to_mm(height), BACKGROUND_LAYER);
                (handle, page_index, layer_index)
            }
        };

        let decoded = printpdf::image_crate::load_from_memory(images[index].as_ref()).map_err(
            |err| OcrError::ImageFormat {
                index,
                reason: err.to_string(),
            },
        )?;
        let background = doc_handle.get_page(page_index).get_layer(layer_index);
        Image::from_dynamic_image(&decoded).add_to_layer(
            background,
            ImageTransform {
                translate_x: Some(Mm(0.0)),
                translate_y: Some(Mm(0.0)),
                rotate: None,
                scale_x: Some((width / f64::from(info.width)) as f32),
                scale_y: Some((height / f64::from(info.height)) as f32),
                dpi: Some(72.0),
            },
        );
        debug!(
            "page {}: {:?} background {}x{} px on {}x{} pt",
            index + 1,
            info.format,
            info.width,
            info.height,
            width,
            height
        );

        page_indices.push(page_index);
        doc = Some(doc_handle);
    }

    let doc = doc.ok_or_else(|| OcrError::InvalidInput("hOCR model has no pages".to_string()))?;
    let renderer = WordRenderer::new(config);
    let font = doc
        .add_builtin_font(renderer.font().builtin())
        .map_err(OcrError::pdf)?;

    let mut warnings = Vec::new();
    let mut stats = RenderStats::default();
    {
        let mut layer = PrintPdfLayer {
            doc: &doc,
            pages: &page_indices,
            font,
            config,
            current: None,
            height: 0.0,
        };
        for (index, page) in pages.iter().enumerate() {
            let page_stats =
                renderer.render_page(page, index + 1, page.bbox.x2, page.bbox.y2, &mut layer)?;
            check_page_encoding(index + 1, page_stats, config, &mut warnings)?;
            stats.add_page(page_stats);
        }
    }

    let mut buffer = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buffer);
        doc.save(&mut writer).map_err(OcrError::pdf)?;
    }

    info!(
        "assembled {} page(s) from images, {} words",
        stats.pages, stats.words
    );
    Ok(OcrOutput {
        pdf: buffer,
        warnings,
        stats,
    })
}

/// Draws the OCR layer through printpdf, one named layer per page.
struct PrintPdfLayer<'a> {
    doc: &'a PdfDocumentReference,
    pages: &'a [PdfPageIndex],
    font: IndirectFontRef,
    config: &'a OcrConfig,
    current: Option<PdfLayerReference>,
    height: f64,
}

impl TextLayer for PrintPdfLayer<'_> {
    fn begin_page(&mut self, page_number: usize, _width: f64, height: f64) -> Result<()> {
        let page = page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index))
            .copied()
            .ok_or_else(|| OcrError::Pdf(format!("no output page {}", page_number)))?;
        let layer = self
            .doc
            .get_page(page)
            .add_layer(self.config.page_layer_name(page_number));
        if self.config.debug {
            layer.set_fill_color(red());
            layer.set_outline_color(red());
            layer.set_outline_thickness(0.5);
            layer.set_text_rendering_mode(TextRenderingMode::Fill);
        } else {
            layer.set_text_rendering_mode(TextRenderingMode::Invisible);
        }
        self.current = Some(layer);
        self.height = height;
        Ok(())
    }

    fn draw_word(&mut self, word: &PlacedWord) -> Result<()> {
        let layer = self
            .current
            .as_ref()
            .ok_or_else(|| OcrError::Pdf("word drawn outside of a page".to_string()))?;
        layer.use_text(
            word.display_text(),
            word.font_size as f32,
            pt_to_mm(word.x),
            pt_to_mm(self.height - word.baseline),
            &self.font,
        );

        if self.config.debug {
            let bbox = word.bbox;
            let corners = [
                (bbox.x1, bbox.y1),
                (bbox.x2, bbox.y1),
                (bbox.x2, bbox.y2),
                (bbox.x1, bbox.y2),
            ];
            layer.add_line(Line {
                points: corners
                    .iter()
                    .map(|(x, y)| (Point::new(pt_to_mm(*x), pt_to_mm(self.height - *y)), false))
                    .collect(),
                is_closed: true,
            });
        }
        Ok(())
    }

    fn end_page(&mut self) -> Result<()> {
        self.current = None;
        Ok(())
    }
}
