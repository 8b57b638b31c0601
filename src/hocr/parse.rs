use encoding_rs::{Encoding, UTF_8};
use kuchiki::NodeRef;
use kuchiki::traits::*;
use tracing::debug;

use super::title::{self, TitleProperty};
use super::tree::ElementKind;
use super::types::{Area, Document, Line, Metadata, Page, Paragraph, Word};
use crate::error::{OcrError, Result};

/// A built subtree, tagged with the level it belongs to.
enum Element {
    Page(Page),
    Area(Area),
    Paragraph(Paragraph),
    Line(Line),
    Word(Word),
}

/// Parses hOCR markup into a [`Document`].
///
/// Fails with [`OcrError::MalformedInput`] when the markup has no `ocr_page`.
pub fn parse_hocr(data: &[u8]) -> Result<Document> {
    let html = decode_markup(data);
    let root = kuchiki::parse_html().one(html.as_str());

    let mut doc = Document::default();
    read_document_meta(&root, &mut doc);

    let mut found = Vec::new();
    collect(&root, None, &mut found);
    for element in found {
        if let Element::Page(page) = element {
            doc.pages.push(page);
        }
    }

    if doc.pages.is_empty() {
        return Err(OcrError::MalformedInput(
            "no ocr_page elements found in hOCR data".to_string(),
        ));
    }
    debug!(
        pages = doc.pages.len(),
        words = doc.word_count(),
        "parsed hOCR document"
    );
    Ok(doc)
}

fn decode_markup(data: &[u8]) -> String {
    if let Some(label) = sniff_charset(data) {
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) if encoding != UTF_8 => {
                let (text, _, had_errors) = encoding.decode(data);
                if had_errors {
                    debug!(charset = %label, "hOCR input contained undecodable bytes");
                }
                return text.into_owned();
            }
            Some(_) => {}
            None => debug!(charset = %label, "unknown charset, assuming UTF-8"),
        }
    }
    String::from_utf8_lossy(data).into_owned()
}

fn sniff_charset(data: &[u8]) -> Option<String> {
    const NEEDLE: &[u8] = b"charset=";
    let start = data
        .windows(NEEDLE.len())
        .position(|window| window.eq_ignore_ascii_case(NEEDLE))?
        + NEEDLE.len();
    let label: String = data[start..]
        .iter()
        .skip_while(|b| matches!(b, b'"' | b'\''))
        .take_while(|b| !matches!(b, b'"' | b'\'' | b';' | b'>' | b'/') && !b.is_ascii_whitespace())
        .map(|b| *b as char)
        .collect();
    if label.is_empty() {
        None
    } else {
        Some(label.to_ascii_lowercase())
    }
}

fn classify(node: &NodeRef) -> Option<ElementKind> {
    let element = node.as_element()?;
    let attrs = element.attributes.borrow();
    let class = attrs.get("class")?;
    class.split_whitespace().find_map(ElementKind::from_class_token)
}

/// Gathers the nearest descendants that may hang under `parent`.
///
/// Elements of a kind the parent cannot hold are walked through, so their
/// descendants attach to the nearest legal container.
fn collect(node: &NodeRef, parent: Option<ElementKind>, out: &mut Vec<Element>) {
    for child in node.children() {
        let accepted = match (classify(&child), parent) {
            (Some(kind), None) if kind == ElementKind::Page => Some(kind),
            (Some(kind), Some(parent)) if parent.accepts(kind) => Some(kind),
            _ => None,
        };
        match accepted {
            Some(kind) => out.push(build(kind, &child)),
            None => collect(&child, parent, out),
        }
    }
}

struct Attrs {
    id: String,
    lang: String,
    title: String,
    props: Vec<TitleProperty>,
}

impl Attrs {
    fn read(node: &NodeRef) -> Self {
        let (id, lang, title) = match node.as_element() {
            Some(element) => {
                let attrs = element.attributes.borrow();
                let get = |name: &str| attrs.get(name).unwrap_or_default().to_string();
                (get("id"), get("lang"), get("title"))
            }
            None => Default::default(),
        };
        let props = title::parse_title(&title);
        let mut attrs = Self {
            id,
            lang,
            title,
            props,
        };
        if attrs.lang.is_empty() {
            if let Some(lang) = title::find(&attrs.props, "lang").and_then(TitleProperty::first) {
                attrs.lang = lang.to_string();
            }
        }
        attrs
    }

    fn bbox(&self) -> super::types::BoundingBox {
        title::find(&self.props, "bbox")
            .and_then(|prop| title::parse_bbox(&prop.values))
            .unwrap_or_default()
    }

    fn prop(&self, key: &str) -> Option<&TitleProperty> {
        title::find(&self.props, key)
    }

    /// Title properties not consumed into typed fields.
    fn metadata(&self, consumed: &[&str]) -> Metadata {
        self.props
            .iter()
            .filter(|prop| prop.key != "bbox" && prop.key != "lang")
            .filter(|prop| !consumed.contains(&prop.key.as_str()))
            .map(|prop| (prop.key.clone(), prop.joined()))
            .collect()
    }
}

fn build(kind: ElementKind, node: &NodeRef) -> Element {
    let attrs = Attrs::read(node);
    if kind == ElementKind::Word {
        return Element::Word(build_word(node, attrs));
    }

    let mut children = Vec::new();
    collect(node, Some(kind), &mut children);

    match kind {
        ElementKind::Page => {
            let mut page = Page {
                id: attrs.id.clone(),
                title: attrs.title.clone(),
                lang: attrs.lang.clone(),
                bbox: attrs.bbox(),
                metadata: attrs.metadata(&["image", "ppageno"]),
                ..Page::default()
            };
            if let Some(image) = attrs.prop("image") {
                page.image_name = title::unquote(&image.joined());
            }
            if let Some(number) = attrs.prop("ppageno").and_then(TitleProperty::first) {
                page.page_number = number.parse().unwrap_or_default();
            }
            for child in children {
                match child {
                    Element::Area(area) => page.areas.push(area),
                    Element::Paragraph(par) => page.paragraphs.push(par),
                    Element::Line(line) => page.lines.push(line),
                    Element::Word(word) => page.words.push(word),
                    Element::Page(_) => {}
                }
            }
            Element::Page(page)
        }
        ElementKind::Area => {
            let mut area = Area {
                id: attrs.id.clone(),
                lang: attrs.lang.clone(),
                bbox: attrs.bbox(),
                metadata: attrs.metadata(&[]),
                ..Area::default()
            };
            for child in children {
                match child {
                    Element::Paragraph(par) => area.paragraphs.push(par),
                    Element::Line(line) => area.lines.push(line),
                    Element::Word(word) => area.words.push(word),
                    Element::Page(_) | Element::Area(_) => {}
                }
            }
            Element::Area(area)
        }
        ElementKind::Paragraph => {
            let mut par = Paragraph {
                id: attrs.id.clone(),
                lang: attrs.lang.clone(),
                bbox: attrs.bbox(),
                metadata: attrs.metadata(&[]),
                ..Paragraph::default()
            };
            for child in children {
                match child {
                    Element::Line(line) => par.lines.push(line),
                    Element::Word(word) => par.words.push(word),
                    _ => {}
                }
            }
            Element::Paragraph(par)
        }
        ElementKind::Line => {
            let mut line = Line {
                id: attrs.id.clone(),
                lang: attrs.lang.clone(),
                bbox: attrs.bbox(),
                baseline: attrs.prop("baseline").map(TitleProperty::joined),
                metadata: attrs.metadata(&["baseline"]),
                ..Line::default()
            };
            for child in children {
                if let Element::Word(word) = child {
                    line.words.push(word);
                }
            }
            Element::Line(line)
        }
        ElementKind::Word => unreachable!("words are built before child collection"),
    }
}

fn build_word(node: &NodeRef, attrs: Attrs) -> Word {
    let confidence = attrs
        .prop("x_wconf")
        .and_then(TitleProperty::first)
        .and_then(|value| value.parse().ok())
        .unwrap_or_default();
    Word {
        text: node.text_contents().trim().to_string(),
        bbox: attrs.bbox(),
        confidence,
        metadata: attrs.metadata(&["x_wconf"]),
        id: attrs.id,
        lang: attrs.lang,
    }
}

fn read_document_meta(root: &NodeRef, doc: &mut Document) {
    for node in root.descendants() {
        let Some(element) = node.as_element() else {
            continue;
        };
        let attrs = element.attributes.borrow();
        match element.name.local.as_ref() {
            "html" => {
                if let Some(lang) = attrs.get("lang").or_else(|| attrs.get("xml:lang")) {
                    doc.language = lang.to_string();
                }
            }
            "title" => {
                if doc.title.is_empty() {
                    doc.title = node.text_contents().trim().to_string();
                }
            }
            "meta" => {
                let (Some(name), Some(content)) = (attrs.get("name"), attrs.get("content")) else {
                    continue;
                };
                if content.is_empty() {
                    continue;
                }
                match name {
                    "description" => doc.description = content.to_string(),
                    "dc.language" => doc.language = content.to_string(),
                    _ if name.starts_with("ocr-") => {
                        doc.metadata.insert(name.to_string(), content.to_string());
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
}
