use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::tree::ElementKind;
use super::types::{Area, BoundingBox, Document, Line, Metadata, Page, Paragraph, Word};

const OCR_SYSTEM: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));
const OCR_CAPABILITIES: &str = "ocr_page ocr_carea ocr_par ocr_line ocrx_word ocrp_lang ocrp_wconf";

/// Serializes a document as XHTML hOCR.
pub fn generate_hocr(doc: &Document) -> String {
    let mut writer = HocrWriter::default();
    writer.document(doc);
    writer.out
}

#[derive(Default)]
struct IdCounters {
    page: usize,
    block: usize,
    par: usize,
    line: usize,
    word: usize,
}

impl IdCounters {
    fn next(&mut self, kind: ElementKind) -> String {
        let (prefix, counter) = match kind {
            ElementKind::Page => return format!("page_{}", self.page),
            ElementKind::Area => ("block", &mut self.block),
            ElementKind::Paragraph => ("par", &mut self.par),
            ElementKind::Line => ("line", &mut self.line),
            ElementKind::Word => ("word", &mut self.word),
        };
        *counter += 1;
        format!("{}_{}_{}", prefix, self.page, counter)
    }
}

#[derive(Default)]
struct HocrWriter {
    out: String,
    ids: IdCounters,
}

impl HocrWriter {
    fn document(&mut self, doc: &Document) {
        self.out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.out.push_str(
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\"\n    \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">\n",
        );
        if doc.language.is_empty() {
            self.out
                .push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\">\n");
        } else {
            let lang = escape_xml(&doc.language);
            let _ = writeln!(
                self.out,
                "<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"{lang}\" lang=\"{lang}\">"
            );
        }
        self.out.push_str(" <head>\n");
        let _ = writeln!(self.out, "  <title>{}</title>", escape_xml(&doc.title));
        self.out.push_str(
            "  <meta http-equiv=\"Content-Type\" content=\"text/html;charset=utf-8\"/>\n",
        );
        if !doc.description.is_empty() {
            meta(&mut self.out, "description", &doc.description);
        }
        for (name, content) in document_meta(doc) {
            meta(&mut self.out, &name, &content);
        }
        self.out.push_str(" </head>\n <body>\n");
        for page in &doc.pages {
            self.page(page);
        }
        self.out.push_str(" </body>\n</html>\n");
    }

    fn page(&mut self, page: &Page) {
        self.ids.page += 1;
        self.ids.block = 0;
        self.ids.par = 0;
        self.ids.line = 0;
        self.ids.word = 0;

        let mut title = Vec::new();
        if !page.image_name.is_empty() {
            title.push(format!("image \"{}\"", page.image_name));
        }
        title.push(bbox_prop(&page.bbox));
        title.push(format!("ppageno {}", page.page_number));
        push_metadata(&mut title, &page.metadata);

        self.open(2, "div", ElementKind::Page, &page.id, &page.lang, &title);
        for area in &page.areas {
            self.area(area, 3);
        }
        for par in &page.paragraphs {
            self.paragraph(par, 3);
        }
        for line in &page.lines {
            self.line(line, 3);
        }
        for word in &page.words {
            self.word(word, 3);
        }
        self.close(2, "div");
    }

    fn area(&mut self, area: &Area, depth: usize) {
        let mut title = vec![bbox_prop(&area.bbox)];
        push_metadata(&mut title, &area.metadata);
        self.open(depth, "div", ElementKind::Area, &area.id, &area.lang, &title);
        for par in &area.paragraphs {
            self.paragraph(par, depth + 1);
        }
        for line in &area.lines {
            self.line(line, depth + 1);
        }
        for word in &area.words {
            self.word(word, depth + 1);
        }
        self.close(depth, "div");
    }

    fn paragraph(&mut self, par: &Paragraph, depth: usize) {
        let mut title = vec![bbox_prop(&par.bbox)];
        push_metadata(&mut title, &par.metadata);
        self.open(depth, "p", ElementKind::Paragraph, &par.id, &par.lang, &title);
        for line in &par.lines {
            self.line(line, depth + 1);
        }
        for word in &par.words {
            self.word(word, depth + 1);
        }
        self.close(depth, "p");
    }

    fn line(&mut self, line: &Line, depth: usize) {
        let mut title = vec![bbox_prop(&line.bbox)];
        if let Some(baseline) = line.baseline.as_deref().filter(|b| !b.is_empty()) {
            title.push(format!("baseline {}", baseline));
        }
        push_metadata(&mut title, &line.metadata);
        self.open(depth, "span", ElementKind::Line, &line.id, &line.lang, &title);
        for word in &line.words {
            self.word(word, depth + 1);
        }
        self.close(depth, "span");
    }

    fn word(&mut self, word: &Word, depth: usize) {
        let mut title = vec![bbox_prop(&word.bbox)];
        if word.confidence != 0.0 {
            title.push(format!("x_wconf {}", word.confidence));
        }
        push_metadata(&mut title, &word.metadata);
        let id = self.id_for(ElementKind::Word, &word.id);
        let _ = writeln!(
            self.out,
            "{}<span class=\"{}\" id=\"{}\"{} title=\"{}\">{}</span>",
            indent(depth),
            ElementKind::Word.class_name(),
            escape_xml(&id),
            lang_attr(&word.lang),
            escape_xml(&title.join("; ")),
            escape_xml(&word.text)
        );
    }

    fn open(
        &mut self,
        depth: usize,
        tag: &str,
        kind: ElementKind,
        id: &str,
        lang: &str,
        title: &[String],
    ) {
        let id = self.id_for(kind, id);
        let _ = writeln!(
            self.out,
            "{}<{} class=\"{}\" id=\"{}\"{} title=\"{}\">",
            indent(depth),
            tag,
            kind.class_name(),
            escape_xml(&id),
            lang_attr(lang),
            escape_xml(&title.join("; "))
        );
    }

    fn close(&mut self, depth: usize, tag: &str) {
        let _ = writeln!(self.out, "{}</{}>", indent(depth), tag);
    }

    fn id_for(&mut self, kind: ElementKind, id: &str) -> String {
        if id.is_empty() {
            self.ids.next(kind)
        } else {
            id.to_string()
        }
    }
}

/// Document metadata with defaults filled in for keys the caller did not set.
fn document_meta(doc: &Document) -> BTreeMap<String, String> {
    let mut meta = doc.metadata.clone();
    meta.entry("ocr-system".to_string())
        .or_insert_with(|| OCR_SYSTEM.to_string());
    meta.entry("ocr-capabilities".to_string())
        .or_insert_with(|| OCR_CAPABILITIES.to_string());
    meta.entry("ocr-number-of-pages".to_string())
        .or_insert_with(|| doc.pages.len().to_string());
    meta.entry("ocr-langs".to_string()).or_insert_with(|| {
        let langs = doc.languages();
        if langs.is_empty() {
            "unknown".to_string()
        } else {
            langs.into_iter().collect::<Vec<_>>().join(" ")
        }
    });
    meta
}

fn meta(out: &mut String, name: &str, content: &str) {
    let _ = writeln!(
        out,
        "  <meta name=\"{}\" content=\"{}\"/>",
        escape_xml(name),
        escape_xml(content)
    );
}

fn bbox_prop(bbox: &BoundingBox) -> String {
    format!("bbox {} {} {} {}", bbox.x1, bbox.y1, bbox.x2, bbox.y2)
}

fn push_metadata(title: &mut Vec<String>, metadata: &Metadata) {
    for (key, value) in metadata {
        if value.is_empty() {
            title.push(key.clone());
        } else {
            title.push(format!("{} {}", key, value));
        }
    }
}

fn lang_attr(lang: &str) -> String {
    if lang.is_empty() {
        String::new()
    } else {
        format!(" lang=\"{}\"", escape_xml(lang))
    }
}

fn indent(depth: usize) -> String {
    " ".repeat(depth)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hocr::parse::parse_hocr;

    fn one_word_doc() -> Document {
        let mut page = Page::new(BoundingBox::new(0.0, 0.0, 800.0, 600.0));
        let mut word = Word::new("Hello", BoundingBox::new(10.5, 20.0, 110.0, 45.0));
        word.confidence = 93.0;
        page.lines
            .push(Line::new(BoundingBox::new(10.0, 20.0, 110.0, 45.0), vec![word]));
        Document {
            pages: vec![page],
            ..Document::default()
        }
    }

    #[test]
    fn round_trip_preserves_text_and_boxes() {
        let doc = one_word_doc();
        let parsed = parse_hocr(generate_hocr(&doc).as_bytes()).expect("parse");
        assert_eq!(parsed.pages.len(), 1);
        let word = &parsed.pages[0].lines[0].words[0];
        assert_eq!(word.text, "Hello");
        assert_eq!(word.bbox, BoundingBox::new(10.5, 20.0, 110.0, 45.0));
        assert_eq!(word.confidence, 93.0);
        assert_eq!(parsed.pages[0].bbox, doc.pages[0].bbox);
    }

    #[test]
    fn zero_confidence_is_omitted() {
        let mut doc = one_word_doc();
        doc.pages[0].lines[0].words[0].confidence = 0.0;
        let html = generate_hocr(&doc);
        assert!(!html.contains("x_wconf"));
    }

    #[test]
    fn default_metadata_does_not_override_caller_values() {
        let mut doc = one_word_doc();
        doc.metadata
            .insert("ocr-system".to_string(), "my engine".to_string());
        let html = generate_hocr(&doc);
        assert!(html.contains("<meta name=\"ocr-system\" content=\"my engine\"/>"));
        assert!(!html.contains(OCR_SYSTEM));
        assert!(html.contains("<meta name=\"ocr-number-of-pages\" content=\"1\"/>"));
        assert!(html.contains("<meta name=\"ocr-langs\" content=\"unknown\"/>"));
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let mut doc = one_word_doc();
        doc.title = "R&D <draft>".to_string();
        doc.pages[0].lines[0].words[0].text = "a<b & \"c\"".to_string();
        doc.pages[0].image_name = "it's.png".to_string();
        let html = generate_hocr(&doc);
        assert!(html.contains("<title>R&amp;D &lt;draft&gt;</title>"));
        assert!(html.contains(">a&lt;b &amp; &quot;c&quot;</span>"));

        let parsed = parse_hocr(html.as_bytes()).expect("parse");
        assert_eq!(parsed.title, "R&D <draft>");
        assert_eq!(parsed.pages[0].lines[0].words[0].text, "a<b & \"c\"");
        assert_eq!(parsed.pages[0].image_name, "it's.png");
    }

    #[test]
    fn round_trip_keeps_every_shortcut() {
        let mut page = Page::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let word = |text: &str| Word::new(text, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        page.areas.push(Area {
            paragraphs: vec![Paragraph {
                lines: vec![Line::new(BoundingBox::default(), vec![word("a")])],
                words: vec![word("b")],
                ..Paragraph::default()
            }],
            lines: vec![Line::new(BoundingBox::default(), vec![word("c")])],
            words: vec![word("d")],
            ..Area::default()
        });
        page.paragraphs.push(Paragraph {
            words: vec![word("e")],
            ..Paragraph::default()
        });
        page.lines.push(Line::new(BoundingBox::default(), vec![word("f")]));
        page.words.push(word("g"));
        let doc = Document {
            pages: vec![page],
            ..Document::default()
        };

        let parsed = parse_hocr(generate_hocr(&doc).as_bytes()).expect("parse");
        let page = &parsed.pages[0];
        assert_eq!(page.areas[0].paragraphs[0].lines[0].words[0].text, "a");
        assert_eq!(page.areas[0].paragraphs[0].words[0].text, "b");
        assert_eq!(page.areas[0].lines[0].words[0].text, "c");
        assert_eq!(page.areas[0].words[0].text, "d");
        assert_eq!(page.paragraphs[0].words[0].text, "e");
        assert_eq!(page.lines[0].words[0].text, "f");
        assert_eq!(page.words[0].text, "g");
        assert_eq!(parsed.word_count(), 7);
    }

    #[test]
    fn synthesizes_missing_ids_per_page() {
        let doc = Document {
            pages: vec![one_word_doc().pages[0].clone(), one_word_doc().pages[0].clone()],
            ..Document::default()
        };
        let html = generate_hocr(&doc);
        assert!(html.contains("id=\"page_2\""));
        assert!(html.contains("id=\"line_2_1\""));
        assert!(html.contains("id=\"word_2_1\""));
    }
}
