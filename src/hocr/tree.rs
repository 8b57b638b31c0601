use std::collections::BTreeSet;

use super::types::{Area, BoundingBox, Document, Line, Page, Paragraph, Word};

/// The five hOCR element kinds this crate models, ordered from the root down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementKind {
    Page,
    Area,
    Paragraph,
    Line,
    Word,
}

impl ElementKind {
    /// Class emitted by the generator.
    pub fn class_name(self) -> &'static str {
        match self {
            ElementKind::Page => "ocr_page",
            ElementKind::Area => "ocr_carea",
            ElementKind::Paragraph => "ocr_par",
            ElementKind::Line => "ocr_line",
            ElementKind::Word => "ocrx_word",
        }
    }

    pub fn from_class_token(token: &str) -> Option<Self> {
        match token {
            "ocr_page" => Some(ElementKind::Page),
            "ocr_carea" => Some(ElementKind::Area),
            "ocr_par" => Some(ElementKind::Paragraph),
            "ocr_line" | "ocr_header" | "ocr_caption" | "ocr_textfloat" => {
                Some(ElementKind::Line)
            }
            "ocrx_word" | "ocr_word" => Some(ElementKind::Word),
            _ => None,
        }
    }

    /// Whether an element of kind `child` may hang directly under `self`.
    pub fn accepts(self, child: ElementKind) -> bool {
        child > self
    }
}

/// Borrowed view over any level of the layout tree.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Page(&'a Page),
    Area(&'a Area),
    Paragraph(&'a Paragraph),
    Line(&'a Line),
    Word(&'a Word),
}

impl<'a> Node<'a> {
    pub fn kind(&self) -> ElementKind {
        match self {
            Node::Page(_) => ElementKind::Page,
            Node::Area(_) => ElementKind::Area,
            Node::Paragraph(_) => ElementKind::Paragraph,
            Node::Line(_) => ElementKind::Line,
            Node::Word(_) => ElementKind::Word,
        }
    }

    pub fn lang(&self) -> &'a str {
        match self {
            Node::Page(page) => &page.lang,
            Node::Area(area) => &area.lang,
            Node::Paragraph(par) => &par.lang,
            Node::Line(line) => &line.lang,
            Node::Word(word) => &word.lang,
        }
    }

    pub fn bbox(&self) -> &'a BoundingBox {
        match self {
            Node::Page(page) => &page.bbox,
            Node::Area(area) => &area.bbox,
            Node::Paragraph(par) => &par.bbox,
            Node::Line(line) => &line.bbox,
            Node::Word(word) => &word.bbox,
        }
    }

    /// Children in canonical order: areas, paragraphs, lines, then direct words.
    pub fn children(&self) -> Vec<Node<'a>> {
        let mut out = Vec::new();
        match self {
            Node::Page(page) => {
                out.extend(page.areas.iter().map(Node::Area));
                out.extend(page.paragraphs.iter().map(Node::Paragraph));
                out.extend(page.lines.iter().map(Node::Line));
                out.extend(page.words.iter().map(Node::Word));
            }
            Node::Area(area) => {
                out.extend(area.paragraphs.iter().map(Node::Paragraph));
                out.extend(area.lines.iter().map(Node::Line));
                out.extend(area.words.iter().map(Node::Word));
            }
            Node::Paragraph(par) => {
                out.extend(par.lines.iter().map(Node::Line));
                out.extend(par.words.iter().map(Node::Word));
            }
            Node::Line(line) => out.extend(line.words.iter().map(Node::Word)),
            Node::Word(_) => {}
        }
        out
    }
}

pub fn walk_post_order<'a, F>(node: Node<'a>, visit: &mut F)
where
    F: FnMut(Node<'a>),
{
    for child in node.children() {
        walk_post_order(child, visit);
    }
    visit(node);
}

impl Paragraph {
    pub fn all_words(&self) -> impl Iterator<Item = &Word> + '_ {
        self.lines
            .iter()
            .flat_map(|line| line.words.iter())
            .chain(self.words.iter())
    }
}

impl Area {
    pub fn all_words(&self) -> impl Iterator<Item = &Word> + '_ {
        self.paragraphs
            .iter()
            .flat_map(|par| par.all_words())
            .chain(self.lines.iter().flat_map(|line| line.words.iter()))
            .chain(self.words.iter())
    }
}

impl Page {
    /// Every word on the page exactly once, whatever its attachment depth.
    pub fn all_words(&self) -> impl Iterator<Item = &Word> + '_ {
        self.areas
            .iter()
            .flat_map(|area| area.all_words())
            .chain(self.paragraphs.iter().flat_map(|par| par.all_words()))
            .chain(self.lines.iter().flat_map(|line| line.words.iter()))
            .chain(self.words.iter())
    }

    pub fn word_count(&self) -> usize {
        self.all_words().count()
    }
}

impl Document {
    pub fn word_count(&self) -> usize {
        self.pages.iter().map(Page::word_count).sum()
    }

    /// Every language tag used anywhere in the document, sorted.
    pub fn languages(&self) -> BTreeSet<String> {
        let mut langs = BTreeSet::new();
        if !self.language.trim().is_empty() {
            langs.insert(self.language.trim().to_string());
        }
        for page in &self.pages {
            walk_post_order(Node::Page(page), &mut |node| {
                let lang = node.lang().trim();
                if !lang.is_empty() {
                    langs.insert(lang.to_string());
                }
            });
        }
        langs
    }

    /// Plain text, one output line per text line and a blank line between pages.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for page in &self.pages {
            for area in &page.areas {
                for par in &area.paragraphs {
                    push_paragraph(&mut out, par);
                }
                for line in &area.lines {
                    push_words(&mut out, &line.words);
                }
                push_words(&mut out, &area.words);
            }
            for par in &page.paragraphs {
                push_paragraph(&mut out, par);
            }
            for line in &page.lines {
                push_words(&mut out, &line.words);
            }
            push_words(&mut out, &page.words);
            out.push('\n');
        }
        out
    }
}

fn push_paragraph(out: &mut String, par: &Paragraph) {
    for line in &par.lines {
        push_words(out, &line.words);
    }
    push_words(out, &par.words);
}

fn push_words(out: &mut String, words: &[Word]) {
    if words.is_empty() {
        return;
    }
    let text = words
        .iter()
        .map(|word| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    out.push_str(&text);
    out.push('\n');
}
