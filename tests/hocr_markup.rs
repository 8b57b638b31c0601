use std::collections::BTreeMap;

use hocr_pdf_layer::hocr::{BoundingBox, Document, Line, Page, Paragraph, Word};
use hocr_pdf_layer::{OcrError, generate_hocr, parse_hocr};

fn sample_document() -> Document {
    let mut hello = Word::new("Hello", BoundingBox::new(10.0, 20.0, 60.0, 45.0));
    hello.confidence = 93.0;
    let company = Word::new("&co", BoundingBox::new(65.0, 20.0, 110.0, 45.0));

    let mut line = Line::new(BoundingBox::new(10.0, 20.0, 110.0, 45.0), vec![hello, company]);
    line.baseline = Some("0 -5".to_string());

    let paragraph = Paragraph {
        bbox: BoundingBox::new(10.0, 20.0, 110.0, 45.0),
        lines: vec![line],
        ..Paragraph::default()
    };

    let mut page = Page::new(BoundingBox::new(0.0, 0.0, 800.0, 600.0));
    page.image_name = "scan.png".to_string();
    page.paragraphs.push(paragraph);

    let mut metadata = BTreeMap::new();
    metadata.insert("ocr-system".to_string(), "test-engine".to_string());
    Document {
        title: "Sample".to_string(),
        language: "en".to_string(),
        metadata,
        pages: vec![page],
        ..Document::default()
    }
}

#[test]
fn generated_markup() {
    let hocr = generate_hocr(&sample_document());
    insta::assert_snapshot!(hocr);
}

#[test]
fn generated_markup_parses_back() {
    let document = sample_document();
    let parsed = parse_hocr(generate_hocr(&document).as_bytes()).expect("parse");

    assert_eq!(parsed.pages.len(), 1);
    assert_eq!(parsed.title, "Sample");
    assert_eq!(parsed.language, "en");
    let page = &parsed.pages[0];
    assert_eq!(page.image_name, "scan.png");
    assert_eq!(page.bbox, BoundingBox::new(0.0, 0.0, 800.0, 600.0));

    let line = &page.paragraphs[0].lines[0];
    assert_eq!(line.baseline.as_deref(), Some("0 -5"));
    let texts: Vec<&str> = line.words.iter().map(|w| w.text.as_str()).collect();
    assert_eq!(texts, ["Hello", "&co"]);
    assert_eq!(line.words[0].confidence, 93.0);
    assert_eq!(line.words[1].confidence, 0.0);
    assert_eq!(parsed.plain_text(), "Hello &co\n\n");
}

#[test]
fn tesseract_output_parses() {
    let markup = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN"
    "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en" lang="en">
 <head>
  <title></title>
  <meta http-equiv="Content-Type" content="text/html;charset=utf-8"/>
  <meta name='ocr-system' content='tesseract 5.3.0' />
 </head>
 <body>
  <div class='ocr_page' id='page_1' title='image "in.png"; bbox 0 0 1240 1754; ppageno 0; scan_res 150 150'>
   <div class='ocr_carea' id='block_1_1' title="bbox 100 120 700 180">
    <p class='ocr_par' id='par_1_1' lang='eng' title="bbox 100 120 700 180">
     <span class='ocr_line' id='line_1_1' title="bbox 100 120 700 150; baseline 0 -6; x_size 30; x_descenders 6; x_ascenders 8">
      <span class='ocrx_word' id='word_1_1' title='bbox 100 120 250 150; x_wconf 96'>Invoice</span>
      <span class='ocrx_word' id='word_1_2' title='bbox 270 120 400 150; x_wconf 91'>2024-01</span>
     </span>
     <span class='ocr_header' id='line_1_2' title="bbox 100 155 300 180; baseline 0 -4">
      <span class='ocrx_word' id='word_1_3' title='bbox 100 155 300 180; x_wconf 88'>Total</span>
     </span>
    </p>
   </div>
  </div>
 </body>
</html>"#;

    let document = parse_hocr(markup.as_bytes()).expect("parse");
    assert_eq!(document.metadata.get("ocr-system").map(String::as_str), Some("tesseract 5.3.0"));
    let page = &document.pages[0];
    assert_eq!(page.image_name, "in.png");
    assert_eq!(page.metadata.get("scan_res").map(String::as_str), Some("150 150"));
    assert_eq!(page.word_count(), 3);
    assert_eq!(page.areas[0].paragraphs[0].lang, "eng");
    assert_eq!(page.areas[0].paragraphs[0].lines.len(), 2);
    assert!(document.languages().contains("eng"));
}

#[test]
fn markup_without_pages_is_malformed() {
    let err = parse_hocr(b"<html><body><p>no OCR here</p></body></html>").expect_err("no pages");
    assert!(matches!(err, OcrError::MalformedInput(_)));
}
