use printpdf::BuiltinFont;
use tracing::debug;

use crate::settings::FontConfig;

/// Advance widths (1/1000 em) for WinAnsi codes 32..=255, from the Adobe
/// core font AFM files. Codes WinAnsi leaves undefined carry the bullet width.
type WidthTable = [u16; 224];

#[rustfmt::skip]
const HELVETICA: WidthTable = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 350,
    556, 350, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    350, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 350, 500, 667,
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

#[rustfmt::skip]
const HELVETICA_BOLD: WidthTable = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, 350,
    556, 350, 278, 556, 500, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    350, 278, 278, 500, 500, 350, 556, 1000, 333, 1000, 556, 333, 944, 350, 500, 667,
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

#[rustfmt::skip]
const TIMES_ROMAN: WidthTable = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, 350,
    500, 350, 333, 500, 444, 1000, 500, 500, 333, 1000, 556, 333, 889, 350, 611, 350,
    350, 333, 333, 444, 444, 350, 500, 1000, 333, 980, 389, 333, 722, 350, 444, 722,
    250, 333, 500, 500, 500, 500, 200, 500, 333, 760, 276, 500, 564, 333, 760, 333,
    400, 564, 300, 300, 333, 500, 453, 250, 333, 300, 310, 500, 750, 750, 750, 444,
    722, 722, 722, 722, 722, 722, 889, 667, 611, 611, 611, 611, 333, 333, 333, 333,
    722, 722, 722, 722, 722, 722, 722, 564, 722, 722, 722, 722, 722, 722, 556, 500,
    444, 444, 444, 444, 444, 444, 667, 444, 444, 444, 444, 444, 278, 278, 278, 278,
    500, 500, 500, 500, 500, 500, 500, 564, 500, 500, 500, 500, 500, 500, 500, 500,
];

#[rustfmt::skip]
const TIMES_BOLD: WidthTable = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520, 350,
    500, 350, 333, 500, 500, 1000, 500, 500, 333, 1000, 556, 333, 1000, 350, 667, 350,
    350, 333, 333, 500, 500, 350, 500, 1000, 333, 1000, 389, 333, 722, 350, 444, 722,
    250, 333, 500, 500, 500, 500, 220, 500, 333, 747, 300, 500, 570, 333, 747, 333,
    400, 570, 300, 300, 333, 556, 540, 250, 333, 300, 330, 500, 750, 750, 750, 500,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 389, 389, 389, 389,
    722, 722, 778, 778, 778, 778, 778, 570, 778, 722, 722, 722, 722, 722, 611, 556,
    500, 500, 500, 500, 500, 500, 722, 444, 444, 444, 444, 444, 278, 278, 278, 278,
    500, 556, 500, 500, 500, 500, 500, 570, 500, 556, 556, 556, 556, 500, 556, 500,
];

#[rustfmt::skip]
const TIMES_ITALIC: WidthTable = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500,
    920, 611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722,
    611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556, 389, 278, 389, 422, 500,
    333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722, 500, 500,
    500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541, 350,
    500, 350, 333, 500, 556, 889, 500, 500, 333, 1000, 500, 333, 944, 350, 556, 350,
    350, 333, 333, 556, 556, 350, 500, 889, 333, 980, 389, 333, 667, 350, 389, 556,
    250, 389, 500, 500, 500, 500, 275, 500, 333, 760, 276, 500, 675, 333, 760, 333,
    400, 675, 300, 300, 333, 500, 523, 250, 333, 300, 310, 500, 750, 750, 750, 500,
    611, 611, 611, 611, 611, 611, 889, 667, 611, 611, 611, 611, 333, 333, 333, 333,
    722, 667, 722, 722, 722, 722, 722, 675, 722, 722, 722, 722, 722, 556, 611, 500,
    500, 500, 500, 500, 500, 500, 667, 444, 444, 444, 444, 444, 278, 278, 278, 278,
    500, 500, 500, 500, 500, 500, 500, 675, 500, 500, 500, 500, 500, 444, 500, 444,
];

#[rustfmt::skip]
const TIMES_BOLD_ITALIC: WidthTable = [
    250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    832, 667, 667, 667, 722, 667, 667, 722, 778, 389, 500, 667, 611, 889, 722, 722,
    611, 722, 667, 556, 611, 722, 667, 889, 667, 611, 611, 333, 278, 333, 570, 500,
    333, 500, 500, 444, 500, 444, 333, 500, 556, 278, 278, 500, 278, 778, 556, 500,
    500, 500, 389, 389, 278, 556, 444, 667, 500, 444, 389, 348, 220, 348, 570, 350,
    500, 350, 333, 500, 500, 1000, 500, 500, 333, 1000, 556, 333, 944, 350, 611, 350,
    350, 333, 333, 500, 500, 350, 500, 1000, 333, 1000, 389, 333, 722, 350, 389, 611,
    250, 389, 500, 500, 500, 500, 220, 500, 333, 747, 266, 500, 606, 333, 747, 333,
    400, 570, 300, 300, 333, 576, 500, 250, 333, 300, 300, 500, 750, 750, 750, 500,
    667, 667, 667, 667, 667, 667, 944, 667, 667, 667, 667, 667, 389, 389, 389, 389,
    722, 722, 722, 722, 722, 722, 722, 570, 722, 722, 722, 722, 722, 611, 611, 500,
    500, 500, 500, 500, 500, 500, 722, 444, 444, 444, 444, 444, 278, 278, 278, 278,
    500, 556, 500, 500, 500, 500, 500, 570, 500, 556, 556, 556, 556, 444, 500, 444,
];

const COURIER: WidthTable = [600; 224];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFamily {
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "helvetica" | "arial" | "sans" | "sans-serif" => Some(FontFamily::Helvetica),
            "times" | "times-roman" | "times new roman" | "serif" => Some(FontFamily::Times),
            "courier" | "courier new" | "mono" | "monospace" => Some(FontFamily::Courier),
            _ => None,
        }
    }
}

/// One of the PDF standard fonts, which every viewer can render without
/// embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardFont {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
}

impl Default for StandardFont {
    fn default() -> Self {
        Self {
            family: FontFamily::Helvetica,
            bold: false,
            italic: false,
        }
    }
}

impl StandardFont {
    pub fn from_config(config: &FontConfig) -> Self {
        let family = FontFamily::parse(&config.family).unwrap_or_else(|| {
            debug!(
                "unknown font family '{}', falling back to Helvetica",
                config.family
            );
            FontFamily::Helvetica
        });
        let style = config.style.to_ascii_uppercase();
        Self {
            family,
            bold: style.contains('B'),
            italic: style.contains('I'),
        }
    }

    pub fn base_font_name(&self) -> &'static str {
        match (self.family, self.bold, self.italic) {
            (FontFamily::Helvetica, false, false) => "Helvetica",
            (FontFamily::Helvetica, true, false) => "Helvetica-Bold",
            (FontFamily::Helvetica, false, true) => "Helvetica-Oblique",
            (FontFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
            (FontFamily::Times, false, false) => "Times-Roman",
            (FontFamily::Times, true, false) => "Times-Bold",
            (FontFamily::Times, false, true) => "Times-Italic",
            (FontFamily::Times, true, true) => "Times-BoldItalic",
            (FontFamily::Courier, false, false) => "Courier",
            (FontFamily::Courier, true, false) => "Courier-Bold",
            (FontFamily::Courier, false, true) => "Courier-Oblique",
            (FontFamily::Courier, true, true) => "Courier-BoldOblique",
        }
    }

    pub fn builtin(&self) -> BuiltinFont {
        match (self.family, self.bold, self.italic) {
            (FontFamily::Helvetica, false, false) => BuiltinFont::Helvetica,
            (FontFamily::Helvetica, true, false) => BuiltinFont::HelveticaBold,
            (FontFamily::Helvetica, false, true) => BuiltinFont::HelveticaOblique,
            (FontFamily::Helvetica, true, true) => BuiltinFont::HelveticaBoldOblique,
            (FontFamily::Times, false, false) => BuiltinFont::TimesRoman,
            (FontFamily::Times, true, false) => BuiltinFont::TimesBold,
            (FontFamily::Times, false, true) => BuiltinFont::TimesItalic,
            (FontFamily::Times, true, true) => BuiltinFont::TimesBoldItalic,
            (FontFamily::Courier, false, false) => BuiltinFont::Courier,
            (FontFamily::Courier, true, false) => BuiltinFont::CourierBold,
            (FontFamily::Courier, false, true) => BuiltinFont::CourierOblique,
            (FontFamily::Courier, true, true) => BuiltinFont::CourierBoldOblique,
        }
    }

    // Helvetica obliques share the upright metrics; Times italics do not.
    fn table(&self) -> &'static WidthTable {
        match (self.family, self.bold, self.italic) {
            (FontFamily::Helvetica, false, _) => &HELVETICA,
            (FontFamily::Helvetica, true, _) => &HELVETICA_BOLD,
            (FontFamily::Times, false, false) => &TIMES_ROMAN,
            (FontFamily::Times, true, false) => &TIMES_BOLD,
            (FontFamily::Times, false, true) => &TIMES_ITALIC,
            (FontFamily::Times, true, true) => &TIMES_BOLD_ITALIC,
            (FontFamily::Courier, _, _) => &COURIER,
        }
    }

    fn fallback_width(&self) -> u16 {
        match self.family {
            FontFamily::Helvetica => 556,
            FontFamily::Times => 500,
            FontFamily::Courier => 600,
        }
    }

    pub fn glyph_width(&self, code: u8) -> u16 {
        match code {
            32..=255 => self.table()[(code - 32) as usize],
            _ => self.fallback_width(),
        }
    }

    /// Width in points of `bytes` set at `size`, one glyph per byte.
    pub fn text_width(&self, bytes: &[u8], size: f64) -> f64 {
        let units: u32 = bytes.iter().map(|b| self.glyph_width(*b) as u32).sum();
        units as f64 * size / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font(family: &str, style: &str) -> StandardFont {
        StandardFont::from_config(&FontConfig {
            family: family.to_string(),
            style: style.to_string(),
            ..FontConfig::default()
        })
    }

    #[test]
    fn maps_family_and_style_to_base_font() {
        assert_eq!(font("Helvetica", "").base_font_name(), "Helvetica");
        assert_eq!(font("helvetica", "BI").base_font_name(), "Helvetica-BoldOblique");
        assert_eq!(font("Times", "I").base_font_name(), "Times-Italic");
        assert_eq!(font("Courier", "b").base_font_name(), "Courier-Bold");
        assert_eq!(font("Comic Sans", "").base_font_name(), "Helvetica");
    }

    #[test]
    fn measures_with_afm_widths() {
        let helvetica = font("Helvetica", "");
        // H=722 e=556 l=222 l=222 o=556
        let width = helvetica.text_width(b"Hello", 10.0);
        assert!((width - 22.78).abs() < 1e-9);

        let courier = font("Courier", "");
        assert!((courier.text_width(b"abc", 10.0) - 18.0).abs() < 1e-9);
        assert_eq!(courier.text_width(b"", 10.0), 0.0);
    }

    #[test]
    fn latin1_letters_have_their_own_widths() {
        let helvetica = font("Helvetica", "");
        assert_eq!(helvetica.glyph_width(0xDE), 667); // Thorn
        assert_eq!(helvetica.glyph_width(0xC4), 667); // Adieresis
        assert_eq!(helvetica.glyph_width(0xF3), 556); // oacute
        assert_eq!(helvetica.glyph_width(0xDF), 611); // germandbls
        assert_eq!(font("Helvetica", "B").glyph_width(0xE7), 556); // ccedilla
        assert_eq!(font("Helvetica", "I").glyph_width(0xDE), 667);

        let times = font("Times", "");
        assert_eq!(times.glyph_width(0xE9), 444);
        assert_eq!(times.glyph_width(0xC6), 889);
        assert_eq!(times.glyph_width(b' '), 250);

        // Thorn 667, oacute 556, r 333
        let width = helvetica.text_width(&[0xDE, 0xF3, b'r'], 10.0);
        assert!((width - 15.56).abs() < 1e-9);
    }

    #[test]
    fn times_styles_use_their_own_tables() {
        assert_eq!(font("Times", "").glyph_width(b'a'), 444);
        assert_eq!(font("Times", "B").glyph_width(b'a'), 500);
        assert_eq!(font("Times", "I").glyph_width(b'A'), 611);
        assert_eq!(font("Times", "BI").glyph_width(b'A'), 667);
        assert_eq!(font("Times", "B").glyph_width(0xDE), 611);
        assert_eq!(font("Times", "I").glyph_width(0xD1), 667);
    }

    #[test]
    fn control_bytes_use_fallback_width() {
        assert_eq!(font("Times", "").glyph_width(0x09), 500);
        assert_eq!(font("Courier", "BI").glyph_width(0xFF), 600);
    }
}
