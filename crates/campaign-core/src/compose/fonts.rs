//! Standard Type1 Helvetica family: resource names, metrics, WinAnsi encoding.

/// The four faces the renderer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub const ALL: [FontStyle; 4] = [
        FontStyle::Regular,
        FontStyle::Bold,
        FontStyle::Italic,
        FontStyle::BoldItalic,
    ];

    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontStyle::Regular,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (true, true) => FontStyle::BoldItalic,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }

    /// Name of the font in the page resource dictionary.
    pub fn resource_name(self) -> &'static str {
        match self {
            FontStyle::Regular => "F1",
            FontStyle::Bold => "F2",
            FontStyle::Italic => "F3",
            FontStyle::BoldItalic => "F4",
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            FontStyle::Regular => "Helvetica",
            FontStyle::Bold => "Helvetica-Bold",
            FontStyle::Italic => "Helvetica-Oblique",
            FontStyle::BoldItalic => "Helvetica-BoldOblique",
        }
    }
}

/// Width of rendered text, in points.
pub trait TextMeasurer: Send + Sync {
    fn text_width(&self, text: &str, style: FontStyle, size: f32) -> f32;
}

/// AFM advance widths of the base-14 Helvetica faces. Oblique faces share
/// the upright widths.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelveticaMetrics;

// Glyph widths for ASCII 32..=126, in 1/1000 em.
#[rustfmt::skip]
const REGULAR: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const DEFAULT_WIDTH: u16 = 556;

impl HelveticaMetrics {
    /// Width of one character in 1/1000 em.
    pub fn glyph_width(c: char, bold: bool) -> u16 {
        let table = if bold { &BOLD } else { &REGULAR };
        if let Some(w) = ascii_width(c, table) {
            return w;
        }
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201a}' => if bold { 278 } else { 222 },
            '\u{201c}' | '\u{201d}' | '\u{201e}' => if bold { 500 } else { 333 },
            '\u{2013}' | '\u{20ac}' | '\u{ab}' | '\u{bb}' => 556,
            '\u{2014}' | '\u{2026}' | '\u{152}' | '\u{c6}' => 1000,
            '\u{153}' => 944,
            '\u{e6}' => 889,
            '\u{b0}' => 400,
            '\u{2022}' => 350,
            '\u{a0}' => 278,
            '\u{df}' => 611,
            _ => fold_accent(c)
                .and_then(|base| ascii_width(base, table))
                .unwrap_or(DEFAULT_WIDTH),
        }
    }
}

fn ascii_width(c: char, table: &[u16; 95]) -> Option<u16> {
    let code = c as u32;
    if (32..=126).contains(&code) {
        Some(table[(code - 32) as usize])
    } else {
        None
    }
}

/// Base letter of a Latin-1 accented letter.
fn fold_accent(c: char) -> Option<char> {
    Some(match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' | 'Ÿ' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'š' => 's',
        _ => return None,
    })
}

impl TextMeasurer for HelveticaMetrics {
    fn text_width(&self, text: &str, style: FontStyle, size: f32) -> f32 {
        let bold = style.is_bold();
        let units: u32 = text
            .chars()
            .map(|c| u32::from(Self::glyph_width(c, bold)))
            .sum();
        units as f32 * size / 1000.0
    }
}

/// Encode text for a WinAnsiEncoding simple font. Characters outside the
/// code page become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            match c {
                '\u{20ac}' => 0x80,
                '\u{201a}' => 0x82,
                '\u{201e}' => 0x84,
                '\u{2026}' => 0x85,
                '\u{152}' => 0x8c,
                '\u{2018}' => 0x91,
                '\u{2019}' => 0x92,
                '\u{201c}' => 0x93,
                '\u{201d}' => 0x94,
                '\u{2022}' => 0x95,
                '\u{2013}' => 0x96,
                '\u{2014}' => 0x97,
                '\u{2122}' => 0x99,
                '\u{161}' => 0x9a,
                '\u{153}' => 0x9c,
                '\u{178}' => 0x9f,
                _ if (0x20..=0x7e).contains(&code) || (0xa0..=0xff).contains(&code) => {
                    code as u8
                }
                _ => b'?',
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_flags_and_names() {
        assert_eq!(FontStyle::from_flags(true, true), FontStyle::BoldItalic);
        assert_eq!(FontStyle::Italic.resource_name(), "F3");
        assert_eq!(FontStyle::Bold.base_font(), "Helvetica-Bold");
        assert!(FontStyle::BoldItalic.is_bold());
        assert!(!FontStyle::Italic.is_bold());
    }

    #[test]
    fn afm_widths() {
        let m = HelveticaMetrics;
        // "Hello" = 722 + 556 + 222 + 222 + 556
        let w = m.text_width("Hello", FontStyle::Regular, 10.0);
        assert!((w - 22.78).abs() < 1e-3);
        assert!(m.text_width("Hello", FontStyle::Bold, 10.0) > w);
        assert_eq!(m.text_width("Hello", FontStyle::Italic, 10.0), w);
        assert_eq!(m.text_width("", FontStyle::Regular, 12.0), 0.0);
    }

    #[test]
    fn accents_measure_as_base_letters() {
        assert_eq!(
            HelveticaMetrics::glyph_width('é', false),
            HelveticaMetrics::glyph_width('e', false)
        );
        assert_eq!(HelveticaMetrics::glyph_width('\u{2014}', true), 1000);
        assert_eq!(HelveticaMetrics::glyph_width('漢', false), DEFAULT_WIDTH);
    }

    #[test]
    fn win_ansi_code_page() {
        assert_eq!(encode_win_ansi("Aé"), vec![b'A', 0xe9]);
        assert_eq!(encode_win_ansi("l\u{2019}€"), vec![b'l', 0x92, 0x80]);
        assert_eq!(encode_win_ansi("œ\u{2014}"), vec![0x9c, 0x97]);
        assert_eq!(encode_win_ansi("漢\n"), vec![b'?', b'?']);
    }
}
