//! Font handling for text extraction
//!
//! Turns the bytes of a show-text operand into glyphs: Unicode text, the
//! advance width in glyph space, and whether the code is a word space.
//!
//! Width sources, in order:
//! 1. `/Widths` + `/FirstChar` (simple fonts) or `/W` + `/DW` (composite fonts)
//! 2. Built-in AFM widths for the common standard-14 faces
//! 3. `/MissingWidth`, else [`DEFAULT_WIDTH`]
//!
//! Unicode sources, in order: `/ToUnicode`, `/Differences` glyph names,
//! then WinAnsi.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::{name_of, number, resolve, stream_bytes};

/// Default ascent (750/1000 of text space)
const DEFAULT_ASCENT: f32 = 750.0;

/// Default descent (-250/1000 of text space)
const DEFAULT_DESCENT: f32 = -250.0;

/// Width used when no other source knows the glyph
const DEFAULT_WIDTH: f32 = 500.0;

/// Default width for composite fonts without `/DW`
const DEFAULT_CID_WIDTH: f32 = 1000.0;

/// Upper bound on entries expanded from a single `bfrange`
const MAX_RANGE_ENTRIES: u32 = 0x1_0000;

/// A decoded character code
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Glyph {
    pub text: String,
    /// Advance in glyph space (1/1000 of text space)
    pub width: f32,
    /// Single-byte code 32, which receives word spacing
    pub is_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    Simple { first_char: u32, widths: Vec<f32> },
    Standard(&'static [u16; 95]),
    Composite { widths: HashMap<u32, f32> },
    Monospace(f32),
    None,
}

/// Everything the interpreter needs to know about a font resource
#[derive(Debug, Clone)]
pub(super) struct FontInfo {
    /// `/BaseFont` without the subset tag
    pub name: Option<String>,
    pub ascent: f32,
    pub descent: f32,
    composite: bool,
    widths: Widths,
    missing_width: f32,
    to_unicode: Option<HashMap<u32, String>>,
    differences: HashMap<u32, String>,
}

impl FontInfo {
    /// Font used when `Tf` names a resource that does not exist
    pub fn fallback() -> Self {
        Self {
            name: None,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
            composite: false,
            widths: Widths::None,
            missing_width: DEFAULT_WIDTH,
            to_unicode: None,
            differences: HashMap::new(),
        }
    }

    /// Load a font dictionary
    pub fn load(doc: &Document, dict: &Dictionary) -> Self {
        let subtype = dict.get(b"Subtype").ok().and_then(name_of).unwrap_or_default();
        let composite = subtype == "Type0";
        let name = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| name_of(resolve(doc, o)))
            .map(|n| strip_subset_tag(&n).to_string());

        // Composite fonts keep metrics on their first descendant
        let metrics_dict = if composite {
            dict.get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve(doc, o).as_dict().ok())
                .unwrap_or(dict)
        } else {
            dict
        };

        let descriptor = metrics_dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve(doc, o).as_dict().ok());

        let descriptor_number = |key: &[u8]| {
            descriptor
                .and_then(|d| d.get(key).ok())
                .and_then(|o| number(resolve(doc, o)))
        };

        let ascent = descriptor_number(b"Ascent")
            .filter(|a| *a != 0.0)
            .unwrap_or(DEFAULT_ASCENT);
        let descent = descriptor_number(b"Descent")
            .filter(|d| *d != 0.0)
            .unwrap_or(DEFAULT_DESCENT);

        let (widths, missing_width) = if composite {
            let dw = metrics_dict
                .get(b"DW")
                .ok()
                .and_then(|o| number(resolve(doc, o)))
                .unwrap_or(DEFAULT_CID_WIDTH);
            let widths = metrics_dict
                .get(b"W")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .map(|arr| parse_cid_widths(doc, arr))
                .unwrap_or_default();
            (Widths::Composite { widths }, dw)
        } else {
            let missing = descriptor_number(b"MissingWidth").unwrap_or(DEFAULT_WIDTH);
            (simple_widths(doc, dict, name.as_deref()), missing)
        };

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve(doc, o).as_stream().ok())
            .map(|s| parse_to_unicode(&stream_bytes(doc, s)))
            .filter(|map| !map.is_empty());

        let differences = dict
            .get(b"Encoding")
            .ok()
            .and_then(|o| resolve(doc, o).as_dict().ok())
            .and_then(|enc| enc.get(b"Differences").ok())
            .and_then(|o| resolve(doc, o).as_array().ok())
            .map(|arr| parse_differences(arr))
            .unwrap_or_default();

        Self {
            name,
            ascent,
            descent,
            composite,
            widths,
            missing_width,
            to_unicode,
            differences,
        }
    }

    /// Split a show-text string into glyphs
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if self.composite {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                    Glyph {
                        text: self.unicode(code),
                        width: self.width(code),
                        is_space: false,
                    }
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&b| {
                    let code = u32::from(b);
                    Glyph {
                        text: self.unicode(code),
                        width: self.width(code),
                        is_space: b == b' ',
                    }
                })
                .collect()
        }
    }

    /// Advance width of a code in glyph space
    pub fn width(&self, code: u32) -> f32 {
        match &self.widths {
            Widths::Simple { first_char, widths } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .unwrap_or(self.missing_width),
            Widths::Standard(table) => code
                .checked_sub(32)
                .and_then(|i| table.get(i as usize))
                .map(|w| f32::from(*w))
                .unwrap_or(self.missing_width),
            Widths::Composite { widths } => {
                widths.get(&code).copied().unwrap_or(self.missing_width)
            }
            Widths::Monospace(w) => *w,
            Widths::None => self.missing_width,
        }
    }

    fn unicode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.get(&code)) {
            return text.clone();
        }
        if let Some(text) = self.differences.get(&code) {
            return text.clone();
        }
        if self.composite {
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .unwrap_or(char::REPLACEMENT_CHARACTER)
                .to_string();
        }
        let byte = [code as u8];
        let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(&byte);
        text.into_owned()
    }
}

/// Drop a `ABCDEF+` subset prefix
fn strip_subset_tag(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary, name: Option<&str>) -> Widths {
    let explicit = dict
        .get(b"Widths")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
        .map(|arr| {
            arr.iter()
                .map(|o| number(resolve(doc, o)).unwrap_or(0.0))
                .collect::<Vec<_>>()
        });

    if let Some(widths) = explicit {
        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(resolve(doc, o)))
            .map(|n| n.max(0.0) as u32)
            .unwrap_or(0);
        return Widths::Simple { first_char, widths };
    }

    match name.map(standard_widths) {
        Some(Some(widths)) => widths,
        _ => Widths::None,
    }
}

/// Built-in widths for standard-14 faces (printable ASCII only)
fn standard_widths(name: &str) -> Option<Widths> {
    match name {
        "Courier" | "Courier-Bold" | "Courier-Oblique" | "Courier-BoldOblique" => {
            Some(Widths::Monospace(600.0))
        }
        "Helvetica" | "Helvetica-Oblique" | "Arial" | "ArialMT" => {
            Some(Widths::Standard(&HELVETICA))
        }
        "Helvetica-Bold" | "Helvetica-BoldOblique" | "Arial-Bold" | "Arial-BoldMT" => {
            Some(Widths::Standard(&HELVETICA_BOLD))
        }
        "Times-Roman" | "Times-Italic" | "TimesNewRomanPSMT" => {
            Some(Widths::Standard(&TIMES_ROMAN))
        }
        "Times-Bold" | "Times-BoldItalic" | "TimesNewRomanPS-BoldMT" => {
            Some(Widths::Standard(&TIMES_BOLD))
        }
        _ => None,
    }
}

/// Parse a composite font `/W` array: `c [w1 w2 ...]` and `c_first c_last w`
fn parse_cid_widths(doc: &Document, arr: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < arr.len() {
        let Some(first) = char_code(resolve(doc, &arr[i])) else {
            break;
        };
        match arr.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    let Some(code) = u32::try_from(offset)
                        .ok()
                        .and_then(|offset| first.checked_add(offset))
                    else {
                        break;
                    };
                    if let Some(w) = number(resolve(doc, w)) {
                        widths.insert(code, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = char_code(last).unwrap_or(first);
                let w = arr.get(i + 2).and_then(|o| number(resolve(doc, o)));
                if let Some(w) = w {
                    for code in first..=last.min(first.saturating_add(MAX_RANGE_ENTRIES)) {
                        widths.insert(code, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

/// A character code operand; negative or out-of-range values are rejected
fn char_code(obj: &Object) -> Option<u32> {
    match obj {
        Object::Integer(i) => u32::try_from(*i).ok(),
        other => number(other)
            .filter(|n| *n >= 0.0 && *n <= u32::MAX as f32)
            .map(|n| n as u32),
    }
}

/// Parse an `/Encoding` `/Differences` array into code → text
fn parse_differences(arr: &[Object]) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let mut code = Some(0u32);
    for item in arr {
        match item {
            Object::Integer(i) => code = u32::try_from(*i).ok(),
            Object::Name(name) => {
                let Some(current) = code else {
                    continue;
                };
                if let Some(text) = glyph_name_to_text(&String::from_utf8_lossy(name)) {
                    map.insert(current, text);
                }
                code = current.checked_add(1);
            }
            _ => {}
        }
    }
    map
}

/// Map a glyph name to text. Covers `uniXXXX`, `uXXXX[XX]`, single
/// characters and a handful of common punctuation names.
fn glyph_name_to_text(name: &str) -> Option<String> {
    let hex = |s: &str| u32::from_str_radix(s, 16).ok().and_then(char::from_u32);

    if let Some(rest) = name.strip_prefix("uni") {
        if rest.len() >= 4 && rest.len() % 4 == 0 {
            return rest
                .as_bytes()
                .chunks(4)
                .map(|chunk| std::str::from_utf8(chunk).ok().and_then(hex))
                .collect();
        }
    }
    if let Some(rest) = name.strip_prefix('u') {
        if (4..=6).contains(&rest.len()) {
            if let Some(c) = hex(rest) {
                return Some(c.to_string());
            }
        }
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c.to_string());
    }

    let text = match name {
        "space" => " ",
        "period" => ".",
        "comma" => ",",
        "colon" => ":",
        "semicolon" => ";",
        "hyphen" | "minus" => "-",
        "exclam" => "!",
        "question" => "?",
        "parenleft" => "(",
        "parenright" => ")",
        "slash" => "/",
        "quotesingle" => "'",
        "quotedbl" => "\"",
        "quoteleft" => "\u{2018}",
        "quoteright" => "\u{2019}",
        "quotedblleft" => "\u{201C}",
        "quotedblright" => "\u{201D}",
        "endash" => "\u{2013}",
        "emdash" => "\u{2014}",
        "bullet" => "\u{2022}",
        "ellipsis" => "\u{2026}",
        "fi" => "fi",
        "fl" => "fl",
        "ff" => "ff",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        _ => return None,
    };
    Some(text.to_string())
}

#[derive(Debug, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                i += 1;
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = data[start..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map(|p| start + p)
                    .unwrap_or(data.len());
                let digits: Vec<u8> = data[start..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .map(|pair| {
                        let hi = hex_value(pair[0]);
                        let lo = pair.get(1).map(|&d| hex_value(d)).unwrap_or(0);
                        (hi << 4) | lo
                    })
                    .collect();
                tokens.push(CMapToken::Hex(bytes));
                i = end + 1;
            }
            b'(' => {
                // literal strings never carry mappings; skip with nesting
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !b"[]<>()%".contains(&data[i])
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(CMapToken::Word(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }
    tokens
}

fn is_hex(token: &CMapToken) -> bool {
    matches!(token, CMapToken::Hex(_))
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| {
            let hi = u16::from(pair[0]);
            let lo = pair.get(1).map(|&b| u16::from(b)).unwrap_or(0);
            (hi << 8) | lo
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Parse the `bfchar`/`bfrange` sections of a ToUnicode CMap
pub(super) fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        match token {
            CMapToken::Word(w) if w == "beginbfchar" => {
                while let Some(CMapToken::Hex(src)) = iter.next_if(is_hex) {
                    let Some(CMapToken::Hex(dst)) = iter.next_if(is_hex) else {
                        break;
                    };
                    map.insert(code_of(&src), utf16_text(&dst));
                }
            }
            CMapToken::Word(w) if w == "beginbfrange" => loop {
                let (lo, hi) = match (iter.next(), iter.next()) {
                    (Some(CMapToken::Hex(lo)), Some(CMapToken::Hex(hi))) => {
                        (code_of(&lo), code_of(&hi))
                    }
                    _ => break,
                };
                let hi = hi.min(lo.saturating_add(MAX_RANGE_ENTRIES));
                match iter.next() {
                    Some(CMapToken::Hex(dst)) => {
                        let mut units: Vec<u8> = dst;
                        for code in lo..=hi {
                            map.insert(code, utf16_text(&units));
                            increment_last_unit(&mut units);
                        }
                    }
                    Some(CMapToken::ArrayStart) => {
                        let mut code = lo;
                        while let Some(CMapToken::Hex(dst)) = iter.next_if(is_hex) {
                            if code <= hi {
                                map.insert(code, utf16_text(&dst));
                            }
                            code += 1;
                        }
                        let _ = iter.next_if_eq(&CMapToken::ArrayEnd);
                    }
                    _ => break,
                }
            },
            _ => {}
        }
    }
    map
}

fn increment_last_unit(bytes: &mut [u8]) {
    for b in bytes.iter_mut().rev() {
        let (next, overflow) = b.overflowing_add(1);
        *b = next;
        if !overflow {
            break;
        }
    }
}

// Adobe AFM widths for codes 32..=126
#[rustfmt::skip]
static HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
static TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
static TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_strip_subset_tag() {
        assert_eq!(strip_subset_tag("ABCDEF+Times-Bold"), "Times-Bold");
        assert_eq!(strip_subset_tag("Times-Bold"), "Times-Bold");
        // not a subset tag: lowercase / wrong length
        assert_eq!(strip_subset_tag("abc+Font"), "abc+Font");
    }

    #[test]
    fn test_standard_font_widths() {
        let doc = Document::with_version("1.5");
        let font = FontInfo::load(
            &doc,
            &dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
            },
        );
        assert_eq!(font.name.as_deref(), Some("Helvetica"));
        assert_eq!(font.width(u32::from(b'H')), 722.0);
        assert_eq!(font.width(u32::from(b' ')), 278.0);
        // outside the table falls back to the missing width
        assert_eq!(font.width(200), DEFAULT_WIDTH);
    }

    #[test]
    fn test_explicit_widths_win_over_standard() {
        let doc = Document::with_version("1.5");
        let font = FontInfo::load(
            &doc,
            &dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => "XYZABC+Helvetica",
                "FirstChar" => 65,
                "Widths" => vec![Object::Integer(100), Object::Integer(200)],
            },
        );
        assert_eq!(font.name.as_deref(), Some("Helvetica"));
        assert_eq!(font.width(65), 100.0);
        assert_eq!(font.width(66), 200.0);
        assert_eq!(font.width(67), DEFAULT_WIDTH);
    }

    #[test]
    fn test_decode_simple_font_winansi() {
        let font = FontInfo::fallback();
        let glyphs = font.decode(b"A \x93");
        let text: String = glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(text, "A \u{201C}");
        assert!(glyphs[1].is_space);
        assert!(!glyphs[0].is_space);
    }

    #[test]
    fn test_parse_to_unicode_bfchar_and_bfrange() {
        let cmap = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0011> <00660069>
endbfchar
2 beginbfrange
<0024> <0026> <0041>
<0030> <0031> [<0078> <0079>]
endbfrange
endcmap";
        let map = parse_to_unicode(cmap);
        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x11).map(String::as_str), Some("fi"));
        assert_eq!(map.get(&0x24).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x26).map(String::as_str), Some("C"));
        assert_eq!(map.get(&0x30).map(String::as_str), Some("x"));
        assert_eq!(map.get(&0x31).map(String::as_str), Some("y"));
        assert_eq!(map.len(), 7);
    }

    #[test]
    fn test_parse_cid_widths() {
        let doc = Document::with_version("1.5");
        let arr = vec![
            Object::Integer(1),
            Object::Array(vec![Object::Integer(500), Object::Integer(600)]),
            Object::Integer(10),
            Object::Integer(12),
            Object::Integer(250),
        ];
        let widths = parse_cid_widths(&doc, &arr);
        assert_eq!(widths.get(&1), Some(&500.0));
        assert_eq!(widths.get(&2), Some(&600.0));
        assert_eq!(widths.get(&11), Some(&250.0));
        assert_eq!(widths.get(&13), None);
    }

    #[test]
    fn test_differences_glyph_names() {
        let arr = vec![
            Object::Integer(65),
            Object::Name(b"uni00E9".to_vec()),
            Object::Name(b"bullet".to_vec()),
            Object::Name(b"unknownglyph".to_vec()),
            Object::Name(b"Z".to_vec()),
        ];
        let map = parse_differences(&arr);
        assert_eq!(map.get(&65).map(String::as_str), Some("\u{e9}"));
        assert_eq!(map.get(&66).map(String::as_str), Some("\u{2022}"));
        assert_eq!(map.get(&67), None);
        assert_eq!(map.get(&68).map(String::as_str), Some("Z"));
    }

    #[test]
    fn test_differences_stop_at_code_space_end() {
        let arr = vec![
            Object::Integer(i64::from(u32::MAX)),
            Object::Name(b"a".to_vec()),
            Object::Name(b"b".to_vec()),
            Object::Integer(-5),
            Object::Name(b"c".to_vec()),
        ];
        let map = parse_differences(&arr);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&u32::MAX).map(String::as_str), Some("a"));
    }

    #[test]
    fn test_cid_widths_near_code_space_end() {
        let doc = Document::with_version("1.5");
        let first = i64::from(u32::MAX) - 1;
        let arr = vec![
            Object::Integer(first),
            Object::Array(vec![
                Object::Integer(100),
                Object::Integer(200),
                Object::Integer(300),
            ]),
            Object::Integer(i64::from(u32::MAX)),
            Object::Integer(i64::from(u32::MAX)),
            Object::Integer(400),
        ];
        let widths = parse_cid_widths(&doc, &arr);
        assert_eq!(widths.get(&(u32::MAX - 1)), Some(&100.0));
        assert_eq!(widths.get(&u32::MAX), Some(&400.0));
        assert_eq!(widths.len(), 2);
    }
}
