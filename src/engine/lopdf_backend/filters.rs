//! Stream filter chains
//!
//! lopdf only decompresses Flate, LZW and ASCII85, and only when the whole
//! chain is made of them. Image streams routinely wrap a codec such as DCT
//! in an ASCII or Flate layer, so the chain is walked here one filter at a
//! time, each with its own `/DecodeParms` entry.

use std::io::Read;

use lopdf::{Dictionary, Document, Object};
use weezl::{decode::Decoder as LzwDecoder, BitOrder};

use super::{name_of, number, resolve};

/// One `/Filter` entry and its `/DecodeParms`
#[derive(Debug, Clone)]
pub(super) struct Filter<'a> {
    pub name: String,
    pub params: Option<&'a Dictionary>,
}

impl Filter<'_> {
    fn param(&self, doc: &Document, key: &[u8]) -> Option<f32> {
        self.params
            .and_then(|p| p.get(key).ok())
            .and_then(|o| number(resolve(doc, o)))
    }

    fn flag(&self, doc: &Document, key: &[u8]) -> bool {
        matches!(
            self.params.and_then(|p| p.get(key).ok()).map(|o| resolve(doc, o)),
            Some(Object::Boolean(true))
        )
    }
}

/// Filters of a stream dictionary in application order, abbreviations
/// expanded
pub(super) fn chain<'a>(doc: &'a Document, dict: &'a Dictionary) -> Vec<Filter<'a>> {
    let names: Vec<String> = match dict.get(b"Filter").ok().map(|o| resolve(doc, o)) {
        Some(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| name_of(resolve(doc, item)))
            .collect(),
        _ => Vec::new(),
    };

    let params: Vec<Option<&Dictionary>> =
        match dict.get(b"DecodeParms").ok().map(|o| resolve(doc, o)) {
            Some(Object::Dictionary(d)) => vec![Some(d)],
            Some(Object::Array(items)) => items
                .iter()
                .map(|item| resolve(doc, item).as_dict().ok())
                .collect(),
            _ => Vec::new(),
        };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Filter {
            name: full_name(&name).to_string(),
            params: params.get(i).copied().flatten(),
        })
        .collect()
}

fn full_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "Fl" => "FlateDecode",
        "LZW" => "LZWDecode",
        "RL" => "RunLengthDecode",
        "DCT" => "DCTDecode",
        "CCF" => "CCITTFaxDecode",
        other => other,
    }
}

/// Apply every filter in `filters` to `data`
pub(super) fn decode_all(doc: &Document, filters: &[Filter], data: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = data.to_vec();
    for filter in filters {
        out = decode(doc, filter, &out)?;
    }
    Ok(out)
}

/// Apply a single general-purpose filter
pub(super) fn decode(doc: &Document, filter: &Filter, data: &[u8]) -> Result<Vec<u8>, String> {
    match filter.name.as_str() {
        "ASCIIHexDecode" => Ok(ascii_hex(data)),
        "ASCII85Decode" => ascii85(data),
        "RunLengthDecode" => Ok(run_length(data)),
        "FlateDecode" => {
            let inflated = flate(data)?;
            predict(doc, filter, inflated)
        }
        "LZWDecode" => {
            let early_change = filter.param(doc, b"EarlyChange").unwrap_or(1.0) != 0.0;
            let decoded = lzw(data, early_change)?;
            predict(doc, filter, decoded)
        }
        other => Err(format!("unsupported filter /{other}")),
    }
}

fn ascii_hex(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        let Some(nibble) = (byte as char).to_digit(16).map(|d| d as u8) else {
            continue;
        };
        match pending.take() {
            Some(high) => out.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }
    // odd digit count: the last digit is followed by an implied 0
    if let Some(high) = pending {
        out.push(high << 4);
    }
    out
}

fn ascii85(data: &[u8]) -> Result<Vec<u8>, String> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut len = 0;

    for &byte in data {
        match byte {
            b'~' => break,
            b'z' if len == 0 => out.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group[len] = byte - b'!';
                len += 1;
                if len == 5 {
                    out.extend_from_slice(&base85_value(&group)?.to_be_bytes());
                    len = 0;
                }
            }
            b if b.is_ascii_whitespace() || b == 0 => {}
            other => return Err(format!("invalid ASCII85 byte 0x{other:02x}")),
        }
    }

    if len == 1 {
        return Err("truncated ASCII85 group".to_string());
    }
    if len > 1 {
        group[len..].fill(84);
        let bytes = base85_value(&group)?.to_be_bytes();
        out.extend_from_slice(&bytes[..len - 1]);
    }
    Ok(out)
}

fn base85_value(group: &[u8; 5]) -> Result<u32, String> {
    group
        .iter()
        .try_fold(0u32, |acc, &digit| {
            acc.checked_mul(85)?.checked_add(u32::from(digit))
        })
        .ok_or_else(|| "ASCII85 group out of range".to_string())
}

fn run_length(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = (i + usize::from(length) + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            129..=255 => {
                if let Some(&byte) = data.get(i) {
                    out.extend(std::iter::repeat(byte).take(257 - usize::from(length)));
                    i += 1;
                }
            }
        }
    }
    out
}

fn flate(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    match flate2::read::ZlibDecoder::new(data).read_to_end(&mut out) {
        Ok(_) => Ok(out),
        // truncated or bad checksum: keep what inflated
        Err(_) if !out.is_empty() => Ok(out),
        Err(e) => Err(format!("FlateDecode failed: {e}")),
    }
}

fn lzw(data: &[u8], early_change: bool) -> Result<Vec<u8>, String> {
    let mut decoder = if early_change {
        LzwDecoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        LzwDecoder::new(BitOrder::Msb, 8)
    };
    let mut out = Vec::new();
    let result = decoder.into_vec(&mut out).decode(data);
    match result.status {
        Ok(_) => Ok(out),
        Err(_) if !out.is_empty() => Ok(out),
        Err(e) => Err(format!("LZWDecode failed: {e}")),
    }
}

/// Undo a `/Predictor` from the filter's parameters
fn predict(doc: &Document, filter: &Filter, data: Vec<u8>) -> Result<Vec<u8>, String> {
    let predictor = filter.param(doc, b"Predictor").unwrap_or(1.0) as u32;
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = filter.param(doc, b"Colors").unwrap_or(1.0).max(1.0) as usize;
    let bpc = filter.param(doc, b"BitsPerComponent").unwrap_or(8.0).max(1.0) as usize;
    let columns = filter.param(doc, b"Columns").unwrap_or(1.0).max(1.0) as usize;
    let row_bytes = (colors * bpc * columns).div_ceil(8);
    let pixel_bytes = (colors * bpc).div_ceil(8);

    match predictor {
        2 if bpc == 8 => Ok(tiff_predictor(data, row_bytes, colors)),
        2 => Err(format!("TIFF predictor with {bpc} bits per component")),
        10..=15 => png_predictor(&data, row_bytes, pixel_bytes),
        other => Err(format!("unsupported predictor {other}")),
    }
}

fn tiff_predictor(mut data: Vec<u8>, row_bytes: usize, colors: usize) -> Vec<u8> {
    for row in data.chunks_mut(row_bytes) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    data
}

fn png_predictor(data: &[u8], row_bytes: usize, pixel_bytes: usize) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_bytes];
    let mut row = vec![0u8; row_bytes];

    for chunk in data.chunks(row_bytes + 1) {
        let Some((&kind, encoded)) = chunk.split_first() else {
            break;
        };
        row.fill(0);
        row[..encoded.len()].copy_from_slice(encoded);

        for i in 0..row_bytes {
            let left = if i >= pixel_bytes { row[i - pixel_bytes] } else { 0 };
            let up = prev[i];
            let up_left = if i >= pixel_bytes { prev[i - pixel_bytes] } else { 0 };
            row[i] = match kind {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => return Err(format!("invalid PNG predictor row type {other}")),
            };
        }
        out.extend_from_slice(&row[..encoded.len()]);
        std::mem::swap(&mut prev, &mut row);
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let (pa, pb, pc) = (
        (p - i16::from(a)).abs(),
        (p - i16::from(b)).abs(),
        (p - i16::from(c)).abs(),
    );
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Wrap CCITT fax data in a single-strip little-endian TIFF
pub(super) fn ccitt_to_tiff(
    doc: &Document,
    filter: &Filter,
    height: u32,
    invert: bool,
    data: &[u8],
) -> Vec<u8> {
    let k = filter.param(doc, b"K").unwrap_or(0.0);
    let columns = filter.param(doc, b"Columns").unwrap_or(1728.0).max(1.0) as u32;
    let rows = filter
        .param(doc, b"Rows")
        .map(|r| r.max(0.0) as u32)
        .filter(|r| *r > 0)
        .unwrap_or(height);
    let black_is_1 = filter.flag(doc, b"BlackIs1");

    // T.6 for K < 0, otherwise T.4 (2-D when K > 0)
    let compression: u32 = if k < 0.0 { 4 } else { 3 };
    // 0 = WhiteIsZero, the fax convention
    let photometric = u32::from(black_is_1 != invert);

    let mut entries: Vec<(u16, u16, u32)> = vec![
        (256, LONG, columns),
        (257, LONG, rows),
        (258, SHORT, 1),
        (259, SHORT, compression),
        (262, SHORT, photometric),
        (273, LONG, 0), // strip offset, patched below
        (277, SHORT, 1),
        (278, LONG, rows),
        (279, LONG, data.len() as u32),
    ];
    if compression == 3 {
        let mut options = 0;
        if k > 0.0 {
            options |= 1;
        }
        if filter.flag(doc, b"EncodedByteAlign") {
            options |= 4;
        }
        entries.push((292, LONG, options));
    }

    let ifd_len = 2 + entries.len() * 12 + 4;
    let data_offset = (8 + ifd_len) as u32;
    if let Some(entry) = entries.iter_mut().find(|e| e.0 == 273) {
        entry.2 = data_offset;
    }

    let mut out = Vec::with_capacity(data_offset as usize + data.len());
    out.extend_from_slice(b"II*\0");
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, value) in entries {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        if kind == SHORT {
            out.extend_from_slice(&(value as u16).to_le_bytes());
            out.extend_from_slice(&[0, 0]);
        } else {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(data);
    out
}

const SHORT: u16 = 3;
const LONG: u16 = 4;
