//! Image XObject extraction
//!
//! General-purpose filters (ASCII, Flate, LZW, RunLength) are undone first.
//! If the chain ends in a self-contained image codec (DCT, JPX, JBIG2) the
//! remaining bytes are returned as that codec's file; CCITT fax data is
//! wrapped in a TIFF. Everything else is decoded to samples and re-encoded
//! as PNG.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Document, Object, Stream};

use super::filters;
use super::{name_of, number, resolve};
use crate::engine::ExtractedImage;

/// Color space of decoded samples
#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        hival: u32,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

/// Extract an image stream as raw codec bytes or PNG
pub(super) fn extract(doc: &Document, stream: &Stream) -> Result<ExtractedImage, String> {
    let chain = filters::chain(doc, &stream.dict);

    let (general, codec) = match chain.split_last() {
        Some((last, rest)) if codec_ext(&last.name).is_some() => (rest, Some(last)),
        _ => (chain.as_slice(), None),
    };
    let data = filters::decode_all(doc, general, &stream.content)?;

    let Some(codec) = codec else {
        let image = decode_samples(doc, stream, &data)?;
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| format!("PNG encoding failed: {e}"))?;
        return Ok(ExtractedImage {
            data: png,
            ext: "png".to_string(),
        });
    };

    let data = if codec.name == "CCITTFaxDecode" {
        let height = dict_number(doc, stream, b"Height").unwrap_or(0.0).max(0.0) as u32;
        filters::ccitt_to_tiff(doc, codec, height, decode_inverted(doc, stream), &data)
    } else {
        data
    };
    Ok(ExtractedImage {
        data,
        ext: codec_ext(&codec.name).unwrap_or_default().to_string(),
    })
}

/// File extension for filters that leave a complete image file behind
fn codec_ext(filter: &str) -> Option<&'static str> {
    match filter {
        "DCTDecode" => Some("jpeg"),
        "JPXDecode" => Some("jpx"),
        "JBIG2Decode" => Some("jb2"),
        "CCITTFaxDecode" => Some("tiff"),
        _ => None,
    }
}

/// Whether `/Decode` starts at 1, flipping the meaning of 1-bit samples
fn decode_inverted(doc: &Document, stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Decode")
        .ok()
        .and_then(|o| resolve(doc, o).as_array().ok())
        .and_then(|arr| arr.first())
        .and_then(number)
        .is_some_and(|first| first >= 1.0)
}

fn dict_number(doc: &Document, stream: &Stream, key: &[u8]) -> Option<f32> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|o| number(resolve(doc, o)))
}

fn decode_samples(doc: &Document, stream: &Stream, samples: &[u8]) -> Result<DynamicImage, String> {
    let width = dict_number(doc, stream, b"Width").unwrap_or(0.0) as u32;
    let height = dict_number(doc, stream, b"Height").unwrap_or(0.0) as u32;
    if width == 0 || height == 0 {
        return Err(format!("invalid image dimensions {width}x{height}"));
    }

    let image_mask = matches!(
        stream.dict.get(b"ImageMask").ok().map(|o| resolve(doc, o)),
        Some(Object::Boolean(true))
    );

    if image_mask {
        // 1-bit stencil; with the default /Decode [0 1] a 0 bit is painted
        let inverted = decode_inverted(doc, stream);
        let bits = unpack(samples, width, height, 1, 1)?;
        let pixels = bits
            .into_iter()
            .map(|bit| if (bit == 0) != inverted { 0 } else { 255 })
            .collect();
        return GrayImage::from_raw(width, height, pixels)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| "failed to create image buffer".to_string());
    }

    let bpc = dict_number(doc, stream, b"BitsPerComponent").unwrap_or(8.0) as u32;
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return Err(format!("unsupported bits per component: {bpc}"));
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .ok_or_else(|| "image has no color space".to_string())
        .and_then(|o| parse_color_space(doc, o))?;

    let raw = unpack(samples, width, height, color_space.components(), bpc)?;

    match &color_space {
        ColorSpace::Indexed {
            base,
            hival,
            lookup,
        } => {
            let n = base.components();
            let mut expanded = Vec::with_capacity(raw.len() * n);
            for index in raw {
                let index = u32::from(index).min(*hival) as usize;
                for c in 0..n {
                    expanded.push(lookup.get(index * n + c).copied().unwrap_or(0));
                }
            }
            to_image(base, width, height, expanded)
        }
        _ => {
            let scaled = raw.into_iter().map(|v| scale(v, bpc)).collect();
            to_image(&color_space, width, height, scaled)
        }
    }
}

/// Turn 8-bit samples of a non-indexed color space into an image
fn to_image(
    color_space: &ColorSpace,
    width: u32,
    height: u32,
    samples: Vec<u8>,
) -> Result<DynamicImage, String> {
    let image = match color_space {
        ColorSpace::Gray => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        ColorSpace::Rgb => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        ColorSpace::Cmyk => {
            let rgb = samples
                .chunks_exact(4)
                .flat_map(|px| {
                    let k = 255 - u32::from(px[3]);
                    let channel = |v: u8| ((255 - u32::from(v)) * k / 255) as u8;
                    [channel(px[0]), channel(px[1]), channel(px[2])]
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Indexed { .. } => return Err("nested indexed color space".to_string()),
    };
    image.ok_or_else(|| "failed to create image buffer".to_string())
}

/// Scale a sample of `bpc` bits to 8 bits
fn scale(value: u8, bpc: u32) -> u8 {
    match bpc {
        1 => value * 255,
        2 => value * 85,
        4 => value * 17,
        _ => value,
    }
}

/// Unpack `width * height * components` samples. Rows start on a byte
/// boundary; 16-bit samples keep their high byte.
fn unpack(
    data: &[u8],
    width: u32,
    height: u32,
    components: usize,
    bpc: u32,
) -> Result<Vec<u8>, String> {
    let per_row = width as usize * components;
    let row_bytes = (per_row * bpc as usize).div_ceil(8);
    let needed = row_bytes * height as usize;
    if data.len() < needed {
        return Err(format!(
            "image data too short: {} bytes, expected {needed}",
            data.len()
        ));
    }

    let mut out = Vec::with_capacity(per_row * height as usize);
    for row in data.chunks_exact(row_bytes).take(height as usize) {
        match bpc {
            8 => out.extend_from_slice(&row[..per_row]),
            16 => out.extend(row.chunks_exact(2).take(per_row).map(|pair| pair[0])),
            _ => {
                let mask = (1u16 << bpc) - 1;
                for i in 0..per_row {
                    let bit = i * bpc as usize;
                    let byte = row[bit / 8];
                    let shift = 8 - bpc as usize - (bit % 8);
                    out.push(((u16::from(byte) >> shift) & mask) as u8);
                }
            }
        }
    }
    Ok(out)
}

fn parse_color_space(doc: &Document, obj: &Object) -> Result<ColorSpace, String> {
    match resolve(doc, obj) {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(format!(
                "unsupported color space /{}",
                String::from_utf8_lossy(other)
            )),
        },
        Object::Array(items) => {
            let family = items.first().and_then(name_of).unwrap_or_default();
            match family.as_str() {
                "CalGray" => Ok(ColorSpace::Gray),
                "CalRGB" => Ok(ColorSpace::Rgb),
                "ICCBased" => {
                    let n = items
                        .get(1)
                        .and_then(|o| resolve(doc, o).as_stream().ok())
                        .and_then(|s| s.dict.get(b"N").ok())
                        .and_then(number)
                        .unwrap_or(0.0) as u32;
                    match n {
                        1 => Ok(ColorSpace::Gray),
                        3 => Ok(ColorSpace::Rgb),
                        4 => Ok(ColorSpace::Cmyk),
                        _ => Err(format!("unsupported ICC component count {n}")),
                    }
                }
                "Indexed" | "I" => {
                    let base = items
                        .get(1)
                        .ok_or_else(|| "indexed color space without base".to_string())
                        .and_then(|o| parse_color_space(doc, o))?;
                    if matches!(base, ColorSpace::Indexed { .. }) {
                        return Err("nested indexed color space".to_string());
                    }
                    let hival = items
                        .get(2)
                        .and_then(|o| number(resolve(doc, o)))
                        .unwrap_or(0.0)
                        .clamp(0.0, 255.0) as u32;
                    let lookup = match items.get(3).map(|o| resolve(doc, o)) {
                        Some(Object::String(bytes, _)) => bytes.clone(),
                        Some(Object::Stream(s)) => super::stream_bytes(doc, s),
                        _ => return Err("indexed color space without lookup".to_string()),
                    };
                    Ok(ColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        lookup,
                    })
                }
                other => Err(format!("unsupported color space /{other}")),
            }
        }
        _ => Err("malformed color space".to_string()),
    }
}
