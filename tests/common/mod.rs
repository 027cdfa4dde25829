//! Fixture PDFs built in-process with lopdf

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use page_extract_server::config::Config;
use page_extract_server::state::AppState;

/// Bytes that stand in for a baseline JPEG; passed through untouched
pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

pub fn test_state() -> AppState {
    AppState::new(Config::default())
}

/// One page per entry of `contents`; `resources` is shared by every page
fn build(contents: &[&[u8]], resources: impl FnOnce(&mut Document) -> lopdf::Dictionary) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let resources = resources(&mut doc);
    let resources_id = doc.add_object(resources);

    let kids: Vec<Object> = contents
        .iter()
        .map(|content| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            Object::from(page_id)
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("serialize fixture PDF");
    buf
}

fn font(doc: &mut Document, base_font: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
    })
}

fn jpeg_image(doc: &mut Document) -> ObjectId {
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        JPEG_BYTES.to_vec(),
    ))
}

/// A heading in Times-BoldItalic and two body lines in Helvetica
pub fn text_pdf() -> Vec<u8> {
    let content = b"BT /F1 24 Tf 72 720 Td (Chapter One) Tj ET \
BT /F2 12 Tf 72 680 Td 14 TL (First line of body text.) Tj T* (Second line.) Tj ET";
    build(&[content], |doc| {
        let title = font(doc, "Times-BoldItalic");
        let body = font(doc, "Helvetica");
        dictionary! { "Font" => dictionary! { "F1" => title, "F2" => body } }
    })
}

/// A single JPEG drawn once at 100x50 from (72, 600)
pub fn jpeg_pdf() -> Vec<u8> {
    build(&[b"q 100 0 0 50 72 600 cm /Im0 Do Q"], |doc| {
        let image = jpeg_image(doc);
        dictionary! { "XObject" => dictionary! { "Im0" => image } }
    })
}

/// Two images in the resources; only the second one is drawn
pub fn partly_placed_pdf() -> Vec<u8> {
    build(&[b"q 20 0 0 20 10 10 cm /Im1 Do Q"], |doc| {
        let unplaced = jpeg_image(doc);
        let placed = jpeg_image(doc);
        dictionary! { "XObject" => dictionary! { "Im0" => unplaced, "Im1" => placed } }
    })
}

/// `pages` pages, each showing its own number
pub fn multi_page_pdf(pages: usize) -> Vec<u8> {
    let contents: Vec<Vec<u8>> = (1..=pages)
        .map(|n| format!("BT /F1 12 Tf 72 720 Td (Page {n}) Tj ET").into_bytes())
        .collect();
    let refs: Vec<&[u8]> = contents.iter().map(Vec::as_slice).collect();
    build(&refs, |doc| {
        let f1 = font(doc, "Helvetica");
        dictionary! { "Font" => dictionary! { "F1" => f1 } }
    })
}

/// The JPEG of [`jpeg_pdf`] stored behind `[/ASCIIHexDecode /DCTDecode]`
pub fn hex_wrapped_jpeg_pdf() -> Vec<u8> {
    build(&[b"q 100 0 0 50 72 600 cm /Im0 Do Q"], |doc| {
        let mut hex: Vec<u8> = JPEG_BYTES
            .iter()
            .flat_map(|b| format!("{b:02x}").into_bytes())
            .collect();
        hex.push(b'>');
        let image = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => vec![
                    Object::Name(b"ASCIIHexDecode".to_vec()),
                    Object::Name(b"DCTDecode".to_vec()),
                ],
            },
            hex,
        ));
        dictionary! { "XObject" => dictionary! { "Im0" => image } }
    })
}

/// A form XObject that draws itself four times
pub fn self_drawing_form_pdf() -> Vec<u8> {
    build(&[b"/Fm0 Do"], |doc| {
        let form_id = doc.new_object_id();
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                    "Resources" => dictionary! {
                        "XObject" => dictionary! { "Fm0" => form_id },
                    },
                },
                b"/Fm0 Do /Fm0 Do /Fm0 Do /Fm0 Do".to_vec(),
            )),
        );
        dictionary! { "XObject" => dictionary! { "Fm0" => form_id } }
    })
}
