//! [`PdfEngine`] backed by the `lopdf` object model.
//!
//! Opening a document parses the cross-reference table and caches the page
//! ids. Loading a page computes its geometry and interprets its content
//! streams once; the structured text, the image listing and the image
//! placements are all answered from that single pass.

mod filters;
mod font;
mod image;
mod interpreter;
mod layout;

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::{
    EngineDocument, EngineError, EnginePage, EngineResult, ExtractedImage, ImageInfo, Matrix,
    ObjectRef, PdfEngine, Rect, StructuredText,
};
use interpreter::{Interpreter, Mark};

/// US Letter, used when a page has neither CropBox nor MediaBox
const LETTER: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Maximum nesting of Form XObjects (and of the `/Parent` chain)
pub(crate) const MAX_NESTING: usize = 12;

/// Stateless engine; every call to [`PdfEngine::open`] parses afresh
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&self, bytes: &[u8]) -> EngineResult<Box<dyn EngineDocument>> {
        let inner = Document::load_mem(bytes).map_err(|e| EngineError::Open(e.to_string()))?;

        if inner.is_encrypted() {
            return Err(EngineError::Open("document is encrypted".to_string()));
        }

        let page_ids = inner.get_pages().into_values().collect();
        Ok(Box::new(LopdfDocument { inner, page_ids }))
    }
}

/// An opened document
pub struct LopdfDocument {
    inner: Document,
    /// Page object ids in page-tree order
    page_ids: Vec<ObjectId>,
}

impl EngineDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn load_page(&self, index: usize) -> EngineResult<Box<dyn EnginePage + '_>> {
        let page_id = *self
            .page_ids
            .get(index)
            .ok_or(EngineError::PageNotFound {
                index,
                page_count: self.page_ids.len(),
            })?;
        Ok(Box::new(LopdfPage::load(&self.inner, page_id)?))
    }

    fn extract_image(&self, xref: ObjectRef) -> EngineResult<ExtractedImage> {
        let object = self
            .inner
            .get_object((xref.num, xref.gen))
            .map_err(|e| EngineError::Object(format!("image {xref}: {e}")))?;
        let stream = object
            .as_stream()
            .map_err(|_| EngineError::Image(format!("object {xref} is not an image stream")))?;
        image::extract(&self.inner, stream)
            .map_err(|e| EngineError::Image(format!("image {xref}: {e}")))
    }
}

/// A page whose content has already been interpreted
pub struct LopdfPage<'a> {
    doc: &'a Document,
    page_id: ObjectId,
    bounds: Rect,
    marks: Vec<Mark>,
}

impl<'a> LopdfPage<'a> {
    fn load(doc: &'a Document, page_id: ObjectId) -> EngineResult<Self> {
        let page = page_dict(doc, page_id)?;
        let (bounds, page_matrix) = page_geometry(doc, page_id);
        let resources = page_resources(doc, page_id);
        let content = page_content_bytes(doc, page)?;

        let mut interpreter = Interpreter::new(doc, page_matrix);
        interpreter.run(&content, resources, 0)?;

        Ok(Self {
            doc,
            page_id,
            bounds,
            marks: interpreter.into_marks(),
        })
    }
}

impl EnginePage for LopdfPage<'_> {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn structured_text(&self) -> EngineResult<StructuredText> {
        Ok(layout::build(&self.marks))
    }

    fn images(&self) -> EngineResult<Vec<ImageInfo>> {
        let mut images = Vec::new();
        let mut seen = HashSet::new();
        if let Some(resources) = page_resources(self.doc, self.page_id) {
            collect_images(self.doc, resources, 0, &mut seen, &mut images);
        }
        Ok(images)
    }

    fn image_rects(&self, xref: ObjectRef) -> EngineResult<Vec<Rect>> {
        Ok(self
            .marks
            .iter()
            .filter_map(|mark| match mark {
                Mark::Image(placement) if placement.xref == xref => Some(placement.rect),
                _ => None,
            })
            .collect())
    }
}

/// Follow an indirect reference; anything else is returned as-is
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Integer or real as `f32`
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f as f32),
        _ => None,
    }
}

pub(crate) fn name_of(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn page_dict(doc: &Document, page_id: ObjectId) -> EngineResult<&Dictionary> {
    doc.get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| EngineError::Object(format!("page {} {}: {e}", page_id.0, page_id.1)))
}

/// Look up a key on the page, walking up the page tree via `/Parent`
fn resolve_inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_object(page_id).and_then(Object::as_dict).ok()?;
    for _ in 0..=MAX_NESTING {
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        dict = dict
            .get(b"Parent")
            .ok()
            .map(|parent| resolve(doc, parent))
            .and_then(|parent| parent.as_dict().ok())?;
    }
    None
}

fn rect_of(doc: &Document, obj: &Object) -> Option<Rect> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let v: Vec<f32> = arr
        .iter()
        .map(|o| number(resolve(doc, o)))
        .collect::<Option<_>>()?;
    Some(Rect::new(
        v[0].min(v[2]),
        v[1].min(v[3]),
        v[0].max(v[2]),
        v[1].max(v[3]),
    ))
}

/// Displayed page bounds and the matrix from PDF user space into them
fn page_geometry(doc: &Document, page_id: ObjectId) -> (Rect, Matrix) {
    let media = resolve_inherited(doc, page_id, b"MediaBox")
        .and_then(|o| rect_of(doc, o))
        .unwrap_or(LETTER);
    let visible = resolve_inherited(doc, page_id, b"CropBox")
        .and_then(|o| rect_of(doc, o))
        .unwrap_or(media);
    let rotate = resolve_inherited(doc, page_id, b"Rotate")
        .and_then(number)
        .map(|r| ((r as i64).rem_euclid(360) / 90) * 90)
        .unwrap_or(0);

    page_matrix(visible, rotate)
}

fn page_matrix(visible: Rect, rotate: i64) -> (Rect, Matrix) {
    let flip = Matrix::new(1.0, 0.0, 0.0, -1.0, -visible.x0, visible.y1);
    let (sin, cos) = match rotate {
        90 => (1.0, 0.0),
        180 => (0.0, -1.0),
        270 => (-1.0, 0.0),
        _ => (0.0, 1.0),
    };
    let rotation = Matrix::new(cos, sin, -sin, cos, 0.0, 0.0);
    let oriented = flip.then(&rotation);

    let rotated = rotation.transform_rect(0.0, 0.0, visible.width(), visible.height());
    let matrix = oriented.then(&Matrix::translate(-rotated.x0, -rotated.y0));
    (Rect::from_size(rotated.width(), rotated.height()), matrix)
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    resolve_inherited(doc, page_id, b"Resources").and_then(|o| o.as_dict().ok())
}

/// Decoded bytes of a non-image stream, falling back to the raw bytes when
/// a filter cannot be undone
pub(crate) fn stream_bytes(doc: &Document, stream: &lopdf::Stream) -> Vec<u8> {
    let chain = filters::chain(doc, &stream.dict);
    if chain.is_empty() {
        return stream.content.clone();
    }
    filters::decode_all(doc, &chain, &stream.content).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Using undecoded stream bytes");
        stream.content.clone()
    })
}

/// Concatenate the page's `/Contents` streams
fn page_content_bytes(doc: &Document, page: &Dictionary) -> EngineResult<Vec<u8>> {
    let contents = match page.get(b"Contents") {
        Ok(obj) => resolve(doc, obj),
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Stream(stream) => Ok(stream_bytes(doc, stream)),
        Object::Array(parts) => {
            let mut content = Vec::new();
            for part in parts {
                let stream = resolve(doc, part).as_stream().map_err(|_| {
                    EngineError::Content("/Contents array item is not a stream".to_string())
                })?;
                if !content.is_empty() {
                    content.push(b'\n');
                }
                content.extend_from_slice(&stream_bytes(doc, stream));
            }
            Ok(content)
        }
        Object::Null => Ok(Vec::new()),
        _ => Err(EngineError::Content(
            "/Contents is not a stream or array".to_string(),
        )),
    }
}

/// Image XObjects of a resource dictionary in dictionary order, then the
/// images of nested forms, depth first. Each form is visited once.
fn collect_images(
    doc: &Document,
    resources: &Dictionary,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<ImageInfo>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
    else {
        return;
    };

    let mut forms = Vec::new();
    for (name, entry) in xobjects.iter() {
        let Object::Reference(id) = entry else {
            continue;
        };
        let Ok(stream) = doc.get_object(*id).and_then(Object::as_stream) else {
            continue;
        };
        let subtype = stream.dict.get(b"Subtype").ok().and_then(name_of);
        match subtype.as_deref() {
            Some("Image") => {
                if !seen.insert(*id) {
                    continue;
                }
                let dim = |key: &[u8]| {
                    stream
                        .dict
                        .get(key)
                        .ok()
                        .and_then(|o| number(resolve(doc, o)))
                        .map(|n| n.max(0.0) as u32)
                        .unwrap_or(0)
                };
                out.push(ImageInfo {
                    xref: ObjectRef::new(id.0, id.1),
                    name: String::from_utf8_lossy(name).into_owned(),
                    width: dim(b"Width"),
                    height: dim(b"Height"),
                });
            }
            Some("Form") => {
                if seen.insert(*id) {
                    forms.push(stream);
                }
            }
            _ => {}
        }
    }

    if depth >= MAX_NESTING {
        return;
    }
    for form in forms {
        if let Some(form_resources) = form
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve(doc, o).as_dict().ok())
        {
            collect_images(doc, form_resources, depth + 1, seen, out);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::Block;
    use lopdf::{dictionary, Stream};

    /// Single-page document; `page_extra` adds entries to the page dictionary
    pub(crate) fn build_pdf(
        content: &[u8],
        page_extra: impl FnOnce(&mut Document, &mut Dictionary),
    ) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        page_extra(&mut doc, &mut page);
        let page_id = doc.add_object(page);

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn helvetica(doc: &mut Document, page: &mut Dictionary) {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        page.set(
            "Resources",
            dictionary! { "Font" => dictionary! { "F1" => font_id } },
        );
    }

    #[test]
    fn test_open_rejects_garbage() {
        let result = LopdfEngine.open(b"this is not a pdf");
        assert!(matches!(result, Err(EngineError::Open(_))));
    }

    #[test]
    fn test_page_count_and_out_of_range() {
        let bytes = build_pdf(b"", |_, _| {});
        let doc = LopdfEngine.open(&bytes).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert!(doc.load_page(0).is_ok());
        assert!(matches!(
            doc.load_page(1),
            Err(EngineError::PageNotFound {
                index: 1,
                page_count: 1
            })
        ));
    }

    #[test]
    fn test_inherited_media_box_bounds() {
        let bytes = build_pdf(b"", |_, _| {});
        let doc = LopdfEngine.open(&bytes).unwrap();
        let page = doc.load_page(0).unwrap();
        assert_eq!(page.bounds(), Rect::new(0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn test_crop_box_and_rotation() {
        let bytes = build_pdf(b"", |_, page| {
            page.set(
                "CropBox",
                vec![
                    Object::Integer(10),
                    Object::Integer(20),
                    Object::Integer(210),
                    Object::Integer(120),
                ],
            );
            page.set("Rotate", Object::Integer(90));
        });
        let doc = LopdfEngine.open(&bytes).unwrap();
        let page = doc.load_page(0).unwrap();
        assert_eq!(page.bounds(), Rect::new(0.0, 0.0, 100.0, 200.0));
    }

    #[test]
    fn test_page_matrix_rotation_keeps_origin() {
        let visible = Rect::new(0.0, 0.0, 200.0, 100.0);
        let (bounds, m) = page_matrix(visible, 90);
        assert_eq!(bounds, Rect::from_size(100.0, 200.0));
        // bottom-left of the unrotated page ends up top-left after a
        // clockwise quarter turn
        let (x, y) = m.apply(0.0, 0.0);
        assert!(x.abs() < 1e-4 && y.abs() < 1e-4);
        // top-left goes to top-right
        let (x, y) = m.apply(0.0, 100.0);
        assert!((x - 100.0).abs() < 1e-4 && y.abs() < 1e-4);
    }

    #[test]
    fn test_structured_text_from_content() {
        let bytes = build_pdf(b"BT /F1 24 Tf 72 700 Td (Hello) Tj ET", helvetica);
        let doc = LopdfEngine.open(&bytes).unwrap();
        let page = doc.load_page(0).unwrap();
        let text = page.structured_text().unwrap();
        assert_eq!(text.span_count(), 1);

        let Block::Text { lines, .. } = &text.blocks[0] else {
            panic!("expected a text block");
        };
        let span = &lines[0].spans[0];
        assert_eq!(span.text.as_deref(), Some("Hello"));
        assert_eq!(span.font.as_deref(), Some("Helvetica"));
        assert_eq!(span.size, Some(24.0));
        let bbox = span.bbox.unwrap();
        assert!((bbox.x0 - 72.0).abs() < 1e-3);
        // baseline at 792 - 700 = 92, ascent 0.75 * 24 above it
        assert!((bbox.y0 - 74.0).abs() < 1e-3);
        assert!((bbox.y1 - 98.0).abs() < 1e-3);
    }

    #[test]
    fn test_images_listing_includes_nested_forms() {
        let bytes = build_pdf(b"q 100 0 0 50 10 10 cm /Im0 Do Q /Fm0 Do", |doc, page| {
            let image = |doc: &mut Document| {
                doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => 1,
                        "Height" => 1,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    vec![0x80],
                ))
            };
            let outer = image(doc);
            let nested = image(doc);
            let form = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                    "Resources" => dictionary! {
                        "XObject" => dictionary! { "ImN" => nested, "ImDup" => outer },
                    },
                },
                b"20 0 0 20 0 0 cm /ImN Do".to_vec(),
            ));
            page.set(
                "Resources",
                dictionary! {
                    "XObject" => dictionary! { "Fm0" => form, "Im0" => outer },
                },
            );
        });

        let doc = LopdfEngine.open(&bytes).unwrap();
        let page = doc.load_page(0).unwrap();
        let images = page.images().unwrap();
        let names: Vec<&str> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Im0", "ImN"]);

        let rects = page.image_rects(images[0].xref).unwrap();
        assert_eq!(rects, vec![Rect::new(10.0, 732.0, 110.0, 782.0)]);

        let nested_rects = page.image_rects(images[1].xref).unwrap();
        assert_eq!(nested_rects, vec![Rect::new(0.0, 772.0, 20.0, 792.0)]);
    }

    #[test]
    fn test_recursive_form_fails_page_load_and_listing_terminates() {
        let mut doc = Document::with_version("1.5");
        let form_id = doc.new_object_id();
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0x80],
        ));
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                    "Resources" => dictionary! {
                        "XObject" => dictionary! { "Fm0" => form_id, "Im0" => image_id },
                    },
                },
                b"/Im0 Do /Fm0 Do /Fm0 Do /Fm0 Do /Fm0 Do".to_vec(),
            )),
        );
        let resources = dictionary! { "XObject" => dictionary! { "Fm0" => form_id } };

        let mut interpreter = Interpreter::new(&doc, Matrix::IDENTITY);
        let result = interpreter.run(b"/Fm0 Do", Some(&resources), 0);
        assert!(matches!(result, Err(EngineError::Content(_))));

        let mut seen = HashSet::new();
        let mut images = Vec::new();
        collect_images(&doc, &resources, 0, &mut seen, &mut images);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].xref, ObjectRef::new(image_id.0, image_id.1));
    }

    #[test]
    fn test_extract_image_gray_to_png() {
        let bytes = build_pdf(b"/Im0 Do", |doc, page| {
            let id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 2,
                    "Height" => 1,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                vec![0x00, 0xFF],
            ));
            page.set(
                "Resources",
                dictionary! { "XObject" => dictionary! { "Im0" => id } },
            );
        });
        let doc = LopdfEngine.open(&bytes).unwrap();
        let xref = doc.load_page(0).unwrap().images().unwrap()[0].xref;
        let image = doc.extract_image(xref).unwrap();
        assert_eq!(image.ext, "png");
        assert!(image.data.starts_with(b"\x89PNG"));
    }
}
