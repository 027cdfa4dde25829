//! Content stream interpreter
//!
//! Walks the decoded operators of a page (and of the Form XObjects it
//! draws) and records what gets painted, in paint order: glyph runs from
//! the text-showing operators and placements from image `Do` calls.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use super::font::FontInfo;
use super::{name_of, number, resolve, stream_bytes, MAX_NESTING};

/// Operators interpreted per page, forms included
const MAX_OPERATIONS: usize = 1_000_000;
use crate::engine::{EngineError, EngineResult, Matrix, ObjectRef, Rect};

/// Something painted on the page
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Mark {
    Glyphs(GlyphRun),
    Image(Placement),
}

/// Text shown by a single string operand, in page space
#[derive(Debug, Clone, PartialEq)]
pub(super) struct GlyphRun {
    pub text: String,
    pub bbox: Rect,
    /// Baseline start
    pub origin: (f32, f32),
    /// Baseline end (origin of the next glyph)
    pub end: (f32, f32),
    pub size: f32,
    pub font: Option<String>,
    /// Packed `0xRRGGBB`
    pub color: u32,
}

/// An image XObject drawn at `rect`
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Placement {
    pub xref: ObjectRef,
    pub rect: Rect,
}

#[derive(Debug, Clone)]
struct TextState {
    font: Rc<FontInfo>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// `Tz / 100`
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Rc::new(FontInfo::fallback()),
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Matrix,
    fill: u32,
    text: TextState,
}

pub(super) struct Interpreter<'a> {
    doc: &'a Document,
    page_matrix: Matrix,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    /// Text matrix and text line matrix, valid inside `BT`/`ET`
    tm: Matrix,
    tlm: Matrix,
    fonts: HashMap<ObjectId, Rc<FontInfo>>,
    /// Forms currently being drawn, outermost first
    active_forms: Vec<ObjectId>,
    operations: usize,
    marks: Vec<Mark>,
}

impl<'a> Interpreter<'a> {
    pub fn new(doc: &'a Document, page_matrix: Matrix) -> Self {
        Self {
            doc,
            page_matrix,
            state: GraphicsState::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            fonts: HashMap::new(),
            active_forms: Vec::new(),
            operations: 0,
            marks: Vec::new(),
        }
    }

    pub fn into_marks(self) -> Vec<Mark> {
        self.marks
    }

    /// Interpret one content stream against `resources`
    pub fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        depth: usize,
    ) -> EngineResult<()> {
        if content.is_empty() {
            return Ok(());
        }
        let content = Content::decode(content)
            .map_err(|e| EngineError::Content(format!("failed to decode content stream: {e}")))?;

        for op in &content.operations {
            self.operations += 1;
            if self.operations > MAX_OPERATIONS {
                return Err(EngineError::Content(format!(
                    "page exceeds {MAX_OPERATIONS} content operators"
                )));
            }
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(saved) = self.stack.pop() {
                        self.state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operand(operands) {
                        self.state.ctm = m.then(&self.state.ctm);
                    }
                }

                "BT" => {
                    self.tm = Matrix::IDENTITY;
                    self.tlm = Matrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    if let (Some(name), Some(size)) = (
                        operands.first().and_then(name_of),
                        operands.get(1).and_then(number),
                    ) {
                        self.state.text.font = self.font(resources, &name);
                        self.state.text.size = size;
                    }
                }
                "Tc" => {
                    if let Some(v) = operands.first().and_then(number) {
                        self.state.text.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let Some(v) = operands.first().and_then(number) {
                        self.state.text.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let Some(v) = operands.first().and_then(number) {
                        self.state.text.horizontal_scale = v / 100.0;
                    }
                }
                "TL" => {
                    if let Some(v) = operands.first().and_then(number) {
                        self.state.text.leading = v;
                    }
                }
                "Ts" => {
                    if let Some(v) = operands.first().and_then(number) {
                        self.state.text.rise = v;
                    }
                }
                "Td" => {
                    if let [tx, ty] = numbers(operands)[..] {
                        self.next_line(tx, ty);
                    }
                }
                "TD" => {
                    if let [tx, ty] = numbers(operands)[..] {
                        self.state.text.leading = -ty;
                        self.next_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_operand(operands) {
                        self.tm = m;
                        self.tlm = m;
                    }
                }
                "T*" => self.next_line(0.0, -self.state.text.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                }
                "'" => {
                    self.next_line(0.0, -self.state.text.leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                }
                "\"" => {
                    if let [Some(aw), Some(ac)] = [
                        operands.first().and_then(number),
                        operands.get(1).and_then(number),
                    ] {
                        self.state.text.word_spacing = aw;
                        self.state.text.char_spacing = ac;
                    }
                    self.next_line(0.0, -self.state.text.leading);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(bytes),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let text = &self.state.text;
                                        let tx = -(adjust / 1000.0)
                                            * text.size
                                            * text.horizontal_scale;
                                        self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
                                    }
                                }
                            }
                        }
                    }
                }

                "g" => {
                    if let [gray] = numbers(operands)[..] {
                        self.state.fill = pack_gray(gray);
                    }
                }
                "rg" => {
                    if let [r, g, b] = numbers(operands)[..] {
                        self.state.fill = pack_rgb(r, g, b);
                    }
                }
                "k" => {
                    if let [c, m, y, k] = numbers(operands)[..] {
                        self.state.fill = pack_cmyk(c, m, y, k);
                    }
                }
                "sc" | "scn" => {
                    // a trailing pattern name is ignored
                    match numbers(operands)[..] {
                        [gray] => self.state.fill = pack_gray(gray),
                        [r, g, b] => self.state.fill = pack_rgb(r, g, b),
                        [c, m, y, k] => self.state.fill = pack_cmyk(c, m, y, k),
                        _ => {}
                    }
                }
                "cs" => self.state.fill = 0,

                "Do" => {
                    if let Some(name) = operands.first().and_then(name_of) {
                        self.draw_xobject(resources, &name, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn font(&mut self, resources: Option<&Dictionary>, name: &str) -> Rc<FontInfo> {
        let entry = resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|fonts| resolve(self.doc, fonts).as_dict().ok())
            .and_then(|fonts| fonts.get(name.as_bytes()).ok());

        let Some(entry) = entry else {
            return Rc::new(FontInfo::fallback());
        };

        let load = |doc: &Document| {
            resolve(doc, entry)
                .as_dict()
                .map(|dict| FontInfo::load(doc, dict))
                .unwrap_or_else(|_| FontInfo::fallback())
        };

        match entry {
            Object::Reference(id) => {
                let doc = self.doc;
                self.fonts
                    .entry(*id)
                    .or_insert_with(|| Rc::new(load(doc)))
                    .clone()
            }
            _ => Rc::new(load(self.doc)),
        }
    }

    /// Show one string operand and advance the text matrix
    fn show(&mut self, bytes: &[u8]) {
        let text = &self.state.text;
        let glyphs = text.font.decode(bytes);
        if glyphs.is_empty() {
            return;
        }

        let mut advance = 0.0;
        let mut content = String::new();
        for glyph in &glyphs {
            let spacing = text.char_spacing + if glyph.is_space { text.word_spacing } else { 0.0 };
            advance += ((glyph.width / 1000.0) * text.size + spacing) * text.horizontal_scale;
            content.push_str(&glyph.text);
        }

        // text space → page space
        let to_page = self.tm.then(&self.state.ctm).then(&self.page_matrix);
        let ascent = text.font.ascent / 1000.0 * text.size + text.rise;
        let descent = text.font.descent / 1000.0 * text.size + text.rise;
        let bbox = to_page.transform_rect(0.0, descent, advance, ascent);
        let origin = to_page.apply(0.0, text.rise);
        let end = to_page.apply(advance, text.rise);
        let size = text.size.abs() * to_page.vertical_scale();

        let run = GlyphRun {
            text: content,
            bbox,
            origin,
            end,
            size,
            font: text.font.name.clone(),
            color: self.state.fill,
        };
        self.marks.push(Mark::Glyphs(run));
        self.tm = Matrix::translate(advance, 0.0).then(&self.tm);
    }

    fn draw_xobject(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &str,
        depth: usize,
    ) -> EngineResult<()> {
        let doc = self.doc;
        let Some(entry) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|xobjects| resolve(doc, xobjects).as_dict().ok())
            .and_then(|xobjects| xobjects.get(name.as_bytes()).ok())
        else {
            return Ok(());
        };
        let Ok(stream) = resolve(doc, entry).as_stream() else {
            return Ok(());
        };

        match stream.dict.get(b"Subtype").ok().and_then(name_of).as_deref() {
            Some("Image") => {
                if let Object::Reference(id) = entry {
                    let rect = self
                        .state
                        .ctm
                        .then(&self.page_matrix)
                        .transform_rect(0.0, 0.0, 1.0, 1.0);
                    self.marks.push(Mark::Image(Placement {
                        xref: ObjectRef::new(id.0, id.1),
                        rect,
                    }));
                }
            }
            Some("Form") if depth < MAX_NESTING => {
                let form_id = match entry {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                };
                if let Some(id) = form_id {
                    if self.active_forms.contains(&id) {
                        return Err(EngineError::Content(format!(
                            "recursive form XObject {} {} R",
                            id.0, id.1
                        )));
                    }
                }

                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .map(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                    .and_then(|arr| matrix_operand(arr))
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve(doc, o).as_dict().ok())
                    .or(resources);

                let saved = self.state.clone();
                let saved_depth = self.stack.len();
                let (tm, tlm) = (self.tm, self.tlm);
                self.state.ctm = form_matrix.then(&self.state.ctm);
                self.active_forms.extend(form_id);

                let result = self.run(&stream_bytes(doc, stream), form_resources, depth + 1);

                if form_id.is_some() {
                    self.active_forms.pop();
                }
                self.stack.truncate(saved_depth);
                self.state = saved;
                self.tm = tm;
                self.tlm = tlm;
                result?;
            }
            _ => {}
        }
        Ok(())
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    match numbers(operands)[..] {
        [a, b, c, d, e, f] => Some(Matrix::new(a, b, c, d, e, f)),
        _ => None,
    }
}

fn channel(v: f32) -> u32 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u32
}

fn pack_rgb(r: f32, g: f32, b: f32) -> u32 {
    (channel(r) << 16) | (channel(g) << 8) | channel(b)
}

fn pack_gray(gray: f32) -> u32 {
    pack_rgb(gray, gray, gray)
}

fn pack_cmyk(c: f32, m: f32, y: f32, k: f32) -> u32 {
    let k = k.clamp(0.0, 1.0);
    pack_rgb(
        (1.0 - c.clamp(0.0, 1.0)) * (1.0 - k),
        (1.0 - m.clamp(0.0, 1.0)) * (1.0 - k),
        (1.0 - y.clamp(0.0, 1.0)) * (1.0 - k),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn run(content: &[u8]) -> Vec<Mark> {
        let doc = Document::with_version("1.5");
        let mut interpreter = Interpreter::new(&doc, Matrix::IDENTITY);
        interpreter.run(content, None, 0).unwrap();
        interpreter.into_marks()
    }

    fn glyph_runs(marks: &[Mark]) -> Vec<&GlyphRun> {
        marks
            .iter()
            .filter_map(|m| match m {
                Mark::Glyphs(run) => Some(run),
                Mark::Image(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_pack_colors() {
        assert_eq!(pack_rgb(1.0, 0.0, 0.0), 0xFF0000);
        assert_eq!(pack_gray(1.0), 0xFFFFFF);
        assert_eq!(pack_cmyk(0.0, 0.0, 0.0, 1.0), 0x000000);
        assert_eq!(pack_cmyk(1.0, 0.0, 0.0, 0.0), 0x00FFFF);
    }

    #[test]
    fn test_fill_color_follows_graphics_stack() {
        let marks = run(b"BT /F1 10 Tf 1 0 0 rg q 0 0 1 rg (a) Tj Q (b) Tj ET");
        let runs = glyph_runs(&marks);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].color, 0x0000FF);
        assert_eq!(runs[1].color, 0xFF0000);
    }

    #[test]
    fn test_advance_uses_missing_width() {
        // unknown font: every glyph is 500 units wide
        let marks = run(b"BT /F1 10 Tf 100 200 Td (ab) Tj (c) Tj ET");
        let runs = glyph_runs(&marks);
        assert_eq!(runs[0].text, "ab");
        assert_eq!(runs[0].origin, (100.0, 200.0));
        assert_eq!(runs[0].end, (110.0, 200.0));
        assert_eq!(runs[1].origin, (110.0, 200.0));
        assert_eq!(runs[0].size, 10.0);
    }

    #[test]
    fn test_tj_adjustment_moves_left_for_positive_numbers() {
        let marks = run(b"BT /F1 10 Tf [(a) 1000 (b)] TJ ET");
        let runs = glyph_runs(&marks);
        assert_eq!(runs.len(), 2);
        // 5 for the glyph, then 10 back
        assert_eq!(runs[1].origin.0, -5.0);
    }

    #[test]
    fn test_leading_and_next_line() {
        let marks = run(b"BT /F1 10 Tf 14 TL 0 100 Td (a) Tj T* (b) Tj 0 -20 TD (c) Tj (d) ' ET");
        let runs = glyph_runs(&marks);
        assert_eq!(runs[0].origin.1, 100.0);
        assert_eq!(runs[1].origin.1, 86.0);
        assert_eq!(runs[2].origin.1, 66.0);
        // TD set leading to 20
        assert_eq!(runs[3].origin.1, 46.0);
    }

    #[test]
    fn test_ctm_scales_font_size() {
        let marks = run(b"2 0 0 2 0 0 cm BT /F1 10 Tf (a) Tj ET");
        assert_eq!(glyph_runs(&marks)[0].size, 20.0);
    }

    fn form_document(content: &[u8], draws_self: bool) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let form_id = doc.new_object_id();
        let resources = if draws_self {
            dictionary! { "XObject" => dictionary! { "Fm0" => form_id } }
        } else {
            dictionary! {}
        };
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                    "Resources" => resources,
                },
                content.to_vec(),
            )),
        );
        (doc, form_id)
    }

    #[test]
    fn test_self_drawing_form_is_rejected() {
        let (doc, form_id) = form_document(b"/Fm0 Do /Fm0 Do /Fm0 Do /Fm0 Do", true);
        let resources = dictionary! { "XObject" => dictionary! { "Fm0" => form_id } };
        let mut interpreter = Interpreter::new(&doc, Matrix::IDENTITY);
        let err = interpreter.run(b"/Fm0 Do", Some(&resources), 0).unwrap_err();
        assert!(matches!(err, EngineError::Content(ref msg) if msg.contains("recursive form")));
    }

    #[test]
    fn test_form_drawn_twice_is_not_recursion() {
        let (doc, form_id) = form_document(b"BT /F1 10 Tf (x) Tj ET", false);
        let resources = dictionary! { "XObject" => dictionary! { "Fm0" => form_id } };
        let mut interpreter = Interpreter::new(&doc, Matrix::IDENTITY);
        interpreter
            .run(b"/Fm0 Do 1 0 0 1 50 0 cm /Fm0 Do", Some(&resources), 0)
            .unwrap();
        let marks = interpreter.into_marks();
        let runs = glyph_runs(&marks);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].origin.0, 50.0);
    }

    #[test]
    fn test_operator_budget() {
        let content = "q Q ".repeat(MAX_OPERATIONS / 2 + 1);
        let doc = Document::with_version("1.5");
        let mut interpreter = Interpreter::new(&doc, Matrix::IDENTITY);
        let err = interpreter.run(content.as_bytes(), None, 0).unwrap_err();
        assert!(matches!(err, EngineError::Content(_)));
    }

    #[test]
    fn test_missing_xobject_is_ignored() {
        let marks = run(b"q 10 0 0 10 0 0 cm /Im9 Do Q");
        assert!(marks.is_empty());
    }
}
