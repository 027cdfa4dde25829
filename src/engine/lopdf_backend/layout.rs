//! Groups glyph runs into spans, lines and blocks.

use super::interpreter::{GlyphRun, Mark};
use crate::engine::{Block, Line, Rect, Span, StructuredText};

/// Horizontal gap, relative to the font size, that reads as a word break
const SPACE_GAP: f32 = 0.15;

/// Baseline shift, relative to the font size, that starts a new line
const LINE_SHIFT: f32 = 0.5;

/// Vertical gap, relative to the line height, that starts a new block
const BLOCK_GAP: f32 = 1.5;

struct SpanBuilder {
    text: String,
    bbox: Rect,
    size: f32,
    font: Option<String>,
    color: u32,
}

impl SpanBuilder {
    fn from_run(run: &GlyphRun) -> Self {
        Self {
            text: run.text.clone(),
            bbox: run.bbox,
            size: run.size,
            font: run.font.clone(),
            color: run.color,
        }
    }

    fn same_style(&self, run: &GlyphRun) -> bool {
        self.font == run.font && (self.size - run.size).abs() < 0.01 && self.color == run.color
    }

    fn finish(self) -> Span {
        Span {
            text: Some(self.text),
            bbox: Some(self.bbox),
            size: Some(self.size),
            font: self.font,
            color: Some(self.color),
        }
    }
}

struct LineBuilder {
    baseline: f32,
    /// Pen position after the last run
    end_x: f32,
    bbox: Rect,
    spans: Vec<SpanBuilder>,
}

impl LineBuilder {
    fn new(run: &GlyphRun) -> Self {
        Self {
            baseline: run.origin.1,
            end_x: run.end.0,
            bbox: run.bbox,
            spans: vec![SpanBuilder::from_run(run)],
        }
    }

    fn accepts(&self, run: &GlyphRun) -> bool {
        let tolerance = run.size.max(1.0) * LINE_SHIFT;
        (run.origin.1 - self.baseline).abs() <= tolerance && run.origin.0 >= self.end_x - tolerance
    }

    fn push(&mut self, run: &GlyphRun) {
        let gap = run.origin.0 - self.end_x;
        let needs_space = gap > run.size * SPACE_GAP;

        match self.spans.last_mut() {
            Some(span) if span.same_style(run) => {
                if needs_space && !ends_with_space(&span.text) && !starts_with_space(&run.text) {
                    span.text.push(' ');
                }
                span.text.push_str(&run.text);
                span.bbox = span.bbox.union(&run.bbox);
            }
            Some(span) => {
                if needs_space && !ends_with_space(&span.text) && !starts_with_space(&run.text) {
                    span.text.push(' ');
                }
                self.spans.push(SpanBuilder::from_run(run));
            }
            None => self.spans.push(SpanBuilder::from_run(run)),
        }

        self.end_x = run.end.0;
        self.bbox = self.bbox.union(&run.bbox);
    }

    fn finish(self) -> Line {
        Line {
            bbox: self.bbox,
            spans: self.spans.into_iter().map(SpanBuilder::finish).collect(),
        }
    }
}

fn ends_with_space(text: &str) -> bool {
    text.chars().last().is_some_and(char::is_whitespace)
}

fn starts_with_space(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

#[derive(Default)]
struct BlockBuilder {
    lines: Vec<LineBuilder>,
}

impl BlockBuilder {
    /// Whether `run` sits too far below the last line to continue the block
    fn is_detached(&self, run: &GlyphRun) -> bool {
        let Some(last) = self.lines.last() else {
            return false;
        };
        let line_height = last.bbox.height().max(run.bbox.height());
        let gap = (run.bbox.y0 - last.bbox.y1).max(last.bbox.y0 - run.bbox.y1);
        gap > line_height * BLOCK_GAP
    }

    fn finish(self) -> Option<Block> {
        let mut lines = self.lines.into_iter().map(LineBuilder::finish);
        let first = lines.next()?;
        let mut bbox = first.bbox;
        let mut out = vec![first];
        for line in lines {
            bbox = bbox.union(&line.bbox);
            out.push(line);
        }
        Some(Block::Text { bbox, lines: out })
    }
}

/// Build structured text from marks in paint order
pub(super) fn build(marks: &[Mark]) -> StructuredText {
    let mut blocks = Vec::new();
    let mut current = BlockBuilder::default();

    for mark in marks {
        match mark {
            Mark::Glyphs(run) => {
                if run.text.is_empty() {
                    continue;
                }
                if let Some(line) = current.lines.last_mut() {
                    if line.accepts(run) {
                        line.push(run);
                        continue;
                    }
                }
                if current.is_detached(run) {
                    blocks.extend(std::mem::take(&mut current).finish());
                }
                current.lines.push(LineBuilder::new(run));
            }
            Mark::Image(placement) => {
                blocks.extend(std::mem::take(&mut current).finish());
                blocks.push(Block::Image {
                    bbox: placement.rect,
                });
            }
        }
    }
    blocks.extend(current.finish());

    StructuredText { blocks }
}
