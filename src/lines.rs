//! A buffer of styled lines with a signed vertical origin.
//!
//! [`LineBuffer`] is the unit the tree renderer assembles the viewport in.
//! Lines are addressed by a signed offset: prepending a line decrements the
//! upper offset instead of renumbering, which is what makes the scroll
//! engine's "extend upwards until the screen is full" loops cheap. Negative
//! offsets are expected intermediate states during assembly; only offsets
//! `0..height` are visible in the end.

use std::collections::VecDeque;

use crate::markup::{Attrs, StyledText};

/// A single buffered line: line-wide attributes plus styled text.
type Line = (Attrs, StyledText);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineBuffer {
    upper_offset: i64,
    lines: VecDeque<Line>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Offset of the first line.
    pub fn upper_offset(&self) -> i64 {
        self.upper_offset
    }

    /// Offset of the last line. For an empty buffer this is one less than
    /// the upper offset.
    pub fn lower_offset(&self) -> i64 {
        self.upper_offset + self.lines.len() as i64 - 1
    }

    /// Move the first line to `offset` without touching the lines.
    pub fn set_upper_offset(&mut self, offset: i64) {
        self.upper_offset = offset;
    }

    /// Move the last line to `offset` without touching the lines.
    pub fn set_lower_offset(&mut self, offset: i64) {
        self.upper_offset = offset - self.lines.len() as i64 + 1;
    }

    /// Shift all offsets by `delta`.
    pub fn shift(&mut self, delta: i64) {
        self.upper_offset += delta;
    }

    /// Prepend a line; the new line takes the previous `upper_offset - 1`.
    pub fn append_above(&mut self, attrs: Attrs, text: StyledText) {
        self.lines.push_front((attrs, text));
        self.upper_offset -= 1;
    }

    /// Append a line below the current last line.
    pub fn append_below(&mut self, attrs: Attrs, text: StyledText) {
        self.lines.push_back((attrs, text));
    }

    /// Splice `other` above this buffer, ignoring `other`'s own offsets.
    pub fn extend_above(&mut self, other: LineBuffer) {
        self.upper_offset -= other.lines.len() as i64;
        for line in other.lines.into_iter().rev() {
            self.lines.push_front(line);
        }
    }

    /// Splice `other` below this buffer, ignoring `other`'s own offsets.
    pub fn extend_below(&mut self, other: LineBuffer) {
        self.lines.extend(other.lines);
    }

    /// The line at absolute offset `offset`, if present.
    pub fn get(&self, offset: i64) -> Option<(&Attrs, &StyledText)> {
        let index = offset - self.upper_offset;
        if index < 0 {
            return None;
        }
        self.lines
            .get(index as usize)
            .map(|(attrs, text)| (attrs, text))
    }

    /// Iterate over `(offset, attrs, text)` in order.
    pub fn rows(&self) -> impl Iterator<Item = (i64, &Attrs, &StyledText)> {
        self.lines
            .iter()
            .enumerate()
            .map(move |(i, (attrs, text))| (self.upper_offset + i as i64, attrs, text))
    }

    /// The sub-buffer clamped to `[start, end]`, preserving absolute
    /// offsets.
    pub fn between(&self, start: i64, end: i64) -> LineBuffer {
        let mut result = self.clone();
        while result.upper_offset < start && !result.lines.is_empty() {
            result.lines.pop_front();
            result.upper_offset += 1;
        }
        while result.lower_offset() > end && !result.lines.is_empty() {
            result.lines.pop_back();
        }
        if result.lines.is_empty() {
            result.upper_offset = start;
        }
        result
    }

    /// Like [`LineBuffer::between`], but pad with blank lines so the result
    /// covers exactly `[start, end]`.
    pub fn to_size(&self, start: i64, end: i64) -> LineBuffer {
        let mut result = self.between(start, end);
        while result.upper_offset > start {
            result.append_above(Attrs::new(), StyledText::empty());
        }
        while result.lower_offset() < end {
            result.append_below(Attrs::new(), StyledText::empty());
        }
        result
    }

    /// Render the line at `offset` to exactly `width` cells.
    ///
    /// The rightmost column is reserved: it shows `overflow` when the line
    /// continues past the right edge and `fill` otherwise. The remaining
    /// `width - 1` columns show the text window starting at `h_offset`,
    /// padded with `fill` on either side. Line-wide attributes are applied
    /// to every cell of the result.
    pub fn render_line(
        &self,
        offset: i64,
        width: usize,
        h_offset: i64,
        fill: char,
        overflow: char,
    ) -> StyledText {
        if width == 0 {
            return StyledText::empty();
        }

        let empty_attrs = Attrs::new();
        let empty_text = StyledText::empty();
        let (attrs, text) = match self.get(offset) {
            Some(pair) => pair,
            None => (&empty_attrs, &empty_text),
        };

        let body_width = (width - 1) as i64;
        let body_start = h_offset;
        let body_end = h_offset + body_width;
        let len = text.len() as i64;

        let left_pad = (body_end.min(0) - body_start).max(0);
        let slice_start = body_start.clamp(0, len);
        let slice_end = body_end.clamp(0, len);
        let right_pad = (body_end - body_start.max(len)).max(0);

        let fill_text = StyledText::plain(&fill.to_string());
        let mut result = fill_text.repeat(left_pad as usize);
        if slice_start < slice_end {
            result = result + text.slice(slice_start as usize..slice_end as usize);
        }
        result = result + fill_text.repeat(right_pad as usize);

        // The reserved overflow column.
        if body_end < len {
            result = result + StyledText::plain(&overflow.to_string());
        } else {
            result = result + fill_text;
        }

        for (name, value) in attrs {
            result = result.set(name, value.clone(), ..);
        }
        result
    }

    /// Render rows `0..height`, each exactly `width` cells wide.
    pub fn render(
        &self,
        width: usize,
        height: usize,
        h_offset: i64,
        fill: char,
        overflow: char,
    ) -> Vec<StyledText> {
        let sized = self.to_size(0, height as i64 - 1);
        (0..height as i64)
            .map(|row| sized.render_line(row, width, h_offset, fill, overflow))
            .collect()
    }
}
