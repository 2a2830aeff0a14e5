//! A ratatui widget that blits a [`LineBuffer`].
//!
//! Every cell of the buffer maps to exactly one terminal cell; the
//! horizontal offset and the fill/overflow columns are handled by
//! [`LineBuffer::render_line`], so this widget only copies cells and
//! resolves their attributes through the theme.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;

use crate::lines::LineBuffer;
use crate::ui::theme::Theme;

pub struct LinesWidget<'a> {
    buffer: &'a LineBuffer,
    theme: &'a Theme,
    h_offset: i64,
    filler: char,
    overflow: char,
}

impl<'a> LinesWidget<'a> {
    pub fn new(buffer: &'a LineBuffer, theme: &'a Theme) -> Self {
        Self {
            buffer,
            theme,
            h_offset: 0,
            filler: ' ',
            overflow: '…',
        }
    }

    pub fn h_offset(mut self, h_offset: i64) -> Self {
        self.h_offset = h_offset;
        self
    }

    pub fn filler(mut self, filler: char) -> Self {
        self.filler = filler;
        self
    }

    pub fn overflow(mut self, overflow: char) -> Self {
        self.overflow = overflow;
        self
    }
}

impl Widget for LinesWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let rows = self.buffer.render(
            area.width as usize,
            area.height as usize,
            self.h_offset,
            self.filler,
            self.overflow,
        );

        for (y, row) in rows.iter().enumerate() {
            for (x, cell) in row.cells().iter().enumerate() {
                let position = (area.x + x as u16, area.y + y as u16);
                if let Some(target) = buf.cell_mut(position) {
                    target.set_char(cell.ch());
                    target.set_style(self.theme.style_for(cell.attrs()));
                }
            }
        }
    }
}
