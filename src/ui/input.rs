//! A small multi-line text input.
//!
//! Used for the message composer and the nick prompt. Keeps its content as
//! a flat string with a character-index cursor; rendering highlights the
//! cursor cell so the widget works without moving the terminal cursor.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Widget;

#[derive(Debug, Clone, Default)]
pub struct InputBox {
    /// The text content of the input box.
    content: String,
    /// Current cursor position as a character index.
    cursor_position: usize,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a character index to a byte index.
    fn char_to_byte_index(&self, char_idx: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_idx)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.content.len())
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_idx = self.char_to_byte_index(self.cursor_position);
        self.content.insert(byte_idx, c);
        self.cursor_position += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let byte_idx = self.char_to_byte_index(self.cursor_position);
            self.content.remove(byte_idx);
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position < self.content.chars().count() {
            let byte_idx = self.char_to_byte_index(self.cursor_position);
            self.content.remove(byte_idx);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.content.chars().count() {
            self.cursor_position += 1;
        }
    }

    pub fn move_cursor_home(&mut self) {
        self.cursor_position = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.content.chars().count();
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor_position = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.cursor_position = self.content.chars().count();
    }

    /// Number of lines the content occupies.
    pub fn line_count(&self) -> usize {
        self.content.split('\n').count()
    }

    /// The content as lines, with the cursor as `(line, column)`.
    fn lines_and_cursor(&self) -> (Vec<&str>, (usize, usize)) {
        let lines: Vec<&str> = self.content.split('\n').collect();

        let mut remaining = self.cursor_position;
        for (row, line) in lines.iter().enumerate() {
            let chars = line.chars().count();
            if remaining <= chars {
                return (lines.clone(), (row, remaining));
            }
            // One extra for the newline separating the rows.
            remaining -= chars + 1;
        }
        let cursor = (lines.len() - 1, lines.last().map_or(0, |l| l.chars().count()));
        (lines, cursor)
    }

    pub fn widget(&self) -> InputBoxWidget<'_> {
        InputBoxWidget { input: self }
    }
}

pub struct InputBoxWidget<'a> {
    input: &'a InputBox,
}

impl Widget for InputBoxWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let (lines, (cursor_row, cursor_col)) = self.input.lines_and_cursor();

        // Keep the cursor's line visible when the content is taller than
        // the area.
        let first_visible = cursor_row.saturating_sub(area.height as usize - 1);

        for (y, line) in lines
            .iter()
            .skip(first_visible)
            .take(area.height as usize)
            .enumerate()
        {
            let row = first_visible + y;
            for (x, ch) in line.chars().chain(std::iter::once(' ')).enumerate() {
                if x >= area.width as usize {
                    break;
                }
                let position = (area.x + x as u16, area.y + y as u16);
                if let Some(target) = buf.cell_mut(position) {
                    target.set_char(ch);
                    if row == cursor_row && x == cursor_col {
                        target.set_style(Style::default().add_modifier(Modifier::REVERSED));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_and_deleting_moves_the_cursor() {
        let mut input = InputBox::new();
        for c in "hello".chars() {
            input.insert_char(c);
        }
        assert_eq!("hello", input.content());

        input.move_cursor_left();
        input.backspace();
        assert_eq!("helo", input.content());

        input.move_cursor_home();
        input.delete_char();
        assert_eq!("elo", input.content());

        input.move_cursor_end();
        input.insert_char('!');
        assert_eq!("elo!", input.content());
    }

    #[test]
    fn newlines_split_the_content_into_lines() {
        let mut input = InputBox::new();
        input.set_content("one");
        input.insert_newline();
        for c in "two".chars() {
            input.insert_char(c);
        }
        assert_eq!("one\ntwo", input.content());
        assert_eq!(2, input.line_count());

        let (lines, cursor) = input.lines_and_cursor();
        assert_eq!(vec!["one", "two"], lines);
        assert_eq!((1, 3), cursor);
    }

    #[test]
    fn multibyte_content_is_edited_by_characters() {
        let mut input = InputBox::new();
        input.set_content("héllo");
        input.backspace();
        input.backspace();
        assert_eq!("hél", input.content());
    }

    #[test]
    fn clear_resets_everything() {
        let mut input = InputBox::new();
        input.set_content("text");
        input.clear();
        assert!(input.is_empty());
        assert_eq!(1, input.line_count());
    }
}
