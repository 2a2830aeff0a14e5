//! Turning messages into styled lines.
//!
//! The tree renderer only depends on the [`MessageFormatter`] capability:
//! a fixed-width meta column, a per-message body rendering and a cursor
//! line. [`RoomFormatter`] is the production implementation, driven by the
//! configuration; tests substitute their own formatters.

use crate::cache::RenderedMessage;
use crate::config::Config;
use crate::markup::{attrs, Attrs, StyledText};
use crate::store::Message;

/// The capability the tree renderer needs from a formatter.
pub trait MessageFormatter {
    /// Width of the meta column, including its trailing space.
    fn meta_width(&self) -> usize;

    /// Render one message at the given content width.
    fn render(&self, message: &Message, width: usize) -> RenderedMessage;

    /// Render the cursor line at the given content width.
    fn render_cursor(&self, width: usize) -> StyledText;
}

const TIME_FORMAT: &str = "%H:%M";
const TIME_WIDTH: usize = 5;
const YEAR_FORMAT: &str = "%y-%m-%d ";
const YEAR_WIDTH: usize = 9;
const SECONDS_FORMAT: &str = ":%S";
const SECONDS_WIDTH: usize = 3;

/// Formats messages the way the room view displays them: a time prefix,
/// the sender nick in configurable surrounds, and the message body with
/// wide characters replaced by a placeholder.
#[derive(Debug, Clone)]
pub struct RoomFormatter {
    own_nick: String,
    show_year: bool,
    show_seconds: bool,
    meta_style: String,
    surround_left: String,
    surround_right: String,
    surround_style: String,
    cursor_surround_left: String,
    cursor_surround_right: String,
    cursor_surround_style: String,
    cursor_fill: String,
    cursor_fill_style: String,
    nick_style: String,
    own_nick_style: String,
    cursor_own_nick_style: String,
    placeholder: char,
}

impl RoomFormatter {
    pub fn from_config(config: &Config, own_nick: impl Into<String>) -> Self {
        Self {
            own_nick: own_nick.into(),
            show_year: config.meta.show_year,
            show_seconds: config.meta.show_seconds,
            meta_style: config.meta.style.clone(),
            surround_left: config.surround.left.clone(),
            surround_right: config.surround.right.clone(),
            surround_style: config.surround.style.clone(),
            cursor_surround_left: config.cursor_surround.left.clone(),
            cursor_surround_right: config.cursor_surround.right.clone(),
            cursor_surround_style: config.cursor_surround.style.clone(),
            cursor_fill: config.cursor_surround.fill.clone(),
            cursor_fill_style: config.cursor_surround.fill_style.clone(),
            nick_style: config.nick.style.clone(),
            own_nick_style: config.nick.own_nick_style.clone(),
            cursor_own_nick_style: config.nick.cursor_own_nick_style.clone(),
            placeholder: config.wide_placeholder(),
        }
    }

    pub fn own_nick(&self) -> &str {
        &self.own_nick
    }

    pub fn set_own_nick(&mut self, nick: impl Into<String>) {
        self.own_nick = nick.into();
    }

    /// Replace every character whose East-Asian width class is Wide or
    /// Fullwidth; those occupy two terminal cells and would break the
    /// column arithmetic of the rendered grid. Characters of any other
    /// class (N, Na, H, A) pass through unchanged, combining marks
    /// included.
    fn filter_wide(&self, text: &str) -> String {
        text.chars()
            .map(|ch| {
                if is_east_asian_wide(ch) {
                    self.placeholder
                } else {
                    ch
                }
            })
            .collect()
    }

    fn style_attrs(&self, style: &str) -> Attrs {
        attrs([("style", style)])
    }

    fn render_meta(&self, message: &Message) -> StyledText {
        let mut format = String::new();
        if self.show_year {
            format.push_str(YEAR_FORMAT);
        }
        format.push_str(TIME_FORMAT);
        if self.show_seconds {
            format.push_str(SECONDS_FORMAT);
        }

        let text = message.timestamp.format(&format).to_string();
        StyledText::of(&text, self.style_attrs(&self.meta_style)) + StyledText::plain(" ")
    }

    /// The framed nick that prefixes a message's first body line.
    fn render_nick(&self, nick: &str) -> StyledText {
        let nick_style = if nick == self.own_nick {
            &self.own_nick_style
        } else {
            &self.nick_style
        };
        let left = StyledText::of(&self.surround_left, self.style_attrs(&self.surround_style));
        let framed = StyledText::of(&self.filter_wide(nick), self.style_attrs(nick_style));
        let right = StyledText::of(&self.surround_right, self.style_attrs(&self.surround_style));
        left + framed + right + &StyledText::plain(" ")
    }
}

impl MessageFormatter for RoomFormatter {
    fn meta_width(&self) -> usize {
        let mut width = TIME_WIDTH + 1;
        if self.show_year {
            width += YEAR_WIDTH;
        }
        if self.show_seconds {
            width += SECONDS_WIDTH;
        }
        width
    }

    fn render(&self, message: &Message, _width: usize) -> RenderedMessage {
        let meta = self.render_meta(message);
        let nick = self.render_nick(&message.nick);
        let continuation = StyledText::plain(&" ".repeat(nick.len()));

        let lines = message
            .content
            .split('\n')
            .enumerate()
            .map(|(i, line)| {
                let prefix = if i == 0 { &nick } else { &continuation };
                prefix.clone() + &StyledText::plain(&self.filter_wide(line))
            })
            .collect();

        RenderedMessage {
            id: message.id.clone(),
            meta,
            lines,
        }
    }

    fn render_cursor(&self, width: usize) -> StyledText {
        let left = StyledText::of(
            &self.cursor_surround_left,
            self.style_attrs(&self.cursor_surround_style),
        );
        let nick = StyledText::of(
            &self.filter_wide(&self.own_nick),
            self.style_attrs(&self.cursor_own_nick_style),
        );
        let right = StyledText::of(
            &self.cursor_surround_right,
            self.style_attrs(&self.cursor_surround_style),
        );
        let framed = left + nick + right;

        let rest = width.saturating_sub(framed.len());
        let fill = StyledText::of(&self.cursor_fill, self.style_attrs(&self.cursor_fill_style));
        framed + fill.repeat(rest)
    }
}

/// Codepoint ranges whose East_Asian_Width class is Wide (W) or Fullwidth
/// (F), from Unicode's EastAsianWidth.txt, with adjacent ranges merged.
/// Everything outside these ranges has class N, Na, H or A.
const EAST_ASIAN_WIDE_RANGES: &[(u32, u32)] = &[
    (0x1100, 0x115F),
    (0x231A, 0x231B),
    (0x2329, 0x232A),
    (0x23E9, 0x23EC),
    (0x23F0, 0x23F0),
    (0x23F3, 0x23F3),
    (0x25FD, 0x25FE),
    (0x2614, 0x2615),
    (0x2648, 0x2653),
    (0x267F, 0x267F),
    (0x2693, 0x2693),
    (0x26A1, 0x26A1),
    (0x26AA, 0x26AB),
    (0x26BD, 0x26BE),
    (0x26C4, 0x26C5),
    (0x26CE, 0x26CE),
    (0x26D4, 0x26D4),
    (0x26EA, 0x26EA),
    (0x26F2, 0x26F3),
    (0x26F5, 0x26F5),
    (0x26FA, 0x26FA),
    (0x26FD, 0x26FD),
    (0x2705, 0x2705),
    (0x270A, 0x270B),
    (0x2728, 0x2728),
    (0x274C, 0x274C),
    (0x274E, 0x274E),
    (0x2753, 0x2755),
    (0x2757, 0x2757),
    (0x2795, 0x2797),
    (0x27B0, 0x27B0),
    (0x27BF, 0x27BF),
    (0x2B1B, 0x2B1C),
    (0x2B50, 0x2B50),
    (0x2B55, 0x2B55),
    (0x2E80, 0x2E99),
    (0x2E9B, 0x2EF3),
    (0x2F00, 0x2FD5),
    (0x2FF0, 0x2FFB),
    (0x3000, 0x303E),
    (0x3041, 0x3096),
    (0x3099, 0x30FF),
    (0x3105, 0x312F),
    (0x3131, 0x318E),
    (0x3190, 0x31E3),
    (0x31F0, 0x321E),
    (0x3220, 0x3247),
    (0x3250, 0x4DBF),
    (0x4E00, 0xA48C),
    (0xA490, 0xA4C6),
    (0xA960, 0xA97C),
    (0xAC00, 0xD7A3),
    (0xF900, 0xFAFF),
    (0xFE10, 0xFE19),
    (0xFE30, 0xFE52),
    (0xFE54, 0xFE66),
    (0xFE68, 0xFE6B),
    (0xFF01, 0xFF60),
    (0xFFE0, 0xFFE6),
    (0x16FE0, 0x16FE4),
    (0x16FF0, 0x16FF1),
    (0x17000, 0x187F7),
    (0x18800, 0x18CD5),
    (0x18D00, 0x18D08),
    (0x1AFF0, 0x1AFF3),
    (0x1AFF5, 0x1AFFB),
    (0x1AFFD, 0x1AFFE),
    (0x1B000, 0x1B122),
    (0x1B150, 0x1B152),
    (0x1B164, 0x1B167),
    (0x1B170, 0x1B2FB),
    (0x1F004, 0x1F004),
    (0x1F0CF, 0x1F0CF),
    (0x1F18E, 0x1F18E),
    (0x1F191, 0x1F19A),
    (0x1F200, 0x1F202),
    (0x1F210, 0x1F23B),
    (0x1F240, 0x1F248),
    (0x1F250, 0x1F251),
    (0x1F260, 0x1F265),
    (0x1F300, 0x1F320),
    (0x1F32D, 0x1F335),
    (0x1F337, 0x1F37C),
    (0x1F37E, 0x1F393),
    (0x1F3A0, 0x1F3CA),
    (0x1F3CF, 0x1F3D3),
    (0x1F3E0, 0x1F3F0),
    (0x1F3F4, 0x1F3F4),
    (0x1F3F8, 0x1F43E),
    (0x1F440, 0x1F440),
    (0x1F442, 0x1F4FC),
    (0x1F4FF, 0x1F53D),
    (0x1F54B, 0x1F54E),
    (0x1F550, 0x1F567),
    (0x1F57A, 0x1F57A),
    (0x1F595, 0x1F596),
    (0x1F5A4, 0x1F5A4),
    (0x1F5FB, 0x1F64F),
    (0x1F680, 0x1F6C5),
    (0x1F6CC, 0x1F6CC),
    (0x1F6D0, 0x1F6D2),
    (0x1F6D5, 0x1F6D7),
    (0x1F6DC, 0x1F6DF),
    (0x1F6EB, 0x1F6EC),
    (0x1F6F4, 0x1F6FC),
    (0x1F7E0, 0x1F7EB),
    (0x1F7F0, 0x1F7F0),
    (0x1F90C, 0x1F93A),
    (0x1F93C, 0x1F945),
    (0x1F947, 0x1F9FF),
    (0x1FA70, 0x1FA7C),
    (0x1FA80, 0x1FA88),
    (0x1FA90, 0x1FABD),
    (0x1FABF, 0x1FAC5),
    (0x1FACE, 0x1FADB),
    (0x1FAE0, 0x1FAE8),
    (0x1FAF0, 0x1FAF8),
    (0x20000, 0x2FFFD),
    (0x30000, 0x3FFFD),
];

/// Whether `ch`'s East_Asian_Width class is Wide or Fullwidth.
fn is_east_asian_wide(ch: char) -> bool {
    let cp = ch as u32;
    EAST_ASIAN_WIDE_RANGES
        .binary_search_by(|&(start, end)| {
            if end < cp {
                std::cmp::Ordering::Less
            } else if start > cp {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Message;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn formatter() -> RoomFormatter {
        RoomFormatter::from_config(&Config::default(), "self")
    }

    fn message(nick: &str, content: &str) -> Message {
        Message::new(
            "m1",
            None,
            Utc.with_ymd_and_hms(2019, 5, 7, 13, 25, 6).unwrap(),
            nick,
            content,
        )
    }

    #[test]
    fn meta_width_matches_the_rendered_meta() {
        let mut formatter = formatter();
        let rendered = formatter.render(&message("nick", "hi"), 40);
        assert_eq!(formatter.meta_width(), rendered.meta.len());
        assert_eq!("13:25 ", rendered.meta.text());

        formatter.show_year = true;
        formatter.show_seconds = true;
        let rendered = formatter.render(&message("nick", "hi"), 40);
        assert_eq!(formatter.meta_width(), rendered.meta.len());
        assert_eq!("19-05-07 13:25:06 ", rendered.meta.text());
    }

    #[test]
    fn first_line_is_framed_and_continuations_are_blank_padded() {
        let rendered = formatter().render(&message("garm", "one\ntwo"), 40);
        assert_eq!(2, rendered.lines.len());
        assert_eq!("[garm] one", rendered.lines[0].text());
        assert_eq!("       two", rendered.lines[1].text());
    }

    #[test]
    fn nick_carries_the_nick_style() {
        let rendered = formatter().render(&message("garm", "hi"), 40);
        let line = &rendered.lines[0];
        assert_eq!(Some(&"nick".into()), line.get(1, "style"));
        // The surrounds are styled separately from the nick.
        assert_eq!(Some(&"none".into()), line.get(0, "style"));
    }

    #[test]
    fn own_messages_use_the_own_nick_style() {
        let rendered = formatter().render(&message("self", "hi"), 40);
        assert_eq!(Some(&"own_nick".into()), rendered.lines[0].get(1, "style"));
    }

    #[test]
    fn wide_characters_are_replaced_but_newlines_survive() {
        let rendered = formatter().render(&message("garm", "a漢b\nc"), 40);
        assert_eq!("[garm] a�b", rendered.lines[0].text());
        assert_eq!("       c", rendered.lines[1].text());
    }

    #[test]
    fn combining_marks_pass_through_unfiltered() {
        // U+0301 has width class A, which is not filtered, even though it
        // occupies no column of its own.
        let rendered = formatter().render(&message("garm", "caf\u{e9} cafe\u{301}"), 40);
        assert_eq!("[garm] caf\u{e9} cafe\u{301}", rendered.lines[0].text());
    }

    #[test]
    fn only_the_wide_and_fullwidth_classes_are_filtered() {
        let formatter = formatter();
        // Fullwidth A (class F) and a CJK ideograph (class W) are replaced.
        assert_eq!("��", formatter.filter_wide("Ａ漢"));
        // Halfwidth katakana (class H) and ambiguous-width characters
        // (class A) stay.
        assert_eq!("ｱ±", formatter.filter_wide("ｱ±"));
    }

    #[test]
    fn cursor_line_is_padded_to_width() {
        let cursor = formatter().render_cursor(20);
        assert_eq!(20, cursor.len());
        assert_eq!("<self>", cursor.slice(..6).text());
        // A width smaller than the framed nick does not truncate it.
        let cursor = formatter().render_cursor(3);
        assert_eq!("<self>", cursor.text());
    }
}
