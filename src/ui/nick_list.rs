//! The presence sidebar.
//!
//! Shows who is connected to the room, grouped into people and bots, with
//! lurkers (sessions that never picked a nick) counted separately. The own
//! session's nick is highlighted.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;

use crate::lines::LineBuffer;
use crate::markup::{attrs, Attrs, StyledText};
use crate::protocol::SessionInfo;
use crate::ui::lines::LinesWidget;
use crate::ui::theme::Theme;

pub struct NickListWidget<'a> {
    sessions: Vec<&'a SessionInfo>,
    own_session_id: Option<&'a str>,
    theme: &'a Theme,
}

impl<'a> NickListWidget<'a> {
    pub fn new(
        sessions: impl IntoIterator<Item = &'a SessionInfo>,
        own_session_id: Option<&'a str>,
        theme: &'a Theme,
    ) -> Self {
        Self {
            sessions: sessions.into_iter().collect(),
            own_session_id,
            theme,
        }
    }

    fn section(&self, lines: &mut LineBuffer, name: &str, sessions: &[&SessionInfo]) {
        let title = StyledText::of(name, attrs([("style", "bold")]))
            + StyledText::of(&format!(" ({})", sessions.len()), attrs([("style", "gray")]));
        lines.append_below(Attrs::new(), title);

        for session in sessions {
            let style = if Some(session.id.as_str()) == self.own_session_id {
                "own_nick"
            } else {
                "nick"
            };
            lines.append_below(
                Attrs::new(),
                StyledText::of(&session.nick, attrs([("style", style)])),
            );
        }
    }

    fn build_lines(&self) -> LineBuffer {
        let mut people: Vec<&SessionInfo> = Vec::new();
        let mut bots: Vec<&SessionInfo> = Vec::new();
        let mut lurkers = 0usize;
        for session in &self.sessions {
            if session.nick.is_empty() {
                lurkers += 1;
            } else if session.is_bot {
                bots.push(session);
            } else {
                people.push(session);
            }
        }
        let by_nick = |a: &&SessionInfo, b: &&SessionInfo| {
            a.nick.to_lowercase().cmp(&b.nick.to_lowercase())
        };
        people.sort_by(by_nick);
        bots.sort_by(by_nick);

        let mut lines = LineBuffer::new();
        if people.is_empty() && bots.is_empty() && lurkers == 0 {
            self.section(&mut lines, "Nobody", &[]);
            return lines;
        }

        if !people.is_empty() {
            self.section(&mut lines, "People", &people);
        }
        if !bots.is_empty() {
            if !lines.is_empty() {
                lines.append_below(Attrs::new(), StyledText::empty());
            }
            self.section(&mut lines, "Bots", &bots);
        }
        if lurkers > 0 {
            if !lines.is_empty() {
                lines.append_below(Attrs::new(), StyledText::empty());
            }
            lines.append_below(
                Attrs::new(),
                StyledText::of(&format!("Lurkers ({lurkers})"), attrs([("style", "gray")])),
            );
        }
        lines
    }
}

impl Widget for NickListWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines = self.build_lines();
        LinesWidget::new(&lines, self.theme).render(area, buf);
    }
}
