//! Drawing the room to the terminal.
//!
//! The layout in `Viewing`/`Editing` mode:
//!
//! ```text
//! ┌──────────── room name ────────────┐
//! │ message tree              │ nicks │
//! │                           │       │
//! ├───────────────────────────────────┤
//! │ composer (Editing only)           │
//! └───────────────────────────────────┘
//! ```
//!
//! The nick prompt is an overlay box; the connecting and failure screens
//! replace the whole layout.

pub mod input;
pub mod lines;
pub mod nick_list;
pub mod theme;

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use ratatui::Frame;

use crate::room::{RoomView, UiMode};
use crate::ui::lines::LinesWidget;
use crate::ui::nick_list::NickListWidget;

const NICK_LIST_WIDTH: u16 = 20;
const MAX_COMPOSER_HEIGHT: u16 = 6;

pub fn draw(room: &mut RoomView, frame: &mut Frame) {
    let area = frame.area();
    match room.mode() {
        UiMode::Connecting => draw_status_screen(room, frame, area, "Connecting to ", "..."),
        UiMode::ConnectionFailed => draw_failure_screen(room, frame, area),
        UiMode::SettingNick => {
            draw_room(room, frame, area);
            draw_nick_prompt(room, frame, area);
        }
        _ => draw_room(room, frame, area),
    }
}

fn draw_status_screen(
    room: &RoomView,
    frame: &mut Frame,
    area: Rect,
    prefix: &str,
    suffix: &str,
) {
    let theme = room.theme();
    let line = Line::from(vec![
        Span::raw(prefix.to_string()),
        Span::styled(format!("&{}", room.room_name()), theme.named("room")),
        Span::raw(suffix.to_string()),
    ]);
    let paragraph = Paragraph::new(line).alignment(Alignment::Center);
    frame.render_widget(paragraph, centered_rows(area, 1));
}

fn draw_failure_screen(room: &RoomView, frame: &mut Frame, area: Rect) {
    let theme = room.theme();
    let mut text = vec![Line::from(vec![
        Span::styled("Could not stay connected to ", theme.named("error")),
        Span::styled(format!("&{}", room.room_name()), theme.named("error_room")),
        Span::styled(".", theme.named("error")),
    ])];
    if let Some(reason) = room.disconnect_reason() {
        text.push(Line::from(Span::styled(
            reason.to_string(),
            theme.named("gray"),
        )));
    }
    let height = text.len() as u16;
    let paragraph = Paragraph::new(text).alignment(Alignment::Center);
    frame.render_widget(paragraph, centered_rows(area, height));
}

fn draw_room(room: &mut RoomView, frame: &mut Frame, area: Rect) {
    let composer_height = if room.mode() == UiMode::Editing {
        (room.composer().line_count() as u16 + 1).min(MAX_COMPOSER_HEIGHT)
    } else {
        0
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(composer_height),
        ])
        .split(area);

    draw_header(room, frame, rows[0]);
    draw_body(room, frame, rows[1]);
    if composer_height > 0 {
        draw_composer(room, frame, rows[2]);
    }
}

fn draw_header(room: &RoomView, frame: &mut Frame, area: Rect) {
    let theme = room.theme();
    let header = Paragraph::new(Line::from(Span::styled(
        format!("&{}", room.room_name()),
        theme.named("room"),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(header, area);
}

fn draw_body(room: &mut RoomView, frame: &mut Frame, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(1),
            Constraint::Length(NICK_LIST_WIDTH),
        ])
        .split(area);

    draw_tree(room, frame, columns[0]);
    draw_divider(room, frame, columns[1]);

    let nick_list = NickListWidget::new(
        room.sessions().collect::<Vec<_>>(),
        room.own_session_id(),
        room.theme(),
    );
    frame.render_widget(nick_list, columns[2]);
}

fn draw_tree(room: &mut RoomView, frame: &mut Frame, area: Rect) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let viewport = room.viewport(area.width as usize, area.height as usize);
    let filler = room.config().filler_char();
    let overflow = room.config().overflow_char();
    let widget = LinesWidget::new(&viewport, room.theme())
        .h_offset(room.h_offset())
        .filler(filler)
        .overflow(overflow);
    frame.render_widget(widget, area);
}

fn draw_divider(room: &RoomView, frame: &mut Frame, area: Rect) {
    let style = room.theme().named("gray");
    for y in area.top()..area.bottom() {
        if let Some(cell) = frame.buffer_mut().cell_mut((area.x, y)) {
            cell.set_char('│');
            cell.set_style(style);
        }
    }
}

fn draw_composer(room: &RoomView, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(room.theme().named("gray"));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    room.composer().widget().render(inner, frame.buffer_mut());
}

fn draw_nick_prompt(room: &RoomView, frame: &mut Frame, area: Rect) {
    let width = (area.width.saturating_sub(4)).min(32).max(12).min(area.width);
    let overlay = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(3)) / 2,
        width,
        height: 3.min(area.height),
    };

    frame.render_widget(Clear, overlay);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(room.theme().named("gray"))
        .title("Choose a nick");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);
    room.nick_input().widget().render(inner, frame.buffer_mut());
}

/// A horizontal band of `height` rows vertically centered in `area`.
fn centered_rows(area: Rect, height: u16) -> Rect {
    let height = height.min(area.height);
    Rect {
        x: area.x,
        y: area.y + (area.height - height) / 2,
        width: area.width,
        height,
    }
}
