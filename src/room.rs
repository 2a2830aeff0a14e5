//! The room view: everything between the protocol seam and the screen.
//!
//! Owns the tree renderer (which owns the supply and the per-message
//! cache), the presence list, the composer, and the UI mode state machine.
//! Protocol events mutate the supply and invalidate the affected ids; key
//! presses drive the cursor, the scroll position and the mode transitions.
//!
//! History backpressure: when a render pass reports that the top of the
//! known supply became visible, one log request is issued for the messages
//! before the oldest known id. An empty reply latches "top of history" and
//! stops further requests.

use std::collections::BTreeMap;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::format::RoomFormatter;
use crate::lines::LineBuffer;
use crate::protocol::{ProtocolCommand, ProtocolEvent, SessionInfo, WireMessage};
use crate::store::{InMemorySupply, MessageSupply};
use crate::tree::{CursorTreeRenderer, TreeConfig};
use crate::ui::input::InputBox;
use crate::ui::theme::Theme;

/// What the widget is currently showing. Transitions are explicit; there
/// is no fallthrough between modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Connecting,
    ConnectionFailed,
    SettingPassword,
    Authenticating,
    SettingNick,
    Viewing,
    Editing,
}

pub struct RoomView {
    config: Config,
    theme: Theme,
    mode: UiMode,

    tree: CursorTreeRenderer<InMemorySupply, RoomFormatter>,
    presence: BTreeMap<String, SessionInfo>,
    own_session_id: Option<String>,

    composer: InputBox,
    nick_input: InputBox,
    h_offset: i64,

    commands: mpsc::Sender<ProtocolCommand>,
    requesting_logs: bool,
    hit_top_of_supply: bool,
    close_sent: bool,
    quit: bool,
    disconnect_reason: Option<String>,
}

impl RoomView {
    pub fn new(
        config: Config,
        theme: Theme,
        commands: mpsc::Sender<ProtocolCommand>,
    ) -> Self {
        let formatter = RoomFormatter::from_config(&config, config.room.nick.clone());
        let tree_config = TreeConfig::from_config(&config);
        let tree = CursorTreeRenderer::new(InMemorySupply::new(), formatter, tree_config);

        Self {
            config,
            theme,
            mode: UiMode::Connecting,
            tree,
            presence: BTreeMap::new(),
            own_session_id: None,
            composer: InputBox::new(),
            nick_input: InputBox::new(),
            h_offset: 0,
            commands,
            requesting_logs: false,
            hit_top_of_supply: false,
            close_sent: false,
            quit: false,
            disconnect_reason: None,
        }
    }

    // Accessors used by the drawing layer.

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn room_name(&self) -> &str {
        &self.config.room.name
    }

    pub fn own_nick(&self) -> &str {
        self.tree.formatter().own_nick()
    }

    pub fn composer(&self) -> &InputBox {
        &self.composer
    }

    pub fn nick_input(&self) -> &InputBox {
        &self.nick_input
    }

    pub fn h_offset(&self) -> i64 {
        self.h_offset
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionInfo> {
        self.presence.values()
    }

    pub fn own_session_id(&self) -> Option<&str> {
        self.own_session_id.as_deref()
    }

    pub fn disconnect_reason(&self) -> Option<&str> {
        self.disconnect_reason.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Render the message tree for the given area and hand the viewport to
    /// the caller.
    pub fn viewport(&mut self, width: usize, height: usize) -> LineBuffer {
        self.tree.render(width, height);
        self.tree.lines()
    }

    // Protocol events

    pub fn apply_event(&mut self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::Connected(session) => {
                self.own_session_id = Some(session.id.clone());
                self.change_own_nick(session.nick.clone());
                self.presence.insert(session.id.clone(), session);
                if self.mode == UiMode::Connecting {
                    self.mode = UiMode::Viewing;
                }
            }
            ProtocolEvent::Snapshot(messages) => {
                for message in messages {
                    self.receive_message(&message);
                }
            }
            ProtocolEvent::Send(message) | ProtocolEvent::Edit(message) => {
                self.receive_message(&message);
            }
            ProtocolEvent::Join(session) => {
                self.presence.insert(session.id.clone(), session);
            }
            ProtocolEvent::Part(session) => {
                self.presence.remove(&session.id);
            }
            ProtocolEvent::Nick {
                session_id,
                from,
                to,
            } => {
                debug!(%session_id, %from, %to, "nick change");
                if let Some(session) = self.presence.get_mut(&session_id) {
                    session.nick = to.clone();
                }
                if self.own_session_id.as_deref() == Some(session_id.as_str()) {
                    self.change_own_nick(to);
                }
            }
            ProtocolEvent::LogReply(messages) => {
                self.requesting_logs = false;
                if messages.is_empty() {
                    // The room has nothing older; stop asking.
                    self.hit_top_of_supply = true;
                }
                for message in messages {
                    self.receive_message(&message);
                }
            }
            ProtocolEvent::Disconnect { reason } => {
                warn!(%reason, "disconnected");
                self.disconnect_reason = Some(reason);
                self.mode = UiMode::ConnectionFailed;
                self.send_close();
            }
        }
    }

    fn receive_message(&mut self, message: &WireMessage) {
        let message = message.to_message();
        let id = message.id.clone();
        self.tree.supply_mut().add(message);
        self.tree.invalidate(&id);
    }

    fn change_own_nick(&mut self, nick: String) {
        self.tree.formatter_mut().set_own_nick(nick);
        self.tree.invalidate_all();
    }

    /// Issue at most one history request per quiet period, and none after
    /// the room reported its history exhausted.
    pub fn maybe_request_logs(&mut self) {
        if self.hit_top_of_supply || self.requesting_logs || !self.tree.hit_top() {
            return;
        }
        let before = self.tree.supply().oldest_id();
        self.requesting_logs = true;
        self.send_command(ProtocolCommand::RequestLog {
            before,
            amount: self.config.log.amount,
        });
    }

    fn send_command(&mut self, command: ProtocolCommand) {
        if let Err(error) = self.commands.try_send(command) {
            warn!(%error, "dropping protocol command");
        }
    }

    /// Emit the close signal exactly once, then ask the main loop to stop.
    fn send_close(&mut self) {
        if !self.close_sent {
            self.close_sent = true;
            self.send_command(ProtocolCommand::Close);
        }
        self.quit = true;
    }

    // Key handling

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        match self.mode {
            UiMode::Viewing => self.handle_viewing_key(key),
            UiMode::Editing => self.handle_editing_key(key),
            UiMode::SettingNick => self.handle_nick_key(key),
            UiMode::ConnectionFailed => {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter) {
                    self.send_close();
                }
            }
            UiMode::Connecting | UiMode::SettingPassword | UiMode::Authenticating => {}
        }
    }

    fn handle_viewing_key(&mut self, key: KeyEvent) {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let alt = key.modifiers.contains(KeyModifiers::ALT);

        match key.code {
            KeyCode::Enter if self.own_nick().is_empty() => self.open_nick_prompt(),
            KeyCode::Enter if alt => self.mode = UiMode::Editing,
            KeyCode::Enter => {
                self.composer.clear();
                self.mode = UiMode::Editing;
            }
            KeyCode::Char('n') => self.open_nick_prompt(),
            KeyCode::Char('r') => self.tree.invalidate_all(),
            KeyCode::Char('q') => self.send_close(),
            KeyCode::Up if shift => self.scroll(-(self.config.scroll.vertical as i64)),
            KeyCode::Down if shift => self.scroll(self.config.scroll.vertical as i64),
            KeyCode::Left if shift => self.scroll_horizontally(-(self.config.scroll.horizontal as i64)),
            KeyCode::Right if shift => self.scroll_horizontally(self.config.scroll.horizontal as i64),
            KeyCode::Up => self.tree.move_cursor_up(),
            KeyCode::Down => self.tree.move_cursor_down(),
            KeyCode::PageUp => self.scroll(-self.page_step()),
            KeyCode::PageDown => self.scroll(self.page_step()),
            _ => {}
        }
    }

    fn handle_editing_key(&mut self, key: KeyEvent) {
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        match key.code {
            KeyCode::Enter if alt => self.composer.insert_newline(),
            KeyCode::Enter => {
                if !self.composer.is_empty() {
                    let content = self.composer.content().to_string();
                    let parent_id = self.tree.cursor_id().cloned();
                    self.send_command(ProtocolCommand::Send { content, parent_id });
                }
                self.composer.clear();
                self.mode = UiMode::Viewing;
            }
            KeyCode::Esc => self.mode = UiMode::Viewing,
            _ => edit_input(&mut self.composer, key),
        }
    }

    fn handle_nick_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                if !self.nick_input.is_empty() {
                    let nick = self.nick_input.content().to_string();
                    self.send_command(ProtocolCommand::SetNick(nick));
                }
                self.mode = UiMode::Viewing;
            }
            KeyCode::Esc => self.mode = UiMode::Viewing,
            _ => edit_input(&mut self.nick_input, key),
        }
    }

    fn open_nick_prompt(&mut self) {
        self.nick_input.set_content(self.own_nick().to_string());
        self.mode = UiMode::SettingNick;
    }

    pub fn scroll(&mut self, delta: i64) {
        self.tree.scroll(delta);
    }

    pub fn scroll_horizontally(&mut self, delta: i64) {
        self.h_offset = (self.h_offset + delta).max(0);
    }

    fn page_step(&self) -> i64 {
        let height = self.tree.height() as i64;
        if self.config.scroll.half_page {
            (height / 2).max(1)
        } else {
            (height - 1).max(1)
        }
    }
}

/// The editing keys shared by the composer and the nick prompt.
fn edit_input(input: &mut InputBox, key: KeyEvent) {
    match key.code {
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            input.insert_char(c);
        }
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete_char(),
        KeyCode::Left => input.move_cursor_left(),
        KeyCode::Right => input.move_cursor_right(),
        KeyCode::Home => input.move_cursor_home(),
        KeyCode::End => input.move_cursor_end(),
        _ => {}
    }
}
