//! Per-message cache of rendered output.
//!
//! Rendering a message (character filtering, nick framing, styling) is the
//! expensive part of a render pass, and the scroll engine also needs
//! message heights without putting them on screen. Entries are keyed by
//! message id only; anything that changes the rendered width invalidates
//! the whole cache. The forest is bounded by the visible session, so there
//! is no eviction.

use std::collections::HashMap;

use crate::markup::StyledText;
use crate::store::MessageId;

/// The rendered form of a single message: its meta column and its body
/// lines, without any indentation.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub id: MessageId,
    pub meta: StyledText,
    pub lines: Vec<StyledText>,
}

impl RenderedMessage {
    /// Height of the message in rows.
    pub fn height(&self) -> usize {
        self.lines.len()
    }
}

#[derive(Debug, Default)]
pub struct RenderedCache {
    entries: HashMap<MessageId, RenderedMessage>,
}

impl RenderedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &MessageId) -> Option<&RenderedMessage> {
        self.entries.get(id)
    }

    /// Insert a rendered message, replacing any previous entry for its id.
    pub fn add(&mut self, rendered: RenderedMessage) {
        self.entries.insert(rendered.id.clone(), rendered);
    }

    /// Drop the entry for `id`. Silently does nothing when absent.
    pub fn invalidate(&mut self, id: &MessageId) {
        self.entries.remove(id);
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }
}
