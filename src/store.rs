//! The message supply: a mutable forest of messages keyed by id.
//!
//! Messages reference an optional parent; siblings are ordered by id. The
//! supply is queried heavily by the tree renderer, so the navigation
//! helpers here define the exact shape of cursor movement and scrolling:
//! `above_id`/`below_id` walk the forest in visual (document) order, while
//! `position_above_id`/`position_below_id` walk the slots a reply cursor
//! can occupy.
//!
//! A message whose parent has not arrived yet is treated as a root. Its
//! parent id is still recorded in the children table, so the child is
//! adopted the moment the parent shows up, without rebuilding anything.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Opaque message identifier. Totally ordered; sibling lists and root
/// enumeration use this ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single chat message. Immutable once inserted; an edit arrives as a new
/// message with the same id and replaces the old one.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub parent_id: Option<MessageId>,
    pub timestamp: DateTime<Utc>,
    pub nick: String,
    pub content: String,
}

impl Message {
    pub fn new(
        id: impl Into<MessageId>,
        parent_id: Option<MessageId>,
        timestamp: DateTime<Utc>,
        nick: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id,
            timestamp,
            nick: nick.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no message with id {0}")]
    NotFound(MessageId),
}

/// Queries and mutations over a forest of messages.
///
/// The `*_id` primitives are implementation-supplied; the navigation
/// methods are derived from them and shared by all implementations.
pub trait MessageSupply {
    /// Look up a message by id.
    fn get(&self, id: &MessageId) -> Result<&Message, StoreError>;

    /// The *effective* parent of a message: its recorded parent if that
    /// message is known, `None` otherwise. Unknown ids also yield `None`.
    fn parent_id(&self, id: &MessageId) -> Option<MessageId>;

    /// The ids of a message's children, sorted ascending.
    fn child_ids(&self, id: &MessageId) -> Vec<MessageId>;

    /// The ids of a message's siblings (including itself), sorted
    /// ascending. Messages without an effective parent are siblings of all
    /// roots.
    fn sibling_ids(&self, id: &MessageId) -> Vec<MessageId>;

    /// The root with the greatest id, i.e. the bottommost tree.
    fn lowest_root_id(&self) -> Option<MessageId>;

    /// The smallest known id; anchor for requesting older history.
    fn oldest_id(&self) -> Option<MessageId>;

    fn add(&mut self, message: Message);

    /// Remove a message. A no-op if the id is unknown. Descendants stay
    /// and become roots until a replacement parent arrives.
    fn remove(&mut self, id: &MessageId);

    /// Follow parents up to the root of the tree containing `id`.
    fn root_id(&self, id: &MessageId) -> MessageId {
        let mut current = id.clone();
        let mut seen = HashSet::new();
        while let Some(parent) = self.parent_id(&current) {
            if !seen.insert(current.clone()) {
                break;
            }
            current = parent;
        }
        current
    }

    /// The sibling immediately above `id`, if any.
    fn previous_id(&self, id: &MessageId) -> Option<MessageId> {
        let siblings = self.sibling_ids(id);
        let index = siblings.iter().position(|s| s == id)?;
        if index == 0 {
            None
        } else {
            Some(siblings[index - 1].clone())
        }
    }

    /// The sibling immediately below `id`, if any.
    fn next_id(&self, id: &MessageId) -> Option<MessageId> {
        let siblings = self.sibling_ids(id);
        let index = siblings.iter().position(|s| s == id)?;
        siblings.get(index + 1).cloned()
    }

    /// The message rendered directly above `id`: the bottom of the previous
    /// sibling's subtree, or the parent when there is no previous sibling.
    fn above_id(&self, id: &MessageId) -> Option<MessageId> {
        let mut above = match self.previous_id(id) {
            Some(previous) => previous,
            None => return self.parent_id(id),
        };
        loop {
            match self.child_ids(&above).last() {
                Some(last) => above = last.clone(),
                None => return Some(above),
            }
        }
    }

    /// The message rendered directly below `id`: its first child, its next
    /// sibling, or the next sibling of the nearest ancestor that has one.
    fn below_id(&self, id: &MessageId) -> Option<MessageId> {
        if let Some(first) = self.child_ids(id).first() {
            return Some(first.clone());
        }
        let mut ancestor = id.clone();
        loop {
            if let Some(next) = self.next_id(&ancestor) {
                return Some(next);
            }
            ancestor = self.parent_id(&ancestor)?;
        }
    }

    /// The id owning the reply slot above the slot under `id`. `None` as
    /// input names the bottom slot, whose predecessor is the lowest root.
    fn position_above_id(&self, id: Option<&MessageId>) -> Option<MessageId> {
        let id = match id {
            None => return self.lowest_root_id(),
            Some(id) => id,
        };
        if let Some(last) = self.child_ids(id).last() {
            return Some(last.clone());
        }
        let mut ancestor = id.clone();
        loop {
            if let Some(previous) = self.previous_id(&ancestor) {
                return Some(previous);
            }
            ancestor = self.parent_id(&ancestor)?;
        }
    }

    /// The id owning the reply slot below the slot under `id`: the next
    /// sibling descended to its deepest first child, or the parent.
    fn position_below_id(&self, id: &MessageId) -> Option<MessageId> {
        let mut below = match self.next_id(id) {
            Some(next) => next,
            None => return self.parent_id(id),
        };
        loop {
            match self.child_ids(&below).first() {
                Some(first) => below = first.clone(),
                None => return Some(below),
            }
        }
    }

    /// The ids from `start` through `stop` inclusive, walking `below_id`.
    /// Empty when `start`'s ancestor path orders after `stop`'s.
    fn between_ids(&self, start: &MessageId, stop: Option<&MessageId>) -> Vec<MessageId> {
        let start_path = self.ancestor_path(Some(start));
        let stop_path = self.ancestor_path(stop);
        if start_path > stop_path {
            return Vec::new();
        }
        if Some(start) == stop {
            return vec![start.clone()];
        }

        let mut between = vec![start.clone()];
        let mut current = start.clone();
        while Some(&current) != stop {
            match self.below_id(&current) {
                Some(below) => {
                    current = below;
                    between.push(current.clone());
                }
                None => break,
            }
        }
        between
    }

    /// Root-first list of ancestors of `id`, including `id` itself.
    fn ancestor_path(&self, id: Option<&MessageId>) -> Vec<MessageId> {
        let mut path = Vec::new();
        let mut current = id.cloned();
        let mut seen = HashSet::new();
        while let Some(id) = current {
            if !seen.insert(id.clone()) {
                break;
            }
            current = self.parent_id(&id);
            path.push(id);
        }
        path.reverse();
        path
    }
}

/// The in-memory supply backing a live room.
#[derive(Debug, Default)]
pub struct InMemorySupply {
    elements: BTreeMap<MessageId, Message>,
    children: BTreeMap<MessageId, Vec<MessageId>>,
}

impl InMemorySupply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Roots in ascending id order. A message is a root when its recorded
    /// parent is absent or not (yet) known.
    fn root_ids(&self) -> Vec<MessageId> {
        self.elements
            .values()
            .filter(|message| {
                message
                    .parent_id
                    .as_ref()
                    .is_none_or(|parent| !self.elements.contains_key(parent))
            })
            .map(|message| message.id.clone())
            .collect()
    }
}

impl MessageSupply for InMemorySupply {
    fn get(&self, id: &MessageId) -> Result<&Message, StoreError> {
        self.elements
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn parent_id(&self, id: &MessageId) -> Option<MessageId> {
        let parent = self.elements.get(id)?.parent_id.as_ref()?;
        if self.elements.contains_key(parent) {
            Some(parent.clone())
        } else {
            None
        }
    }

    fn child_ids(&self, id: &MessageId) -> Vec<MessageId> {
        self.children.get(id).cloned().unwrap_or_default()
    }

    fn sibling_ids(&self, id: &MessageId) -> Vec<MessageId> {
        match self.parent_id(id) {
            Some(parent) => self.child_ids(&parent),
            None => self.root_ids(),
        }
    }

    fn lowest_root_id(&self) -> Option<MessageId> {
        self.root_ids().into_iter().next_back()
    }

    fn oldest_id(&self) -> Option<MessageId> {
        self.elements.keys().next().cloned()
    }

    fn add(&mut self, message: Message) {
        if self.elements.contains_key(&message.id) {
            self.remove(&message.id.clone());
        }

        if let Some(parent) = &message.parent_id {
            let children = self.children.entry(parent.clone()).or_default();
            children.push(message.id.clone());
            children.sort();
        }
        self.elements.insert(message.id.clone(), message);
    }

    fn remove(&mut self, id: &MessageId) {
        let Some(message) = self.elements.remove(id) else {
            return;
        };
        if let Some(parent) = &message.parent_id {
            if let Some(children) = self.children.get_mut(parent) {
                children.retain(|child| child != id);
                if children.is_empty() {
                    self.children.remove(parent);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(id: &str, parent: Option<&str>) -> Message {
        Message::new(
            id,
            parent.map(MessageId::from),
            Utc.with_ymd_and_hms(2019, 5, 7, 13, 25, 6).unwrap(),
            "garm",
            format!("message {id}"),
        )
    }

    /// a
    /// ├─ b
    /// │  └─ d
    /// └─ c
    /// e
    fn forest() -> InMemorySupply {
        let mut supply = InMemorySupply::new();
        supply.add(message("a", None));
        supply.add(message("b", Some("a")));
        supply.add(message("c", Some("a")));
        supply.add(message("d", Some("b")));
        supply.add(message("e", None));
        supply
    }

    #[test]
    fn children_are_sorted_and_consistent_with_parents() {
        let supply = forest();
        assert_eq!(vec![MessageId::from("b"), "c".into()], supply.child_ids(&"a".into()));
        for id in ["b", "c", "d"] {
            let id = MessageId::from(id);
            let parent = supply.parent_id(&id).unwrap();
            assert!(supply.child_ids(&parent).contains(&id));
        }
    }

    #[test]
    fn roots_are_enumerated_in_ascending_order() {
        let supply = forest();
        assert_eq!(vec![MessageId::from("a"), "e".into()], supply.sibling_ids(&"a".into()));
        assert_eq!(Some(MessageId::from("e")), supply.lowest_root_id());
        assert_eq!(Some(MessageId::from("a")), supply.oldest_id());
    }

    #[test]
    fn previous_and_next_walk_siblings() {
        let supply = forest();
        assert_eq!(None, supply.previous_id(&"b".into()));
        assert_eq!(Some("b".into()), supply.previous_id(&"c".into()));
        assert_eq!(Some("c".into()), supply.next_id(&"b".into()));
        assert_eq!(None, supply.next_id(&"c".into()));
        assert_eq!(Some("e".into()), supply.next_id(&"a".into()));
    }

    #[test]
    fn above_and_below_walk_in_document_order() {
        let supply = forest();
        let order = ["a", "b", "d", "c", "e"];
        for pair in order.windows(2) {
            let (upper, lower) = (MessageId::from(pair[0]), MessageId::from(pair[1]));
            assert_eq!(Some(lower.clone()), supply.below_id(&upper), "below {upper}");
            assert_eq!(Some(upper), supply.above_id(&lower), "above {lower}");
        }
        assert_eq!(None, supply.above_id(&"a".into()));
        assert_eq!(None, supply.below_id(&"e".into()));
    }

    #[test]
    fn position_above_finds_the_previous_reply_slot() {
        let supply = forest();
        // The bottom slot sits below the lowest root.
        assert_eq!(Some("e".into()), supply.position_above_id(None));
        assert_eq!(Some("c".into()), supply.position_above_id(Some(&"a".into())));
        assert_eq!(Some("b".into()), supply.position_above_id(Some(&"c".into())));
        assert_eq!(Some("d".into()), supply.position_above_id(Some(&"b".into())));
        assert_eq!(None, supply.position_above_id(Some(&"d".into())));
    }

    #[test]
    fn position_below_inverts_position_above_where_defined() {
        let supply = forest();
        for id in ["a", "b", "c", "d", "e"] {
            let id = MessageId::from(id);
            if let Some(below) = supply.position_below_id(&id) {
                if let Some(back) = supply.position_above_id(Some(&below)) {
                    assert_eq!(id, back);
                }
            }
        }
    }

    #[test]
    fn between_ids_follows_document_order_inclusively() {
        let supply = forest();
        let ids: Vec<MessageId> = ["b", "d", "c"].iter().map(|s| (*s).into()).collect();
        assert_eq!(ids, supply.between_ids(&"b".into(), Some(&"c".into())));
        assert_eq!(vec![MessageId::from("a")], supply.between_ids(&"a".into(), Some(&"a".into())));
        // Reversed interval is empty.
        assert!(supply.between_ids(&"c".into(), Some(&"b".into())).is_empty());
    }

    #[test]
    fn ancestor_path_is_root_first() {
        let supply = forest();
        let path: Vec<MessageId> = ["a", "b", "d"].iter().map(|s| (*s).into()).collect();
        assert_eq!(path, supply.ancestor_path(Some(&"d".into())));
        assert!(supply.ancestor_path(None).is_empty());
    }

    #[test]
    fn dangling_parents_make_temporary_roots() {
        let mut supply = InMemorySupply::new();
        supply.add(message("z", Some("y")));
        // The parent is unknown, so z is a root for now.
        assert_eq!(None, supply.parent_id(&"z".into()));
        assert_eq!(Some("z".into()), supply.lowest_root_id());

        // Once the parent arrives, z is adopted.
        supply.add(message("y", None));
        assert_eq!(Some("y".into()), supply.parent_id(&"z".into()));
        assert_eq!(vec![MessageId::from("z")], supply.child_ids(&"y".into()));
        assert_eq!(Some("y".into()), supply.lowest_root_id());
    }

    #[test]
    fn re_adding_a_message_replaces_it() {
        let mut supply = forest();
        let mut edited = message("b", Some("a"));
        edited.content = "edited".to_string();
        supply.add(edited);
        assert_eq!("edited", supply.get(&"b".into()).unwrap().content);
        assert_eq!(vec![MessageId::from("b"), "c".into()], supply.child_ids(&"a".into()));
    }

    #[test]
    fn removal_detaches_from_the_parents_child_list() {
        let mut supply = forest();
        supply.remove(&"c".into());
        assert_eq!(vec![MessageId::from("b")], supply.child_ids(&"a".into()));
        assert!(supply.get(&"c".into()).is_err());
        // Removing an unknown id is a no-op.
        supply.remove(&"missing".into());
        assert_eq!(4, supply.len());
    }

    #[test]
    fn removing_a_parent_promotes_children_to_roots() {
        let mut supply = forest();
        supply.remove(&"b".into());
        assert_eq!(None, supply.parent_id(&"d".into()));
        assert_eq!(
            vec![MessageId::from("a"), "d".into(), "e".into()],
            supply.sibling_ids(&"d".into())
        );
    }
}
