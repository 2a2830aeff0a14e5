//! End-to-end scenarios for the tree renderer.

use std::cell::Cell;
use std::rc::Rc;

use arbor::cache::RenderedMessage;
use arbor::config::Config;
use arbor::format::{MessageFormatter, RoomFormatter};
use arbor::markup::{AttrValue, StyledText};
use arbor::store::{InMemorySupply, Message, MessageId, MessageSupply};
use arbor::tree::{CursorTreeRenderer, TreeConfig, ATTR_CURSOR, ATTR_MID};
use chrono::{TimeZone, Utc};

fn message(id: &str, parent: Option<&str>, content: &str) -> Message {
    Message::new(
        id,
        parent.map(MessageId::from),
        Utc.with_ymd_and_hms(2019, 5, 7, 13, 25, 6).unwrap(),
        "garm",
        content,
    )
}

fn supply_of(messages: &[(&str, Option<&str>)]) -> InMemorySupply {
    let mut supply = InMemorySupply::new();
    for (id, parent) in messages {
        supply.add(message(id, *parent, &format!("message {id}")));
    }
    supply
}

fn renderer(
    messages: &[(&str, Option<&str>)],
    scrolloff: usize,
) -> CursorTreeRenderer<InMemorySupply, RoomFormatter> {
    let formatter = RoomFormatter::from_config(&Config::default(), "self");
    let mut tree_config = TreeConfig::default();
    tree_config.scrolloff = scrolloff;
    CursorTreeRenderer::new(supply_of(messages), formatter, tree_config)
}

fn mid_at(renderer: &CursorTreeRenderer<InMemorySupply, RoomFormatter>, row: i64) -> Option<String> {
    renderer.lines().get(row).and_then(|(attrs, _)| {
        attrs
            .get(ATTR_MID)
            .and_then(AttrValue::as_str)
            .map(str::to_string)
    })
}

fn cursor_row<F: MessageFormatter>(
    renderer: &CursorTreeRenderer<InMemorySupply, F>,
    height: i64,
) -> Option<i64> {
    let lines = renderer.lines();
    (0..height).find(|row| {
        lines
            .get(*row)
            .is_some_and(|(attrs, _)| attrs.contains_key(ATTR_CURSOR))
    })
}

// Scenario 1: an empty supply shows only the cursor line, bottom aligned.
#[test]
fn empty_supply_renders_cursor_at_the_bottom() {
    let mut renderer = renderer(&[], 0);
    renderer.render(20, 5);

    let lines = renderer.lines();
    assert_eq!(5, lines.len());
    for row in 0..4 {
        let (_, text) = lines.get(row).unwrap();
        assert!(text.is_empty(), "row {row} should be blank");
    }
    assert_eq!(Some(4), cursor_row(&renderer, 5));

    // Blitted rows are padded to the full width.
    let rendered = lines.render(20, 5, 0, ' ', '$');
    for row in &rendered {
        assert_eq!(20, row.len());
    }
    assert!(renderer.hit_top());
}

// Scenario 2: a single tree renders bottom aligned with the cursor line
// under the last sibling.
#[test]
fn single_tree_renders_bottom_aligned() {
    let mut renderer = renderer(&[("a", None), ("b", Some("a")), ("c", Some("a"))], 0);
    renderer.render(20, 5);

    assert_eq!(None, mid_at(&renderer, 0));
    assert_eq!(Some("a".to_string()), mid_at(&renderer, 1));
    assert_eq!(Some("b".to_string()), mid_at(&renderer, 2));
    assert_eq!(Some("c".to_string()), mid_at(&renderer, 3));
    assert_eq!(Some(4), cursor_row(&renderer, 5));
    assert!(renderer.hit_top());
}

// Scenario 3: the cursor walks down through the forest in document order
// and ends on the bottom slot.
#[test]
fn cursor_moves_down_through_the_forest() {
    let mut renderer = renderer(&[("a", None), ("b", Some("a")), ("c", Some("a"))], 0);
    renderer.render(40, 10);
    renderer.set_cursor_id(Some("a".into()));

    renderer.move_cursor_down();
    assert_eq!(Some(&MessageId::from("b")), renderer.cursor_id());
    renderer.move_cursor_down();
    assert_eq!(Some(&MessageId::from("c")), renderer.cursor_id());
    renderer.move_cursor_down();
    assert_eq!(None, renderer.cursor_id());
}

// Scenario 4: refocusing clamps the cursor row by scrolloff.
#[test]
fn refocus_honors_scrolloff() {
    let ids = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l"];
    let roots: Vec<(&str, Option<&str>)> = ids.iter().map(|id| (*id, None)).collect();
    let mut renderer = renderer(&roots, 3);
    renderer.render(40, 10);

    // The cursor line for "c" would land near the top of the screen; the
    // clamp keeps it at row 3 with older content still visible above.
    renderer.set_cursor_id(Some("c".into()));
    assert_eq!(Some(3), cursor_row(&renderer, 10));
    assert_eq!(Some("a".to_string()), mid_at(&renderer, 0));
    assert_eq!(Some("b".to_string()), mid_at(&renderer, 1));
    assert_eq!(Some("c".to_string()), mid_at(&renderer, 2));
}

/// Counts how often messages are run through the formatter.
struct CountingFormatter {
    inner: RoomFormatter,
    renders: Rc<Cell<usize>>,
}

impl MessageFormatter for CountingFormatter {
    fn meta_width(&self) -> usize {
        self.inner.meta_width()
    }

    fn render(&self, message: &Message, width: usize) -> RenderedMessage {
        self.renders.set(self.renders.get() + 1);
        self.inner.render(message, width)
    }

    fn render_cursor(&self, width: usize) -> StyledText {
        self.inner.render_cursor(width)
    }
}

// Scenario 5: changing the viewport width recomputes every cached message.
#[test]
fn width_change_recomputes_every_message() {
    let renders = Rc::new(Cell::new(0));
    let formatter = CountingFormatter {
        inner: RoomFormatter::from_config(&Config::default(), "self"),
        renders: renders.clone(),
    };
    let supply = supply_of(&[("a", None), ("b", Some("a")), ("c", None)]);
    let mut renderer = CursorTreeRenderer::new(supply, formatter, TreeConfig::default());

    renderer.render(40, 10);
    assert_eq!(3, renders.get());

    // Same width: everything is served from the cache.
    renderer.render(40, 10);
    assert_eq!(3, renders.get());

    // New width: the cache is flushed and every message re-rendered.
    renderer.render(30, 10);
    assert_eq!(6, renders.get());
}

// Scenario 6: the top-of-supply signal and what a log reply does to it.
#[test]
fn hit_top_reflects_the_known_history() {
    let mut renderer = renderer(&[("m", None)], 0);
    renderer.render(40, 20);
    assert!(renderer.hit_top());

    // Five older messages arrive; everything still fits on screen, so the
    // renderer still reaches the top of the known supply.
    for id in ["e", "f", "g", "h", "i"] {
        renderer.supply_mut().add(message(id, None, "older"));
        renderer.invalidate(&id.into());
    }
    renderer.render(40, 20);
    assert!(renderer.hit_top());

    // With more history than fits the viewport, the top stays out of
    // reach.
    for i in 0..40 {
        let id = format!("a{i:02}");
        renderer.supply_mut().add(message(&id, None, "backlog"));
        renderer.invalidate(&id.as_str().into());
    }
    renderer.render(40, 20);
    assert!(!renderer.hit_top());
}

// Repeated renders of unchanged state are identical, and the trimmed
// viewport always has exactly `height` rows.
#[test]
fn renders_are_stable_and_exactly_viewport_sized() {
    let mut renderer = renderer(
        &[("a", None), ("b", Some("a")), ("c", Some("b")), ("d", None)],
        0,
    );
    renderer.render(32, 7);
    renderer.set_cursor_id(Some("b".into()));

    let first = renderer.lines();
    assert_eq!(7, first.len());

    renderer.render(32, 7);
    let second = renderer.lines();
    assert_eq!(first, second);

    let rendered_rows = second.render(32, 7, 0, ' ', '$');
    assert_eq!(7, rendered_rows.len());
    for row in rendered_rows {
        assert_eq!(32, row.len());
    }
}

// Reply-slot navigation round-trips, checked over a bushier forest.
#[test]
fn position_navigation_round_trips() {
    let supply = supply_of(&[
        ("a", None),
        ("b", Some("a")),
        ("c", Some("a")),
        ("d", Some("b")),
        ("e", None),
        ("f", Some("e")),
    ]);

    for id in ["a", "b", "c", "d", "e", "f"] {
        let id = MessageId::from(id);
        let Some(below) = supply.position_below_id(&id) else {
            continue;
        };
        let Some(back) = supply.position_above_id(Some(&below)) else {
            continue;
        };
        assert_eq!(id, back, "round trip through {below}");
    }
}
