//! The cursor-tree renderer: scrolling and cursor engine of the room view.
//!
//! Given a message supply and a formatter, this renderer assembles a
//! [`LineBuffer`] for a viewport of fixed width and height. It owns the
//! cursor (the message a reply would go under, or the bottom slot), the
//! scroll anchor, and the cache of rendered messages.
//!
//! Scrolling obeys two rules, in order of importance: something must be on
//! the bottommost line, and something must be on the topmost line. The
//! assembly strategies below render the anchor's tree first and then extend
//! in both directions until those rules hold, reporting how far the
//! requested anchor offset had to be corrected.

use tracing::{debug, warn};

use crate::cache::RenderedCache;
use crate::format::MessageFormatter;
use crate::lines::LineBuffer;
use crate::markup::{attrs, AttrValue, StyledText};
use crate::store::{MessageId, MessageSupply, StoreError};

/// Line attribute carrying the owning message id.
pub const ATTR_MID: &str = "mid";
/// Line attribute carrying the row offset within the message.
pub const ATTR_OFFSET: &str = "offset";
/// Line attribute marking the cursor line.
pub const ATTR_CURSOR: &str = "cursor";

/// Stable codes for "should never happen" self-resets, for log correlation.
const RESET_ANCHOR_LOST: u16 = 1;
const RESET_CURSOR_LOST: u16 = 2;

/// Visual parameters of the tree rendering.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Columns per indentation level; at least 1.
    pub indent_width: usize,
    pub indent_char: char,
    pub indent_fill: char,
    pub indent_style: String,
    pub cursor_indent_char: char,
    pub cursor_corner: char,
    pub cursor_fill: char,
    pub cursor_indent_style: String,
    /// Rows kept between the cursor and the viewport edges on refocus.
    pub scrolloff: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            indent_width: 2,
            indent_char: '│',
            indent_fill: ' ',
            indent_style: "gray".to_string(),
            cursor_indent_char: '┃',
            cursor_corner: '┗',
            cursor_fill: '━',
            cursor_indent_style: "own_nick".to_string(),
            scrolloff: 2,
        }
    }
}

impl TreeConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            indent_width: config.indent.width,
            indent_char: config.indent_char(),
            indent_fill: config.indent_fill(),
            indent_style: config.indent.style.clone(),
            cursor_indent_char: config.cursor_indent_char(),
            cursor_corner: config.cursor_corner(),
            cursor_fill: config.cursor_indent_fill(),
            cursor_indent_style: config.cursor_indent.style.clone(),
            scrolloff: config.scroll.scrolloff,
        }
    }
}

/// Which flavor of indent segment to draw for one nesting level.
enum IndentKind {
    /// A level below an ordinary message.
    Normal,
    /// A level below the cursor's message.
    BelowCursor,
    /// The segment introducing the cursor line itself.
    CursorLine,
}

pub struct CursorTreeRenderer<S, F> {
    supply: S,
    formatter: F,
    cache: RenderedCache,
    config: TreeConfig,

    // Rendering result
    lines: LineBuffer,
    hit_top: bool,

    // Cursor and scrolling
    cursor_id: Option<MessageId>,
    anchor_id: Option<MessageId>,
    anchor_offset: f64,

    // Last known dimensions
    width: usize,
    height: usize,
}

impl<S: MessageSupply, F: MessageFormatter> CursorTreeRenderer<S, F> {
    pub fn new(supply: S, formatter: F, config: TreeConfig) -> Self {
        Self {
            supply,
            formatter,
            cache: RenderedCache::new(),
            config,
            lines: LineBuffer::new(),
            hit_top: false,
            cursor_id: None,
            anchor_id: None,
            anchor_offset: 0.5,
            width: 80,
            height: 40,
        }
    }

    pub fn supply(&self) -> &S {
        &self.supply
    }

    pub fn supply_mut(&mut self) -> &mut S {
        &mut self.supply
    }

    pub fn formatter(&self) -> &F {
        &self.formatter
    }

    pub fn formatter_mut(&mut self) -> &mut F {
        &mut self.formatter
    }

    /// The last rendered viewport, exactly `height` rows.
    pub fn lines(&self) -> LineBuffer {
        self.lines.to_size(0, self.height as i64 - 1)
    }

    /// Whether the last render reached the oldest known message.
    pub fn hit_top(&self) -> bool {
        self.hit_top
    }

    pub fn cursor_id(&self) -> Option<&MessageId> {
        self.cursor_id.as_ref()
    }

    /// Move the cursor to an explicit position and bring it into view.
    pub fn set_cursor_id(&mut self, cursor_id: Option<MessageId>) {
        self.cursor_id = cursor_id;
        self.anchor_id = None;
        self.rerender();
        self.refocus();
    }

    pub fn height(&self) -> usize {
        self.height
    }

    // Offsets
    //
    // The anchor offset is stored relative to the viewport: 0.0 is the
    // first row, 1.0 the last. Conversions round through the row grid.

    fn to_absolute(offset: f64, height: usize) -> i64 {
        (offset * (height as i64 - 1) as f64).round() as i64
    }

    fn to_relative(line: i64, height: usize) -> f64 {
        if height <= 1 {
            0.5
        } else {
            line as f64 / (height - 1) as f64
        }
    }

    fn absolute_anchor_offset(&self) -> i64 {
        Self::to_absolute(self.anchor_offset, self.height)
    }

    fn set_absolute_anchor_offset(&mut self, offset: i64) {
        self.anchor_offset = Self::to_relative(offset, self.height);
    }

    // Message cache operations

    pub fn invalidate(&mut self, id: &MessageId) {
        self.cache.invalidate(id);
    }

    pub fn invalidate_all(&mut self) {
        self.cache.invalidate_all();
    }

    // Rendering a single message

    /// Render one message (through the cache) with its meta column and
    /// `indent` prefix. Lines carry `mid` and `offset` attributes.
    fn render_message_lines(
        &mut self,
        id: &MessageId,
        indent: &StyledText,
    ) -> Result<LineBuffer, StoreError> {
        let width = self
            .width
            .saturating_sub(indent.len() + self.formatter.meta_width())
            .max(1);

        if self.cache.get(id).is_none() {
            let message = self.supply.get(id)?;
            let rendered = self.formatter.render(message, width);
            self.cache.add(rendered);
        }
        let Some(rendered) = self.cache.get(id) else {
            return Err(StoreError::NotFound(id.clone()));
        };

        let meta = rendered.meta.clone();
        let meta_blank = StyledText::plain(&" ".repeat(meta.len()));

        let mut lines = LineBuffer::new();
        for (offset, line) in rendered.lines.iter().enumerate() {
            let prefix = if offset == 0 { &meta } else { &meta_blank };
            let line_attrs = attrs([
                (ATTR_MID, AttrValue::Str(id.as_str().to_string())),
                (ATTR_OFFSET, AttrValue::Int(offset as i64)),
            ]);
            lines.append_below(line_attrs, prefix.clone() + indent + line);
        }
        Ok(lines)
    }

    /// Render the cursor line with the given `indent` prefix.
    fn render_cursor_lines(&self, indent: &StyledText) -> LineBuffer {
        let width = self
            .width
            .saturating_sub(indent.len() + self.formatter.meta_width())
            .max(1);
        let meta_blank = StyledText::plain(&" ".repeat(self.formatter.meta_width()));
        let line_attrs = attrs([
            (ATTR_CURSOR, AttrValue::Bool(true)),
            (ATTR_OFFSET, AttrValue::Int(0)),
        ]);

        let mut lines = LineBuffer::new();
        lines.append_below(
            line_attrs,
            meta_blank + indent + &self.formatter.render_cursor(width),
        );
        lines
    }

    /// One indentation segment: a lead character filled up to the
    /// configured width.
    fn render_indent(&self, kind: IndentKind) -> StyledText {
        if self.config.indent_width < 1 {
            return StyledText::empty();
        }

        let (lead, lead_style, fill, fill_style) = match kind {
            IndentKind::Normal => (
                self.config.indent_char,
                &self.config.indent_style,
                self.config.indent_fill,
                &self.config.indent_style,
            ),
            IndentKind::BelowCursor => (
                self.config.cursor_indent_char,
                &self.config.cursor_indent_style,
                self.config.indent_fill,
                &self.config.indent_style,
            ),
            IndentKind::CursorLine => (
                self.config.cursor_corner,
                &self.config.cursor_indent_style,
                self.config.cursor_fill,
                &self.config.cursor_indent_style,
            ),
        };

        let lead = StyledText::of(&lead.to_string(), attrs([("style", lead_style.as_str())]));
        let fill = StyledText::of(&fill.to_string(), attrs([("style", fill_style.as_str())]));
        lead + fill.repeat(self.config.indent_width - 1)
    }

    // Rendering the tree

    /// Render `root_id`'s subtree below `lines`, depth first. Pins the
    /// buffer so the anchor's first line ends up at offset zero. A missing
    /// message skips its subtree.
    fn render_subtree(&mut self, lines: &mut LineBuffer, root_id: &MessageId, indent: &StyledText) {
        if self.anchor_id.as_ref() == Some(root_id) {
            lines.set_lower_offset(-1);
        }

        let cursor = self.cursor_id.as_ref() == Some(root_id);

        match self.render_message_lines(root_id, indent) {
            Ok(rendered) => lines.extend_below(rendered),
            Err(StoreError::NotFound(id)) => {
                debug!(%id, "skipping subtree of unknown message");
                return;
            }
        }

        let kind = if cursor {
            IndentKind::BelowCursor
        } else {
            IndentKind::Normal
        };
        let child_indent = indent.clone() + self.render_indent(kind);
        for child_id in self.supply.child_ids(root_id) {
            self.render_subtree(lines, &child_id, &child_indent);
        }

        if cursor {
            // The cursor acts as its own anchor unless one is set.
            if self.anchor_id.is_none() {
                lines.set_lower_offset(-1);
            }
            let cursor_indent = indent.clone() + self.render_indent(IndentKind::CursorLine);
            let cursor_lines = self.render_cursor_lines(&cursor_indent);
            lines.extend_below(cursor_lines);
        }
    }

    fn render_tree(&mut self, root_id: &MessageId) -> LineBuffer {
        let mut lines = LineBuffer::new();
        let indent = StyledText::empty();
        self.render_subtree(&mut lines, root_id, &indent);
        lines
    }

    /// Render the whole tree containing `id`, mainly to populate the cache
    /// with every message of that tree at its proper width.
    fn render_tree_containing(&mut self, id: &MessageId) -> LineBuffer {
        let root_id = self.supply.root_id(id);
        self.render_tree(&root_id)
    }

    /// Prepend previous trees until `target_upper_offset` is reached or the
    /// supply runs out upwards. Returns the topmost rendered root and
    /// whether the top of the supply was hit.
    fn expand_upwards_until(
        &mut self,
        lines: &mut LineBuffer,
        ancestor_id: MessageId,
        target_upper_offset: i64,
    ) -> (MessageId, bool) {
        let mut last_rendered_id = ancestor_id;

        loop {
            // Check the supply first: if the topmost tree alone fills the
            // screen we still want to report that the top was hit.
            let Some(next_id) = self.supply.previous_id(&last_rendered_id) else {
                return (last_rendered_id, true);
            };

            if lines.upper_offset() <= target_upper_offset {
                return (last_rendered_id, false);
            }

            let tree = self.render_tree(&next_id);
            lines.extend_above(tree);
            last_rendered_id = next_id;
        }
    }

    /// Append following trees until `target_lower_offset` is reached or the
    /// supply runs out downwards; in the latter case the bottom cursor is
    /// appended when no message holds the cursor.
    fn expand_downwards_until(
        &mut self,
        lines: &mut LineBuffer,
        ancestor_id: MessageId,
        target_lower_offset: i64,
    ) {
        let mut last_rendered_id = ancestor_id;

        loop {
            let Some(next_id) = self.supply.next_id(&last_rendered_id) else {
                break;
            };

            if lines.lower_offset() >= target_lower_offset {
                return;
            }

            let tree = self.render_tree(&next_id);
            lines.extend_below(tree);
            last_rendered_id = next_id;
        }

        if self.cursor_id.is_none() {
            let cursor = self.render_cursor_lines(&StyledText::empty());
            lines.extend_below(cursor);
        }
    }

    // Assembling the viewport

    /// Cursor-at-bottom strategy: the cursor line is pinned to the last
    /// row, trees extend upwards from there.
    fn render_screen_from_cursor(&mut self) -> (LineBuffer, i64, bool) {
        let mut lines = self.render_cursor_lines(&StyledText::empty());
        lines.set_lower_offset(self.height as i64 - 1);
        let delta = self.height as i64 - 1 - self.absolute_anchor_offset();

        let hit_top = match self.supply.lowest_root_id() {
            None => true,
            Some(lowest_root_id) => {
                let tree = self.render_tree(&lowest_root_id);
                lines.extend_above(tree);
                let (_, hit_top) = self.expand_upwards_until(&mut lines, lowest_root_id, 0);
                hit_top
            }
        };

        (lines, delta, hit_top)
    }

    /// Anchored strategy: render the anchor's tree at the anchor offset,
    /// then extend and snap until the scrolling rules hold.
    fn render_screen_from_anchor(&mut self, anchor_id: MessageId) -> (LineBuffer, i64, bool) {
        let mut delta = 0;
        let bottom = self.height as i64 - 1;

        // Step 1: the tree containing the anchor, shifted to the offset.
        let ancestor_id = self.supply.root_id(&anchor_id);
        let mut lines = self.render_tree(&ancestor_id);
        lines.shift(self.absolute_anchor_offset());

        // Step 2: fill the screen upwards.
        let (upper_id, mut hit_top) =
            self.expand_upwards_until(&mut lines, ancestor_id.clone(), 0);

        // Step 3: the top of the supply is above the top row; snap down.
        if lines.upper_offset() > 0 {
            delta -= lines.upper_offset();
            lines.set_upper_offset(0);
        }

        // Step 4: fill the screen downwards.
        self.expand_downwards_until(&mut lines, ancestor_id, bottom);

        // Step 5: the bottom of the supply is above the last row; snap up.
        if lines.lower_offset() < bottom {
            delta += bottom - lines.lower_offset();
            lines.set_lower_offset(bottom);
        }

        // Step 6: snapping may have opened a gap at the top.
        if !hit_top && lines.upper_offset() > 0 {
            let (_, hit) = self.expand_upwards_until(&mut lines, upper_id, 0);
            hit_top = hit;
        }

        (lines, delta, hit_top)
    }

    /// Pick the assembly strategy, recovering from a lost anchor or cursor
    /// instead of rendering a torn screen.
    fn render_screen(&mut self) -> (LineBuffer, i64, bool) {
        if let Some(anchor_id) = self.anchor_id.clone() {
            if self.supply.get(&anchor_id).is_err() {
                warn!(
                    code = RESET_ANCHOR_LOST,
                    %anchor_id,
                    "anchor disappeared from the supply, resetting"
                );
                self.anchor_id = None;
                self.anchor_offset = 0.5;
            }
        }
        if let Some(cursor_id) = self.cursor_id.clone() {
            if self.supply.get(&cursor_id).is_err() {
                warn!(
                    code = RESET_CURSOR_LOST,
                    %cursor_id,
                    "cursor disappeared from the supply, resetting"
                );
                self.cursor_id = None;
                self.anchor_id = None;
            }
        }

        let working_id = self.anchor_id.clone().or_else(|| self.cursor_id.clone());
        match working_id {
            None => self.render_screen_from_cursor(),
            Some(working_id) => self.render_screen_from_anchor(working_id),
        }
    }

    /// Run a render pass for the given viewport. A width change invalidates
    /// the cache, since message widths depend on it.
    pub fn render(&mut self, width: usize, height: usize) {
        let width = width.max(1);
        let height = height.max(1);
        if width != self.width {
            self.invalidate_all();
        }
        self.width = width;
        self.height = height;
        self.rerender();
    }

    /// Re-run the assembly at the current dimensions and fold the forced
    /// correction back into the anchor offset, so that an unchanged state
    /// renders identically next time.
    fn rerender(&mut self) {
        let (lines, delta, hit_top) = self.render_screen();
        self.lines = lines;
        self.hit_top = hit_top;
        if delta != 0 {
            let offset = self.absolute_anchor_offset() + delta;
            self.set_absolute_anchor_offset(offset);
        }
    }

    // Cursor movement

    /// The message whose last line sits directly above the cursor line at
    /// position `cursor` (the bottom slot when `None`).
    fn node_above_cursor(&self, cursor: Option<&MessageId>) -> Option<MessageId> {
        let mut node = match cursor {
            Some(id) => id.clone(),
            None => self.supply.lowest_root_id()?,
        };
        loop {
            match self.supply.child_ids(&node).last() {
                Some(last) => node = last.clone(),
                None => return Some(node),
            }
        }
    }

    /// Height of `id` in rows, rendering its tree if it is not cached yet.
    fn cached_height(&mut self, id: &MessageId) -> i64 {
        if self.cache.get(id).is_none() {
            self.render_tree_containing(id);
        }
        self.cache.get(id).map_or(0, |rendered| rendered.height() as i64)
    }

    /// How many rows the cursor line moves when the cursor changes from
    /// `old` to `new`: negative when it moves up.
    fn cursor_row_delta(&mut self, old: Option<&MessageId>, new: Option<&MessageId>) -> i64 {
        let old_above = self.node_above_cursor(old);
        let new_above = self.node_above_cursor(new);
        let (Some(old_above), Some(new_above)) = (old_above, new_above) else {
            return 0;
        };
        if old_above == new_above {
            return 0;
        }

        let old_path = self.supply.ancestor_path(Some(&old_above));
        let new_path = self.supply.ancestor_path(Some(&new_above));
        let (from, to, sign) = if new_path < old_path {
            (new_above, old_above, -1)
        } else {
            (old_above, new_above, 1)
        };

        let Some(start) = self.supply.below_id(&from) else {
            return 0;
        };
        let between = self.supply.between_ids(&start, Some(&to));
        let rows: i64 = between.iter().map(|id| self.cached_height(id)).sum();
        sign * rows
    }

    /// Move the cursor one position towards the top of the supply.
    pub fn move_cursor_up(&mut self) {
        let new_id = match self.cursor_id.clone() {
            None => self.node_above_cursor(None),
            Some(cursor_id) => self.supply.above_id(&cursor_id),
        };
        let Some(new_id) = new_id else {
            // Already at the top of the supply.
            self.refocus();
            return;
        };

        let delta = self.cursor_row_delta(self.cursor_id.clone().as_ref(), Some(&new_id));
        let offset = self.absolute_anchor_offset() + delta;
        self.set_absolute_anchor_offset(offset);
        self.cursor_id = Some(new_id);
        self.anchor_id = None;
        self.rerender();
        self.refocus();
    }

    /// Move the cursor one position towards the bottom of the supply; past
    /// the last message it becomes the bottom cursor.
    pub fn move_cursor_down(&mut self) {
        let Some(cursor_id) = self.cursor_id.clone() else {
            // Already at the bottom.
            return;
        };
        let new_id = self.supply.below_id(&cursor_id);

        let delta = self.cursor_row_delta(Some(&cursor_id), new_id.as_ref());
        let offset = self.absolute_anchor_offset() + delta;
        self.set_absolute_anchor_offset(offset);
        self.cursor_id = new_id;
        self.anchor_id = None;
        self.rerender();
        self.refocus();
    }

    /// Row of the cursor line in the current viewport, if visible.
    fn visible_cursor_row(&self) -> Option<i64> {
        (0..self.height as i64).find(|row| {
            self.lines
                .get(*row)
                .is_some_and(|(attrs, _)| attrs.contains_key(ATTR_CURSOR))
        })
    }

    /// The message rendered closest to the middle row, with its row and its
    /// line offset within the message.
    fn element_near_middle(&self) -> Option<(i64, MessageId, i64)> {
        let middle = self.height as i64 / 2;
        let mut candidates: Vec<i64> = (0..self.height as i64).collect();
        candidates.sort_by_key(|row| (row - middle).abs());

        for row in candidates {
            if let Some((attrs, _)) = self.lines.get(row) {
                if let Some(mid) = attrs.get(ATTR_MID).and_then(AttrValue::as_str) {
                    let offset = attrs
                        .get(ATTR_OFFSET)
                        .and_then(AttrValue::as_int)
                        .unwrap_or(0);
                    return Some((row, MessageId::new(mid), offset));
                }
            }
        }
        None
    }

    /// Whether the (offscreen) cursor is above the visible forest, judged
    /// by comparing ancestor paths with the element in the middle of the
    /// screen.
    fn cursor_is_above_viewport(&self) -> bool {
        let Some(cursor_id) = &self.cursor_id else {
            // The bottom cursor is below everything.
            return false;
        };
        let Some((_, middle_id, _)) = self.element_near_middle() else {
            return false;
        };
        let cursor_path = self.supply.ancestor_path(Some(cursor_id));
        let middle_path = self.supply.ancestor_path(Some(&middle_id));
        cursor_path <= middle_path
    }

    /// Re-anchor on the cursor: at its current row when visible, otherwise
    /// at the viewport edge it is closest to, clamped by scrolloff.
    pub fn refocus(&mut self) {
        let target = match self.visible_cursor_row() {
            Some(row) => row,
            None if self.cursor_is_above_viewport() => 0,
            None => self.height as i64 - 1,
        };

        self.anchor_id = None;
        let scrolloff = self.config.scrolloff as i64;
        let low = scrolloff;
        let high = self.height as i64 - 1 - scrolloff;
        let clamped = if low <= high {
            target.clamp(low, high)
        } else {
            self.height as i64 / 2
        };
        self.set_absolute_anchor_offset(clamped);
        self.rerender();
    }

    // Scrolling

    /// Scroll the viewport by `delta` rows (positive scrolls down). If the
    /// cursor stays visible it becomes the anchor again; otherwise the
    /// element nearest the middle row anchors the view in place.
    pub fn scroll(&mut self, delta: i64) {
        let offset = self.absolute_anchor_offset() + delta;
        self.set_absolute_anchor_offset(offset);
        self.rerender();

        if self.visible_cursor_row().is_some() {
            self.refocus();
        } else if let Some((row, mid, line_offset)) = self.element_near_middle() {
            self.anchor_id = Some(mid);
            self.set_absolute_anchor_offset(row - line_offset);
            self.rerender();
        }
    }
}
