//! Styled text primitives.
//!
//! [`StyledText`] is an immutable sequence of characters where every
//! character carries a map of named attributes. Attributes survive slicing,
//! concatenation and repetition, which lets message bodies keep their
//! styling while the tree renderer wraps them in meta prefixes and
//! indentation. The widget layer later translates attribute maps into
//! terminal styles; this module knows nothing about colors.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Bound, RangeBounds};
use std::sync::Arc;

/// Value of a single named attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl AttrValue {
    /// The contained string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The contained integer, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The contained boolean, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// An unordered name → value attribute map.
pub type Attrs = BTreeMap<String, AttrValue>;

/// Build an attribute map from `(name, value)` pairs.
pub fn attrs<K, V, I>(pairs: I) -> Attrs
where
    K: Into<String>,
    V: Into<AttrValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A single character together with its attributes.
///
/// Attribute maps are shared between the cells of a run, so cloning a cell
/// is cheap. Equality compares the map contents, not the sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    ch: char,
    attrs: Arc<Attrs>,
}

impl Cell {
    pub fn new(ch: char, attrs: Arc<Attrs>) -> Self {
        Self { ch, attrs }
    }

    pub fn ch(&self) -> char {
        self.ch
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

/// An immutable string of attributed characters.
///
/// All operations return new values; the receiver is never modified.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledText {
    cells: Vec<Cell>,
}

impl StyledText {
    /// Text with the same attribute map on every character.
    pub fn of(text: &str, attrs: Attrs) -> Self {
        let attrs = Arc::new(attrs);
        Self {
            cells: text.chars().map(|ch| Cell::new(ch, attrs.clone())).collect(),
        }
    }

    /// Unattributed text.
    pub fn plain(text: &str) -> Self {
        Self::of(text, Attrs::new())
    }

    /// The empty text.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The character content without attributes.
    pub fn text(&self) -> String {
        self.cells.iter().map(Cell::ch).collect()
    }

    /// The sub-text covering `range`, clamped to the text's bounds.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Self {
        let (start, end) = resolve_bounds(&range, self.len());
        let (start, end) = (start.min(self.len()), end.min(self.len()));
        if start >= end {
            return Self::empty();
        }
        Self {
            cells: self.cells[start..end].to_vec(),
        }
    }

    /// This text repeated `n` times.
    pub fn repeat(&self, n: usize) -> Self {
        let mut cells = Vec::with_capacity(self.cells.len() * n);
        for _ in 0..n {
            cells.extend_from_slice(&self.cells);
        }
        Self { cells }
    }

    /// The attribute map of the character at `pos`.
    ///
    /// Returns `None` when `pos` is out of bounds.
    pub fn attrs_at(&self, pos: usize) -> Option<&Attrs> {
        self.cells.get(pos).map(Cell::attrs)
    }

    /// The value of attribute `name` at `pos`, if any.
    pub fn get(&self, pos: usize, name: &str) -> Option<&AttrValue> {
        self.attrs_at(pos).and_then(|attrs| attrs.get(name))
    }

    /// Set attribute `name` to `value` on every character in `range`.
    ///
    /// An unbounded range covers the whole text. An inverted range
    /// (`start > end`) applies the attribute to the complement, i.e. to
    /// every character *outside* `[end, start)`.
    pub fn set<R: RangeBounds<usize>>(&self, name: &str, value: AttrValue, range: R) -> Self {
        let (start, end) = resolve_bounds(&range, self.len());
        self.edit_cells(start, end, |attrs| {
            attrs.insert(name.to_string(), value.clone());
        })
    }

    /// Set attribute `name` on the single character at `pos`.
    pub fn set_at(&self, name: &str, value: AttrValue, pos: usize) -> Self {
        self.set(name, value, pos..pos + 1)
    }

    /// Remove attribute `name` from every character in `range`, with the
    /// same range semantics as [`StyledText::set`].
    pub fn remove<R: RangeBounds<usize>>(&self, name: &str, range: R) -> Self {
        let (start, end) = resolve_bounds(&range, self.len());
        self.edit_cells(start, end, |attrs| {
            attrs.remove(name);
        })
    }

    /// Apply `edit` to the attribute maps of `[start, end)`, or to the
    /// complement when `start > end`.
    fn edit_cells<E: Fn(&mut Attrs)>(&self, start: usize, end: usize, edit: E) -> Self {
        let inverted = start > end;
        let inside = |pos: usize| {
            if inverted {
                pos < end || pos >= start
            } else {
                pos >= start && pos < end
            }
        };

        // Consecutive cells usually share one attribute map; reuse the
        // edited map for each run instead of rebuilding it per cell.
        let mut last: Option<(*const Attrs, Arc<Attrs>)> = None;
        let cells = self
            .cells
            .iter()
            .enumerate()
            .map(|(pos, cell)| {
                if !inside(pos) {
                    return cell.clone();
                }
                let key = Arc::as_ptr(&cell.attrs);
                let reused = last
                    .as_ref()
                    .filter(|entry| entry.0 == key)
                    .map(|entry| entry.1.clone());
                let attrs = reused.unwrap_or_else(|| {
                    let mut attrs = (*cell.attrs).clone();
                    edit(&mut attrs);
                    let edited = Arc::new(attrs);
                    last = Some((key, edited.clone()));
                    edited
                });
                Cell::new(cell.ch, attrs)
            })
            .collect();
        Self { cells }
    }

    /// Partition the text into maximal runs over which the value of
    /// attribute `name` is identical (absence counts as a value).
    ///
    /// Concatenating the returned segments in order reproduces the text.
    pub fn split_by(&self, name: &str) -> Vec<(StyledText, Option<AttrValue>)> {
        let mut blocks: Vec<(StyledText, Option<AttrValue>)> = Vec::new();
        let mut run: Vec<Cell> = Vec::new();
        let mut current: Option<AttrValue> = None;

        for cell in &self.cells {
            let value = cell.attrs().get(name).cloned();
            if run.is_empty() {
                current = value;
                run.push(cell.clone());
            } else if value == current {
                run.push(cell.clone());
            } else {
                blocks.push((StyledText::from_cells(std::mem::take(&mut run)), current));
                current = value;
                run.push(cell.clone());
            }
        }
        if !run.is_empty() {
            blocks.push((StyledText::from_cells(run), current));
        }
        blocks
    }

    /// Concatenate `segments`, inserting `self` between consecutive ones.
    pub fn join<I: IntoIterator<Item = StyledText>>(&self, segments: I) -> StyledText {
        let mut cells = Vec::new();
        for (i, segment) in segments.into_iter().enumerate() {
            if i > 0 {
                cells.extend_from_slice(&self.cells);
            }
            cells.extend(segment.cells);
        }
        Self { cells }
    }
}

impl Add for StyledText {
    type Output = StyledText;

    fn add(mut self, rhs: StyledText) -> StyledText {
        self.cells.extend(rhs.cells);
        self
    }
}

impl Add<&StyledText> for StyledText {
    type Output = StyledText;

    fn add(mut self, rhs: &StyledText) -> StyledText {
        self.cells.extend_from_slice(&rhs.cells);
        self
    }
}

impl fmt::Display for StyledText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            write!(f, "{}", cell.ch)?;
        }
        Ok(())
    }
}

fn resolve_bounds<R: RangeBounds<usize>>(range: &R, len: usize) -> (usize, usize) {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => e + 1,
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    };
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> StyledText {
        StyledText::plain("This is a sample string.")
            .set("attribute", "value".into(), 5..21)
            .set_at("attribute2", "value2".into(), 13)
    }

    #[test]
    fn empty_texts_are_equal_regardless_of_attrs() {
        assert_eq!(StyledText::empty(), StyledText::plain(""));
        assert_eq!(
            StyledText::empty(),
            StyledText::of("", attrs([("style", "nick")]))
        );
    }

    #[test]
    fn text_round_trips_through_styling() {
        for s in ["Hello world", "\n", "            ", "multi\nline"] {
            assert_eq!(s, StyledText::plain(s).text());
        }
    }

    #[test]
    fn concat_is_a_homomorphism_on_text() {
        let joined = StyledText::plain("hello") + StyledText::plain(" world");
        assert_eq!("hello world", joined.text());

        let parts = ["a", "bb", "", "ccc"];
        let joined = StyledText::empty().join(parts.iter().map(|p| StyledText::plain(p)));
        assert_eq!(parts.concat(), joined.text());
    }

    #[test]
    fn set_and_get_respect_bounds() {
        let text = sample();
        assert_eq!(None, text.get(4, "attribute"));
        assert_eq!(Some(&"value".into()), text.get(5, "attribute"));
        assert_eq!(Some(&"value".into()), text.get(20, "attribute"));
        assert_eq!(None, text.get(21, "attribute"));

        assert_eq!(None, text.get(12, "attribute2"));
        assert_eq!(Some(&"value2".into()), text.get(13, "attribute2"));
        assert_eq!(None, text.get(14, "attribute2"));
    }

    #[test]
    fn slicing_and_reassembling_preserves_attrs() {
        let text = sample();
        let rejoined = text.slice(..4) + text.slice(4..11) + text.slice(11..22) + text.slice(22..);
        assert_eq!(text, rejoined);

        let with_overrun = text.slice(..10) + text.slice(10..1000);
        assert_eq!(text, with_overrun);
    }

    #[test]
    fn slice_concat_lengths_add_up() {
        let text = sample();
        for k in 0..=text.len() {
            let recombined = text.slice(..k) + text.slice(k..);
            assert_eq!(text.len(), recombined.len());
            assert_eq!(text, recombined);
        }
    }

    #[test]
    fn remove_clears_only_the_requested_range() {
        let text = sample().remove("attribute", 9..15);
        assert_eq!(Some(&"value".into()), text.get(8, "attribute"));
        assert_eq!(None, text.get(9, "attribute"));
        assert_eq!(None, text.get(14, "attribute"));
        assert_eq!(Some(&"value".into()), text.get(15, "attribute"));
        // The other attribute is untouched.
        assert_eq!(Some(&"value2".into()), text.get(13, "attribute2"));
    }

    #[test]
    fn inverted_range_applies_to_complement() {
        let text = StyledText::plain("0123456789").set("x", AttrValue::Bool(true), 7..3);
        for pos in 0..3 {
            assert_eq!(Some(&AttrValue::Bool(true)), text.get(pos, "x"));
        }
        for pos in 3..7 {
            assert_eq!(None, text.get(pos, "x"));
        }
        for pos in 7..10 {
            assert_eq!(Some(&AttrValue::Bool(true)), text.get(pos, "x"));
        }
    }

    #[test]
    fn split_by_partitions_into_maximal_runs() {
        let text = sample();
        let blocks = text.split_by("attribute");
        assert_eq!(3, blocks.len());
        assert_eq!((text.slice(..5), None), blocks[0]);
        assert_eq!((text.slice(5..21), Some("value".into())), blocks[1]);
        assert_eq!((text.slice(21..), None), blocks[2]);

        let rejoined = blocks
            .into_iter()
            .fold(StyledText::empty(), |acc, (segment, _)| acc + segment);
        assert_eq!(text, rejoined);
    }

    #[test]
    fn join_intersperses_the_separator() {
        let sep = StyledText::plain(", ");
        let joined = sep.join(["a", "b", "c"].iter().map(|p| StyledText::plain(p)));
        assert_eq!("a, b, c", joined.text());
    }

    #[test]
    fn repeat_multiplies_length() {
        let text = StyledText::of("ab", attrs([("style", "gray")]));
        let repeated = text.repeat(3);
        assert_eq!("ababab", repeated.text());
        assert_eq!(Some(&"gray".into()), repeated.get(5, "style"));
        assert_eq!(StyledText::empty(), text.repeat(0));
    }
}
