//! Selection model and range algorithms over the document arena.
//!
//! Positions follow DOM boundary-point rules: the offset is a character index
//! inside text leaves and a child index everywhere else. Range extraction,
//! deletion and insertion mirror the DOM `Range` operations the editing
//! engines are written against, with the selection passed around as a value.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::doc::{Doc, InlineKind, NodeId, NodeKind, CELL_BLANK, PLACEHOLDER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self { Self { node, offset } }

    /// Boundary immediately before `node` inside its parent.
    pub fn before(doc: &Doc, node: NodeId) -> Option<Self> {
        Some(Self::new(doc.parent(node)?, doc.index_in_parent(node)?))
    }

    /// Boundary immediately after `node` inside its parent.
    pub fn after(doc: &Doc, node: NodeId) -> Option<Self> {
        Some(Self::new(doc.parent(node)?, doc.index_in_parent(node)? + 1))
    }

    pub fn end_of(doc: &Doc, node: NodeId) -> Self { Self::new(node, doc.node_len(node)) }
}

/// Caret or selected range: where the selection started (`anchor`) and where it
/// is now (`focus`). They may be in either document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    pub fn new(anchor: Position, focus: Position) -> Self { Self { anchor, focus } }
    pub fn collapsed(at: Position) -> Self { Self { anchor: at, focus: at } }
    pub fn caret(node: NodeId, offset: usize) -> Self { Self::collapsed(Position::new(node, offset)) }

    /// Selects every child (or character) of `node`, like `Range.selectNodeContents`.
    pub fn contents_of(doc: &Doc, node: NodeId) -> Self {
        Self::new(Position::new(node, 0), Position::end_of(doc, node))
    }

    pub fn is_collapsed(&self) -> bool { self.anchor == self.focus }

    /// The selection as a document-ordered range.
    pub fn range(&self, doc: &Doc) -> Range {
        match doc.compare_positions(self.anchor, self.focus) {
            Ordering::Greater => Range { start: self.focus, end: self.anchor },
            _ => Range { start: self.anchor, end: self.focus },
        }
    }
}

impl From<Range> for Selection {
    fn from(range: Range) -> Self { Selection::new(range.start, range.end) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn collapsed(at: Position) -> Self { Self { start: at, end: at } }
    pub fn is_collapsed(&self) -> bool { self.start == self.end }
    pub fn collapse_to_start(&mut self) { self.end = self.start; }
    pub fn collapse_to_end(&mut self) { self.start = self.end; }
}

impl Doc {
    pub fn compare_positions(&self, a: Position, b: Position) -> Ordering {
        self.position_key(a).cmp(&self.position_key(b))
    }

    fn position_key(&self, p: Position) -> Vec<usize> {
        let mut key = self.path(p.node);
        key.push(p.offset);
        key
    }

    pub fn is_valid_position(&self, p: Position) -> bool {
        self.is_attached(p.node) && p.offset <= self.node_len(p.node)
    }

    pub fn is_valid_selection(&self, s: &Selection) -> bool {
        self.is_valid_position(s.anchor) && self.is_valid_position(s.focus)
    }

    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        std::iter::once(a)
            .chain(self.ancestors(a))
            .find(|candidate| self.is_inclusive_ancestor(*candidate, b))
            .unwrap_or(self.root())
    }

    /// The child of `ancestor` that contains `node` (or is `node`).
    pub(crate) fn child_toward(&self, ancestor: NodeId, node: NodeId) -> Option<NodeId> {
        std::iter::once(node).chain(self.ancestors(node)).find(|n| self.parent(*n) == Some(ancestor))
    }

    /// Every node partially or fully inside the range, in document order.
    pub fn nodes_in_range(&self, range: &Range) -> Vec<NodeId> {
        if range.is_collapsed() {
            return Vec::new();
        }
        let common = self.common_ancestor(range.start.node, range.end.node);
        self.descendants(common)
            .into_iter()
            .filter(|n| {
                let (Some(before), Some(after)) = (Position::before(self, *n), Position::after(self, *n)) else {
                    return false;
                };
                self.compare_positions(before, range.end) == Ordering::Less
                    && self.compare_positions(range.start, after) == Ordering::Less
            })
            .collect()
    }

    /// Selected character span of a text leaf touched by the range.
    pub(crate) fn selected_chars(&self, text: NodeId, range: &Range) -> (usize, usize) {
        let from = if text == range.start.node { range.start.offset } else { 0 };
        let to = if text == range.end.node { range.end.offset } else { self.node_len(text) };
        (from, to)
    }

    /// Plain text covered by the range, like `Selection.toString()`.
    pub fn range_text(&self, range: &Range) -> String {
        if range.start.node == range.end.node {
            if let Some(text) = self.text(range.start.node) {
                return text.chars().skip(range.start.offset).take(range.end.offset.saturating_sub(range.start.offset)).collect();
            }
        }
        let mut out = String::new();
        for node in self.nodes_in_range(range) {
            if let Some(text) = self.text(node) {
                let (from, to) = self.selected_chars(node, range);
                out.extend(text.chars().skip(from).take(to.saturating_sub(from)));
            }
        }
        out
    }

    /// Whether the range reaches into or across any block-level node.
    pub fn range_touches_blocks(&self, range: &Range) -> bool {
        self.nodes_in_range(range).into_iter().any(|n| self.kind(n).is_block_level())
    }

    /// Removes the range's content from the tree and returns it as detached nodes.
    /// Partially selected elements are shallow-cloned so the fragment keeps their
    /// structure; the range collapses to where the content used to start.
    pub fn extract_contents(&mut self, range: &mut Range) -> Vec<NodeId> {
        if range.is_collapsed() {
            return Vec::new();
        }
        let Range { start, end } = *range;
        let (sc, so, ec, eo) = (start.node, start.offset, end.node, end.offset);

        if sc == ec && self.is_text(sc) {
            let cut = self.remove_text_range(sc, so, eo);
            range.collapse_to_start();
            return vec![self.create_text(cut)];
        }

        let common = self.common_ancestor(sc, ec);
        let first_partial = (!self.is_inclusive_ancestor(sc, ec)).then(|| self.child_toward(common, sc)).flatten();
        let last_partial = (!self.is_inclusive_ancestor(ec, sc)).then(|| self.child_toward(common, ec)).flatten();

        let collapse_to = if self.is_inclusive_ancestor(sc, ec) {
            start
        } else {
            let mut reference = sc;
            while let Some(parent) = self.parent(reference) {
                if self.is_inclusive_ancestor(parent, ec) {
                    break;
                }
                reference = parent;
            }
            Position::after(self, reference).unwrap_or(start)
        };

        let siblings = self.children(common).to_vec();
        let lo = match first_partial {
            Some(fp) => self.index_in_parent(fp).map_or(siblings.len(), |i| i + 1),
            None => so,
        };
        let hi = match last_partial {
            Some(lp) => self.index_in_parent(lp).unwrap_or(0),
            None => eo,
        };

        let mut fragment = Vec::new();
        if let Some(fp) = first_partial {
            if self.is_text(fp) {
                let len = self.node_len(fp);
                let cut = self.remove_text_range(fp, so, len);
                if !cut.is_empty() {
                    fragment.push(self.create_text(cut));
                }
            } else {
                let clone = self.clone_shallow(fp);
                let mut sub = Range { start, end: Position::end_of(self, fp) };
                for node in self.extract_contents(&mut sub) {
                    self.append_child(clone, node);
                }
                fragment.push(clone);
            }
        }
        if lo < hi {
            for node in &siblings[lo..hi.min(siblings.len())] {
                self.detach(*node);
                fragment.push(*node);
            }
        }
        if let Some(lp) = last_partial {
            if self.is_text(lp) {
                let cut = self.remove_text_range(lp, 0, eo);
                if !cut.is_empty() {
                    fragment.push(self.create_text(cut));
                }
            } else {
                let clone = self.clone_shallow(lp);
                let mut sub = Range { start: Position::new(lp, 0), end };
                for node in self.extract_contents(&mut sub) {
                    self.append_child(clone, node);
                }
                fragment.push(clone);
            }
        }

        *range = Range::collapsed(collapse_to);
        fragment
    }

    pub fn delete_contents(&mut self, range: &mut Range) {
        let _ = self.extract_contents(range);
    }

    /// Deletes the range's content without touching document structure.
    ///
    /// A range inside one block's inline flow is removed like
    /// [`Doc::delete_contents`]. A range that reaches across blocks, list items
    /// or cells only loses its selected characters, line breaks, images and
    /// rules; every block, item, row and cell stays where it is. Returns the
    /// collapsed start and the nodes the deletion touched, to be handed to
    /// [`Doc::restore_placeholders`] once the caller has placed new content.
    pub fn delete_range(&mut self, range: &Range) -> (Position, Vec<NodeId>) {
        if !self.range_touches_blocks(range) {
            let mut range = *range;
            self.delete_contents(&mut range);
            return (self.settle(range.start), Vec::new());
        }
        let start = if self.is_text(range.start.node) || self.kind(range.start.node).can_have_children() {
            range.start
        } else {
            Position::before(self, range.start.node).unwrap_or(range.start)
        };
        let touched = self.nodes_in_range(range);
        for node in &touched {
            match self.kind(*node) {
                NodeKind::Text { .. } => {
                    let (from, to) = self.selected_chars(*node, range);
                    if from < to {
                        self.remove_text_range(*node, from, to);
                    }
                }
                NodeKind::LineBreak | NodeKind::HorizontalRule | NodeKind::Inline { kind: InlineKind::Image, .. } => {
                    self.detach(*node)
                }
                _ => {}
            }
        }
        (self.settle(start), touched)
    }

    /// Drops the text leaves and inline wrappers a [`Doc::delete_range`] left
    /// empty and refills emptied blocks, list items and cells.
    pub fn restore_placeholders(&mut self, touched: &[NodeId]) {
        for node in touched.iter().rev().copied() {
            if !self.is_attached(node) {
                continue;
            }
            let filler = match self.kind(node).clone() {
                NodeKind::Text { text } => {
                    if text.is_empty() {
                        self.detach(node);
                    }
                    continue;
                }
                NodeKind::Inline { kind, .. } if kind.is_wrapper() => {
                    if self.children(node).is_empty() {
                        self.detach(node);
                    }
                    continue;
                }
                NodeKind::Cell => CELL_BLANK,
                NodeKind::Block { .. } | NodeKind::ListItem { .. } => PLACEHOLDER,
                _ => continue,
            };
            if self.children(node).is_empty() {
                let text = self.create_text(filler.to_string());
                self.append_child(node, text);
            }
        }
    }

    /// Replaces the range with `node` and returns the boundary just after it.
    pub fn replace_range(&mut self, range: &Range, node: NodeId) -> Option<Position> {
        let (at, touched) = self.delete_range(range);
        self.insert_node(at, node)?;
        self.restore_placeholders(&touched);
        Position::after(self, node)
    }

    /// A boundary sitting directly in a table, row or list moves down into the
    /// cell or item it points at; nothing else may be inserted there.
    fn settle(&self, at: Position) -> Position {
        let mut at = at;
        while matches!(self.kind(at.node), NodeKind::Table | NodeKind::Row | NodeKind::List { .. }) {
            let children = self.children(at.node);
            at = match (children.get(at.offset), children.last()) {
                (Some(child), _) => Position::new(*child, 0),
                (None, Some(last)) => Position::end_of(self, *last),
                (None, None) => return Position::before(self, at.node).unwrap_or(at),
            };
        }
        at
    }

    /// Inserts `node` at a boundary point, splitting a text leaf if the point falls
    /// inside one. Returns the boundary just after the inserted node.
    pub fn insert_node(&mut self, at: Position, node: NodeId) -> Option<Position> {
        let at = self.settle(at);
        let placed = if self.is_text(at.node) {
            let len = self.node_len(at.node);
            if at.offset == 0 {
                self.insert_before(at.node, node)
            } else if at.offset >= len {
                self.insert_after(at.node, node)
            } else {
                let tail = self.split_text(at.node, at.offset)?;
                self.insert_before(tail, node)
            }
        } else if !self.kind(at.node).can_have_children() {
            if at.offset == 0 { self.insert_before(at.node, node) } else { self.insert_after(at.node, node) }
        } else {
            self.insert_child(at.node, at.offset, node);
            true
        };
        if !placed {
            return None;
        }
        Position::after(self, node)
    }

    /// The element a position sits in: text leaves resolve to their parent.
    pub fn element_of(&self, p: Position) -> NodeId {
        if self.is_text(p.node) {
            self.parent(p.node).unwrap_or(p.node)
        } else {
            p.node
        }
    }

    /// Nearest inclusive ancestor matching `pred`, giving up at a `stop` node or the root.
    pub fn closest_within(
        &self,
        id: NodeId,
        pred: impl Fn(&NodeKind) -> bool,
        stop: impl Fn(&NodeKind) -> bool,
    ) -> Option<NodeId> {
        for node in std::iter::once(id).chain(self.ancestors(id)) {
            let kind = self.kind(node);
            if kind.is_root() {
                return None;
            }
            if pred(kind) {
                return Some(node);
            }
            if stop(kind) {
                return None;
            }
        }
        None
    }

    /// Nearest paragraph, heading, container or custom box, not leaving the current cell or list item.
    pub fn enclosing_block(&self, node: NodeId) -> Option<NodeId> {
        self.closest_within(node, NodeKind::is_block, |k| k.is_cell() || k.is_list_item())
    }

    pub fn enclosing_convertible(&self, node: NodeId) -> Option<NodeId> {
        self.closest(node, NodeKind::is_convertible)
    }

    pub fn enclosing_list_item(&self, node: NodeId) -> Option<NodeId> {
        self.closest_within(node, NodeKind::is_list_item, NodeKind::is_cell)
    }

    pub fn enclosing_list(&self, node: NodeId) -> Option<NodeId> {
        self.closest_within(node, NodeKind::is_list, NodeKind::is_cell)
    }

    pub fn enclosing_cell(&self, node: NodeId) -> Option<NodeId> {
        self.closest(node, NodeKind::is_cell)
    }

    /// Block or list item a list toggle operates on; never escapes a table cell.
    pub fn enclosing_top_block(&self, node: NodeId) -> Option<NodeId> {
        self.closest_within(node, |k| k.is_block() || k.is_list_item(), NodeKind::is_cell)
    }

    /// Nearest node that can carry a style property directly.
    pub fn enclosing_styleable(&self, node: NodeId) -> Option<NodeId> {
        self.closest(node, |k| {
            k.is_block() || k.is_list_item() || matches!(k, NodeKind::Inline { kind: InlineKind::Span, .. })
        })
    }

    /// Start of the first text leaf under `node`, or the node's own start.
    pub fn start_of_content(&self, node: NodeId) -> Position {
        match self.first_child(node) {
            Some(child) if self.is_text(child) => Position::new(child, 0),
            _ => Position::new(node, 0),
        }
    }
}
