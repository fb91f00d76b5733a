//! List engine: the three-way list toggle and Enter inside list items.

use tracing::debug;

use crate::doc::{BlockKind, Doc, ListKind, NodeId, NodeKind, Style, PLACEHOLDER};
use crate::selection::{Position, Selection};

fn list_kind(doc: &Doc, list: NodeId) -> Option<ListKind> {
    match doc.kind(list) {
        NodeKind::List { kind } => Some(*kind),
        _ => None,
    }
}

fn ensure_placeholder(doc: &mut Doc, node: NodeId) {
    if doc.children(node).is_empty() {
        let text = doc.create_text(PLACEHOLDER.to_string());
        doc.append_child(node, text);
    }
}

/// Toggles the blocks touched by the selection in or out of a `kind` list.
///
/// * already in a list of the same kind: the selected items become paragraphs
///   and the list is split around them;
/// * in a list of the other kind: the list changes kind in place;
/// * not in a list: the touched blocks become the items of a new list.
pub fn toggle_list(doc: &mut Doc, selection: &Selection, kind: ListKind) -> Option<Selection> {
    let range = selection.range(doc);
    let start_block = doc.enclosing_top_block(doc.element_of(range.start));
    let end_block = doc.enclosing_top_block(doc.element_of(range.end));
    let (Some(start_block), Some(end_block)) = (start_block, end_block) else {
        debug!("selection is not inside a block; list toggle ignored");
        return None;
    };

    let common = doc.common_ancestor(range.start.node, range.end.node);
    match doc.enclosing_list(common) {
        Some(list) if list_kind(doc, list) == Some(kind) => {
            unlist_items(doc, list, start_block, end_block, selection.is_collapsed())
        }
        Some(list) => {
            *doc.kind_mut(list) = NodeKind::List { kind };
            Some(*selection)
        }
        None => wrap_in_list(doc, start_block, end_block, kind, selection.is_collapsed()),
    }
}

/// Turns a list item into top-level blocks: its children when they are all
/// blocks already, otherwise a paragraph carrying the item's style.
fn item_to_blocks(doc: &mut Doc, item: NodeId) -> Vec<NodeId> {
    let children = doc.children(item).to_vec();
    if !children.is_empty() && children.iter().all(|c| doc.kind(*c).is_block_level()) {
        for child in &children {
            doc.detach(*child);
        }
        doc.detach(item);
        return children;
    }
    let style = doc.kind(item).style().cloned().unwrap_or_default();
    let paragraph = doc.create(NodeKind::Block { kind: BlockKind::Paragraph, style });
    doc.move_children(item, paragraph);
    ensure_placeholder(doc, paragraph);
    doc.detach(item);
    vec![paragraph]
}

fn unlist_items(
    doc: &mut Doc,
    list: NodeId,
    start_block: NodeId,
    end_block: NodeId,
    collapsed: bool,
) -> Option<Selection> {
    let first = doc.child_toward(list, start_block)?;
    let last = doc.child_toward(list, end_block)?;
    let (a, b) = (doc.index_in_parent(first)?, doc.index_in_parent(last)?);
    let (lo, hi) = (a.min(b), a.max(b));
    let parent = doc.parent(list)?;

    let items = doc.children(list).to_vec();
    let run = items[lo..=hi].to_vec();
    let trailing = &items[hi + 1..];
    let tail_list = if trailing.is_empty() {
        None
    } else {
        let clone = doc.clone_shallow(list);
        for item in trailing {
            doc.append_child(clone, *item);
        }
        Some(clone)
    };

    let mut blocks = Vec::new();
    for item in run {
        blocks.extend(item_to_blocks(doc, item));
    }

    let mut insert_at = doc.index_in_parent(list)? + 1;
    if doc.children(list).is_empty() {
        doc.detach(list);
        insert_at -= 1;
    }
    for block in &blocks {
        doc.insert_child(parent, insert_at, *block);
        insert_at += 1;
    }
    if let Some(tail) = tail_list {
        doc.insert_child(parent, insert_at, tail);
    }

    let (first_block, last_block) = (*blocks.first()?, *blocks.last()?);
    if collapsed && blocks.len() == 1 {
        return Some(Selection::collapsed(doc.start_of_content(first_block)));
    }
    Some(Selection::new(doc.start_of_content(first_block), Position::end_of(doc, last_block)))
}

/// The consecutive siblings spanning from the start block to the end block.
fn sibling_run(doc: &Doc, start_block: NodeId, end_block: NodeId) -> Option<(NodeId, Vec<NodeId>)> {
    if doc.is_inclusive_ancestor(start_block, end_block) {
        return Some((doc.parent(start_block)?, vec![start_block]));
    }
    if doc.is_inclusive_ancestor(end_block, start_block) {
        return Some((doc.parent(end_block)?, vec![end_block]));
    }
    let common = doc.common_ancestor(start_block, end_block);
    let first = doc.child_toward(common, start_block)?;
    let last = doc.child_toward(common, end_block)?;
    let (a, b) = (doc.index_in_parent(first)?, doc.index_in_parent(last)?);
    let (lo, hi) = (a.min(b), a.max(b));
    Some((common, doc.children(common)[lo..=hi].to_vec()))
}

fn wrap_in_list(
    doc: &mut Doc,
    start_block: NodeId,
    end_block: NodeId,
    kind: ListKind,
    collapsed: bool,
) -> Option<Selection> {
    let (parent, run) = sibling_run(doc, start_block, end_block)?;
    if !matches!(doc.kind(parent), NodeKind::Root | NodeKind::Block { .. } | NodeKind::ListItem { .. } | NodeKind::Cell) {
        debug!("selected blocks do not share a flow container; list toggle ignored");
        return None;
    }
    let insert_at = doc.index_in_parent(*run.first()?)?;

    let list = doc.create(NodeKind::List { kind });
    for node in run {
        match doc.kind(node).clone() {
            NodeKind::List { .. } => {
                for item in doc.children(node).to_vec() {
                    doc.append_child(list, item);
                }
                doc.detach(node);
            }
            NodeKind::Block { style, .. } | NodeKind::ListItem { style } => {
                let item = doc.create(NodeKind::ListItem { style });
                doc.move_children(node, item);
                ensure_placeholder(doc, item);
                doc.append_child(list, item);
                doc.detach(node);
            }
            _ => {
                let item = doc.create(NodeKind::ListItem { style: Style::new() });
                doc.append_child(list, item);
                doc.append_child(item, node);
            }
        }
    }
    if doc.children(list).is_empty() {
        return None;
    }
    doc.insert_child(parent, insert_at, list);

    let first_item = doc.first_child(list)?;
    if collapsed {
        return Some(Selection::collapsed(doc.start_of_content(first_item)));
    }
    let last_item = doc.last_child(list)?;
    Some(Selection::new(doc.start_of_content(first_item), Position::end_of(doc, last_item)))
}

/// Enter inside a list item: a blank item exits the list into a new paragraph,
/// any other item gets a fresh sibling.
pub fn split_list_item(doc: &mut Doc, item: NodeId) -> Option<Selection> {
    let list = doc.parent(item)?;
    if doc.is_blank(item) {
        let paragraph = doc.create_placeholder_block(BlockKind::Paragraph);
        if !doc.insert_after(list, paragraph) {
            return None;
        }
        doc.detach(item);
        if doc.children(list).is_empty() {
            doc.detach(list);
        }
        return Some(Selection::caret(paragraph, 0));
    }
    let next = doc.create(NodeKind::list_item());
    ensure_placeholder(doc, next);
    doc.insert_after(item, next);
    Some(Selection::caret(next, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import_export::to_html;
    use crate::testing::{caret_in, parse, text_leaf};
    use pretty_assertions::assert_eq;

    fn span(doc: &Doc, from: &str, to: &str) -> Selection {
        Selection::new(Position::new(text_leaf(doc, from), 0), Position::new(text_leaf(doc, to), 1))
    }

    #[test]
    fn paragraphs_become_list_items() {
        let mut doc = parse("<p>a</p><p style=\"color: red;\">b</p><p>c</p>");
        let sel = span(&doc, "a", "b");
        let next = toggle_list(&mut doc, &sel, ListKind::Unordered).unwrap();
        assert_eq!(to_html(&doc), "<ul><li>a</li><li style=\"color: red;\">b</li></ul><p>c</p>");
        assert_eq!(doc.range_text(&next.range(&doc)), "ab");
    }

    #[test]
    fn caret_toggle_lands_at_start_of_item() {
        let mut doc = parse("<p>abc</p>");
        let sel = caret_in(&doc, "abc", 2);
        let next = toggle_list(&mut doc, &sel, ListKind::Ordered).unwrap();
        assert_eq!(to_html(&doc), "<ol><li>abc</li></ol>");
        assert_eq!(next, Selection::caret(text_leaf(&doc, "abc"), 0));
    }

    #[test]
    fn same_kind_toggle_returns_paragraphs() {
        let mut doc = parse("<ul><li>a</li><li>b</li></ul>");
        let sel = span(&doc, "a", "b");
        toggle_list(&mut doc, &sel, ListKind::Unordered).unwrap();
        assert_eq!(to_html(&doc), "<p>a</p><p>b</p>");
    }

    #[test]
    fn unlisting_a_middle_item_splits_the_list() {
        let mut doc = parse("<ol><li>a</li><li>b</li><li>c</li></ol>");
        let sel = caret_in(&doc, "b", 0);
        let next = toggle_list(&mut doc, &sel, ListKind::Ordered).unwrap();
        assert_eq!(to_html(&doc), "<ol><li>a</li></ol><p>b</p><ol><li>c</li></ol>");
        assert_eq!(next, Selection::caret(text_leaf(&doc, "b"), 0));
    }

    #[test]
    fn other_kind_switches_in_place() {
        let mut doc = parse("<ul><li>a</li><li>b</li></ul>");
        let sel = caret_in(&doc, "b", 1);
        let next = toggle_list(&mut doc, &sel, ListKind::Ordered).unwrap();
        assert_eq!(to_html(&doc), "<ol><li>a</li><li>b</li></ol>");
        assert_eq!(next, sel);
    }

    #[test]
    fn existing_list_in_run_is_merged() {
        let mut doc = parse("<p>a</p><ul><li>b</li></ul><p>c</p>");
        let sel = span(&doc, "a", "c");
        toggle_list(&mut doc, &sel, ListKind::Unordered).unwrap();
        assert_eq!(to_html(&doc), "<ul><li>a</li><li>b</li><li>c</li></ul>");
    }

    #[test]
    fn enter_in_filled_item_adds_item() {
        let mut doc = parse("<ul><li>a</li></ul>");
        let item = doc.parent(text_leaf(&doc, "a")).unwrap();
        let next = split_list_item(&mut doc, item).unwrap();
        assert_eq!(to_html(&doc), format!("<ul><li>a</li><li>{}</li></ul>", PLACEHOLDER));
        assert_eq!(next, Selection::caret(doc.child(doc.first_child(doc.root()).unwrap(), 1).unwrap(), 0));
    }

    #[test]
    fn enter_in_blank_last_item_exits_and_drops_empty_list() {
        let mut doc = parse("<ul><li>\u{200B}</li></ul>");
        let item = doc.first_child(doc.first_child(doc.root()).unwrap()).unwrap();
        let next = split_list_item(&mut doc, item).unwrap();
        assert_eq!(to_html(&doc), format!("<p>{}</p>", PLACEHOLDER));
        assert_eq!(next, Selection::caret(doc.first_child(doc.root()).unwrap(), 0));
    }

    #[test]
    fn enter_in_blank_item_keeps_remaining_items() {
        let mut doc = parse("<ul><li>a</li><li> </li></ul>");
        let list = doc.first_child(doc.root()).unwrap();
        let blank = doc.child(list, 1).unwrap();
        split_list_item(&mut doc, blank).unwrap();
        assert_eq!(to_html(&doc), format!("<ul><li>a</li></ul><p>{}</p>", PLACEHOLDER));
    }
}
