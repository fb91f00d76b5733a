//! Table engine: grid creation and rectangular row/column edits.
//!
//! Inserting a table is split in two: [`prepare_table_insert`] mutates the tree
//! and [`finalize_table_selection`] later places the caret in the first cell.
//! Callers that render between the two phases can do so; everything else can
//! use [`create_table`].

use tracing::debug;

use crate::config::DegenerateTablePolicy;
use crate::doc::{BlockKind, Doc, NodeId, NodeKind, CELL_BLANK};
use crate::selection::{Position, Range, Selection};

/// A table that has been placed in the document but not yet focused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTable {
    pub table: NodeId,
}

fn blank_cell(doc: &mut Doc) -> NodeId {
    let cell = doc.create(NodeKind::Cell);
    let text = doc.create_text(CELL_BLANK.to_string());
    doc.append_child(cell, text);
    cell
}

fn build_table(doc: &mut Doc, rows: usize, cols: usize) -> NodeId {
    let table = doc.create(NodeKind::Table);
    for _ in 0..rows {
        let row = doc.create(NodeKind::Row);
        for _ in 0..cols {
            let cell = blank_cell(doc);
            doc.append_child(row, cell);
        }
        doc.append_child(table, row);
    }
    table
}

/// Cuts the enclosing block at `at`, puts the table after the head and returns
/// the detached tail block when it still has visible content.
fn split_block_around(doc: &mut Doc, block: NodeId, at: Position, table: NodeId) -> Option<NodeId> {
    let mut tail_range = Range { start: at, end: Position::end_of(doc, block) };
    let moved = doc.extract_contents(&mut tail_range);
    let tail = doc.clone_shallow(block);
    for node in moved {
        doc.append_child(tail, node);
    }
    doc.insert_after(block, table);
    if doc.is_blank(block) {
        doc.detach(block);
    }
    (!doc.is_blank(tail)).then_some(tail)
}

pub fn prepare_table_insert(doc: &mut Doc, selection: &Selection, rows: usize, cols: usize) -> Option<PendingTable> {
    if rows == 0 || cols == 0 {
        debug!(rows, cols, "table needs at least one row and one column");
        return None;
    }
    let table = build_table(doc, rows, cols);
    let mut tail = None;
    if doc.is_effectively_empty() {
        let placeholder = doc.reset_to_placeholder();
        doc.replace(placeholder, table);
    } else {
        let (at, touched) = doc.delete_range(&selection.range(doc));
        match doc.enclosing_block(doc.element_of(at)) {
            Some(block) => tail = split_block_around(doc, block, at, table),
            None => {
                doc.insert_node(at, table)?;
            }
        }
        doc.restore_placeholders(&touched);
    }

    let paragraph = doc.create_placeholder_block(BlockKind::Paragraph);
    doc.insert_after(table, paragraph);
    if let Some(tail) = tail {
        doc.insert_after(paragraph, tail);
    }
    Some(PendingTable { table })
}

/// Caret at the start of the pending table's first cell; `None` once the table
/// is gone from the document.
pub fn finalize_table_selection(doc: &Doc, pending: PendingTable) -> Option<Selection> {
    if !doc.is_attached(pending.table) {
        debug!("pending table was removed before it could be focused");
        return None;
    }
    let cell = doc.descendants(pending.table).into_iter().find(|n| doc.kind(*n).is_cell())?;
    Some(Selection::caret(cell, 0))
}

pub fn create_table(doc: &mut Doc, selection: &Selection, rows: usize, cols: usize) -> Option<Selection> {
    let pending = prepare_table_insert(doc, selection, rows, cols)?;
    finalize_table_selection(doc, pending)
}

/// `(row, table, column)` of an attached cell inside a well-formed table.
fn locate(doc: &Doc, cell: NodeId) -> Option<(NodeId, NodeId, usize)> {
    if !doc.contains(cell) || !doc.kind(cell).is_cell() || !doc.is_attached(cell) {
        return None;
    }
    let row = doc.parent(cell)?;
    let table = doc.parent(row)?;
    if !matches!(doc.kind(row), NodeKind::Row) || !matches!(doc.kind(table), NodeKind::Table) {
        return None;
    }
    Some((row, table, doc.index_in_parent(cell)?))
}

pub fn cell_at(doc: &Doc, table: NodeId, row: usize, col: usize) -> Option<NodeId> {
    doc.child(doc.child(table, row)?, col)
}

/// The cell holding the selection start, if any.
pub fn current_cell(doc: &Doc, selection: &Selection) -> Option<NodeId> {
    let range = selection.range(doc);
    doc.enclosing_cell(doc.element_of(range.start))
}

pub fn insert_row(doc: &mut Doc, cell: NodeId, above: bool) -> Option<Selection> {
    let (row, _, _) = locate(doc, cell)?;
    let width = doc.children(row).len();
    let new_row = doc.create(NodeKind::Row);
    for _ in 0..width {
        let blank = blank_cell(doc);
        doc.append_child(new_row, blank);
    }
    if above {
        doc.insert_before(row, new_row);
    } else {
        doc.insert_after(row, new_row);
    }
    Some(Selection::caret(cell, 0))
}

pub fn insert_column(doc: &mut Doc, cell: NodeId, left: bool) -> Option<Selection> {
    let (_, table, col) = locate(doc, cell)?;
    let rows = doc.children(table).to_vec();
    if rows.iter().any(|r| doc.child(*r, col).is_none()) {
        debug!(col, "ragged table; column insert refused");
        return None;
    }
    let at = if left { col } else { col + 1 };
    for row in rows {
        let blank = blank_cell(doc);
        doc.insert_child(row, at, blank);
    }
    Some(Selection::caret(cell, 0))
}

pub fn delete_row(doc: &mut Doc, cell: NodeId, policy: DegenerateTablePolicy) -> Option<Selection> {
    let (row, table, col) = locate(doc, cell)?;
    let row_count = doc.children(table).len();
    if row_count == 1 {
        return degenerate(doc, table, policy);
    }
    let index = doc.index_in_parent(row)?;
    doc.detach(row);
    let neighbour_row = doc.child(table, index.min(row_count - 2))?;
    let width = doc.children(neighbour_row).len();
    let neighbour = doc.child(neighbour_row, col.min(width.saturating_sub(1)))?;
    Some(Selection::caret(neighbour, 0))
}

pub fn delete_column(doc: &mut Doc, cell: NodeId, policy: DegenerateTablePolicy) -> Option<Selection> {
    let (row, table, col) = locate(doc, cell)?;
    let rows = doc.children(table).to_vec();
    if rows.iter().any(|r| doc.child(*r, col).is_none()) {
        debug!(col, "ragged table; column delete refused");
        return None;
    }
    if doc.children(row).len() == 1 {
        return degenerate(doc, table, policy);
    }
    for r in &rows {
        if let Some(c) = doc.child(*r, col) {
            doc.detach(c);
        }
    }
    let width = doc.children(row).len();
    let neighbour = doc.child(row, col.min(width - 1))?;
    Some(Selection::caret(neighbour, 0))
}

pub fn delete_table(doc: &mut Doc, cell: NodeId) -> Option<Selection> {
    let (_, table, _) = locate(doc, cell)?;
    remove_table(doc, table)
}

fn degenerate(doc: &mut Doc, table: NodeId, policy: DegenerateTablePolicy) -> Option<Selection> {
    match policy {
        DegenerateTablePolicy::RemoveTable => remove_table(doc, table),
        DegenerateTablePolicy::KeepLast => {
            debug!("refusing to delete the last row or column");
            None
        }
    }
}

fn remove_table(doc: &mut Doc, table: NodeId) -> Option<Selection> {
    let parent = doc.parent(table)?;
    let index = doc.index_in_parent(table)?;
    doc.detach(table);
    doc.ensure_not_empty(parent);
    let target = doc.child(parent, index).or_else(|| index.checked_sub(1).and_then(|i| doc.child(parent, i)));
    Some(match target {
        Some(node) => Selection::collapsed(doc.start_of_content(node)),
        None => Selection::caret(parent, 0),
    })
}
