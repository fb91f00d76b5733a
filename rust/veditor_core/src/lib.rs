pub mod block;
pub mod config;
pub mod doc;
pub mod error;
pub mod image;
pub mod import_export;
pub mod inline;
pub mod list;
pub mod selection;
pub mod table;

use std::fmt;

use tracing::{debug, trace};

pub use block::{BlockContent, BoxVariant};
pub use config::{DegenerateTablePolicy, EditorConfig};
pub use doc::{BlockKind, Doc, InlineKind, ListKind, NodeId, NodeKind};
pub use error::EditorError;
pub use image::{ImageUploader, UploadedImage};
pub use inline::Alignment;
pub use selection::{Position, Selection};
pub use table::PendingTable;

type ChangeListener = Box<dyn FnMut(&str)>;

/// Detached nodes tolerated in the arena before a commit compacts it.
const RECLAIM_AFTER: usize = 256;

/// One editing session: the document, the live selection and the change
/// listener. Every mutating method returns whether the document changed; the
/// listener is called with the serialized markup exactly when it did.
///
/// Node ids stay valid until a commit reclaims detached nodes; the session's
/// own selection is translated when that happens.
pub struct EditorCore {
    pub doc: Doc,
    selection: Option<Selection>,
    config: EditorConfig,
    on_change: Option<ChangeListener>,
}

impl fmt::Debug for EditorCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorCore")
            .field("doc", &self.doc)
            .field("selection", &self.selection)
            .field("config", &self.config)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl Default for EditorCore {
    fn default() -> Self { Self::new_empty() }
}

impl EditorCore {
    pub fn new_empty() -> Self { Self::with_config(EditorConfig::default()) }

    /// Fresh session with the caret in the placeholder paragraph.
    pub fn with_config(config: EditorConfig) -> Self {
        let doc = Doc::new_empty();
        let selection = doc.first_child(doc.root()).map(|p| Selection::caret(p, 0));
        Self { doc, selection, config, on_change: None }
    }

    pub fn from_html(markup: &str) -> Self {
        let mut core = Self::new_empty();
        core.replace_document(import_export::from_html(markup));
        core
    }

    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        let mut core = Self::new_empty();
        core.replace_document(import_export::from_json(json)?);
        Ok(core)
    }

    pub fn to_json(&self) -> String { import_export::to_json(&self.doc) }
    pub fn to_html(&self) -> String { import_export::to_html(&self.doc) }
    pub fn config(&self) -> &EditorConfig { &self.config }
    pub fn set_config(&mut self, config: EditorConfig) { self.config = config; }

    pub fn set_on_change(&mut self, listener: impl FnMut(&str) + 'static) {
        self.on_change = Some(Box::new(listener));
    }

    pub fn selection(&self) -> Option<Selection> { self.selection }

    /// Host-reported selection; `None` when focus left the editor.
    pub fn set_selection(&mut self, selection: Option<Selection>) { self.selection = selection; }

    /// External value sync. Differing markup replaces the document and moves the
    /// caret to its end; the listener is not called for it.
    pub fn set_value(&mut self, markup: &str) -> bool {
        if markup == self.to_html() {
            return false;
        }
        self.replace_document(import_export::from_html(markup));
        true
    }

    fn replace_document(&mut self, doc: Doc) {
        self.doc = doc;
        self.selection = Some(match self.doc.last_child(self.doc.root()) {
            Some(last) => Selection::collapsed(Position::end_of(&self.doc, last)),
            None => Selection::caret(self.doc.root(), 0),
        });
    }

    fn usable_selection(&self) -> Option<Selection> {
        let selection = self.selection.filter(|s| self.doc.is_valid_selection(s));
        if selection.is_none() {
            debug!("no usable selection; edit ignored");
        }
        selection
    }

    fn commit(&mut self, next: Option<Selection>) -> bool {
        let Some(next) = next else {
            return false;
        };
        self.selection = Some(next);
        self.reclaim();
        self.notify();
        true
    }

    fn reclaim(&mut self) {
        let garbage = self.doc.detached_count();
        if garbage < RECLAIM_AFTER || garbage < self.doc.node_count() - garbage {
            return;
        }
        let map = self.doc.compact();
        trace!(garbage, nodes = self.doc.node_count(), "compacted document arena");
        let translate = |p: Position| map.get(p.node).map(|node| Position::new(node, p.offset));
        self.selection = self
            .selection
            .and_then(|s| Some(Selection::new(translate(s.anchor)?, translate(s.focus)?)));
    }

    fn notify(&mut self) {
        if let Some(listener) = self.on_change.as_mut() {
            let markup = import_export::to_html(&self.doc);
            trace!(bytes = markup.len(), "notifying change listener");
            listener(&markup);
        }
    }

    fn edit(&mut self, op: impl FnOnce(&mut Doc, &Selection, &EditorConfig) -> Option<Selection>) -> bool {
        let Some(selection) = self.usable_selection() else {
            return false;
        };
        let next = op(&mut self.doc, &selection, &self.config);
        self.commit(next)
    }

    // Block structure
    pub fn convert_block_type(&mut self, kind: BlockKind) -> bool {
        self.edit(|doc, sel, _| block::convert_block_type(doc, sel, kind))
    }
    pub fn split_on_line_break(&mut self, shift_held: bool) -> bool {
        self.edit(|doc, sel, _| block::split_on_line_break(doc, sel, shift_held))
    }
    pub fn insert_horizontal_rule(&mut self) -> bool {
        self.edit(|doc, sel, _| block::insert_block_content(doc, sel, &BlockContent::HorizontalRule))
    }
    pub fn insert_custom_box(&mut self, variant: BoxVariant) -> bool {
        self.edit(|doc, sel, _| block::insert_block_content(doc, sel, &BlockContent::CustomBox(variant)))
    }

    // Inline formatting
    pub fn toggle_inline(&mut self, kind: InlineKind) -> bool {
        self.edit(|doc, sel, _| inline::toggle_inline(doc, sel, kind))
    }
    pub fn apply_style_property(&mut self, property: &str, value: &str) -> bool {
        self.edit(|doc, sel, _| inline::apply_style_property(doc, sel, property, value))
    }
    pub fn set_text_color(&mut self, color: &str) -> bool { self.apply_style_property("color", color) }
    pub fn set_background_color(&mut self, color: &str) -> bool { self.apply_style_property("background-color", color) }
    pub fn align_block(&mut self, alignment: Alignment) -> bool {
        self.edit(|doc, sel, _| inline::align_block(doc, sel, alignment))
    }
    pub fn insert_link(&mut self, url: &str) -> bool {
        self.edit(|doc, sel, cfg| inline::insert_link(doc, sel, cfg, url))
    }

    // Lists
    pub fn toggle_list(&mut self, kind: ListKind) -> bool {
        self.edit(|doc, sel, _| list::toggle_list(doc, sel, kind))
    }

    // Tables
    pub fn insert_table(&mut self, rows: usize, cols: usize) -> bool {
        match self.begin_table_insert(rows, cols) {
            Some(pending) => {
                self.finish_table_insert(pending);
                true
            }
            None => false,
        }
    }

    /// First half of a table insertion: the table is in the tree but the caret
    /// has not moved and the listener has not been called yet.
    pub fn begin_table_insert(&mut self, rows: usize, cols: usize) -> Option<PendingTable> {
        let selection = self.usable_selection()?;
        table::prepare_table_insert(&mut self.doc, &selection, rows, cols)
    }

    /// Focuses the first cell and reports the change made by
    /// [`EditorCore::begin_table_insert`]. Returns false when the table was
    /// removed in between; the listener still hears about the tree change.
    pub fn finish_table_insert(&mut self, pending: PendingTable) -> bool {
        let next = table::finalize_table_selection(&self.doc, pending);
        if let Some(next) = next {
            self.selection = Some(next);
        }
        self.notify();
        next.is_some()
    }

    pub fn current_cell(&self) -> Option<NodeId> {
        self.usable_selection().and_then(|s| table::current_cell(&self.doc, &s))
    }

    fn edit_cell(&mut self, op: impl FnOnce(&mut Doc, NodeId, &EditorConfig) -> Option<Selection>) -> bool {
        let Some(cell) = self.current_cell() else {
            debug!("caret is not in a table cell");
            return false;
        };
        let next = op(&mut self.doc, cell, &self.config);
        self.commit(next)
    }

    pub fn insert_row(&mut self, above: bool) -> bool {
        self.edit_cell(|doc, cell, _| table::insert_row(doc, cell, above))
    }
    pub fn insert_column(&mut self, left: bool) -> bool {
        self.edit_cell(|doc, cell, _| table::insert_column(doc, cell, left))
    }
    pub fn delete_row(&mut self) -> bool {
        self.edit_cell(|doc, cell, cfg| table::delete_row(doc, cell, cfg.degenerate_table))
    }
    pub fn delete_column(&mut self) -> bool {
        self.edit_cell(|doc, cell, cfg| table::delete_column(doc, cell, cfg.degenerate_table))
    }
    pub fn delete_table(&mut self) -> bool {
        self.edit_cell(|doc, cell, _| table::delete_table(doc, cell))
    }

    // Images
    /// Inserts an uploaded image at the selection current at call time, or at
    /// the end of the document when the editor has no selection.
    pub fn insert_image(&mut self, url: &str) -> bool {
        let selection = self.selection.filter(|s| self.doc.is_valid_selection(s));
        let next = image::insert_image(&mut self.doc, selection.as_ref(), &self.config, url);
        self.commit(next)
    }

    pub fn resize_image(&mut self, image: NodeId, percent: u8) -> bool {
        if !image::resize_image(&mut self.doc, image, percent) {
            return false;
        }
        self.notify();
        true
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording(core: &mut EditorCore) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        core.set_on_change(move |markup| sink.borrow_mut().push(markup.to_string()));
        seen
    }

    #[test]
    fn new_session_has_caret_in_placeholder() {
        let core = EditorCore::new_empty();
        let p = core.doc.first_child(core.doc.root()).unwrap();
        assert_eq!(core.selection(), Some(Selection::caret(p, 0)));
    }

    #[test]
    fn listener_fires_once_per_change() {
        let mut core = EditorCore::from_html("<p>abc</p>");
        let seen = recording(&mut core);
        assert!(core.convert_block_type(BlockKind::heading(1)));
        assert_eq!(seen.borrow().as_slice(), ["<h1>abc</h1>".to_string()]);
    }

    #[test]
    fn declined_edits_stay_silent() {
        let mut core = EditorCore::from_html("<p>abc</p>");
        let seen = recording(&mut core);
        assert!(!core.toggle_inline(InlineKind::Bold));
        assert!(!core.delete_row());
        core.set_selection(None);
        assert!(!core.toggle_list(ListKind::Ordered));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn stale_selection_is_ignored() {
        let mut core = EditorCore::from_html("<p>abc</p>");
        core.set_selection(Some(Selection::caret(NodeId::from_raw(999), 0)));
        assert!(!core.split_on_line_break(false));
        assert_eq!(core.to_html(), "<p>abc</p>");
    }

    #[test]
    fn set_value_replaces_document_without_notifying() {
        let mut core = EditorCore::new_empty();
        let seen = recording(&mut core);
        assert!(core.set_value("<p>one</p><p>two</p>"));
        assert!(!core.set_value("<p>one</p><p>two</p>"));
        assert!(seen.borrow().is_empty());
        let last = core.doc.last_child(core.doc.root()).unwrap();
        assert_eq!(core.selection(), Some(Selection::caret(last, 1)));
    }

    #[test]
    fn table_insert_can_be_split_in_two_phases() {
        let mut core = EditorCore::new_empty();
        let seen = recording(&mut core);
        let pending = core.begin_table_insert(1, 2).unwrap();
        assert!(seen.borrow().is_empty());
        assert!(core.finish_table_insert(pending));
        assert_eq!(seen.borrow().len(), 1);
        assert!(core.current_cell().is_some());
        assert!(core.insert_column(true));
        assert!(core.to_html().starts_with("<table class=\"etable\"><tr><td>&nbsp;</td><td>&nbsp;</td><td>&nbsp;</td></tr></table>"));
    }

    #[test]
    fn image_without_selection_lands_at_end() {
        let mut core = EditorCore::from_html("<p>a</p>");
        core.set_selection(None);
        assert!(core.insert_image("x.png"));
        assert!(core.to_html().ends_with("<img src=\"x.png\" alt=\"Inserted image\" style=\"max-width: 100%;\">"));
    }

    #[test]
    fn repeated_edits_do_not_grow_the_document() {
        let mut core = EditorCore::from_html("<p>hello world</p>");
        let json = core.to_json();
        for _ in 0..200 {
            assert!(core.toggle_list(ListKind::Unordered));
            assert!(core.toggle_list(ListKind::Unordered));
        }
        assert_eq!(core.to_html(), "<p>hello world</p>");
        assert_eq!(core.to_json(), json);
        assert!(core.doc.node_count() < RECLAIM_AFTER + 16);
        assert!(core.selection().is_some_and(|s| core.doc.is_valid_selection(&s)));
    }

    #[test]
    fn json_round_trip_restores_session() {
        let core = EditorCore::from_html("<ul><li>a</li></ul>");
        let restored = EditorCore::from_json(&core.to_json()).unwrap();
        assert_eq!(restored.to_html(), core.to_html());
        assert!(EditorCore::from_json("not json").is_err());
    }
}
