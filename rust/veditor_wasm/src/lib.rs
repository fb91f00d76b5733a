use wasm_bindgen::prelude::*;
use veditor_core::{
    Alignment, BlockKind, BoxVariant, EditorCore, InlineKind, ListKind, NodeId, Position, Selection,
};

/// Browser-facing handle. Mutating calls return whether the document changed;
/// the host reads `to_html` afterwards to feed its own change handler.
#[wasm_bindgen]
pub struct Editor {
    core: EditorCore,
}

#[wasm_bindgen]
impl Editor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Editor {
        Editor { core: EditorCore::new_empty() }
    }

    pub fn new_empty() -> Editor { Self::new() }

    pub fn from_html(markup: String) -> Editor {
        Editor { core: EditorCore::from_html(&markup) }
    }

    pub fn from_json(json: String) -> Editor {
        let core = EditorCore::from_json(&json).unwrap_or_else(|_| EditorCore::new_empty());
        Editor { core }
    }

    pub fn to_json(&self) -> String { self.core.to_json() }
    pub fn to_html(&self) -> String { self.core.to_html() }
    pub fn set_value(&mut self, markup: String) -> bool { self.core.set_value(&markup) }

    // Selection
    pub fn set_selection(&mut self, anchor_node: u32, anchor_offset: u32, focus_node: u32, focus_offset: u32) {
        let at = |node: u32, offset: u32| Position::new(NodeId::from_raw(node as usize), offset as usize);
        self.core.set_selection(Some(Selection::new(at(anchor_node, anchor_offset), at(focus_node, focus_offset))));
    }
    pub fn clear_selection(&mut self) { self.core.set_selection(None) }

    // Block structure; `tag` is "p" or "h1".."h6"
    pub fn convert_block_type(&mut self, tag: String) -> bool {
        match BlockKind::from_tag(&tag) {
            Some(kind) => self.core.convert_block_type(kind),
            None => false,
        }
    }
    pub fn split_on_line_break(&mut self, shift_held: bool) -> bool { self.core.split_on_line_break(shift_held) }
    pub fn insert_horizontal_rule(&mut self) -> bool { self.core.insert_horizontal_rule() }
    pub fn insert_custom_box(&mut self, class: String) -> bool { self.core.insert_custom_box(BoxVariant::from_class(&class)) }

    // Inline formatting; `tag` is "strong", "em" or "u"
    pub fn toggle_inline(&mut self, tag: String) -> bool {
        match InlineKind::from_tag(&tag) {
            Some(kind) => self.core.toggle_inline(kind),
            None => false,
        }
    }
    pub fn set_text_color(&mut self, color: String) -> bool { self.core.set_text_color(&color) }
    pub fn set_background_color(&mut self, color: String) -> bool { self.core.set_background_color(&color) }
    pub fn align(&mut self, alignment: String) -> bool {
        match Alignment::from_name(&alignment) {
            Some(alignment) => self.core.align_block(alignment),
            None => false,
        }
    }
    pub fn insert_link(&mut self, url: String) -> bool { self.core.insert_link(&url) }

    // Lists; `tag` is "ul" or "ol"
    pub fn toggle_list(&mut self, tag: String) -> bool {
        match ListKind::from_tag(&tag) {
            Some(kind) => self.core.toggle_list(kind),
            None => false,
        }
    }

    // Table ops, relative to the cell holding the caret
    pub fn insert_table(&mut self, rows: u32, cols: u32) -> bool { self.core.insert_table(rows as usize, cols as usize) }
    pub fn insert_row(&mut self, above: bool) -> bool { self.core.insert_row(above) }
    pub fn insert_column(&mut self, left: bool) -> bool { self.core.insert_column(left) }
    pub fn delete_row(&mut self) -> bool { self.core.delete_row() }
    pub fn delete_column(&mut self) -> bool { self.core.delete_column() }
    pub fn delete_table(&mut self) -> bool { self.core.delete_table() }

    // Images
    pub fn insert_image(&mut self, url: String) -> bool { self.core.insert_image(&url) }
    pub fn resize_image(&mut self, image_node: u32, percent: u8) -> bool {
        self.core.resize_image(NodeId::from_raw(image_node as usize), percent)
    }
}

impl Default for Editor {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn wasm_sanity() {
        let mut e = Editor::new_empty();
        assert!(e.insert_table(2, 3));
        assert!(e.to_html().contains("<table class=\"etable\">"));
        assert!(!e.toggle_list("dl".to_string()));
    }
}
