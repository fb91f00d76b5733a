//! Block-structure engine: block type conversion, Enter handling and insertion
//! of block-level content next to the caret.

use tracing::debug;

use crate::doc::{BlockKind, Doc, NodeId, NodeKind, Style, PLACEHOLDER};
use crate::list;
use crate::selection::{Position, Selection};

/// Styled callout boxes offered by the toolbar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoxVariant {
    Info,
    Warning,
    Success,
    /// Any other class name; rendered without colors.
    Custom(String),
}

impl BoxVariant {
    pub fn from_class(class: &str) -> Self {
        match class {
            "infoBox" => BoxVariant::Info,
            "warningBox" => BoxVariant::Warning,
            "successBox" => BoxVariant::Success,
            other => BoxVariant::Custom(other.to_string()),
        }
    }

    pub fn class(&self) -> &str {
        match self {
            BoxVariant::Info => "infoBox",
            BoxVariant::Warning => "warningBox",
            BoxVariant::Success => "successBox",
            BoxVariant::Custom(class) => class,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BoxVariant::Info => "Info Box",
            BoxVariant::Warning => "Warning Box",
            BoxVariant::Success => "Success Box",
            BoxVariant::Custom(_) => "Custom Box",
        }
    }

    pub fn style(&self) -> Style {
        let base = Style::new().with("padding", "10px").with("margin", "10px 0").with("border-radius", "4px");
        let colors = match self {
            BoxVariant::Info => Some(("#e7f3fe", "1px solid #b3d7ff")),
            BoxVariant::Warning => Some(("#fff3cd", "1px solid #ffeeba")),
            BoxVariant::Success => Some(("#d4edda", "1px solid #c3e6cb")),
            BoxVariant::Custom(_) => None,
        };
        match colors {
            Some((background, border)) => base.with("background-color", background).with("border", border),
            None => base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockContent {
    HorizontalRule,
    CustomBox(BoxVariant),
}

/// Turns the caret's paragraph or heading into `target`. Outside of any
/// convertible block the selected text is wrapped into a new block instead.
pub fn convert_block_type(doc: &mut Doc, selection: &Selection, target: BlockKind) -> Option<Selection> {
    if !target.is_convertible() {
        debug!(?target, "block conversion only targets paragraphs and headings");
        return None;
    }
    let range = selection.range(doc);
    if let Some(block) = doc.enclosing_convertible(range.start.node) {
        *doc.kind_mut(block) = NodeKind::block(target);
        return Some(Selection::collapsed(Position::end_of(doc, block)));
    }

    let text = doc.range_text(&range);
    let text = if text.is_empty() { PLACEHOLDER.to_string() } else { text };
    let wrapper = doc.create(NodeKind::block(target));
    let leaf = doc.create_text(text);
    doc.append_child(wrapper, leaf);
    let after = doc.replace_range(&range, wrapper)?;
    Some(Selection::collapsed(after))
}

/// Enter handling. Shift inserts a line break; inside a list item the list
/// engine decides; everywhere else a fresh paragraph follows the current block.
pub fn split_on_line_break(doc: &mut Doc, selection: &Selection, shift_held: bool) -> Option<Selection> {
    let range = selection.range(doc);
    if shift_held {
        let br = doc.create(NodeKind::LineBreak);
        let after = doc.insert_node(range.start, br)?;
        return Some(Selection::collapsed(after));
    }

    let element = doc.element_of(range.start);
    if let Some(item) = doc.enclosing_list_item(element) {
        return list::split_list_item(doc, item);
    }

    let paragraph = doc.create_placeholder_block(BlockKind::Paragraph);
    match doc.enclosing_block(element) {
        Some(block) => {
            doc.insert_after(block, paragraph);
        }
        None => {
            doc.replace_range(&range, paragraph)?;
        }
    }
    Some(Selection::caret(paragraph, 0))
}

pub fn create_custom_box(doc: &mut Doc, variant: &BoxVariant) -> NodeId {
    let node = doc.create(NodeKind::Block {
        kind: BlockKind::CustomBox(variant.class().to_string()),
        style: variant.style(),
    });
    let label = doc.create_text(variant.label());
    doc.append_child(node, label);
    node
}

/// Places a rule or box after the block holding the selection end, or at the
/// caret when there is no such block.
pub fn insert_block_content(doc: &mut Doc, selection: &Selection, content: &BlockContent) -> Option<Selection> {
    let mut range = selection.range(doc);
    range.collapse_to_end();

    let node = match content {
        BlockContent::HorizontalRule => doc.create(NodeKind::HorizontalRule),
        BlockContent::CustomBox(variant) => create_custom_box(doc, variant),
    };
    match doc.enclosing_block(doc.element_of(range.end)) {
        Some(block) => {
            doc.insert_after(block, node);
        }
        None => {
            doc.insert_node(range.start, node)?;
        }
    }

    match content {
        BlockContent::HorizontalRule => {
            let paragraph = doc.create_placeholder_block(BlockKind::Paragraph);
            doc.insert_after(node, paragraph);
            Some(Selection::caret(paragraph, 0))
        }
        BlockContent::CustomBox(_) => Position::after(doc, node).map(Selection::collapsed),
    }
}
