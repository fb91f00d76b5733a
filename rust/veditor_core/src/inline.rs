//! Inline-formatting engine: wrapper toggles, style properties, alignment and links.

use tracing::debug;

use crate::config::EditorConfig;
use crate::doc::{Attributes, Doc, InlineKind, NodeId, NodeKind, Style, PLACEHOLDER};
use crate::selection::{Position, Range, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn as_css(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

/// Wraps the selection in `kind`, or removes the wrapper when both ends of the
/// selection already sit inside the same one.
pub fn toggle_inline(doc: &mut Doc, selection: &Selection, kind: InlineKind) -> Option<Selection> {
    if !kind.is_wrapper() {
        debug!(?kind, "not a wrapping inline kind");
        return None;
    }
    let range = selection.range(doc);
    let is_kind = move |k: &NodeKind| k.inline_kind() == Some(kind);
    let start_tag = doc.closest(range.start.node, is_kind);
    let end_tag = doc.closest(range.end.node, is_kind);

    if let (Some(tag), Some(other)) = (start_tag, end_tag) {
        if tag == other {
            let (parent, index, count) = doc.unwrap(tag)?;
            if doc.is_valid_selection(selection) {
                return Some(*selection);
            }
            return Some(Selection::new(Position::new(parent, index), Position::new(parent, index + count)));
        }
    }
    if range.is_collapsed() {
        debug!(tag = kind.tag(), "collapsed caret outside the wrapper; nothing to toggle");
        return None;
    }
    wrap_range(doc, range, &NodeKind::inline(kind), |_, _| {})
}

/// Sets a CSS property on the selection. A caret styles its enclosing block,
/// list item or span; a range inside an existing span updates that span; any
/// other range is wrapped in a new span.
pub fn apply_style_property(doc: &mut Doc, selection: &Selection, property: &str, value: &str) -> Option<Selection> {
    let range = selection.range(doc);
    if range.is_collapsed() {
        let Some(target) = doc.enclosing_styleable(range.start.node) else {
            debug!(property, "caret has no styleable ancestor");
            return None;
        };
        set_style(doc, target, property, value);
        return Some(*selection);
    }

    let common = doc.common_ancestor(range.start.node, range.end.node);
    let holder = doc.element_of(Position::new(common, 0));
    if is_span(doc.kind(holder)) {
        set_style(doc, holder, property, value);
        return Some(*selection);
    }

    let template = NodeKind::Inline {
        kind: InlineKind::Span,
        attrs: Attributes::new(),
        style: Style::new().with(property, value),
    };
    wrap_range(doc, range, &template, |doc, wrapper| flatten_matching_spans(doc, wrapper, property, value))
}

pub fn align_block(doc: &mut Doc, selection: &Selection, alignment: Alignment) -> Option<Selection> {
    let range = selection.range(doc);
    let Some(target) = doc.closest(range.start.node, |k| k.is_block() || k.is_list_item()) else {
        debug!(?alignment, "no block to align");
        return None;
    };
    set_style(doc, target, "text-align", alignment.as_css());
    Some(*selection)
}

/// Replaces the selection with an anchor to `url`, labelled with the selected
/// text or the url itself, and puts the caret after it.
pub fn insert_link(doc: &mut Doc, selection: &Selection, config: &EditorConfig, url: &str) -> Option<Selection> {
    let url = url.trim();
    if url.is_empty() {
        debug!("empty link url");
        return None;
    }
    let range = selection.range(doc);
    let selected = doc.range_text(&range).replace(PLACEHOLDER, "");
    let selected = selected.trim();
    let label = if selected.is_empty() { url.to_string() } else { selected.to_string() };

    let anchor = doc.create(NodeKind::Inline {
        kind: InlineKind::Anchor,
        attrs: Attributes::new()
            .with("href", url)
            .with("target", config.link_target.as_str())
            .with("rel", config.link_rel.as_str()),
        style: Style::new(),
    });
    let text = doc.create_text(label);
    doc.append_child(anchor, text);
    let after = doc.replace_range(&range, anchor)?;
    Some(Selection::collapsed(after))
}

fn is_span(kind: &NodeKind) -> bool { matches!(kind, NodeKind::Inline { kind: InlineKind::Span, .. }) }

fn set_style(doc: &mut Doc, node: NodeId, property: &str, value: &str) {
    if let Some(style) = doc.kind_mut(node).style_mut() {
        style.set(property, value);
    }
}

/// Nested spans that repeat the property being applied lose it; spans left
/// with nothing to carry are unwrapped.
fn flatten_matching_spans(doc: &mut Doc, wrapper: NodeId, property: &str, value: &str) {
    for node in doc.descendants(wrapper) {
        let NodeKind::Inline { kind: InlineKind::Span, attrs, style } = doc.kind_mut(node) else {
            continue;
        };
        if style.get(property) != Some(value) {
            continue;
        }
        style.remove(property);
        if style.is_empty() && attrs.is_empty() {
            doc.unwrap(node);
        }
    }
}

fn wrap_range(
    doc: &mut Doc,
    range: Range,
    template: &NodeKind,
    tidy: impl Fn(&mut Doc, NodeId),
) -> Option<Selection> {
    if doc.range_touches_blocks(&range) {
        return wrap_leaves(doc, range, template, tidy);
    }
    let mut range = range;
    let fragment = doc.extract_contents(&mut range);
    let wrapper = doc.create(template.clone());
    for node in fragment {
        doc.append_child(wrapper, node);
    }
    tidy(doc, wrapper);
    doc.insert_node(range.start, wrapper)?;
    Some(Selection::contents_of(doc, wrapper))
}

/// Multi-block variant: every run of adjacent selected inline leaves gets its
/// own wrapper so no inline element ever spans a block boundary.
fn wrap_leaves(doc: &mut Doc, range: Range, template: &NodeKind, tidy: impl Fn(&mut Doc, NodeId)) -> Option<Selection> {
    let mut leaves = Vec::new();
    for node in doc.nodes_in_range(&range) {
        let in_structure = doc
            .parent(node)
            .is_some_and(|p| matches!(doc.kind(p), NodeKind::List { .. } | NodeKind::Table | NodeKind::Row));
        if in_structure {
            continue;
        }
        match doc.kind(node) {
            NodeKind::Text { .. } => {
                let (from, to) = doc.selected_chars(node, &range);
                if from >= to {
                    continue;
                }
                if to < doc.node_len(node) {
                    doc.split_text(node, to);
                }
                let leaf = if from > 0 { doc.split_text(node, from)? } else { node };
                leaves.push(leaf);
            }
            NodeKind::LineBreak | NodeKind::Inline { kind: InlineKind::Image, .. } => leaves.push(node),
            _ => {}
        }
    }

    let mut wrappers = Vec::new();
    let mut current: Option<NodeId> = None;
    for leaf in leaves {
        let continues = current.is_some_and(|w| doc.next_sibling(w) == Some(leaf));
        let wrapper = match current {
            Some(w) if continues => w,
            _ => {
                let w = doc.create(template.clone());
                doc.insert_before(leaf, w);
                wrappers.push(w);
                current = Some(w);
                w
            }
        };
        doc.append_child(wrapper, leaf);
    }
    for wrapper in &wrappers {
        tidy(doc, *wrapper);
    }
    let (first, last) = (*wrappers.first()?, *wrappers.last()?);
    Some(Selection::new(Position::new(first, 0), Position::end_of(doc, last)))
}
