//! Document tree structures and helpers.
//!
//! The tree is an arena: every node lives in `Doc::nodes` and is addressed by a
//! [`NodeId`]. Structural edits are explicit detach/attach operations; a node
//! that is detached stays in the arena but is unreachable from the root.

use serde::{Deserialize, Serialize};

/// Zero-width stand-in that keeps an editable region addressable.
pub const PLACEHOLDER: char = '\u{200B}';
/// Content of a freshly created table cell.
pub const CELL_BLANK: char = '\u{00A0}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn from_raw(raw: usize) -> Self { NodeId(raw) }
    pub fn raw(self) -> usize { self.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineKind {
    Bold,
    Italic,
    Underline,
    Span,
    Anchor,
    Image,
}

impl InlineKind {
    pub fn tag(self) -> &'static str {
        match self {
            InlineKind::Bold => "strong",
            InlineKind::Italic => "em",
            InlineKind::Underline => "u",
            InlineKind::Span => "span",
            InlineKind::Anchor => "a",
            InlineKind::Image => "img",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "strong" | "b" => Some(InlineKind::Bold),
            "em" | "i" => Some(InlineKind::Italic),
            "u" => Some(InlineKind::Underline),
            "span" => Some(InlineKind::Span),
            "a" => Some(InlineKind::Anchor),
            "img" => Some(InlineKind::Image),
            _ => None,
        }
    }

    /// Kinds that can wrap a selection; images are leaves.
    pub fn is_wrapper(self) -> bool { self != InlineKind::Image }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    Container,
    /// `div` carrying a variant class, e.g. `infoBox`.
    CustomBox(String),
}

impl BlockKind {
    pub fn heading(level: u8) -> Self { BlockKind::Heading(level.clamp(1, 6)) }

    /// Paragraphs and headings are the only kinds a block-type conversion targets.
    pub fn is_convertible(&self) -> bool {
        matches!(self, BlockKind::Paragraph | BlockKind::Heading(_))
    }

    pub fn tag(&self) -> String {
        match self {
            BlockKind::Paragraph => "p".to_string(),
            BlockKind::Heading(level) => format!("h{}", (*level).clamp(1, 6)),
            BlockKind::Container | BlockKind::CustomBox(_) => "div".to_string(),
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "p" => Some(BlockKind::Paragraph),
            "div" => Some(BlockKind::Container),
            _ => {
                let level = tag.strip_prefix('h')?.parse::<u8>().ok()?;
                (1..=6).contains(&level).then_some(BlockKind::Heading(level))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    pub fn tag(self) -> &'static str {
        match self {
            ListKind::Ordered => "ol",
            ListKind::Unordered => "ul",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ol" => Some(ListKind::Ordered),
            "ul" => Some(ListKind::Unordered),
            _ => None,
        }
    }
}

/// Ordered name/value map used for both CSS-like styles and element attributes.
/// Insertion order is kept so serialized markup is stable across edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(Vec<(String, String)>);

pub type Style = PropertyMap;
pub type Attributes = PropertyMap;

impl PropertyMap {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k == name)?;
        Some(self.0.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serializes as a CSS declaration list: `color: red; text-align: center;`.
    pub fn to_css(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}: {};", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Lenient inverse of [`PropertyMap::to_css`]; declarations without a colon are dropped.
    pub fn parse_css(css: &str) -> Self {
        let mut map = PropertyMap::new();
        for decl in css.split(';') {
            if let Some((name, value)) = decl.split_once(':') {
                let name = name.trim().to_ascii_lowercase();
                let value = value.trim();
                if !name.is_empty() && !value.is_empty() {
                    map.set(name, value);
                }
            }
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Root,
    Text { text: String },
    LineBreak,
    Inline {
        kind: InlineKind,
        #[serde(default)]
        attrs: Attributes,
        #[serde(default)]
        style: Style,
    },
    Block {
        kind: BlockKind,
        #[serde(default)]
        style: Style,
    },
    List { kind: ListKind },
    ListItem {
        #[serde(default)]
        style: Style,
    },
    Table,
    Row,
    Cell,
    HorizontalRule,
}

impl NodeKind {
    pub fn block(kind: BlockKind) -> Self { NodeKind::Block { kind, style: Style::new() } }
    pub fn paragraph() -> Self { Self::block(BlockKind::Paragraph) }
    pub fn list_item() -> Self { NodeKind::ListItem { style: Style::new() } }

    pub fn inline(kind: InlineKind) -> Self {
        NodeKind::Inline { kind, attrs: Attributes::new(), style: Style::new() }
    }

    pub fn is_text(&self) -> bool { matches!(self, NodeKind::Text { .. }) }
    pub fn is_block(&self) -> bool { matches!(self, NodeKind::Block { .. }) }
    pub fn is_list(&self) -> bool { matches!(self, NodeKind::List { .. }) }
    pub fn is_list_item(&self) -> bool { matches!(self, NodeKind::ListItem { .. }) }
    pub fn is_cell(&self) -> bool { matches!(self, NodeKind::Cell) }
    pub fn is_root(&self) -> bool { matches!(self, NodeKind::Root) }

    pub fn is_convertible(&self) -> bool {
        matches!(self, NodeKind::Block { kind, .. } if kind.is_convertible())
    }

    /// Anything that lays out as its own box rather than flowing inline.
    pub fn is_block_level(&self) -> bool {
        matches!(
            self,
            NodeKind::Block { .. }
                | NodeKind::List { .. }
                | NodeKind::ListItem { .. }
                | NodeKind::Table
                | NodeKind::Row
                | NodeKind::Cell
                | NodeKind::HorizontalRule
        )
    }

    pub fn can_have_children(&self) -> bool {
        !matches!(
            self,
            NodeKind::Text { .. }
                | NodeKind::LineBreak
                | NodeKind::HorizontalRule
                | NodeKind::Inline { kind: InlineKind::Image, .. }
        )
    }

    pub fn block_kind(&self) -> Option<&BlockKind> {
        match self {
            NodeKind::Block { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn inline_kind(&self) -> Option<InlineKind> {
        match self {
            NodeKind::Inline { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn style(&self) -> Option<&Style> {
        match self {
            NodeKind::Inline { style, .. } | NodeKind::Block { style, .. } | NodeKind::ListItem { style } => Some(style),
            _ => None,
        }
    }

    pub fn style_mut(&mut self) -> Option<&mut Style> {
        match self {
            NodeKind::Inline { style, .. } | NodeKind::Block { style, .. } | NodeKind::ListItem { style } => Some(style),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub kind: NodeKind,
    parent: Option<NodeId>,
    #[serde(default)]
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doc {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Default for Doc {
    fn default() -> Self { Self::new_empty() }
}

impl Doc {
    /// A bare root with no children.
    pub fn new() -> Self {
        Doc {
            nodes: vec![NodeData { kind: NodeKind::Root, parent: None, children: Vec::new() }],
            root: NodeId(0),
        }
    }

    /// The initial editing state: one placeholder paragraph.
    pub fn new_empty() -> Self {
        let mut doc = Doc::new();
        let p = doc.create_placeholder_block(BlockKind::Paragraph);
        doc.append_child(doc.root, p);
        doc
    }

    pub fn root(&self) -> NodeId { self.root }

    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData { kind, parent: None, children: Vec::new() });
        NodeId(self.nodes.len() - 1)
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.create(NodeKind::Text { text: text.into() })
    }

    /// A block of `kind` holding a single placeholder text leaf.
    pub fn create_placeholder_block(&mut self, kind: BlockKind) -> NodeId {
        let block = self.create(NodeKind::block(kind));
        let text = self.create_text(PLACEHOLDER.to_string());
        self.append_child(block, text);
        block
    }

    pub fn contains(&self, id: NodeId) -> bool { id.0 < self.nodes.len() }
    /// Arena size, detached nodes included.
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn get(&self, id: NodeId) -> Option<&NodeData> { self.nodes.get(id.0) }
    pub fn kind(&self, id: NodeId) -> &NodeKind { &self.nodes[id.0].kind }
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind { &mut self.nodes[id.0].kind }
    pub fn parent(&self, id: NodeId) -> Option<NodeId> { self.nodes.get(id.0).and_then(|n| n.parent) }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> { self.children(id).get(index).copied() }
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> { self.children(id).first().copied() }
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> { self.children(id).last().copied() }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        self.child(parent, self.index_in_parent(id)? + 1)
    }

    /// Whether the node is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        id == self.root || self.ancestors(id).any(|a| a == self.root)
    }

    /// Proper ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors { doc: self, next: self.parent(id) }
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Nearest inclusive ancestor matching `pred`, never walking past the root.
    pub fn closest(&self, id: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .take_while(|n| *n != self.root)
            .find(|n| pred(self.kind(*n)))
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Inserts `child` at `index` of `parent` (clamped), detaching it from any previous parent first.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_child(parent, usize::MAX, child);
    }

    /// Returns false when `reference` has no parent.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> bool {
        self.detach(node);
        match (self.parent(reference), self.index_in_parent(reference)) {
            (Some(parent), Some(idx)) => {
                self.insert_child(parent, idx, node);
                true
            }
            _ => false,
        }
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> bool {
        self.detach(node);
        match (self.parent(reference), self.index_in_parent(reference)) {
            (Some(parent), Some(idx)) => {
                self.insert_child(parent, idx + 1, node);
                true
            }
            _ => false,
        }
    }

    pub fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        if !self.insert_before(old, new) {
            return false;
        }
        self.detach(old);
        true
    }

    /// Splices the children of `id` into its parent at its position and detaches it.
    /// Returns `(parent, index, spliced_count)`.
    pub fn unwrap(&mut self, id: NodeId) -> Option<(NodeId, usize, usize)> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(id)?;
        let children = std::mem::take(&mut self.nodes[id.0].children);
        let count = children.len();
        for (offset, child) in children.into_iter().enumerate() {
            self.nodes[child.0].parent = None;
            self.insert_child(parent, idx + offset, child);
        }
        self.detach(id);
        Some((parent, idx, count))
    }

    /// Appends every child of `from` to `to`, preserving order.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = std::mem::take(&mut self.nodes[from.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
            self.append_child(to, child);
        }
    }

    /// A detached copy of the node without its children.
    pub fn clone_shallow(&mut self, id: NodeId) -> NodeId {
        let kind = self.kind(id).clone();
        self.create(kind)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool { self.kind(id).is_text() }

    /// Characters for text leaves, children for everything else.
    pub fn node_len(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Text { text } => text.chars().count(),
            _ => self.children(id).len(),
        }
    }

    /// Splits a text leaf at a character offset, like `Text.splitText`. The tail is
    /// returned and, when the leaf is attached, inserted right after it.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let NodeKind::Text { text } = &mut self.nodes[id.0].kind else {
            return None;
        };
        let at = byte_offset(text, offset);
        let tail = text.split_off(at);
        let tail_id = self.create_text(tail);
        if self.parent(id).is_some() {
            self.insert_after(id, tail_id);
        }
        Some(tail_id)
    }

    /// Removes characters `from..to` of a text leaf and returns them.
    pub fn remove_text_range(&mut self, id: NodeId, from: usize, to: usize) -> String {
        let NodeKind::Text { text } = &mut self.nodes[id.0].kind else {
            return String::new();
        };
        let start = byte_offset(text, from);
        let end = byte_offset(text, to.max(from));
        text.drain(start..end).collect()
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text { text } => out.push_str(text),
            _ => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Whether the subtree holds no visible content: its text is whitespace or
    /// placeholders only and it contains no image, rule or table.
    pub fn is_blank(&self, id: NodeId) -> bool {
        let text = self.text_content(id);
        let text_blank = text.chars().all(|c| c == PLACEHOLDER || c.is_whitespace());
        text_blank
            && !self.descendants(id).into_iter().any(|d| {
                matches!(
                    self.kind(d),
                    NodeKind::Inline { kind: InlineKind::Image, .. } | NodeKind::HorizontalRule | NodeKind::Table
                )
            })
    }

    /// Proper descendants in document (pre-)order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Child indices from the root down to `id`; detached nodes yield the path to their own top.
    pub fn path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut node = id;
        while let Some(idx) = self.index_in_parent(node) {
            path.push(idx);
            node = match self.parent(node) {
                Some(p) => p,
                None => break,
            };
        }
        path.reverse();
        path
    }

    /// Root holds nothing, or a single paragraph with empty/placeholder text.
    pub fn is_effectively_empty(&self) -> bool {
        match self.children(self.root) {
            [] => true,
            [only] => {
                matches!(self.kind(*only), NodeKind::Block { kind: BlockKind::Paragraph, .. })
                    && self.text_content(*only).chars().all(|c| c == PLACEHOLDER)
                    && self.descendants(*only).iter().all(|d| self.is_text(*d))
            }
            _ => false,
        }
    }

    /// Drops every root child and leaves one placeholder paragraph, which is returned.
    pub fn reset_to_placeholder(&mut self) -> NodeId {
        for child in self.children(self.root).to_vec() {
            self.detach(child);
        }
        let p = self.create_placeholder_block(BlockKind::Paragraph);
        self.append_child(self.root, p);
        p
    }

    /// Ensures a container the engine just emptied still offers a caret target.
    pub fn ensure_not_empty(&mut self, container: NodeId) {
        if self.children(container).is_empty() {
            let p = self.create_placeholder_block(BlockKind::Paragraph);
            self.append_child(container, p);
        }
    }

    /// Consistency check for documents that did not come from the engine (e.g. JSON).
    /// Every node must be reachable from the root exactly once.
    pub fn validate(&self) -> Result<(), String> {
        if !self.contains(self.root) || !self.kind(self.root).is_root() {
            return Err("root node missing".to_string());
        }
        if let Some(parent) = self.parent(self.root) {
            return Err(format!("root claims parent {}", parent.0));
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.0], true) {
                return Err(format!("node {} reachable twice", id.0));
            }
            for child in self.children(id) {
                if !self.contains(*child) {
                    return Err(format!("node {} has dangling child {}", id.0, child.0));
                }
                if self.parent(*child) != Some(id) {
                    return Err(format!("node {} disagrees with its parent {}", child.0, id.0));
                }
                if !self.kind(id).can_have_children() {
                    return Err(format!("leaf node {} has children", id.0));
                }
                if self.kind(*child).is_root() {
                    return Err(format!("second root {} below node {}", child.0, id.0));
                }
                stack.push(*child);
            }
        }
        match seen.iter().position(|reached| !reached) {
            Some(orphan) => Err(format!("node {} is not reachable from the root", orphan)),
            None => Ok(()),
        }
    }

    /// Nodes left in the arena by earlier edits that the root no longer reaches.
    pub fn detached_count(&self) -> usize {
        self.nodes.len() - 1 - self.descendants(self.root).len()
    }

    /// Rebuilds the arena from the reachable nodes only, numbered in document
    /// order with the root first. Ids held from before are translated through
    /// the returned map.
    pub fn compact(&mut self) -> IdMap {
        let mut order = vec![self.root];
        order.extend(self.descendants(self.root));
        let mut map = vec![None; self.nodes.len()];
        for (new, old) in order.iter().enumerate() {
            map[old.0] = Some(NodeId(new));
        }
        let remap = |id: NodeId| map[id.0].unwrap_or(id);
        let nodes = order
            .iter()
            .map(|old| {
                let data = &self.nodes[old.0];
                NodeData {
                    kind: data.kind.clone(),
                    parent: data.parent.map(remap),
                    children: data.children.iter().copied().map(remap).collect(),
                }
            })
            .collect();
        self.nodes = nodes;
        self.root = NodeId(0);
        IdMap(map)
    }

    /// A compacted copy, as written out by exports.
    pub fn compacted(&self) -> Doc {
        let mut doc = self.clone();
        doc.compact();
        doc
    }
}

/// Old-to-new id translation produced by [`Doc::compact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMap(Vec<Option<NodeId>>);

impl IdMap {
    /// `None` for ids that were dropped or never existed.
    pub fn get(&self, old: NodeId) -> Option<NodeId> { self.0.get(old.0).copied().flatten() }
}

pub struct Ancestors<'a> {
    doc: &'a Doc,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

pub(crate) fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(b, _)| b).unwrap_or(s.len())
}
