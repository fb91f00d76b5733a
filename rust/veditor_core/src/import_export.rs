//! HTML and JSON import/export.
//!
//! Serialization is compact (no added whitespace) so the markup handed to the
//! change listener is stable. Parsing is lenient: malformed input is repaired
//! into a tree that satisfies the document invariants instead of being rejected.

use std::fmt::Write as _;

use tracing::{trace, warn};

use crate::doc::{
    Attributes, BlockKind, Doc, InlineKind, ListKind, NodeId, NodeKind, Style, CELL_BLANK,
};
use crate::error::EditorError;

pub fn to_html(doc: &Doc) -> String {
    let mut out = String::new();
    for child in doc.children(doc.root()) {
        write_node(doc, *child, &mut out);
    }
    out
}

fn write_node(doc: &Doc, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Root => write_children(doc, id, out),
        NodeKind::Text { text } => {
            let escaped = html_escape::encode_text(text);
            out.push_str(&escaped.replace(CELL_BLANK, "&nbsp;"));
        }
        NodeKind::LineBreak => out.push_str("<br>"),
        NodeKind::HorizontalRule => out.push_str("<hr>"),
        NodeKind::Inline { kind: InlineKind::Image, attrs, style } => {
            out.push_str("<img");
            write_attrs(out, attrs);
            write_style(out, style);
            out.push('>');
        }
        NodeKind::Inline { kind, attrs, style } => {
            let _ = write!(out, "<{}", kind.tag());
            write_attrs(out, attrs);
            write_style(out, style);
            out.push('>');
            write_children(doc, id, out);
            let _ = write!(out, "</{}>", kind.tag());
        }
        NodeKind::Block { kind, style } => {
            let tag = kind.tag();
            let _ = write!(out, "<{}", tag);
            if let BlockKind::CustomBox(class) = kind {
                let _ = write!(out, " class=\"{}\"", html_escape::encode_double_quoted_attribute(class));
            }
            write_style(out, style);
            out.push('>');
            write_children(doc, id, out);
            let _ = write!(out, "</{}>", tag);
        }
        NodeKind::List { kind } => {
            let _ = write!(out, "<{}>", kind.tag());
            write_children(doc, id, out);
            let _ = write!(out, "</{}>", kind.tag());
        }
        NodeKind::ListItem { style } => {
            out.push_str("<li");
            write_style(out, style);
            out.push('>');
            write_children(doc, id, out);
            out.push_str("</li>");
        }
        NodeKind::Table => {
            out.push_str("<table class=\"etable\">");
            write_children(doc, id, out);
            out.push_str("</table>");
        }
        NodeKind::Row => {
            out.push_str("<tr>");
            write_children(doc, id, out);
            out.push_str("</tr>");
        }
        NodeKind::Cell => {
            out.push_str("<td>");
            write_children(doc, id, out);
            out.push_str("</td>");
        }
    }
}

fn write_children(doc: &Doc, id: NodeId, out: &mut String) {
    for child in doc.children(id) {
        write_node(doc, *child, out);
    }
}

fn write_attrs(out: &mut String, attrs: &Attributes) {
    for (name, value) in attrs.iter() {
        let _ = write!(out, " {}=\"{}\"", name, html_escape::encode_double_quoted_attribute(value));
    }
}

fn write_style(out: &mut String, style: &Style) {
    if !style.is_empty() {
        let _ = write!(out, " style=\"{}\"", html_escape::encode_double_quoted_attribute(&style.to_css()));
    }
}

/// Serializes the reachable tree only; ids are renumbered in document order.
pub fn to_json(doc: &Doc) -> String {
    serde_json::to_string(&doc.compacted()).unwrap_or_else(|_| "{}".to_string())
}

pub fn from_json(json: &str) -> Result<Doc, EditorError> {
    let doc: Doc = serde_json::from_str(json)?;
    doc.validate().map_err(EditorError::MalformedDocument)?;
    Ok(doc)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Start { name: String, attrs: Vec<(String, String)>, self_closing: bool },
    End { name: String },
    Text(String),
}

fn is_name_byte(b: u8) -> bool { b.is_ascii_alphanumeric() || b == b'-' || b == b':' }

fn decode(raw: &str) -> String { html_escape::decode_html_entities(raw).into_owned() }

fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        if bytes[i] != b'<' {
            let start = i;
            while i < len && bytes[i] != b'<' {
                i += 1;
            }
            tokens.push(Token::Text(decode(&input[start..i])));
            continue;
        }

        let rest = &input[i..];
        if rest.starts_with("<!--") {
            match rest[4..].find("-->") {
                Some(end) => i += 4 + end + 3,
                None => break,
            }
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            match rest.find('>') {
                Some(end) => i += end + 1,
                None => break,
            }
            continue;
        }

        let closing = bytes.get(i + 1) == Some(&b'/');
        let name_start = i + 1 + usize::from(closing);
        let mut j = name_start;
        while j < len && is_name_byte(bytes[j]) {
            j += 1;
        }
        if j == name_start || !bytes[name_start].is_ascii_alphabetic() {
            tokens.push(Token::Text("<".to_string()));
            i += 1;
            continue;
        }
        let name = input[name_start..j].to_ascii_lowercase();

        let mut attrs = Vec::new();
        let mut self_closing = false;
        while j < len {
            match bytes[j] {
                b'>' => {
                    j += 1;
                    break;
                }
                b'/' => {
                    self_closing = true;
                    j += 1;
                }
                b if b.is_ascii_whitespace() => j += 1,
                _ => {
                    let attr_start = j;
                    while j < len && !bytes[j].is_ascii_whitespace() && !matches!(bytes[j], b'=' | b'>' | b'/') {
                        j += 1;
                    }
                    if j == attr_start {
                        j += 1;
                        continue;
                    }
                    let attr_name = input[attr_start..j].to_ascii_lowercase();
                    while j < len && bytes[j].is_ascii_whitespace() {
                        j += 1;
                    }
                    let mut value = String::new();
                    if j < len && bytes[j] == b'=' {
                        j += 1;
                        while j < len && bytes[j].is_ascii_whitespace() {
                            j += 1;
                        }
                        if j < len && (bytes[j] == b'"' || bytes[j] == b'\'') {
                            let quote = bytes[j];
                            let value_start = j + 1;
                            j = value_start;
                            while j < len && bytes[j] != quote {
                                j += 1;
                            }
                            value = decode(&input[value_start..j]);
                            j = (j + 1).min(len);
                        } else {
                            let value_start = j;
                            while j < len && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                                j += 1;
                            }
                            value = decode(&input[value_start..j]);
                        }
                    }
                    attrs.push((attr_name, value));
                }
            }
        }
        i = j;

        if closing {
            tokens.push(Token::End { name });
        } else {
            tokens.push(Token::Start { name, attrs, self_closing });
        }
    }
    tokens
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn style_of(attrs: &[(String, String)]) -> Style {
    attr(attrs, "style").map(Style::parse_css).unwrap_or_default()
}

/// Maps a tag to a node kind; `None` means the element is transparent and only
/// its content is kept.
fn element_kind(name: &str, attrs: &[(String, String)]) -> Option<NodeKind> {
    let kind = match name {
        "br" => NodeKind::LineBreak,
        "hr" => NodeKind::HorizontalRule,
        "table" => NodeKind::Table,
        "tr" => NodeKind::Row,
        "td" | "th" => NodeKind::Cell,
        "li" => NodeKind::ListItem { style: style_of(attrs) },
        "div" => match attr(attrs, "class").map(str::trim) {
            Some(class) if !class.is_empty() => {
                NodeKind::Block { kind: BlockKind::CustomBox(class.to_string()), style: style_of(attrs) }
            }
            _ => NodeKind::Block { kind: BlockKind::Container, style: style_of(attrs) },
        },
        _ => {
            if let Some(kind) = ListKind::from_tag(name) {
                NodeKind::List { kind }
            } else if let Some(kind) = BlockKind::from_tag(name) {
                NodeKind::Block { kind, style: style_of(attrs) }
            } else if let Some(kind) = InlineKind::from_tag(name) {
                let mut element_attrs = Attributes::new();
                for (k, v) in attrs.iter().filter(|(k, _)| k != "style") {
                    element_attrs.set(k.clone(), v.clone());
                }
                NodeKind::Inline { kind, attrs: element_attrs, style: style_of(attrs) }
            } else {
                return None;
            }
        }
    };
    Some(kind)
}

/// Open element stack of the tree builder. Implicit containers created during
/// repair are pushed under the tag they stand for.
struct Builder {
    doc: Doc,
    open: Vec<(String, NodeId)>,
}

impl Builder {
    fn current(&self) -> NodeId { self.open.last().map(|(_, id)| *id).unwrap_or(self.doc.root()) }

    fn open_implicit(&mut self, tag: &str, kind: NodeKind) -> NodeId {
        let parent = self.current();
        let node = self.doc.create(kind);
        self.doc.append_child(parent, node);
        self.open.push((tag.to_string(), node));
        warn!(tag, "inserted missing container while parsing markup");
        node
    }

    /// Opens whatever implicit containers `kind` needs to sit legally under the
    /// current element and returns the parent to attach it to.
    fn parent_for(&mut self, kind: &NodeKind) -> NodeId {
        loop {
            let parent = self.current();
            let parent_kind = self.doc.kind(parent).clone();
            match (&parent_kind, kind) {
                (NodeKind::List { .. }, NodeKind::ListItem { .. }) => return parent,
                (NodeKind::List { .. }, _) => {
                    self.open_implicit("li", NodeKind::list_item());
                }
                (NodeKind::Table, NodeKind::Row) => return parent,
                (NodeKind::Table, _) => {
                    self.open_implicit("tr", NodeKind::Row);
                }
                (NodeKind::Row, NodeKind::Cell) => return parent,
                (NodeKind::Row, _) => {
                    self.open_implicit("td", NodeKind::Cell);
                }
                (_, NodeKind::ListItem { .. }) => {
                    self.open_implicit("ul", NodeKind::List { kind: ListKind::Unordered });
                }
                (_, NodeKind::Row) => {
                    self.open_implicit("table", NodeKind::Table);
                }
                (_, NodeKind::Cell) => {
                    self.open_implicit("table", NodeKind::Table);
                }
                _ => return parent,
            }
        }
    }

    /// A start tag that ends an open sibling whose end tag was omitted, the way
    /// `li`, `p`, `td` and `tr` allow. The search stops at the enclosing scope.
    fn close_implied(&mut self, name: &str) {
        let (closes, scope): (&[&str], &[&str]) = match name {
            "li" => (&["li"], &["ul", "ol", "table", "td", "th"]),
            "td" | "th" => (&["td", "th"], &["tr", "table"]),
            "tr" => (&["tr"], &["table"]),
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol" | "table" | "div" => {
                (&["p"], &["li", "td", "th", "div", "ul", "ol", "table"])
            }
            _ => return,
        };
        for pos in (0..self.open.len()).rev() {
            let tag = self.open[pos].0.as_str();
            if closes.contains(&tag) {
                trace!(tag, by = name, "closing element with omitted end tag");
                self.open.truncate(pos);
                return;
            }
            if scope.contains(&tag) {
                return;
            }
        }
    }

    fn text(&mut self, text: String) {
        let holder = self.doc.kind(self.current());
        let structural = matches!(holder, NodeKind::Root | NodeKind::List { .. } | NodeKind::Table | NodeKind::Row);
        if text.is_empty() || (structural && text.chars().all(|c| c.is_ascii_whitespace())) {
            return;
        }
        let leaf = self.doc.create_text(text);
        let kind = self.doc.kind(leaf).clone();
        let parent = self.parent_for(&kind);
        self.doc.append_child(parent, leaf);
    }

    fn start(&mut self, name: String, attrs: Vec<(String, String)>, self_closing: bool) {
        let Some(kind) = element_kind(&name, &attrs) else {
            trace!(tag = %name, "unsupported element; keeping its content");
            return;
        };
        self.close_implied(&name);
        let parent = self.parent_for(&kind);
        let leaf = !kind.can_have_children();
        let node = self.doc.create(kind);
        self.doc.append_child(parent, node);
        if !leaf && !self_closing {
            self.open.push((name, node));
        }
    }

    fn end(&mut self, name: &str) {
        match self.open.iter().rposition(|(tag, _)| tag == name) {
            Some(pos) => self.open.truncate(pos),
            None => trace!(tag = name, "ignoring unmatched end tag"),
        }
    }

    /// Removes containers that ended up empty and squares off ragged tables.
    fn finish(mut self) -> Doc {
        let doc = &mut self.doc;
        for node in doc.descendants(doc.root()).into_iter().rev() {
            match doc.kind(node).clone() {
                NodeKind::Row if doc.children(node).is_empty() => {
                    warn!("dropping table row without cells");
                    doc.detach(node);
                }
                NodeKind::Table => {
                    let rows = doc.children(node).to_vec();
                    let width = rows.iter().map(|r| doc.children(*r).len()).max().unwrap_or(0);
                    if width == 0 {
                        warn!("dropping table without cells");
                        doc.detach(node);
                        continue;
                    }
                    for row in rows {
                        let missing = width - doc.children(row).len();
                        if missing > 0 {
                            warn!(missing, "padding short table row");
                        }
                        for _ in 0..missing {
                            let cell = doc.create(NodeKind::Cell);
                            let blank = doc.create_text(CELL_BLANK.to_string());
                            doc.append_child(cell, blank);
                            doc.append_child(row, cell);
                        }
                    }
                }
                NodeKind::List { .. } if doc.children(node).is_empty() => {
                    warn!("dropping list without items");
                    doc.detach(node);
                }
                _ => {}
            }
        }
        if doc.children(doc.root()).is_empty() {
            doc.reset_to_placeholder();
        }
        self.doc
    }
}

/// Parses editor markup into a document, repairing structure where needed.
pub fn from_html(markup: &str) -> Doc {
    let mut builder = Builder { doc: Doc::new(), open: Vec::new() };
    for token in tokenize(markup) {
        match token {
            Token::Text(text) => builder.text(text),
            Token::Start { name, attrs, self_closing } => builder.start(name, attrs, self_closing),
            Token::End { name } => builder.end(&name),
        }
    }
    builder.finish()
}
