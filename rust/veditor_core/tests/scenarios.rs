use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use rstest::rstest;
use veditor_core::doc::PLACEHOLDER;
use veditor_core::image::upload_image;
use veditor_core::{
    BlockKind, DegenerateTablePolicy, Doc, EditorConfig, EditorCore, ImageUploader, InlineKind, ListKind, NodeId,
    NodeKind, Position, Selection, UploadedImage,
};

fn text_leaf(doc: &Doc, needle: &str) -> NodeId {
    doc.descendants(doc.root())
        .into_iter()
        .find(|n| doc.text(*n).is_some_and(|t| t.contains(needle)))
        .unwrap_or_else(|| panic!("no text containing {needle:?}"))
}

fn caret(core: &mut EditorCore, needle: &str, offset: usize) {
    let leaf = text_leaf(&core.doc, needle);
    core.set_selection(Some(Selection::caret(leaf, offset)));
}

fn select(core: &mut EditorCore, from: (&str, usize), to: (&str, usize)) {
    let a = Position::new(text_leaf(&core.doc, from.0), from.1);
    let b = Position::new(text_leaf(&core.doc, to.0), to.1);
    core.set_selection(Some(Selection::new(a, b)));
}

fn nodes_of(doc: &Doc, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
    doc.descendants(doc.root()).into_iter().filter(|n| pred(doc.kind(*n))).collect()
}

fn assert_rectangular(doc: &Doc) {
    for table in nodes_of(doc, |k| matches!(k, NodeKind::Table)) {
        let widths: Vec<usize> = doc.children(table).iter().map(|r| doc.children(*r).len()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "ragged table: {widths:?}");
    }
}

fn assert_lists_populated(doc: &Doc) {
    for list in nodes_of(doc, NodeKind::is_list) {
        assert!(!doc.children(list).is_empty(), "empty list left in tree");
    }
}

/// Tables own rows, rows own cells, lists own items, and no cell or item is
/// left without content.
fn assert_well_formed(doc: &Doc) {
    for node in doc.descendants(doc.root()) {
        let children = doc.children(node);
        let owns = |pred: fn(&NodeKind) -> bool| children.iter().all(|c| pred(doc.kind(*c)));
        match doc.kind(node) {
            NodeKind::Table => assert!(owns(|k| matches!(k, NodeKind::Row)), "table holds a non-row"),
            NodeKind::Row => assert!(owns(NodeKind::is_cell), "row holds a non-cell"),
            NodeKind::List { .. } => assert!(owns(NodeKind::is_list_item), "list holds a non-item"),
            NodeKind::Cell | NodeKind::ListItem { .. } => assert!(!children.is_empty(), "cell or item left empty"),
            _ => {}
        }
    }
    assert_rectangular(doc);
    assert_lists_populated(doc);
}

fn assert_stable_markup(core: &EditorCore) {
    let markup = core.to_html();
    assert_eq!(EditorCore::from_html(&markup).to_html(), markup);
}

const GRID: &str = "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>";
const ITEMS: &str = "<ul><li>one</li><li>two</li><li>three</li></ul>";

#[derive(Debug, Clone, Copy)]
enum Across {
    Cells,
    Items,
}

impl Across {
    fn session(self) -> EditorCore {
        let (markup, from, to) = match self {
            Across::Cells => (GRID, ("b", 0), ("c", 1)),
            Across::Items => (ITEMS, ("one", 0), ("three", 5)),
        };
        let mut core = EditorCore::from_html(markup);
        select(&mut core, from, to);
        core
    }
}

#[derive(Debug, Clone, Copy)]
enum Insertion {
    Link,
    Image,
    Enter,
    Table,
    Heading,
}

impl Insertion {
    fn apply(self, core: &mut EditorCore) -> bool {
        match self {
            Insertion::Link => core.insert_link("https://x.test"),
            Insertion::Image => core.insert_image("u.png"),
            Insertion::Enter => core.split_on_line_break(false),
            Insertion::Table => core.insert_table(2, 2),
            Insertion::Heading => core.convert_block_type(BlockKind::heading(2)),
        }
    }
}

#[test]
fn table_creation_in_empty_document() {
    let mut core = EditorCore::new_empty();
    assert!(core.insert_table(2, 3));

    let tables = nodes_of(&core.doc, |k| matches!(k, NodeKind::Table));
    assert_eq!(tables.len(), 1);
    let table = tables[0];
    assert_eq!(core.doc.children(table).len(), 2);
    for row in core.doc.children(table) {
        assert_eq!(core.doc.children(*row).len(), 3);
        for cell in core.doc.children(*row) {
            assert_eq!(core.doc.text_content(*cell), "\u{a0}");
        }
    }
    let after = core.doc.next_sibling(table).unwrap();
    assert!(core.doc.is_blank(after));
    assert_eq!(core.doc.next_sibling(after), None);

    let first_cell = core.doc.first_child(core.doc.first_child(table).unwrap()).unwrap();
    assert_eq!(core.selection(), Some(Selection::caret(first_cell, 0)));
}

#[test]
fn row_insert_below_first_row() {
    let mut core = EditorCore::from_html("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>");
    caret(&mut core, "a", 0);
    assert!(core.insert_row(false));
    assert_eq!(
        core.to_html(),
        "<table class=\"etable\"><tr><td>a</td><td>b</td></tr><tr><td>&nbsp;</td><td>&nbsp;</td></tr><tr><td>c</td><td>d</td></tr></table>"
    );
}

#[test]
fn grid_edits_keep_tables_rectangular() {
    let mut core = EditorCore::from_html("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>");
    caret(&mut core, "d", 0);
    assert!(core.insert_column(true));
    assert_rectangular(&core.doc);
    assert!(core.insert_row(true));
    assert_rectangular(&core.doc);
    assert!(core.delete_column());
    assert_rectangular(&core.doc);
    assert!(core.delete_row());
    assert_rectangular(&core.doc);
}

#[test]
fn keep_last_policy_refuses_degenerate_tables() {
    let config = EditorConfig { degenerate_table: DegenerateTablePolicy::KeepLast, ..EditorConfig::default() };
    let mut core = EditorCore::with_config(config);
    core.set_value("<table><tr><td>only</td></tr></table>");
    caret(&mut core, "only", 0);
    assert!(!core.delete_row());
    assert!(!core.delete_column());
    assert!(core.delete_table());
    assert_eq!(core.to_html(), format!("<p>{}</p>", PLACEHOLDER));
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(6)]
fn heading_conversion_is_idempotent(#[case] level: u8) {
    let mut core = EditorCore::from_html("<p>title <em>here</em></p>");
    caret(&mut core, "title", 2);
    assert!(core.convert_block_type(BlockKind::heading(level)));
    let once = core.to_html();
    caret(&mut core, "title", 2);
    assert!(core.convert_block_type(BlockKind::heading(level)));
    assert_eq!(core.to_html(), once);
    assert_eq!(once, format!("<h{level}>title <em>here</em></h{level}>"));
}

#[rstest]
#[case::ordered(ListKind::Ordered)]
#[case::unordered(ListKind::Unordered)]
fn list_toggle_round_trips_to_paragraphs(#[case] kind: ListKind) {
    let original = "<p>a</p><p>b</p><p>c</p>";
    let mut core = EditorCore::from_html(original);
    select(&mut core, ("a", 0), ("c", 1));
    assert!(core.toggle_list(kind));
    assert_eq!(core.to_html(), format!("<{t}><li>a</li><li>b</li><li>c</li></{t}>", t = kind.tag()));
    assert!(core.toggle_list(kind));
    assert_eq!(core.to_html(), original);
    assert_lists_populated(&core.doc);
}

#[test]
fn inline_toggle_round_trip() {
    let mut core = EditorCore::from_html("<p>hello</p>");
    select(&mut core, ("hello", 1), ("hello", 4));
    assert!(core.toggle_inline(InlineKind::Bold));
    assert_eq!(core.to_html(), "<p>h<strong>ell</strong>o</p>");
    assert!(core.toggle_inline(InlineKind::Bold));
    assert_eq!(core.to_html(), "<p>hello</p>");
    assert!(nodes_of(&core.doc, |k| k.inline_kind().is_some()).is_empty());
}

#[test]
fn enter_twice_in_list_exits_it() {
    let mut core = EditorCore::from_html("<ul><li>w</li><li>x</li></ul>");
    caret(&mut core, "x", 1);

    assert!(core.split_on_line_break(false));
    assert_eq!(core.to_html(), format!("<ul><li>w</li><li>x</li><li>{}</li></ul>", PLACEHOLDER));
    let list = core.doc.first_child(core.doc.root()).unwrap();
    let new_item = core.doc.child(list, 2).unwrap();
    assert_eq!(core.selection(), Some(Selection::caret(new_item, 0)));

    assert!(core.split_on_line_break(false));
    assert_eq!(core.to_html(), format!("<ul><li>w</li><li>x</li></ul><p>{}</p>", PLACEHOLDER));
    assert_lists_populated(&core.doc);
}

#[test]
fn enter_in_only_blank_item_removes_list() {
    let mut core = EditorCore::new_empty();
    assert!(core.toggle_list(ListKind::Unordered));
    assert!(core.split_on_line_break(false));
    assert_eq!(core.to_html(), format!("<p>{}</p>", PLACEHOLDER));
    assert_lists_populated(&core.doc);
}

#[test]
fn every_change_is_reported_once() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut core = EditorCore::from_html("<p>abc</p>");
    core.set_on_change(move |markup| sink.borrow_mut().push(markup.to_string()));

    select(&mut core, ("abc", 0), ("abc", 3));
    assert!(core.set_text_color("red"));
    assert!(core.insert_horizontal_rule());
    assert!(!core.delete_table());

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen.last(), Some(&core.to_html()));
}

struct SlowCdn;

impl ImageUploader for SlowCdn {
    async fn upload(&self, blob: Vec<u8>) -> Result<UploadedImage, Box<dyn Error + Send + Sync>> {
        if blob.is_empty() {
            return Err("empty upload".into());
        }
        Ok(UploadedImage { url: "https://cdn.test/pic.png".to_string() })
    }
}

#[test]
fn uploaded_image_lands_at_selection_current_after_upload() {
    let mut core = EditorCore::from_html("<p>first</p><p>second</p>");
    caret(&mut core, "first", 0);
    let uploaded = pollster::block_on(upload_image(&SlowCdn, vec![0x89, 0x50])).unwrap();

    caret(&mut core, "second", 6);
    assert!(core.insert_image(&uploaded.url));
    assert_eq!(
        core.to_html(),
        "<p>first</p><p>second<img src=\"https://cdn.test/pic.png\" alt=\"Inserted image\" style=\"max-width: 100%;\"></p>"
    );
}

#[test]
fn failed_upload_leaves_document_untouched() {
    let core = EditorCore::from_html("<p>x</p>");
    let before = core.to_html();
    assert!(pollster::block_on(upload_image(&SlowCdn, Vec::new())).is_err());
    assert_eq!(core.to_html(), before);
}

#[test]
fn custom_boxes_and_links_through_the_session() {
    let mut core = EditorCore::from_html("<p>read more</p>");
    select(&mut core, ("read more", 5), ("read more", 9));
    assert!(core.insert_link("https://docs.test"));
    assert!(core.insert_custom_box(veditor_core::BoxVariant::Success));
    assert_eq!(
        core.to_html(),
        "<p>read <a href=\"https://docs.test\" target=\"_blank\" rel=\"noopener noreferrer\">more</a></p><div class=\"successBox\" style=\"padding: 10px; margin: 10px 0; border-radius: 4px; background-color: #d4edda; border: 1px solid #c3e6cb;\">Success Box</div>"
    );
}

#[rstest]
fn insertions_over_structured_selections_keep_structure(
    #[values(Across::Cells, Across::Items)] across: Across,
    #[values(Insertion::Link, Insertion::Image, Insertion::Enter, Insertion::Table, Insertion::Heading)]
    insertion: Insertion,
) {
    let mut core = across.session();
    assert!(insertion.apply(&mut core));
    assert_well_formed(&core.doc);
    assert_stable_markup(&core);
    assert!(core.selection().is_some_and(|s| core.doc.is_valid_selection(&s)));
}

#[test]
fn link_across_cells_lands_in_first_cell() {
    let mut core = Across::Cells.session();
    assert!(core.insert_link("https://x.test"));
    assert_eq!(
        core.to_html(),
        "<table class=\"etable\"><tr><td>a</td><td><a href=\"https://x.test\" target=\"_blank\" rel=\"noopener noreferrer\">bc</a></td></tr><tr><td>&nbsp;</td><td>d</td></tr></table>"
    );
}

#[test]
fn heading_across_items_stays_inside_the_list() {
    let mut core = Across::Items.session();
    assert!(core.convert_block_type(BlockKind::heading(2)));
    assert_eq!(
        core.to_html(),
        format!("<ul><li><h2>onetwothree</h2></li><li>{p}</li><li>{p}</li></ul>", p = PLACEHOLDER)
    );
}

#[test]
fn cyclic_json_document_is_refused() {
    let json = r#"{"nodes":[{"kind":{"type":"Root"},"parent":1,"children":[1]},{"kind":{"type":"Block","kind":{"kind":"paragraph"}},"parent":0,"children":[]}],"root":0}"#;
    assert!(matches!(EditorCore::from_json(json), Err(veditor_core::EditorError::MalformedDocument(_))));
}
