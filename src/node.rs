//! The `Node` table: typed view, typed builder and owned tree.
//!
//! These are thin wrappers; field positions come from
//! [`NodeField`](crate::layout::NodeField) and all byte work is done by
//! [`Table`] and [`Builder`].

use crate::builder::{Builder, Offset, StrRef, TableRef, VecRef};
use crate::error::Result;
use crate::layout::NodeField;
use crate::scalar::Scalar;
use crate::table::{Table, TableVector};
use crate::verifier::{VerifierOptions, verify_with_opts};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Entry points ───────────────────────────────────────────────────────────

/// Verify `buf` with default limits and return its root node.
///
/// ```rust
/// use scenegraph_wire::{NodeData, root, to_bytes};
///
/// let bytes = to_bytes(&NodeData {
///     id: 7,
///     name: Some("panel".into()),
///     ..NodeData::default()
/// })
/// .unwrap();
///
/// let node = root(&bytes).unwrap();
/// assert_eq!(node.id(), 7);
/// assert_eq!(node.name(), Some("panel"));
/// assert_eq!(node.class(), None);
/// ```
pub fn root(buf: &[u8]) -> Result<NodeView<'_>> {
    root_with_opts(buf, &VerifierOptions::default())
}

/// Verify `buf` with `opts` and return its root node.
pub fn root_with_opts<'a>(buf: &'a [u8], opts: &VerifierOptions) -> Result<NodeView<'a>> {
    verify_with_opts(buf, opts)?;
    Ok(root_unchecked(buf))
}

/// Return the root node without verifying, for buffers that already passed
/// [`verify`](crate::verify).
///
/// # Panics
///
/// Panics if `buf` is shorter than four bytes. Accessors on a buffer that
/// would not verify may panic on out-of-range offsets.
pub fn root_unchecked(buf: &[u8]) -> NodeView<'_> {
    let root = u32::read_le(buf) as usize;
    NodeView {
        table: Table::new(buf, root),
    }
}

/// Verify `buf` and copy the whole tree out of it.
pub fn from_bytes(buf: &[u8]) -> Result<NodeData> {
    Ok(root(buf)?.to_owned_node())
}

/// Serialize an owned tree into a fresh buffer.
///
/// ```rust
/// use scenegraph_wire::{NodeData, from_bytes, to_bytes};
///
/// let tree = NodeData {
///     id: 1,
///     children: Some(vec![NodeData { id: 2, ..NodeData::default() }]),
///     ..NodeData::default()
/// };
/// let bytes = to_bytes(&tree).unwrap();
/// assert_eq!(from_bytes(&bytes).unwrap(), tree);
/// ```
pub fn to_bytes(node: &NodeData) -> Result<Vec<u8>> {
    let mut fbb = Builder::new();
    let root = node.pack(&mut fbb)?;
    fbb.finish(root)?;
    fbb.into_bytes()
}

// ── NodeView ───────────────────────────────────────────────────────────────

/// Zero-copy view of one `Node` table.
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    table: Table<'a>,
}

impl<'a> NodeView<'a> {
    pub fn table(&self) -> Table<'a> {
        self.table
    }

    pub fn class(&self) -> Option<&'a str> {
        self.table.get_str(NodeField::Class.voffset())
    }

    pub fn id(&self) -> i32 {
        self.table.get(NodeField::Id.voffset(), 0)
    }

    pub fn name(&self) -> Option<&'a str> {
        self.table.get_str(NodeField::Name.voffset())
    }

    pub fn css(&self) -> Option<&'a str> {
        self.table.get_str(NodeField::Css.voffset())
    }

    pub fn x(&self) -> i32 {
        self.table.get(NodeField::X.voffset(), 0)
    }

    pub fn y(&self) -> i32 {
        self.table.get(NodeField::Y.voffset(), 0)
    }

    pub fn rectangle_x(&self) -> i32 {
        self.table.get(NodeField::RectangleX.voffset(), 0)
    }

    pub fn rectangle_y(&self) -> i32 {
        self.table.get(NodeField::RectangleY.voffset(), 0)
    }

    pub fn is_visible(&self) -> bool {
        self.table.get::<u8>(NodeField::IsVisible.voffset(), 0) != 0
    }

    pub fn label_text(&self) -> Option<&'a str> {
        self.table.get_str(NodeField::LabelText.voffset())
    }

    /// `None` when the node carries no children vector at all.
    pub fn children(&self) -> Option<Children<'a>> {
        self.table
            .get_table_vector(NodeField::Children.voffset())
            .map(|inner| Children { inner })
    }

    pub fn children_len(&self) -> usize {
        self.children().map_or(0, |c| c.len())
    }

    /// Whether `field` is physically present in this table. Scalars written
    /// with their default value are usually absent.
    pub fn has_field(&self, field: NodeField) -> bool {
        self.table.field_offset(field.voffset()).is_some()
    }

    /// Pre-order walk over this node and everything beneath it.
    pub fn descendants(&self) -> Descendants<'a> {
        Descendants { stack: vec![*self] }
    }

    /// Copy this subtree into an owned [`NodeData`].
    pub fn to_owned_node(&self) -> NodeData {
        NodeData {
            class: self.class().map(str::to_owned),
            id: self.id(),
            name: self.name().map(str::to_owned),
            css: self.css().map(str::to_owned),
            x: self.x(),
            y: self.y(),
            rectangle_x: self.rectangle_x(),
            rectangle_y: self.rectangle_y(),
            is_visible: self.is_visible(),
            label_text: self.label_text().map(str::to_owned),
            children: self
                .children()
                .map(|kids| kids.iter().map(|k| k.to_owned_node()).collect()),
        }
    }
}

impl fmt::Debug for NodeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeView")
            .field("class", &self.class())
            .field("id", &self.id())
            .field("name", &self.name())
            .field("css", &self.css())
            .field("x", &self.x())
            .field("y", &self.y())
            .field("rectangle_x", &self.rectangle_x())
            .field("rectangle_y", &self.rectangle_y())
            .field("is_visible", &self.is_visible())
            .field("label_text", &self.label_text())
            .field("children", &self.children_len())
            .finish()
    }
}

/// The `Children` vector of a node, indexed lazily.
#[derive(Clone, Copy)]
pub struct Children<'a> {
    inner: TableVector<'a>,
}

impl<'a> Children<'a> {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeView<'a>> {
        self.inner.get(index).map(|table| NodeView { table })
    }

    pub fn iter(&self) -> ChildrenIter<'a> {
        ChildrenIter {
            children: *self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for Children<'a> {
    type Item = NodeView<'a>;
    type IntoIter = ChildrenIter<'a>;

    fn into_iter(self) -> ChildrenIter<'a> {
        self.iter()
    }
}

pub struct ChildrenIter<'a> {
    children: Children<'a>,
    next: usize,
}

impl<'a> Iterator for ChildrenIter<'a> {
    type Item = NodeView<'a>;

    fn next(&mut self) -> Option<NodeView<'a>> {
        let node = self.children.get(self.next)?;
        self.next += 1;
        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.children.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for ChildrenIter<'_> {}

/// Pre-order traversal driven by an explicit stack.
pub struct Descendants<'a> {
    stack: Vec<NodeView<'a>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = NodeView<'a>;

    fn next(&mut self) -> Option<NodeView<'a>> {
        let node = self.stack.pop()?;
        if let Some(kids) = node.children() {
            for i in (0..kids.len()).rev() {
                if let Some(kid) = kids.get(i) {
                    self.stack.push(kid);
                }
            }
        }
        Some(node)
    }
}

// ── NodeBuilder ────────────────────────────────────────────────────────────

/// Writes one `Node` table. Strings and the children vector must be created
/// on the [`Builder`] before this is constructed.
pub struct NodeBuilder<'b> {
    fbb: &'b mut Builder,
}

impl<'b> NodeBuilder<'b> {
    pub fn new(fbb: &'b mut Builder) -> Result<Self> {
        fbb.start_table()?;
        Ok(NodeBuilder { fbb })
    }

    pub fn add_class(&mut self, class: Offset<StrRef>) -> Result<()> {
        self.fbb.push_slot_offset(NodeField::Class.id(), class)
    }

    pub fn add_id(&mut self, id: i32) -> Result<()> {
        self.fbb.push_slot(NodeField::Id.id(), id, 0)
    }

    pub fn add_name(&mut self, name: Offset<StrRef>) -> Result<()> {
        self.fbb.push_slot_offset(NodeField::Name.id(), name)
    }

    pub fn add_css(&mut self, css: Offset<StrRef>) -> Result<()> {
        self.fbb.push_slot_offset(NodeField::Css.id(), css)
    }

    pub fn add_x(&mut self, x: i32) -> Result<()> {
        self.fbb.push_slot(NodeField::X.id(), x, 0)
    }

    pub fn add_y(&mut self, y: i32) -> Result<()> {
        self.fbb.push_slot(NodeField::Y.id(), y, 0)
    }

    pub fn add_rectangle_x(&mut self, rectangle_x: i32) -> Result<()> {
        self.fbb.push_slot(NodeField::RectangleX.id(), rectangle_x, 0)
    }

    pub fn add_rectangle_y(&mut self, rectangle_y: i32) -> Result<()> {
        self.fbb.push_slot(NodeField::RectangleY.id(), rectangle_y, 0)
    }

    pub fn add_is_visible(&mut self, is_visible: bool) -> Result<()> {
        self.fbb.push_slot(NodeField::IsVisible.id(), is_visible as u8, 0)
    }

    pub fn add_label_text(&mut self, label_text: Offset<StrRef>) -> Result<()> {
        self.fbb.push_slot_offset(NodeField::LabelText.id(), label_text)
    }

    pub fn add_children(&mut self, children: Offset<VecRef>) -> Result<()> {
        self.fbb.push_slot_offset(NodeField::Children.id(), children)
    }

    pub fn finish(self) -> Result<Offset<TableRef>> {
        self.fbb.end_table()
    }
}

/// Every field of one node, for [`create_node`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeArgs {
    pub class: Option<Offset<StrRef>>,
    pub id: i32,
    pub name: Option<Offset<StrRef>>,
    pub css: Option<Offset<StrRef>>,
    pub x: i32,
    pub y: i32,
    pub rectangle_x: i32,
    pub rectangle_y: i32,
    pub is_visible: bool,
    pub label_text: Option<Offset<StrRef>>,
    pub children: Option<Offset<VecRef>>,
}

/// Write a whole `Node` table in one call. Four-byte fields go first and the
/// one-byte flag last so the table packs without interior padding.
pub fn create_node(fbb: &mut Builder, args: &NodeArgs) -> Result<Offset<TableRef>> {
    let mut node = NodeBuilder::new(fbb)?;
    if let Some(children) = args.children {
        node.add_children(children)?;
    }
    if let Some(label_text) = args.label_text {
        node.add_label_text(label_text)?;
    }
    node.add_rectangle_y(args.rectangle_y)?;
    node.add_rectangle_x(args.rectangle_x)?;
    node.add_y(args.y)?;
    node.add_x(args.x)?;
    if let Some(css) = args.css {
        node.add_css(css)?;
    }
    if let Some(name) = args.name {
        node.add_name(name)?;
    }
    node.add_id(args.id)?;
    if let Some(class) = args.class {
        node.add_class(class)?;
    }
    node.add_is_visible(args.is_visible)?;
    node.finish()
}

// ── NodeData ───────────────────────────────────────────────────────────────

/// An owned scene-graph node, for building trees in memory or handing them
/// to other serde formats.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct NodeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(rename = "ID")]
    pub id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "CSS", skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    pub x: i32,
    pub y: i32,
    pub rectangle_x: i32,
    pub rectangle_y: i32,
    pub is_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeData>>,
}

impl NodeData {
    /// Write this subtree into `fbb`, children first, and return the table.
    pub fn pack(&self, fbb: &mut Builder) -> Result<Offset<TableRef>> {
        let children = match &self.children {
            Some(kids) => {
                let mut offsets = Vec::with_capacity(kids.len());
                for kid in kids {
                    offsets.push(kid.pack(fbb)?);
                }
                Some(fbb.create_vector_of_tables(&offsets)?)
            }
            None => None,
        };
        let mut text = |s: &Option<String>| s.as_deref().map(|s| fbb.create_string(s)).transpose();
        let class = text(&self.class)?;
        let name = text(&self.name)?;
        let css = text(&self.css)?;
        let label_text = text(&self.label_text)?;

        create_node(
            fbb,
            &NodeArgs {
                class,
                id: self.id,
                name,
                css,
                x: self.x,
                y: self.y,
                rectangle_x: self.rectangle_x,
                rectangle_y: self.rectangle_y,
                is_visible: self.is_visible,
                label_text,
                children,
            },
        )
    }
}
