//! Content node ("block") definitions.
//!
//! A document is a tree of typed nodes. Each node exclusively owns its
//! children; parent back-references are derived state maintained by the
//! editor's document index, never stored here.
//!
//! Nodes serialize recursively to `{id, kind, content, properties, children}`,
//! which is the snapshot shape carried by change events and consumed by
//! external persistence.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque stable node identifier. Unique within a document, never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The closed set of block kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Paragraph,
    Heading1,
    Heading2,
    Quote,
    Callout,
    Code,
    Image,
    LinkButton,
    BulletedItem,
    NumberedItem,
    TodoItem,
    ToggleItem,
    Table,
    TableCell,
    Columns,
    Column,
}

impl NodeKind {
    /// Whether nodes of this kind own a designated child slot.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Callout
                | NodeKind::ToggleItem
                | NodeKind::TableCell
                | NodeKind::Columns
                | NodeKind::Column
        )
    }

    /// Whether this kind participates in the columns dissolve/merge invariant.
    pub fn is_split_group(&self) -> bool {
        matches!(self, NodeKind::Columns)
    }

    /// Whether dropping on the left/right edge zone of this kind may create
    /// a column split. Columns slots and table cells never split.
    pub fn accepts_column_split(&self) -> bool {
        !matches!(self, NodeKind::Column | NodeKind::TableCell)
    }
}

/// Open key→value property map with typed accessors for the keys the
/// editor algorithms read. Everything else passes through opaquely for
/// collaborators to interpret.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(Map<String, Value>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Column width fraction, or canvas pixel width.
    pub fn width(&self) -> Option<f64> {
        self.0.get("width").and_then(Value::as_f64)
    }

    pub fn set_width(&mut self, width: f64) {
        self.0.insert("width".to_string(), json_number(width));
    }

    /// Container pixel height (canvas mode).
    pub fn height(&self) -> Option<f64> {
        self.0.get("height").and_then(Value::as_f64)
    }

    pub fn set_height(&mut self, height: f64) {
        self.0.insert("height".to_string(), json_number(height));
    }

    /// Absolute canvas position, stored as `{"x": .., "y": ..}`.
    pub fn position(&self) -> Option<Point> {
        let pos = self.0.get("position")?;
        Some(Point::new(
            pos.get("x")?.as_f64()?,
            pos.get("y")?.as_f64()?,
        ))
    }

    pub fn set_position(&mut self, position: Point) {
        let mut pos = Map::new();
        pos.insert("x".to_string(), json_number(position.x));
        pos.insert("y".to_string(), json_number(position.y));
        self.0.insert("position".to_string(), Value::Object(pos));
    }
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// A single content node. Children are exclusively owned; a node appears in
/// at most one `children` list at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            content: String::new(),
            properties: Properties::new(),
            children: Vec::new(),
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// Preorder traversal over this node and its whole subtree.
    pub fn iter_subtree(&self) -> SubtreeIter<'_> {
        SubtreeIter { stack: vec![self] }
    }

    /// Every id in this subtree, self included, in preorder.
    pub fn descendant_ids(&self) -> Vec<NodeId> {
        self.iter_subtree().map(|n| n.id.clone()).collect()
    }

    /// Number of nodes in this subtree, self included.
    pub fn subtree_len(&self) -> usize {
        self.iter_subtree().count()
    }
}

/// Preorder iterator over a subtree.
pub struct SubtreeIter<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for SubtreeIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        // Push in reverse so children come out in document order.
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// External node-creation seam. Rendering-specific construction lives
/// outside the core; the editor only needs fresh nodes with unique ids
/// (for column wrappers created during splits).
pub trait NodeFactory {
    fn create(&mut self, kind: NodeKind, properties: Properties) -> Node;
}

/// Default factory: monotonic counter scoped by a document prefix.
#[derive(Debug)]
pub struct SequentialFactory {
    prefix: String,
    next: u64,
}

impl SequentialFactory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }
}

impl Default for SequentialFactory {
    fn default() -> Self {
        Self::new("node")
    }
}

impl NodeFactory for SequentialFactory {
    fn create(&mut self, kind: NodeKind, properties: Properties) -> Node {
        let id = NodeId::new(format!("{}-{}", self.prefix, self.next));
        self.next += 1;

        let mut node = Node::new(id, kind);
        node.properties = properties;

        // New columns default to an even half until renormalized.
        if kind == NodeKind::Column && node.properties.width().is_none() {
            node.properties.set_width(0.5);
        }

        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_flags() {
        assert!(NodeKind::Columns.is_container());
        assert!(NodeKind::Column.is_container());
        assert!(NodeKind::Callout.is_container());
        assert!(!NodeKind::Paragraph.is_container());

        assert!(NodeKind::Columns.is_split_group());
        assert!(!NodeKind::Column.is_split_group());

        assert!(NodeKind::Paragraph.accepts_column_split());
        assert!(!NodeKind::Column.accepts_column_split());
        assert!(!NodeKind::TableCell.accepts_column_split());
    }

    #[test]
    fn properties_typed_accessors() {
        let mut props = Properties::new();
        assert!(props.width().is_none());

        props.set_width(0.5);
        props.set_position(Point::new(120.0, 40.0));

        assert_eq!(props.width(), Some(0.5));
        let pos = props.position().unwrap();
        assert_eq!(pos.x, 120.0);
        assert_eq!(pos.y, 40.0);

        // Unknown keys pass through untouched.
        props.set("color", serde_json::json!("#ff0000"));
        assert_eq!(props.get("color").unwrap(), "#ff0000");
    }

    #[test]
    fn subtree_iteration_is_preorder() {
        let mut root = Node::new(NodeId::from("a"), NodeKind::Callout);
        let mut b = Node::new(NodeId::from("b"), NodeKind::Paragraph);
        b.children.push(Node::new(NodeId::from("c"), NodeKind::Paragraph));
        root.children.push(b);
        root.children.push(Node::new(NodeId::from("d"), NodeKind::Paragraph));

        let ids: Vec<String> = root.descendant_ids().iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, ["a", "b", "c", "d"]);
        assert_eq!(root.subtree_len(), 4);
    }

    #[test]
    fn factory_generates_unique_ids_and_column_defaults() {
        let mut factory = SequentialFactory::new("doc1");

        let a = factory.create(NodeKind::Paragraph, Properties::new());
        let b = factory.create(NodeKind::Column, Properties::new());

        assert_ne!(a.id, b.id);
        assert_eq!(b.properties.width(), Some(0.5));
    }

    #[test]
    fn node_snapshot_shape() {
        let mut node = Node::new(NodeId::from("n1"), NodeKind::Paragraph);
        node.content = "hello".to_string();

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["id"], "n1");
        assert_eq!(value["kind"], "paragraph");
        assert_eq!(value["content"], "hello");
        assert!(value["children"].as_array().unwrap().is_empty());

        let back: Node = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }
}
