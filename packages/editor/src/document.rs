//! # Document Handle
//!
//! Owns the block tree of one open document.
//!
//! The `children` vectors on nodes are the single source of truth for
//! structure. The parent back-reference required by the algorithms (walking
//! to the root, sibling lookup) is kept as a derived id→parent-id index and
//! rebuilt atomically after every structural edit — it is never mutated
//! independently.

use blockdoc_model::{Node, NodeId};
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

/// An editable block document.
#[derive(Debug, Default)]
pub struct Document {
    /// Root-level nodes, in document order.
    roots: Vec<Node>,

    /// Derived: node id → parent id (`None` for roots).
    parent_index: HashMap<NodeId, Option<NodeId>>,

    /// Increments on every applied structural mutation.
    version: u64,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from pre-assembled root nodes.
    pub fn from_roots(roots: Vec<Node>) -> Self {
        let mut doc = Self {
            roots,
            parent_index: HashMap::new(),
            version: 0,
        };
        doc.rebuild_parent_index();
        doc
    }

    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Total node count across all roots.
    pub fn len(&self) -> usize {
        self.parent_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_index.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.parent_index.contains_key(id)
    }

    /// Every node id in preorder (stable flatten order).
    pub fn flatten_ids(&self) -> Vec<NodeId> {
        self.roots
            .iter()
            .flat_map(|root| root.iter_subtree())
            .map(|node| node.id.clone())
            .collect()
    }

    pub fn find(&self, id: &NodeId) -> Option<&Node> {
        find_in(&self.roots, id)
    }

    pub fn find_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        find_in_mut(&mut self.roots, id)
    }

    /// Parent id of `id`, or `None` if `id` is a root (or absent — use
    /// [`Document::contains`] to disambiguate).
    pub fn parent_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.parent_index.get(id).and_then(|p| p.as_ref())
    }

    /// Ancestor ids from immediate parent up to the root.
    pub fn ancestors(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id).cloned();
        while let Some(ancestor) = current {
            current = self.parent_of(&ancestor).cloned();
            out.push(ancestor);
        }
        out
    }

    /// Whether `id` lies inside the subtree rooted at `ancestor`
    /// (`ancestor` itself included).
    pub fn is_descendant_of(&self, id: &NodeId, ancestor: &NodeId) -> bool {
        if id == ancestor {
            return true;
        }
        self.ancestors(id).iter().any(|a| a == ancestor)
    }

    /// Position of `id` within its parent's children (or within roots).
    pub fn index_in_parent(&self, id: &NodeId) -> Option<usize> {
        let siblings = self.sibling_list(id)?;
        siblings.iter().position(|n| &n.id == id)
    }

    /// The children list holding `id`: the parent's children, or roots.
    fn sibling_list(&self, id: &NodeId) -> Option<&Vec<Node>> {
        if !self.contains(id) {
            return None;
        }
        match self.parent_of(id) {
            Some(parent_id) => self.find(parent_id).map(|p| &p.children),
            None => Some(&self.roots),
        }
    }

    /// Children of `parent`, or the root list when `parent` is `None`.
    pub fn children_of(&self, parent: Option<&NodeId>) -> Option<&[Node]> {
        match parent {
            Some(id) => self.find(id).map(|n| n.children.as_slice()),
            None => Some(&self.roots),
        }
    }

    /// Recursive serialized snapshot of one subtree, the shape carried by
    /// `updated` change events.
    pub fn snapshot(&self, id: &NodeId) -> Option<Value> {
        self.find(id).and_then(|node| serde_json::to_value(node).ok())
    }

    // ---- Structural primitives (crate-internal; the MutationEngine is the
    // sanctioned entry point) ----

    /// Detach a node and its subtree from wherever it currently lives.
    pub(crate) fn detach(&mut self, id: &NodeId) -> Option<Node> {
        let node = detach_in(&mut self.roots, id)?;
        self.rebuild_parent_index();
        trace!(node = %id, "detached subtree");
        Some(node)
    }

    /// Insert `node` into `parent`'s children (or roots) at `index`,
    /// clamped to the list length. The caller has already validated the
    /// target; a missing parent returns the node back as `Err`.
    pub(crate) fn insert_at(
        &mut self,
        node: Node,
        parent: Option<&NodeId>,
        index: usize,
    ) -> Result<(), Node> {
        let list = match parent {
            Some(pid) => match find_in_mut(&mut self.roots, pid) {
                Some(p) => &mut p.children,
                None => return Err(node),
            },
            None => &mut self.roots,
        };
        let index = index.min(list.len());
        list.insert(index, node);
        self.rebuild_parent_index();
        Ok(())
    }

    /// Hand the whole forest to a full rebuild (geometry reconciliation),
    /// leaving the document empty until `set_roots` restores it.
    pub(crate) fn take_roots(&mut self) -> Vec<Node> {
        let roots = std::mem::take(&mut self.roots);
        self.parent_index.clear();
        roots
    }

    pub(crate) fn set_roots(&mut self, roots: Vec<Node>) {
        self.roots = roots;
        self.rebuild_parent_index();
    }

    pub(crate) fn roots_mut(&mut self) -> &mut Vec<Node> {
        &mut self.roots
    }

    pub(crate) fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub(crate) fn rebuild_parent_index(&mut self) {
        self.parent_index.clear();
        for root in &self.roots {
            index_subtree(root, None, &mut self.parent_index);
        }
    }
}

fn index_subtree(node: &Node, parent: Option<&NodeId>, index: &mut HashMap<NodeId, Option<NodeId>>) {
    index.insert(node.id.clone(), parent.cloned());
    for child in &node.children {
        index_subtree(child, Some(&node.id), index);
    }
}

fn find_in<'a>(nodes: &'a [Node], id: &NodeId) -> Option<&'a Node> {
    for node in nodes {
        if &node.id == id {
            return Some(node);
        }
        if let Some(found) = find_in(&node.children, id) {
            return Some(found);
        }
    }
    None
}

fn find_in_mut<'a>(nodes: &'a mut [Node], id: &NodeId) -> Option<&'a mut Node> {
    for node in nodes {
        if &node.id == id {
            return Some(node);
        }
        if let Some(found) = find_in_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

fn detach_in(nodes: &mut Vec<Node>, id: &NodeId) -> Option<Node> {
    if let Some(pos) = nodes.iter().position(|n| &n.id == id) {
        return Some(nodes.remove(pos));
    }
    for node in nodes {
        if let Some(found) = detach_in(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}
