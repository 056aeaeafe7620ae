//! # Structural Mutations
//!
//! Atomic edits on the block tree, plus the normalization sweep that keeps
//! the columns invariant intact.
//!
//! ## Mutation semantics
//!
//! ### Move
//! - Atomic relocation of a node (subtree travels with it)
//! - Fails if the destination lies inside the moved subtree (no cycles)
//! - A rejected move has no partial effect
//!
//! ### Remove / Delete
//! - `remove` detaches a subtree and hands it back to the caller
//! - `delete` discards it and reports every id that left the tree, so
//!   collaborators can drop cached references instead of resolving stale ids
//!
//! ### SplitIntoColumns
//! - Wraps a drop target and the dragged run into a column layout, or adds
//!   a column to an existing one; sibling widths renormalize to `1/n`
//!
//! Every operation validates fully before touching the tree; there is no
//! observable intermediate state.

use crate::document::Document;
use blockdoc_model::{Node, NodeFactory, NodeId, NodeKind, Properties, SequentialFactory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    /// The operation referenced a node id absent from the tree
    /// (e.g. the target was removed mid-drag).
    #[error("Node not found: {0}")]
    NotFound(NodeId),

    /// The operation would violate structural invariants
    /// (acyclicity, single ownership, container capability).
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Normalization met a columns state it cannot resolve. Should not
    /// occur when the engine's own operations are the only mutation path.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Which side of the target a column split lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SplitSide {
    Left,
    Right,
}

/// Semantic mutations (intent-preserving, serializable operations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert a node (with its subtree) under a parent, or at root level.
    Insert {
        node: Node,
        parent: Option<NodeId>,
        index: usize,
    },

    /// Remove a node and discard its subtree.
    Remove { node_id: NodeId },

    /// Move a node to a new parent at index (atomic remove + insert).
    Move {
        node_id: NodeId,
        new_parent: Option<NodeId>,
        index: usize,
    },

    /// Split the target into a column layout holding the incoming nodes.
    SplitIntoColumns {
        target_id: NodeId,
        incoming: Vec<Node>,
        side: SplitSide,
    },
}

/// Result of applying a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// New document version.
    pub version: u64,

    /// Structurally affected nodes and everything that left the tree.
    pub changes: ChangeSet,
}

/// The uniform "what changed" shape fed to the ChangeNotifier: containers
/// whose child set or sizing changed, and nodes actually removed from the
/// tree (not just displaced).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub updated: BTreeSet<NodeId>,
    pub removed: Vec<NodeId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn merge(&mut self, other: ChangeSet) {
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
    }
}

/// The only sanctioned way to alter a document's structure.
pub struct MutationEngine {
    factory: Box<dyn NodeFactory>,
}

impl std::fmt::Debug for MutationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationEngine").finish_non_exhaustive()
    }
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::new(Box::new(SequentialFactory::default()))
    }
}

impl MutationEngine {
    /// Create an engine around the host-provided node factory (used for
    /// the column wrappers created during splits).
    pub fn new(factory: Box<dyn NodeFactory>) -> Self {
        Self { factory }
    }

    /// Apply a serialized mutation intent.
    pub fn apply(&mut self, doc: &mut Document, mutation: Mutation) -> Result<MutationResult, MutationError> {
        mutation.validate(doc)?;

        let changes = match mutation {
            Mutation::Insert { node, parent, index } => {
                let id = node.id.clone();
                self.insert(doc, node, parent.as_ref(), index)?;
                let mut cs = ChangeSet::default();
                if let Some(parent) = parent {
                    cs.updated.insert(parent);
                }
                cs.updated.insert(id);
                cs
            }
            Mutation::Remove { node_id } => self.delete(doc, &node_id)?,
            Mutation::Move {
                node_id,
                new_parent,
                index,
            } => {
                let prior_parent = doc.parent_of(&node_id).cloned();
                self.r#move(doc, &node_id, new_parent.as_ref(), index)?;
                let mut cs = ChangeSet::default();
                cs.updated.extend(prior_parent);
                cs.updated.extend(new_parent);
                cs.updated.insert(node_id);
                cs
            }
            Mutation::SplitIntoColumns {
                target_id,
                incoming,
                side,
            } => {
                let mut cs = ChangeSet::default();
                cs.updated = self.split_into_columns(doc, &target_id, incoming, side)?;
                cs
            }
        };

        Ok(MutationResult {
            version: doc.version(),
            changes,
        })
    }

    /// Insert `node` (with its subtree) under `parent` at `index`, or into
    /// the root list when `parent` is `None`. The index is clamped.
    pub fn insert(
        &mut self,
        doc: &mut Document,
        node: Node,
        parent: Option<&NodeId>,
        index: usize,
    ) -> Result<(), MutationError> {
        validate_insert(doc, &node, parent)?;

        debug!(node = %node.id, parent = ?parent.map(|p| p.to_string()), index, "insert");
        doc.insert_at(node, parent, index)
            .map_err(|n| MutationError::NotFound(n.id))?;
        doc.bump_version();
        Ok(())
    }

    /// Detach a node and its subtree; children travel with it.
    pub fn remove(&mut self, doc: &mut Document, id: &NodeId) -> Result<Node, MutationError> {
        let node = doc
            .detach(id)
            .ok_or_else(|| MutationError::NotFound(id.clone()))?;
        doc.bump_version();
        debug!(node = %id, subtree = node.subtree_len(), "removed");
        Ok(node)
    }

    /// Remove and discard a subtree, reporting every id that left the tree.
    pub fn delete(&mut self, doc: &mut Document, id: &NodeId) -> Result<ChangeSet, MutationError> {
        let parent = doc.parent_of(id).cloned();
        let node = self.remove(doc, id)?;

        let mut cs = ChangeSet {
            updated: BTreeSet::new(),
            removed: node.descendant_ids(),
        };
        cs.updated.extend(parent);
        Ok(cs)
    }

    /// Atomic move: a rejected move (cycle, missing target) has no effect.
    pub fn r#move(
        &mut self,
        doc: &mut Document,
        id: &NodeId,
        new_parent: Option<&NodeId>,
        index: usize,
    ) -> Result<(), MutationError> {
        validate_move(doc, id, new_parent)?;

        let prior_parent = doc.parent_of(id).cloned();
        let prior_index = doc.index_in_parent(id).unwrap_or(0);

        let node = doc
            .detach(id)
            .ok_or_else(|| MutationError::NotFound(id.clone()))?;

        // Validation guarantees the destination survives the detach; restore
        // on the impossible failure path rather than losing the subtree.
        if let Err(node) = doc.insert_at(node, new_parent, index) {
            let _ = doc.insert_at(node, prior_parent.as_ref(), prior_index);
            return Err(MutationError::InvalidTarget(format!(
                "move destination vanished for {id}"
            )));
        }

        doc.bump_version();
        debug!(node = %id, parent = ?new_parent.map(|p| p.to_string()), index, "moved");
        Ok(())
    }

    /// Column-split a drop target.
    ///
    /// Case (a): the target is already a column inside a `Columns` node —
    /// a fresh column wrapping `incoming` is inserted adjacent to it and
    /// every sibling width renormalizes to `1/n`.
    ///
    /// Case (b): the target is a plain block — it and `incoming` are each
    /// wrapped in a half-width column, and a new `Columns` node takes the
    /// target's place in the tree.
    ///
    /// Returns the ids of structurally affected containers.
    pub fn split_into_columns(
        &mut self,
        doc: &mut Document,
        target_id: &NodeId,
        incoming: Vec<Node>,
        side: SplitSide,
    ) -> Result<BTreeSet<NodeId>, MutationError> {
        validate_split(doc, target_id, &incoming)?;

        let mut affected = BTreeSet::new();
        let parent = doc.parent_of(target_id).cloned();
        let target_index = doc
            .index_in_parent(target_id)
            .ok_or_else(|| MutationError::NotFound(target_id.clone()))?;

        let parent_is_columns = parent
            .as_ref()
            .and_then(|p| doc.find(p))
            .map(|p| p.kind == NodeKind::Columns)
            .unwrap_or(false);

        if parent_is_columns {
            let columns_id = parent.expect("columns parent checked above");

            let mut new_column = self.factory.create(NodeKind::Column, Properties::new());
            new_column.children = incoming;

            let insert_index = match side {
                SplitSide::Left => target_index,
                SplitSide::Right => target_index + 1,
            };
            doc.insert_at(new_column, Some(&columns_id), insert_index)
                .map_err(|_| MutationError::NotFound(columns_id.clone()))?;

            let columns = doc
                .find_mut(&columns_id)
                .ok_or_else(|| MutationError::NotFound(columns_id.clone()))?;
            renormalize_column_widths(columns);

            affected.insert(columns_id);
        } else {
            let target = doc
                .detach(target_id)
                .ok_or_else(|| MutationError::NotFound(target_id.clone()))?;

            let mut target_column = self.factory.create(NodeKind::Column, Properties::new());
            target_column.properties.set_width(0.5);
            target_column.children.push(target);

            let mut dragged_column = self.factory.create(NodeKind::Column, Properties::new());
            dragged_column.properties.set_width(0.5);
            dragged_column.children = incoming;

            let mut columns = self.factory.create(NodeKind::Columns, Properties::new());
            columns.children = match side {
                SplitSide::Left => vec![dragged_column, target_column],
                SplitSide::Right => vec![target_column, dragged_column],
            };

            let columns_id = columns.id.clone();
            doc.insert_at(columns, parent.as_ref(), target_index)
                .map_err(|_| {
                    MutationError::InvalidTarget(format!(
                        "split destination vanished for {target_id}"
                    ))
                })?;

            affected.insert(columns_id);
            affected.extend(parent);
        }

        doc.bump_version();
        debug!(target = %target_id, ?side, "split into columns");
        Ok(affected)
    }

    /// Post-mutation sweep applying the columns invariant bottom-up:
    /// empty columns are dropped; a `Columns` node with no children is
    /// deleted; with exactly one child column it is replaced in place by
    /// that column's children; with two or more after a count change the
    /// sibling widths renormalize to `1/n`.
    pub fn normalize(&mut self, doc: &mut Document) -> Result<ChangeSet, MutationError> {
        let mut cs = ChangeSet::default();
        let mut changed = false;

        let result = sweep_columns(doc.roots_mut(), None, &mut cs, &mut changed);
        doc.rebuild_parent_index();
        result?;

        if changed {
            doc.bump_version();
            debug!(affected = cs.updated.len(), removed = cs.removed.len(), "normalized columns");
        }
        Ok(cs)
    }
}

fn validate_insert(doc: &Document, node: &Node, parent: Option<&NodeId>) -> Result<(), MutationError> {
    for id in node.descendant_ids() {
        if doc.contains(&id) {
            return Err(MutationError::InvalidTarget(format!(
                "node {id} is already owned by the tree"
            )));
        }
    }

    if let Some(pid) = parent {
        if !doc.contains(pid) {
            // The destination may be inside the inserted subtree (a cycle)
            // rather than genuinely unknown.
            if node.iter_subtree().any(|n| &n.id == pid) {
                return Err(MutationError::InvalidTarget(format!(
                    "cannot insert {} under its own subtree",
                    node.id
                )));
            }
            return Err(MutationError::NotFound(pid.clone()));
        }
    }
    Ok(())
}

fn validate_move(doc: &Document, id: &NodeId, new_parent: Option<&NodeId>) -> Result<(), MutationError> {
    if !doc.contains(id) {
        return Err(MutationError::NotFound(id.clone()));
    }
    if let Some(pid) = new_parent {
        if !doc.contains(pid) {
            return Err(MutationError::NotFound(pid.clone()));
        }
        if doc.is_descendant_of(pid, id) {
            return Err(MutationError::InvalidTarget(format!(
                "cannot move {id} under its own subtree"
            )));
        }
    }
    Ok(())
}

fn validate_split(doc: &Document, target_id: &NodeId, incoming: &[Node]) -> Result<(), MutationError> {
    if !doc.contains(target_id) {
        return Err(MutationError::NotFound(target_id.clone()));
    }
    if incoming.is_empty() {
        return Err(MutationError::InvalidTarget(
            "column split with no incoming nodes".to_string(),
        ));
    }
    for node in incoming {
        for id in node.descendant_ids() {
            if doc.contains(&id) {
                return Err(MutationError::InvalidTarget(format!(
                    "incoming node {id} is already owned by the tree"
                )));
            }
        }
    }
    Ok(())
}

fn renormalize_column_widths(columns: &mut Node) {
    let count = columns.children.len();
    if count == 0 {
        return;
    }
    let width = 1.0 / count as f64;
    for column in &mut columns.children {
        column.properties.set_width(width);
    }
}

/// Bottom-up columns sweep over one children list. `parent_id` is `None`
/// at the root level.
fn sweep_columns(
    children: &mut Vec<Node>,
    parent_id: Option<&NodeId>,
    cs: &mut ChangeSet,
    changed: &mut bool,
) -> Result<(), MutationError> {
    let mut i = children.len();
    while i > 0 {
        i -= 1;

        {
            let node = &mut children[i];
            let id = node.id.clone();
            sweep_columns(&mut node.children, Some(&id), cs, changed)?;
        }

        if children[i].kind != NodeKind::Columns {
            continue;
        }

        if children[i]
            .children
            .iter()
            .any(|c| c.kind != NodeKind::Column)
        {
            return Err(MutationError::InvariantViolation(format!(
                "columns node {} holds a non-column child",
                children[i].id
            )));
        }

        let original_count = children[i].children.len();

        // Empty columns dissolve.
        let kept: Vec<Node> = children[i]
            .children
            .drain(..)
            .filter(|col| {
                if col.children.is_empty() {
                    cs.removed.push(col.id.clone());
                    false
                } else {
                    true
                }
            })
            .collect();
        children[i].children = kept;

        let count = children[i].children.len();
        let shrank = count < original_count;

        match count {
            0 => {
                let columns = children.remove(i);
                cs.removed.push(columns.id.clone());
                if let Some(pid) = parent_id {
                    cs.updated.insert(pid.clone());
                }
                *changed = true;
            }
            1 => {
                let mut columns = children.remove(i);
                let mut survivor = columns.children.pop().expect("count checked");
                cs.removed.push(survivor.id.clone());
                cs.removed.push(columns.id.clone());

                for (offset, child) in survivor.children.drain(..).enumerate() {
                    children.insert(i + offset, child);
                }
                if let Some(pid) = parent_id {
                    cs.updated.insert(pid.clone());
                }
                *changed = true;
            }
            _ if shrank => {
                renormalize_column_widths(&mut children[i]);
                cs.updated.insert(children[i].id.clone());
                *changed = true;
            }
            _ => {}
        }
    }
    Ok(())
}

impl Mutation {
    /// Validate without applying.
    pub fn validate(&self, doc: &Document) -> Result<(), MutationError> {
        match self {
            Mutation::Insert { node, parent, .. } => validate_insert(doc, node, parent.as_ref()),
            Mutation::Remove { node_id } => {
                if doc.contains(node_id) {
                    Ok(())
                } else {
                    Err(MutationError::NotFound(node_id.clone()))
                }
            }
            Mutation::Move {
                node_id, new_parent, ..
            } => validate_move(doc, node_id, new_parent.as_ref()),
            Mutation::SplitIntoColumns {
                target_id, incoming, ..
            } => validate_split(doc, target_id, incoming),
        }
    }
}
