//! # Order-based drop resolution
//!
//! Translates a pointer position plus the target block's on-screen
//! rectangle into a symbolic drop action, then splices the dragged run
//! through the MutationEngine.
//!
//! Zone rules (pointer `(px, py)` against target rect `R`):
//! - outer 15% horizontal bands → `left`/`right` column split, unless the
//!   target is a column slot or table cell;
//! - otherwise containers claim the middle vertical band
//!   (`min(R.height * 0.3, 20)` away from both edges) as `inside-last`;
//! - otherwise `before`/`after` by y-midpoint.

use crate::document::Document;
use crate::mutations::{ChangeSet, MutationEngine, MutationError, SplitSide};
use blockdoc_model::{Node, NodeId, Point, Rect};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Symbolic drop position relative to the target block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropPosition {
    Before,
    After,
    InsideLast,
    Left,
    Right,
}

/// A resolved drop: where the dragged run will land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropAction {
    pub target_id: NodeId,
    pub position: DropPosition,
}

/// Drop-target resolver for the ordered (page) view.
#[derive(Debug, Default)]
pub struct OrderDropResolver {
    engine: MutationEngine,
}

impl OrderDropResolver {
    pub fn new(engine: MutationEngine) -> Self {
        Self { engine }
    }

    pub fn engine_mut(&mut self) -> &mut MutationEngine {
        &mut self.engine
    }

    /// Decide the symbolic drop position. Pure: no tree mutation.
    pub fn resolve(
        &self,
        doc: &Document,
        pointer: Point,
        target_id: &NodeId,
        target_rect: Rect,
    ) -> Result<DropAction, MutationError> {
        let target = doc
            .find(target_id)
            .ok_or_else(|| MutationError::NotFound(target_id.clone()))?;

        let x_zone = target_rect.width * 0.15;
        let y_midpoint = target_rect.top() + target_rect.height / 2.0;

        let position = if target.kind.accepts_column_split()
            && pointer.x < target_rect.left() + x_zone
        {
            DropPosition::Left
        } else if target.kind.accepts_column_split()
            && pointer.x > target_rect.right() - x_zone
        {
            DropPosition::Right
        } else {
            let edge_buffer = (target_rect.height * 0.3).min(20.0);
            let in_middle_band = pointer.y > target_rect.top() + edge_buffer
                && pointer.y < target_rect.bottom() - edge_buffer;

            if target.is_container() && in_middle_band {
                DropPosition::InsideLast
            } else if pointer.y < y_midpoint {
                DropPosition::Before
            } else {
                DropPosition::After
            }
        };

        Ok(DropAction {
            target_id: target_id.clone(),
            position,
        })
    }

    /// Splice the dragged nodes to the resolved position as one atomic
    /// batch: every dragged node is removed first (relative order kept),
    /// then the run is reinserted contiguously. Ends with a normalization
    /// sweep; the returned set covers prior parents, the insertion parent,
    /// and every container normalization touched.
    pub fn apply(
        &mut self,
        doc: &mut Document,
        drag_set: &[NodeId],
        action: &DropAction,
    ) -> Result<ChangeSet, MutationError> {
        if drag_set.is_empty() {
            return Err(MutationError::InvalidTarget("empty drag set".to_string()));
        }
        if drag_set.contains(&action.target_id) {
            return Err(MutationError::InvalidTarget(
                "drop target is part of the drag set".to_string(),
            ));
        }
        for id in drag_set {
            if !doc.contains(id) {
                return Err(MutationError::NotFound(id.clone()));
            }
            if doc.is_descendant_of(&action.target_id, id) {
                return Err(MutationError::InvalidTarget(
                    "drop target sits inside a dragged subtree".to_string(),
                ));
            }
        }

        // Dropping into a container only works on actual containers; check
        // before anything is detached so failure has no partial effect.
        if action.position == DropPosition::InsideLast {
            let target = doc
                .find(&action.target_id)
                .ok_or_else(|| MutationError::NotFound(action.target_id.clone()))?;
            if !target.is_container() {
                return Err(MutationError::InvalidTarget(format!(
                    "{:?} cannot receive children",
                    target.kind
                )));
            }
        }

        let mut changes = ChangeSet::default();

        // Ids nested inside another dragged subtree travel with it; dragging
        // them separately would double-remove.
        let top_level: Vec<&NodeId> = drag_set
            .iter()
            .filter(|id| {
                !drag_set
                    .iter()
                    .any(|other| other != *id && doc.is_descendant_of(id, other))
            })
            .collect();

        let mut removed_nodes: Vec<Node> = Vec::with_capacity(top_level.len());
        for id in &top_level {
            changes.updated.extend(doc.parent_of(id).cloned());
            let node = doc
                .detach(id)
                .ok_or_else(|| MutationError::NotFound((*id).clone()))?;
            removed_nodes.push(node);
        }

        debug!(
            count = removed_nodes.len(),
            target = %action.target_id,
            position = ?action.position,
            "applying drop"
        );

        match action.position {
            DropPosition::Before | DropPosition::After => {
                let parent = doc.parent_of(&action.target_id).cloned();
                let base = doc
                    .index_in_parent(&action.target_id)
                    .ok_or_else(|| MutationError::NotFound(action.target_id.clone()))?;
                let insert_index = if action.position == DropPosition::Before {
                    base
                } else {
                    base + 1
                };

                for (offset, node) in removed_nodes.into_iter().enumerate() {
                    doc.insert_at(node, parent.as_ref(), insert_index + offset)
                        .map_err(|n| MutationError::NotFound(n.id))?;
                }
                changes.updated.extend(parent);
                doc.bump_version();
            }

            DropPosition::InsideLast => {
                let end = doc
                    .find(&action.target_id)
                    .map(|t| t.children.len())
                    .ok_or_else(|| MutationError::NotFound(action.target_id.clone()))?;

                for (offset, node) in removed_nodes.into_iter().enumerate() {
                    doc.insert_at(node, Some(&action.target_id), end + offset)
                        .map_err(|n| MutationError::NotFound(n.id))?;
                }
                changes.updated.insert(action.target_id.clone());
                doc.bump_version();
            }

            DropPosition::Left | DropPosition::Right => {
                let side = if action.position == DropPosition::Left {
                    SplitSide::Left
                } else {
                    SplitSide::Right
                };
                let affected =
                    self.engine
                        .split_into_columns(doc, &action.target_id, removed_nodes, side)?;
                changes.updated.extend(affected);
            }
        }

        changes.merge(self.engine.normalize(doc)?);
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockdoc_model::NodeKind;

    fn paragraph(id: &str) -> Node {
        Node::new(NodeId::from(id), NodeKind::Paragraph)
    }

    fn resolver() -> OrderDropResolver {
        OrderDropResolver::default()
    }

    fn target_rect() -> Rect {
        Rect::new(100.0, 100.0, 200.0, 100.0)
    }

    #[test]
    fn left_and_right_zones_are_fifteen_percent() {
        let doc = Document::from_roots(vec![paragraph("t")]);
        let r = resolver();
        let rect = target_rect(); // x zone = 30px

        let left = r
            .resolve(&doc, Point::new(120.0, 150.0), &NodeId::from("t"), rect)
            .unwrap();
        assert_eq!(left.position, DropPosition::Left);

        let right = r
            .resolve(&doc, Point::new(285.0, 150.0), &NodeId::from("t"), rect)
            .unwrap();
        assert_eq!(right.position, DropPosition::Right);
    }

    #[test]
    fn before_after_split_at_midpoint() {
        let doc = Document::from_roots(vec![paragraph("t")]);
        let r = resolver();
        let rect = target_rect();

        let before = r
            .resolve(&doc, Point::new(200.0, 120.0), &NodeId::from("t"), rect)
            .unwrap();
        assert_eq!(before.position, DropPosition::Before);

        let after = r
            .resolve(&doc, Point::new(200.0, 180.0), &NodeId::from("t"), rect)
            .unwrap();
        assert_eq!(after.position, DropPosition::After);
    }

    #[test]
    fn containers_claim_middle_band_as_inside_last() {
        let doc = Document::from_roots(vec![Node::new(NodeId::from("c"), NodeKind::Callout)]);
        let r = resolver();
        let rect = target_rect(); // buffer = min(30, 20) = 20

        let inside = r
            .resolve(&doc, Point::new(200.0, 150.0), &NodeId::from("c"), rect)
            .unwrap();
        assert_eq!(inside.position, DropPosition::InsideLast);

        // Near the top edge the container behaves like any block.
        let edge = r
            .resolve(&doc, Point::new(200.0, 110.0), &NodeId::from("c"), rect)
            .unwrap();
        assert_eq!(edge.position, DropPosition::Before);
    }

    #[test]
    fn column_slots_never_split() {
        let mut column = Node::new(NodeId::from("col"), NodeKind::Column);
        column.children.push(paragraph("x"));
        let doc = Document::from_roots(vec![column]);
        let r = resolver();

        // Pointer in the left 15% zone, but columns fall through to the
        // container/midpoint rules.
        let action = r
            .resolve(&doc, Point::new(105.0, 150.0), &NodeId::from("col"), target_rect())
            .unwrap();
        assert_eq!(action.position, DropPosition::InsideLast);
    }

    #[test]
    fn apply_rejects_target_inside_drag_set() {
        let mut callout = Node::new(NodeId::from("callout"), NodeKind::Callout);
        callout.children.push(paragraph("inner"));
        let mut doc = Document::from_roots(vec![callout, paragraph("b")]);
        let mut r = resolver();

        let action = DropAction {
            target_id: NodeId::from("inner"),
            position: DropPosition::After,
        };
        let err = r
            .apply(&mut doc, &[NodeId::from("callout")], &action)
            .unwrap_err();
        assert!(matches!(err, MutationError::InvalidTarget(_)));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn batch_drop_keeps_relative_order() {
        let mut doc = Document::from_roots(vec![
            paragraph("a"),
            paragraph("b"),
            paragraph("c"),
            paragraph("t"),
        ]);
        let mut r = resolver();

        let action = DropAction {
            target_id: NodeId::from("t"),
            position: DropPosition::Before,
        };
        r.apply(&mut doc, &[NodeId::from("c"), NodeId::from("a")], &action)
            .unwrap();

        let ids: Vec<String> = doc.roots().iter().map(|n| n.id.to_string()).collect();
        assert_eq!(ids, ["b", "c", "a", "t"]);
    }

    #[test]
    fn nested_drag_ids_travel_with_their_ancestor() {
        let mut callout = Node::new(NodeId::from("callout"), NodeKind::Callout);
        callout.children.push(paragraph("inner"));
        let mut doc = Document::from_roots(vec![callout, paragraph("t")]);
        let mut r = resolver();

        let action = DropAction {
            target_id: NodeId::from("t"),
            position: DropPosition::After,
        };
        r.apply(
            &mut doc,
            &[NodeId::from("callout"), NodeId::from("inner")],
            &action,
        )
        .unwrap();

        let ids: Vec<String> = doc.roots().iter().map(|n| n.id.to_string()).collect();
        assert_eq!(ids, ["t", "callout"]);
        assert_eq!(doc.parent_of(&NodeId::from("inner")), Some(&NodeId::from("callout")));
    }
}
