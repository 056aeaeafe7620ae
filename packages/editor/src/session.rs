//! # Drag sessions
//!
//! Models one pointer gesture on the canvas as an explicit state machine.
//! While the drag is live the document is never touched: `update` only
//! produces a [`DragPreview`] for the host to render. The structural work
//! (subtree translation, geometry reconciliation) happens exactly once, on
//! `commit`. `cancel` therefore needs no rollback.

use crate::document::Document;
use crate::errors::EditorError;
use crate::mutations::{ChangeSet, MutationError};
use crate::reconcile::{GeometryReconciler, RectProvider, SnapGuide};
use blockdoc_model::{NodeId, Point, Rect};
use tracing::debug;

/// Current phase of the canvas drag gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        node_id: NodeId,
        /// Rect of the dragged node when the gesture started.
        start_rect: Rect,
        /// Pointer position when the gesture started.
        start_pointer: Point,
        /// Zoom factor captured at gesture start; scales the snap radius.
        zoom: f64,
    },
}

/// What the host should render for the current pointer position.
#[derive(Debug, Clone, PartialEq)]
pub struct DragPreview {
    /// Proposed (snap-corrected) top-left of the dragged node.
    pub position: Point,
    pub guides: Vec<SnapGuide>,
}

/// One canvas drag gesture from pointer-down to drop.
#[derive(Debug, Default)]
pub struct DragSession {
    reconciler: GeometryReconciler,
    state: DragState,
}

impl Default for DragState {
    fn default() -> Self {
        DragState::Idle
    }
}

impl DragSession {
    pub fn new(reconciler: GeometryReconciler) -> Self {
        Self {
            reconciler,
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Start dragging `node_id` from `pointer`. Fails if a gesture is
    /// already live or the node does not exist.
    pub fn begin(
        &mut self,
        doc: &Document,
        rects: &dyn RectProvider,
        node_id: &NodeId,
        pointer: Point,
        zoom: f64,
    ) -> Result<(), EditorError> {
        if self.is_dragging() {
            return Err(EditorError::DragInProgress);
        }
        let node = doc
            .find(node_id)
            .ok_or_else(|| MutationError::NotFound(node_id.clone()))?;
        let start_rect = self.reconciler.node_rect(node, rects);

        debug!(node = %node_id, "drag started");
        self.state = DragState::Dragging {
            node_id: node_id.clone(),
            start_rect,
            start_pointer: pointer,
            zoom,
        };
        Ok(())
    }

    /// Compute the preview for the current pointer position. Pure with
    /// respect to the document.
    pub fn update(
        &self,
        doc: &Document,
        rects: &dyn RectProvider,
        pointer: Point,
    ) -> Result<DragPreview, EditorError> {
        let (node_id, proposed, zoom) = self.proposed_rect(pointer)?;

        let targets = self.reconciler.snap_targets(doc, &node_id, rects);
        let snap = self.reconciler.compute_snap(proposed, &targets, zoom);

        Ok(DragPreview {
            position: Point::new(proposed.x + snap.adjust_x, proposed.y + snap.adjust_y),
            guides: snap.guides,
        })
    }

    /// Drop at `pointer`: translate the dragged subtree to its snapped
    /// position, then reconcile the whole document. Ends the gesture.
    pub fn commit(
        &mut self,
        doc: &mut Document,
        rects: &dyn RectProvider,
        pointer: Point,
    ) -> Result<ChangeSet, EditorError> {
        let preview = self.update(doc, rects, pointer)?;
        let (node_id, start_rect) = match &self.state {
            DragState::Dragging {
                node_id, start_rect, ..
            } => (node_id.clone(), *start_rect),
            DragState::Idle => return Err(EditorError::NoActiveDrag),
        };

        let delta = Point::new(
            preview.position.x - start_rect.x,
            preview.position.y - start_rect.y,
        );
        self.reconciler.translate_subtree(doc, &node_id, delta)?;
        let mut changes = self.reconciler.reconcile_all(doc, rects);
        changes.updated.insert(node_id.clone());

        debug!(node = %node_id, dx = delta.x, dy = delta.y, "drag committed");
        self.state = DragState::Idle;
        Ok(changes)
    }

    /// Abandon the gesture. The document was never touched, so there is
    /// nothing to restore and no events to emit.
    pub fn cancel(&mut self) -> Result<(), EditorError> {
        if !self.is_dragging() {
            return Err(EditorError::NoActiveDrag);
        }
        self.state = DragState::Idle;
        Ok(())
    }

    fn proposed_rect(&self, pointer: Point) -> Result<(NodeId, Rect, f64), EditorError> {
        match &self.state {
            DragState::Dragging {
                node_id,
                start_rect,
                start_pointer,
                zoom,
            } => {
                let proposed = start_rect
                    .translated(pointer.x - start_pointer.x, pointer.y - start_pointer.y);
                Ok((node_id.clone(), proposed, *zoom))
            }
            DragState::Idle => Err(EditorError::NoActiveDrag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockdoc_model::{Node, NodeKind};
    use std::collections::HashMap;

    fn canvas_node(id: &str, x: f64, y: f64) -> Node {
        let mut node = Node::new(NodeId::from(id), NodeKind::Paragraph);
        node.properties.set_position(Point::new(x, y));
        node.properties.set_width(100.0);
        node
    }

    fn measured(entries: &[(&str, Rect)]) -> HashMap<NodeId, Rect> {
        entries
            .iter()
            .map(|(id, rect)| (NodeId::from(*id), *rect))
            .collect()
    }

    #[test]
    fn begin_twice_is_rejected() {
        let doc = Document::from_roots(vec![canvas_node("a", 0.0, 0.0)]);
        let mut session = DragSession::default();

        session
            .begin(&doc, &(), &NodeId::from("a"), Point::new(10.0, 10.0), 1.0)
            .unwrap();
        let err = session
            .begin(&doc, &(), &NodeId::from("a"), Point::new(10.0, 10.0), 1.0)
            .unwrap_err();
        assert!(matches!(err, EditorError::DragInProgress));
    }

    #[test]
    fn update_previews_without_mutating() {
        let doc = Document::from_roots(vec![canvas_node("a", 100.0, 100.0)]);
        let rects = measured(&[("a", Rect::new(100.0, 100.0, 100.0, 40.0))]);
        let mut session = DragSession::default();

        session
            .begin(&doc, &rects, &NodeId::from("a"), Point::new(120.0, 110.0), 1.0)
            .unwrap();
        let version_before = doc.version();

        let preview = session
            .update(&doc, &rects, Point::new(170.0, 140.0))
            .unwrap();
        assert_eq!(preview.position, Point::new(150.0, 130.0));
        assert_eq!(doc.version(), version_before);

        let node = doc.find(&NodeId::from("a")).unwrap();
        assert_eq!(node.properties.position(), Some(Point::new(100.0, 100.0)));
    }

    #[test]
    fn cancel_leaves_document_untouched() {
        let doc = Document::from_roots(vec![canvas_node("a", 100.0, 100.0)]);
        let mut session = DragSession::default();

        session
            .begin(&doc, &(), &NodeId::from("a"), Point::new(120.0, 110.0), 1.0)
            .unwrap();
        session.update(&doc, &(), Point::new(500.0, 500.0)).unwrap();
        let snapshot_before = doc.snapshot(&NodeId::from("a"));
        let version_before = doc.version();

        session.cancel().unwrap();

        assert_eq!(doc.snapshot(&NodeId::from("a")), snapshot_before);
        assert_eq!(doc.version(), version_before);
        assert!(!session.is_dragging());

        // A second cancel has nothing to end.
        assert!(matches!(
            session.cancel().unwrap_err(),
            EditorError::NoActiveDrag
        ));
    }

    #[test]
    fn commit_translates_and_ends_gesture() {
        let mut doc = Document::from_roots(vec![canvas_node("a", 100.0, 100.0)]);
        let rects = measured(&[("a", Rect::new(100.0, 100.0, 100.0, 40.0))]);
        let mut session = DragSession::default();

        session
            .begin(&doc, &rects, &NodeId::from("a"), Point::new(120.0, 110.0), 1.0)
            .unwrap();
        let changes = session
            .commit(&mut doc, &rects, Point::new(170.0, 140.0))
            .unwrap();

        assert!(changes.updated.contains(&NodeId::from("a")));
        assert!(!session.is_dragging());

        let node = doc.find(&NodeId::from("a")).unwrap();
        assert_eq!(node.properties.position(), Some(Point::new(150.0, 130.0)));
    }

    #[test]
    fn commit_applies_snap_correction() {
        let mut doc = Document::from_roots(vec![
            canvas_node("a", 100.0, 100.0),
            canvas_node("anchor", 200.0, 300.0),
        ]);
        let rects = measured(&[
            ("a", Rect::new(100.0, 100.0, 100.0, 40.0)),
            ("anchor", Rect::new(200.0, 300.0, 100.0, 40.0)),
        ]);
        let mut session = DragSession::default();

        session
            .begin(&doc, &rects, &NodeId::from("a"), Point::new(100.0, 100.0), 1.0)
            .unwrap();
        // Drop 4px shy of the anchor's left edge; snap closes the gap.
        session
            .commit(&mut doc, &rects, Point::new(196.0, 150.0))
            .unwrap();

        let node = doc.find(&NodeId::from("a")).unwrap();
        assert_eq!(node.properties.position().unwrap().x, 200.0);
    }
}
