//! # Reconciliation strategies
//!
//! Both editor views end a drag the same way: a gesture value goes in, a
//! [`ChangeSet`] comes out, and shared editor state (selection) is kept
//! consistent. The views differ only in what a gesture means — ordered
//! splice vs. free-form geometry — so that difference lives behind one
//! trait with an associated gesture type.

use crate::document::Document;
use crate::drop::OrderDropResolver;
use crate::errors::EditorError;
use crate::mutations::ChangeSet;
use crate::notify::EditorContext;
use crate::reconcile::{GeometryReconciler, RectProvider};
use blockdoc_model::{NodeId, Point, Rect};

/// A view-specific way to turn a finished drag into document changes.
pub trait ReconciliationStrategy {
    type Gesture;

    fn commit(
        &mut self,
        doc: &mut Document,
        gesture: Self::Gesture,
    ) -> Result<ChangeSet, EditorError>;
}

/// A finished drag in the ordered (page) view.
#[derive(Debug, Clone)]
pub struct OrderGesture {
    pub drag_set: Vec<NodeId>,
    pub pointer: Point,
    pub target_id: NodeId,
    pub target_rect: Rect,
}

/// Ordered-view strategy: resolve the drop zone, splice the dragged run.
#[derive(Default)]
pub struct OrderStrategy {
    resolver: OrderDropResolver,
    context: EditorContext,
}

impl OrderStrategy {
    pub fn new(resolver: OrderDropResolver, context: EditorContext) -> Self {
        Self { resolver, context }
    }

    pub fn context(&self) -> &EditorContext {
        &self.context
    }
}

impl ReconciliationStrategy for OrderStrategy {
    type Gesture = OrderGesture;

    fn commit(
        &mut self,
        doc: &mut Document,
        gesture: OrderGesture,
    ) -> Result<ChangeSet, EditorError> {
        let action = self.resolver.resolve(
            doc,
            gesture.pointer,
            &gesture.target_id,
            gesture.target_rect,
        )?;
        let changes = self.resolver.apply(doc, &gesture.drag_set, &action)?;

        // A completed splice ends the multi-select gesture.
        self.context.selection.borrow_mut().clear();
        Ok(changes)
    }
}

/// A finished drag in the canvas view: the node moved by `delta`.
#[derive(Debug, Clone)]
pub struct CanvasGesture {
    pub node_id: NodeId,
    pub delta: Point,
}

/// Canvas-view strategy: translate the subtree, then rebuild containment.
pub struct CanvasStrategy<P: RectProvider> {
    reconciler: GeometryReconciler,
    rects: P,
    context: EditorContext,
}

impl<P: RectProvider> CanvasStrategy<P> {
    pub fn new(reconciler: GeometryReconciler, rects: P, context: EditorContext) -> Self {
        Self {
            reconciler,
            rects,
            context,
        }
    }

    pub fn context(&self) -> &EditorContext {
        &self.context
    }

    pub fn rects_mut(&mut self) -> &mut P {
        &mut self.rects
    }
}

impl<P: RectProvider> ReconciliationStrategy for CanvasStrategy<P> {
    type Gesture = CanvasGesture;

    fn commit(
        &mut self,
        doc: &mut Document,
        gesture: CanvasGesture,
    ) -> Result<ChangeSet, EditorError> {
        self.reconciler
            .translate_subtree(doc, &gesture.node_id, gesture.delta)?;
        let mut changes = self.reconciler.reconcile_all(doc, &self.rects);
        changes.updated.insert(gesture.node_id.clone());

        // The moved node stays selected for follow-up nudges.
        self.context
            .selection
            .borrow_mut()
            .set([gesture.node_id]);
        Ok(changes)
    }
}
