//! # Blockdoc Editor
//!
//! Structural editing engine for block-based documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │ pointer input (page view)    pointer input (canvas)
//! └───────────────┬──────────────────────┬───────────┘
//!                 ↓                      ↓
//! ┌───────────────────────┐  ┌──────────────────────┐
//! │ OrderDropResolver     │  │ GeometryReconciler   │
//! │  zone → splice/split  │  │  containment rebuild │
//! └───────────┬───────────┘  └──────────┬───────────┘
//!             ↓                         ↓
//! ┌──────────────────────────────────────────────────┐
//! │ MutationEngine: atomic insert/remove/move/split  │
//! │  + normalize (columns dissolve/renormalize)      │
//! └───────────────────────┬──────────────────────────┘
//!                         ↓
//! ┌──────────────────────────────────────────────────┐
//! │ ChangeNotifier → history, references, selection  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Core principles
//!
//! 1. **Children arrays are source of truth**: parent back-references are a
//!    derived index, rebuilt atomically with every structural edit.
//! 2. **Atomic mutations**: every operation validates fully before touching
//!    the tree; a rejected move never partially applies.
//! 3. **Two reconciliation strategies, one engine**: the ordered page view
//!    and the geometric canvas view share the same mutation path and the
//!    same change-notification contract.
//! 4. **Collaborators are external**: history, persistence and reference
//!    indexing only see serialized subtree snapshots through change events.

mod document;
mod drop;
mod errors;
mod mutations;
mod notify;
mod reconcile;
mod session;
mod strategy;

pub use document::Document;
pub use drop::{DropAction, DropPosition, OrderDropResolver};
pub use errors::EditorError;
pub use mutations::{ChangeSet, Mutation, MutationEngine, MutationError, MutationResult, SplitSide};
pub use notify::{ChangeEvent, ChangeListener, ChangeNotifier, EditorContext, SelectionRegistry};
pub use reconcile::{
    GeometryReconciler, RectProvider, SnapAxis, SnapGuide, SnapResult, DEFAULT_WIDTH, MIN_HEIGHT,
    PADDING_BOTTOM, SNAP_DISTANCE,
};
pub use session::{DragPreview, DragSession, DragState};
pub use strategy::{CanvasGesture, CanvasStrategy, OrderGesture, OrderStrategy, ReconciliationStrategy};

// Re-export the model types most callers need.
pub use blockdoc_model::{Node, NodeFactory, NodeId, NodeKind, Point, Properties, Rect, SequentialFactory};
