//! Node and tree definitions for Blockdoc documents
//!
//! This crate holds the pure data model: typed content nodes ("blocks"),
//! their open property maps, and the 2-D geometry primitives the editor
//! algorithms read. No mutation behavior lives here — structural edits go
//! through `blockdoc-editor`, which is the only sanctioned mutation path.

pub mod geometry;
pub mod node;

pub use geometry::{Point, Rect};
pub use node::{Node, NodeFactory, NodeId, NodeKind, Properties, SequentialFactory};
