//! # Geometry-based reconciliation
//!
//! The free-form canvas view derives parent/child relationships purely from
//! 2-D containment: after every committed move the whole forest is rebuilt
//! from a flat node set, then container heights are recomputed bottom-up.
//! There is no incremental path — rebuilding from scratch is what makes
//! cycles structurally impossible.
//!
//! Heights come from the host's [`RectProvider`] (the visual layer measures
//! rendered content), falling back to the node's `height` property, then
//! [`MIN_HEIGHT`].

use crate::document::Document;
use crate::mutations::{ChangeSet, MutationError};
use blockdoc_model::{Node, NodeId, Point, Rect};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Smallest height a canvas container may have.
pub const MIN_HEIGHT: f64 = 50.0;

/// Breathing room kept below the lowest child when auto-sizing.
pub const PADDING_BOTTOM: f64 = 20.0;

/// Snap radius in screen pixels; divided by the zoom factor to get world units.
pub const SNAP_DISTANCE: f64 = 10.0;

/// Width assumed for nodes that carry no `width` property.
pub const DEFAULT_WIDTH: f64 = 300.0;

/// The visual-layer seam: measured rectangles for rendered nodes.
pub trait RectProvider {
    fn rect_of(&self, id: &NodeId) -> Option<Rect>;
}

/// No measurements: geometry comes entirely from node properties.
impl RectProvider for () {
    fn rect_of(&self, _id: &NodeId) -> Option<Rect> {
        None
    }
}

impl RectProvider for HashMap<NodeId, Rect> {
    fn rect_of(&self, id: &NodeId) -> Option<Rect> {
        self.get(id).copied()
    }
}

/// Axis of a snap guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapAxis {
    Vertical,
    Horizontal,
}

/// A guide line to display while the dragged rect is snapped to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapGuide {
    pub axis: SnapAxis,
    pub position: f64,
}

/// Outcome of a snap query: the correction to apply to the dragged
/// position and the guides that explain it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapResult {
    pub adjust_x: f64,
    pub adjust_y: f64,
    pub guides: Vec<SnapGuide>,
}

impl SnapResult {
    pub fn snapped(&self) -> bool {
        self.adjust_x != 0.0 || self.adjust_y != 0.0
    }
}

/// Containment-based reconciler for the canvas view.
#[derive(Debug, Clone)]
pub struct GeometryReconciler {
    pub min_height: f64,
    pub padding_bottom: f64,
    pub snap_distance: f64,
    pub default_width: f64,
}

impl Default for GeometryReconciler {
    fn default() -> Self {
        Self {
            min_height: MIN_HEIGHT,
            padding_bottom: PADDING_BOTTOM,
            snap_distance: SNAP_DISTANCE,
            default_width: DEFAULT_WIDTH,
        }
    }
}

impl GeometryReconciler {
    /// Rigidly translate a node and its entire current subtree. Runs
    /// before reconciliation so visually nested content moves together
    /// even though the hierarchy is about to be recomputed.
    pub fn translate_subtree(
        &self,
        doc: &mut Document,
        id: &NodeId,
        delta: Point,
    ) -> Result<(), MutationError> {
        let node = doc
            .find_mut(id)
            .ok_or_else(|| MutationError::NotFound(id.clone()))?;
        shift_positions(node, delta.x, delta.y);
        doc.bump_version();
        Ok(())
    }

    /// Rebuild the whole hierarchy from bounding-box containment and
    /// recompute container heights bottom-up.
    ///
    /// Never fails: a node with no eligible parent degrades to root
    /// placement. Running twice without position changes yields the same
    /// assignment (idempotent). Returns every container whose child set or
    /// computed height changed.
    pub fn reconcile_all(&self, doc: &mut Document, rects: &dyn RectProvider) -> ChangeSet {
        // Remember the previous assignment to report what changed.
        let mut prior_children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut prior_heights: HashMap<NodeId, Option<f64>> = HashMap::new();
        for root in doc.roots() {
            for node in root.iter_subtree() {
                prior_children.insert(
                    node.id.clone(),
                    node.children.iter().map(|c| c.id.clone()).collect(),
                );
                prior_heights.insert(node.id.clone(), node.properties.height());
            }
        }

        // 1. Flatten: every node joins one flat list, hierarchy discarded.
        let mut flat: Vec<Node> = Vec::new();
        for root in doc.take_roots() {
            strip_into(root, &mut flat);
        }

        // 2. Containment pass: for each node pick the tightest container
        //    whose rect holds its top-left corner. Ties on area break to
        //    the smaller id so the result is independent of scan order.
        let entries: Vec<Rect> = flat.iter().map(|n| self.node_rect(n, rects)).collect();
        let mut parent_of: Vec<Option<usize>> = vec![None; flat.len()];

        for c in 0..flat.len() {
            let corner = Point::new(entries[c].x, entries[c].y);
            let mut best: Option<usize> = None;

            for p in 0..flat.len() {
                if p == c || !flat[p].is_container() || !entries[p].contains_point(corner) {
                    continue;
                }
                best = match best {
                    None => Some(p),
                    Some(current) => {
                        let (area, cur_area) = (entries[p].area(), entries[current].area());
                        if area < cur_area || (area == cur_area && flat[p].id < flat[current].id) {
                            Some(p)
                        } else {
                            Some(current)
                        }
                    }
                };
            }
            parent_of[c] = best;
        }

        // Mutual containment (identical top-left corners) would make two
        // nodes pick each other; demote the node closing the cycle to root
        // so every chain terminates.
        for c in 0..flat.len() {
            let mut seen = HashSet::new();
            let mut cursor = c;
            while let Some(p) = parent_of[cursor] {
                if !seen.insert(cursor) {
                    parent_of[cursor] = None;
                    break;
                }
                cursor = p;
            }
        }

        // 3. Rebuild the forest. Children keep flat (preorder) order, not
        //    spatial order.
        let mut child_indices: Vec<Vec<usize>> = vec![Vec::new(); flat.len()];
        let mut root_indices: Vec<usize> = Vec::new();
        for (c, parent) in parent_of.iter().enumerate() {
            match parent {
                Some(p) => child_indices[*p].push(c),
                None => root_indices.push(c),
            }
        }

        let leaf_heights: HashMap<NodeId, f64> = flat
            .iter()
            .zip(&entries)
            .map(|(n, r)| (n.id.clone(), r.height))
            .collect();

        let mut slots: Vec<Option<Node>> = flat.into_iter().map(Some).collect();
        let mut roots = Vec::with_capacity(root_indices.len());
        for index in root_indices {
            roots.push(assemble(index, &mut slots, &child_indices));
        }

        // 4. Bottom-up auto-size.
        for root in &mut roots {
            self.autosize(root, &leaf_heights);
        }

        doc.set_roots(roots);
        doc.bump_version();

        // Report containers whose children or height changed.
        let mut changes = ChangeSet::default();
        for root in doc.roots() {
            for node in root.iter_subtree() {
                let child_ids: Vec<NodeId> = node.children.iter().map(|c| c.id.clone()).collect();
                let children_changed =
                    prior_children.get(&node.id).map(|p| p != &child_ids).unwrap_or(true);
                let height_changed = prior_heights
                    .get(&node.id)
                    .map(|p| p != &node.properties.height())
                    .unwrap_or(true);

                if children_changed || (node.is_container() && height_changed) {
                    changes.updated.insert(node.id.clone());
                }
            }
        }

        debug!(affected = changes.updated.len(), "geometry reconciliation complete");
        changes
    }

    /// The rect used for containment tests: position and width from
    /// properties, height from the visual layer when available.
    pub fn node_rect(&self, node: &Node, rects: &dyn RectProvider) -> Rect {
        let measured = rects.rect_of(&node.id);
        let pos = node
            .properties
            .position()
            .or(measured.map(|r| Point::new(r.x, r.y)))
            .unwrap_or_default();
        let width = node
            .properties
            .width()
            .or(measured.map(|r| r.width))
            .unwrap_or(self.default_width);
        let height = measured
            .map(|r| r.height)
            .or(node.properties.height())
            .unwrap_or(self.min_height);
        Rect::new(pos.x, pos.y, width, height)
    }

    /// Candidate alignment rects for snapping: every root node except the
    /// dragged one.
    pub fn snap_targets(
        &self,
        doc: &Document,
        dragged: &NodeId,
        rects: &dyn RectProvider,
    ) -> Vec<Rect> {
        doc.roots()
            .iter()
            .filter(|n| &n.id != dragged)
            .map(|n| self.node_rect(n, rects))
            .collect()
    }

    /// Snap the dragged rect against candidate edges (left/right/center-x,
    /// top/bottom/center-y). The smallest delta under the zoom-scaled
    /// threshold wins per axis; ties keep the first candidate in target
    /// order. Guides describe the alignment at the snapped position.
    pub fn compute_snap(&self, dragged: Rect, targets: &[Rect], zoom: f64) -> SnapResult {
        let threshold = self.snap_distance / zoom;
        let mut result = SnapResult::default();

        let dragged_x = [dragged.left(), dragged.right(), dragged.center_x()];
        let dragged_y = [dragged.top(), dragged.bottom(), dragged.center_y()];

        let mut min_dx = threshold;
        let mut min_dy = threshold;

        for target in targets {
            let target_x = [target.left(), target.right(), target.center_x()];
            let target_y = [target.top(), target.bottom(), target.center_y()];

            for dp in dragged_x {
                for tp in target_x {
                    let d = tp - dp;
                    if d.abs() < min_dx {
                        min_dx = d.abs();
                        result.adjust_x = d;
                    }
                }
            }
            for dp in dragged_y {
                for tp in target_y {
                    let d = tp - dp;
                    if d.abs() < min_dy {
                        min_dy = d.abs();
                        result.adjust_y = d;
                    }
                }
            }
        }

        if !result.snapped() {
            return result;
        }

        let snapped = dragged.translated(result.adjust_x, result.adjust_y);
        let snapped_x = [snapped.left(), snapped.right()];
        let snapped_y = [snapped.top(), snapped.bottom()];

        for target in targets {
            for edge in [target.left(), target.right()] {
                if snapped_x.iter().any(|s| (s - edge).abs() < 1.0) {
                    push_guide(&mut result.guides, SnapAxis::Vertical, edge);
                }
            }
            if (snapped.center_x() - target.center_x()).abs() < 1.0 {
                push_guide(&mut result.guides, SnapAxis::Vertical, target.center_x());
            }
            for edge in [target.top(), target.bottom()] {
                if snapped_y.iter().any(|s| (s - edge).abs() < 1.0) {
                    push_guide(&mut result.guides, SnapAxis::Horizontal, edge);
                }
            }
            if (snapped.center_y() - target.center_y()).abs() < 1.0 {
                push_guide(&mut result.guides, SnapAxis::Horizontal, target.center_y());
            }
        }

        result
    }

    /// Depth-first auto-size; returns the node's effective height so the
    /// parent can size around it.
    fn autosize(&self, node: &mut Node, leaf_heights: &HashMap<NodeId, f64>) -> f64 {
        let own_y = node.properties.position().unwrap_or_default().y;

        let mut max_child_bottom: Option<f64> = None;
        // Split borrow: collect child extents before touching properties.
        let mut child_extents = Vec::with_capacity(node.children.len());
        for child in &mut node.children {
            let child_y = child.properties.position().unwrap_or_default().y;
            let child_height = self.autosize(child, leaf_heights);
            child_extents.push(child_y + child_height);
        }
        for bottom in child_extents {
            max_child_bottom = Some(max_child_bottom.map_or(bottom, |m: f64| m.max(bottom)));
        }

        if node.is_container() {
            let lowest = match max_child_bottom {
                Some(bottom) => (own_y + self.min_height).max(bottom + self.padding_bottom),
                None => own_y + self.min_height,
            };
            let height = lowest - own_y;
            node.properties.set_height(height);
            height
        } else {
            leaf_heights
                .get(&node.id)
                .copied()
                .unwrap_or(self.min_height)
        }
    }
}

fn push_guide(guides: &mut Vec<SnapGuide>, axis: SnapAxis, position: f64) {
    let duplicate = guides
        .iter()
        .any(|g| g.axis == axis && g.position == position);
    if !duplicate {
        guides.push(SnapGuide { axis, position });
    }
}

fn shift_positions(node: &mut Node, dx: f64, dy: f64) {
    let pos = node.properties.position().unwrap_or_default();
    node.properties.set_position(Point::new(pos.x + dx, pos.y + dy));
    for child in &mut node.children {
        shift_positions(child, dx, dy);
    }
}

fn strip_into(mut node: Node, out: &mut Vec<Node>) {
    let children = std::mem::take(&mut node.children);
    out.push(node);
    for child in children {
        strip_into(child, out);
    }
}

fn assemble(index: usize, slots: &mut Vec<Option<Node>>, child_indices: &[Vec<usize>]) -> Node {
    let mut node = slots[index].take().expect("node assembled twice");
    for &child in &child_indices[index] {
        let built = assemble(child, slots, child_indices);
        node.children.push(built);
    }
    node
}
