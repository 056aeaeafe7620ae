//! # Change notification
//!
//! Mutations report the nodes they touched as a [`ChangeSet`]; the notifier
//! turns that set into per-node events for external collaborators
//! (persistence, selection, remote sync). An update to any node also
//! reports every ancestor up to the root, since an ancestor's serialized
//! snapshot embeds the changed subtree.

use crate::document::Document;
use crate::mutations::ChangeSet;
use blockdoc_model::NodeId;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::trace;

/// A single node-level change event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// The node's content or subtree changed; `snapshot` is its recursive
    /// serialized form.
    Updated { node_id: NodeId, snapshot: Value },
    /// The node was removed from the document.
    Deleted { node_id: NodeId },
}

impl ChangeEvent {
    pub fn node_id(&self) -> &NodeId {
        match self {
            ChangeEvent::Updated { node_id, .. } => node_id,
            ChangeEvent::Deleted { node_id } => node_id,
        }
    }
}

/// Receives change events after each committed mutation.
pub trait ChangeListener {
    fn on_change(&mut self, event: &ChangeEvent);
}

impl<F: FnMut(&ChangeEvent)> ChangeListener for F {
    fn on_change(&mut self, event: &ChangeEvent) {
        self(event)
    }
}

/// Fan-out point for change events.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Box<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    /// Emit an `updated` event for `id` and every ancestor, the node first,
    /// the root last.
    pub fn emit_subtree_changed(&mut self, doc: &Document, id: &NodeId) {
        let mut set = ChangeSet::default();
        set.updated.insert(id.clone());
        self.emit_change_set(doc, &set);
    }

    /// Translate a mutation's [`ChangeSet`] into events: `deleted` first
    /// (removed ids no longer resolve), then bubbled `updated` events —
    /// each surviving node followed by its ancestors, one event per node
    /// per flush.
    pub fn emit_change_set(&mut self, doc: &Document, changes: &ChangeSet) {
        for id in &changes.removed {
            self.emit(ChangeEvent::Deleted {
                node_id: id.clone(),
            });
        }

        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        let mut notify: Vec<NodeId> = Vec::new();
        for id in &changes.updated {
            if !doc.contains(id) {
                continue;
            }
            if seen.insert(id.clone()) {
                notify.push(id.clone());
            }
            for ancestor in doc.ancestors(id) {
                if seen.insert(ancestor.clone()) {
                    notify.push(ancestor);
                }
            }
        }

        for id in notify {
            if let Some(snapshot) = doc.snapshot(&id) {
                self.emit(ChangeEvent::Updated {
                    node_id: id,
                    snapshot,
                });
            }
        }
    }

    fn emit(&mut self, event: ChangeEvent) {
        trace!(node = %event.node_id(), "change event");
        for listener in &mut self.listeners {
            listener.on_change(&event);
        }
    }
}

/// The set of currently selected node ids, pruned automatically when
/// selected nodes are deleted.
#[derive(Debug, Default)]
pub struct SelectionRegistry {
    selected: BTreeSet<NodeId>,
}

impl SelectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, id: NodeId) {
        self.selected.insert(id);
    }

    pub fn set(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.selected = ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &NodeId) -> bool {
        self.selected.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.selected.iter()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    fn prune(&mut self, id: &NodeId) {
        self.selected.remove(id);
    }
}

impl ChangeListener for Rc<RefCell<SelectionRegistry>> {
    fn on_change(&mut self, event: &ChangeEvent) {
        if let ChangeEvent::Deleted { node_id } = event {
            self.borrow_mut().prune(node_id);
        }
    }
}

/// Shared per-editor state handed to the reconciliation strategies.
#[derive(Default)]
pub struct EditorContext {
    pub selection: Rc<RefCell<SelectionRegistry>>,
}

impl EditorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire the context's selection into a notifier so deletions prune it.
    pub fn attach(&self, notifier: &mut ChangeNotifier) {
        notifier.subscribe(Box::new(Rc::clone(&self.selection)));
    }
}
