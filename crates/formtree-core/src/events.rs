//! Identifier event graph: per-scope registries of "changed" cells.
//!
//! Every schema node that declares an identifier gets one cell holding the
//! identifier's last-known value. Conditions subscribe to the cells they
//! read; setting a cell's value is set-then-fire — the value is stored
//! first, then the subscriber list is walked (as a snapshot, so subscribers
//! may come and go during the walk without being re-entered for the same
//! write).
//!
//! Scopes chain: a lookup that misses locally walks the ancestor chain,
//! which is how nested documents see their host document's identifiers. A
//! scope holds only a weak reference to its parent and never owns it.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde_json::Value;

use crate::tree::NodeId;

/// Identity of one document tree. Subscriber edges carry it so trees can
/// share cells across a scope chain: a tree only recomputes its own
/// subscribers, and one tree's unsubscribe never strips another's edge
/// even when two trees' arena indices coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeId(u64);

impl TreeId {
    pub(crate) fn next() -> TreeId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TreeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

struct CellInner {
    ident: String,
    value: Value,
    subscribers: Vec<(TreeId, NodeId)>,
}

/// Handle to one identifier's value cell. Clones share the cell.
#[derive(Clone)]
pub struct EventCell(Rc<RefCell<CellInner>>);

impl EventCell {
    fn new(ident: &str) -> Self {
        EventCell(Rc::new(RefCell::new(CellInner {
            ident: ident.to_string(),
            value: Value::Null,
            subscribers: Vec::new(),
        })))
    }

    pub fn ident(&self) -> String {
        self.0.borrow().ident.clone()
    }

    pub fn value(&self) -> Value {
        self.0.borrow().value.clone()
    }

    /// Stores `value` and returns the subscribers to notify, in
    /// subscription order. The caller walks the returned snapshot; the
    /// live list may change underneath it without affecting this fire.
    #[must_use]
    pub fn set(&self, value: Value) -> Vec<(TreeId, NodeId)> {
        let mut inner = self.0.borrow_mut();
        inner.value = value;
        inner.subscribers.clone()
    }

    pub fn subscribe(&self, tree: TreeId, node: NodeId) {
        let mut inner = self.0.borrow_mut();
        if !inner.subscribers.contains(&(tree, node)) {
            inner.subscribers.push((tree, node));
        }
    }

    pub fn unsubscribe(&self, tree: TreeId, node: NodeId) {
        self.0
            .borrow_mut()
            .subscribers
            .retain(|edge| *edge != (tree, node));
    }

    fn clear_subscribers(&self) {
        self.0.borrow_mut().subscribers.clear();
    }

    pub fn same_cell(&self, other: &EventCell) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

struct ScopeInner {
    parent: Option<Weak<RefCell<ScopeInner>>>,
    cells: IndexMap<String, EventCell>,
}

/// One identifier scope. Clones share the scope.
#[derive(Clone)]
pub struct EventScope(Rc<RefCell<ScopeInner>>);

impl EventScope {
    pub fn new() -> Self {
        EventScope(Rc::new(RefCell::new(ScopeInner {
            parent: None,
            cells: IndexMap::new(),
        })))
    }

    /// Creates a scope that falls back to `self` for unresolved lookups.
    pub fn child(&self) -> EventScope {
        EventScope(Rc::new(RefCell::new(ScopeInner {
            parent: Some(Rc::downgrade(&self.0)),
            cells: IndexMap::new(),
        })))
    }

    /// Registers a fresh null-valued cell for `ident`.
    ///
    /// Identifiers are unique within a scope; double registration is a
    /// schema-wiring bug and panics.
    pub fn register(&self, ident: &str) -> EventCell {
        let cell = EventCell::new(ident);
        let replaced = self
            .0
            .borrow_mut()
            .cells
            .insert(ident.to_string(), cell.clone());
        if replaced.is_some() {
            panic!("identifier registered twice in one scope: {ident}");
        }
        cell
    }

    /// Drops the cell for `ident`, losing any subscriptions it carried.
    pub fn unregister(&self, ident: &str) {
        if let Some(cell) = self.0.borrow_mut().cells.shift_remove(ident) {
            cell.clear_subscribers();
        }
    }

    /// Resolves `ident` to its cell: local scope first, then the ancestor
    /// chain. `None` if the identifier was never registered.
    pub fn lookup(&self, ident: &str) -> Option<EventCell> {
        let inner = self.0.borrow();
        if let Some(cell) = inner.cells.get(ident) {
            return Some(cell.clone());
        }
        let mut parent = inner.parent.clone();
        drop(inner);
        while let Some(weak) = parent {
            let Some(scope) = weak.upgrade() else { break };
            let inner = scope.borrow();
            if let Some(cell) = inner.cells.get(ident) {
                return Some(cell.clone());
            }
            parent = inner.parent.clone();
        }
        None
    }
}

impl Default for EventScope {
    fn default() -> Self {
        Self::new()
    }
}
