//! The document tree: an arena of node view-models over one JSON document.
//!
//! All state lives behind `&mut DocumentTree`; every mutation runs its
//! downstream effects (storage write-back, condition re-evaluation, twin
//! reselection) synchronously and depth-first before returning. Listeners
//! receive [`TreeEvent`] notifications but cannot call back into the tree
//! during delivery — they record and re-read afterwards, which is the
//! contract the presentation layer works against.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use formtree_schema::SchemaNode;

use crate::error::EditError;
use crate::events::{EventScope, TreeId};

mod array;
mod block;
mod node;
mod twin;

pub(crate) use node::{ArrayBody, BlockBody, NodeBody, NodeState};
pub(crate) use twin::FamilyState;

/// Index of a live node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Index of a twin family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FamilyId(pub(crate) usize);

/// What changed on a node.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    Value { old: Value, new: Value },
    ConditionMet(bool),
    Expanded(bool),
    ChildAdded(NodeId),
    ChildRemoved(NodeId),
    TwinSwitched { old: Option<NodeId>, new: Option<NodeId> },
    Renamed { old: String, new: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeEvent {
    pub node: NodeId,
    pub kind: ChangeKind,
}

/// View-model tree over one JSON document.
pub struct DocumentTree {
    pub(crate) tree_id: TreeId,
    pub(crate) nodes: Vec<Option<NodeState>>,
    pub(crate) families: Vec<FamilyState>,
    pub(crate) scope: EventScope,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) root_family: Option<FamilyId>,
    pub(crate) document: Value,
    read_only: bool,
    listeners: BTreeMap<u64, Box<dyn FnMut(TreeEvent)>>,
    next_listener_id: u64,
}

impl DocumentTree {
    /// Builds the tree for `schemas` over `document`.
    ///
    /// A single schema becomes the sole top-level child; several schemas
    /// become a top-level twin family whose selection picks the document's
    /// active representation. `scope` is this document's identifier scope
    /// (chain one off a host document's scope for nested editing).
    pub fn load(
        schemas: &[Arc<SchemaNode>],
        document: Value,
        read_only: bool,
        scope: EventScope,
    ) -> Self {
        assert!(!schemas.is_empty(), "at least one top-level schema required");
        let mut tree = DocumentTree {
            tree_id: TreeId::next(),
            nodes: Vec::new(),
            families: Vec::new(),
            scope,
            roots: Vec::new(),
            root_family: None,
            document: document.clone(),
            read_only,
            listeners: BTreeMap::new(),
            next_listener_id: 1,
        };

        if schemas.len() == 1 {
            let root = tree.create_node(schemas[0].clone(), document, None, None, None);
            tree.roots.push(root);
            tree.bind_subtree(root);
            tree.resolve_families_subtree(root);
            tree.document = tree.node(root).value.clone();
        } else {
            let fid = tree.alloc_family(schemas[0].name.clone(), None);
            tree.root_family = Some(fid);
            for schema in schemas {
                let member = tree.create_node(schema.clone(), Value::Null, None, None, None);
                tree.node_mut(member).family = Some(fid);
                tree.families[fid.0].members.push(member);
                tree.families[fid.0].seen.push(false);
                tree.roots.push(member);
            }
            for member in tree.roots.clone() {
                tree.bind_subtree(member);
                tree.resolve_families_subtree(member);
            }
            let doc = if tree.document.is_null() {
                None
            } else {
                Some(tree.document.clone())
            };
            tree.resolve_family_initial(fid, doc.as_ref());
        }
        tree
    }

    // ------------------------------------------------------------- arena

    pub(crate) fn node(&self, id: NodeId) -> &NodeState {
        self.nodes[id.0].as_ref().expect("dead node id")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeState {
        self.nodes[id.0].as_mut().expect("dead node id")
    }

    pub(crate) fn is_alive(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).map_or(false, Option::is_some)
    }

    pub(crate) fn alloc(&mut self, state: NodeState) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(state));
        id
    }

    pub(crate) fn alloc_family(&mut self, name: String, owner: Option<NodeId>) -> FamilyId {
        let id = FamilyId(self.families.len());
        self.families.push(FamilyState::new(name, owner));
        id
    }

    // ----------------------------------------------------------- readers

    /// The document value, kept synchronized with every node edit.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Top-level members (one per loaded schema).
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// The top-level member currently representing the document.
    pub fn selected_root(&self) -> Option<NodeId> {
        match self.root_family {
            Some(fid) => self.families[fid.0].selected_member(),
            None => self.roots.first().copied(),
        }
    }

    pub fn schema(&self, id: NodeId) -> &Arc<SchemaNode> {
        &self.node(id).schema
    }

    pub fn value(&self, id: NodeId) -> &Value {
        &self.node(id).value
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn index(&self, id: NodeId) -> Option<usize> {
        self.node(id).index
    }

    pub fn dynamic_name(&self, id: NodeId) -> Option<&str> {
        self.node(id).dynamic_name.as_deref()
    }

    /// The name the node is stored under: dynamic name if it carries one,
    /// else the schema-declared name.
    pub fn display_name(&self, id: NodeId) -> &str {
        let n = self.node(id);
        n.dynamic_name.as_deref().unwrap_or(&n.schema.name)
    }

    pub fn is_condition_met(&self, id: NodeId) -> bool {
        self.node(id).condition_met
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.node(id).expanded
    }

    pub fn family_of(&self, id: NodeId) -> Option<FamilyId> {
        self.node(id).family
    }

    pub fn family_members(&self, fid: FamilyId) -> &[NodeId] {
        &self.families[fid.0].members
    }

    pub fn selected_member(&self, fid: FamilyId) -> Option<NodeId> {
        self.families[fid.0].selected_member()
    }

    /// Child nodes in declared/positional order. Empty for leaves.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.child_ids(id)
    }

    pub(crate) fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        match &self.node(id).body {
            NodeBody::Block(body) => body.children.clone(),
            NodeBody::Array(body) => body.children.clone(),
            _ => Vec::new(),
        }
    }

    /// Finds a direct child by its stored name.
    pub fn find_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.child_ids(id)
            .into_iter()
            .find(|c| self.display_name(*c) == name)
    }

    /// The document value's runtime type disagrees with the schema type.
    /// Null counts as absent, not invalid. Unknown-kind nodes never report
    /// an invalid type.
    pub fn is_invalid_value_type(&self, id: NodeId) -> bool {
        let n = self.node(id);
        n.schema.value_matches(&n.value).is_mismatch()
    }

    /// The type is fine but the value falls outside a mandatory suggestion
    /// set. Rendered distinctly from an invalid type.
    pub fn is_invalid_value(&self, id: NodeId) -> bool {
        let n = self.node(id);
        !self.is_invalid_value_type(id) && !n.schema.suggestion_allows(&n.value)
    }

    /// Whether this node's value is written into its parent's storage.
    ///
    /// Required nodes and structurally mandatory positions (top-level
    /// members, array elements, uniform block elements) always save; other
    /// nodes save only while their value differs from the schema default.
    pub fn is_savable(&self, id: NodeId) -> bool {
        let n = self.node(id);
        if n.schema.required || self.is_structural(id) {
            return true;
        }
        n.value != n.schema.default_value()
    }

    fn is_structural(&self, id: NodeId) -> bool {
        match self.node(id).parent {
            None => true,
            Some(p) => {
                let parent = self.node(p);
                match &parent.body {
                    NodeBody::Array(_) => true,
                    NodeBody::Block(_) => parent.schema.is_uniform_block(),
                    _ => false,
                }
            }
        }
    }

    // --------------------------------------------------------- listeners

    pub fn on_change<F>(&mut self, listener: F) -> u64
    where
        F: FnMut(TreeEvent) + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.listeners.insert(id, Box::new(listener));
        id
    }

    pub fn off_change(&mut self, listener_id: u64) -> bool {
        self.listeners.remove(&listener_id).is_some()
    }

    pub(crate) fn emit(&mut self, node: NodeId, kind: ChangeKind) {
        let event = TreeEvent { node, kind };
        for listener in self.listeners.values_mut() {
            listener(event.clone());
        }
    }

    // ----------------------------------------------------------- writers

    /// Replaces the node's value.
    ///
    /// No-op writes (deep equality) are rejected silently. A successful
    /// write emits a `Value` change, updates the parent container's
    /// storage, pushes the value into the node's identifier cell (firing
    /// dependent conditions), and re-checks twin selection when the value's
    /// runtime type changed. Container values rebuild their children.
    pub fn set_value(&mut self, id: NodeId, value: Value) -> Result<(), EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let old = self.node(id).value.clone();
        if old == value {
            return Ok(());
        }
        let schema = self.node(id).schema.clone();
        let type_changed = schema.value_matches(&old) != schema.value_matches(&value);

        self.node_mut(id).value = value.clone();
        if self.node(id).is_container() {
            self.rebuild_container(id);
        }
        self.emit(
            id,
            ChangeKind::Value {
                old,
                new: value.clone(),
            },
        );
        self.write_back(id);
        self.push_own_cell(id);
        if type_changed {
            if let Some(fid) = self.node(id).family {
                self.resolve_family(fid);
            }
        }
        Ok(())
    }

    /// Replaces a type-mismatched value with the schema default; a matching
    /// or absent value is left alone. Recovers invalid external data
    /// without clobbering good data.
    pub fn ensure_value(&mut self, id: NodeId) -> Result<(), EditError> {
        if !self.is_invalid_value_type(id) {
            return Ok(());
        }
        let default = self.node(id).schema.default_value();
        self.set_value(id, default)
    }

    /// Unconditional reset to the schema default — the explicit discard
    /// operation behind the presentation layer's "discard invalid value".
    pub fn discard_to_default(&mut self, id: NodeId) -> Result<(), EditError> {
        let default = self.node(id).schema.default_value();
        self.set_value(id, default)
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        if self.node(id).expanded == expanded {
            return;
        }
        self.node_mut(id).expanded = expanded;
        self.emit(id, ChangeKind::Expanded(expanded));
    }

    /// Requests a twin switch to `member`. The member must be part of a
    /// family; selection may later move again when conditions change.
    pub fn switch_twin(&mut self, member: NodeId) -> Result<(), EditError> {
        if self.read_only {
            return Err(EditError::ReadOnly);
        }
        let Some(fid) = self.node(member).family else {
            return Err(EditError::NoSuchTwinMember);
        };
        let Some(index) = self.families[fid.0].members.iter().position(|m| *m == member)
        else {
            return Err(EditError::NoSuchTwinMember);
        };
        self.transition_family(fid, Some(index));
        Ok(())
    }

    // ------------------------------------------------------- propagation

    /// Pushes the node's current value into its identifier cell and walks
    /// the subscribed conditions. Set-then-fire: the cell already holds the
    /// new value while subscribers re-evaluate.
    pub(crate) fn push_own_cell(&mut self, id: NodeId) {
        let Some(cell) = self.node(id).own_cell.clone() else {
            return;
        };
        let subscribers = cell.set(self.node(id).value.clone());
        // Edges of other trees sharing the cell (nested documents on a
        // chained scope) are theirs to walk, not ours.
        for (tree, subscriber) in subscribers {
            if tree == self.tree_id {
                self.recompute_condition(subscriber);
            }
        }
    }

    pub(crate) fn recompute_condition(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        let Some(binding) = &self.node(id).condition else {
            return;
        };
        let met = binding.evaluate();
        if met == self.node(id).condition_met {
            return;
        }
        self.node_mut(id).condition_met = met;
        self.emit(id, ChangeKind::ConditionMet(met));
        if let Some(fid) = self.node(id).family {
            self.resolve_family(fid);
        }
    }

    /// Writes `id`'s value into its parent storage and propagates upward
    /// to the document value. Deselected twin members are parked — their
    /// writes stay on the node until the family selects them again.
    pub(crate) fn write_back(&mut self, id: NodeId) {
        if let Some(fid) = self.node(id).family {
            if self.families[fid.0].selected_member() != Some(id) {
                return;
            }
        }
        match self.node(id).parent {
            None => {
                if self.selected_root() == Some(id) {
                    self.document = self.node(id).value.clone();
                }
            }
            Some(parent) => {
                self.apply_child_to_parent(parent, id);
                self.write_back(parent);
            }
        }
    }

    /// Applies one child's entry into its parent's storage value. Only the
    /// child's own key/index is touched; sibling entries and residual data
    /// stay as they are.
    pub(crate) fn apply_child_to_parent(&mut self, parent: NodeId, child: NodeId) {
        let value = self.node(child).value.clone();
        let savable = self.is_savable(child);
        let key = self.display_name(child).to_string();
        let index = self.node(child).index;

        let is_block = matches!(self.node(parent).body, NodeBody::Block(_));
        let is_array = matches!(self.node(parent).body, NodeBody::Array(_));
        assert!(
            is_block || is_array,
            "write-back into a non-container parent"
        );
        let named_block = is_block && !self.node(parent).schema.is_uniform_block();

        if named_block {
            let Some(map) = self.node_mut(parent).value.as_object_mut() else {
                return;
            };
            if savable {
                map.insert(key, value);
            } else {
                map.shift_remove(&key);
            }
        } else if let Some(i) = index {
            let Some(arr) = self.node_mut(parent).value.as_array_mut() else {
                return;
            };
            // Pad ahead-of-length writes with nulls; never shrink.
            if i >= arr.len() {
                arr.resize(i + 1, Value::Null);
            }
            arr[i] = value;
        } else {
            // Keyed array member; always stored under its dynamic name.
            let Some(map) = self.node_mut(parent).value.as_object_mut() else {
                return;
            };
            map.insert(key, value);
        }
    }

    /// Re-runs materialization on a container after a wholesale value
    /// swap, tearing down and rebuilding its children.
    pub(crate) fn rebuild_container(&mut self, id: NodeId) {
        for child in self.child_ids(id) {
            self.detach_subtree(child);
        }
        let mut dead = Vec::new();
        match &mut self.node_mut(id).body {
            NodeBody::Block(body) => {
                body.children.clear();
                dead = std::mem::take(&mut body.families);
                body.initialized = false;
            }
            NodeBody::Array(body) => {
                body.children.clear();
                body.chosen_prefab = None;
            }
            _ => return,
        }
        for fid in dead {
            self.families[fid.0].alive = false;
        }
        self.materialize_children(id);
        for child in self.child_ids(id) {
            self.bind_subtree(child);
        }
        self.resolve_families_subtree(id);
    }

    /// Tears a subtree down: children first, then condition subscriptions,
    /// identifier cell, and the arena slot.
    pub(crate) fn detach_subtree(&mut self, id: NodeId) {
        for child in self.child_ids(id) {
            self.detach_subtree(child);
        }
        if let NodeBody::Block(body) = &self.node(id).body {
            for fid in body.families.clone() {
                self.families[fid.0].alive = false;
            }
        }
        let state = self.nodes[id.0].take().expect("detached node twice");
        if let Some(binding) = &state.condition {
            binding.unbind(id);
        }
        if state.own_cell.is_some() {
            if let Some(ident) = &state.schema.identifier {
                state.scope.unregister(ident);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list_tree(document: Value) -> DocumentTree {
        let schema = SchemaNode::array(
            "items",
            vec![SchemaNode::string("item").into_arc()],
        )
        .into_arc();
        DocumentTree::load(&[schema], document, false, EventScope::new())
    }

    #[test]
    fn positional_write_pads_with_nulls_and_never_shrinks() {
        let mut tree = list_tree(json!(["a", "b"]));
        let arr = tree.selected_root().expect("root");
        let child = tree.child_ids(arr)[1];

        // An index ahead of the stored length fills the gap with nulls.
        tree.node_mut(child).index = Some(4);
        tree.apply_child_to_parent(arr, child);
        assert_eq!(tree.node(arr).value, json!(["a", "b", null, null, "b"]));

        // Writing back at a low index leaves the tail alone.
        tree.node_mut(child).index = Some(0);
        tree.apply_child_to_parent(arr, child);
        assert_eq!(tree.node(arr).value, json!(["b", "b", null, null, "b"]));
    }

    #[test]
    fn detach_frees_the_arena_slot() {
        let mut tree = list_tree(json!(["a"]));
        let arr = tree.selected_root().expect("root");
        let child = tree.child_ids(arr)[0];
        assert!(tree.is_alive(child));
        tree.detach_subtree(child);
        assert!(!tree.is_alive(child));
    }
}
