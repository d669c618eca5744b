//! Node state and subtree materialization.
//!
//! A node wraps exactly one schema node plus its mutable value cell. Kind
//! dispatch is a tagged variant: the shared fields live on [`NodeState`],
//! everything kind-specific on [`NodeBody`]. Materialization runs in three
//! passes over a subtree — create nodes and register identifier cells,
//! bind conditions, resolve twin-family selections — so a condition may
//! reference an identifier declared later in schema order.

use std::sync::Arc;

use serde_json::Value;

use formtree_schema::{ContainerKind, NodeKind, SchemaNode};

use crate::condition::ConditionBinding;
use crate::events::{EventCell, EventScope};
use crate::tree::{DocumentTree, FamilyId, NodeId};

pub(crate) struct BlockBody {
    pub children: Vec<NodeId>,
    pub families: Vec<FamilyId>,
    pub initialized: bool,
}

pub(crate) struct ArrayBody {
    pub children: Vec<NodeId>,
    /// Remembered element choice for single-type arrays; cleared when the
    /// collection empties.
    pub chosen_prefab: Option<usize>,
}

/// Kind-specific half of a node view-model.
pub(crate) enum NodeBody {
    Bool,
    /// Number, string or enum leaf.
    Leaf,
    Block(BlockBody),
    Array(ArrayBody),
    /// Schema kind the editor does not understand; value passes through
    /// opaquely and never reports an invalid type.
    Unknown,
}

impl NodeBody {
    /// Total kind dispatch: every schema kind maps to exactly one body.
    pub fn for_kind(kind: NodeKind) -> NodeBody {
        match kind {
            NodeKind::Bool => NodeBody::Bool,
            NodeKind::Number(_) | NodeKind::String | NodeKind::Enum => NodeBody::Leaf,
            NodeKind::Block => NodeBody::Block(BlockBody {
                children: Vec::new(),
                families: Vec::new(),
                initialized: false,
            }),
            NodeKind::Array => NodeBody::Array(ArrayBody {
                children: Vec::new(),
                chosen_prefab: None,
            }),
            NodeKind::Unknown => NodeBody::Unknown,
        }
    }
}

pub(crate) struct NodeState {
    pub schema: Arc<SchemaNode>,
    pub body: NodeBody,
    pub value: Value,
    pub dynamic_name: Option<String>,
    pub index: Option<usize>,
    pub condition_met: bool,
    pub condition: Option<ConditionBinding>,
    pub family: Option<FamilyId>,
    pub parent: Option<NodeId>,
    pub scope: EventScope,
    pub expanded: bool,
    pub own_cell: Option<EventCell>,
}

impl NodeState {
    pub fn is_container(&self) -> bool {
        matches!(self.body, NodeBody::Block(_) | NodeBody::Array(_))
    }
}

impl DocumentTree {
    /// Creates a node for `schema` wrapping `value`, registers its
    /// identifier cell, and recursively materializes container children.
    /// Conditions are not bound here — callers run [`Self::bind_subtree`]
    /// once the surrounding identifiers all exist.
    pub(crate) fn create_node(
        &mut self,
        schema: Arc<SchemaNode>,
        value: Value,
        parent: Option<NodeId>,
        index: Option<usize>,
        dynamic_name: Option<String>,
    ) -> NodeId {
        let scope = self.scope.clone();
        let own_cell = schema.identifier.as_deref().map(|ident| scope.register(ident));
        if let Some(cell) = &own_cell {
            // Fresh cell, no subscribers yet; nothing to fire.
            let _ = cell.set(value.clone());
        }
        let body = NodeBody::for_kind(schema.kind);
        let id = self.alloc(NodeState {
            schema,
            body,
            value,
            dynamic_name,
            index,
            condition_met: true,
            condition: None,
            family: None,
            parent,
            scope,
            expanded: false,
            own_cell,
        });
        self.materialize_children(id);
        id
    }

    /// Instantiates container children from the node's current value.
    pub(crate) fn materialize_children(&mut self, id: NodeId) {
        match self.node(id).body {
            NodeBody::Block(_) => self.materialize_block(id),
            NodeBody::Array(_) => self.materialize_array(id),
            _ => {}
        }
    }

    /// Second pass: bind conditions through the whole subtree and seed
    /// each node's condition-met flag.
    pub(crate) fn bind_subtree(&mut self, id: NodeId) {
        if let Some(expr) = self.node(id).schema.condition.clone() {
            let scope = self.node(id).scope.clone();
            let binding = ConditionBinding::bind(expr, &scope, self.tree_id, id);
            let met = binding.evaluate();
            let state = self.node_mut(id);
            state.condition = Some(binding);
            state.condition_met = met;
        }
        for child in self.child_ids(id) {
            self.bind_subtree(child);
        }
    }

    /// Third pass: resolve the initial selection of every twin family in
    /// the subtree, deepest blocks first.
    pub(crate) fn resolve_families_subtree(&mut self, id: NodeId) {
        for child in self.child_ids(id) {
            self.resolve_families_subtree(child);
        }
        if let crate::tree::NodeBody::Block(body) = &self.node(id).body {
            for fid in body.families.clone() {
                let doc = self.family_document_value(fid);
                self.resolve_family_initial(fid, doc.as_ref());
            }
        }
    }

    /// The document value stored under a block family's shared name, if
    /// the block holds one.
    fn family_document_value(&self, fid: FamilyId) -> Option<Value> {
        let owner = self.families[fid.0].owner?;
        let name = &self.families[fid.0].name;
        self.node(owner).value.get(name).cloned()
    }
}

/// JSON type tag of a value.
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JSON type tag a schema node's values carry in storage.
pub(crate) fn declared_json_type(schema: &SchemaNode) -> &'static str {
    match schema.kind {
        NodeKind::Bool => "boolean",
        NodeKind::Number(_) => "number",
        NodeKind::String | NodeKind::Enum => "string",
        NodeKind::Array => match schema.container {
            ContainerKind::List => "array",
            ContainerKind::Map => "object",
        },
        NodeKind::Block => {
            if schema.is_uniform_block() {
                "array"
            } else {
                "object"
            }
        }
        // Unknown prefabs never win a type match; the fallback covers them.
        NodeKind::Unknown => "unknown",
    }
}

/// Picks the prefab for an existing element: first prefab whose declared
/// JSON type equals the element's, where object-shaped block prefabs must
/// also declare every property the element carries. Falls back to the
/// first prefab.
pub(crate) fn match_prefab(prefabs: &[Arc<SchemaNode>], element: &Value) -> usize {
    let tag = json_type(element);
    for (i, prefab) in prefabs.iter().enumerate() {
        if declared_json_type(prefab) != tag {
            continue;
        }
        if prefab.kind == NodeKind::Block && !prefab.is_uniform_block() {
            if let Value::Object(map) = element {
                if !map.keys().all(|k| prefab.declares_child(k)) {
                    continue;
                }
            }
        }
        return i;
    }
    0
}
