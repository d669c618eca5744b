//! Binding of a schema node's condition expression to the event graph.

use indexmap::IndexMap;
use serde_json::Value;

use formtree_expression::{evaluate_bool, references};

use crate::events::{EventCell, EventScope, TreeId};
use crate::tree::NodeId;

/// A node's live condition: the expression plus the identifier cells it
/// reads.
///
/// Identifier resolution is memoized at bind time — each referenced
/// identifier is resolved through the scope chain exactly once and the same
/// cell is reused for every later re-evaluation. Identifiers that do not
/// resolve read as `Null` forever.
pub struct ConditionBinding {
    expr: Value,
    tree: TreeId,
    resolved: IndexMap<String, Option<EventCell>>,
}

impl ConditionBinding {
    /// Resolves the expression's identifiers in `scope` and subscribes
    /// `owner` (a node of `tree`) to every cell that resolved.
    pub fn bind(expr: Value, scope: &EventScope, tree: TreeId, owner: NodeId) -> Self {
        let mut resolved = IndexMap::new();
        for ident in references(&expr) {
            let cell = scope.lookup(&ident);
            if let Some(cell) = &cell {
                cell.subscribe(tree, owner);
            }
            resolved.insert(ident, cell);
        }
        ConditionBinding {
            expr,
            tree,
            resolved,
        }
    }

    /// Re-evaluates against the memoized cells. A malformed expression
    /// degrades to `false` (condition not met) rather than failing.
    pub fn evaluate(&self) -> bool {
        let resolved = &self.resolved;
        evaluate_bool(&self.expr, &mut |ident| {
            resolved
                .get(ident)
                .and_then(|cell| cell.as_ref())
                .map(|cell| cell.value())
                .unwrap_or(Value::Null)
        })
        .unwrap_or(false)
    }

    /// Detaches `owner` from every subscribed cell. Only this binding's
    /// own tree edge is removed; another tree's node sharing the same
    /// arena index keeps its subscription.
    pub fn unbind(&self, owner: NodeId) {
        for cell in self.resolved.values().flatten() {
            cell.unsubscribe(self.tree, owner);
        }
    }
}
