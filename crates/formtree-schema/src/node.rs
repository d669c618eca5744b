use std::sync::Arc;

use serde_json::Value;

use crate::kind::{type_match, ContainerKind, NodeKind, NumericKind, TypeMatch};

/// One candidate value for a suggestion-backed node, with the label the
/// presentation layer shows for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub value: Value,
    pub display: String,
}

impl Suggestion {
    pub fn new(value: Value, display: impl Into<String>) -> Self {
        Suggestion {
            value,
            display: display.into(),
        }
    }

    /// Suggestion whose display text is the value's own rendering.
    pub fn plain(value: Value) -> Self {
        let display = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Suggestion { value, display }
    }
}

/// Declarative description of one position in the document tree.
///
/// Schema nodes are immutable once built and shared by reference; the editor
/// core holds an `Arc<SchemaNode>` per view-model node. Two sibling nodes may
/// declare the same `name` — the editor merges them into a twin family of
/// mutually-exclusive alternatives.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub name: String,
    /// Identifier registered in the event graph; referenced by conditions.
    ///
    /// Identifiers are unique within a document's scope, so an identifier
    /// must not appear on an array prefab or uniform-block element: every
    /// materialized instance would re-register the same name, which is a
    /// fatal logic error.
    pub identifier: Option<String>,
    /// Boolean visibility expression (formtree-expression grammar).
    pub condition: Option<Value>,
    /// Declared default; ignored when its type does not match `kind`.
    pub default: Option<Value>,
    /// Declared numeric bounds, narrowing the kind's intrinsic range.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_length: Option<usize>,
    pub required: bool,
    /// The member's key is user-editable rather than schema-fixed.
    pub dynamic_name: bool,
    pub suggestions: Vec<Suggestion>,
    /// When set, values outside the suggestion set are flagged invalid.
    pub suggestions_required: bool,
    /// Key into the root's suggestion registry for dynamic candidates.
    pub suggestion_key: Option<String>,
    pub container: ContainerKind,
    /// Declared children (Block) or the uniform element type (block-array).
    pub children: Vec<Arc<SchemaNode>>,
    /// Allowed element alternatives (Array).
    pub prefabs: Vec<Arc<SchemaNode>>,
    /// Array holds one element type at a time; first add fixes the prefab.
    pub single_prefab: bool,
    pub description: Option<String>,
}

impl SchemaNode {
    fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        SchemaNode {
            kind,
            name: name.into(),
            identifier: None,
            condition: None,
            default: None,
            min: None,
            max: None,
            max_length: None,
            required: false,
            dynamic_name: false,
            suggestions: Vec::new(),
            suggestions_required: false,
            suggestion_key: None,
            container: ContainerKind::Map,
            children: Vec::new(),
            prefabs: Vec::new(),
            single_prefab: false,
            description: None,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(NodeKind::Bool, name)
    }

    pub fn number(name: impl Into<String>, numeric: NumericKind) -> Self {
        Self::new(NodeKind::Number(numeric), name)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(NodeKind::String, name)
    }

    pub fn enumeration(name: impl Into<String>, values: Vec<Suggestion>) -> Self {
        let mut node = Self::new(NodeKind::Enum, name);
        node.suggestions = values;
        node.suggestions_required = true;
        node
    }

    pub fn array(name: impl Into<String>, prefabs: Vec<Arc<SchemaNode>>) -> Self {
        let mut node = Self::new(NodeKind::Array, name);
        node.container = ContainerKind::List;
        node.prefabs = prefabs;
        node
    }

    pub fn block(name: impl Into<String>, children: Vec<Arc<SchemaNode>>) -> Self {
        let mut node = Self::new(NodeKind::Block, name);
        node.children = children;
        node
    }

    /// Block-array: a JSON array of one uniform element type.
    pub fn block_array(name: impl Into<String>, element: Arc<SchemaNode>) -> Self {
        let mut node = Self::new(NodeKind::Block, name);
        node.container = ContainerKind::List;
        node.children = vec![element];
        node
    }

    pub fn unknown(name: impl Into<String>) -> Self {
        Self::new(NodeKind::Unknown, name)
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn dynamic_name(mut self) -> Self {
        self.dynamic_name = true;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<Suggestion>, required: bool) -> Self {
        self.suggestions = suggestions;
        self.suggestions_required = required;
        self
    }

    pub fn with_suggestion_key(mut self, key: impl Into<String>) -> Self {
        self.suggestion_key = Some(key.into());
        self
    }

    pub fn keyed(mut self) -> Self {
        self.container = ContainerKind::Map;
        self
    }

    pub fn single_prefab(mut self) -> Self {
        self.single_prefab = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn into_arc(self) -> Arc<SchemaNode> {
        Arc::new(self)
    }

    /// Whether a block-kind node repeats one uniform element over a JSON
    /// array instead of declaring fixed object members.
    pub fn is_uniform_block(&self) -> bool {
        self.kind == NodeKind::Block && self.container == ContainerKind::List
    }

    pub fn declares_child(&self, name: &str) -> bool {
        self.children.iter().any(|c| c.name == name)
    }

    /// Tests a document value's runtime type against this node's kind.
    pub fn value_matches(&self, value: &Value) -> TypeMatch {
        type_match(self.kind, value)
    }

    /// The effective numeric kind; panics on non-numeric nodes, which marks
    /// a logic error in the caller rather than bad user input.
    pub fn numeric_kind(&self) -> NumericKind {
        match self.kind {
            NodeKind::Number(numeric) => numeric,
            other => panic!("numeric_kind on non-numeric schema node {:?}", other),
        }
    }

    /// Schema-computed default value for this position.
    ///
    /// The declared default wins when its type matches the kind (numbers are
    /// clamped into the effective range); otherwise the kind's zero value.
    pub fn default_value(&self) -> Value {
        if let Some(declared) = &self.default {
            if self.value_matches(declared) == TypeMatch::Match {
                if let NodeKind::Number(numeric) = self.kind {
                    let n = declared.as_f64().unwrap_or(0.0);
                    return number_value(numeric, numeric.clamp(n, self.min, self.max));
                }
                return declared.clone();
            }
        }
        match self.kind {
            NodeKind::Bool => Value::Bool(false),
            NodeKind::Number(numeric) => {
                number_value(numeric, numeric.zero(self.min, self.max))
            }
            NodeKind::String => Value::String(String::new()),
            NodeKind::Enum => self
                .suggestions
                .first()
                .map(|s| s.value.clone())
                .unwrap_or_else(|| Value::String(String::new())),
            NodeKind::Array | NodeKind::Block => match self.container {
                ContainerKind::List => Value::Array(Vec::new()),
                ContainerKind::Map => Value::Object(serde_json::Map::new()),
            },
            NodeKind::Unknown => Value::Null,
        }
    }

    /// Whether `value` is inside the declared suggestion set. Nodes without
    /// mandatory suggestions accept everything.
    pub fn suggestion_allows(&self, value: &Value) -> bool {
        if !self.suggestions_required || self.suggestions.is_empty() {
            return true;
        }
        self.suggestions.iter().any(|s| &s.value == value)
    }
}

fn number_value(numeric: NumericKind, n: f64) -> Value {
    if numeric.is_integer() {
        Value::Number(serde_json::Number::from(n as i64))
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_prefers_declared_value_when_type_matches() {
        let node = SchemaNode::string("title").with_default(json!("untitled"));
        assert_eq!(node.default_value(), json!("untitled"));

        // A mistyped declared default falls back to the kind zero.
        let node = SchemaNode::string("title").with_default(json!(3));
        assert_eq!(node.default_value(), json!(""));
    }

    #[test]
    fn numeric_default_is_clamped_into_declared_bounds() {
        let node = SchemaNode::number("speed", NumericKind::Int)
            .with_bounds(10.0, 100.0)
            .with_default(json!(500));
        assert_eq!(node.default_value(), json!(100));

        let node = SchemaNode::number("speed", NumericKind::Int).with_bounds(10.0, 100.0);
        assert_eq!(node.default_value(), json!(10));
    }

    #[test]
    fn enum_default_is_first_suggestion() {
        let node = SchemaNode::enumeration(
            "mode",
            vec![Suggestion::plain(json!("fast")), Suggestion::plain(json!("slow"))],
        );
        assert_eq!(node.default_value(), json!("fast"));
        assert!(node.suggestion_allows(&json!("slow")));
        assert!(!node.suggestion_allows(&json!("medium")));
    }

    #[test]
    fn container_default_follows_container_kind() {
        let arr = SchemaNode::array("items", Vec::new());
        assert_eq!(arr.default_value(), json!([]));

        let keyed = SchemaNode::array("items", Vec::new()).keyed();
        assert_eq!(keyed.default_value(), json!({}));

        let block = SchemaNode::block("settings", Vec::new());
        assert_eq!(block.default_value(), json!({}));

        let uniform = SchemaNode::block_array("tags", SchemaNode::string("tag").into_arc());
        assert!(uniform.is_uniform_block());
        assert_eq!(uniform.default_value(), json!([]));
    }
}
