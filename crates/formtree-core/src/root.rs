//! The top-level editing handle: a [`DocumentTree`] plus the options and
//! value-suggestion registry shared by everything the host loads.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use formtree_schema::{SchemaNode, Suggestion};

use crate::events::EventScope;
use crate::tree::{DocumentTree, NodeId};

/// Host-supplied settings for a loaded document.
#[derive(Debug, Clone)]
pub struct RootOptions {
    /// Reject every mutating operation.
    pub read_only: bool,
    /// Upper bound on suggestions returned per node.
    pub max_suggestions: usize,
    /// Include schema descriptions in display names where available.
    pub verbose_tooltips: bool,
}

impl Default for RootOptions {
    fn default() -> Self {
        RootOptions {
            read_only: false,
            max_suggestions: 32,
            verbose_tooltips: false,
        }
    }
}

/// Dynamic value suggestions keyed by suggestion-key, fed either directly
/// or lazily through installed provider callbacks. Resolved lists are
/// cached until invalidated.
#[derive(Default)]
pub struct SuggestionRegistry {
    entries: IndexMap<String, Vec<Suggestion>>,
    providers: IndexMap<String, Box<dyn FnMut(&str) -> Vec<Suggestion>>>,
}

impl SuggestionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a ready-made suggestion list under `key`, replacing any
    /// cached or previously inserted list.
    pub fn insert(&mut self, key: impl Into<String>, suggestions: Vec<Suggestion>) {
        self.entries.insert(key.into(), suggestions);
    }

    /// Installs a callback queried on first resolve of `key`.
    pub fn install_provider(
        &mut self,
        key: impl Into<String>,
        provider: impl FnMut(&str) -> Vec<Suggestion> + 'static,
    ) {
        let key = key.into();
        self.entries.shift_remove(&key);
        self.providers.insert(key, Box::new(provider));
    }

    /// Returns the suggestions for `key`, invoking and caching the
    /// provider result when no list is stored yet.
    pub fn resolve(&mut self, key: &str) -> &[Suggestion] {
        if !self.entries.contains_key(key) {
            let produced = match self.providers.get_mut(key) {
                Some(provider) => provider(key),
                None => Vec::new(),
            };
            self.entries.insert(key.to_string(), produced);
        }
        &self.entries[key]
    }

    /// Drops the cached list for `key` so the provider runs again.
    pub fn invalidate(&mut self, key: &str) {
        self.entries.shift_remove(key);
    }
}

/// A loaded document and everything attached to it.
pub struct Root {
    tree: DocumentTree,
    options: RootOptions,
    suggestions: SuggestionRegistry,
}

impl Root {
    /// Loads `document` against `schemas` with a fresh identifier scope.
    pub fn load(schemas: &[Arc<SchemaNode>], document: Value, options: RootOptions) -> Self {
        let tree = DocumentTree::load(schemas, document, options.read_only, EventScope::new());
        Root {
            tree,
            options,
            suggestions: SuggestionRegistry::new(),
        }
    }

    /// Loads a document whose identifier scope chains off `host`'s scope,
    /// so its conditions can read the host's identifiers while its own
    /// registrations stay local.
    pub fn load_nested(
        host: &Root,
        schemas: &[Arc<SchemaNode>],
        document: Value,
        options: RootOptions,
    ) -> Self {
        let scope = host.tree.scope.child();
        let tree = DocumentTree::load(schemas, document, options.read_only, scope);
        Root {
            tree,
            options,
            suggestions: SuggestionRegistry::new(),
        }
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DocumentTree {
        &mut self.tree
    }

    pub fn options(&self) -> &RootOptions {
        &self.options
    }

    pub fn suggestions_mut(&mut self) -> &mut SuggestionRegistry {
        &mut self.suggestions
    }

    /// Current serialized document.
    pub fn document(&self) -> &Value {
        self.tree.document()
    }

    /// Value suggestions for `node`: the schema's static list first, then
    /// any registry entries under the schema's suggestion key, truncated
    /// to the configured maximum. Duplicate values are kept once.
    pub fn suggestions_for(&mut self, node: NodeId) -> Vec<Suggestion> {
        let schema = self.tree.schema(node).clone();
        let mut out: Vec<Suggestion> = schema.suggestions.clone();
        if let Some(key) = &schema.suggestion_key {
            for dynamic in self.suggestions.resolve(key) {
                if !out.iter().any(|s| s.value == dynamic.value) {
                    out.push(dynamic.clone());
                }
            }
        }
        out.truncate(self.options.max_suggestions);
        out
    }
}
