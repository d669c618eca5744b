//! `formtree-core` — the view-model engine of the formtree editor.
//!
//! Given a [`formtree_schema::SchemaNode`] tree and a JSON document, the
//! engine materializes a tree of node view-models mirroring the schema,
//! keeps every node's value synchronized with its parent container's
//! storage, resolves inter-node boolean conditions through an identifier
//! event graph, and manages twin families (mutually-exclusive same-named
//! alternatives) and container child lifecycles.
//!
//! The engine is single-threaded and callback-driven: every recomputation
//! (condition re-evaluation, twin reselection, container write-back) runs
//! synchronously, depth-first, inside the mutation that triggered it. It
//! never touches a UI; presentation layers subscribe to [`tree::TreeEvent`]
//! notifications and call back into the tree to mutate.

pub mod condition;
pub mod error;
pub mod events;
pub mod root;
pub mod tree;

pub use error::EditError;
pub use events::{EventCell, EventScope, TreeId};
pub use root::{Root, RootOptions, SuggestionRegistry};
pub use tree::{ChangeKind, DocumentTree, FamilyId, NodeId, TreeEvent};
