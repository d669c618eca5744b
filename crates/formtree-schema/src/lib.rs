//! `formtree-schema` — schema node descriptors for the formtree editor.
//!
//! A schema is a read-only tree of [`SchemaNode`] values describing the shape
//! of an editable JSON document: leaf kinds (bool, numbers, strings, enums),
//! containers (arrays and blocks), conditional visibility expressions, and
//! suggestion lists. The editor core walks this tree to materialize its
//! view-model nodes; nothing in this crate mutates documents.

pub mod kind;
pub mod node;

pub use kind::{ContainerKind, NodeKind, NumericKind, TypeMatch};
pub use node::{SchemaNode, Suggestion};
