//! Block containers: fixed schema-declared children over a JSON object,
//! or one uniform repeated element over a JSON array.

use indexmap::IndexMap;
use serde_json::Value;

use crate::tree::{DocumentTree, NodeBody, NodeId};

impl DocumentTree {
    /// Materializes a block's children from its current value.
    ///
    /// Running this on an already-initialized block is a logic error and
    /// panics; the internal rebuild path clears the flag first.
    pub(crate) fn materialize_block(&mut self, id: NodeId) {
        {
            let NodeBody::Block(body) = &mut self.node_mut(id).body else {
                unreachable!("materialize_block on a non-block node");
            };
            if body.initialized {
                panic!("block child set initialized twice");
            }
            body.initialized = true;
        }
        if self.node(id).schema.is_uniform_block() {
            self.materialize_uniform(id);
        } else {
            self.materialize_named(id);
        }
    }

    /// Walks the schema children in declared order. Two children sharing a
    /// name merge into one twin family, created lazily on the second
    /// occurrence. Document properties that match no declared child stay in
    /// the block's value as inert residual data.
    fn materialize_named(&mut self, id: NodeId) {
        let schema = self.node(id).schema.clone();
        let mut first_by_name: IndexMap<String, NodeId> = IndexMap::new();
        let mut family_by_name: IndexMap<String, crate::tree::FamilyId> = IndexMap::new();

        for child_schema in &schema.children {
            let name = child_schema.name.clone();
            if let Some(&fid) = family_by_name.get(&name) {
                let member =
                    self.create_node(child_schema.clone(), Value::Null, Some(id), None, None);
                self.join_family(fid, member);
                self.push_block_child(id, member);
                continue;
            }
            if let Some(&prev) = first_by_name.get(&name) {
                // Second occurrence of the name: fold the earlier child and
                // this one into a fresh family. Both start parked; initial
                // resolution hands the document value to the winner.
                let fid = self.alloc_family(name.clone(), Some(id));
                self.park_for_family(prev);
                self.join_family(fid, prev);
                let member =
                    self.create_node(child_schema.clone(), Value::Null, Some(id), None, None);
                self.join_family(fid, member);
                self.push_block_child(id, member);
                match &mut self.node_mut(id).body {
                    NodeBody::Block(body) => body.families.push(fid),
                    _ => unreachable!(),
                }
                family_by_name.insert(name, fid);
                continue;
            }

            let doc_value = self.node(id).value.get(&name).cloned();
            let value = doc_value.unwrap_or_else(|| child_schema.default_value());
            let child = self.create_node(child_schema.clone(), value, Some(id), None, None);
            first_by_name.insert(name, child);
            self.push_block_child(id, child);
        }

        // Populate absent savable-by-requirement entries with defaults;
        // everything already present in storage is left untouched.
        for child in self.child_ids(id) {
            if self.node(child).family.is_none() && self.is_savable(child) {
                self.apply_child_to_parent(id, child);
            }
        }
    }

    /// One repeated element type per JSON array entry.
    fn materialize_uniform(&mut self, id: NodeId) {
        let schema = self.node(id).schema.clone();
        let element = schema
            .children
            .first()
            .cloned()
            .expect("uniform block declares no element type");
        let Value::Array(items) = self.node(id).value.clone() else {
            // Mismatched value; no children until the host discards it.
            return;
        };
        for (i, item) in items.into_iter().enumerate() {
            let child = self.create_node(element.clone(), item, Some(id), Some(i), None);
            self.push_block_child(id, child);
        }
    }

    pub(crate) fn push_block_child(&mut self, id: NodeId, child: NodeId) {
        match &mut self.node_mut(id).body {
            NodeBody::Block(body) => body.children.push(child),
            _ => unreachable!("push_block_child on a non-block node"),
        }
    }

    fn join_family(&mut self, fid: crate::tree::FamilyId, member: NodeId) {
        self.node_mut(member).family = Some(fid);
        self.families[fid.0].members.push(member);
        self.families[fid.0].seen.push(false);
    }

    /// Parks a node that turned out to be a family member: its value moves
    /// out of the way so initial selection can judge all members equally.
    fn park_for_family(&mut self, member: NodeId) {
        self.node_mut(member).value = Value::Null;
        if self.node(member).is_container() {
            self.rebuild_container(member);
        }
    }
}
