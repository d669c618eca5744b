//! Array containers: heterogeneous children instantiated from prefab
//! schema alternatives, positional (JSON array) or keyed by dynamic name
//! (JSON object). Uniform block-arrays share the add/remove lifecycle.

use std::sync::Arc;

use serde_json::Value;

use formtree_schema::{ContainerKind, SchemaNode};

use crate::error::EditError;
use crate::tree::node::match_prefab;
use crate::tree::{ChangeKind, DocumentTree, NodeBody, NodeId};

impl DocumentTree {
    /// Materializes array children from existing document data, picking a
    /// prefab per element by JSON-type match.
    pub(crate) fn materialize_array(&mut self, id: NodeId) {
        let schema = self.node(id).schema.clone();
        if schema.prefabs.is_empty() {
            return;
        }
        let mut first_prefab = None;
        match (schema.container, self.node(id).value.clone()) {
            (ContainerKind::List, Value::Array(items)) => {
                for (i, item) in items.into_iter().enumerate() {
                    let chosen = match_prefab(&schema.prefabs, &item);
                    first_prefab.get_or_insert(chosen);
                    let child = self.create_node(
                        schema.prefabs[chosen].clone(),
                        item,
                        Some(id),
                        Some(i),
                        None,
                    );
                    self.push_array_child(id, child);
                }
            }
            (ContainerKind::Map, Value::Object(map)) => {
                for (key, item) in map {
                    let chosen = match_prefab(&schema.prefabs, &item);
                    first_prefab.get_or_insert(chosen);
                    let child = self.create_node(
                        schema.prefabs[chosen].clone(),
                        item,
                        Some(id),
                        None,
                        Some(key),
                    );
                    self.push_array_child(id, child);
                }
            }
            // Mismatched value; stays childless until discarded.
            _ => {}
        }
        if schema.single_prefab {
            if let NodeBody::Array(body) = &mut self.node_mut(id).body {
                body.chosen_prefab = first_prefab;
            }
        }
    }

    /// Appends a new child with the prefab's schema-computed default.
    ///
    /// Prefab resolution: an explicit `prefab` index wins; a sole allowed
    /// prefab is implicit; a single-type array reuses its remembered
    /// choice; otherwise the caller must choose.
    /// For keyed containers `name` supplies the dynamic name (generated
    /// from the prefab name when omitted); colliding names are rejected.
    pub fn add_child(
        &mut self,
        container: NodeId,
        prefab: Option<usize>,
        name: Option<&str>,
    ) -> Result<NodeId, EditError> {
        if self.is_read_only() {
            return Err(EditError::ReadOnly);
        }
        let schema = self.node(container).schema.clone();
        if matches!(self.node(container).body, NodeBody::Block(_)) && schema.is_uniform_block() {
            return self.add_uniform_child(container, &schema);
        }
        if !matches!(self.node(container).body, NodeBody::Array(_)) {
            return Err(EditError::NotAContainer);
        }

        let chosen = self.resolve_prefab_choice(container, &schema, prefab)?;
        let prefab_schema = schema.prefabs[chosen].clone();
        let value = prefab_schema.default_value();

        let child = match schema.container {
            ContainerKind::List => {
                let index = self.child_ids(container).len();
                self.create_node(prefab_schema, value, Some(container), Some(index), None)
            }
            ContainerKind::Map => {
                let key = match name {
                    Some(requested) => {
                        if self.find_child(container, requested).is_some() {
                            return Err(EditError::NameCollision {
                                name: requested.to_string(),
                            });
                        }
                        requested.to_string()
                    }
                    None => self.unique_child_name(container, &prefab_schema.name),
                };
                self.create_node(prefab_schema, value, Some(container), None, Some(key))
            }
        };
        self.push_array_child(container, child);
        if let NodeBody::Array(body) = &mut self.node_mut(container).body {
            if schema.single_prefab {
                body.chosen_prefab = Some(chosen);
            }
        }
        self.finish_add(container, child)
    }

    fn add_uniform_child(
        &mut self,
        container: NodeId,
        schema: &Arc<SchemaNode>,
    ) -> Result<NodeId, EditError> {
        let element = schema
            .children
            .first()
            .cloned()
            .expect("uniform block declares no element type");
        let index = self.child_ids(container).len();
        let value = element.default_value();
        let child = self.create_node(element, value, Some(container), Some(index), None);
        self.push_block_child(container, child);
        self.finish_add(container, child)
    }

    fn finish_add(&mut self, container: NodeId, child: NodeId) -> Result<NodeId, EditError> {
        self.apply_child_to_parent(container, child);
        self.bind_subtree(child);
        self.resolve_families_subtree(child);
        self.emit(container, ChangeKind::ChildAdded(child));
        self.write_back(container);
        Ok(child)
    }

    fn resolve_prefab_choice(
        &self,
        container: NodeId,
        schema: &Arc<SchemaNode>,
        explicit: Option<usize>,
    ) -> Result<usize, EditError> {
        if let Some(choice) = explicit {
            if choice >= schema.prefabs.len() {
                return Err(EditError::NoSuchPrefab(choice));
            }
            return Ok(choice);
        }
        if schema.prefabs.len() == 1 {
            return Ok(0);
        }
        if schema.single_prefab {
            if let NodeBody::Array(body) = &self.node(container).body {
                if let Some(remembered) = body.chosen_prefab {
                    return Ok(remembered);
                }
            }
        }
        Err(EditError::PrefabChoiceRequired)
    }

    /// Detaches `child` and removes its storage entry: by index for
    /// positional containers (later siblings shift down), by key for keyed
    /// ones. Emptying a single-type array forgets its remembered prefab.
    pub fn remove_child(&mut self, container: NodeId, child: NodeId) -> Result<(), EditError> {
        if self.is_read_only() {
            return Err(EditError::ReadOnly);
        }
        // Only array members and uniform-block elements are removable;
        // schema-declared children of a named block are fixed.
        let removable = match &self.node(container).body {
            NodeBody::Array(_) => true,
            NodeBody::Block(_) => self.node(container).schema.is_uniform_block(),
            _ => false,
        };
        if !removable {
            return Err(EditError::NotAContainer);
        }
        if !self.child_ids(container).contains(&child) {
            return Err(EditError::NoSuchChild);
        }
        let index = self.node(child).index;
        let key = self.node(child).dynamic_name.clone();
        self.detach_subtree(child);

        match &mut self.node_mut(container).body {
            NodeBody::Array(body) => {
                body.children.retain(|c| *c != child);
                if body.children.is_empty() {
                    body.chosen_prefab = None;
                }
            }
            NodeBody::Block(body) => body.children.retain(|c| *c != child),
            _ => unreachable!("removable container changed kind"),
        }

        match (index, key) {
            (Some(i), _) => {
                if let Some(arr) = self.node_mut(container).value.as_array_mut() {
                    if i < arr.len() {
                        arr.remove(i);
                    }
                }
                // Re-index the survivors.
                for (pos, sibling) in self.child_ids(container).into_iter().enumerate() {
                    self.node_mut(sibling).index = Some(pos);
                }
            }
            (None, Some(name)) => {
                if let Some(map) = self.node_mut(container).value.as_object_mut() {
                    map.shift_remove(&name);
                }
            }
            (None, None) => {}
        }

        self.emit(container, ChangeKind::ChildRemoved(child));
        self.write_back(container);
        Ok(())
    }

    /// Renames a dynamically-named member. A collision with a sibling's
    /// name is rejected with the original name left in place and storage
    /// untouched; otherwise the old key is removed and the new one set in
    /// the same operation.
    pub fn rename(&mut self, child: NodeId, new_name: &str) -> Result<(), EditError> {
        if self.is_read_only() {
            return Err(EditError::ReadOnly);
        }
        let Some(old_name) = self.node(child).dynamic_name.clone() else {
            return Err(EditError::NotRenamable);
        };
        if old_name == new_name {
            return Ok(());
        }
        let parent = self.node(child).parent.ok_or(EditError::NotRenamable)?;
        let collides = self
            .child_ids(parent)
            .into_iter()
            .any(|sibling| sibling != child && self.display_name(sibling) == new_name);
        if collides {
            return Err(EditError::NameCollision {
                name: new_name.to_string(),
            });
        }

        if let Some(map) = self.node_mut(parent).value.as_object_mut() {
            map.shift_remove(&old_name);
        }
        self.node_mut(child).dynamic_name = Some(new_name.to_string());
        self.apply_child_to_parent(parent, child);
        self.emit(
            child,
            ChangeKind::Renamed {
                old: old_name,
                new: new_name.to_string(),
            },
        );
        self.write_back(parent);
        Ok(())
    }

    pub(crate) fn push_array_child(&mut self, id: NodeId, child: NodeId) {
        match &mut self.node_mut(id).body {
            NodeBody::Array(body) => body.children.push(child),
            _ => unreachable!("push_array_child on a non-array node"),
        }
    }

    fn unique_child_name(&self, container: NodeId, base: &str) -> String {
        if self.find_child(container, base).is_none() {
            return base.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}_{n}");
            if self.find_child(container, &candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}
