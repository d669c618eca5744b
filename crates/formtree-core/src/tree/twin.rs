//! Twin families: mutually-exclusive same-named schema alternatives.
//!
//! At most one member of a family is selected — the active representation
//! of the shared name. Selection prefers the first condition-met member
//! (declared order) whose current value's runtime type matches its schema;
//! failing a type match, the first condition-met member; failing that,
//! nobody. Switching is transactional: parked values survive deselection,
//! a previously-unseen member gets its schema default installed, and the
//! owning container sees exactly one storage swap per change.

use serde_json::Value;

use formtree_schema::TypeMatch;

use crate::tree::{ChangeKind, DocumentTree, FamilyId, NodeId};

pub(crate) struct FamilyState {
    pub name: String,
    pub members: Vec<NodeId>,
    pub selected: Option<usize>,
    /// Which members have ever held a real value; selection of an unseen
    /// member installs the schema default instead of reusing `Null`.
    pub seen: Vec<bool>,
    /// Owning block container; `None` for the document's top-level family.
    pub owner: Option<NodeId>,
    pub alive: bool,
}

impl FamilyState {
    pub fn new(name: String, owner: Option<NodeId>) -> Self {
        FamilyState {
            name,
            members: Vec::new(),
            selected: None,
            seen: Vec::new(),
            owner,
            alive: true,
        }
    }

    pub fn selected_member(&self) -> Option<NodeId> {
        self.selected.map(|i| self.members[i])
    }
}

impl DocumentTree {
    /// Deterministic selection over the members' own (parked) values.
    fn compute_selection(&self, fid: FamilyId) -> Option<usize> {
        let members = &self.families[fid.0].members;
        let mut first_met = None;
        for (i, member) in members.iter().enumerate() {
            let state = self.node(*member);
            if !state.condition_met {
                continue;
            }
            if first_met.is_none() {
                first_met = Some(i);
            }
            if state.schema.value_matches(&state.value) == TypeMatch::Match {
                return Some(i);
            }
        }
        first_met
    }

    /// Initial selection at materialization time: every member is judged
    /// against the document's value for the shared name (none of them has
    /// been given data yet), and the winner receives that value.
    pub(crate) fn resolve_family_initial(&mut self, fid: FamilyId, doc: Option<&Value>) {
        let members = self.families[fid.0].members.clone();
        let mut first_met = None;
        let mut by_type = None;
        for (i, member) in members.iter().enumerate() {
            if !self.node(*member).condition_met {
                continue;
            }
            if first_met.is_none() {
                first_met = Some(i);
            }
            if let Some(doc) = doc {
                if by_type.is_none()
                    && self.node(*member).schema.value_matches(doc) == TypeMatch::Match
                {
                    by_type = Some(i);
                }
            }
        }
        let target = by_type.or(first_met);
        self.transition_family_with(fid, target.map(|i| (i, doc.cloned())));
    }

    /// Re-runs selection after a condition flip or a value-type change on
    /// the active member.
    pub(crate) fn resolve_family(&mut self, fid: FamilyId) {
        if !self.families[fid.0].alive {
            return;
        }
        let target = self.compute_selection(fid);
        if target == self.families[fid.0].selected {
            return;
        }
        self.transition_family_with(fid, target.map(|i| (i, None)));
    }

    /// Host-requested switch; reuses the transactional transition path.
    pub(crate) fn transition_family(&mut self, fid: FamilyId, target: Option<usize>) {
        self.transition_family_with(fid, target.map(|i| (i, None)))
    }

    fn transition_family_with(&mut self, fid: FamilyId, target: Option<(usize, Option<Value>)>) {
        let target_index = target.as_ref().map(|(i, _)| *i);
        let current = self.families[fid.0].selected;
        let incoming = target.and_then(|(_, v)| v);
        if target_index == current && incoming.is_none() {
            return;
        }

        let members = self.families[fid.0].members.clone();
        let old = current.map(|i| members[i]);
        let new = target_index.map(|i| members[i]);
        self.families[fid.0].selected = target_index;

        if let Some(i) = target_index {
            let member = members[i];
            if let Some(value) = incoming {
                self.install_member_value(member, value);
                self.families[fid.0].seen[i] = true;
            } else if !self.families[fid.0].seen[i] {
                let default = self.node(member).schema.default_value();
                self.install_member_value(member, default);
                self.families[fid.0].seen[i] = true;
            }
        }

        if let Some(old_member) = old {
            if new != Some(old_member) && self.node(old_member).expanded {
                // Deselected member is forced closed.
                self.node_mut(old_member).expanded = false;
                self.emit(old_member, ChangeKind::Expanded(false));
            }
        }

        self.apply_family_storage(fid);
        if let Some(new_member) = new {
            self.push_own_cell(new_member);
        }
        if old != new {
            let holder = self.families[fid.0].owner.or(new).or(old);
            if let Some(holder) = holder {
                self.emit(holder, ChangeKind::TwinSwitched { old, new });
            }
        }
    }

    /// Writes the family's single storage entry: the selected member's
    /// value under the shared name (dropped when nothing is selected or
    /// the selection is not savable), then propagates upward. One storage
    /// update per transition.
    fn apply_family_storage(&mut self, fid: FamilyId) {
        let owner = self.families[fid.0].owner;
        let name = self.families[fid.0].name.clone();
        let selected = self.families[fid.0].selected_member();
        match owner {
            Some(block) => {
                let entry = selected
                    .filter(|m| self.is_savable(*m))
                    .map(|m| self.node(m).value.clone());
                let Some(map) = self.node_mut(block).value.as_object_mut() else {
                    return;
                };
                match entry {
                    Some(value) => {
                        map.insert(name, value);
                    }
                    None => {
                        map.shift_remove(&name);
                    }
                }
                self.write_back(block);
            }
            None => {
                self.document = selected
                    .map(|m| self.node(m).value.clone())
                    .unwrap_or(Value::Null);
            }
        }
    }

    /// Installs a value on a member outside the normal edit path (twin
    /// transitions), rebuilding container children from the new value.
    fn install_member_value(&mut self, member: NodeId, value: Value) {
        if self.node(member).value == value {
            return;
        }
        let old = self.node(member).value.clone();
        self.node_mut(member).value = value.clone();
        if self.node(member).is_container() {
            self.rebuild_container(member);
        }
        self.emit(member, ChangeKind::Value { old, new: value });
    }
}
