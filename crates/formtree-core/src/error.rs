use thiserror::Error;

/// User-input-shaped failures. These are always recovered locally — the
/// tree's state is unchanged when one is returned. Invariant violations
/// (double child-set initialization, duplicate identifier registration,
/// numeric queries on non-numeric nodes) panic instead; they mark bugs in
/// the hosting code, not bad user input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("document is read-only")]
    ReadOnly,

    #[error("name already used by a sibling: {name}")]
    NameCollision { name: String },

    #[error("array allows multiple prefabs; an explicit choice is required")]
    PrefabChoiceRequired,

    #[error("no such prefab index: {0}")]
    NoSuchPrefab(usize),

    #[error("node is not a container")]
    NotAContainer,

    #[error("node is not a child of this container")]
    NoSuchChild,

    #[error("node does not carry a dynamic name")]
    NotRenamable,

    #[error("no such twin family member")]
    NoSuchTwinMember,
}
