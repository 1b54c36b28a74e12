//! Group-kind registry: kind name -> factory, resolved once at startup.

use crate::group::Group;
use manifold_core::id::GroupKindId;
use std::collections::HashMap;
use std::fmt;

/// Builds a fresh, empty group of one kind.
pub type GroupFactory = Box<dyn Fn() -> Box<dyn Group>>;

/// One registered kind.
pub struct GroupKindDef {
    pub name: String,
    factory: GroupFactory,
    placeholder: Box<dyn Group>,
}

impl fmt::Debug for GroupKindDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupKindDef")
            .field("name", &self.name)
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("group kind registered twice: {0}")]
    DuplicateKind(String),
    #[error("unknown group kind: {0}")]
    UnknownKind(String),
    #[error("no factory registered for group kind {0:?}")]
    UnregisteredKind(GroupKindId),
    #[error("too many group kinds")]
    Overflow,
}

/// Builder for constructing an immutable [`GroupRegistry`].
/// Two-phase lifecycle: registration -> finalization.
#[derive(Debug, Default)]
pub struct GroupRegistryBuilder {
    kinds: Vec<GroupKindDef>,
    name_to_id: HashMap<String, GroupKindId>,
}

impl GroupRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind. `placeholder` is what nodes without a group of
    /// this kind report; it should hold an immutable empty state.
    pub fn register(
        &mut self,
        name: &str,
        factory: impl Fn() -> Box<dyn Group> + 'static,
        placeholder: Box<dyn Group>,
    ) -> Result<GroupKindId, RegistryError> {
        if self.name_to_id.contains_key(name) {
            return Err(RegistryError::DuplicateKind(name.to_string()));
        }
        let raw = u16::try_from(self.kinds.len()).map_err(|_| RegistryError::Overflow)?;
        let id = GroupKindId(raw);
        self.kinds.push(GroupKindDef {
            name: name.to_string(),
            factory: Box::new(factory),
            placeholder,
        });
        self.name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn kind_id(&self, name: &str) -> Option<GroupKindId> {
        self.name_to_id.get(name).copied()
    }

    pub fn build(self) -> GroupRegistry {
        GroupRegistry {
            kinds: self.kinds,
            name_to_id: self.name_to_id,
        }
    }
}

/// Immutable registry. Frozen after build().
#[derive(Debug)]
pub struct GroupRegistry {
    kinds: Vec<GroupKindDef>,
    name_to_id: HashMap<String, GroupKindId>,
}

impl GroupRegistry {
    pub fn kind_id(&self, name: &str) -> Option<GroupKindId> {
        self.name_to_id.get(name).copied()
    }

    /// Like [`kind_id`](Self::kind_id) but reports the missing name.
    pub fn require(&self, name: &str) -> Result<GroupKindId, RegistryError> {
        self.kind_id(name)
            .ok_or_else(|| RegistryError::UnknownKind(name.to_string()))
    }

    pub fn contains(&self, kind: GroupKindId) -> bool {
        (kind.0 as usize) < self.kinds.len()
    }

    pub fn name(&self, kind: GroupKindId) -> Option<&str> {
        self.kinds.get(kind.0 as usize).map(|def| def.name.as_str())
    }

    pub fn create(&self, kind: GroupKindId) -> Result<Box<dyn Group>, RegistryError> {
        self.kinds
            .get(kind.0 as usize)
            .map(|def| (def.factory)())
            .ok_or(RegistryError::UnregisteredKind(kind))
    }

    pub fn placeholder(&self, kind: GroupKindId) -> Option<&dyn Group> {
        self.kinds
            .get(kind.0 as usize)
            .map(|def| def.placeholder.as_ref())
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
