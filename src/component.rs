//! The composable component variants.

use crate::{CompositeId, EntryPointId, ModuleId, SessionId};

/// Anything that can be passed to
/// [`Session::create_composite_component_type`](crate::Session::create_composite_component_type)
/// or asked for a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Module(ModuleId),
    EntryPoint(EntryPointId),
    Composite(CompositeId),
}

impl ComponentType {
    /// The session that issued the underlying handle.
    pub fn session(&self) -> SessionId {
        match self {
            ComponentType::Module(id) => id.session(),
            ComponentType::EntryPoint(id) => id.session(),
            ComponentType::Composite(id) => id.session(),
        }
    }
}

impl From<ModuleId> for ComponentType {
    fn from(id: ModuleId) -> Self {
        ComponentType::Module(id)
    }
}

impl From<EntryPointId> for ComponentType {
    fn from(id: EntryPointId) -> Self {
        ComponentType::EntryPoint(id)
    }
}

impl From<CompositeId> for ComponentType {
    fn from(id: CompositeId) -> Self {
        ComponentType::Composite(id)
    }
}
