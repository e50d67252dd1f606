//! Session-scoped handles.
//!
//! Handles are plain `(session, index)` pairs. They own nothing and stay
//! `Copy`; resolving one against a session other than the one that issued
//! it is a caller bug and panics.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies one [`Session`](crate::Session) for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u32);

impl SessionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        SessionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// A loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId {
    pub(crate) session: SessionId,
    pub(crate) index: u32,
}

impl ModuleId {
    pub fn session(&self) -> SessionId {
        self.session
    }
}

/// An entry point of a loaded module.
///
/// Refers back to its module by handle only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryPointId {
    pub(crate) module: ModuleId,
    pub(crate) index: u32,
}

impl EntryPointId {
    pub fn session(&self) -> SessionId {
        self.module.session
    }

    /// The module declaring this entry point.
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Position among the module's entry points.
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// A composite produced by a successful composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeId {
    pub(crate) session: SessionId,
    pub(crate) index: u32,
}

impl CompositeId {
    pub fn session(&self) -> SessionId {
        self.session
    }
}
