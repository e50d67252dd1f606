//! Error types for every phase of the toolchain.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Error (top-level wrapper)
//! ├── ConfigError   - rejected session descriptor
//! ├── IndexError    - out-of-range index (caller bug)
//! ├── LinkError     - composition failures, one variant per kind
//! └── LayoutError   - reflection requested on something that is not linked
//! ```
//!
//! Load failures are not represented here: a module that fails to parse or
//! type-check is reported purely through [`Diagnostics`](crate::Diagnostics).
//! Link errors are likewise surfaced as diagnostics, but keep a typed form so
//! the composer can classify them before rendering.

use std::path::PathBuf;

use thiserror::Error;

use crate::{Diagnostic, DiagnosticCode};

// ============================================================================
// Session Configuration Errors
// ============================================================================

/// A session descriptor was rejected. No session is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The descriptor lists no compilation target.
    #[error("session descriptor has no targets")]
    NoTargets,

    /// A target names a profile the registry does not know.
    #[error("unknown profile '{name}'")]
    UnknownProfile { name: String },

    /// A profile exists but cannot be used with the requested format.
    #[error("profile '{profile}' cannot target {format}")]
    IncompatibleProfile { profile: String, format: String },

    /// A target requests flags its format does not support.
    #[error("target {format} does not support flags {flags}")]
    UnsupportedTargetFlags { format: String, flags: String },

    /// A search path entry is empty.
    #[error("search path #{index} is empty")]
    EmptySearchPath { index: usize },

    /// The same search path appears twice.
    #[error("duplicate search path '{}'", path.display())]
    DuplicateSearchPath { path: PathBuf },

    /// A macro name is not a valid identifier.
    #[error("invalid preprocessor macro name '{name}'")]
    InvalidMacroName { name: String },

    /// The same macro is defined twice.
    #[error("preprocessor macro '{name}' is defined more than once")]
    DuplicateMacro { name: String },
}

// ============================================================================
// Index Errors
// ============================================================================

/// An index was outside `[0, count)`.
///
/// This signals misuse by the caller, never a compilation problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{what} index {index} is out of range (count is {count})")]
pub struct IndexError {
    /// What was being indexed, e.g. `"entry point"`.
    pub what: &'static str,
    /// The requested index.
    pub index: usize,
    /// The number of valid elements.
    pub count: usize,
}

impl IndexError {
    /// Check `index` against `count`.
    pub fn check(what: &'static str, index: usize, count: usize) -> Result<usize, IndexError> {
        if index < count {
            Ok(index)
        } else {
            Err(IndexError { what, index, count })
        }
    }
}

// ============================================================================
// Link Errors
// ============================================================================

/// A composition failure. Each kind is independently distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Two declarations of one global name are incompatible.
    #[error("conflicting declarations of '{name}': {detail}")]
    Conflict {
        /// The symbol name.
        name: String,
        /// Why the declarations are incompatible.
        detail: String,
        /// Component holding the first declaration.
        first: String,
        /// Component holding the second declaration.
        second: String,
    },

    /// An entry point depends on an extern symbol that nothing defines.
    #[error("entry point '{entry_point}' references unresolved symbol '{name}'")]
    UnresolvedReference {
        /// The unresolved symbol.
        name: String,
        /// The entry point that needs it.
        entry_point: String,
        /// Component the entry point comes from.
        origin: String,
    },

    /// A parameter's binding range overlaps one already claimed.
    #[error(
        "parameter '{parameter}' binding {class}{index} (space {space}) collides with '{other}' on target {target}"
    )]
    BindingCollision {
        /// Parameter being placed.
        parameter: String,
        /// Parameter that already owns the slot.
        other: String,
        /// Register class prefix, empty for descriptor slots.
        class: String,
        /// First colliding slot.
        index: u32,
        /// Binding space.
        space: u32,
        /// Target the layout was computed for.
        target: String,
        /// Component declaring `parameter`.
        origin: String,
    },

    /// No free run of slots is left for a parameter.
    #[error(
        "parameter '{parameter}' needs {count} binding slot(s) but {range} has no free run left on target {target}"
    )]
    BindingsExhausted {
        parameter: String,
        count: u32,
        /// The slot range, e.g. `set0` or `t/space0`.
        range: String,
        target: String,
        origin: String,
    },

    /// A size, offset or location does not fit in 32 bits.
    #[error("parameter '{parameter}' is too large to lay out on target {target}")]
    LayoutOverflow {
        parameter: String,
        target: String,
        origin: String,
    },
}

impl LinkError {
    /// The diagnostic code for this error kind.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            LinkError::Conflict { .. } => DiagnosticCode::SymbolConflict,
            LinkError::UnresolvedReference { .. } => DiagnosticCode::UnresolvedReference,
            LinkError::BindingCollision { .. } => DiagnosticCode::BindingCollision,
            LinkError::BindingsExhausted { .. } => DiagnosticCode::BindingsExhausted,
            LinkError::LayoutOverflow { .. } => DiagnosticCode::LayoutOverflow,
        }
    }

    /// Render as an error diagnostic attributed to the originating component.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.code(), self.to_string());
        match self {
            LinkError::Conflict { first, second, .. } => {
                diagnostic.with_origin(second.clone()).with_related(first.clone())
            }
            LinkError::UnresolvedReference { origin, .. }
            | LinkError::BindingCollision { origin, .. }
            | LinkError::BindingsExhausted { origin, .. }
            | LinkError::LayoutOverflow { origin, .. } => diagnostic.with_origin(origin.clone()),
        }
    }
}

// ============================================================================
// Layout Errors
// ============================================================================

/// Reflection could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The component is not a fully linked program.
    #[error("{component} is not a linked program: {reason}")]
    NotLinked { component: String, reason: String },

    /// The session has no target with this index.
    #[error("target index {index} is out of range (session has {count} targets)")]
    NoSuchTarget { index: usize, count: usize },
}

// ============================================================================
// Top-level Error
// ============================================================================

/// Unified error type for callers that do not need to distinguish phases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}
