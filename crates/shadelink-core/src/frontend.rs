//! The front-end collaborator contract.
//!
//! The session does not parse source itself. It hands a [`ModuleRequest`] to
//! a [`FrontEnd`] and receives a checked [`ModuleIr`] (or nothing) together
//! with the diagnostics produced along the way.

use std::path::PathBuf;

use crate::{Diagnostics, ModuleIr};

/// A preprocessor definition supplied by the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreprocessorMacro {
    pub name: String,
    /// Replacement text; empty for a bare definition.
    pub value: String,
}

impl PreprocessorMacro {
    /// Define `name` with a replacement value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Define `name` without a value, for `#ifdef` checks.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

/// Source text supplied directly instead of through search paths.
#[derive(Debug, Clone, Copy)]
pub struct InlineSource<'a> {
    /// Path reported in diagnostics.
    pub path: &'a str,
    pub text: &'a str,
}

/// Everything the front end needs to load one module.
#[derive(Debug, Clone, Copy)]
pub struct ModuleRequest<'a> {
    /// Logical module name, e.g. `"lighting"`.
    pub name: &'a str,
    pub search_paths: &'a [PathBuf],
    pub macros: &'a [PreprocessorMacro],
    pub source: Option<InlineSource<'a>>,
}

/// Result of a front-end invocation.
#[derive(Debug, Clone, Default)]
pub struct FrontEndOutput {
    /// `None` whenever `diagnostics` contains an error.
    pub module: Option<ModuleIr>,
    pub diagnostics: Diagnostics,
}

/// Parses and type-checks a module.
///
/// Implementations must be deterministic: the same request over the same
/// sources yields structurally equal modules and identical diagnostics.
pub trait FrontEnd {
    fn parse_and_check(&self, request: &ModuleRequest<'_>) -> FrontEndOutput;
}

impl<F: FrontEnd + ?Sized> FrontEnd for Box<F> {
    fn parse_and_check(&self, request: &ModuleRequest<'_>) -> FrontEndOutput {
        (**self).parse_and_check(request)
    }
}
