//! Session configuration.

use std::path::PathBuf;

use rustc_hash::FxHashSet;
use shadelink_core::{ConfigError, PreprocessorMacro};
use shadelink_registry::{Registry, ResolvedTarget, TargetDesc};

/// Everything needed to create a [`Session`](crate::Session).
///
/// # Examples
///
/// ```
/// use shadelink::{SessionDesc, TargetDesc, TargetFormat};
///
/// let desc = SessionDesc::new()
///     .with_target(TargetDesc::new(TargetFormat::Spirv, "spirv_1_6").with_scalar_layout())
///     .with_search_path("shaders")
///     .with_macro("QUALITY", "2");
/// assert_eq!(desc.targets.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDesc {
    pub targets: Vec<TargetDesc>,
    /// Directories searched in order when loading modules by name.
    pub search_paths: Vec<PathBuf>,
    /// Definitions visible to every module the session loads.
    pub macros: Vec<PreprocessorMacro>,
}

impl SessionDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: TargetDesc) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_macro(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.macros.push(PreprocessorMacro::new(name, value));
        self
    }

    /// Check the descriptor against `registry` and resolve every target.
    pub fn validate(&self, registry: &Registry) -> Result<Vec<ResolvedTarget>, ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        let targets = self
            .targets
            .iter()
            .map(|target| registry.resolve_target(target))
            .collect::<Result<Vec<_>, _>>()?;

        let mut paths = FxHashSet::default();
        for (index, path) in self.search_paths.iter().enumerate() {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptySearchPath { index });
            }
            if !paths.insert(path) {
                return Err(ConfigError::DuplicateSearchPath { path: path.clone() });
            }
        }

        let mut names = FxHashSet::default();
        for definition in &self.macros {
            if !is_identifier(&definition.name) {
                return Err(ConfigError::InvalidMacroName {
                    name: definition.name.clone(),
                });
            }
            if !names.insert(definition.name.as_str()) {
                return Err(ConfigError::DuplicateMacro {
                    name: definition.name.clone(),
                });
            }
        }

        Ok(targets)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
