//! Locating and reading module source text.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use shadelink_core::SourceOrigin;

/// File extension appended to module names when searching.
pub const MODULE_EXTENSION: &str = "slang";

/// Source text together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSource {
    pub origin: SourceOrigin,
    pub text: String,
}

/// Why a module's source could not be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// No search path holds the module. `searched` lists the candidates tried.
    NotFound { searched: Vec<PathBuf> },
    /// A candidate exists but reading it failed.
    Unreadable { path: PathBuf, message: String },
}

/// Resolves a module name to source text.
pub trait SourceLoader {
    fn load(&self, name: &str, search_paths: &[PathBuf]) -> Result<LoadedSource, LoadFailure>;
}

impl<L: SourceLoader + ?Sized> SourceLoader for &L {
    fn load(&self, name: &str, search_paths: &[PathBuf]) -> Result<LoadedSource, LoadFailure> {
        (**self).load(name, search_paths)
    }
}

/// The file name a module is stored under.
pub fn module_file_name(name: &str) -> String {
    if Path::new(name).extension().is_some_and(|ext| ext == MODULE_EXTENSION) {
        name.to_string()
    } else {
        format!("{}.{}", name, MODULE_EXTENSION)
    }
}

/// Searches directories in order; the first existing file wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemLoader;

impl SourceLoader for FileSystemLoader {
    fn load(&self, name: &str, search_paths: &[PathBuf]) -> Result<LoadedSource, LoadFailure> {
        let file_name = module_file_name(name);
        let mut searched = Vec::with_capacity(search_paths.len());

        for dir in search_paths {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                return match fs::read_to_string(&candidate) {
                    Ok(text) => Ok(LoadedSource {
                        origin: SourceOrigin::File(candidate),
                        text,
                    }),
                    Err(err) => Err(LoadFailure::Unreadable {
                        path: candidate,
                        message: err.to_string(),
                    }),
                };
            }
            searched.push(candidate);
        }

        Err(LoadFailure::NotFound { searched })
    }
}

/// Serves modules from an in-memory table, ignoring search paths.
///
/// # Examples
///
/// ```
/// use shadelink_parser::{MemoryLoader, SourceLoader};
///
/// let loader = MemoryLoader::new().with_source("common", "static const float PI = 3.14;");
/// let source = loader.load("common", &[]).unwrap();
/// assert_eq!(source.origin.to_string(), "common.slang");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: FxHashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_source(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    /// Register or replace a module's text.
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(name.into(), text.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, name: &str, _search_paths: &[PathBuf]) -> Result<LoadedSource, LoadFailure> {
        match self.sources.get(name) {
            Some(text) => Ok(LoadedSource {
                origin: SourceOrigin::Memory(module_file_name(name)),
                text: text.clone(),
            }),
            None => Err(LoadFailure::NotFound {
                searched: Vec::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "shadelink-source-{}-{}",
            tag,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn file_name_gets_extension_once() {
        assert_eq!(module_file_name("lighting"), "lighting.slang");
        assert_eq!(module_file_name("lighting.slang"), "lighting.slang");
    }

    #[test]
    fn first_search_path_wins() {
        let first = scratch_dir("first");
        let second = scratch_dir("second");
        fs::write(first.join("shared.slang"), "float a;").unwrap();
        fs::write(second.join("shared.slang"), "float b;").unwrap();

        let source = FileSystemLoader
            .load("shared", &[first.clone(), second.clone()])
            .unwrap();
        assert_eq!(source.text, "float a;");
        assert_eq!(source.origin, SourceOrigin::File(first.join("shared.slang")));

        let _ = fs::remove_dir_all(first);
        let _ = fs::remove_dir_all(second);
    }

    #[test]
    fn missing_module_lists_candidates() {
        let dir = scratch_dir("missing");
        let err = FileSystemLoader.load("nope", &[dir.clone()]).unwrap_err();
        assert_eq!(
            err,
            LoadFailure::NotFound {
                searched: vec![dir.join("nope.slang")]
            }
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn memory_loader_lookup() {
        let loader = MemoryLoader::new().with_source("a", "x");
        assert!(loader.load("a", &[]).is_ok());
        assert!(matches!(
            loader.load("b", &[]),
            Err(LoadFailure::NotFound { .. })
        ));
    }
}
