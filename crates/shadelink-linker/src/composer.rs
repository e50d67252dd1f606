//! Component composition.
//!
//! ## Phases
//!
//! ```text
//! constituents ──► flatten ──► merge symbols ──► completeness ──► layout (per target)
//!                  dedupe      Conflict          UnresolvedReference   BindingCollision
//!                                                                        BindingsExhausted
//!                                                                        LayoutOverflow
//! ```
//!
//! Every phase runs to completion and reports all of its errors; a program
//! is produced only when no phase reported one.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use shadelink_core::{
    FunctionDecl, GlobalVar, LinkError, ModuleIr, StorageClass, StructDecl,
};
use shadelink_registry::ResolvedTarget;

use crate::layout::build_layout;
use crate::reflection::ProgramLayout;

/// Index of a module in its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey(pub u32);

/// An entry point: a module and the entry point's index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryPointKey {
    pub module: ModuleKey,
    pub index: u32,
}

/// One flattened input of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constituent {
    Module(ModuleKey),
    EntryPoint(EntryPointKey),
}

/// Resolves module keys to their checked IR.
pub trait ModuleSource {
    /// Panics if `key` is not a module of this source.
    fn module_ir(&self, key: ModuleKey) -> &ModuleIr;
}

impl ModuleSource for [ModuleIr] {
    fn module_ir(&self, key: ModuleKey) -> &ModuleIr {
        &self[key.0 as usize]
    }
}

impl ModuleSource for Vec<ModuleIr> {
    fn module_ir(&self, key: ModuleKey) -> &ModuleIr {
        self.as_slice().module_ir(key)
    }
}

/// Composition options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions {
    /// Fail when an entry point depends on an extern symbol nothing defines.
    /// When `false` such programs are kept as partial and get no layout.
    pub require_complete: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            require_complete: true,
        }
    }
}

/// An extern symbol an entry point needs but nothing defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedSymbol {
    pub name: String,
    pub entry_point: EntryPointKey,
}

/// The result of a successful composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedProgram {
    modules: Vec<ModuleKey>,
    entry_points: Vec<EntryPointKey>,
    unresolved: Vec<UnresolvedSymbol>,
    layouts: Vec<ProgramLayout>,
}

impl LinkedProgram {
    /// Distinct modules, in first-appearance order.
    pub fn modules(&self) -> &[ModuleKey] {
        &self.modules
    }

    /// Distinct entry points, in first-appearance order.
    pub fn entry_points(&self) -> &[EntryPointKey] {
        &self.entry_points
    }

    /// Flattened constituents, suitable as input to a further composition.
    pub fn constituents(&self) -> impl Iterator<Item = Constituent> + '_ {
        self.modules
            .iter()
            .map(|&m| Constituent::Module(m))
            .chain(self.entry_points.iter().map(|&ep| Constituent::EntryPoint(ep)))
    }

    /// Whether every entry-point dependency is defined.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn unresolved(&self) -> &[UnresolvedSymbol] {
        &self.unresolved
    }

    /// One layout per session target; empty for partial programs.
    pub fn layouts(&self) -> &[ProgramLayout] {
        &self.layouts
    }
}

/// Outcome of [`Composer::compose`]: a program, or the errors preventing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResult {
    pub program: Option<LinkedProgram>,
    pub errors: Vec<LinkError>,
}

/// A merged module-level symbol.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SymbolRef<'a> {
    Global(ModuleKey, &'a GlobalVar),
    Function(ModuleKey, &'a FunctionDecl),
    Struct(ModuleKey, &'a StructDecl),
    Interface(ModuleKey),
}

impl SymbolRef<'_> {
    fn module(&self) -> ModuleKey {
        match *self {
            SymbolRef::Global(m, _)
            | SymbolRef::Function(m, _)
            | SymbolRef::Struct(m, _)
            | SymbolRef::Interface(m) => m,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SymbolRef::Global(..) => "a variable",
            SymbolRef::Function(..) => "a function",
            SymbolRef::Struct(..) => "a struct",
            SymbolRef::Interface(..) => "an interface",
        }
    }

    fn is_extern(&self) -> bool {
        match self {
            SymbolRef::Global(_, g) => g.storage == StorageClass::Extern,
            SymbolRef::Function(_, f) => f.is_extern(),
            _ => false,
        }
    }
}

/// Module-level symbols merged across a composition.
pub(crate) struct SymbolTable<'a> {
    entries: FxHashMap<&'a str, SymbolRef<'a>>,
    /// Defined uniform globals in declaration order.
    pub parameters: Vec<(ModuleKey, &'a GlobalVar)>,
    pub structs: FxHashMap<&'a str, &'a StructDecl>,
}

impl<'a> SymbolTable<'a> {
    fn get(&self, name: &str) -> Option<SymbolRef<'a>> {
        self.entries.get(name).copied()
    }
}

/// Merges components into linked programs.
///
/// # Examples
///
/// ```
/// use shadelink_core::{FrontEnd, ModuleRequest};
/// use shadelink_linker::{Composer, Constituent, EntryPointKey, ModuleKey};
/// use shadelink_parser::{MemoryLoader, ShaderFrontEnd};
/// use shadelink_registry::{Registry, TargetDesc, TargetFormat};
///
/// let loader = MemoryLoader::new().with_source(
///     "blit",
///     r#"
///     Texture2D source;
///     SamplerState samp;
///     [shader("fragment")]
///     float4 main(float2 uv : TEXCOORD) : SV_Target { return source.Sample(samp, uv); }
///     "#,
/// );
/// let front_end = ShaderFrontEnd::with_loader(loader);
/// let module = front_end
///     .parse_and_check(&ModuleRequest { name: "blit", search_paths: &[], macros: &[], source: None })
///     .module
///     .unwrap();
///
/// let target = Registry::global()
///     .resolve_target(&TargetDesc::new(TargetFormat::Spirv, "spirv_1_6"))
///     .unwrap();
/// let modules = vec![module];
/// let result = Composer::new(&modules, std::slice::from_ref(&target)).compose(&[
///     Constituent::Module(ModuleKey(0)),
///     Constituent::EntryPoint(EntryPointKey { module: ModuleKey(0), index: 0 }),
/// ]);
///
/// let program = result.program.unwrap();
/// let layout = &program.layouts()[0];
/// assert_eq!(layout.entry_point_count(), 1);
/// assert_eq!(layout.parameter_count(), 2);
/// ```
pub struct Composer<'a, M: ModuleSource + ?Sized> {
    source: &'a M,
    targets: &'a [ResolvedTarget],
    options: LinkOptions,
}

impl<'a, M: ModuleSource + ?Sized> Composer<'a, M> {
    pub fn new(source: &'a M, targets: &'a [ResolvedTarget]) -> Self {
        Self {
            source,
            targets,
            options: LinkOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LinkOptions) -> Self {
        self.options = options;
        self
    }

    fn origin(&self, key: ModuleKey) -> String {
        format!("module '{}'", self.source.module_ir(key).name)
    }

    /// Compose `constituents`, already expanded from any composite inputs.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compose(&self, constituents: &[Constituent]) -> LinkResult {
        let (modules, entry_points) = self.flatten(constituents);
        let (symbols, mut errors) = self.merge_symbols(&modules);
        let unresolved = self.check_completeness(&symbols, &entry_points);

        if self.options.require_complete {
            errors.extend(unresolved.iter().map(|u| self.unresolved_error(u)));
        }
        if !errors.is_empty() {
            log::debug!("composition failed with {} error(s)", errors.len());
            return LinkResult {
                program: None,
                errors,
            };
        }

        let mut layouts = Vec::new();
        if unresolved.is_empty() {
            for target in self.targets {
                match build_layout(self.source, &symbols, &modules, &entry_points, target) {
                    Ok(layout) => layouts.push(layout),
                    Err(collisions) => errors.extend(collisions),
                }
            }
        }
        if !errors.is_empty() {
            log::debug!("binding allocation failed with {} error(s)", errors.len());
            return LinkResult {
                program: None,
                errors,
            };
        }

        log::debug!(
            "composed {} module(s), {} entry point(s), {} parameter(s){}",
            modules.len(),
            entry_points.len(),
            symbols.parameters.len(),
            if unresolved.is_empty() { "" } else { " (partial)" }
        );
        LinkResult {
            program: Some(LinkedProgram {
                modules,
                entry_points,
                unresolved,
                layouts,
            }),
            errors,
        }
    }

    /// Expand constituents into distinct modules and entry points.
    ///
    /// An entry point brings in its module. A module whose content matches
    /// one already present is folded into it.
    fn flatten(&self, constituents: &[Constituent]) -> (Vec<ModuleKey>, Vec<EntryPointKey>) {
        let mut modules: Vec<ModuleKey> = Vec::new();
        let mut canonical: FxHashMap<ModuleKey, ModuleKey> = FxHashMap::default();
        let mut entry_points: Vec<EntryPointKey> = Vec::new();

        let mut add_module = |key: ModuleKey, modules: &mut Vec<ModuleKey>| -> ModuleKey {
            if let Some(&existing) = canonical.get(&key) {
                return existing;
            }
            let ir = self.source.module_ir(key);
            let existing = modules
                .iter()
                .copied()
                .find(|&m| self.source.module_ir(m).same_unit(ir));
            let resolved = existing.unwrap_or_else(|| {
                modules.push(key);
                key
            });
            canonical.insert(key, resolved);
            resolved
        };

        for constituent in constituents {
            match *constituent {
                Constituent::Module(key) => {
                    add_module(key, &mut modules);
                }
                Constituent::EntryPoint(ep) => {
                    let module = add_module(ep.module, &mut modules);
                    let ep = EntryPointKey {
                        module,
                        index: ep.index,
                    };
                    if !entry_points.contains(&ep) {
                        entry_points.push(ep);
                    }
                }
            }
        }
        (modules, entry_points)
    }

    /// Merge every module-level declaration by name, reporting incompatible pairs.
    fn merge_symbols(&self, modules: &[ModuleKey]) -> (SymbolTable<'a>, Vec<LinkError>) {
        let mut table = SymbolTable {
            entries: FxHashMap::default(),
            parameters: Vec::new(),
            structs: FxHashMap::default(),
        };
        let mut errors = Vec::new();

        let source: &'a M = self.source;
        for &key in modules {
            let ir: &'a ModuleIr = source.module_ir(key);
            let declared = ir
                .structs
                .iter()
                .map(|d| (d.name.as_str(), SymbolRef::Struct(key, d)))
                .chain(
                    ir.interfaces
                        .iter()
                        .map(|d| (d.name.as_str(), SymbolRef::Interface(key))),
                )
                .chain(
                    ir.globals
                        .iter()
                        .filter(|g| g.storage != StorageClass::Static)
                        .map(|d| (d.name.as_str(), SymbolRef::Global(key, d))),
                )
                .chain(
                    ir.functions
                        .iter()
                        .map(|d| (d.name.as_str(), SymbolRef::Function(key, d))),
                );

            for (name, symbol) in declared {
                let Some(existing) = table.get(name) else {
                    table.insert(name, symbol);
                    continue;
                };
                match self.reconcile(existing, symbol) {
                    Ok(Some(replacement)) => table.insert(name, replacement),
                    Ok(None) => {}
                    Err(detail) => errors.push(LinkError::Conflict {
                        name: name.to_string(),
                        detail,
                        first: self.origin(existing.module()),
                        second: self.origin(symbol.module()),
                    }),
                }
            }
        }
        (table, errors)
    }

    /// Decide how a re-declaration combines with the existing entry.
    ///
    /// Returns the symbol that should replace the existing one, `None` to
    /// keep it, or a description of the incompatibility.
    fn reconcile(
        &self,
        existing: SymbolRef<'a>,
        incoming: SymbolRef<'a>,
    ) -> Result<Option<SymbolRef<'a>>, String> {
        let keep_definition = |existing: SymbolRef<'a>, incoming: SymbolRef<'a>| {
            if existing.is_extern() && !incoming.is_extern() {
                Some(incoming)
            } else {
                None
            }
        };

        match (existing, incoming) {
            (SymbolRef::Global(_, a), SymbolRef::Global(_, b)) => {
                if a.ty != b.ty {
                    return Err(format!("types '{}' and '{}' differ", a.ty, b.ty));
                }
                let both_defined = !existing.is_extern() && !incoming.is_extern();
                if both_defined && a.binding != b.binding {
                    return Err("explicit bindings differ".into());
                }
                Ok(keep_definition(existing, incoming))
            }
            (SymbolRef::Function(_, a), SymbolRef::Function(_, b)) => {
                if !a.signature.is_compatible(&b.signature) {
                    return Err(format!(
                        "signatures {} and {} differ",
                        a.signature, b.signature
                    ));
                }
                if a.has_body && b.has_body {
                    return Err("function is defined in both modules".into());
                }
                Ok(keep_definition(existing, incoming))
            }
            (SymbolRef::Struct(_, a), SymbolRef::Struct(_, b)) => {
                if a.same_fields(b) {
                    Ok(None)
                } else {
                    Err("struct fields differ".into())
                }
            }
            (SymbolRef::Interface(_), SymbolRef::Interface(_)) => Ok(None),
            _ => Err(format!(
                "declared as {} and as {}",
                existing.kind(),
                incoming.kind()
            )),
        }
    }

    /// Walk each entry point's transitive uses and collect undefined externs.
    fn check_completeness(
        &self,
        symbols: &SymbolTable<'a>,
        entry_points: &[EntryPointKey],
    ) -> Vec<UnresolvedSymbol> {
        let mut unresolved = Vec::new();
        for &ep in entry_points {
            let Some(function) = self.source.module_ir(ep.module).entry_point(ep.index as usize)
            else {
                continue;
            };

            let mut visited: FxHashSet<&str> = FxHashSet::default();
            let mut queue: VecDeque<&str> = function.uses.iter().map(String::as_str).collect();
            while let Some(name) = queue.pop_front() {
                if !visited.insert(name) {
                    continue;
                }
                match symbols.get(name) {
                    Some(symbol) if symbol.is_extern() => unresolved.push(UnresolvedSymbol {
                        name: name.to_string(),
                        entry_point: ep,
                    }),
                    Some(SymbolRef::Function(_, callee)) => {
                        queue.extend(callee.uses.iter().map(String::as_str));
                    }
                    _ => {}
                }
            }
        }
        unresolved
    }

    fn unresolved_error(&self, symbol: &UnresolvedSymbol) -> LinkError {
        let ir = self.source.module_ir(symbol.entry_point.module);
        let entry_point = ir
            .entry_point(symbol.entry_point.index as usize)
            .map(|f| f.name.clone())
            .unwrap_or_default();
        LinkError::UnresolvedReference {
            name: symbol.name.clone(),
            origin: format!("entry point '{}' of module '{}'", entry_point, ir.name),
            entry_point,
        }
    }
}

impl<'a> SymbolTable<'a> {
    fn insert(&mut self, name: &'a str, symbol: SymbolRef<'a>) {
        match symbol {
            SymbolRef::Global(key, global)
                if global.storage == StorageClass::Uniform
                    && !self.parameters.iter().any(|(_, g)| g.name == global.name) =>
            {
                self.parameters.push((key, global));
            }
            SymbolRef::Struct(_, decl) => {
                self.structs.insert(name, decl);
            }
            _ => {}
        }
        self.entries.insert(name, symbol);
    }
}
