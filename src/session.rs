//! Compilation sessions.
//!
//! A [`Session`] owns every module and composite it produces. Callers hold
//! `Copy` handles into it; dropping the session invalidates them all.
//!
//! # Example
//!
//! ```
//! use shadelink::{
//!     ComponentType, CreateSession, MemoryLoader, Registry, Session, SessionDesc,
//!     ShaderFrontEnd, TargetDesc, TargetFormat,
//! };
//!
//! let loader = MemoryLoader::new().with_source(
//!     "fill",
//!     r#"
//!     RWTexture2D<float4> target;
//!     float4 color;
//!     [shader("compute")]
//!     [numthreads(8, 8, 1)]
//!     void main(uint3 id : SV_DispatchThreadID) { target[id.xy] = color; }
//!     "#,
//! );
//! let desc = SessionDesc::new().with_target(TargetDesc::new(TargetFormat::Spirv, "spirv_1_6"));
//! let mut session =
//!     Session::with_front_end(Registry::global(), desc, ShaderFrontEnd::with_loader(loader))
//!         .unwrap();
//!
//! let module = session.load_module("fill").value.unwrap();
//! let entry_point = session.module(module).entry_point(0).unwrap();
//! let program = session
//!     .create_composite_component_type(&[module.into(), entry_point.into()])
//!     .value
//!     .unwrap();
//!
//! let layout = session.layout(ComponentType::Composite(program), 0).unwrap();
//! assert_eq!(layout.parameter_count(), 2);
//! assert_eq!(layout.global_constant_buffer_size(), 16);
//! ```

use std::fmt;
use std::path::PathBuf;

use shadelink_core::{
    Attribute, ConfigError, Diagnostic, DiagnosticCode, Diagnostics, FrontEnd, FunctionDecl, FunctionSignature,
    IndexError, InlineSource, LayoutError, LinkError, ModuleIr, ModuleRequest, PreprocessorMacro,
    ShaderStage, SourceOrigin,
};
use shadelink_linker::{
    Composer, Constituent, EntryPointKey, LinkOptions, LinkedProgram, ModuleKey, ProgramLayout,
};
use shadelink_parser::ShaderFrontEnd;
use shadelink_registry::{Registry, ResolvedTarget};

use crate::{ComponentType, CompositeId, EntryPointId, ModuleId, Outcome, SessionDesc, SessionId};

/// Creates sessions from a registry.
pub trait CreateSession {
    /// Validate `desc` and create a session using the file-system front end.
    fn create_session(&self, desc: SessionDesc) -> Result<Session<'_>, ConfigError>;
}

impl CreateSession for Registry {
    fn create_session(&self, desc: SessionDesc) -> Result<Session<'_>, ConfigError> {
        Session::new(self, desc)
    }
}

/// A compilation session: targets, search paths, macros, and everything loaded so far.
pub struct Session<'r> {
    id: SessionId,
    registry: &'r Registry,
    targets: Vec<ResolvedTarget>,
    search_paths: Vec<PathBuf>,
    macros: Vec<PreprocessorMacro>,
    front_end: Box<dyn FrontEnd + Send + Sync>,
    modules: Vec<ModuleIr>,
    composites: Vec<LinkedProgram>,
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("targets", &self.targets)
            .field("search_paths", &self.search_paths)
            .field("macros", &self.macros)
            .field("modules", &self.modules.len())
            .field("composites", &self.composites.len())
            .finish_non_exhaustive()
    }
}

impl<'r> Session<'r> {
    /// Create a session that loads modules from the search paths.
    pub fn new(registry: &'r Registry, desc: SessionDesc) -> Result<Self, ConfigError> {
        Self::with_front_end(registry, desc, ShaderFrontEnd::new())
    }

    /// Create a session with a custom front end.
    pub fn with_front_end(
        registry: &'r Registry,
        desc: SessionDesc,
        front_end: impl FrontEnd + Send + Sync + 'static,
    ) -> Result<Self, ConfigError> {
        let targets = desc.validate(registry)?;
        let id = SessionId::next();
        log::debug!(
            "created {} with {} target(s), {} search path(s), {} macro(s)",
            id,
            targets.len(),
            desc.search_paths.len(),
            desc.macros.len()
        );
        Ok(Self {
            id,
            registry,
            targets,
            search_paths: desc.search_paths,
            macros: desc.macros,
            front_end: Box::new(front_end),
            modules: Vec::new(),
            composites: Vec::new(),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Resolved targets, in descriptor order.
    pub fn targets(&self) -> &[ResolvedTarget] {
        &self.targets
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn macros(&self) -> &[PreprocessorMacro] {
        &self.macros
    }

    /// Load a module by name through the search paths.
    ///
    /// Every call produces a new module, even for a name loaded before.
    pub fn load_module(&mut self, name: &str) -> Outcome<ModuleId> {
        self.load(name, None)
    }

    /// Load a module from text. `path` is reported in diagnostics.
    pub fn load_module_from_source(&mut self, name: &str, path: &str, text: &str) -> Outcome<ModuleId> {
        self.load(name, Some(InlineSource { path, text }))
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn load(&mut self, name: &str, source: Option<InlineSource<'_>>) -> Outcome<ModuleId> {
        let request = ModuleRequest {
            name,
            search_paths: &self.search_paths,
            macros: &self.macros,
            source,
        };
        let output = self.front_end.parse_and_check(&request);

        let id = output.module.map(|module| {
            let id = ModuleId {
                session: self.id,
                index: self.modules.len() as u32,
            };
            log::debug!(
                "loaded module '{}' from {} ({} entry point(s))",
                module.name,
                module.origin,
                module.entry_point_count()
            );
            self.modules.push(module);
            id
        });
        if id.is_none() {
            log::debug!(
                "module '{}' failed to load with {} error(s)",
                name,
                output.diagnostics.error_count()
            );
        }
        Outcome::new(id, output.diagnostics)
    }

    fn check_session(&self, session: SessionId, what: &str) {
        assert!(
            session == self.id,
            "{} handle from {} used with {}",
            what,
            session,
            self.id
        );
    }

    fn module_ir(&self, id: ModuleId) -> &ModuleIr {
        self.check_session(id.session, "module");
        &self.modules[id.index as usize]
    }

    /// Look up a loaded module.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by another session.
    pub fn module(&self, id: ModuleId) -> ModuleRef<'_> {
        ModuleRef {
            id,
            ir: self.module_ir(id),
        }
    }

    /// Look up an entry point.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by another session.
    pub fn entry_point(&self, id: EntryPointId) -> EntryPointRef<'_> {
        let ir = self.module_ir(id.module);
        let function = ir
            .entry_point(id.index as usize)
            .unwrap_or_else(|| panic!("entry point handle {} is out of range", id.index));
        EntryPointRef { id, function }
    }

    fn composite_program(&self, id: CompositeId) -> &LinkedProgram {
        self.check_session(id.session, "composite");
        &self.composites[id.index as usize]
    }

    /// Look up a composite.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by another session.
    pub fn composite(&self, id: CompositeId) -> CompositeRef<'_> {
        CompositeRef {
            id,
            session: self.id,
            program: self.composite_program(id),
            modules: &self.modules,
        }
    }

    /// Compose components into a complete program.
    pub fn create_composite_component_type(
        &mut self,
        components: &[ComponentType],
    ) -> Outcome<CompositeId> {
        self.create_composite_component_type_with(components, LinkOptions::default())
    }

    /// Compose components; with `require_complete: false` the result may
    /// still have unresolved externs, and only serves as input to further
    /// compositions.
    pub fn create_composite_component_type_with(
        &mut self,
        components: &[ComponentType],
        options: LinkOptions,
    ) -> Outcome<CompositeId> {
        let constituents = self.constituents(components);
        let result = Composer::new(&self.modules, &self.targets)
            .with_options(options)
            .compose(&constituents);

        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(result.errors.iter().map(LinkError::to_diagnostic));
        let id = result.program.map(|program| {
            diagnostics.extend(program.unresolved().iter().map(|symbol| {
                let ir = &self.modules[symbol.entry_point.module.0 as usize];
                Diagnostic::warning(
                    DiagnosticCode::UnresolvedReference,
                    format!("'{}' is left unresolved", symbol.name),
                )
                .with_origin(format!("module '{}'", ir.name))
            }));
            let id = CompositeId {
                session: self.id,
                index: self.composites.len() as u32,
            };
            self.composites.push(program);
            id
        });
        Outcome::new(id, diagnostics)
    }

    fn constituents(&self, components: &[ComponentType]) -> Vec<Constituent> {
        let mut constituents = Vec::with_capacity(components.len());
        for component in components {
            match *component {
                ComponentType::Module(id) => {
                    self.module_ir(id);
                    constituents.push(Constituent::Module(ModuleKey(id.index)));
                }
                ComponentType::EntryPoint(id) => {
                    self.entry_point(id);
                    constituents.push(Constituent::EntryPoint(EntryPointKey {
                        module: ModuleKey(id.module.index),
                        index: id.index,
                    }));
                }
                ComponentType::Composite(id) => {
                    constituents.extend(self.composite_program(id).constituents());
                }
            }
        }
        constituents
    }

    /// Reflection of a complete composite for the target at `target_index`.
    pub fn layout(
        &self,
        component: ComponentType,
        target_index: usize,
    ) -> Result<&ProgramLayout, LayoutError> {
        if target_index >= self.targets.len() {
            return Err(LayoutError::NoSuchTarget {
                index: target_index,
                count: self.targets.len(),
            });
        }
        let not_linked = |component: String, reason: &str| LayoutError::NotLinked {
            component,
            reason: reason.to_string(),
        };
        match component {
            ComponentType::Module(id) => Err(not_linked(
                format!("module '{}'", self.module(id).name()),
                "modules must be composed first",
            )),
            ComponentType::EntryPoint(id) => Err(not_linked(
                format!("entry point '{}'", self.entry_point(id).name()),
                "entry points must be composed first",
            )),
            ComponentType::Composite(id) => {
                let program = self.composite_program(id);
                if !program.is_complete() {
                    return Err(not_linked(
                        format!("composite #{}", id.index),
                        &format!(
                            "{} symbol(s) are unresolved",
                            program.unresolved().len()
                        ),
                    ));
                }
                program
                    .layouts()
                    .get(target_index)
                    .ok_or_else(|| not_linked(format!("composite #{}", id.index), "no layout was computed"))
            }
        }
    }
}

/// Read access to a loaded module.
#[derive(Debug, Clone, Copy)]
pub struct ModuleRef<'s> {
    id: ModuleId,
    ir: &'s ModuleIr,
}

impl<'s> ModuleRef<'s> {
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &'s str {
        &self.ir.name
    }

    pub fn origin(&self) -> &'s SourceOrigin {
        &self.ir.origin
    }

    pub fn entry_point_count(&self) -> usize {
        self.ir.entry_point_count()
    }

    /// Handle of the `index`-th entry point.
    pub fn entry_point(&self, index: usize) -> Result<EntryPointId, IndexError> {
        let index = IndexError::check("entry point", index, self.ir.entry_point_count())?;
        Ok(EntryPointId {
            module: self.id,
            index: index as u32,
        })
    }

    pub fn find_entry_point_by_name(&self, name: &str) -> Option<EntryPointId> {
        (0..self.ir.entry_point_count())
            .find(|&i| self.ir.entry_point(i).is_some_and(|f| f.name == name))
            .map(|i| EntryPointId {
                module: self.id,
                index: i as u32,
            })
    }

    /// Number of module-level declarations of every kind.
    pub fn declaration_count(&self) -> usize {
        self.ir.globals.len()
            + self.ir.functions.len()
            + self.ir.structs.len()
            + self.ir.interfaces.len()
            + self.ir.type_params.len()
    }

    /// The checked representation.
    pub fn ir(&self) -> &'s ModuleIr {
        self.ir
    }
}

/// Read access to an entry point.
#[derive(Debug, Clone, Copy)]
pub struct EntryPointRef<'s> {
    id: EntryPointId,
    function: &'s FunctionDecl,
}

impl<'s> EntryPointRef<'s> {
    pub fn id(&self) -> EntryPointId {
        self.id
    }

    pub fn name(&self) -> &'s str {
        &self.function.name
    }

    pub fn stage(&self) -> ShaderStage {
        // `ModuleIr::add_function` only registers staged functions.
        self.function.stage.unwrap_or(ShaderStage::Compute)
    }

    pub fn signature(&self) -> &'s FunctionSignature {
        &self.function.signature
    }

    /// Attributes not consumed by the toolchain, in source order.
    pub fn user_attributes(&self) -> impl Iterator<Item = &'s Attribute> + 's {
        self.function.user_attributes()
    }

    pub fn thread_group_size(&self) -> Option<[u32; 3]> {
        self.function.thread_group_size
    }

    /// The owning module.
    pub fn module(&self) -> ModuleId {
        self.id.module
    }
}

impl fmt::Display for EntryPointRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = &self.function.signature.params;
        writeln!(f, "=== Begin {} (function) ===", self.name())?;
        writeln!(
            f,
            "Num parameters: {}\tNum user attribute: {}",
            params.len(),
            self.user_attributes().count()
        )?;
        writeln!(f, "Parameters: ")?;
        for param in params {
            writeln!(f, "\t{}: {}", param.name, param.ty)?;
        }
        writeln!(f, "=== End {} ===", self.name())
    }
}

/// Read access to a composite.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRef<'s> {
    id: CompositeId,
    session: SessionId,
    program: &'s LinkedProgram,
    modules: &'s [ModuleIr],
}

impl<'s> CompositeRef<'s> {
    pub fn id(&self) -> CompositeId {
        self.id
    }

    /// Distinct modules, in first-appearance order.
    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + 's {
        let session = self.session;
        self.program.modules().iter().map(move |key| ModuleId {
            session,
            index: key.0,
        })
    }

    /// Distinct entry points, in first-appearance order.
    pub fn entry_points(&self) -> impl Iterator<Item = EntryPointId> + 's {
        let session = self.session;
        self.program.entry_points().iter().map(move |key| EntryPointId {
            module: ModuleId {
                session,
                index: key.module.0,
            },
            index: key.index,
        })
    }

    /// Whether every extern an entry point needs is defined.
    pub fn is_complete(&self) -> bool {
        self.program.is_complete()
    }

    /// Names of unresolved externs, with the entry point needing each.
    pub fn unresolved(&self) -> impl Iterator<Item = (&'s str, &'s str)> + 's {
        let modules = self.modules;
        self.program.unresolved().iter().map(move |symbol| {
            let entry_point = modules[symbol.entry_point.module.0 as usize]
                .entry_point(symbol.entry_point.index as usize)
                .map_or("", |f| f.name.as_str());
            (symbol.name.as_str(), entry_point)
        })
    }
}
