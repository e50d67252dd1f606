//! Module intermediate representation handed from the front end to the session.
//!
//! A [`ModuleIr`] is the checked, declaration-level view of one source
//! module. It is immutable once the front end returns it; the composer and
//! reflection only ever read from it.

use std::fmt;
use std::path::PathBuf;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use xxhash_rust::xxh64::xxh64;

use crate::{RegisterClass, ShaderType, Span};

/// Where a module's source text came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceOrigin {
    /// Resolved through the session's search paths.
    File(PathBuf),
    /// Supplied as text, with the path the caller reported for it.
    Memory(String),
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::File(path) => write!(f, "{}", path.display()),
            SourceOrigin::Memory(path) => f.write_str(path),
        }
    }
}

/// A literal argument of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeArg {
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
    Ident(String),
}

impl fmt::Display for AttributeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeArg::Int(v) => write!(f, "{}", v),
            AttributeArg::Float(v) => write!(f, "{}", v),
            AttributeArg::String(v) => write!(f, "{:?}", v),
            AttributeArg::Ident(v) => f.write_str(v),
        }
    }
}

/// A `[name(args)]` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    /// Possibly qualified name, e.g. `vk::binding`.
    pub name: String,
    pub args: Vec<AttributeArg>,
    pub span: Span,
}

impl Attribute {
    /// Names handled by the toolchain itself; everything else is a user attribute.
    pub const BUILTIN: &'static [&'static str] = &["shader", "numthreads", "vk::binding"];

    /// Whether this attribute is consumed by the toolchain.
    pub fn is_builtin(&self) -> bool {
        Self::BUILTIN.contains(&self.name.as_str())
    }
}

/// A `register(t3, space1)` binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterBinding {
    pub class: RegisterClass,
    pub index: u32,
    pub space: u32,
}

/// A `[vk::binding(slot, set)]` binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    pub index: u32,
    pub space: u32,
}

/// All explicit placement requested for a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExplicitBinding {
    pub register: Option<RegisterBinding>,
    pub descriptor: Option<DescriptorBinding>,
}

impl ExplicitBinding {
    /// Whether any explicit placement was given.
    pub fn is_explicit(&self) -> bool {
        self.register.is_some() || self.descriptor.is_some()
    }
}

/// How a global variable participates in the program interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    /// A shader parameter (plain globals default to this).
    Uniform,
    /// Declared here, defined by another module at link time.
    Extern,
    /// Module-private constant; not part of the parameter interface.
    Static,
}

/// A module-level variable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalVar {
    pub name: String,
    pub ty: ShaderType,
    pub storage: StorageClass,
    pub binding: ExplicitBinding,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

impl GlobalVar {
    /// Whether this global is a top-level shader parameter.
    pub fn is_parameter(&self) -> bool {
        self.storage == StorageClass::Uniform
    }
}

/// Pipeline stage of an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Fragment,
    Compute,
    RayGeneration,
    Intersection,
    AnyHit,
    ClosestHit,
    Miss,
    Callable,
    Mesh,
    Amplification,
}

impl ShaderStage {
    /// Parse the argument of a `[shader("...")]` attribute.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "vertex" => ShaderStage::Vertex,
            "hull" => ShaderStage::Hull,
            "domain" => ShaderStage::Domain,
            "geometry" => ShaderStage::Geometry,
            "fragment" | "pixel" => ShaderStage::Fragment,
            "compute" => ShaderStage::Compute,
            "raygeneration" => ShaderStage::RayGeneration,
            "intersection" => ShaderStage::Intersection,
            "anyhit" => ShaderStage::AnyHit,
            "closesthit" => ShaderStage::ClosestHit,
            "miss" => ShaderStage::Miss,
            "callable" => ShaderStage::Callable,
            "mesh" => ShaderStage::Mesh,
            "amplification" => ShaderStage::Amplification,
            _ => return None,
        })
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Hull => "hull",
            ShaderStage::Domain => "domain",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
            ShaderStage::RayGeneration => "raygeneration",
            ShaderStage::Intersection => "intersection",
            ShaderStage::AnyHit => "anyhit",
            ShaderStage::ClosestHit => "closesthit",
            ShaderStage::Miss => "miss",
            ShaderStage::Callable => "callable",
            ShaderStage::Mesh => "mesh",
            ShaderStage::Amplification => "amplification",
        }
    }

    /// Whether this stage dispatches thread groups.
    pub fn uses_thread_groups(self) -> bool {
        matches!(
            self,
            ShaderStage::Compute | ShaderStage::Mesh | ShaderStage::Amplification
        )
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameter passing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamDirection {
    In,
    Out,
    InOut,
    /// Entry-point uniform, supplied by the host rather than the previous stage.
    Uniform,
}

/// One function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionParam {
    pub name: String,
    pub ty: ShaderType,
    pub direction: ParamDirection,
    pub semantic: Option<String>,
    pub span: Span,
}

/// A resolved function signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub params: Vec<FunctionParam>,
    pub return_type: ShaderType,
    pub return_semantic: Option<String>,
}

impl FunctionSignature {
    /// Whether two signatures are interchangeable at link time.
    ///
    /// Parameter names and semantics do not participate.
    pub fn is_compatible(&self, other: &FunctionSignature) -> bool {
        self.return_type == other.return_type
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty && a.direction == b.direction)
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param.ty)?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

/// A module-level function: an entry point, a helper, or an extern prototype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionDecl {
    pub name: String,
    pub signature: FunctionSignature,
    pub attributes: Vec<Attribute>,
    pub stage: Option<ShaderStage>,
    pub thread_group_size: Option<[u32; 3]>,
    /// `false` for `;`-terminated prototypes.
    pub has_body: bool,
    /// Module-level globals and functions referenced from the body, in order of first use.
    pub uses: Vec<String>,
    pub span: Span,
}

impl FunctionDecl {
    /// Whether this function is declared but defined elsewhere.
    pub fn is_extern(&self) -> bool {
        !self.has_body
    }

    /// Attributes not consumed by the toolchain.
    pub fn user_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| !a.is_builtin())
    }
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: ShaderType,
    pub span: Span,
}

/// A `struct` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<StructField>,
    pub span: Span,
}

impl StructDecl {
    /// Whether two declarations describe the same layout.
    pub fn same_fields(&self, other: &StructDecl) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name == b.name && a.ty == b.ty)
    }
}

/// An `interface` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceDecl {
    pub name: String,
    pub span: Span,
}

/// A `type_param` declaration; the name is absent for anonymous parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeParamDecl {
    pub name: Option<String>,
    pub constraint: Option<String>,
    pub span: Span,
}

/// A string literal that needs runtime hashing support.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashedString {
    pub value: String,
    pub hash: u64,
}

impl HashedString {
    /// Create a hashed string, computing its hash.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let hash = xxh64(value.as_bytes(), 0);
        Self { value, hash }
    }
}

/// Reference into one of a module's declaration tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Global(u32),
    Function(u32),
    Struct(u32),
    Interface(u32),
    TypeParam(u32),
}

/// A loaded, parsed and type-checked module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIr {
    pub name: String,
    pub origin: SourceOrigin,
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<FunctionDecl>,
    pub structs: Vec<StructDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub type_params: Vec<TypeParamDecl>,
    /// Indices into `functions`, in declaration order.
    pub entry_points: Vec<u32>,
    pub hashed_strings: Vec<HashedString>,
    /// Hash of the preprocessed source; equal content means equal hash.
    pub content_hash: u64,
    symbols: FxHashMap<String, Symbol>,
}

impl ModuleIr {
    /// Create an empty module.
    pub fn new(name: impl Into<String>, origin: SourceOrigin) -> Self {
        Self {
            name: name.into(),
            origin,
            globals: Vec::new(),
            functions: Vec::new(),
            structs: Vec::new(),
            interfaces: Vec::new(),
            type_params: Vec::new(),
            entry_points: Vec::new(),
            hashed_strings: Vec::new(),
            content_hash: 0,
            symbols: FxHashMap::default(),
        }
    }

    /// Look up a module-level name.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    /// Add a global. Returns the previous symbol if the name was taken.
    pub fn add_global(&mut self, global: GlobalVar) -> Result<(), Symbol> {
        let symbol = Symbol::Global(self.globals.len() as u32);
        self.claim(&global.name, symbol)?;
        self.globals.push(global);
        Ok(())
    }

    /// Add a function, registering it as an entry point when it has a stage.
    pub fn add_function(&mut self, function: FunctionDecl) -> Result<(), Symbol> {
        let index = self.functions.len() as u32;
        self.claim(&function.name, Symbol::Function(index))?;
        if function.stage.is_some() {
            self.entry_points.push(index);
        }
        self.functions.push(function);
        Ok(())
    }

    /// Add a struct.
    pub fn add_struct(&mut self, decl: StructDecl) -> Result<(), Symbol> {
        self.claim(&decl.name, Symbol::Struct(self.structs.len() as u32))?;
        self.structs.push(decl);
        Ok(())
    }

    /// Add an interface.
    pub fn add_interface(&mut self, decl: InterfaceDecl) -> Result<(), Symbol> {
        self.claim(&decl.name, Symbol::Interface(self.interfaces.len() as u32))?;
        self.interfaces.push(decl);
        Ok(())
    }

    /// Add a type parameter. Anonymous parameters never collide.
    pub fn add_type_param(&mut self, decl: TypeParamDecl) -> Result<(), Symbol> {
        if let Some(name) = &decl.name {
            self.claim(name, Symbol::TypeParam(self.type_params.len() as u32))?;
        }
        self.type_params.push(decl);
        Ok(())
    }

    fn claim(&mut self, name: &str, symbol: Symbol) -> Result<(), Symbol> {
        if let Some(existing) = self.symbols.get(name) {
            return Err(*existing);
        }
        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Number of entry points declared by this module.
    pub fn entry_point_count(&self) -> usize {
        self.entry_points.len()
    }

    /// The `index`-th entry point, if in range.
    pub fn entry_point(&self, index: usize) -> Option<&FunctionDecl> {
        let function = *self.entry_points.get(index)?;
        self.functions.get(function as usize)
    }

    /// Look up a struct by name.
    pub fn find_struct(&self, name: &str) -> Option<&StructDecl> {
        match self.lookup(name)? {
            Symbol::Struct(i) => self.structs.get(i as usize),
            _ => None,
        }
    }

    /// Look up a function by name.
    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        match self.lookup(name)? {
            Symbol::Function(i) => self.functions.get(i as usize),
            _ => None,
        }
    }

    /// Look up a global by name.
    pub fn find_global(&self, name: &str) -> Option<&GlobalVar> {
        match self.lookup(name)? {
            Symbol::Global(i) => self.globals.get(i as usize),
            _ => None,
        }
    }

    /// Whether two modules are the same logical unit with identical content.
    pub fn same_unit(&self, other: &ModuleIr) -> bool {
        self.name == other.name
            && self.origin == other.origin
            && self.content_hash == other.content_hash
    }
}
