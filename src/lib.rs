//! Shader compilation sessions and program reflection.
//!
//! A [`Session`] loads shader modules through a front end, composes modules
//! and entry points into linked programs, and exposes a [`ProgramLayout`]
//! for each of its targets:
//!
//! ```text
//! Registry ──► Session ──► load_module ──► ModuleId ──► EntryPointId
//!                 │                            │             │
//!                 └── create_composite_component_type ◄──────┘
//!                              │
//!                              ▼
//!                     CompositeId ──► layout(target) ──► ProgramLayout
//! ```
//!
//! Expected failures come back as an [`Outcome`] carrying
//! [`Diagnostics`]; configuration mistakes as [`ConfigError`]; misuse of
//! indices as [`IndexError`].

mod component;
mod config;
mod handle;
mod outcome;
mod session;

pub use component::ComponentType;
pub use config::SessionDesc;
pub use handle::{CompositeId, EntryPointId, ModuleId, SessionId};
pub use outcome::Outcome;
pub use session::{CompositeRef, CreateSession, EntryPointRef, ModuleRef, Session};

pub use shadelink_core::{
    Attribute, AttributeArg, ConfigError, Diagnostic, DiagnosticCode, Diagnostics, Error,
    FrontEnd, FunctionParam, FunctionSignature, IndexError, LayoutError, LinkError, ModuleIr,
    ParamDirection, ParameterCategory, PreprocessorMacro, Severity, ShaderStage, ShaderType,
    SourceOrigin,
};
pub use shadelink_linker::{
    ANONYMOUS_TYPE_PARAMETER, EntryPointLayout, EntryPointUniform, LayoutRules, LinkOptions,
    ParameterInfo, ProgramLayout, TypeParameterInfo, VaryingParameter,
};
pub use shadelink_parser::{FileSystemLoader, MemoryLoader, ShaderFrontEnd, SourceLoader};
pub use shadelink_registry::{
    LayoutOverrides, MatrixLayout, Registry, TargetDesc, TargetFlags, TargetFormat,
};
