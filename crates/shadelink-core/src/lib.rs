//! Core types shared by every shadelink crate.
//!
//! - [`span`]: source locations
//! - [`diagnostics`]: the append-only diagnostics blob
//! - [`error`]: typed errors for configuration, indexing, linking and layout
//! - [`types`]: the shader type model
//! - [`ir`]: the checked module representation produced by a front end
//! - [`frontend`]: the front-end collaborator trait

pub mod diagnostics;
pub mod error;
pub mod frontend;
pub mod ir;
pub mod span;
pub mod types;

pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use error::{ConfigError, Error, IndexError, LayoutError, LinkError};
pub use frontend::{FrontEnd, FrontEndOutput, InlineSource, ModuleRequest, PreprocessorMacro};
pub use ir::{
    Attribute, AttributeArg, DescriptorBinding, ExplicitBinding, FunctionDecl, FunctionParam,
    FunctionSignature, GlobalVar, HashedString, InterfaceDecl, ModuleIr, ParamDirection,
    RegisterBinding, ShaderStage, SourceOrigin, StorageClass, StructDecl, StructField, Symbol,
    TypeParamDecl,
};
pub use span::Span;
pub use types::{GenericArity, ParameterCategory, RegisterClass, ResourceKind, ScalarKind, ShaderType};
