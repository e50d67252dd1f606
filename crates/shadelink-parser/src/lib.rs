//! Reference front end for shadelink.
//!
//! Turns `.slang` interface source into checked [`ModuleIr`](shadelink_core::ModuleIr):
//!
//! 1. [`SourceLoader`] resolves a module name to text.
//! 2. [`preprocess`] evaluates `#define`/`#ifdef` directives.
//! 3. [`Lexer`] produces tokens; [`expand_macros`] substitutes macro values.
//! 4. [`Parser`] builds the declaration-level [`ast`].
//! 5. [`check_module`] resolves names and types.
//!
//! [`ShaderFrontEnd`] runs the whole pipeline behind the
//! [`FrontEnd`](shadelink_core::FrontEnd) trait.

pub mod ast;
mod checker;
mod frontend;
pub mod lexer;
mod parser;
mod preprocessor;
mod source;

pub use checker::check_module;
pub use frontend::{ShaderFrontEnd, compile_source};
pub use lexer::{LexError, Lexer, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use preprocessor::{MacroTable, PreprocessError, Preprocessed, expand_macros, preprocess};
pub use source::{
    FileSystemLoader, LoadFailure, LoadedSource, MODULE_EXTENSION, MemoryLoader, SourceLoader,
    module_file_name,
};
