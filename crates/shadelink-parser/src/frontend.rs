//! The reference [`FrontEnd`]: load, preprocess, lex, parse, check.

use shadelink_core::{
    Diagnostic, DiagnosticCode, Diagnostics, FrontEnd, FrontEndOutput, ModuleRequest,
    PreprocessorMacro, SourceOrigin,
};
use xxhash_rust::xxh64::Xxh64;

use bumpalo::Bump;

use crate::checker::check_module;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::preprocessor::{Preprocessed, expand_macros, preprocess};
use crate::source::{FileSystemLoader, LoadFailure, LoadedSource, SourceLoader};

/// Front end over a [`SourceLoader`].
///
/// # Examples
///
/// ```
/// use shadelink_core::{FrontEnd, ModuleRequest};
/// use shadelink_parser::{MemoryLoader, ShaderFrontEnd};
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
/// let output = front_end.parse_and_check(&ModuleRequest {
///     name: "blit",
///     search_paths: &[],
///     macros: &[],
///     source: None,
/// });
///
/// let module = output.module.unwrap();
/// assert_eq!(module.entry_point_count(), 1);
/// assert_eq!(module.globals.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShaderFrontEnd<L = FileSystemLoader> {
    loader: L,
}

impl ShaderFrontEnd<FileSystemLoader> {
    /// Front end that resolves modules on disk.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: SourceLoader> ShaderFrontEnd<L> {
    pub fn with_loader(loader: L) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

impl<L: SourceLoader> FrontEnd for ShaderFrontEnd<L> {
    fn parse_and_check(&self, request: &ModuleRequest<'_>) -> FrontEndOutput {
        let source = match request.source {
            Some(inline) => LoadedSource {
                origin: SourceOrigin::Memory(inline.path.to_string()),
                text: inline.text.to_string(),
            },
            None => match self.loader.load(request.name, request.search_paths) {
                Ok(source) => source,
                Err(failure) => {
                    log::debug!("module '{}' failed to load: {:?}", request.name, failure);
                    return load_failure(request.name, failure);
                }
            },
        };
        compile_source(request.name, source, request.macros)
    }
}

fn load_failure(name: &str, failure: LoadFailure) -> FrontEndOutput {
    let diagnostic = match failure {
        LoadFailure::NotFound { searched } if searched.is_empty() => Diagnostic::error(
            DiagnosticCode::ModuleNotFound,
            format!("module '{}' not found", name),
        ),
        LoadFailure::NotFound { searched } => {
            let searched: Vec<_> = searched.iter().map(|p| p.display().to_string()).collect();
            Diagnostic::error(
                DiagnosticCode::ModuleNotFound,
                format!("module '{}' not found (searched {})", name, searched.join(", ")),
            )
        }
        LoadFailure::Unreadable { path, message } => Diagnostic::error(
            DiagnosticCode::SourceRead,
            format!("cannot read '{}': {}", path.display(), message),
        ),
    };

    let mut diagnostics = Diagnostics::new();
    diagnostics.push(diagnostic.with_origin(name));
    FrontEndOutput {
        module: None,
        diagnostics,
    }
}

/// Run every phase over already-loaded source text.
///
/// The module is returned only when no phase reported an error.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile_source(
    name: &str,
    source: LoadedSource,
    macros: &[PreprocessorMacro],
) -> FrontEndOutput {
    let origin_text = source.origin.to_string();
    let mut diagnostics = Diagnostics::new();
    let mut report = |code: DiagnosticCode, message: String, span| {
        diagnostics.push(
            Diagnostic::error(code, message)
                .with_origin(origin_text.clone())
                .with_span(span),
        );
    };

    let (preprocessed, pp_errors) = preprocess(&source.text, macros);
    for err in pp_errors {
        report(DiagnosticCode::Preprocessor, err.message, err.span);
    }

    let arena = Bump::new();
    let (tokens, lex_errors) = Lexer::new(&preprocessed.text, &arena).tokenize();
    let (tokens, expand_errors) = expand_macros(tokens, &preprocessed.macros, &arena);
    for err in lex_errors.into_iter().chain(expand_errors) {
        report(DiagnosticCode::Lexical, err.message, err.span);
    }

    let (file, parse_errors) = Parser::new(tokens, &arena).parse_file();
    for err in parse_errors {
        report(DiagnosticCode::Syntax, err.message, err.span);
    }

    let (mut module, check_diagnostics) = check_module(&file, name, source.origin);
    diagnostics.append(check_diagnostics);
    module.content_hash = content_hash(name, &preprocessed);

    log::debug!(
        "checked module '{}' ({}): {} globals, {} functions, {} entry points, {} diagnostics",
        name,
        origin_text,
        module.globals.len(),
        module.functions.len(),
        module.entry_point_count(),
        diagnostics.len()
    );

    let module = (!diagnostics.has_errors()).then_some(module);
    FrontEndOutput {
        module,
        diagnostics,
    }
}

/// Hash of everything that determines the checked module.
fn content_hash(name: &str, preprocessed: &Preprocessed) -> u64 {
    let mut hasher = Xxh64::new(0);
    hasher.update(name.as_bytes());
    hasher.update(&[0]);
    hasher.update(preprocessed.text.as_bytes());
    for (macro_name, value) in preprocessed.macros.sorted() {
        hasher.update(&[0]);
        hasher.update(macro_name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hasher.digest()
}
