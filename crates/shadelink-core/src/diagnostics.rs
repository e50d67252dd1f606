//! Diagnostic messages produced while loading and composing shader modules.
//!
//! Every fallible operation in the toolchain can attach a [`Diagnostics`]
//! blob to its result. The blob is append-only; an absent blob means "no
//! issues" and is never an error by itself.

use std::fmt;

use crate::Span;

/// The severity level of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// The operation could not produce a usable artifact.
    Error,
    /// The artifact was produced, but something looks wrong.
    Warning,
    /// Additional context for another diagnostic.
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        })
    }
}

/// Stable identifiers for every diagnostic the toolchain can emit.
///
/// Tooling can match on these instead of parsing message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// No search path contains the requested module.
    ModuleNotFound,
    /// The module file exists but could not be read.
    SourceRead,
    /// Malformed or unbalanced preprocessor directive.
    Preprocessor,
    /// Unterminated literal or comment, or a stray character.
    Lexical,
    /// The token stream does not form a declaration.
    Syntax,
    /// A type name does not resolve.
    UndefinedType,
    /// A name is declared twice in one module.
    Redeclaration,
    /// A type is used where it is not allowed.
    InvalidType,
    /// An explicit binding does not fit the declaration.
    InvalidBinding,
    /// An attribute is unknown or has malformed arguments.
    InvalidAttribute,
    /// A compute entry point has no `numthreads` attribute.
    MissingThreadGroupSize,
    /// An explicit binding has no effect and was dropped.
    IgnoredBinding,
    /// Two components declare the same symbol incompatibly.
    SymbolConflict,
    /// An entry point depends on a symbol nobody defines.
    UnresolvedReference,
    /// Two parameters claim the same binding slot.
    BindingCollision,
    /// A slot range has no room left for a parameter.
    BindingsExhausted,
    /// A parameter's size or offset does not fit in 32 bits.
    LayoutOverflow,
}

impl DiagnosticCode {
    /// Numeric identifier, stable across releases.
    pub fn id(self) -> u32 {
        match self {
            DiagnosticCode::ModuleNotFound => 1001,
            DiagnosticCode::SourceRead => 1002,
            DiagnosticCode::Preprocessor => 1003,
            DiagnosticCode::Lexical => 2001,
            DiagnosticCode::Syntax => 2002,
            DiagnosticCode::UndefinedType => 3001,
            DiagnosticCode::Redeclaration => 3002,
            DiagnosticCode::InvalidType => 3003,
            DiagnosticCode::InvalidBinding => 3004,
            DiagnosticCode::InvalidAttribute => 3005,
            DiagnosticCode::MissingThreadGroupSize => 3006,
            DiagnosticCode::IgnoredBinding => 3007,
            DiagnosticCode::SymbolConflict => 4001,
            DiagnosticCode::UnresolvedReference => 4002,
            DiagnosticCode::BindingCollision => 4003,
            DiagnosticCode::BindingsExhausted => 4004,
            DiagnosticCode::LayoutOverflow => 4005,
        }
    }
}

/// A single diagnostic message.
///
/// `origin` names the component the message is attributed to (a module name
/// for load-time problems, a module or entry point for composition
/// problems). `related` points at the second party of a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// Machine-readable classification.
    pub code: DiagnosticCode,
    /// Human-readable message.
    pub message: String,
    /// The component or source the message is attributed to.
    pub origin: Option<String>,
    /// Location inside `origin`, default when not tied to a token.
    pub span: Span,
    /// The other component involved, for conflicts and collisions.
    pub related: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Create a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            origin: None,
            span: Span::default(),
            related: None,
        }
    }

    /// Attribute this diagnostic to a component or source.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Attach a source location.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Name the second party of a conflict.
    pub fn with_related(mut self, related: impl Into<String>) -> Self {
        self.related = Some(related.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.origin, self.span.is_known()) {
            (Some(origin), true) => write!(f, "{}:{}: ", origin, self.span)?,
            (Some(origin), false) => write!(f, "{}: ", origin)?,
            (None, true) => write!(f, "{}: ", self.span)?,
            (None, false) => {}
        }
        write!(f, "{}[E{}]: {}", self.severity, self.code.id(), self.message)?;
        if let Some(related) = &self.related {
            write!(f, "\n  note: see also {}", related)?;
        }
        Ok(())
    }
}

/// An append-only collection of diagnostics.
///
/// # Examples
///
/// ```
/// use shadelink_core::{Diagnostic, DiagnosticCode, Diagnostics};
///
/// let mut diagnostics = Diagnostics::new();
/// diagnostics.push(Diagnostic::warning(
///     DiagnosticCode::MissingThreadGroupSize,
///     "compute entry point 'main' has no [numthreads]",
/// ));
///
/// assert!(!diagnostics.has_errors());
/// assert_eq!(diagnostics.warning_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Append every diagnostic from `other`, preserving order.
    pub fn append(&mut self, other: Diagnostics) {
        for diagnostic in other.diagnostics {
            self.push(diagnostic);
        }
    }

    /// Returns `true` if at least one error was recorded.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Number of error diagnostics.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Number of warning diagnostics.
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Iterate over error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Iterate over warning diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Returns `true` if any diagnostic carries `code`.
    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }

    /// Iterate over all diagnostics in emission order.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    /// Number of diagnostics.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Convert into an optional blob: `None` when nothing was recorded.
    pub fn into_blob(self) -> Option<Diagnostics> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        for diagnostic in iter {
            self.push(diagnostic);
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}
