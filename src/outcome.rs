//! The `(value | none, diagnostics)` result shape.

use shadelink_core::Diagnostics;

/// Result of an operation that reports problems as diagnostics.
///
/// `value` is `None` exactly when `diagnostics` holds at least one error.
/// `diagnostics` is `None` when nothing at all was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Outcome<T> {
    pub value: Option<T>,
    pub diagnostics: Option<Diagnostics>,
}

impl<T> Outcome<T> {
    pub(crate) fn new(value: Option<T>, diagnostics: Diagnostics) -> Self {
        Self {
            value,
            diagnostics: diagnostics.into_blob(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.value.is_some()
    }

    /// Whether any diagnostic, error or warning, was reported.
    pub fn has_diagnostics(&self) -> bool {
        self.diagnostics.is_some()
    }

    /// Split into the value, or the diagnostics explaining its absence.
    pub fn into_result(self) -> Result<T, Diagnostics> {
        match self.value {
            Some(value) => Ok(value),
            None => Err(self.diagnostics.unwrap_or_default()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: self.value.map(f),
            diagnostics: self.diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadelink_core::{Diagnostic, DiagnosticCode};

    #[test]
    fn empty_diagnostics_collapse_to_none() {
        let outcome = Outcome::new(Some(1), Diagnostics::new());
        assert!(outcome.is_ok());
        assert!(!outcome.has_diagnostics());
        assert_eq!(outcome.into_result(), Ok(1));
    }

    #[test]
    fn failure_keeps_diagnostics() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::error(DiagnosticCode::Syntax, "expected ';'"));
        let outcome: Outcome<u32> = Outcome::new(None, diagnostics.clone());
        assert_eq!(outcome.map(|v| v + 1).into_result(), Err(diagnostics));
    }
}
