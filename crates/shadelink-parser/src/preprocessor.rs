//! Line-oriented preprocessor.
//!
//! Directives are evaluated over raw lines before lexing. Directive lines and
//! lines in inactive regions are replaced by empty lines so that every token
//! keeps its original line number. Object-like macro substitution happens
//! afterwards on the token stream, see [`expand_macros`].

use bumpalo::Bump;
use rustc_hash::FxHashMap;
use shadelink_core::{PreprocessorMacro, Span};

use crate::lexer::{LexError, Lexer, Token, TokenKind};

/// Nesting limit for macro replacement.
const MAX_EXPANSION_DEPTH: usize = 16;

/// A malformed or unbalanced directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessError {
    pub message: String,
    pub span: Span,
}

/// Macro definitions in effect at the end of preprocessing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    definitions: FxHashMap<String, String>,
}

impl MacroTable {
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.definitions.insert(name.into(), value.into());
    }

    pub fn undefine(&mut self, name: &str) {
        self.definitions.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Replacement text, if `name` is defined.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.definitions.get(name).map(String::as_str)
    }

    /// Definitions sorted by name.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self
            .definitions
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable();
        entries
    }
}

/// Output of [`preprocess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    /// Source with directives and inactive lines blanked.
    pub text: String,
    pub macros: MacroTable,
}

struct Conditional {
    parent_active: bool,
    condition: bool,
    in_else: bool,
    span: Span,
}

impl Conditional {
    fn taking(&self) -> bool {
        self.parent_active && (self.condition != self.in_else)
    }
}

/// Evaluate directives in `source`, starting from `predefined` macros.
pub fn preprocess(
    source: &str,
    predefined: &[PreprocessorMacro],
) -> (Preprocessed, Vec<PreprocessError>) {
    let mut macros = MacroTable::default();
    for m in predefined {
        macros.define(m.name.clone(), m.value.clone());
    }

    let mut errors = Vec::new();
    let mut stack: Vec<Conditional> = Vec::new();
    let mut text = String::with_capacity(source.len());

    for (index, line) in source.split('\n').enumerate() {
        if index > 0 {
            text.push('\n');
        }
        let line_no = index as u32 + 1;
        let active = stack.last().is_none_or(Conditional::taking);

        let trimmed = line.trim_start();
        let Some(directive) = trimmed.strip_prefix('#') else {
            if active {
                text.push_str(line);
            }
            continue;
        };

        let col = (line.len() - trimmed.len()) as u32 + 1;
        let span = Span::new(line_no, col, trimmed.trim_end().len() as u32);
        let directive = strip_comment(directive).trim();
        let (word, rest) = split_word(directive);
        let mut error = |message: String| errors.push(PreprocessError { message, span });

        match word {
            "ifdef" | "ifndef" => {
                let condition = match identifier(rest) {
                    Some(name) => macros.is_defined(name) == (word == "ifdef"),
                    None => {
                        if active {
                            error(format!("#{} expects a macro name", word));
                        }
                        false
                    }
                };
                stack.push(Conditional {
                    parent_active: active,
                    condition,
                    in_else: false,
                    span,
                });
            }
            "else" => match stack.last_mut() {
                Some(frame) if frame.in_else => error("duplicate #else".into()),
                Some(frame) => frame.in_else = true,
                None => error("#else without matching #ifdef".into()),
            },
            "endif" => {
                if stack.pop().is_none() {
                    error("#endif without matching #ifdef".into());
                }
            }
            _ if !active => {}
            "define" => {
                let (name, value) = split_word(rest.trim_start());
                if identifier(name).is_none() {
                    error("#define expects a macro name".into());
                } else if value.starts_with('(') {
                    error(format!("function-like macro '{}' is not supported", name));
                } else {
                    macros.define(name, value.trim());
                }
            }
            "undef" => match identifier(rest) {
                Some(name) => macros.undefine(name),
                None => error("#undef expects a macro name".into()),
            },
            "pragma" | "" => {}
            other => error(format!("unsupported preprocessor directive '#{}'", other)),
        }
    }

    for frame in stack {
        errors.push(PreprocessError {
            message: "unterminated conditional block".into(),
            span: frame.span,
        });
    }

    (Preprocessed { text, macros }, errors)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(at) => &line[..at],
        None => line,
    }
}

fn split_word(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    (&text[..end], &text[end..])
}

/// The single identifier `text` consists of, if any.
fn identifier(text: &str) -> Option<&str> {
    let text = text.trim();
    let mut chars = text.chars();
    let first = chars.next()?;
    if (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Some(text)
    } else {
        None
    }
}

/// Replace identifiers that name object-like macros with their expansion.
///
/// Replacement tokens take the span of the identifier they replace. A macro
/// is never expanded inside its own replacement.
pub fn expand_macros<'ast>(
    tokens: Vec<Token<'ast>>,
    macros: &MacroTable,
    arena: &'ast Bump,
) -> (Vec<Token<'ast>>, Vec<LexError>) {
    let mut out = Vec::with_capacity(tokens.len());
    let mut errors = Vec::new();
    let mut active = Vec::new();
    expand_into(&mut out, &mut errors, tokens, macros, arena, &mut active);
    (out, errors)
}

fn expand_into<'ast>(
    out: &mut Vec<Token<'ast>>,
    errors: &mut Vec<LexError>,
    tokens: Vec<Token<'ast>>,
    macros: &MacroTable,
    arena: &'ast Bump,
    active: &mut Vec<&'ast str>,
) {
    for token in tokens {
        let replacement = (token.kind == TokenKind::Ident && !active.contains(&token.lexeme))
            .then(|| macros.get(token.lexeme))
            .flatten();
        let Some(replacement) = replacement else {
            out.push(token);
            continue;
        };
        if active.len() >= MAX_EXPANSION_DEPTH {
            errors.push(LexError {
                message: format!("macro '{}' expands too deeply", token.lexeme),
                span: token.span,
            });
            out.push(token);
            continue;
        }

        let (mut expanded, lex_errors) = Lexer::at(replacement, token.span, arena).tokenize();
        errors.extend(lex_errors);
        expanded.retain(|t| t.kind != TokenKind::Eof);
        for t in &mut expanded {
            t.span = token.span;
        }

        active.push(token.lexeme);
        expand_into(out, errors, expanded, macros, arena, active);
        active.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, predefined: &[PreprocessorMacro]) -> Preprocessed {
        let (out, errors) = preprocess(source, predefined);
        assert!(errors.is_empty(), "{:?}", errors);
        out
    }

    #[test]
    fn inactive_lines_keep_numbering() {
        let out = run("a\n#ifdef X\nb\n#else\nc\n#endif\nd", &[]);
        assert_eq!(out.text, "a\n\n\n\nc\n\nd");
    }

    #[test]
    fn predefined_macros_select_branches() {
        let out = run(
            "#ifdef USE_SHADOWS\nshadows\n#endif\n#ifndef USE_SHADOWS\nplain\n#endif",
            &[PreprocessorMacro::flag("USE_SHADOWS")],
        );
        assert_eq!(out.text, "\nshadows\n\n\n\n");
    }

    #[test]
    fn define_and_undef() {
        let out = run("#define COUNT 4 // lights\n#define FLAG\n#undef FLAG", &[]);
        assert_eq!(out.macros.get("COUNT"), Some("4"));
        assert!(!out.macros.is_defined("FLAG"));
    }

    #[test]
    fn defines_in_inactive_regions_are_ignored() {
        let out = run("#ifdef NOPE\n#define X 1\n#endif", &[]);
        assert!(!out.macros.is_defined("X"));
    }

    #[test]
    fn nested_conditionals() {
        let out = run(
            "#ifdef A\n#ifdef B\nab\n#else\na\n#endif\n#endif",
            &[PreprocessorMacro::flag("A")],
        );
        assert_eq!(out.text.lines().filter(|l| !l.is_empty()).collect::<Vec<_>>(), ["a"]);
    }

    #[test]
    fn unbalanced_directives_are_errors() {
        let (_, errors) = preprocess("#endif", &[]);
        assert_eq!(errors.len(), 1);

        let (_, errors) = preprocess("#ifdef A\nx", &[]);
        assert_eq!(errors[0].message, "unterminated conditional block");
        assert_eq!(errors[0].span.line, 1);

        let (_, errors) = preprocess("#include \"x.slang\"", &[]);
        assert!(errors[0].message.contains("#include"));
    }

    #[test]
    fn function_like_macros_are_rejected() {
        let (_, errors) = preprocess("#define SQR(x) x*x", &[]);
        assert!(errors[0].message.contains("function-like"));
    }

    #[test]
    fn expansion_substitutes_identifiers() {
        let arena = Bump::new();
        let mut macros = MacroTable::default();
        macros.define("N", "4");
        macros.define("LOOP", "LOOP");
        let (tokens, _) = Lexer::new("float x[N]; LOOP", &arena).tokenize();
        let (tokens, errors) = expand_macros(tokens, &macros, &arena);
        assert!(errors.is_empty());

        let lexemes: Vec<_> = tokens.iter().map(|t| t.lexeme).collect();
        assert_eq!(lexemes, ["float", "x", "[", "4", "]", ";", "LOOP", ""]);
        assert_eq!(tokens[3].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[3].span.col, 9);
    }
}
