//! Lexer for shader interface source.
//!
//! The [`Lexer`] converts preprocessed source text into [`Token`]s. Lexemes
//! are copied into the arena so the source string can be dropped once
//! lexing completes.

use bumpalo::Bump;
use shadelink_core::Span;

use super::cursor::{Cursor, is_ident_continue, is_ident_start};
use super::token::{Token, TokenKind};

/// A lexical error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

/// Lexer for shader source code.
pub struct Lexer<'src, 'ast> {
    cursor: Cursor<'src>,
    arena: &'ast Bump,
    errors: Vec<LexError>,
}

impl<'src, 'ast> Lexer<'src, 'ast> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str, arena: &'ast Bump) -> Self {
        Self {
            cursor: Cursor::new(source),
            arena,
            errors: Vec::new(),
        }
    }

    /// Create a lexer whose positions start at `span`.
    pub fn at(source: &'src str, span: Span, arena: &'ast Bump) -> Self {
        Self {
            cursor: Cursor::at(source, span.line, span.col),
            arena,
            errors: Vec::new(),
        }
    }

    /// Lex the whole input. The returned tokens always end with `Eof`.
    pub fn tokenize(mut self) -> (Vec<Token<'ast>>, Vec<LexError>) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, self.errors)
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Token<'ast> {
        self.skip_trivia();

        let line = self.cursor.line();
        let col = self.cursor.column();
        let start = self.cursor.offset();

        let Some(c) = self.cursor.peek() else {
            return Token::new(TokenKind::Eof, "", Span::point(line, col));
        };

        let kind = match c {
            '"' => return self.scan_string(line, col, start),
            c if c.is_ascii_digit() => self.scan_number(),
            '.' if self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.scan_number()
            }
            c if is_ident_start(c) => {
                self.cursor.eat_while(is_ident_continue);
                TokenKind::Ident
            }
            _ => self.scan_punct(c),
        };
        self.make_token(kind, line, col, start)
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) {
        loop {
            self.cursor.eat_while(|c| c.is_whitespace());
            if self.cursor.peek() == Some('/') {
                match self.cursor.peek_nth(1) {
                    Some('/') => {
                        self.cursor.eat_while(|c| c != '\n');
                        continue;
                    }
                    Some('*') => {
                        self.skip_block_comment();
                        continue;
                    }
                    _ => {}
                }
            }
            break;
        }
    }

    fn skip_block_comment(&mut self) {
        let span = Span::point(self.cursor.line(), self.cursor.column());
        self.cursor.advance();
        self.cursor.advance();
        loop {
            match self.cursor.advance() {
                None => {
                    self.errors.push(LexError {
                        message: "unterminated block comment".into(),
                        span,
                    });
                    return;
                }
                Some('*') if self.cursor.eat('/') => return,
                Some(_) => {}
            }
        }
    }

    fn make_token(&self, kind: TokenKind, line: u32, col: u32, start: u32) -> Token<'ast> {
        let end = self.cursor.offset();
        let text = &self.cursor.source()[start as usize..end as usize];
        let lexeme = self.arena.alloc_str(text);
        Token::new(kind, lexeme, Span::new(line, col, end - start))
    }

    fn scan_string(&mut self, line: u32, col: u32, start: u32) -> Token<'ast> {
        self.cursor.advance();
        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    let span = Span::new(line, col, self.cursor.offset() - start);
                    self.errors.push(LexError {
                        message: "unterminated string literal".into(),
                        span,
                    });
                    return Token::new(TokenKind::Error, "", span);
                }
                Some('\\') => {
                    self.cursor.advance();
                    self.cursor.advance();
                }
                Some('"') => {
                    self.cursor.advance();
                    return self.make_token(TokenKind::StringLiteral, line, col, start);
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        if self.cursor.peek() == Some('0') && matches!(self.cursor.peek_nth(1), Some('x' | 'X')) {
            self.cursor.advance();
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_hexdigit());
            self.cursor.eat_while(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
            return TokenKind::IntLiteral;
        }

        let mut kind = TokenKind::IntLiteral;
        self.cursor.eat_while(|c| c.is_ascii_digit());
        if self.cursor.peek() == Some('.') {
            kind = TokenKind::FloatLiteral;
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            let sign = matches!(self.cursor.peek_nth(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self
                .cursor
                .peek_nth(digit_at)
                .is_some_and(|c| c.is_ascii_digit())
            {
                kind = TokenKind::FloatLiteral;
                self.cursor.advance();
                if sign {
                    self.cursor.advance();
                }
                self.cursor.eat_while(|c| c.is_ascii_digit());
            }
        }
        match self.cursor.peek() {
            Some('f' | 'F' | 'h' | 'H' | 'l' | 'L') => {
                self.cursor.advance();
                TokenKind::FloatLiteral
            }
            Some('u' | 'U') if kind == TokenKind::IntLiteral => {
                self.cursor.advance();
                kind
            }
            _ => kind,
        }
    }

    fn scan_punct(&mut self, c: char) -> TokenKind {
        self.cursor.advance();
        match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' if self.cursor.eat(':') => TokenKind::ColonColon,
            ':' => TokenKind::Colon,
            '=' => TokenKind::Equal,
            '.' => TokenKind::Dot,
            '-' => TokenKind::Minus,
            '+' | '*' | '/' | '%' | '!' | '&' | '|' | '^' | '~' | '?' => TokenKind::Other,
            other => {
                let span = Span::new(
                    self.cursor.line(),
                    self.cursor.column() - other.len_utf8() as u32,
                    other.len_utf8() as u32,
                );
                self.errors.push(LexError {
                    message: format!("unexpected character '{}'", other),
                    span,
                });
                TokenKind::Error
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let arena = Bump::new();
        let (tokens, errors) = Lexer::new(source, &arena).tokenize();
        assert!(errors.is_empty(), "{:?}", errors);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn declaration_tokens() {
        assert_eq!(
            kinds("Texture2D<float4> albedo : register(t3);"),
            vec![
                TokenKind::Ident,
                TokenKind::Lt,
                TokenKind::Ident,
                TokenKind::Gt,
                TokenKind::Ident,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("8 0x1F 1.5 2e3 1.0f 4u"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::IntLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("// line\n/* block\n */ x"),
            vec![TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn qualified_attribute_name() {
        assert_eq!(
            kinds("vk::binding"),
            vec![
                TokenKind::Ident,
                TokenKind::ColonColon,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn spans_track_lines() {
        let arena = Bump::new();
        let (tokens, _) = Lexer::new("a\n  bb", &arena).tokenize();
        assert_eq!(tokens[1].span, Span::new(2, 3, 2));
        assert_eq!(tokens[1].lexeme, "bb");
    }

    #[test]
    fn unterminated_string_is_reported() {
        let arena = Bump::new();
        let (tokens, errors) = Lexer::new("\"abc", &arena).tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unterminated string"));
    }

    #[test]
    fn stray_character_is_reported() {
        let arena = Bump::new();
        let (_, errors) = Lexer::new("float @x;", &arena).tokenize();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span, Span::new(1, 7, 1));
    }
}
