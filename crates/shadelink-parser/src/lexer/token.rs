use shadelink_core::Span;

/// Token categories.
///
/// Keywords are lexed as identifiers; the parser recognises them by text so
/// that function bodies, which are scanned rather than parsed, need no
/// keyword table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Lt,
    Gt,
    Comma,
    Semicolon,
    Colon,
    ColonColon,
    Equal,
    Dot,
    Minus,
    /// Any other operator character; only meaningful inside bodies.
    Other,
    Error,
    Eof,
}

impl TokenKind {
    /// Human-readable description for error messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::FloatLiteral => "float literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::ColonColon => "'::'",
            TokenKind::Equal => "'='",
            TokenKind::Dot => "'.'",
            TokenKind::Minus => "'-'",
            TokenKind::Other => "operator",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}

/// A token with its text and location.
///
/// Lexemes live in the parse arena, so tokens outlive the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'ast> {
    pub kind: TokenKind,
    pub lexeme: &'ast str,
    pub span: Span,
}

impl<'ast> Token<'ast> {
    pub fn new(kind: TokenKind, lexeme: &'ast str, span: Span) -> Self {
        Self { kind, lexeme, span }
    }

    /// Whether this is the identifier `text`.
    #[inline]
    pub fn is_ident(&self, text: &str) -> bool {
        self.kind == TokenKind::Ident && self.lexeme == text
    }
}
