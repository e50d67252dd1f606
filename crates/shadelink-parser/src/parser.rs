//! Recursive-descent parser for module declarations.
//!
//! Only the declaration level is parsed. Function bodies and initializers
//! are skipped with brace and paren balancing; bodies are reduced to a
//! [`BodyNode`].

use bumpalo::Bump;
use shadelink_core::Span;

use crate::ast::*;
use crate::lexer::{Token, TokenKind};

/// A syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Parser state over a token buffer.
pub struct Parser<'ast> {
    buffer: Vec<Token<'ast>>,
    position: usize,
    arena: &'ast Bump,
    errors: Vec<ParseError>,
}

impl<'ast> Parser<'ast> {
    /// Create a parser. A trailing `Eof` token is added if missing.
    pub fn new(mut tokens: Vec<Token<'ast>>, arena: &'ast Bump) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", span));
        }
        Self {
            buffer: tokens,
            position: 0,
            arena,
            errors: Vec::new(),
        }
    }

    /// Parse every top-level declaration.
    ///
    /// A malformed declaration is reported and skipped; parsing resumes at
    /// the next declaration.
    pub fn parse_file(mut self) -> (SourceFile<'ast>, Vec<ParseError>) {
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof) {
            if self.eat(TokenKind::Semicolon).is_some() {
                continue;
            }
            let start = self.position;
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize(start);
                }
            }
        }
        let file = SourceFile {
            items: self.arena.alloc_slice_copy(&items),
        };
        (file, self.errors)
    }

    // ========================================================================
    // Token access
    // ========================================================================

    fn peek(&self) -> Token<'ast> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Token<'ast> {
        let last = self.buffer.len() - 1;
        self.buffer[(self.position + n).min(last)]
    }

    fn advance(&mut self) -> Token<'ast> {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_ident(&self, text: &str) -> bool {
        self.peek().is_ident(text)
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token<'ast>> {
        self.check(kind).then(|| self.advance())
    }

    fn eat_ident(&mut self, text: &str) -> bool {
        if self.check_ident(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'ast>, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<Ident<'ast>, ParseError> {
        let token = self.expect(TokenKind::Ident, what)?;
        Ok(Ident {
            name: token.lexeme,
            span: token.span,
        })
    }

    fn unexpected(&self, what: &str) -> ParseError {
        let found = self.peek();
        let found_text = match found.kind {
            TokenKind::Ident | TokenKind::IntLiteral | TokenKind::FloatLiteral => {
                format!("'{}'", found.lexeme)
            }
            kind => kind.describe().to_string(),
        };
        ParseError::new(format!("expected {}, found {}", what, found_text), found.span)
    }

    fn prev_span(&self) -> Span {
        self.position
            .checked_sub(1)
            .and_then(|i| self.buffer.get(i))
            .map(|t| t.span)
            .unwrap_or_default()
    }

    /// Rewind to `start` and skip the whole declaration that begins there.
    fn synchronize(&mut self, start: usize) {
        self.position = start;
        let mut depth = 0usize;
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Eof => return,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 && token.kind == TokenKind::RBrace {
                        self.eat(TokenKind::Semicolon);
                        return;
                    }
                }
                TokenKind::Semicolon if depth == 0 => return,
                _ => {}
            }
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn parse_item(&mut self) -> Result<Item<'ast>, ParseError> {
        let start = self.peek().span;
        let attrs = self.parse_attributes()?;

        if self.eat_ident("struct") {
            return self.parse_struct(start).map(Item::Struct);
        }
        if self.eat_ident("interface") {
            return self.parse_interface(start).map(Item::Interface);
        }
        if self.eat_ident("type_param") {
            return self.parse_type_param(start).map(Item::TypeParam);
        }
        if self.check_ident("import") || self.check_ident("__import") {
            return Err(ParseError::new(
                "module imports are not supported",
                self.peek().span,
            ));
        }

        let modifiers = self.parse_storage_modifiers();
        let ty = self.parse_type()?;
        let name = self.expect_ident("declaration name")?;
        if self.check(TokenKind::LParen) {
            self.parse_function(attrs, ty, name, start)
                .map(Item::Function)
        } else {
            self.parse_global(attrs, modifiers, ty, name, start)
                .map(Item::Global)
        }
    }

    /// Grammar: `('[' '['? ATTR (',' ATTR)* ']' ']'?)*`
    fn parse_attributes(&mut self) -> Result<&'ast [AttributeNode<'ast>], ParseError> {
        let mut attrs = Vec::new();
        while self.eat(TokenKind::LBracket).is_some() {
            let double = self.eat(TokenKind::LBracket).is_some();
            loop {
                attrs.push(self.parse_attribute()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RBracket, "']'")?;
            if double {
                self.expect(TokenKind::RBracket, "']'")?;
            }
        }
        Ok(self.arena.alloc_slice_copy(&attrs))
    }

    /// Grammar: `IDENT ('::' IDENT)* ('(' (ARG (',' ARG)*)? ')')?`
    fn parse_attribute(&mut self) -> Result<AttributeNode<'ast>, ParseError> {
        let first = self.expect_ident("attribute name")?;
        let name = if self.check(TokenKind::ColonColon) {
            let mut qualified = first.name.to_string();
            while self.eat(TokenKind::ColonColon).is_some() {
                qualified.push_str("::");
                qualified.push_str(self.expect_ident("attribute name")?.name);
            }
            let interned: &'ast str = self.arena.alloc_str(&qualified);
            interned
        } else {
            first.name
        };

        let mut args = Vec::new();
        if self.eat(TokenKind::LParen).is_some() && self.eat(TokenKind::RParen).is_none() {
            loop {
                args.push(self.parse_attribute_arg()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
        }

        Ok(AttributeNode {
            name,
            args: self.arena.alloc_slice_copy(&args),
            span: first.span.to(self.prev_span()),
        })
    }

    fn parse_attribute_arg(&mut self) -> Result<AttributeArgNode<'ast>, ParseError> {
        let negative = self.eat(TokenKind::Minus).is_some();
        let token = self.peek();
        let arg = match token.kind {
            TokenKind::IntLiteral => {
                let value = parse_int(token)?;
                AttributeArgNode::Int(if negative { -value } else { value })
            }
            TokenKind::FloatLiteral => {
                let value = parse_float(token)?;
                AttributeArgNode::Float(if negative { -value } else { value })
            }
            TokenKind::StringLiteral if !negative => {
                AttributeArgNode::Str(self.arena.alloc_str(&unquote(token.lexeme)))
            }
            TokenKind::Ident if !negative => AttributeArgNode::Ident(token.lexeme),
            _ => return Err(self.unexpected("attribute argument")),
        };
        self.advance();
        Ok(arg)
    }

    fn parse_storage_modifiers(&mut self) -> StorageModifiers {
        let mut modifiers = StorageModifiers::default();
        loop {
            if self.eat_ident("extern") {
                modifiers.is_extern = true;
            } else if self.eat_ident("uniform") {
                modifiers.is_uniform = true;
            } else if self.eat_ident("static") {
                modifiers.is_static = true;
            } else if self.eat_ident("const") {
                modifiers.is_const = true;
            } else {
                return modifiers;
            }
        }
    }

    /// Grammar: `IDENT ('<' (TYPE (',' TYPE)*)? '>')?`
    fn parse_type(&mut self) -> Result<TypeExpr<'ast>, ParseError> {
        let name = self.expect_ident("type name")?;
        let mut args = Vec::new();
        let has_arg_list = self.eat(TokenKind::Lt).is_some();
        if has_arg_list && self.eat(TokenKind::Gt).is_none() {
            loop {
                args.push(self.parse_type()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::Gt, "'>'")?;
        }
        Ok(TypeExpr {
            name,
            args: self.arena.alloc_slice_copy(&args),
            has_arg_list,
            span: name.span.to(self.prev_span()),
        })
    }

    /// Grammar: `('[' INT? ']')*`
    fn parse_dims(&mut self) -> Result<&'ast [Option<u32>], ParseError> {
        let mut dims = Vec::new();
        while self.eat(TokenKind::LBracket).is_some() {
            if self.eat(TokenKind::RBracket).is_some() {
                dims.push(None);
                continue;
            }
            let token = self.expect(TokenKind::IntLiteral, "array size")?;
            let size = parse_int(token)?;
            let size = u32::try_from(size)
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| ParseError::new("array size must be positive", token.span))?;
            dims.push(Some(size));
            self.expect(TokenKind::RBracket, "']'")?;
        }
        Ok(self.arena.alloc_slice_copy(&dims))
    }

    fn parse_global(
        &mut self,
        attrs: &'ast [AttributeNode<'ast>],
        modifiers: StorageModifiers,
        ty: TypeExpr<'ast>,
        name: Ident<'ast>,
        start: Span,
    ) -> Result<GlobalVarNode<'ast>, ParseError> {
        let dims = self.parse_dims()?;

        let mut register = None;
        if self.eat(TokenKind::Colon).is_some() {
            let keyword = self.expect_ident("'register' or a semantic")?;
            if keyword.name == "register" {
                self.expect(TokenKind::LParen, "'('")?;
                let slot = self.expect_ident("register slot")?;
                let space = match self.eat(TokenKind::Comma) {
                    Some(_) => Some(self.expect_ident("register space")?),
                    None => None,
                };
                self.expect(TokenKind::RParen, "')'")?;
                register = Some(RegisterNode {
                    slot,
                    space,
                    span: keyword.span.to(self.prev_span()),
                });
            }
        }

        let has_initializer = self.eat(TokenKind::Equal).is_some();
        if has_initializer {
            self.skip_until_depth_zero(&[TokenKind::Semicolon], "initializer")?;
        }
        self.expect(TokenKind::Semicolon, "';' after declaration")?;

        Ok(GlobalVarNode {
            attrs,
            modifiers,
            ty,
            declarator: Declarator { name, dims },
            register,
            has_initializer,
            span: start.to(self.prev_span()),
        })
    }

    /// Grammar: `'(' (PARAM (',' PARAM)*)? ')' (':' SEMANTIC)? (BODY | ';')`
    fn parse_function(
        &mut self,
        attrs: &'ast [AttributeNode<'ast>],
        return_ty: TypeExpr<'ast>,
        name: Ident<'ast>,
        start: Span,
    ) -> Result<FunctionNode<'ast>, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if self.check_ident("void") && self.peek_nth(1).kind == TokenKind::RParen {
            self.advance();
        }
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        let return_semantic = match self.eat(TokenKind::Colon) {
            Some(_) => Some(self.expect_ident("semantic")?),
            None => None,
        };

        let body = if self.eat(TokenKind::Semicolon).is_some() {
            None
        } else {
            let open = self.expect(TokenKind::LBrace, "'{' or ';'")?;
            Some(self.scan_body(open)?)
        };

        Ok(FunctionNode {
            attrs,
            return_ty,
            name,
            params: self.arena.alloc_slice_copy(&params),
            return_semantic,
            body,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_param(&mut self) -> Result<ParamNode<'ast>, ParseError> {
        let start = self.peek().span;
        let mut modifier = None;
        loop {
            let next = match self.peek().lexeme {
                "in" if modifier == Some(ParamModifier::Out) => ParamModifier::InOut,
                "out" if modifier == Some(ParamModifier::In) => ParamModifier::InOut,
                "in" => ParamModifier::In,
                "out" => ParamModifier::Out,
                "inout" => ParamModifier::InOut,
                "uniform" => ParamModifier::Uniform,
                "const" => {
                    self.advance();
                    continue;
                }
                _ => break,
            };
            if self.peek().kind != TokenKind::Ident {
                break;
            }
            self.advance();
            modifier = Some(next);
        }

        let ty = self.parse_type()?;
        let name = self.expect_ident("parameter name")?;
        let dims = self.parse_dims()?;
        let semantic = match self.eat(TokenKind::Colon) {
            Some(_) => Some(self.expect_ident("semantic")?),
            None => None,
        };
        if self.eat(TokenKind::Equal).is_some() {
            self.skip_until_depth_zero(&[TokenKind::Comma, TokenKind::RParen], "default value")?;
        }

        Ok(ParamNode {
            modifier,
            ty,
            declarator: Declarator { name, dims },
            semantic,
            span: start.to(self.prev_span()),
        })
    }

    /// Scan a body whose `{` was consumed, up to and including its `}`.
    fn scan_body(&mut self, open: Token<'ast>) -> Result<BodyNode<'ast>, ParseError> {
        let mut idents = Vec::new();
        let mut hashed = Vec::new();
        let mut depth = 1usize;
        let mut prev = TokenKind::LBrace;

        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Eof => {
                    return Err(ParseError::new(
                        "unbalanced '{' in function body",
                        open.span,
                    ));
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Ident if prev != TokenKind::Dot => {
                    if token.lexeme == "getStringHash"
                        && self.peek().kind == TokenKind::LParen
                        && self.peek_nth(1).kind == TokenKind::StringLiteral
                    {
                        let literal: &'ast str =
                            self.arena.alloc_str(&unquote(self.peek_nth(1).lexeme));
                        hashed.push(literal);
                    }
                    idents.push(Ident {
                        name: token.lexeme,
                        span: token.span,
                    });
                }
                _ => {}
            }
            prev = token.kind;
        }

        Ok(BodyNode {
            idents: self.arena.alloc_slice_copy(&idents),
            hashed_strings: self.arena.alloc_slice_copy(&hashed),
        })
    }

    /// Skip tokens until one of `stops` appears outside any brackets.
    /// The stop token is not consumed.
    fn skip_until_depth_zero(&mut self, stops: &[TokenKind], what: &str) -> Result<(), ParseError> {
        let start = self.peek().span;
        let mut depth = 0usize;
        loop {
            let kind = self.peek().kind;
            if depth == 0 && stops.contains(&kind) {
                return Ok(());
            }
            match kind {
                TokenKind::Eof => {
                    return Err(ParseError::new(format!("unterminated {}", what), start));
                }
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    if depth == 0 {
                        return Err(self.unexpected(what));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Grammar: `'struct' IDENT '{' (TYPE DECLARATOR (':' SEMANTIC)? ';')* '}' ';'?`
    fn parse_struct(&mut self, start: Span) -> Result<StructNode<'ast>, ParseError> {
        let name = self.expect_ident("struct name")?;
        self.expect(TokenKind::LBrace, "'{'")?;

        let mut fields = Vec::new();
        while self.eat(TokenKind::RBrace).is_none() {
            let field_start = self.peek().span;
            let ty = self.parse_type()?;
            let field_name = self.expect_ident("field name")?;
            let dims = self.parse_dims()?;
            if self.eat(TokenKind::Colon).is_some() {
                self.expect_ident("semantic")?;
            }
            self.expect(TokenKind::Semicolon, "';' after field")?;
            fields.push(FieldNode {
                ty,
                declarator: Declarator {
                    name: field_name,
                    dims,
                },
                span: field_start.to(self.prev_span()),
            });
        }
        self.eat(TokenKind::Semicolon);

        Ok(StructNode {
            name,
            fields: self.arena.alloc_slice_copy(&fields),
            span: start.to(self.prev_span()),
        })
    }

    /// Interface bodies are skipped; only the name participates.
    fn parse_interface(&mut self, start: Span) -> Result<InterfaceNode<'ast>, ParseError> {
        let name = self.expect_ident("interface name")?;
        let open = self.expect(TokenKind::LBrace, "'{'")?;
        self.scan_body(open)?;
        self.eat(TokenKind::Semicolon);
        Ok(InterfaceNode {
            name,
            span: start.to(self.prev_span()),
        })
    }

    /// Grammar: `'type_param' IDENT? (':' IDENT)? ';'`
    fn parse_type_param(&mut self, start: Span) -> Result<TypeParamNode<'ast>, ParseError> {
        let name = if self.check(TokenKind::Ident) {
            Some(self.expect_ident("type parameter name")?)
        } else {
            None
        };
        let constraint = match self.eat(TokenKind::Colon) {
            Some(_) => Some(self.expect_ident("interface name")?),
            None => None,
        };
        self.expect(TokenKind::Semicolon, "';' after type parameter")?;
        Ok(TypeParamNode {
            name,
            constraint,
            span: start.to(self.prev_span()),
        })
    }
}

fn parse_int(token: Token<'_>) -> Result<i64, ParseError> {
    let text = token.lexeme.trim_end_matches(['u', 'U', 'l', 'L']);
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| ParseError::new("integer literal out of range", token.span))
}

fn parse_float(token: Token<'_>) -> Result<f64, ParseError> {
    token
        .lexeme
        .trim_end_matches(['f', 'F', 'h', 'H', 'l', 'L'])
        .parse()
        .map_err(|_| ParseError::new("malformed float literal", token.span))
}

/// Strip quotes and resolve simple escapes.
fn unquote(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
