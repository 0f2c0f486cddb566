use crate::ast::{ClassDef, Expr, ExprKind, KeywordPair, Literal, MethodBody, MethodDef};
use crate::span::Span;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl std::error::Error for ParseError {}

/// Result of parsing a whole source text.
///
/// `classes` is best effort: a class with a broken method is still
/// returned with the methods that parsed. Any entry in `errors` means
/// the parse as a whole failed.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub classes: Vec<ClassDef>,
    pub errors: Vec<ParseError>,
}

impl ParseOutput {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Recursive-descent parser with panic-mode error reporting.
///
/// After an error only the first report is kept; the parser then skips
/// to the end of the current method (or class) and resumes reporting.
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: std::iter::Peekable<I>,
    last_span: Span,
    at_eof: bool,
    /// Open `(` / `#(` count, used to resynchronize.
    depth: usize,
    panicking: bool,
    errors: Vec<ParseError>,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I) -> Self {
        Self {
            tokens: tokens.peekable(),
            last_span: Span::default(),
            at_eof: false,
            depth: 0,
            panicking: false,
            errors: Vec::new(),
        }
    }

    // ───────────────────────────────────────────────────────────
    //  Token plumbing
    // ───────────────────────────────────────────────────────────

    fn peek_kind(&mut self) -> &TokenKind {
        match self.tokens.peek() {
            Some(tok) => &tok.kind,
            None => &TokenKind::Eof,
        }
    }

    fn peek_span(&mut self) -> Span {
        match self.tokens.peek() {
            Some(tok) => tok.span,
            None => self.last_span,
        }
    }

    fn advance(&mut self) -> Token {
        match self.tokens.next() {
            Some(tok) => {
                self.last_span = tok.span;
                match tok.kind {
                    TokenKind::Eof => self.at_eof = true,
                    TokenKind::LParen | TokenKind::ArrayStart => self.depth += 1,
                    TokenKind::RParen => self.depth = self.depth.saturating_sub(1),
                    _ => {}
                }
                tok
            }
            None => {
                self.at_eof = true;
                Token::new(TokenKind::Eof, self.last_span, "")
            }
        }
    }

    fn check(&mut self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_end(&mut self) -> bool {
        self.at_eof || self.check(&TokenKind::Eof)
    }

    fn unexpected(tok: &Token, wanted: &str) -> ParseError {
        match &tok.kind {
            TokenKind::Error(message) => ParseError::new(message.clone(), tok.span),
            other => ParseError::new(format!("expected {wanted}, found {}", other.name()), tok.span),
        }
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<Token, ParseError> {
        let tok = self.advance();
        if std::mem::discriminant(&tok.kind) == std::mem::discriminant(expected) {
            Ok(tok)
        } else {
            Err(Self::unexpected(&tok, expected.name()))
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), ParseError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Identifier(name) => Ok((name, tok.span)),
            _ => Err(Self::unexpected(&tok, "identifier")),
        }
    }

    fn expect_equals(&mut self) -> Result<(), ParseError> {
        let tok = self.advance();
        match &tok.kind {
            TokenKind::Operator(op) if op == "=" => Ok(()),
            _ => Err(Self::unexpected(&tok, "'='")),
        }
    }

    // ───────────────────────────────────────────────────────────
    //  Errors and recovery
    // ───────────────────────────────────────────────────────────

    fn report(&mut self, error: ParseError) {
        if !self.panicking {
            self.errors.push(error);
        }
        self.panicking = true;
    }

    /// Skips to the `)` closing the current method body, or stops in
    /// front of the `)` closing the class.
    fn recover_method(&mut self, class_depth: usize) {
        loop {
            if self.at_end() || (self.check(&TokenKind::RParen) && self.depth == class_depth) {
                break;
            }
            let tok = self.advance();
            if matches!(tok.kind, TokenKind::RParen) && self.depth == class_depth {
                break;
            }
        }
        self.panicking = false;
    }

    /// Skips past the `)` that closes the current class.
    fn recover_class(&mut self) {
        loop {
            if self.at_end() {
                break;
            }
            let tok = self.advance();
            if matches!(tok.kind, TokenKind::RParen) && self.depth == 0 {
                break;
            }
        }
        self.panicking = false;
    }

    // ───────────────────────────────────────────────────────────
    //  Classes and methods
    // ───────────────────────────────────────────────────────────

    /// Parses every class definition up to end of input.
    pub fn parse_program(mut self) -> ParseOutput {
        let mut classes = Vec::new();
        while !self.at_end() {
            match self.parse_class() {
                Ok(class) => classes.push(class),
                Err(err) => {
                    self.report(err);
                    self.recover_class();
                }
            }
        }
        ParseOutput {
            classes,
            errors: self.errors,
        }
    }

    /// `Name = [Superclass] ( |ivars| methods )`
    ///
    /// Method errors and a missing closing paren are reported and the
    /// partial class is still returned; only a malformed header fails.
    pub fn parse_class(&mut self) -> Result<ClassDef, ParseError> {
        let (name, name_span) = self.expect_identifier()?;
        self.expect_equals()?;
        let superclass = match self.peek_kind() {
            TokenKind::Identifier(_) => Some(self.expect_identifier()?),
            _ => None,
        };
        self.expect(&TokenKind::LParen)?;
        let class_depth = self.depth;

        let instance_vars = if self.check(&TokenKind::Pipe) {
            self.parse_variable_list()?
        } else {
            Vec::new()
        };

        let mut methods = Vec::new();
        while !self.at_end() && !self.check(&TokenKind::RParen) {
            match self.parse_method() {
                Ok(method) => methods.push(method),
                Err(err) => {
                    self.report(err);
                    self.recover_method(class_depth);
                }
            }
        }
        let end = match self.expect(&TokenKind::RParen) {
            Ok(close) => close.span,
            Err(err) => {
                self.report(err);
                self.last_span
            }
        };

        Ok(ClassDef {
            name,
            name_span,
            superclass,
            instance_vars,
            methods,
            span: name_span.to(end),
        })
    }

    /// `| a b c |`
    fn parse_variable_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(&TokenKind::Pipe)?;
        let mut names = Vec::new();
        while let TokenKind::Identifier(_) = self.peek_kind() {
            names.push(self.expect_identifier()?.0);
        }
        self.expect(&TokenKind::Pipe)?;
        Ok(names)
    }

    pub fn parse_method(&mut self) -> Result<MethodDef, ParseError> {
        let start = self.peek_span();
        let tok = self.advance();
        let (selector, params) = match tok.kind {
            TokenKind::Identifier(name) => (name, Vec::new()),
            TokenKind::Operator(op) => (op, vec![self.expect_identifier()?.0]),
            TokenKind::Pipe => ("|".to_string(), vec![self.expect_identifier()?.0]),
            TokenKind::Keyword(first) => {
                let mut selector = first;
                let mut params = vec![self.expect_identifier()?.0];
                while let TokenKind::Keyword(_) = self.peek_kind() {
                    if let TokenKind::Keyword(kw) = self.advance().kind {
                        selector.push_str(&kw);
                    }
                    params.push(self.expect_identifier()?.0);
                }
                (selector, params)
            }
            _ => return Err(Self::unexpected(&tok, "method pattern")),
        };
        self.expect_equals()?;

        let body_start = self.peek_span();
        let body = match self.peek_kind() {
            TokenKind::Primitive(id) => {
                let id = *id;
                self.advance();
                MethodBody::Primitive {
                    id,
                    span: body_start,
                }
            }
            _ => {
                self.expect(&TokenKind::LParen)?;
                let locals = if self.check(&TokenKind::Pipe) {
                    self.parse_variable_list()?
                } else {
                    Vec::new()
                };
                let statements = self.parse_statements(&TokenKind::RParen)?;
                self.expect(&TokenKind::RParen)?;
                MethodBody::Code { locals, statements }
            }
        };

        Ok(MethodDef {
            selector,
            params,
            body,
            span: start.to(self.last_span),
        })
    }

    // ───────────────────────────────────────────────────────────
    //  Statements and expressions
    // ───────────────────────────────────────────────────────────

    /// Statements up to (not including) `terminator`, separated by
    /// periods. A trailing period is allowed.
    fn parse_statements(&mut self, terminator: &TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&TokenKind::Period) {}
            if self.check(terminator) || self.at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
            if !self.check(&TokenKind::Period) && !self.check(terminator) {
                return Err(ParseError::new(
                    "expected '.' between statements",
                    self.peek_span(),
                ));
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Caret) {
            let caret = self.advance();
            let value = self.parse_expression()?;
            let span = caret.span.to(value.span);
            return Ok(Expr::new(ExprKind::Return(Box::new(value)), span));
        }
        self.parse_expression()
    }

    /// Assignment, or a cascade-level message expression.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let primary = self.parse_primary()?;

        if self.check(&TokenKind::Assign) {
            let assign = self.advance();
            let ExprKind::Ident(target) = primary.kind else {
                return Err(ParseError::new(
                    format!("cannot assign to {primary}"),
                    assign.span,
                ));
            };
            let value = self.parse_expression()?;
            let span = primary.span.to(value.span);
            return Ok(Expr::new(
                ExprKind::Assignment {
                    target,
                    target_span: primary.span,
                    value: Box::new(value),
                },
                span,
            ));
        }

        let expr = self.parse_message_chain_from(primary)?;
        self.parse_cascade_tail(expr)
    }

    fn parse_message_chain_from(&mut self, primary: Expr) -> Result<Expr, ParseError> {
        let expr = self.parse_unary_tail(primary)?;
        let expr = self.parse_binary_tail(expr)?;
        self.parse_keyword_tail(expr)
    }

    fn parse_unary_tail(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        while let TokenKind::Identifier(_) = self.peek_kind() {
            let (selector, selector_span) = self.expect_identifier()?;
            let span = expr.span.to(selector_span);
            expr = Expr::new(
                ExprKind::UnaryMessage {
                    receiver: Box::new(expr),
                    selector,
                    selector_span,
                },
                span,
            );
        }
        Ok(expr)
    }

    fn binary_operator(&mut self) -> Option<String> {
        match self.peek_kind() {
            TokenKind::Operator(op) => Some(op.clone()),
            TokenKind::Pipe => Some("|".to_string()),
            _ => None,
        }
    }

    /// Binary sends share one precedence level and associate left.
    fn parse_binary_tail(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        while let Some(operator) = self.binary_operator() {
            let operator_span = self.advance().span;
            let operand = self.parse_primary()?;
            let argument = self.parse_unary_tail(operand)?;
            let span = expr.span.to(argument.span);
            expr = Expr::new(
                ExprKind::BinaryMessage {
                    receiver: Box::new(expr),
                    operator,
                    operator_span,
                    argument: Box::new(argument),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn parse_keyword_tail(&mut self, receiver: Expr) -> Result<Expr, ParseError> {
        let mut pairs = Vec::new();
        while let TokenKind::Keyword(_) = self.peek_kind() {
            let tok = self.advance();
            let TokenKind::Keyword(keyword) = tok.kind else {
                unreachable!("peeked a keyword");
            };
            let operand = self.parse_primary()?;
            let operand = self.parse_unary_tail(operand)?;
            let argument = self.parse_binary_tail(operand)?;
            pairs.push(KeywordPair {
                keyword,
                keyword_span: tok.span,
                argument,
            });
        }
        match pairs.last() {
            None => Ok(receiver),
            Some(last) => {
                let span = receiver.span.to(last.argument.span);
                Ok(Expr::new(
                    ExprKind::KeywordMessage {
                        receiver: Box::new(receiver),
                        pairs,
                    },
                    span,
                ))
            }
        }
    }

    /// `expr ; msg ; msg`: each cascaded message gets a copy of the first
    /// message's receiver.
    fn parse_cascade_tail(&mut self, expr: Expr) -> Result<Expr, ParseError> {
        if !self.check(&TokenKind::Semicolon) {
            return Ok(expr);
        }
        let Some((receiver, _, _)) = expr.as_send() else {
            return Err(ParseError::new("expected cascade message", expr.span));
        };
        let receiver = receiver.clone();
        let start = expr.span;
        let mut messages = vec![expr];

        while self.eat(&TokenKind::Semicolon) {
            let message = self.parse_message_chain_from(receiver.clone())?;
            if message.as_send().is_none() || message == receiver {
                return Err(ParseError::new("expected cascade message", self.peek_span()));
            }
            messages.push(message);
        }

        let span = messages.last().map_or(start, |m| start.to(m.span));
        Ok(Expr::new(ExprKind::Cascade { messages }, span))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek_span();
        match self.peek_kind() {
            TokenKind::Identifier(_) => {
                let (name, span) = self.expect_identifier()?;
                let kind = match name.as_str() {
                    "self" => ExprKind::SelfRef,
                    "super" => ExprKind::SuperRef,
                    "nil" => ExprKind::Literal(Literal::Nil),
                    "true" => ExprKind::Literal(Literal::True),
                    "false" => ExprKind::Literal(Literal::False),
                    _ => ExprKind::Ident(name),
                };
                Ok(Expr::new(kind, span))
            }
            TokenKind::Integer(_) | TokenKind::String(_) | TokenKind::Symbol(_) => {
                let tok = self.advance();
                let lit = match tok.kind {
                    TokenKind::Integer(n) => Literal::Integer(n),
                    TokenKind::String(s) => Literal::String(s),
                    TokenKind::Symbol(s) => Literal::Symbol(s),
                    _ => unreachable!("peeked a literal"),
                };
                Ok(Expr::new(ExprKind::Literal(lit), tok.span))
            }
            TokenKind::ArrayStart => {
                self.advance();
                let items = self.parse_literal_array()?;
                Ok(Expr::new(
                    ExprKind::Literal(Literal::Array(items)),
                    span.to(self.last_span),
                ))
            }
            TokenKind::LParen => {
                self.advance();
                let mut inner = self.parse_expression()?;
                let close = self.expect(&TokenKind::RParen)?;
                inner.span = span.to(close.span);
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_block(),
            _ => {
                let tok = self.advance();
                Err(Self::unexpected(&tok, "expression"))
            }
        }
    }

    /// Elements after `#(` through the closing `)`.
    fn parse_literal_array(&mut self) -> Result<Vec<Literal>, ParseError> {
        let mut items = Vec::new();
        loop {
            let tok = self.advance();
            let item = match tok.kind {
                TokenKind::RParen => return Ok(items),
                TokenKind::Integer(n) => Literal::Integer(n),
                TokenKind::String(s) => Literal::String(s),
                TokenKind::Symbol(s) => Literal::Symbol(s),
                TokenKind::Keyword(s) => Literal::Symbol(s),
                TokenKind::Identifier(name) => match name.as_str() {
                    "nil" => Literal::Nil,
                    "true" => Literal::True,
                    "false" => Literal::False,
                    _ => Literal::Symbol(name),
                },
                TokenKind::ArrayStart | TokenKind::LParen => {
                    Literal::Array(self.parse_literal_array()?)
                }
                TokenKind::Operator(op) => match self.peek_kind() {
                    TokenKind::Integer(n) if op == "-" => {
                        let n = -*n;
                        self.advance();
                        Literal::Integer(n)
                    }
                    _ => Literal::Symbol(op),
                },
                TokenKind::Eof => {
                    return Err(ParseError::new("unterminated literal array", tok.span));
                }
                _ => return Err(Self::unexpected(&tok, "literal")),
            };
            items.push(item);
        }
    }

    /// `[:a :b | |t| statements ]`
    fn parse_block(&mut self) -> Result<Expr, ParseError> {
        let open = self.expect(&TokenKind::LBracket)?;
        let mut params = Vec::new();
        while self.eat(&TokenKind::Colon) {
            params.push(self.expect_identifier()?.0);
        }
        if !params.is_empty() && !self.check(&TokenKind::RBracket) {
            self.expect(&TokenKind::Pipe)?;
        }
        let locals = if self.check(&TokenKind::Pipe) {
            self.parse_variable_list()?
        } else {
            Vec::new()
        };
        let body = self.parse_statements(&TokenKind::RBracket)?;
        let close = self.expect(&TokenKind::RBracket)?;
        Ok(Expr::new(
            ExprKind::Block {
                params,
                locals,
                body,
            },
            open.span.to(close.span),
        ))
    }
}
