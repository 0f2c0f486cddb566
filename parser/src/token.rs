use crate::span::Span;

/// The kind of a lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier, e.g. `x`, `Main`, `printString`.
    Identifier(String),
    /// Identifier directly followed by a colon, e.g. `at:`.
    Keyword(String),
    /// Integer literal; negative only when the `-` cannot be binary.
    Integer(i64),
    /// String contents with `''` already collapsed to `'`.
    String(String),
    /// Symbol text without the leading `#`, e.g. `foo`, `at:put:`, `+`.
    Symbol(String),
    /// Binary operator built from operator characters, e.g. `+`, `<=`, `=`.
    Operator(String),
    /// `<primitive: N>` pragma.
    Primitive(i64),

    /// `:=`
    Assign,
    /// `^`
    Caret,
    /// `:` introducing a block parameter.
    Colon,
    /// `.`
    Period,
    /// `;`
    Semicolon,
    /// `|`
    Pipe,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `#(` opening a literal array.
    ArrayStart,

    Eof,
    /// A lexical error; the message says what went wrong.
    Error(String),
}

impl TokenKind {
    /// Human-readable name, used in parser diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Identifier(_) => "identifier",
            TokenKind::Keyword(_) => "keyword",
            TokenKind::Integer(_) => "integer",
            TokenKind::String(_) => "string",
            TokenKind::Symbol(_) => "symbol",
            TokenKind::Operator(_) => "operator",
            TokenKind::Primitive(_) => "primitive pragma",
            TokenKind::Assign => "':='",
            TokenKind::Caret => "'^'",
            TokenKind::Colon => "':'",
            TokenKind::Period => "'.'",
            TokenKind::Semicolon => "';'",
            TokenKind::Pipe => "'|'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::ArrayStart => "'#('",
            TokenKind::Eof => "end of input",
            TokenKind::Error(_) => "invalid token",
        }
    }

    /// Whether a `-` right after this token is a binary operator.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier(_)
                | TokenKind::Integer(_)
                | TokenKind::String(_)
                | TokenKind::Symbol(_)
                | TokenKind::RParen
                | TokenKind::RBracket
        )
    }
}

/// A token with its source span and raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            lexeme: lexeme.into(),
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
