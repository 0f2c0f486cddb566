//! Streaming lexer for class-definition source text.
//!
//! The [`Lexer`] reads bytes from any [`std::io::Read`] and implements
//! [`Iterator`] over [`Token`]s, ending with exactly one
//! [`TokenKind::Eof`]. Comments are `"..."` and are skipped like
//! whitespace. Strings are `'...'`, with `''` standing for one quote.
//!
//! Lexical problems never stop the stream: they become
//! [`TokenKind::Error`] tokens and the parser decides what to report.
use std::collections::VecDeque;
use std::io::{Bytes, Read};

use crate::span::{Pos, Span};
use crate::token::{Token, TokenKind};

// ═══════════════════════════════════════════════════════════════════
// Character classes
// ═══════════════════════════════════════════════════════════════════

/// Characters that make up binary operators. A lone `|` is the pipe
/// token; inside a longer operator it is an ordinary operator char.
fn is_op_char(c: u8) -> bool {
    matches!(
        c,
        b'+' | b'-' | b'*' | b'/' | b'=' | b'<' | b'>' | b'%' | b'&' | b'|' | b'~' | b','
            | b'@' | b'\\' | b'?'
    )
}

const PRAGMA_OPEN: &[u8] = b"<primitive:";

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

// ═══════════════════════════════════════════════════════════════════
// Input with lookahead
// ═══════════════════════════════════════════════════════════════════

struct Input<R: Read> {
    bytes: Bytes<R>,
    ahead: VecDeque<u8>,
    line: u32,
    column: u32,
}

impl<R: Read> Input<R> {
    fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes(),
            ahead: VecDeque::new(),
            line: 1,
            column: 1,
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    /// Byte `n` positions ahead; read errors end the input.
    fn peek_at(&mut self, n: usize) -> Option<u8> {
        while self.ahead.len() <= n {
            match self.bytes.next() {
                Some(Ok(b)) => self.ahead.push_back(b),
                _ => return None,
            }
        }
        self.ahead.get(n).copied()
    }

    fn peek(&mut self) -> Option<u8> {
        self.peek_at(0)
    }

    fn advance(&mut self) -> Option<u8> {
        self.peek()?;
        let b = self.ahead.pop_front()?;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Lexer
// ═══════════════════════════════════════════════════════════════════

pub struct Lexer<R: Read> {
    input: Input<R>,
    emitted_eof: bool,
    /// Whether the previous token can end an operand; decides if `-5`
    /// is a literal or a subtraction.
    after_operand: bool,
}

impl<R: Read> Lexer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            input: Input::new(reader),
            emitted_eof: false,
            after_operand: false,
        }
    }
}

impl<'a> Lexer<&'a [u8]> {
    pub fn from_str(source: &'a str) -> Self {
        Self::new(source.as_bytes())
    }
}

impl<R: Read> Lexer<R> {
    fn pos(&self) -> Pos {
        self.input.pos()
    }

    fn peek(&mut self) -> Option<u8> {
        self.input.peek()
    }

    fn peek_at(&mut self, n: usize) -> Option<u8> {
        self.input.peek_at(n)
    }

    fn advance(&mut self) -> Option<u8> {
        self.input.advance()
    }

    fn token(&self, kind: TokenKind, start: Pos, lexeme: impl Into<String>) -> Token {
        Token::new(kind, Span::new(start, self.pos()), lexeme)
    }

    fn error(&self, message: &str, start: Pos, lexeme: impl Into<String>) -> Token {
        self.token(TokenKind::Error(message.to_string()), start, lexeme)
    }

    // ───────────────────────────────────────────────────────────
    //  Whitespace and comments
    // ───────────────────────────────────────────────────────────

    /// Skips whitespace and comments. Returns an error token for a
    /// comment that never closes.
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'"') => {
                    let start = self.pos();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some(b'"') => break,
                            Some(_) => {}
                            None => {
                                return Some(self.error("unterminated comment", start, "\""));
                            }
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    // ───────────────────────────────────────────────────────────
    //  Literals
    // ───────────────────────────────────────────────────────────

    /// `'...'` with `''` as an escaped quote. A newline or end of input
    /// before the closing quote is an error.
    fn lex_string(&mut self) -> Token {
        let start = self.pos();
        self.advance();
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                Some(b'\'') if self.peek_at(1) == Some(b'\'') => {
                    self.advance();
                    self.advance();
                    bytes.push(b'\'');
                }
                Some(b'\'') => {
                    self.advance();
                    break;
                }
                Some(b'\n') | None => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    return self.error("unterminated string", start, text);
                }
                Some(b) => {
                    self.advance();
                    bytes.push(b);
                }
            }
        }
        let text = String::from_utf8_lossy(&bytes).into_owned();
        self.token(TokenKind::String(text.clone()), start, text)
    }

    /// Decimal digits, optionally after a `-` the caller has vetted.
    fn lex_number(&mut self) -> Token {
        let start = self.pos();
        let mut text = String::new();
        if self.peek() == Some(b'-') {
            self.advance();
            text.push('-');
        }
        while let Some(b) = self.peek().filter(u8::is_ascii_digit) {
            self.advance();
            text.push(b as char);
        }
        match text.parse::<i64>() {
            Ok(n) => self.token(TokenKind::Integer(n), start, text),
            Err(_) => self.error("integer literal too large", start, text),
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        while let Some(b) = self.peek().filter(|&b| is_ident_char(b)) {
            self.advance();
            text.push(b as char);
        }
        text
    }

    /// True when the next bytes are `:` not followed by `=`.
    fn at_keyword_colon(&mut self) -> bool {
        self.peek() == Some(b':') && self.peek_at(1) != Some(b'=')
    }

    fn lex_identifier_or_keyword(&mut self) -> Token {
        let start = self.pos();
        let mut name = self.read_identifier();
        if self.at_keyword_colon() {
            self.advance();
            name.push(':');
            return self.token(TokenKind::Keyword(name.clone()), start, name);
        }
        self.token(TokenKind::Identifier(name.clone()), start, name)
    }

    fn read_operator(&mut self) -> String {
        let mut op = String::new();
        while let Some(b) = self.peek().filter(|&b| is_op_char(b)) {
            // `x--1` is `x - -1`.
            if !op.is_empty() && b == b'-' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                break;
            }
            self.advance();
            op.push(b as char);
        }
        op
    }

    /// `#name`, `#at:put:`, `#+`, `#'any text'` or `#(` .
    fn lex_hash(&mut self) -> Token {
        let start = self.pos();
        self.advance();
        match self.peek() {
            Some(b'(') => {
                self.advance();
                self.token(TokenKind::ArrayStart, start, "#(")
            }
            Some(b'\'') => {
                let tok = self.lex_string();
                match tok.kind {
                    TokenKind::String(text) => {
                        let lexeme = format!("#'{text}'");
                        self.token(TokenKind::Symbol(text), start, lexeme)
                    }
                    _ => tok,
                }
            }
            Some(b) if is_ident_start(b) => {
                let mut name = self.read_identifier();
                while self.at_keyword_colon() {
                    self.advance();
                    name.push(':');
                    if !self.peek().is_some_and(is_ident_start) {
                        break;
                    }
                    name.push_str(&self.read_identifier());
                }
                let lexeme = format!("#{name}");
                self.token(TokenKind::Symbol(name), start, lexeme)
            }
            Some(b) if is_op_char(b) => {
                let op = self.read_operator();
                let lexeme = format!("#{op}");
                self.token(TokenKind::Symbol(op), start, lexeme)
            }
            _ => self.error("expected symbol after '#'", start, "#"),
        }
    }

    /// Whether the input continues with `<primitive:`. Anything else that
    /// starts with `<` is a binary operator, as in `3<pivot`.
    fn at_pragma(&mut self) -> bool {
        PRAGMA_OPEN
            .iter()
            .enumerate()
            .all(|(i, &b)| self.peek_at(i) == Some(b))
    }

    /// `<primitive: N>`; entered only when [`Self::at_pragma`] holds.
    fn lex_primitive(&mut self) -> Token {
        let start = self.pos();
        for _ in PRAGMA_OPEN {
            self.advance();
        }
        while self.peek().is_some_and(|b| b == b' ' || b == b'\t') {
            self.advance();
        }
        let mut digits = String::new();
        while let Some(b) = self.peek().filter(u8::is_ascii_digit) {
            self.advance();
            digits.push(b as char);
        }
        while self.peek().is_some_and(|b| b == b' ' || b == b'\t') {
            self.advance();
        }
        let lexeme = format!("<primitive: {digits}>");
        if self.peek() != Some(b'>') {
            return self.error("expected '>' to close primitive pragma", start, lexeme);
        }
        self.advance();
        match digits.parse::<i64>() {
            Ok(id) => self.token(TokenKind::Primitive(id), start, lexeme),
            Err(_) => self.error("primitive pragma needs a number", start, lexeme),
        }
    }

    // ───────────────────────────────────────────────────────────
    //  Dispatch
    // ───────────────────────────────────────────────────────────

    fn lex_token(&mut self) -> Token {
        if let Some(err) = self.skip_trivia() {
            return err;
        }
        let start = self.pos();
        let Some(c) = self.peek() else {
            return self.token(TokenKind::Eof, start, "");
        };

        let single = |lexer: &mut Self, kind: TokenKind, text: &str| {
            lexer.advance();
            lexer.token(kind, start, text)
        };

        match c {
            b'\'' => self.lex_string(),
            b'#' => self.lex_hash(),
            b'0'..=b'9' => self.lex_number(),
            b'-' if !self.after_operand && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                self.lex_number()
            }
            b if is_ident_start(b) => self.lex_identifier_or_keyword(),
            b':' if self.peek_at(1) == Some(b'=') => {
                self.advance();
                self.advance();
                self.token(TokenKind::Assign, start, ":=")
            }
            b':' => single(self, TokenKind::Colon, ":"),
            b'^' => single(self, TokenKind::Caret, "^"),
            b'.' => single(self, TokenKind::Period, "."),
            b';' => single(self, TokenKind::Semicolon, ";"),
            b'(' => single(self, TokenKind::LParen, "("),
            b')' => single(self, TokenKind::RParen, ")"),
            b'[' => single(self, TokenKind::LBracket, "["),
            b']' => single(self, TokenKind::RBracket, "]"),
            b'|' if !self.peek_at(1).is_some_and(|b| is_op_char(b) && b != b'|') => {
                single(self, TokenKind::Pipe, "|")
            }
            b'<' if self.at_pragma() => self.lex_primitive(),
            b if is_op_char(b) => {
                let op = self.read_operator();
                self.token(TokenKind::Operator(op.clone()), start, op)
            }
            other => {
                self.advance();
                let shown = (other as char).to_string();
                self.error("unexpected character", start, shown)
            }
        }
    }
}

impl<R: Read> Iterator for Lexer<R> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.lex_token();
        if token.is_eof() {
            self.emitted_eof = true;
        }
        self.after_operand = token.kind.ends_operand();
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::from_str(src).map(|t| t.kind).collect()
    }

    fn ident(s: &str) -> TokenKind {
        TokenKind::Identifier(s.into())
    }

    fn op(s: &str) -> TokenKind {
        TokenKind::Operator(s.into())
    }

    #[test]
    fn lex_empty() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("  \n\t "), vec![TokenKind::Eof]);
    }

    #[test]
    fn lex_integer() {
        assert_eq!(kinds("42"), vec![TokenKind::Integer(42), TokenKind::Eof]);
    }

    #[test]
    fn lex_negative_literal_only_where_binary_is_impossible() {
        assert_eq!(kinds("-3"), vec![TokenKind::Integer(-3), TokenKind::Eof]);
        assert_eq!(
            kinds("x-3"),
            vec![ident("x"), op("-"), TokenKind::Integer(3), TokenKind::Eof]
        );
        assert_eq!(
            kinds("x - -3"),
            vec![ident("x"), op("-"), TokenKind::Integer(-3), TokenKind::Eof]
        );
        assert_eq!(
            kinds("x--3"),
            vec![ident("x"), op("-"), TokenKind::Integer(-3), TokenKind::Eof]
        );
    }

    #[test]
    fn lex_identifier_and_keyword() {
        assert_eq!(
            kinds("at: i put: v"),
            vec![
                TokenKind::Keyword("at:".into()),
                ident("i"),
                TokenKind::Keyword("put:".into()),
                ident("v"),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_assignment_is_not_a_keyword() {
        assert_eq!(
            kinds("x:=3"),
            vec![ident("x"), TokenKind::Assign, TokenKind::Integer(3), TokenKind::Eof]
        );
    }

    #[test]
    fn lex_string_with_escaped_quote() {
        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::String("it's".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn lex_unterminated_string() {
        let toks = kinds("'abc");
        assert_eq!(toks[0], TokenKind::Error("unterminated string".into()));
        let toks = kinds("'ab\ncd'");
        assert_eq!(toks[0], TokenKind::Error("unterminated string".into()));
    }

    #[test]
    fn lex_symbols() {
        assert_eq!(
            kinds("#foo #at:put: #+ #'hello world'"),
            vec![
                TokenKind::Symbol("foo".into()),
                TokenKind::Symbol("at:put:".into()),
                TokenKind::Symbol("+".into()),
                TokenKind::Symbol("hello world".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_literal_array_start() {
        assert_eq!(
            kinds("#(-2 1)"),
            vec![
                TokenKind::ArrayStart,
                TokenKind::Integer(-2),
                TokenKind::Integer(1),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_operators_and_pipe() {
        assert_eq!(
            kinds("| a | a <= b , c"),
            vec![
                TokenKind::Pipe,
                ident("a"),
                TokenKind::Pipe,
                ident("a"),
                op("<="),
                ident("b"),
                op(","),
                ident("c"),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("|>")[0], op("|>"));
    }

    #[test]
    fn lex_comments_are_skipped() {
        assert_eq!(
            kinds("\"a comment\" 1 \"another\""),
            vec![TokenKind::Integer(1), TokenKind::Eof]
        );
        assert_eq!(
            kinds("\"open")[0],
            TokenKind::Error("unterminated comment".into())
        );
    }

    #[test]
    fn lex_primitive_pragma() {
        assert_eq!(
            kinds("<primitive: 15>"),
            vec![TokenKind::Primitive(15), TokenKind::Eof]
        );
        assert!(matches!(kinds("<primitive: x>")[0], TokenKind::Error(_)));
    }

    #[test]
    fn less_than_before_a_p_word_is_an_operator() {
        assert_eq!(
            kinds("a<pivot"),
            vec![ident("a"), op("<"), ident("pivot"), TokenKind::Eof]
        );
        assert_eq!(
            kinds("3<primitives"),
            vec![TokenKind::Integer(3), op("<"), ident("primitives"), TokenKind::Eof]
        );
        assert_eq!(
            kinds("x <= p"),
            vec![ident("x"), op("<="), ident("p"), TokenKind::Eof]
        );
    }

    #[test]
    fn lex_block_syntax() {
        assert_eq!(
            kinds("[:a | ^a]"),
            vec![
                TokenKind::LBracket,
                TokenKind::Colon,
                ident("a"),
                TokenKind::Pipe,
                TokenKind::Caret,
                ident("a"),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_unexpected_character() {
        let toks = kinds("a $ b");
        assert_eq!(toks[1], TokenKind::Error("unexpected character".into()));
        assert_eq!(toks[2], ident("b"), "lexing continues after an error");
    }

    #[test]
    fn lex_spans_track_lines() {
        let toks: Vec<Token> = Lexer::from_str("a\n  bc").collect();
        assert_eq!(toks[0].span.start, Pos::new(1, 1));
        assert_eq!(toks[1].span.start, Pos::new(2, 3));
        assert_eq!(toks[1].span.end, Pos::new(2, 5));
        assert_eq!(toks[1].lexeme, "bc");
    }
}
