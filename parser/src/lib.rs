//! # Parser
//!
//! Lexer, AST and recursive-descent parser for class-definition source.
//!
//! ```text
//!  impl Read (file, &[u8], …)
//!      │
//!      ▼
//!  ┌────────┐    Token stream     ┌────────┐
//!  │ Lexer  │ ──────────────────▶ │ Parser │ ──▶ ParseOutput { classes, errors }
//!  └────────┘  (impl Iterator)    └────────┘
//! ```
//!
//! ```rust
//! let output = parser::parse_source("Main = ( run = ( ^1 + 2 ) )");
//! assert!(output.is_ok());
//! assert_eq!(output.classes[0].methods[0].selector, "run");
//! ```

mod span;
mod token;
mod lexer;
pub mod ast;
mod parser;

pub use span::{Pos, Span};
pub use token::{Token, TokenKind};
pub use lexer::Lexer;
pub use parser::{ParseError, ParseOutput, Parser};

/// Lexes and parses a complete source text.
pub fn parse_source(source: &str) -> ParseOutput {
    Parser::new(Lexer::from_str(source)).parse_program()
}
