//! SGL lexical tokens.

use std::fmt;

/// One lexical token of SGL source text, plus the line/column it
/// started at (zero-indexed, matching `Context`'s convention).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A lowercase-led rule name: `expression`, `main`.
    Ident(String),
    /// An uppercase-led variable name: `NAME`, `OPEN`.
    UIdent(String),
    /// A backtick-delimited literal string, auto-escaped into a regex
    /// at parse time: `` `if` ``.
    Literal(String),
    /// A single-quoted raw regex pattern, used verbatim: `'[0-9]+'`.
    Regex(String),
    /// The raw text inside a `{ ... }` options block.
    Options(String),
    Colon,
    Semicolon,
    Pipe,
    Star,
    Question,
    Tilde,
    Percent,
    LParen,
    RParen,
    Comma,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier `{s}`"),
            TokenKind::UIdent(s) => write!(f, "variable `{s}`"),
            TokenKind::Literal(s) => write!(f, "literal `{s}`"),
            TokenKind::Regex(s) => write!(f, "regex `{s}`"),
            TokenKind::Options(s) => write!(f, "options `{{{s}}}`"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::Semicolon => write!(f, "`;`"),
            TokenKind::Pipe => write!(f, "`|`"),
            TokenKind::Star => write!(f, "`*`"),
            TokenKind::Question => write!(f, "`?`"),
            TokenKind::Tilde => write!(f, "`~`"),
            TokenKind::Percent => write!(f, "`%`"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}
