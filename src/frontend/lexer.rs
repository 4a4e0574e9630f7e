//! SGL lexer: a char-by-char scanner with dedicated literal/regex/
//! options sub-modes entered on `` ` ``, `'`, and `{`, mirroring
//! `parse_sbnf.py`'s `SbnfLexer`/`LiteralLexer`/`RegexLexer`/
//! `OptionsLexer` pushdown. Reimplemented here as plain methods on one
//! `Lexer` struct (no explicit mode stack object) since none of SGL's
//! sub-modes can themselves nest, in the scanning style of
//! `part1`/`part2`'s hand-rolled scanners: an index into a `Vec<char>`,
//! line/column bookkeeping fed straight into `Context` on error.

use std::fmt;

use crate::context::Context;
use crate::frontend::token::{Token, TokenKind};

/// Lexical errors, reported with file/line/column via [`Context`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    UnexpectedChar(char),
    UnterminatedLiteral,
    UnterminatedRegex,
    UnterminatedOptions,
    UnexpectedEof,
    UnexpectedToken { expected: String, found: String },
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxError::UnexpectedChar(c) => write!(f, "unexpected character `{c}`"),
            SyntaxError::UnterminatedLiteral => write!(f, "unterminated `...` literal"),
            SyntaxError::UnterminatedRegex => write!(f, "unterminated '...' regex"),
            SyntaxError::UnterminatedOptions => write!(f, "unterminated {{...}} options block"),
            SyntaxError::UnexpectedEof => write!(f, "unexpected end of file"),
            SyntaxError::UnexpectedToken { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
        }
    }
}

pub type LexResult<T> = Result<T, Context<SyntaxError>>;

struct Lexer<'a> {
    chars: Vec<char>,
    lines: Vec<&'a str>,
    pos: usize,
    line: usize,
    col: usize,
    file_name: String,
}

/// Lex an entire `.sbnf` source string into a token stream, terminated
/// by a trailing [`TokenKind::Eof`].
pub fn lex(source: &str, file_name: &str) -> LexResult<Vec<Token>> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        lines: source.lines().collect(),
        pos: 0,
        line: 0,
        col: 0,
        file_name: file_name.to_string(),
    };
    lexer.run()
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> LexResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let (line, col) = (self.line, self.col);
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    col,
                });
                break;
            };
            let kind = match c {
                ':' => {
                    self.advance();
                    TokenKind::Colon
                }
                ';' => {
                    self.advance();
                    TokenKind::Semicolon
                }
                '|' => {
                    self.advance();
                    TokenKind::Pipe
                }
                '*' => {
                    self.advance();
                    TokenKind::Star
                }
                '?' => {
                    self.advance();
                    TokenKind::Question
                }
                '~' => {
                    self.advance();
                    TokenKind::Tilde
                }
                '%' => {
                    self.advance();
                    TokenKind::Percent
                }
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                '`' => TokenKind::Literal(self.scan_delimited('`', SyntaxError::UnterminatedLiteral)?),
                '\'' => TokenKind::Regex(self.scan_delimited('\'', SyntaxError::UnterminatedRegex)?),
                '{' => TokenKind::Options(self.scan_options()?),
                c if c.is_ascii_uppercase() || c == '_' => TokenKind::UIdent(self.scan_ident()),
                c if c.is_ascii_lowercase() => TokenKind::Ident(self.scan_ident()),
                other => return Err(self.error(SyntaxError::UnexpectedChar(other))),
            };
            tokens.push(Token { kind, line, col });
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    /// Scans a `delim ... delim` span, supporting `\delim` to escape a
    /// literal delimiter character inside the span.
    fn scan_delimited(&mut self, delim: char, unterminated: SyntaxError) -> LexResult<String> {
        self.advance(); // opening delimiter
        let mut s = String::new();
        loop {
            match self.advance() {
                Some(c) if c == delim => return Ok(s),
                Some('\\') => match self.advance() {
                    Some(c) if c == delim => s.push(c),
                    Some(c) => {
                        s.push('\\');
                        s.push(c);
                    }
                    None => return Err(self.error(unterminated)),
                },
                Some(c) => s.push(c),
                None => return Err(self.error(unterminated)),
            }
        }
    }

    fn scan_options(&mut self) -> LexResult<String> {
        self.advance(); // '{'
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('}') => return Ok(s),
                Some(c) => s.push(c),
                None => return Err(self.error(SyntaxError::UnterminatedOptions)),
            }
        }
    }

    fn error(&self, kind: SyntaxError) -> Context<SyntaxError> {
        let line_text = self.lines.get(self.line).copied().unwrap_or("").to_string();
        Context::new(kind, line_text, self.line, self.col, self.file_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src, "test.sbnf")
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_a_simple_rule() {
        let k = kinds("main : `if` expr ;");
        assert_eq!(
            k,
            vec![
                TokenKind::Ident("main".into()),
                TokenKind::Colon,
                TokenKind::Literal("if".into()),
                TokenKind::Ident("expr".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        let k = kinds("# a comment\nmain : 'a' ;");
        assert_eq!(k[0], TokenKind::Ident("main".into()));
    }

    #[test]
    fn reports_unterminated_literal_with_location() {
        let err = lex("main : `unterminated", "test.sbnf").unwrap_err();
        assert_eq!(*err.kind(), SyntaxError::UnterminatedLiteral);
    }

    #[test]
    fn scans_options_block_verbatim() {
        let k = kinds("NAME { foo: bar, baz }");
        assert_eq!(k[1], TokenKind::Options(" foo: bar, baz ".into()));
    }
}
