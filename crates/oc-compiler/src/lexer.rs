//! Lexer for languageO source text.
//!
//! Produces a flat token vector; text for identifiers and literals is owned
//! by the token itself rather than sliced from source, since the parser and
//! analyzer both outlive the raw input buffer.

use logos::Logos;
use oc_core::{Position, Span};
use std::fmt;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
pub enum TokenKind {
    #[token("class")]
    Class,
    #[token("extends")]
    Extends,
    #[token("var")]
    Var,
    #[token("method")]
    Method,
    #[token("constructor")]
    Constructor,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token("=")]
    Eq,
    #[token("=>")]
    FatArrow,

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse().ok(), priority = 3)]
    RealLit(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    IntLit(i64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier '{name}'"),
            TokenKind::IntLit(v) => write!(f, "integer literal '{v}'"),
            TokenKind::RealLit(v) => write!(f, "real literal '{v}'"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub span: Span,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized token at {}", self.span)
    }
}

impl std::error::Error for LexError {}

/// Tokenizes `source` into a flat vector, resolving byte offsets to
/// line/column positions as it walks the input once.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    let mut pos = Position::start();
    let mut prev = None;
    let mut cursor = 0usize;

    while let Some(result) = lexer.next() {
        let byte_span = lexer.span();
        advance_to(&mut pos, &mut prev, source, cursor, byte_span.start);
        let start = pos;
        advance_to(&mut pos, &mut prev, source, byte_span.start, byte_span.end);
        let end = pos;
        cursor = byte_span.end;

        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                span: Span::new(start, end),
            }),
            Err(()) => return Err(LexError { span: Span::new(start, end) }),
        }
    }

    Ok(tokens)
}

fn advance_to(pos: &mut Position, prev: &mut Option<char>, source: &str, from: usize, to: usize) {
    for ch in source[from..to].chars() {
        pos.advance(ch, *prev);
        *prev = Some(ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_and_identifiers() {
        let tokens = lex("class A extends B").unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Class,
                TokenKind::Ident("A".into()),
                TokenKind::Extends,
                TokenKind::Ident("B".into()),
            ]
        );
    }

    #[test]
    fn integer_and_real_literals_are_distinguished() {
        let tokens = lex("1 2.5").unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::IntLit(1), TokenKind::RealLit(2.5)]);
    }

    #[test]
    fn fat_arrow_is_not_split_into_eq_gt() {
        let tokens = lex("=>").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::FatArrow);
    }

    #[test]
    fn line_and_column_advance_across_newlines() {
        let tokens = lex("class A\nclass B").unwrap();
        let second_class = &tokens[2];
        assert_eq!(second_class.span.start, Position::new(2, 1));
    }

    #[test]
    fn unrecognized_character_is_an_error() {
        let err = lex("class A $").unwrap_err();
        assert_eq!(err.span.start, Position::new(1, 9));
    }
}
