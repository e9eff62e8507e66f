//! Hand-written recursive-descent parser.
//!
//! Each production returns its concrete `oc_core::ast` type directly; there
//! is no intermediate concrete syntax tree. Parsing stops at the first
//! syntax error rather than attempting recovery, matching the CLI's
//! contract of reporting a single `Parse failed` on bad input.

use oc_core::ast::{
    ClassDecl, ConstructorDecl, Expr, ExprKind, FieldDecl, Member, MethodBody, MethodDecl,
    NodeIdGen, Param, Program, Stmt, StmtKind, TypeRef,
};
use oc_core::Span;
use std::fmt;

use crate::lexer::{self, Token, TokenKind};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a complete source file into a `Program`.
pub fn parse(source: &str) -> ParseResult<Program> {
    let tokens = lexer::lex(source).map_err(|e| ParseError {
        message: "unrecognized token".to_string(),
        span: e.span,
    })?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    ids: NodeIdGen,
    /// Every name introduced by a top-level `class Name { ... }`, collected
    /// by a scan over the whole token stream before any parsing starts.
    /// `bareName(args)` is ambiguous between a constructor call and a
    /// same-class method call until the callee is known to be a declared
    /// (or built-in) class; this set is what makes that call parser-time
    /// rather than pushing it into the analyzer.
    class_names: std::collections::HashSet<String>,
}

/// True for the five built-in classes constructible as `Name(args)` without
/// ever being declared with `class`.
fn is_builtin_class(name: &str) -> bool {
    matches!(name, "Integer" | "Real" | "Boolean" | "Array" | "List")
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        let mut class_names = std::collections::HashSet::new();
        for pair in tokens.windows(2) {
            if let (TokenKind::Class, TokenKind::Ident(name)) = (&pair[0].kind, &pair[1].kind) {
                class_names.insert(name.clone());
            }
        }
        Self {
            tokens,
            pos: 0,
            ids: NodeIdGen::new(),
            class_names,
        }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .or_else(|| self.tokens.last().map(|t| t.span))
            .unwrap_or_default()
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            span: self.peek_span(),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        match self.peek() {
            Some(found) if std::mem::discriminant(found) == std::mem::discriminant(kind) => {
                Ok(self.advance().unwrap())
            }
            Some(found) => Err(self.error(format!("expected {kind:?}, found {found}"))),
            None => Err(self.error(format!("expected {kind:?}, found end of input"))),
        }
    }

    fn expect_ident(&mut self) -> ParseResult<(String, Span)> {
        match self.peek() {
            Some(TokenKind::Ident(_)) => {
                let tok = self.advance().unwrap();
                let TokenKind::Ident(name) = tok.kind else {
                    unreachable!()
                };
                Ok((name, tok.span))
            }
            Some(found) => Err(self.error(format!("expected identifier, found {found}"))),
            None => Err(self.error("expected identifier, found end of input")),
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self
            .peek()
            .map(|found| std::mem::discriminant(found) == std::mem::discriminant(kind))
            .unwrap_or(false)
        {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_program(mut self) -> ParseResult<Program> {
        let mut classes = Vec::new();
        while self.peek().is_some() {
            classes.push(self.parse_class()?);
        }
        Ok(Program { classes })
    }

    fn parse_class(&mut self) -> ParseResult<ClassDecl> {
        let start = self.peek_span();
        self.expect(&TokenKind::Class)?;
        let (name, _) = self.expect_ident()?;
        let base = if self.eat(&TokenKind::Extends) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        self.expect(&TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !matches!(self.peek(), Some(TokenKind::RBrace) | None) {
            members.push(self.parse_member()?);
        }
        let end = self.peek_span();
        self.expect(&TokenKind::RBrace)?;
        Ok(ClassDecl {
            id: self.ids.next(),
            name,
            base,
            members,
            span: Span::new(start.start, end.start),
        })
    }

    fn parse_member(&mut self) -> ParseResult<Member> {
        match self.peek() {
            Some(TokenKind::Var) => Ok(Member::Field(self.parse_field()?)),
            Some(TokenKind::Method) => Ok(Member::Method(self.parse_method()?)),
            Some(TokenKind::Constructor) => Ok(Member::Constructor(self.parse_constructor()?)),
            Some(found) => Err(self.error(format!(
                "expected 'var', 'method', or 'constructor', found {found}"
            ))),
            None => Err(self.error("unexpected end of input in class body")),
        }
    }

    fn parse_field(&mut self) -> ParseResult<FieldDecl> {
        let start = self.peek_span();
        self.expect(&TokenKind::Var)?;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::Colon)?;
        let init = self.parse_expr()?;
        self.expect(&TokenKind::Semi)?;
        Ok(FieldDecl {
            id: self.ids.next(),
            name,
            init,
            span: start,
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !matches!(self.peek(), Some(TokenKind::RParen)) {
            loop {
                let start = self.peek_span();
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let ty = self.parse_type_ref()?;
                params.push(Param {
                    id: self.ids.next(),
                    name,
                    ty,
                    span: start,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_type_ref(&mut self) -> ParseResult<TypeRef> {
        let (name, _) = self.expect_ident()?;
        if matches!(self.peek(), Some(TokenKind::LBracket)) && (name == "Array" || name == "List")
        {
            self.advance();
            let inner = self.parse_type_ref()?;
            self.expect(&TokenKind::RBracket)?;
            return Ok(if name == "Array" {
                TypeRef::Array(Box::new(inner))
            } else {
                TypeRef::List(Box::new(inner))
            });
        }
        Ok(TypeRef::Named(name))
    }

    fn parse_method(&mut self) -> ParseResult<MethodDecl> {
        let start = self.peek_span();
        self.expect(&TokenKind::Method)?;
        let (name, _) = self.expect_ident()?;
        let params = self.parse_params()?;
        let return_type = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type_ref()?)
        } else {
            None
        };

        let body = match self.peek() {
            Some(TokenKind::Semi) => {
                self.advance();
                None
            }
            Some(TokenKind::FatArrow) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semi)?;
                Some(MethodBody::Expr(Box::new(expr)))
            }
            Some(TokenKind::LBrace) => Some(MethodBody::Block(self.parse_block()?)),
            Some(found) => {
                return Err(self.error(format!(
                    "expected ';', '=>', or '{{' after method signature, found {found}"
                )));
            }
            None => return Err(self.error("unexpected end of input after method signature")),
        };

        Ok(MethodDecl {
            id: self.ids.next(),
            name,
            params,
            return_type,
            body,
            span: start,
        })
    }

    fn parse_constructor(&mut self) -> ParseResult<ConstructorDecl> {
        let start = self.peek_span();
        self.expect(&TokenKind::Constructor)?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(ConstructorDecl {
            id: self.ids.next(),
            params,
            body,
            span: start,
        })
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !matches!(self.peek(), Some(TokenKind::RBrace) | None) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        let start = self.peek_span();
        match self.peek() {
            Some(TokenKind::Var) => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let init = self.parse_expr()?;
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt {
                    id: self.ids.next(),
                    span: start,
                    kind: StmtKind::VarDecl { name, init },
                })
            }
            Some(TokenKind::While) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_block()?;
                Ok(Stmt {
                    id: self.ids.next(),
                    span: start,
                    kind: StmtKind::While { cond, body },
                })
            }
            Some(TokenKind::If) => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                let then_branch = self.parse_block()?;
                let else_branch = if self.eat(&TokenKind::Else) {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                Ok(Stmt {
                    id: self.ids.next(),
                    span: start,
                    kind: StmtKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                })
            }
            Some(TokenKind::Return) => {
                self.advance();
                let value = if matches!(self.peek(), Some(TokenKind::Semi)) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt {
                    id: self.ids.next(),
                    span: start,
                    kind: StmtKind::Return(value),
                })
            }
            Some(_) => {
                let expr = self.parse_expr()?;
                let kind = if self.eat(&TokenKind::Eq) {
                    let value = self.parse_expr()?;
                    StmtKind::Assign {
                        target: expr,
                        value,
                    }
                } else {
                    StmtKind::Expr(expr)
                };
                self.expect(&TokenKind::Semi)?;
                Ok(Stmt {
                    id: self.ids.next(),
                    span: start,
                    kind,
                })
            }
            None => Err(self.error("unexpected end of input in statement")),
        }
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(TokenKind::Dot) => {
                    self.advance();
                    let (member, member_span) = self.expect_ident()?;
                    let span = Span::new(expr.span.start, member_span.end);
                    if matches!(self.peek(), Some(TokenKind::LParen)) {
                        let args = self.parse_args()?;
                        expr = Expr {
                            id: self.ids.next(),
                            span,
                            kind: ExprKind::Call {
                                callee: Box::new(Expr {
                                    id: self.ids.next(),
                                    span,
                                    kind: ExprKind::MemberAccess {
                                        target: Box::new(expr),
                                        member,
                                    },
                                }),
                                args,
                            },
                        };
                    } else {
                        expr = Expr {
                            id: self.ids.next(),
                            span,
                            kind: ExprKind::MemberAccess {
                                target: Box::new(expr),
                                member,
                            },
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(TokenKind::RParen)) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.peek_span();
        match self.peek().cloned() {
            Some(TokenKind::IntLit(v)) => {
                self.advance();
                Ok(Expr {
                    id: self.ids.next(),
                    span: start,
                    kind: ExprKind::IntLiteral(v),
                })
            }
            Some(TokenKind::RealLit(v)) => {
                self.advance();
                Ok(Expr {
                    id: self.ids.next(),
                    span: start,
                    kind: ExprKind::RealLiteral(v),
                })
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Expr {
                    id: self.ids.next(),
                    span: start,
                    kind: ExprKind::BoolLiteral(true),
                })
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Expr {
                    id: self.ids.next(),
                    span: start,
                    kind: ExprKind::BoolLiteral(false),
                })
            }
            Some(TokenKind::This) => {
                self.advance();
                Ok(Expr {
                    id: self.ids.next(),
                    span: start,
                    kind: ExprKind::This,
                })
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            Some(TokenKind::Ident(name)) => {
                self.advance();
                if matches!(self.peek(), Some(TokenKind::LBracket)) {
                    self.advance();
                    let elem = self.parse_type_ref()?;
                    self.expect(&TokenKind::RBracket)?;
                    let args = self.parse_args()?;
                    return Ok(Expr {
                        id: self.ids.next(),
                        span: start,
                        kind: ExprKind::ConstructorCall {
                            class: name,
                            args,
                            generic: Some(elem),
                        },
                    });
                }
                if matches!(self.peek(), Some(TokenKind::LParen)) {
                    let args = self.parse_args()?;
                    let kind = if self.class_names.contains(&name) || is_builtin_class(&name) {
                        ExprKind::ConstructorCall {
                            class: name,
                            args,
                            generic: None,
                        }
                    } else {
                        ExprKind::Call {
                            callee: Box::new(Expr {
                                id: self.ids.next(),
                                span: start,
                                kind: ExprKind::Identifier(name),
                            }),
                            args,
                        }
                    };
                    return Ok(Expr {
                        id: self.ids.next(),
                        span: start,
                        kind,
                    });
                }
                Ok(Expr {
                    id: self.ids.next(),
                    span: start,
                    kind: ExprKind::Identifier(name),
                })
            }
            Some(found) => Err(self.error(format!("expected an expression, found {found}"))),
            None => Err(self.error("expected an expression, found end of input")),
        }
    }
}

#[cfg(test)]
mod tests;
