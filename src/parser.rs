// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Recursive-descent parser for KQL filter expressions.
//!
//! Grammar (keywords are case-insensitive; adjacent expressions combine with
//! an implicit `and` that binds looser than an explicit `or`):
//!
//! ```text
//! query    = seq EOF ;
//! seq      = or_expr { or_expr } ;
//! or_expr  = and_expr { "or" and_expr } ;
//! and_expr = not_expr { "and" not_expr } ;
//! not_expr = [ "not" ] primary ;
//! primary  = "(" seq ")"
//!          | identifier ":" value
//!          | identifier range_op literal
//!          | identifier array_op "(" literal { "and" literal } ")"
//!          | literal ;
//! value    = "(" seq ")" | "{" seq "}" | literal ;
//! ```
//!
//! Nesting depth and clause count are bounded; exceeding either limit fails
//! the parse rather than producing a partial tree.

use crate::ast::{ArrayOperator, Node, RangeOperator};
use crate::error::ParseError;
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

/// Limits and feature switches for a single parse.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum nesting depth of groups, nested objects and value lists.
    pub max_depth: usize,
    /// Maximum number of individual clauses and literal values.
    pub max_complexity: usize,
    /// Reject everything but conjunctions of simple clauses. `or`-lists of
    /// literals in value position stay allowed.
    pub disable_complex_expressions: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: 20,
            max_complexity: 20,
            disable_complex_expressions: false,
        }
    }
}

impl ParseOptions {
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_complexity(mut self, max_complexity: usize) -> Self {
        self.max_complexity = max_complexity;
        self
    }

    pub fn disable_complex_expressions(mut self) -> Self {
        self.disable_complex_expressions = true;
        self
    }
}

/// Parse a filter expression into an AST with default options.
pub fn parse_ast(input: &str) -> Result<Node, ParseError> {
    parse_ast_with(input, ParseOptions::default())
}

/// Parse a filter expression into an AST.
pub fn parse_ast_with(input: &str, options: ParseOptions) -> Result<Node, ParseError> {
    tracing::trace!(input_len = input.len(), "parsing filter expression");
    let mut parser = Parser {
        tokens: Lexer::run(input).into(),
        pos: 0,
        complexity: 0,
        eof: Token {
            kind: TokenKind::Eof,
            position: input.len(),
        },
        options,
    };
    parser.parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    complexity: usize,
    eof: Token,
    options: ParseOptions,
}

impl Parser {
    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn advance(&mut self) {
        if !matches!(self.current().kind, TokenKind::Eof) {
            self.pos += 1;
        }
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if matches!(self.current().kind, TokenKind::Keyword(k) if k == keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            message: message.into(),
            position: self.current().position,
        }
    }

    fn check_lex_error(&self) -> Result<(), ParseError> {
        if let TokenKind::Error(message) = &self.current().kind {
            return Err(ParseError::Lex {
                message: message.clone(),
                position: self.current().position,
            });
        }
        Ok(())
    }

    fn bump_complexity(&mut self) -> Result<(), ParseError> {
        self.complexity += 1;
        if self.complexity > self.options.max_complexity {
            return Err(ParseError::ComplexityExceeded {
                max_complexity: self.options.max_complexity,
            });
        }
        Ok(())
    }

    fn check_depth(&self, depth: usize) -> Result<(), ParseError> {
        if depth > self.options.max_depth {
            return Err(ParseError::DepthExceeded {
                max_depth: self.options.max_depth,
            });
        }
        Ok(())
    }

    fn parse(&mut self) -> Result<Node, ParseError> {
        self.check_lex_error()?;
        if matches!(self.current().kind, TokenKind::Eof) {
            return Err(ParseError::Empty);
        }
        let root = self.parse_seq(1)?;
        self.check_lex_error()?;
        if !matches!(self.current().kind, TokenKind::Eof) {
            return Err(self.syntax_error("unexpected token after expression"));
        }
        if self.options.disable_complex_expressions {
            validate_simple(&root)?;
        }
        Ok(root)
    }

    /// One nesting level: `or`-expressions implicitly joined with `and`.
    fn parse_seq(&mut self, depth: usize) -> Result<Node, ParseError> {
        self.check_depth(depth)?;
        let mut nodes = vec![self.parse_or_expr(depth)?];
        loop {
            self.check_lex_error()?;
            match self.current().kind {
                TokenKind::Eof | TokenKind::RParen | TokenKind::RBrace => break,
                _ => nodes.push(self.parse_or_expr(depth)?),
            }
        }
        Ok(collapse(nodes, false))
    }

    fn parse_or_expr(&mut self, depth: usize) -> Result<Node, ParseError> {
        let mut nodes = vec![self.parse_and_expr(depth)?];
        while self.match_keyword(Keyword::Or) {
            nodes.push(self.parse_and_expr(depth)?);
        }
        Ok(collapse(nodes, true))
    }

    fn parse_and_expr(&mut self, depth: usize) -> Result<Node, ParseError> {
        let mut nodes = vec![self.parse_not_expr(depth)?];
        while self.match_keyword(Keyword::And) {
            nodes.push(self.parse_not_expr(depth)?);
        }
        Ok(collapse(nodes, false))
    }

    fn parse_not_expr(&mut self, depth: usize) -> Result<Node, ParseError> {
        if self.match_keyword(Keyword::Not) {
            if matches!(self.current().kind, TokenKind::Keyword(k) if k == Keyword::Not) {
                return Err(self.syntax_error("double negation is not supported"));
            }
            let expr = self.parse_primary(depth)?;
            return Ok(Node::Not {
                expr: Box::new(expr),
            });
        }
        self.parse_primary(depth)
    }

    fn parse_primary(&mut self, depth: usize) -> Result<Node, ParseError> {
        self.check_lex_error()?;
        match &self.current().kind {
            TokenKind::LParen => {
                self.advance();
                let node = self.parse_seq(depth + 1)?;
                self.expect_rparen()?;
                Ok(node)
            }
            TokenKind::Identifier(name) => {
                let identifier = name.clone();
                self.advance();
                self.parse_field_expr(identifier, depth)
            }
            TokenKind::Literal { value, .. } => {
                let value = value.clone();
                self.advance();
                self.bump_complexity()?;
                Ok(Node::Literal { value })
            }
            _ => Err(self.syntax_error("expected expression")),
        }
    }

    fn parse_field_expr(&mut self, identifier: String, depth: usize) -> Result<Node, ParseError> {
        self.check_lex_error()?;
        match self.current().kind {
            TokenKind::Colon => {
                self.advance();
                let value = self.parse_is_value(depth)?;
                self.bump_complexity()?;
                Ok(Node::Is {
                    identifier,
                    value: Box::new(value),
                })
            }
            TokenKind::RangeOp(operator) => {
                self.advance();
                let value = self.expect_literal("expected literal after range operator")?;
                self.bump_complexity()?; // the literal
                self.bump_complexity()?; // the range clause
                Ok(Node::Range {
                    identifier,
                    operator,
                    value: Box::new(value),
                })
            }
            TokenKind::ArrayOp(operator) => {
                self.advance();
                self.parse_array_values(identifier, operator, depth)
            }
            _ => Err(self.syntax_error("expected ':' or comparison operator after field name")),
        }
    }

    fn parse_is_value(&mut self, depth: usize) -> Result<Node, ParseError> {
        self.check_lex_error()?;
        match &self.current().kind {
            TokenKind::LParen => {
                self.advance();
                let node = self.parse_seq(depth + 1)?;
                self.expect_rparen()?;
                Ok(node)
            }
            TokenKind::LBrace => {
                self.advance();
                let node = self.parse_seq(depth + 1)?;
                if !matches!(self.current().kind, TokenKind::RBrace) {
                    return Err(self.syntax_error("expected '}' after nested expression"));
                }
                self.advance();
                Ok(Node::Nested {
                    expr: Box::new(node),
                })
            }
            TokenKind::Literal { value, .. } => {
                let value = value.clone();
                self.advance();
                self.bump_complexity()?;
                Ok(Node::Literal { value })
            }
            _ => Err(self.syntax_error("expected value after ':'")),
        }
    }

    fn parse_array_values(
        &mut self,
        identifier: String,
        operator: ArrayOperator,
        depth: usize,
    ) -> Result<Node, ParseError> {
        self.check_depth(depth + 1)?;
        if !matches!(self.current().kind, TokenKind::LParen) {
            return Err(self.syntax_error("expected '(' after array operator"));
        }
        self.advance();
        let mut nodes = Vec::new();
        loop {
            let literal = self.expect_literal("expected literal in array value list")?;
            self.bump_complexity()?;
            nodes.push(literal);
            if !self.match_keyword(Keyword::And) {
                break;
            }
        }
        self.expect_rparen()?;
        self.bump_complexity()?;
        Ok(Node::Array {
            identifier,
            operator,
            nodes,
        })
    }

    fn expect_literal(&mut self, message: &str) -> Result<Node, ParseError> {
        self.check_lex_error()?;
        match &self.current().kind {
            TokenKind::Literal { value, .. } => {
                let value = value.clone();
                self.advance();
                Ok(Node::Literal { value })
            }
            _ => Err(self.syntax_error(message)),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        if !matches!(self.current().kind, TokenKind::RParen) {
            return Err(self.syntax_error("expected ')' after expression"));
        }
        self.advance();
        Ok(())
    }
}

fn collapse(mut nodes: Vec<Node>, or: bool) -> Node {
    if nodes.len() == 1 {
        nodes.swap_remove(0)
    } else if or {
        Node::Or { nodes }
    } else {
        Node::And { nodes }
    }
}

/// With complex expressions disabled the tree must be a conjunction of
/// simple clauses.
fn validate_simple(root: &Node) -> Result<(), ParseError> {
    let clauses: &[Node] = match root {
        Node::And { nodes } => nodes,
        other => std::slice::from_ref(other),
    };
    for clause in clauses {
        match clause {
            Node::Is { value, .. } => match value.as_ref() {
                Node::Literal { .. } => {}
                Node::Or { nodes } if nodes.iter().all(|n| matches!(n, Node::Literal { .. })) => {}
                _ => return Err(ParseError::ComplexExpressionsDisabled),
            },
            Node::Range { .. } | Node::Array { .. } | Node::Literal { .. } => {}
            _ => return Err(ParseError::ComplexExpressionsDisabled),
        }
    }
    Ok(())
}
