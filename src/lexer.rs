// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Lexer for KQL filter expressions.
//!
//! The lexer is a state machine: each state inspects upcoming characters,
//! emits zero or more tokens and returns the successor state. Tokens go onto
//! an internal queue drained by the parser; the lexer never backtracks.

use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::ast::{ArrayOperator, RangeOperator};

/// A lexical token together with the byte offset where it started.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// A bare or quoted value. The quoted flag distinguishes `"true"` from
    /// the unquoted word `true`.
    Literal { value: String, quoted: bool },
    /// A field name followed by `:` or a range/array operator.
    Identifier(String),
    Colon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    RangeOp(RangeOperator),
    ArrayOp(ArrayOperator),
    Keyword(Keyword),
    Eof,
    /// An unrecoverable input error, surfaced by the parser.
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    And,
    Or,
    Not,
}

/// A lexer state: consumes input and returns the successor state, or `None`
/// once lexing is finished.
struct StateFn(fn(&mut Lexer<'_>) -> Option<StateFn>);

pub(crate) struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    tokens: VecDeque<Token>,
    /// Start offset and opening character of a `<`/`>` run while deciding
    /// between a range operator and an array operator.
    pending_op: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    /// Tokenize the whole input. The final token is always `Eof` unless an
    /// `Error` token terminated lexing early.
    pub(crate) fn run(input: &'a str) -> VecDeque<Token> {
        let mut lexer = Lexer {
            input,
            chars: input.char_indices().peekable(),
            tokens: VecDeque::new(),
            pending_op: None,
        };
        let mut state = StateFn(lex_text);
        while let Some(next) = (state.0)(&mut lexer) {
            state = next;
        }
        lexer.tokens
    }

    fn offset(&mut self) -> usize {
        match self.chars.peek() {
            Some((i, _)) => *i,
            None => self.input.len(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn emit(&mut self, kind: TokenKind, position: usize) {
        self.tokens.push_back(Token { kind, position });
    }
}

/// Characters that terminate a word run; everything else (including `@`,
/// `*`, `.` and `\`) is an ordinary word character.
fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '{' | '}' | ':' | '"' | '<' | '>')
}

/// Field-name shape: a letter or underscore, then letters, digits,
/// underscores and dots (dots model object navigation, `fields.active`).
fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Top-level dispatch state.
fn lex_text(l: &mut Lexer<'_>) -> Option<StateFn> {
    l.skip_whitespace();
    let position = l.offset();
    match l.peek() {
        None => {
            l.emit(TokenKind::Eof, position);
            None
        }
        Some('"') => Some(StateFn(lex_quoted)),
        Some('(') => {
            l.advance();
            l.emit(TokenKind::LParen, position);
            Some(StateFn(lex_text))
        }
        Some(')') => {
            l.advance();
            l.emit(TokenKind::RParen, position);
            Some(StateFn(lex_text))
        }
        Some('{') | Some('}') => Some(StateFn(lex_nested)),
        Some(':') => {
            l.advance();
            l.emit(TokenKind::Colon, position);
            Some(StateFn(lex_text))
        }
        Some('<') | Some('>') => Some(StateFn(lex_range_op)),
        Some(_) => Some(StateFn(lex_identifier)),
    }
}

/// Word runs: keywords, identifiers and bare literals.
fn lex_identifier(l: &mut Lexer<'_>) -> Option<StateFn> {
    let start = l.offset();
    while matches!(l.peek(), Some(c) if is_word_char(c)) {
        l.advance();
    }
    let end = l.offset();
    let word = l.input[start..end].to_string();

    match word.to_ascii_lowercase().as_str() {
        "and" => l.emit(TokenKind::Keyword(Keyword::And), start),
        "or" => l.emit(TokenKind::Keyword(Keyword::Or), start),
        "not" => l.emit(TokenKind::Keyword(Keyword::Not), start),
        _ => {
            // A word followed by `:` or a range/array operator is a field
            // name; whitespace before the operator is permitted
            // (`established_year < 2000`).
            l.skip_whitespace();
            if is_identifier(&word) && matches!(l.peek(), Some(':' | '<' | '>')) {
                l.emit(TokenKind::Identifier(word), start);
            } else {
                l.emit(
                    TokenKind::Literal {
                        value: word,
                        quoted: false,
                    },
                    start,
                );
            }
        }
    }
    Some(StateFn(lex_text))
}

/// Quoted literals with `\"`, `\\`, `\n` and `\t` escapes.
fn lex_quoted(l: &mut Lexer<'_>) -> Option<StateFn> {
    let position = l.offset();
    l.advance(); // opening quote
    let mut value = String::new();
    loop {
        match l.advance() {
            None => {
                l.emit(
                    TokenKind::Error("unterminated quoted string".to_string()),
                    position,
                );
                return None;
            }
            Some('"') => break,
            Some('\\') => match l.advance() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('"') => value.push('"'),
                Some('\\') => value.push('\\'),
                Some(other) => value.push(other),
                None => {
                    l.emit(
                        TokenKind::Error("unterminated quoted string".to_string()),
                        position,
                    );
                    return None;
                }
            },
            Some(c) => value.push(c),
        }
    }
    l.emit(TokenKind::Literal { value, quoted: true }, position);
    Some(StateFn(lex_text))
}

/// `<`, `<=`, `>`, `>=`, or handoff to [`lex_array_op`] for `<@`/`>@`.
fn lex_range_op(l: &mut Lexer<'_>) -> Option<StateFn> {
    let position = l.offset();
    let Some(first) = l.advance() else {
        return Some(StateFn(lex_text));
    };
    if l.peek() == Some('@') {
        l.pending_op = Some((position, first));
        return Some(StateFn(lex_array_op));
    }
    let operator = match (first, l.peek()) {
        ('<', Some('=')) => {
            l.advance();
            RangeOperator::Lte
        }
        ('>', Some('=')) => {
            l.advance();
            RangeOperator::Gte
        }
        ('<', _) => RangeOperator::Lt,
        _ => RangeOperator::Gt,
    };
    l.emit(TokenKind::RangeOp(operator), position);
    Some(StateFn(lex_text))
}

/// `<@` (contained by) and `>@` (contains).
fn lex_array_op(l: &mut Lexer<'_>) -> Option<StateFn> {
    let Some((position, first)) = l.pending_op.take() else {
        return Some(StateFn(lex_text));
    };
    l.advance(); // the `@`
    let operator = if first == '<' {
        ArrayOperator::ContainedBy
    } else {
        ArrayOperator::Contains
    };
    l.emit(TokenKind::ArrayOp(operator), position);
    Some(StateFn(lex_text))
}

/// `{` and `}` delimiting a nested-object value.
fn lex_nested(l: &mut Lexer<'_>) -> Option<StateFn> {
    let position = l.offset();
    match l.advance() {
        Some('{') => l.emit(TokenKind::LBrace, position),
        Some('}') => l.emit(TokenKind::RBrace, position),
        _ => {}
    }
    Some(StateFn(lex_text))
}
