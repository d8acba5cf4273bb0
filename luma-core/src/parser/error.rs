use std::fmt::Display;

use thiserror::Error;

use crate::lexer::{Token, TokenKind};

#[derive(Debug, PartialEq, Clone, Error)]
pub enum ParseError {
    #[error("Parse error at line {}: {expected} (got '{}')", .got.line, .got.lexeme)]
    UnexpectedToken { expected: Expected, got: Token },
    #[error("Parse error at line {}: Invalid number literal: {} (got '{}')", .0.line, .0.lexeme, .0.lexeme)]
    InvalidNumber(Token),
    #[error("Parse error at line {}: Invalid assignment target. (got '{}')", .0.line, .0.lexeme)]
    InvalidAssignmentTarget(Token),
    #[error("Parse error at line {}: Invalid swap target. (got '{}')", .0.line, .0.lexeme)]
    InvalidSwapTarget(Token),
    #[error("Parse error at line {}: '{}' must be followed by 'def' or 'class'. (got '{}')", .0.line, .0.lexeme, .0.lexeme)]
    DanglingVisibility(Token),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expected {
    Token(TokenKind),
    Identifier,
    Expression,
    Method,
}

impl Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Token(kind) => write!(f, "Expected {}.", describe(*kind)),
            Expected::Identifier => write!(f, "Expected identifier."),
            Expected::Expression => write!(f, "Expected expression."),
            Expected::Method => write!(f, "Expected 'def' to define method."),
        }
    }
}

fn describe(kind: TokenKind) -> &'static str {
    use TokenKind::*;
    match kind {
        LeftParen => "'('",
        RightParen => "')'",
        LeftBrace => "'{'",
        RightBrace => "'}'",
        LeftBracket => "'['",
        RightBracket => "']'",
        Comma => "','",
        Dot => "'.'",
        Semicolon => "';'",
        Colon => "':'",
        At => "'@'",
        Equal => "'='",
        As => "'as'",
        Identifier => "identifier",
        Eof => "end of input",
        _ => kind.name(),
    }
}

impl ParseError {
    pub fn unexpected_token(expected: TokenKind, got: Token) -> ParseError {
        ParseError::UnexpectedToken {
            expected: Expected::Token(expected),
            got,
        }
    }

    pub fn unexpected_other(expected: Expected, got: Token) -> ParseError {
        ParseError::UnexpectedToken { expected, got }
    }

    pub fn line(&self) -> usize {
        self.token().line
    }

    pub fn token(&self) -> &Token {
        match self {
            ParseError::UnexpectedToken { got, .. } => got,
            ParseError::InvalidNumber(token)
            | ParseError::InvalidAssignmentTarget(token)
            | ParseError::InvalidSwapTarget(token)
            | ParseError::DanglingVisibility(token) => token,
        }
    }
}
