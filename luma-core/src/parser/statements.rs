use std::rc::Rc;

use crate::ast::{
    Block, ClassDecl, ElseBranch, Expression, FunctionDecl, IfStatement, ModuleId, Statement,
    Visibility,
};
use crate::lexer::TokenKind;
use crate::parser::error::Expected;
use crate::parser::expressions::{parse_expression, parse_sequence, Precedence};
use crate::parser::{ParseError, Parser};

pub fn parse_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    match parser.peek_kind() {
        TokenKind::Module => parse_module_statement(parser),
        TokenKind::Use => parse_use_statement(parser),
        TokenKind::Open | TokenKind::Closed => {
            let modifier = parser.advance();
            let visibility = match modifier.kind {
                TokenKind::Open => Visibility::Open,
                _ => Visibility::Closed,
            };
            match parser.peek_kind() {
                TokenKind::Def => Ok(Statement::FuncDef(parse_function(parser, visibility)?)),
                TokenKind::Class => Ok(Statement::Class(parse_class(parser, visibility)?)),
                _ => Err(ParseError::DanglingVisibility(modifier)),
            }
        }
        TokenKind::Def => Ok(Statement::FuncDef(parse_function(
            parser,
            Visibility::default(),
        )?)),
        TokenKind::Class => Ok(Statement::Class(parse_class(parser, Visibility::default())?)),
        TokenKind::Print => {
            parser.advance();
            let value = parse_parenthesized(parser)?;
            parser.next_if_kind(TokenKind::Semicolon);
            Ok(Statement::Print(value))
        }
        TokenKind::If => Ok(Statement::If(parse_if_statement(parser)?)),
        TokenKind::While => {
            parser.advance();
            let condition = parse_parenthesized(parser)?;
            let body = parse_block(parser)?;
            Ok(Statement::While { condition, body })
        }
        TokenKind::Until => {
            parser.advance();
            let condition = parse_parenthesized(parser)?;
            let body = parse_block(parser)?;
            Ok(Statement::Until { condition, body })
        }
        TokenKind::Return => parse_return_statement(parser),
        TokenKind::Echo => {
            parser.advance();
            let count = parse_expression(parser, Precedence::Lowest)?;
            let body = parse_block(parser)?;
            Ok(Statement::Echo { count, body })
        }
        TokenKind::Maybe => {
            parser.advance();
            let body = parse_block(parser)?;
            let otherwise = match parser.next_if_kind(TokenKind::Otherwise) {
                Some(_) => Some(parse_block(parser)?),
                None => None,
            };
            Ok(Statement::Maybe { body, otherwise })
        }
        _ => parse_assignment_or_expression(parser),
    }
}

pub fn parse_block(parser: &mut Parser) -> Result<Block, ParseError> {
    parser.expect_token(TokenKind::LeftBrace)?;

    let mut statements = Vec::new();
    loop {
        match parser.peek_kind() {
            TokenKind::RightBrace => {
                parser.advance();
                return Ok(Block { statements });
            }
            TokenKind::Eof => {
                return Err(ParseError::unexpected_token(
                    TokenKind::RightBrace,
                    parser.peek_token(),
                ))
            }
            TokenKind::Semicolon => {
                parser.advance();
            }
            _ => statements.push(parse_statement(parser)?),
        }
    }
}

fn parse_parenthesized(parser: &mut Parser) -> Result<Expression, ParseError> {
    parser.expect_token(TokenKind::LeftParen)?;
    let expression = parse_expression(parser, Precedence::Lowest)?;
    parser.expect_token(TokenKind::RightParen)?;
    Ok(expression)
}

fn parse_if_statement(parser: &mut Parser) -> Result<IfStatement, ParseError> {
    parser.expect_token(TokenKind::If)?;
    let condition = parse_parenthesized(parser)?;
    let consequence = parse_block(parser)?;

    let alternative = if parser.next_if_kind(TokenKind::Else).is_some() {
        if parser.check(TokenKind::If) {
            Some(ElseBranch::ElseIf(Box::new(parse_if_statement(parser)?)))
        } else {
            Some(ElseBranch::Else(parse_block(parser)?))
        }
    } else {
        None
    };

    Ok(IfStatement {
        condition,
        consequence,
        alternative,
    })
}

fn parse_return_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    parser.expect_token(TokenKind::Return)?;

    let value = match parser.peek_kind() {
        TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof => None,
        _ => Some(parse_expression(parser, Precedence::Lowest)?),
    };
    parser.next_if_kind(TokenKind::Semicolon);

    Ok(Statement::Return(value))
}

fn parse_function(
    parser: &mut Parser,
    visibility: Visibility,
) -> Result<Rc<FunctionDecl>, ParseError> {
    parser.expect_token(TokenKind::Def)?;
    let name = parser.parse_ident()?;

    parser.expect_token(TokenKind::LeftParen)?;
    let parameters = parse_sequence(
        parser,
        |parser| parser.parse_ident(),
        TokenKind::Comma,
        TokenKind::RightParen,
    )?;

    let body = parse_block(parser)?;

    Ok(Rc::new(FunctionDecl {
        name,
        parameters,
        body,
        visibility,
    }))
}

fn parse_class(parser: &mut Parser, visibility: Visibility) -> Result<Rc<ClassDecl>, ParseError> {
    parser.expect_token(TokenKind::Class)?;
    let name = parser.parse_ident()?;
    parser.expect_token(TokenKind::LeftBrace)?;

    let mut methods = Vec::new();
    while !parser.check(TokenKind::RightBrace) && !parser.check(TokenKind::Eof) {
        if !parser.check(TokenKind::Def) {
            return Err(ParseError::unexpected_other(
                Expected::Method,
                parser.peek_token(),
            ));
        }
        methods.push(parse_function(parser, Visibility::default())?);
    }
    parser.expect_token(TokenKind::RightBrace)?;

    Ok(Rc::new(ClassDecl {
        name,
        methods,
        visibility,
    }))
}

fn parse_module_id(parser: &mut Parser) -> Result<ModuleId, ParseError> {
    let at = parser.expect_token(TokenKind::At)?;

    let mut segments = vec![parser.parse_ident()?.name];
    while parser.next_if_kind(TokenKind::Dot).is_some() {
        segments.push(parser.parse_ident()?.name);
    }

    Ok(ModuleId {
        segments,
        line: at.line,
    })
}

fn parse_module_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    parser.expect_token(TokenKind::Module)?;
    let module = parse_module_id(parser)?;
    parser.next_if_kind(TokenKind::Semicolon);

    Ok(Statement::Module(module))
}

fn parse_use_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    parser.expect_token(TokenKind::Use)?;
    let module = parse_module_id(parser)?;
    parser.expect_token(TokenKind::As)?;
    let alias = parser.parse_ident()?;
    parser.next_if_kind(TokenKind::Semicolon);

    Ok(Statement::Use { module, alias })
}

/// Expression statements, plus the statements whose shape is only known after
/// the leading expression: `name = value`, `obj.name = value`,
/// `obj[index] = value` and `a <-> b`.
fn parse_assignment_or_expression(parser: &mut Parser) -> Result<Statement, ParseError> {
    let expression = parse_expression(parser, Precedence::Lowest)?;

    if let Some(swap) = parser.next_if_kind(TokenKind::Swap) {
        let Expression::Variable(left) = expression else {
            return Err(ParseError::InvalidSwapTarget(swap));
        };
        let Expression::Variable(right) = parse_expression(parser, Precedence::Lowest)? else {
            return Err(ParseError::InvalidSwapTarget(swap));
        };
        parser.next_if_kind(TokenKind::Semicolon);
        return Ok(Statement::Swap { left, right });
    }

    if let Some(equal) = parser.next_if_kind(TokenKind::Equal) {
        let value = parse_expression(parser, Precedence::Lowest)?;
        parser.next_if_kind(TokenKind::Semicolon);

        let statement = match expression {
            Expression::Variable(name) => Statement::VarAssign { name, value },
            Expression::Get { object, name } => Statement::Expression(Expression::Set {
                object,
                name,
                value: Box::new(value),
            }),
            Expression::Index { object, index } => Statement::Expression(Expression::IndexSet {
                object,
                index,
                value: Box::new(value),
            }),
            _ => return Err(ParseError::InvalidAssignmentTarget(equal)),
        };
        return Ok(statement);
    }

    parser.next_if_kind(TokenKind::Semicolon);
    Ok(Statement::Expression(expression))
}
