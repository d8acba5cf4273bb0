use super::error;
use super::error::ParseError;
use crate::ast::{BinaryOperator, Expression, Literal, UnaryOperator};
use crate::lexer::{Token, TokenKind};
use crate::parser::Parser;
use crate::stack::ensure_sufficient_stack;

#[derive(PartialOrd, PartialEq, Debug, Clone, Copy)]
pub enum Precedence {
    Lowest = 0,
    Or,
    And,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
}

pub fn precedence_of(token: TokenKind) -> Precedence {
    match token {
        TokenKind::Or => Precedence::Or,
        TokenKind::And => Precedence::And,
        TokenKind::EqualEqual | TokenKind::BangEqual => Precedence::Equals,
        TokenKind::Less
        | TokenKind::LessEqual
        | TokenKind::Greater
        | TokenKind::GreaterEqual => Precedence::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Star | TokenKind::Slash => Precedence::Product,
        TokenKind::LeftParen | TokenKind::Dot | TokenKind::LeftBracket => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

pub fn parse_expression(
    parser: &mut Parser,
    precedence: Precedence,
) -> Result<Expression, ParseError> {
    ensure_sufficient_stack(|| {
        let token = parser.advance();
        let mut left_expression = prefix_parsing(token, parser)?;

        loop {
            let next_kind = parser.peek_kind();
            if precedence >= precedence_of(next_kind) {
                break;
            }

            let Some(infix_parse_function) = infix_parsing_function(next_kind) else {
                break;
            };
            parser.advance();
            left_expression = infix_parse_function(left_expression, parser)?;
        }

        Ok(left_expression)
    })
}

fn prefix_operation(
    operator: UnaryOperator,
) -> impl FnOnce(&mut Parser) -> Result<Expression, ParseError> {
    move |parser| {
        Ok(Expression::Unary(
            operator,
            Box::new(parse_expression(parser, Precedence::Prefix)?),
        ))
    }
}

fn parse_grouped_expression(parser: &mut Parser) -> Result<Expression, ParseError> {
    let expression = parse_expression(parser, Precedence::Lowest)?;
    parser.expect_token(TokenKind::RightParen)?;

    Ok(Expression::Grouping(Box::new(expression)))
}

pub(crate) fn parse_sequence<T>(
    parser: &mut Parser,
    parse_element: impl Fn(&mut Parser) -> Result<T, ParseError>,
    separator: TokenKind,
    terminator: TokenKind,
) -> Result<Vec<T>, ParseError> {
    let mut elements = Vec::new();

    loop {
        if parser.next_if_kind(terminator).is_some() {
            return Ok(elements);
        }
        elements.push(parse_element(parser)?);

        if parser.next_if_kind(separator).is_some() {
            continue;
        }
        if parser.next_if_kind(terminator).is_some() {
            return Ok(elements);
        }
        return Err(ParseError::unexpected_token(terminator, parser.peek_token()));
    }
}

fn parse_list_literal(parser: &mut Parser) -> Result<Expression, ParseError> {
    let expressions = parse_sequence(
        parser,
        |parser| parse_expression(parser, Precedence::Lowest),
        TokenKind::Comma,
        TokenKind::RightBracket,
    )?;
    Ok(Expression::List(expressions))
}

fn parse_map_literal(parser: &mut Parser) -> Result<Expression, ParseError> {
    let pairs = parse_sequence(
        parser,
        |parser| {
            let key = parse_expression(parser, Precedence::Lowest)?;
            parser.expect_token(TokenKind::Colon)?;
            let value = parse_expression(parser, Precedence::Lowest)?;
            Ok((key, value))
        },
        TokenKind::Comma,
        TokenKind::RightBrace,
    )?;
    Ok(Expression::Map(pairs))
}

fn parse_number(token: Token) -> Result<Expression, ParseError> {
    match token.lexeme.parse::<f64>() {
        Ok(value) => Ok(Expression::Literal(Literal::Number(value))),
        Err(_) => Err(ParseError::InvalidNumber(token)),
    }
}

/// Strip the quotes of a string lexeme and decode `\n \r \t \\ \"`. Any other
/// escape keeps its backslash.
pub fn unquote(lexeme: &str) -> String {
    let inner = lexeme
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(lexeme);

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

pub fn prefix_parsing(token: Token, parser: &mut Parser) -> Result<Expression, ParseError> {
    match token.kind {
        TokenKind::Identifier => Ok(Expression::Variable(crate::ast::Identifier {
            name: token.lexeme,
            line: token.line,
        })),
        TokenKind::Number => parse_number(token),
        TokenKind::String => Ok(Expression::Literal(Literal::String(
            unquote(&token.lexeme).into(),
        ))),
        TokenKind::True => Ok(Expression::Literal(Literal::Bool(true))),
        TokenKind::False => Ok(Expression::Literal(Literal::Bool(false))),
        TokenKind::Nil => Ok(Expression::Literal(Literal::Nil)),
        TokenKind::This => Ok(Expression::This(token.line)),
        TokenKind::Bang | TokenKind::Not => prefix_operation(UnaryOperator::Not)(parser),
        TokenKind::Minus => prefix_operation(UnaryOperator::Negate)(parser),
        TokenKind::LeftParen => parse_grouped_expression(parser),
        TokenKind::LeftBracket => parse_list_literal(parser),
        TokenKind::LeftBrace => parse_map_literal(parser),
        _ => Err(ParseError::unexpected_other(
            error::Expected::Expression,
            token,
        )),
    }
}

type InfixFunction = Box<dyn FnOnce(Expression, &mut Parser) -> Result<Expression, ParseError>>;

fn infix_operation(token: TokenKind, operator: BinaryOperator) -> InfixFunction {
    Box::new(
        move |left: Expression, parser: &mut Parser| -> Result<Expression, ParseError> {
            let new_precedence = precedence_of(token);

            Ok(Expression::Binary(
                operator,
                Box::new(left),
                Box::new(parse_expression(parser, new_precedence)?),
            ))
        },
    )
}

fn parse_call_function(left: Expression, parser: &mut Parser) -> Result<Expression, ParseError> {
    let arguments = parse_sequence(
        parser,
        |parser| parse_expression(parser, Precedence::Lowest),
        TokenKind::Comma,
        TokenKind::RightParen,
    )?;

    Ok(Expression::Call {
        callee: Box::new(left),
        arguments,
    })
}

fn parse_index_expression(left: Expression, parser: &mut Parser) -> Result<Expression, ParseError> {
    let index = parse_expression(parser, Precedence::Lowest)?;
    parser.expect_token(TokenKind::RightBracket)?;

    Ok(Expression::Index {
        object: Box::new(left),
        index: Box::new(index),
    })
}

fn parse_get_expression(left: Expression, parser: &mut Parser) -> Result<Expression, ParseError> {
    let name = parser.parse_ident()?;

    Ok(Expression::Get {
        object: Box::new(left),
        name,
    })
}

pub fn infix_parsing_function(token: TokenKind) -> Option<InfixFunction> {
    use BinaryOperator as Op;

    let operator = match token {
        TokenKind::Plus => Op::Add,
        TokenKind::Minus => Op::Subtract,
        TokenKind::Star => Op::Multiply,
        TokenKind::Slash => Op::Divide,
        TokenKind::EqualEqual => Op::Equal,
        TokenKind::BangEqual => Op::NotEqual,
        TokenKind::Less => Op::Less,
        TokenKind::LessEqual => Op::LessEqual,
        TokenKind::Greater => Op::Greater,
        TokenKind::GreaterEqual => Op::GreaterEqual,
        TokenKind::And => Op::And,
        TokenKind::Or => Op::Or,
        TokenKind::LeftParen => return Some(Box::new(parse_call_function)),
        TokenKind::LeftBracket => return Some(Box::new(parse_index_expression)),
        TokenKind::Dot => return Some(Box::new(parse_get_expression)),
        _ => return None,
    };
    Some(infix_operation(token, operator))
}
