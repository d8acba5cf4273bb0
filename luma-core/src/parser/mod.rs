pub mod error;
pub mod expressions;
pub mod statements;

use tracing::debug;

use crate::ast::{Identifier, Program};
use crate::lexer::{Token, TokenKind};
pub use error::ParseError;
use statements::parse_statement;

/// Parse a token stream (as produced by [`crate::lexer::scan`]) into a program.
/// Every malformed top-level statement contributes one error; the parse only
/// succeeds when there are none.
pub fn parse(tokens: Vec<Token>) -> Result<Program, Vec<ParseError>> {
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    iter: std::iter::Peekable<std::vec::IntoIter<Token>>,
    eof: Token,
    /// Kind of the last consumed token.
    previous: Option<TokenKind>,
    /// Number of tokens consumed so far.
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let line = tokens.last().map(|token| token.line).unwrap_or(1);
        let eof = Token {
            kind: TokenKind::Eof,
            lexeme: "".into(),
            line,
        };
        let iter = tokens.into_iter().peekable();
        Self {
            iter,
            eof,
            previous: None,
            position: 0,
        }
    }

    pub(crate) fn peek_kind(&mut self) -> TokenKind {
        self.iter
            .peek()
            .map(|token| token.kind)
            .unwrap_or(TokenKind::Eof)
    }

    pub(crate) fn peek_token(&mut self) -> Token {
        self.iter.peek().cloned().unwrap_or_else(|| self.eof.clone())
    }

    pub(crate) fn check(&mut self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// Consume the next token. `Eof` is never consumed.
    pub(crate) fn advance(&mut self) -> Token {
        match self.iter.next_if(|token| token.kind != TokenKind::Eof) {
            Some(token) => self.consumed(token),
            None => self.peek_token(),
        }
    }

    pub(crate) fn next_if_kind(&mut self, kind: TokenKind) -> Option<Token> {
        let token = self.iter.next_if(|token| token.kind == kind)?;
        Some(self.consumed(token))
    }

    fn consumed(&mut self, token: Token) -> Token {
        self.previous = Some(token.kind);
        self.position += 1;
        token
    }

    pub(crate) fn expect_token(&mut self, token_kind: TokenKind) -> Result<Token, ParseError> {
        match self.next_if_kind(token_kind) {
            Some(token) => Ok(token),
            None => Err(ParseError::unexpected_token(token_kind, self.peek_token())),
        }
    }

    pub(crate) fn parse_ident(&mut self) -> Result<Identifier, ParseError> {
        match self.next_if_kind(TokenKind::Identifier) {
            Some(token) => Ok(Identifier {
                name: token.lexeme,
                line: token.line,
            }),
            None => Err(ParseError::unexpected_other(
                error::Expected::Identifier,
                self.peek_token(),
            )),
        }
    }

    /// Skip tokens until just after a `;` or until a token that starts a new
    /// declaration. `start` is the position where the failed statement began;
    /// at least one token is discarded when the statement consumed none.
    fn synchronize(&mut self, start: usize) {
        if self.position == start {
            self.advance();
        }

        while !self.check(TokenKind::Eof) {
            if self.previous == Some(TokenKind::Semicolon) {
                return;
            }
            match self.peek_kind() {
                TokenKind::Def
                | TokenKind::Class
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::Print
                | TokenKind::Else
                | TokenKind::Module
                | TokenKind::Use
                | TokenKind::Open
                | TokenKind::Closed => return,
                _ => {}
            }
            self.advance();
        }
    }

    /// Parse every top-level statement, keeping the ones that parsed cleanly
    /// alongside the errors of the ones that did not.
    pub fn parse_recovering(&mut self) -> (Program, Vec<ParseError>) {
        let mut statements = Vec::new();
        let mut errors = Vec::new();

        while !self.check(TokenKind::Eof) {
            // Stray separators, e.g. after a `def` body.
            if self.next_if_kind(TokenKind::Semicolon).is_some() {
                continue;
            }
            let start = self.position;
            match parse_statement(self) {
                Ok(statement) => statements.push(statement),
                Err(err) => {
                    debug!(line = err.line(), "recovering from parse error: {err}");
                    errors.push(err);
                    self.synchronize(start);
                }
            }
        }

        (Program { statements }, errors)
    }

    pub fn parse_program(&mut self) -> Result<Program, Vec<ParseError>> {
        let (program, errors) = self.parse_recovering();
        if errors.is_empty() {
            Ok(program)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lexer::scan;

    fn parse_source(input: &str) -> Result<Program, Vec<ParseError>> {
        parse(scan(input).unwrap())
    }

    fn test_parsing(tests: Vec<(&str, &str)>) {
        for (input, expected) in tests {
            let program = parse_source(input).unwrap();

            assert_eq!(program.to_string(), expected, "input: {input}")
        }
    }

    #[test]
    fn test_expression_1() {
        let tests = vec![
            ("-a * b", "((-a) * b);\n"),
            ("!-a", "(!(-a));\n"),
            ("not a", "(!a);\n"),
            ("a + b + c", "((a + b) + c);\n"),
            ("a + b - c", "((a + b) - c);\n"),
            ("a * b * c", "((a * b) * c);\n"),
            ("a * b / c", "((a * b) / c);\n"),
            ("a + b / c", "(a + (b / c));\n"),
            (
                "a + b * c + d / e - f",
                "(((a + (b * c)) + (d / e)) - f);\n",
            ),
            ("3 + 4; -5 * 5", "(3 + 4);\n((-5) * 5);\n"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4));\n"),
            ("5 <= 4 != 3 >= 4", "((5 <= 4) != (3 >= 4));\n"),
            (
                "3 + 4 * 5 == 3 * 1 + 4 * 5",
                "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)));\n",
            ),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_logical_precedence() {
        let tests = vec![
            ("a or b and c", "(a or (b and c));\n"),
            ("a and b or c", "((a and b) or c);\n"),
            ("a || b && c == d", "(a or (b and (c == d)));\n"),
            ("!a and b", "((!a) and b);\n"),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_expression_precedence() {
        let tests = vec![
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4);\n"),
            ("(5 + 5) * 2", "((5 + 5) * 2);\n"),
            ("2 / (5 + 5)", "(2 / (5 + 5));\n"),
            ("-(5 + 5)", "(-(5 + 5));\n"),
            ("!(true == true)", "(!(true == true));\n"),
            ("(a)", "(a);\n"),
            ("-a.b(1)[2]", "(-a.b(1)[2]);\n"),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_call_expression() {
        let tests = vec![
            ("a + add(b * c) + d", "((a + add((b * c))) + d);\n"),
            (
                "add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))",
                "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)));\n",
            ),
            ("f()()", "f()();\n"),
            ("obj.method(1).field", "obj.method(1).field;\n"),
            ("m[\"k\"][0]", "m[\"k\"][0];\n"),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_literals() {
        let tests = vec![
            ("[]", "[];\n"),
            ("[1, 2.5, \"x\", nil, true]", "[1, 2.5, \"x\", nil, true];\n"),
            ("{}", "{};\n"),
            ("{\"a\": 1, \"b\": [2]}", "{\"a\": 1, \"b\": [2]};\n"),
            ("\"tab\\there\"", "\"tab\\there\";\n"),
            ("\"q\\\"uote\\\\\"", "\"q\\\"uote\\\\\";\n"),
            ("\"odd\\q\"", "\"odd\\\\q\";\n"),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_string_unquoting() {
        let program = parse_source(r#""a\nb\t\"c\"\\ \z""#).unwrap();
        let crate::ast::Statement::Expression(crate::ast::Expression::Literal(
            crate::ast::Literal::String(value),
        )) = &program.statements[0]
        else {
            panic!("expected a string literal, got {:?}", program.statements);
        };
        assert_eq!(value.as_ref(), "a\nb\t\"c\"\\ \\z");
    }

    #[test]
    fn test_assignment_statements() {
        let tests = vec![
            ("x = 5", "x = 5;\n"),
            ("x = y = 5", ""),
            ("a.b = 1;", "a.b = 1;\n"),
            ("a[0] = b.c", "a[0] = b.c;\n"),
            ("f().x = 1", "f().x = 1;\n"),
            ("a <-> b", "a <-> b;\n"),
        ];

        for (input, expected) in tests {
            match parse_source(input) {
                Ok(program) => assert_eq!(program.to_string(), expected, "input: {input}"),
                Err(errors) => {
                    assert_eq!(expected, "", "input: {input}, errors: {errors:?}");
                }
            }
        }
    }

    #[test]
    fn test_conditional() {
        let tests = vec![
            ("if (x < y) { x }", "if (x < y) {\n  x;\n}\n"),
            (
                "if (x < y) { x } else { y }",
                "if (x < y) {\n  x;\n} else {\n  y;\n}\n",
            ),
            (
                "if (a) { 1 } else if (b) { 2 } else { 3 }",
                "if (a) {\n  1;\n} else if (b) {\n  2;\n} else {\n  3;\n}\n",
            ),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_loops() {
        let tests = vec![
            (
                "while (i < 3) { i = i + 1 }",
                "while (i < 3) {\n  i = (i + 1);\n}\n",
            ),
            ("until (done) { }", "until (done) {}\n"),
            ("echo 3 { print(\"hi\") }", "echo 3 {\n  print(\"hi\");\n}\n"),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_function() {
        let tests = vec![
            (
                "def add(a, b) { return a + b }",
                "def add(a, b) {\n  return (a + b);\n}\n",
            ),
            ("def nothing() { return }", "def nothing() {\n  return;\n}\n"),
            (
                "open def f() { return; };",
                "open def f() {\n  return;\n}\n",
            ),
            (
                "def make() { i = 0; def inc() { i = i + 1; return i }; return inc }",
                "def make() {\n  i = 0;\n  def inc() {\n    i = (i + 1);\n    return i;\n  }\n  return inc;\n}\n",
            ),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_class() {
        let tests = vec![
            ("class Empty {}", "class Empty {}\n"),
            (
                "open class Point { def init(x) { this.x = x } def get() { return this.x } }",
                "open class Point {\n  def init(x) {\n    this.x = x;\n  }\n  def get() {\n    return this.x;\n  }\n}\n",
            ),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_maybe_and_modules() {
        let tests = vec![
            (
                "maybe { 1 / 0 } otherwise { print(\"caught\") }",
                "maybe {\n  (1 / 0);\n} otherwise {\n  print(\"caught\");\n}\n",
            ),
            ("maybe { x }", "maybe {\n  x;\n}\n"),
            ("module @app.util.strings", "module @app.util.strings;\n"),
            ("use @std.math as m;", "use @std.math as m;\n"),
        ];

        test_parsing(tests)
    }

    #[test]
    fn test_parse_errors() {
        let tests = vec![
            (
                "print(1",
                "Parse error at line 1: Expected ')'. (got '')",
            ),
            (
                "1 + 2 = 3",
                "Parse error at line 1: Invalid assignment target. (got '=')",
            ),
            (
                "a.b <-> c",
                "Parse error at line 1: Invalid swap target. (got '<->')",
            ),
            (
                "a <-> b[0]",
                "Parse error at line 1: Invalid swap target. (got '<->')",
            ),
            (
                "a <-> f(1)",
                "Parse error at line 1: Invalid swap target. (got '<->')",
            ),
            (
                "a <-> 2",
                "Parse error at line 1: Invalid swap target. (got '<->')",
            ),
            (
                "open x = 1",
                "Parse error at line 1: 'open' must be followed by 'def' or 'class'. (got 'open')",
            ),
            (
                "use @std.math",
                "Parse error at line 1: Expected 'as'. (got '')",
            ),
            (
                "class A { x = 1 }",
                "Parse error at line 1: Expected 'def' to define method. (got 'x')",
            ),
            (
                "\n\n)",
                "Parse error at line 3: Expected expression. (got ')')",
            ),
        ];

        for (input, expected) in tests {
            let errors = parse_source(input).unwrap_err();
            assert_eq!(errors[0].to_string(), expected, "input: {input}");
        }
    }

    #[test]
    fn test_recovery_keeps_good_statements() {
        let input = "a = 1;\nb = ;\nprint(a)\nc = (2 +;\nd = 4";
        let (program, errors) = Parser::new(scan(input).unwrap()).parse_recovering();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line(), 2);
        assert_eq!(errors[1].line(), 4);
        assert_eq!(program.to_string(), "a = 1;\nprint(a);\nd = 4;\n");
    }

    #[test]
    fn test_recovery_stops_at_next_statement() {
        let tests = vec![
            ("x = ;\nprint(1)\ny = 2", 1, "print(1);\ny = 2;\n"),
            (";\n) print(1)", 1, "print(1);\n"),
            ("a = (1 + ) ; b = 2", 1, "b = 2;\n"),
            ("open x = 1\ndef f() {}", 1, "def f() {}\n"),
            ("x = ;\ny = ;\nz = 3", 2, "z = 3;\n"),
        ];

        for (input, error_count, expected) in tests {
            let (program, errors) = Parser::new(scan(input).unwrap()).parse_recovering();
            assert_eq!(errors.len(), error_count, "input: {input}");
            assert_eq!(program.to_string(), expected, "input: {input}");
        }
    }

    #[test]
    fn test_parse_is_deterministic() {
        let input = "def f(x){ if (x<=1) { return 1 } return x*f(x-1) }; print(f(5))";
        let first = parse_source(input).unwrap();
        let second = parse_source(input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_deeply_nested_expression() {
        let depth = 5_000;
        let input = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse_source(&input).is_ok());
    }
}
