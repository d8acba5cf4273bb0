use std::rc::Rc;

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TokenKind {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Semicolon,
    Colon,
    At,

    Plus,
    Minus,
    Star,
    Slash,

    // One, two or three character tokens
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Swap,

    // Literals
    Identifier,
    Number,
    String,

    // Keywords
    And,
    Or,
    Not,
    Def,
    Return,
    If,
    Else,
    While,
    Until,
    Class,
    This,
    True,
    False,
    Nil,
    Print,
    Echo,
    Maybe,
    Otherwise,
    Module,
    Use,
    As,
    Open,
    Closed,

    Eof,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        use TokenKind::*;
        match self {
            LeftParen => "LeftParen",
            RightParen => "RightParen",
            LeftBrace => "LeftBrace",
            RightBrace => "RightBrace",
            LeftBracket => "LeftBracket",
            RightBracket => "RightBracket",
            Comma => "Comma",
            Dot => "Dot",
            Semicolon => "Semicolon",
            Colon => "Colon",
            At => "At",
            Plus => "Plus",
            Minus => "Minus",
            Star => "Star",
            Slash => "Slash",
            Bang => "Bang",
            BangEqual => "BangEqual",
            Equal => "Equal",
            EqualEqual => "EqualEqual",
            Greater => "Greater",
            GreaterEqual => "GreaterEqual",
            Less => "Less",
            LessEqual => "LessEqual",
            Swap => "Swap",
            Identifier => "Identifier",
            Number => "Number",
            String => "String",
            And => "And",
            Or => "Or",
            Not => "Not",
            Def => "Def",
            Return => "Return",
            If => "If",
            Else => "Else",
            While => "While",
            Until => "Until",
            Class => "Class",
            This => "This",
            True => "True",
            False => "False",
            Nil => "Nil",
            Print => "Print",
            Echo => "Echo",
            Maybe => "Maybe",
            Otherwise => "Otherwise",
            Module => "Module",
            Use => "Use",
            As => "As",
            Open => "Open",
            Closed => "Closed",
            Eof => "Eof",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source text of the token. String tokens keep their quotes.
    pub lexeme: Rc<str>,
    pub line: usize,
}

#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum LexError {
    #[error("Unterminated string at line {line}")]
    UnterminatedString { line: usize },
    #[error("Unexpected '<-' at line {line}, did you mean '<->'?")]
    IncompleteSwap { line: usize },
    #[error("Unexpected character at line {line}: '{character}'")]
    UnexpectedCharacter { character: char, line: usize },
}

fn keywords(ident: &str) -> Option<TokenKind> {
    match ident {
        "and" => Some(TokenKind::And),
        "or" => Some(TokenKind::Or),
        "not" => Some(TokenKind::Not),
        "def" => Some(TokenKind::Def),
        "return" => Some(TokenKind::Return),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "while" => Some(TokenKind::While),
        "until" => Some(TokenKind::Until),
        "class" => Some(TokenKind::Class),
        "this" => Some(TokenKind::This),
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        "nil" => Some(TokenKind::Nil),
        "print" => Some(TokenKind::Print),
        "echo" => Some(TokenKind::Echo),
        "maybe" => Some(TokenKind::Maybe),
        "otherwise" => Some(TokenKind::Otherwise),
        "module" => Some(TokenKind::Module),
        "use" => Some(TokenKind::Use),
        "as" => Some(TokenKind::As),
        "open" => Some(TokenKind::Open),
        "closed" => Some(TokenKind::Closed),
        _ => None,
    }
}

/// Lex a whole source text. The returned vector always ends with an `Eof`
/// token; the first lex error aborts the scan.
pub fn scan(source: &str) -> Result<Vec<Token>, LexError> {
    Tokenizer::new(source).collect()
}

#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    iter: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        let iter = input.char_indices().peekable();
        Self {
            input,
            iter,
            line: 1,
            finished: false,
        }
    }

    fn is_letter(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    fn token(&mut self, kind: TokenKind, start: usize) -> Token {
        let end = self.next_idx();
        Token {
            kind,
            lexeme: self.input[start..end].into(),
            line: self.line,
        }
    }

    fn either(
        &mut self,
        start: usize,
        second: char,
        matched: TokenKind,
        otherwise: TokenKind,
    ) -> Token {
        if self.iter.next_if(|(_, ch)| *ch == second).is_some() {
            self.token(matched, start)
        } else {
            self.token(otherwise, start)
        }
    }

    fn byte_after(&self, idx: usize) -> Option<u8> {
        self.input.as_bytes().get(idx + 1).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(&(idx, ch)) = self.iter.peek() {
            match ch {
                '\n' => {
                    self.line += 1;
                    self.iter.next();
                }
                c if c.is_whitespace() => {
                    self.iter.next();
                }
                '/' if self.byte_after(idx) == Some(b'/') => {
                    while self.iter.next_if(|(_, ch)| *ch != '\n').is_some() {}
                }
                _ => break,
            }
        }
    }

    fn read_identifier(&mut self, start: usize) -> Token {
        while self
            .iter
            .next_if(|(_, ch)| Self::is_letter(*ch) || ch.is_ascii_digit())
            .is_some()
        {}

        let end = self.next_idx();
        let ident = &self.input[start..end];
        self.token(keywords(ident).unwrap_or(TokenKind::Identifier), start)
    }

    fn read_number(&mut self, start: usize) -> Token {
        while self.iter.next_if(|(_, ch)| ch.is_ascii_digit()).is_some() {}

        // A single fractional part, only when a digit follows the dot.
        if let Some(&(idx, '.')) = self.iter.peek() {
            if self.byte_after(idx).is_some_and(|b| b.is_ascii_digit()) {
                self.iter.next();
                while self.iter.next_if(|(_, ch)| ch.is_ascii_digit()).is_some() {}
            }
        }

        self.token(TokenKind::Number, start)
    }

    fn read_string(&mut self, start: usize) -> Result<Token, LexError> {
        let first_line = self.line;
        let mut newlines = 0;
        loop {
            match self.iter.next() {
                Some((_, '"')) => break,
                Some((_, '\\')) => {
                    // Keep the escape raw; the parser decodes it.
                    if let Some((_, '\n')) = self.iter.next() {
                        newlines += 1;
                    }
                }
                Some((_, '\n')) => newlines += 1,
                Some(_) => {}
                None => return Err(LexError::UnterminatedString { line: first_line }),
            }
        }

        let token = self.token(TokenKind::String, start);
        self.line += newlines;
        Ok(token)
    }

    fn read_less(&mut self, start: usize) -> Result<Token, LexError> {
        if self.iter.next_if(|(_, ch)| *ch == '-').is_some() {
            if self.iter.next_if(|(_, ch)| *ch == '>').is_some() {
                Ok(self.token(TokenKind::Swap, start))
            } else {
                Err(LexError::IncompleteSwap { line: self.line })
            }
        } else {
            Ok(self.either(start, '=', TokenKind::LessEqual, TokenKind::Less))
        }
    }

    fn read_doubled(&mut self, start: usize, ch: char, kind: TokenKind) -> Result<Token, LexError> {
        if self.iter.next_if(|(_, next)| *next == ch).is_some() {
            Ok(self.token(kind, start))
        } else {
            Err(LexError::UnexpectedCharacter {
                character: ch,
                line: self.line,
            })
        }
    }

    fn next_idx(&mut self) -> usize {
        self.iter
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.skip_trivia();

        let Some((idx, ch)) = self.iter.next() else {
            self.finished = true;
            return Some(Ok(Token {
                kind: TokenKind::Eof,
                lexeme: "".into(),
                line: self.line,
            }));
        };

        let result = match ch {
            '(' => Ok(self.token(TokenKind::LeftParen, idx)),
            ')' => Ok(self.token(TokenKind::RightParen, idx)),
            '{' => Ok(self.token(TokenKind::LeftBrace, idx)),
            '}' => Ok(self.token(TokenKind::RightBrace, idx)),
            '[' => Ok(self.token(TokenKind::LeftBracket, idx)),
            ']' => Ok(self.token(TokenKind::RightBracket, idx)),
            ',' => Ok(self.token(TokenKind::Comma, idx)),
            '.' => Ok(self.token(TokenKind::Dot, idx)),
            ';' => Ok(self.token(TokenKind::Semicolon, idx)),
            ':' => Ok(self.token(TokenKind::Colon, idx)),
            '@' => Ok(self.token(TokenKind::At, idx)),
            '+' => Ok(self.token(TokenKind::Plus, idx)),
            '-' => Ok(self.token(TokenKind::Minus, idx)),
            '*' => Ok(self.token(TokenKind::Star, idx)),
            '/' => Ok(self.token(TokenKind::Slash, idx)),
            '!' => Ok(self.either(idx, '=', TokenKind::BangEqual, TokenKind::Bang)),
            '=' => Ok(self.either(idx, '=', TokenKind::EqualEqual, TokenKind::Equal)),
            '>' => Ok(self.either(idx, '=', TokenKind::GreaterEqual, TokenKind::Greater)),
            '<' => self.read_less(idx),
            '&' => self.read_doubled(idx, '&', TokenKind::And),
            '|' => self.read_doubled(idx, '|', TokenKind::Or),
            '"' => self.read_string(idx),
            c if Tokenizer::is_letter(c) => Ok(self.read_identifier(idx)),
            c if c.is_ascii_digit() => Ok(self.read_number(idx)),
            _ => Err(LexError::UnexpectedCharacter {
                character: ch,
                line: self.line,
            }),
        };

        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        scan(input)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_punctuation() {
        let output = scan("=+(){},;").unwrap();

        let expected = vec![
            (TokenKind::Equal, "="),
            (TokenKind::Plus, "+"),
            (TokenKind::LeftParen, "("),
            (TokenKind::RightParen, ")"),
            (TokenKind::LeftBrace, "{"),
            (TokenKind::RightBrace, "}"),
            (TokenKind::Comma, ","),
            (TokenKind::Semicolon, ";"),
            (TokenKind::Eof, ""),
        ];
        assert_eq!(
            output
                .iter()
                .map(|token| (token.kind, token.lexeme.as_ref()))
                .collect::<Vec<_>>(),
            expected
        );
    }

    #[test]
    fn test_program() {
        let input = "five = 5;
    def add(x, y) {
        return x + y;
    }
    result = add(five, 10.5);
    ";
        let expected_output = vec![
            TokenKind::Identifier,
            TokenKind::Equal,
            TokenKind::Number,
            TokenKind::Semicolon,
            TokenKind::Def,
            TokenKind::Identifier,
            TokenKind::LeftParen,
            TokenKind::Identifier,
            TokenKind::Comma,
            TokenKind::Identifier,
            TokenKind::RightParen,
            TokenKind::LeftBrace,
            TokenKind::Return,
            TokenKind::Identifier,
            TokenKind::Plus,
            TokenKind::Identifier,
            TokenKind::Semicolon,
            TokenKind::RightBrace,
            TokenKind::Identifier,
            TokenKind::Equal,
            TokenKind::Identifier,
            TokenKind::LeftParen,
            TokenKind::Identifier,
            TokenKind::Comma,
            TokenKind::Number,
            TokenKind::RightParen,
            TokenKind::Semicolon,
            TokenKind::Eof,
        ];

        assert_eq!(kinds(input), expected_output);
    }

    #[test]
    fn test_operators() {
        let input = "! != == <= >= < > <-> && || and or not";
        let expected_output = vec![
            TokenKind::Bang,
            TokenKind::BangEqual,
            TokenKind::EqualEqual,
            TokenKind::LessEqual,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::Greater,
            TokenKind::Swap,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Not,
            TokenKind::Eof,
        ];

        assert_eq!(kinds(input), expected_output);
    }

    #[test]
    fn test_keywords() {
        let input = "def return if else while class this true false nil print echo \
                     maybe otherwise until module use as open closed definitely";
        let expected_output = vec![
            TokenKind::Def,
            TokenKind::Return,
            TokenKind::If,
            TokenKind::Else,
            TokenKind::While,
            TokenKind::Class,
            TokenKind::This,
            TokenKind::True,
            TokenKind::False,
            TokenKind::Nil,
            TokenKind::Print,
            TokenKind::Echo,
            TokenKind::Maybe,
            TokenKind::Otherwise,
            TokenKind::Until,
            TokenKind::Module,
            TokenKind::Use,
            TokenKind::As,
            TokenKind::Open,
            TokenKind::Closed,
            TokenKind::Identifier,
            TokenKind::Eof,
        ];

        assert_eq!(kinds(input), expected_output);
    }

    #[test]
    fn test_module_id() {
        let input = "use @std.io as io";
        let output = scan(input).unwrap();
        assert_eq!(
            output.iter().map(|token| token.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Use,
                TokenKind::At,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::As,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
        assert_eq!(output[2].lexeme.as_ref(), "std");
    }

    #[test]
    fn test_numbers() {
        let output = scan("12 3.25 7. x1_2").unwrap();
        let lexemes = output
            .iter()
            .map(|token| (token.kind, token.lexeme.as_ref()))
            .collect::<Vec<_>>();
        assert_eq!(
            lexemes,
            vec![
                (TokenKind::Number, "12"),
                (TokenKind::Number, "3.25"),
                (TokenKind::Number, "7"),
                (TokenKind::Dot, "."),
                (TokenKind::Identifier, "x1_2"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    fn test_strings_keep_raw_escapes() {
        let output = scan(r#"print("a\"b\n")"#).unwrap();
        assert_eq!(output[2].kind, TokenKind::String);
        assert_eq!(output[2].lexeme.as_ref(), r#""a\"b\n""#);
    }

    #[test]
    fn test_comments_and_lines() {
        let input = "a = 1 // the first\n// only a comment\nb = \"x\ny\"\nc";
        let output = scan(input).unwrap();
        let lines = output
            .iter()
            .map(|token| (token.lexeme.as_ref(), token.line))
            .collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                ("a", 1),
                ("=", 1),
                ("1", 1),
                ("b", 3),
                ("=", 3),
                ("\"x\ny\"", 3),
                ("c", 5),
                ("", 5),
            ]
        );
    }

    #[test]
    fn test_errors() {
        let inputs = vec![
            ("a = \"open", LexError::UnterminatedString { line: 1 }),
            ("a\nb <- c", LexError::IncompleteSwap { line: 2 }),
            (
                "a = 1 # 2",
                LexError::UnexpectedCharacter {
                    character: '#',
                    line: 1,
                },
            ),
            (
                "a & b",
                LexError::UnexpectedCharacter {
                    character: '&',
                    line: 1,
                },
            ),
        ];

        for (input, expected) in inputs {
            assert_eq!(scan(input), Err(expected), "input: {input}");
        }
    }

    #[test]
    fn test_empty_input_yields_eof() {
        let output = scan("   // nothing\n").unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].kind, TokenKind::Eof);
        assert_eq!(output[0].line, 2);
    }
}
