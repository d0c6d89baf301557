//! Equation tokenizer
//!
//! Produces one token at a time on demand; the parser holds a single token
//! of lookahead.

use crate::error::{EquationError, Result};
use crate::ops::{BinaryOp, UnaryOp};
use std::fmt;

/// Built-in functions callable as `name(arg, ...)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    AssignBand,
    Band,
    Blurr,
    Clamp,
    Conv,
    Max,
    Min,
    Shift,
    Unary(UnaryOp),
}

impl Function {
    /// Every recognised name, with its function
    pub const TABLE: [(&'static str, Function); 25] = [
        ("assign_band", Function::AssignBand),
        ("band", Function::Band),
        ("blurr", Function::Blurr),
        ("clamp", Function::Clamp),
        ("conv", Function::Conv),
        ("max", Function::Max),
        ("min", Function::Min),
        ("shift", Function::Shift),
        ("abs", Function::Unary(UnaryOp::Abs)),
        ("sin", Function::Unary(UnaryOp::Sin)),
        ("sind", Function::Unary(UnaryOp::SinDeg)),
        ("asin", Function::Unary(UnaryOp::Asin)),
        ("asind", Function::Unary(UnaryOp::AsinDeg)),
        ("cos", Function::Unary(UnaryOp::Cos)),
        ("cosd", Function::Unary(UnaryOp::CosDeg)),
        ("acos", Function::Unary(UnaryOp::Acos)),
        ("acosd", Function::Unary(UnaryOp::AcosDeg)),
        ("tan", Function::Unary(UnaryOp::Tan)),
        ("tand", Function::Unary(UnaryOp::TanDeg)),
        ("atan", Function::Unary(UnaryOp::Atan)),
        ("atand", Function::Unary(UnaryOp::AtanDeg)),
        ("log", Function::Unary(UnaryOp::Log)),
        ("log10", Function::Unary(UnaryOp::Log10)),
        ("sqrt", Function::Unary(UnaryOp::Sqrt)),
        ("exp", Function::Unary(UnaryOp::Exp)),
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, f)| f)
    }

    pub fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, f)| *f == self)
            .map_or("?", |&(n, _)| n)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Pi,
    /// `im` or `in`
    Image,
    Function(Function),
    Ident(String),
    /// Any operator of the term tier
    Op(BinaryOp),
    Plus,
    Minus,
    Tilde,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Eof,
}

/// Coarse token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Identifier,
    Operator,
    Punctuation,
    EndOfInput,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Number(_) => TokenKind::Number,
            Token::Pi | Token::Image | Token::Function(_) | Token::Ident(_) => {
                TokenKind::Identifier
            }
            Token::Op(_) | Token::Plus | Token::Minus | Token::Tilde => TokenKind::Operator,
            Token::LParen | Token::RParen | Token::LBracket | Token::RBracket | Token::Comma => {
                TokenKind::Punctuation
            }
            Token::Eof => TokenKind::EndOfInput,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::Pi => f.write_str("'pi'"),
            Token::Image => f.write_str("image variable"),
            Token::Function(func) => write!(f, "function '{func}'"),
            Token::Ident(name) => write!(f, "'{name}'"),
            Token::Op(op) => write!(f, "'{}'", op.symbol()),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Tilde => f.write_str("'~'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
            Token::Eof => f.write_str("end of equation"),
        }
    }
}

/// A token and the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Lazy tokenizer over one equation
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Restart on a new equation
    pub fn reset(&mut self, src: &'a str) {
        self.src = src;
        self.pos = 0;
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_byte_at(&self, ahead: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + ahead).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek_byte().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Next token; `Token::Eof` once the input is exhausted
    pub fn next_token(&mut self) -> Result<Spanned> {
        self.skip_whitespace();
        let offset = self.pos;
        let Some(b) = self.peek_byte() else {
            return Ok(Spanned {
                token: Token::Eof,
                offset,
            });
        };

        let token = match b {
            b'0'..=b'9' | b'.' => return self.number(offset),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => return Ok(self.word(offset)),
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'~' => Token::Tilde,
            b'*' => Token::Op(BinaryOp::Mul),
            b'/' => Token::Op(BinaryOp::Div),
            b'^' => Token::Op(BinaryOp::Pow),
            b'%' => Token::Op(BinaryOp::Mod),
            b'&' => Token::Op(BinaryOp::And),
            b'|' => Token::Op(BinaryOp::Or),
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b',' => Token::Comma,
            b'=' | b'!' | b'<' | b'>' => return self.comparison(offset),
            _ => return Err(self.unexpected(offset)),
        };
        self.pos += 1;
        Ok(Spanned { token, offset })
    }

    fn unexpected(&self, offset: usize) -> EquationError {
        let found = self.src[offset..].chars().next().unwrap_or('\0');
        EquationError::Lexical {
            position: offset,
            found,
        }
    }

    fn comparison(&mut self, offset: usize) -> Result<Spanned> {
        let first = self.peek_byte();
        let eq_follows = self.peek_byte_at(1) == Some(b'=');
        let op = match (first, eq_follows) {
            (Some(b'='), true) => BinaryOp::Equal,
            (Some(b'!'), true) => BinaryOp::NotEqual,
            (Some(b'>'), true) => BinaryOp::GreaterEqual,
            (Some(b'<'), true) => BinaryOp::LessEqual,
            (Some(b'>'), false) => BinaryOp::Greater,
            (Some(b'<'), false) => BinaryOp::Less,
            _ => return Err(self.unexpected(offset)),
        };
        self.pos += if eq_follows { 2 } else { 1 };
        Ok(Spanned {
            token: Token::Op(op),
            offset,
        })
    }

    fn number(&mut self, offset: usize) -> Result<Spanned> {
        let digits = |lexer: &mut Self| {
            while lexer.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                lexer.pos += 1;
            }
        };

        digits(self);
        if self.peek_byte() == Some(b'.') {
            self.pos += 1;
            digits(self);
        }
        // exponent only when digits follow; `2e` lexes as `2` then `e`
        if matches!(self.peek_byte(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_byte_at(1), Some(b'+' | b'-')));
            if self.peek_byte_at(1 + sign).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1 + sign;
                digits(self);
            }
        }

        let text = &self.src[offset..self.pos];
        let value = text
            .parse::<f64>()
            .map_err(|_| self.unexpected(offset))?;
        Ok(Spanned {
            token: Token::Number(value),
            offset,
        })
    }

    fn word(&mut self, offset: usize) -> Spanned {
        while self
            .peek_byte()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        let word = &self.src[offset..self.pos];
        let token = match word {
            "pi" => Token::Pi,
            "im" | "in" => Token::Image,
            "xor" => Token::Op(BinaryOp::Xor),
            _ => match Function::from_name(word) {
                Some(func) => Token::Function(func),
                None => Token::Ident(word.to_string()),
            },
        };
        Spanned { token, offset }
    }
}

/// Tokenize a whole equation, excluding the trailing `Eof`
pub fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    loop {
        let next = lexer.next_token()?;
        if next.token == Token::Eof {
            return Ok(tokens);
        }
        tokens.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("1 2.5 .5 3e2 4.0E-1"),
            vec![
                Token::Number(1.0),
                Token::Number(2.5),
                Token::Number(0.5),
                Token::Number(300.0),
                Token::Number(0.4),
            ]
        );
    }

    #[test]
    fn test_keywords_and_functions() {
        assert_eq!(
            tokens("pi im in xor sqrt assign_band foo"),
            vec![
                Token::Pi,
                Token::Image,
                Token::Image,
                Token::Op(BinaryOp::Xor),
                Token::Function(Function::Unary(UnaryOp::Sqrt)),
                Token::Function(Function::AssignBand),
                Token::Ident("foo".into()),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("== != >= <= > < ~ & |"),
            vec![
                Token::Op(BinaryOp::Equal),
                Token::Op(BinaryOp::NotEqual),
                Token::Op(BinaryOp::GreaterEqual),
                Token::Op(BinaryOp::LessEqual),
                Token::Op(BinaryOp::Greater),
                Token::Op(BinaryOp::Less),
                Token::Tilde,
                Token::Op(BinaryOp::And),
                Token::Op(BinaryOp::Or),
            ]
        );
    }

    #[test]
    fn test_offsets_and_kinds() {
        let spans = tokenize("im[0] + 2").unwrap();
        let offsets: Vec<usize> = spans.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 2, 3, 4, 6, 8]);
        assert_eq!(spans[0].token.kind(), TokenKind::Identifier);
        assert_eq!(spans[1].token.kind(), TokenKind::Punctuation);
        assert_eq!(spans[4].token.kind(), TokenKind::Operator);
        assert_eq!(spans[5].token.kind(), TokenKind::Number);
    }

    #[test]
    fn test_lexical_errors() {
        assert!(matches!(
            tokenize("1 $ 2"),
            Err(EquationError::Lexical {
                position: 2,
                found: '$'
            })
        ));
        assert!(matches!(
            tokenize("a = b"),
            Err(EquationError::Lexical { found: '=', .. })
        ));
        assert!(tokenize(".").is_err());
    }

    #[test]
    fn test_reset() {
        let mut lexer = Lexer::new("1");
        assert_eq!(lexer.next_token().unwrap().token, Token::Number(1.0));
        assert_eq!(lexer.next_token().unwrap().token, Token::Eof);
        lexer.reset("pi");
        assert_eq!(lexer.next_token().unwrap().token, Token::Pi);
    }
}
