//! Recursive-descent parser fused with evaluation
//!
//! There is no syntax tree: every production evaluates what it parsed and
//! pushes the result onto an operand stack.
//!
//! ```text
//! Expression := Term (("+" | "-") Term)*
//! Term       := Factor (TermOp Factor)*
//! TermOp     := "*" | "/" | "^" | "%" | "&" | "|" | "xor"
//!             | "==" | "!=" | ">" | ">=" | "<" | "<="
//! Factor     := Number | "pi" | ("im" | "in") "[" Expression "]"
//!             | "(" Expression ")" | "-" Factor | "~" Factor
//!             | Function "(" Expression ("," Expression)* ")"
//! ```
//!
//! Every term operator shares one left-associative tier, so `2*3^2` is
//! `(2*3)^2 = 36`.

use crate::broadcast::{apply_binary, apply_unary};
use crate::context::EvalContext;
use crate::error::{EquationError, Result};
use crate::functions::{self, index};
use crate::lexer::{Lexer, Spanned, Token};
use crate::ops::{BinaryOp, UnaryOp};
use crate::value::Value;
use tracing::warn;

/// Parses and evaluates one equation against one context
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Spanned,
    stack: Vec<Value>,
    ctx: &'a EvalContext<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(equation: &'a str, ctx: &'a EvalContext<'a>) -> Result<Self> {
        let mut lexer = Lexer::new(equation);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            stack: Vec::new(),
            ctx,
        })
    }

    /// Parse the whole equation and return its value.
    ///
    /// Anything left after a complete expression is a syntax error.
    pub fn evaluate(mut self) -> Result<Value> {
        self.parse_expression()?;
        if self.current.token != Token::Eof {
            return Err(self.syntax_error("an operator or end of equation"));
        }
        self.pop()
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<()> {
        if self.current.token != token {
            return Err(self.syntax_error(expected));
        }
        self.advance()
    }

    fn syntax_error(&self, expected: &'static str) -> EquationError {
        let found = self.current.token.to_string();
        warn!(
            position = self.current.offset,
            "expected {expected}, found {found}"
        );
        EquationError::Syntax {
            position: self.current.offset,
            expected,
            found,
        }
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(EquationError::EmptyStack)
    }

    fn reduce_binary(&mut self, op: BinaryOp) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        self.stack.push(apply_binary(op, left, right)?);
        Ok(())
    }

    fn reduce_unary(&mut self, op: UnaryOp) -> Result<()> {
        let value = self.pop()?;
        self.stack.push(apply_unary(op, value));
        Ok(())
    }

    fn parse_expression(&mut self) -> Result<()> {
        self.parse_term()?;
        loop {
            let op = match self.current.token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(()),
            };
            self.advance()?;
            self.parse_term()?;
            self.reduce_binary(op)?;
        }
    }

    fn parse_term(&mut self) -> Result<()> {
        self.parse_factor()?;
        while let Token::Op(op) = self.current.token {
            self.advance()?;
            self.parse_factor()?;
            self.reduce_binary(op)?;
        }
        Ok(())
    }

    fn parse_factor(&mut self) -> Result<()> {
        match self.current.token.clone() {
            Token::Number(n) => {
                self.advance()?;
                self.stack.push(Value::Scalar(n));
            }
            Token::Pi => {
                self.advance()?;
                self.stack.push(Value::Scalar(std::f64::consts::PI));
            }
            Token::Image => {
                self.advance()?;
                self.parse_image_variable()?;
            }
            Token::LParen => {
                self.advance()?;
                self.parse_expression()?;
                self.expect(Token::RParen, "')'")?;
            }
            Token::Minus => {
                self.advance()?;
                self.parse_factor()?;
                self.reduce_unary(UnaryOp::Neg)?;
            }
            Token::Tilde => {
                self.advance()?;
                self.parse_factor()?;
                self.reduce_unary(UnaryOp::OnesComplement)?;
            }
            Token::Function(function) => {
                self.advance()?;
                let args = self.parse_arguments()?;
                let value = functions::call(function, args, self.ctx)?;
                self.stack.push(value);
            }
            Token::Ident(name) => {
                warn!(position = self.current.offset, "unknown identifier '{name}'");
                return Err(EquationError::UnknownIdentifier {
                    position: self.current.offset,
                    name,
                });
            }
            _ => return Err(self.syntax_error("a number, image variable, function or '('")),
        }
        Ok(())
    }

    /// `[ Expression ]` after `im`/`in`
    fn parse_image_variable(&mut self) -> Result<()> {
        self.expect(Token::LBracket, "'['")?;
        self.parse_expression()?;
        self.expect(Token::RBracket, "']'")?;

        let selector = self.pop()?;
        let Value::Scalar(v) = selector else {
            return Err(EquationError::Type {
                function: "im",
                argument: 0,
                expected: "scalar",
            });
        };
        let tile = self.ctx.fetch(index(v, "im", 0)?)?;
        self.stack.push(Value::Raster(tile));
        Ok(())
    }

    /// `( Expression, ... )`; each argument is moved off the stack as soon
    /// as it is evaluated.
    fn parse_arguments(&mut self) -> Result<Vec<Value>> {
        self.expect(Token::LParen, "'('")?;
        let mut args = Vec::new();
        if self.current.token == Token::RParen {
            self.advance()?;
            return Ok(args);
        }
        loop {
            self.parse_expression()?;
            args.push(self.pop()?);
            match self.current.token {
                Token::Comma => self.advance()?,
                Token::RParen => {
                    self.advance()?;
                    return Ok(args);
                }
                _ => return Err(self.syntax_error("',' or ')'")),
            }
        }
    }
}

/// Parse and evaluate `equation` in `ctx`
pub fn evaluate_value(equation: &str, ctx: &EvalContext<'_>) -> Result<Value> {
    Parser::new(equation, ctx)?.evaluate()
}
