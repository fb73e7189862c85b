//! Parser for the viewer script language.
//!
//! Recursive-descent with precedence-climbing expressions. Scripts are a
//! statement sequence; `return` ends execution, and a script that falls off
//! the end yields the value of its last expression statement.
//!
//! Only bare identifiers are callable. Member calls (`a.b()`) are rejected
//! at parse time: every operation a script can perform on the host must be
//! one of the evaluator's named builtins, which keeps the capability
//! surface enumerable.

use crate::error::{ScriptError, ScriptErrorKind};
use crate::script::lexer::{Token, TokenKind};

/// A parsed script, ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements in source order.
    pub stmts: Vec<Stmt>,
}

/// One statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = expr`
    Let {
        /// Variable name being bound.
        name: String,
        /// Bound expression.
        value: Expr,
    },
    /// `return expr?`
    Return(Option<Expr>),
    /// `if (cond) { ... } else { ... }`
    If {
        /// Branch condition.
        cond: Expr,
        /// Statements run when the condition is truthy.
        then_block: Vec<Stmt>,
        /// Statements run otherwise, empty when no `else`.
        else_block: Vec<Stmt>,
    },
    /// A bare expression statement.
    Expr(Expr),
}

/// One expression node. Offsets point at the node's first token.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal number, string, boolean, or null.
    Literal(serde_json::Value),
    /// Variable reference.
    Var {
        /// Variable name.
        name: String,
        /// Source offset for fault reporting.
        offset: usize,
    },
    /// Member access `object.name`.
    Member {
        /// Expression producing the object.
        object: Box<Expr>,
        /// Field name.
        name: String,
        /// Source offset of the access.
        offset: usize,
    },
    /// Index access `object[index]`.
    Index {
        /// Expression producing the container.
        object: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
        /// Source offset of the opening bracket.
        offset: usize,
    },
    /// Builtin call `name(args...)`.
    Call {
        /// Builtin name.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
        /// Source offset of the callee.
        offset: usize,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
        /// Source offset of the operator.
        offset: usize,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
        /// Source offset of the operator.
        offset: usize,
    },
    /// Conditional `cond ? a : b`.
    Conditional {
        /// Condition.
        cond: Box<Expr>,
        /// Value when truthy.
        then_expr: Box<Expr>,
        /// Value when falsy.
        else_expr: Box<Expr>,
    },
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation.
    Not,
    /// Numeric negation.
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Addition, or string concatenation when either side is a string.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Remainder.
    Rem,
    /// Deep equality.
    Eq,
    /// Deep inequality.
    NotEq,
    /// Less than.
    Lt,
    /// Less than or equal.
    LtEq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    GtEq,
    /// Short-circuit and.
    And,
    /// Short-circuit or.
    Or,
}

/// Parses a token stream into a [`Program`].
pub fn parse(tokens: Vec<Token>) -> Result<Program, ScriptError> {
    let mut parser = Parser { tokens, pos: 0 };
    let stmts = parser.stmt_list(None)?;
    Ok(Program { stmts })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ScriptError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> ScriptError {
        let found = match self.peek() {
            Some(kind) => format!("{kind:?}"),
            None => "end of script".to_string(),
        };
        ScriptError::new(
            ScriptErrorKind::Parse,
            format!("expected {what}, found {found}"),
        )
        .at(self.offset())
    }

    /// Parses statements until the closing brace (or end of input when
    /// `closing` is None).
    fn stmt_list(&mut self, closing: Option<&TokenKind>) -> Result<Vec<Stmt>, ScriptError> {
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                None => {
                    if closing.is_some() {
                        return Err(self.unexpected("'}'"));
                    }
                    return Ok(stmts);
                }
                Some(kind) if Some(kind) == closing => {
                    self.pos += 1;
                    return Ok(stmts);
                }
                _ => stmts.push(self.stmt()?),
            }
        }
    }

    fn stmt(&mut self) -> Result<Stmt, ScriptError> {
        match self.peek() {
            Some(TokenKind::Let) => {
                self.pos += 1;
                let name = self.ident("variable name")?;
                self.expect(&TokenKind::Assign, "'='")?;
                let value = self.expr()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::Let { name, value })
            }
            Some(TokenKind::Return) => {
                self.pos += 1;
                // A bare `return` (end of input, `;`, or `}`) yields null.
                let value = match self.peek() {
                    None | Some(TokenKind::Semicolon | TokenKind::RBrace) => None,
                    _ => Some(self.expr()?),
                };
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::Return(value))
            }
            Some(TokenKind::If) => self.if_stmt(),
            _ => {
                let expr = self.expr()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(&TokenKind::If, "'if'")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        let then_block = self.stmt_list(Some(&TokenKind::RBrace))?;

        let else_block = if self.eat(&TokenKind::Else) {
            if self.peek() == Some(&TokenKind::If) {
                vec![self.if_stmt()?]
            } else {
                self.expect(&TokenKind::LBrace, "'{'")?;
                self.stmt_list(Some(&TokenKind::RBrace))?
            }
        } else {
            Vec::new()
        };

        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn ident(&mut self, what: &str) -> Result<String, ScriptError> {
        match self.peek() {
            Some(TokenKind::Ident(_)) => {
                let Some(Token {
                    kind: TokenKind::Ident(name),
                    ..
                }) = self.advance()
                else {
                    unreachable!("peeked an identifier");
                };
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr, ScriptError> {
        let cond = self.binary(0)?;
        if self.eat(&TokenKind::Question) {
            let then_expr = self.expr()?;
            self.expect(&TokenKind::Colon, "':'")?;
            let else_expr = self.expr()?;
            return Ok(Expr::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            });
        }
        Ok(cond)
    }

    /// Precedence-climbing over binary operators.
    fn binary(&mut self, min_prec: u8) -> Result<Expr, ScriptError> {
        let mut lhs = self.unary()?;

        while let Some((op, prec)) = self.peek().and_then(binary_op) {
            if prec < min_prec {
                break;
            }
            let offset = self.offset();
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                offset,
            };
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let offset = self.offset();
        if self.eat(&TokenKind::Bang) {
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(self.unary()?),
                offset,
            });
        }
        if self.eat(&TokenKind::Minus) {
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(self.unary()?),
                offset,
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;

        loop {
            let offset = self.offset();
            if self.eat(&TokenKind::Dot) {
                let name = self.ident("field name")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    name,
                    offset,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expr()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    offset,
                };
            } else if self.peek() == Some(&TokenKind::LParen) {
                // Calls attach only to bare names; this is the capability
                // boundary, not a style preference.
                let Expr::Var { name, offset } = expr else {
                    return Err(ScriptError::new(
                        ScriptErrorKind::Parse,
                        "only named builtins are callable",
                    )
                    .at(offset));
                };
                self.pos += 1;
                let args = self.call_args()?;
                expr = Expr::Call { name, args, offset };
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen, "')' or ','")?;
            return Ok(args);
        }
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let offset = self.offset();
        match self.advance().map(|t| t.kind) {
            Some(TokenKind::Number(n)) => {
                let value = crate::script::json_number(n).ok_or_else(|| {
                    ScriptError::new(ScriptErrorKind::Parse, "non-finite number literal")
                        .at(offset)
                })?;
                Ok(Expr::Literal(value))
            }
            Some(TokenKind::Str(s)) => Ok(Expr::Literal(serde_json::Value::String(s))),
            Some(TokenKind::True) => Ok(Expr::Literal(serde_json::Value::Bool(true))),
            Some(TokenKind::False) => Ok(Expr::Literal(serde_json::Value::Bool(false))),
            Some(TokenKind::Null) => Ok(Expr::Literal(serde_json::Value::Null)),
            Some(TokenKind::Ident(name)) => Ok(Expr::Var { name, offset }),
            Some(TokenKind::LParen) => {
                let expr = self.expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.unexpected("an expression"))
            }
            None => Err(self.unexpected("an expression")),
        }
    }
}

fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    match kind {
        TokenKind::OrOr => Some((BinaryOp::Or, 1)),
        TokenKind::AndAnd => Some((BinaryOp::And, 2)),
        TokenKind::EqEq => Some((BinaryOp::Eq, 3)),
        TokenKind::NotEq => Some((BinaryOp::NotEq, 3)),
        TokenKind::Lt => Some((BinaryOp::Lt, 4)),
        TokenKind::LtEq => Some((BinaryOp::LtEq, 4)),
        TokenKind::Gt => Some((BinaryOp::Gt, 4)),
        TokenKind::GtEq => Some((BinaryOp::GtEq, 4)),
        TokenKind::Plus => Some((BinaryOp::Add, 5)),
        TokenKind::Minus => Some((BinaryOp::Sub, 5)),
        TokenKind::Star => Some((BinaryOp::Mul, 6)),
        TokenKind::Slash => Some((BinaryOp::Div, 6)),
        TokenKind::Percent => Some((BinaryOp::Rem, 6)),
        _ => None,
    }
}
