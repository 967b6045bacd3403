//! Recursive-descent parser producing an [`Expr`] tree.
//!
//! Precedence, lowest first: `or`, `and`, comparison operators, unary `not`.

use regex::Regex;

use super::constraint::VersionRange;
use super::lexer::Token;
use super::{ExprError, Var};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Func {
    Semver,
    SemverWithVersion,
    TrimPrefix,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "semver" => Some(Self::Semver),
            "semverWithVersion" => Some(Self::SemverWithVersion),
            "trimPrefix" => Some(Self::TrimPrefix),
            _ => None,
        }
    }

    fn arity(self) -> usize {
        match self {
            Self::Semver => 1,
            Self::SemverWithVersion | Self::TrimPrefix => 2,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Semver => "semver",
            Self::SemverWithVersion => "semverWithVersion",
            Self::TrimPrefix => "trimPrefix",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Eq,
    Ne,
    In,
    NotIn,
    StartsWith,
    EndsWith,
    Contains,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Str(String),
    Bool(bool),
    Var(Var),
    List(Vec<Expr>),
    Call(Func, Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Matches(Box<Expr>, Regex),
}

pub(crate) struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Expr, ExprError> {
        let expr = self.parse_or()?;
        if self.pos != self.tokens.len() {
            return Err(self.error("unexpected trailing tokens"));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == kw)
    }

    fn expect(&mut self, tok: &Token) -> Result<(), ExprError> {
        if self.peek() == Some(tok) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected {tok:?}")))
        }
    }

    fn error(&self, message: &str) -> ExprError {
        ExprError::Syntax {
            expr: self.src.to_string(),
            message: message.to_string(),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::OrOr)) || self.peek_keyword("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_comparison()?;
        while matches!(self.peek(), Some(Token::AndAnd)) || self.peek_keyword("and") {
            self.pos += 1;
            let rhs = self.parse_comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_unary()?;

        let op = match self.peek().cloned() {
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::NotEq) => BinOp::Ne,
            Some(Token::Ident(kw)) => match kw.as_str() {
                "in" => BinOp::In,
                "startsWith" => BinOp::StartsWith,
                "endsWith" => BinOp::EndsWith,
                "contains" => BinOp::Contains,
                "matches" => {
                    self.pos += 1;
                    return self.parse_matches(lhs);
                }
                "not" => {
                    self.pos += 1;
                    if !self.peek_keyword("in") {
                        return Err(self.error("expected `in` after `not`"));
                    }
                    BinOp::NotIn
                }
                _ => return Ok(lhs),
            },
            _ => return Ok(lhs),
        };
        self.pos += 1;

        let rhs = self.parse_unary()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_matches(&mut self, lhs: Expr) -> Result<Expr, ExprError> {
        let Some(Token::Str(pattern)) = self.next() else {
            return Err(self.error("`matches` requires a string literal pattern"));
        };
        let re = Regex::new(&pattern).map_err(|e| self.error(&e.to_string()))?;
        Ok(Expr::Matches(Box::new(lhs), re))
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some(Token::Bang)) || self.peek_keyword("not") {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let items = self.parse_args(&Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(Token::Ident(name)) => self.parse_ident(&name),
            Some(tok) => Err(self.error(&format!("unexpected token {tok:?}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn parse_ident(&mut self, name: &str) -> Result<Expr, ExprError> {
        match name {
            "true" => return Ok(Expr::Bool(true)),
            "false" => return Ok(Expr::Bool(false)),
            _ => {}
        }

        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let func = Func::from_name(name).ok_or_else(|| ExprError::UnknownFunction {
                expr: self.src.to_string(),
                name: name.to_string(),
            })?;
            let args = self.parse_args(&Token::RParen)?;
            if args.len() != func.arity() {
                return Err(self.error(&format!(
                    "{} expects {} argument(s), got {}",
                    func.name(),
                    func.arity(),
                    args.len()
                )));
            }
            self.check_literal_range(func, &args)?;
            return Ok(Expr::Call(func, args));
        }

        let var = Var::from_name(name).ok_or_else(|| ExprError::UnknownIdentifier {
            expr: self.src.to_string(),
            name: name.to_string(),
        })?;
        Ok(Expr::Var(var))
    }

    /// Ranges given as literals are validated up front.
    fn check_literal_range(&self, func: Func, args: &[Expr]) -> Result<(), ExprError> {
        if !matches!(func, Func::Semver | Func::SemverWithVersion) {
            return Ok(());
        }
        if let Some(Expr::Str(range)) = args.first() {
            VersionRange::parse(range).map_err(|e| self.error(&e))?;
        }
        Ok(())
    }

    fn parse_args(&mut self, close: &Token) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            match self.next() {
                Some(Token::Comma) => {
                    if self.peek() == Some(close) {
                        self.pos += 1;
                        return Ok(items);
                    }
                }
                Some(ref tok) if tok == close => return Ok(items),
                _ => return Err(self.error("unterminated argument list")),
            }
        }
    }
}
