//! Recursive-descent parser producing an expression tree.
//!
//! Precedence, loosest first: assignment, `||`, `&&`, equality,
//! relational, additive, multiplicative, unary, member access.

use swfdap_core::Value;

use super::lexer::{tokenize, Token};
use super::ExpressionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    This,
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
}

/// Deepest nesting of parentheses, brackets, unary operators and
/// assignments accepted.
const MAX_DEPTH: usize = 64;
/// Longest expression accepted, in tokens. Bounds left-deep operator and
/// member chains, which the parser builds iteratively.
const MAX_TOKENS: usize = 1024;

pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Parse("empty expression".into()));
    }
    if tokens.len() > MAX_TOKENS {
        return Err(ExpressionError::Parse(format!(
            "expression longer than {MAX_TOKENS} tokens"
        )));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.assignment()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::Parse(format!(
            "unexpected token {token:?}"
        ))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(ExpressionError::Parse(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    /// Runs `rule` one nesting level deeper.
    fn nested(
        &mut self,
        rule: fn(&mut Self) -> Result<Expr, ExpressionError>,
    ) -> Result<Expr, ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExpressionError::Parse(format!(
                "expression nested deeper than {MAX_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn assignment(&mut self) -> Result<Expr, ExpressionError> {
        self.nested(Self::assignment_level)
    }

    fn assignment_level(&mut self) -> Result<Expr, ExpressionError> {
        let target = self.or()?;
        if !self.eat(&Token::Assign) {
            return Ok(target);
        }
        if !matches!(target, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..)) {
            return Err(ExpressionError::Parse("invalid assignment target".into()));
        }
        let value = self.assignment()?;
        Ok(Expr::Assign(Box::new(target), Box::new(value)))
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) {
            let right = self.and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ExpressionError>,
    ) -> Result<Expr, ExpressionError> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn equality(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            &[
                (Token::Eq, BinaryOp::Eq),
                (Token::NotEq, BinaryOp::NotEq),
                (Token::StrictEq, BinaryOp::StrictEq),
                (Token::StrictNotEq, BinaryOp::StrictNotEq),
            ],
            Self::relational,
        )
    }

    fn relational(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            &[
                (Token::Less, BinaryOp::Less),
                (Token::LessEq, BinaryOp::LessEq),
                (Token::Greater, BinaryOp::Greater),
                (Token::GreaterEq, BinaryOp::GreaterEq),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        self.binary_level(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = if self.eat(&Token::Bang) {
            UnaryOp::Not
        } else if self.eat(&Token::Minus) {
            UnaryOp::Neg
        } else if self.eat(&Token::Plus) {
            UnaryOp::Plus
        } else {
            return self.postfix();
        };
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Some(Token::Ident(name)) => expr = Expr::Member(Box::new(expr), name),
                    // Keywords are valid property names after a dot.
                    Some(Token::True) => expr = Expr::Member(Box::new(expr), "true".into()),
                    Some(Token::False) => expr = Expr::Member(Box::new(expr), "false".into()),
                    Some(Token::Null) => expr = Expr::Member(Box::new(expr), "null".into()),
                    Some(Token::Undefined) => {
                        expr = Expr::Member(Box::new(expr), "undefined".into())
                    }
                    Some(Token::This) => expr = Expr::Member(Box::new(expr), "this".into()),
                    other => {
                        return Err(ExpressionError::Parse(format!(
                            "expected property name, found {other:?}"
                        )))
                    }
                }
            } else if self.eat(&Token::BracketOpen) {
                let index = self.assignment()?;
                self.expect(Token::BracketClose)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::string(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::boolean(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::boolean(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::null())),
            Some(Token::Undefined) => Ok(Expr::Literal(Value::undefined())),
            Some(Token::This) => Ok(Expr::This),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::ParenOpen) => {
                let inner = self.assignment()?;
                self.expect(Token::ParenClose)?;
                Ok(inner)
            }
            Some(other) => Err(ExpressionError::Parse(format!(
                "unexpected token {other:?}"
            ))),
            None => Err(ExpressionError::Parse("unexpected end of expression".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.into()))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("a + b * c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                ident("a"),
                Box::new(Expr::Binary(BinaryOp::Mul, ident("b"), ident("c")))
            )
        );
    }

    #[test]
    fn member_chain_and_index() {
        let expr = parse("this.items[0].name").unwrap();
        assert_eq!(
            expr,
            Expr::Member(
                Box::new(Expr::Index(
                    Box::new(Expr::Member(Box::new(Expr::This), "items".into())),
                    Box::new(Expr::Literal(Value::number(0.0)))
                )),
                "name".into()
            )
        );
    }

    #[test]
    fn logical_operators_nest_by_precedence() {
        let expr = parse("a || b && c").unwrap();
        assert_eq!(
            expr,
            Expr::Logical(
                LogicalOp::Or,
                ident("a"),
                Box::new(Expr::Logical(LogicalOp::And, ident("b"), ident("c")))
            )
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = parse("a = b = 1").unwrap();
        assert!(matches!(expr, Expr::Assign(_, ref rhs) if matches!(**rhs, Expr::Assign(..))));
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(parse(&parens), Err(ExpressionError::Parse(_))));
        let bangs = format!("{}a", "!".repeat(100_000));
        assert!(matches!(parse(&bangs), Err(ExpressionError::Parse(_))));
        let nested = format!("{}1{}", "(".repeat(70), ")".repeat(70));
        assert!(matches!(parse(&nested), Err(ExpressionError::Parse(_))));
    }

    #[test]
    fn moderate_nesting_parses() {
        let nested = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(parse(&nested).unwrap(), Expr::Literal(Value::number(1.0)));
        assert!(parse(&format!("{}a", "!".repeat(10))).is_ok());
    }

    #[test]
    fn overlong_chains_are_rejected() {
        let chain = vec!["a"; 2_000].join(" + ");
        assert!(matches!(parse(&chain), Err(ExpressionError::Parse(_))));
    }

    #[test]
    fn invalid_inputs() {
        assert!(parse("").is_err());
        assert!(parse("1 = 2").is_err());
        assert!(parse("(a").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("a.").is_err());
    }
}
