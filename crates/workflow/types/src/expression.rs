//! Declarative transition conditions
//!
//! A condition is a small boolean expression over the attributes of a
//! state's reference object, for example
//! `name = 'state0 complete' and (score >= 80 or override)`.
//!
//! Expressions are parsed once, when the transition is registered. The
//! engine evaluates the parsed tree; this module never looks at objects.

use crate::{AttrValue, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};

/// Comparison operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Parsed expression tree
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Always holds; the parse of an empty condition
    Always,
    Literal(AttrValue),
    /// Attribute of the reference object
    Attribute(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
}

/// A parsed condition together with its source text
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Parse a condition
    pub fn parse(source: &str) -> WorkflowResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        let root = Parser {
            source,
            tokens,
            pos: 0,
        }
        .parse()?;
        Ok(Self {
            source: source.trim().to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// True when the expression holds regardless of the object
    pub fn is_trivial(&self) -> bool {
        matches!(self.root, Expr::Always | Expr::Literal(AttrValue::Bool(true)))
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for Expression {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Expression> for String {
    fn from(expr: Expression) -> Self {
        expr.source
    }
}

// ── Lexer ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Ident(String),
    Literal(AttrValue),
    And,
    Or,
    Not,
    OpenParen,
    CloseParen,
    Compare(CompareOp),
    Eof,
}

impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "'{}'", name),
            Self::Literal(value) => write!(f, "{}", value),
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Not => write!(f, "not"),
            Self::OpenParen => write!(f, "("),
            Self::CloseParen => write!(f, ")"),
            Self::Compare(op) => write!(f, "{}", op),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

struct Lexer<'a> {
    source: &'a str,
    input: Vec<char>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            input: source.chars().collect(),
            pos: 0,
        }
    }

    fn tokenize(mut self) -> WorkflowResult<Vec<Tok>> {
        let mut tokens = Vec::new();
        loop {
            while self.pos < self.input.len() && self.input[self.pos].is_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.input.len() {
                tokens.push(Tok::Eof);
                return Ok(tokens);
            }
            let token = self.next_token()?;
            tokens.push(token);
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn next_token(&mut self) -> WorkflowResult<Tok> {
        let ch = self.input[self.pos];
        let next = self.peek_at(1);
        let (token, width) = match (ch, next) {
            ('(', _) => (Tok::OpenParen, 1),
            (')', _) => (Tok::CloseParen, 1),
            ('=', Some('=')) => (Tok::Compare(CompareOp::Eq), 2),
            ('=', _) => (Tok::Compare(CompareOp::Eq), 1),
            ('!', Some('=')) => (Tok::Compare(CompareOp::Ne), 2),
            ('!', _) => (Tok::Not, 1),
            ('<', Some('>')) => (Tok::Compare(CompareOp::Ne), 2),
            ('<', Some('=')) => (Tok::Compare(CompareOp::Le), 2),
            ('<', _) => (Tok::Compare(CompareOp::Lt), 1),
            ('>', Some('=')) => (Tok::Compare(CompareOp::Ge), 2),
            ('>', _) => (Tok::Compare(CompareOp::Gt), 1),
            ('&', Some('&')) => (Tok::And, 2),
            ('|', Some('|')) => (Tok::Or, 2),
            ('\'', _) | ('"', _) => return self.read_text(ch),
            (c, _) if c.is_ascii_digit() => return self.read_number(false),
            ('-', Some(d)) if d.is_ascii_digit() => return self.read_number(true),
            (c, _) if c.is_ascii_alphabetic() || c == '_' => return Ok(self.read_word()),
            _ => return Err(self.error(format!("unexpected character '{}'", ch))),
        };
        self.pos += width;
        Ok(token)
    }

    fn read_text(&mut self, quote: char) -> WorkflowResult<Tok> {
        self.pos += 1; // opening quote
        let mut text = String::new();
        loop {
            match self.peek_at(0) {
                None => return Err(self.error("unterminated string literal")),
                // A doubled quote escapes itself, as in SQL
                Some(c) if c == quote && self.peek_at(1) == Some(quote) => {
                    text.push(quote);
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Tok::Literal(AttrValue::Text(text)));
                }
                Some('\\') if self.peek_at(1) == Some(quote) => {
                    text.push(quote);
                    self.pos += 2;
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn read_number(&mut self, negative: bool) -> WorkflowResult<Tok> {
        let mut text = String::new();
        if negative {
            text.push('-');
            self.pos += 1;
        }
        let mut seen_dot = false;
        while let Some(c) = self.peek_at(0) {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.' && !seen_dot && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                seen_dot = true;
                text.push(c);
            } else {
                break;
            }
            self.pos += 1;
        }

        let value = if seen_dot {
            text.parse::<f64>()
                .map(AttrValue::Float)
                .map_err(|_| self.error(format!("invalid number '{}'", text)))?
        } else {
            text.parse::<i64>()
                .map(AttrValue::Int)
                .map_err(|_| self.error(format!("invalid number '{}'", text)))?
        };
        Ok(Tok::Literal(value))
    }

    fn read_word(&mut self) -> Tok {
        let mut word = String::new();
        while let Some(c) = self.peek_at(0) {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                word.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        match word.to_ascii_lowercase().as_str() {
            "and" => Tok::And,
            "or" => Tok::Or,
            "not" => Tok::Not,
            "true" => Tok::Literal(AttrValue::Bool(true)),
            "false" => Tok::Literal(AttrValue::Bool(false)),
            "null" => Tok::Literal(AttrValue::Null),
            _ => Tok::Ident(word),
        }
    }

    fn error(&self, message: impl Into<String>) -> WorkflowError {
        WorkflowError::InvalidCondition {
            expression: self.source.to_string(),
            message: format!("{} at offset {}", message.into(), self.pos),
        }
    }
}

// ── Parser ───────────────────────────────────────────────────────────
//
// or_expr    := and_expr ( OR and_expr )*
// and_expr   := unary ( AND unary )*
// unary      := NOT unary | comparison
// comparison := primary ( CMP primary )?
// primary    := literal | attribute | '(' or_expr ')'

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser<'_> {
    fn parse(mut self) -> WorkflowResult<Expr> {
        if self.peek() == &Tok::Eof {
            return Ok(Expr::Always);
        }
        let expr = self.parse_or()?;
        match self.peek() {
            Tok::Eof => Ok(expr),
            other => Err(self.error(format!("unexpected {}", other))),
        }
    }

    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos).unwrap_or(&Tok::Eof)
    }

    fn advance(&mut self) -> Tok {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> WorkflowResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == &Tok::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> WorkflowResult<Expr> {
        let mut left = self.parse_unary()?;
        while self.peek() == &Tok::And {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> WorkflowResult<Expr> {
        if self.peek() == &Tok::Not {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> WorkflowResult<Expr> {
        let left = self.parse_primary()?;
        if let Tok::Compare(op) = *self.peek() {
            self.advance();
            let right = self.parse_primary()?;
            return Ok(Expr::Compare {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> WorkflowResult<Expr> {
        match self.advance() {
            Tok::Literal(value) => Ok(Expr::Literal(value)),
            Tok::Ident(name) => Ok(Expr::Attribute(name)),
            Tok::OpenParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Tok::CloseParen => Ok(inner),
                    other => Err(self.error(format!("expected ')', found {}", other))),
                }
            }
            other => Err(self.error(format!("expected a value, found {}", other))),
        }
    }

    fn error(&self, message: String) -> WorkflowError {
        WorkflowError::InvalidCondition {
            expression: self.source.to_string(),
            message,
        }
    }
}
