//! Condition expression lexer, parser and static type check

use kiln_core::types::VariableKind;
use kiln_core::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;

/// Literal operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Literal {
    fn ty(&self) -> Ty {
        match self {
            Literal::Str(_) => Ty::Str,
            Literal::Int(_) => Ty::Int,
            Literal::Bool(_) => Ty::Bool,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// Condition syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Literal),
    Var(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Membership {
        needle: Box<Expr>,
        set: Vec<Literal>,
        negated: bool,
    },
}

/// Value type of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ty {
    Str,
    Int,
    Bool,
}

impl Ty {
    fn of_kind(kind: VariableKind) -> Self {
        match kind {
            VariableKind::String | VariableKind::Enum => Ty::Str,
            VariableKind::Int => Ty::Int,
            VariableKind::Bool => Ty::Bool,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Str => f.write_str("string"),
            Ty::Int => f.write_str("int"),
            Ty::Bool => f.write_str("bool"),
        }
    }
}

/// A parsed condition together with its source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Parse a condition expression
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = lex(source).map_err(|msg| Error::condition(source, msg))?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser
            .parse_or()
            .map_err(|msg| Error::condition(source, msg))?;
        if let Some(token) = parser.peek() {
            return Err(Error::condition(
                source,
                format!("unexpected {} after end of expression", token),
            ));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Variable names referenced anywhere in the expression
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        collect_vars(&self.expr, &mut names);
        names
    }

    /// Check references and operand types against declared variable kinds.
    ///
    /// A condition that passes this check cannot fail during evaluation.
    pub fn check<F>(&self, kind_of: F) -> Result<()>
    where
        F: Fn(&str) -> Option<VariableKind>,
    {
        for name in self.variables() {
            if kind_of(name).is_none() {
                return Err(Error::condition(
                    &self.source,
                    format!("references undeclared variable '{}'", name),
                ));
            }
        }

        let ty = type_of(&self.expr, &kind_of).map_err(|msg| Error::condition(&self.source, msg))?;
        if ty != Ty::Bool {
            return Err(Error::condition(
                &self.source,
                format!("expression is of type {}, expected bool", ty),
            ));
        }
        Ok(())
    }
}

fn collect_vars<'a>(expr: &'a Expr, names: &mut BTreeSet<&'a str>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Var(name) => {
            names.insert(name);
        }
        Expr::Not(inner) => collect_vars(inner, names),
        Expr::And(l, r) | Expr::Or(l, r) => {
            collect_vars(l, names);
            collect_vars(r, names);
        }
        Expr::Compare { left, right, .. } => {
            collect_vars(left, names);
            collect_vars(right, names);
        }
        Expr::Membership { needle, .. } => collect_vars(needle, names),
    }
}

fn type_of<F>(expr: &Expr, kind_of: &F) -> std::result::Result<Ty, String>
where
    F: Fn(&str) -> Option<VariableKind>,
{
    match expr {
        Expr::Literal(lit) => Ok(lit.ty()),
        Expr::Var(name) => kind_of(name)
            .map(Ty::of_kind)
            .ok_or_else(|| format!("references undeclared variable '{}'", name)),
        Expr::Not(inner) => {
            expect_bool(inner, kind_of, "operand of 'not'")?;
            Ok(Ty::Bool)
        }
        Expr::And(l, r) | Expr::Or(l, r) => {
            expect_bool(l, kind_of, "operand of a logical operator")?;
            expect_bool(r, kind_of, "operand of a logical operator")?;
            Ok(Ty::Bool)
        }
        Expr::Compare { left, right, .. } => {
            let lt = type_of(left, kind_of)?;
            let rt = type_of(right, kind_of)?;
            if lt != rt {
                return Err(format!("cannot compare {} with {}", lt, rt));
            }
            Ok(Ty::Bool)
        }
        Expr::Membership { needle, set, .. } => {
            let nt = type_of(needle, kind_of)?;
            if let Some(bad) = set.iter().find(|lit| lit.ty() != nt) {
                return Err(format!("set member {} is not of type {}", bad, nt));
            }
            Ok(Ty::Bool)
        }
    }
}

fn expect_bool<F>(expr: &Expr, kind_of: &F, role: &str) -> std::result::Result<(), String>
where
    F: Fn(&str) -> Option<VariableKind>,
{
    match type_of(expr, kind_of)? {
        Ty::Bool => Ok(()),
        other => match expr {
            Expr::Var(name) => Err(format!(
                "variable '{}' is of type {} and cannot be used as a boolean",
                name, other
            )),
            _ => Err(format!("{} must be bool, found {}", role, other)),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    True,
    False,
    EqEq,
    NotEq,
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::Str(s) => write!(f, "string {:?}", s),
            Token::Int(i) => write!(f, "integer {}", i),
            Token::True => f.write_str("'true'"),
            Token::False => f.write_str("'false'"),
            Token::EqEq => f.write_str("'=='"),
            Token::NotEq => f.write_str("'!='"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::Not => f.write_str("'!'"),
            Token::In => f.write_str("'in'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn lex(source: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some(escaped) => value.push(*escaped),
                                None => return Err("unterminated string literal".to_string()),
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while chars.get(i).is_some_and(|d| d.is_ascii_digit()) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse()
                    .map_err(|_| format!("integer literal {} is out of range", text))?;
                tokens.push(Token::Int(value));
            }
            c if c == '.' || c == '_' || c.is_ascii_alphabetic() => {
                // Go-style ".Name" references are accepted
                if c == '.' {
                    i += 1;
                }
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|ch| *ch == '_' || ch.is_ascii_alphanumeric())
                {
                    i += 1;
                }
                if start == i || chars[start].is_ascii_digit() {
                    return Err(format!("expected identifier at offset {}", start));
                }
                let word: String = chars[start..i].iter().collect();
                let token = match (c == '.', word.as_str()) {
                    (false, "true") => Token::True,
                    (false, "false") => Token::False,
                    (false, "and") => Token::And,
                    (false, "or") => Token::Or,
                    (false, "not") => Token::Not,
                    (false, "in") => Token::In,
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            other => return Err(format!("unexpected character '{}' at offset {}", other, i)),
        }
    }

    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {}, found {}", expected, token)),
            None => Err(format!("expected {}, found end of expression", expected)),
        }
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let left = self.parse_primary()?;

        match self.peek() {
            Some(Token::EqEq) | Some(Token::NotEq) => {
                let op = if self.next() == Some(Token::EqEq) {
                    CompareOp::Eq
                } else {
                    CompareOp::Ne
                };
                let right = self.parse_primary()?;
                Ok(Expr::Compare {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Some(Token::In) => {
                self.pos += 1;
                let set = self.parse_list()?;
                Ok(Expr::Membership {
                    needle: Box::new(left),
                    set,
                    negated: false,
                })
            }
            Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                self.pos += 2;
                let set = self.parse_list()?;
                Ok(Expr::Membership {
                    needle: Box::new(left),
                    set,
                    negated: true,
                })
            }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Literal::Str(s))),
            Some(Token::Int(i)) => Ok(Expr::Literal(Literal::Int(i))),
            Some(Token::True) => Ok(Expr::Literal(Literal::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Literal::Bool(false))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(token) => Err(format!("expected an operand, found {}", token)),
            None => Err("expected an operand, found end of expression".to_string()),
        }
    }

    fn parse_list(&mut self) -> ParseResult<Vec<Literal>> {
        self.expect(Token::LBracket)?;
        let mut items = Vec::new();
        loop {
            match self.next() {
                Some(Token::RBracket) => break,
                Some(Token::Str(s)) => items.push(Literal::Str(s)),
                Some(Token::Int(i)) => items.push(Literal::Int(i)),
                Some(Token::True) => items.push(Literal::Bool(true)),
                Some(Token::False) => items.push(Literal::Bool(false)),
                Some(token) => return Err(format!("expected a literal in set, found {}", token)),
                None => return Err("unterminated set literal".to_string()),
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                Some(token) => return Err(format!("expected ',' or ']', found {}", token)),
                None => return Err("unterminated set literal".to_string()),
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(name: &str) -> Option<VariableKind> {
        match name {
            "Driver" | "Name" => Some(VariableKind::String),
            "Flavor" => Some(VariableKind::Enum),
            "Port" => Some(VariableKind::Int),
            "Metrics" | "Tracing" => Some(VariableKind::Bool),
            _ => None,
        }
    }

    #[test]
    fn test_parse_precedence() {
        let cond = Condition::parse("Metrics || Tracing && !Metrics").unwrap();
        match cond.expr() {
            Expr::Or(_, right) => assert!(matches!(**right, Expr::And(_, _))),
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_parse_comparison_and_membership() {
        let cond = Condition::parse(r#"Driver != "" and Flavor not in ["slim", 'tiny']"#).unwrap();
        match cond.expr() {
            Expr::And(left, right) => {
                assert!(matches!(**left, Expr::Compare { op: CompareOp::Ne, .. }));
                match &**right {
                    Expr::Membership { set, negated, .. } => {
                        assert!(*negated);
                        assert_eq!(set.len(), 2);
                    }
                    other => panic!("unexpected tree: {:?}", other),
                }
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_go_style_references() {
        let cond = Condition::parse(".Driver == \"postgres\"").unwrap();
        assert_eq!(cond.variables().into_iter().collect::<Vec<_>>(), vec!["Driver"]);
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "Driver ==",
            "(Metrics",
            "Driver = \"x\"",
            "Port in [1, 2",
            "\"unterminated",
            "Metrics Tracing",
            "Driver in [Name]",
        ] {
            let err = Condition::parse(bad).unwrap_err();
            assert!(
                matches!(err, Error::Condition { .. }),
                "expected condition error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_check_undeclared_reference() {
        let cond = Condition::parse("Metrics || Databse == \"x\"").unwrap();
        let err = cond.check(kinds).unwrap_err();
        assert!(err.to_string().contains("Databse"));
    }

    #[test]
    fn test_check_type_mismatch() {
        assert!(Condition::parse("Port == \"8080\"").unwrap().check(kinds).is_err());
        assert!(Condition::parse("Driver in [1, 2]").unwrap().check(kinds).is_err());
        assert!(Condition::parse("Name").unwrap().check(kinds).is_err());
        assert!(Condition::parse("!Port").unwrap().check(kinds).is_err());
        assert!(Condition::parse("\"x\"").unwrap().check(kinds).is_err());
    }

    #[test]
    fn test_check_accepts_well_typed() {
        for ok in [
            "Metrics",
            "!Metrics && Port == 8080",
            "Flavor == Driver",
            "Port in [80, 443, -1]",
            "(Metrics == true) != Tracing",
        ] {
            Condition::parse(ok).unwrap().check(kinds).unwrap();
        }
    }
}
