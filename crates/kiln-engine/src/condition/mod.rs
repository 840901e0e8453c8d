//! Inclusion conditions for file entries, dependencies and hooks
//!
//! Conditions are a small boolean language over declared variables:
//!
//! ```text
//! DatabaseDriver != "" && (Metrics || Flavor in ["full", "server"])
//! ```
//!
//! Every condition is parsed and type checked against the variable kinds
//! before evaluation, so evaluation itself never fails on a checked
//! expression and never depends on which branch short-circuits.

mod parser;

pub use parser::{CompareOp, Condition, Expr, Literal};

use kiln_core::types::{ResolvedConfig, Value};
use kiln_core::Result;

/// Evaluates conditions against one frozen configuration
#[derive(Clone, Copy)]
pub struct ConditionEvaluator<'a> {
    config: &'a ResolvedConfig,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(config: &'a ResolvedConfig) -> Self {
        Self { config }
    }

    /// Evaluate an optional condition source; an absent condition is true
    pub fn evaluate(&self, condition: Option<&str>) -> Result<bool> {
        match condition.map(str::trim) {
            None | Some("") => Ok(true),
            Some(source) => {
                let parsed = Condition::parse(source)?;
                self.evaluate_parsed(&parsed)
            }
        }
    }

    /// Evaluate a parsed condition
    pub fn evaluate_parsed(&self, condition: &Condition) -> Result<bool> {
        condition.check(|name| self.config.declared_kind(name))?;
        Ok(self.truth(condition.expr()))
    }

    fn truth(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Literal(Literal::Bool(b)) => *b,
            Expr::Literal(_) => false,
            Expr::Var(name) => matches!(self.config.value(name), Some(Value::Bool(true))),
            Expr::Not(inner) => !self.truth(inner),
            Expr::And(l, r) => self.truth(l) && self.truth(r),
            Expr::Or(l, r) => self.truth(l) || self.truth(r),
            Expr::Compare { op, left, right } => {
                let equal = match (self.operand(left), self.operand(right)) {
                    (Some(a), Some(b)) => a == b,
                    (None, None) => true,
                    _ => false,
                };
                match op {
                    CompareOp::Eq => equal,
                    CompareOp::Ne => !equal,
                }
            }
            Expr::Membership {
                needle,
                set,
                negated,
            } => {
                let member = match self.operand(needle) {
                    Some(value) => set.iter().any(|lit| Operand::from(lit) == value),
                    None => false,
                };
                member != *negated
            }
        }
    }

    /// Value of an operand, `None` for an unset int variable
    fn operand<'e>(&self, expr: &'e Expr) -> Option<Operand<'e>>
    where
        'a: 'e,
    {
        match expr {
            Expr::Literal(lit) => Some(Operand::from(lit)),
            Expr::Var(name) => self.config.value(name).map(Operand::from),
            other => Some(Operand::Bool(self.truth(other))),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Operand<'a> {
    Str(&'a str),
    Int(i64),
    Bool(bool),
}

impl<'a> From<&'a Literal> for Operand<'a> {
    fn from(lit: &'a Literal) -> Self {
        match lit {
            Literal::Str(s) => Operand::Str(s),
            Literal::Int(i) => Operand::Int(*i),
            Literal::Bool(b) => Operand::Bool(*b),
        }
    }
}

impl<'a> From<&'a Value> for Operand<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(s) | Value::Enum(s) => Operand::Str(s),
            Value::Int(i) => Operand::Int(*i),
            Value::Bool(b) => Operand::Bool(*b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::types::VariableKind;
    use kiln_core::Error;
    use std::collections::BTreeMap;

    fn config() -> ResolvedConfig {
        let declared = BTreeMap::from([
            ("DatabaseDriver".to_string(), VariableKind::Enum),
            ("Name".to_string(), VariableKind::String),
            ("Port".to_string(), VariableKind::Int),
            ("Metrics".to_string(), VariableKind::Bool),
            ("Tracing".to_string(), VariableKind::Bool),
            ("Region".to_string(), VariableKind::String),
            ("Retries".to_string(), VariableKind::Int),
        ]);
        let values = BTreeMap::from([
            ("DatabaseDriver".to_string(), Value::Enum("postgres".into())),
            ("Name".to_string(), Value::String("svc".into())),
            ("Port".to_string(), Value::Int(8080)),
            ("Metrics".to_string(), Value::Bool(true)),
        ]);
        ResolvedConfig::new("bp", declared, values)
    }

    #[test]
    fn test_absent_condition_is_true() {
        let config = config();
        let eval = ConditionEvaluator::new(&config);
        assert!(eval.evaluate(None).unwrap());
        assert!(eval.evaluate(Some("  ")).unwrap());
    }

    #[test]
    fn test_equality_and_logic() {
        let config = config();
        let eval = ConditionEvaluator::new(&config);
        assert!(eval.evaluate(Some(r#"DatabaseDriver != """#)).unwrap());
        assert!(eval.evaluate(Some(r#".DatabaseDriver == "postgres""#)).unwrap());
        assert!(eval.evaluate(Some("Port == 8080 && Metrics")).unwrap());
        assert!(!eval.evaluate(Some("Port != 8080 || !Metrics")).unwrap());
        assert!(eval.evaluate(Some("not (Metrics and Tracing)")).unwrap());
    }

    #[test]
    fn test_membership() {
        let config = config();
        let eval = ConditionEvaluator::new(&config);
        assert!(eval.evaluate(Some(r#"DatabaseDriver in ["postgres", "mysql"]"#)).unwrap());
        assert!(!eval.evaluate(Some(r#"DatabaseDriver not in ["postgres"]"#)).unwrap());
        assert!(eval.evaluate(Some("Port in [80, 8080]")).unwrap());
    }

    #[test]
    fn test_unset_variables() {
        let config = config();
        let eval = ConditionEvaluator::new(&config);
        assert!(!eval.evaluate(Some("Tracing")).unwrap());
        assert!(eval.evaluate(Some("!Tracing")).unwrap());
        assert!(eval.evaluate(Some(r#"Region == """#)).unwrap());
        assert!(!eval.evaluate(Some(r#"Region != """#)).unwrap());
        assert!(eval.evaluate(Some(r#"Region != "eu""#)).unwrap());
        assert!(eval.evaluate(Some(r#"Region in ["", "eu"]"#)).unwrap());
        assert!(eval.evaluate(Some(r#"Region not in ["eu"]"#)).unwrap());
        assert!(!eval.evaluate(Some("Retries == 0")).unwrap());
        assert!(eval.evaluate(Some("Retries != 0")).unwrap());
        assert!(!eval.evaluate(Some("Retries in [0, 1]")).unwrap());
    }

    #[test]
    fn test_undeclared_reference_on_short_circuited_branch() {
        let config = config();
        let eval = ConditionEvaluator::new(&config);
        let err = eval.evaluate(Some("Metrics || Typo")).unwrap_err();
        assert!(matches!(err, Error::Condition { .. }));
        assert!(err.to_string().contains("Typo"));
    }

    #[test]
    fn test_type_mismatch_is_condition_error() {
        let config = config();
        let eval = ConditionEvaluator::new(&config);
        let err = eval.evaluate(Some(r#"Port == "8080""#)).unwrap_err();
        assert!(matches!(err, Error::Condition { .. }));
        assert!(eval.evaluate(Some("Name")).is_err());
    }
}
