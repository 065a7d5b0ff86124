//! Filter expression tree.
//!
//! Producers (HTTP ingress, config, tests) build an [`Expr`]; `entity-repo`
//! compiles it into a SeaORM condition against a whitelisted field map.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Box<Expr>, CompareOperator, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    Function(String, Vec<Expr>),
    Identifier(String),
    Value(Value),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    String(String),
}

impl Expr {
    pub fn field(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn value(v: impl Into<Value>) -> Self {
        Expr::Value(v.into())
    }

    /// `field <op> value`
    pub fn compare(field: impl Into<String>, op: CompareOperator, v: impl Into<Value>) -> Self {
        Expr::Compare(Box::new(Expr::field(field)), op, Box::new(Expr::value(v)))
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// `name(field, 'literal')`, e.g. `contains(title, 'rust')`.
    pub fn call(name: impl Into<String>, field: impl Into<String>, arg: impl Into<Value>) -> Self {
        Expr::Function(name.into(), vec![Expr::field(field), Expr::value(arg)])
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
