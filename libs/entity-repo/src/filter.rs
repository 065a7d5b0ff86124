//! Filter AST → `sea_orm::Condition` compiler.
//!
//! Producing the AST (query strings, request bodies) happens elsewhere; this
//! module only resolves field names through a whitelist and coerces literals.

use std::collections::HashMap;

use query_core::ast::{self as core, CompareOperator};
use sea_orm::{
    sea_query::{Expr, LikeExpr},
    ColumnTrait, Condition, EntityTrait,
};
use thiserror::Error;

/// Whitelisted field kind, used to coerce AST literals into `sea_orm::Value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    I64,
    F64,
    Bool,
    Uuid,
    DateTimeUtc,
}

#[derive(Clone)]
pub struct Field<E: EntityTrait> {
    pub col: E::Column,
    pub kind: FieldKind,
}

/// API field name (case-insensitive) → column.
#[derive(Clone)]
pub struct FieldMap<E: EntityTrait> {
    map: HashMap<String, Field<E>>,
}

impl<E: EntityTrait> Default for FieldMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> FieldMap<E> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn insert(mut self, api_name: impl Into<String>, col: E::Column, kind: FieldKind) -> Self {
        self.map
            .insert(api_name.into().to_lowercase(), Field { col, kind });
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field<E>> {
        self.map.get(&name.to_lowercase())
    }

    fn resolve(&self, name: &str) -> Result<&Field<E>, FilterBuildError> {
        self.get(name)
            .ok_or_else(|| FilterBuildError::UnknownField(name.to_string()))
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterBuildError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("type mismatch: expected {expected:?}, got {got}")]
    TypeMismatch {
        expected: FieldKind,
        got: &'static str,
    },

    #[error("unsupported operator: {0:?}")]
    UnsupportedOp(CompareOperator),

    #[error("unsupported function or args: {0}()")]
    UnsupportedFn(String),

    #[error("IN() list supports only literals")]
    NonLiteralInList,

    #[error("bare identifier not allowed: {0}")]
    BareIdentifier(String),

    #[error("bare literal not allowed")]
    BareLiteral,

    #[error("{0}")]
    Other(&'static str),
}

pub type FilterBuildResult<T> = Result<T, FilterBuildError>;

/* ---------- coercion ---------- */

fn literal_name(v: &core::Value) -> &'static str {
    match v {
        core::Value::Null => "null",
        core::Value::Bool(_) => "bool",
        core::Value::Int(_) => "integer",
        core::Value::Float(_) => "float",
        core::Value::Uuid(_) => "uuid",
        core::Value::DateTime(_) => "datetime",
        core::Value::String(_) => "string",
    }
}

fn coerce(kind: FieldKind, v: &core::Value) -> FilterBuildResult<sea_orm::Value> {
    use core::Value as V;
    Ok(match (kind, v) {
        (FieldKind::String, V::String(s)) => s.clone().into(),
        (FieldKind::I64, V::Int(i)) => (*i).into(),
        (FieldKind::F64, V::Float(f)) => (*f).into(),
        // Integer literals widen into float columns; the reverse is rejected.
        (FieldKind::F64, V::Int(i)) => (*i as f64).into(),
        (FieldKind::Bool, V::Bool(b)) => (*b).into(),
        (FieldKind::Uuid, V::Uuid(u)) => (*u).into(),
        (FieldKind::DateTimeUtc, V::DateTime(dt)) => (*dt).into(),
        (expected, other) => {
            return Err(FilterBuildError::TypeMismatch {
                expected,
                got: literal_name(other),
            })
        }
    })
}

fn coerce_many(kind: FieldKind, items: &[core::Expr]) -> FilterBuildResult<Vec<sea_orm::Value>> {
    items
        .iter()
        .map(|e| match e {
            core::Expr::Value(v) => coerce(kind, v),
            _ => Err(FilterBuildError::NonLiteralInList),
        })
        .collect()
}

/* ---------- LIKE helpers ---------- */

fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn like_pattern(func: &str, s: &str) -> Option<String> {
    let escaped = like_escape(s);
    match func {
        "contains" => Some(format!("%{escaped}%")),
        "startswith" => Some(format!("{escaped}%")),
        "endswith" => Some(format!("%{escaped}")),
        _ => None,
    }
}

/* ---------- Expr (AST) -> Condition ---------- */

pub fn expr_to_condition<E>(expr: &core::Expr, fmap: &FieldMap<E>) -> FilterBuildResult<Condition>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    use core::CompareOperator as Op;
    use core::Expr as X;

    Ok(match expr {
        X::And(a, b) => Condition::all()
            .add(expr_to_condition::<E>(a, fmap)?)
            .add(expr_to_condition::<E>(b, fmap)?),
        X::Or(a, b) => Condition::any()
            .add(expr_to_condition::<E>(a, fmap)?)
            .add(expr_to_condition::<E>(b, fmap)?),
        X::Not(x) => Condition::all().not().add(expr_to_condition::<E>(x, fmap)?),

        X::Compare(l, op, r) => {
            let (name, rhs) = match (&**l, &**r) {
                (X::Identifier(name), X::Value(v)) => (name, v),
                (X::Identifier(_), X::Identifier(_)) => {
                    return Err(FilterBuildError::Other(
                        "field-to-field comparison is not supported",
                    ))
                }
                _ => return Err(FilterBuildError::Other("unsupported comparison form")),
            };
            let f = fmap.resolve(name)?;

            if matches!(rhs, core::Value::Null) {
                return Ok(match op {
                    Op::Eq => Condition::all().add(f.col.is_null()),
                    Op::Ne => Condition::all().add(f.col.is_not_null()),
                    _ => return Err(FilterBuildError::UnsupportedOp(*op)),
                });
            }

            let v = coerce(f.kind, rhs)?;
            let e = match op {
                Op::Eq => f.col.eq(v),
                Op::Ne => f.col.ne(v),
                Op::Gt => f.col.gt(v),
                Op::Ge => f.col.gte(v),
                Op::Lt => f.col.lt(v),
                Op::Le => f.col.lte(v),
            };
            Condition::all().add(e)
        }

        X::In(l, list) => {
            let X::Identifier(name) = &**l else {
                return Err(FilterBuildError::Other("left side of IN must be a field"));
            };
            let f = fmap.resolve(name)?;
            let vals = coerce_many(f.kind, list)?;
            if vals.is_empty() {
                // IN () matches nothing
                Condition::all().add(Expr::cust("1 = 0"))
            } else {
                Condition::all().add(f.col.is_in(vals))
            }
        }

        X::Function(fname, args) => {
            let n = fname.to_ascii_lowercase();
            let [X::Identifier(name), X::Value(core::Value::String(s))] = args.as_slice() else {
                return Err(FilterBuildError::UnsupportedFn(fname.clone()));
            };
            let pattern =
                like_pattern(&n, s).ok_or_else(|| FilterBuildError::UnsupportedFn(fname.clone()))?;
            let f = fmap.resolve(name)?;
            if f.kind != FieldKind::String {
                return Err(FilterBuildError::TypeMismatch {
                    expected: FieldKind::String,
                    got: "non-string field",
                });
            }
            Condition::all().add(Expr::col(f.col).like(LikeExpr::new(pattern).escape('\\')))
        }

        X::Identifier(name) => return Err(FilterBuildError::BareIdentifier(name.clone())),
        X::Value(_) => return Err(FilterBuildError::BareLiteral),
    })
}
