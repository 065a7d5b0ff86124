//! Query composition: filters → includes → sort → tracking.
//!
//! A [`QuerySpec`] is a plain options object; [`compose`] folds it onto a
//! `Select<E>` without touching the database.

use std::sync::Arc;

use query_core::{ast, SortDir};
use sea_orm::{
    sea_query::{IntoCondition, Order},
    Condition, EntityTrait, QueryFilter, QueryOrder, Select,
};

use crate::entity::entity_name;
use crate::filter::{expr_to_condition, FieldMap, FilterBuildError};

/// Eager-load directive: any `Select<E>` transformation, usually a join.
pub type Include<E> = Arc<dyn Fn(Select<E>) -> Select<E> + Send + Sync>;

/// Whether loaded rows are snapshotted for later partial updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tracking {
    #[default]
    Untracked,
    Tracked,
}

pub struct Sort<E: EntityTrait> {
    pub column: E::Column,
    pub dir: SortDir,
}

impl<E: EntityTrait> Sort<E> {
    pub fn asc(column: E::Column) -> Self {
        Self {
            column,
            dir: SortDir::Asc,
        }
    }

    pub fn desc(column: E::Column) -> Self {
        Self {
            column,
            dir: SortDir::Desc,
        }
    }
}

impl<E: EntityTrait> Clone for Sort<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: EntityTrait> Copy for Sort<E> {}

/// Query options. Defaults: no filters, no includes, no order, untracked.
pub struct QuerySpec<E: EntityTrait> {
    filters: Vec<Condition>,
    includes: Vec<Include<E>>,
    order_by: Option<Sort<E>>,
    then_by: Option<Sort<E>>,
    tracking: Tracking,
}

impl<E: EntityTrait> Default for QuerySpec<E> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            includes: Vec::new(),
            order_by: None,
            then_by: None,
            tracking: Tracking::Untracked,
        }
    }
}

impl<E: EntityTrait> Clone for QuerySpec<E> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            includes: self.includes.clone(),
            order_by: self.order_by,
            then_by: self.then_by,
            tracking: self.tracking,
        }
    }
}

impl<E: EntityTrait> QuerySpec<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate; all predicates are ANDed.
    pub fn filter(mut self, cond: impl IntoCondition) -> Self {
        self.filters.push(cond.into_condition());
        self
    }

    /// Compile a filter expression through `fmap` and add it as a predicate.
    pub fn filter_expr(
        self,
        expr: &ast::Expr,
        fmap: &FieldMap<E>,
    ) -> Result<Self, FilterBuildError> {
        let cond = expr_to_condition::<E>(expr, fmap)?;
        Ok(self.filter(cond))
    }

    pub fn include<F>(mut self, f: F) -> Self
    where
        F: Fn(Select<E>) -> Select<E> + Send + Sync + 'static,
    {
        self.includes.push(Arc::new(f));
        self
    }

    pub fn order_by(mut self, sort: Sort<E>) -> Self {
        self.order_by = Some(sort);
        self
    }

    /// Secondary sort; only applied together with a primary sort.
    pub fn then_by(mut self, sort: Sort<E>) -> Self {
        self.then_by = Some(sort);
        self
    }

    pub fn tracking(mut self, tracking: Tracking) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn tracked(self) -> Self {
        self.tracking(Tracking::Tracked)
    }

    pub fn filters(&self) -> &[Condition] {
        &self.filters
    }

    pub fn tracking_mode(&self) -> Tracking {
        self.tracking
    }
}

/// A lazily evaluated query plus the tracking mode to apply on load.
pub struct ComposedQuery<E: EntityTrait> {
    pub select: Select<E>,
    pub tracking: Tracking,
}

fn to_order(dir: SortDir) -> Order {
    match dir {
        SortDir::Asc => Order::Asc,
        SortDir::Desc => Order::Desc,
    }
}

pub fn compose<E: EntityTrait>(select: Select<E>, spec: &QuerySpec<E>) -> ComposedQuery<E> {
    let mut select = spec
        .filters
        .iter()
        .cloned()
        .fold(select, |s, cond| s.filter(cond));

    for include in &spec.includes {
        select = include(select);
    }

    match (spec.order_by, spec.then_by) {
        (Some(primary), secondary) => {
            select = select.order_by(primary.column, to_order(primary.dir));
            if let Some(secondary) = secondary {
                select = select.order_by(secondary.column, to_order(secondary.dir));
            }
        }
        (None, Some(_)) => {
            tracing::debug!(
                entity = entity_name::<E>(),
                "then_by without order_by; secondary sort ignored"
            );
        }
        (None, None) => {}
    }

    ComposedQuery {
        select,
        tracking: spec.tracking,
    }
}
