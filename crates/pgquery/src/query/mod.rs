//! Immutable query descriptors.
//!
//! A [`Query`] is a cheap handle (`Arc`) to a [`QueryData`] record. Builder
//! methods take `&self` and return a new `Query`; the record is cloned on
//! write with [`Arc::make_mut`], and every clause list is itself behind an
//! `Arc`, so a refinement copies only the clause it touches and shares the
//! rest with its parent. Any earlier descriptor keeps compiling to the same
//! SQL forever.
//!
//! # Example
//!
//! ```ignore
//! use pgquery::{Condition, Table};
//!
//! let users = Table::new("user").soft_delete("deletedAt").snake_case(true);
//!
//! let q = users
//!     .query()
//!     .select(["id", "firstName"])
//!     .eq("id", 1)
//!     .limit(1);
//!
//! let compiled = q.to_sql()?;
//! ```

mod filter;
mod mutation;
mod select;
mod table;

#[cfg(test)]
mod tests;

pub use table::{DELETED_SCOPE, Table};

use std::sync::Arc;

use crate::expr::{
    Condition, Cte, Distinct, Join, Lock, Mutation, Order, Operand, SelectItem, SetOp, WindowSpec,
};
use crate::raw::RawSql;

/// Where a query reads its rows from.
#[derive(Clone, Debug, Default)]
pub enum Source {
    /// No FROM clause (`SELECT 1`).
    #[default]
    None,
    Table(Arc<Table>),
    /// A wrapped query; its own scopes are already part of its SQL.
    Subquery { query: Box<Query>, alias: String },
    /// A raw FROM item such as `generate_series(1, 10)`.
    Raw { sql: RawSql, alias: String },
}

/// How the result of executing a query is shaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnKind {
    /// Every row.
    All,
    /// Exactly one row; zero rows is `NotFound`.
    One,
    /// At most one row.
    OneOptional,
    /// First column of the first row; zero rows is `NotFound`.
    Value,
    /// First column of the first row, if any.
    ValueOptional,
    /// First column of every row.
    Pluck,
    /// Number of affected rows.
    RowCount,
    /// Nothing.
    Void,
}

/// Clause selector for [`Query::clear`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clause {
    Select,
    Distinct,
    Where,
    Join,
    Group,
    Having,
    Order,
    Limit,
    Offset,
    Window,
    Lock,
    SetOps,
    With,
    Returning,
    Append,
}

/// A dependent statement executed in the same round trip as a CTE.
#[derive(Clone, Debug)]
pub struct Appended {
    pub query: Query,
    /// The outer statement returns nothing (and execution reports `NotFound`)
    /// when this dependent yields no rows.
    pub required: bool,
}

/// The clauses of one logical query.
#[derive(Clone, Debug, Default)]
pub struct QueryData {
    pub source: Source,
    pub select: Arc<Vec<SelectItem>>,
    pub distinct: Option<Distinct>,
    pub conditions: Arc<Vec<Condition>>,
    pub joins: Arc<Vec<Join>>,
    pub group: Arc<Vec<Operand>>,
    pub having: Arc<Vec<Condition>>,
    pub order: Arc<Vec<Order>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub windows: Arc<Vec<(String, WindowSpec)>>,
    pub lock: Option<Lock>,
    pub set_ops: Arc<Vec<SetOp>>,
    pub ctes: Arc<Vec<Cte>>,
    pub mutation: Option<Arc<Mutation>>,
    pub returning: Arc<Vec<SelectItem>>,
    pub appended: Arc<Vec<Appended>>,
    /// Default filters, kept apart from `conditions` and ANDed last.
    pub scopes: Arc<Vec<(String, Condition)>>,
    /// Explicit acknowledgment that an UPDATE/DELETE touches every row.
    pub all: bool,
    pub return_kind: Option<ReturnKind>,
}

/// Immutable, structurally shared query descriptor.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct Query {
    data: Arc<QueryData>,
}

impl Query {
    /// A query without a FROM clause.
    pub fn new() -> Self {
        Self::default()
    }

    /// A query over a wrapped subquery (`SELECT ... FROM (...) AS "alias"`).
    pub fn from_query(query: &Query, alias: &str) -> Self {
        Self::from_source(Source::Subquery {
            query: Box::new(query.clone()),
            alias: alias.to_string(),
        })
    }

    /// A query over a raw FROM item.
    pub fn from_raw(sql: RawSql, alias: &str) -> Self {
        Self::from_source(Source::Raw {
            sql,
            alias: alias.to_string(),
        })
    }

    pub(crate) fn from_source(source: Source) -> Self {
        Self {
            data: Arc::new(QueryData {
                source,
                ..QueryData::default()
            }),
        }
    }

    /// Read access to the clauses.
    pub fn data(&self) -> &QueryData {
        &self.data
    }

    pub fn table(&self) -> Option<&Table> {
        match &self.data.source {
            Source::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Whether both handles point at the same record.
    pub fn ptr_eq(&self, other: &Query) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Return a copy with `f` applied to a private version of the record.
    pub(crate) fn derive(&self, f: impl FnOnce(&mut QueryData)) -> Self {
        let mut data = Arc::clone(&self.data);
        f(Arc::make_mut(&mut data));
        Self { data }
    }

    /// Result shape used when the query is executed.
    pub fn return_kind(&self) -> ReturnKind {
        if let Some(kind) = self.data.return_kind {
            return kind;
        }
        match &self.data.mutation {
            Some(_) if self.data.returning.is_empty() => ReturnKind::RowCount,
            _ => ReturnKind::All,
        }
    }

    pub fn is_mutation(&self) -> bool {
        self.data.mutation.is_some()
    }

    /// Remove a clause entirely, restoring its default.
    pub fn clear(&self, clause: Clause) -> Self {
        self.derive(|d| match clause {
            Clause::Select => d.select = Arc::default(),
            Clause::Distinct => d.distinct = None,
            Clause::Where => d.conditions = Arc::default(),
            Clause::Join => d.joins = Arc::default(),
            Clause::Group => d.group = Arc::default(),
            Clause::Having => d.having = Arc::default(),
            Clause::Order => d.order = Arc::default(),
            Clause::Limit => d.limit = None,
            Clause::Offset => d.offset = None,
            Clause::Window => d.windows = Arc::default(),
            Clause::Lock => d.lock = None,
            Clause::SetOps => d.set_ops = Arc::default(),
            Clause::With => d.ctes = Arc::default(),
            Clause::Returning => d.returning = Arc::default(),
            Clause::Append => d.appended = Arc::default(),
        })
    }

    /// Override the result shape.
    pub fn returns(&self, kind: ReturnKind) -> Self {
        self.derive(|d| d.return_kind = Some(kind))
    }
}
