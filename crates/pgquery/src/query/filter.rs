//! WHERE conditions and default scopes.

use std::sync::Arc;

use crate::expr::{Condition, Operand};
use crate::raw::RawSql;
use crate::value::Value;

use super::Query;
use super::table::DELETED_SCOPE;

macro_rules! where_shortcut {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(&self, column: &str, value: impl Into<Operand>) -> Self {
                self.and_where(Condition::$name(column, value))
            }
        )*
    };
}

impl Query {
    /// AND a condition onto the user WHERE clause.
    pub fn and_where(&self, condition: Condition) -> Self {
        self.derive(|d| Arc::make_mut(&mut d.conditions).push(condition))
    }

    /// OR a condition with everything added so far: `(existing) OR condition`.
    pub fn or_where(&self, condition: Condition) -> Self {
        self.derive(|d| {
            let existing = std::mem::take(Arc::make_mut(&mut d.conditions));
            let merged = if existing.is_empty() {
                condition
            } else {
                Condition::Or(vec![Condition::And(existing), condition])
            };
            d.conditions = Arc::new(vec![merged]);
        })
    }

    /// AND the negation of a condition.
    pub fn where_not(&self, condition: Condition) -> Self {
        self.and_where(Condition::negate(condition))
    }

    where_shortcut!(eq, ne, gt, gte, lt, lte, like, ilike, not_like, not_ilike);

    /// Add `column = value` only when `value` is `Some`.
    pub fn eq_opt<T: Into<Value>>(&self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.and_where(Condition::eq(column, Operand::Value(v.into()))),
            None => self.clone(),
        }
    }

    pub fn is_null(&self, column: &str) -> Self {
        self.and_where(Condition::is_null(column))
    }

    pub fn is_not_null(&self, column: &str) -> Self {
        self.and_where(Condition::is_not_null(column))
    }

    pub fn in_list<T: Into<Value>>(&self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.and_where(Condition::in_list(column, values))
    }

    pub fn not_in<T: Into<Value>>(&self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        self.and_where(Condition::not_in(column, values))
    }

    pub fn between(&self, column: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.and_where(Condition::between(column, from, to))
    }

    pub fn where_in_query(&self, column: &str, query: &Query) -> Self {
        self.and_where(Condition::in_query(column, query))
    }

    pub fn where_exists(&self, query: &Query) -> Self {
        self.and_where(Condition::exists(query))
    }

    pub fn where_raw(&self, sql: RawSql) -> Self {
        self.and_where(Condition::Raw(sql))
    }

    /// Add or replace a named default scope.
    pub fn scope(&self, name: &str, condition: Condition) -> Self {
        self.derive(|d| {
            let scopes = Arc::make_mut(&mut d.scopes);
            scopes.retain(|(n, _)| n != name);
            scopes.push((name.to_string(), condition));
        })
    }

    /// Drop a named default scope from this descriptor.
    pub fn unscope(&self, name: &str) -> Self {
        if !self.data().scopes.iter().any(|(n, _)| n == name) {
            return self.clone();
        }
        self.derive(|d| Arc::make_mut(&mut d.scopes).retain(|(n, _)| n != name))
    }

    /// Include soft-deleted rows.
    ///
    /// Only this descriptor loses the scope; queries that already wrap it
    /// keep their own copy.
    pub fn include_deleted(&self) -> Self {
        self.unscope(DELETED_SCOPE)
    }

    /// Acknowledge that an UPDATE/DELETE without conditions touches every row.
    pub fn all(&self) -> Self {
        self.derive(|d| d.all = true)
    }
}
