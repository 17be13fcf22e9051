//! SELECT-side clauses and derived result shapes.

use std::sync::Arc;

use crate::expr::{
    Aggregate, Condition, Cte, CteBody, Distinct, Join, JoinKind, JoinSource, Lock, Operand,
    Order, SelectItem, SetOp, SetOpKind, WindowSpec,
};
use crate::ident::ColumnRef;
use crate::raw::{RawSql, raw};

use super::{Clause, Query, ReturnKind, Source};

/// Alias given to the inner query by [`Query::json`] and [`Query::count`] wrappers.
pub(crate) const WRAP_ALIAS: &str = "t";

impl Query {
    // ==================== SELECT list ====================

    /// Replace the select list with plain columns.
    pub fn select<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SelectItem>,
    {
        let items: Vec<SelectItem> = columns.into_iter().map(Into::into).collect();
        self.derive(|d| d.select = Arc::new(items))
    }

    /// Append one item to the select list.
    pub fn add_select(&self, item: impl Into<SelectItem>) -> Self {
        let item = item.into();
        self.derive(|d| Arc::make_mut(&mut d.select).push(item))
    }

    /// `"table"."column" AS "alias"`
    pub fn select_as(&self, column: &str, alias: &str) -> Self {
        self.add_select(SelectItem::Column {
            column: ColumnRef::parse(column),
            alias: Some(alias.to_string()),
        })
    }

    pub fn select_raw(&self, sql: RawSql, alias: Option<&str>) -> Self {
        self.add_select(SelectItem::Raw {
            sql,
            alias: alias.map(str::to_string),
        })
    }

    /// `(SELECT ...) AS "alias"`
    pub fn select_query(&self, query: &Query, alias: &str) -> Self {
        self.add_select(SelectItem::Query {
            query: Box::new(query.clone()),
            alias: alias.to_string(),
        })
    }

    /// Aggregate over a column, or over `*` when `column` is `None`.
    pub fn select_aggregate(&self, func: Aggregate, column: Option<&str>, alias: &str) -> Self {
        self.add_select(SelectItem::Aggregate {
            func,
            column: column.map(ColumnRef::parse),
            distinct: false,
            alias: Some(alias.to_string()),
        })
    }

    /// `call OVER "window" AS "alias"`, referencing a window added with [`Query::window`].
    pub fn select_window(&self, call: RawSql, window: &str, alias: &str) -> Self {
        self.add_select(SelectItem::Window {
            call,
            window: window.to_string(),
            alias: Some(alias.to_string()),
        })
    }

    pub fn distinct(&self) -> Self {
        self.derive(|d| d.distinct = Some(Distinct::All))
    }

    pub fn distinct_on<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cols = columns
            .into_iter()
            .map(|c| ColumnRef::parse(c.as_ref()))
            .collect();
        self.derive(|d| d.distinct = Some(Distinct::On(cols)))
    }

    // ==================== JOIN ====================

    pub fn join_with(&self, join: Join) -> Self {
        self.derive(|d| Arc::make_mut(&mut d.joins).push(join))
    }

    fn join_table(&self, kind: JoinKind, table: &str, on: Option<Condition>) -> Self {
        let (name, alias) = match table.split_once(" AS ") {
            Some((name, alias)) => (name.trim(), Some(alias.trim().to_string())),
            None => (table, None),
        };
        self.join_with(Join {
            kind,
            source: JoinSource::Table {
                name: name.to_string(),
                alias,
            },
            on,
        })
    }

    /// `JOIN "table" ON condition`; `table` may be `"name AS alias"`.
    pub fn join(&self, table: &str, on: Condition) -> Self {
        self.join_table(JoinKind::Inner, table, Some(on))
    }

    pub fn left_join(&self, table: &str, on: Condition) -> Self {
        self.join_table(JoinKind::Left, table, Some(on))
    }

    pub fn right_join(&self, table: &str, on: Condition) -> Self {
        self.join_table(JoinKind::Right, table, Some(on))
    }

    pub fn full_join(&self, table: &str, on: Condition) -> Self {
        self.join_table(JoinKind::Full, table, Some(on))
    }

    pub fn cross_join(&self, table: &str) -> Self {
        self.join_table(JoinKind::Cross, table, None)
    }

    /// `JOIN (SELECT ...) AS "alias" ON condition`
    pub fn join_query(&self, kind: JoinKind, query: &Query, alias: &str, on: Option<Condition>) -> Self {
        self.join_with(Join {
            kind,
            source: JoinSource::Query {
                query: Box::new(query.clone()),
                alias: alias.to_string(),
            },
            on,
        })
    }

    // ==================== GROUP BY / HAVING ====================

    pub fn group_by<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cols: Vec<Operand> = columns
            .into_iter()
            .map(|c| Operand::column(c.as_ref()))
            .collect();
        self.derive(|d| Arc::make_mut(&mut d.group).extend(cols))
    }

    pub fn group_by_raw(&self, sql: RawSql) -> Self {
        self.derive(|d| Arc::make_mut(&mut d.group).push(Operand::Raw(sql)))
    }

    pub fn having(&self, condition: Condition) -> Self {
        self.derive(|d| Arc::make_mut(&mut d.having).push(condition))
    }

    // ==================== ORDER BY / LIMIT ====================

    pub fn order(&self, order: Order) -> Self {
        self.derive(|d| Arc::make_mut(&mut d.order).push(order))
    }

    pub fn order_by(&self, column: &str) -> Self {
        self.order(Order::asc(column))
    }

    pub fn order_by_desc(&self, column: &str) -> Self {
        self.order(Order::desc(column))
    }

    pub fn order_by_raw(&self, sql: RawSql) -> Self {
        self.order(Order::raw(sql))
    }

    pub fn limit(&self, n: i64) -> Self {
        self.derive(|d| d.limit = Some(n))
    }

    pub fn offset(&self, n: i64) -> Self {
        self.derive(|d| d.offset = Some(n))
    }

    /// Page-based pagination (1-indexed pages).
    pub fn paginate(&self, page: i64, per_page: i64) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        self.derive(|d| {
            d.limit = Some(per_page);
            d.offset = Some((page - 1).saturating_mul(per_page));
        })
    }

    // ==================== WINDOW / LOCK ====================

    /// Define (or redefine) a named window.
    pub fn window(&self, name: &str, spec: WindowSpec) -> Self {
        self.derive(|d| {
            let windows = Arc::make_mut(&mut d.windows);
            match windows.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = spec,
                None => windows.push((name.to_string(), spec)),
            }
        })
    }

    pub fn lock(&self, lock: Lock) -> Self {
        self.derive(|d| d.lock = Some(lock))
    }

    pub fn for_update(&self) -> Self {
        self.lock(Lock::update())
    }

    pub fn for_share(&self) -> Self {
        self.lock(Lock::share())
    }

    // ==================== set operations ====================

    pub fn set_op(&self, kind: SetOpKind, other: &Query) -> Self {
        let op = SetOp {
            kind,
            query: other.clone(),
        };
        self.derive(|d| Arc::make_mut(&mut d.set_ops).push(op))
    }

    pub fn union(&self, other: &Query) -> Self {
        self.set_op(SetOpKind::Union, other)
    }

    pub fn union_all(&self, other: &Query) -> Self {
        self.set_op(SetOpKind::UnionAll, other)
    }

    pub fn intersect(&self, other: &Query) -> Self {
        self.set_op(SetOpKind::Intersect, other)
    }

    pub fn except(&self, other: &Query) -> Self {
        self.set_op(SetOpKind::Except, other)
    }

    // ==================== WITH ====================

    pub fn with_cte(&self, cte: Cte) -> Self {
        self.derive(|d| {
            let ctes = Arc::make_mut(&mut d.ctes);
            ctes.retain(|c| c.name != cte.name);
            ctes.push(cte);
        })
    }

    /// `WITH "name" AS (query)`
    pub fn with(&self, name: &str, query: &Query) -> Self {
        self.with_cte(Cte {
            name: name.to_string(),
            columns: Vec::new(),
            body: CteBody::Query(Box::new(query.clone())),
            recursive: false,
        })
    }

    pub fn with_raw(&self, name: &str, sql: RawSql) -> Self {
        self.with_cte(Cte {
            name: name.to_string(),
            columns: Vec::new(),
            body: CteBody::Raw(sql),
            recursive: false,
        })
    }

    /// `WITH RECURSIVE "name"(columns) AS (base UNION ALL (step))`
    pub fn with_recursive(&self, name: &str, columns: &[&str], base: &Query, step: &Query) -> Self {
        self.with_cte(Cte {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            body: CteBody::Query(Box::new(base.union_all(step))),
            recursive: true,
        })
    }

    // ==================== result shapes ====================

    /// Expect exactly one row.
    pub fn take(&self) -> Self {
        self.derive(|d| {
            if d.mutation.is_none() {
                d.limit = Some(1);
            }
            d.return_kind = Some(ReturnKind::One);
        })
    }

    /// Expect at most one row.
    pub fn take_optional(&self) -> Self {
        self.derive(|d| {
            if d.mutation.is_none() {
                d.limit = Some(1);
            }
            d.return_kind = Some(ReturnKind::OneOptional);
        })
    }

    /// Select a single column of a single row; zero rows is `NotFound`.
    pub fn get(&self, column: &str) -> Self {
        self.single_value(column, ReturnKind::Value)
    }

    pub fn get_optional(&self, column: &str) -> Self {
        self.single_value(column, ReturnKind::ValueOptional)
    }

    fn single_value(&self, column: &str, kind: ReturnKind) -> Self {
        let item = SelectItem::column(column);
        self.derive(|d| {
            if d.mutation.is_some() {
                d.returning = Arc::new(vec![item]);
            } else {
                d.select = Arc::new(vec![item]);
                d.limit = Some(1);
            }
            d.return_kind = Some(kind);
        })
    }

    /// Select one column from every row.
    pub fn pluck(&self, column: &str) -> Self {
        let item = SelectItem::column(column);
        self.derive(|d| {
            if d.mutation.is_some() {
                d.returning = Arc::new(vec![item]);
            } else {
                d.select = Arc::new(vec![item]);
            }
            d.return_kind = Some(ReturnKind::Pluck);
        })
    }

    /// Number of affected rows.
    pub fn row_count(&self) -> Self {
        self.returns(ReturnKind::RowCount)
    }

    /// Discard the result.
    pub fn void(&self) -> Self {
        self.returns(ReturnKind::Void)
    }

    /// `count(*)` of the rows this query would return.
    ///
    /// Queries whose row set depends on grouping, DISTINCT, set operations or
    /// paging are wrapped as a subquery; otherwise the select list and ordering
    /// are replaced in place.
    pub fn count(&self) -> Self {
        let d = self.data();
        let needs_wrap = !d.group.is_empty()
            || d.distinct.is_some()
            || !d.set_ops.is_empty()
            || d.limit.is_some()
            || d.offset.is_some();

        let count = SelectItem::Aggregate {
            func: Aggregate::Count,
            column: None,
            distinct: false,
            alias: Some("count".to_string()),
        };

        let base = if needs_wrap {
            let inner = self.returns(ReturnKind::All);
            Query::from_query(&inner, WRAP_ALIAS)
        } else {
            self.clear(Clause::Order)
        };

        base.derive(|d| {
            d.select = Arc::new(vec![count]);
            d.return_kind = Some(ReturnKind::Value);
        })
    }

    /// `SELECT EXISTS (query) AS "exists"`
    pub fn exists(&self) -> Self {
        let inner = self.clear(Clause::Order).returns(ReturnKind::All);
        Query::new().derive(|d| {
            d.select = Arc::new(vec![SelectItem::Exists {
                query: Box::new(inner),
                alias: "exists".to_string(),
            }]);
            d.return_kind = Some(ReturnKind::Value);
        })
    }

    /// Aggregate all rows into one JSON array.
    ///
    /// The query is wrapped as `FROM (...) AS "t"`, so its scopes are applied
    /// inside the subquery only.
    pub fn json(&self) -> Self {
        let inner = self.returns(ReturnKind::All);
        Query::from_query(&inner, WRAP_ALIAS).derive(|d| {
            d.select = Arc::new(vec![SelectItem::Raw {
                sql: raw(r#"COALESCE(json_agg(row_to_json("t".*)), '[]')"#),
                alias: Some("json".to_string()),
            }]);
            d.return_kind = Some(ReturnKind::Value);
        })
    }

    /// The name other clauses use for this query's rows.
    pub fn reference(&self) -> Option<String> {
        match &self.data().source {
            Source::Table(t) => Some(t.name().to_string()),
            Source::Subquery { alias, .. } | Source::Raw { alias, .. } => Some(alias.clone()),
            Source::None => None,
        }
    }
}
