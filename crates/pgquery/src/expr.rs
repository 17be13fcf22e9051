//! Clause building blocks stored inside a query descriptor.
//!
//! This module provides:
//! - [`Condition`]: AND/OR/NOT trees of comparisons for WHERE/HAVING/ON
//! - [`SelectItem`]: columns, aggregates, window calls and raw expressions
//! - [`Order`], [`Join`], [`WindowSpec`], [`Lock`], [`SetOp`], [`Cte`]
//! - [`Record`] and [`OnConflict`] for INSERT/UPDATE payloads
//!
//! Nothing here renders SQL directly; column references stay logical until the
//! compiler qualifies and quotes them.

use crate::ident::ColumnRef;
use crate::query::Query;
use crate::raw::RawSql;
use crate::value::Value;

/// Right-hand side of a comparison or a grouping key.
#[derive(Clone, Debug)]
pub enum Operand {
    /// Another column (`"post"."user_id" = "user"."id"`).
    Column(ColumnRef),
    /// A bound parameter.
    Value(Value),
    /// A raw SQL expression.
    Raw(RawSql),
    /// A scalar subquery.
    Query(Box<Query>),
}

impl Operand {
    pub fn column(name: impl Into<ColumnRef>) -> Self {
        Operand::Column(name.into())
    }
}

macro_rules! operand_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

operand_from!(
    Value,
    bool,
    i16,
    i32,
    i64,
    u32,
    f32,
    f64,
    &str,
    String,
    &String,
    serde_json::Value,
    uuid::Uuid,
    chrono::DateTime<chrono::Utc>,
);

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(Value::from(v))
    }
}

impl From<RawSql> for Operand {
    fn from(sql: RawSql) -> Self {
        Operand::Raw(sql)
    }
}

/// Shorthand for a column operand.
pub fn col(name: &str) -> Operand {
    Operand::column(name)
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    NotLike,
    NotILike,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::ILike => "ILIKE",
            CompareOp::NotLike => "NOT LIKE",
            CompareOp::NotILike => "NOT ILIKE",
        }
    }
}

/// Condition node for WHERE/HAVING/ON clauses.
#[derive(Clone, Debug)]
pub enum Condition {
    /// All conditions must be true.
    And(Vec<Condition>),
    /// At least one condition must be true.
    Or(Vec<Condition>),
    /// Negate the inner condition.
    Not(Box<Condition>),
    /// `column op operand`
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Operand,
    },
    /// `column IS [NOT] NULL`
    NullCheck { column: ColumnRef, is_null: bool },
    /// `column [NOT] IN ($1, $2, ...)`
    InList {
        column: ColumnRef,
        values: Vec<Value>,
        negated: bool,
    },
    /// `column [NOT] IN (SELECT ...)`
    InQuery {
        column: ColumnRef,
        query: Box<Query>,
        negated: bool,
    },
    /// `[NOT] EXISTS (SELECT ...)`
    Exists { query: Box<Query>, negated: bool },
    /// `column [NOT] BETWEEN $n AND $m`
    Between {
        column: ColumnRef,
        from: Value,
        to: Value,
        negated: bool,
    },
    /// Raw SQL fragment with its own bound values.
    Raw(RawSql),
    /// Always true (empty NOT IN lists).
    True,
    /// Always false (empty IN lists).
    False,
}

macro_rules! compare_ctor {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(column: &str, value: impl Into<Operand>) -> Self {
                Condition::Compare {
                    column: ColumnRef::parse(column),
                    op: CompareOp::$op,
                    value: value.into(),
                }
            }
        )*
    };
}

impl Condition {
    compare_ctor!(
        eq => Eq,
        ne => Ne,
        gt => Gt,
        gte => Gte,
        lt => Lt,
        lte => Lte,
        like => Like,
        ilike => ILike,
        not_like => NotLike,
        not_ilike => NotILike,
    );

    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And(conditions)
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Condition::Or(conditions)
    }

    pub fn negate(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// `left = right` between two columns.
    pub fn columns_eq(left: &str, right: &str) -> Self {
        Condition::Compare {
            column: ColumnRef::parse(left),
            op: CompareOp::Eq,
            value: Operand::column(right),
        }
    }

    pub fn is_null(column: &str) -> Self {
        Condition::NullCheck {
            column: ColumnRef::parse(column),
            is_null: true,
        }
    }

    pub fn is_not_null(column: &str) -> Self {
        Condition::NullCheck {
            column: ColumnRef::parse(column),
            is_null: false,
        }
    }

    pub fn in_list<T: Into<Value>>(column: &str, values: impl IntoIterator<Item = T>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Condition::False;
        }
        Condition::InList {
            column: ColumnRef::parse(column),
            values,
            negated: false,
        }
    }

    pub fn not_in<T: Into<Value>>(column: &str, values: impl IntoIterator<Item = T>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Condition::True;
        }
        Condition::InList {
            column: ColumnRef::parse(column),
            values,
            negated: true,
        }
    }

    pub fn in_query(column: &str, query: &Query) -> Self {
        Condition::InQuery {
            column: ColumnRef::parse(column),
            query: Box::new(query.clone()),
            negated: false,
        }
    }

    pub fn exists(query: &Query) -> Self {
        Condition::Exists {
            query: Box::new(query.clone()),
            negated: false,
        }
    }

    pub fn not_exists(query: &Query) -> Self {
        Condition::Exists {
            query: Box::new(query.clone()),
            negated: true,
        }
    }

    pub fn between(column: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Condition::Between {
            column: ColumnRef::parse(column),
            from: from.into(),
            to: to.into(),
            negated: false,
        }
    }

    pub fn not_between(column: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Condition::Between {
            column: ColumnRef::parse(column),
            from: from.into(),
            to: to.into(),
            negated: true,
        }
    }

    pub fn raw(sql: RawSql) -> Self {
        Condition::Raw(sql)
    }

    /// Check if this condition contains no predicates.
    pub fn is_empty(&self) -> bool {
        match self {
            Condition::And(items) | Condition::Or(items) => items.iter().all(|c| c.is_empty()),
            Condition::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }
}

/// Aggregate function.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

/// One entry of a SELECT list or RETURNING clause.
#[derive(Clone, Debug)]
pub enum SelectItem {
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
    Raw {
        sql: RawSql,
        alias: Option<String>,
    },
    /// `func([DISTINCT] col)`; a missing column means `*`.
    Aggregate {
        func: Aggregate,
        column: Option<ColumnRef>,
        distinct: bool,
        alias: Option<String>,
    },
    /// `call OVER "window"`
    Window {
        call: RawSql,
        window: String,
        alias: Option<String>,
    },
    /// `(SELECT ...) AS "alias"`
    Query { query: Box<Query>, alias: String },
    /// `EXISTS (SELECT ...) AS "alias"`
    Exists { query: Box<Query>, alias: String },
}

impl SelectItem {
    pub fn column(name: &str) -> Self {
        SelectItem::Column {
            column: ColumnRef::parse(name),
            alias: None,
        }
    }
}

impl From<&str> for SelectItem {
    fn from(value: &str) -> Self {
        SelectItem::column(value)
    }
}

impl From<String> for SelectItem {
    fn from(value: String) -> Self {
        SelectItem::column(&value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Distinct {
    All,
    On(Vec<ColumnRef>),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nulls {
    First,
    Last,
}

#[derive(Clone, Debug)]
pub enum OrderTarget {
    Column(ColumnRef),
    Raw(RawSql),
}

/// ORDER BY entry.
#[derive(Clone, Debug)]
pub struct Order {
    pub target: OrderTarget,
    pub direction: Direction,
    pub nulls: Option<Nulls>,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            target: OrderTarget::Column(ColumnRef::parse(column)),
            direction: Direction::Asc,
            nulls: None,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            target: OrderTarget::Column(ColumnRef::parse(column)),
            direction: Direction::Desc,
            nulls: None,
        }
    }

    pub fn raw(sql: RawSql) -> Self {
        Self {
            target: OrderTarget::Raw(sql),
            direction: Direction::Asc,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(Nulls::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(Nulls::Last);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Clone, Debug)]
pub enum JoinSource {
    /// A table, optionally schema-qualified, with an optional alias.
    Table { name: String, alias: Option<String> },
    /// A subquery; its own scopes are rendered inside it.
    Query { query: Box<Query>, alias: String },
}

impl JoinSource {
    /// Name other clauses use to refer to the joined rows.
    pub fn reference(&self) -> &str {
        match self {
            JoinSource::Table { name, alias } => alias
                .as_deref()
                .unwrap_or_else(|| name.rsplit('.').next().unwrap_or(name)),
            JoinSource::Query { alias, .. } => alias,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Join {
    pub kind: JoinKind,
    pub source: JoinSource,
    pub on: Option<Condition>,
}

/// Named window definition (`WINDOW "w" AS (...)`).
#[derive(Clone, Debug, Default)]
pub struct WindowSpec {
    pub partition_by: Vec<ColumnRef>,
    pub order_by: Vec<Order>,
    pub frame: Option<RawSql>,
}

impl WindowSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_by(mut self, column: &str) -> Self {
        self.partition_by.push(ColumnRef::parse(column));
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order_by.push(order);
        self
    }

    /// Frame clause such as `ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`.
    pub fn frame(mut self, frame: RawSql) -> Self {
        self.frame = Some(frame);
        self
    }
}

/// Row-level lock strength.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    Update,
    NoKeyUpdate,
    Share,
    KeyShare,
}

impl LockMode {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LockMode::Update => "FOR UPDATE",
            LockMode::NoKeyUpdate => "FOR NO KEY UPDATE",
            LockMode::Share => "FOR SHARE",
            LockMode::KeyShare => "FOR KEY SHARE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitPolicy {
    NoWait,
    SkipLocked,
}

#[derive(Clone, Debug)]
pub enum LockTable {
    Ident(String),
    Raw(RawSql),
}

/// `FOR <mode> [OF tables] [NOWAIT | SKIP LOCKED]`
#[derive(Clone, Debug)]
pub struct Lock {
    pub mode: LockMode,
    pub of: Vec<LockTable>,
    pub wait: Option<WaitPolicy>,
}

impl Lock {
    pub fn new(mode: LockMode) -> Self {
        Self {
            mode,
            of: Vec::new(),
            wait: None,
        }
    }

    pub fn update() -> Self {
        Self::new(LockMode::Update)
    }

    pub fn no_key_update() -> Self {
        Self::new(LockMode::NoKeyUpdate)
    }

    pub fn share() -> Self {
        Self::new(LockMode::Share)
    }

    pub fn key_share() -> Self {
        Self::new(LockMode::KeyShare)
    }

    pub fn of(mut self, table: &str) -> Self {
        self.of.push(LockTable::Ident(table.to_string()));
        self
    }

    pub fn of_raw(mut self, sql: RawSql) -> Self {
        self.of.push(LockTable::Raw(sql));
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.wait = Some(WaitPolicy::NoWait);
        self
    }

    pub fn skip_locked(mut self) -> Self {
        self.wait = Some(WaitPolicy::SkipLocked);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOpKind {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

impl SetOpKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SetOpKind::Union => "UNION",
            SetOpKind::UnionAll => "UNION ALL",
            SetOpKind::Intersect => "INTERSECT",
            SetOpKind::IntersectAll => "INTERSECT ALL",
            SetOpKind::Except => "EXCEPT",
            SetOpKind::ExceptAll => "EXCEPT ALL",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SetOp {
    pub kind: SetOpKind,
    pub query: Query,
}

#[derive(Clone, Debug)]
pub enum CteBody {
    Query(Box<Query>),
    Raw(RawSql),
}

/// User-declared common table expression.
#[derive(Clone, Debug)]
pub struct Cte {
    pub name: String,
    pub columns: Vec<String>,
    pub body: CteBody,
    pub recursive: bool,
}

/// Right-hand side of an assignment in INSERT/UPDATE.
#[derive(Clone, Debug)]
pub enum SetValue {
    Value(Value),
    Raw(RawSql),
    /// `col = col + $n` (UPDATE only)
    Increment(Value),
    /// `col = col - $n` (UPDATE only)
    Decrement(Value),
    /// `col = (SELECT ...)`
    Query(Box<Query>),
    /// `DEFAULT`
    Default,
}

/// Ordered column assignments for one row.
#[derive(Clone, Debug, Default)]
pub struct Record {
    pub(crate) fields: Vec<(String, SetValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    fn put(mut self, column: &str, value: SetValue) -> Self {
        match self.fields.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column.to_string(), value)),
        }
        self
    }

    pub fn set(self, column: &str, value: impl Into<Value>) -> Self {
        self.put(column, SetValue::Value(value.into()))
    }

    pub fn set_raw(self, column: &str, sql: RawSql) -> Self {
        self.put(column, SetValue::Raw(sql))
    }

    pub fn set_query(self, column: &str, query: &Query) -> Self {
        self.put(column, SetValue::Query(Box::new(query.clone())))
    }

    pub fn set_default(self, column: &str) -> Self {
        self.put(column, SetValue::Default)
    }

    pub fn increment(self, column: &str, by: impl Into<Value>) -> Self {
        self.put(column, SetValue::Increment(by.into()))
    }

    pub fn decrement(self, column: &str, by: impl Into<Value>) -> Self {
        self.put(column, SetValue::Decrement(by.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub(crate) fn get(&self, column: &str) -> Option<&SetValue> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Record::new(), |r, (k, v)| r.set(k.as_ref(), v))
    }
}

#[derive(Clone, Debug)]
pub enum ConflictAction {
    Nothing,
    /// `DO UPDATE SET col = EXCLUDED.col` for each listed column.
    Merge(Vec<String>),
    Update(Record),
}

/// `ON CONFLICT (...) DO ...`
#[derive(Clone, Debug)]
pub struct OnConflict {
    pub columns: Vec<String>,
    pub action: ConflictAction,
}

#[derive(Clone, Debug)]
pub enum InsertSource {
    /// One or more rows; columns are the union of all record keys.
    Values(Vec<Record>),
    /// `INSERT INTO t (cols) SELECT ...`
    Query { columns: Vec<String>, query: Box<Query> },
}

#[derive(Clone, Debug)]
pub enum Mutation {
    Insert {
        source: InsertSource,
        on_conflict: Option<OnConflict>,
    },
    Update(Record),
    /// Soft-deletes when the table has a soft-delete column and `hard` is false.
    Delete { hard: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_in_lists_collapse() {
        assert!(matches!(Condition::in_list("id", Vec::<i64>::new()), Condition::False));
        assert!(matches!(Condition::not_in("id", Vec::<i64>::new()), Condition::True));
    }

    #[test]
    fn nested_empty_groups_are_empty() {
        let cond = Condition::and(vec![Condition::or(vec![]), Condition::and(vec![])]);
        assert!(cond.is_empty());
        assert!(!Condition::eq("id", 1).is_empty());
    }

    #[test]
    fn record_overwrites_existing_column() {
        let record = Record::new().set("name", "a").set("age", 3).set("name", "b");
        let cols: Vec<&str> = record.columns().collect();
        assert_eq!(cols, vec!["name", "age"]);
        assert!(matches!(record.get("name"), Some(SetValue::Value(Value::Text(s))) if s == "b"));
    }

    #[test]
    fn join_reference_prefers_alias() {
        let table = JoinSource::Table {
            name: "public.post".into(),
            alias: None,
        };
        assert_eq!(table.reference(), "post");
        let aliased = JoinSource::Table {
            name: "post".into(),
            alias: Some("p".into()),
        };
        assert_eq!(aliased.reference(), "p");
    }
}
