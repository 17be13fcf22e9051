//! Raw SQL fragments.
//!
//! A [`RawSql`] is literal SQL text plus the values bound to its placeholders.
//! Values are always bound as parameters unless they are explicitly wrapped in
//! [`Unsafe`], which inlines a primitive as literal text. `Unsafe` is a
//! separate type so a plain value can never end up in the SQL text by
//! accident.
//!
//! # Example
//!
//! ```ignore
//! use pgquery::{raw, template, unsafe_sql, Arg};
//!
//! // "price" * $1 > $2
//! let expr = raw("")
//!     .ident("price")?
//!     .sql(" * ")
//!     .bind(2)
//!     .sql(" > ")
//!     .bind(100);
//!
//! // ORDER BY created_at DESC (direction chosen at runtime)
//! let order = template(
//!     &["created_at ", ""],
//!     vec![Arg::from(unsafe_sql("DESC"))],
//! )?;
//! ```

use crate::error::{PgError, PgResult};
use crate::ident;
use crate::sql_buf::{SqlBuf, SqlPart};
use crate::value::Value;

/// A value that is inlined into SQL text instead of being bound.
///
/// Only primitives (null, bool, numbers, text) can be inlined. Text is
/// emitted verbatim, so this must only wrap trusted identifiers or keywords.
#[derive(Clone, Debug, PartialEq)]
pub struct Unsafe(Value);

/// Mark a value for literal inlining.
pub fn unsafe_sql(value: impl Into<Value>) -> Unsafe {
    Unsafe(value.into())
}

impl Unsafe {
    pub fn value(&self) -> &Value {
        &self.0
    }
}

/// One interpolated template argument.
#[derive(Clone, Debug)]
pub enum Arg {
    /// Bound as a positional parameter.
    Bind(Value),
    /// Inlined as literal text.
    Unsafe(Unsafe),
    /// Another fragment, spliced in with its own values.
    Sql(RawSql),
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Bind(value)
    }
}

impl From<Unsafe> for Arg {
    fn from(value: Unsafe) -> Self {
        Arg::Unsafe(value)
    }
}

impl From<RawSql> for Arg {
    fn from(value: RawSql) -> Self {
        Arg::Sql(value)
    }
}

macro_rules! arg_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Bind(Value::from(v))
                }
            }
        )*
    };
}

arg_from!(bool, i32, i64, f64, &str, String, serde_json::Value);

/// An immutable SQL fragment with relative placeholders.
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct RawSql {
    parts: Vec<SqlPart>,
    values: Vec<Value>,
}

/// Start a raw fragment from literal text.
pub fn raw(sql: impl Into<String>) -> RawSql {
    RawSql::new(sql)
}

/// Build a fragment from template segments and interpolated arguments.
///
/// `segments` must have exactly one more element than `args`; segment `i`
/// is followed by argument `i`.
pub fn template(segments: &[&str], args: Vec<Arg>) -> PgResult<RawSql> {
    if segments.len() != args.len() + 1 {
        return Err(PgError::template(format!(
            "expected {} template segments for {} values, got {}",
            args.len() + 1,
            args.len(),
            segments.len()
        )));
    }

    let mut out = RawSql::default();
    let mut args = args.into_iter();
    for segment in segments {
        out = out.sql(*segment);
        match args.next() {
            Some(Arg::Bind(v)) => out = out.bind(v),
            Some(Arg::Unsafe(u)) => out = out.literal(u)?,
            Some(Arg::Sql(fragment)) => out = out.append(fragment),
            None => {}
        }
    }
    Ok(out)
}

impl RawSql {
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let parts = if sql.is_empty() {
            Vec::new()
        } else {
            vec![SqlPart::Raw(sql)]
        };
        Self {
            parts,
            values: Vec::new(),
        }
    }

    /// Append literal text.
    pub fn sql(mut self, sql: &str) -> Self {
        if sql.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a placeholder bound to `value`.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.parts.push(SqlPart::Param);
        self.values.push(value.into());
        self
    }

    /// Append a comma-separated list of placeholders.
    ///
    /// An empty list renders `NULL`, so `IN (NULL)` stays valid SQL.
    pub fn bind_list<T: Into<Value>>(mut self, values: impl IntoIterator<Item = T>) -> Self {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return self.sql("NULL");
        };
        self = self.bind(first);
        for v in iter {
            self = self.sql(", ").bind(v);
        }
        self
    }

    /// Append a double-quoted identifier.
    pub fn ident(self, name: &str) -> PgResult<Self> {
        let quoted = ident::quote_path(name)?;
        Ok(self.sql(&quoted))
    }

    /// Inline an [`Unsafe`] primitive as literal text.
    pub fn literal(self, value: Unsafe) -> PgResult<Self> {
        match value.0.to_literal() {
            Some(text) => Ok(self.sql(&text)),
            None => Err(PgError::template(format!(
                "cannot inline a {} value as SQL text",
                value.0.type_name()
            ))),
        }
    }

    /// Concatenate another fragment: text and values keep their order.
    pub fn append(mut self, other: RawSql) -> Self {
        for part in other.parts {
            match part {
                SqlPart::Raw(s) => self = self.sql(&s),
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.values.extend(other.values);
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Render with placeholders numbered from `$1`.
    pub fn to_sql(&self) -> String {
        let mut buf = SqlBuf::new();
        self.write_to(&mut buf);
        buf.finish().0
    }

    pub(crate) fn write_to(&self, buf: &mut SqlBuf) {
        buf.push_parts(&self.parts, &self.values);
    }
}
