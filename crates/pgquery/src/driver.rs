//! Driver abstraction.
//!
//! The core never talks to a socket itself. Everything that executes SQL goes
//! through [`Driver::query`], which takes the compiled text and its
//! positional [`Value`] parameters and returns rows already converted to
//! [`Value`]s. Transaction verbs (`BEGIN`, `SAVEPOINT s1`, ...) are sent as
//! ordinary queries, so decorators such as the logging driver and the test
//! transaction harness can observe and rewrite them.
//!
//! Adapters are provided for `tokio_postgres::Client` and, with the `pool`
//! feature, `deadpool_postgres::Client`.

use std::future::Future;
use std::sync::Arc;

use futures_util::{TryStreamExt, pin_mut};
use serde::de::DeserializeOwned;
use tokio_postgres::types::ToSql;

use crate::error::{PgError, PgResult};
use crate::value::{FromValue, Value};

/// Anything that can run a parameterized statement.
pub trait Driver: Send + Sync {
    /// Run `sql` with positional parameters `$1..$n`.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = PgResult<QueryOutput>> + Send;

    /// Release the underlying connection.
    ///
    /// The default does nothing; connections owned elsewhere (pools, the
    /// tokio-postgres connection task) are closed by their owner.
    fn close(&self) -> impl Future<Output = PgResult<()>> + Send {
        async { Ok(()) }
    }
}

impl<D: Driver> Driver for &D {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = PgResult<QueryOutput>> + Send {
        (**self).query(sql, params)
    }

    fn close(&self) -> impl Future<Output = PgResult<()>> + Send {
        (**self).close()
    }
}

impl<D: Driver> Driver for Arc<D> {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = PgResult<QueryOutput>> + Send {
        (**self).query(sql, params)
    }

    fn close(&self) -> impl Future<Output = PgResult<()>> + Send {
        (**self).close()
    }
}

/// Rows returned by one round trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    /// Rows affected as reported by the server (`UPDATE 3` -> 3). For a
    /// SELECT this is the number of rows returned.
    pub row_count: u64,
}

impl QueryOutput {
    pub fn new(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }

    /// An empty result for statements that return nothing.
    pub fn affected(row_count: u64) -> Self {
        Self {
            rows: Vec::new(),
            row_count,
        }
    }
}

/// One result row: column names shared across the result set plus values.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a position.
    pub fn value(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of a named column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    /// Typed access by column name.
    pub fn try_get<T: FromValue>(&self, column: &str) -> PgResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| PgError::decode(column, "no such column"))?;
        T::from_value(value).map_err(|message| PgError::decode(column, message))
    }

    /// Typed access by position.
    pub fn try_get_at<T: FromValue>(&self, idx: usize) -> PgResult<T> {
        let name = self.columns.get(idx).map(String::as_str).unwrap_or("?");
        let value = self
            .values
            .get(idx)
            .ok_or_else(|| PgError::decode(name, format!("no column at index {idx}")))?;
        T::from_value(value).map_err(|message| PgError::decode(name, message))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// The row as a JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| {
                let json = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                (c.clone(), json)
            })
            .collect();
        serde_json::Value::Object(map)
    }

    /// Deserialize the row through its JSON form.
    pub fn deserialize<T: DeserializeOwned>(&self) -> PgResult<T> {
        serde_json::from_value(self.to_json()).map_err(|e| PgError::decode("<row>", e.to_string()))
    }
}

/// Trait for converting a result row into a Rust value.
///
/// # Example
///
/// ```ignore
/// use pgquery::{FromRow, PgResult, Row};
///
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &Row) -> PgResult<Self> {
///         Ok(Self {
///             id: row.try_get("id")?,
///             name: row.try_get("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> PgResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> PgResult<Self> {
        Ok(row.clone())
    }
}

impl FromRow for serde_json::Value {
    fn from_row(row: &Row) -> PgResult<Self> {
        Ok(row.to_json())
    }
}

/// Convert tokio-postgres rows, sharing one column list.
fn convert_rows(rows: &[tokio_postgres::Row]) -> PgResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|idx| Value::from_pg_row(row, idx))
                .collect::<PgResult<Vec<_>>>()?;
            Ok(Row::new(Arc::clone(&columns), values))
        })
        .collect()
}

async fn run_tokio_postgres(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[Value],
) -> PgResult<QueryOutput> {
    let stream = client
        .query_raw(sql, params.iter().map(|v| v as &(dyn ToSql + Sync)))
        .await
        .map_err(PgError::from_db_error)?;
    pin_mut!(stream);

    let mut raw_rows = Vec::new();
    while let Some(row) = stream.try_next().await.map_err(PgError::from_db_error)? {
        raw_rows.push(row);
    }
    let rows = convert_rows(&raw_rows)?;
    let row_count = stream.rows_affected().unwrap_or(rows.len() as u64);
    Ok(QueryOutput { rows, row_count })
}

impl Driver for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> PgResult<QueryOutput> {
        run_tokio_postgres(self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl Driver for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> PgResult<QueryOutput> {
        // Delegate to the deref target (ClientWrapper -> tokio_postgres::Client).
        run_tokio_postgres(self, sql, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_by_name_and_index() {
        let row = Row::from_pairs([("id", Value::Int(1)), ("name", Value::from("ann"))]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::from("ann")));
        assert_eq!(row.try_get::<i64>("id").unwrap(), 1);
        assert_eq!(row.try_get_at::<String>(1).unwrap(), "ann");
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_row_decode_errors_name_the_column() {
        let row = Row::from_pairs([("id", Value::from("x"))]);
        match row.try_get::<bool>("id") {
            Err(PgError::Decode { column, .. }) => assert_eq!(column, "id"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(row.try_get::<i64>("nope"), Err(PgError::Decode { .. })));
    }

    #[test]
    fn test_row_to_json_and_deserialize() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct User {
            id: i64,
            name: Option<String>,
        }

        let row = Row::from_pairs([("id", Value::Int(3)), ("name", Value::Null)]);
        assert_eq!(row.to_json(), serde_json::json!({"id": 3, "name": null}));
        assert_eq!(row.deserialize::<User>().unwrap(), User { id: 3, name: None });
    }

    #[test]
    fn test_output_row_count_defaults_to_len() {
        let out = QueryOutput::new(vec![Row::from_pairs([("a", 1)]), Row::from_pairs([("a", 2)])]);
        assert_eq!(out.row_count, 2);
        assert_eq!(QueryOutput::affected(5).rows.len(), 0);
    }
}
