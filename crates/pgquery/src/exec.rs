//! Executing descriptors through a [`Driver`].
//!
//! Every method compiles the query, sends it in one round trip and shapes
//! the rows. The plain methods compile with [`CompileOptions::default`]; the
//! `*_with` variants take the options explicitly. A guarded statement whose
//! required dependent matched nothing is aborted by the server and surfaces
//! as [`PgError::NotFound`].
//!
//! # Example
//!
//! ```ignore
//! let users = Table::new("user");
//! let names: Vec<String> = users.query().eq("active", true).pluck("name").fetch_pluck(&client).await?;
//! let n = users.query().eq("id", 1).delete().execute(&client).await?;
//! ```

use crate::compile::{CompileOptions, CompiledQuery};
use crate::driver::{Driver, FromRow, QueryOutput, Row};
use crate::error::{PgError, PgResult};
use crate::query::{Query, ReturnKind};
use crate::value::{FromValue, Value};

/// A result shaped by [`ReturnKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum QueryResult {
    Rows(Vec<Row>),
    Row(Row),
    OptionalRow(Option<Row>),
    Value(Value),
    OptionalValue(Option<Value>),
    Values(Vec<Value>),
    RowCount(u64),
    Void,
}

/// Send a compiled statement in one round trip.
pub async fn run_compiled<D: Driver>(driver: &D, compiled: &CompiledQuery) -> PgResult<QueryOutput> {
    driver.query(&compiled.sql, &compiled.params).await
}

/// Apply a result shape to the rows of one round trip.
pub fn shape(kind: ReturnKind, output: QueryOutput) -> PgResult<QueryResult> {
    let QueryOutput { rows, row_count } = output;
    Ok(match kind {
        ReturnKind::All => QueryResult::Rows(rows),
        ReturnKind::One => QueryResult::Row(first_row(rows)?),
        ReturnKind::OneOptional => QueryResult::OptionalRow(rows.into_iter().next()),
        ReturnKind::Value => QueryResult::Value(first_value(first_row(rows)?)?),
        ReturnKind::ValueOptional => match rows.into_iter().next() {
            Some(row) => QueryResult::OptionalValue(Some(first_value(row)?)),
            None => QueryResult::OptionalValue(None),
        },
        ReturnKind::Pluck => QueryResult::Values(
            rows.into_iter()
                .map(first_value)
                .collect::<PgResult<Vec<_>>>()?,
        ),
        ReturnKind::RowCount => QueryResult::RowCount(row_count),
        ReturnKind::Void => QueryResult::Void,
    })
}

fn first_row(rows: Vec<Row>) -> PgResult<Row> {
    rows.into_iter()
        .next()
        .ok_or_else(|| PgError::not_found("Expected one row, got none"))
}

fn first_value(row: Row) -> PgResult<Value> {
    row.into_values()
        .into_iter()
        .next()
        .ok_or_else(|| PgError::decode("<first>", "row has no columns"))
}

impl Query {
    async fn round_trip<D: Driver>(&self, driver: &D, options: &CompileOptions) -> PgResult<QueryOutput> {
        let compiled = self.compile(options)?;
        run_compiled(driver, &compiled).await
    }

    /// Execute and shape the result by [`Query::return_kind`].
    pub async fn run<D: Driver>(&self, driver: &D) -> PgResult<QueryResult> {
        self.run_with(driver, &CompileOptions::default()).await
    }

    pub async fn run_with<D: Driver>(
        &self,
        driver: &D,
        options: &CompileOptions,
    ) -> PgResult<QueryResult> {
        let output = self.round_trip(driver, options).await?;
        shape(self.return_kind(), output)
    }

    /// Every row, mapped with [`FromRow`].
    pub async fn fetch_all<T: FromRow, D: Driver>(&self, driver: &D) -> PgResult<Vec<T>> {
        self.fetch_all_with(driver, &CompileOptions::default()).await
    }

    pub async fn fetch_all_with<T: FromRow, D: Driver>(
        &self,
        driver: &D,
        options: &CompileOptions,
    ) -> PgResult<Vec<T>> {
        let output = self.round_trip(driver, options).await?;
        output.rows.iter().map(T::from_row).collect()
    }

    /// The first row; zero rows is `NotFound`.
    pub async fn fetch_one<T: FromRow, D: Driver>(&self, driver: &D) -> PgResult<T> {
        self.fetch_one_with(driver, &CompileOptions::default()).await
    }

    pub async fn fetch_one_with<T: FromRow, D: Driver>(
        &self,
        driver: &D,
        options: &CompileOptions,
    ) -> PgResult<T> {
        let output = self.round_trip(driver, options).await?;
        T::from_row(&first_row(output.rows)?)
    }

    /// The first row, if any.
    pub async fn fetch_opt<T: FromRow, D: Driver>(&self, driver: &D) -> PgResult<Option<T>> {
        self.fetch_opt_with(driver, &CompileOptions::default()).await
    }

    pub async fn fetch_opt_with<T: FromRow, D: Driver>(
        &self,
        driver: &D,
        options: &CompileOptions,
    ) -> PgResult<Option<T>> {
        let output = self.round_trip(driver, options).await?;
        output.rows.first().map(T::from_row).transpose()
    }

    /// First column of the first row; zero rows is `NotFound`.
    pub async fn fetch_value<T: FromValue, D: Driver>(&self, driver: &D) -> PgResult<T> {
        self.fetch_value_with(driver, &CompileOptions::default()).await
    }

    pub async fn fetch_value_with<T: FromValue, D: Driver>(
        &self,
        driver: &D,
        options: &CompileOptions,
    ) -> PgResult<T> {
        let output = self.round_trip(driver, options).await?;
        first_row(output.rows)?.try_get_at(0)
    }

    /// First column of the first row, if any.
    pub async fn fetch_value_opt<T: FromValue, D: Driver>(&self, driver: &D) -> PgResult<Option<T>> {
        self.fetch_value_opt_with(driver, &CompileOptions::default()).await
    }

    pub async fn fetch_value_opt_with<T: FromValue, D: Driver>(
        &self,
        driver: &D,
        options: &CompileOptions,
    ) -> PgResult<Option<T>> {
        let output = self.round_trip(driver, options).await?;
        output.rows.first().map(|row| row.try_get_at(0)).transpose()
    }

    /// First column of every row.
    pub async fn fetch_pluck<T: FromValue, D: Driver>(&self, driver: &D) -> PgResult<Vec<T>> {
        self.fetch_pluck_with(driver, &CompileOptions::default()).await
    }

    pub async fn fetch_pluck_with<T: FromValue, D: Driver>(
        &self,
        driver: &D,
        options: &CompileOptions,
    ) -> PgResult<Vec<T>> {
        let output = self.round_trip(driver, options).await?;
        output.rows.iter().map(|row| row.try_get_at(0)).collect()
    }

    /// Number of affected rows.
    pub async fn execute<D: Driver>(&self, driver: &D) -> PgResult<u64> {
        self.execute_with(driver, &CompileOptions::default()).await
    }

    pub async fn execute_with<D: Driver>(&self, driver: &D, options: &CompileOptions) -> PgResult<u64> {
        let output = self.round_trip(driver, options).await?;
        Ok(output.row_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Record;
    use crate::query::Table;
    use crate::testing::RecordingDriver;

    fn users() -> Table {
        Table::new("user")
    }

    #[tokio::test]
    async fn test_fetch_all_sends_compiled_sql() {
        let driver = RecordingDriver::new().with_rows(
            "SELECT",
            vec![Row::from_pairs([("id", 1)]), Row::from_pairs([("id", 2)])],
        );
        let rows: Vec<Row> = users().query().eq("active", true).fetch_all(&driver).await.unwrap();
        assert_eq!(rows.len(), 2);

        let calls = driver.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].sql, r#"SELECT * FROM "user" WHERE "user"."active" = $1"#);
        assert_eq!(calls[0].params, vec![Value::Bool(true)]);
    }

    #[tokio::test]
    async fn test_fetch_one_without_rows_is_not_found() {
        let driver = RecordingDriver::new();
        let err = users().query().eq("id", 9).fetch_one::<Row, _>(&driver).await.unwrap_err();
        assert!(err.is_not_found());

        let none = users().query().eq("id", 9).fetch_opt::<Row, _>(&driver).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_get_value_and_pluck() {
        let driver = RecordingDriver::new()
            .with_rows("count(*)", vec![Row::from_pairs([("count", 4)])])
            .with_rows(r#"SELECT "user"."name""#, vec![
                Row::from_pairs([("name", "a")]),
                Row::from_pairs([("name", "b")]),
            ]);

        let n: i64 = users().query().count().fetch_value(&driver).await.unwrap();
        assert_eq!(n, 4);

        let names: Vec<String> = users().query().pluck("name").fetch_pluck(&driver).await.unwrap();
        assert_eq!(names, vec!["a", "b"]);

        match users().query().count().run(&driver).await.unwrap() {
            QueryResult::Value(v) => assert_eq!(v, Value::Int(4)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_guard_error_happens_before_round_trip() {
        let driver = RecordingDriver::new();
        let err = users().query().hard_delete().execute(&driver).await.unwrap_err();
        assert!(err.is_guard());
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_guarded_statement_with_empty_main_is_not_an_error() {
        // the dependent ran but the main statement matched nothing
        let driver = RecordingDriver::new();
        let dependent = Table::new("profile")
            .query()
            .eq("userId", 1)
            .update(Record::new().set("bio", "x"));
        let q = users()
            .query()
            .eq("id", 999)
            .append_query_required(&dependent);

        let rows: Vec<Row> = q.fetch_all(&driver).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(q.execute(&driver).await.unwrap(), 0);
        assert!(driver.statements()[0].contains("'pgquery:not-found'"));
    }

    #[tokio::test]
    async fn test_fetch_with_options_reaches_the_compiler() {
        let driver = RecordingDriver::new().with_rows("SELECT", vec![Row::from_pairs([("firstName", "a")])]);
        let options = CompileOptions::new().snake_case(true);
        let q = users().query().select(["firstName"]).eq("lastName", "b");

        let names: Vec<String> = q.fetch_pluck_with(&driver, &options).await.unwrap();
        assert_eq!(names, vec!["a"]);
        q.execute_with(&driver, &options).await.unwrap();
        assert_eq!(
            driver.statements(),
            vec![
                r#"SELECT "user"."first_name" AS "firstName" FROM "user" WHERE "user"."last_name" = $1"#;
                2
            ]
        );

        let err = q
            .fetch_all_with::<Row, _>(&driver, &CompileOptions::new().max_params(0))
            .await
            .unwrap_err();
        assert!(matches!(err, PgError::Validation(_)));
        assert_eq!(driver.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_optional_append_returns_empty_result() {
        let driver = RecordingDriver::new();
        let q = users()
            .query()
            .eq("id", 1)
            .append_query(&Table::new("log").query().insert(Record::new().set("m", "x")));
        let rows: Vec<Row> = q.fetch_all(&driver).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_driver_failure_propagates() {
        let driver = RecordingDriver::new().fail_on("UPDATE", "deadlock detected");
        let err = users()
            .query()
            .eq("id", 1)
            .set("a", 1)
            .execute(&driver)
            .await
            .unwrap_err();
        assert!(matches!(err, PgError::Driver(ref m) if m == "deadlock detected"));
    }

    #[test]
    fn test_shape_row_count_and_void() {
        let out = QueryOutput::affected(3);
        assert_eq!(shape(ReturnKind::RowCount, out.clone()).unwrap(), QueryResult::RowCount(3));
        assert_eq!(shape(ReturnKind::Void, out).unwrap(), QueryResult::Void);
        assert!(shape(ReturnKind::One, QueryOutput::default()).unwrap_err().is_not_found());
        assert_eq!(
            shape(ReturnKind::ValueOptional, QueryOutput::default()).unwrap(),
            QueryResult::OptionalValue(None)
        );
    }
}
