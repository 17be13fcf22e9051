//! Transaction manager.
//!
//! [`transaction`] runs an async closure inside `BEGIN ... COMMIT`; if the
//! closure fails, `ROLLBACK` is sent and the closure's error is returned
//! unchanged. Calling [`Transaction::transaction`] on an open handle does not
//! begin again: it opens a savepoint (`s1`, `s2`, ... per top-level
//! transaction) and routes the outcome to `RELEASE SAVEPOINT` or
//! `ROLLBACK TO SAVEPOINT`. The savepoint stack is popped on every exit
//! path, including a cancelled future.
//!
//! Statements inside one transaction run sequentially on one connection. A
//! handle is not meant to be shared between concurrently running tasks.
//!
//! # Example
//!
//! ```ignore
//! use pgquery::{Record, Table, transaction};
//!
//! let accounts = Table::new("account");
//!
//! transaction(&client, async |tx| {
//!     accounts.query().eq("id", 1).decrement("balance", 100).execute(tx).await?;
//!
//!     // failure here rolls back to the savepoint only
//!     let _ = tx
//!         .transaction(async |tx| {
//!             Table::new("audit").query().insert(Record::new().set("event", "debit")).execute(tx).await
//!         })
//!         .await;
//!
//!     accounts.query().eq("id", 2).increment("balance", 100).execute(tx).await
//! })
//! .await?;
//! ```

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::driver::{Driver, QueryOutput};
use crate::error::{PgError, PgResult};
use crate::value::Value;

/// Transaction isolation level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionIsolation {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl TransactionIsolation {
    pub fn as_sql(&self) -> &'static str {
        match self {
            TransactionIsolation::ReadUncommitted => "READ UNCOMMITTED",
            TransactionIsolation::ReadCommitted => "READ COMMITTED",
            TransactionIsolation::RepeatableRead => "REPEATABLE READ",
            TransactionIsolation::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options rendered into the `BEGIN` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation_level: Option<TransactionIsolation>,
    pub read_only: Option<bool>,
    pub deferrable: Option<bool>,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation_level(mut self, level: TransactionIsolation) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = Some(deferrable);
        self
    }

    /// `BEGIN [ISOLATION LEVEL ...] [READ ONLY | READ WRITE] [[NOT] DEFERRABLE]`
    pub fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(level) = self.isolation_level {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(level.as_sql());
        }
        match self.read_only {
            Some(true) => sql.push_str(" READ ONLY"),
            Some(false) => sql.push_str(" READ WRITE"),
            None => {}
        }
        match self.deferrable {
            Some(true) => sql.push_str(" DEFERRABLE"),
            Some(false) => sql.push_str(" NOT DEFERRABLE"),
            None => {}
        }
        sql
    }
}

#[derive(Debug, Default)]
struct TxState {
    savepoints: Vec<String>,
    counter: usize,
    finished: bool,
}

/// An open transaction bound to a driver.
///
/// Implements [`Driver`], so queries run on it with `query.execute(&tx)`.
pub struct Transaction<'a, D: Driver> {
    driver: &'a D,
    state: Mutex<TxState>,
}

/// The handle passed to transaction bodies.
pub type TransactionHandle<'a, D> = Transaction<'a, D>;

/// Run `f` inside a transaction with default options.
pub async fn transaction<D, T, F>(driver: &D, f: F) -> PgResult<T>
where
    D: Driver,
    F: AsyncFnOnce(&Transaction<'_, D>) -> PgResult<T>,
{
    transaction_with(driver, TransactionOptions::default(), f).await
}

/// Run `f` inside a transaction started with `options`.
///
/// Commits when `f` succeeds. When it fails the transaction is rolled back
/// and `f`'s error is returned; if the rollback fails too, the result is
/// [`PgError::TransactionAbort`] carrying both errors.
pub async fn transaction_with<D, T, F>(driver: &D, options: TransactionOptions, f: F) -> PgResult<T>
where
    D: Driver,
    F: AsyncFnOnce(&Transaction<'_, D>) -> PgResult<T>,
{
    let tx = Transaction::begin_with(driver, options).await?;
    let result = f(&tx).await;
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => Err(tx.abort(error).await),
    }
}

impl<'a, D: Driver> Transaction<'a, D> {
    /// Send `BEGIN` and return the open handle.
    pub async fn begin(driver: &'a D) -> PgResult<Self> {
        Self::begin_with(driver, TransactionOptions::default()).await
    }

    pub async fn begin_with(driver: &'a D, options: TransactionOptions) -> PgResult<Self> {
        let tx = Self {
            driver,
            state: Mutex::new(TxState::default()),
        };
        if let Err(e) = tx.verb(&options.begin_sql()).await {
            tx.state().finished = true;
            return Err(e);
        }
        Ok(tx)
    }

    fn state(&self) -> MutexGuard<'_, TxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn verb(&self, sql: &str) -> PgResult<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "pgquery.tx", sql, depth = self.depth());
        self.driver.query(sql, &[]).await.map(|_| ())
    }

    /// Number of open savepoints.
    pub fn depth(&self) -> usize {
        self.state().savepoints.len()
    }

    /// Names of open savepoints, outermost first.
    pub fn savepoints(&self) -> Vec<String> {
        self.state().savepoints.clone()
    }

    /// The driver this transaction runs on.
    pub fn driver(&self) -> &'a D {
        self.driver
    }

    /// Send `COMMIT`.
    pub async fn commit(self) -> PgResult<()> {
        self.state().finished = true;
        self.verb("COMMIT").await
    }

    /// Send `ROLLBACK`.
    pub async fn rollback(self) -> PgResult<()> {
        self.state().finished = true;
        self.verb("ROLLBACK").await
    }

    /// Roll back after `error` and decide what the caller sees.
    async fn abort(self, error: PgError) -> PgError {
        #[cfg(feature = "tracing")]
        tracing::warn!(target: "pgquery.tx", error = %error, "transaction body failed, rolling back");
        match self.rollback().await {
            Ok(()) => error,
            Err(rollback) => rollback_failed(error, rollback),
        }
    }

    fn push_savepoint(&self) -> String {
        let mut state = self.state();
        state.counter += 1;
        let name = format!("s{}", state.counter);
        state.savepoints.push(name.clone());
        name
    }

    fn pop_savepoint(&self, name: &str) {
        let mut state = self.state();
        if let Some(pos) = state.savepoints.iter().rposition(|n| n == name) {
            state.savepoints.truncate(pos);
        }
    }

    /// Open a savepoint and return a handle for manual release or rollback.
    pub async fn savepoint(&self) -> PgResult<Savepoint<'_, 'a, D>> {
        let name = self.push_savepoint();
        let mut sp = Savepoint {
            tx: self,
            name,
            done: false,
        };
        if let Err(e) = self.verb(&format!("SAVEPOINT {}", sp.name)).await {
            sp.done = true;
            self.pop_savepoint(&sp.name);
            return Err(e);
        }
        Ok(sp)
    }

    /// Run `f` inside a savepoint of this transaction.
    ///
    /// Success releases the savepoint; failure rolls back to it and returns
    /// `f`'s error. The outer transaction stays usable either way.
    pub async fn transaction<T, F>(&self, f: F) -> PgResult<T>
    where
        F: AsyncFnOnce(&Self) -> PgResult<T>,
    {
        let sp = self.savepoint().await?;
        let result = f(self).await;
        match result {
            Ok(value) => {
                sp.release().await?;
                Ok(value)
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(target: "pgquery.tx", savepoint = %sp.name, error = %error, "rolling back to savepoint");
                match sp.rollback().await {
                    Ok(()) => Err(error),
                    Err(rollback) => Err(rollback_failed(error, rollback)),
                }
            }
        }
    }
}

fn rollback_failed(error: PgError, rollback: PgError) -> PgError {
    #[cfg(feature = "tracing")]
    tracing::warn!(target: "pgquery.tx", error = %error, rollback = %rollback, "rollback failed");
    PgError::TransactionAbort {
        error: Box::new(error),
        rollback: Box::new(rollback),
    }
}

impl<D: Driver> Drop for Transaction<'_, D> {
    fn drop(&mut self) {
        let finished = self.state.get_mut().map_or(true, |s| s.finished);
        if !finished {
            // No async drop: the connection stays inside the open transaction
            // until it is closed.
            #[cfg(feature = "tracing")]
            tracing::warn!(target: "pgquery.tx", "transaction dropped without commit or rollback");
        }
    }
}

impl<D: Driver> Driver for Transaction<'_, D> {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = PgResult<QueryOutput>> + Send {
        self.driver.query(sql, params)
    }
}

/// A savepoint opened with [`Transaction::savepoint`].
///
/// Dropping it without [`Savepoint::release`] or [`Savepoint::rollback`]
/// removes it from the handle's stack but leaves it open on the server.
pub struct Savepoint<'t, 'a, D: Driver> {
    tx: &'t Transaction<'a, D>,
    name: String,
    done: bool,
}

impl<D: Driver> Savepoint<'_, '_, D> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `RELEASE SAVEPOINT name`
    pub async fn release(mut self) -> PgResult<()> {
        self.done = true;
        let result = self.tx.verb(&format!("RELEASE SAVEPOINT {}", self.name)).await;
        self.tx.pop_savepoint(&self.name);
        result
    }

    /// `ROLLBACK TO SAVEPOINT name`
    pub async fn rollback(mut self) -> PgResult<()> {
        self.done = true;
        let result = self
            .tx
            .verb(&format!("ROLLBACK TO SAVEPOINT {}", self.name))
            .await;
        self.tx.pop_savepoint(&self.name);
        result
    }
}

impl<D: Driver> Drop for Savepoint<'_, '_, D> {
    fn drop(&mut self) {
        if !self.done {
            self.tx.pop_savepoint(&self.name);
            #[cfg(feature = "tracing")]
            tracing::warn!(target: "pgquery.tx", savepoint = %self.name, "savepoint dropped without release or rollback");
        }
    }
}

impl<D: Driver> Driver for Savepoint<'_, '_, D> {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = PgResult<QueryOutput>> + Send {
        self.tx.query(sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Record;
    use crate::query::Table;
    use crate::testing::RecordingDriver;

    fn statements(driver: &RecordingDriver) -> Vec<String> {
        driver.statements()
    }

    #[test]
    fn test_begin_sql_options() {
        assert_eq!(TransactionOptions::new().begin_sql(), "BEGIN");
        assert_eq!(
            TransactionOptions::new()
                .isolation_level(TransactionIsolation::Serializable)
                .read_only(true)
                .deferrable(true)
                .begin_sql(),
            "BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY DEFERRABLE"
        );
        assert_eq!(
            TransactionOptions::new()
                .isolation_level(TransactionIsolation::ReadCommitted)
                .read_only(false)
                .begin_sql(),
            "BEGIN ISOLATION LEVEL READ COMMITTED READ WRITE"
        );
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let driver = RecordingDriver::new();
        let n = transaction(&driver, async |tx| {
            Table::new("a").query().eq("id", 1).set("x", 1).execute(tx).await
        })
        .await
        .unwrap();
        assert_eq!(n, 0);
        assert_eq!(
            statements(&driver),
            vec![
                "BEGIN".to_string(),
                r#"UPDATE "a" SET "x" = $1 WHERE "a"."id" = $2"#.to_string(),
                "COMMIT".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_rollback_and_reraise_on_failure() {
        let driver = RecordingDriver::new();
        let err = transaction(&driver, async |tx| -> PgResult<()> {
            tx.query("SELECT 1", &[]).await?;
            tx.query("SELECT 2", &[]).await?;
            Err(PgError::validation("boom"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, PgError::Validation(ref m) if m == "boom"));
        assert_eq!(statements(&driver), vec!["BEGIN", "SELECT 1", "SELECT 2", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn test_nested_transaction_uses_savepoint() {
        let driver = RecordingDriver::new();
        transaction(&driver, async |tx| {
            tx.transaction(async |inner| {
                assert_eq!(inner.depth(), 1);
                inner.query("SELECT 1", &[]).await.map(|_| ())
            })
            .await?;
            assert_eq!(tx.depth(), 0);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(
            statements(&driver),
            vec!["BEGIN", "SAVEPOINT s1", "SELECT 1", "RELEASE SAVEPOINT s1", "COMMIT"]
        );
    }

    #[tokio::test]
    async fn test_nested_failure_rolls_back_to_savepoint_only() {
        let driver = RecordingDriver::new();
        transaction(&driver, async |tx| {
            let inner: PgResult<()> = tx
                .transaction(async |_| Err(PgError::not_found("missing")))
                .await;
            assert!(inner.unwrap_err().is_not_found());

            tx.transaction(async |inner| {
                inner.transaction(async |_| Ok(())).await?;
                assert_eq!(inner.savepoints(), vec!["s2".to_string()]);
                Ok(())
            })
            .await
        })
        .await
        .unwrap();

        assert_eq!(
            statements(&driver),
            vec![
                "BEGIN",
                "SAVEPOINT s1",
                "ROLLBACK TO SAVEPOINT s1",
                "SAVEPOINT s2",
                "SAVEPOINT s3",
                "RELEASE SAVEPOINT s3",
                "RELEASE SAVEPOINT s2",
                "COMMIT",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_rollback_reports_both_errors() {
        let driver = RecordingDriver::new().fail_on("ROLLBACK", "connection lost");
        let err = transaction(&driver, async |_| -> PgResult<()> { Err(PgError::validation("boom")) })
            .await
            .unwrap_err();
        match err {
            PgError::TransactionAbort { error, rollback } => {
                assert!(matches!(*error, PgError::Validation(_)));
                assert!(matches!(*rollback, PgError::Driver(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_begin_failure_skips_body() {
        let driver = RecordingDriver::new().fail_on("BEGIN", "too many connections");
        let mut ran = false;
        let err = transaction(&driver, async |_| {
            ran = true;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PgError::Driver(_)));
        assert!(!ran);
        assert_eq!(statements(&driver), vec!["BEGIN"]);
    }

    #[tokio::test]
    async fn test_manual_begin_commit_with_options() {
        let driver = RecordingDriver::new();
        let opts = TransactionOptions::new().isolation_level(TransactionIsolation::RepeatableRead);
        let tx = Transaction::begin_with(&driver, opts).await.unwrap();
        Table::new("t")
            .query()
            .insert(Record::new().set("a", 1))
            .execute(&tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(
            statements(&driver),
            vec![
                "BEGIN ISOLATION LEVEL REPEATABLE READ",
                r#"INSERT INTO "t" ("a") VALUES ($1)"#,
                "COMMIT",
            ]
        );
    }

    #[tokio::test]
    async fn test_manual_savepoint_release_and_drop() {
        let driver = RecordingDriver::new();
        let tx = Transaction::begin(&driver).await.unwrap();

        let sp = tx.savepoint().await.unwrap();
        assert_eq!(sp.name(), "s1");
        sp.release().await.unwrap();

        {
            let _sp = tx.savepoint().await.unwrap();
            assert_eq!(tx.depth(), 1);
        }
        assert_eq!(tx.depth(), 0);

        tx.rollback().await.unwrap();
        assert_eq!(
            statements(&driver),
            vec!["BEGIN", "SAVEPOINT s1", "RELEASE SAVEPOINT s1", "SAVEPOINT s2", "ROLLBACK"]
        );
    }
}
