//! Test tooling.
//!
//! - [`TestTransaction`] wraps a driver so a whole test body runs inside one
//!   transaction that is always rolled back. Application `BEGIN`s become
//!   savepoints (`t1`, `t2`, ...), their `COMMIT`s release them and their
//!   `ROLLBACK`s roll back to them.
//! - [`RecordingDriver`] is an in-memory driver that records every statement
//!   and replies with scripted rows or errors.
//!
//! # Example
//!
//! ```ignore
//! let harness = TestTransaction::new(client);
//! harness.start().await?;
//! app_code(&harness).await?;    // its BEGIN/COMMIT become SAVEPOINT/RELEASE
//! harness.rollback().await?;    // discard everything
//! harness.start().await?;       // next test on the same connection
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::driver::{Driver, QueryOutput, Row};
use crate::error::{PgError, PgResult};
use crate::value::Value;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transaction verbs the harness rewrites.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Verb {
    Begin,
    Commit,
    Rollback,
}

fn classify(sql: &str) -> Option<Verb> {
    let upper = sql.trim().trim_end_matches(';').trim_end().to_ascii_uppercase();
    let mut words = upper.split_whitespace();
    match (words.next(), words.next()) {
        (Some("BEGIN"), _) | (Some("START"), Some("TRANSACTION")) => Some(Verb::Begin),
        (Some("COMMIT" | "END"), None) => Some(Verb::Commit),
        (Some("COMMIT" | "END"), Some("WORK" | "TRANSACTION")) => Some(Verb::Commit),
        (Some("ROLLBACK"), None) => Some(Verb::Rollback),
        (Some("ROLLBACK"), Some("WORK" | "TRANSACTION")) if words.next().is_none() => Some(Verb::Rollback),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct HarnessState {
    active: bool,
    savepoints: Vec<String>,
    counter: usize,
}

/// Rollback-only transaction harness around a driver.
pub struct TestTransaction<D: Driver> {
    driver: D,
    state: Mutex<HarnessState>,
}

impl<D: Driver> TestTransaction<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            state: Mutex::new(HarnessState::default()),
        }
    }

    /// Open the outer transaction.
    pub async fn start(&self) -> PgResult<()> {
        if lock(&self.state).active {
            return Err(PgError::validation("test transaction already started"));
        }
        self.driver.query("BEGIN", &[]).await?;
        let mut state = lock(&self.state);
        state.active = true;
        state.savepoints.clear();
        state.counter = 0;
        Ok(())
    }

    /// Roll back everything since [`TestTransaction::start`].
    ///
    /// A no-op when no transaction is open.
    pub async fn rollback(&self) -> PgResult<()> {
        let was_active = {
            let mut state = lock(&self.state);
            let was_active = state.active;
            state.active = false;
            state.savepoints.clear();
            was_active
        };
        if was_active {
            self.driver.query("ROLLBACK", &[]).await?;
        }
        Ok(())
    }

    /// Roll back and close the wrapped driver.
    pub async fn close(self) -> PgResult<()> {
        let rolled_back = self.rollback().await;
        let closed = self.driver.close().await;
        rolled_back.and(closed)
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).active
    }

    /// Application transactions currently mapped to savepoints.
    pub fn depth(&self) -> usize {
        lock(&self.state).savepoints.len()
    }

    pub fn inner(&self) -> &D {
        &self.driver
    }

    /// Rewrite a statement for the inner driver; `None` means "reply empty".
    fn rewrite(&self, sql: &str) -> Option<String> {
        let mut state = lock(&self.state);
        if !state.active {
            return Some(sql.to_string());
        }
        match classify(sql) {
            None => Some(sql.to_string()),
            Some(Verb::Begin) => {
                state.counter += 1;
                let name = format!("t{}", state.counter);
                state.savepoints.push(name.clone());
                Some(format!("SAVEPOINT {name}"))
            }
            Some(Verb::Commit) => state
                .savepoints
                .pop()
                .map(|name| format!("RELEASE SAVEPOINT {name}")),
            Some(Verb::Rollback) => state
                .savepoints
                .pop()
                .map(|name| format!("ROLLBACK TO SAVEPOINT {name}")),
        }
    }
}

impl<D: Driver> Driver for TestTransaction<D> {
    async fn query(&self, sql: &str, params: &[Value]) -> PgResult<QueryOutput> {
        match self.rewrite(sql) {
            Some(rewritten) => self.driver.query(&rewritten, params).await,
            None => {
                // unmatched COMMIT/ROLLBACK must not end the outer transaction
                #[cfg(feature = "tracing")]
                tracing::warn!(target: "pgquery.tx", sql, "ignoring transaction verb without matching BEGIN");
                Ok(QueryOutput::default())
            }
        }
    }

    async fn close(&self) -> PgResult<()> {
        self.rollback().await?;
        self.driver.close().await
    }
}

/// One statement seen by a [`RecordingDriver`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Clone, Debug)]
enum Reply {
    Rows(Vec<Row>),
    Fail(String),
}

#[derive(Clone, Debug)]
struct Script {
    pattern: String,
    reply: Reply,
}

/// In-memory driver that records statements.
///
/// Replies are scripted by substring: the first script whose pattern occurs
/// in the SQL decides the reply. Unmatched statements return no rows.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    calls: Mutex<Vec<RecordedCall>>,
    scripts: Vec<Script>,
    closed: AtomicBool,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `rows` to statements containing `pattern`.
    pub fn with_rows(mut self, pattern: &str, rows: Vec<Row>) -> Self {
        self.scripts.push(Script {
            pattern: pattern.to_string(),
            reply: Reply::Rows(rows),
        });
        self
    }

    /// Fail statements containing `pattern` with [`PgError::Driver`].
    pub fn fail_on(mut self, pattern: &str, message: &str) -> Self {
        self.scripts.push(Script {
            pattern: pattern.to_string(),
            reply: Reply::Fail(message.to_string()),
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// SQL of every recorded call, in order.
    pub fn statements(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.sql.clone()).collect()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Driver for RecordingDriver {
    async fn query(&self, sql: &str, params: &[Value]) -> PgResult<QueryOutput> {
        lock(&self.calls).push(RecordedCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match self.scripts.iter().find(|s| sql.contains(&s.pattern)) {
            Some(Script {
                reply: Reply::Rows(rows),
                ..
            }) => Ok(QueryOutput::new(rows.clone())),
            Some(Script {
                reply: Reply::Fail(message),
                ..
            }) => Err(PgError::driver(message.clone())),
            None => Ok(QueryOutput::default()),
        }
    }

    async fn close(&self) -> PgResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::transaction;

    #[test]
    fn test_classify_verbs() {
        assert_eq!(classify("BEGIN"), Some(Verb::Begin));
        assert_eq!(classify("begin isolation level serializable"), Some(Verb::Begin));
        assert_eq!(classify("START TRANSACTION"), Some(Verb::Begin));
        assert_eq!(classify("COMMIT;"), Some(Verb::Commit));
        assert_eq!(classify("end"), Some(Verb::Commit));
        assert_eq!(classify("ROLLBACK"), Some(Verb::Rollback));
        assert_eq!(classify("ROLLBACK TO SAVEPOINT s1"), None);
        assert_eq!(classify("SAVEPOINT s1"), None);
        assert_eq!(classify("SELECT 1"), None);
    }

    #[tokio::test]
    async fn test_application_transaction_becomes_savepoint() {
        let harness = TestTransaction::new(RecordingDriver::new());
        harness.start().await.unwrap();

        transaction(&harness, async |tx| {
            tx.transaction(async |inner| inner.query("SELECT 1", &[]).await.map(|_| ()))
                .await
        })
        .await
        .unwrap();
        harness.rollback().await.unwrap();

        assert_eq!(
            harness.inner().statements(),
            vec![
                "BEGIN",
                "SAVEPOINT t1",
                "SAVEPOINT s1",
                "SELECT 1",
                "RELEASE SAVEPOINT s1",
                "RELEASE SAVEPOINT t1",
                "ROLLBACK",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_application_transaction_rolls_back_to_savepoint() {
        let harness = TestTransaction::new(RecordingDriver::new());
        harness.start().await.unwrap();

        let result: PgResult<()> = transaction(&harness, async |_| Err(PgError::validation("x"))).await;
        assert!(result.is_err());
        assert!(harness.is_active());
        assert_eq!(harness.depth(), 0);

        harness.rollback().await.unwrap();
        assert_eq!(
            harness.inner().statements(),
            vec!["BEGIN", "SAVEPOINT t1", "ROLLBACK TO SAVEPOINT t1", "ROLLBACK"]
        );
    }

    #[tokio::test]
    async fn test_repeated_start_and_rollback_cycles() {
        let harness = TestTransaction::new(RecordingDriver::new());
        for _ in 0..3 {
            harness.start().await.unwrap();
            assert!(harness.start().await.is_err());
            transaction(&harness, async |_| Ok(())).await.unwrap();
            harness.rollback().await.unwrap();
            assert!(!harness.is_active());
        }
        assert_eq!(
            harness
                .inner()
                .statements()
                .iter()
                .filter(|s| *s == "SAVEPOINT t1")
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_close_rolls_back_and_closes_driver() {
        let harness = TestTransaction::new(std::sync::Arc::new(RecordingDriver::new()));
        let recorder = std::sync::Arc::clone(harness.inner());
        harness.start().await.unwrap();
        harness.close().await.unwrap();
        assert!(recorder.is_closed());
        assert_eq!(recorder.statements(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn test_inactive_harness_passes_through() {
        let harness = TestTransaction::new(RecordingDriver::new());
        harness.query("COMMIT", &[]).await.unwrap();
        assert_eq!(harness.inner().statements(), vec!["COMMIT"]);
    }

    #[tokio::test]
    async fn test_unmatched_commit_is_swallowed() {
        let harness = TestTransaction::new(RecordingDriver::new());
        harness.start().await.unwrap();
        harness.query("COMMIT", &[]).await.unwrap();
        assert_eq!(harness.inner().statements(), vec!["BEGIN"]);
    }

    #[tokio::test]
    async fn test_recording_driver_scripts() {
        let driver = RecordingDriver::new()
            .fail_on("DROP", "permission denied")
            .with_rows("SELECT", vec![Row::from_pairs([("n", 1)])]);
        assert_eq!(driver.query("SELECT 1", &[]).await.unwrap().rows.len(), 1);
        assert!(driver.query("DROP TABLE x", &[]).await.is_err());
        assert_eq!(driver.calls().len(), 2);
        driver.clear();
        assert!(driver.calls().is_empty());
    }
}
