//! `tracing` instrumentation for drivers.
//!
//! Enable via the crate feature: `pgquery = { features = ["tracing"] }`
//! (on by default).

use std::future::Future;
use std::time::Instant;

use tracing::Level;

use crate::driver::{Driver, QueryOutput};
use crate::error::PgResult;
use crate::value::Value;

/// Configuration for [`LoggingDriver`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Tracing event level for successful statements.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    /// Include bound parameter values in events.
    pub log_params: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(1000),
            log_params: false,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn log_params(mut self, enabled: bool) -> Self {
        self.log_params = enabled;
        self
    }

    fn truncate_sql<'s>(&self, sql: &'s str) -> std::borrow::Cow<'s, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)).into(),
            _ => sql.into(),
        }
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Driver decorator emitting one event per round trip on target `pgquery.sql`.
pub struct LoggingDriver<D> {
    inner: D,
    config: LogConfig,
}

impl<D: Driver> LoggingDriver<D> {
    pub fn new(inner: D) -> Self {
        Self::with_config(inner, LogConfig::default())
    }

    pub fn with_config(inner: D, config: LogConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn emit(&self, sql: &str, params: &[Value], result: &PgResult<QueryOutput>, elapsed_ms: f64) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.config.truncate_sql(sql);
        let param_count = params.len();
        let params = self
            .config
            .log_params
            .then(|| serde_json::to_string(params).unwrap_or_default());

        match result {
            Ok(output) => emit_at_level!(
                self.config.level,
                target: "pgquery.sql",
                sql = %sql,
                param_count,
                params = params.as_deref(),
                row_count = output.row_count,
                elapsed_ms,
            ),
            Err(error) => tracing::warn!(
                target: "pgquery.sql",
                sql = %sql,
                param_count,
                params = params.as_deref(),
                elapsed_ms,
                error = %error,
                "query failed"
            ),
        }
    }
}

impl<D: Driver> Driver for LoggingDriver<D> {
    async fn query(&self, sql: &str, params: &[Value]) -> PgResult<QueryOutput> {
        let start = Instant::now();
        let result = self.inner.query(sql, params).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.emit(sql, params, &result, elapsed_ms);
        result
    }

    fn close(&self) -> impl Future<Output = PgResult<()>> + Send {
        self.inner.close()
    }
}
