//! Descriptor to SQL compilation.
//!
//! [`compile`] walks a finished [`Query`] and produces a [`CompiledQuery`]:
//! SQL text with `$1, $2, ...` placeholders plus the parameters in the same
//! order. All fragments (subqueries, CTEs, raw SQL, appended statements) are
//! accumulated as parts first and numbered in one final left-to-right pass,
//! so `params[i - 1]` is always the value for `$i`.
//!
//! Clause order is fixed: `WITH`, verb, target/columns, `FROM`/`USING`,
//! `JOIN`s, `WHERE` (user conditions, then default scopes), `GROUP BY`,
//! `HAVING`, `WINDOW`, set operations, `ORDER BY`, `LIMIT`/`OFFSET`, locking,
//! `RETURNING`.

mod statement;


use serde::Serialize;

use crate::alias::{self, AliasContext};
use crate::error::{PgError, PgResult};
use crate::query::{Clause, Query};
use crate::sql_buf::SqlBuf;
use crate::value::Value;

use statement::StatementWriter;

/// PostgreSQL's limit on bind parameters per statement.
pub const MAX_PARAMS: usize = 65535;

/// Dialect options for compilation.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Naming convention for tables that do not choose their own.
    pub snake_case: bool,
    /// Maximum number of bound parameters.
    pub max_params: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            snake_case: false,
            max_params: MAX_PARAMS,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snake_case(mut self, enabled: bool) -> Self {
        self.snake_case = enabled;
        self
    }

    pub fn max_params(mut self, max: usize) -> Self {
        self.max_params = max;
        self
    }
}

/// SQL text and its positional parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
    /// Set when a required appended dependent guards the statement. The
    /// server aborts a guarded statement whose dependent yields no rows, and
    /// the driver reports that as `NotFound`.
    pub guarded: bool,
}

impl CompiledQuery {
    /// Number of `$n` placeholders in `sql`.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.sql)
    }
}

pub(crate) fn count_placeholders(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut seen = std::collections::BTreeSet::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                seen.insert(&sql[start..end]);
            }
            i = end.max(i + 1);
        } else {
            i += 1;
        }
    }
    seen.len()
}

/// Compile a descriptor.
pub fn compile(query: &Query, options: &CompileOptions) -> PgResult<CompiledQuery> {
    let mut buf = SqlBuf::new();
    let guarded = if query.data().appended.is_empty() {
        StatementWriter::write(query, options, &mut buf, false)?;
        false
    } else {
        write_with_appended(query, options, &mut buf)?
    };

    let (sql, params) = buf.finish();
    if params.len() > options.max_params {
        return Err(PgError::validation(format!(
            "query binds {} parameters, more than the limit of {}",
            params.len(),
            options.max_params
        )));
    }
    Ok(CompiledQuery {
        sql,
        params,
        guarded,
    })
}

/// Text of the failing cast emitted by the guard of a required appended query.
pub const NOT_FOUND_MARKER: &str = "pgquery:not-found";

/// `WITH "q" AS (dep), ..., "qN" AS (main) SELECT * FROM "qN" [WHERE <guard>]`
///
/// The guard references no column of `"qN"`, so PostgreSQL checks it once
/// before reading any row; an empty required dependent aborts the whole
/// statement through the cast error, even when the main statement is empty.
fn write_with_appended(query: &Query, options: &CompileOptions, buf: &mut SqlBuf) -> PgResult<bool> {
    let mut ctx = AliasContext::new();
    alias::reserve_names(query, &mut ctx);
    let dependents = alias::flatten(query, &mut ctx);
    let main_alias = ctx.next();

    buf.push("WITH ");
    for dep in &dependents {
        buf.push_ident(&dep.alias)?.push(" AS (");
        StatementWriter::write(&dep.query, options, buf, true)?;
        buf.push("), ");
    }
    buf.push_ident(&main_alias)?.push(" AS (");
    StatementWriter::write(&query.clear(Clause::Append), options, buf, true)?;
    buf.push(") SELECT * FROM ");
    buf.push_ident(&main_alias)?;

    let mut guarded = false;
    for dep in dependents.iter().filter(|d| d.required) {
        buf.push(if guarded { " AND " } else { " WHERE " });
        buf.push("(CASE WHEN NOT EXISTS (SELECT 1 FROM ");
        buf.push_ident(&dep.alias)?;
        buf.push(&format!(") THEN (SELECT '{NOT_FOUND_MARKER}')::int END) IS NULL"));
        guarded = true;
    }
    Ok(guarded)
}

impl Query {
    /// Compile with default options.
    pub fn to_sql(&self) -> PgResult<CompiledQuery> {
        compile(self, &CompileOptions::default())
    }

    pub fn compile(&self, options: &CompileOptions) -> PgResult<CompiledQuery> {
        compile(self, options)
    }
}
