//! # pgquery
//!
//! Immutable PostgreSQL query descriptors, a parameterized SQL compiler and a
//! savepoint-aware transaction manager.
//!
//! ## Features
//!
//! - **Immutable descriptors**: every builder call returns a new [`Query`]
//!   sharing unchanged clauses with its parent
//! - **Positional parameters**: values never end up in SQL text; `$n`
//!   numbering is done in one pass over the final statement
//! - **Safe defaults**: UPDATE/DELETE require WHERE or an explicit `all()`
//! - **Default scopes and soft delete** applied exactly once, even through
//!   subqueries and CTEs
//! - **Appended queries**: dependent statements run in the same round trip as
//!   CTEs aliased `q`, `q2`, ...
//! - **Transactions**: closure-based, nested through savepoints, plus a
//!   rollback-only harness for tests
//!
//! ## Example
//!
//! ```ignore
//! use pgquery::{Record, Table, transaction};
//!
//! let users = Table::new("user").soft_delete("deletedAt").snake_case(true);
//!
//! // SELECT "user"."id", "user"."first_name" AS "firstName" FROM "user"
//! //   WHERE "user"."id" = $1 AND "user"."deleted_at" IS NULL LIMIT $2
//! let q = users.query().select(["id", "firstName"]).eq("id", 1).take();
//! let user: Row = q.fetch_one(&client).await?;
//!
//! transaction(&client, async |tx| {
//!     users.query().eq("id", 1).set("name", "Ann").execute(tx).await?;
//!     users.query().eq("id", 2).delete().execute(tx).await
//! })
//! .await?;
//! ```

pub mod alias;
pub mod compile;
pub mod driver;
pub mod error;
pub mod exec;
pub mod expr;
pub mod ident;
pub mod query;
pub mod raw;
pub mod testing;
pub mod transaction;
pub mod value;

mod sql_buf;

#[cfg(feature = "tracing")]
pub mod log;

#[cfg(feature = "pool")]
pub mod pool;

pub mod prelude;

pub use alias::AliasContext;
pub use compile::{CompileOptions, CompiledQuery, MAX_PARAMS, compile};
pub use driver::{Driver, FromRow, QueryOutput, Row};
pub use error::{PgError, PgResult};
pub use exec::QueryResult;
pub use expr::{
    Aggregate, CompareOp, ConflictAction, Condition, Cte, CteBody, Direction, Distinct,
    InsertSource, Join, JoinKind, JoinSource, Lock, LockMode, LockTable, Mutation, Nulls,
    OnConflict, Operand, Order, OrderTarget, Record, SelectItem, SetOp, SetOpKind, SetValue,
    WaitPolicy, WindowSpec, col,
};
pub use ident::{ColumnRef, Naming, quote, quote_path};
pub use query::{Clause, DELETED_SCOPE, Query, QueryData, ReturnKind, Source, Table};
pub use raw::{Arg, RawSql, Unsafe, raw, template, unsafe_sql};
pub use testing::{RecordedCall, RecordingDriver, TestTransaction};
pub use transaction::{
    Savepoint, Transaction, TransactionHandle, TransactionIsolation, TransactionOptions,
    transaction, transaction_with,
};
pub use value::{FromValue, Value};

#[cfg(feature = "tracing")]
pub use log::{LogConfig, LoggingDriver};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config};
