//! Convenient imports for typical `pgquery` usage.
//!
//! ```ignore
//! use pgquery::prelude::*;
//! ```

pub use crate::{
    Condition, Driver, FromRow, Order, PgError, PgResult, Query, Record, Row, Table, Value, raw,
    template, transaction, unsafe_sql,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
