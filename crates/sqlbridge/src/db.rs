//! Driver seam for the SQL executor.
//!
//! A [`Database`] hands out one [`Transaction`] per top-level `execute` call.
//! Implementations own connection acquisition; the executor owns commit and
//! rollback.

use crate::command::Statement;
use crate::error::Result;
use crate::format::Dialect;
use crate::scan::Rows;
use std::future::Future;

/// A shared database handle.
pub trait Database: Send + Sync {
    type Tx: Transaction;

    /// The SQL dialect statements must be formatted in.
    fn dialect(&self) -> Dialect;

    /// Start a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send;
}

/// One open transaction.
///
/// Dropping a transaction that was neither committed nor rolled back must
/// roll it back.
pub trait Transaction: Send {
    /// Run a row-returning statement and fetch every row.
    fn query(&mut self, stmt: &Statement) -> impl Future<Output = Result<Rows>> + Send;

    /// Run a statement and return the affected row count.
    fn execute(&mut self, stmt: &Statement) -> impl Future<Output = Result<u64>> + Send;

    /// The id generated by the INSERT just executed, if it generated one.
    ///
    /// Only consulted for dialects without `RETURNING`; the default reports none.
    fn last_insert_id(&mut self) -> impl Future<Output = Result<Option<i64>>> + Send {
        async { Ok(None) }
    }

    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}
