//! Connection pools backing [`PgDatabase`](crate::PgDatabase).
//!
//! Every `execute` call pins one connection for the length of its transaction,
//! so the pool size caps how many requests reach the database at once.

use crate::error::{Error, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
use tokio_postgres::NoTls;
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Connections held by [`create_pool`].
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Plain-TCP pool for `database_url` with [`DEFAULT_POOL_SIZE`] connections.
///
/// ```ignore
/// let db = sqlbridge::PgDatabase::new(sqlbridge::create_pool(&database_url)?);
/// ```
pub fn create_pool(database_url: &str) -> Result<Pool> {
    create_pool_with_config(database_url, DEFAULT_POOL_SIZE)
}

/// Plain-TCP pool holding at most `max_size` connections.
pub fn create_pool_with_config(database_url: &str, max_size: usize) -> Result<Pool> {
    if max_size == 0 {
        return Err(Error::Pool("pool size must be at least 1".to_string()));
    }
    create_pool_with_manager_config(database_url, NoTls, default_manager_config(), |builder| {
        builder.max_size(max_size)
    })
}

/// Pool over a caller-supplied TLS connector and manager settings.
///
/// `configure_pool` sees the builder last, so it can override the size and
/// timeouts chosen here.
pub fn create_pool_with_manager_config<T>(
    database_url: &str,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> Result<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| Error::Connection(e.to_string()))?;

    let mgr = Manager::from_config(pg_config, tls, manager_config);
    configure_pool(Pool::builder(mgr))
        .build()
        .map_err(|e| Error::Pool(e.to_string()))
}

// Transactions end in COMMIT or ROLLBACK before their connection is released
// (see `PgTransaction`'s drop), so a returned connection needs no probe query.
fn default_manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}
