//! # sqlbridge
//!
//! Dialect-agnostic CRUD commands, executed locally over SQL or remotely
//! through an HTTP gateway.
//!
//! ## Features
//!
//! - **One command algebra**: `query` / `insert` / `update` / `delete`, raw `exec` statements and `bulk` batches
//! - **Two dialects**: MySQL (`?`, `ON DUPLICATE KEY UPDATE`) and PostgreSQL (`$n`, `ON CONFLICT`)
//! - **Transactional execution**: one transaction per call, batches are atomic
//! - **Row read-back**: INSERT/UPDATE return the written row, DELETE returns the removed rows
//! - **Polymorphic scanning**: into `Vec<T>`, `Option<T>`, [`First<T>`], JSON maps or raw [`Rows`]
//! - **Remote execution**: the same requests over HTTP, with retries on deadlocks and 5xx answers
//! - **Gateway**: validation against the live schema and per-resource context injection
//!
//! ## Example
//!
//! ```ignore
//! use sqlbridge::{Client, Context, PgDatabase, Predicate, SqlExecutor, bulk, insert, query};
//!
//! let client = Client::new(SqlExecutor::new(PgDatabase::connect(&database_url)?));
//! let ctx = Context::background();
//!
//! // SELECT * FROM resources WHERE age > $1 AND key = $2 ORDER BY key LIMIT 10
//! let rows: Vec<Resource> = client
//!     .fetch_all(
//!         &ctx,
//!         query("resources")
//!             .filter("key", "value")
//!             .filter("age", Predicate::gt(3))
//!             .order("key")
//!             .limit(10),
//!     )
//!     .await?;
//!
//! // INSERT ... ON CONFLICT (id) DO UPDATE SET key = EXCLUDED.key, then read the row back
//! let row: Resource = client
//!     .fetch_one(&ctx, insert("resources").value("key", "value").on_conflict_update(["key"]))
//!     .await?;
//!
//! // Both statements commit or neither does.
//! client
//!     .execute(&ctx, bulk([insert("a").value("x", 1).into(), insert("b").value("y", 2).into()]), None)
//!     .await?;
//! ```

pub mod codec;
pub mod command;
pub mod context;
pub mod db;
pub mod error;
pub mod exec;
pub mod format;
pub mod http;
pub mod intercept;
pub mod predicate;
pub mod scan;
pub mod schema;
pub mod trace;
pub mod validate;
pub mod value;

mod client;

pub use client::{Client, ClientConfig, OAuthConfig};
pub use command::{Action, Command, OnConflict, Request, Statement, bulk, delete, exec, insert, query, update};
pub use context::Context;
pub use db::{Database, Transaction};
pub use error::{Error, Result};
pub use exec::{DEFAULT_SCHEDULE, Executor, Retry, RetryConfig, SqlExecutor};
pub use format::Dialect;
pub use intercept::Interceptor;
pub use predicate::{Assign, Predicate, Values, Where};
pub use scan::{Column, First, RawValue, Rows, Scan, normalized_value};
pub use schema::{Columns, Schema};
pub use trace::{HeaderTracer, NoopTracer, SqlLogger, Tracer};
pub use validate::Validator;
pub use value::Value;

#[cfg(any(feature = "pool", feature = "http"))]
pub use client::AnyExecutor;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
mod pg;

#[cfg(feature = "pool")]
pub use pg::{PgDatabase, PgTransaction};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};

#[cfg(feature = "http")]
pub mod auth;

#[cfg(feature = "http")]
pub use auth::{ClientCredentials, StaticToken, TokenSource};

#[cfg(feature = "http")]
pub use exec::{HttpConfig, HttpExecutor};

#[cfg(feature = "server")]
mod server;

#[cfg(feature = "server")]
pub use server::Gateway;
