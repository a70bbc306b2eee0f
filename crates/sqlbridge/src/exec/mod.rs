//! Executors: run a [`Request`] and optionally scan the terminal rows.
//!
//! Every executor reports failure as an [`Error`](crate::Error); whether the call
//! may be retried is [`Error::is_retryable`](crate::Error::is_retryable).

#[cfg(feature = "http")]
mod http;
mod retry;
mod sql;


#[cfg(feature = "http")]
pub use self::http::{HttpConfig, HttpExecutor};
pub use retry::{DEFAULT_SCHEDULE, Retry, RetryConfig};
pub use sql::SqlExecutor;

use crate::command::Request;
use crate::context::Context;
use crate::error::Result;
use crate::scan::Scan;
use std::future::Future;
use std::sync::Arc;

/// Runs requests.
///
/// `dest` receives the rows of the last command (for a batch, the last request).
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        ctx: &Context,
        req: &Request,
        dest: Option<&mut dyn Scan>,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<E: Executor> Executor for Arc<E> {
    fn execute(
        &self,
        ctx: &Context,
        req: &Request,
        dest: Option<&mut dyn Scan>,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).execute(ctx, req, dest)
    }
}
