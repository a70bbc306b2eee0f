//! Per-call context: cancellation plus request-scoped values.

use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Carried through every `execute` call.
///
/// Cancelling the token aborts in-flight database/HTTP I/O and retry sleeps
/// with [`Error::Cancelled`]. Values feed the interceptor and tracer.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    values: Arc<HashMap<String, Value>>,
}

impl Context {
    /// A context that is never cancelled and carries no values.
    pub fn background() -> Self {
        Self::default()
    }

    /// Use an existing token (e.g. a server shutdown token).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attach a value, returning the new context.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into());
        self
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` unless the context is cancelled first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            res = fut => res,
        }
    }

    /// Sleep for `duration` unless the context is cancelled first.
    pub async fn sleep(&self, duration: std::time::Duration) -> Result<()> {
        if duration.is_zero() {
            return if self.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                Ok(())
            };
        }
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
