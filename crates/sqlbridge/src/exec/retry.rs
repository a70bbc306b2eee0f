use super::Executor;
use crate::command::Request;
use crate::context::Context;
use crate::error::Result;
use crate::scan::Scan;
use std::time::Duration;

/// Sleep before each attempt, in seconds.
pub const DEFAULT_SCHEDULE: [u64; 10] = [0, 1, 2, 5, 10, 30, 60, 120, 300, 600];

/// Retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before each attempt; its length is the attempt budget.
    pub schedule: Vec<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            schedule: DEFAULT_SCHEDULE.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the delay schedule.
    pub fn schedule(mut self, schedule: impl IntoIterator<Item = Duration>) -> Self {
        self.schedule = schedule.into_iter().collect();
        self
    }

    /// Keep only the first `n` attempts.
    pub fn max_attempts(mut self, n: usize) -> Self {
        self.schedule.truncate(n.max(1));
        self
    }
}

/// Wraps an executor, retrying calls whose error is retryable.
///
/// Sleeps observe the context's cancellation.
#[derive(Debug, Clone)]
pub struct Retry<E> {
    inner: E,
    config: RetryConfig,
}

impl<E: Executor> Retry<E> {
    pub fn new(inner: E) -> Self {
        Self::with_config(inner, RetryConfig::default())
    }

    pub fn with_config(inner: E, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Executor> Executor for Retry<E> {
    async fn execute(
        &self,
        ctx: &Context,
        req: &Request,
        mut dest: Option<&mut dyn Scan>,
    ) -> Result<()> {
        let attempts = self.config.schedule.len().max(1);
        let mut attempt = 0;
        loop {
            let delay = self
                .config
                .schedule
                .get(attempt)
                .copied()
                .unwrap_or_default();
            ctx.sleep(delay).await?;

            let scan = dest.as_mut().map(|d| &mut **d as &mut dyn Scan);
            let res = self.inner.execute(ctx, req, scan).await;
            attempt += 1;
            let (action, resource) = summary(req);
            match res {
                Ok(()) => {
                    tracing::info!(
                        target: "sqlbridge.client",
                        kind = req.kind(),
                        action,
                        resource,
                        attempt,
                        "request succeeded"
                    );
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        target: "sqlbridge.client",
                        kind = req.kind(),
                        action,
                        resource,
                        attempt,
                        retryable = true,
                        error = %e,
                        "request failed, retrying"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        target: "sqlbridge.client",
                        kind = req.kind(),
                        action,
                        resource,
                        attempt,
                        retryable = e.is_retryable(),
                        error = %e,
                        "request failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}

fn summary(req: &Request) -> (&'static str, &str) {
    match req.last_command() {
        Some(cmd) => (cmd.action.as_str(), cmd.resource.as_str()),
        None => ("-", "-"),
    }
}
