//! Statement logging and outgoing-request trace propagation.

use crate::command::Statement;
use crate::context::Context;
use crate::format::Dialect;
use tracing::Level;

/// Emits one `tracing` event per statement handed to the driver (target `sqlbridge.sql`).
#[derive(Debug, Clone)]
pub struct SqlLogger {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl SqlLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    pub fn log(&self, dialect: Dialect, stmt: &Statement) {
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

        let sql = self.truncate_sql(&stmt.sql);
        emit_at_level!(
            self.level,
            target: "sqlbridge.sql",
            dialect = dialect.name(),
            param_count = stmt.args.len(),
            sql = %sql,
        );
    }
}

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Injects tracing metadata into outgoing gateway requests.
pub trait Tracer: Send + Sync {
    fn inject(&self, ctx: &Context, headers: &mut http::HeaderMap);
}

/// Adds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn inject(&self, _ctx: &Context, _headers: &mut http::HeaderMap) {}
}

/// Copies selected context values into request headers.
///
/// ```ignore
/// let tracer = HeaderTracer::new().map("request_id", "x-request-id");
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeaderTracer {
    mappings: Vec<(String, http::HeaderName)>,
}

impl HeaderTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send context value `key` as header `header`. Invalid header names are ignored.
    pub fn map(mut self, key: impl Into<String>, header: &str) -> Self {
        if let Ok(name) = http::HeaderName::from_bytes(header.as_bytes()) {
            self.mappings.push((key.into(), name));
        }
        self
    }
}

impl Tracer for HeaderTracer {
    fn inject(&self, ctx: &Context, headers: &mut http::HeaderMap) {
        for (key, name) in &self.mappings {
            let Some(value) = ctx.value(key) else {
                continue;
            };
            if let Ok(v) = http::HeaderValue::from_str(&value.to_wire_string()) {
                headers.insert(name.clone(), v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
        let logger = SqlLogger::new().max_sql_length(6);
        assert_eq!(logger.truncate_sql("SELECT * FROM t"), "SELECT...");
        assert_eq!(SqlLogger::new().no_truncate().truncate_sql("abc"), "abc");
    }

    #[test]
    fn header_tracer_copies_context_values() {
        let tracer = HeaderTracer::new()
            .map("request_id", "x-request-id")
            .map("missing", "x-missing")
            .map("bad", "not a header");
        let ctx = Context::background().with_value("request_id", "abc-123");
        let mut headers = http::HeaderMap::new();
        tracer.inject(&ctx, &mut headers);
        assert_eq!(headers["x-request-id"], "abc-123");
        assert!(!headers.contains_key("x-missing"));
        assert_eq!(headers.len(), 1);
    }
}
