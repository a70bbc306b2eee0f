//! Requests ↔ HTTP messages for the gateway protocol.
//!
//! | Request | Method | Path | Query | Body |
//! |---|---|---|---|---|
//! | QUERY | GET | `<base>/<resource>` | `Where` | none |
//! | DELETE | DELETE | `<base>/<resource>` | `Where` | none |
//! | INSERT | POST | `<base>/<resource>` | none | `Values` |
//! | UPDATE | PUT | `<base>/<resource>` | `Where` | `Values` |
//! | Statement | POST | `<base>/:exec` | none | `{"stmt", "args"}` |
//! | Batch | POST | `<base>/:batch` | none | `{"requests": [...]}` |
//!
//! Modifiers travel in `X-*` headers; see the constants below.

mod format;
mod parse;


pub use format::format_request;
pub use parse::{parse_parts, parse_request};

pub const ORDER_BY: &str = "x-order-by";
pub const LIMIT: &str = "x-limit";
pub const OFFSET: &str = "x-offset";
pub const COLUMNS: &str = "x-columns";
pub const GROUP_BY: &str = "x-group-by";
pub const ON_CONFLICT_UPDATE: &str = "x-on-conflict-update";
pub const ON_CONFLICT_CONSTRAINT: &str = "x-on-conflict-constraint";
pub const ON_CONFLICT_IGNORE: &str = "x-on-conflict-ignore";
pub const ON_CONFLICT_ERROR: &str = "x-on-conflict-error";

/// Reserved final path segment of a raw statement.
pub const EXEC_SEGMENT: &str = ":exec";
/// Reserved final path segment of a batch.
pub const BATCH_SEGMENT: &str = ":batch";
