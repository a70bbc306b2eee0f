//! The request algebra: commands, raw statements and batches.
//!
//! ```ignore
//! use sqlbridge::{query, insert, bulk, Predicate};
//!
//! let q = query("resources")
//!     .filter("key", "value")
//!     .order("key")
//!     .limit(1)
//!     .offset(10);
//!
//! let i = insert("resources")
//!     .value("key", "value")
//!     .on_conflict_update(["key"]);
//!
//! let b = bulk([q.into(), i.into()]);
//! ```

use crate::predicate::{Assign, Predicate, Values, Where};
use crate::value::Value;
use std::fmt;

/// The four CRUD actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Query,
    Delete,
    Insert,
    Update,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Query => "QUERY",
            Action::Delete => "DELETE",
            Action::Insert => "INSERT",
            Action::Update => "UPDATE",
        }
    }

    /// Parse the wire name. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUERY" => Some(Action::Query),
            "DELETE" => Some(Action::Delete),
            "INSERT" => Some(Action::Insert),
            "UPDATE" => Some(Action::Update),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conflict resolution for INSERT.
#[derive(Debug, Clone, PartialEq)]
pub enum OnConflict {
    /// Overwrite the listed columns with the incoming values.
    ///
    /// `constraint` names the PostgreSQL conflict target; `id` when absent.
    Update {
        columns: Vec<String>,
        constraint: Option<String>,
    },
    /// Swallow the conflict. `"true"` means "key on id", anything else names the column.
    Ignore(String),
    /// Let the duplicate-key error surface.
    Error(String),
}

/// One CRUD operation against a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: Action,
    pub resource: String,
    pub columns: Vec<String>,
    pub where_: Where,
    pub values: Values,
    pub group_by: Vec<String>,
    pub order: Vec<String>,
    pub limit: u64,
    pub offset: u64,
    pub on_conflict: Option<OnConflict>,
}

impl Command {
    pub fn new(action: Action, resource: impl Into<String>) -> Self {
        Self {
            action,
            resource: resource.into(),
            columns: Vec::new(),
            where_: Where::new(),
            values: Values::new(),
            group_by: Vec::new(),
            order: Vec::new(),
            limit: 0,
            offset: 0,
            on_conflict: None,
        }
    }

    /// Add a `Where` entry. A bare scalar means equality.
    pub fn filter(mut self, column: impl Into<String>, predicate: impl Into<Predicate>) -> Self {
        self.where_.insert(column, predicate);
        self
    }

    /// Replace the whole `Where` map.
    pub fn where_(mut self, where_: Where) -> Self {
        self.where_ = where_;
        self
    }

    /// Add one assignment.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Assign>) -> Self {
        self.values.insert(column, value);
        self
    }

    /// Add one inlined SQL assignment.
    pub fn value_literal(mut self, column: impl Into<String>, sql: impl Into<String>) -> Self {
        self.values.insert(column, Assign::Literal(sql.into()));
        self
    }

    /// Replace the whole `Values` map.
    pub fn values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    /// Restrict the select list (default `*`).
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append an order term of shape `<column>[ ASC|DESC]`.
    pub fn order(mut self, term: impl Into<String>) -> Self {
        self.order.push(term.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn on_conflict_update<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_conflict = Some(OnConflict::Update {
            columns: columns.into_iter().map(Into::into).collect(),
            constraint: None,
        });
        self
    }

    /// Name the PostgreSQL conflict target of an `on_conflict_update`.
    pub fn on_conflict_constraint(mut self, constraint: impl Into<String>) -> Self {
        match &mut self.on_conflict {
            Some(OnConflict::Update { constraint: c, .. }) => *c = Some(constraint.into()),
            _ => {
                self.on_conflict = Some(OnConflict::Update {
                    columns: Vec::new(),
                    constraint: Some(constraint.into()),
                })
            }
        }
        self
    }

    pub fn on_conflict_ignore(mut self, sentinel: impl Into<String>) -> Self {
        self.on_conflict = Some(OnConflict::Ignore(sentinel.into()));
        self
    }

    pub fn on_conflict_error(mut self, sentinel: impl Into<String>) -> Self {
        self.on_conflict = Some(OnConflict::Error(sentinel.into()));
        self
    }
}

/// Build a QUERY command.
pub fn query(resource: impl Into<String>) -> Command {
    Command::new(Action::Query, resource)
}

/// Build a DELETE command.
pub fn delete(resource: impl Into<String>) -> Command {
    Command::new(Action::Delete, resource)
}

/// Build an INSERT command.
pub fn insert(resource: impl Into<String>) -> Command {
    Command::new(Action::Insert, resource)
}

/// Build an UPDATE command.
pub fn update(resource: impl Into<String>) -> Command {
    Command::new(Action::Update, resource)
}

/// Dialect-formatted SQL plus its positional arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Build a raw statement (DDL, internal re-entry). Bypasses formatting.
pub fn exec<I, V>(sql: impl Into<String>, args: I) -> Request
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Request::Statement(Statement::new(
        sql,
        args.into_iter().map(Into::into).collect(),
    ))
}

/// Build a batch executed in one transaction.
pub fn bulk(requests: impl IntoIterator<Item = Request>) -> Request {
    Request::Batch(requests.into_iter().collect())
}

/// What a caller hands to an executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Command(Command),
    Statement(Statement),
    /// Flat list; only the last request's rows reach the destination.
    Batch(Vec<Request>),
}

impl Request {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Command(_) => "command",
            Request::Statement(_) => "statement",
            Request::Batch(_) => "batch",
        }
    }

    /// The command this request ends with, if any.
    pub fn last_command(&self) -> Option<&Command> {
        match self {
            Request::Command(cmd) => Some(cmd),
            Request::Statement(_) => None,
            Request::Batch(reqs) => reqs.last().and_then(Request::last_command),
        }
    }
}

impl From<Command> for Request {
    fn from(cmd: Command) -> Self {
        Request::Command(cmd)
    }
}

impl From<Statement> for Request {
    fn from(stmt: Statement) -> Self {
        Request::Statement(stmt)
    }
}
