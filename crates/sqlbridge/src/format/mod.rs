//! Command → parameterized SQL for a target dialect.
//!
//! Both dialects share one skeleton; they differ in placeholder style, INSERT
//! shape, conflict clauses and (for PostgreSQL) how ORDER BY/LIMIT attach to
//! DELETE and UPDATE.
//!
//! ```ignore
//! use sqlbridge::{query, Dialect};
//!
//! let stmt = Dialect::Postgres.format(&query("resources").filter("key", "value").limit(1))?;
//! assert_eq!(stmt.sql, "SELECT * FROM resources WHERE key = $1 LIMIT 1");
//! ```

mod mysql;
mod postgres;

#[cfg(test)]
mod tests;

use crate::command::{Action, Command, Statement};
use crate::error::{Error, Result};
use crate::predicate::{Assign, Predicate, Where};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete SQL variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `?` placeholders, `ON DUPLICATE KEY UPDATE`.
    #[serde(alias = "mariadb")]
    MySql,
    /// `$n` placeholders, `ON CONFLICT`.
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
        }
    }

    /// Parse a dialect name (`mysql`, `mariadb`, `postgres`, `postgresql`, `pg`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "postgres" | "postgresql" | "pg" => Some(Dialect::Postgres),
            _ => None,
        }
    }

    /// Format a command into SQL text plus arguments.
    pub fn format(&self, cmd: &Command) -> Result<Statement> {
        let mut w = SqlWriter::new(*self);
        match cmd.action {
            Action::Query => w.select(cmd),
            Action::Delete => match self {
                Dialect::MySql => w.delete_limited(cmd),
                Dialect::Postgres => postgres::delete(&mut w, cmd),
            },
            Action::Insert => match self {
                Dialect::MySql => mysql::insert(&mut w, cmd),
                Dialect::Postgres => postgres::insert(&mut w, cmd),
            },
            Action::Update => {
                if cmd.values.is_empty() {
                    return Err(Error::validation("values", "UPDATE requires at least one value"));
                }
                match self {
                    Dialect::MySql => w.update_limited(cmd),
                    Dialect::Postgres => postgres::update(&mut w, cmd),
                }
            }
        }
        Ok(w.finish())
    }

    /// Format an INSERT that hands back the rows it wrote.
    ///
    /// `None` when the dialect has no `RETURNING`; callers then read the row
    /// back through the id the driver reports for the statement.
    pub fn format_insert_returning(&self, cmd: &Command) -> Result<Option<Statement>> {
        match self {
            Dialect::MySql => Ok(None),
            Dialect::Postgres => {
                let mut stmt = self.format(cmd)?;
                stmt.sql.push_str(" RETURNING *");
                Ok(Some(stmt))
            }
        }
    }

    /// Whether a driver error code is this dialect's deadlock signal.
    pub fn is_deadlock(&self, code: &str) -> bool {
        match self {
            Dialect::MySql => code == mysql::DEADLOCK_CODE,
            Dialect::Postgres => code == postgres::DEADLOCK_SQLSTATE,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accumulates SQL text and arguments; every placeholder it hands out has an argument.
pub(crate) struct SqlWriter {
    dialect: Dialect,
    sql: String,
    args: Vec<Value>,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    /// Append an argument and return its placeholder.
    fn bind(&mut self, value: Value) -> String {
        self.args.push(value.into_arg());
        match self.dialect {
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${}", self.args.len()),
        }
    }

    fn assign(&mut self, value: &Assign) -> String {
        match value {
            Assign::Value(v) => self.bind(v.clone()),
            Assign::Literal(sql) => sql.clone(),
        }
    }

    fn select(&mut self, cmd: &Command) {
        let columns = if cmd.columns.is_empty() {
            "*".to_string()
        } else {
            cmd.columns.join(", ")
        };
        self.push(&format!("SELECT {} FROM {}", columns, cmd.resource));
        self.where_clause(&cmd.where_);
        self.group_by(&cmd.group_by);
        self.order_by(&cmd.order);
        self.limit(cmd.limit);
        self.offset(cmd.offset);
    }

    fn delete_limited(&mut self, cmd: &Command) {
        self.push(&format!("DELETE FROM {}", cmd.resource));
        self.where_clause(&cmd.where_);
        self.order_by(&cmd.order);
        self.limit(cmd.limit);
    }

    fn set_list(&mut self, cmd: &Command) {
        let sets: Vec<String> = cmd
            .values
            .iter()
            .map(|(col, v)| format!("{} = {}", col, self.assign(v)))
            .collect();
        self.push(&sets.join(", "));
    }

    fn update_limited(&mut self, cmd: &Command) {
        self.push(&format!("UPDATE {} SET ", cmd.resource));
        self.set_list(cmd);
        self.where_clause(&cmd.where_);
        self.order_by(&cmd.order);
        self.limit(cmd.limit);
    }

    fn where_clause(&mut self, where_: &Where) {
        if where_.is_empty() {
            return;
        }
        let conditions: Vec<String> = where_
            .iter()
            .map(|(col, p)| self.condition(col, p))
            .collect();
        self.push(" WHERE ");
        self.push(&conditions.join(" AND "));
    }

    fn condition(&mut self, col: &str, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Eq(v) => format!("{} = {}", col, self.bind(v.clone())),
            Predicate::NotEq(v) => format!("{} != {}", col, self.bind(v.clone())),
            Predicate::Gt(v) => format!("{} > {}", col, self.bind(v.clone())),
            Predicate::GtEq(v) => format!("{} >= {}", col, self.bind(v.clone())),
            Predicate::Lt(v) => format!("{} < {}", col, self.bind(v.clone())),
            Predicate::LtEq(v) => format!("{} <= {}", col, self.bind(v.clone())),
            Predicate::Like(p) => {
                format!("{} LIKE {}", col, self.bind(Value::Text(format!("%{p}%"))))
            }
            Predicate::NotLike(p) => format!(
                "{} NOT LIKE {}",
                col,
                self.bind(Value::Text(format!("%{p}%")))
            ),
            Predicate::Is(_) => format!("{col} IS NULL"),
            Predicate::IsNot(_) => format!("{col} IS NOT NULL"),
            Predicate::In(vs) if vs.is_empty() => "1 = 0".to_string(),
            Predicate::In(vs) => format!("{} IN ({})", col, self.bind_list(vs)),
            Predicate::NotIn(vs) if vs.is_empty() => "1 = 1".to_string(),
            Predicate::NotIn(vs) => format!("{} NOT IN ({})", col, self.bind_list(vs)),
            Predicate::Btwn { start, end } => {
                let a = self.bind(start.clone());
                let b = self.bind(end.clone());
                format!("{col} BETWEEN {a} AND {b}")
            }
            Predicate::NotBtwn { start, end } => {
                let a = self.bind(start.clone());
                let b = self.bind(end.clone());
                format!("{col} NOT BETWEEN {a} AND {b}")
            }
            Predicate::Literal(sql) => format!("{col} = {sql}"),
        }
    }

    fn bind_list(&mut self, values: &[Value]) -> String {
        values
            .iter()
            .map(|v| self.bind(v.clone()))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn group_by(&mut self, columns: &[String]) {
        if !columns.is_empty() {
            self.push(&format!(" GROUP BY {}", columns.join(", ")));
        }
    }

    fn order_by(&mut self, order: &[String]) {
        if !order.is_empty() {
            self.push(&format!(" ORDER BY {}", order.join(", ")));
        }
    }

    fn limit(&mut self, limit: u64) {
        if limit > 0 {
            self.push(&format!(" LIMIT {limit}"));
        }
    }

    fn offset(&mut self, offset: u64) {
        if offset > 0 {
            self.push(&format!(" OFFSET {offset}"));
        }
    }
}
