//! Flat key/value encoding of `Where` entries, and the JSON wire shape of requests.
//!
//! | Predicate          | Key suffix            | Value           |
//! |--------------------|-----------------------|-----------------|
//! | `Eq` .. `LtEq`     | `:eq` `:not_eq` ..    | scalar          |
//! | `Like`/`NotLike`   | `:like`/`:not_like`   | raw pattern     |
//! | `Is`/`IsNot`       | `:is`/`:is_not`       | scalar          |
//! | `In`/`NotIn`       | `:in`/`:not_in`       | comma-joined    |
//! | empty `In`/`NotIn` | `:in_empty`/`:not_in_empty` | empty     |
//! | `Btwn`/`NotBtwn`   | `:btwn`/`:not_btwn`   | `start,end`     |
//! | `Literal`          | none                  | verbatim        |
//!
//! Keys split on the last `:`, so column names containing `:` survive. A key
//! without a known suffix decodes as equality on the whole key. Values
//! containing `,` cannot travel inside `In`/`Btwn`.

use crate::command::{Action, Command, OnConflict, Request, Statement};
use crate::error::{Error, Result};
use crate::predicate::{Assign, Predicate, Values, Where};
use crate::value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Encode one `Where` entry as a `(key, value)` pair.
pub fn format(column: &str, predicate: &Predicate) -> (String, String) {
    let (suffix, value) = match predicate {
        Predicate::Eq(v) => ("eq", v.to_wire_string()),
        Predicate::NotEq(v) => ("not_eq", v.to_wire_string()),
        Predicate::Gt(v) => ("gt", v.to_wire_string()),
        Predicate::GtEq(v) => ("gt_eq", v.to_wire_string()),
        Predicate::Lt(v) => ("lt", v.to_wire_string()),
        Predicate::LtEq(v) => ("lt_eq", v.to_wire_string()),
        Predicate::Like(p) => ("like", p.clone()),
        Predicate::NotLike(p) => ("not_like", p.clone()),
        Predicate::Is(v) => ("is", v.to_wire_string()),
        Predicate::IsNot(v) => ("is_not", v.to_wire_string()),
        Predicate::In(vs) if vs.is_empty() => ("in_empty", String::new()),
        Predicate::NotIn(vs) if vs.is_empty() => ("not_in_empty", String::new()),
        Predicate::In(vs) => ("in", join_values(vs)),
        Predicate::NotIn(vs) => ("not_in", join_values(vs)),
        Predicate::Btwn { start, end } => (
            "btwn",
            format!("{},{}", start.to_wire_string(), end.to_wire_string()),
        ),
        Predicate::NotBtwn { start, end } => (
            "not_btwn",
            format!("{},{}", start.to_wire_string(), end.to_wire_string()),
        ),
        Predicate::Literal(sql) => return (column.to_string(), sql.clone()),
    };
    (format!("{column}:{suffix}"), value)
}

/// Decode a `(key, value)` pair back into a column and predicate.
///
/// Decoded scalars are always [`Value::Text`].
pub fn parse(key: &str, value: &str) -> Result<(String, Predicate)> {
    let Some((column, suffix)) = key.rsplit_once(':') else {
        return Ok((key.to_string(), Predicate::Eq(text(value))));
    };
    if column.is_empty() {
        return Ok((key.to_string(), Predicate::Eq(text(value))));
    }
    let predicate = match suffix {
        "eq" => Predicate::Eq(text(value)),
        "not_eq" => Predicate::NotEq(text(value)),
        "gt" => Predicate::Gt(text(value)),
        "gt_eq" => Predicate::GtEq(text(value)),
        "lt" => Predicate::Lt(text(value)),
        "lt_eq" => Predicate::LtEq(text(value)),
        "like" => Predicate::Like(value.to_string()),
        "not_like" => Predicate::NotLike(value.to_string()),
        "is" => Predicate::Is(text(value)),
        "is_not" => Predicate::IsNot(text(value)),
        "in" => Predicate::In(split_values(value)),
        "not_in" => Predicate::NotIn(split_values(value)),
        "in_empty" => Predicate::In(Vec::new()),
        "not_in_empty" => Predicate::NotIn(Vec::new()),
        "btwn" => {
            let (start, end) = split_range(key, value)?;
            Predicate::Btwn { start, end }
        }
        "not_btwn" => {
            let (start, end) = split_range(key, value)?;
            Predicate::NotBtwn { start, end }
        }
        _ => return Ok((key.to_string(), Predicate::Eq(text(value)))),
    };
    Ok((column.to_string(), predicate))
}

/// Encode a whole `Where` map, in column order.
pub fn encode_where(where_: &Where) -> Vec<(String, String)> {
    where_.iter().map(|(c, p)| format(c, p)).collect()
}

/// Decode `(key, value)` pairs into a `Where` map.
pub fn decode_where<I, K, V>(pairs: I) -> Result<Where>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut where_ = Where::new();
    for (k, v) in pairs {
        let (column, predicate) = parse(k.as_ref(), v.as_ref())?;
        where_.insert(column, predicate);
    }
    Ok(where_)
}

/// Split a comma-joined header/JSON list; the empty string is the empty list.
pub fn split_list(s: &str) -> Vec<String> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    s.split(',').map(|p| p.trim().to_string()).collect()
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_wire_string)
        .collect::<Vec<_>>()
        .join(",")
}

// Never empty: `""` is the one-element list `[""]`.
fn split_values(s: &str) -> Vec<Value> {
    s.split(',').map(text).collect()
}

fn split_range(key: &str, s: &str) -> Result<(Value, Value)> {
    s.split_once(',')
        .map(|(a, b)| (text(a), text(b)))
        .ok_or_else(|| Error::codec(format!("{key}: expected `start,end`, got {s:?}")))
}

// ===== JSON wire shape =====

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireCommand {
    action: String,
    resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    columns: String,
    #[serde(default, rename = "where", skip_serializing_if = "BTreeMap::is_empty")]
    where_: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    group_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    order: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    limit: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_conflict_update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_conflict_constraint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_conflict_ignore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    on_conflict_error: Option<String>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl From<&Command> for WireCommand {
    fn from(cmd: &Command) -> Self {
        let mut wire = WireCommand {
            action: cmd.action.as_str().to_string(),
            resource: cmd.resource.clone(),
            columns: cmd.columns.join(","),
            where_: encode_where(&cmd.where_).into_iter().collect(),
            values: cmd
                .values
                .iter()
                .map(|(k, a)| {
                    let v = match a {
                        Assign::Value(v) => v.clone(),
                        Assign::Literal(sql) => Value::Text(sql.clone()),
                    };
                    (k.clone(), v)
                })
                .collect(),
            group_by: cmd.group_by.join(","),
            order: cmd.order.join(","),
            limit: cmd.limit,
            offset: cmd.offset,
            ..Default::default()
        };
        match &cmd.on_conflict {
            Some(OnConflict::Update {
                columns,
                constraint,
            }) => {
                wire.on_conflict_update = Some(columns.join(","));
                wire.on_conflict_constraint = constraint.clone();
            }
            Some(OnConflict::Ignore(s)) => wire.on_conflict_ignore = Some(s.clone()),
            Some(OnConflict::Error(s)) => wire.on_conflict_error = Some(s.clone()),
            None => {}
        }
        wire
    }
}

impl TryFrom<WireCommand> for Command {
    type Error = Error;

    fn try_from(wire: WireCommand) -> Result<Self> {
        let action = Action::parse(&wire.action)
            .ok_or_else(|| Error::unsupported(format!("action {:?}", wire.action)))?;
        let on_conflict = match (
            wire.on_conflict_update,
            wire.on_conflict_ignore,
            wire.on_conflict_error,
        ) {
            (Some(cols), None, None) => Some(OnConflict::Update {
                columns: split_list(&cols),
                constraint: wire.on_conflict_constraint,
            }),
            (None, Some(s), None) => Some(OnConflict::Ignore(s)),
            (None, None, Some(s)) => Some(OnConflict::Error(s)),
            (None, None, None) => None,
            _ => return Err(Error::codec("at most one on_conflict_* entry is allowed")),
        };
        Ok(Command {
            action,
            resource: wire.resource,
            columns: split_list(&wire.columns),
            where_: decode_where(wire.where_)?,
            values: wire.values.into_iter().collect::<Values>(),
            group_by: split_list(&wire.group_by),
            order: split_list(&wire.order),
            limit: wire.limit,
            offset: wire.offset,
            on_conflict,
        })
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireCommand::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = WireCommand::deserialize(deserializer)?;
        Command::try_from(wire).map_err(serde::de::Error::custom)
    }
}

/// Body of a raw statement request (`POST /:exec`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireStatement {
    pub stmt: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// One item of a batch body. Batches do not nest on the wire.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum WireItem {
    Statement(WireStatement),
    Command(Command),
}

/// Body of a batch request (`POST /:batch`).
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireBatch {
    requests: Vec<WireItem>,
}

impl WireBatch {
    pub fn from_requests(requests: &[Request]) -> Result<Self> {
        let requests = requests
            .iter()
            .map(|r| match r {
                Request::Command(cmd) => Ok(WireItem::Command(cmd.clone())),
                Request::Statement(stmt) => Ok(WireItem::Statement(WireStatement {
                    stmt: stmt.sql.clone(),
                    args: stmt.args.clone(),
                })),
                Request::Batch(_) => Err(Error::unsupported("nested batch")),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { requests })
    }

    pub fn into_requests(self) -> Vec<Request> {
        self.requests
            .into_iter()
            .map(|item| match item {
                WireItem::Command(cmd) => Request::Command(cmd),
                WireItem::Statement(s) => Request::Statement(Statement::new(s.stmt, s.args)),
            })
            .collect()
    }
}

/// Encode a request as its JSON wire body.
pub fn to_json(request: &Request) -> Result<Vec<u8>> {
    let bytes = match request {
        Request::Command(cmd) => serde_json::to_vec(cmd)?,
        Request::Statement(stmt) => serde_json::to_vec(&WireStatement {
            stmt: stmt.sql.clone(),
            args: stmt.args.clone(),
        })?,
        Request::Batch(reqs) => serde_json::to_vec(&WireBatch::from_requests(reqs)?)?,
    };
    Ok(bytes)
}

/// Decode a JSON wire body of any request shape.
pub fn from_json(body: &[u8]) -> Result<Request> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Any {
        Batch(WireBatch),
        Item(WireItem),
    }

    let any: Any = serde_json::from_slice(body).map_err(|e| Error::codec(e.to_string()))?;
    Ok(match any {
        Any::Batch(batch) => Request::Batch(batch.into_requests()),
        Any::Item(WireItem::Command(cmd)) => Request::Command(cmd),
        Any::Item(WireItem::Statement(s)) => Request::Statement(Statement::new(s.stmt, s.args)),
    })
}

#[cfg(test)]
mod tests;
