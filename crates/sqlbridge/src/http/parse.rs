use super::*;
use crate::codec::{self, WireBatch, WireStatement};
use crate::command::{Action, Command, OnConflict, Request, Statement};
use crate::error::{Error, Result};
use crate::predicate::Values;
use crate::value::Value;
use http::{HeaderMap, Method, Uri};
use std::collections::BTreeMap;

/// Parse a gateway request back into the [`Request`] it was formatted from.
pub fn parse_request(req: &http::Request<Vec<u8>>) -> Result<Request> {
    parse_parts(req.method(), req.uri(), req.headers(), req.body())
}

/// Parse from the request's parts; the gateway calls this with a collected body.
pub fn parse_parts(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Result<Request> {
    let segment = uri.path().rsplit('/').next().unwrap_or_default();
    match segment {
        EXEC_SEGMENT => {
            require_post(method, segment)?;
            let stmt: WireStatement = serde_json::from_slice(body).map_err(|e| Error::codec(e.to_string()))?;
            Ok(Request::Statement(Statement::new(stmt.stmt, stmt.args)))
        }
        BATCH_SEGMENT => {
            require_post(method, segment)?;
            let batch: WireBatch = serde_json::from_slice(body).map_err(|e| Error::codec(e.to_string()))?;
            Ok(Request::Batch(batch.into_requests()))
        }
        "" => Err(Error::codec("missing resource in path")),
        resource => parse_command(method, resource, uri, headers, body).map(Request::Command),
    }
}

fn require_post(method: &Method, segment: &str) -> Result<()> {
    if *method != Method::POST {
        return Err(Error::unsupported(format!("{method} {segment}")));
    }
    Ok(())
}

fn parse_command(
    method: &Method,
    resource: &str,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Command> {
    let action = match *method {
        Method::GET => Action::Query,
        Method::DELETE => Action::Delete,
        Method::POST => Action::Insert,
        Method::PUT => Action::Update,
        ref other => return Err(Error::unsupported(format!("method {other}"))),
    };

    let mut cmd = Command::new(action, resource);
    if let Some(query) = uri.query() {
        cmd.where_ = codec::decode_where(url::form_urlencoded::parse(query.as_bytes()))?;
    }
    cmd.order = list(headers, ORDER_BY)?;
    cmd.columns = list(headers, COLUMNS)?;
    cmd.group_by = list(headers, GROUP_BY)?;
    cmd.limit = number(headers, LIMIT)?;
    cmd.offset = number(headers, OFFSET)?;
    cmd.on_conflict = on_conflict(headers)?;

    if matches!(action, Action::Insert | Action::Update) && !body.is_empty() {
        let values: BTreeMap<String, Value> =
            serde_json::from_slice(body).map_err(|e| Error::codec(format!("values: {e}")))?;
        cmd.values = values.into_iter().collect::<Values>();
    }
    Ok(cmd)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| Error::codec(format!("{name}: header is not visible ASCII")))
        })
        .transpose()
}

fn list(headers: &HeaderMap, name: &str) -> Result<Vec<String>> {
    Ok(header(headers, name)?.map(codec::split_list).unwrap_or_default())
}

fn number(headers: &HeaderMap, name: &str) -> Result<u64> {
    match header(headers, name)? {
        None => Ok(0),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::codec(format!("{name}: expected a non-negative integer, got {v:?}"))),
    }
}

fn on_conflict(headers: &HeaderMap) -> Result<Option<OnConflict>> {
    let update = header(headers, ON_CONFLICT_UPDATE)?;
    let ignore = header(headers, ON_CONFLICT_IGNORE)?;
    let error = header(headers, ON_CONFLICT_ERROR)?;
    let constraint = header(headers, ON_CONFLICT_CONSTRAINT)?;
    Ok(match (update, ignore, error) {
        (Some(cols), None, None) => Some(OnConflict::Update {
            columns: codec::split_list(cols),
            constraint: constraint.map(str::to_string),
        }),
        (None, Some(s), None) => Some(OnConflict::Ignore(s.to_string())),
        (None, None, Some(s)) => Some(OnConflict::Error(s.to_string())),
        (None, None, None) => None,
        _ => return Err(Error::codec("at most one x-on-conflict-* header is allowed")),
    })
}
