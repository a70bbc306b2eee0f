use super::*;
use crate::codec::{self, WireBatch, WireStatement};
use crate::command::{Action, Command, OnConflict, Request};
use crate::error::{Error, Result};
use crate::predicate::Assign;
use crate::value::Value;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use std::collections::BTreeMap;
use url::Url;

/// Build the HTTP request for `req` against the gateway at `base`.
pub fn format_request(base: &Url, req: &Request) -> Result<http::Request<Vec<u8>>> {
    match req {
        Request::Command(cmd) => format_command(base, cmd),
        Request::Statement(stmt) => {
            let body = serde_json::to_vec(&WireStatement {
                stmt: stmt.sql.clone(),
                args: stmt.args.clone(),
            })?;
            build(Method::POST, endpoint(base, EXEC_SEGMENT)?, HeaderMap::new(), Some(body))
        }
        Request::Batch(reqs) => {
            let body = serde_json::to_vec(&WireBatch::from_requests(reqs)?)?;
            build(Method::POST, endpoint(base, BATCH_SEGMENT)?, HeaderMap::new(), Some(body))
        }
    }
}

fn format_command(base: &Url, cmd: &Command) -> Result<http::Request<Vec<u8>>> {
    let method = match cmd.action {
        Action::Query => Method::GET,
        Action::Delete => Method::DELETE,
        Action::Insert => Method::POST,
        Action::Update => Method::PUT,
    };

    let mut url = endpoint(base, &cmd.resource)?;
    let pairs = codec::encode_where(&cmd.where_);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    let mut headers = HeaderMap::new();
    put_list(&mut headers, ORDER_BY, &cmd.order)?;
    put_list(&mut headers, COLUMNS, &cmd.columns)?;
    put_list(&mut headers, GROUP_BY, &cmd.group_by)?;
    if cmd.limit > 0 {
        put(&mut headers, LIMIT, &cmd.limit.to_string())?;
    }
    if cmd.offset > 0 {
        put(&mut headers, OFFSET, &cmd.offset.to_string())?;
    }
    match &cmd.on_conflict {
        Some(OnConflict::Update {
            columns,
            constraint,
        }) => {
            put(&mut headers, ON_CONFLICT_UPDATE, &columns.join(","))?;
            if let Some(c) = constraint {
                put(&mut headers, ON_CONFLICT_CONSTRAINT, c)?;
            }
        }
        Some(OnConflict::Ignore(s)) => put(&mut headers, ON_CONFLICT_IGNORE, s)?,
        Some(OnConflict::Error(s)) => put(&mut headers, ON_CONFLICT_ERROR, s)?,
        None => {}
    }

    let body = match method {
        Method::POST | Method::PUT => {
            let values: BTreeMap<&str, Value> = cmd
                .values
                .iter()
                .map(|(k, a)| {
                    let v = match a {
                        Assign::Value(v) => v.clone(),
                        Assign::Literal(sql) => Value::Text(sql.clone()),
                    };
                    (k.as_str(), v)
                })
                .collect();
            Some(serde_json::to_vec(&values)?)
        }
        _ => None,
    };

    build(method, url, headers, body)
}

/// `base` with `segment` appended as the final path segment.
fn endpoint(base: &Url, segment: &str) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| Error::codec(format!("cannot append a path to {base}")))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

fn put(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| Error::codec(format!("{name}: invalid header value {value:?}")))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

fn put_list(headers: &mut HeaderMap, name: &'static str, items: &[String]) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    put(headers, name, &items.join(","))
}

fn build(
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
) -> Result<http::Request<Vec<u8>>> {
    let has_body = body.is_some();
    let mut req = http::Request::builder()
        .method(method)
        .uri(url.as_str())
        .body(body.unwrap_or_default())
        .map_err(|e| Error::codec(e.to_string()))?;
    *req.headers_mut() = headers;
    if has_body {
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    Ok(req)
}
