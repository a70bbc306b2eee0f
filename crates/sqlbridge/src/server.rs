//! The gateway side of the HTTP wire protocol.
//!
//! [`Gateway::handle`] turns one wire request into a [`Request`], runs it
//! through the interceptor, the validator and an executor, and answers with a
//! JSON array of the terminal rows. [`Gateway::serve`] adapts it to hyper.
//!
//! | Outcome | Status |
//! |---|---|
//! | success | 200, `application/json` array |
//! | retryable failure (deadlock, upstream transport) | 503 |
//! | anything else | 400, error text |

use crate::context::Context;
use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::http::parse_parts;
use crate::intercept::Interceptor;
use crate::schema::Schema;
use crate::validate::{Validator, reject_statements};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::{BodyExt, Full};
use std::convert::Infallible;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

type Record = serde_json::Map<String, serde_json::Value>;

/// Serves wire requests against an executor.
#[derive(Debug)]
pub struct Gateway<E> {
    exec: E,
    interceptor: Option<Interceptor>,
    validator: Option<(Validator, Schema)>,
    allow_statements: Option<bool>,
    context_headers: Vec<(HeaderName, String)>,
    shutdown: CancellationToken,
}

impl<E: Executor> Gateway<E> {
    pub fn new(exec: E) -> Self {
        Self {
            exec,
            interceptor: None,
            validator: None,
            allow_statements: None,
            context_headers: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn validator(mut self, validator: Validator, schema: Schema) -> Self {
        self.validator = Some((validator, schema));
        self
    }

    /// Accept raw statements (`:exec`, and inside `:batch`).
    ///
    /// Defaults to accepting them only when no validator is configured, since
    /// statements bypass both validation and the interceptor.
    pub fn allow_statements(mut self, allow: bool) -> Self {
        self.allow_statements = Some(allow);
        self
    }

    /// Expose request header `header` to the interceptor as context value `key`.
    pub fn context_header(mut self, header: &str, key: impl Into<String>) -> Result<Self> {
        let name = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| Error::Other(format!("invalid header name {header:?}: {e}")))?;
        self.context_headers.push((name, key.into()));
        Ok(self)
    }

    /// Cancelling `token` aborts every in-flight request.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn executor(&self) -> &E {
        &self.exec
    }

    /// Answer one buffered wire request.
    pub async fn handle(&self, req: http::Request<Vec<u8>>) -> Response<Vec<u8>> {
        let started = Instant::now();
        let resp = match self.run(&req).await {
            Ok(records) => match serde_json::to_vec(&records) {
                Ok(body) => respond(StatusCode::OK, "application/json", body),
                Err(e) => failure(&Error::from(e)),
            },
            Err(e) => failure(&e),
        };
        tracing::info!(
            target: "sqlbridge.gateway",
            method = %req.method(),
            path = %req.uri().path(),
            status = resp.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request served"
        );
        resp
    }

    /// hyper service entry point.
    pub async fn serve(
        &self,
        req: hyper::Request<hyper::body::Incoming>,
    ) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
        let (parts, body) = req.into_parts();
        let resp = match body.collect().await {
            Ok(body) => {
                self.handle(http::Request::from_parts(parts, body.to_bytes().to_vec()))
                    .await
            }
            Err(e) => failure(&Error::codec(format!("failed to read request body: {e}"))),
        };
        Ok(resp.map(|body| Full::new(Bytes::from(body))))
    }

    async fn run(&self, req: &http::Request<Vec<u8>>) -> Result<Vec<Record>> {
        let ctx = self.context(req.headers());
        let mut request = parse_parts(req.method(), req.uri(), req.headers(), req.body())?;
        if !self.allow_statements.unwrap_or(self.validator.is_none()) {
            reject_statements(&request)?;
        }
        if let Some(interceptor) = &self.interceptor {
            interceptor.apply_request(&ctx, &mut request);
        }
        if let Some((validator, schema)) = &self.validator {
            validator.validate_request(&request, schema)?;
        }
        let mut records: Vec<Record> = Vec::new();
        self.exec
            .execute(&ctx, &request, Some(&mut records))
            .await?;
        Ok(records)
    }

    fn context(&self, headers: &http::HeaderMap) -> Context {
        let mut ctx = Context::background().with_cancellation(self.shutdown.child_token());
        for (name, key) in &self.context_headers {
            if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
                ctx = ctx.with_value(key.clone(), value);
            }
        }
        ctx
    }
}

fn failure(err: &Error) -> Response<Vec<u8>> {
    let status = if err.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::BAD_REQUEST
    };
    tracing::debug!(target: "sqlbridge.gateway", error = %err, "request failed");
    respond(status, "text/plain; charset=utf-8", err.to_string().into_bytes())
}

fn respond(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Response<Vec<u8>> {
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Action, Request, bulk, exec, insert, query};
    use crate::http::format_request;
    use crate::predicate::Predicate;
    use crate::scan::{Rows, Scan};
    use std::sync::Mutex;
    use url::Url;

    /// Answers every request with `records`, or with `fail` when set.
    #[derive(Default)]
    struct Stub {
        seen: Mutex<Vec<(Request, Option<String>)>>,
        records: Vec<Record>,
        fail: Option<fn() -> Error>,
    }

    impl Executor for Stub {
        async fn execute(
            &self,
            ctx: &Context,
            req: &Request,
            dest: Option<&mut dyn Scan>,
        ) -> Result<()> {
            let tenant = ctx.value("tenant").map(|v| v.to_wire_string());
            self.seen.lock().unwrap().push((req.clone(), tenant));
            if let Some(fail) = self.fail {
                return Err(fail());
            }
            if let Some(dest) = dest {
                dest.scan(&mut Rows::from_records(self.records.clone()))?;
            }
            Ok(())
        }
    }

    fn wire(req: impl Into<Request>) -> http::Request<Vec<u8>> {
        let base = Url::parse("http://gateway.local/api/").unwrap();
        format_request(&base, &req.into()).unwrap()
    }

    fn records() -> Vec<Record> {
        vec![
            serde_json::json!({ "id": 1, "key": "a" })
                .as_object()
                .cloned()
                .unwrap(),
        ]
    }

    #[tokio::test]
    async fn answers_with_json_rows() {
        let gw = Gateway::new(Stub {
            records: records(),
            ..Default::default()
        });
        let resp = gw.handle(wire(query("resources").filter("key", "a"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body, serde_json::json!([{ "id": 1, "key": "a" }]));

        let seen = gw.executor().seen.lock().unwrap();
        let cmd = seen[0].0.last_command().unwrap();
        assert_eq!(cmd.action, Action::Query);
        assert_eq!(cmd.where_.get("key"), Some(&Predicate::eq("a")));
    }

    #[tokio::test]
    async fn empty_results_are_an_empty_array() {
        let gw = Gateway::new(Stub::default());
        let resp = gw.handle(wire(insert("resources").value("key", "a"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body(), b"[]");
    }

    #[tokio::test]
    async fn context_headers_feed_the_interceptor() {
        let gw = Gateway::new(Stub::default())
            .interceptor(Interceptor::new().resource("resources", ["tenant"]))
            .context_header("x-tenant", "tenant")
            .unwrap();
        let mut req = wire(query("resources"));
        req.headers_mut()
            .insert("x-tenant", HeaderValue::from_static("acme"));
        assert_eq!(gw.handle(req).await.status(), StatusCode::OK);

        let seen = gw.executor().seen.lock().unwrap();
        let (req, tenant) = &seen[0];
        assert_eq!(tenant.as_deref(), Some("acme"));
        let cmd = req.last_command().unwrap();
        assert_eq!(cmd.where_.get("tenant"), Some(&Predicate::eq("acme")));
    }

    #[tokio::test]
    async fn validation_failures_are_bad_requests() {
        let schema = Schema::new().resource("resources", [("id", "INT8")]);
        let gw = Gateway::new(Stub::default()).validator(Validator::new(), schema);
        let resp = gw.handle(wire(query("resources").filter("nope", 1))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let text = String::from_utf8(resp.into_body()).unwrap();
        assert!(text.contains("nope"), "{text}");
        assert!(gw.executor().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_requests_are_bad_requests() {
        let gw = Gateway::new(Stub::default());
        let req = http::Request::builder()
            .method("PATCH")
            .uri("http://gateway.local/api/resources")
            .body(Vec::new())
            .unwrap();
        assert_eq!(gw.handle(req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn retryable_failures_are_unavailable() {
        let gw = Gateway::new(Stub {
            fail: Some(|| Error::Deadlock("deadlock detected".to_string())),
            ..Default::default()
        });
        let resp = gw.handle(wire(query("resources"))).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let gw = Gateway::new(Stub {
            fail: Some(|| Error::Database {
                code: Some("23505".to_string()),
                message: "duplicate key".to_string(),
            }),
            ..Default::default()
        });
        let resp = gw.handle(wire(query("resources"))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn context_header_names_are_checked() {
        assert!(Gateway::new(Stub::default()).context_header("bad header", "k").is_err());
    }

    #[tokio::test]
    async fn validated_gateways_refuse_raw_statements() {
        let schema = Schema::new().resource("resources", [("id", "INT8")]);
        let gw = Gateway::new(Stub::default()).validator(Validator::new(), schema.clone());
        for req in [
            exec("DELETE FROM resources", [0]),
            bulk([query("resources").into(), exec("DROP TABLE resources", [0])]),
        ] {
            let resp = gw.handle(wire(req)).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let text = String::from_utf8(resp.into_body()).unwrap();
            assert!(text.contains("stmt"), "{text}");
        }
        assert!(gw.executor().seen.lock().unwrap().is_empty());

        let gw = Gateway::new(Stub::default())
            .validator(Validator::new(), schema)
            .allow_statements(true);
        let resp = gw.handle(wire(exec("VACUUM", [0]))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = Gateway::new(Stub::default())
            .handle(wire(exec("VACUUM", [0])))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
