use super::Executor;
use crate::auth::TokenSource;
use crate::command::Request;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::format_request;
use crate::scan::{Rows, Scan};
use crate::trace::{NoopTracer, Tracer};
use http::header::{AUTHORIZATION, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the gateway.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Parse the base URL.
    pub fn parse(base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| Error::Other(format!("invalid gateway url {base_url:?}: {e}")))?;
        Ok(Self::new(url))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Executes requests against a remote gateway.
///
/// Transport failures and 5xx answers are retryable; 4xx answers are not.
#[derive(Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    base: Url,
    tracer: Arc<dyn Tracer>,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl std::fmt::Debug for HttpExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExecutor")
            .field("base", &self.base.as_str())
            .field("auth", &self.tokens.is_some())
            .finish()
    }
}

impl HttpExecutor {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config.base_url))
    }

    /// Use an existing client; its timeout settings apply.
    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self {
            client,
            base,
            tracer: Arc::new(NoopTracer),
            tokens: None,
        }
    }

    pub fn tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    pub fn token_source(mut self, tokens: impl TokenSource + 'static) -> Self {
        self.tokens = Some(Arc::new(tokens));
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }
}

impl Executor for HttpExecutor {
    async fn execute(
        &self,
        ctx: &Context,
        req: &Request,
        dest: Option<&mut dyn Scan>,
    ) -> Result<()> {
        let (parts, body) = format_request(&self.base, req)?.into_parts();
        let mut headers = parts.headers;
        self.tracer.inject(ctx, &mut headers);
        if let Some(tokens) = &self.tokens {
            let token = ctx.run(tokens.token()).await?;
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Error::Auth("token is not a valid header value".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let request = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(headers)
            .body(body);
        let (status, bytes) = ctx
            .run(async {
                let resp = request.send().await?;
                let status = resp.status();
                let bytes = resp.bytes().await?;
                Ok::<_, Error>((status, bytes))
            })
            .await?;

        if status.is_server_error() {
            return Err(Error::ServerStatus(status.as_u16()));
        }
        if status.is_client_error() {
            tracing::debug!(
                target: "sqlbridge.client",
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&bytes),
                "gateway rejected request"
            );
            return Err(Error::ClientStatus(status.as_u16()));
        }

        if let Some(dest) = dest {
            let mut rows = decode_rows(&bytes)?;
            dest.scan(&mut rows)?;
        }
        Ok(())
    }
}

/// Gateway response body: a JSON array of row objects.
pub(crate) fn decode_rows(body: &[u8]) -> Result<Rows> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Rows::empty());
    }
    let records: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_slice(body).map_err(|e| Error::decode("*", e.to_string()))?;
    Ok(Rows::from_records(records))
}
