//! Caller-facing facade: interceptor, validator and retry around an executor.
//!
//! ```ignore
//! use sqlbridge::{Client, ClientConfig, Context, query};
//!
//! let client = ClientConfig::from_env()?.connect()?;
//! let rows: Vec<Resource> = client
//!     .fetch_all(&Context::background(), query("resources").filter("key", "value"))
//!     .await?;
//! ```

use crate::command::Request;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::exec::{Executor, Retry, RetryConfig};
use crate::format::Dialect;
use crate::intercept::Interceptor;
use crate::scan::{First, Scan};
use crate::schema::Schema;
use crate::validate::Validator;
use serde::de::DeserializeOwned;

/// Runs requests through the interceptor, the validator and the retry driver.
#[derive(Debug, Clone)]
pub struct Client<E> {
    exec: Retry<E>,
    interceptor: Option<Interceptor>,
    validator: Option<(Validator, Schema)>,
}

impl<E: Executor> Client<E> {
    pub fn new(inner: E) -> Self {
        Self {
            exec: Retry::new(inner),
            interceptor: None,
            validator: None,
        }
    }

    /// Replace the retry policy.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.exec = Retry::with_config(self.exec.into_inner(), config);
        self
    }

    pub fn interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Validate every command against `schema` before it leaves the client.
    pub fn validator(mut self, validator: Validator, schema: Schema) -> Self {
        self.validator = Some((validator, schema));
        self
    }

    pub fn executor(&self) -> &E {
        self.exec.inner()
    }

    /// Intercept and validate a request without running it.
    pub fn prepare(&self, ctx: &Context, req: impl Into<Request>) -> Result<Request> {
        let mut req = req.into();
        if let Some(interceptor) = &self.interceptor {
            interceptor.apply_request(ctx, &mut req);
        }
        if let Some((validator, schema)) = &self.validator {
            validator.validate_request(&req, schema)?;
        }
        Ok(req)
    }

    /// Run a request, scanning the terminal rows into `dest`.
    pub async fn execute(
        &self,
        ctx: &Context,
        req: impl Into<Request>,
        dest: Option<&mut dyn Scan>,
    ) -> Result<()> {
        let req = self.prepare(ctx, req)?;
        self.exec.execute(ctx, &req, dest).await
    }

    /// Run a request and collect every terminal row.
    pub async fn fetch_all<T>(&self, ctx: &Context, req: impl Into<Request>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let mut out = Vec::new();
        self.execute(ctx, req, Some(&mut out)).await?;
        Ok(out)
    }

    /// Run a request and return its first row, or [`Error::NotFound`].
    pub async fn fetch_one<T>(&self, ctx: &Context, req: impl Into<Request>) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let mut out = First::new();
        self.execute(ctx, req, Some(&mut out)).await?;
        out.into_inner().ok_or(Error::NotFound)
    }

    /// Run a request and return its first row, if any.
    pub async fn fetch_optional<T>(&self, ctx: &Context, req: impl Into<Request>) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        let mut out = None;
        self.execute(ctx, req, Some(&mut out)).await?;
        Ok(out)
    }
}

impl<E: Executor> Executor for Client<E> {
    async fn execute(
        &self,
        ctx: &Context,
        req: &Request,
        dest: Option<&mut dyn Scan>,
    ) -> Result<()> {
        Client::execute(self, ctx, req.clone(), dest).await
    }
}

/// OAuth2 client-credentials settings for the gateway client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

/// How to build a [`Client`].
///
/// An HTTP base URL takes precedence over a database URL.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub http_url: Option<String>,
    pub database_url: Option<String>,
    pub dialect: Dialect,
    pub pool_size: usize,
    pub oauth: Option<OAuthConfig>,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_url: None,
            database_url: None,
            dialect: Dialect::Postgres,
            pool_size: 16,
            oauth: None,
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn http_url(mut self, url: impl Into<String>) -> Self {
        self.http_url = Some(url.into());
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Read `SQLBRIDGE_*` variables from the process environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `SQLBRIDGE_HTTP_URL` | `http_url` |
    /// | `SQLBRIDGE_DATABASE_URL` | `database_url` |
    /// | `SQLBRIDGE_DIALECT` | `dialect` (default `postgres`) |
    /// | `SQLBRIDGE_OAUTH_CLIENT_ID`, `_CLIENT_SECRET`, `_TOKEN_URL`, `_SCOPE` | `oauth` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        config.http_url = get("SQLBRIDGE_HTTP_URL");
        config.database_url = get("SQLBRIDGE_DATABASE_URL");
        if let Some(name) = get("SQLBRIDGE_DIALECT") {
            config.dialect = Dialect::from_name(&name)
                .ok_or_else(|| Error::Other(format!("unknown SQLBRIDGE_DIALECT {name:?}")))?;
        }
        config.oauth = match (
            get("SQLBRIDGE_OAUTH_TOKEN_URL"),
            get("SQLBRIDGE_OAUTH_CLIENT_ID"),
            get("SQLBRIDGE_OAUTH_CLIENT_SECRET"),
        ) {
            (Some(token_url), Some(client_id), Some(client_secret)) => Some(OAuthConfig {
                token_url,
                client_id,
                client_secret,
                scope: get("SQLBRIDGE_OAUTH_SCOPE"),
            }),
            (None, None, None) => None,
            _ => {
                return Err(Error::Other(
                    "SQLBRIDGE_OAUTH_TOKEN_URL, SQLBRIDGE_OAUTH_CLIENT_ID and \
                     SQLBRIDGE_OAUTH_CLIENT_SECRET must be set together"
                        .to_string(),
                ));
            }
        };
        Ok(config)
    }
}

#[cfg(any(feature = "pool", feature = "http"))]
pub use self::any::AnyExecutor;

#[cfg(any(feature = "pool", feature = "http"))]
mod any {
    use super::*;
    #[cfg(feature = "http")]
    use crate::exec::HttpExecutor;
    #[cfg(feature = "pool")]
    use crate::{exec::SqlExecutor, pg::PgDatabase};

    /// The executor [`ClientConfig::connect`] picked.
    #[derive(Debug, Clone)]
    pub enum AnyExecutor {
        #[cfg(feature = "pool")]
        Sql(SqlExecutor<PgDatabase>),
        #[cfg(feature = "http")]
        Http(HttpExecutor),
    }

    impl Executor for AnyExecutor {
        async fn execute(
            &self,
            ctx: &Context,
            req: &Request,
            dest: Option<&mut dyn Scan>,
        ) -> Result<()> {
            match self {
                #[cfg(feature = "pool")]
                AnyExecutor::Sql(exec) => exec.execute(ctx, req, dest).await,
                #[cfg(feature = "http")]
                AnyExecutor::Http(exec) => exec.execute(ctx, req, dest).await,
            }
        }
    }

    impl ClientConfig {
        /// Build the executor this configuration describes, wrapped in a [`Client`].
        pub fn connect(&self) -> Result<Client<AnyExecutor>> {
            let exec = if let Some(url) = &self.http_url {
                self.http_executor(url)?
            } else if let Some(url) = &self.database_url {
                self.sql_executor(url)?
            } else {
                return Err(Error::Other(
                    "neither an HTTP url nor a database url is configured".to_string(),
                ));
            };
            Ok(Client::new(exec).retry(self.retry.clone()))
        }

        #[cfg(feature = "http")]
        fn http_executor(&self, url: &str) -> Result<AnyExecutor> {
            use crate::auth::ClientCredentials;
            use crate::exec::HttpConfig;

            let mut exec = HttpExecutor::new(HttpConfig::parse(url)?)?;
            if let Some(oauth) = &self.oauth {
                let mut tokens = ClientCredentials::new(
                    &oauth.token_url,
                    &oauth.client_id,
                    &oauth.client_secret,
                );
                if let Some(scope) = &oauth.scope {
                    tokens = tokens.scope(scope);
                }
                exec = exec.token_source(tokens);
            }
            Ok(AnyExecutor::Http(exec))
        }

        #[cfg(not(feature = "http"))]
        fn http_executor(&self, _url: &str) -> Result<AnyExecutor> {
            Err(Error::unsupported("built without the `http` feature"))
        }

        #[cfg(feature = "pool")]
        fn sql_executor(&self, url: &str) -> Result<AnyExecutor> {
            match self.dialect {
                Dialect::Postgres => {
                    let pool = crate::pool::create_pool_with_config(url, self.pool_size)?;
                    Ok(AnyExecutor::Sql(SqlExecutor::new(PgDatabase::new(pool))))
                }
                Dialect::MySql => Err(Error::unsupported(
                    "no MySQL driver binding; implement `Database` for one and use `SqlExecutor`",
                )),
            }
        }

        #[cfg(not(feature = "pool"))]
        fn sql_executor(&self, _url: &str) -> Result<AnyExecutor> {
            Err(Error::unsupported("built without the `pool` feature"))
        }
    }
}
