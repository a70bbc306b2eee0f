//! Bearer tokens for the gateway client.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Supplies the bearer token attached to every gateway request.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// OAuth2 client-credentials grant with an in-memory token cache.
#[derive(Debug)]
pub struct ClientCredentials {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: Option<String>,
    cached: Mutex<Option<(String, Instant)>>,
}

/// Refresh this long before the server-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ClientCredentials {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: None,
            cached: Mutex::new(None),
        }
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Share an existing HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub(crate) fn form_body(&self) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret);
        if let Some(scope) = &self.scope {
            form.append_pair("scope", scope);
        }
        form.finish()
    }

    async fn fetch(&self) -> Result<(String, Instant)> {
        let resp = self
            .client
            .post(&self.token_url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.form_body())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Auth(format!("token endpoint returned {status}")));
        }
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;
        let ttl = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));
        let expires = Instant::now() + ttl.saturating_sub(EXPIRY_MARGIN);
        Ok((body.access_token, expires))
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some((token, expires)) = cached.as_ref() {
            if Instant::now() < *expires {
                return Ok(token.clone());
            }
        }
        let (token, expires) = self.fetch().await?;
        tracing::debug!(target: "sqlbridge.client", token_url = %self.token_url, "fetched oauth2 token");
        *cached = Some((token.clone(), expires));
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token() {
        assert_eq!(StaticToken("abc".into()).token().await.unwrap(), "abc");
    }

    #[test]
    fn client_credentials_form() {
        let cc = ClientCredentials::new("http://auth.local/token", "id", "s&cret").scope("read write");
        assert_eq!(
            cc.form_body(),
            "grant_type=client_credentials&client_id=id&client_secret=s%26cret&scope=read+write"
        );
    }
}
