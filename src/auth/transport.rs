//! HTTP capability consumed by the device flow.
//!
//! The flow only ever POSTs JSON and needs the status code and raw body
//! back; everything else (TLS, redirects, proxies) belongs to the transport.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use super::error::AuthError;

/// A JSON POST request.
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer_token: Option<String>,
    pub body: serde_json::Value,
}

impl HttpRequest {
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
            body,
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bodies carry verifiers and device codes.
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Anything that can deliver a JSON POST.
///
/// Returning `Err` means the exchange never produced an HTTP response
/// (DNS, connect, TLS, timeout). Any status code, including 4xx/5xx, is an
/// `Ok` response. Dropping the returned future must abort the request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, AuthError>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header("Accept", "application/json")
            .json(&request.body);
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        tracing::debug!(url = %request.url, status, "PlayKit auth request completed");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn debug_redacts_bearer_and_body() {
        let request = HttpRequest::post_json(
            "https://api.playkit.ai/api/external/exchange-jwt",
            json!({ "jwt": "secret-jwt" }),
        )
        .with_bearer("secret-jwt");
        let rendered = format!("{request:?}");
        assert!(rendered.contains("exchange-jwt"));
        assert!(!rendered.contains("secret-jwt"));
    }
}
