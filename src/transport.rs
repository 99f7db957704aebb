use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP. An `Err` means no reply at all (timeout, DNS, TLS); callers treat it as a
/// channel-local failure. Error text never carries the request URL, since webhook URLs embed
/// their token and the account probe passes the API secret in the query.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply>;
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gotw/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(HttpReply { status, body })
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpReply> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(HttpReply { status, body })
    }
}
