//! Client for the hosted browsing-automation service.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const MULTION_DEFAULT_HOST: &str = "https://api.multion.ai";
const API_KEY_HEADER: &str = "x_multion_api_key";

/// Drives a remote browser with a natural-language command starting from `url`
#[async_trait]
pub trait Browser: Send + Sync {
    async fn browse(&self, cmd: &str, url: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct BrowseRequest<'a> {
    cmd: &'a str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct BrowseResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

pub struct MultiOnClient {
    client: Client,
    host: String,
}

impl MultiOnClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_host(MULTION_DEFAULT_HOST, api_key)
    }

    pub fn with_host<S: Into<String>>(host: S, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(api_key)
                .map_err(|e| anyhow!("Invalid browsing service API key: {}", e))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self {
            client,
            host: host.into(),
        })
    }
}

#[async_trait]
impl Browser for MultiOnClient {
    async fn browse(&self, cmd: &str, url: &str) -> Result<String> {
        let start = Url::parse(url).map_err(|e| anyhow!("Invalid start URL {}: {}", url, e))?;
        let endpoint = format!("{}/v1/web/browse", self.host.trim_end_matches('/'));
        tracing::debug!(url = %start, "browsing");

        let response = self
            .client
            .post(&endpoint)
            .json(&BrowseRequest {
                cmd,
                url: start.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Browsing service request failed: {} {}", status, body));
        }

        let body: BrowseResponse = response.json().await?;
        tracing::debug!(status = ?body.status, "browse finished");
        body.message
            .ok_or_else(|| anyhow!("Browsing service returned no message"))
    }
}
