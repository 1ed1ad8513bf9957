//! Client for the external memory service.
//!
//! Memories are short text records the service associates with a user id and ranks by
//! semantic similarity. Storage and ranking are owned by the service.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MEM0_DEFAULT_HOST: &str = "https://api.mem0.ai";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(default)]
    pub id: Option<String>,
    /// The remembered text. The hosted service calls this field `memory`.
    #[serde(alias = "memory")]
    pub text: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl MemoryRecord {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            id: None,
            text: text.into(),
            user_id: None,
            score: None,
            created_at: None,
        }
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Up to `limit` records for `user_id` ranked by relevance to `query`
    async fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<MemoryRecord>>;

    /// Every record stored for `user_id`, in service order
    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>>;

    /// Store a new memory for `user_id`
    async fn add(&self, text: &str, user_id: &str) -> Result<Vec<MemoryRecord>>;
}

#[derive(Clone)]
pub struct Mem0Config {
    pub host: String,
    pub api_key: Option<String>,
}

impl Mem0Config {
    pub fn new<S: Into<String>>(host: S, api_key: Option<String>) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }
}

impl Default for Mem0Config {
    fn default() -> Self {
        Self::new(MEM0_DEFAULT_HOST, None)
    }
}

/// The service answers either with a bare list or with `{"results": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsResponse {
    List(Vec<MemoryRecord>),
    Wrapped { results: Vec<MemoryRecord> },
}

impl From<RecordsResponse> for Vec<MemoryRecord> {
    fn from(response: RecordsResponse) -> Self {
        match response {
            RecordsResponse::List(records) => records,
            RecordsResponse::Wrapped { results } => results,
        }
    }
}

/// Mem0 REST client
pub struct Mem0Client {
    client: Client,
    config: Mem0Config,
}

impl Mem0Client {
    pub fn new(config: Mem0Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Token {}", key))
                .map_err(|e| anyhow!("Invalid memory service API key: {}", e))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), path)
    }

    async fn records(response: reqwest::Response) -> Result<Vec<MemoryRecord>> {
        match response.status() {
            status if status.is_success() => {
                let body: RecordsResponse = response.json().await?;
                Ok(body.into())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(anyhow!("Memory service rejected the credentials"))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(anyhow!("Memory service request failed: {} {}", status, body))
            }
        }
    }
}

#[async_trait]
impl MemoryStore for Mem0Client {
    async fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        let payload = json!({
            "query": query,
            "user_id": user_id,
            "limit": limit,
        });
        let response = self
            .client
            .post(self.url("/v1/memories/search/"))
            .json(&payload)
            .send()
            .await?;

        let mut records = Self::records(response).await?;
        // Not every deployment honors the limit
        records.truncate(limit);
        tracing::debug!(user_id, found = records.len(), "memory search");
        Ok(records)
    }

    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        let response = self
            .client
            .get(self.url("/v1/memories/"))
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        Self::records(response).await
    }

    async fn add(&self, text: &str, user_id: &str) -> Result<Vec<MemoryRecord>> {
        let payload = json!({
            "messages": [{"role": "user", "content": text}],
            "user_id": user_id,
        });
        let response = self
            .client
            .post(self.url("/v1/memories/"))
            .json(&payload)
            .send()
            .await?;

        // The add endpoint reports events rather than full records
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Memory service request failed: {} {}", status, body));
        }
        let body: Value = response.json().await?;
        let events = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("results") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(events
            .into_iter()
            .filter_map(|event| {
                let text = event
                    .get("memory")
                    .or_else(|| event.pointer("/data/memory"))
                    .and_then(|m| m.as_str())?;
                Some(MemoryRecord {
                    id: event.get("id").and_then(|id| id.as_str()).map(String::from),
                    user_id: Some(user_id.to_string()),
                    ..MemoryRecord::new(text)
                })
            })
            .collect())
    }
}
