//! Web search used as evidence for pricing and sentiment prompts.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{LlmError, LlmResult};

const SERPER_URL: &str = "https://google.serper.dev/search";
const SERPER_KEY_VAR: &str = "SERPER_API_KEY";

/// Organic results requested per query.
pub const MAX_RESULTS: usize = 10;

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// A source of search evidence.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> LlmResult<Vec<SearchHit>>;

    /// False for providers that never return anything.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Provider used when no search API is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSearch;

#[async_trait]
impl SearchProvider for NoSearch {
    async fn search(&self, _query: &str) -> LlmResult<Vec<SearchHit>> {
        Ok(Vec::new())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Google results through serper.dev.
pub struct SerperSearch {
    api_key: String,
    client: reqwest::Client,
}

impl SerperSearch {
    pub fn new(api_key: String, timeout: Duration) -> LlmResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { api_key, client })
    }

    /// `None` when `SERPER_API_KEY` is unset or empty.
    pub fn from_env(timeout: Duration) -> LlmResult<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok(), timeout)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, timeout: Duration) -> LlmResult<Option<Self>> {
        match lookup(SERPER_KEY_VAR) {
            Some(key) if !key.trim().is_empty() => Self::new(key, timeout).map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    async fn search(&self, query: &str) -> LlmResult<Vec<SearchHit>> {
        debug!("Searching: {}", query);
        let response = self
            .client
            .post(SERPER_URL)
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&json!({"q": query, "num": MAX_RESULTS}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Api {
                provider: "Serper".to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: SerperResponse = response.json().await.map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(body.into_hits())
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

impl SerperResponse {
    fn into_hits(self) -> Vec<SearchHit> {
        self.organic
            .into_iter()
            .filter(|o| !o.link.is_empty())
            .take(MAX_RESULTS)
            .map(|o| SearchHit {
                title: o.title,
                snippet: o.snippet,
                url: o.link,
            })
            .collect()
    }
}
