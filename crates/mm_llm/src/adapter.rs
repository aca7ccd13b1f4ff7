//! LLM adapter for chat completions.
//!
//! Supports OpenAI and Anthropic APIs, selected via settings and the
//! environment.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mm_core::{LlmProviderKind, Settings};

use crate::client::{CompletionRequest, LlmClient, LlmResponse};
use crate::error::{LlmError, LlmResult};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const MAX_TOKENS: u32 = 4096;

/// Attempts per request for transient failures (5xx, 429, network).
const MAX_RETRIES: u32 = 3;

const JSON_ONLY_INSTRUCTION: &str =
    "Respond with a single JSON object only. Do not wrap it in prose or code fences.";

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Anthropic => "Anthropic",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "gpt-4o-mini",
            LlmProvider::Anthropic => "claude-3-5-sonnet-latest",
        }
    }

    fn key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl From<LlmProviderKind> for LlmProvider {
    fn from(kind: LlmProviderKind) -> Self {
        match kind {
            LlmProviderKind::OpenAI => LlmProvider::OpenAI,
            LlmProviderKind::Anthropic => LlmProvider::Anthropic,
        }
    }
}

/// LLM adapter that handles API calls
pub struct LlmAdapter {
    provider: LlmProvider,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmAdapter {
    /// Create a new LLM adapter with explicit configuration
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>, timeout: Duration) -> LlmResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            provider,
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            api_key,
            client,
        })
    }

    /// Create an adapter from resolved settings and the process environment.
    pub fn from_settings(settings: &Settings) -> LlmResult<Self> {
        Self::from_lookup(settings, |key| std::env::var(key).ok())
    }

    /// Create an adapter reading credentials through `lookup`.
    ///
    /// A provider named in settings must have its key. Otherwise OpenAI is
    /// tried before Anthropic.
    pub fn from_lookup(settings: &Settings, lookup: impl Fn(&str) -> Option<String>) -> LlmResult<Self> {
        let key_for = |provider: LlmProvider| lookup(provider.key_var()).filter(|k| !k.trim().is_empty());

        let (provider, api_key) = match settings.llm_provider.map(LlmProvider::from) {
            Some(provider) => (provider, key_for(provider).ok_or(LlmError::NotConfigured)?),
            None => [LlmProvider::OpenAI, LlmProvider::Anthropic]
                .into_iter()
                .find_map(|p| key_for(p).map(|k| (p, k)))
                .ok_or(LlmError::NotConfigured)?,
        };

        Self::new(
            provider,
            api_key,
            settings.llm_model.clone(),
            Duration::from_secs(settings.llm_timeout_secs),
        )
    }

    /// Get the current provider
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Get the current model
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_openai(&self, request: &CompletionRequest) -> LlmResult<LlmResponse> {
        let mut messages = vec![OpenAIMessage {
            role: "system".to_string(),
            content: request.system.clone(),
        }];
        messages.extend(request.messages.iter().map(|m| OpenAIMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));

        let body = OpenAIRequest {
            model: self.model.clone(),
            messages,
            max_completion_tokens: Some(MAX_TOKENS),
            response_format: request
                .expect_json
                .then(|| ResponseFormat { kind: "json_object".to_string() }),
        };

        let result: OpenAIResponse = self
            .post_with_retry(OPENAI_URL, &body, |builder| {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            })
            .await?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyResponse(self.provider.as_str().to_string()))?;

        let (input_tokens, output_tokens) = result
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(LlmResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }

    async fn complete_anthropic(&self, request: &CompletionRequest) -> LlmResult<LlmResponse> {
        let system = if request.expect_json {
            format!("{}\n\n{}", request.system, JSON_ONLY_INSTRUCTION)
        } else {
            request.system.clone()
        };

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: Some(system),
            messages: request
                .messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        };

        let result: AnthropicResponse = self
            .post_with_retry(ANTHROPIC_URL, &body, |builder| {
                builder
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
            })
            .await?;

        let content = result
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResponse(self.provider.as_str().to_string()));
        }

        let (input_tokens, output_tokens) = result
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((0, 0));

        Ok(LlmResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }

    /// POST a JSON body, retrying transient failures with exponential backoff.
    async fn post_with_retry<B, R, F>(&self, url: &str, body: &B, auth: F) -> LlmResult<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    {
        let provider = self.provider.as_str();
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 2s, 4s
                let delay = Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let builder = self.client.post(url).header("Content-Type", "application/json").json(body);
            let response = match auth(builder).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!("{} request failed (attempt {}/{}): {}", provider, attempt + 1, MAX_RETRIES, e);
                    last_error = Some(LlmError::from(e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let error = LlmError::Api {
                    provider: provider.to_string(),
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                };
                if error.is_transient() {
                    warn!("{} returned {} (attempt {}/{})", provider, status, attempt + 1, MAX_RETRIES);
                    last_error = Some(error);
                    continue;
                }
                return Err(error);
            }

            debug!("{} responded {}", provider, status);
            return response.json::<R>().await.map_err(|e| LlmError::Parse(e.to_string()));
        }

        Err(last_error.unwrap_or_else(|| LlmError::Request("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl LlmClient for LlmAdapter {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<LlmResponse> {
        debug!("Sending {} request to {} ({})", request.tag, self.provider.as_str(), self.model);
        match self.provider {
            LlmProvider::OpenAI => self.complete_openai(request).await,
            LlmProvider::Anthropic => self.complete_anthropic(request).await,
        }
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}
