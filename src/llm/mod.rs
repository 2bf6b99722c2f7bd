//! LLMClient (spec §1, §4.6): an externally injected capability, "produce
//! structured JSON conforming to a schema from a text prompt." No concrete
//! provider integration is in scope; this module defines the trait seam
//! (per spec §9's "Interface abstraction" note) plus a generic HTTP-backed
//! implementation for operators who point it at an OpenAI-compatible
//! endpoint, following the donor's `reqwest`-based client idiom
//! (`worker::http::HttpClient`) generalized to JSON request/response
//! instead of raw bytes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm not configured")]
    NotConfigured,

    #[error("llm provider error: {0}")]
    Provider(String),

    #[error("llm returned non-JSON output")]
    NonJsonOutput,

    #[error("llm returned empty result")]
    EmptyResult,
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn summarize(&self, markdown: &str) -> Result<String>;

    async fn extract(
        &self,
        markdown: &str,
        schema: &Value,
        prompt: Option<&str>,
        model: Option<&str>,
    ) -> Result<Value>;
}

pub struct NullLlmClient;

#[async_trait]
impl LlmClient for NullLlmClient {
    async fn summarize(&self, _markdown: &str) -> Result<String> {
        Err(LlmError::NotConfigured)
    }

    async fn extract(
        &self,
        _markdown: &str,
        _schema: &Value,
        _prompt: Option<&str>,
        _model: Option<&str>,
    ) -> Result<Value> {
        Err(LlmError::NotConfigured)
    }
}

#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub default_model: String,
}

/// Talks to an OpenAI-compatible `/chat/completions` endpoint, requesting
/// JSON-mode output and parsing the first choice's content as the schema
/// result.
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: HttpLlmConfig,
}

impl HttpLlmClient {
    pub fn new(config: HttpLlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn complete(&self, system: &str, user: &str, model: Option<&str>) -> Result<String> {
        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            response_format: Value,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessageOwned,
        }

        #[derive(Deserialize)]
        struct ChatMessageOwned {
            content: String,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        let model = model.unwrap_or(&self.config.default_model);
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            response_format: serde_json::json!({"type": "json_object"}),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::Provider(format!("status {}", response.status())));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Provider(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyResult)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn summarize(&self, markdown: &str) -> Result<String> {
        let content = self
            .complete(
                "Summarize the following page content in 2-3 sentences.",
                markdown,
                None,
            )
            .await?;
        if content.trim().is_empty() {
            return Err(LlmError::EmptyResult);
        }
        Ok(content)
    }

    async fn extract(
        &self,
        markdown: &str,
        schema: &Value,
        prompt: Option<&str>,
        model: Option<&str>,
    ) -> Result<Value> {
        let system = format!(
            "Extract structured data matching this JSON schema and return only JSON: {schema}"
        );
        let user = match prompt {
            Some(p) => format!("{p}\n\n{markdown}"),
            None => markdown.to_string(),
        };

        let content = self.complete(&system, &user, model).await?;
        let value: Value = serde_json::from_str(&content).map_err(|_| LlmError::NonJsonOutput)?;
        if value.is_null() {
            return Err(LlmError::EmptyResult);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_client_reports_not_configured() {
        let client = NullLlmClient;
        let err = client.summarize("text").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }
}
