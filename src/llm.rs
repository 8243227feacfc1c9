//! OpenAI chat-completions client.
//!
//! The language model is an external, non-deterministic dependency; every
//! call goes through the narrow [`ChatModel`] trait so the rest of the
//! pipeline can be exercised with canned responses instead of a live model.

use crate::error::{AnalyticsError, Result};
use async_trait::async_trait;

/// Narrow seam to the language model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one system + user message pair and return the raw text reply.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        // Temperature 0: query generation must be as repeatable as the API
        // allows.
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": 0
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalyticsError::Llm(format!("LLM API call failed: {}", e)))?;

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalyticsError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AnalyticsError::Llm("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}
