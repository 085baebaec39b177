//! Chat-completion client.
//!
//! [`ChatModel`] is the seam used by the query engine to turn a prompt into
//! an answer. [`OpenAiChat`] calls `POST {api_base}/chat/completions` with
//! the configured model and temperature.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::openai::OpenAiClient;

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send one user prompt and return the assistant's reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(client: OpenAiClient, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "user", "content": prompt}
            ],
        });
        let json = self.client.post_json("chat/completions", &body).await?;
        parse_completion(&json)
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("invalid chat completion response: missing choices[0].message.content"))
}
