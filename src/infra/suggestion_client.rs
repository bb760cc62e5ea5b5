// ============================================================
// Layer 6 — Suggestion Service Client
// ============================================================
// Talks to an OpenRouter-compatible chat-completions endpoint:
//
//   POST {base_url}/chat/completions
//   Authorization: Bearer <api key>
//   { "model": ..., "messages": [{"role": "user", "content": prompt}],
//     "temperature": 0.7, "max_tokens": 1000 }
//
// Every attempt is bounded by a timeout. A failed attempt is
// retried up to `max_retries` times after a short delay; when
// the last attempt fails the caller gets SuggestionUnavailable.
// Nothing here ever panics or aborts the pipeline.
//
// Reference: OpenRouter API (chat completions)
//            reqwest crate documentation
//            tokio::time::timeout

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::traits::SuggestionService;
use crate::infra::settings::SuggestionSettings;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model:       &'a str,
    messages:    Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens:  u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role:    &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenRouterClient {
    client:   Client,
    settings: SuggestionSettings,
}

impl OpenRouterClient {
    pub fn new(settings: SuggestionSettings) -> PipelineResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| PipelineError::unavailable(format!("cannot create HTTP client: {e}")))?;

        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    /// One request, no retry
    async fn request_once(&self, api_key: &str, prompt: &str) -> PipelineResult<String> {
        let body = ChatRequest {
            model:       &self.settings.model,
            messages:    vec![ChatMessage { role: "user", content: prompt }],
            temperature: self.settings.temperature,
            max_tokens:  self.settings.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::unavailable(format!(
                "service answered {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::unavailable(format!("unreadable response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PipelineError::unavailable("response contained no text"))
    }
}

#[async_trait]
impl SuggestionService for OpenRouterClient {
    async fn suggest(&self, prompt: &str) -> PipelineResult<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PipelineError::unavailable("no API key configured"))?;

        let attempts = self.settings.max_retries + 1;
        let timeout  = Duration::from_secs(self.settings.timeout_secs);
        let delay    = Duration::from_millis(self.settings.retry_delay_ms);

        let mut last_error = PipelineError::unavailable("no attempt was made");
        for attempt in 1..=attempts {
            let result = match tokio::time::timeout(timeout, self.request_once(api_key, prompt)).await
            {
                Ok(result) => result,
                Err(_) => Err(PipelineError::unavailable(format!(
                    "no answer within {}s",
                    timeout.as_secs()
                ))),
            };

            match result {
                Ok(text) => {
                    tracing::info!("Suggestion received ({} chars)", text.len());
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!("Suggestion attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e;
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error)
    }
}
