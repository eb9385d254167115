//! Google Gemini completion provider.
//!
//! Talks to the Generative Language `generateContent` endpoint over HTTPS
//! with the API key as a query parameter.
//!
//! The therapist system prompt is sent as a leading user turn wrapped in a
//! `[SYSTEM CONTEXT]` envelope, followed by a fixed model acknowledgement.
//! Then come the most recent history turns and the new user message. The
//! envelope keeps the whole prompt inside `contents`, so models without
//! `systemInstruction` support behave the same.
//!
//! # Authentication
//!
//! Uses `GEMINI_API_KEY` or `GOOGLE_API_KEY`, resolved by
//! [`crate::config::AppConfig`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llms::{ChatTurn, CompletionService, LlmError, Role};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const SYSTEM_CONTEXT_PREFIX: &str = "[SYSTEM CONTEXT - READ CAREFULLY]\n\n";
const SYSTEM_CONTEXT_SUFFIX: &str = "\n\n[END SYSTEM CONTEXT]\n\nPlease acknowledge you understand your role and the therapeutic framework.";

const MODEL_ACKNOWLEDGEMENT: &str = "I understand my role and the PSVS therapeutic framework. I'm ready to provide supportive, guided therapy based on the client's current position and needs.";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Request and sampling parameters for [`GeminiCompletion`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_output_tokens: u32,
    /// Most recent history turns forwarded per request.
    pub history_window: usize,
    /// Per-HTTP-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Extra attempts after a 429, a 5xx or a transport error.
    pub max_retries: u32,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            top_p: 0.9,
            max_output_tokens: 2048,
            history_window: 10,
            request_timeout_secs: 60,
            max_retries: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// GeminiCompletion provider
// ---------------------------------------------------------------------------

/// Gemini-backed [`CompletionService`].
///
/// # Example
///
/// ```ignore
/// let gemini = GeminiCompletion::new(GeminiSettings {
///     api_key: Some(key),
///     ..Default::default()
/// })?;
/// let reply = gemini.complete(&system_prompt, "I can't sleep", &history).await?;
/// ```
#[derive(Debug, Clone)]
pub struct GeminiCompletion {
    settings: GeminiSettings,
    client: reqwest::Client,
}

impl GeminiCompletion {
    pub fn new(settings: GeminiSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    fn api_endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", API_BASE, self.settings.model)
    }

    pub fn generation_config(&self) -> Value {
        serde_json::json!({
            "temperature": self.settings.temperature,
            "topP": self.settings.top_p,
            "maxOutputTokens": self.settings.max_output_tokens,
        })
    }

    /// Build the `contents` array: context envelope, acknowledgement, the
    /// last `history_window` turns, then the new message.
    pub fn build_contents(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[ChatTurn],
    ) -> Vec<Value> {
        let recent = &history[history.len().saturating_sub(self.settings.history_window)..];
        let mut contents = Vec::with_capacity(recent.len() + 3);

        contents.push(text_content(
            "user",
            &format!("{}{}{}", SYSTEM_CONTEXT_PREFIX, system_prompt, SYSTEM_CONTEXT_SUFFIX),
        ));
        contents.push(text_content("model", MODEL_ACKNOWLEDGEMENT));

        for turn in recent {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            contents.push(text_content(role, &turn.content));
        }

        contents.push(text_content("user", user_message));
        contents
    }

    pub fn build_request_body(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[ChatTurn],
    ) -> Value {
        serde_json::json!({
            "contents": self.build_contents(system_prompt, user_message, history),
            "generationConfig": self.generation_config(),
        })
    }
}

fn text_content(role: &str, text: &str) -> Value {
    serde_json::json!({
        "role": role,
        "parts": [{ "text": text }],
    })
}

/// Concatenate the text parts of the first candidate.
pub fn parse_response(response: &Value) -> Result<String, LlmError> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown Gemini API error")
            .to_string();
        let status = error.get("code").and_then(|c| c.as_u64()).unwrap_or(500) as u16;
        return Err(LlmError::Api { status, message });
    }

    let candidate = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or(LlmError::Empty)?;

    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or(LlmError::Empty)?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(LlmError::Empty);
    }
    Ok(text)
}

fn usage_summary(response: &Value) -> Option<(i64, i64)> {
    let usage = response.get("usageMetadata")?;
    let prompt = usage.get("promptTokenCount").and_then(|v| v.as_i64()).unwrap_or(0);
    let completion = usage
        .get("candidatesTokenCount")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    Some((prompt, completion))
}

#[async_trait]
impl CompletionService for GeminiCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[ChatTurn],
    ) -> Result<String, LlmError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        log::debug!(
            "GeminiCompletion.complete: model={}, history={}, prompt_chars={}",
            self.settings.model,
            history.len(),
            system_prompt.len(),
        );

        let body = self.build_request_body(system_prompt, user_message, history);
        let endpoint = self.api_endpoint();

        let mut last_error: Option<LlmError> = None;
        let mut retry_delay = Duration::from_millis(500);

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                log::warn!("Gemini API retry attempt {} after {:?}", attempt, retry_delay);
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let response = match self
                .client
                .post(&endpoint)
                .query(&[("key", api_key)])
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(LlmError::Transport(e));
                    continue;
                }
            };

            let status = response.status();
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    last_error = Some(LlmError::Transport(e));
                    continue;
                }
            };

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: truncate(&text, 500),
                });
                continue;
            }

            if !status.is_success() {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: truncate(&text, 500),
                });
            }

            let json: Value = serde_json::from_str(&text)
                .map_err(|e| LlmError::Parse(format!("{} - body: {}", e, truncate(&text, 500))))?;

            if let Some((prompt, completion)) = usage_summary(&json) {
                log::debug!("Gemini usage: prompt={} completion={}", prompt, completion);
            }

            return parse_response(&json);
        }

        Err(last_error.unwrap_or(LlmError::Empty))
    }

    fn provider(&self) -> &str {
        "gemini"
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
