use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{NovaError, Result};

/// Reply used when the upstream answers 2xx but carries no usable text.
pub const EMPTY_REPLY_FALLBACK: &str = "⚠️ Boş veya hatalı yanıt.";

/// Client for the Generative Language `generateContent` endpoint. Holds the
/// retry budget so callers only ever see the final outcome.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    base_timeout: Duration,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        let api_key = if config.has_api_key() {
            config.api_key.clone()
        } else {
            None
        };
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            base_timeout: config.request_timeout,
            retry_attempts: config.retry_attempts.max(1),
            retry_base_delay: config.retry_base_delay,
        }
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Sends `prompt` upstream and returns the extracted reply text. Retries
    /// transport errors and non-2xx statuses with a doubling delay until the
    /// attempt budget runs out. A 2xx response without usable text resolves to
    /// [`EMPTY_REPLY_FALLBACK`] rather than an error.
    pub async fn generate(&self, prompt: &str, speed: f64) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            NovaError::Config(
                "GEMINI_API_KEY çevresel değişkeni tanımlı değil. Lütfen anahtarınızı ayarlayın."
                    .to_string(),
            )
        })?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ]
        });
        let timeout = self.scaled_timeout(speed);

        let mut delay = self.retry_base_delay;
        let mut last_error = String::new();
        for attempt in 1..=self.retry_attempts {
            if attempt > 1 {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&body)
                .timeout(timeout)
                .send()
                .await;
            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    last_error = err.to_string();
                    warn!("generateContent attempt {attempt} failed to send: {last_error}");
                    continue;
                }
            };

            let status = response.status();
            let text = match response.text().await {
                Ok(text) => text,
                Err(err) => {
                    last_error = err.to_string();
                    warn!("generateContent attempt {attempt} failed to read body: {last_error}");
                    continue;
                }
            };

            if status.is_success() {
                debug!("generateContent response: {}", truncate(&text, 2000));
                return Ok(extract_text(&text)
                    .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string()));
            }

            last_error = format!("status {status}: {}", truncate(&text, 200));
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!("generateContent attempt {attempt} was rate limited");
            } else {
                warn!("generateContent attempt {attempt} failed: {last_error}");
            }
        }

        Err(NovaError::Upstream(format!(
            "generateContent failed after {} attempts: {last_error}",
            self.retry_attempts
        )))
    }

    /// Shortens the per-request timeout while warm-up has the connection hot.
    fn scaled_timeout(&self, speed: f64) -> Duration {
        let speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            1.0
        };
        self.base_timeout.mul_f64(speed)
    }
}

fn extract_text(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    let text = value["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .or_else(|| value["output"]["text"].as_str())?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
