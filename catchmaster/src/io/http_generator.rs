//! OpenAI-compatible chat completions client.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::config::GeneratorConfig;
use crate::io::generator::{GenerateError, GenerateRequest, Role, TextGenerator};

#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
}

impl HttpGenerator {
    /// Build a client from config, reading the bearer token from `api_key_env`.
    pub fn from_config(cfg: &GeneratorConfig) -> Result<Self> {
        let api_key = env::var(&cfg.api_key_env)
            .map_err(|_| anyhow!("{} is not set", cfg.api_key_env))?;
        if api_key.trim().is_empty() {
            return Err(anyhow!("{} is empty", cfg.api_key_env));
        }
        let timeout = Duration::from_secs(cfg.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            api_key,
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout,
        })
    }

    fn build_body(&self, request: &GenerateRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: request.prompt.clone(),
        });
        messages.extend(request.history.iter().map(|turn| ChatMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }));
        // A trailing assistant turn reads as a prefill to most backends.
        if !request.cue.is_empty() {
            messages.push(ChatMessage {
                role: Role::User.as_str().to_string(),
                content: request.cue.clone(),
            });
        }
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        }
    }
}

impl TextGenerator for HttpGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    fn generate(&self, request: &GenerateRequest) -> Result<String, GenerateError> {
        let body = self.build_body(request);
        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    GenerateError::Timeout(self.timeout)
                } else {
                    GenerateError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "chat completion request failed");
            return Err(map_http_error(status, &body_text, retry_after));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|err| GenerateError::Malformed(err.to_string()))?;
        let text = extract_text_response(parsed)?;
        debug!(chars = text.len(), "chat completion received");
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, GenerateError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| GenerateError::Malformed("no content in response".to_string()))
}

fn map_http_error(status: StatusCode, body: &str, retry_after: Option<Duration>) -> GenerateError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return GenerateError::RateLimited { retry_after };
    }
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());
    GenerateError::Status {
        code: status.as_u16(),
        message,
        retry_after,
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
