//! HTTP-backed actors: OpenAI-compatible chat and Anthropic messages.
//!
//! Transport retries live here, per the capability contract: 429/5xx and
//! network errors are retried with exponential backoff before the engine ever
//! sees a failure. The engine's own retry layer only handles parse/contract
//! failures on the returned text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::actor::{Actor, ActorError, GenerateRequest};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Transport-level retry behaviour.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }
}

fn retryable_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Connection settings shared by the HTTP actor kinds.
#[derive(Debug, Clone)]
pub struct HttpActorConfig {
    pub name: String,
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub retry: RetryPolicy,
}

impl HttpActorConfig {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            base_url: base_url.into(),
            api_key_env: api_key_env.into(),
            retry: RetryPolicy::default(),
        }
    }

    fn require_api_key(&self) -> Result<String, ActorError> {
        match std::env::var(&self.api_key_env) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(ActorError::new(
                &self.name,
                format!(
                    "missing API key: set {} in the environment",
                    self.api_key_env
                ),
            )),
        }
    }
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(600))
        .build()
        .unwrap_or_default()
}

/// POST a JSON body, retrying transient failures per the policy.
///
/// `build` is invoked once per attempt since a `RequestBuilder` is consumed
/// by `send`.
async fn send_with_retry<F>(
    build: F,
    policy: &RetryPolicy,
    actor: &str,
) -> Result<Value, ActorError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut backoff = policy.backoff_base;
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        let start = Instant::now();
        match build().send().await {
            Ok(response) => {
                let status = response.status();
                let latency_ms = start.elapsed().as_millis();
                if status.is_success() {
                    debug!(actor, attempt, latency_ms, "generation call succeeded");
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| ActorError::new(actor, format!("invalid response body: {e}")));
                }
                let body = response.text().await.unwrap_or_default();
                last_error = format!("HTTP {} - {}", status, truncate(&body, 300));
                if !retryable_status(status) {
                    return Err(ActorError::new(actor, last_error));
                }
                warn!(
                    actor,
                    attempt,
                    max = policy.max_attempts,
                    %status,
                    "retryable HTTP status"
                );
            }
            Err(e) => {
                last_error = e.to_string();
                warn!(actor, attempt, max = policy.max_attempts, error = %e, "request error");
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(backoff.min(policy.backoff_max)).await;
            backoff *= 2;
        }
    }

    Err(ActorError::new(
        actor,
        format!(
            "request failed after {} attempts: {last_error}",
            policy.max_attempts
        ),
    ))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

// ── OpenAI-compatible chat ────────────────────────────────────────────────────

/// Actor backed by any `/chat/completions` endpoint (OpenAI, DeepSeek,
/// Gemini's compatibility layer, local llama.cpp servers).
pub struct OpenAiChatActor {
    config: HttpActorConfig,
    api_key: String,
    client: reqwest::Client,
    calls: AtomicU64,
}

impl OpenAiChatActor {
    pub fn new(config: HttpActorConfig) -> Result<Self, ActorError> {
        let api_key = config.require_api_key()?;
        Ok(Self {
            config,
            api_key,
            client: build_client(),
            calls: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Actor for OpenAiChatActor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ActorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut messages = Vec::new();
        if !request.system.is_empty() {
            messages.push(json!({"role": "system", "content": request.system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));
        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": MAX_OUTPUT_TOKENS,
        });

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            },
            &self.config.retry,
            &self.config.name,
        )
        .await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ActorError::new(&self.config.name, "response missing message content")
            })
    }
}

// ── Anthropic messages ────────────────────────────────────────────────────────

/// Actor backed by the Anthropic `/v1/messages` API.
pub struct AnthropicActor {
    config: HttpActorConfig,
    api_key: String,
    client: reqwest::Client,
    calls: AtomicU64,
}

impl AnthropicActor {
    pub fn new(config: HttpActorConfig) -> Result<Self, ActorError> {
        let api_key = config.require_api_key()?;
        Ok(Self {
            config,
            api_key,
            client: build_client(),
            calls: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Actor for AnthropicActor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ActorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if !request.system.is_empty() {
            body["system"] = Value::String(request.system.clone());
        }

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
            },
            &self.config.retry,
            &self.config.name,
        )
        .await?;

        response["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ActorError::new(&self.config.name, "response missing text content"))
    }
}
