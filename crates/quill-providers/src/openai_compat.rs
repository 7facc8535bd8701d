use async_trait::async_trait;
use quill_core::{
    Error, GenerationRequest, ProviderClient, ProviderConfig, ProviderResponse, ProxyConfig,
    QuillConfig, Result, TokenUsage,
};
use reqwest::{Client, Error as ReqwestError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{BackoffPolicy, ChatMessage, build_messages};

/// Provider for any service speaking the OpenAI chat completions protocol.
///
/// In direct mode requests go to the configured endpoint with a `Bearer`
/// key. In proxy mode they go to `{base_url}/api/llm-proxy/{id}` and no
/// credentials are attached; the proxy adds them server-side.
pub struct OpenAiCompatibleProvider {
    /// HTTP client for API requests.
    client: Client,
    /// Provider settings.
    config: ProviderConfig,
    /// URL requests are posted to.
    endpoint: String,
    /// API key, only used in direct mode.
    api_key: Option<String>,
    /// Whether requests are routed through the proxy.
    proxied: bool,
    /// Retry policy for failed attempts.
    backoff: BackoffPolicy,
}

impl OpenAiCompatibleProvider {
    /// Creates a direct-mode provider.
    pub fn new(config: ProviderConfig, api_key: Option<String>) -> Self {
        let backoff = BackoffPolicy::new(
            config.max_retries,
            Duration::from_millis(500),
            Duration::from_secs(8),
        );
        Self {
            client: Client::default(),
            endpoint: config.endpoint.clone(),
            config,
            api_key: api_key.filter(|key| !key.is_empty()),
            proxied: false,
            backoff,
        }
    }

    /// Creates a provider using the routing, key and retry settings of `quill`.
    pub fn from_quill_config(config: &ProviderConfig, quill: &QuillConfig) -> Self {
        let provider = Self::new(config.clone(), quill.get_api_key(config)).with_backoff(
            BackoffPolicy::from_config(config.max_retries, &quill.retry),
        );
        if quill.proxy.enabled {
            provider.with_proxy(&quill.proxy)
        } else {
            provider
        }
    }

    /// Routes requests through the proxy; any API key is dropped.
    #[must_use]
    pub fn with_proxy(mut self, proxy: &ProxyConfig) -> Self {
        self.endpoint = proxy.endpoint_for(&self.config.id);
        self.api_key = None;
        self.proxied = true;
        self
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Overrides the HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether requests are routed through the proxy.
    pub fn is_proxied(&self) -> bool {
        self.proxied
    }

    /// Name reported when credentials are missing.
    fn key_name(&self) -> String {
        self.config
            .api_key_env
            .clone()
            .unwrap_or_else(|| format!("api_keys.{}", self.config.id))
    }

    /// Performs one HTTP attempt under the per-attempt timeout.
    async fn attempt(&self, body: &ChatRequest) -> Result<(String, Option<TokenUsage>)> {
        let timeout_ms = self.config.timeout_ms;
        let response = timeout(Duration::from_millis(timeout_ms), self.send(body))
            .await
            .map_err(|_elapsed| Error::Timeout(timeout_ms))??;

        let text = response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                Error::InvalidResponse(format!("{} returned no completion", self.config.id))
            })?;

        Ok((text, response.usage.and_then(ChatUsage::into_token_usage)))
    }

    /// Sends the request and decodes a successful body.
    async fn send(&self, body: &ChatRequest) -> Result<ChatResponse> {
        let mut builder = self.client.post(&self.endpoint).json(body);
        if let Some(key) = self.api_key.as_ref().filter(|_| !self.proxied) {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| self.classify(error))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());
            return Err(Error::provider(
                &self.config.id,
                format!("HTTP {status}: {error_text}"),
            ));
        }

        response.json::<ChatResponse>().await.map_err(|error| {
            Error::InvalidResponse(format!(
                "failed to parse {} response: {error}",
                self.config.id
            ))
        })
    }

    /// Maps transport failures onto the error taxonomy.
    fn classify(&self, error: ReqwestError) -> Error {
        if error.is_timeout() {
            Error::Timeout(self.config.timeout_ms)
        } else if error.is_connect() {
            Error::Network(format!("{}: {error}", self.config.id))
        } else {
            Error::Request(error)
        }
    }
}

/// Request payload for the chat completions API.
#[derive(Debug, Serialize)]
struct ChatRequest {
    /// Model identifier.
    model: String,
    /// System and user messages.
    messages: Vec<ChatMessage>,
    /// Sampling temperature.
    temperature: f32,
    /// Completion length limit.
    max_tokens: u32,
}

/// Response payload returned by the chat completions API.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    /// Candidate completions.
    #[serde(default)]
    choices: Vec<ChatChoice>,
    /// Token accounting, absent on some compatible services.
    #[serde(default)]
    usage: Option<ChatUsage>,
}

/// A single completion choice.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    /// Generated message.
    message: ChatResponseMessage,
}

/// Generated message body.
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    /// Generated text, may be null.
    #[serde(default)]
    content: Option<String>,
}

/// Token usage as reported by the service.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatUsage {
    /// Prompt tokens.
    prompt_tokens: u64,
    /// Completion tokens.
    completion_tokens: u64,
    /// Total tokens.
    total_tokens: u64,
}

impl ChatUsage {
    /// Reported usage, or `None` when the service reported zeros.
    fn into_token_usage(self) -> Option<TokenUsage> {
        let usage = TokenUsage::reported(
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens,
        );
        (usage.total > 0).then_some(usage)
    }
}

#[async_trait]
impl ProviderClient for OpenAiCompatibleProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    async fn is_available(&self) -> bool {
        self.config.enabled && (self.proxied || self.api_key.is_some())
    }

    async fn call(&self, request: &GenerationRequest) -> Result<ProviderResponse> {
        if !self.config.enabled {
            return Err(Error::Config(format!(
                "provider {} is disabled",
                self.config.id
            )));
        }
        if !self.proxied && self.api_key.is_none() {
            return Err(Error::MissingApiKey(self.key_name()));
        }

        let body = ChatRequest {
            model: self.config.model_id.clone(),
            messages: build_messages(request),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let start = Instant::now();
        debug!("Calling {} at {}", self.config.id, self.endpoint);
        let ((text, usage), attempts) = self
            .backoff
            .retry(&self.config.id, |_| self.attempt(&body))
            .await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        // Services that omit usage are billed by the chars / 4 heuristic.
        let tokens = usage.unwrap_or_else(|| TokenUsage::estimate_from_text(&text));
        let cost_usd = tokens.cost_usd(self.config.cost_per_1k_tokens);

        info!(
            "{} answered in {}ms after {} attempt(s), {} tokens{}",
            self.config.id,
            latency_ms,
            attempts,
            tokens.total,
            if tokens.estimated { " (estimated)" } else { "" }
        );

        Ok(ProviderResponse {
            text,
            model_id: self.config.model_id.clone(),
            tokens,
            cost_usd,
            latency_ms,
            attempts,
        })
    }
}
