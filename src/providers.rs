//! Minimal clients for the two text-generation providers.
//!
//! Both expose the same `TextGenerator` capability: turn one prompt into free text, and
//! check that a key is accepted. Calls are instrumented and log model names, latencies and
//! response sizes (not contents).
//!
//! NOTE: We never log the API key. Gemini carries it in the query string, so request URLs
//! are never logged either and transport errors are stripped of their URL.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::{AppConfig, GeminiCfg, OpenAiCfg};
use crate::domain::ProviderKind;
use crate::error::{ContentError, ContentResult};
use crate::util::trunc_for_log;

const UA: &str = "learniverse-backend/0.1";

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
  /// One completion for `prompt`. Returns the raw model text (not yet parsed).
  async fn generate(&self, prompt: &str) -> ContentResult<String>;

  /// One lightweight authorized GET; true iff the provider answered 2xx.
  async fn validate_key(&self) -> bool;
}

/// Client settings shared by every provider call (timeout, user agent).
pub fn http_client_builder(timeout_secs: u64) -> reqwest::ClientBuilder {
  reqwest::Client::builder()
    .timeout(Duration::from_secs(timeout_secs))
    .user_agent(UA)
}

/// Builds the shared HTTP client used for every provider call.
pub fn build_http_client(timeout_secs: u64) -> reqwest::Client {
  http_client_builder(timeout_secs)
    .build()
    .unwrap_or_else(|e| {
      warn!(target: "learniverse", error = %e, "Falling back to default HTTP client");
      reqwest::Client::new()
    })
}

/// Provider selected by tag; dispatches to the matching client.
#[derive(Clone)]
pub enum Provider {
  Gemini(GeminiProvider),
  OpenAi(OpenAiProvider),
}

impl Provider {
  /// Client for `kind` bound to `api_key`. Fails fast with `MissingApiKey` on a blank key.
  pub fn new(kind: ProviderKind, api_key: &str, cfg: &AppConfig, client: reqwest::Client) -> ContentResult<Self> {
    let key = api_key.trim();
    if key.is_empty() {
      return Err(ContentError::MissingApiKey);
    }
    Ok(match kind {
      ProviderKind::Gemini => Provider::Gemini(GeminiProvider::new(client, key, &cfg.providers.gemini)),
      ProviderKind::OpenAi => Provider::OpenAi(OpenAiProvider::new(client, key, &cfg.providers.openai, &cfg.prompts.system)),
    })
  }

  pub fn kind(&self) -> ProviderKind {
    match self {
      Provider::Gemini(_) => ProviderKind::Gemini,
      Provider::OpenAi(_) => ProviderKind::OpenAi,
    }
  }
}

#[async_trait]
impl TextGenerator for Provider {
  async fn generate(&self, prompt: &str) -> ContentResult<String> {
    match self {
      Provider::Gemini(p) => p.generate(prompt).await,
      Provider::OpenAi(p) => p.generate(prompt).await,
    }
  }

  async fn validate_key(&self) -> bool {
    match self {
      Provider::Gemini(p) => p.validate_key().await,
      Provider::OpenAi(p) => p.validate_key().await,
    }
  }
}

/// Key check used by the api-key step. A blank key short-circuits to `false` without any
/// request; network failures and rejections are both reported as `false`.
#[instrument(level = "info", skip(client, cfg, api_key), fields(%kind, key_len = api_key.len()))]
pub async fn validate_api_key(client: &reqwest::Client, cfg: &AppConfig, kind: ProviderKind, api_key: &str) -> bool {
  match Provider::new(kind, api_key, cfg, client.clone()) {
    Ok(p) => p.validate_key().await,
    Err(_) => {
      debug!(target: "content", %kind, "Blank API key; skipping validation request");
      false
    }
  }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GeminiProvider {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
}

impl GeminiProvider {
  pub fn new(client: reqwest::Client, api_key: &str, cfg: &GeminiCfg) -> Self {
    Self {
      client,
      api_key: api_key.to_string(),
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
    }
  }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
  contents: Vec<GeminiContentReq<'a>>,
}
#[derive(Serialize)]
struct GeminiContentReq<'a> { parts: Vec<GeminiPartReq<'a>> }
#[derive(Serialize)]
struct GeminiPartReq<'a> { text: &'a str }

#[derive(Deserialize)]
struct GeminiResponse {
  #[serde(default)] candidates: Vec<GeminiCandidate>,
  #[serde(default)] error: Option<Value>,
}
#[derive(Deserialize)]
struct GeminiCandidate { #[serde(default)] content: Option<GeminiContentResp> }
#[derive(Deserialize)]
struct GeminiContentResp { #[serde(default)] parts: Vec<GeminiPartResp> }
#[derive(Deserialize)]
struct GeminiPartResp { #[serde(default)] text: Option<String> }

#[async_trait]
impl TextGenerator for GeminiProvider {
  #[instrument(level = "info", skip(self, prompt), fields(provider = "gemini", model = %self.model, prompt_len = prompt.len()))]
  async fn generate(&self, prompt: &str) -> ContentResult<String> {
    let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
    let req = GeminiRequest { contents: vec![GeminiContentReq { parts: vec![GeminiPartReq { text: prompt }] }] };

    let start = Instant::now();
    let res = self.client.post(&url)
      .query(&[("key", self.api_key.as_str())])
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await?;
    let body = read_success_body(res).await?;

    let envelope: GeminiResponse = serde_json::from_str(&body)
      .map_err(|e| ContentError::Format(format!("invalid Gemini envelope: {e}")))?;
    if let Some(err) = envelope.error {
      return Err(ContentError::Provider(error_message(&err)));
    }

    let text: String = envelope.candidates.first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect::<Vec<_>>().join(""))
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(ContentError::Format("no text in Gemini response".into()));
    }

    info!(elapsed = ?start.elapsed(), text_len = text.len(), "Gemini response received");
    Ok(text)
  }

  #[instrument(level = "info", skip(self), fields(provider = "gemini"))]
  async fn validate_key(&self) -> bool {
    let url = format!("{}/v1beta/models", self.base_url);
    match self.client.get(&url).query(&[("key", self.api_key.as_str())]).send().await {
      Ok(res) => {
        let ok = res.status().is_success();
        info!(status = res.status().as_u16(), ok, "Gemini key validation");
        ok
      }
      Err(e) => {
        warn!(error = %e.without_url(), "Gemini key validation request failed");
        false
      }
    }
  }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OpenAiProvider {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
  temperature: f32,
  max_tokens: u32,
  system: String,
}

impl OpenAiProvider {
  pub fn new(client: reqwest::Client, api_key: &str, cfg: &OpenAiCfg, system: &str) -> Self {
    Self {
      client,
      api_key: api_key.to_string(),
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
      temperature: cfg.temperature,
      max_tokens: cfg.max_tokens,
      system: system.to_string(),
    }
  }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessageReq<'a>>,
  temperature: f32,
  max_tokens: u32,
}
#[derive(Serialize)]
struct ChatMessageReq<'a> { role: &'static str, content: &'a str }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
  #[serde(default)] error: Option<Value>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

#[async_trait]
impl TextGenerator for OpenAiProvider {
  #[instrument(level = "info", skip(self, prompt), fields(provider = "openai", model = %self.model, prompt_len = prompt.len()))]
  async fn generate(&self, prompt: &str) -> ContentResult<String> {
    let url = format!("{}/v1/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: &self.model,
      messages: vec![
        ChatMessageReq { role: "system", content: &self.system },
        ChatMessageReq { role: "user", content: prompt },
      ],
      temperature: self.temperature,
      max_tokens: self.max_tokens,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;
    let body = read_success_body(res).await?;

    let envelope: ChatCompletionResponse = serde_json::from_str(&body)
      .map_err(|e| ContentError::Format(format!("invalid chat completion envelope: {e}")))?;
    if let Some(err) = envelope.error {
      return Err(ContentError::Provider(error_message(&err)));
    }
    if let Some(usage) = &envelope.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }

    let text = envelope.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(ContentError::Format("no text in chat completion response".into()));
    }

    info!(elapsed = ?start.elapsed(), text_len = text.len(), "OpenAI response received");
    Ok(text)
  }

  #[instrument(level = "info", skip(self), fields(provider = "openai"))]
  async fn validate_key(&self) -> bool {
    let url = format!("{}/v1/models", self.base_url);
    let res = self.client.get(&url)
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .send().await;
    match res {
      Ok(res) => {
        let ok = res.status().is_success();
        info!(status = res.status().as_u16(), ok, "OpenAI key validation");
        ok
      }
      Err(e) => {
        warn!(error = %e.without_url(), "OpenAI key validation request failed");
        false
      }
    }
  }
}

// ---------------------------------------------------------------------------
// Shared decoding helpers
// ---------------------------------------------------------------------------

/// Returns the body of a 2xx response; anything else becomes `ContentError::Http`
/// carrying the provider's error message when one can be extracted.
async fn read_success_body(res: reqwest::Response) -> ContentResult<String> {
  let status = res.status();
  let body = res.text().await?;
  if !status.is_success() {
    let message = serde_json::from_str::<Value>(&body).ok()
      .and_then(|v| v.get("error").map(error_message))
      .unwrap_or_else(|| trunc_for_log(body.trim(), 200));
    warn!(target: "content", status = status.as_u16(), %message, "Provider returned non-success status");
    return Err(ContentError::Http { status: status.as_u16(), message });
  }
  Ok(body)
}

/// `{"message": ...}` objects (both providers), plain strings, or the raw JSON otherwise.
fn error_message(err: &Value) -> String {
  match err {
    Value::String(s) => s.clone(),
    Value::Object(map) => map.get("message")
      .and_then(Value::as_str)
      .map(str::to_string)
      .unwrap_or_else(|| err.to_string()),
    other => other.to_string(),
  }
}
