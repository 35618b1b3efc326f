//! Loading app configuration (prompts + provider endpoints + extra topics) from TOML.
//!
//! See `AppConfig` and `Prompts` for expected schema. Every section is optional; the
//! defaults are enough to talk to the public Gemini and OpenAI endpoints.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Difficulty;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub providers: ProvidersCfg,
  #[serde(default)]
  pub topics: Vec<TopicCfg>,
  #[serde(default = "default_timeout_secs")]
  pub request_timeout_secs: u64,
  /// HTTP-created sessions untouched for this long are dropped (keys included).
  #[serde(default = "default_session_ttl_secs")]
  pub session_idle_ttl_secs: u64,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      providers: ProvidersCfg::default(),
      topics: Vec::new(),
      request_timeout_secs: default_timeout_secs(),
      session_idle_ttl_secs: default_session_ttl_secs(),
    }
  }
}

fn default_timeout_secs() -> u64 { 60 }
fn default_session_ttl_secs() -> u64 { 30 * 60 }

/// Extra catalog topic accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct TopicCfg {
  #[serde(default)] pub id: Option<String>,
  pub subject_id: String,
  pub name: String,
  #[serde(default)] pub description: Option<String>,
  #[serde(default)] pub difficulty: Option<Difficulty>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ProvidersCfg {
  #[serde(default)]
  pub gemini: GeminiCfg,
  #[serde(default)]
  pub openai: OpenAiCfg,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeminiCfg {
  #[serde(default = "GeminiCfg::default_base_url")]
  pub base_url: String,
  #[serde(default = "GeminiCfg::default_model")]
  pub model: String,
}

impl GeminiCfg {
  fn default_base_url() -> String { "https://generativelanguage.googleapis.com".into() }
  fn default_model() -> String { "gemini-1.5-flash".into() }
}

impl Default for GeminiCfg {
  fn default() -> Self {
    Self { base_url: Self::default_base_url(), model: Self::default_model() }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct OpenAiCfg {
  #[serde(default = "OpenAiCfg::default_base_url")]
  pub base_url: String,
  #[serde(default = "OpenAiCfg::default_model")]
  pub model: String,
  #[serde(default = "OpenAiCfg::default_temperature")]
  pub temperature: f32,
  #[serde(default = "OpenAiCfg::default_max_tokens")]
  pub max_tokens: u32,
}

impl OpenAiCfg {
  fn default_base_url() -> String { "https://api.openai.com".into() }
  fn default_model() -> String { "gpt-4o-mini".into() }
  fn default_temperature() -> f32 { 0.7 }
  fn default_max_tokens() -> u32 { 4000 }
}

impl Default for OpenAiCfg {
  fn default() -> Self {
    Self {
      base_url: Self::default_base_url(),
      model: Self::default_model(),
      temperature: Self::default_temperature(),
      max_tokens: Self::default_max_tokens(),
    }
  }
}

/// Prompt templates. Placeholders: `{name}`, `{age}`, `{grade}`, `{interests}`,
/// `{subject}`, `{topic}`, `{topic_description}`, `{difficulty}`, `{count}`, `{schema}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub lesson_template: String,
  pub quiz_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are a friendly, encouraging teacher who writes age-appropriate educational content. Respond ONLY with valid JSON.".into(),
      lesson_template: "Create an educational lesson for {name}, a {age} year old student in grade {grade}, about \"{topic}\" ({topic_description}, {difficulty} level) in {subject}.\n\
The student is interested in {interests}; connect examples to those interests where it helps.\n\
Include a title, an introduction, 4-6 sections (each with a title, content, an optional worked example and an optional activity of type question, exercise or experiment with an optional solution and hints), a summary, and related topics.\n\
You may also add worksheets, image descriptions, interactive exercises and video suggestions.\n\
Return ONLY a JSON object matching this schema:\n{schema}".into(),
      quiz_template: "Create a quiz of exactly {count} questions for {name}, a {age} year old student in grade {grade}, about \"{topic}\" in {subject} ({difficulty} level).\n\
The student is interested in {interests}.\n\
Mix multiple-choice, true-false and short-answer questions. For multiple-choice, correctAnswer is the 0-based index of the right option; otherwise it is the answer text (\"True\"/\"False\" for true-false).\n\
Return ONLY a JSON array matching this schema:\n{schema}".into(),
    }
  }
}

/// Attempt to load `AppConfig` from APP_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("APP_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "learniverse", %path, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "learniverse", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "learniverse", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Config file (or defaults) with provider endpoint/model env overrides applied on top.
pub fn load_config() -> AppConfig {
  let mut cfg = load_app_config_from_env().unwrap_or_default();
  apply_env_overrides(&mut cfg, |k| std::env::var(k).ok());
  cfg
}

fn apply_env_overrides(cfg: &mut AppConfig, get: impl Fn(&str) -> Option<String>) {
  if let Some(v) = get("GEMINI_BASE_URL") { cfg.providers.gemini.base_url = v; }
  if let Some(v) = get("GEMINI_MODEL") { cfg.providers.gemini.model = v; }
  if let Some(v) = get("OPENAI_BASE_URL") { cfg.providers.openai.base_url = v; }
  if let Some(v) = get("OPENAI_MODEL") { cfg.providers.openai.model = v; }
}
