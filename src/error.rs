//! Error types for the content adapters and the wizard.

use thiserror::Error;

use crate::wizard::Step;

/// Failures surfaced to the learner by the content request adapter.
/// A malformed model reply is not one of these: it is replaced by fallback content.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContentError {
  #[error("API key is required")]
  MissingApiKey,
  #[error("Network error: {0}")]
  Transport(String),
  #[error("HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("Provider error: {0}")]
  Provider(String),
  #[error("Unexpected response format: {0}")]
  Format(String),
}

impl From<reqwest::Error> for ContentError {
  fn from(e: reqwest::Error) -> Self {
    // reqwest puts the full URL in its Display output; for Gemini that carries the key.
    ContentError::Transport(e.without_url().to_string())
  }
}

pub type ContentResult<T> = Result<T, ContentError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WizardError {
  #[error("Invalid profile: {0}")]
  InvalidProfile(String),
  #[error("Unknown subject: {0}")]
  UnknownSubject(String),
  #[error("Unknown topic '{topic}' for subject '{subject}'")]
  UnknownTopic { subject: String, topic: String },
  #[error("Invalid topic: {0}")]
  InvalidTopic(String),
  #[error("Cannot {action} from the {from} step")]
  InvalidTransition { from: Step, action: &'static str },
  #[error("No API key stored for {0}")]
  MissingCredential(String),
  #[error("Missing {0}; complete the previous steps first")]
  Incomplete(&'static str),
  #[error("No quiz in progress")]
  NoQuiz,
  #[error("Unknown session: {0}")]
  UnknownSession(String),
}
