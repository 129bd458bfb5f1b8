//! Structured error types for the incident engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("config: {key}: {reason}")]
  Config { key: String, reason: String },

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("forward: {0}")]
  Forward(String),
}

impl EngineError {
  pub fn config(key: &str, reason: &str) -> Self {
    Self::Config {
      key: key.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn forward(msg: impl Into<String>) -> Self {
    Self::Forward(msg.into())
  }
}

impl From<reqwest::Error> for EngineError {
  fn from(e: reqwest::Error) -> Self {
    Self::Forward(e.to_string())
  }
}
