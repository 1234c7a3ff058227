use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read pipeline file: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to parse pipeline definition: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("stage name must not be empty")]
  EmptyStageName,

  #[error("duplicate stage name: {0}")]
  DuplicateStage(String),

  #[error("stage '{stage}' lists itself as a parent")]
  SelfParent { stage: String },

  #[error("invalid engine setting '{field}': {message}")]
  InvalidSetting { field: String, message: String },
}
