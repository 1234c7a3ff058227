use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("vertex not found: {0}")]
  VertexNotFound(String),

  #[error("vertex already exists: {0}")]
  VertexAlreadyExists(String),

  #[error("parent '{parent}' of vertex '{vertex}' not found")]
  ParentNotFound { vertex: String, parent: String },

  #[error("cycle detected through vertex: {0}")]
  CycleDetected(String),
}
