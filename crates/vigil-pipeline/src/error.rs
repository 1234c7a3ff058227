use vigil_graph::GraphError;

/// Errors raised while building or starting a pipeline.
///
/// None of these are raised once the pipeline runs; runtime failures travel
/// on the error stream returned by `start`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
  /// The pipeline has no vertices.
  #[error("no stage loaded")]
  NoStageLoaded,

  /// Graph construction or validation failed.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// A parent had no output left to hand to this vertex.
  #[error("vertex '{vertex}' has no output to read from parent '{parent}'")]
  MissingParentOutput { vertex: String, parent: String },

  /// A vertex with parents ended up with nothing to merge.
  #[error("vertex '{vertex}' has an empty input merge")]
  EmptyMerge { vertex: String },

  /// The pipeline was already wired; clone or split it before initializing.
  #[error("pipeline '{pipeline}' is already wired")]
  AlreadyWired { pipeline: String },

  #[error("pipeline '{pipeline}' is already running")]
  AlreadyRunning { pipeline: String },

  #[error("pipeline '{pipeline}' was closed")]
  Closed { pipeline: String },

  /// Cancelled while waiting for the startup barrier.
  #[error("pipeline start cancelled")]
  Cancelled,
}
