use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error returned by user-supplied worker logic.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// A failure reported on a worker's error stream.
///
/// Carries the name of the worker that reported it. Adapters start with their
/// own kind as the name; the pipeline engine retags errors with the vertex name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("worker '{worker}': {message}")]
pub struct WorkerError {
  pub worker: String,
  pub message: String,
}

impl WorkerError {
  pub fn new(worker: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      worker: worker.into(),
      message: message.into(),
    }
  }

  /// Build from a boxed error raised by worker logic.
  pub fn from_source(worker: impl Into<String>, source: &(dyn StdError + Send + Sync)) -> Self {
    Self::new(worker, source.to_string())
  }

  /// Replace the reporting worker's name.
  pub fn in_worker(mut self, worker: impl Into<String>) -> Self {
    self.worker = worker.into();
    self
  }
}

/// The downstream side of an output has gone away or the run was cancelled.
///
/// Adapters treat this as normal termination, not as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("output closed")]
pub struct Closed;

/// True if `err` is (or wraps) a [`Closed`] signal.
pub(crate) fn is_closed(err: &BoxError) -> bool {
  err.downcast_ref::<Closed>().is_some()
}
