use tokio_util::sync::CancellationToken;

use crate::barrier::Barrier;

/// Execution scope handed to [`crate::Worker::run`].
///
/// Holds the cancellation token shared by every worker of a run and, when
/// running inside a pipeline, the startup barrier.
#[derive(Debug, Clone)]
pub struct RunContext {
  cancel: CancellationToken,
  barrier: Option<Barrier>,
}

impl RunContext {
  /// A scope gated by `barrier`.
  pub fn new(cancel: CancellationToken, barrier: Barrier) -> Self {
    Self {
      cancel,
      barrier: Some(barrier),
    }
  }

  /// A scope without a startup barrier; workers start emitting immediately.
  pub fn standalone(cancel: CancellationToken) -> Self {
    Self {
      cancel,
      barrier: None,
    }
  }

  pub fn cancel(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn barrier(&self) -> Option<&Barrier> {
    self.barrier.as_ref()
  }

  /// Register as a barrier participant.
  ///
  /// Must be called synchronously from `run`, before any task is spawned, so
  /// the registration is visible before the engine synchronizes.
  pub fn register(&self) -> Gate {
    if let Some(barrier) = &self.barrier {
      barrier.initializing();
    }
    Gate {
      barrier: self.barrier.clone(),
      cancel: self.cancel.clone(),
    }
  }
}

/// A registered barrier participation, opened from inside the worker task.
///
/// Dropping an unopened gate still records the arrival so the barrier cannot
/// stall on a worker that exited early.
#[must_use = "a registered gate must be opened or dropped"]
pub struct Gate {
  barrier: Option<Barrier>,
  cancel: CancellationToken,
}

impl Gate {
  /// Signal that the input is wired and wait for the release.
  ///
  /// Returns `false` if the run was cancelled first.
  pub async fn open(mut self) -> bool {
    let Some(barrier) = self.barrier.take() else {
      return !self.cancel.is_cancelled();
    };
    let released = barrier.initialized();
    tokio::select! {
      _ = released => true,
      _ = self.cancel.cancelled() => false,
    }
  }
}

impl Drop for Gate {
  fn drop(&mut self) {
    if let Some(barrier) = self.barrier.take() {
      drop(barrier.initialized());
    }
  }
}
