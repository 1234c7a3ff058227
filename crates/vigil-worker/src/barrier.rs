//! Startup barrier.
//!
//! Every worker registers with [`Barrier::initializing`] while it is being
//! started, then calls [`Barrier::initialized`] once it is listening on its
//! input. The engine calls [`Barrier::synchronize`] once after starting every
//! worker: it waits for all registrations to arrive and then releases every
//! waiting worker at once. No worker emits before the release, so a fast
//! upstream cannot push into a downstream that is not yet subscribed.
//!
//! A barrier is single use. Calling `synchronize` twice, or registering after
//! `synchronize`, panics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

#[derive(Clone, Default)]
pub struct Barrier {
  inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
  pending: AtomicUsize,
  arrived: Notify,
  released: CancellationToken,
  synchronized: AtomicBool,
}

impl Barrier {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a participant.
  pub fn initializing(&self) {
    if self.inner.synchronized.load(Ordering::SeqCst) {
      panic!("barrier: initializing() called after synchronize()");
    }
    self.inner.pending.fetch_add(1, Ordering::SeqCst);
  }

  /// Mark a registered participant as subscribed and wait for the release.
  ///
  /// The arrival is recorded when this is called, not when the returned future
  /// is first polled.
  pub fn initialized(&self) -> WaitForCancellationFuture<'_> {
    let previous = self
      .inner
      .pending
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    if previous.is_err() {
      panic!("barrier: initialized() called without a matching initializing()");
    }
    self.inner.arrived.notify_waiters();
    self.inner.released.cancelled()
  }

  /// Wait for every registered participant, then release them all.
  pub async fn synchronize(&self) {
    if self.inner.synchronized.swap(true, Ordering::SeqCst) {
      panic!("barrier: synchronize() called more than once");
    }
    loop {
      let arrived = self.inner.arrived.notified();
      if self.inner.pending.load(Ordering::SeqCst) == 0 {
        break;
      }
      arrived.await;
    }
    self.inner.released.cancel();
  }

  /// Participants registered but not yet subscribed.
  pub fn pending(&self) -> usize {
    self.inner.pending.load(Ordering::SeqCst)
  }

  pub fn is_released(&self) -> bool {
    self.inner.released.is_cancelled()
  }
}

impl std::fmt::Debug for Barrier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Barrier")
      .field("pending", &self.pending())
      .field("released", &self.is_released())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_release_waits_for_every_participant() {
    let barrier = Barrier::new();
    barrier.initializing();
    barrier.initializing();

    let b = barrier.clone();
    let first = tokio::spawn(async move { b.initialized().await });

    let sync = {
      let b = barrier.clone();
      tokio::spawn(async move { b.synchronize().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!barrier.is_released());
    assert_eq!(barrier.pending(), 1);

    let b = barrier.clone();
    let second = tokio::spawn(async move { b.initialized().await });

    sync.await.unwrap();
    first.await.unwrap();
    second.await.unwrap();
    assert!(barrier.is_released());
  }

  #[tokio::test]
  async fn test_no_participants_releases_immediately() {
    let barrier = Barrier::new();
    barrier.synchronize().await;
    assert!(barrier.is_released());
  }

  #[tokio::test]
  #[should_panic(expected = "more than once")]
  async fn test_double_synchronize_panics() {
    let barrier = Barrier::new();
    barrier.synchronize().await;
    barrier.synchronize().await;
  }

  #[tokio::test]
  #[should_panic(expected = "after synchronize")]
  async fn test_register_after_synchronize_panics() {
    let barrier = Barrier::new();
    barrier.synchronize().await;
    barrier.initializing();
  }
}
