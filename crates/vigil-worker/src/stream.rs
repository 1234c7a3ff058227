//! Stream plumbing shared by workers and the pipeline engine.

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::WorkerError;

/// A boxed, owned stream of items passed between workers.
pub type ItemStream<T> = BoxStream<'static, T>;

/// The stream of terminal failures returned by [`crate::Worker::run`].
pub type ErrorStream = ItemStream<WorkerError>;

/// A stream that is already finished.
pub fn closed<T: Send + 'static>() -> ItemStream<T> {
  stream::empty().boxed()
}

/// N-way merge.
///
/// Every item of every upstream is yielded once. Order is preserved per
/// upstream; interleaving between upstreams is unspecified. The merged stream
/// ends after all upstreams end.
pub fn merge<T: Send + 'static>(streams: Vec<ItemStream<T>>) -> ItemStream<T> {
  match streams.len() {
    0 => closed(),
    1 => streams.into_iter().next().unwrap_or_else(closed),
    _ => stream::select_all(streams).boxed(),
  }
}

/// One-to-many fan-out of a single source.
///
/// Each branch has its own unbounded buffer, so a slow branch never holds back
/// the others. Branches must be taken before [`FanOut::spawn`]. Dropped
/// branches are pruned; the pump stops once every branch is gone, the source
/// ends, or the token is cancelled.
pub struct FanOut<T> {
  source: ItemStream<T>,
  branches: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone + Send + 'static> FanOut<T> {
  pub fn new(source: ItemStream<T>) -> Self {
    Self {
      source,
      branches: Vec::new(),
    }
  }

  /// Add a subscriber receiving every source item in order.
  pub fn branch(&mut self) -> ItemStream<T> {
    let (tx, rx) = mpsc::unbounded_channel();
    self.branches.push(tx);
    UnboundedReceiverStream::new(rx).boxed()
  }

  /// Split into `n` branches and start pumping immediately.
  pub fn split(source: ItemStream<T>, n: usize, cancel: CancellationToken) -> Vec<ItemStream<T>> {
    let mut fan_out = Self::new(source);
    let branches = (0..n).map(|_| fan_out.branch()).collect();
    fan_out.spawn(cancel);
    branches
  }

  pub fn branch_count(&self) -> usize {
    self.branches.len()
  }

  pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(self.pump(cancel))
  }

  async fn pump(mut self, cancel: CancellationToken) {
    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        item = self.source.next() => match item {
          Some(item) => {
            self.branches.retain(|tx| tx.send(item.clone()).is_ok());
            if self.branches.is_empty() {
              trace!("fan-out has no subscribers left");
              break;
            }
          }
          None => break,
        },
      }
    }
  }
}
