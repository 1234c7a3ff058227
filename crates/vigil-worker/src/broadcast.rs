use crate::context::RunContext;
use crate::stream::{ErrorStream, FanOut, ItemStream};
use crate::worker::Worker;

/// Wraps a worker and fans its output out to any number of subscribers.
///
/// Every subscriber receives every item, in source order, exactly once.
/// Subscribers buffer independently. Subscriptions must be taken before
/// `run`; `output()` is just another subscription.
pub struct Broadcaster<T, W> {
  inner: W,
  fan_out: Option<FanOut<T>>,
}

impl<T, W> Broadcaster<T, W>
where
  T: Clone + Send + 'static,
  W: Worker<T>,
{
  pub fn new(mut inner: W) -> Self {
    let source = inner.output();
    Self {
      inner,
      fan_out: Some(FanOut::new(source)),
    }
  }

  /// A new subscriber stream.
  ///
  /// # Panics
  ///
  /// If the broadcaster is already running.
  pub fn subscribe(&mut self) -> ItemStream<T> {
    match self.fan_out.as_mut() {
      Some(fan_out) => fan_out.branch(),
      None => panic!("subscribe called on a running broadcaster"),
    }
  }

  pub fn subscribers(&self) -> usize {
    self.fan_out.as_ref().map_or(0, FanOut::branch_count)
  }
}

impl<T, W> Worker<T> for Broadcaster<T, W>
where
  T: Clone + Send + 'static,
  W: Worker<T>,
{
  fn set_input(&mut self, input: ItemStream<T>) {
    self.inner.set_input(input);
  }

  fn output(&mut self) -> ItemStream<T> {
    self.subscribe()
  }

  fn run(&mut self, ctx: &RunContext) -> ErrorStream {
    let errors = self.inner.run(ctx);
    if let Some(fan_out) = self.fan_out.take() {
      fan_out.spawn(ctx.cancel().clone());
    }
    errors
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::producer::ProducerWorker;
  use futures::StreamExt;
  use tokio_util::sync::CancellationToken;

  #[tokio::test]
  async fn test_each_subscriber_gets_full_sequence() {
    let mut broadcaster = Broadcaster::new(ProducerWorker::from_items(0..100u32));
    let subscribers: Vec<_> = (0..4).map(|_| broadcaster.subscribe()).collect();
    assert_eq!(broadcaster.subscribers(), 4);

    let _errors = broadcaster.run(&RunContext::standalone(CancellationToken::new()));

    let all = futures::future::join_all(
      subscribers
        .into_iter()
        .map(|s| s.collect::<Vec<_>>()),
    )
    .await;
    for items in all {
      assert_eq!(items, (0..100).collect::<Vec<_>>());
    }
  }

  #[tokio::test]
  async fn test_slow_subscriber_does_not_block_fast_one() {
    let mut broadcaster = Broadcaster::new(ProducerWorker::from_items(0..500u32));
    let fast = broadcaster.subscribe();
    let slow = broadcaster.subscribe();
    let _errors = broadcaster.run(&RunContext::standalone(CancellationToken::new()));

    // the fast subscriber finishes while nobody reads the slow one
    let items: Vec<u32> = fast.collect().await;
    assert_eq!(items.len(), 500);
    assert_eq!(slow.collect::<Vec<_>>().await.len(), 500);
  }
}
