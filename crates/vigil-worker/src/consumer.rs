use std::future::Future;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, error, warn};

use crate::context::RunContext;
use crate::error::{BoxError, WorkerError};
use crate::stream::{ErrorStream, ItemStream, closed};
use crate::worker::{Ports, Worker, error_channel};

/// Terminal sink handling one item at a time.
#[async_trait]
pub trait Consume<T>: Send + 'static {
  async fn consume(&mut self, item: T) -> Result<(), BoxError>;
}

/// [`Consume`] backed by an async closure.
pub struct ConsumeFn<F>(F);

pub fn consume_fn<F>(f: F) -> ConsumeFn<F> {
  ConsumeFn(f)
}

#[async_trait]
impl<T, F, Fut> Consume<T> for ConsumeFn<F>
where
  T: Send + 'static,
  F: FnMut(T) -> Fut + Send + 'static,
  Fut: Future<Output = Result<(), BoxError>> + Send,
{
  async fn consume(&mut self, item: T) -> Result<(), BoxError> {
    (self.0)(item).await
  }
}

/// What a consumer does after a failed item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
  /// Report the failure and keep draining.
  #[default]
  Continue,
  /// Report the failure and stop the worker.
  Stop,
}

/// Worker without output: drains its input into a [`Consume`].
pub struct ConsumerWorker<T, C> {
  name: String,
  consumer: Option<C>,
  policy: ErrorPolicy,
  ports: Ports<T>,
}

impl<T, C> ConsumerWorker<T, C>
where
  T: Send + 'static,
  C: Consume<T>,
{
  pub fn new(consumer: C) -> Self {
    Self {
      name: "consumer".to_string(),
      consumer: Some(consumer),
      policy: ErrorPolicy::default(),
      ports: Ports::new(1),
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
    self.policy = policy;
    self
  }
}

impl<T, C> Worker<T> for ConsumerWorker<T, C>
where
  T: Send + 'static,
  C: Consume<T>,
{
  fn set_input(&mut self, input: ItemStream<T>) {
    self.ports.set_input(input);
  }

  /// Consumers never emit; the stream is closed from the start.
  fn output(&mut self) -> ItemStream<T> {
    closed()
  }

  fn run(&mut self, ctx: &RunContext) -> ErrorStream {
    let (input, _tx) = self.ports.start();
    let (errors, error_stream) = error_channel();
    let Some(mut consumer) = self.consumer.take() else {
      return error_stream;
    };

    let gate = ctx.register();
    let cancel = ctx.cancel().clone();
    let name = self.name.clone();
    let policy = self.policy;

    tokio::spawn(async move {
      let Some(mut input) = input else {
        warn!(worker = %name, "consumer started without input");
        return;
      };
      if !gate.open().await {
        return;
      }

      loop {
        let item = tokio::select! {
          _ = cancel.cancelled() => break,
          item = input.next() => match item {
            Some(item) => item,
            None => break,
          },
        };

        if let Err(e) = consumer.consume(item).await {
          error!(worker = %name, error = %e, "consumer failed on item");
          let _ = errors.send(WorkerError::from_source(&name, e.as_ref()));
          if policy == ErrorPolicy::Stop {
            break;
          }
        }
      }
      debug!(worker = %name, "consumer drained");
    });

    error_stream
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};

  use futures::stream;
  use tokio_util::sync::CancellationToken;

  fn recording(
    seen: Arc<Mutex<Vec<u32>>>,
  ) -> ConsumeFn<impl FnMut(u32) -> futures::future::Ready<Result<(), BoxError>> + Send + 'static>
  {
    consume_fn(move |item: u32| {
      seen.lock().unwrap().push(item);
      let result: Result<(), BoxError> = if item % 2 == 0 {
        Err(format!("rejected {item}").into())
      } else {
        Ok(())
      };
      futures::future::ready(result)
    })
  }

  #[tokio::test]
  async fn test_failures_do_not_stop_draining() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut worker = ConsumerWorker::new(recording(seen.clone())).named("sink");
    worker.set_input(stream::iter(1..=5).boxed());

    let mut output = worker.output();
    assert_eq!(output.next().await, None);

    let errors: Vec<_> = worker
      .run(&RunContext::standalone(CancellationToken::new()))
      .collect()
      .await;
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(
      errors,
      vec![
        WorkerError::new("sink", "rejected 2"),
        WorkerError::new("sink", "rejected 4"),
      ]
    );
  }

  #[tokio::test]
  async fn test_stop_policy_halts_on_first_failure() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut worker = ConsumerWorker::new(recording(seen.clone())).with_policy(ErrorPolicy::Stop);
    worker.set_input(stream::iter(1..=5).boxed());

    let errors: Vec<_> = worker
      .run(&RunContext::standalone(CancellationToken::new()))
      .collect()
      .await;
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(errors.len(), 1);
  }
}
