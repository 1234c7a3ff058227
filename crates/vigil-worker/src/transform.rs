use std::future::Future;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, error, warn};

use crate::context::RunContext;
use crate::error::{BoxError, WorkerError, is_closed};
use crate::stream::{ErrorStream, ItemStream};
use crate::worker::{DEFAULT_CAPACITY, Emitter, Ports, Worker, error_channel};

/// Per-item transform. May emit zero, one or many items for each input,
/// which covers filtering and expansion.
#[async_trait]
pub trait Transform<T>: Send + 'static {
  async fn transform(&mut self, item: T, out: &Emitter<T>) -> Result<(), BoxError>;
}

/// [`Transform`] backed by an async closure.
pub struct TransformFn<F>(F);

pub fn transform_fn<F>(f: F) -> TransformFn<F> {
  TransformFn(f)
}

#[async_trait]
impl<T, F, Fut> Transform<T> for TransformFn<F>
where
  T: Send + 'static,
  F: FnMut(T, Emitter<T>) -> Fut + Send + 'static,
  Fut: Future<Output = Result<(), BoxError>> + Send,
{
  async fn transform(&mut self, item: T, out: &Emitter<T>) -> Result<(), BoxError> {
    (self.0)(item, out.clone()).await
  }
}

/// 1:1 worker: runs a [`Transform`] over every input item.
///
/// A failed item is reported and skipped; the stream keeps flowing.
pub struct TransformWorker<T, F> {
  name: String,
  transform: Option<F>,
  ports: Ports<T>,
}

impl<T, F> TransformWorker<T, F>
where
  T: Send + 'static,
  F: Transform<T>,
{
  pub fn new(transform: F) -> Self {
    Self::with_capacity(transform, DEFAULT_CAPACITY)
  }

  pub fn with_capacity(transform: F, capacity: usize) -> Self {
    Self {
      name: "transform".to_string(),
      transform: Some(transform),
      ports: Ports::new(capacity),
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }
}

impl<T, F> Worker<T> for TransformWorker<T, F>
where
  T: Send + 'static,
  F: Transform<T>,
{
  fn set_input(&mut self, input: ItemStream<T>) {
    self.ports.set_input(input);
  }

  fn output(&mut self) -> ItemStream<T> {
    self.ports.output()
  }

  fn run(&mut self, ctx: &RunContext) -> ErrorStream {
    let (input, tx) = self.ports.start();
    let (errors, error_stream) = error_channel();
    let Some(mut transform) = self.transform.take() else {
      return error_stream;
    };

    let gate = ctx.register();
    let cancel = ctx.cancel().clone();
    let name = self.name.clone();

    tokio::spawn(async move {
      let Some(mut input) = input else {
        warn!(worker = %name, "transform started without input");
        return;
      };
      if !gate.open().await {
        return;
      }

      let out = Emitter::new(tx, cancel.clone());
      loop {
        let item = tokio::select! {
          _ = cancel.cancelled() => break,
          item = input.next() => match item {
            Some(item) => item,
            None => break,
          },
        };

        match transform.transform(item, &out).await {
          Ok(()) => {}
          Err(e) if is_closed(&e) => break,
          Err(e) => {
            error!(worker = %name, error = %e, "transform failed on item");
            let _ = errors.send(WorkerError::from_source(&name, e.as_ref()));
          }
        }
      }
      debug!(worker = %name, "transform finished");
    });

    error_stream
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::stream;
  use tokio_util::sync::CancellationToken;

  #[tokio::test]
  async fn test_filter_and_expand() {
    let mut worker = TransformWorker::new(transform_fn(|item: u32, out: Emitter<u32>| async move {
      for _ in 0..item % 3 {
        out.emit(item).await?;
      }
      Ok::<(), BoxError>(())
    }));
    worker.set_input(stream::iter(1..=4).boxed());
    let output = worker.output();
    let _errors = worker.run(&RunContext::standalone(CancellationToken::new()));

    assert_eq!(output.collect::<Vec<_>>().await, vec![1, 2, 2, 4]);
  }

  #[tokio::test]
  async fn test_error_skips_item_but_not_stream() {
    let mut worker = TransformWorker::new(transform_fn(|item: u32, out: Emitter<u32>| async move {
      if item == 2 {
        return Err::<(), BoxError>("bad item".into());
      }
      out.emit(item * 10).await?;
      Ok(())
    }))
    .named("scale");
    worker.set_input(stream::iter(1..=3).boxed());
    let output = worker.output();
    let errors = worker.run(&RunContext::standalone(CancellationToken::new()));

    assert_eq!(output.collect::<Vec<_>>().await, vec![10, 30]);
    assert_eq!(
      errors.collect::<Vec<_>>().await,
      vec![WorkerError::new("scale", "bad item")]
    );
  }

  #[tokio::test]
  #[should_panic(expected = "running worker")]
  async fn test_set_input_while_running_panics() {
    let mut worker = TransformWorker::new(transform_fn(|item: u32, out: Emitter<u32>| async move {
      out.emit(item).await?;
      Ok::<(), BoxError>(())
    }));
    worker.set_input(stream::iter(1..=3).boxed());
    let _errors = worker.run(&RunContext::standalone(CancellationToken::new()));
    worker.set_input(stream::iter(4..=6).boxed());
  }
}
