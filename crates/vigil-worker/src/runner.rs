use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::context::RunContext;
use crate::error::{BoxError, WorkerError, is_closed};
use crate::stream::{ErrorStream, ItemStream, closed};
use crate::worker::{DEFAULT_CAPACITY, Emitter, Ports, Worker, error_channel};

/// Free-form processing: owns the whole input stream and decides itself what
/// to emit and when. Must return promptly once `cancel` fires.
#[async_trait]
pub trait Runner<T>: Send + 'static {
  async fn run(
    &mut self,
    input: ItemStream<T>,
    out: Emitter<T>,
    cancel: CancellationToken,
  ) -> Result<(), BoxError>;
}

/// [`Runner`] backed by an async closure.
pub struct RunnerFn<F>(F);

pub fn runner_fn<F>(f: F) -> RunnerFn<F> {
  RunnerFn(f)
}

#[async_trait]
impl<T, F, Fut> Runner<T> for RunnerFn<F>
where
  T: Send + 'static,
  F: FnMut(ItemStream<T>, Emitter<T>, CancellationToken) -> Fut + Send + 'static,
  Fut: Future<Output = Result<(), BoxError>> + Send,
{
  async fn run(
    &mut self,
    input: ItemStream<T>,
    out: Emitter<T>,
    cancel: CancellationToken,
  ) -> Result<(), BoxError> {
    (self.0)(input, out, cancel).await
  }
}

/// Worker wrapping a [`Runner`]. An unbound input is seen as an empty stream.
pub struct RunnerWorker<T, R> {
  name: String,
  runner: Option<R>,
  ports: Ports<T>,
}

impl<T, R> RunnerWorker<T, R>
where
  T: Send + 'static,
  R: Runner<T>,
{
  pub fn new(runner: R) -> Self {
    Self::with_capacity(runner, DEFAULT_CAPACITY)
  }

  pub fn with_capacity(runner: R, capacity: usize) -> Self {
    Self {
      name: "runner".to_string(),
      runner: Some(runner),
      ports: Ports::new(capacity),
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }
}

impl<T, R> Worker<T> for RunnerWorker<T, R>
where
  T: Send + 'static,
  R: Runner<T>,
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
    let Some(mut runner) = self.runner.take() else {
      return error_stream;
    };

    let gate = ctx.register();
    let cancel = ctx.cancel().clone();
    let name = self.name.clone();

    tokio::spawn(async move {
      if !gate.open().await {
        return;
      }
      let input = input.unwrap_or_else(closed);
      let out = Emitter::new(tx, cancel.clone());
      match runner.run(input, out, cancel).await {
        Err(e) if !is_closed(&e) => {
          error!(worker = %name, error = %e, "runner failed");
          let _ = errors.send(WorkerError::from_source(&name, e.as_ref()));
        }
        _ => debug!(worker = %name, "runner finished"),
      }
    });

    error_stream
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::{StreamExt, stream};

  #[tokio::test]
  async fn test_runner_batches_input() {
    // emits the running total after every pair of items
    let mut worker = RunnerWorker::new(runner_fn(
      |mut input: ItemStream<u32>, out: Emitter<u32>, _cancel: CancellationToken| async move {
        let mut total = 0;
        let mut count = 0;
        while let Some(item) = input.next().await {
          total += item;
          count += 1;
          if count % 2 == 0 {
            out.emit(total).await?;
          }
        }
        Ok::<(), BoxError>(())
      },
    ));
    worker.set_input(stream::iter(1..=5).boxed());
    let output = worker.output();
    let _errors = worker.run(&RunContext::standalone(CancellationToken::new()));

    assert_eq!(output.collect::<Vec<_>>().await, vec![3, 10]);
  }

  #[tokio::test]
  async fn test_runner_error_is_reported() {
    let mut worker = RunnerWorker::new(runner_fn(
      |_input: ItemStream<u8>, _out: Emitter<u8>, _cancel: CancellationToken| async move {
        Err::<(), BoxError>("container exited with status 2".into())
      },
    ))
    .named("shell");
    let errors: Vec<_> = worker
      .run(&RunContext::standalone(CancellationToken::new()))
      .collect()
      .await;
    assert_eq!(
      errors,
      vec![WorkerError::new("shell", "container exited with status 2")]
    );
  }
}
