use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::context::RunContext;
use crate::error::{BoxError, WorkerError, is_closed};
use crate::stream::{ErrorStream, ItemStream};
use crate::worker::{DEFAULT_CAPACITY, Emitter, Ports, Worker, error_channel};

/// Autonomous source of items.
#[async_trait]
pub trait Produce<T>: Send + 'static {
  /// Emit items until exhausted. Returning ends the worker's output.
  async fn produce(&mut self, out: Emitter<T>) -> Result<(), BoxError>;
}

/// [`Produce`] backed by an async closure.
pub struct ProduceFn<F>(F);

pub fn produce_fn<F>(f: F) -> ProduceFn<F> {
  ProduceFn(f)
}

#[async_trait]
impl<T, F, Fut> Produce<T> for ProduceFn<F>
where
  T: Send + 'static,
  F: FnMut(Emitter<T>) -> Fut + Send + 'static,
  Fut: Future<Output = Result<(), BoxError>> + Send,
{
  async fn produce(&mut self, out: Emitter<T>) -> Result<(), BoxError> {
    (self.0)(out).await
  }
}

/// Emits every item of an iterator.
pub struct IterProducer<I>(Option<I>);

#[async_trait]
impl<T, I> Produce<T> for IterProducer<I>
where
  T: Send + 'static,
  I: Iterator<Item = T> + Send + 'static,
{
  async fn produce(&mut self, out: Emitter<T>) -> Result<(), BoxError> {
    if let Some(items) = self.0.take() {
      for item in items {
        out.emit(item).await?;
      }
    }
    Ok(())
  }
}

/// Worker without input: ignores any bound input and emits on its own.
///
/// A producer failure ends the worker.
pub struct ProducerWorker<T, P> {
  name: String,
  producer: Option<P>,
  ports: Ports<T>,
}

impl<T, P> ProducerWorker<T, P>
where
  T: Send + 'static,
  P: Produce<T>,
{
  pub fn new(producer: P) -> Self {
    Self::with_capacity(producer, DEFAULT_CAPACITY)
  }

  pub fn with_capacity(producer: P, capacity: usize) -> Self {
    Self {
      name: "producer".to_string(),
      producer: Some(producer),
      ports: Ports::new(capacity),
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }
}

impl<T, I> ProducerWorker<T, IterProducer<I>>
where
  T: Send + 'static,
  I: Iterator<Item = T> + Send + 'static,
{
  pub fn from_items<J: IntoIterator<IntoIter = I>>(items: J) -> Self {
    Self::new(IterProducer(Some(items.into_iter())))
  }
}

impl<T, P> Worker<T> for ProducerWorker<T, P>
where
  T: Send + 'static,
  P: Produce<T>,
{
  fn set_input(&mut self, input: ItemStream<T>) {
    self.ports.set_input(input);
  }

  fn output(&mut self) -> ItemStream<T> {
    self.ports.output()
  }

  fn run(&mut self, ctx: &RunContext) -> ErrorStream {
    let (input, tx) = self.ports.start();
    drop(input);
    let (errors, error_stream) = error_channel();
    let Some(mut producer) = self.producer.take() else {
      return error_stream;
    };

    let gate = ctx.register();
    let cancel = ctx.cancel().clone();
    let name = self.name.clone();

    tokio::spawn(async move {
      if !gate.open().await {
        return;
      }
      let out = Emitter::new(tx, cancel.clone());
      let result = tokio::select! {
        result = producer.produce(out) => result,
        _ = cancel.cancelled() => Ok(()),
      };
      match result {
        Err(e) if !is_closed(&e) => {
          error!(worker = %name, error = %e, "producer failed");
          let _ = errors.send(WorkerError::from_source(&name, e.as_ref()));
        }
        _ => debug!(worker = %name, "producer finished"),
      }
    });

    error_stream
  }
}
