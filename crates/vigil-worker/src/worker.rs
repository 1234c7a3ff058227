use std::fmt;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::context::RunContext;
use crate::error::{Closed, WorkerError};
use crate::stream::{ErrorStream, ItemStream, closed};

/// Default capacity of a worker's output channel.
pub const DEFAULT_CAPACITY: usize = 64;

/// A unit of stream processing.
///
/// - `set_input` binds the upstream source. Binding a worker that is already
///   running is a programming error and panics.
/// - `output` hands out the output stream. It can be taken before `run`; it
///   yields nothing until the worker runs.
/// - `run` starts processing under `ctx` and returns the stream of terminal
///   failures, which closes when the worker stops.
pub trait Worker<T>: Send {
  fn set_input(&mut self, input: ItemStream<T>);

  fn output(&mut self) -> ItemStream<T>;

  fn run(&mut self, ctx: &RunContext) -> ErrorStream;
}

pub type BoxWorker<T> = Box<dyn Worker<T>>;

impl<T> Worker<T> for BoxWorker<T> {
  fn set_input(&mut self, input: ItemStream<T>) {
    (**self).set_input(input)
  }

  fn output(&mut self) -> ItemStream<T> {
    (**self).output()
  }

  fn run(&mut self, ctx: &RunContext) -> ErrorStream {
    (**self).run(ctx)
  }
}

/// Handle used by worker logic to push items downstream.
///
/// Sending waits for room in the output channel and gives up with [`Closed`]
/// if the downstream went away or the run was cancelled.
pub struct Emitter<T> {
  tx: mpsc::Sender<T>,
  cancel: CancellationToken,
}

impl<T> Clone for Emitter<T> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
      cancel: self.cancel.clone(),
    }
  }
}

impl<T> fmt::Debug for Emitter<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Emitter")
      .field("closed", &self.tx.is_closed())
      .field("cancelled", &self.cancel.is_cancelled())
      .finish()
  }
}

impl<T: Send> Emitter<T> {
  pub fn new(tx: mpsc::Sender<T>, cancel: CancellationToken) -> Self {
    Self { tx, cancel }
  }

  pub async fn emit(&self, item: T) -> Result<(), Closed> {
    tokio::select! {
      sent = self.tx.send(item) => sent.map_err(|_| Closed),
      _ = self.cancel.cancelled() => Err(Closed),
    }
  }

  pub fn is_closed(&self) -> bool {
    self.tx.is_closed() || self.cancel.is_cancelled()
  }
}

/// Input/output wiring shared by the adapters.
pub(crate) struct Ports<T> {
  input: Option<ItemStream<T>>,
  output_tx: Option<mpsc::Sender<T>>,
  output_rx: Option<mpsc::Receiver<T>>,
  running: bool,
}

impl<T: Send + 'static> Ports<T> {
  pub(crate) fn new(capacity: usize) -> Self {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    Self {
      input: None,
      output_tx: Some(tx),
      output_rx: Some(rx),
      running: false,
    }
  }

  pub(crate) fn set_input(&mut self, input: ItemStream<T>) {
    if self.running {
      panic!("set_input called on a running worker");
    }
    self.input = Some(input);
  }

  pub(crate) fn output(&mut self) -> ItemStream<T> {
    match self.output_rx.take() {
      Some(rx) => ReceiverStream::new(rx).boxed(),
      None => {
        warn!("worker output already taken; returning a closed stream");
        closed()
      }
    }
  }

  /// Flip to running and hand the wiring to the worker task.
  pub(crate) fn start(&mut self) -> (Option<ItemStream<T>>, mpsc::Sender<T>) {
    if self.running {
      panic!("worker is already running");
    }
    self.running = true;
    let tx = match self.output_tx.take() {
      Some(tx) => tx,
      None => unreachable!("output sender is only taken on start"),
    };
    (self.input.take(), tx)
  }
}

/// Unbounded error channel; reporting a failure never blocks a worker.
pub(crate) fn error_channel() -> (mpsc::UnboundedSender<WorkerError>, ErrorStream) {
  let (tx, rx) = mpsc::unbounded_channel();
  (tx, UnboundedReceiverStream::new(rx).boxed())
}
