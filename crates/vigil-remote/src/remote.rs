use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, stream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vigil_worker::{
  DEFAULT_CAPACITY, Emitter, ErrorStream, ItemStream, RunContext, Worker, WorkerError, closed,
};

use crate::chunk::{Chunker, Reassembler};
use crate::error::TransportError;
use crate::frame::MAX_FRAME_SIZE;
use crate::service::{FrameStream, MessageStream, WorkerService};

/// A [`Worker`] backed by a [`WorkerService`], usually living in another
/// process.
///
/// Items are chunked on the way in and reassembled on the way out. Transport
/// errors other than normal termination show up on the error stream.
pub struct RemoteWorker<S> {
  name: String,
  service: Arc<S>,
  frame_limit: usize,
  config: Option<String>,
  input: Option<ItemStream<Bytes>>,
  output_tx: Option<mpsc::Sender<Bytes>>,
  output_rx: Option<mpsc::Receiver<Bytes>>,
  running: bool,
}

impl<S: WorkerService> RemoteWorker<S> {
  pub fn new(name: impl Into<String>, service: S) -> Self {
    Self::from_shared(name, Arc::new(service))
  }

  pub fn from_shared(name: impl Into<String>, service: Arc<S>) -> Self {
    let (tx, rx) = mpsc::channel(DEFAULT_CAPACITY);
    Self {
      name: name.into(),
      service,
      frame_limit: MAX_FRAME_SIZE,
      config: None,
      input: None,
      output_tx: Some(tx),
      output_rx: Some(rx),
      running: false,
    }
  }

  pub fn with_frame_limit(mut self, limit: usize) -> Self {
    self.frame_limit = limit;
    self
  }

  /// Configuration delivered through `config` before the worker runs. A
  /// rejected configuration is reported and the worker never starts.
  pub fn with_config(mut self, config: impl Into<String>) -> Self {
    self.config = Some(config.into());
    self
  }

  pub fn service(&self) -> &Arc<S> {
    &self.service
  }
}

impl<S: WorkerService> Worker<Bytes> for RemoteWorker<S> {
  fn set_input(&mut self, input: ItemStream<Bytes>) {
    if self.running {
      panic!("set_input called on a running worker");
    }
    self.input = Some(input);
  }

  fn output(&mut self) -> ItemStream<Bytes> {
    match self.output_rx.take() {
      Some(rx) => ReceiverStream::new(rx).boxed(),
      None => {
        warn!(worker = %self.name, "remote output already taken; returning a closed stream");
        closed()
      }
    }
  }

  fn run(&mut self, ctx: &RunContext) -> ErrorStream {
    if self.running {
      panic!("worker is already running");
    }
    self.running = true;

    let (errors, error_stream) = mpsc::unbounded_channel();
    let Some(tx) = self.output_tx.take() else {
      return closed();
    };

    let gate = ctx.register();
    let call = Call {
      name: self.name.clone(),
      service: Arc::clone(&self.service),
      cancel: ctx.cancel().clone(),
      errors,
    };
    let input = self.input.take();
    let config = self.config.take();
    let chunker = Chunker::with_limit(self.name.clone(), self.frame_limit);

    tokio::spawn(async move {
      if !gate.open().await {
        return;
      }
      if let Some(config) = config {
        if let Err(e) = call.service.config(config).await {
          error!(worker = %call.name, error = %e, "remote config rejected");
          let _ = call
            .errors
            .send(WorkerError::new(&call.name, format!("config rejected: {e}")));
          return;
        }
      }
      info!(worker = %call.name, "remote_worker_started");

      match call.service.run().await {
        Ok(messages) => {
          tokio::spawn(call.clone().follow_errors(messages));
        }
        Err(e) => call.report(&e),
      }

      if let Some(input) = input {
        let frames: FrameStream = input
          .flat_map(move |item| stream::iter(chunker.chunk(item).into_iter().map(Ok)))
          .boxed();
        tokio::spawn(call.clone().send_input(frames));
      }

      match call.service.output().await {
        Ok(frames) => call.receive_output(frames, Emitter::new(tx, call.cancel.clone())).await,
        Err(e) => call.report(&e),
      }
      debug!(worker = %call.name, "remote output finished");
    });

    UnboundedReceiverStream::new(error_stream).boxed()
  }
}

/// State shared by the tasks driving one remote run.
struct Call<S> {
  name: String,
  service: Arc<S>,
  cancel: CancellationToken,
  errors: mpsc::UnboundedSender<WorkerError>,
}

impl<S> Clone for Call<S> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      service: Arc::clone(&self.service),
      cancel: self.cancel.clone(),
      errors: self.errors.clone(),
    }
  }
}

impl<S: WorkerService> Call<S> {
  fn report(&self, err: &TransportError) {
    if err.is_normal_termination() {
      return;
    }
    error!(worker = %self.name, error = %err, "remote call failed");
    let _ = self.errors.send(WorkerError::new(&self.name, err.to_string()));
  }

  async fn follow_errors(self, mut messages: MessageStream) {
    loop {
      let message = tokio::select! {
        _ = self.cancel.cancelled() => break,
        message = messages.next() => message,
      };
      match message {
        Some(Ok(message)) => {
          let _ = self.errors.send(WorkerError::new(&self.name, message));
        }
        Some(Err(e)) => {
          self.report(&e);
          break;
        }
        None => break,
      }
    }
  }

  async fn send_input(self, frames: FrameStream) {
    let result = tokio::select! {
      _ = self.cancel.cancelled() => Err(TransportError::Cancelled),
      result = self.service.input(frames) => result,
    };
    if let Err(e) = result {
      self.report(&e);
    }
  }

  async fn receive_output(&self, mut frames: FrameStream, out: Emitter<Bytes>) {
    let mut reassembler = Reassembler::new();
    loop {
      let frame = tokio::select! {
        _ = self.cancel.cancelled() => break,
        frame = frames.next() => frame,
      };
      let item = match frame {
        Some(Ok(frame)) => reassembler.push(frame),
        Some(Err(e)) => {
          self.report(&e);
          break;
        }
        None => break,
      };
      match item {
        Ok(Some(item)) => {
          if out.emit(item.data).await.is_err() {
            break;
          }
        }
        Ok(None) => {}
        Err(e) => self.report(&e),
      }
    }
    reassembler.clear();
  }
}
