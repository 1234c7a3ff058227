use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_worker::{BoxError, BoxWorker, DEFAULT_CAPACITY, ItemStream, RunContext, Worker};

use crate::chunk::{Chunker, Reassembler};
use crate::error::TransportError;
use crate::frame::MAX_FRAME_SIZE;
use crate::service::{FrameStream, MessageStream, WorkerService};

type ConfigHook = Box<dyn Fn(&str) -> Result<(), BoxError> + Send + Sync>;

/// Serves a local [`Worker`] through the [`WorkerService`] operations.
///
/// This is the plugin side of the boundary. Inbound frames are reassembled
/// and fed to the worker; its output is chunked back into frames. Once the
/// worker stops reading, inbound frames are drained and discarded so the
/// caller never blocks.
pub struct LocalService {
  name: String,
  frame_limit: usize,
  schema: String,
  config_hook: Option<ConfigHook>,
  worker: Mutex<BoxWorker<Bytes>>,
  input_tx: Mutex<Option<mpsc::Sender<Bytes>>>,
  output: Mutex<Option<ItemStream<Bytes>>>,
  started: AtomicBool,
  cancel: CancellationToken,
}

impl LocalService {
  pub fn new<W>(name: impl Into<String>, worker: W) -> Self
  where
    W: Worker<Bytes> + 'static,
  {
    Self::from_box(name, Box::new(worker))
  }

  pub fn from_box(name: impl Into<String>, mut worker: BoxWorker<Bytes>) -> Self {
    let (tx, rx) = mpsc::channel(DEFAULT_CAPACITY);
    worker.set_input(ReceiverStream::new(rx).boxed());
    let output = worker.output();
    Self {
      name: name.into(),
      frame_limit: MAX_FRAME_SIZE,
      schema: String::new(),
      config_hook: None,
      worker: Mutex::new(worker),
      input_tx: Mutex::new(Some(tx)),
      output: Mutex::new(Some(output)),
      started: AtomicBool::new(false),
      cancel: CancellationToken::new(),
    }
  }

  pub fn with_frame_limit(mut self, limit: usize) -> Self {
    self.frame_limit = limit;
    self
  }

  /// JSON schema returned by `get_input_schema`. Empty means no schema.
  pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
    self.schema = schema.into();
    self
  }

  /// Validate or apply configuration sent through `config`.
  pub fn with_config_hook<F>(mut self, hook: F) -> Self
  where
    F: Fn(&str) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    self.config_hook = Some(Box::new(hook));
    self
  }

  /// Stop the served worker.
  pub fn shutdown(&self) {
    info!(worker = %self.name, "local_service_shutdown");
    self.cancel.cancel();
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl WorkerService for LocalService {
  async fn get_input_schema(&self) -> Result<String, TransportError> {
    Ok(self.schema.clone())
  }

  async fn config(&self, config: String) -> Result<(), TransportError> {
    match &self.config_hook {
      Some(hook) => hook(&config).map_err(|e| TransportError::status(e.to_string())),
      None => {
        debug!(worker = %self.name, "no config hook; configuration ignored");
        Ok(())
      }
    }
  }

  async fn input(&self, mut frames: FrameStream) -> Result<(), TransportError> {
    let Some(sender) = lock(&self.input_tx).take() else {
      return Err(TransportError::status("input already bound"));
    };
    let mut tx = Some(sender);

    let mut reassembler = Reassembler::new();
    let mut discarded = 0usize;
    loop {
      let frame = tokio::select! {
        _ = self.cancel.cancelled() => break,
        frame = frames.next() => frame,
      };
      let frame = match frame {
        Some(Ok(frame)) => frame,
        Some(Err(e)) if e.is_normal_termination() => break,
        Some(Err(e)) => return Err(e),
        None => break,
      };
      let Some(item) = reassembler.push(frame)? else {
        continue;
      };

      if let Some(sender) = &tx {
        let sent = tokio::select! {
          _ = self.cancel.cancelled() => Err(()),
          sent = sender.send(item.data) => sent.map_err(|_| ()),
        };
        if sent.is_err() {
          debug!(worker = %self.name, "worker stopped reading; discarding inbound frames");
          tx = None;
        }
      } else {
        discarded += 1;
      }
    }

    if discarded > 0 {
      warn!(worker = %self.name, discarded, "inbound items discarded");
    }
    reassembler.clear();
    Ok(())
  }

  async fn output(&self) -> Result<FrameStream, TransportError> {
    let Some(output) = lock(&self.output).take() else {
      return Err(TransportError::status("output already taken"));
    };
    let chunker = Chunker::with_limit(self.name.clone(), self.frame_limit);
    let frames = output
      .flat_map(move |item| stream::iter(chunker.chunk(item).into_iter().map(Ok)))
      .take_until(self.cancel.clone().cancelled_owned())
      .boxed();
    Ok(frames)
  }

  async fn run(&self) -> Result<MessageStream, TransportError> {
    if self.started.swap(true, Ordering::SeqCst) {
      return Err(TransportError::status("worker is already running"));
    }
    info!(worker = %self.name, "local_service_run");
    let ctx = RunContext::standalone(self.cancel.child_token());
    let errors = lock(&self.worker).run(&ctx);
    Ok(errors.map(|e| Ok(e.to_string())).boxed())
  }
}

impl Drop for LocalService {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}
