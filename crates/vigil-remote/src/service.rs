use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::TransportError;
use crate::frame::DataStream;

/// Frames flowing in one direction of a call. A transport failure ends the
/// stream with an `Err`; [`TransportError::is_normal_termination`] errors are
/// ordinary completion.
pub type FrameStream = BoxStream<'static, Result<DataStream, TransportError>>;

/// Terminal error messages reported by a running remote worker.
pub type MessageStream = BoxStream<'static, Result<String, TransportError>>;

/// The operations a worker exposes across a process boundary.
///
/// A client calls `config`, then `run`, then feeds `input` and reads
/// `output`. Items on both data streams are chunked into frames.
#[async_trait]
pub trait WorkerService: Send + Sync + 'static {
  /// JSON schema describing the configuration the worker accepts. An empty
  /// string means the worker declares no schema.
  async fn get_input_schema(&self) -> Result<String, TransportError>;

  /// Apply the worker's JSON configuration. Delivered before `run`.
  async fn config(&self, config: String) -> Result<(), TransportError>;

  /// Stream items to the worker. Returns once the stream is drained.
  async fn input(&self, frames: FrameStream) -> Result<(), TransportError>;

  /// The worker's output. Closure means normal completion.
  async fn output(&self) -> Result<FrameStream, TransportError>;

  /// Start the worker and follow its terminal errors.
  async fn run(&self) -> Result<MessageStream, TransportError>;
}
