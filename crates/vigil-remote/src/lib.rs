//! Vigil Remote
//!
//! The boundary between a pipeline and workers living in other processes.
//!
//! - [`DataStream`] frames carry items of any size: a [`Chunker`] splits an
//!   item into frames of bounded size sharing one correlation id, and a
//!   [`Reassembler`] puts them back together.
//! - [`WorkerService`] is the remote surface of a worker. [`RemoteWorker`]
//!   turns a service into a local [`vigil_worker::Worker`]; [`LocalService`]
//!   serves a local worker as a service.
//! - [`FrameCodec`] frames [`DataStream`]s over a byte pipe, and
//!   [`HandshakeConfig`] checks plugin compatibility before connecting.

mod chunk;
mod codec;
mod error;
mod frame;
mod handshake;
mod local;
mod remote;
mod service;

pub use chunk::{Chunker, Reassembler};
pub use codec::{FrameCodec, read_frames};
pub use error::TransportError;
pub use frame::{DataStream, MAX_FRAME_SIZE};
pub use handshake::{
  CORE_PROTOCOL_VERSION, DEFAULT_COOKIE_KEY, DEFAULT_COOKIE_VALUE, Handshake, HandshakeConfig,
};
pub use local::LocalService;
pub use remote::RemoteWorker;
pub use service::{FrameStream, MessageStream, WorkerService};
