//! Vigil Worker
//!
//! The unit of stream processing in a vigil pipeline and the plumbing around
//! it.
//!
//! # Shapes
//!
//! ```text
//! Producer   no input        -> emits on its own
//! Consumer   input           -> no output
//! Transform  input item      -> zero or more output items
//! Runner     input stream    -> output stream, any relationship
//! ```
//!
//! Each shape is written against a small trait ([`Produce`], [`Consume`],
//! [`Transform`], [`Runner`]) and wrapped by an adapter that implements the
//! common [`Worker`] contract: `set_input`, `output`, `run`. A
//! [`Broadcaster`] fans any worker's output out to several subscribers.
//!
//! # Startup
//!
//! Workers started inside a pipeline register with a shared [`Barrier`]
//! through their [`RunContext`] and hold their first item until the engine
//! releases it.

mod barrier;
mod broadcast;
mod consumer;
mod context;
mod error;
mod producer;
mod runner;
mod stream;
mod transform;
mod worker;

pub use barrier::Barrier;
pub use broadcast::Broadcaster;
pub use consumer::{Consume, ConsumeFn, ConsumerWorker, ErrorPolicy, consume_fn};
pub use context::{Gate, RunContext};
pub use error::{BoxError, Closed, WorkerError};
pub use producer::{IterProducer, Produce, ProduceFn, ProducerWorker, produce_fn};
pub use runner::{Runner, RunnerFn, RunnerWorker, runner_fn};
pub use stream::{ErrorStream, FanOut, ItemStream, closed, merge};
pub use transform::{Transform, TransformFn, TransformWorker, transform_fn};
pub use worker::{BoxWorker, DEFAULT_CAPACITY, Emitter, Worker};
