//! Vigil Pipeline
//!
//! Runs a graph of workers as one dataflow pipeline.
//!
//! A [`WorkerGraph`] is built from [`WorkerVertex`] values, each naming its
//! parents. `start` wires every vertex to its parents, runs them all behind a
//! shared startup barrier and returns the merged error stream. The pipeline
//! output is the merged output of the childless vertices.
//!
//! ```text
//! root input --> forward --> multiply --> keep-odd --> output
//! ```
//!
//! A `WorkerGraph` is itself a [`vigil_worker::Worker`], so pipelines nest.

mod error;
mod graph;
mod vertex;

pub use error::PipelineError;
pub use graph::WorkerGraph;
pub use vertex::{SharedWorker, WorkerVertex};
