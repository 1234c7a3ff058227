//! Vigil Graph
//!
//! Directed graph primitives used to describe pipelines.
//!
//! - [`Graph`] is a plain keyed graph with neighbor views, cloning,
//!   weakly-connected-component splitting and topological ordering.
//! - [`SelfDescribingGraph`] builds its edges from vertices that declare their
//!   own name and parents (see [`SelfDescribe`]).

mod edge;
mod error;
mod graph;
mod self_describe;

pub use edge::Edge;
pub use error::GraphError;
pub use graph::Graph;
pub use self_describe::{SelfDescribe, SelfDescribingGraph};
