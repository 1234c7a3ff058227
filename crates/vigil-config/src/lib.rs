//! Vigil Config
//!
//! Serializable pipeline definitions. A [`PipelineDef`] names its stages, the
//! worker plugin behind each one and the stages feeding it. These types are
//! the input to the worker registry, which turns them into a runnable
//! pipeline.
//!
//! ```json
//! {
//!   "name": "odd-multiples",
//!   "stages": [
//!     { "name": "forward", "plugin": "forward" },
//!     { "name": "mult", "plugin": "multiply", "parents": ["forward"], "config": { "factor": 11 } },
//!     { "name": "odd", "plugin": "keep-odd", "parents": ["mult"] }
//!   ]
//! }
//! ```

mod engine;
mod error;
mod pipeline;

pub use engine::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_FRAME_LIMIT, EngineConfig};
pub use error::ConfigError;
pub use pipeline::{PipelineDef, StageDef};
