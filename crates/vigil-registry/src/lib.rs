//! Vigil Registry
//!
//! Maps plugin names to worker factories and builds pipelines from their
//! definitions. [`WorkerRegistry::with_builtins`] provides a small set of
//! line-oriented workers:
//!
//! | plugin     | shape     | config            |
//! |------------|-----------|-------------------|
//! | `forward`  | transform |                   |
//! | `multiply` | transform | `{"factor": n}`   |
//! | `keep-odd` | transform |                   |
//! | `prefix`   | transform | `{"text": "..."}` |
//! | `discard`  | consumer  |                   |
//! | `count`    | producer  | `{"count": n}`    |
//!
//! Workers running out of process are added with
//! [`WorkerRegistry::register_service`]; their stage config is forwarded to
//! the service and frames are cut at the pipeline's `frame_limit`.

mod builtins;
mod error;
mod registry;
mod remote;

pub use error::RegistryError;
pub use registry::{Factory, WorkerRegistry};
