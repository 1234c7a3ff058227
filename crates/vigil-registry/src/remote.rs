//! Stages whose workers live behind a [`WorkerService`].

use bytes::Bytes;
use tracing::debug;
use vigil_remote::{RemoteWorker, WorkerService};
use vigil_worker::BoxWorker;

use crate::error::RegistryError;
use crate::registry::WorkerRegistry;

impl WorkerRegistry<Bytes> {
  /// Register a plugin served through a [`WorkerService`].
  ///
  /// `connect` yields a fresh service for every stage. A stage's non-null
  /// config is sent to the service as JSON before the worker runs, and items
  /// are chunked at the pipeline's `frame_limit`.
  pub fn register_service<S, F>(
    &mut self,
    plugin: impl Into<String>,
    connect: F,
  ) -> Result<(), RegistryError>
  where
    S: WorkerService,
    F: Fn() -> S + Send + Sync + 'static,
  {
    let plugin = plugin.into();
    let name = plugin.clone();
    self.register(plugin, move |config, engine| {
      let mut worker =
        RemoteWorker::new(name.clone(), connect()).with_frame_limit(engine.frame_limit);
      if !config.is_null() {
        worker = worker.with_config(config.to_string());
      }
      debug!(plugin = %name, frame_limit = engine.frame_limit, "remote worker created");
      Ok(Box::new(worker) as BoxWorker<Bytes>)
    })
  }
}
