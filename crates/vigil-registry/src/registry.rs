use std::collections::BTreeMap;

use tracing::{debug, info};
use vigil_config::{EngineConfig, PipelineDef};
use vigil_pipeline::{WorkerGraph, WorkerVertex};
use vigil_worker::BoxWorker;

use crate::error::RegistryError;

/// Builds a worker from a stage's JSON config.
pub type Factory<T> = Box<
  dyn Fn(&serde_json::Value, &EngineConfig) -> Result<BoxWorker<T>, RegistryError> + Send + Sync,
>;

/// Named worker factories.
///
/// Pipelines refer to workers by plugin name; the registry turns a
/// [`PipelineDef`] into a runnable [`WorkerGraph`].
pub struct WorkerRegistry<T> {
  pub(crate) factories: BTreeMap<String, Factory<T>>,
}

impl<T> Default for WorkerRegistry<T> {
  fn default() -> Self {
    Self {
      factories: BTreeMap::new(),
    }
  }
}

impl<T> WorkerRegistry<T>
where
  T: Clone + Send + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a factory under `plugin`. Names are unique.
  pub fn register<F>(&mut self, plugin: impl Into<String>, factory: F) -> Result<(), RegistryError>
  where
    F: Fn(&serde_json::Value, &EngineConfig) -> Result<BoxWorker<T>, RegistryError>
      + Send
      + Sync
      + 'static,
  {
    let plugin = plugin.into();
    if self.factories.contains_key(&plugin) {
      return Err(RegistryError::DuplicatePlugin { plugin });
    }
    debug!(plugin = %plugin, "plugin registered");
    self.factories.insert(plugin, Box::new(factory));
    Ok(())
  }

  pub fn contains(&self, plugin: &str) -> bool {
    self.factories.contains_key(plugin)
  }

  /// Registered plugin names, sorted.
  pub fn plugins(&self) -> impl Iterator<Item = &str> {
    self.factories.keys().map(String::as_str)
  }

  /// Instantiate one worker.
  pub fn create(
    &self,
    plugin: &str,
    config: &serde_json::Value,
    engine: &EngineConfig,
  ) -> Result<BoxWorker<T>, RegistryError> {
    let factory = self
      .factories
      .get(plugin)
      .ok_or_else(|| RegistryError::PluginNotFound {
        plugin: plugin.to_string(),
      })?;
    factory(config, engine)
  }

  /// Instantiate every stage of `def` and wire them into a pipeline.
  pub fn build(&self, def: &PipelineDef) -> Result<WorkerGraph<T>, RegistryError> {
    def.validate()?;

    let mut vertices = Vec::with_capacity(def.stages.len());
    for stage in &def.stages {
      let worker = self.create(&stage.plugin, &stage.config, &def.engine)?;
      vertices.push(WorkerVertex::from_box(
        stage.name.clone(),
        stage.parents.clone(),
        worker,
      ));
    }

    let mut graph = WorkerGraph::with_capacity(def.name.clone(), def.engine.channel_capacity);
    graph.add_vertices(vertices)?;
    info!(pipeline = %def.name, stages = def.stages.len(), "pipeline_built");
    Ok(graph)
  }
}
