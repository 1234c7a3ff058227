use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::ConfigError;

/// One stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDef {
  /// Unique name within the pipeline.
  pub name: String,
  /// Registered worker plugin that implements the stage, e.g. "multiply".
  pub plugin: String,
  /// Stages whose output feeds this one. Empty for root stages.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub parents: Vec<String>,
  /// Opaque plugin configuration.
  #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
  pub config: serde_json::Value,
}

/// A pipeline definition as loaded from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
  pub name: String,
  pub stages: Vec<StageDef>,
  #[serde(default)]
  pub engine: EngineConfig,
}

impl PipelineDef {
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    let def: Self = serde_json::from_str(content)?;
    def.validate()?;
    Ok(def)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_json(&content)
  }

  /// Structural checks that do not need the registry.
  ///
  /// Parent resolution is left to graph construction, which reports the
  /// offending stage.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.engine.validate()?;

    let mut seen = HashSet::new();
    for stage in &self.stages {
      if stage.name.is_empty() {
        return Err(ConfigError::EmptyStageName);
      }
      if !seen.insert(stage.name.as_str()) {
        return Err(ConfigError::DuplicateStage(stage.name.clone()));
      }
      if stage.parents.contains(&stage.name) {
        return Err(ConfigError::SelfParent {
          stage: stage.name.clone(),
        });
      }
    }
    Ok(())
  }

  pub fn stage(&self, name: &str) -> Option<&StageDef> {
    self.stages.iter().find(|s| s.name == name)
  }
}
