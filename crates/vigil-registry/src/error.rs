use vigil_config::ConfigError;
use vigil_pipeline::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  /// No factory registered under this name.
  #[error("plugin '{plugin}' not found")]
  PluginNotFound { plugin: String },

  #[error("plugin '{plugin}' is already registered")]
  DuplicatePlugin { plugin: String },

  /// The stage configuration does not fit the plugin.
  #[error("invalid config for plugin '{plugin}': {message}")]
  InvalidConfig { plugin: String, message: String },

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Pipeline(#[from] PipelineError),
}

impl RegistryError {
  pub fn invalid_config(plugin: impl Into<String>, message: impl Into<String>) -> Self {
    Self::InvalidConfig {
      plugin: plugin.into(),
      message: message.into(),
    }
  }
}
