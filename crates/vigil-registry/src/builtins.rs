//! Builtin workers over raw byte items, one item per line of text.

use bytes::Bytes;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use vigil_config::EngineConfig;
use vigil_worker::{
  BoxError, BoxWorker, ConsumerWorker, Emitter, ProducerWorker, TransformWorker, consume_fn,
  produce_fn, transform_fn,
};

use crate::error::RegistryError;
use crate::registry::WorkerRegistry;

type Builtin = fn(&serde_json::Value, &EngineConfig) -> Result<BoxWorker<Bytes>, RegistryError>;

static BUILTINS: [(&str, Builtin); 6] = [
  ("forward", forward),
  ("multiply", multiply),
  ("keep-odd", keep_odd),
  ("prefix", prefix),
  ("discard", discard),
  ("count", count),
];

#[derive(Debug, Deserialize)]
struct MultiplyConfig {
  factor: i64,
}

#[derive(Debug, Deserialize)]
struct PrefixConfig {
  text: String,
}

#[derive(Debug, Deserialize)]
struct CountConfig {
  count: u64,
}

impl WorkerRegistry<Bytes> {
  /// A registry holding every builtin plugin.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    for (plugin, factory) in BUILTINS {
      registry.factories.insert(plugin.to_string(), Box::new(factory));
    }
    registry
  }

  /// Names of the builtin plugins.
  pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(plugin, _)| *plugin)
  }
}

fn parse_config<C: DeserializeOwned>(
  plugin: &str,
  config: &serde_json::Value,
) -> Result<C, RegistryError> {
  serde_json::from_value(config.clone())
    .map_err(|e| RegistryError::invalid_config(plugin, e.to_string()))
}

fn parse_int(item: &[u8]) -> Result<i64, BoxError> {
  let text = std::str::from_utf8(item)?;
  Ok(text.trim().parse::<i64>()?)
}

fn forward(
  _config: &serde_json::Value,
  engine: &EngineConfig,
) -> Result<BoxWorker<Bytes>, RegistryError> {
  let worker = TransformWorker::with_capacity(
    transform_fn(|item: Bytes, out: Emitter<Bytes>| async move {
      out.emit(item).await?;
      Ok::<(), BoxError>(())
    }),
    engine.channel_capacity,
  )
  .named("forward");
  Ok(Box::new(worker))
}

fn multiply(
  config: &serde_json::Value,
  engine: &EngineConfig,
) -> Result<BoxWorker<Bytes>, RegistryError> {
  let MultiplyConfig { factor } = parse_config("multiply", config)?;
  let worker = TransformWorker::with_capacity(
    transform_fn(move |item: Bytes, out: Emitter<Bytes>| async move {
      let n = parse_int(&item)?;
      let product = n
        .checked_mul(factor)
        .ok_or_else(|| format!("{n} * {factor} overflows"))?;
      out.emit(Bytes::from(product.to_string())).await?;
      Ok::<(), BoxError>(())
    }),
    engine.channel_capacity,
  )
  .named("multiply");
  Ok(Box::new(worker))
}

fn keep_odd(
  _config: &serde_json::Value,
  engine: &EngineConfig,
) -> Result<BoxWorker<Bytes>, RegistryError> {
  let worker = TransformWorker::with_capacity(
    transform_fn(|item: Bytes, out: Emitter<Bytes>| async move {
      if parse_int(&item)? % 2 != 0 {
        out.emit(item).await?;
      }
      Ok::<(), BoxError>(())
    }),
    engine.channel_capacity,
  )
  .named("keep-odd");
  Ok(Box::new(worker))
}

fn prefix(
  config: &serde_json::Value,
  engine: &EngineConfig,
) -> Result<BoxWorker<Bytes>, RegistryError> {
  let PrefixConfig { text } = parse_config("prefix", config)?;
  let text = Bytes::from(text);
  let worker = TransformWorker::with_capacity(
    transform_fn(move |item: Bytes, out: Emitter<Bytes>| {
      let mut line = Vec::with_capacity(text.len() + item.len());
      line.extend_from_slice(&text);
      line.extend_from_slice(&item);
      async move {
        out.emit(Bytes::from(line)).await?;
        Ok::<(), BoxError>(())
      }
    }),
    engine.channel_capacity,
  )
  .named("prefix");
  Ok(Box::new(worker))
}

fn discard(
  _config: &serde_json::Value,
  _engine: &EngineConfig,
) -> Result<BoxWorker<Bytes>, RegistryError> {
  let worker = ConsumerWorker::new(consume_fn(|_item: Bytes| async { Ok::<(), BoxError>(()) }))
    .named("discard");
  Ok(Box::new(worker))
}

fn count(
  config: &serde_json::Value,
  engine: &EngineConfig,
) -> Result<BoxWorker<Bytes>, RegistryError> {
  let CountConfig { count } = parse_config("count", config)?;
  let worker = ProducerWorker::with_capacity(
    produce_fn(move |out: Emitter<Bytes>| async move {
      for n in 1..=count {
        out.emit(Bytes::from(n.to_string())).await?;
      }
      Ok::<(), BoxError>(())
    }),
    engine.channel_capacity,
  )
  .named("count");
  Ok(Box::new(worker))
}
