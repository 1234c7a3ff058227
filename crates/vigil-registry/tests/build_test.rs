//! Pipelines built from JSON definitions with the builtin plugins.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{StreamExt, stream};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use vigil_config::PipelineDef;
use vigil_graph::GraphError;
use vigil_pipeline::{PipelineError, WorkerGraph};
use vigil_registry::{RegistryError, WorkerRegistry};
use vigil_remote::LocalService;
use vigil_worker::{BoxError, Emitter, TransformWorker, transform_fn};

fn definition(value: serde_json::Value) -> PipelineDef {
  serde_json::from_value(value).unwrap()
}

fn lines(values: &[&str]) -> Vec<Bytes> {
  values.iter().map(|v| Bytes::from(v.to_string())).collect()
}

async fn run(mut graph: WorkerGraph<Bytes>, input: Vec<Bytes>) -> Vec<Bytes> {
  graph.set_input(stream::iter(input).boxed());
  let output = graph.output();
  let _errors = graph.start(CancellationToken::new()).await.unwrap();
  output.collect().await
}

#[tokio::test]
async fn test_odd_multiples_pipeline() {
  let def = definition(json!({
    "name": "odd-multiples",
    "stages": [
      { "name": "forward", "plugin": "forward" },
      { "name": "mult", "plugin": "multiply", "parents": ["forward"], "config": { "factor": 11 } },
      { "name": "odd", "plugin": "keep-odd", "parents": ["mult"] }
    ]
  }));
  let graph = WorkerRegistry::with_builtins().build(&def).unwrap();

  let input: Vec<Bytes> = (1..=10).map(|n| Bytes::from(n.to_string())).collect();
  let output = run(graph, input).await;
  assert_eq!(output, lines(&["11", "33", "55", "77", "99"]));
}

#[tokio::test]
async fn test_producer_root_ignores_root_input() {
  let def = definition(json!({
    "name": "ids",
    "stages": [
      { "name": "ids", "plugin": "count", "config": { "count": 3 } },
      { "name": "tag", "plugin": "prefix", "parents": ["ids"], "config": { "text": "id:" } }
    ]
  }));
  let graph = WorkerRegistry::with_builtins().build(&def).unwrap();

  let output = run(graph, lines(&["ignored"])).await;
  assert_eq!(output, lines(&["id:1", "id:2", "id:3"]));
}

#[tokio::test]
async fn test_bad_items_are_reported_and_skipped() {
  let def = definition(json!({
    "name": "strict",
    "stages": [ { "name": "odd", "plugin": "keep-odd" } ]
  }));
  let mut graph = WorkerRegistry::with_builtins().build(&def).unwrap();

  graph.set_input(stream::iter(lines(&["1", "two", "3"])).boxed());
  let output = graph.output();
  let errors = graph.start(CancellationToken::new()).await.unwrap();

  let (items, errors): (Vec<Bytes>, Vec<_>) = tokio::join!(output.collect(), errors.collect());
  assert_eq!(items, lines(&["1", "3"]));
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].worker, "odd");
}

#[tokio::test]
async fn test_discard_leaf_yields_no_output() {
  let def = definition(json!({
    "name": "sink",
    "stages": [
      { "name": "forward", "plugin": "forward" },
      { "name": "sink", "plugin": "discard", "parents": ["forward"] }
    ]
  }));
  let graph = WorkerRegistry::with_builtins().build(&def).unwrap();

  let output = run(graph, lines(&["a", "b"])).await;
  assert!(output.is_empty());
}

#[test]
fn test_unknown_plugin_fails_build() {
  let def = definition(json!({
    "name": "p",
    "stages": [ { "name": "scan", "plugin": "nuclei" } ]
  }));
  let err = WorkerRegistry::with_builtins().build(&def).unwrap_err();
  assert!(matches!(err, RegistryError::PluginNotFound { plugin } if plugin == "nuclei"));
}

#[test]
fn test_unresolved_parent_fails_build() {
  let def = definition(json!({
    "name": "p",
    "stages": [ { "name": "a", "plugin": "forward", "parents": ["missing"] } ]
  }));
  let err = WorkerRegistry::with_builtins().build(&def).unwrap_err();
  assert!(matches!(
    err,
    RegistryError::Pipeline(PipelineError::Graph(GraphError::ParentNotFound { .. }))
  ));
}

#[tokio::test]
async fn test_remote_stage_gets_config_and_frame_limit() {
  let configs = Arc::new(Mutex::new(Vec::new()));
  let seen = Arc::clone(&configs);
  let mut registry = WorkerRegistry::with_builtins();
  registry
    .register_service("shout", move || {
      let seen = Arc::clone(&seen);
      let shout = TransformWorker::new(transform_fn(|item: Bytes, out: Emitter<Bytes>| async move {
        out.emit(Bytes::from(item.to_ascii_uppercase())).await?;
        Ok::<(), BoxError>(())
      }));
      LocalService::new("shout", shout)
        .with_frame_limit(4)
        .with_config_hook(move |config| {
          seen.lock().unwrap().push(config.to_string());
          Ok(())
        })
    })
    .unwrap();

  let def = definition(json!({
    "name": "loud",
    "engine": { "frame_limit": 4 },
    "stages": [
      { "name": "forward", "plugin": "forward" },
      { "name": "shout", "plugin": "shout", "parents": ["forward"], "config": { "volume": 11 } }
    ]
  }));
  let graph = registry.build(&def).unwrap();

  let output = run(graph, lines(&["open port 443", "x"])).await;
  assert_eq!(output, lines(&["OPEN PORT 443", "X"]));
  assert_eq!(*configs.lock().unwrap(), vec![r#"{"volume":11}"#.to_string()]);
}
