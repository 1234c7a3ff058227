//! A local worker served through `LocalService` and driven by `RemoteWorker`,
//! with a frame limit small enough that every item is chunked.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use vigil_pipeline::{WorkerGraph, WorkerVertex};
use vigil_remote::{Chunker, LocalService, RemoteWorker, TransportError, WorkerService};
use vigil_worker::{
  BoxError, Emitter, ProducerWorker, RunContext, TransformWorker, Worker, WorkerError, transform_fn,
};

const LIMIT: usize = 8;

fn uppercase() -> impl Worker<Bytes> {
  TransformWorker::new(transform_fn(|item: Bytes, out: Emitter<Bytes>| async move {
    if item.starts_with(b"bad") {
      return Err::<(), BoxError>("refusing bad item".into());
    }
    out.emit(Bytes::from(item.to_ascii_uppercase())).await?;
    Ok(())
  }))
  .named("uppercase")
}

fn served(worker: impl Worker<Bytes> + 'static) -> RemoteWorker<LocalService> {
  let service = LocalService::new("scanner", worker).with_frame_limit(LIMIT);
  RemoteWorker::new("remote-scanner", service).with_frame_limit(LIMIT)
}

fn items(values: &[&'static str]) -> Vec<Bytes> {
  values.iter().map(|v| Bytes::from_static(v.as_bytes())).collect()
}

#[tokio::test]
async fn test_remote_round_trip_preserves_items_and_order() {
  let mut worker = served(uppercase());
  let input = items(&[
    "",
    "x",
    "seven b",
    "exactly8",
    "nine byte",
    "a considerably longer finding that spans several frames",
  ]);
  worker.set_input(stream::iter(input.clone()).boxed());
  let output = worker.output();
  let _errors = worker.run(&RunContext::standalone(CancellationToken::new()));

  let got: Vec<Bytes> = output.collect().await;
  let expected: Vec<Bytes> = input
    .iter()
    .map(|b| Bytes::from(b.to_ascii_uppercase()))
    .collect();
  assert_eq!(got, expected);
}

#[tokio::test]
async fn test_remote_errors_reach_the_error_stream() {
  let mut worker = served(uppercase());
  worker.set_input(stream::iter(items(&["ok", "bad one", "fine"])).boxed());
  let output = worker.output();
  let errors = worker.run(&RunContext::standalone(CancellationToken::new()));

  let (got, errors): (Vec<Bytes>, Vec<WorkerError>) = tokio::join!(output.collect(), errors.collect());
  assert_eq!(got, items(&["OK", "FINE"]));
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].worker, "remote-scanner");
  assert!(errors[0].message.contains("refusing bad item"));
}

#[tokio::test]
async fn test_remote_worker_as_pipeline_vertex() {
  let forward = TransformWorker::new(transform_fn(|item: Bytes, out: Emitter<Bytes>| async move {
    out.emit(item).await?;
    Ok::<(), BoxError>(())
  }));
  let mut graph = WorkerGraph::from_vertices(
    "remote-chain",
    [
      WorkerVertex::root("forward", forward),
      WorkerVertex::new("remote", vec!["forward".to_string()], served(uppercase())),
    ],
  )
  .unwrap();

  graph.set_input(stream::iter(items(&["host=example.org", "path=/login"])).boxed());
  let output = graph.output();
  let _errors = graph.start(CancellationToken::new()).await.unwrap();

  let got: Vec<Bytes> = output.collect().await;
  assert_eq!(got, items(&["HOST=EXAMPLE.ORG", "PATH=/LOGIN"]));
}

#[tokio::test]
async fn test_served_producer_discards_inbound_frames() {
  let service = LocalService::new("ticker", ProducerWorker::from_items(items(&["a", "b", "c"])))
    .with_frame_limit(LIMIT);
  let _messages = service.run().await.unwrap();
  let output = service.output().await.unwrap();

  // far more than any channel holds; none of it is read by the producer
  let chunker = Chunker::with_limit("host", LIMIT);
  let frames = stream::iter(0..500)
    .flat_map(move |i| stream::iter(chunker.chunk(Bytes::from(format!("item number {i}"))).into_iter().map(Ok)))
    .boxed();
  service.input(frames).await.unwrap();

  let mut reassembler = vigil_remote::Reassembler::new();
  let mut got = Vec::new();
  let mut output = output;
  while let Some(frame) = output.next().await {
    if let Some(item) = reassembler.push(frame.unwrap()).unwrap() {
      got.push(item.data);
    }
  }
  assert_eq!(got, items(&["a", "b", "c"]));
}

#[tokio::test]
async fn test_service_schema_config_and_single_use() {
  let service = LocalService::new("scanner", uppercase())
    .with_schema(r#"{"type":"string"}"#)
    .with_config_hook(|config| {
      if config.contains("\"depth\"") {
        Ok(())
      } else {
        Err("missing depth".into())
      }
    });

  assert_eq!(service.get_input_schema().await.unwrap(), r#"{"type":"string"}"#);
  service.config(r#"{"depth":3}"#.to_string()).await.unwrap();
  assert_eq!(
    service.config("{}".to_string()).await,
    Err(TransportError::status("missing depth"))
  );

  assert!(service.run().await.is_ok());
  assert!(service.run().await.is_err());
  assert!(service.output().await.is_ok());
  assert!(service.output().await.is_err());
}

#[tokio::test]
async fn test_schema_defaults_to_empty() {
  let service = LocalService::new("scanner", uppercase());
  assert_eq!(service.get_input_schema().await.unwrap(), "");
}

#[tokio::test]
async fn test_config_is_delivered_before_run() {
  let received = Arc::new(Mutex::new(None::<String>));
  let hook_received = Arc::clone(&received);
  let service = LocalService::new("scanner", uppercase())
    .with_frame_limit(LIMIT)
    .with_config_hook(move |config| {
      *hook_received.lock().unwrap() = Some(config.to_string());
      Ok(())
    });
  let mut worker = RemoteWorker::new("remote-scanner", service)
    .with_frame_limit(LIMIT)
    .with_config(r#"{"depth":3}"#);

  worker.set_input(stream::iter(items(&["a"])).boxed());
  let output = worker.output();
  let errors = worker.run(&RunContext::standalone(CancellationToken::new()));

  let (got, errors): (Vec<Bytes>, Vec<WorkerError>) = tokio::join!(output.collect(), errors.collect());
  assert_eq!(got, items(&["A"]));
  assert!(errors.is_empty());
  assert_eq!(received.lock().unwrap().as_deref(), Some(r#"{"depth":3}"#));
}

#[tokio::test]
async fn test_rejected_config_stops_the_worker() {
  let service = LocalService::new("scanner", uppercase())
    .with_config_hook(|_| Err("unknown option 'depth'".into()));
  let mut worker = RemoteWorker::new("remote-scanner", service).with_config(r#"{"depth":3}"#);

  worker.set_input(stream::iter(items(&["a", "b"])).boxed());
  let output = worker.output();
  let errors = worker.run(&RunContext::standalone(CancellationToken::new()));

  let (got, errors): (Vec<Bytes>, Vec<WorkerError>) = tokio::join!(output.collect(), errors.collect());
  assert!(got.is_empty());
  assert_eq!(errors.len(), 1);
  assert!(errors[0].message.contains("config rejected"));
  assert!(errors[0].message.contains("unknown option"));
  // the served worker was never started
  assert!(worker.service().run().await.is_ok());
}
