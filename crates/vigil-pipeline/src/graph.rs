use std::collections::{HashMap, VecDeque};

use futures::StreamExt;
use futures::stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use vigil_graph::{Edge, SelfDescribingGraph};
use vigil_worker::{
  Barrier, DEFAULT_CAPACITY, ErrorStream, FanOut, ItemStream, RunContext, Worker, WorkerError,
  closed, merge,
};

use crate::error::PipelineError;
use crate::vertex::WorkerVertex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  Constructed,
  Initialized,
  Running,
  Closed,
}

/// Streams produced by `initialize` and consumed by `start`.
struct Wiring<T> {
  fan_outs: Vec<FanOut<T>>,
  leaves: Vec<ItemStream<T>>,
}

/// A graph of workers run as one pipeline.
///
/// Each vertex reads the merged output of its parents. Parentless vertices
/// read a copy of the root input, if one is set. The pipeline output is the
/// merged output of the childless vertices. A vertex feeding several
/// consumers is fanned out so every consumer sees every item.
///
/// Lifecycle: constructed, initialized, running, closed. Clone and split
/// before initializing; a running pipeline is never rewired.
pub struct WorkerGraph<T> {
  name: String,
  graph: SelfDescribingGraph<WorkerVertex<T>>,
  input: Option<ItemStream<T>>,
  output_tx: Option<mpsc::Sender<T>>,
  output_rx: Option<mpsc::Receiver<T>>,
  wiring: Option<Wiring<T>>,
  scope: Option<CancellationToken>,
  state: State,
}

impl<T> WorkerGraph<T>
where
  T: Clone + Send + 'static,
{
  pub fn new(name: impl Into<String>) -> Self {
    Self::with_capacity(name, DEFAULT_CAPACITY)
  }

  pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
    Self::from_graph(name, SelfDescribingGraph::new(), capacity)
  }

  fn from_graph(
    name: impl Into<String>,
    graph: SelfDescribingGraph<WorkerVertex<T>>,
    capacity: usize,
  ) -> Self {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    Self {
      name: name.into(),
      graph,
      input: None,
      output_tx: Some(tx),
      output_rx: Some(rx),
      wiring: None,
      scope: None,
      state: State::Constructed,
    }
  }

  /// Build a pipeline from a batch of vertices. Parents may be declared in
  /// any order.
  pub fn from_vertices<I>(name: impl Into<String>, vertices: I) -> Result<Self, PipelineError>
  where
    I: IntoIterator<Item = WorkerVertex<T>>,
  {
    let mut graph = Self::new(name);
    graph.add_vertices(vertices)?;
    Ok(graph)
  }

  pub fn add_vertices<I>(&mut self, vertices: I) -> Result<(), PipelineError>
  where
    I: IntoIterator<Item = WorkerVertex<T>>,
  {
    self.ensure_constructed()?;
    self.graph.add_vertices(vertices)?;
    Ok(())
  }

  /// Add one vertex whose parents are already in the pipeline.
  pub fn add_vertex(&mut self, vertex: WorkerVertex<T>) -> Result<(), PipelineError> {
    self.ensure_constructed()?;
    self.graph.add_self_describe_vertex(vertex)?;
    Ok(())
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn graph(&self) -> &SelfDescribingGraph<WorkerVertex<T>> {
    &self.graph
  }

  pub fn len(&self) -> usize {
    self.graph.graph().order()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.graph().is_empty()
  }

  pub fn is_running(&self) -> bool {
    self.state == State::Running && self.scope.as_ref().is_some_and(|s| !s.is_cancelled())
  }

  /// Bind the root input, read by every parentless vertex.
  ///
  /// # Panics
  ///
  /// If the pipeline is already running.
  pub fn set_input(&mut self, input: ItemStream<T>) {
    if self.state == State::Running {
      panic!("set_input called on a running pipeline");
    }
    self.input = Some(input);
  }

  /// The merged output of every childless vertex.
  ///
  /// Can be taken at any time; it yields nothing until the pipeline runs.
  /// Items are dropped once the returned stream is dropped.
  pub fn output(&mut self) -> ItemStream<T> {
    match self.output_rx.take() {
      Some(rx) => ReceiverStream::new(rx).boxed(),
      None => {
        warn!(pipeline = %self.name, "pipeline output already taken; returning a closed stream");
        closed()
      }
    }
  }

  /// Wire every vertex's input to its parents' outputs.
  ///
  /// Fails on cycles. Called by `start` if not called beforehand.
  pub fn initialize(&mut self) -> Result<(), PipelineError> {
    match self.state {
      State::Constructed => {}
      State::Initialized => return Ok(()),
      State::Running => return Err(self.already_running()),
      State::Closed => return Err(self.closed_error()),
    }

    let order = self.graph.graph().topological_order()?;
    let mut taps: HashMap<String, VecDeque<ItemStream<T>>> = HashMap::new();
    let mut fan_outs = Vec::new();

    for name in &order {
      let vertex = self.graph.graph().vertex(name)?;
      let parents = self.graph.parents_of(name);
      let children = self.graph.children_of(name);
      let mut worker = vertex.lock();

      if !parents.is_empty() {
        let mut inputs = Vec::with_capacity(parents.len());
        for parent in &parents {
          let tap = taps.get_mut(parent).and_then(VecDeque::pop_front);
          let Some(tap) = tap else {
            return Err(PipelineError::MissingParentOutput {
              vertex: name.clone(),
              parent: parent.clone(),
            });
          };
          inputs.push(tap);
        }
        if inputs.is_empty() {
          return Err(PipelineError::EmptyMerge {
            vertex: name.clone(),
          });
        }
        worker.set_input(merge(inputs));
      }

      // a leaf's only consumer is the pipeline output
      let consumers = children.len().max(1);
      let output = worker.output();
      let outputs: VecDeque<_> = if consumers == 1 {
        VecDeque::from([output])
      } else {
        let mut fan_out = FanOut::new(output);
        let branches = (0..consumers).map(|_| fan_out.branch()).collect();
        fan_outs.push(fan_out);
        branches
      };
      debug!(vertex = %name, parents = parents.len(), consumers, "vertex_wired");
      taps.insert(name.clone(), outputs);
    }

    let leaves = self
      .graph
      .leaves()
      .iter()
      .filter_map(|leaf| taps.get_mut(leaf).and_then(VecDeque::pop_front))
      .collect();

    self.wiring = Some(Wiring { fan_outs, leaves });
    self.state = State::Initialized;
    Ok(())
  }

  /// Start every vertex and wait until all of them are subscribed.
  ///
  /// Returns the merged error stream of all vertices, each error tagged with
  /// the vertex name. Vertices run under a child of `cancel`; use
  /// [`WorkerGraph::close`] to stop this pipeline alone.
  #[instrument(name = "pipeline_start", skip(self, cancel), fields(pipeline = %self.name))]
  pub async fn start(&mut self, cancel: CancellationToken) -> Result<ErrorStream, PipelineError> {
    let barrier = Barrier::new();
    let errors = self.launch(&RunContext::new(cancel.clone(), barrier.clone()))?;

    tokio::select! {
      _ = barrier.synchronize() => {}
      _ = cancel.cancelled() => {
        warn!(pipeline = %self.name, "pipeline start cancelled");
        return Err(PipelineError::Cancelled);
      }
    }

    info!(pipeline = %self.name, vertices = self.len(), "pipeline_started");
    Ok(errors)
  }

  /// Cancel the pipeline's scope. Every vertex stops.
  pub fn close(&mut self) {
    if let Some(scope) = &self.scope {
      scope.cancel();
    }
    if self.state != State::Closed {
      info!(pipeline = %self.name, "pipeline_closed");
    }
    self.state = State::Closed;
  }

  /// A pipeline over exactly the given edges and their endpoints, sharing
  /// workers with this one. An empty slice clones the whole pipeline.
  pub fn clone_from_edges(&self, edges: &[Edge<String>]) -> Result<Self, PipelineError> {
    self.ensure_constructed()?;
    let graph = self.graph.clone_from_edges(edges)?;
    Ok(Self::from_graph(self.name.clone(), graph, self.capacity()))
  }

  /// One pipeline per weakly-connected component, sharing workers with this
  /// one.
  pub fn split(&self) -> Result<Vec<Self>, PipelineError> {
    self.ensure_constructed()?;
    let capacity = self.capacity();
    Ok(
      self
        .graph
        .split()?
        .into_iter()
        .enumerate()
        .map(|(i, graph)| Self::from_graph(format!("{}-{i}", self.name), graph, capacity))
        .collect(),
    )
  }

  /// Run every vertex under `ctx`. Vertices register with the context's
  /// barrier, if any.
  fn launch(&mut self, ctx: &RunContext) -> Result<ErrorStream, PipelineError> {
    if self.is_empty() {
      return Err(PipelineError::NoStageLoaded);
    }
    self.initialize()?;
    let Some(mut wiring) = self.wiring.take() else {
      return Err(self.already_running());
    };
    self.bind_root_input(&mut wiring);

    let scope = ctx.cancel().child_token();
    let vertex_ctx = match ctx.barrier() {
      Some(barrier) => RunContext::new(scope.clone(), barrier.clone()),
      None => RunContext::standalone(scope.clone()),
    };

    let order = self.graph.graph().topological_order()?;
    let mut errors = Vec::with_capacity(order.len());
    for name in order {
      let vertex = self.graph.graph().vertex(&name)?;
      let vertex_errors = vertex.lock().run(&vertex_ctx);
      debug!(vertex = %name, "vertex_started");
      errors.push(tag_errors(name, vertex_errors));
    }

    for fan_out in wiring.fan_outs {
      fan_out.spawn(scope.clone());
    }
    self.forward_output(merge(wiring.leaves), scope.clone());

    self.scope = Some(scope);
    self.state = State::Running;
    Ok(merge(errors))
  }

  fn bind_root_input(&mut self, wiring: &mut Wiring<T>) {
    let Some(input) = self.input.take() else {
      return;
    };
    let roots = self.graph.roots();
    let mut branches: Vec<ItemStream<T>> = if roots.len() == 1 {
      vec![input]
    } else {
      let mut fan_out = FanOut::new(input);
      let branches = roots.iter().map(|_| fan_out.branch()).collect();
      wiring.fan_outs.push(fan_out);
      branches
    };

    for root in roots {
      let (Ok(vertex), Some(branch)) = (self.graph.graph().vertex(&root), branches.pop()) else {
        continue;
      };
      vertex.lock().set_input(branch);
    }
  }

  /// Pump the merged leaves into the pipeline output. Once the output is
  /// dropped the leaves are still drained so upstream workers can finish.
  fn forward_output(&mut self, mut leaves: ItemStream<T>, scope: CancellationToken) {
    let mut tx = self.output_tx.take();
    if self.output_rx.take().is_some() {
      debug!(pipeline = %self.name, "pipeline output not taken; leaf items are discarded");
    }
    tokio::spawn(async move {
      loop {
        let item = tokio::select! {
          _ = scope.cancelled() => break,
          item = leaves.next() => item,
        };
        let Some(item) = item else {
          break;
        };
        if let Some(sender) = &tx {
          let sent = tokio::select! {
            _ = scope.cancelled() => break,
            sent = sender.send(item) => sent,
          };
          if sent.is_err() {
            tx = None;
          }
        }
      }
    });
  }

  fn capacity(&self) -> usize {
    self
      .output_tx
      .as_ref()
      .map_or(DEFAULT_CAPACITY, mpsc::Sender::max_capacity)
  }

  fn ensure_constructed(&self) -> Result<(), PipelineError> {
    match self.state {
      State::Constructed => Ok(()),
      State::Initialized => Err(PipelineError::AlreadyWired {
        pipeline: self.name.clone(),
      }),
      State::Running => Err(self.already_running()),
      State::Closed => Err(self.closed_error()),
    }
  }

  fn already_running(&self) -> PipelineError {
    PipelineError::AlreadyRunning {
      pipeline: self.name.clone(),
    }
  }

  fn closed_error(&self) -> PipelineError {
    PipelineError::Closed {
      pipeline: self.name.clone(),
    }
  }
}

fn tag_errors(vertex: String, errors: ErrorStream) -> ErrorStream {
  errors
    .map(move |e| {
      error!(vertex = %vertex, error = %e.message, "vertex_failed");
      e.in_worker(vertex.clone())
    })
    .boxed()
}

/// A pipeline nested as a vertex of another pipeline. Its vertices register
/// with the outer barrier and run under a child of the outer scope.
impl<T> Worker<T> for WorkerGraph<T>
where
  T: Clone + Send + 'static,
{
  fn set_input(&mut self, input: ItemStream<T>) {
    WorkerGraph::set_input(self, input);
  }

  fn output(&mut self) -> ItemStream<T> {
    WorkerGraph::output(self)
  }

  fn run(&mut self, ctx: &RunContext) -> ErrorStream {
    match self.launch(ctx) {
      Ok(errors) => errors,
      Err(e) => {
        error!(pipeline = %self.name, error = %e, "pipeline_failed");
        let worker = self.name.clone();
        stream::once(async move { WorkerError::new(worker, e.to_string()) }).boxed()
      }
    }
  }
}

impl<T> std::fmt::Debug for WorkerGraph<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WorkerGraph")
      .field("name", &self.name)
      .field("graph", &self.graph)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

impl<T> Drop for WorkerGraph<T> {
  fn drop(&mut self) {
    if let Some(scope) = &self.scope {
      scope.cancel();
    }
  }
}
