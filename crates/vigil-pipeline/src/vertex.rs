use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use vigil_graph::SelfDescribe;
use vigil_worker::{BoxWorker, Worker};

/// A worker shared between a graph and its clones.
pub type SharedWorker<T> = Arc<Mutex<BoxWorker<T>>>;

/// A named worker and the names of the vertices feeding it.
///
/// Cloning a vertex shares the worker, so clones and splits of a graph keep
/// their bindings.
pub struct WorkerVertex<T> {
  name: String,
  parents: Vec<String>,
  worker: SharedWorker<T>,
}

impl<T: 'static> WorkerVertex<T> {
  pub fn new<W>(name: impl Into<String>, parents: Vec<String>, worker: W) -> Self
  where
    W: Worker<T> + 'static,
  {
    Self::from_box(name, parents, Box::new(worker))
  }

  pub fn from_box(name: impl Into<String>, parents: Vec<String>, worker: BoxWorker<T>) -> Self {
    Self {
      name: name.into(),
      parents,
      worker: Arc::new(Mutex::new(worker)),
    }
  }

  /// A vertex without parents.
  pub fn root<W>(name: impl Into<String>, worker: W) -> Self
  where
    W: Worker<T> + 'static,
  {
    Self::new(name, Vec::new(), worker)
  }
}

impl<T> WorkerVertex<T> {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn parents(&self) -> &[String] {
    &self.parents
  }

  pub fn shares_worker_with(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.worker, &other.worker)
  }

  /// Lock the worker. A panic in another holder does not make the worker
  /// unusable; rebinding checks still apply.
  pub(crate) fn lock(&self) -> MutexGuard<'_, BoxWorker<T>> {
    self.worker.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<T> Clone for WorkerVertex<T> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      parents: self.parents.clone(),
      worker: Arc::clone(&self.worker),
    }
  }
}

impl<T> SelfDescribe for WorkerVertex<T> {
  fn name(&self) -> &str {
    &self.name
  }

  fn parents(&self) -> &[String] {
    &self.parents
  }
}

impl<T> fmt::Debug for WorkerVertex<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerVertex")
      .field("name", &self.name)
      .field("parents", &self.parents)
      .finish_non_exhaustive()
  }
}
