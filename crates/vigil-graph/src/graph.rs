use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Display;

use crate::edge::Edge;
use crate::error::GraphError;

type EdgeMap<K> = BTreeMap<K, BTreeMap<K, Edge<K>>>;

/// Directed graph keyed by `K` with vertex payload `V`.
///
/// Edges are stored twice: once in the adjacency map (source -> target) and
/// once in the predecessor map (target -> source). Undirected views are derived
/// from both and never stored.
#[derive(Debug, Clone)]
pub struct Graph<K, V> {
  vertices: BTreeMap<K, V>,
  adjacency: EdgeMap<K>,
  predecessors: EdgeMap<K>,
}

impl<K, V> Default for Graph<K, V> {
  fn default() -> Self {
    Self {
      vertices: BTreeMap::new(),
      adjacency: BTreeMap::new(),
      predecessors: BTreeMap::new(),
    }
  }
}

impl<K, V> Graph<K, V>
where
  K: Ord + Clone + Display,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a vertex. Returns `false` and keeps the existing value if `key` is
  /// already present.
  pub fn add_vertex(&mut self, key: K, value: V) -> bool {
    if self.vertices.contains_key(&key) {
      return false;
    }
    self.adjacency.entry(key.clone()).or_default();
    self.predecessors.entry(key.clone()).or_default();
    self.vertices.insert(key, value);
    true
  }

  /// Add an edge between two existing vertices.
  pub fn add_edge(&mut self, source: K, target: K) -> Result<(), GraphError> {
    self.add_edge_with(Edge::new(source, target))
  }

  /// Add a prepared edge. Re-adding an existing edge keeps the original.
  pub fn add_edge_with(&mut self, edge: Edge<K>) -> Result<(), GraphError> {
    for key in [&edge.source, &edge.target] {
      if !self.vertices.contains_key(key) {
        return Err(GraphError::VertexNotFound(key.to_string()));
      }
    }

    let outgoing = self.adjacency.entry(edge.source.clone()).or_default();
    if outgoing.contains_key(&edge.target) {
      return Ok(());
    }
    outgoing.insert(edge.target.clone(), edge.clone());
    self
      .predecessors
      .entry(edge.target.clone())
      .or_default()
      .insert(edge.source.clone(), edge);
    Ok(())
  }

  pub fn has_vertex(&self, key: &K) -> bool {
    self.vertices.contains_key(key)
  }

  pub fn vertex(&self, key: &K) -> Result<&V, GraphError> {
    self
      .vertices
      .get(key)
      .ok_or_else(|| GraphError::VertexNotFound(key.to_string()))
  }

  pub fn edge(&self, source: &K, target: &K) -> Option<&Edge<K>> {
    self.adjacency.get(source).and_then(|out| out.get(target))
  }

  /// All edges, ordered by source then target.
  pub fn edges(&self) -> Vec<Edge<K>> {
    self
      .adjacency
      .values()
      .flat_map(|out| out.values().cloned())
      .collect()
  }

  /// Vertex keys in key order.
  pub fn keys(&self) -> impl Iterator<Item = &K> {
    self.vertices.keys()
  }

  /// Number of vertices.
  pub fn order(&self) -> usize {
    self.vertices.len()
  }

  /// Number of edges.
  pub fn size(&self) -> usize {
    self.adjacency.values().map(BTreeMap::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.vertices.is_empty()
  }

  /// Direct successors of `key`.
  pub fn successors(&self, key: &K) -> Vec<K> {
    self
      .adjacency
      .get(key)
      .map(|out| out.keys().cloned().collect())
      .unwrap_or_default()
  }

  /// Direct predecessors of `key`.
  pub fn predecessors(&self, key: &K) -> Vec<K> {
    self
      .predecessors
      .get(key)
      .map(|inc| inc.keys().cloned().collect())
      .unwrap_or_default()
  }

  pub fn adjacency_map(&self) -> &BTreeMap<K, BTreeMap<K, Edge<K>>> {
    &self.adjacency
  }

  pub fn predecessor_map(&self) -> &BTreeMap<K, BTreeMap<K, Edge<K>>> {
    &self.predecessors
  }

  /// For each vertex, the union of its incoming and outgoing edges keyed by the
  /// vertex on the other end.
  pub fn undirected_neighbors(&self) -> BTreeMap<K, BTreeMap<K, Edge<K>>> {
    let mut neighbors: EdgeMap<K> = BTreeMap::new();
    for key in self.vertices.keys() {
      let entry = neighbors.entry(key.clone()).or_default();
      if let Some(out) = self.adjacency.get(key) {
        entry.extend(out.iter().map(|(k, e)| (k.clone(), e.clone())));
      }
      if let Some(inc) = self.predecessors.get(key) {
        for (other, edge) in inc {
          entry.entry(other.clone()).or_insert_with(|| edge.clone());
        }
      }
    }
    neighbors
  }

  /// Topological order of the vertices, ties broken by key order.
  pub fn topological_order(&self) -> Result<Vec<K>, GraphError> {
    let mut in_degree: BTreeMap<&K, usize> = self
      .vertices
      .keys()
      .map(|k| (k, self.predecessors.get(k).map_or(0, BTreeMap::len)))
      .collect();

    let mut queue: VecDeque<&K> = in_degree
      .iter()
      .filter(|(_, degree)| **degree == 0)
      .map(|(k, _)| *k)
      .collect();

    let mut order = Vec::with_capacity(self.vertices.len());
    while let Some(key) = queue.pop_front() {
      order.push(key.clone());
      if let Some(out) = self.adjacency.get(key) {
        for target in out.keys() {
          if let Some(degree) = in_degree.get_mut(target) {
            *degree -= 1;
            if *degree == 0 {
              queue.push_back(target);
            }
          }
        }
      }
    }

    if order.len() < self.vertices.len() {
      let stuck: BTreeSet<&K> = in_degree
        .iter()
        .filter(|(_, degree)| **degree > 0)
        .map(|(k, _)| *k)
        .collect();
      // every stuck vertex has a stuck predecessor, so walking back through
      // as many of them as there are ends on a cycle
      let mut on_cycle = stuck.first().copied();
      for _ in 0..stuck.len() {
        on_cycle = on_cycle.and_then(|key| {
          self
            .predecessors
            .get(key)?
            .keys()
            .find(|parent| stuck.contains(parent))
        });
      }
      let vertex = on_cycle.map(ToString::to_string).unwrap_or_default();
      return Err(GraphError::CycleDetected(vertex));
    }
    Ok(order)
  }
}

impl<K, V> Graph<K, V>
where
  K: Ord + Clone + Display,
  V: Clone,
{
  /// Every vertex referenced by the edge maps, with its value.
  pub fn vertices(&self) -> Result<BTreeMap<K, V>, GraphError> {
    let mut out = BTreeMap::new();
    for key in self.adjacency.keys().chain(self.predecessors.keys()) {
      if !out.contains_key(key) {
        out.insert(key.clone(), self.vertex(key)?.clone());
      }
    }
    Ok(out)
  }

  /// Each vertex mapped to its direct successors with values resolved.
  pub fn adjacency_vertices(&self) -> Result<BTreeMap<K, BTreeMap<K, V>>, GraphError> {
    self.resolve(&self.adjacency)
  }

  /// Each vertex mapped to its direct predecessors with values resolved.
  pub fn predecessor_vertices(&self) -> Result<BTreeMap<K, BTreeMap<K, V>>, GraphError> {
    self.resolve(&self.predecessors)
  }

  fn resolve(&self, map: &EdgeMap<K>) -> Result<BTreeMap<K, BTreeMap<K, V>>, GraphError> {
    let mut out = BTreeMap::new();
    for (key, others) in map {
      self.vertex(key)?;
      let mut resolved = BTreeMap::new();
      for other in others.keys() {
        resolved.insert(other.clone(), self.vertex(other)?.clone());
      }
      out.insert(key.clone(), resolved);
    }
    Ok(out)
  }

  /// Build a new graph holding exactly the given edges and their endpoints.
  /// An empty slice clones the whole graph.
  pub fn clone_from_edges(&self, edges: &[Edge<K>]) -> Result<Self, GraphError> {
    if edges.is_empty() {
      return Ok(self.clone());
    }

    let mut graph = Self::new();
    for edge in edges {
      for key in [&edge.source, &edge.target] {
        graph.add_vertex(key.clone(), self.vertex(key)?.clone());
      }
      graph.add_edge_with(edge.clone())?;
    }
    Ok(graph)
  }

  /// Partition into maximal weakly-connected components.
  ///
  /// Each component is an independent graph with its own copies of vertices
  /// and edges. Components are returned in order of their smallest key.
  pub fn split(&self) -> Result<Vec<Self>, GraphError> {
    let neighbors = self.undirected_neighbors();
    let mut remaining: BTreeSet<K> = self.vertices.keys().cloned().collect();
    let mut components = Vec::new();

    while let Some(start) = remaining.first().cloned() {
      let mut visited = BTreeSet::new();
      let mut edges = Vec::new();
      let mut frontier = vec![start];

      while let Some(key) = frontier.pop() {
        if !visited.insert(key.clone()) {
          continue;
        }
        let Some(adjacent) = neighbors.get(&key) else {
          continue;
        };
        for (next, edge) in adjacent {
          edges.push(edge.clone());
          if !visited.contains(next) {
            frontier.push(next.clone());
          }
        }
      }

      let mut component = Self::new();
      for key in &visited {
        component.add_vertex(key.clone(), self.vertex(key)?.clone());
        remaining.remove(key);
      }
      for edge in edges {
        component.add_edge_with(edge)?;
      }
      components.push(component);
    }

    Ok(components)
  }
}
