use tracing::error;

use crate::edge::Edge;
use crate::error::GraphError;
use crate::graph::Graph;

/// A vertex that knows its own name and the names of its parents.
pub trait SelfDescribe {
  fn name(&self) -> &str;
  fn parents(&self) -> &[String];
}

/// Graph built from vertex metadata: every declared parent becomes an edge
/// `parent -> vertex`.
#[derive(Debug, Clone)]
pub struct SelfDescribingGraph<V> {
  graph: Graph<String, V>,
}

impl<V> Default for SelfDescribingGraph<V> {
  fn default() -> Self {
    Self {
      graph: Graph::default(),
    }
  }
}

impl<V: SelfDescribe> SelfDescribingGraph<V> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a batch of vertices, then wire their parents.
  ///
  /// Parents may refer to vertices appearing later in `vertices`, which is why
  /// insertion and wiring happen in two passes. Both passes fail fast.
  pub fn add_vertices<I>(&mut self, vertices: I) -> Result<(), GraphError>
  where
    I: IntoIterator<Item = V>,
  {
    let mut wiring = Vec::new();
    for vertex in vertices {
      let name = vertex.name().to_string();
      if self.graph.has_vertex(&name) {
        error!(vertex = %name, "duplicate vertex name");
        return Err(GraphError::VertexAlreadyExists(name));
      }
      wiring.push((name.clone(), vertex.parents().to_vec()));
      self.graph.add_vertex(name, vertex);
    }

    for (name, parents) in wiring {
      self.wire(&name, &parents)?;
    }
    Ok(())
  }

  /// Insert one vertex whose parents are already present.
  pub fn add_self_describe_vertex(&mut self, vertex: V) -> Result<(), GraphError> {
    let name = vertex.name().to_string();
    if self.graph.has_vertex(&name) {
      error!(vertex = %name, "duplicate vertex name");
      return Err(GraphError::VertexAlreadyExists(name));
    }
    if let Some(parent) = vertex.parents().iter().find(|p| !self.graph.has_vertex(p)) {
      return Err(GraphError::ParentNotFound {
        vertex: name,
        parent: parent.clone(),
      });
    }

    let parents = vertex.parents().to_vec();
    self.graph.add_vertex(name.clone(), vertex);
    self.wire(&name, &parents)
  }

  fn wire(&mut self, name: &str, parents: &[String]) -> Result<(), GraphError> {
    for parent in parents {
      if !self.graph.has_vertex(parent) {
        error!(vertex = %name, parent = %parent, "unresolved parent");
        return Err(GraphError::ParentNotFound {
          vertex: name.to_string(),
          parent: parent.clone(),
        });
      }
      self.graph.add_edge(parent.clone(), name.to_string())?;
    }
    Ok(())
  }
}

impl<V> SelfDescribingGraph<V> {
  pub fn graph(&self) -> &Graph<String, V> {
    &self.graph
  }

  pub fn into_graph(self) -> Graph<String, V> {
    self.graph
  }

  /// Vertices without parents.
  pub fn roots(&self) -> Vec<String> {
    self
      .graph
      .predecessor_map()
      .iter()
      .filter(|(_, inc)| inc.is_empty())
      .map(|(k, _)| k.clone())
      .collect()
  }

  /// Vertices without children.
  pub fn leaves(&self) -> Vec<String> {
    self
      .graph
      .adjacency_map()
      .iter()
      .filter(|(_, out)| out.is_empty())
      .map(|(k, _)| k.clone())
      .collect()
  }

  pub fn parents_of(&self, name: &str) -> Vec<String> {
    self.graph.predecessors(&name.to_string())
  }

  pub fn children_of(&self, name: &str) -> Vec<String> {
    self.graph.successors(&name.to_string())
  }
}

impl<V: Clone> SelfDescribingGraph<V> {
  pub fn clone_from_edges(&self, edges: &[Edge<String>]) -> Result<Self, GraphError> {
    Ok(Self {
      graph: self.graph.clone_from_edges(edges)?,
    })
  }

  pub fn split(&self) -> Result<Vec<Self>, GraphError> {
    Ok(
      self
        .graph
        .split()?
        .into_iter()
        .map(|graph| Self { graph })
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Clone)]
  struct Stage {
    name: String,
    parents: Vec<String>,
  }

  fn stage(name: &str, parents: &[&str]) -> Stage {
    Stage {
      name: name.to_string(),
      parents: parents.iter().map(|p| p.to_string()).collect(),
    }
  }

  impl SelfDescribe for Stage {
    fn name(&self) -> &str {
      &self.name
    }

    fn parents(&self) -> &[String] {
      &self.parents
    }
  }

  #[test]
  fn test_forward_references_resolve() {
    let mut g = SelfDescribingGraph::new();
    g.add_vertices(vec![stage("report", &["scan"]), stage("scan", &["crawl"]), stage("crawl", &[])])
      .unwrap();

    assert_eq!(g.roots(), vec!["crawl".to_string()]);
    assert_eq!(g.leaves(), vec!["report".to_string()]);
    assert_eq!(g.parents_of("scan"), vec!["crawl".to_string()]);
    assert_eq!(g.children_of("scan"), vec!["report".to_string()]);
  }

  #[test]
  fn test_duplicate_name_fails() {
    let mut g = SelfDescribingGraph::new();
    let err = g
      .add_vertices(vec![stage("a", &[]), stage("a", &[])])
      .unwrap_err();
    assert_eq!(err, GraphError::VertexAlreadyExists("a".into()));
  }

  #[test]
  fn test_unresolved_parent_fails() {
    let mut g = SelfDescribingGraph::new();
    let err = g
      .add_vertices(vec![stage("a", &[]), stage("b", &["ghost"])])
      .unwrap_err();
    assert_eq!(
      err,
      GraphError::ParentNotFound {
        vertex: "b".into(),
        parent: "ghost".into()
      }
    );
  }

  #[test]
  fn test_incremental_add() {
    let mut g = SelfDescribingGraph::new();
    g.add_self_describe_vertex(stage("a", &[])).unwrap();
    g.add_self_describe_vertex(stage("b", &["a"])).unwrap();

    let err = g.add_self_describe_vertex(stage("c", &["d"])).unwrap_err();
    assert!(matches!(err, GraphError::ParentNotFound { .. }));
    assert!(!g.graph().has_vertex(&"c".to_string()));
    assert_eq!(g.graph().size(), 1);
  }

  #[test]
  fn test_split_keeps_payloads() {
    let mut g = SelfDescribingGraph::new();
    g.add_vertices(vec![
      stage("a", &[]),
      stage("b", &["a"]),
      stage("x", &[]),
      stage("y", &["x"]),
    ])
    .unwrap();

    let parts = g.split().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[1].roots(), vec!["x".to_string()]);
    assert_eq!(parts[1].graph().vertex(&"y".to_string()).unwrap().parents, vec!["x"]);
  }
}
