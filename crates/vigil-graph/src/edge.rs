use std::collections::BTreeMap;

/// A directed edge between two vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<K> {
  pub source: K,
  pub target: K,
  /// Free-form labels attached to the edge.
  pub attributes: BTreeMap<String, String>,
}

impl<K> Edge<K> {
  pub fn new(source: K, target: K) -> Self {
    Self {
      source,
      target,
      attributes: BTreeMap::new(),
    }
  }

  /// Attach an attribute, replacing any previous value for `key`.
  pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.attributes.insert(key.into(), value.into());
    self
  }
}
