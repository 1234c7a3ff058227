//! Splitting items into bounded frames and putting them back together.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::error::TransportError;
use crate::frame::{DataStream, MAX_FRAME_SIZE};

/// Splits items into frames of at most `limit` bytes.
#[derive(Debug, Clone)]
pub struct Chunker {
  parent_src: String,
  limit: usize,
}

impl Chunker {
  pub fn new(parent_src: impl Into<String>) -> Self {
    Self::with_limit(parent_src, MAX_FRAME_SIZE)
  }

  pub fn with_limit(parent_src: impl Into<String>, limit: usize) -> Self {
    Self {
      parent_src: parent_src.into(),
      limit: limit.max(1),
    }
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  /// Frames for one item under a fresh correlation id.
  ///
  /// An item within the limit, including an empty one, is a single complete
  /// frame. Frames slice `data` without copying.
  pub fn chunk(&self, data: Bytes) -> Vec<DataStream> {
    let id = Uuid::new_v4().to_string();
    let total_len = data.len() as u64;

    if data.len() <= self.limit {
      return vec![self.frame(&id, data, true, total_len)];
    }

    let count = data.len().div_ceil(self.limit);
    (0..count)
      .map(|i| {
        let start = i * self.limit;
        let end = (start + self.limit).min(data.len());
        self.frame(&id, data.slice(start..end), i + 1 == count, total_len)
      })
      .collect()
  }

  fn frame(&self, id: &str, data: Bytes, is_complete: bool, total_len: u64) -> DataStream {
    DataStream {
      data,
      parent_src: self.parent_src.clone(),
      id: id.to_string(),
      is_complete,
      total_len,
    }
  }
}

/// Buffers frames per correlation id until the complete frame arrives.
///
/// Frames of one id must arrive in send order. Frames of different ids may
/// interleave.
#[derive(Debug, Default)]
pub struct Reassembler {
  pending: HashMap<String, Vec<DataStream>>,
}

impl Reassembler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Feed one frame. Returns the whole item once its complete frame arrives.
  pub fn push(&mut self, frame: DataStream) -> Result<Option<DataStream>, TransportError> {
    if !frame.is_complete {
      trace!(id = %frame.id, len = frame.data.len(), "buffering partial frame");
      self.pending.entry(frame.id.clone()).or_default().push(frame);
      return Ok(None);
    }

    let Some(parts) = self.pending.remove(&frame.id) else {
      return check_length(frame).map(Some);
    };

    let capacity = usize::try_from(frame.total_len).unwrap_or_default();
    let mut data = BytesMut::with_capacity(capacity);
    for part in &parts {
      data.extend_from_slice(&part.data);
    }
    data.extend_from_slice(&frame.data);

    check_length(DataStream {
      data: data.freeze(),
      ..frame
    })
    .map(Some)
  }

  /// Items with buffered frames but no complete frame yet.
  pub fn pending(&self) -> usize {
    self.pending.len()
  }

  /// Drop all buffered partial items, returning how many were dropped.
  pub fn clear(&mut self) -> usize {
    let dropped = self.pending.len();
    if dropped > 0 {
      warn!(dropped, "discarding incomplete items");
    }
    self.pending.clear();
    dropped
  }
}

fn check_length(item: DataStream) -> Result<DataStream, TransportError> {
  let actual = item.data.len() as u64;
  if actual != item.total_len {
    return Err(TransportError::LengthMismatch {
      id: item.id,
      expected: item.total_len,
      actual,
    });
  }
  Ok(item)
}
