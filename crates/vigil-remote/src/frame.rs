use bytes::Bytes;

/// Default largest payload carried by one frame.
pub const MAX_FRAME_SIZE: usize = 3 * 1024 * 1024;

/// One frame of a chunked item.
///
/// Frames of one item share `id` and `total_len`; the last one has
/// `is_complete` set. Their `data` concatenated in send order is the item.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DataStream {
  #[prost(bytes = "bytes", tag = "1")]
  pub data: Bytes,
  /// Stage that produced the item.
  #[prost(string, tag = "2")]
  pub parent_src: String,
  /// Correlation id shared by every frame of the item.
  #[prost(string, tag = "3")]
  pub id: String,
  #[prost(bool, tag = "4")]
  pub is_complete: bool,
  #[prost(uint64, tag = "5")]
  pub total_len: u64,
}
