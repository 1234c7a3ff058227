//! Length-delimited protobuf framing of [`DataStream`] frames, for carrying
//! them over a byte pipe such as a child process's stdio.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use prost::Message;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, Encoder, FramedRead, LengthDelimitedCodec};

use crate::error::TransportError;
use crate::frame::{DataStream, MAX_FRAME_SIZE};

/// Room for the non-payload fields of an encoded frame.
const FRAME_OVERHEAD: usize = 1024;

pub struct FrameCodec {
  inner: LengthDelimitedCodec,
}

impl FrameCodec {
  pub fn new() -> Self {
    Self::with_limit(MAX_FRAME_SIZE)
  }

  /// Accept frames whose payload is at most `limit` bytes.
  pub fn with_limit(limit: usize) -> Self {
    Self {
      inner: LengthDelimitedCodec::builder()
        .max_frame_length(limit + FRAME_OVERHEAD)
        .new_codec(),
    }
  }
}

impl Default for FrameCodec {
  fn default() -> Self {
    Self::new()
  }
}

impl Decoder for FrameCodec {
  type Item = DataStream;
  type Error = TransportError;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
    match self.inner.decode(src)? {
      Some(buf) => Ok(Some(DataStream::decode(buf.freeze())?)),
      None => Ok(None),
    }
  }
}

impl Encoder<DataStream> for FrameCodec {
  type Error = TransportError;

  fn encode(&mut self, frame: DataStream, dst: &mut BytesMut) -> Result<(), Self::Error> {
    let buf = Bytes::from(frame.encode_to_vec());
    self.inner.encode(buf, dst)?;
    Ok(())
  }
}

/// Decode frames from a reader. The stream ends cleanly at EOF.
pub fn read_frames<R>(reader: R) -> impl Stream<Item = Result<DataStream, TransportError>>
where
  R: AsyncRead + Unpin + Send + 'static,
{
  FramedRead::new(reader, FrameCodec::new()).boxed()
}
