use thiserror::Error;

/// Errors crossing the remote worker boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
  /// The remote side closed the stream. Normal completion.
  #[error("end of stream")]
  EndOfStream,

  /// The call was cancelled. Normal completion.
  #[error("call cancelled")]
  Cancelled,

  /// The remote side failed the call.
  #[error("remote status: {message}")]
  Status { message: String },

  /// Protocol version or magic cookie mismatch. Fatal for the connection.
  #[error("handshake failed: {message}")]
  Handshake { message: String },

  /// A reassembled item does not match its declared length.
  #[error("item '{id}' reassembled to {actual} bytes, expected {expected}")]
  LengthMismatch { id: String, expected: u64, actual: u64 },

  #[error("failed to decode frame: {message}")]
  Decode { message: String },

  #[error("transport i/o error: {message}")]
  Io { message: String },
}

impl TransportError {
  pub fn status(message: impl Into<String>) -> Self {
    Self::Status {
      message: message.into(),
    }
  }

  pub fn handshake(message: impl Into<String>) -> Self {
    Self::Handshake {
      message: message.into(),
    }
  }

  /// End of stream and cancellation end a call without being failures.
  pub fn is_normal_termination(&self) -> bool {
    matches!(self, Self::EndOfStream | Self::Cancelled)
  }
}

impl From<prost::DecodeError> for TransportError {
  fn from(err: prost::DecodeError) -> Self {
    Self::Decode {
      message: err.to_string(),
    }
  }
}

impl From<std::io::Error> for TransportError {
  fn from(err: std::io::Error) -> Self {
    Self::Io {
      message: err.to_string(),
    }
  }
}
