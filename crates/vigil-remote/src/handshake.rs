//! Plugin handshake.
//!
//! The host starts a plugin process with a magic cookie in its environment.
//! A plugin that finds the cookie missing or wrong refuses to serve. A plugin
//! that accepts prints one handshake line on stdout:
//!
//! ```text
//! CORE-VERSION|APP-VERSION|NETWORK|ADDRESS|PROTOCOL
//! ```
//!
//! The host checks both versions before connecting. Any mismatch is a
//! connection failure, never a data-plane error.

use std::fmt;
use std::str::FromStr;

use crate::error::TransportError;

/// Version of the handshake line format itself.
pub const CORE_PROTOCOL_VERSION: u32 = 1;

pub const DEFAULT_COOKIE_KEY: &str = "VIGIL_PLUGIN";
pub const DEFAULT_COOKIE_VALUE: &str = "d1f2b0c8-vigil-worker";

/// Settings both sides must agree on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
  pub protocol_version: u32,
  pub cookie_key: String,
  pub cookie_value: String,
}

impl Default for HandshakeConfig {
  fn default() -> Self {
    Self {
      protocol_version: 1,
      cookie_key: DEFAULT_COOKIE_KEY.to_string(),
      cookie_value: DEFAULT_COOKIE_VALUE.to_string(),
    }
  }
}

impl HandshakeConfig {
  /// Environment entry the host sets on the plugin process.
  pub fn env(&self) -> (String, String) {
    (self.cookie_key.clone(), self.cookie_value.clone())
  }

  /// Plugin side: check the cookie using `lookup` (normally `std::env::var`).
  pub fn verify_cookie<F>(&self, lookup: F) -> Result<(), TransportError>
  where
    F: FnOnce(&str) -> Option<String>,
  {
    match lookup(&self.cookie_key) {
      Some(value) if value == self.cookie_value => Ok(()),
      Some(_) => Err(TransportError::handshake(format!(
        "magic cookie '{}' does not match",
        self.cookie_key
      ))),
      None => Err(TransportError::handshake(format!(
        "magic cookie '{}' not set; this binary is a plugin and is not meant to be run directly",
        self.cookie_key
      ))),
    }
  }

  /// Plugin side: the line announcing where the plugin listens.
  pub fn announce(&self, network: impl Into<String>, address: impl Into<String>) -> Handshake {
    Handshake {
      core_version: CORE_PROTOCOL_VERSION,
      app_version: self.protocol_version,
      network: network.into(),
      address: address.into(),
      protocol: "grpc".to_string(),
    }
  }

  /// Host side: parse the plugin's handshake line and check its versions.
  pub fn accept(&self, line: &str) -> Result<Handshake, TransportError> {
    let handshake: Handshake = line.trim().parse()?;
    if handshake.core_version != CORE_PROTOCOL_VERSION {
      return Err(TransportError::handshake(format!(
        "unsupported core protocol version {}, expected {CORE_PROTOCOL_VERSION}",
        handshake.core_version
      )));
    }
    if handshake.app_version != self.protocol_version {
      return Err(TransportError::handshake(format!(
        "plugin speaks protocol version {}, host expects {}",
        handshake.app_version, self.protocol_version
      )));
    }
    Ok(handshake)
  }
}

/// A parsed handshake line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
  pub core_version: u32,
  pub app_version: u32,
  pub network: String,
  pub address: String,
  pub protocol: String,
}

impl fmt::Display for Handshake {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}|{}|{}|{}|{}",
      self.core_version, self.app_version, self.network, self.address, self.protocol
    )
  }
}

impl FromStr for Handshake {
  type Err = TransportError;

  fn from_str(line: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = line.split('|').collect();
    let [core, app, network, address, protocol] = parts.as_slice() else {
      return Err(TransportError::handshake(format!(
        "malformed handshake line: '{line}'"
      )));
    };
    let version = |field: &str, value: &str| {
      value
        .parse::<u32>()
        .map_err(|_| TransportError::handshake(format!("invalid {field} version '{value}'")))
    };
    Ok(Self {
      core_version: version("core", *core)?,
      app_version: version("protocol", *app)?,
      network: network.to_string(),
      address: address.to_string(),
      protocol: protocol.to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_announce_then_accept() {
    let config = HandshakeConfig::default();
    let line = config.announce("unix", "/tmp/plugin-4021.sock").to_string();
    assert_eq!(line, "1|1|unix|/tmp/plugin-4021.sock|grpc");

    let handshake = config.accept(&format!("{line}\n")).unwrap();
    assert_eq!(handshake.address, "/tmp/plugin-4021.sock");
  }

  #[test]
  fn test_version_mismatch_is_a_handshake_error() {
    let host = HandshakeConfig {
      protocol_version: 2,
      ..Default::default()
    };
    let line = HandshakeConfig::default().announce("tcp", "127.0.0.1:4000").to_string();
    assert!(matches!(host.accept(&line), Err(TransportError::Handshake { .. })));
    assert!(matches!(
      host.accept("7|2|tcp|127.0.0.1:4000|grpc"),
      Err(TransportError::Handshake { .. })
    ));
  }

  #[test]
  fn test_malformed_line_rejected() {
    let config = HandshakeConfig::default();
    assert!(config.accept("hello").is_err());
    assert!(config.accept("1|x|tcp|addr|grpc").is_err());
  }

  #[test]
  fn test_cookie_checks() {
    let config = HandshakeConfig::default();
    let (key, value) = config.env();
    assert!(config.verify_cookie(|k| (k == key).then(|| value.clone())).is_ok());
    assert!(config.verify_cookie(|_| Some("wrong".to_string())).is_err());

    let err = config.verify_cookie(|_| None).unwrap_err();
    assert!(!err.is_normal_termination());
  }
}
