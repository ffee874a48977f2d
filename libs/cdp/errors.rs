// Copyright 2025-2026 the Headlamp authors. MIT license.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// The `error` member of a CDP response frame.
#[derive(Debug, Clone, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
  pub code: i64,
  pub message: String,
  #[serde(default)]
  pub data: Option<Value>,
}

#[derive(Debug, Error)]
pub enum CdpError {
  /// The WebSocket closed while a call was outstanding, or a call was
  /// issued after the socket closed.
  #[error("connection to the browser closed")]
  ConnectionClosed,
  /// No transport has been established yet.
  #[error("not connected to a browser target")]
  NotConnected,
  /// A single command exceeded its deadline. The pending slot is freed
  /// when this is returned; a late response is drained and dropped.
  #[error("{method} (id {id}) timed out after {ms} ms")]
  Timeout { method: String, id: u32, ms: u64 },
  /// The browser answered the command with its own `error` member.
  #[error("browser rejected {method}: {error}")]
  Protocol { method: String, error: RpcError },
  /// The endpoint sent something that is not a CDP frame. Inbound decode
  /// failures are logged and dropped instead; this surfaces only from
  /// response payload deserialization.
  #[error("malformed CDP payload: {0}")]
  Decode(String),
  /// WebSocket handshake or I/O failure while connecting.
  #[error("websocket connection failed: {0}")]
  WebSocket(String),
  /// Failure talking to the browser's HTTP discovery endpoints.
  #[error("devtools HTTP endpoint error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("invalid devtools URL: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

impl CdpError {
  pub fn is_disconnect(&self) -> bool {
    matches!(self, CdpError::ConnectionClosed | CdpError::NotConnected)
  }
}

impl From<fastwebsockets::WebSocketError> for CdpError {
  fn from(err: fastwebsockets::WebSocketError) -> Self {
    CdpError::WebSocket(err.to_string())
  }
}
