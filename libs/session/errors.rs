// Copyright 2025-2026 the Headlamp authors. MIT license.

use headlamp_cdp::CdpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
  #[error(transparent)]
  Cdp(#[from] CdpError),
  /// Evaluation was requested while the isolate is stopped. Evaluating
  /// in that state must target a call frame instead.
  #[error("execution is already paused ({0}); use a call-frame evaluation")]
  AlreadyPaused(String),
  #[error("execution is not paused")]
  NotPaused,
  #[error("a breakpoint needs either a url or a urlRegex")]
  BreakpointSpecInvalid,
  #[error("no breakpoint with id {0}")]
  BreakpointNotFound(String),
  #[error("no paused request with id {0}")]
  PausedRequestNotFound(String),
  #[error("no interception rule with id {0}")]
  RuleNotFound(String),
  #[error("no debuggable target matching {0}")]
  TargetNotFound(String),
  #[error("response body unavailable for request {0}")]
  ResponseBodyUnavailable(String),
  #[error("no script with id {0}")]
  ScriptNotFound(String),
  #[error("node not found for selector {0:?}")]
  NodeNotFound(String),
  #[error("navigation failed: {0}")]
  NavigationFailed(String),
}
