// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Projection of the Debugger domain: the current pause (if any) and the
//! set of managed breakpoints.

use headlamp_cdp::protocol::CallFrame;
use headlamp_cdp::protocol::DebuggerPaused;
use headlamp_cdp::protocol::Location;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

/// Mirrors the isolate: either running, or stopped with the frames Chrome
/// reported. Every `Debugger.paused` overwrites the previous value.
#[derive(Debug, Clone, Default)]
pub enum PauseState {
  #[default]
  Running,
  Paused {
    reason: String,
    call_frames: Vec<CallFrame>,
    hit_breakpoints: Vec<String>,
    data: Option<Value>,
    async_stack_trace: Option<Value>,
  },
}

/// How a breakpoint was addressed when it was created. Exactly one of the
/// three carriers is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedBreakpoint {
  pub id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url_regex: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub script_id: Option<String>,
  pub line_number: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub column_number: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  pub resolved_locations: Vec<Location>,
  pub enabled: bool,
}

#[derive(Debug, Default)]
pub struct DebugState {
  enabled: bool,
  pause: PauseState,
  breakpoints: IndexMap<String, ManagedBreakpoint>,
  pause_on_exceptions: Option<String>,
  async_stack_depth: u32,
}

impl DebugState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  /// Disabling resets the pause and drops every managed breakpoint;
  /// Chrome forgets them too once the domain goes away.
  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
    if !enabled {
      self.pause = PauseState::Running;
      self.breakpoints.clear();
      self.pause_on_exceptions = None;
      self.async_stack_depth = 0;
    }
  }

  pub fn on_paused(&mut self, params: DebuggerPaused) {
    if params.call_frames.is_empty() {
      log::debug!("pause event with no call frames (reason {})", params.reason);
    }
    self.pause = PauseState::Paused {
      reason: params.reason,
      call_frames: params.call_frames,
      hit_breakpoints: params.hit_breakpoints.unwrap_or_default(),
      data: params.data,
      async_stack_trace: params.async_stack_trace,
    };
  }

  pub fn on_resumed(&mut self) {
    self.pause = PauseState::Running;
  }

  pub fn on_breakpoint_resolved(&mut self, id: &str, location: Location) {
    if let Some(breakpoint) = self.breakpoints.get_mut(id) {
      breakpoint.resolved_locations.push(location);
    } else {
      log::trace!("resolution for unmanaged breakpoint {id}");
    }
  }

  pub fn insert_breakpoint(&mut self, breakpoint: ManagedBreakpoint) {
    self.breakpoints.insert(breakpoint.id.clone(), breakpoint);
  }

  pub fn remove_breakpoint(&mut self, id: &str) -> bool {
    self.breakpoints.shift_remove(id).is_some()
  }

  pub fn breakpoints(&self) -> Vec<ManagedBreakpoint> {
    self.breakpoints.values().cloned().collect()
  }

  pub fn breakpoint_ids(&self) -> Vec<String> {
    self.breakpoints.keys().cloned().collect()
  }

  pub fn is_paused(&self) -> bool {
    matches!(self.pause, PauseState::Paused { .. })
  }

  pub fn pause_reason(&self) -> Option<String> {
    match &self.pause {
      PauseState::Paused { reason, .. } => Some(reason.clone()),
      PauseState::Running => None,
    }
  }

  pub fn call_frames(&self) -> Vec<CallFrame> {
    match &self.pause {
      PauseState::Paused { call_frames, .. } => call_frames.clone(),
      PauseState::Running => Vec::new(),
    }
  }

  pub fn hit_breakpoints(&self) -> Vec<String> {
    match &self.pause {
      PauseState::Paused {
        hit_breakpoints, ..
      } => hit_breakpoints.clone(),
      PauseState::Running => Vec::new(),
    }
  }

  pub fn pause_data(&self) -> Option<Value> {
    match &self.pause {
      PauseState::Paused { data, .. } => data.clone(),
      PauseState::Running => None,
    }
  }

  pub fn set_pause_on_exceptions(&mut self, state: &str) {
    self.pause_on_exceptions = Some(state.to_string());
  }

  pub fn set_async_stack_depth(&mut self, depth: u32) {
    self.async_stack_depth = depth;
  }

  /// Session reset: back to the state of a freshly constructed projection.
  pub fn reset(&mut self) {
    *self = Self::default();
  }

  pub fn to_json(&self) -> Value {
    let mut summary = json!({
      "enabled": self.enabled,
      "isPaused": self.is_paused(),
      "callFrameCount": self.call_frames().len(),
      "breakpointCount": self.breakpoints.len(),
      "pauseOnExceptions": self
        .pause_on_exceptions
        .clone()
        .unwrap_or_else(|| "none".to_string()),
      "asyncStackTraceDepth": self.async_stack_depth,
    });
    if let Some(reason) = self.pause_reason() {
      summary["pauseReason"] = json!(reason);
    }
    summary
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn paused_params(reason: &str) -> DebuggerPaused {
    serde_json::from_value(json!({
      "callFrames": [{
        "callFrameId": "frame-0",
        "functionName": "main",
        "location": {"scriptId": "9", "lineNumber": 4},
        "url": "http://x/p.html"
      }],
      "reason": reason,
      "hitBreakpoints": ["bp-1"]
    }))
    .unwrap()
  }

  #[test]
  fn summary_before_any_event() {
    let state = DebugState::new();
    assert_eq!(
      state.to_json(),
      json!({
        "enabled": false,
        "isPaused": false,
        "callFrameCount": 0,
        "breakpointCount": 0,
        "pauseOnExceptions": "none",
        "asyncStackTraceDepth": 0,
      })
    );
  }

  #[test]
  fn pause_then_resume_round_trip() {
    let mut state = DebugState::new();
    state.set_enabled(true);
    state.on_paused(paused_params("breakpoint"));
    assert!(state.is_paused());
    assert_eq!(state.pause_reason().as_deref(), Some("breakpoint"));
    assert_eq!(state.call_frames().len(), 1);
    assert_eq!(state.hit_breakpoints(), vec!["bp-1".to_string()]);

    state.on_resumed();
    assert!(!state.is_paused());
    assert!(state.call_frames().is_empty());
  }

  #[test]
  fn each_pause_overwrites_the_previous_one() {
    let mut state = DebugState::new();
    state.on_paused(paused_params("debugCommand"));
    state.on_paused(paused_params("exception"));
    assert_eq!(state.pause_reason().as_deref(), Some("exception"));
  }

  #[test]
  fn disable_clears_pause_and_breakpoints() {
    let mut state = DebugState::new();
    state.set_enabled(true);
    state.insert_breakpoint(ManagedBreakpoint {
      id: "bp-1".to_string(),
      url: Some("http://x/p.html".to_string()),
      url_regex: None,
      script_id: None,
      line_number: 4,
      column_number: None,
      condition: None,
      resolved_locations: Vec::new(),
      enabled: true,
    });
    state.on_paused(paused_params("breakpoint"));

    state.set_enabled(false);
    assert!(!state.is_paused());
    assert!(state.breakpoints().is_empty());
    assert_eq!(state.to_json()["pauseOnExceptions"], json!("none"));
  }

  #[test]
  fn resolution_appends_to_the_named_breakpoint() {
    let mut state = DebugState::new();
    state.insert_breakpoint(ManagedBreakpoint {
      id: "bp-7".to_string(),
      url: Some("http://x/p.html".to_string()),
      url_regex: None,
      script_id: None,
      line_number: 4,
      column_number: None,
      condition: None,
      resolved_locations: Vec::new(),
      enabled: true,
    });
    let location: Location =
      serde_json::from_value(json!({"scriptId": "9", "lineNumber": 4}))
        .unwrap();
    state.on_breakpoint_resolved("bp-7", location.clone());
    state.on_breakpoint_resolved("bp-missing", location);

    let breakpoints = state.breakpoints();
    assert_eq!(breakpoints[0].resolved_locations.len(), 1);
  }
}
