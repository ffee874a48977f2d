// Copyright 2025-2026 the Headlamp authors. MIT license.

//! The per-session state tree and the event router feeding it.
//!
//! Every projection sits behind its own mutex. Lock order, where more
//! than one is held: `debug` first, then any other projection. The router
//! applies events regardless of whether the matching domain is enabled;
//! enablement only controls the CDP subscription.

use std::collections::HashMap;
use std::collections::VecDeque;

use headlamp_cdp::protocol::CallFrame;
use headlamp_cdp::protocol::EventMessage;
use headlamp_cdp::protocol::LogEntry;
use headlamp_cdp::protocol::ServiceWorkerRegistration;
use headlamp_cdp::protocol::ServiceWorkerVersion;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::console::ConsoleState;
use crate::debug_state::DebugState;
use crate::fetch::FetchInterceptor;
use crate::fetch::PausedRequest;
use crate::network::NetworkState;
use crate::scripts::ScriptRegistry;

pub const DEFAULT_MAX_LOG_ENTRIES: usize = 1000;

/// Notifications rebroadcast to facade subscribers after the projections
/// were updated. The pause notification carries the frames so the
/// evaluate race can answer without re-locking `debug`.
#[derive(Debug, Clone)]
pub enum SessionEvent {
  Paused {
    reason: String,
    call_frames: Vec<CallFrame>,
  },
  Resumed,
  FetchRequestPaused(PausedRequest),
  Closed,
}

#[derive(Debug)]
pub struct SessionState {
  pub debug: Mutex<DebugState>,
  pub scripts: Mutex<ScriptRegistry>,
  pub network: Mutex<NetworkState>,
  pub console: Mutex<ConsoleState>,
  pub fetch: Mutex<FetchInterceptor>,
  max_log_entries: usize,
  logs: Mutex<VecDeque<LogEntry>>,
  worker_registrations: Mutex<HashMap<String, ServiceWorkerRegistration>>,
  worker_versions: Mutex<HashMap<String, ServiceWorkerVersion>>,
  document_node_id: Mutex<Option<i64>>,
}

impl SessionState {
  pub fn new(max_requests: usize, max_messages: usize, max_log_entries: usize) -> Self {
    Self {
      debug: Mutex::new(DebugState::new()),
      scripts: Mutex::new(ScriptRegistry::new()),
      network: Mutex::new(NetworkState::with_capacity(max_requests)),
      console: Mutex::new(ConsoleState::with_capacity(max_messages)),
      fetch: Mutex::new(FetchInterceptor::new()),
      max_log_entries: max_log_entries.max(1),
      logs: Mutex::new(VecDeque::new()),
      worker_registrations: Mutex::new(HashMap::new()),
      worker_versions: Mutex::new(HashMap::new()),
      document_node_id: Mutex::new(None),
    }
  }

  /// Route one inbound event to its projection. Returns the notification
  /// to rebroadcast, if the event is one subscribers care about.
  pub fn apply_event(&self, event: EventMessage) -> Option<SessionEvent> {
    let EventMessage { method, params } = event;
    match method.as_str() {
      "Debugger.scriptParsed" => {
        if let Some(params) = decode(&method, params) {
          self.scripts.lock().on_script_parsed(params);
        }
        None
      }
      "Debugger.paused" => {
        let params: headlamp_cdp::protocol::DebuggerPaused =
          decode(&method, params)?;
        let note = SessionEvent::Paused {
          reason: params.reason.clone(),
          call_frames: params.call_frames.clone(),
        };
        self.debug.lock().on_paused(params);
        Some(note)
      }
      "Debugger.resumed" => {
        self.debug.lock().on_resumed();
        Some(SessionEvent::Resumed)
      }
      "Debugger.breakpointResolved" => {
        if let Some(params) = decode::<
          headlamp_cdp::protocol::BreakpointResolved,
        >(&method, params)
        {
          self
            .debug
            .lock()
            .on_breakpoint_resolved(&params.breakpoint_id, params.location);
        }
        None
      }
      "Runtime.consoleAPICalled" => {
        if let Some(params) = decode(&method, params) {
          self.console.lock().on_console_api_called(params);
        }
        None
      }
      "Runtime.exceptionThrown" => {
        if let Some(params) = decode(&method, params) {
          self.console.lock().on_exception_thrown(params);
        }
        None
      }
      "Network.requestWillBeSent" => {
        if let Some(params) = decode(&method, params) {
          self.network.lock().on_request_will_be_sent(params);
        }
        None
      }
      "Network.responseReceived" => {
        if let Some(params) = decode(&method, params) {
          self.network.lock().on_response_received(params);
        }
        None
      }
      "Network.loadingFinished" => {
        if let Some(params) = decode(&method, params) {
          self.network.lock().on_loading_finished(params);
        }
        None
      }
      "Network.loadingFailed" => {
        if let Some(params) = decode(&method, params) {
          self.network.lock().on_loading_failed(params);
        }
        None
      }
      "Fetch.requestPaused" => {
        let params = decode(&method, params)?;
        let paused = self.fetch.lock().on_request_paused(params);
        Some(SessionEvent::FetchRequestPaused(paused))
      }
      "Log.entryAdded" => {
        if let Some(params) =
          decode::<headlamp_cdp::protocol::LogEntryAdded>(&method, params)
        {
          let mut logs = self.logs.lock();
          logs.push_back(params.entry);
          while logs.len() > self.max_log_entries {
            logs.pop_front();
          }
        }
        None
      }
      "ServiceWorker.workerRegistrationUpdated" => {
        if let Some(params) = decode::<
          headlamp_cdp::protocol::WorkerRegistrationUpdated,
        >(&method, params)
        {
          let mut registrations = self.worker_registrations.lock();
          for registration in params.registrations {
            if registration.is_deleted {
              registrations.remove(&registration.registration_id);
            } else {
              registrations
                .insert(registration.registration_id.clone(), registration);
            }
          }
        }
        None
      }
      "ServiceWorker.workerVersionUpdated" => {
        if let Some(params) =
          decode::<headlamp_cdp::protocol::WorkerVersionUpdated>(&method, params)
        {
          let mut versions = self.worker_versions.lock();
          for version in params.versions {
            versions.insert(version.version_id.clone(), version);
          }
        }
        None
      }
      "DOM.documentUpdated" => {
        *self.document_node_id.lock() = None;
        None
      }
      _ => {
        log::trace!("unrouted event {method}");
        None
      }
    }
  }

  pub fn logs(&self) -> Vec<LogEntry> {
    self.logs.lock().iter().cloned().collect()
  }

  pub fn clear_logs(&self) {
    self.logs.lock().clear();
  }

  pub fn worker_registrations(&self) -> Vec<ServiceWorkerRegistration> {
    self.worker_registrations.lock().values().cloned().collect()
  }

  pub fn worker_versions(&self) -> Vec<ServiceWorkerVersion> {
    self.worker_versions.lock().values().cloned().collect()
  }

  pub fn cached_document_node(&self) -> Option<i64> {
    *self.document_node_id.lock()
  }

  pub fn cache_document_node(&self, node_id: i64) {
    *self.document_node_id.lock() = Some(node_id);
  }

  /// Wipe everything. Used by `kill` and explicit resets; a plain
  /// disconnect keeps the collected state around for inspection.
  pub fn reset(&self) {
    self.debug.lock().reset();
    self.scripts.lock().reset();
    self.network.lock().reset();
    self.console.lock().reset();
    self.fetch.lock().reset();
    self.logs.lock().clear();
    self.worker_registrations.lock().clear();
    self.worker_versions.lock().clear();
    *self.document_node_id.lock() = None;
  }
}

fn decode<T: DeserializeOwned>(method: &str, params: Value) -> Option<T> {
  match serde_json::from_value(params) {
    Ok(params) => Some(params),
    Err(err) => {
      log::warn!("dropping undecodable {method} event: {err}");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  fn event(method: &str, params: Value) -> EventMessage {
    EventMessage {
      method: method.to_string(),
      params,
    }
  }

  fn state() -> SessionState {
    SessionState::new(1000, 1000, 3)
  }

  #[test]
  fn pause_event_updates_state_and_notifies() {
    let state = state();
    let note = state.apply_event(event(
      "Debugger.paused",
      json!({
        "callFrames": [{
          "callFrameId": "frame-0",
          "functionName": "f",
          "location": {"scriptId": "1", "lineNumber": 2},
        }],
        "reason": "breakpoint",
      }),
    ));
    match note {
      Some(SessionEvent::Paused { reason, call_frames }) => {
        assert_eq!(reason, "breakpoint");
        assert_eq!(call_frames.len(), 1);
      }
      other => panic!("expected a pause notification, got {other:?}"),
    }
    assert!(state.debug.lock().is_paused());

    let note = state.apply_event(event("Debugger.resumed", Value::Null));
    assert!(matches!(note, Some(SessionEvent::Resumed)));
    assert!(!state.debug.lock().is_paused());
  }

  #[test]
  fn events_are_accepted_with_the_domain_disabled() {
    let state = state();
    assert!(!state.network.lock().enabled());
    state.apply_event(event(
      "Network.requestWillBeSent",
      json!({
        "requestId": "req1",
        "request": {"url": "http://x/", "method": "GET", "headers": {}},
        "timestamp": 1.0,
      }),
    ));
    assert_eq!(state.network.lock().count(), 1);
  }

  #[test]
  fn undecodable_events_are_dropped_quietly() {
    let state = state();
    let note = state.apply_event(event("Debugger.paused", json!({"bogus": 1})));
    assert!(note.is_none());
    assert!(!state.debug.lock().is_paused());
  }

  #[test]
  fn log_buffer_is_bounded_oldest_out() {
    let state = state();
    for n in 0..5 {
      state.apply_event(event(
        "Log.entryAdded",
        json!({"entry": {
          "source": "javascript",
          "level": "info",
          "text": format!("line {n}"),
        }}),
      ));
    }
    let logs = state.logs();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].text, "line 2");
  }

  #[test]
  fn worker_upserts_honor_deletion() {
    let state = state();
    state.apply_event(event(
      "ServiceWorker.workerRegistrationUpdated",
      json!({"registrations": [
        {"registrationId": "r1", "scopeURL": "http://x/", "isDeleted": false}
      ]}),
    ));
    assert_eq!(state.worker_registrations().len(), 1);

    state.apply_event(event(
      "ServiceWorker.workerRegistrationUpdated",
      json!({"registrations": [
        {"registrationId": "r1", "scopeURL": "http://x/", "isDeleted": true}
      ]}),
    ));
    assert!(state.worker_registrations().is_empty());
  }

  #[test]
  fn document_updates_invalidate_the_cached_node() {
    let state = state();
    state.cache_document_node(42);
    state.apply_event(event("DOM.documentUpdated", Value::Null));
    assert_eq!(state.cached_document_node(), None);
  }
}
