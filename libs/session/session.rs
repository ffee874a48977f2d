// Copyright 2025-2026 the Headlamp authors. MIT license.

//! The session facade: owns the transport and the projections, maps each
//! agent-facing operation onto CDP calls, and carries the pause-aware
//! evaluation contract.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use headlamp_cdp::BrowserHttpClient;
use headlamp_cdp::CdpError;
use headlamp_cdp::CdpTransport;
use headlamp_cdp::TargetDescription;
use headlamp_cdp::TransportEvent;
use headlamp_cdp::TransportOptions;
use headlamp_cdp::VersionInfo;
use headlamp_cdp::protocol::CallFrame;
use headlamp_cdp::protocol::CaptureScreenshotArgs;
use headlamp_cdp::protocol::ContinueRequestArgs;
use headlamp_cdp::protocol::EvaluateArgs;
use headlamp_cdp::protocol::EvaluateOnCallFrameArgs;
use headlamp_cdp::protocol::EvaluateResponse;
use headlamp_cdp::protocol::ExceptionDetails;
use headlamp_cdp::protocol::FailRequestArgs;
use headlamp_cdp::protocol::FulfillRequestArgs;
use headlamp_cdp::protocol::GetDocumentResponse;
use headlamp_cdp::protocol::GetResponseBodyResponse;
use headlamp_cdp::protocol::GetScriptSourceResponse;
use headlamp_cdp::protocol::HeaderEntry;
use headlamp_cdp::protocol::Location;
use headlamp_cdp::protocol::NavigateResponse;
use headlamp_cdp::protocol::RemoteObject;
use headlamp_cdp::protocol::RequestPattern;
use headlamp_cdp::protocol::SetBreakpointByUrlArgs;
use headlamp_cdp::protocol::SetBreakpointByUrlResponse;
use headlamp_cdp::protocol::SetBreakpointResponse;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

use crate::console::DEFAULT_MAX_MESSAGES;
use crate::debug_state::ManagedBreakpoint;
use crate::errors::SessionError;
use crate::fetch::InterceptRule;
use crate::fetch::PausedRequest;
use crate::fetch::RuleSpec;
use crate::launcher::LaunchedChrome;
use crate::network::DEFAULT_MAX_REQUESTS;
use crate::state::DEFAULT_MAX_LOG_ENTRIES;
use crate::state::SessionEvent;
use crate::state::SessionState;

#[derive(Debug, Clone)]
pub struct SessionOptions {
  pub command_timeout: Duration,
  pub connect_timeout: Duration,
  pub max_requests: usize,
  pub max_console_messages: usize,
  pub max_log_entries: usize,
  /// How long a side-effecting operation keeps listening for a pause
  /// after its response arrived. A policy knob, not a correctness one; a
  /// later pause still lands in the debug projection.
  pub pause_detection_window: Duration,
}

impl Default for SessionOptions {
  fn default() -> Self {
    Self {
      command_timeout: headlamp_cdp::DEFAULT_COMMAND_TIMEOUT,
      connect_timeout: headlamp_cdp::DEFAULT_CONNECT_TIMEOUT,
      max_requests: DEFAULT_MAX_REQUESTS,
      max_console_messages: DEFAULT_MAX_MESSAGES,
      max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
      pause_detection_window: Duration::from_millis(200),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluateOptions {
  pub await_promise: bool,
  pub return_by_value: bool,
  pub silent: bool,
  pub include_command_line_api: bool,
  pub timeout_ms: Option<u64>,
}

/// What an evaluation produced: a value, a thrown exception, or a pause
/// that preempted the response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOutcome {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub result: Option<RemoteObject>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exception_details: Option<ExceptionDetails>,
  pub paused: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pause_reason: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub call_frames: Vec<CallFrame>,
}

impl EvaluateOutcome {
  fn from_response(value: Value) -> Result<Self, SessionError> {
    let response: EvaluateResponse = from_result(value)?;
    Ok(Self {
      result: Some(response.result),
      exception_details: response.exception_details,
      paused: false,
      pause_reason: None,
      call_frames: Vec::new(),
    })
  }

  fn paused(reason: String, call_frames: Vec<CallFrame>) -> Self {
    Self {
      result: None,
      exception_details: None,
      paused: true,
      pause_reason: Some(reason),
      call_frames,
    }
  }
}

/// Result of an operation wrapped in the pause detection window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointAware<T> {
  pub result: T,
  pub paused: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pause_reason: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub call_frames: Vec<CallFrame>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakpointRequest {
  pub url: Option<String>,
  pub url_regex: Option<String>,
  pub line_number: i64,
  pub column_number: Option<i64>,
  pub condition: Option<String>,
}

struct Connection {
  transport: Arc<CdpTransport>,
  #[allow(dead_code)]
  router: JoinHandle<()>,
}

pub struct DebugSession {
  options: SessionOptions,
  state: Arc<SessionState>,
  events_tx: broadcast::Sender<SessionEvent>,
  connection: RwLock<Option<Connection>>,
  http: RwLock<Option<BrowserHttpClient>>,
  chrome: tokio::sync::Mutex<Option<LaunchedChrome>>,
}

impl DebugSession {
  pub fn new(options: SessionOptions) -> Self {
    let state = Arc::new(SessionState::new(
      options.max_requests,
      options.max_console_messages,
      options.max_log_entries,
    ));
    let (events_tx, _) = broadcast::channel(256);
    Self {
      options,
      state,
      events_tx,
      connection: RwLock::new(None),
      http: RwLock::new(None),
      chrome: tokio::sync::Mutex::new(None),
    }
  }

  pub fn state(&self) -> &SessionState {
    &self.state
  }

  pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
    self.events_tx.subscribe()
  }

  /// Connect straight to a target's WebSocket. The HTTP discovery client
  /// is derived from the endpoint unless one is already set; target
  /// switches keep the existing one.
  pub async fn connect(&self, ws_url: &Url) -> Result<(), SessionError> {
    let transport_options = TransportOptions {
      command_timeout: self.options.command_timeout,
      connect_timeout: self.options.connect_timeout,
    };
    let (transport, events_rx) =
      CdpTransport::connect(ws_url, transport_options).await?;
    let router =
      spawn_router(self.state.clone(), events_rx, self.events_tx.clone());
    let connection = Connection {
      transport: Arc::new(transport),
      router,
    };
    let previous = self.connection.write().replace(connection);
    if let Some(previous) = previous {
      previous.transport.disconnect().await;
    }
    if self.http.read().is_none() {
      *self.http.write() = Some(BrowserHttpClient::from_ws_endpoint(ws_url)?);
    }
    Ok(())
  }

  /// Attach to a running browser through its HTTP endpoint and connect to
  /// the first debuggable page.
  pub async fn attach(
    &self,
    http_base: Url,
  ) -> Result<TargetDescription, SessionError> {
    let client = BrowserHttpClient::new(http_base);
    let targets = client.list_targets().await.map_err(SessionError::from)?;
    let target = targets
      .into_iter()
      .find(|target| {
        target.kind == "page" && target.web_socket_debugger_url.is_some()
      })
      .ok_or_else(|| SessionError::TargetNotFound("page".to_string()))?;
    let ws = target
      .web_socket_debugger_url
      .clone()
      .ok_or_else(|| SessionError::TargetNotFound(target.id.clone()))?;
    let ws_url = Url::parse(&ws).map_err(CdpError::from)?;
    *self.http.write() = Some(client);
    self.connect(&ws_url).await?;
    Ok(target)
  }

  /// Adopt a freshly launched browser process; `kill` will tear it down.
  pub async fn adopt_chrome(&self, chrome: LaunchedChrome) {
    *self.chrome.lock().await = Some(chrome);
  }

  pub fn is_connected(&self) -> bool {
    self
      .connection
      .read()
      .as_ref()
      .is_some_and(|connection| connection.transport.is_connected())
  }

  pub fn pending_commands(&self) -> usize {
    self
      .connection
      .read()
      .as_ref()
      .map(|connection| connection.transport.pending_count())
      .unwrap_or(0)
  }

  fn transport(&self) -> Result<Arc<CdpTransport>, SessionError> {
    self
      .connection
      .read()
      .as_ref()
      .map(|connection| connection.transport.clone())
      .ok_or(SessionError::Cdp(CdpError::NotConnected))
  }

  fn http_client(&self) -> Result<BrowserHttpClient, SessionError> {
    self
      .http
      .read()
      .clone()
      .ok_or(SessionError::Cdp(CdpError::NotConnected))
  }

  pub async fn send(
    &self,
    method: &str,
    params: Option<Value>,
  ) -> Result<Value, SessionError> {
    Ok(self.transport()?.send(method, params).await?)
  }

  // -- domain lifecycle ------------------------------------------------

  pub async fn enable_debugger(&self) -> Result<(), SessionError> {
    self.send("Debugger.enable", None).await?;
    self.state.debug.lock().set_enabled(true);
    self.state.scripts.lock().set_enabled(true);
    Ok(())
  }

  pub async fn disable_debugger(&self) -> Result<(), SessionError> {
    self.send("Debugger.disable", None).await?;
    self.state.debug.lock().set_enabled(false);
    self.state.scripts.lock().set_enabled(false);
    Ok(())
  }

  pub async fn enable_runtime(&self) -> Result<(), SessionError> {
    self.send("Runtime.enable", None).await?;
    self.state.console.lock().set_enabled(true);
    Ok(())
  }

  pub async fn disable_runtime(&self) -> Result<(), SessionError> {
    self.send("Runtime.disable", None).await?;
    self.state.console.lock().set_enabled(false);
    Ok(())
  }

  pub async fn enable_network(&self) -> Result<(), SessionError> {
    self.send("Network.enable", None).await?;
    self.state.network.lock().set_enabled(true);
    Ok(())
  }

  pub async fn disable_network(&self) -> Result<(), SessionError> {
    self.send("Network.disable", None).await?;
    self.state.network.lock().set_enabled(false);
    Ok(())
  }

  pub async fn enable_log(&self) -> Result<(), SessionError> {
    self.send("Log.enable", None).await?;
    Ok(())
  }

  pub async fn enable_service_workers(&self) -> Result<(), SessionError> {
    self.send("ServiceWorker.enable", None).await?;
    Ok(())
  }

  // -- breakpoint-aware evaluation ------------------------------------

  /// Evaluate an expression on the page.
  ///
  /// If the isolate is already paused this fails with `AlreadyPaused`
  /// before anything is written to the wire. With the debugger enabled,
  /// the call races the next pause event: when the pause wins, the
  /// outcome carries the frames and the response is drained later by the
  /// transport.
  pub async fn evaluate(
    &self,
    expression: &str,
    options: EvaluateOptions,
  ) -> Result<EvaluateOutcome, SessionError> {
    let debugger_enabled = {
      let debug = self.state.debug.lock();
      if debug.is_paused() {
        return Err(SessionError::AlreadyPaused(
          debug.pause_reason().unwrap_or_else(|| "unknown".to_string()),
        ));
      }
      debug.enabled()
    };

    let args = EvaluateArgs {
      expression: expression.to_string(),
      return_by_value: Some(options.return_by_value),
      await_promise: Some(options.await_promise),
      silent: options.silent.then_some(true),
      include_command_line_api: options.include_command_line_api.then_some(true),
      generate_preview: None,
      context_id: None,
      timeout: options.timeout_ms,
    };
    let params = to_params(&args)?;
    let transport = self.transport()?;

    if !debugger_enabled {
      let value = transport.send("Runtime.evaluate", params).await?;
      return EvaluateOutcome::from_response(value);
    }

    // Subscribe before the call hits the wire so a pause raised by the
    // evaluated code itself cannot be missed.
    let mut events = self.events_tx.subscribe();
    let call = transport.send("Runtime.evaluate", params);
    tokio::pin!(call);

    loop {
      tokio::select! {
        value = &mut call => {
          return EvaluateOutcome::from_response(value?);
        }
        event = events.recv() => {
          match event {
            Ok(SessionEvent::Paused { reason, call_frames }) => {
              // The CDP response stays outstanding; the transport drains
              // it when execution resumes.
              return Ok(EvaluateOutcome::paused(reason, call_frames));
            }
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
              let value = call.await?;
              return EvaluateOutcome::from_response(value);
            }
          }
        }
      }
    }
  }

  /// Evaluate in the scope of a specific frame of the current pause.
  pub async fn evaluate_on_frame(
    &self,
    call_frame_id: &str,
    expression: &str,
    options: EvaluateOptions,
  ) -> Result<EvaluateOutcome, SessionError> {
    if !self.state.debug.lock().is_paused() {
      return Err(SessionError::NotPaused);
    }
    let args = EvaluateOnCallFrameArgs {
      call_frame_id: call_frame_id.to_string(),
      expression: expression.to_string(),
      return_by_value: Some(options.return_by_value),
      silent: options.silent.then_some(true),
      generate_preview: None,
    };
    let value = self
      .send("Debugger.evaluateOnCallFrame", to_params(&args)?)
      .await?;
    EvaluateOutcome::from_response(value)
  }

  /// Run `op`, then keep listening for a pause for the configured
  /// detection window. Used for operations whose side effects may trip a
  /// breakpoint only after their own response arrived.
  pub async fn with_breakpoint_detection<T, Fut>(
    &self,
    op: Fut,
  ) -> Result<BreakpointAware<T>, SessionError>
  where
    Fut: Future<Output = Result<T, SessionError>>,
  {
    let mut events = self.events_tx.subscribe();
    let result = op.await?;

    let window = tokio::time::sleep(self.options.pause_detection_window);
    tokio::pin!(window);
    loop {
      tokio::select! {
        _ = &mut window => {
          return Ok(BreakpointAware {
            result,
            paused: false,
            pause_reason: None,
            call_frames: Vec::new(),
          });
        }
        event = events.recv() => {
          match event {
            Ok(SessionEvent::Paused { reason, call_frames }) => {
              return Ok(BreakpointAware {
                result,
                paused: true,
                pause_reason: Some(reason),
                call_frames,
              });
            }
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
              return Ok(BreakpointAware {
                result,
                paused: false,
                pause_reason: None,
                call_frames: Vec::new(),
              });
            }
          }
        }
      }
    }
  }

  // -- execution control ----------------------------------------------

  pub async fn pause(&self) -> Result<(), SessionError> {
    self.send("Debugger.pause", None).await?;
    Ok(())
  }

  pub async fn resume(&self) -> Result<(), SessionError> {
    self.send("Debugger.resume", None).await?;
    Ok(())
  }

  pub async fn step_over(&self) -> Result<(), SessionError> {
    self.step("Debugger.stepOver").await
  }

  pub async fn step_into(&self) -> Result<(), SessionError> {
    self.step("Debugger.stepInto").await
  }

  pub async fn step_out(&self) -> Result<(), SessionError> {
    self.step("Debugger.stepOut").await
  }

  async fn step(&self, method: &str) -> Result<(), SessionError> {
    if !self.state.debug.lock().is_paused() {
      return Err(SessionError::NotPaused);
    }
    self.send(method, None).await?;
    Ok(())
  }

  pub fn call_frames(&self) -> Result<Vec<CallFrame>, SessionError> {
    let debug = self.state.debug.lock();
    if !debug.is_paused() {
      return Err(SessionError::NotPaused);
    }
    Ok(debug.call_frames())
  }

  pub async fn set_pause_on_exceptions(
    &self,
    mode: &str,
  ) -> Result<(), SessionError> {
    self
      .send("Debugger.setPauseOnExceptions", Some(json!({"state": mode})))
      .await?;
    self.state.debug.lock().set_pause_on_exceptions(mode);
    Ok(())
  }

  pub async fn set_async_stack_depth(
    &self,
    max_depth: u32,
  ) -> Result<(), SessionError> {
    self
      .send(
        "Debugger.setAsyncCallStackDepth",
        Some(json!({"maxDepth": max_depth})),
      )
      .await?;
    self.state.debug.lock().set_async_stack_depth(max_depth);
    Ok(())
  }

  // -- breakpoints -----------------------------------------------------

  pub async fn set_breakpoint_by_url(
    &self,
    request: BreakpointRequest,
  ) -> Result<ManagedBreakpoint, SessionError> {
    if request.url.is_none() && request.url_regex.is_none() {
      return Err(SessionError::BreakpointSpecInvalid);
    }
    let args = SetBreakpointByUrlArgs {
      line_number: request.line_number,
      url: request.url.clone(),
      url_regex: request.url_regex.clone(),
      column_number: request.column_number,
      condition: request.condition.clone(),
    };
    let response: SetBreakpointByUrlResponse = from_result(
      self
        .send("Debugger.setBreakpointByUrl", to_params(&args)?)
        .await?,
    )?;
    let breakpoint = ManagedBreakpoint {
      id: response.breakpoint_id,
      url: request.url,
      url_regex: request.url_regex,
      script_id: None,
      line_number: request.line_number,
      column_number: request.column_number,
      condition: request.condition,
      resolved_locations: response.locations,
      enabled: true,
    };
    self.state.debug.lock().insert_breakpoint(breakpoint.clone());
    Ok(breakpoint)
  }

  pub async fn set_breakpoint_at(
    &self,
    script_id: &str,
    line_number: i64,
    column_number: Option<i64>,
    condition: Option<String>,
  ) -> Result<ManagedBreakpoint, SessionError> {
    let args = headlamp_cdp::protocol::SetBreakpointArgs {
      location: Location {
        script_id: script_id.to_string(),
        line_number,
        column_number,
      },
      condition: condition.clone(),
    };
    let response: SetBreakpointResponse = from_result(
      self.send("Debugger.setBreakpoint", to_params(&args)?).await?,
    )?;
    let breakpoint = ManagedBreakpoint {
      id: response.breakpoint_id,
      url: None,
      url_regex: None,
      script_id: Some(script_id.to_string()),
      line_number,
      column_number,
      condition,
      resolved_locations: vec![response.actual_location],
      enabled: true,
    };
    self.state.debug.lock().insert_breakpoint(breakpoint.clone());
    Ok(breakpoint)
  }

  pub async fn remove_breakpoint(&self, id: &str) -> Result<(), SessionError> {
    if !self.state.debug.lock().remove_breakpoint(id) {
      return Err(SessionError::BreakpointNotFound(id.to_string()));
    }
    self
      .send("Debugger.removeBreakpoint", Some(json!({"breakpointId": id})))
      .await?;
    Ok(())
  }

  pub fn breakpoints(&self) -> Vec<ManagedBreakpoint> {
    self.state.debug.lock().breakpoints()
  }

  // -- scripts ----------------------------------------------------------

  /// Source text for a script, cached after the first fetch.
  pub async fn get_script_source(
    &self,
    script_id: &str,
  ) -> Result<String, SessionError> {
    if let Some(source) = self.state.scripts.lock().cached_source(script_id) {
      return Ok(source);
    }
    let value = self
      .send("Debugger.getScriptSource", Some(json!({"scriptId": script_id})))
      .await;
    match value {
      Ok(value) => {
        let response: GetScriptSourceResponse = from_result(value)?;
        self
          .state
          .scripts
          .lock()
          .cache_source(script_id, response.script_source.clone());
        Ok(response.script_source)
      }
      Err(SessionError::Cdp(CdpError::Protocol { .. })) => {
        Err(SessionError::ScriptNotFound(script_id.to_string()))
      }
      Err(err) => Err(err),
    }
  }

  // -- network ----------------------------------------------------------

  pub async fn get_response_body(
    &self,
    request_id: &str,
  ) -> Result<GetResponseBodyResponse, SessionError> {
    let value = self
      .send(
        "Network.getResponseBody",
        Some(json!({"requestId": request_id})),
      )
      .await;
    match value {
      Ok(value) => from_result(value),
      Err(SessionError::Cdp(CdpError::Protocol { .. })) => Err(
        SessionError::ResponseBodyUnavailable(request_id.to_string()),
      ),
      Err(err) => Err(err),
    }
  }

  // -- fetch interception ------------------------------------------------

  /// Enable interception with the patterns generated from the current
  /// rule set. Rule mutations while enabled re-invoke this.
  pub async fn enable_fetch(&self) -> Result<Vec<RequestPattern>, SessionError> {
    let patterns = self.state.fetch.lock().cdp_patterns();
    self
      .send("Fetch.enable", Some(json!({"patterns": patterns})))
      .await?;
    self.state.fetch.lock().set_enabled(true);
    Ok(patterns)
  }

  pub async fn disable_fetch(&self) -> Result<(), SessionError> {
    self.send("Fetch.disable", None).await?;
    self.state.fetch.lock().set_enabled(false);
    Ok(())
  }

  async fn refresh_fetch_patterns(&self) -> Result<(), SessionError> {
    let patterns = {
      let fetch = self.state.fetch.lock();
      if !fetch.enabled() {
        return Ok(());
      }
      fetch.cdp_patterns()
    };
    self
      .send("Fetch.enable", Some(json!({"patterns": patterns})))
      .await?;
    Ok(())
  }

  pub async fn add_intercept_rule(
    &self,
    spec: RuleSpec,
  ) -> Result<InterceptRule, SessionError> {
    let rule = self.state.fetch.lock().add_rule(spec);
    self.refresh_fetch_patterns().await?;
    Ok(rule)
  }

  pub async fn remove_intercept_rule(
    &self,
    id: &str,
  ) -> Result<(), SessionError> {
    if !self.state.fetch.lock().remove_rule(id) {
      return Err(SessionError::RuleNotFound(id.to_string()));
    }
    self.refresh_fetch_patterns().await
  }

  pub async fn set_intercept_rule_enabled(
    &self,
    id: &str,
    enabled: bool,
  ) -> Result<(), SessionError> {
    if !self.state.fetch.lock().set_rule_enabled(id, enabled) {
      return Err(SessionError::RuleNotFound(id.to_string()));
    }
    self.refresh_fetch_patterns().await
  }

  pub fn intercept_rules(&self) -> Vec<InterceptRule> {
    self.state.fetch.lock().rules()
  }

  pub fn get_intercept_rule(&self, id: &str) -> Result<InterceptRule, SessionError> {
    self
      .state
      .fetch
      .lock()
      .get_rule(id)
      .ok_or_else(|| SessionError::RuleNotFound(id.to_string()))
  }

  pub fn paused_requests(&self) -> Vec<PausedRequest> {
    self.state.fetch.lock().paused_requests()
  }

  /// Let a paused request through, optionally with overrides. The paused
  /// entry is claimed before anything goes on the wire; an unknown id
  /// costs no CDP call.
  pub async fn continue_request(
    &self,
    request_id: &str,
    overrides: Option<ContinueRequestArgs>,
  ) -> Result<(), SessionError> {
    self.claim_paused(request_id)?;
    let mut args = overrides.unwrap_or_default();
    args.request_id = request_id.to_string();
    self.send("Fetch.continueRequest", to_params(&args)?).await?;
    Ok(())
  }

  /// Answer a paused request ourselves. A plain-text body is
  /// base64-encoded for the wire; a pre-encoded one passes through.
  pub async fn fulfill_request(
    &self,
    request_id: &str,
    response_code: i64,
    headers: Option<Vec<HeaderEntry>>,
    body: Option<String>,
    body_base64_encoded: bool,
  ) -> Result<(), SessionError> {
    self.claim_paused(request_id)?;
    let body = body.map(|body| {
      if body_base64_encoded {
        body
      } else {
        BASE64_STANDARD.encode(body)
      }
    });
    let args = FulfillRequestArgs {
      request_id: request_id.to_string(),
      response_code,
      response_headers: headers,
      body,
      response_phrase: None,
    };
    self.send("Fetch.fulfillRequest", to_params(&args)?).await?;
    Ok(())
  }

  pub async fn fail_request(
    &self,
    request_id: &str,
    error_reason: Option<String>,
  ) -> Result<(), SessionError> {
    self.claim_paused(request_id)?;
    let args = FailRequestArgs {
      request_id: request_id.to_string(),
      error_reason: error_reason.unwrap_or_else(|| "Failed".to_string()),
    };
    self.send("Fetch.failRequest", to_params(&args)?).await?;
    Ok(())
  }

  fn claim_paused(&self, request_id: &str) -> Result<(), SessionError> {
    match self.state.fetch.lock().take_paused(request_id) {
      Some(_) => Ok(()),
      None => Err(SessionError::PausedRequestNotFound(request_id.to_string())),
    }
  }

  // -- page, DOM and capture --------------------------------------------

  /// Navigate, watching for an immediately-tripped breakpoint.
  pub async fn navigate(
    &self,
    url: &str,
  ) -> Result<BreakpointAware<NavigateResponse>, SessionError> {
    self
      .with_breakpoint_detection(async {
        let value = self
          .send("Page.navigate", Some(json!({"url": url})))
          .await?;
        let response: NavigateResponse = from_result(value)?;
        if let Some(error) = &response.error_text {
          if !error.is_empty() {
            return Err(SessionError::NavigationFailed(error.clone()));
          }
        }
        Ok(response)
      })
      .await
  }

  /// Click at page coordinates, watching for a pause raised by event
  /// handlers downstream of the click.
  pub async fn click(
    &self,
    x: f64,
    y: f64,
  ) -> Result<BreakpointAware<Value>, SessionError> {
    self
      .with_breakpoint_detection(async {
        let press = json!({
          "type": "mousePressed",
          "x": x,
          "y": y,
          "button": "left",
          "clickCount": 1,
        });
        self.send("Input.dispatchMouseEvent", Some(press)).await?;
        let release = json!({
          "type": "mouseReleased",
          "x": x,
          "y": y,
          "button": "left",
          "clickCount": 1,
        });
        self.send("Input.dispatchMouseEvent", Some(release)).await?;
        Ok(json!({"clicked": true, "x": x, "y": y}))
      })
      .await
  }

  pub async fn document_node_id(&self) -> Result<i64, SessionError> {
    if let Some(node_id) = self.state.cached_document_node() {
      return Ok(node_id);
    }
    let response: GetDocumentResponse = from_result(
      self.send("DOM.getDocument", Some(json!({"depth": 0}))).await?,
    )?;
    self.state.cache_document_node(response.root.node_id);
    Ok(response.root.node_id)
  }

  pub async fn query_selector(&self, selector: &str) -> Result<i64, SessionError> {
    let root = self.document_node_id().await?;
    let value = self
      .send(
        "DOM.querySelector",
        Some(json!({"nodeId": root, "selector": selector})),
      )
      .await?;
    let node_id = value.get("nodeId").and_then(Value::as_i64).unwrap_or(0);
    if node_id == 0 {
      return Err(SessionError::NodeNotFound(selector.to_string()));
    }
    Ok(node_id)
  }

  /// Raw screenshot bytes plus the effective format.
  pub async fn capture_screenshot(
    &self,
    args: CaptureScreenshotArgs,
  ) -> Result<(String, Vec<u8>), SessionError> {
    let format = args.format.clone().unwrap_or_else(|| "png".to_string());
    let value = self
      .send("Page.captureScreenshot", to_params(&args)?)
      .await?;
    let data = value
      .get("data")
      .and_then(Value::as_str)
      .ok_or_else(|| CdpError::Decode("screenshot reply had no data".to_string()))?;
    let bytes = BASE64_STANDARD
      .decode(data)
      .map_err(|err| CdpError::Decode(err.to_string()))?;
    Ok((format, bytes))
  }

  /// MHTML snapshot of the current page.
  pub async fn capture_snapshot(&self) -> Result<String, SessionError> {
    let value = self
      .send("Page.captureSnapshot", Some(json!({"format": "mhtml"})))
      .await?;
    value
      .get("data")
      .and_then(Value::as_str)
      .map(str::to_string)
      .ok_or_else(|| {
        SessionError::Cdp(CdpError::Decode(
          "snapshot reply had no data".to_string(),
        ))
      })
  }

  // -- targets -----------------------------------------------------------

  pub async fn list_targets(&self) -> Result<Vec<TargetDescription>, SessionError> {
    Ok(self.http_client()?.list_targets().await?)
  }

  pub async fn version(&self) -> Result<VersionInfo, SessionError> {
    Ok(self.http_client()?.version().await?)
  }

  /// Re-attach the transport to another target. The HTTP endpoint is kept
  /// so later listings still work.
  pub async fn switch_target(
    &self,
    target_id: &str,
  ) -> Result<TargetDescription, SessionError> {
    let client = self.http_client()?;
    let targets = client.list_targets().await.map_err(SessionError::from)?;
    let target = targets
      .into_iter()
      .find(|target| target.id == target_id)
      .ok_or_else(|| SessionError::TargetNotFound(target_id.to_string()))?;
    let ws = target
      .web_socket_debugger_url
      .clone()
      .ok_or_else(|| SessionError::TargetNotFound(target_id.to_string()))?;
    let ws_url = Url::parse(&ws).map_err(CdpError::from)?;
    self.connect(&ws_url).await?;
    Ok(target)
  }

  pub async fn open_tab(
    &self,
    url: Option<&str>,
  ) -> Result<TargetDescription, SessionError> {
    Ok(self.http_client()?.open_tab(url).await?)
  }

  pub async fn close_tab(&self, target_id: &str) -> Result<bool, SessionError> {
    Ok(self.http_client()?.close_tab(target_id).await?)
  }

  // -- lifecycle ---------------------------------------------------------

  pub fn clear_network(&self) {
    self.state.network.lock().clear();
  }

  pub fn clear_console(&self) {
    self.state.console.lock().clear();
  }

  pub fn clear_logs(&self) {
    self.state.clear_logs();
  }

  pub fn status(&self) -> Value {
    json!({
      "connected": self.is_connected(),
      "pendingCommands": self.pending_commands(),
      "debugger": self.state.debug.lock().to_json(),
      "network": self.state.network.lock().summary(),
      "console": {
        "messages": self.state.console.lock().message_count(),
        "exceptions": self.state.console.lock().exception_count(),
      },
      "fetch": {
        "rules": self.state.fetch.lock().rule_count(),
        "pausedRequests": self.state.fetch.lock().paused_count(),
      },
      "scripts": self.state.scripts.lock().count(),
    })
  }

  /// Drop the connection. Collected state stays queryable; a later
  /// `connect` keeps feeding the same projections.
  pub async fn disconnect(&self) {
    let connection = self.connection.write().take();
    if let Some(connection) = connection {
      connection.transport.disconnect().await;
    }
  }

  /// Disconnect, terminate an owned browser, and reset all projections.
  pub async fn kill(&self) {
    self.disconnect().await;
    let chrome = self.chrome.lock().await.take();
    if let Some(chrome) = chrome {
      if let Err(err) = chrome.kill().await {
        log::warn!("failed to terminate browser: {err}");
      }
    }
    self.state.reset();
  }

  pub fn reset(&self) {
    self.state.reset();
  }
}

fn spawn_router(
  state: Arc<SessionState>,
  mut events_rx: tokio::sync::mpsc::UnboundedReceiver<TransportEvent>,
  events_tx: broadcast::Sender<SessionEvent>,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    while let Some(event) = events_rx.recv().await {
      match event {
        TransportEvent::Event(event) => {
          if let Some(note) = state.apply_event(event) {
            let _ = events_tx.send(note);
          }
        }
        TransportEvent::Closed => {
          let _ = events_tx.send(SessionEvent::Closed);
          break;
        }
      }
    }
  })
}

fn to_params<T: Serialize>(args: &T) -> Result<Option<Value>, SessionError> {
  Ok(Some(serde_json::to_value(args).map_err(|err| {
    SessionError::Cdp(CdpError::Decode(err.to_string()))
  })?))
}

fn from_result<T: DeserializeOwned>(value: Value) -> Result<T, SessionError> {
  serde_json::from_value(value)
    .map_err(|err| SessionError::Cdp(CdpError::Decode(err.to_string())))
}
