// Copyright 2025-2026 the Headlamp authors. MIT license.

/// <https://chromedevtools.github.io/devtools-protocol/tot/>
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;

use crate::errors::RpcError;

// wire envelope

/// A command frame written to the browser. The transport assigns `id`;
/// callers never provide one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingCommand<'a> {
  pub id: u32,
  pub method: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub params: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub session_id: Option<&'a str>,
}

/// Any inbound frame: a response (`id` present) or an event (`method`
/// present). Frames carrying neither are dropped by the reader.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
  pub id: Option<u32>,
  pub method: Option<String>,
  pub params: Option<Value>,
  pub result: Option<Value>,
  pub error: Option<RpcError>,
}

/// An event frame after routing: `{method, params}` with the params left
/// as raw JSON so each projection decodes only the fields it consumes.
#[derive(Debug, Clone)]
pub struct EventMessage {
  pub method: String,
  pub params: Value,
}

// Runtime

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-evaluate>
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArgs {
  pub expression: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub return_by_value: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub generate_preview: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub await_promise: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub silent: Option<bool>,
  #[serde(
    rename = "includeCommandLineAPI",
    skip_serializing_if = "Option::is_none"
  )]
  pub include_command_line_api: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub context_id: Option<ExecutionContextId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout: Option<TimeDelta>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-evaluate>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
  pub result: RemoteObject,
  pub exception_details: Option<ExceptionDetails>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#method-evaluateOnCallFrame>
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOnCallFrameArgs {
  pub call_frame_id: String,
  pub expression: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub return_by_value: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub generate_preview: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub silent: Option<bool>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-RemoteObject>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub subtype: Option<String>,
  #[serde(default, deserialize_with = "deserialize_some")]
  pub value: Option<Value>,
  #[serde(default)]
  pub unserializable_value: Option<UnserializableValue>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub object_id: Option<RemoteObjectId>,
}

// Any value that is present is considered Some value, including null.
// ref: https://github.com/serde-rs/serde/issues/984#issuecomment-314143738
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Deserialize::deserialize(deserializer).map(Some)
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-ExceptionDetails>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
  pub text: String,
  #[serde(default)]
  pub exception: Option<RemoteObject>,
  #[serde(default)]
  pub line_number: Option<i64>,
  #[serde(default)]
  pub column_number: Option<i64>,
  #[serde(default)]
  pub script_id: Option<ScriptId>,
  #[serde(default)]
  pub url: Option<String>,
}

impl ExceptionDetails {
  pub fn get_message_and_description(&self) -> (String, String) {
    let description = self
      .exception
      .clone()
      .and_then(|ex| ex.description)
      .unwrap_or_else(|| "undefined".to_string());
    (self.text.to_string(), description)
  }
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#event-consoleAPICalled>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleApiCalled {
  #[serde(rename = "type")]
  pub kind: String,
  pub args: Vec<RemoteObject>,
  #[serde(default)]
  pub timestamp: Option<f64>,
  #[serde(default)]
  pub stack_trace: Option<Value>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#event-exceptionThrown>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionThrown {
  #[serde(default)]
  pub timestamp: Option<f64>,
  pub exception_details: ExceptionDetails,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#method-setAsyncCallStackDepth>
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAsyncCallStackDepthArgs {
  pub max_depth: u32,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-RemoteObjectId>
pub type RemoteObjectId = String;

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-ExecutionContextId>
pub type ExecutionContextId = u64;

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-ScriptId>
pub type ScriptId = String;

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-TimeDelta>
pub type TimeDelta = u64;

/// <https://chromedevtools.github.io/devtools-protocol/tot/Runtime/#type-UnserializableValue>
pub type UnserializableValue = String;

// Debugger

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#type-Location>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
  pub script_id: ScriptId,
  pub line_number: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub column_number: Option<i64>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#type-CallFrame>
///
/// `scope_chain` and `this` are carried through opaquely; nothing in the
/// engine consumes individual scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
  pub call_frame_id: String,
  pub function_name: String,
  pub location: Location,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scope_chain: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub this: Option<Value>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#event-paused>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggerPaused {
  pub call_frames: Vec<CallFrame>,
  pub reason: String,
  #[serde(default)]
  pub data: Option<Value>,
  #[serde(default)]
  pub hit_breakpoints: Option<Vec<String>>,
  #[serde(default)]
  pub async_stack_trace: Option<Value>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#event-breakpointResolved>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointResolved {
  pub breakpoint_id: String,
  pub location: Location,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#event-scriptParsed>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsed {
  pub script_id: ScriptId,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub start_line: i64,
  #[serde(default)]
  pub start_column: i64,
  #[serde(default)]
  pub end_line: i64,
  #[serde(default)]
  pub end_column: i64,
  #[serde(default)]
  pub execution_context_id: Option<ExecutionContextId>,
  #[serde(default)]
  pub hash: Option<String>,
  #[serde(default)]
  pub is_module: Option<bool>,
  #[serde(default)]
  pub length: Option<i64>,
  #[serde(default)]
  pub source_map_url: Option<String>,
  #[serde(default)]
  pub embedder_name: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#method-setBreakpointByUrl>
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlArgs {
  pub line_number: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url_regex: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub column_number: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#method-setBreakpointByUrl>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlResponse {
  pub breakpoint_id: String,
  #[serde(default)]
  pub locations: Vec<Location>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#method-setBreakpoint>
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointArgs {
  pub location: Location,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#method-setBreakpoint>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointResponse {
  pub breakpoint_id: String,
  pub actual_location: Location,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Debugger/#method-getScriptSource>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceResponse {
  pub script_source: String,
}

// Network

/// <https://chromedevtools.github.io/devtools-protocol/tot/Network/#type-Request>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequestData {
  pub url: String,
  pub method: String,
  #[serde(default)]
  pub headers: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub post_data: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Network/#type-Response>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResponseData {
  #[serde(default)]
  pub url: String,
  pub status: i64,
  #[serde(default)]
  pub status_text: String,
  #[serde(default)]
  pub headers: Value,
  #[serde(default)]
  pub mime_type: String,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Network/#event-requestWillBeSent>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
  pub request_id: String,
  pub request: NetworkRequestData,
  pub timestamp: f64,
  #[serde(default, rename = "type")]
  pub resource_type: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Network/#event-responseReceived>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
  pub request_id: String,
  pub response: NetworkResponseData,
  #[serde(default, rename = "type")]
  pub resource_type: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Network/#event-loadingFinished>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinished {
  pub request_id: String,
  pub timestamp: f64,
  #[serde(default)]
  pub encoded_data_length: Option<f64>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Network/#event-loadingFailed>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFailed {
  pub request_id: String,
  pub timestamp: f64,
  #[serde(default)]
  pub error_text: String,
  #[serde(default)]
  pub canceled: Option<bool>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Network/#method-getResponseBody>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResponseBodyResponse {
  pub body: String,
  pub base64_encoded: bool,
}

// Fetch

/// <https://chromedevtools.github.io/devtools-protocol/tot/Fetch/#type-HeaderEntry>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderEntry {
  pub name: String,
  pub value: String,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Fetch/#type-RequestPattern>
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPattern {
  pub url_pattern: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resource_type: Option<String>,
  pub request_stage: &'static str,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Fetch/#event-requestPaused>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequestPaused {
  pub request_id: String,
  pub request: NetworkRequestData,
  #[serde(default)]
  pub resource_type: String,
  #[serde(default)]
  pub network_id: Option<String>,
  #[serde(default)]
  pub response_status_code: Option<i64>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Fetch/#method-continueRequest>
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueRequestArgs {
  pub request_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub headers: Option<Vec<HeaderEntry>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub post_data: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Fetch/#method-fulfillRequest>
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillRequestArgs {
  pub request_id: String,
  pub response_code: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub response_headers: Option<Vec<HeaderEntry>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub body: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub response_phrase: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Fetch/#method-failRequest>
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailRequestArgs {
  pub request_id: String,
  pub error_reason: String,
}

// Log

/// <https://chromedevtools.github.io/devtools-protocol/tot/Log/#type-LogEntry>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
  pub source: String,
  pub level: String,
  pub text: String,
  #[serde(default)]
  pub timestamp: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub line_number: Option<i64>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Log/#event-entryAdded>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntryAdded {
  pub entry: LogEntry,
}

// ServiceWorker

/// <https://chromedevtools.github.io/devtools-protocol/tot/ServiceWorker/#type-ServiceWorkerRegistration>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWorkerRegistration {
  pub registration_id: String,
  #[serde(default, rename = "scopeURL")]
  pub scope_url: String,
  #[serde(default)]
  pub is_deleted: bool,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/ServiceWorker/#event-workerRegistrationUpdated>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRegistrationUpdated {
  pub registrations: Vec<ServiceWorkerRegistration>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/ServiceWorker/#type-ServiceWorkerVersion>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWorkerVersion {
  pub version_id: String,
  pub registration_id: String,
  #[serde(default, rename = "scriptURL")]
  pub script_url: String,
  #[serde(default)]
  pub running_status: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/ServiceWorker/#event-workerVersionUpdated>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerVersionUpdated {
  pub versions: Vec<ServiceWorkerVersion>,
}

// DOM / Page

/// <https://chromedevtools.github.io/devtools-protocol/tot/DOM/#method-getDocument>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDocumentResponse {
  pub root: DomNode,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/DOM/#type-Node>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomNode {
  pub node_id: i64,
  #[serde(default)]
  pub node_name: String,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Page/#method-navigate>
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResponse {
  #[serde(default)]
  pub frame_id: Option<String>,
  #[serde(default)]
  pub loader_id: Option<String>,
  #[serde(default)]
  pub error_text: Option<String>,
}

/// <https://chromedevtools.github.io/devtools-protocol/tot/Page/#method-captureScreenshot>
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureScreenshotArgs {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub format: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quality: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub capture_beyond_viewport: Option<bool>,
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  #[test]
  fn incoming_response_frame() {
    let msg: IncomingMessage =
      serde_json::from_str(r#"{"id":7,"result":{"ok":true}}"#).unwrap();
    assert_eq!(msg.id, Some(7));
    assert!(msg.method.is_none());
    assert_eq!(msg.result, Some(json!({"ok": true})));
  }

  #[test]
  fn incoming_error_frame() {
    let msg: IncomingMessage = serde_json::from_str(
      r#"{"id":3,"error":{"code":-32601,"message":"'Foo.bar' wasn't found"}}"#,
    )
    .unwrap();
    let error = msg.error.unwrap();
    assert_eq!(error.code, -32601);
    assert_eq!(error.message, "'Foo.bar' wasn't found");
    assert!(error.data.is_none());
  }

  #[test]
  fn outgoing_command_omits_empty_members() {
    let frame = serde_json::to_string(&OutgoingCommand {
      id: 1,
      method: "Debugger.enable",
      params: None,
      session_id: None,
    })
    .unwrap();
    assert_eq!(frame, r#"{"id":1,"method":"Debugger.enable"}"#);
  }

  #[test]
  fn outgoing_command_attaches_session() {
    let frame = serde_json::to_value(OutgoingCommand {
      id: 2,
      method: "Runtime.evaluate",
      params: Some(json!({"expression": "1"})),
      session_id: Some("SESSION"),
    })
    .unwrap();
    assert_eq!(frame["sessionId"], json!("SESSION"));
  }

  #[test]
  fn paused_event_retains_unknown_free_form_data() {
    let params: DebuggerPaused = serde_json::from_value(json!({
      "callFrames": [{
        "callFrameId": "frame-0",
        "functionName": "targetFunction",
        "location": {"scriptId": "12", "lineNumber": 4, "columnNumber": 2},
        "url": "http://x/p.html",
        "scopeChain": [{"type": "local"}]
      }],
      "reason": "other",
      "data": {"futureField": 1},
      "hitBreakpoints": ["1:4:0:http://x/p.html"]
    }))
    .unwrap();
    assert_eq!(params.call_frames.len(), 1);
    assert_eq!(params.reason, "other");
    assert_eq!(params.data, Some(json!({"futureField": 1})));
    assert_eq!(
      params.call_frames[0].scope_chain,
      Some(json!([{"type": "local"}]))
    );
  }

  #[test]
  fn remote_object_null_value_is_present() {
    let obj: RemoteObject =
      serde_json::from_value(json!({"type": "object", "subtype": "null", "value": null}))
        .unwrap();
    assert_eq!(obj.value, Some(Value::Null));
    let missing: RemoteObject =
      serde_json::from_value(json!({"type": "undefined"})).unwrap();
    assert_eq!(missing.value, None);
  }
}
