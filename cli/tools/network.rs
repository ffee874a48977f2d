// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Network and console tools: the request table, response bodies, console
//! messages, exceptions, and the browser log buffer.

use anyhow::Result;
use headlamp_session::DebugSession;
use headlamp_session::network::NetworkRequest;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::tools::ToolInfo;
use crate::tools::ToolResult;

pub fn tools() -> Vec<ToolInfo> {
  vec![
    ToolInfo {
      name: "enable_network",
      description: "Start collecting network requests.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "disable_network",
      description: "Stop collecting network requests and drop the table.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "list_requests",
      description:
        "Collected network requests, optionally filtered by URL pattern, \
         resource type, or state (failed/pending).",
      input_schema: json!({
        "type": "object",
        "properties": {
          "urlPattern": {"type": "string"},
          "resourceType": {"type": "string"},
          "state": {"type": "string", "enum": ["failed", "pending"]},
        },
      }),
    },
    ToolInfo {
      name: "get_request",
      description: "One collected request by id, with its full record.",
      input_schema: json!({
        "type": "object",
        "properties": {"requestId": {"type": "string"}},
        "required": ["requestId"],
      }),
    },
    ToolInfo {
      name: "get_response_body",
      description: "Response body of a finished request.",
      input_schema: json!({
        "type": "object",
        "properties": {"requestId": {"type": "string"}},
        "required": ["requestId"],
      }),
    },
    ToolInfo {
      name: "clear_network",
      description: "Drop all collected request records.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "enable_console",
      description: "Start collecting console output and exceptions.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "disable_console",
      description: "Stop collecting console output.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "list_console",
      description: "Collected console messages, optionally by level.",
      input_schema: json!({
        "type": "object",
        "properties": {
          "level": {
            "type": "string",
            "enum": ["log", "info", "warning", "error", "debug"],
          },
        },
      }),
    },
    ToolInfo {
      name: "list_exceptions",
      description: "Collected uncaught exceptions.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "clear_console",
      description: "Drop collected console messages and exceptions.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "browser_logs",
      description: "Browser-level log entries (Log domain).",
      input_schema: json!({"type": "object", "properties": {}}),
    },
  ]
}

pub async fn enable(session: &DebugSession) -> Result<ToolResult> {
  session.enable_network().await?;
  Ok(ToolResult::json(&json!({"enabled": true})))
}

pub async fn disable(session: &DebugSession) -> Result<ToolResult> {
  session.disable_network().await?;
  Ok(ToolResult::json(&json!({"enabled": false})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRequestsArgs {
  #[serde(default)]
  url_pattern: Option<String>,
  #[serde(default)]
  resource_type: Option<String>,
  #[serde(default)]
  state: Option<String>,
}

pub fn list_requests(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: ListRequestsArgs = serde_json::from_value(args)?;
  let network = session.state().network.lock();
  let requests = if let Some(pattern) = &args.url_pattern {
    network.get_by_url(pattern)
  } else if let Some(resource_type) = &args.resource_type {
    network.get_by_type(resource_type)
  } else {
    match args.state.as_deref() {
      Some("failed") => network.get_failed(),
      Some("pending") => network.get_pending(),
      _ => network.get_all(),
    }
  };
  drop(network);

  let rows: Vec<Value> = requests.iter().map(request_row).collect();
  Ok(ToolResult::json(&json!({
    "count": rows.len(),
    "requests": rows,
  })))
}

/// The compact per-request row: duration in milliseconds (or the literal
/// `"pending"`) and the encoded size.
fn request_row(request: &NetworkRequest) -> Value {
  let duration = match request.duration {
    Some(seconds) => json!((seconds * 1000.0).round() as i64),
    None => json!("pending"),
  };
  let mut row = json!({
    "requestId": request.request_id,
    "url": request.url,
    "method": request.method,
    "resourceType": request.resource_type,
    "status": request.status,
    "duration": duration,
    "size": request.encoded_data_length.unwrap_or(0.0),
    "failed": request.failed,
  });
  if let Some(error_text) = &request.error_text {
    row["errorText"] = json!(error_text);
  }
  row
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestIdArgs {
  request_id: String,
}

pub fn get_request(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: RequestIdArgs = serde_json::from_value(args)?;
  let request = session.state().network.lock().get(&args.request_id);
  match request {
    Some(request) => Ok(ToolResult::json(&serde_json::to_value(&request)?)),
    None => Ok(ToolResult::error(format!(
      "no request with id {}",
      args.request_id
    ))),
  }
}

pub async fn get_response_body(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: RequestIdArgs = serde_json::from_value(args)?;
  let body = session.get_response_body(&args.request_id).await?;
  Ok(ToolResult::json(&json!({
    "requestId": args.request_id,
    "base64Encoded": body.base64_encoded,
    "body": body.body,
  })))
}

pub fn clear(session: &DebugSession) -> Result<ToolResult> {
  session.clear_network();
  Ok(ToolResult::json(&json!({"cleared": true})))
}

pub async fn enable_console(session: &DebugSession) -> Result<ToolResult> {
  session.enable_runtime().await?;
  Ok(ToolResult::json(&json!({"enabled": true})))
}

pub async fn disable_console(session: &DebugSession) -> Result<ToolResult> {
  session.disable_runtime().await?;
  Ok(ToolResult::json(&json!({"enabled": false})))
}

#[derive(Deserialize)]
struct ListConsoleArgs {
  #[serde(default)]
  level: Option<String>,
}

pub fn list_console(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: ListConsoleArgs = serde_json::from_value(args)?;
  let console = session.state().console.lock();
  let messages = match args.level.as_deref() {
    Some(level) => console.messages_by_level(level),
    None => console.messages(),
  };
  drop(console);
  Ok(ToolResult::json(&json!({
    "count": messages.len(),
    "messages": messages,
  })))
}

pub fn list_exceptions(session: &DebugSession) -> Result<ToolResult> {
  let exceptions = session.state().console.lock().exceptions();
  Ok(ToolResult::json(&json!({
    "count": exceptions.len(),
    "exceptions": exceptions,
  })))
}

pub fn clear_console(session: &DebugSession) -> Result<ToolResult> {
  session.clear_console();
  Ok(ToolResult::json(&json!({"cleared": true})))
}

pub fn browser_logs(session: &DebugSession) -> Result<ToolResult> {
  let entries = session.state().logs();
  Ok(ToolResult::json(&json!({
    "count": entries.len(),
    "entries": entries,
  })))
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn pending_requests_render_a_literal_duration() {
    let request = NetworkRequest {
      request_id: "req1".to_string(),
      url: "http://x/api".to_string(),
      method: "GET".to_string(),
      resource_type: None,
      headers: json!({}),
      post_data: None,
      start_time: 5.0,
      end_time: None,
      duration: None,
      status: None,
      status_text: None,
      mime_type: None,
      encoded_data_length: None,
      failed: false,
      error_text: None,
      canceled: false,
    };
    let row = request_row(&request);
    assert_eq!(row["duration"], json!("pending"));
    assert_eq!(row["size"], json!(0.0));

    let mut finished = request;
    finished.duration = Some(0.25);
    finished.encoded_data_length = Some(512.0);
    let row = request_row(&finished);
    assert_eq!(row["duration"], json!(250));
    assert_eq!(row["size"], json!(512.0));
  }
}
