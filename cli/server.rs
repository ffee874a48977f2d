// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Line-delimited JSON-RPC 2.0 over stdio, shaped like a Model Context
//! Protocol server: `initialize`, `tools/list`, `tools/call`. All logging
//! goes to stderr; stdout carries only protocol frames.

use std::sync::Arc;

use headlamp_session::DebugSession;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

use crate::tools;

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Deserialize)]
struct RpcRequest {
  #[serde(default)]
  id: Option<Value>,
  method: String,
  #[serde(default)]
  params: Value,
}

pub async fn run(session: Arc<DebugSession>) -> anyhow::Result<()> {
  let stdin = tokio::io::stdin();
  let mut stdout = tokio::io::stdout();
  let mut lines = BufReader::new(stdin).lines();

  while let Some(line) = lines.next_line().await? {
    if line.trim().is_empty() {
      continue;
    }
    if let Some(response) = handle_line(&session, &line).await {
      stdout.write_all(response.to_string().as_bytes()).await?;
      stdout.write_all(b"\n").await?;
      stdout.flush().await?;
    }
  }
  log::debug!("stdin closed; shutting down");
  Ok(())
}

async fn handle_line(session: &DebugSession, line: &str) -> Option<Value> {
  let request: RpcRequest = match serde_json::from_str(line) {
    Ok(request) => request,
    Err(err) => {
      log::warn!("unparseable request: {err}");
      return Some(error_response(Value::Null, -32700, "parse error"));
    }
  };

  match request.method.as_str() {
    "initialize" => Some(result_response(request.id, json!({
      "protocolVersion": PROTOCOL_VERSION,
      "capabilities": {"tools": {}},
      "serverInfo": {
        "name": "headlamp",
        "version": env!("CARGO_PKG_VERSION"),
      },
    }))),
    "notifications/initialized" | "notifications/cancelled" => None,
    "ping" => Some(result_response(request.id, json!({}))),
    "tools/list" => Some(result_response(request.id, json!({
      "tools": tools::registry(),
    }))),
    "tools/call" => {
      let name = request.params.get("name").and_then(Value::as_str);
      let Some(name) = name else {
        return Some(error_response(
          request.id.unwrap_or(Value::Null),
          -32602,
          "tools/call needs a tool name",
        ));
      };
      let args = request
        .params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));
      log::debug!("tool {name} invoked");
      let result = tools::dispatch(session, name, args).await;
      let result = serde_json::to_value(&result)
        .unwrap_or_else(|err| json!({"content": [], "isError": true, "error": err.to_string()}));
      Some(result_response(request.id, result))
    }
    other => {
      // Notifications (no id) are ignorable by contract.
      let id = request.id?;
      log::debug!("unknown method {other}");
      Some(error_response(id, -32601, &format!("method not found: {other}")))
    }
  }
}

fn result_response(id: Option<Value>, result: Value) -> Value {
  json!({
    "jsonrpc": "2.0",
    "id": id.unwrap_or(Value::Null),
    "result": result,
  })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
  json!({
    "jsonrpc": "2.0",
    "id": id,
    "error": {"code": code, "message": message},
  })
}

#[cfg(test)]
mod tests {
  use headlamp_session::SessionOptions;
  use pretty_assertions::assert_eq;

  use super::*;

  fn disconnected_session() -> DebugSession {
    DebugSession::new(SessionOptions::default())
  }

  #[tokio::test]
  async fn initialize_advertises_tools() {
    let session = disconnected_session();
    let response = handle_line(
      &session,
      r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
    )
    .await
    .unwrap();
    assert_eq!(response["id"], json!(1));
    assert_eq!(
      response["result"]["serverInfo"]["name"],
      json!("headlamp")
    );
    assert!(response["result"]["capabilities"]["tools"].is_object());
  }

  #[tokio::test]
  async fn tools_list_contains_evaluate() {
    let session = disconnected_session();
    let response = handle_line(
      &session,
      r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
    )
    .await
    .unwrap();
    let tools = response["result"]["tools"].as_array().unwrap();
    assert!(tools.iter().any(|tool| tool["name"] == json!("evaluate")));
    assert!(
      tools
        .iter()
        .all(|tool| tool["inputSchema"]["type"] == json!("object"))
    );
  }

  #[tokio::test]
  async fn tool_errors_come_back_in_the_envelope() {
    let session = disconnected_session();
    let response = handle_line(
      &session,
      r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"resume"}}"#,
    )
    .await
    .unwrap();
    // Not connected: the failure rides inside the tool result, not as a
    // protocol-level error.
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], json!(true));
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error: "));
  }

  #[tokio::test]
  async fn notifications_produce_no_response() {
    let session = disconnected_session();
    let response = handle_line(
      &session,
      r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
    )
    .await;
    assert!(response.is_none());
  }

  #[tokio::test]
  async fn unknown_methods_get_a_jsonrpc_error() {
    let session = disconnected_session();
    let response = handle_line(
      &session,
      r#"{"jsonrpc":"2.0","id":9,"method":"resources/list"}"#,
    )
    .await
    .unwrap();
    assert_eq!(response["error"]["code"], json!(-32601));
  }
}
