// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Fetch interception tools: rule management and dispatch of paused
//! requests.

use anyhow::Result;
use headlamp_cdp::protocol::ContinueRequestArgs;
use headlamp_cdp::protocol::HeaderEntry;
use headlamp_session::DebugSession;
use headlamp_session::fetch::RuleSpec;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::tools::ToolInfo;
use crate::tools::ToolResult;

pub fn tools() -> Vec<ToolInfo> {
  vec![
    ToolInfo {
      name: "add_intercept_rule",
      description:
        "Add an interception rule. Pattern is *, a glob, or /regex/; the \
         action (pause, modify, mock, fail) is advisory and carried on \
         matching paused requests.",
      input_schema: json!({
        "type": "object",
        "properties": {
          "pattern": {"type": "string"},
          "resourceTypes": {"type": "array", "items": {"type": "string"}},
          "action": {"type": "string", "enum": ["pause", "modify", "mock", "fail"]},
          "modifyHeaders": {"type": "array", "items": {
            "type": "object",
            "properties": {"name": {"type": "string"}, "value": {"type": "string"}},
            "required": ["name", "value"],
          }},
          "modifyUrl": {"type": "string"},
          "mockResponse": {"type": "object"},
          "failReason": {"type": "string"},
          "enabled": {"type": "boolean"},
        },
        "required": ["pattern", "action"],
      }),
    },
    ToolInfo {
      name: "remove_intercept_rule",
      description: "Remove an interception rule by id.",
      input_schema: rule_id_schema(),
    },
    ToolInfo {
      name: "get_intercept_rule",
      description: "One interception rule by id.",
      input_schema: rule_id_schema(),
    },
    ToolInfo {
      name: "list_intercept_rules",
      description: "All interception rules in evaluation order.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "enable_fetch",
      description:
        "Enable request interception with patterns generated from the \
         enabled rules.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "disable_fetch",
      description: "Disable request interception and drop paused requests.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "list_paused_requests",
      description: "Requests currently paused at the Request stage.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "continue_request",
      description:
        "Let a paused request through, optionally overriding URL, method, \
         headers, or post data.",
      input_schema: json!({
        "type": "object",
        "properties": {
          "requestId": {"type": "string"},
          "url": {"type": "string"},
          "method": {"type": "string"},
          "headers": {"type": "array", "items": {
            "type": "object",
            "properties": {"name": {"type": "string"}, "value": {"type": "string"}},
            "required": ["name", "value"],
          }},
          "postData": {"type": "string"},
        },
        "required": ["requestId"],
      }),
    },
    ToolInfo {
      name: "fulfill_request",
      description:
        "Answer a paused request with a synthetic response. Text bodies \
         are base64-encoded automatically.",
      input_schema: json!({
        "type": "object",
        "properties": {
          "requestId": {"type": "string"},
          "responseCode": {"type": "integer"},
          "headers": {"type": "array", "items": {
            "type": "object",
            "properties": {"name": {"type": "string"}, "value": {"type": "string"}},
            "required": ["name", "value"],
          }},
          "body": {"type": "string"},
          "bodyBase64Encoded": {"type": "boolean"},
        },
        "required": ["requestId"],
      }),
    },
    ToolInfo {
      name: "fail_request",
      description:
        "Fail a paused request with a network error reason (default \
         Failed).",
      input_schema: json!({
        "type": "object",
        "properties": {
          "requestId": {"type": "string"},
          "errorReason": {"type": "string"},
        },
        "required": ["requestId"],
      }),
    },
  ]
}

fn rule_id_schema() -> Value {
  json!({
    "type": "object",
    "properties": {"ruleId": {"type": "string"}},
    "required": ["ruleId"],
  })
}

pub async fn add_rule(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let spec: RuleSpec = serde_json::from_value(args)?;
  let rule = session.add_intercept_rule(spec).await?;
  Ok(ToolResult::json(&serde_json::to_value(&rule)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleIdArgs {
  rule_id: String,
}

pub async fn remove_rule(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: RuleIdArgs = serde_json::from_value(args)?;
  session.remove_intercept_rule(&args.rule_id).await?;
  Ok(ToolResult::json(&json!({"removed": args.rule_id})))
}

pub fn get_rule(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: RuleIdArgs = serde_json::from_value(args)?;
  let rule = session.get_intercept_rule(&args.rule_id)?;
  Ok(ToolResult::json(&serde_json::to_value(&rule)?))
}

pub fn list_rules(session: &DebugSession) -> Result<ToolResult> {
  let rules = session.intercept_rules();
  Ok(ToolResult::json(&json!({
    "count": rules.len(),
    "rules": rules,
  })))
}

pub async fn enable(session: &DebugSession) -> Result<ToolResult> {
  let patterns = session.enable_fetch().await?;
  Ok(ToolResult::json(&json!({
    "enabled": true,
    "patterns": patterns,
  })))
}

pub async fn disable(session: &DebugSession) -> Result<ToolResult> {
  session.disable_fetch().await?;
  Ok(ToolResult::json(&json!({"enabled": false})))
}

pub fn list_paused(session: &DebugSession) -> Result<ToolResult> {
  let paused = session.paused_requests();
  Ok(ToolResult::json(&json!({
    "count": paused.len(),
    "pausedRequests": paused,
  })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContinueToolArgs {
  request_id: String,
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  method: Option<String>,
  #[serde(default)]
  headers: Option<Vec<HeaderEntry>>,
  #[serde(default)]
  post_data: Option<String>,
}

pub async fn continue_request(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: ContinueToolArgs = serde_json::from_value(args)?;
  let overrides = ContinueRequestArgs {
    request_id: String::new(),
    url: args.url,
    method: args.method,
    headers: args.headers,
    post_data: args.post_data,
  };
  session
    .continue_request(&args.request_id, Some(overrides))
    .await?;
  Ok(ToolResult::json(&json!({"continued": args.request_id})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FulfillToolArgs {
  request_id: String,
  #[serde(default = "default_status")]
  response_code: i64,
  #[serde(default)]
  headers: Option<Vec<HeaderEntry>>,
  #[serde(default)]
  body: Option<String>,
  #[serde(default)]
  body_base64_encoded: bool,
}

fn default_status() -> i64 {
  200
}

pub async fn fulfill_request(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: FulfillToolArgs = serde_json::from_value(args)?;
  session
    .fulfill_request(
      &args.request_id,
      args.response_code,
      args.headers,
      args.body,
      args.body_base64_encoded,
    )
    .await?;
  Ok(ToolResult::json(&json!({"fulfilled": args.request_id})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailToolArgs {
  request_id: String,
  #[serde(default)]
  error_reason: Option<String>,
}

pub async fn fail_request(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: FailToolArgs = serde_json::from_value(args)?;
  session
    .fail_request(&args.request_id, args.error_reason)
    .await?;
  Ok(ToolResult::json(&json!({"failed": args.request_id})))
}
