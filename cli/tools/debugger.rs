// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Debugger-domain tools: evaluation, breakpoints, stepping, scripts.

use anyhow::Result;
use headlamp_session::BreakpointRequest;
use headlamp_session::DebugSession;
use headlamp_session::EvaluateOptions;
use headlamp_session::EvaluateOutcome;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::tools::ToolInfo;
use crate::tools::ToolResult;

pub fn tools() -> Vec<ToolInfo> {
  vec![
    ToolInfo {
      name: "evaluate",
      description:
        "Evaluate a JavaScript expression on the page. If a breakpoint is \
         hit the result reports the pause instead of a value.",
      input_schema: json!({
        "type": "object",
        "properties": {
          "expression": {"type": "string"},
          "awaitPromise": {"type": "boolean"},
          "returnByValue": {"type": "boolean"},
          "timeoutMs": {"type": "integer"},
        },
        "required": ["expression"],
      }),
    },
    ToolInfo {
      name: "evaluate_on_frame",
      description:
        "Evaluate an expression in the scope of a call frame of the \
         current pause.",
      input_schema: json!({
        "type": "object",
        "properties": {
          "callFrameId": {"type": "string"},
          "expression": {"type": "string"},
        },
        "required": ["callFrameId", "expression"],
      }),
    },
    ToolInfo {
      name: "enable_debugger",
      description: "Enable the debugger domain.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "disable_debugger",
      description:
        "Disable the debugger domain, clearing breakpoints and pause state.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "set_breakpoint",
      description:
        "Set a breakpoint by script URL, URL regex, or script id.",
      input_schema: json!({
        "type": "object",
        "properties": {
          "url": {"type": "string"},
          "urlRegex": {"type": "string"},
          "scriptId": {"type": "string"},
          "lineNumber": {"type": "integer"},
          "columnNumber": {"type": "integer"},
          "condition": {"type": "string"},
        },
        "required": ["lineNumber"],
      }),
    },
    ToolInfo {
      name: "remove_breakpoint",
      description: "Remove a breakpoint by id.",
      input_schema: json!({
        "type": "object",
        "properties": {"breakpointId": {"type": "string"}},
        "required": ["breakpointId"],
      }),
    },
    ToolInfo {
      name: "list_breakpoints",
      description: "List managed breakpoints with their resolved locations.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "pause",
      description: "Pause JavaScript execution.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "resume",
      description: "Resume JavaScript execution.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "step_over",
      description: "Step over the next statement while paused.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "step_into",
      description: "Step into the next call while paused.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "step_out",
      description: "Step out of the current function while paused.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "get_call_frames",
      description: "Call frames of the current pause.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "set_pause_on_exceptions",
      description: "Pause on exceptions: none, caught, uncaught, or all.",
      input_schema: json!({
        "type": "object",
        "properties": {
          "state": {"type": "string", "enum": ["none", "caught", "uncaught", "all"]},
        },
        "required": ["state"],
      }),
    },
    ToolInfo {
      name: "set_async_stack_depth",
      description: "Maximum depth of collected async stack traces.",
      input_schema: json!({
        "type": "object",
        "properties": {"maxDepth": {"type": "integer"}},
        "required": ["maxDepth"],
      }),
    },
    ToolInfo {
      name: "list_scripts",
      description: "All scripts parsed so far.",
      input_schema: empty_schema(),
    },
    ToolInfo {
      name: "search_scripts",
      description:
        "Scripts whose URL matches a pattern (*, glob, or /regex/).",
      input_schema: json!({
        "type": "object",
        "properties": {"pattern": {"type": "string"}},
        "required": ["pattern"],
      }),
    },
    ToolInfo {
      name: "get_script_source",
      description: "Source text of a script, cached after the first fetch.",
      input_schema: json!({
        "type": "object",
        "properties": {"scriptId": {"type": "string"}},
        "required": ["scriptId"],
      }),
    },
    ToolInfo {
      name: "status",
      description: "Connection, debugger, network, console and fetch summary.",
      input_schema: empty_schema(),
    },
  ]
}

fn empty_schema() -> Value {
  json!({"type": "object", "properties": {}})
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateToolArgs {
  expression: String,
  #[serde(default)]
  await_promise: bool,
  #[serde(default = "default_true")]
  return_by_value: bool,
  #[serde(default)]
  timeout_ms: Option<u64>,
}

fn default_true() -> bool {
  true
}

pub async fn evaluate(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: EvaluateToolArgs = serde_json::from_value(args)?;
  let outcome = session
    .evaluate(&args.expression, EvaluateOptions {
      await_promise: args.await_promise,
      return_by_value: args.return_by_value,
      timeout_ms: args.timeout_ms,
      ..Default::default()
    })
    .await?;
  Ok(ToolResult::json(&outcome_to_json(outcome)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateOnFrameArgs {
  call_frame_id: String,
  expression: String,
}

pub async fn evaluate_on_frame(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: EvaluateOnFrameArgs = serde_json::from_value(args)?;
  let outcome = session
    .evaluate_on_frame(&args.call_frame_id, &args.expression, EvaluateOptions {
      return_by_value: true,
      ..Default::default()
    })
    .await?;
  Ok(ToolResult::json(&outcome_to_json(outcome)))
}

/// The three result shapes of an evaluation: pause, exception, or value.
fn outcome_to_json(outcome: EvaluateOutcome) -> Value {
  if outcome.paused {
    let top_frame = outcome.call_frames.first().map(|frame| {
      json!({
        "callFrameId": frame.call_frame_id,
        "functionName": frame.function_name,
        "url": frame.url,
        "location": frame.location,
      })
    });
    return json!({
      "paused": true,
      "pauseReason": outcome.pause_reason,
      "callFrameCount": outcome.call_frames.len(),
      "topFrame": top_frame,
    });
  }
  if let Some(details) = outcome.exception_details {
    let (exception, description) = details.get_message_and_description();
    return json!({"exception": exception, "details": description});
  }
  match outcome.result {
    Some(result) => json!({
      "type": result.kind,
      "subtype": result.subtype,
      "value": result.value,
      "objectId": result.object_id,
    }),
    None => json!({"type": "undefined"}),
  }
}

pub async fn enable(session: &DebugSession) -> Result<ToolResult> {
  session.enable_debugger().await?;
  Ok(ToolResult::json(&json!({"enabled": true})))
}

pub async fn disable(session: &DebugSession) -> Result<ToolResult> {
  session.disable_debugger().await?;
  Ok(ToolResult::json(&json!({"enabled": false})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetBreakpointArgs {
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  url_regex: Option<String>,
  #[serde(default)]
  script_id: Option<String>,
  line_number: i64,
  #[serde(default)]
  column_number: Option<i64>,
  #[serde(default)]
  condition: Option<String>,
}

pub async fn set_breakpoint(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: SetBreakpointArgs = serde_json::from_value(args)?;
  let breakpoint = match args.script_id {
    Some(script_id) => {
      session
        .set_breakpoint_at(
          &script_id,
          args.line_number,
          args.column_number,
          args.condition,
        )
        .await?
    }
    None => {
      session
        .set_breakpoint_by_url(BreakpointRequest {
          url: args.url,
          url_regex: args.url_regex,
          line_number: args.line_number,
          column_number: args.column_number,
          condition: args.condition,
        })
        .await?
    }
  };
  Ok(ToolResult::json(&serde_json::to_value(breakpoint)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BreakpointIdArgs {
  breakpoint_id: String,
}

pub async fn remove_breakpoint(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: BreakpointIdArgs = serde_json::from_value(args)?;
  session.remove_breakpoint(&args.breakpoint_id).await?;
  Ok(ToolResult::json(&json!({"removed": args.breakpoint_id})))
}

pub fn list_breakpoints(session: &DebugSession) -> Result<ToolResult> {
  let breakpoints = session.breakpoints();
  Ok(ToolResult::json(&json!({
    "count": breakpoints.len(),
    "breakpoints": breakpoints,
  })))
}

pub async fn control(session: &DebugSession, name: &str) -> Result<ToolResult> {
  match name {
    "pause" => session.pause().await?,
    "resume" => session.resume().await?,
    "step_over" => session.step_over().await?,
    "step_into" => session.step_into().await?,
    "step_out" => session.step_out().await?,
    _ => unreachable!("control dispatch covers exactly the step tools"),
  }
  Ok(ToolResult::json(&json!({"ok": true})))
}

pub fn get_call_frames(session: &DebugSession) -> Result<ToolResult> {
  let frames = session.call_frames()?;
  Ok(ToolResult::json(&json!({
    "count": frames.len(),
    "callFrames": frames,
  })))
}

#[derive(Deserialize)]
struct PauseOnExceptionsArgs {
  state: String,
}

pub async fn set_pause_on_exceptions(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: PauseOnExceptionsArgs = serde_json::from_value(args)?;
  session.set_pause_on_exceptions(&args.state).await?;
  Ok(ToolResult::json(&json!({"state": args.state})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AsyncStackDepthArgs {
  max_depth: u32,
}

pub async fn set_async_stack_depth(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: AsyncStackDepthArgs = serde_json::from_value(args)?;
  session.set_async_stack_depth(args.max_depth).await?;
  Ok(ToolResult::json(&json!({"maxDepth": args.max_depth})))
}

pub fn list_scripts(session: &DebugSession) -> Result<ToolResult> {
  let scripts = session.state().scripts.lock().all();
  Ok(ToolResult::json(&json!({
    "count": scripts.len(),
    "scripts": scripts,
  })))
}

#[derive(Deserialize)]
struct SearchScriptsArgs {
  pattern: String,
}

pub fn search_scripts(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: SearchScriptsArgs = serde_json::from_value(args)?;
  let scripts = session.state().scripts.lock().search(&args.pattern);
  Ok(ToolResult::json(&json!({
    "count": scripts.len(),
    "scripts": scripts,
  })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptIdArgs {
  script_id: String,
}

pub async fn get_script_source(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: ScriptIdArgs = serde_json::from_value(args)?;
  let source = session.get_script_source(&args.script_id).await?;
  Ok(ToolResult::json(&json!({
    "scriptId": args.script_id,
    "source": source,
  })))
}
