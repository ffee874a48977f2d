// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Page, DOM, target and capture tools.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use headlamp_cdp::protocol::CaptureScreenshotArgs;
use headlamp_session::DebugSession;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::tools::ToolInfo;
use crate::tools::ToolResult;

/// Payloads up to this size are returned inline; larger ones go to a
/// temp file and the result carries the path.
const INLINE_CAPTURE_LIMIT: usize = 1024 * 1024;

pub fn tools() -> Vec<ToolInfo> {
  vec![
    ToolInfo {
      name: "navigate",
      description:
        "Navigate the page, reporting a breakpoint pause hit during load.",
      input_schema: json!({
        "type": "object",
        "properties": {"url": {"type": "string"}},
        "required": ["url"],
      }),
    },
    ToolInfo {
      name: "click",
      description:
        "Click at page coordinates, reporting a breakpoint pause raised \
         by handlers downstream of the click.",
      input_schema: json!({
        "type": "object",
        "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
        "required": ["x", "y"],
      }),
    },
    ToolInfo {
      name: "query_selector",
      description: "Find the first node matching a CSS selector.",
      input_schema: json!({
        "type": "object",
        "properties": {"selector": {"type": "string"}},
        "required": ["selector"],
      }),
    },
    ToolInfo {
      name: "list_targets",
      description: "Debuggable targets exposed by the browser.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
    ToolInfo {
      name: "switch_target",
      description:
        "Re-attach the session to another target by id. Collected state \
         is kept.",
      input_schema: json!({
        "type": "object",
        "properties": {"targetId": {"type": "string"}},
        "required": ["targetId"],
      }),
    },
    ToolInfo {
      name: "open_tab",
      description: "Open a new tab, optionally at a URL.",
      input_schema: json!({
        "type": "object",
        "properties": {"url": {"type": "string"}},
      }),
    },
    ToolInfo {
      name: "close_tab",
      description: "Close a tab by target id.",
      input_schema: json!({
        "type": "object",
        "properties": {"targetId": {"type": "string"}},
        "required": ["targetId"],
      }),
    },
    ToolInfo {
      name: "capture_screenshot",
      description:
        "Screenshot the page. Small images come back inline; large ones \
         are written to the temp directory.",
      input_schema: json!({
        "type": "object",
        "properties": {
          "format": {"type": "string", "enum": ["png", "jpeg", "webp"]},
          "quality": {"type": "integer"},
          "fullPage": {"type": "boolean"},
        },
      }),
    },
    ToolInfo {
      name: "capture_snapshot",
      description:
        "MHTML snapshot of the page. Small snapshots come back inline; \
         large ones are written to the temp directory.",
      input_schema: json!({"type": "object", "properties": {}}),
    },
  ]
}

#[derive(Deserialize)]
struct NavigateArgs {
  url: String,
}

pub async fn navigate(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: NavigateArgs = serde_json::from_value(args)?;
  let aware = session.navigate(&args.url).await?;
  Ok(ToolResult::json(&json!({
    "url": args.url,
    "frameId": aware.result.frame_id,
    "paused": aware.paused,
    "pauseReason": aware.pause_reason,
  })))
}

#[derive(Deserialize)]
struct ClickArgs {
  x: f64,
  y: f64,
}

pub async fn click(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: ClickArgs = serde_json::from_value(args)?;
  let aware = session.click(args.x, args.y).await?;
  Ok(ToolResult::json(&json!({
    "result": aware.result,
    "paused": aware.paused,
    "pauseReason": aware.pause_reason,
    "callFrameCount": aware.call_frames.len(),
  })))
}

#[derive(Deserialize)]
struct QuerySelectorArgs {
  selector: String,
}

pub async fn query_selector(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: QuerySelectorArgs = serde_json::from_value(args)?;
  let node_id = session.query_selector(&args.selector).await?;
  Ok(ToolResult::json(&json!({
    "selector": args.selector,
    "nodeId": node_id,
  })))
}

pub async fn list_targets(session: &DebugSession) -> Result<ToolResult> {
  let targets = session.list_targets().await?;
  Ok(ToolResult::json(&json!({
    "count": targets.len(),
    "targets": targets,
  })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetIdArgs {
  target_id: String,
}

pub async fn switch_target(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: TargetIdArgs = serde_json::from_value(args)?;
  let target = session.switch_target(&args.target_id).await?;
  Ok(ToolResult::json(&serde_json::to_value(&target)?))
}

#[derive(Deserialize)]
struct OpenTabArgs {
  #[serde(default)]
  url: Option<String>,
}

pub async fn open_tab(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: OpenTabArgs = serde_json::from_value(args)?;
  let target = session.open_tab(args.url.as_deref()).await?;
  Ok(ToolResult::json(&serde_json::to_value(&target)?))
}

pub async fn close_tab(session: &DebugSession, args: Value) -> Result<ToolResult> {
  let args: TargetIdArgs = serde_json::from_value(args)?;
  let closed = session.close_tab(&args.target_id).await?;
  Ok(ToolResult::json(&json!({
    "targetId": args.target_id,
    "closed": closed,
  })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotArgs {
  #[serde(default)]
  format: Option<String>,
  #[serde(default)]
  quality: Option<i64>,
  #[serde(default)]
  full_page: bool,
}

pub async fn capture_screenshot(
  session: &DebugSession,
  args: Value,
) -> Result<ToolResult> {
  let args: ScreenshotArgs = serde_json::from_value(args)?;
  let (format, bytes) = session
    .capture_screenshot(CaptureScreenshotArgs {
      format: args.format,
      quality: args.quality,
      capture_beyond_viewport: args.full_page.then_some(true),
    })
    .await?;

  if bytes.len() <= INLINE_CAPTURE_LIMIT {
    let mime_type = match format.as_str() {
      "jpeg" => "image/jpeg",
      "webp" => "image/webp",
      _ => "image/png",
    };
    return Ok(ToolResult::image(
      BASE64_STANDARD.encode(&bytes),
      mime_type.to_string(),
    ));
  }

  let path = capture_path("screenshot", &format);
  tokio::fs::write(&path, &bytes).await?;
  Ok(ToolResult::json(&json!({
    "format": format,
    "byteSize": bytes.len(),
    "savedTo": path,
  })))
}

pub async fn capture_snapshot(session: &DebugSession) -> Result<ToolResult> {
  let mhtml = session.capture_snapshot().await?;
  if mhtml.len() <= INLINE_CAPTURE_LIMIT {
    return Ok(ToolResult::text(mhtml));
  }
  let path = capture_path("snapshot", "mhtml");
  tokio::fs::write(&path, mhtml.as_bytes()).await?;
  Ok(ToolResult::json(&json!({
    "format": "mhtml",
    "byteSize": mhtml.len(),
    "savedTo": path,
  })))
}

fn capture_path(kind: &str, extension: &str) -> String {
  let epoch_ms = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|elapsed| elapsed.as_millis())
    .unwrap_or(0);
  std::env::temp_dir()
    .join(format!("{kind}-{epoch_ms}.{extension}"))
    .display()
    .to_string()
}
