// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Tool registry and dispatch. Each tool is a name, a JSON schema for its
//! arguments, and a handler that calls into the session and wraps the
//! outcome in a text or image content envelope. Errors become
//! `isError: true` results whose text starts with `"Error: "`.

use headlamp_session::DebugSession;
use serde::Serialize;
use serde_json::Value;

pub mod debugger;
pub mod fetch;
pub mod network;
pub mod page;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
  Text {
    text: String,
  },
  #[serde(rename_all = "camelCase")]
  Image {
    data: String,
    mime_type: String,
  },
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
  pub content: Vec<ToolContent>,
  #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
  pub is_error: bool,
}

impl ToolResult {
  pub fn json(value: &Value) -> Self {
    let text = serde_json::to_string_pretty(value)
      .unwrap_or_else(|_| value.to_string());
    Self::text(text)
  }

  pub fn text(text: String) -> Self {
    Self {
      content: vec![ToolContent::Text { text }],
      is_error: false,
    }
  }

  pub fn image(data: String, mime_type: String) -> Self {
    Self {
      content: vec![ToolContent::Image { data, mime_type }],
      is_error: false,
    }
  }

  pub fn error(err: impl std::fmt::Display) -> Self {
    Self {
      content: vec![ToolContent::Text {
        text: format!("Error: {err}"),
      }],
      is_error: true,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
  pub name: &'static str,
  pub description: &'static str,
  pub input_schema: Value,
}

pub fn registry() -> Vec<ToolInfo> {
  let mut tools = Vec::new();
  tools.extend(debugger::tools());
  tools.extend(network::tools());
  tools.extend(fetch::tools());
  tools.extend(page::tools());
  tools
}

pub async fn dispatch(
  session: &DebugSession,
  name: &str,
  args: Value,
) -> ToolResult {
  let outcome = match name {
    "status" => Ok(ToolResult::json(&session.status())),
    "evaluate" => debugger::evaluate(session, args).await,
    "evaluate_on_frame" => debugger::evaluate_on_frame(session, args).await,
    "enable_debugger" => debugger::enable(session).await,
    "disable_debugger" => debugger::disable(session).await,
    "set_breakpoint" => debugger::set_breakpoint(session, args).await,
    "remove_breakpoint" => debugger::remove_breakpoint(session, args).await,
    "list_breakpoints" => debugger::list_breakpoints(session),
    "pause" | "resume" | "step_over" | "step_into" | "step_out" => {
      debugger::control(session, name).await
    }
    "get_call_frames" => debugger::get_call_frames(session),
    "set_pause_on_exceptions" => {
      debugger::set_pause_on_exceptions(session, args).await
    }
    "set_async_stack_depth" => {
      debugger::set_async_stack_depth(session, args).await
    }
    "list_scripts" => debugger::list_scripts(session),
    "search_scripts" => debugger::search_scripts(session, args),
    "get_script_source" => debugger::get_script_source(session, args).await,
    "enable_network" => network::enable(session).await,
    "disable_network" => network::disable(session).await,
    "list_requests" => network::list_requests(session, args),
    "get_request" => network::get_request(session, args),
    "get_response_body" => network::get_response_body(session, args).await,
    "clear_network" => network::clear(session),
    "enable_console" => network::enable_console(session).await,
    "disable_console" => network::disable_console(session).await,
    "list_console" => network::list_console(session, args),
    "list_exceptions" => network::list_exceptions(session),
    "clear_console" => network::clear_console(session),
    "browser_logs" => network::browser_logs(session),
    "add_intercept_rule" => fetch::add_rule(session, args).await,
    "remove_intercept_rule" => fetch::remove_rule(session, args).await,
    "get_intercept_rule" => fetch::get_rule(session, args),
    "list_intercept_rules" => fetch::list_rules(session),
    "enable_fetch" => fetch::enable(session).await,
    "disable_fetch" => fetch::disable(session).await,
    "list_paused_requests" => fetch::list_paused(session),
    "continue_request" => fetch::continue_request(session, args).await,
    "fulfill_request" => fetch::fulfill_request(session, args).await,
    "fail_request" => fetch::fail_request(session, args).await,
    "navigate" => page::navigate(session, args).await,
    "click" => page::click(session, args).await,
    "query_selector" => page::query_selector(session, args).await,
    "list_targets" => page::list_targets(session).await,
    "switch_target" => page::switch_target(session, args).await,
    "open_tab" => page::open_tab(session, args).await,
    "close_tab" => page::close_tab(session, args).await,
    "capture_screenshot" => page::capture_screenshot(session, args).await,
    "capture_snapshot" => page::capture_snapshot(session).await,
    _ => Err(anyhow::anyhow!("unknown tool {name}")),
  };
  outcome.unwrap_or_else(ToolResult::error)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  #[test]
  fn error_results_carry_the_flag_and_prefix() {
    let result = ToolResult::error("no paused request with id int-1");
    let encoded = serde_json::to_value(&result).unwrap();
    assert_eq!(encoded["isError"], json!(true));
    assert_eq!(
      encoded["content"][0]["text"],
      json!("Error: no paused request with id int-1")
    );
  }

  #[test]
  fn plain_results_omit_the_error_flag() {
    let result = ToolResult::json(&json!({"ok": true}));
    let encoded = serde_json::to_value(&result).unwrap();
    assert!(encoded.get("isError").is_none());
    assert_eq!(encoded["content"][0]["type"], json!("text"));
  }

  #[test]
  fn image_content_encodes_mime_type() {
    let result = ToolResult::image("AAAA".to_string(), "image/png".to_string());
    let encoded = serde_json::to_value(&result).unwrap();
    assert_eq!(encoded["content"][0]["type"], json!("image"));
    assert_eq!(encoded["content"][0]["mimeType"], json!("image/png"));
  }

  #[test]
  fn registry_names_are_unique() {
    let tools = registry();
    let mut names: Vec<&str> = tools.iter().map(|tool| tool.name).collect();
    let total = names.len();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), total);
    assert!(total >= 40);
  }
}
