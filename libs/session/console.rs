// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Projection of console output and uncaught exceptions, with the
//! argument flattening the agent-facing tools print.

use std::collections::VecDeque;

use headlamp_cdp::protocol::ConsoleApiCalled;
use headlamp_cdp::protocol::ExceptionThrown;
use headlamp_cdp::protocol::RemoteObject;
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_MAX_MESSAGES: usize = 1000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLocation {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line_number: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub column_number: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
  pub id: u64,
  /// One of `log`, `info`, `warning`, `error`, `debug`.
  pub level: String,
  /// The raw console API type (`log`, `table`, `assert`, ...).
  #[serde(rename = "type")]
  pub kind: String,
  pub text: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<MessageLocation>,
  pub args: Vec<RemoteObject>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedException {
  pub id: u64,
  pub text: String,
  pub description: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line_number: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub column_number: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<f64>,
}

#[derive(Debug)]
pub struct ConsoleState {
  enabled: bool,
  max_messages: usize,
  next_id: u64,
  messages: VecDeque<ConsoleMessage>,
  exceptions: VecDeque<CollectedException>,
}

impl Default for ConsoleState {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_MAX_MESSAGES)
  }
}

impl ConsoleState {
  pub fn with_capacity(max_messages: usize) -> Self {
    Self {
      enabled: false,
      max_messages: max_messages.max(1),
      next_id: 0,
      messages: VecDeque::new(),
      exceptions: VecDeque::new(),
    }
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
    if !enabled {
      self.messages.clear();
      self.exceptions.clear();
    }
  }

  pub fn on_console_api_called(&mut self, params: ConsoleApiCalled) {
    let text = flatten_args(&params.args);
    let location = top_frame_location(params.stack_trace.as_ref());
    let message = ConsoleMessage {
      id: self.bump_id(),
      level: level_for(&params.kind),
      kind: params.kind,
      text,
      location,
      args: params.args,
      timestamp: params.timestamp,
    };
    self.messages.push_back(message);
    while self.messages.len() > self.max_messages {
      self.messages.pop_front();
    }
  }

  pub fn on_exception_thrown(&mut self, params: ExceptionThrown) {
    let details = params.exception_details;
    let (text, description) = details.get_message_and_description();
    let exception = CollectedException {
      id: self.bump_id(),
      text,
      description,
      url: details.url,
      line_number: details.line_number,
      column_number: details.column_number,
      timestamp: params.timestamp,
    };
    self.exceptions.push_back(exception);
    while self.exceptions.len() > self.max_messages {
      self.exceptions.pop_front();
    }
  }

  fn bump_id(&mut self) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  pub fn messages(&self) -> Vec<ConsoleMessage> {
    self.messages.iter().cloned().collect()
  }

  pub fn messages_by_level(&self, level: &str) -> Vec<ConsoleMessage> {
    self
      .messages
      .iter()
      .filter(|message| message.level == level)
      .cloned()
      .collect()
  }

  pub fn exceptions(&self) -> Vec<CollectedException> {
    self.exceptions.iter().cloned().collect()
  }

  pub fn message_count(&self) -> usize {
    self.messages.len()
  }

  pub fn exception_count(&self) -> usize {
    self.exceptions.len()
  }

  pub fn clear(&mut self) {
    self.messages.clear();
    self.exceptions.clear();
  }

  pub fn reset(&mut self) {
    self.enabled = false;
    self.next_id = 0;
    self.clear();
  }
}

fn level_for(kind: &str) -> String {
  match kind {
    "error" | "assert" => "error",
    "warning" => "warning",
    "debug" => "debug",
    "info" => "info",
    _ => "log",
  }
  .to_string()
}

/// Render the argument list the way the console would: scalars literally,
/// objects by their description, `[type]` when nothing better exists.
fn flatten_args(args: &[RemoteObject]) -> String {
  args
    .iter()
    .map(render_arg)
    .collect::<Vec<_>>()
    .join(" ")
}

fn render_arg(arg: &RemoteObject) -> String {
  match arg.kind.as_str() {
    "undefined" => "undefined".to_string(),
    "string" => match arg.value.as_ref().and_then(Value::as_str) {
      Some(text) => text.to_string(),
      None => arg
        .description
        .clone()
        .unwrap_or_else(|| "[string]".to_string()),
    },
    "number" | "boolean" | "bigint" => {
      if let Some(unserializable) = &arg.unserializable_value {
        unserializable.clone()
      } else if let Some(value) = &arg.value {
        scalar_literal(value)
      } else if let Some(description) = &arg.description {
        description.clone()
      } else {
        format!("[{}]", arg.kind)
      }
    }
    kind => arg
      .description
      .clone()
      .unwrap_or_else(|| format!("[{kind}]")),
  }
}

fn scalar_literal(value: &Value) -> String {
  match value {
    Value::String(text) => text.clone(),
    Value::Null => "null".to_string(),
    other => other.to_string(),
  }
}

fn top_frame_location(stack_trace: Option<&Value>) -> Option<MessageLocation> {
  let frame = stack_trace?.pointer("/callFrames/0")?;
  Some(MessageLocation {
    url: frame
      .get("url")
      .and_then(Value::as_str)
      .map(str::to_string),
    line_number: frame.get("lineNumber").and_then(Value::as_i64),
    column_number: frame.get("columnNumber").and_then(Value::as_i64),
  })
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  fn api_called(kind: &str, args: Value) -> ConsoleApiCalled {
    serde_json::from_value(json!({
      "type": kind,
      "args": args,
      "timestamp": 1700000000000.0,
    }))
    .unwrap()
  }

  #[test]
  fn arguments_flatten_to_console_style_text() {
    let mut console = ConsoleState::default();
    console.on_console_api_called(api_called(
      "log",
      json!([
        {"type": "number", "value": 42},
        {"type": "boolean", "value": true},
        {"type": "undefined"},
        {"type": "object", "description": "[object Object]"}
      ]),
    ));

    let messages = console.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "42 true undefined [object Object]");
    assert_eq!(messages[0].level, "log");
  }

  #[test]
  fn level_derives_from_the_api_type() {
    let mut console = ConsoleState::default();
    for kind in ["log", "info", "warning", "error", "debug", "table"] {
      console.on_console_api_called(api_called(
        kind,
        json!([{"type": "string", "value": kind}]),
      ));
    }
    let levels: Vec<String> = console
      .messages()
      .into_iter()
      .map(|message| message.level)
      .collect();
    assert_eq!(levels, vec!["log", "info", "warning", "error", "debug", "log"]);
    assert_eq!(console.messages_by_level("error").len(), 1);
  }

  #[test]
  fn unserializable_numbers_keep_their_spelling() {
    let mut console = ConsoleState::default();
    console.on_console_api_called(api_called(
      "log",
      json!([{"type": "number", "unserializableValue": "Infinity"}]),
    ));
    assert_eq!(console.messages()[0].text, "Infinity");
  }

  #[test]
  fn buffer_drops_the_oldest_message() {
    let mut console = ConsoleState::with_capacity(2);
    for n in 0..3 {
      console.on_console_api_called(api_called(
        "log",
        json!([{"type": "number", "value": n}]),
      ));
    }
    let texts: Vec<String> = console
      .messages()
      .into_iter()
      .map(|message| message.text)
      .collect();
    assert_eq!(texts, vec!["1", "2"]);
    // Ids keep counting even after eviction.
    assert_eq!(console.messages()[1].id, 2);
  }

  #[test]
  fn exceptions_live_in_their_own_bounded_list() {
    let mut console = ConsoleState::default();
    console.on_exception_thrown(
      serde_json::from_value(json!({
        "timestamp": 1.0,
        "exceptionDetails": {
          "text": "Uncaught",
          "lineNumber": 10,
          "columnNumber": 4,
          "url": "http://x/app.js",
          "exception": {
            "type": "object",
            "description": "TypeError: boom"
          }
        }
      }))
      .unwrap(),
    );

    let exceptions = console.exceptions();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].text, "Uncaught");
    assert_eq!(exceptions[0].description, "TypeError: boom");
    assert_eq!(console.message_count(), 0);
  }

  #[test]
  fn stack_trace_provides_the_location() {
    let mut console = ConsoleState::default();
    console.on_console_api_called(
      serde_json::from_value(json!({
        "type": "log",
        "args": [{"type": "string", "value": "hi"}],
        "stackTrace": {
          "callFrames": [{
            "functionName": "log",
            "url": "http://x/app.js",
            "lineNumber": 3,
            "columnNumber": 8
          }]
        }
      }))
      .unwrap(),
    );
    let location = console.messages()[0].location.clone().unwrap();
    assert_eq!(location.url.as_deref(), Some("http://x/app.js"));
    assert_eq!(location.line_number, Some(3));
  }
}
