// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Projection of the Network domain: one record per `requestId`,
//! aggregated from the four loading events, insertion-ordered and bounded.

use headlamp_cdp::protocol::LoadingFailed;
use headlamp_cdp::protocol::LoadingFinished;
use headlamp_cdp::protocol::RequestWillBeSent;
use headlamp_cdp::protocol::ResponseReceived;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::patterns::MatchMode;
use crate::patterns::UrlPattern;

pub const DEFAULT_MAX_REQUESTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestState {
  Pending,
  Completed,
  Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
  pub request_id: String,
  pub url: String,
  pub method: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resource_type: Option<String>,
  pub headers: Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub post_data: Option<String>,
  pub start_time: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end_time: Option<f64>,
  /// Seconds between start and end, once the request finished or failed.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status_text: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mime_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub encoded_data_length: Option<f64>,
  pub failed: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error_text: Option<String>,
  pub canceled: bool,
}

impl NetworkRequest {
  /// Derived from the end-time and failure flags; never stored.
  pub fn state(&self) -> RequestState {
    if self.failed {
      RequestState::Failed
    } else if self.end_time.is_some() {
      RequestState::Completed
    } else {
      RequestState::Pending
    }
  }
}

#[derive(Debug)]
pub struct NetworkState {
  enabled: bool,
  max_requests: usize,
  requests: IndexMap<String, NetworkRequest>,
}

impl Default for NetworkState {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_MAX_REQUESTS)
  }
}

impl NetworkState {
  pub fn with_capacity(max_requests: usize) -> Self {
    Self {
      enabled: false,
      max_requests: max_requests.max(1),
      requests: IndexMap::new(),
    }
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
    if !enabled {
      self.requests.clear();
    }
  }

  pub fn on_request_will_be_sent(&mut self, params: RequestWillBeSent) {
    let record = NetworkRequest {
      request_id: params.request_id.clone(),
      url: params.request.url,
      method: params.request.method,
      resource_type: params.resource_type,
      headers: params.request.headers,
      post_data: params.request.post_data,
      start_time: params.timestamp,
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
    self.requests.insert(params.request_id, record);
    while self.requests.len() > self.max_requests {
      self.requests.shift_remove_index(0);
    }
  }

  pub fn on_response_received(&mut self, params: ResponseReceived) {
    let Some(record) = self.requests.get_mut(&params.request_id) else {
      return;
    };
    record.status = Some(params.response.status);
    record.status_text = Some(params.response.status_text);
    record.mime_type = Some(params.response.mime_type);
    if record.resource_type.is_none() {
      record.resource_type = params.resource_type;
    }
  }

  pub fn on_loading_finished(&mut self, params: LoadingFinished) {
    let Some(record) = self.requests.get_mut(&params.request_id) else {
      return;
    };
    record.end_time = Some(params.timestamp);
    record.duration = Some(params.timestamp - record.start_time);
    record.encoded_data_length = params.encoded_data_length;
  }

  pub fn on_loading_failed(&mut self, params: LoadingFailed) {
    let Some(record) = self.requests.get_mut(&params.request_id) else {
      return;
    };
    record.end_time = Some(params.timestamp);
    record.duration = Some(params.timestamp - record.start_time);
    record.failed = true;
    record.error_text = Some(params.error_text);
    record.canceled = params.canceled.unwrap_or(false);
  }

  pub fn count(&self) -> usize {
    self.requests.len()
  }

  pub fn get(&self, request_id: &str) -> Option<NetworkRequest> {
    self.requests.get(request_id).cloned()
  }

  pub fn get_all(&self) -> Vec<NetworkRequest> {
    self.requests.values().cloned().collect()
  }

  /// Substring-style pattern match over the request URL.
  pub fn get_by_url(&self, pattern: &str) -> Vec<NetworkRequest> {
    let matcher = UrlPattern::compile(pattern, MatchMode::Substring);
    self
      .requests
      .values()
      .filter(|request| matcher.matches(&request.url))
      .cloned()
      .collect()
  }

  pub fn get_by_type(&self, resource_type: &str) -> Vec<NetworkRequest> {
    self
      .requests
      .values()
      .filter(|request| {
        request
          .resource_type
          .as_deref()
          .is_some_and(|kind| kind.eq_ignore_ascii_case(resource_type))
      })
      .cloned()
      .collect()
  }

  pub fn get_failed(&self) -> Vec<NetworkRequest> {
    self
      .requests
      .values()
      .filter(|request| request.failed)
      .cloned()
      .collect()
  }

  pub fn get_pending(&self) -> Vec<NetworkRequest> {
    self
      .requests
      .values()
      .filter(|request| request.state() == RequestState::Pending)
      .cloned()
      .collect()
  }

  pub fn summary(&self) -> Value {
    let mut pending = 0usize;
    let mut completed = 0usize;
    let mut failed = 0usize;
    for request in self.requests.values() {
      match request.state() {
        RequestState::Pending => pending += 1,
        RequestState::Completed => completed += 1,
        RequestState::Failed => failed += 1,
      }
    }
    json!({
      "total": self.requests.len(),
      "pending": pending,
      "completed": completed,
      "failed": failed,
    })
  }

  pub fn clear(&mut self) {
    self.requests.clear();
  }

  pub fn reset(&mut self) {
    self.enabled = false;
    self.requests.clear();
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn will_be_sent(id: &str, url: &str, time: f64) -> RequestWillBeSent {
    serde_json::from_value(json!({
      "requestId": id,
      "request": {"url": url, "method": "GET", "headers": {}},
      "timestamp": time,
      "type": "Fetch",
    }))
    .unwrap()
  }

  #[test]
  fn oldest_records_are_evicted_beyond_the_cap() {
    let mut network = NetworkState::with_capacity(5);
    for n in 0..10 {
      network
        .on_request_will_be_sent(will_be_sent(&format!("req{n}"), "http://x/", n as f64));
    }
    assert_eq!(network.count(), 5);
    let survivors: Vec<String> = network
      .get_all()
      .into_iter()
      .map(|request| request.request_id)
      .collect();
    assert_eq!(survivors, vec!["req5", "req6", "req7", "req8", "req9"]);
  }

  #[test]
  fn lifecycle_events_patch_the_record() {
    let mut network = NetworkState::default();
    network.on_request_will_be_sent(will_be_sent("req1", "http://x/api", 10.0));

    network.on_response_received(
      serde_json::from_value(json!({
        "requestId": "req1",
        "response": {
          "url": "http://x/api",
          "status": 200,
          "statusText": "OK",
          "headers": {"Content-Type": "application/json"},
          "mimeType": "application/json"
        }
      }))
      .unwrap(),
    );
    let record = network.get("req1").unwrap();
    assert_eq!(record.status, Some(200));
    assert_eq!(record.state(), RequestState::Pending);

    network.on_loading_finished(
      serde_json::from_value(json!({
        "requestId": "req1",
        "timestamp": 10.25,
        "encodedDataLength": 512.0
      }))
      .unwrap(),
    );
    let record = network.get("req1").unwrap();
    assert_eq!(record.state(), RequestState::Completed);
    assert_eq!(record.duration, Some(0.25));
    assert_eq!(record.encoded_data_length, Some(512.0));
  }

  #[test]
  fn failures_are_terminal_and_queryable() {
    let mut network = NetworkState::default();
    network.on_request_will_be_sent(will_be_sent("req1", "http://x/a", 1.0));
    network.on_request_will_be_sent(will_be_sent("req2", "http://x/b", 2.0));
    network.on_loading_failed(
      serde_json::from_value(json!({
        "requestId": "req2",
        "timestamp": 2.5,
        "errorText": "net::ERR_CONNECTION_REFUSED",
        "canceled": false
      }))
      .unwrap(),
    );

    assert_eq!(network.get_failed().len(), 1);
    assert_eq!(network.get_pending().len(), 1);
    assert_eq!(
      network.summary(),
      json!({"total": 2, "pending": 1, "completed": 0, "failed": 1})
    );
  }

  #[test]
  fn url_queries_share_the_pattern_language() {
    let mut network = NetworkState::default();
    network.on_request_will_be_sent(will_be_sent("r1", "http://x/api/users", 1.0));
    network.on_request_will_be_sent(will_be_sent("r2", "http://x/app.css", 2.0));

    assert_eq!(network.get_by_url("api").len(), 1);
    assert_eq!(network.get_by_url("*").len(), 2);
    assert_eq!(network.get_by_url("/\\.css$/").len(), 1);
    assert_eq!(network.get_by_type("fetch").len(), 2);
  }

  #[test]
  fn disable_empties_queries() {
    let mut network = NetworkState::default();
    network.set_enabled(true);
    network.on_request_will_be_sent(will_be_sent("req1", "http://x/", 1.0));
    network.set_enabled(false);
    assert_eq!(network.count(), 0);
    assert_eq!(network.summary()["total"], json!(0));
  }
}
