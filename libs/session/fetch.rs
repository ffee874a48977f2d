// Copyright 2025-2026 the Headlamp authors. MIT license.

//! The fetch interception rule engine: pattern-addressed rules, CDP
//! pattern generation, and the table of requests currently paused at the
//! Request stage.
//!
//! A rule's action is advisory. Nothing here dispatches automatically;
//! the caller decides per paused request whether to continue, fulfill or
//! fail it.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use headlamp_cdp::protocol::FetchRequestPaused;
use headlamp_cdp::protocol::HeaderEntry;
use headlamp_cdp::protocol::RequestPattern;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::patterns::MatchMode;
use crate::patterns::UrlPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
  Pause,
  Modify,
  Mock,
  Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockResponse {
  pub status: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub headers: Option<Vec<HeaderEntry>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<String>,
}

/// Caller-provided shape of a rule; the engine assigns the id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
  pub pattern: String,
  #[serde(default)]
  pub resource_types: Vec<String>,
  pub action: RuleAction,
  #[serde(default)]
  pub modify_headers: Option<Vec<HeaderEntry>>,
  #[serde(default)]
  pub modify_url: Option<String>,
  #[serde(default)]
  pub mock_response: Option<MockResponse>,
  #[serde(default)]
  pub fail_reason: Option<String>,
  #[serde(default = "default_true")]
  pub enabled: bool,
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptRule {
  pub id: String,
  pub pattern: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub resource_types: Vec<String>,
  pub action: RuleAction,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub modify_headers: Option<Vec<HeaderEntry>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub modify_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mock_response: Option<MockResponse>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fail_reason: Option<String>,
  pub enabled: bool,
}

/// Snapshot of a request stopped at the Request stage, waiting for a
/// dispatch decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedRequest {
  pub request_id: String,
  pub url: String,
  pub method: String,
  pub resource_type: String,
  pub headers: Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub post_data: Option<String>,
  /// Milliseconds since the epoch at the moment the pause was recorded.
  pub timestamp: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub matched_rule: Option<String>,
}

#[derive(Debug, Default)]
pub struct FetchInterceptor {
  enabled: bool,
  next_rule_id: u64,
  rules: IndexMap<String, InterceptRule>,
  paused: IndexMap<String, PausedRequest>,
}

impl FetchInterceptor {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
    if !enabled {
      self.paused.clear();
    }
  }

  /// Assign the next `rule-N` id and store the rule. Ids keep counting
  /// across removals; only `reset` rewinds the counter.
  pub fn add_rule(&mut self, spec: RuleSpec) -> InterceptRule {
    self.next_rule_id += 1;
    let rule = InterceptRule {
      id: format!("rule-{}", self.next_rule_id),
      pattern: spec.pattern,
      resource_types: spec.resource_types,
      action: spec.action,
      modify_headers: spec.modify_headers,
      modify_url: spec.modify_url,
      mock_response: spec.mock_response,
      fail_reason: spec.fail_reason,
      enabled: spec.enabled,
    };
    self.rules.insert(rule.id.clone(), rule.clone());
    rule
  }

  pub fn remove_rule(&mut self, id: &str) -> bool {
    self.rules.shift_remove(id).is_some()
  }

  pub fn get_rule(&self, id: &str) -> Option<InterceptRule> {
    self.rules.get(id).cloned()
  }

  pub fn set_rule_enabled(&mut self, id: &str, enabled: bool) -> bool {
    match self.rules.get_mut(id) {
      Some(rule) => {
        rule.enabled = enabled;
        true
      }
      None => false,
    }
  }

  pub fn rules(&self) -> Vec<InterceptRule> {
    self.rules.values().cloned().collect()
  }

  pub fn rule_count(&self) -> usize {
    self.rules.len()
  }

  /// First enabled rule, in insertion order, whose resource filter and
  /// URL pattern both accept the request.
  pub fn find_matching_rule(
    &self,
    url: &str,
    resource_type: &str,
  ) -> Option<InterceptRule> {
    self
      .rules
      .values()
      .find(|rule| {
        rule.enabled
          && rule_covers_type(rule, resource_type)
          && UrlPattern::compile(&rule.pattern, MatchMode::Anchored).matches(url)
      })
      .cloned()
  }

  /// Deduplicated request-stage patterns for `Fetch.enable`. A rule with
  /// several resource types fans out to one pattern per type.
  pub fn cdp_patterns(&self) -> Vec<RequestPattern> {
    let mut patterns: Vec<RequestPattern> = Vec::new();
    for rule in self.rules.values().filter(|rule| rule.enabled) {
      if rule.resource_types.is_empty() {
        push_unique(&mut patterns, RequestPattern {
          url_pattern: rule.pattern.clone(),
          resource_type: None,
          request_stage: "Request",
        });
      } else {
        for resource_type in &rule.resource_types {
          push_unique(&mut patterns, RequestPattern {
            url_pattern: rule.pattern.clone(),
            resource_type: Some(resource_type.clone()),
            request_stage: "Request",
          });
        }
      }
    }
    patterns
  }

  /// Record the pause and the rule that (advisorily) matched it.
  pub fn on_request_paused(&mut self, params: FetchRequestPaused) -> PausedRequest {
    let matched_rule = self
      .find_matching_rule(&params.request.url, &params.resource_type)
      .map(|rule| rule.id);
    let paused = PausedRequest {
      request_id: params.request_id.clone(),
      url: params.request.url,
      method: params.request.method,
      resource_type: params.resource_type,
      headers: params.request.headers,
      post_data: params.request.post_data,
      timestamp: epoch_millis(),
      matched_rule,
    };
    self.paused.insert(params.request_id, paused.clone());
    paused
  }

  pub fn paused_requests(&self) -> Vec<PausedRequest> {
    self.paused.values().cloned().collect()
  }

  pub fn paused_count(&self) -> usize {
    self.paused.len()
  }

  pub fn get_paused(&self, request_id: &str) -> Option<PausedRequest> {
    self.paused.get(request_id).cloned()
  }

  /// Claim a paused request for dispatch, removing it from the table.
  pub fn take_paused(&mut self, request_id: &str) -> Option<PausedRequest> {
    self.paused.shift_remove(request_id)
  }

  /// Clears rules, the paused table, and the id counter.
  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

fn rule_covers_type(rule: &InterceptRule, resource_type: &str) -> bool {
  rule.resource_types.is_empty()
    || rule
      .resource_types
      .iter()
      .any(|kind| kind.eq_ignore_ascii_case(resource_type))
}

fn push_unique(patterns: &mut Vec<RequestPattern>, pattern: RequestPattern) {
  if !patterns.contains(&pattern) {
    patterns.push(pattern);
  }
}

fn epoch_millis() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|elapsed| elapsed.as_millis() as u64)
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  fn spec(pattern: &str, action: RuleAction) -> RuleSpec {
    RuleSpec {
      pattern: pattern.to_string(),
      resource_types: Vec::new(),
      action,
      modify_headers: None,
      modify_url: None,
      mock_response: None,
      fail_reason: None,
      enabled: true,
    }
  }

  fn request_paused(id: &str, url: &str, resource_type: &str) -> FetchRequestPaused {
    serde_json::from_value(json!({
      "requestId": id,
      "request": {"url": url, "method": "GET", "headers": {}},
      "resourceType": resource_type,
    }))
    .unwrap()
  }

  #[test]
  fn rule_ids_are_never_reused_within_a_session() {
    let mut interceptor = FetchInterceptor::new();
    let first = interceptor.add_rule(spec("*", RuleAction::Pause));
    let second = interceptor.add_rule(spec("*", RuleAction::Pause));
    assert_eq!(first.id, "rule-1");
    assert_eq!(second.id, "rule-2");

    assert!(interceptor.remove_rule("rule-1"));
    let third = interceptor.add_rule(spec("*", RuleAction::Pause));
    assert_eq!(third.id, "rule-3");

    interceptor.reset();
    let fresh = interceptor.add_rule(spec("*", RuleAction::Pause));
    assert_eq!(fresh.id, "rule-1");
  }

  #[test]
  fn lookup_returns_the_first_enabled_match() {
    let mut interceptor = FetchInterceptor::new();
    let skipped = interceptor.add_rule(spec("*/api/*", RuleAction::Mock));
    interceptor.set_rule_enabled(&skipped.id, false);
    let mut image_only = spec("*", RuleAction::Pause);
    image_only.resource_types = vec!["Image".to_string()];
    interceptor.add_rule(image_only);
    let fallthrough = interceptor.add_rule(spec("*/api/*", RuleAction::Fail));

    let matched = interceptor
      .find_matching_rule("http://x/api/users", "Fetch")
      .unwrap();
    assert_eq!(matched.id, fallthrough.id);
    assert!(
      interceptor
        .find_matching_rule("http://x/static/app.css", "Stylesheet")
        .is_none()
    );
  }

  #[test]
  fn cdp_patterns_fan_out_and_deduplicate() {
    let mut interceptor = FetchInterceptor::new();
    let mut multi = spec("*/api/*", RuleAction::Pause);
    multi.resource_types = vec!["XHR".to_string(), "Fetch".to_string()];
    interceptor.add_rule(multi);
    let mut duplicate = spec("*/api/*", RuleAction::Mock);
    duplicate.resource_types = vec!["Fetch".to_string()];
    interceptor.add_rule(duplicate);
    let disabled = interceptor.add_rule(spec("*/never/*", RuleAction::Fail));
    interceptor.set_rule_enabled(&disabled.id, false);

    let patterns = interceptor.cdp_patterns();
    assert_eq!(patterns.len(), 2);
    assert_eq!(patterns[0].url_pattern, "*/api/*");
    assert_eq!(patterns[0].resource_type.as_deref(), Some("XHR"));
    assert_eq!(patterns[1].resource_type.as_deref(), Some("Fetch"));
    assert!(patterns.iter().all(|p| p.request_stage == "Request"));
  }

  #[test]
  fn paused_requests_record_their_matched_rule() {
    let mut interceptor = FetchInterceptor::new();
    let rule = interceptor.add_rule(spec("*/api/mock-me", RuleAction::Mock));

    let paused =
      interceptor.on_request_paused(request_paused("int-1", "http://x/api/mock-me", "Fetch"));
    assert_eq!(paused.matched_rule.as_deref(), Some(rule.id.as_str()));
    assert_eq!(interceptor.paused_count(), 1);

    let unmatched =
      interceptor.on_request_paused(request_paused("int-2", "http://x/other", "Fetch"));
    assert_eq!(unmatched.matched_rule, None);
  }

  #[test]
  fn dispatch_claims_the_paused_entry_exactly_once() {
    let mut interceptor = FetchInterceptor::new();
    interceptor.add_rule(spec("*", RuleAction::Pause));
    interceptor.on_request_paused(request_paused("int-1", "http://x/a", "Fetch"));

    assert!(interceptor.take_paused("int-1").is_some());
    assert!(interceptor.take_paused("int-1").is_none());
    assert_eq!(interceptor.paused_count(), 0);
    assert!(interceptor.take_paused("unknown").is_none());
  }
}
