// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Registry of parsed scripts, indexed by id with a secondary URL index.
//! Scripts are never evicted individually; the registry empties only on
//! disable or session reset.

use std::collections::HashMap;

use headlamp_cdp::protocol::ScriptId;
use headlamp_cdp::protocol::ScriptParsed;
use indexmap::IndexMap;
use serde::Serialize;

use crate::patterns::MatchMode;
use crate::patterns::UrlPattern;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptInfo {
  pub script_id: ScriptId,
  pub url: String,
  pub start_line: i64,
  pub start_column: i64,
  pub end_line: i64,
  pub end_column: i64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub execution_context_id: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hash: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_module: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub length: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source_map_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub embedder_name: Option<String>,
}

impl From<ScriptParsed> for ScriptInfo {
  fn from(params: ScriptParsed) -> Self {
    Self {
      script_id: params.script_id,
      url: params.url,
      start_line: params.start_line,
      start_column: params.start_column,
      end_line: params.end_line,
      end_column: params.end_column,
      execution_context_id: params.execution_context_id,
      hash: params.hash,
      is_module: params.is_module,
      length: params.length,
      source_map_url: params.source_map_url,
      embedder_name: params.embedder_name,
    }
  }
}

#[derive(Debug, Default)]
pub struct ScriptRegistry {
  enabled: bool,
  scripts: IndexMap<ScriptId, ScriptInfo>,
  // Multiple scripts may share a URL; inline scripts share the empty one.
  by_url: HashMap<String, Vec<ScriptId>>,
  sources: HashMap<ScriptId, String>,
}

impl ScriptRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
    if !enabled {
      self.scripts.clear();
      self.by_url.clear();
      self.sources.clear();
    }
  }

  pub fn on_script_parsed(&mut self, params: ScriptParsed) {
    let info = ScriptInfo::from(params);
    self
      .by_url
      .entry(info.url.clone())
      .or_default()
      .push(info.script_id.clone());
    self.scripts.insert(info.script_id.clone(), info);
  }

  pub fn get(&self, script_id: &str) -> Option<ScriptInfo> {
    self.scripts.get(script_id).cloned()
  }

  pub fn count(&self) -> usize {
    self.scripts.len()
  }

  pub fn all(&self) -> Vec<ScriptInfo> {
    self.scripts.values().cloned().collect()
  }

  /// Every script whose URL matches `pattern` (substring semantics).
  pub fn search(&self, pattern: &str) -> Vec<ScriptInfo> {
    let matcher = UrlPattern::compile(pattern, MatchMode::Substring);
    self
      .scripts
      .values()
      .filter(|script| matcher.matches(&script.url))
      .cloned()
      .collect()
  }

  pub fn scripts_for_url(&self, url: &str) -> Vec<ScriptInfo> {
    self
      .by_url
      .get(url)
      .into_iter()
      .flatten()
      .filter_map(|id| self.scripts.get(id))
      .cloned()
      .collect()
  }

  /// Pick the script containing `line_number` among those parsed from
  /// `url`. When the line is outside every candidate's range the first
  /// parsed script wins; long-standing behavior that callers rely on for
  /// single-script pages, even though it is a coarse answer for pages
  /// with many inline scripts.
  pub fn find_script_for_location(
    &self,
    url: &str,
    line_number: i64,
  ) -> Option<ScriptInfo> {
    let candidates = self.scripts_for_url(url);
    candidates
      .iter()
      .find(|script| {
        line_number >= script.start_line && line_number <= script.end_line
      })
      .cloned()
      .or_else(|| candidates.into_iter().next())
  }

  pub fn cached_source(&self, script_id: &str) -> Option<String> {
    self.sources.get(script_id).cloned()
  }

  pub fn cache_source(&mut self, script_id: &str, source: String) {
    self.sources.insert(script_id.to_string(), source);
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use super::*;

  fn parsed(script_id: &str, url: &str, start: i64, end: i64) -> ScriptParsed {
    serde_json::from_value(json!({
      "scriptId": script_id,
      "url": url,
      "startLine": start,
      "startColumn": 0,
      "endLine": end,
      "endColumn": 10,
    }))
    .unwrap()
  }

  #[test]
  fn url_index_tracks_shared_urls() {
    let mut registry = ScriptRegistry::new();
    registry.on_script_parsed(parsed("1", "http://x/p.html", 0, 5));
    registry.on_script_parsed(parsed("2", "http://x/p.html", 10, 20));
    registry.on_script_parsed(parsed("3", "", 0, 0));

    assert_eq!(registry.count(), 3);
    assert_eq!(registry.scripts_for_url("http://x/p.html").len(), 2);
    assert_eq!(registry.scripts_for_url("").len(), 1);
  }

  #[test]
  fn location_lookup_prefers_the_containing_range() {
    let mut registry = ScriptRegistry::new();
    registry.on_script_parsed(parsed("1", "http://x/p.html", 0, 5));
    registry.on_script_parsed(parsed("2", "http://x/p.html", 10, 20));

    let hit = registry
      .find_script_for_location("http://x/p.html", 12)
      .unwrap();
    assert_eq!(hit.script_id, "2");
  }

  #[test]
  fn location_lookup_falls_back_to_the_first_script() {
    let mut registry = ScriptRegistry::new();
    registry.on_script_parsed(parsed("1", "http://x/p.html", 0, 5));
    registry.on_script_parsed(parsed("2", "http://x/p.html", 10, 20));

    // Line 99 is outside both ranges; the first parsed script wins.
    let fallback = registry
      .find_script_for_location("http://x/p.html", 99)
      .unwrap();
    assert_eq!(fallback.script_id, "1");
    assert!(registry.find_script_for_location("http://other/", 0).is_none());
  }

  #[test]
  fn search_uses_substring_globs() {
    let mut registry = ScriptRegistry::new();
    registry.on_script_parsed(parsed("1", "http://x/app.js", 0, 100));
    registry.on_script_parsed(parsed("2", "http://x/vendor.js", 0, 100));

    assert_eq!(registry.search("app").len(), 1);
    assert_eq!(registry.search("*.js").len(), 2);
    assert_eq!(registry.search("/vendor\\.js$/").len(), 1);
  }

  #[test]
  fn disable_empties_every_query() {
    let mut registry = ScriptRegistry::new();
    registry.set_enabled(true);
    registry.on_script_parsed(parsed("1", "http://x/app.js", 0, 100));
    registry.cache_source("1", "console.log(1)".to_string());

    registry.set_enabled(false);
    assert_eq!(registry.count(), 0);
    assert!(registry.all().is_empty());
    assert!(registry.cached_source("1").is_none());
  }
}
