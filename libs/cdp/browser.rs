// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Discovery against the browser's HTTP endpoint (`/json/list`,
//! `/json/version` and friends). The WebSocket per target comes out of
//! these listings; ids pass through unchanged.

use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::errors::CdpError;

/// One entry of `GET /json/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescription {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub web_socket_debugger_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub devtools_frontend_url: Option<String>,
}

/// `GET /json/version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
  #[serde(rename = "Browser")]
  pub browser: String,
  #[serde(rename = "Protocol-Version")]
  pub protocol_version: String,
  #[serde(default, rename = "User-Agent")]
  pub user_agent: Option<String>,
  #[serde(default, rename = "V8-Version")]
  pub v8_version: Option<String>,
  #[serde(default, rename = "webSocketDebuggerUrl")]
  pub web_socket_debugger_url: Option<String>,
}

/// Thin client for the discovery endpoint. Kept by the session across
/// target switches so listings keep working after re-attach.
#[derive(Debug, Clone)]
pub struct BrowserHttpClient {
  base: Url,
  client: reqwest::Client,
}

impl BrowserHttpClient {
  pub fn new(base: Url) -> Self {
    Self {
      base,
      client: reqwest::Client::new(),
    }
  }

  /// Derive the HTTP base from a `ws://host:port/...` endpoint.
  pub fn from_ws_endpoint(ws_url: &Url) -> Result<Self, CdpError> {
    let host = ws_url.host_str().ok_or(url::ParseError::EmptyHost)?;
    let port = ws_url.port().unwrap_or(9222);
    let base = Url::parse(&format!("http://{host}:{port}"))?;
    Ok(Self::new(base))
  }

  pub fn base(&self) -> &Url {
    &self.base
  }

  pub async fn list_targets(&self) -> Result<Vec<TargetDescription>, CdpError> {
    let url = self.base.join("/json/list")?;
    Ok(self.client.get(url).send().await?.json().await?)
  }

  pub async fn version(&self) -> Result<VersionInfo, CdpError> {
    let url = self.base.join("/json/version")?;
    Ok(self.client.get(url).send().await?.json().await?)
  }

  /// Open a new tab, optionally at `url`. Newer Chrome requires PUT here.
  pub async fn open_tab(
    &self,
    url: Option<&str>,
  ) -> Result<TargetDescription, CdpError> {
    let mut endpoint = self.base.join("/json/new")?;
    if let Some(url) = url {
      endpoint.set_query(Some(url));
    }
    Ok(self.client.put(endpoint).send().await?.json().await?)
  }

  pub async fn close_tab(&self, target_id: &str) -> Result<bool, CdpError> {
    let url = self.base.join(&format!("/json/close/{target_id}"))?;
    let response = self.client.get(url).send().await?;
    Ok(response.status().is_success())
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn target_listing_round_trips() {
    let body = r#"[{
      "description": "",
      "devtoolsFrontendUrl": "/devtools/inspector.html?ws=127.0.0.1:9222/devtools/page/AB12",
      "id": "AB12",
      "title": "Example",
      "type": "page",
      "url": "http://example.com/",
      "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/AB12"
    }]"#;
    let targets: Vec<TargetDescription> = serde_json::from_str(body).unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].kind, "page");
    assert_eq!(
      targets[0].web_socket_debugger_url.as_deref(),
      Some("ws://127.0.0.1:9222/devtools/page/AB12")
    );
  }

  #[test]
  fn version_info_uses_browser_header_names() {
    let body = r#"{
      "Browser": "Chrome/126.0.6478.56",
      "Protocol-Version": "1.3",
      "User-Agent": "Mozilla/5.0",
      "V8-Version": "12.6.228.13",
      "WebKit-Version": "537.36",
      "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/XYZ"
    }"#;
    let version: VersionInfo = serde_json::from_str(body).unwrap();
    assert_eq!(version.browser, "Chrome/126.0.6478.56");
    assert_eq!(version.protocol_version, "1.3");
    assert_eq!(
      version.web_socket_debugger_url.as_deref(),
      Some("ws://127.0.0.1:9222/devtools/browser/XYZ")
    );
  }

  #[test]
  fn http_base_from_ws_endpoint() {
    let ws = Url::parse("ws://127.0.0.1:9301/devtools/page/AB12").unwrap();
    let client = BrowserHttpClient::from_ws_endpoint(&ws).unwrap();
    assert_eq!(client.base().as_str(), "http://127.0.0.1:9301/");
  }
}
