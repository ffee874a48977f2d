// Copyright 2025-2026 the Headlamp authors. MIT license.

//! Launches and owns a local Chrome/Chromium process: executable lookup,
//! debugging flags, endpoint extraction from the child's stderr, and
//! graceful teardown with a hard-kill fallback.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::ChildStderr;
use tokio::process::Command;
use url::Url;

pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const KILL_GRACE: Duration = Duration::from_secs(5);

const ENDPOINT_LINE_PREFIX: &str = "DevTools listening on ";

#[derive(Debug, Error)]
pub enum LaunchError {
  #[error(
    "no Chrome executable found; install Chrome/Chromium or set CHROME_PATH"
  )]
  ChromeNotFound,
  #[error("failed to spawn {path}: {source}")]
  Spawn {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("browser did not announce its DevTools endpoint within {0:?}")]
  EndpointTimeout(Duration),
  #[error("browser exited before announcing a DevTools endpoint")]
  EndpointMissing,
  #[error("browser announced an unusable endpoint: {0}")]
  InvalidEndpoint(String),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
  pub chrome_path: Option<PathBuf>,
  /// Fixed debugging port; an unused one is picked when absent.
  pub port: Option<u16>,
  pub headless: bool,
  /// Profile directory. A temporary one is created (and removed on kill)
  /// when absent.
  pub user_data_dir: Option<PathBuf>,
  pub extra_args: Vec<String>,
  pub startup_timeout: Duration,
}

impl Default for LaunchOptions {
  fn default() -> Self {
    Self {
      chrome_path: None,
      port: None,
      headless: true,
      user_data_dir: None,
      extra_args: Vec::new(),
      startup_timeout: DEFAULT_STARTUP_TIMEOUT,
    }
  }
}

/// A running browser owned by this process.
#[derive(Debug)]
pub struct LaunchedChrome {
  pub ws_endpoint: Url,
  pub http_base: Url,
  pub port: u16,
  child: Child,
  user_data_dir: Option<TempDir>,
}

impl LaunchedChrome {
  /// Terminate the browser: ask politely, wait up to five seconds, then
  /// force it. The temporary profile directory goes away afterwards.
  pub async fn kill(mut self) -> Result<(), LaunchError> {
    terminate(&mut self.child);
    match tokio::time::timeout(KILL_GRACE, self.child.wait()).await {
      Ok(status) => {
        log::debug!("browser exited with {:?}", status?);
      }
      Err(_) => {
        log::warn!("browser ignored the terminate signal; force-killing");
        self.child.kill().await?;
      }
    }
    if let Some(dir) = self.user_data_dir.take() {
      if let Err(err) = dir.close() {
        log::debug!("failed to remove temporary profile: {err}");
      }
    }
    Ok(())
  }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
  if let Some(pid) = child.id() {
    // SAFETY: sending SIGTERM to our own child process.
    unsafe {
      libc::kill(pid as i32, libc::SIGTERM);
    }
  }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
  let _ = child.start_kill();
}

/// Best-effort lookup of a Chrome/Chromium executable: environment
/// override, `$PATH`, then the usual install locations.
pub fn find_chrome() -> Option<PathBuf> {
  for var in ["HEADLAMP_CHROME", "CHROME_PATH"] {
    if let Ok(path) = std::env::var(var) {
      let path = PathBuf::from(path);
      if path.exists() {
        return Some(path);
      }
    }
  }
  for name in [
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
  ] {
    if let Ok(path) = which::which(name) {
      return Some(path);
    }
  }
  let known: &[&str] = if cfg!(target_os = "macos") {
    &[
      "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
      "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ]
  } else if cfg!(windows) {
    &[
      "C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe",
      "C:\\Program Files (x86)\\Google\\Chrome\\Application\\chrome.exe",
    ]
  } else {
    &[
      "/usr/bin/google-chrome",
      "/usr/bin/chromium",
      "/usr/bin/chromium-browser",
      "/snap/bin/chromium",
    ]
  };
  known.iter().map(PathBuf::from).find(|path| path.exists())
}

pub async fn launch(options: LaunchOptions) -> Result<LaunchedChrome, LaunchError> {
  let executable = options
    .chrome_path
    .clone()
    .or_else(find_chrome)
    .ok_or(LaunchError::ChromeNotFound)?;
  let port = match options.port {
    Some(port) => port,
    None => pick_unused_port()?,
  };

  let mut command = Command::new(&executable);
  command.arg(format!("--remote-debugging-port={port}"));
  let user_data_dir = match &options.user_data_dir {
    Some(dir) => {
      command.arg(format!("--user-data-dir={}", dir.display()));
      None
    }
    None => {
      let dir = tempfile::Builder::new()
        .prefix("headlamp-profile-")
        .tempdir()?;
      command.arg(format!("--user-data-dir={}", dir.path().display()));
      Some(dir)
    }
  };
  if options.headless {
    command.arg("--headless=new");
  }
  command.args([
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
  ]);
  command.args(&options.extra_args);
  command
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  log::debug!("launching {} on port {port}", executable.display());
  let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
    path: executable.display().to_string(),
    source,
  })?;
  let stderr = child.stderr.take().ok_or(LaunchError::EndpointMissing)?;

  let endpoint = tokio::time::timeout(
    options.startup_timeout,
    read_ws_endpoint(stderr),
  )
  .await
  .map_err(|_| LaunchError::EndpointTimeout(options.startup_timeout))??;

  let http_base = Url::parse(&format!("http://127.0.0.1:{port}"))
    .map_err(|err| LaunchError::InvalidEndpoint(err.to_string()))?;
  log::debug!("browser ready at {endpoint}");

  Ok(LaunchedChrome {
    ws_endpoint: endpoint,
    http_base,
    port,
    child,
    user_data_dir,
  })
}

/// Scan the child's stderr for the endpoint announcement, then keep the
/// pipe drained so the browser never blocks on a full buffer.
async fn read_ws_endpoint(stderr: ChildStderr) -> Result<Url, LaunchError> {
  let mut lines = BufReader::new(stderr).lines();
  while let Some(line) = lines.next_line().await? {
    log::debug!("browser: {line}");
    if let Some(endpoint) = parse_endpoint_line(&line) {
      tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
          log::trace!("browser: {line}");
        }
      });
      return Ok(endpoint);
    }
  }
  Err(LaunchError::EndpointMissing)
}

fn parse_endpoint_line(line: &str) -> Option<Url> {
  let rest = line.strip_prefix(ENDPOINT_LINE_PREFIX)?;
  let start = rest.find("ws://")?;
  Url::parse(rest[start..].trim()).ok()
}

fn pick_unused_port() -> Result<u16, LaunchError> {
  let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
  Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn endpoint_line_parses() {
    let line =
      "DevTools listening on ws://127.0.0.1:9222/devtools/browser/6a0b1c2d";
    let endpoint = parse_endpoint_line(line).unwrap();
    assert_eq!(endpoint.scheme(), "ws");
    assert_eq!(endpoint.port(), Some(9222));
    assert_eq!(endpoint.path(), "/devtools/browser/6a0b1c2d");
  }

  #[test]
  fn unrelated_stderr_lines_are_ignored() {
    assert!(parse_endpoint_line("[WARNING] gpu init failed").is_none());
    assert!(parse_endpoint_line("DevTools listening on nothing").is_none());
    assert!(parse_endpoint_line("ws://127.0.0.1:1/").is_none());
  }

  #[test]
  fn picked_ports_are_bindable() {
    let port = pick_unused_port().unwrap();
    assert!(port > 0);
  }
}
