// Copyright 2025-2026 the Headlamp authors. MIT license.

mod flags;
mod server;
mod tools;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use headlamp_session::DebugSession;
use headlamp_session::SessionOptions;
use headlamp_session::launcher;
use headlamp_session::launcher::LaunchOptions;
use url::Url;

use crate::flags::Flags;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  env_logger::Builder::from_env(
    env_logger::Env::default().default_filter_or("info"),
  )
  .init();

  let flags = Flags::parse();
  let options = SessionOptions {
    command_timeout: Duration::from_millis(flags.timeout_ms),
    max_requests: flags.max_requests,
    max_console_messages: flags.max_console_messages,
    ..Default::default()
  };
  let session = Arc::new(DebugSession::new(options));

  let http_base = match &flags.attach {
    Some(base) => {
      Url::parse(base).context("--attach needs a valid http:// URL")?
    }
    None => {
      let chrome = launcher::launch(LaunchOptions {
        chrome_path: flags.chrome_path.clone(),
        port: flags.port,
        headless: !flags.headed,
        user_data_dir: flags.user_data_dir.clone(),
        extra_args: flags.chrome_args.clone(),
        ..Default::default()
      })
      .await
      .context("failed to launch a browser")?;
      log::info!("browser launched on port {}", chrome.port);
      let http_base = chrome.http_base.clone();
      session.adopt_chrome(chrome).await;
      http_base
    }
  };

  let target = attach_with_retry(&session, http_base).await?;
  log::info!("attached to {} ({})", target.url, target.id);

  let served = server::run(session.clone()).await;
  session.kill().await;
  served
}

/// A freshly launched browser needs a moment before its first page shows
/// up in /json/list.
async fn attach_with_retry(
  session: &DebugSession,
  http_base: Url,
) -> anyhow::Result<headlamp_cdp::TargetDescription> {
  let mut last_err = None;
  for _ in 0..25 {
    match session.attach(http_base.clone()).await {
      Ok(target) => return Ok(target),
      Err(err) => {
        log::debug!("attach not ready yet: {err}");
        last_err = Some(err);
        tokio::time::sleep(Duration::from_millis(200)).await;
      }
    }
  }
  Err(anyhow::anyhow!(
    "could not attach to a page target: {}",
    last_err
      .map(|err| err.to_string())
      .unwrap_or_else(|| "no targets".to_string())
  ))
}
