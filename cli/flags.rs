// Copyright 2025-2026 the Headlamp authors. MIT license.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
  name = "headlamp",
  version,
  about = "DevTools-backed debugging tools for agents, served over stdio"
)]
pub struct Flags {
  /// Attach to a running browser's DevTools HTTP endpoint
  /// (e.g. http://127.0.0.1:9222) instead of launching one.
  #[arg(long, value_name = "URL")]
  pub attach: Option<String>,

  /// Chrome/Chromium executable. Falls back to $CHROME_PATH and the
  /// usual install locations.
  #[arg(long, env = "CHROME_PATH", value_name = "PATH")]
  pub chrome_path: Option<PathBuf>,

  /// Fixed remote debugging port; an unused one is picked by default.
  #[arg(long)]
  pub port: Option<u16>,

  /// Launch with a visible browser window.
  #[arg(long)]
  pub headed: bool,

  /// Profile directory to launch with; a temporary one by default.
  #[arg(long, value_name = "DIR")]
  pub user_data_dir: Option<PathBuf>,

  /// Extra argument passed to the browser (repeatable).
  #[arg(long = "chrome-arg", value_name = "ARG")]
  pub chrome_args: Vec<String>,

  /// Per-command timeout in milliseconds.
  #[arg(long, default_value_t = 30_000)]
  pub timeout_ms: u64,

  /// Cap on retained network request records.
  #[arg(long, default_value_t = 1000)]
  pub max_requests: usize,

  /// Cap on retained console messages.
  #[arg(long, default_value_t = 1000)]
  pub max_console_messages: usize,
}
