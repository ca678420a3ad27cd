// SPDX-License-Identifier: MIT
//
// wren — a small modal terminal text editor.
//
// This is the main binary that wires the two crates together:
//
//   wren-term   → raw mode, key decoding, the paced event loop
//   wren-editor → buffer, modes, command sessions, frame rendering
//
// `Editor` implements wren-term's `App` trait. Each key flows through:
//
//   stdin → burst → decoder → handle_input → mode table → buffer/command
//   handle_output → mode table → renderer → OutputBuffer → one write
//
// Layout:
//
//   ┌──────────────────────────────┐
//   │ gutter + text                │  ← rows - 2
//   ├──────────────────────────────┤
//   │ status line (inverted)       │  ← 1 row
//   ├──────────────────────────────┤
//   │ message / command prompt     │  ← 1 row
//   └──────────────────────────────┘

mod commands;
mod editor;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use wren_editor::buffer::Buffer;
use wren_editor::config::Config;
use wren_term::event_loop::{EventLoop, LoopConfig};

use crate::editor::Editor;

/// Environment variable holding the log filter (`EnvFilter` syntax).
const LOG_ENV: &str = "WREN_LOG";

// ─── Command line ───────────────────────────────────────────────────────────

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "wren", version, about = "A small modal terminal text editor")]
struct Args {
    /// File to open. Created on first save if it does not exist.
    file: Option<PathBuf>,

    /// Configuration file (overrides discovery of `wren.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file. Without it nothing is logged, since the
    /// terminal belongs to the editor.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

// ─── Logging ────────────────────────────────────────────────────────────────

/// Install the global subscriber writing to `path`. The returned guard
/// flushes the background writer when dropped.
fn init_logging(path: &Path) -> Result<WorkerGuard> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("log file {} has no file name", path.display()))?;

    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("installing log subscriber")?;
    Ok(guard)
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = args.log_file.as_deref().map(init_logging).transpose()?;
    tracing::info!(target: "runtime", version = env!("CARGO_PKG_VERSION"), "startup");

    let config = match Config::load(args.config.as_deref()) {
        Ok((config, path)) => {
            tracing::debug!(target: "config", path = ?path, "config ready");
            config
        }
        Err(e) => {
            tracing::warn!(target: "config", error = %e, "falling back to defaults");
            eprintln!("wren: {e}; using defaults");
            Config::default()
        }
    };

    let buffer = match &args.file {
        Some(path) => {
            Buffer::open(path).with_context(|| format!("opening {}", path.display()))?
        }
        None => Buffer::new(),
    };

    let loop_config = LoopConfig::from_frame_rate(config.frame_rate, config.clipboard_threshold);
    let mut editor = Editor::new(buffer, config);
    EventLoop::new(loop_config)
        .run(&mut editor)
        .context("terminal event loop")?;

    tracing::info!(target: "runtime", "shutdown");
    Ok(())
}
