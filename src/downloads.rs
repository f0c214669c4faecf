//! # Downloads
//!
//! Downloads are handled by an external aria2 daemon driven over its RPC
//! port; this module only builds its command line and starts it when the port
//! is free. aria2c runs with `--daemon=true`, so the launcher waits for the
//! short-lived foreground process.

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Aria2Config, expand_path};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to start aria2c: {0}")]
    Spawn(std::io::Error),
    #[error("aria2c exited with {0}")]
    Exited(ExitStatus),
    #[error("downloads page {0} does not exist")]
    MissingIndex(PathBuf),
}

pub fn aria2_args(cfg: &Aria2Config) -> Vec<String> {
    let mut args = vec![
        "--daemon=true".to_string(),
        "--continue=true".to_string(),
        format!("--auto-file-renaming={}", cfg.auto_file_renaming),
        format!("--dir={}", expand_path(&cfg.download_path).display()),
    ];
    if !cfg.proxy_host.is_empty() && !cfg.proxy_port.is_empty() {
        args.push(format!("--all-proxy=http://{}:{}", cfg.proxy_host, cfg.proxy_port));
    }
    args.push("--enable-rpc".to_string());
    args.push("--rpc-listen-all".to_string());
    args.push(format!("--rpc-listen-port={}", cfg.rpc_port));
    args
}

/// True when something already listens on the local port.
pub fn port_in_use(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_err()
}

/// Start aria2 unless its RPC port is taken. Returns whether a daemon was
/// spawned.
pub fn ensure_daemon(cfg: &Aria2Config) -> Result<bool, DownloadError> {
    if port_in_use(cfg.rpc_port) {
        debug!("aria2 rpc port {} already in use", cfg.rpc_port);
        return Ok(false);
    }
    let mut cmd = Command::new("aria2c");
    cmd.args(aria2_args(cfg));
    run_daemonizing(cmd)?;
    info!("started aria2c on rpc port {}", cfg.rpc_port);
    Ok(true)
}

/// Run a command that forks itself into the background and wait for the
/// foreground process, so it is reaped instead of left as a zombie.
fn run_daemonizing(mut cmd: Command) -> Result<(), DownloadError> {
    let status = cmd
        .stdout(Stdio::null())
        .status()
        .map_err(DownloadError::Spawn)?;
    if !status.success() {
        return Err(DownloadError::Exited(status));
    }
    Ok(())
}
