//! Systemd service integration (sd-notify)
//!
//! Every call is a no-op when `NOTIFY_SOCKET` is unset.

use anyhow::{Context, Result};
use std::env;
use std::os::unix::net::UnixDatagram;
use tracing::debug;

const NOTIFY_SOCKET: &str = "NOTIFY_SOCKET";

fn notify(message: &str) -> Result<bool> {
    let Ok(socket_path) = env::var(NOTIFY_SOCKET) else {
        debug!("{} not set, skipping systemd notification", NOTIFY_SOCKET);
        return Ok(false);
    };

    let socket = UnixDatagram::unbound().context("Failed to create Unix socket")?;
    socket
        .send_to(message.as_bytes(), &socket_path)
        .with_context(|| format!("Failed to send {} to systemd", message))?;
    debug!("Notified systemd: {}", message);
    Ok(true)
}

/// Tell systemd the initial scan is done and the receiver is registered
pub fn notify_ready() -> Result<()> {
    notify("READY=1").map(|_| ())
}

/// Tell systemd the manager is shutting down
pub fn notify_stopping() -> Result<()> {
    notify("STOPPING=1").map(|_| ())
}

/// Status line shown by `systemctl status`
pub fn notify_status(status: &str) -> Result<()> {
    notify(&format!("STATUS={}", status)).map(|_| ())
}

pub fn is_systemd() -> bool {
    env::var(NOTIFY_SOCKET).is_ok()
}
