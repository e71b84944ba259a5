//! WebSocket live reload channel.
//!
//! A background thread accepts browser connections; the watcher broadcasts
//! typed messages to every connected client. Overlay channels (build
//! errors, warnings) are filtered server-side per config before they go
//! out; page reloads always go out.

use std::{
    net::{TcpListener, TcpStream},
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use parking_lot::Mutex;
use serde::Serialize;
use tungstenite::{Message, WebSocket};

use crate::{config::OverlayConfig, core::is_shutdown, debug, log};

/// Maximum port retry attempts for the reload socket.
const MAX_PORT_RETRIES: u16 = 10;

/// Message sent to connected livereload clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    /// Page changed; the client reloads.
    Reload { reason: String },
    /// Build error; shown in the error overlay.
    Error { path: String, message: String },
    /// Build warning; shown only when the warning channel is on.
    Warning { path: String, message: String },
    /// Dismiss any visible overlay (build went green again).
    Clear,
}

impl ReloadMessage {
    pub fn to_json(&self) -> String {
        // The enum serializes to plain tagged objects; this cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether this message passes the configured overlay channels.
    fn allowed(&self, overlay: &OverlayConfig) -> bool {
        match self {
            Self::Reload { .. } | Self::Clear => true,
            Self::Error { .. } => overlay.errors,
            Self::Warning { .. } => overlay.warnings,
        }
    }
}

type Client = WebSocket<TcpStream>;

/// Broadcast hub for connected livereload clients.
#[derive(Clone)]
pub struct ReloadHub {
    clients: Arc<Mutex<Vec<Client>>>,
    overlay: OverlayConfig,
}

impl ReloadHub {
    /// Bind the reload socket (with port retry) and start accepting
    /// clients on a background thread. Returns the hub and the port it
    /// actually bound.
    pub fn start(base_port: u16, overlay: OverlayConfig) -> Result<(Self, u16)> {
        let (listener, port) = try_bind_port(base_port)?;
        listener.set_nonblocking(true)?;

        let hub = Self {
            clients: Arc::new(Mutex::new(Vec::new())),
            overlay,
        };

        let clients = Arc::clone(&hub.clients);
        std::thread::spawn(move || accept_loop(listener, clients));

        debug!("reload"; "ws://localhost:{}", port);
        Ok((hub, port))
    }

    /// Send a message to every connected client, honoring the overlay
    /// channel config. Dead connections are dropped.
    pub fn broadcast(&self, message: &ReloadMessage) {
        if !message.allowed(&self.overlay) {
            debug!("reload"; "overlay channel off, dropping {:?}", message);
            return;
        }

        let json = message.to_json();
        let mut clients = self.clients.lock();
        clients.retain_mut(|client| client.send(Message::text(json.clone())).is_ok());
    }
}

fn accept_loop(listener: TcpListener, clients: Arc<Mutex<Vec<Client>>>) {
    loop {
        if is_shutdown() {
            return;
        }
        match listener.accept() {
            Ok((stream, addr)) => {
                let _ = stream.set_nonblocking(false);
                match tungstenite::accept(stream) {
                    Ok(socket) => {
                        debug!("reload"; "client connected: {}", addr);
                        clients.lock().push(socket);
                    }
                    Err(e) => debug!("reload"; "handshake failed: {}", e),
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                log!("reload"; "accept error: {}", e);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

/// Try binding to the port, retrying on the next ports when in use.
fn try_bind_port(base_port: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(format!("127.0.0.1:{port}")) {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                return Ok((listener, port));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow::anyhow!(
        "Failed to bind reload socket after {} attempts: {}",
        MAX_PORT_RETRIES,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_with_a_type_tag() {
        let msg = ReloadMessage::Reload {
            reason: "src/app.js".into(),
        };
        assert_eq!(
            msg.to_json(),
            r#"{"type":"reload","reason":"src/app.js"}"#
        );

        let msg = ReloadMessage::Error {
            path: "src/app.js".into(),
            message: "parse error".into(),
        };
        assert_eq!(
            msg.to_json(),
            r#"{"type":"error","path":"src/app.js","message":"parse error"}"#
        );

        assert_eq!(ReloadMessage::Clear.to_json(), r#"{"type":"clear"}"#);
    }

    #[test]
    fn overlay_channels_gate_errors_and_warnings() {
        let overlay = OverlayConfig::default();
        let error = ReloadMessage::Error {
            path: "a".into(),
            message: "b".into(),
        };
        let warning = ReloadMessage::Warning {
            path: "a".into(),
            message: "b".into(),
        };
        let reload = ReloadMessage::Reload { reason: "a".into() };

        // defaults: errors on, warnings off
        assert!(error.allowed(&overlay));
        assert!(!warning.allowed(&overlay));
        assert!(reload.allowed(&overlay));
        assert!(ReloadMessage::Clear.allowed(&overlay));

        let all_off = OverlayConfig {
            errors: false,
            warnings: false,
            runtime_errors: false,
        };
        assert!(!error.allowed(&all_off));
        // reloads are not an overlay channel and always pass
        assert!(reload.allowed(&all_off));
    }
}
