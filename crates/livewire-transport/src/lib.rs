//! Transport abstraction layer for Livewire.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the duplex channel between the server and a client, plus the
//! [`UpgradeRequest`] captured while the connection was being opened.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// UpgradeRequest
// ---------------------------------------------------------------------------

/// The parts of the opening request a connection was upgraded from.
///
/// Credentials and the session id travel on this request (header, cookie,
/// or query string), so the transport keeps a copy for the layers above.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Request path, e.g. `/ws`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    /// Header name/value pairs. Names are stored lower-case.
    pub headers: Vec<(String, String)>,
}

impl UpgradeRequest {
    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value of the first query parameter with the given name.
    ///
    /// Values are returned verbatim; tokens and session ids are URL-safe.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;
}

/// A single duplex connection that can send and receive frames.
///
/// `send` and `recv` may be awaited concurrently from different tasks:
/// one reader and one writer per connection. The returned futures are
/// `Send` so both loops can be spawned onto the runtime.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends a text frame to the remote peer.
    fn send(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the request this connection was opened with.
    fn request(&self) -> &UpgradeRequest;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: Option<&str>) -> UpgradeRequest {
        UpgradeRequest {
            path: "/ws".into(),
            query: query.map(str::to_string),
            headers: vec![
                ("authorization".into(), "Bearer abc".into()),
                ("cookie".into(), "token=xyz".into()),
            ],
        }
    }

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = request(None);
        assert_eq!(req.header("Authorization"), Some("Bearer abc"));
        assert_eq!(req.header("COOKIE"), Some("token=xyz"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn test_query_param_finds_named_value() {
        let req = request(Some("sid=1234&access_token=tok"));
        assert_eq!(req.query_param("sid"), Some("1234"));
        assert_eq!(req.query_param("access_token"), Some("tok"));
        assert_eq!(req.query_param("other"), None);
    }

    #[test]
    fn test_query_param_without_query_returns_none() {
        let req = request(None);
        assert_eq!(req.query_param("sid"), None);
    }

    #[test]
    fn test_query_param_bare_key_returns_empty_value() {
        let req = request(Some("flag&sid=9"));
        assert_eq!(req.query_param("flag"), Some(""));
        assert_eq!(req.query_param("sid"), Some("9"));
    }
}
