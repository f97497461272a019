//! Session types: the server's record of one logged-in client.
//!
//! A session is created at login and lives in the
//! [`SessionRegistry`](crate::SessionRegistry) until logout or forced
//! termination. It tracks:
//! - WHO is logged in (a [`UserView`] captured at login)
//! - the current [`TokenPair`]
//! - whether a duplex connection is attached ([`ConnectionState`])
//! - the queue and signals that connection's supervisor uses
//!
//! A `Session` value is a snapshot. Cloning it shares the queue sender and
//! the signals, but field changes only become visible to others once the
//! copy is written back to the registry.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use livewire_auth::Role;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A 128-bit random session identifier.
///
/// The nil UUID is reserved as "no session" and is rejected by the
/// registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The reserved nil id.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Wraps an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns `true` for the reserved nil id.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SessionError::InvalidSessionId)
    }
}

// ---------------------------------------------------------------------------
// UserView / TokenPair
// ---------------------------------------------------------------------------

/// The user as seen by a session: no password hash, no audit columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The access/refresh tokens currently issued to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where a session's duplex connection is in its lifecycle.
///
/// ```text
///   Unattached ──(attach)──→ Active ──(terminal event)──→ Closing ──→ Closed
///                              ↑                                        │
///                              └──────────────(attach)──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Logged in, no connection opened yet.
    #[default]
    Unattached,
    /// A supervisor owns a live connection for this session.
    Active,
    /// The supervisor is tearing the connection down.
    Closing,
    /// The connection is gone. The session itself is still valid.
    Closed,
}

// ---------------------------------------------------------------------------
// CloseSignals
// ---------------------------------------------------------------------------

/// One-shot signals shared by a supervisor and its reader and writer.
///
/// Each is a [`CancellationToken`], so firing is idempotent: the first
/// `cancel()` wins and later ones are no-ops.
#[derive(Debug, Clone, Default)]
pub struct CloseSignals {
    /// The client closed the connection or sent `close`.
    pub closed_by_client: CancellationToken,
    /// The reader's error budget is blown.
    pub inbound_limit: CancellationToken,
    /// The writer's error budget is blown.
    pub outbound_limit: CancellationToken,
    /// Tells the reader to exit.
    pub stop_listen: CancellationToken,
    /// Tells the writer to exit.
    pub stop_send: CancellationToken,
    /// Another connection attached to the same session.
    pub replaced: CancellationToken,
}

impl CloseSignals {
    /// Fires both stop signals.
    pub fn stop(&self) {
        self.stop_listen.cancel();
        self.stop_send.cancel();
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A logged-in client.
#[derive(Debug, Clone)]
pub struct Session {
    /// Registry key.
    pub id: SessionId,

    /// The user captured at login.
    pub user: UserView,

    /// Tokens issued at login or by the latest refresh.
    pub tokens: TokenPair,

    /// Connection lifecycle.
    pub state: ConnectionState,

    touched_at: Option<DateTime<Utc>>,
    link: Link,
}

/// Communication primitives for the attached connection.
#[derive(Debug, Clone)]
struct Link {
    outbound: Option<mpsc::Sender<String>>,
    guard: Arc<Mutex<()>>,
    signals: CloseSignals,
    revoked: CancellationToken,
}

impl Session {
    /// Creates an unattached session.
    pub fn new(id: SessionId, user: UserView, tokens: TokenPair) -> Self {
        Self {
            id,
            user,
            tokens,
            state: ConnectionState::Unattached,
            touched_at: None,
            link: Link {
                outbound: None,
                guard: Arc::new(Mutex::new(())),
                signals: CloseSignals::default(),
                revoked: CancellationToken::new(),
            },
        }
    }

    /// Returns `true` if a connection is attached and accepting frames.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Active && self.link.outbound.is_some()
    }

    /// Attaches a connection's outbound queue and returns fresh signals for
    /// its supervisor.
    ///
    /// A supervisor already attached to this session is told to leave via
    /// its [`CloseSignals::replaced`].
    pub fn attach(&mut self, outbound: mpsc::Sender<String>) -> CloseSignals {
        self.link.signals.replaced.cancel();
        self.link.signals = CloseSignals::default();
        self.link.outbound = Some(outbound);
        self.state = ConnectionState::Active;
        self.link.signals.clone()
    }

    /// Drops the outbound queue and marks the connection closed.
    pub fn detach(&mut self) {
        self.link.outbound = None;
        self.state = ConnectionState::Closed;
    }

    /// Signals of the currently attached connection.
    pub fn signals(&self) -> &CloseSignals {
        &self.link.signals
    }

    /// Fired when the session is removed from the registry.
    pub fn revoked(&self) -> CancellationToken {
        self.link.revoked.clone()
    }

    /// Returns `true` once the session has been removed from the registry.
    pub fn is_revoked(&self) -> bool {
        self.link.revoked.is_cancelled()
    }

    /// When the registry last stored this session.
    pub fn touched_at(&self) -> Option<DateTime<Utc>> {
        self.touched_at
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.touched_at = Some(at);
    }

    pub(crate) fn revoke(&self) {
        self.link.revoked.cancel();
    }

    pub(crate) fn outbound(&self) -> Option<(Arc<Mutex<()>>, mpsc::Sender<String>)> {
        self.link
            .outbound
            .clone()
            .map(|tx| (Arc::clone(&self.link.guard), tx))
    }
}
