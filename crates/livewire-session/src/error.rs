//! Error types for the session layer.

use crate::SessionId;

/// Errors that can occur while reading, writing, or messaging sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A session was written with the nil id.
    #[error("invalid session id")]
    InvalidSessionId,

    /// No session with this id is in the registry. Clients are told to
    /// log in again.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// [`send_message`](crate::SessionRegistry::send_message) was called
    /// with an empty message type.
    #[error("message type is required")]
    MissingMessageType,

    /// The outbound envelope could not be encoded.
    #[error("failed to serialize message: {0}")]
    SerializationFailed(#[from] livewire_protocol::ProtocolError),

    /// The reset code is unknown, already used, or expired.
    #[error("invalid or expired reset code")]
    InvalidCode,
}
