use std::io;

/// Errors raised while accepting or driving a connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound, or accepting a socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// The client never completed the upgrade.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// A frame was written after the peer went away.
    #[error("connection {0} is closed")]
    Closed(crate::ConnectionId),

    /// Writing a frame to the socket failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    /// Reading the next frame from the socket failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),
}
