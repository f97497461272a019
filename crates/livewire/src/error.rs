//! Unified error type for Livewire, plus the errors of the umbrella
//! crate's own collaborators.

use livewire_auth::{AuthError, AUTH_FAILED_MESSAGE};
use livewire_protocol::ProtocolError;
use livewire_session::SessionError;
use livewire_transport::TransportError;

/// Errors reported by a [`UserStore`](crate::UserStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No user matched the lookup.
    #[error("user not found")]
    NotFound,

    /// A unique field (the email) is already taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed.
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Errors reported by a [`Mailer`](crate::Mailer).
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The message could not be handed to the mail service.
    #[error("failed to send email: {0}")]
    Delivery(String),
}

/// Errors found while loading configuration. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Errors from account flows that are not plain credential or session
/// failures.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// The session's refresh token has expired; the client must log in.
    #[error("refresh token expired")]
    RefreshExpired,

    /// Tokens for a new session could not be minted.
    #[error("failed to create session: {0}")]
    SessionCreationFailed(#[source] AuthError),

    /// The `super` role can be neither granted nor edited.
    #[error("you can't modify a super admin")]
    ProtectedRole,
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets the `?` operator convert
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LivewireError {
    /// A transport-level error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A credential or role failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A session registry or delivery failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An account flow failure.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// The user store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The mailer failed.
    #[error(transparent)]
    Mail(#[from] MailError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LivewireError {
    /// Returns the text that is safe to show the caller.
    ///
    /// Anything that means "you are not (or no longer) logged in" collapses
    /// to one message; collaborator faults are not described.
    pub fn public_message(&self) -> String {
        match self {
            Self::Auth(e) => e.public_message(),
            Self::Session(SessionError::NotFound(_) | SessionError::InvalidSessionId)
            | Self::Account(AccountError::RefreshExpired) => {
                AUTH_FAILED_MESSAGE.to_string()
            }
            Self::Session(SessionError::InvalidCode)
            | Self::Account(
                AccountError::PasswordMismatch | AccountError::ProtectedRole,
            ) => self.to_string(),
            _ => "internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use livewire_auth::Role;
    use livewire_protocol::{Codec, JsonCodec};
    use livewire_session::SessionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::HandshakeFailed("no upgrade header".into());
        let livewire_err: LivewireError = err.into();
        assert!(matches!(livewire_err, LivewireError::Transport(_)));
        assert!(livewire_err.to_string().contains("no upgrade header"));
    }

    #[test]
    fn test_from_protocol_error() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(vec![1u8], 1);
        let err = JsonCodec.encode(&map).unwrap_err();
        let livewire_err: LivewireError = err.into();
        assert!(matches!(livewire_err, LivewireError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let livewire_err: LivewireError = SessionError::InvalidCode.into();
        assert!(matches!(livewire_err, LivewireError::Session(_)));
    }

    #[test]
    fn test_from_store_and_config_errors() {
        let store: LivewireError = StoreError::NotFound.into();
        let config: LivewireError = ConfigError::Missing("LIVEWIRE_JWT_SECRET").into();
        assert!(matches!(store, LivewireError::Store(_)));
        assert!(config.to_string().contains("LIVEWIRE_JWT_SECRET"));
    }

    #[test]
    fn test_public_message_session_gone_asks_for_login() {
        let err: LivewireError = SessionError::NotFound(SessionId::generate()).into();
        assert_eq!(err.public_message(), AUTH_FAILED_MESSAGE);

        let err: LivewireError = AccountError::RefreshExpired.into();
        assert_eq!(err.public_message(), AUTH_FAILED_MESSAGE);
    }

    #[test]
    fn test_public_message_forbidden_names_tier() {
        let err: LivewireError = AuthError::Forbidden(Role::Admin).into();
        assert_eq!(
            err.public_message(),
            "you must be an admin to perform this action"
        );
    }

    #[test]
    fn test_public_message_hides_backend_detail() {
        let err: LivewireError = StoreError::Backend("db password wrong".into()).into();
        assert_eq!(err.public_message(), "internal server error");
    }
}
