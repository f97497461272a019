//! Error types for the credential layer.

use crate::Role;

/// The message every authentication failure renders to a client.
///
/// Which factor failed (email, password, signature, expiry) is logged,
/// never returned.
pub const AUTH_FAILED_MESSAGE: &str = "authentication failed; please log in";

/// Errors that can occur while issuing or checking credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Email or password did not match an account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// No token was found in the header, cookie, or query string.
    #[error("no access token on request")]
    MissingToken,

    /// The token's signature does not verify with the server secret.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token was signed with an algorithm the server does not accept.
    #[error("unexpected signing algorithm: {0}")]
    UnexpectedAlgorithm(String),

    /// The token could not be parsed, or its claims have the wrong shape.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The token's `exp` is in the past.
    #[error("token is expired")]
    TokenExpired,

    /// Signing a new token failed.
    #[error("token signing failed: {0}")]
    SigningFailed(String),

    /// The caller's role is below the tier an operation requires.
    #[error("{}", .0.denial_message())]
    Forbidden(Role),

    /// Hashing or verifying a password failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl AuthError {
    /// Returns the text that is safe to show the caller.
    ///
    /// Authentication failures collapse to one generic message;
    /// authorization failures name the tier that was required.
    pub fn public_message(&self) -> String {
        match self {
            Self::Forbidden(role) => role.denial_message().to_string(),
            Self::InvalidCredentials => self.to_string(),
            _ => AUTH_FAILED_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_message_hides_token_details() {
        for err in [
            AuthError::MissingToken,
            AuthError::InvalidSignature,
            AuthError::TokenExpired,
            AuthError::Malformed("bad base64".into()),
            AuthError::UnexpectedAlgorithm("HS512".into()),
        ] {
            assert_eq!(err.public_message(), AUTH_FAILED_MESSAGE);
        }
    }

    #[test]
    fn test_public_message_credentials_is_generic() {
        assert_eq!(
            AuthError::InvalidCredentials.public_message(),
            "invalid email or password"
        );
    }

    #[test]
    fn test_public_message_forbidden_names_tier() {
        assert_eq!(
            AuthError::Forbidden(Role::Admin).public_message(),
            "you must be an admin to perform this action"
        );
    }
}
