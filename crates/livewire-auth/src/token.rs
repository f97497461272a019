//! Signed access and refresh tokens.
//!
//! Tokens are HS256 JWTs signed with one server secret. They are
//! self-contained: checking one needs the secret and the clock, not the
//! session registry.
//!
//! | claim | access | refresh |
//! |-------|--------|---------|
//! | `sub` | user id | user id |
//! | `rol` | role    | absent  |
//! | `exp`/`iat`/`nbf` | unix seconds | unix seconds |

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::credentials::extract_token;
use crate::{AuthError, CredentialSource, Role};

// ---------------------------------------------------------------------------
// TokenConfig
// ---------------------------------------------------------------------------

/// Token lifetimes and where to look for a token on a request.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC secret. Must be non-empty in production.
    pub secret: String,

    /// Lifetime of an access token. Default: 15 minutes.
    pub access_ttl: Duration,

    /// Lifetime of a refresh token. Default: 24 hours.
    pub refresh_ttl: Duration,

    /// Prefix of the `Authorization` header value, including the
    /// separating space. Default: `"Bearer "`.
    pub auth_scheme: String,

    /// Cookie checked when the header is absent. Default: `token`.
    pub cookie_name: String,

    /// Query parameter checked last. Default: `access_token`.
    pub query_name: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(24 * 60 * 60),
            auth_scheme: "Bearer ".to_string(),
            cookie_name: "token".to_string(),
            query_name: "access_token".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// The claims carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: i64,

    /// Role. Present on access tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rol: Option<Role>,

    /// Expiry, unix seconds.
    pub exp: i64,

    /// Issued at, unix seconds.
    pub iat: i64,

    /// Not valid before, unix seconds.
    pub nbf: i64,
}

impl Claims {
    /// Builds claims issued at `now` that expire `ttl` later.
    pub fn new(sub: i64, rol: Option<Role>, now: i64, ttl: Duration) -> Self {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            sub,
            rol,
            exp: now.saturating_add(ttl),
            iat: now,
            nbf: now,
        }
    }

    /// Returns `true` if `exp` lies before `now` (unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }
}

// ---------------------------------------------------------------------------
// AuthContext
// ---------------------------------------------------------------------------

/// Who made a request, as resolved from its access token.
///
/// Handlers downstream of [`TokenIssuer::authenticate`] receive this and
/// run their role checks against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub subject_id: i64,
    pub role: Role,
}

impl AuthContext {
    /// Fails with [`AuthError::Forbidden`] unless the caller's role
    /// satisfies `required`.
    pub fn require(&self, required: Role) -> Result<(), AuthError> {
        self.role.require(required)
    }
}

// ---------------------------------------------------------------------------
// TokenIssuer
// ---------------------------------------------------------------------------

/// Mints and validates tokens. Stateless apart from its keys.
pub struct TokenIssuer {
    config: TokenConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Creates an issuer from the given configuration.
    pub fn new(config: TokenConfig) -> Self {
        let encoding = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());

        // Expiry is the caller's decision, see `claims_from_token`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            config,
            encoding,
            decoding,
            validation,
        }
    }

    /// Returns the configuration this issuer was built with.
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Mints an access token for `subject_id` with `role`.
    ///
    /// # Errors
    /// [`AuthError::SigningFailed`] if signing fails.
    pub fn create_access_token(
        &self,
        subject_id: i64,
        role: Role,
    ) -> Result<String, AuthError> {
        let claims =
            Claims::new(subject_id, Some(role), now(), self.config.access_ttl);
        self.sign(&claims)
    }

    /// Mints a refresh token for `subject_id`.
    ///
    /// # Errors
    /// [`AuthError::SigningFailed`] if signing fails.
    pub fn create_refresh_token(
        &self,
        subject_id: i64,
    ) -> Result<String, AuthError> {
        let claims = Claims::new(subject_id, None, now(), self.config.refresh_ttl);
        self.sign(&claims)
    }

    /// Signs arbitrary claims with the server secret.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))
    }

    /// Verifies a token's signature and algorithm and returns its claims.
    ///
    /// Expiry is *not* checked here; compare [`Claims::exp`] with the
    /// current time.
    ///
    /// # Errors
    /// - [`AuthError::InvalidSignature`]: wrong secret or tampered payload
    /// - [`AuthError::UnexpectedAlgorithm`]: not HS256
    /// - [`AuthError::Malformed`]: anything structurally wrong
    pub fn claims_from_token(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => {
                    let alg = jsonwebtoken::decode_header(token)
                        .map(|h| format!("{:?}", h.alg))
                        .unwrap_or_else(|_| "unknown".to_string());
                    AuthError::UnexpectedAlgorithm(alg)
                }
                _ => AuthError::Malformed(e.to_string()),
            })
    }

    /// Authenticates a request from its access token.
    ///
    /// The token is taken from, in order: the `Authorization` header with
    /// the configured scheme, the configured cookie, the configured query
    /// parameter. The first one present is used.
    ///
    /// # Errors
    /// [`AuthError::MissingToken`] if no source carries a token, or
    /// [`AuthError::TokenExpired`], or any error from
    /// [`claims_from_token`](Self::claims_from_token). A token without a
    /// role (a refresh token) is [`AuthError::Malformed`].
    pub fn authenticate(
        &self,
        source: &impl CredentialSource,
    ) -> Result<AuthContext, AuthError> {
        let token =
            extract_token(source, &self.config).ok_or(AuthError::MissingToken)?;

        let claims = self.claims_from_token(token).inspect_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
        })?;
        if claims.is_expired_at(now()) {
            tracing::debug!(sub = claims.sub, exp = claims.exp, "access token expired");
            return Err(AuthError::TokenExpired);
        }

        let role = claims.rol.ok_or_else(|| {
            AuthError::Malformed("access token carries no role".into())
        })?;

        Ok(AuthContext {
            subject_id: claims.sub,
            role,
        })
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
