//! Credentials for Livewire.
//!
//! This crate covers everything about proving who a caller is:
//!
//! 1. **Tokens** — minting and validating signed access/refresh tokens
//!    ([`TokenIssuer`], [`Claims`])
//! 2. **Request authentication** — finding a token on an incoming request
//!    and turning it into an [`AuthContext`] ([`CredentialSource`])
//! 3. **Roles** — the `super ⊇ admin ⊇ operator ⊇ viewer` tiers ([`Role`])
//! 4. **Passwords** — bcrypt hashing off the async runtime
//!    ([`hash_password`], [`verify_password`])
//!
//! Nothing here touches the session registry. Whether a refresh token is
//! still *usable* depends on its session existing, which the session layer
//! decides.

mod credentials;
mod error;
mod password;
mod role;
mod token;

pub use credentials::{CredentialSource, RequestCredentials};
pub use error::{AuthError, AUTH_FAILED_MESSAGE};
pub use password::{hash_password, verify_password, PasswordConfig};
pub use role::Role;
pub use token::{AuthContext, Claims, TokenConfig, TokenIssuer};
