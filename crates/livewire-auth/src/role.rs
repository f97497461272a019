//! Role tiers.
//!
//! ```text
//! super ⊇ admin ⊇ operator ⊇ viewer
//! ```
//!
//! A check for a tier accepts that tier and every tier above it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AuthError;

/// A user's role. Ordered from least to most privileged, so `>=` is the
/// tier check.
///
/// New accounts start as [`Role::Viewer`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Viewer,
    Operator,
    Admin,
    Super,
}

impl Role {
    /// Returns the wire/storage name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Operator => "operator",
            Self::Admin => "admin",
            Self::Super => "super",
        }
    }

    /// Returns `true` if this role satisfies a check for `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }

    /// Fails with [`AuthError::Forbidden`] unless this role satisfies
    /// `required`.
    pub fn require(self, required: Role) -> Result<(), AuthError> {
        if self.satisfies(required) {
            Ok(())
        } else {
            Err(AuthError::Forbidden(required))
        }
    }

    /// The message shown when a check for this tier fails.
    pub fn denial_message(self) -> &'static str {
        match self {
            Self::Super => "you must be a super admin to perform this action",
            Self::Admin => "you must be an admin to perform this action",
            Self::Operator => "you must be an operator to perform this action",
            Self::Viewer => "you must be a viewer to perform this action",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Self::Viewer),
            "operator" => Ok(Self::Operator),
            "admin" => Ok(Self::Admin),
            "super" => Ok(Self::Super),
            other => Err(AuthError::Malformed(format!("unknown role {other:?}"))),
        }
    }
}
