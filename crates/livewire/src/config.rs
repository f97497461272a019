//! Server configuration.
//!
//! Every section has a `Default`; [`ServerConfig::from_env`] overlays
//! `LIVEWIRE_*` environment variables on top of it.
//!
//! | variable | default |
//! |----------|---------|
//! | `LIVEWIRE_BIND` | `127.0.0.1:8080` |
//! | `LIVEWIRE_JWT_SECRET` | required |
//! | `LIVEWIRE_ACCESS_TTL_SECS` | 900 |
//! | `LIVEWIRE_REFRESH_TTL_SECS` | 86400 |
//! | `LIVEWIRE_HEARTBEAT_SECS` | 30 |
//! | `LIVEWIRE_RESET_TTL_SECS` | 120 |
//! | `LIVEWIRE_BCRYPT_COST` | bcrypt default |

use std::str::FromStr;
use std::time::Duration;

use livewire_auth::{PasswordConfig, TokenConfig};
use livewire_session::ResetCodeRegistry;
use rand::Rng;

use crate::{ConfigError, SupervisorConfig};

/// Password-reset mail settings.
#[derive(Debug, Clone)]
pub struct ResetConfig {
    /// Lifetime of a reset code. Default: 2 minutes.
    pub ttl: Duration,
    /// Template handed to the mailer.
    pub template: String,
    /// Mail subject.
    pub subject: String,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            ttl: ResetCodeRegistry::DEFAULT_TTL,
            template: "templates/confirm_pw_reset.html".to_string(),
            subject: "Confirm Password Reset".to_string(),
        }
    }
}

/// Everything a [`LivewireServer`](crate::LivewireServer) needs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tokens: TokenConfig,
    pub supervisor: SupervisorConfig,
    pub reset: ResetConfig,
    pub passwords: PasswordConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tokens: TokenConfig::default(),
            supervisor: SupervisorConfig::default(),
            reset: ResetConfig::default(),
            passwords: PasswordConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    /// [`ConfigError::Missing`] if `LIVEWIRE_JWT_SECRET` is unset or empty,
    /// [`ConfigError::Invalid`] if a numeric variable does not parse or a
    /// duration is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("LIVEWIRE_BIND") {
            config.bind_addr = bind;
        }

        config.tokens.secret = lookup("LIVEWIRE_JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("LIVEWIRE_JWT_SECRET"))?;

        if let Some(secs) = parse(&lookup, "LIVEWIRE_ACCESS_TTL_SECS")? {
            config.tokens.access_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "LIVEWIRE_REFRESH_TTL_SECS")? {
            config.tokens.refresh_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "LIVEWIRE_HEARTBEAT_SECS")? {
            config.supervisor.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&lookup, "LIVEWIRE_RESET_TTL_SECS")? {
            config.reset.ttl = Duration::from_secs(secs);
        }
        if let Some(cost) = parse(&lookup, "LIVEWIRE_BCRYPT_COST")? {
            config.passwords.cost = cost;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the server cannot run with.
    ///
    /// # Errors
    /// [`ConfigError::Missing`] without a signing secret,
    /// [`ConfigError::Invalid`] for a zero duration or an out-of-range
    /// bcrypt cost. The variable named is the one that would set it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.secret.is_empty() {
            return Err(ConfigError::Missing("LIVEWIRE_JWT_SECRET"));
        }
        let durations = [
            ("LIVEWIRE_ACCESS_TTL_SECS", self.tokens.access_ttl),
            ("LIVEWIRE_REFRESH_TTL_SECS", self.tokens.refresh_ttl),
            ("LIVEWIRE_HEARTBEAT_SECS", self.supervisor.heartbeat_interval),
            ("LIVEWIRE_RESET_TTL_SECS", self.reset.ttl),
        ];
        for (var, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    var,
                    value: value.as_secs().to_string(),
                });
            }
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.passwords.cost) {
            return Err(ConfigError::Invalid {
                var: "LIVEWIRE_BCRYPT_COST",
                value: self.passwords.cost.to_string(),
            });
        }
        Ok(())
    }

    /// Defaults with a random signing secret. Tokens do not survive a
    /// restart; meant for demos and tests.
    pub fn development() -> Self {
        let mut config = Self::default();
        config.tokens.secret = random_secret();
        config
    }
}

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

/// 32 random bytes as lowercase hex.
fn random_secret() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ServerConfig::default();

        assert_eq!(config.tokens.access_ttl, Duration::from_secs(15 * 60));
        assert_eq!(config.tokens.refresh_ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.tokens.auth_scheme, "Bearer ");
        assert_eq!(config.supervisor.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.supervisor.error_ceiling, 10);
        assert_eq!(config.reset.ttl, Duration::from_secs(120));
        assert_eq!(config.reset.subject, "Confirm Password Reset");
    }

    #[test]
    fn test_from_lookup_missing_secret_is_fatal() {
        let result = ServerConfig::from_lookup(lookup(&[]));

        assert!(matches!(
            result,
            Err(ConfigError::Missing("LIVEWIRE_JWT_SECRET"))
        ));
    }

    #[test]
    fn test_from_lookup_blank_secret_is_fatal() {
        let result = ServerConfig::from_lookup(lookup(&[("LIVEWIRE_JWT_SECRET", "  ")]));

        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("LIVEWIRE_JWT_SECRET", "s3cret"),
            ("LIVEWIRE_BIND", "0.0.0.0:9000"),
            ("LIVEWIRE_ACCESS_TTL_SECS", "60"),
            ("LIVEWIRE_HEARTBEAT_SECS", "5"),
            ("LIVEWIRE_BCRYPT_COST", "4"),
        ]))
        .unwrap();

        assert_eq!(config.tokens.secret, "s3cret");
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.tokens.access_ttl, Duration::from_secs(60));
        assert_eq!(config.supervisor.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.passwords.cost, 4);
        assert_eq!(config.tokens.refresh_ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn test_from_lookup_unparseable_number_is_invalid() {
        let result = ServerConfig::from_lookup(lookup(&[
            ("LIVEWIRE_JWT_SECRET", "s3cret"),
            ("LIVEWIRE_RESET_TTL_SECS", "two minutes"),
        ]));

        assert!(matches!(
            result,
            Err(ConfigError::Invalid { var: "LIVEWIRE_RESET_TTL_SECS", .. })
        ));
    }

    #[test]
    fn test_from_lookup_zero_heartbeat_is_invalid() {
        let result = ServerConfig::from_lookup(lookup(&[
            ("LIVEWIRE_JWT_SECRET", "s3cret"),
            ("LIVEWIRE_HEARTBEAT_SECS", "0"),
        ]));

        assert!(matches!(
            result,
            Err(ConfigError::Invalid { var: "LIVEWIRE_HEARTBEAT_SECS", .. })
        ));
    }

    #[test]
    fn test_from_lookup_zero_ttls_are_invalid() {
        for var in [
            "LIVEWIRE_ACCESS_TTL_SECS",
            "LIVEWIRE_REFRESH_TTL_SECS",
            "LIVEWIRE_RESET_TTL_SECS",
        ] {
            let result =
                ServerConfig::from_lookup(lookup(&[("LIVEWIRE_JWT_SECRET", "s3cret"), (var, "0")]));

            assert!(
                matches!(result, Err(ConfigError::Invalid { var: v, .. }) if v == var),
                "{var} = 0 must be rejected"
            );
        }
    }

    #[test]
    fn test_from_lookup_bcrypt_cost_out_of_range_is_invalid() {
        let result = ServerConfig::from_lookup(lookup(&[
            ("LIVEWIRE_JWT_SECRET", "s3cret"),
            ("LIVEWIRE_BCRYPT_COST", "2"),
        ]));

        assert!(matches!(
            result,
            Err(ConfigError::Invalid { var: "LIVEWIRE_BCRYPT_COST", .. })
        ));
    }

    #[test]
    fn test_validate_development_config_is_ok() {
        assert!(ServerConfig::development().validate().is_ok());
    }

    #[test]
    fn test_development_secret_is_random() {
        let a = ServerConfig::development();
        let b = ServerConfig::development();

        assert_eq!(a.tokens.secret.len(), 64);
        assert_ne!(a.tokens.secret, b.tokens.secret);
    }
}
