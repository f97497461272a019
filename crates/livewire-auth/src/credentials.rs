//! Where a token can be found on an incoming request.

use crate::TokenConfig;

/// Read access to the parts of a request that may carry a token.
///
/// Implemented by [`RequestCredentials`]; a server can implement it
/// directly on its own request type instead.
pub trait CredentialSource {
    /// The raw `Authorization` header value.
    fn authorization(&self) -> Option<&str>;

    /// The value of the cookie called `name`.
    fn cookie(&self, name: &str) -> Option<&str>;

    /// The value of the query parameter called `name`.
    fn query(&self, name: &str) -> Option<&str>;
}

/// An owned snapshot of a request's credential-bearing parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    authorization: Option<String>,
    cookies: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl RequestCredentials {
    /// Builds credentials from the raw `Authorization` header, the raw
    /// `Cookie` header, and the raw query string (without the `?`).
    pub fn from_parts(
        authorization: Option<&str>,
        cookie_header: Option<&str>,
        query: Option<&str>,
    ) -> Self {
        Self {
            authorization: authorization.map(str::to_string),
            cookies: cookie_header
                .map(|raw| split_pairs(raw, ';'))
                .unwrap_or_default(),
            query: query.map(|raw| split_pairs(raw, '&')).unwrap_or_default(),
        }
    }
}

impl CredentialSource for RequestCredentials {
    fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        lookup(&self.cookies, name)
    }

    fn query(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name)
    }
}

fn split_pairs(raw: &str, separator: char) -> Vec<(String, String)> {
    raw.split(separator)
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Picks the token a request carries: header, then cookie, then query.
/// Empty values are skipped.
pub(crate) fn extract_token<'a>(
    source: &'a impl CredentialSource,
    config: &TokenConfig,
) -> Option<&'a str> {
    let from_header = source
        .authorization()
        .and_then(|value| value.strip_prefix(config.auth_scheme.as_str()))
        .map(str::trim);

    from_header
        .filter(|t| !t.is_empty())
        .or_else(|| source.cookie(&config.cookie_name).filter(|t| !t.is_empty()))
        .or_else(|| source.query(&config.query_name).filter(|t| !t.is_empty()))
}
