//! Parsing of user-entered host tokens.
//!
//! A token has the shape `(user@)?host(:port)?`. Parsing is best effort: a
//! token that does not match is kept whole as the host, with every optional
//! field left empty. Only an empty token is rejected.

use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::connect::error::HostSpecError;
use crate::connect::types::HostSpec;

static HOST_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([^@:]+)@)?([^:]+)(?::([0-9]+))?$").expect("valid host token pattern")
});

impl HostSpec {
    /// Parse a host token.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let spec = HostSpec::parse("alice@web.prod.example.com:2222")?;
    /// assert_eq!(spec.user.as_deref(), Some("alice"));
    /// assert_eq!(spec.host, "web.prod.example.com");
    /// assert_eq!(spec.port, Some(2222));
    /// assert_eq!(spec.inferred_domain.as_deref(), Some("prod.example.com"));
    /// ```
    pub fn parse(raw: &str) -> Result<Self, HostSpecError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(HostSpecError::Empty);
        }

        match split_token(raw) {
            Some((user, host, port)) => Ok(Self {
                raw_input: raw.to_string(),
                user,
                inferred_domain: infer_domain(&host),
                host,
                port,
            }),
            None => {
                debug!("Host token {:?} did not parse, using it verbatim", raw);
                Ok(Self {
                    raw_input: raw.to_string(),
                    user: None,
                    host: raw.to_string(),
                    port: None,
                    inferred_domain: None,
                })
            }
        }
    }
}

/// Split a token into user, host and port. Ports that do not fit in `u16`
/// reject the whole token.
fn split_token(raw: &str) -> Option<(Option<String>, String, Option<u16>)> {
    let caps = HOST_TOKEN.captures(raw)?;
    let user = caps.get(1).map(|m| m.as_str().to_string());
    let host = caps.get(2)?.as_str().to_string();
    let port = match caps.get(3) {
        Some(m) => Some(m.as_str().parse::<u16>().ok()?),
        None => None,
    };
    Some((user, host, port))
}

/// Everything after the first label of a dotted hostname.
///
/// IP literals have no domain.
pub fn infer_domain(host: &str) -> Option<String> {
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }
    let (first, rest) = host.split_once('.')?;
    if first.is_empty() || rest.is_empty() {
        return None;
    }
    Some(rest.to_string())
}
