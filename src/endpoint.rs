//! Declared endpoints.

use std::fmt;
use std::net::Ipv4Addr;

/// A declared endpoint: a domain name, an IPv4 literal, or an IPv4 literal
/// with a trailing `:port`.
///
/// The string is kept verbatim; it is the key in the state store and the
/// hostname in the override table. The port only matters in that it keeps
/// `10.0.0.5:8443` distinct from `10.0.0.5`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(String);

impl Endpoint {
    /// Wraps a declared endpoint string, trimming surrounding whitespace.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.len() == raw.len() {
            Self(raw)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The endpoint as declared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The endpoint with a trailing `:port` removed.
    ///
    /// Only an all-digit suffix counts as a port.
    #[must_use]
    pub fn host(&self) -> &str {
        match self.0.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                host
            }
            _ => &self.0,
        }
    }

    /// Returns the address if the host part is an IPv4 literal.
    #[must_use]
    pub fn literal(&self) -> Option<Ipv4Addr> {
        parse_ipv4(self.host())
    }

    /// Returns `true` for IPv4 literals, with or without port.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.literal().is_some()
    }

    /// Returns `true` if a `:port` suffix is present.
    #[must_use]
    pub fn has_port(&self) -> bool {
        self.host().len() != self.0.len()
    }

    /// Returns `true` if the endpoint can appear as a name in a hosts file:
    /// not an IPv4 literal and no port.
    #[must_use]
    pub fn is_hostname(&self) -> bool {
        !self.has_port() && !self.is_literal()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Parses a dotted-quad IPv4 address.
///
/// Stricter than matching the shape: each octet must fit in a byte.
#[must_use]
pub fn parse_ipv4(s: &str) -> Option<Ipv4Addr> {
    s.trim().parse().ok()
}
