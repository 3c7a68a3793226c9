//! Transport endpoint value type.
//!
//! An [`Endpoint`] is the `host:port` pair a peer is reachable at. NAT
//! rewriting means one peer is typically known by several endpoints at once
//! (the datagram source, a self-reported LAN address, a self-reported WAN
//! address), so this type stays a plain value: equality is field-wise and
//! any reconciliation policy belongs to the caller.
//!
//! The host is kept as an opaque string rather than a parsed IP address.
//! Peers report whatever they believe their address to be, which may be a
//! hostname long before it ever resolves, and the overlay compares
//! endpoints without caring.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building or parsing an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The host part is empty.
    #[error("endpoint host is empty")]
    EmptyHost,
    /// No `:` separator between host and port.
    #[error("no port separator in `{0}`")]
    MissingPort(String),
    /// The port part does not fit a u16.
    #[error("invalid port in `{0}`")]
    InvalidPort(String),
}

/// A `host:port` pair.
///
/// The host is guaranteed non-empty; the port range is enforced by the
/// type. Serialized as a `(host, port)` tuple, the shape endpoints travel
/// in on the wire, with the non-empty check applied on the way back in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(String, u16)", into = "(String, u16)")]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Creates an endpoint, rejecting an empty host.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, EndpointError> {
        let host = host.into();
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        Ok(Self { host, port })
    }

    /// Host part, exactly as supplied.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bracket hosts that contain `:` (IPv6 literals) so the rendered
        // form parses back to the same endpoint.
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::MissingPort(s.to_owned()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointError::InvalidPort(s.to_owned()))?;
        let host = host
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .unwrap_or(host);
        Self::new(host, port)
    }
}

impl TryFrom<(String, u16)> for Endpoint {
    type Error = EndpointError;

    fn try_from((host, port): (String, u16)) -> Result<Self, Self::Error> {
        Self::new(host, port)
    }
}

impl From<Endpoint> for (String, u16) {
    fn from(endpoint: Endpoint) -> Self {
        (endpoint.host, endpoint.port)
    }
}
