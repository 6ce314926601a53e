//! Subnet parsing and prefix matching.

use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, Result};

/// A CIDR-style address range (network + prefix length).
///
/// Keeps the canonical textual form for logging/export alongside the parsed
/// network. Immutable once constructed.
///
/// # Examples
/// ```
/// use dnspipe::Subnet;
///
/// let subnet = Subnet::parse("8.8.8.0/24").unwrap();
/// assert!(subnet.contains("8.8.8.5".parse().unwrap()));
/// assert!(!subnet.contains("8.8.9.1".parse().unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    text: String,
    net: IpNet,
}

impl Subnet {
    /// Parse a CIDR string or bare address into a Subnet.
    ///
    /// A bare address implies the full prefix width (/32 or /128 depending
    /// on family). Surrounding whitespace is tolerated.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidAddress(text.to_string()));
        }

        if let Ok(net) = trimmed.parse::<IpNet>() {
            // Normalize so host bits below the prefix are zeroed
            let net = net.trunc();
            return Ok(Self {
                text: net.to_string(),
                net,
            });
        }

        // Bare address: full-width prefix
        if let Ok(addr) = trimmed.parse::<IpAddr>() {
            let net = IpNet::from(addr);
            return Ok(Self {
                text: net.to_string(),
                net,
            });
        }

        Err(Error::InvalidAddress(trimmed.to_string()))
    }

    /// True iff the address's top `prefix_len` bits equal this subnet's
    /// network bits. Addresses of a different family never match.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (&self.net, addr) {
            (IpNet::V4(net), IpAddr::V4(v4)) => net.contains(&v4),
            (IpNet::V6(net), IpAddr::V6(v6)) => net.contains(&v6),
            _ => false,
        }
    }

    /// Prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// Canonical textual form (`network/prefix`).
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
