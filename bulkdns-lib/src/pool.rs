//! Resolver pool and endpoint normalization.
//!
//! The pool is an ordered, non-empty, immutable list of `host:port`
//! endpoints. Selection is by index modulo the pool size, which is what the
//! dispatcher's round-robin cursor relies on.

use crate::error::BulkDnsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr, SocketAddrV6};

/// Port appended to endpoints that don't carry one.
pub const DNS_PORT: u16 = 53;

/// Normalized resolver address (`1.2.3.4:53`, `[2001:db8::1]:53`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolverEndpoint(String);

impl ResolverEndpoint {
    /// Normalize a raw address.
    ///
    /// Bare IPv6 addresses are bracketed and every address without a port
    /// gets [`DNS_PORT`].
    pub fn parse(raw: &str) -> Result<Self, BulkDnsError> {
        let addr = raw.trim();
        if addr.is_empty() {
            return Err(BulkDnsError::invalid_resolver(raw, "address is empty"));
        }

        if let Some(rest) = addr.strip_prefix('[') {
            let Some((host, tail)) = rest.split_once(']') else {
                return Err(BulkDnsError::invalid_resolver(raw, "unclosed '['"));
            };
            if host.is_empty() {
                return Err(BulkDnsError::invalid_resolver(raw, "empty host"));
            }
            check_zone(raw, host)?;
            return match tail {
                "" => Ok(Self(format!("[{}]:{}", host, DNS_PORT))),
                _ => match tail.strip_prefix(':') {
                    Some(port) => {
                        let port = parse_port(raw, port)?;
                        Ok(Self(format!("[{}]:{}", host, port)))
                    }
                    None => Err(BulkDnsError::invalid_resolver(
                        raw,
                        "unexpected text after ']'",
                    )),
                },
            };
        }

        // Two or more colons can only be an IPv6 literal (possibly with a zone).
        if addr.matches(':').count() > 1 {
            let ip_part = addr.split('%').next().unwrap_or(addr);
            if ip_part.parse::<Ipv6Addr>().is_err() {
                return Err(BulkDnsError::invalid_resolver(
                    raw,
                    "not a valid IPv6 address",
                ));
            }
            check_zone(raw, addr)?;
            return Ok(Self(format!("[{}]:{}", addr, DNS_PORT)));
        }

        match addr.split_once(':') {
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(BulkDnsError::invalid_resolver(raw, "empty host"));
                }
                let port = parse_port(raw, port)?;
                Ok(Self(format!("{}:{}", host, port)))
            }
            None => Ok(Self(format!("{}:{}", addr, DNS_PORT))),
        }
    }

    /// The normalized `host:port` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Socket address when the host part is an IP literal.
    ///
    /// A zone on an IPv6 literal (`[fe80::1%eth0]:53`) becomes the scope
    /// id. Hostnames return `None` and have to go through name resolution.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.0.parse().ok().or_else(|| scoped_v6(&self.0))
    }

    /// Whether the endpoint is an IPv6 address.
    pub fn is_ipv6(&self) -> bool {
        match self.socket_addr() {
            Some(addr) => matches!(addr.ip(), IpAddr::V6(_)),
            None => self.0.starts_with('['),
        }
    }
}

impl fmt::Display for ResolverEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `[ip%zone]:port` with the zone resolved to a scope id.
fn scoped_v6(endpoint: &str) -> Option<SocketAddr> {
    let (host, port) = endpoint.strip_prefix('[')?.split_once("]:")?;
    let (ip, zone) = host.split_once('%')?;
    let ip: Ipv6Addr = ip.parse().ok()?;
    let port: u16 = port.parse().ok()?;
    let scope_id = zone_index(zone)?;
    Some(SocketAddr::V6(SocketAddrV6::new(ip, port, 0, scope_id)))
}

fn check_zone(raw: &str, host: &str) -> Result<(), BulkDnsError> {
    match host.split_once('%') {
        Some((_, zone)) if zone_index(zone).is_none() => Err(BulkDnsError::invalid_resolver(
            raw,
            format!("unknown interface '{}'", zone),
        )),
        _ => Ok(()),
    }
}

/// Scope id for an IPv6 zone: either numeric or an interface name.
fn zone_index(zone: &str) -> Option<u32> {
    if zone.is_empty() {
        return None;
    }
    zone.parse().ok().or_else(|| interface_index(zone))
}

#[cfg(unix)]
fn interface_index(name: &str) -> Option<u32> {
    let name = std::ffi::CString::new(name).ok()?;
    // SAFETY: `name` is a valid NUL-terminated string that outlives the call.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    (index != 0).then_some(index)
}

#[cfg(not(unix))]
fn interface_index(_name: &str) -> Option<u32> {
    None
}

fn parse_port(raw: &str, port: &str) -> Result<u16, BulkDnsError> {
    port.parse::<u16>()
        .map_err(|_| BulkDnsError::invalid_resolver(raw, format!("invalid port '{}'", port)))
}

/// Ordered, non-empty set of resolvers.
#[derive(Debug, Clone)]
pub struct ResolverPool {
    endpoints: Vec<ResolverEndpoint>,
}

impl ResolverPool {
    /// Normalize every address and build the pool.
    ///
    /// # Errors
    ///
    /// [`BulkDnsError::NoResolvers`] if `addresses` is empty, or
    /// [`BulkDnsError::InvalidResolver`] for the first address that cannot
    /// be normalized.
    pub fn new<I, S>(addresses: I) -> Result<Self, BulkDnsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = addresses
            .into_iter()
            .map(|addr| ResolverEndpoint::parse(addr.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_endpoints(endpoints)
    }

    /// Build a pool from already normalized endpoints.
    pub fn from_endpoints(endpoints: Vec<ResolverEndpoint>) -> Result<Self, BulkDnsError> {
        if endpoints.is_empty() {
            return Err(BulkDnsError::NoResolvers);
        }
        Ok(Self { endpoints })
    }

    /// Endpoint at `index mod len`.
    pub fn select(&self, index: usize) -> &ResolverEndpoint {
        &self.endpoints[index % self.endpoints.len()]
    }

    /// Number of resolvers. Never zero.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// All endpoints in pool order.
    pub fn endpoints(&self) -> &[ResolverEndpoint] {
        &self.endpoints
    }
}
