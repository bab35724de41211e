//! Core data types for bulk NS resolution.
//!
//! This module defines the outcome of a single query, the per-domain result
//! record handed to output sinks, and the run configuration.

use crate::error::BulkDnsError;
use crate::pool::ResolverEndpoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default location of the system resolver configuration.
pub const DEFAULT_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Default exchange timeout for a single query.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Classified result of one NS query.
///
/// Every dispatched domain ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Response code 0. Nameservers are in the order the resolver returned
    /// them; the list may be empty.
    Success { nameservers: Vec<String> },

    /// Timeout, connection failure or an unusable response
    TransportError { cause: String },

    /// The exchange finished without producing a message
    EmptyResponse,

    /// Any response code other than success
    ProtocolError { code: u16, label: String },

    /// The query task panicked; the panic message is kept as the cause
    TaskFailed { cause: String },
}

impl QueryOutcome {
    /// Build a success outcome.
    pub fn success(nameservers: Vec<String>) -> Self {
        Self::Success { nameservers }
    }

    /// Build a transport error outcome.
    pub fn transport<C: Into<String>>(cause: C) -> Self {
        Self::TransportError {
            cause: cause.into(),
        }
    }

    /// Build a protocol error outcome, looking up the label for `code`.
    pub fn protocol(code: u16) -> Self {
        Self::ProtocolError {
            code,
            label: crate::rcode::rcode_label(code).to_string(),
        }
    }

    /// Returns `true` for [`QueryOutcome::Success`], empty or not.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Nameservers of a successful outcome.
    pub fn nameservers(&self) -> Option<&[String]> {
        match self {
            Self::Success { nameservers } => Some(nameservers),
            _ => None,
        }
    }

    /// Short machine-friendly name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::TransportError { .. } => "transport_error",
            Self::EmptyResponse => "empty_response",
            Self::ProtocolError { .. } => "protocol_error",
            Self::TaskFailed { .. } => "task_failed",
        }
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { nameservers } if nameservers.is_empty() => {
                write!(f, "No NS records")
            }
            Self::Success { nameservers } => write!(f, "{}", nameservers.join(" ")),
            Self::TransportError { cause } => write!(f, "Error resolving: {}", cause),
            Self::EmptyResponse => write!(f, "No answer"),
            Self::ProtocolError { code, label } => write!(f, "{} (Rcode {})", label, code),
            Self::TaskFailed { cause } => write!(f, "Query failed: {}", cause),
        }
    }
}

/// Result of resolving one domain, as delivered to output sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// 0-based position of the domain in the input
    pub index: usize,

    /// The domain as read from the input
    pub domain: String,

    /// Resolver the query was sent to
    pub resolver: ResolverEndpoint,

    /// Classified outcome
    pub outcome: QueryOutcome,

    /// Wall time of the exchange
    pub elapsed: Duration,
}

/// Transport used to talk to resolvers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// One datagram per query
    #[default]
    Udp,

    /// Length-prefixed messages over a fresh TCP connection
    Tcp,
}

impl FromStr for Protocol {
    type Err = BulkDnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp),
            other => Err(BulkDnsError::config(format!(
                "Unknown protocol '{}', use 'udp' or 'tcp'",
                other
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => write!(f, "udp"),
            Protocol::Tcp => write!(f, "tcp"),
        }
    }
}

/// Configuration for a bulk resolution run.
///
/// Built once (defaults, then files, environment and CLI flags layered on
/// top) and handed to the dispatcher by value.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    /// Maximum number of in-flight queries. Always at least 1.
    pub concurrency: usize,

    /// Timeout applied to each exchange
    pub timeout: Duration,

    /// Transport used for every query
    pub protocol: Protocol,

    /// Explicit resolvers; when set, `resolv_conf` is not consulted
    pub resolvers: Option<Vec<String>>,

    /// Resolver configuration file used for discovery
    pub resolv_conf: PathBuf,
}

impl Default for ResolveConfig {
    /// Sequential, UDP, 5 second timeout, resolvers from `/etc/resolv.conf`.
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout: DEFAULT_TIMEOUT,
            protocol: Protocol::Udp,
            resolvers: None,
            resolv_conf: PathBuf::from(DEFAULT_RESOLV_CONF),
        }
    }
}

impl ResolveConfig {
    /// Set the concurrency limit. Zero is raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the per-query timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the transport.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Use an explicit resolver list instead of discovery.
    pub fn with_resolvers(mut self, resolvers: Vec<String>) -> Self {
        self.resolvers = Some(resolvers);
        self
    }

    /// Discover resolvers from a different file.
    pub fn with_resolv_conf<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.resolv_conf = path.into();
        self
    }
}
