//! Error handling for bulk resolution.
//!
//! This module defines the process-level error type. Per-domain failures
//! (timeouts, refused queries, NXDOMAIN and friends) are not errors at this
//! level: they are recorded as a [`QueryOutcome`](crate::QueryOutcome) and
//! the batch carries on.

use std::fmt;

/// Exit code used when no resolver could be found.
pub const EXIT_NO_RESOLVERS: i32 = 5;

/// Exit code used for every other fatal error (bad usage, unreadable input).
pub const EXIT_FAILURE: i32 = 1;

/// Main error type for bulk resolution.
#[derive(Debug, Clone)]
pub enum BulkDnsError {
    /// Invalid settings (bad concurrency, unparsable timeout, malformed TOML)
    ConfigError {
        message: String,
    },

    /// The resolver pool would be empty
    NoResolvers,

    /// A resolver address that cannot be normalized to host:port
    InvalidResolver {
        address: String,
        reason: String,
    },

    /// The resolver configuration file could not be read
    ResolverDiscovery {
        path: String,
        message: String,
    },

    /// File I/O errors when opening the domain list
    FileError {
        path: String,
        message: String,
    },

    /// Read error in the middle of the domain list
    InputError {
        line: usize,
        message: String,
    },

    /// Domain name that cannot be encoded into a query
    InvalidDomain {
        domain: String,
        reason: String,
    },

    /// Network-related errors (bind, connect, send, receive)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// Timeout errors when an exchange takes too long
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    /// Undecodable or mismatched DNS messages
    ParseError {
        message: String,
    },

    /// Generic internal errors that don't fit other categories
    Internal {
        message: String,
    },
}

impl BulkDnsError {
    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new invalid resolver error.
    pub fn invalid_resolver<A: Into<String>, R: Into<String>>(address: A, reason: R) -> Self {
        Self::InvalidResolver {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a new resolver discovery error.
    pub fn discovery<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::ResolverDiscovery {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new mid-stream input error.
    pub fn input<M: Into<String>>(line: usize, message: M) -> Self {
        Self::InputError {
            line,
            message: message.into(),
        }
    }

    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new parse error.
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Process exit code for this error when it is fatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoResolvers => EXIT_NO_RESOLVERS,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for BulkDnsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::NoResolvers => write!(f, "No resolvers found."),
            Self::InvalidResolver { address, reason } => {
                write!(f, "Invalid resolver '{}': {}", address, reason)
            }
            Self::ResolverDiscovery { path, message } => {
                write!(
                    f,
                    "Cannot initialize the local resolver from '{}': {}",
                    path, message
                )
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::InputError { line, message } => {
                write!(f, "reading domain list (line {}): {}", line, message)
            }
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "{}: {}", message, source)
                } else {
                    write!(f, "{}", message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "{} timed out after {:?}", operation, duration)
            }
            Self::ParseError { message } => {
                write!(f, "Parse error: {}", message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for BulkDnsError {}

// Implement From conversions for common error types
impl From<hickory_proto::error::ProtoError> for BulkDnsError {
    fn from(err: hickory_proto::error::ProtoError) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for BulkDnsError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML configuration: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        assert_eq!(BulkDnsError::NoResolvers.exit_code(), 5);
        assert_eq!(BulkDnsError::file_error("x.txt", "missing").exit_code(), 1);
        assert_eq!(BulkDnsError::config("bad").exit_code(), 1);
        assert_eq!(BulkDnsError::input(3, "broken pipe").exit_code(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(BulkDnsError::NoResolvers.to_string(), "No resolvers found.");
        assert_eq!(
            BulkDnsError::timeout("query to 1.1.1.1:53", Duration::from_secs(5)).to_string(),
            "query to 1.1.1.1:53 timed out after 5s"
        );
        assert_eq!(
            BulkDnsError::network_with_source("connect failed", "refused").to_string(),
            "connect failed: refused"
        );
    }

    #[test]
    fn test_from_toml_error() {
        let err: BulkDnsError = toml::from_str::<toml::Value>("[defaults").unwrap_err().into();
        assert!(matches!(err, BulkDnsError::ConfigError { .. }));
        assert!(err.to_string().contains("Failed to parse TOML"));
    }
}
