//! # bulkdns Library
//!
//! Concurrent bulk resolution of DNS NS records.
//!
//! Domains are paired with resolvers round-robin, queried under a fixed
//! concurrency bound, and every query ends in exactly one classified
//! [`QueryOutcome`]. Per-domain failures are values, never errors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bulkdns_lib::{discover_resolvers, Dispatcher, ResolveConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ResolveConfig::default()
//!         .with_concurrency(16)
//!         .with_resolvers(vec!["9.9.9.9".into(), "1.1.1.1".into()]);
//!     let pool = discover_resolvers(&config)?;
//!     let dispatcher = Dispatcher::from_config(&config, pool);
//!
//!     for result in dispatcher.run(vec!["example.com".into()]).await {
//!         println!("{:<30}: {}", result.domain, result.outcome);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Round-robin resolvers**: domain `k` always goes to resolver `k mod M`
//! - **Bounded concurrency**: at most `C` queries in flight
//! - **UDP and TCP transports**: behind the [`Exchange`] trait
//! - **Streaming input**: domains are read lazily from any async reader

// Re-export main public API types and functions
pub use concurrent::{ConcurrencyLimiter, ConcurrencySlot};
pub use config::{
    env_config_from, load_env_config, parse_timeout_string, ConfigManager, DefaultsConfig,
    EnvConfig, FileConfig, ResolversConfig,
};
pub use dispatcher::{DispatchEvent, DispatchReport, Dispatcher};
pub use error::{BulkDnsError, EXIT_FAILURE, EXIT_NO_RESOLVERS};
pub use pool::{ResolverEndpoint, ResolverPool, DNS_PORT};
pub use query::{build_query, classify, QueryExecutor};
pub use rcode::rcode_label;
pub use source::{domain_lines, open_domain_file};
pub use transport::{exchange_for, Exchange, TcpExchange, UdpExchange, MAX_UDP_PAYLOAD};
pub use types::{
    Protocol, QueryOutcome, QueryResult, ResolveConfig, DEFAULT_RESOLV_CONF, DEFAULT_TIMEOUT,
};

// Public modules
pub mod resolv_conf;

// Internal modules - these are not part of the public API
mod concurrent;
mod config;
mod dispatcher;
mod error;
mod pool;
mod query;
mod rcode;
mod source;
mod transport;
mod types;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, BulkDnsError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the resolver pool described by `config`.
///
/// An explicit resolver list wins. Otherwise the nameservers of
/// `config.resolv_conf` are used, in file order. Either way an empty
/// result is [`BulkDnsError::NoResolvers`].
pub fn discover_resolvers(config: &ResolveConfig) -> Result<ResolverPool> {
    match &config.resolvers {
        Some(servers) => ResolverPool::new(servers),
        None => {
            let servers = resolv_conf::load(&config.resolv_conf)?;
            ResolverPool::new(&servers)
        }
    }
}
