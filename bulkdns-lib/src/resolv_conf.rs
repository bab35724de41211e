//! Resolver discovery from `resolv.conf`-style files.
//!
//! Only `nameserver` lines matter here. Other directives (`search`,
//! `options`, `domain`, ...) are ignored.

use crate::error::BulkDnsError;
use std::fs;
use std::path::Path;

/// Nameserver addresses listed in `text`, in file order.
pub fn parse(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = strip_comment(line).trim();
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(address)) => Some(address.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Read `path` and return its nameserver addresses.
///
/// An unreadable file is a [`BulkDnsError::ResolverDiscovery`]. A readable
/// file with no nameservers yields an empty list; the pool rejects it later.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<String>, BulkDnsError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| BulkDnsError::discovery(path.to_string_lossy(), e.to_string()))?;

    let servers = parse(&content);
    tracing::debug!(path = %path.display(), count = servers.len(), "loaded resolver configuration");
    Ok(servers)
}

fn strip_comment(line: &str) -> &str {
    match line.find(|c: char| c == '#' || c == ';') {
        Some(pos) => &line[..pos],
        None => line,
    }
}
