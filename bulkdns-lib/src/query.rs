//! Single NS query execution and outcome classification.

use crate::error::BulkDnsError;
use crate::pool::ResolverEndpoint;
use crate::transport::{exchange_for, Exchange};
use crate::types::{Protocol, QueryOutcome, DEFAULT_TIMEOUT};
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use std::sync::Arc;
use std::time::Duration;

/// Runs one NS query against one resolver and classifies the answer.
///
/// There are no retries: whatever the first exchange yields is the outcome.
#[derive(Clone)]
pub struct QueryExecutor {
    exchange: Arc<dyn Exchange>,
    timeout: Duration,
}

impl QueryExecutor {
    /// Executor over an arbitrary transport.
    pub fn new(exchange: Arc<dyn Exchange>, timeout: Duration) -> Self {
        Self { exchange, timeout }
    }

    /// Executor using the built-in transport for `protocol`.
    pub fn for_protocol(protocol: Protocol, timeout: Duration) -> Self {
        Self::new(exchange_for(protocol), timeout)
    }

    /// Query `resolver` for the NS records of `domain`.
    pub async fn execute(&self, domain: &str, resolver: &ResolverEndpoint) -> QueryOutcome {
        let query = match build_query(domain) {
            Ok(query) => query,
            Err(e) => return QueryOutcome::transport(e.to_string()),
        };

        let response =
            match tokio::time::timeout(self.timeout, self.exchange.exchange(&query, resolver)).await
            {
                Ok(result) => result,
                Err(_) => Err(BulkDnsError::timeout(
                    format!("query to {}", resolver),
                    self.timeout,
                )),
            };

        let outcome = classify(response);
        tracing::debug!(
            domain = %domain,
            resolver = %resolver,
            outcome = outcome.kind(),
            "query classified"
        );
        outcome
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::for_protocol(Protocol::Udp, DEFAULT_TIMEOUT)
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Build a recursive NS query for `domain` with a random ID.
///
/// A trailing dot is added when missing so relative names are queried as
/// fully qualified.
pub fn build_query(domain: &str) -> Result<Message, BulkDnsError> {
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(BulkDnsError::invalid_domain(domain, "domain name is empty"));
    }
    let fqdn = if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{}.", domain)
    };
    if domain.contains(char::REPLACEMENT_CHARACTER) {
        return Err(BulkDnsError::invalid_domain(domain, "name is not valid UTF-8"));
    }
    // Internationalized names go out in punycode.
    let name = if fqdn.is_ascii() {
        Name::from_ascii(&fqdn)
    } else {
        Name::from_utf8(&fqdn)
    }
    .map_err(|e| BulkDnsError::invalid_domain(domain, e.to_string()))?;

    let mut query = Message::new();
    query
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, RecordType::NS));
    Ok(query)
}

/// Turn the result of an exchange into a [`QueryOutcome`].
pub fn classify(response: Result<Option<Message>, BulkDnsError>) -> QueryOutcome {
    let response = match response {
        Ok(Some(response)) => response,
        Ok(None) => return QueryOutcome::EmptyResponse,
        Err(e) => return QueryOutcome::transport(e.to_string()),
    };

    let rcode = response.response_code();
    if rcode != ResponseCode::NoError {
        return QueryOutcome::protocol(u16::from(rcode));
    }

    QueryOutcome::success(nameservers(&response))
}

/// NS targets of the answer section, in record order.
fn nameservers(response: &Message) -> Vec<String> {
    response
        .answers()
        .iter()
        .filter(|record| record.record_type() == RecordType::NS)
        .filter_map(|record| match record.data() {
            Some(RData::NS(ns)) => Some(display_name(&ns.0)),
            _ => None,
        })
        .collect()
}

fn display_name(name: &Name) -> String {
    if name.is_root() {
        return ".".to_string();
    }
    let ascii = name.to_ascii();
    ascii.strip_suffix('.').unwrap_or(&ascii).to_string()
}
