//! Wire transports for a single DNS exchange.
//!
//! The [`Exchange`] trait is the seam between the query executor and the
//! network. It returns `Ok(None)` when the exchange completed but produced
//! no message, which the executor reports as an empty response.

use crate::error::BulkDnsError;
use crate::pool::ResolverEndpoint;
use crate::types::Protocol;
use async_trait::async_trait;
use hickory_proto::op::Message;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

/// Largest UDP response we accept.
pub const MAX_UDP_PAYLOAD: usize = 4096;

/// Sends one query to one resolver and returns its answer.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Perform the exchange. Timeouts are applied by the caller.
    async fn exchange(
        &self,
        query: &Message,
        resolver: &ResolverEndpoint,
    ) -> Result<Option<Message>, BulkDnsError>;
}

/// Transport matching `protocol`.
pub fn exchange_for(protocol: Protocol) -> Arc<dyn Exchange> {
    match protocol {
        Protocol::Udp => Arc::new(UdpExchange::new()),
        Protocol::Tcp => Arc::new(TcpExchange::new()),
    }
}

/// One datagram out, one datagram back, on a fresh ephemeral socket.
#[derive(Debug, Clone)]
pub struct UdpExchange {
    max_payload: usize,
}

impl UdpExchange {
    pub fn new() -> Self {
        Self {
            max_payload: MAX_UDP_PAYLOAD,
        }
    }
}

impl Default for UdpExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Exchange for UdpExchange {
    async fn exchange(
        &self,
        query: &Message,
        resolver: &ResolverEndpoint,
    ) -> Result<Option<Message>, BulkDnsError> {
        let server = resolve_endpoint(resolver).await?;
        let local: SocketAddr = if server.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| BulkDnsError::network_with_source("bind failed", e.to_string()))?;
        socket.connect(server).await.map_err(|e| {
            BulkDnsError::network_with_source(format!("connect to {} failed", resolver), e.to_string())
        })?;

        let wire = query.to_vec()?;
        socket.send(&wire).await.map_err(|e| {
            BulkDnsError::network_with_source(format!("send to {} failed", resolver), e.to_string())
        })?;

        let mut buf = vec![0u8; self.max_payload];
        let len = socket.recv(&mut buf).await.map_err(|e| {
            BulkDnsError::network_with_source(format!("read from {} failed", resolver), e.to_string())
        })?;
        tracing::trace!(resolver = %resolver, sent = wire.len(), received = len, "udp exchange");

        if len == 0 {
            return Ok(None);
        }
        let response = Message::from_vec(&buf[..len])?;
        check_response_id(query, &response)?;
        Ok(Some(response))
    }
}

/// Length-prefixed exchange over a new TCP connection.
#[derive(Debug, Clone, Default)]
pub struct TcpExchange;

impl TcpExchange {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Exchange for TcpExchange {
    async fn exchange(
        &self,
        query: &Message,
        resolver: &ResolverEndpoint,
    ) -> Result<Option<Message>, BulkDnsError> {
        let server = resolve_endpoint(resolver).await?;
        let mut stream = TcpStream::connect(server).await.map_err(|e| {
            BulkDnsError::network_with_source(format!("connect to {} failed", resolver), e.to_string())
        })?;

        let wire = query.to_vec()?;
        let prefix = u16::try_from(wire.len())
            .map_err(|_| BulkDnsError::internal("query does not fit in a TCP frame"))?;
        let mut frame = Vec::with_capacity(wire.len() + 2);
        frame.extend_from_slice(&prefix.to_be_bytes());
        frame.extend_from_slice(&wire);
        stream.write_all(&frame).await.map_err(|e| {
            BulkDnsError::network_with_source(format!("send to {} failed", resolver), e.to_string())
        })?;

        let mut len_buf = [0u8; 2];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            // Peer closed without answering.
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                return Err(BulkDnsError::network_with_source(
                    format!("read from {} failed", resolver),
                    e.to_string(),
                ))
            }
        }

        let len = usize::from(u16::from_be_bytes(len_buf));
        tracing::trace!(resolver = %resolver, sent = wire.len(), received = len, "tcp exchange");
        if len == 0 {
            return Ok(None);
        }

        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.map_err(|e| {
            BulkDnsError::network_with_source(format!("read from {} failed", resolver), e.to_string())
        })?;
        let response = Message::from_vec(&body)?;
        check_response_id(query, &response)?;
        Ok(Some(response))
    }
}

/// Socket address for an endpoint, resolving hostnames when needed.
async fn resolve_endpoint(resolver: &ResolverEndpoint) -> Result<SocketAddr, BulkDnsError> {
    if let Some(addr) = resolver.socket_addr() {
        return Ok(addr);
    }
    tokio::net::lookup_host(resolver.as_str())
        .await
        .map_err(|e| {
            BulkDnsError::network_with_source(format!("cannot resolve {}", resolver), e.to_string())
        })?
        .next()
        .ok_or_else(|| BulkDnsError::network(format!("no address for {}", resolver)))
}

fn check_response_id(query: &Message, response: &Message) -> Result<(), BulkDnsError> {
    if query.id() != response.id() {
        return Err(BulkDnsError::parse(format!(
            "response id {} does not match query id {}",
            response.id(),
            query.id()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{MessageType, Query};
    use hickory_proto::rr::{Name, RecordType};
    use std::str::FromStr;

    fn query(id: u16) -> Message {
        let mut msg = Message::new();
        msg.set_id(id)
            .set_message_type(MessageType::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(
                Name::from_str("example.com.").unwrap(),
                RecordType::NS,
            ));
        msg
    }

    #[test]
    fn test_response_id_must_match() {
        let q = query(4242);
        let mut r = q.clone();
        r.set_message_type(MessageType::Response);
        assert!(check_response_id(&q, &r).is_ok());

        r.set_id(4243);
        assert!(matches!(
            check_response_id(&q, &r),
            Err(BulkDnsError::ParseError { .. })
        ));
    }

    #[tokio::test]
    async fn test_udp_empty_datagram_is_no_message() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(&[], peer).await.unwrap();
        });

        let resolver = ResolverEndpoint::parse(&addr.to_string()).unwrap();
        let result = UdpExchange::new().exchange(&query(1), &resolver).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_udp_garbage_is_parse_error() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            server.send_to(&[0xde, 0xad], peer).await.unwrap();
        });

        let resolver = ResolverEndpoint::parse(&addr.to_string()).unwrap();
        let result = UdpExchange::new().exchange(&query(2), &resolver).await;
        assert!(matches!(result, Err(BulkDnsError::ParseError { .. })));
    }

    #[tokio::test]
    async fn test_tcp_closed_without_answer_is_no_message() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut len = [0u8; 2];
            conn.read_exact(&mut len).await.unwrap();
            let mut body = vec![0u8; usize::from(u16::from_be_bytes(len))];
            conn.read_exact(&mut body).await.unwrap();
            // drop without replying
        });

        let resolver = ResolverEndpoint::parse(&addr.to_string()).unwrap();
        let result = TcpExchange::new().exchange(&query(3), &resolver).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_tcp_connection_refused_is_network_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let resolver = ResolverEndpoint::parse(&addr.to_string()).unwrap();
        let result = TcpExchange::new().exchange(&query(4), &resolver).await;
        assert!(matches!(result, Err(BulkDnsError::NetworkError { .. })));
    }
}
