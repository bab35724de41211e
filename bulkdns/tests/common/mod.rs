//! Shared helpers for the CLI tests: a fake resolver and an isolated
//! working directory.

#![allow(dead_code)]

use assert_cmd::Command;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::NS;
use hickory_proto::rr::{Name, RData, Record};
use std::fs;
use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Answer a raw query. `missing.*` gets NXDOMAIN, `bare.*` an empty
/// NOERROR, everything else `ns1.<name>` and `ns2.<name>`.
fn answer(request: &[u8]) -> Option<Vec<u8>> {
    let query = Message::from_vec(request).ok()?;
    let question = query.queries().first()?.clone();
    let name = question.name().clone();
    let ascii = name.to_ascii();

    let mut response = Message::new();
    response
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true)
        .add_query(question);

    if ascii.starts_with("missing.") {
        response.set_response_code(ResponseCode::NXDomain);
    } else if !ascii.starts_with("bare.") {
        for ns in ["ns1", "ns2"] {
            let target = Name::from_ascii(format!("{}.{}", ns, ascii)).ok()?;
            response.add_answer(Record::from_rdata(name.clone(), 3600, RData::NS(NS(target))));
        }
    }

    response.to_vec().ok()
}

/// Start a UDP resolver on 127.0.0.1 that answers after `delay`.
///
/// Each query is answered from its own thread so a delay does not
/// serialize concurrent queries.
pub fn spawn_resolver(delay: Duration) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind fake resolver");
    let addr = socket.local_addr().expect("fake resolver address");

    thread::spawn(move || {
        let mut buf = [0u8; 512];
        while let Ok((len, peer)) = socket.recv_from(&mut buf) {
            let request = buf[..len].to_vec();
            let Ok(reply_socket) = socket.try_clone() else {
                break;
            };
            thread::spawn(move || {
                thread::sleep(delay);
                if let Some(reply) = answer(&request) {
                    let _ = reply_socket.send_to(&reply, peer);
                }
            });
        }
    });

    addr
}

/// Start a UDP resolver that never answers.
pub fn spawn_silent_resolver() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind silent resolver");
    let addr = socket.local_addr().expect("silent resolver address");
    thread::spawn(move || {
        let mut buf = [0u8; 512];
        while socket.recv_from(&mut buf).is_ok() {}
    });
    addr
}

/// Temporary HOME and working directory so no real config leaks in.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create sandbox"),
        }
    }

    /// Write `contents` to `name` inside the sandbox.
    pub fn file(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write sandbox file");
        path
    }

    /// `bulkdns` with a clean environment rooted in the sandbox.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("bulkdns").expect("bulkdns binary");
        cmd.current_dir(self.dir.path())
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join(".config"))
            .env_remove("RUST_LOG")
            .env_remove("CLICOLOR_FORCE")
            .timeout(Duration::from_secs(30));
        for var in [
            "BULKDNS_CONCURRENCY",
            "BULKDNS_TIMEOUT",
            "BULKDNS_PROTOCOL",
            "BULKDNS_RESOLVERS",
            "BULKDNS_RESOLV_CONF",
            "BULKDNS_JSON",
            "BULKDNS_CONFIG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }
}
