//! Caller identifiers for audit events.
//!
//! The audit channel records where a request came from without necessarily
//! storing the real address.

use mirage_core::SourceMode;
use rand::Rng;
use std::net::IpAddr;

/// Turns a peer address into the `source_ip` field of an audit event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceTagger {
    mode: SourceMode,
}

impl SourceTagger {
    pub fn new(mode: SourceMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn tag(&self, peer: Option<IpAddr>) -> String {
        match self.mode {
            SourceMode::Synthetic => synthetic(),
            SourceMode::Raw => peer.map_or_else(unknown, |ip| ip.to_string()),
            SourceMode::Obfuscated => peer.map_or_else(unknown, obfuscate),
        }
    }
}

fn unknown() -> String {
    "unknown".to_string()
}

fn synthetic() -> String {
    let host: u8 = rand::rng().random_range(10..=255);
    format!("192.168.1.{}", host)
}

/// Mask the host part: last IPv4 octet, or everything after the /64 prefix.
fn obfuscate(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            format!("{}.{}.{}.x", a, b, c)
        }
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => obfuscate(IpAddr::V4(v4)),
            None => {
                let s = v6.segments();
                format!("{:x}:{:x}:{:x}:{:x}::x", s[0], s[1], s[2], s[3])
            }
        },
    }
}
