use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::param::KEY_LENGTH_13;

pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// Normalized 5-tuple identifying a flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowKey {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
}

impl FlowKey {
    pub fn new(
        src_addr: Ipv4Addr,
        dst_addr: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        protocol: u8,
    ) -> Self {
        Self {
            src_addr,
            dst_addr,
            src_port,
            dst_port,
            protocol,
        }
    }

    /// Maps a numeric flow id onto a TCP 5-tuple: the low 32 bits become the
    /// source address, the high 32 bits the destination, ports are zero.
    pub fn from_flow_id(id: u64) -> Self {
        Self {
            src_addr: Ipv4Addr::from(id as u32),
            dst_addr: Ipv4Addr::from((id >> 32) as u32),
            src_port: 0,
            dst_port: 0,
            protocol: PROTO_TCP,
        }
    }

    /// Inverse of [`FlowKey::from_flow_id`] for keys built that way.
    pub fn flow_id(&self) -> u64 {
        (u64::from(u32::from(self.dst_addr)) << 32) | u64::from(u32::from(self.src_addr))
    }

    /// Wire layout fed to the hash functions.
    pub fn to_bytes(&self) -> [u8; KEY_LENGTH_13] {
        let mut out = [0u8; KEY_LENGTH_13];
        out[0..4].copy_from_slice(&self.src_addr.octets());
        out[4..8].copy_from_slice(&self.dst_addr.octets());
        out[8..10].copy_from_slice(&self.src_port.to_be_bytes());
        out[10..12].copy_from_slice(&self.dst_port.to_be_bytes());
        out[12] = self.protocol;
        out
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} ({})",
            self.src_addr, self.src_port, self.dst_addr, self.dst_port, self.protocol
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_id_round_trips() {
        let id = 0x0a00_0001_c0a8_0102;
        let key = FlowKey::from_flow_id(id);
        assert_eq!(key.src_addr, Ipv4Addr::new(192, 168, 1, 2));
        assert_eq!(key.dst_addr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(key.protocol, PROTO_TCP);
        assert_eq!(key.flow_id(), id);
    }

    #[test]
    fn bytes_distinguish_ports() {
        let a = FlowKey::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, 1, 2, PROTO_UDP);
        let b = FlowKey::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, 2, 1, PROTO_UDP);
        assert_ne!(a.to_bytes(), b.to_bytes());
        assert_eq!(a.to_bytes()[12], PROTO_UDP);
    }
}
