//! Error type shared by every layer of the stack
//!
//! Nothing in the stack is fatal: each variant describes why a single frame,
//! packet or segment was dropped. The kernel side usually only needs
//! [`NetError::code`], which maps the variant to a stable negative integer.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::transport::tcp::{TcpFlags, TcpState};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    #[error("transmit queue is full")]
    QueueFull,
    #[error("timed out waiting for the adapter")]
    Timeout,
    #[error("frame payload of {0} bytes exceeds the MTU")]
    FrameTooLarge(usize),
    #[error("packet is truncated")]
    Truncated,
    #[error("unsupported ethertype {0:#06x}")]
    UnsupportedEtherType(u16),
    #[error("unsupported ARP hardware type {0}")]
    UnsupportedHardwareType(u16),
    #[error("unsupported ARP protocol type {0:#06x}")]
    UnsupportedProtocolType(u16),
    #[error("unsupported IP version/header length {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("bad checksum: received {received:#06x}, computed {computed:#06x}")]
    BadChecksum { received: u16, computed: u16 },
    #[error("unsupported ICMP type {0}")]
    UnsupportedIcmpType(u8),
    #[error("invalid ICMP code {0}")]
    InvalidIcmpCode(u8),
    #[error("no virtual channel bound to port {0}")]
    NoChannel(u16),
    #[error("segment from {got} does not belong to peer {expected}")]
    WrongPeer { expected: Ipv4Addr, got: Ipv4Addr },
    #[error("sequence mismatch: seq {seq} ack {ack}")]
    SequenceMismatch { seq: u32, ack: u32 },
    #[error("flag {flag:?} required in state {state:?}")]
    MissingFlag { state: TcpState, flag: TcpFlags },
    #[error("receive buffer overflow")]
    BufferOverflow,
}

impl NetError {
    /// Integer code handed across the syscall boundary. Always negative.
    pub fn code(&self) -> i32 {
        match self {
            NetError::QueueFull => -1,
            NetError::Timeout => -2,
            NetError::FrameTooLarge(_) => -3,
            NetError::Truncated => -4,
            NetError::UnsupportedEtherType(_) => -5,
            NetError::UnsupportedHardwareType(_) => -6,
            NetError::UnsupportedProtocolType(_) => -7,
            NetError::UnsupportedVersion(_) => -8,
            NetError::BadChecksum { .. } => -9,
            NetError::UnsupportedIcmpType(_) => -10,
            NetError::InvalidIcmpCode(_) => -11,
            NetError::NoChannel(_) => -12,
            NetError::WrongPeer { .. } => -13,
            NetError::SequenceMismatch { .. } => -14,
            NetError::MissingFlag { .. } => -15,
            NetError::BufferOverflow => -16,
        }
    }
}

pub type NetResult<T> = Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_negative_and_distinct() {
        let all = [
            NetError::QueueFull,
            NetError::Timeout,
            NetError::FrameTooLarge(2000),
            NetError::Truncated,
            NetError::UnsupportedEtherType(0x86dd),
            NetError::UnsupportedHardwareType(6),
            NetError::UnsupportedProtocolType(0x86dd),
            NetError::UnsupportedVersion(0x46),
            NetError::BadChecksum { received: 1, computed: 2 },
            NetError::UnsupportedIcmpType(13),
            NetError::InvalidIcmpCode(1),
            NetError::NoChannel(22),
            NetError::WrongPeer {
                expected: Ipv4Addr::new(10, 0, 2, 2),
                got: Ipv4Addr::new(10, 0, 2, 3),
            },
            NetError::SequenceMismatch { seq: 1, ack: 2 },
            NetError::MissingFlag { state: TcpState::Listen, flag: TcpFlags::SYN },
            NetError::BufferOverflow,
        ];
        let mut codes: Vec<i32> = all.iter().map(NetError::code).collect();
        assert!(codes.iter().all(|&c| c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            NetError::UnsupportedEtherType(0x86dd).to_string(),
            "unsupported ethertype 0x86dd"
        );
    }
}
