//! Link and network layer wire formats
//!
//! This module contains the byte-level codecs for:
//! - Ethernet II framing
//! - ARP messages and the ARP cache
//! - IPv4 headers
//! - ICMP echo messages
//!
//! Protocol logic lives in [`crate::iface`]; everything here is pure data.

pub mod arp;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;

// Re-export commonly used items
pub use arp::{ArpCache, ArpMessage, ArpOp};
pub use ethernet::{EthHeader, EtherType, MacAddr};
pub use icmp::{IcmpHeader, ICMP_TYPE_ECHO_REPLY, ICMP_TYPE_ECHO_REQUEST};
pub use ipv4::{protocol, Ipv4Header};

/// Calculate Internet checksum
///
/// Sums the data as big-endian 16-bit words into an accumulator that starts at
/// 0xFFFF, folding the carry back in after every word. A trailing odd byte is
/// the high byte of a final word. Returns the complement of the sum; store it
/// with `to_be_bytes`.
/// This is used for the IP header and for ICMP and TCP.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum = 0xFFFFu32;

    let mut add = |word: u16| {
        sum += word as u32;
        if sum > 0xFFFF {
            sum -= 0xFFFF;
        }
    };

    // Process data in 2-byte chunks
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        add(u16::from_be_bytes([chunk[0], chunk[1]]));
    }

    if let [last_byte] = chunks.remainder() {
        add((*last_byte as u16) << 8);
    }

    !(sum as u16)
}

/// Check `data` (with its checksum field zeroed) against a received checksum.
pub fn verify_checksum(data: &[u8], received: u16) -> bool {
    checksum(data) == received
}
