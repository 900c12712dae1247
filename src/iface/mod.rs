//! Network interface and protocol processing
//!
//! This module drives traffic through the stack:
//! - Ethernet send/receive and the poll loop
//! - ARP resolution and replies
//! - IPv4 validation and protocol dispatch
//! - ICMP echo replies
//! - the UDP echo service
//! - the TCP virtual-channel state machine

pub mod interface;

mod arp;
mod ethernet;
mod icmp;
mod ipv4;
mod tcp;
mod udp;

#[cfg(test)]
pub(crate) mod harness;

// Re-export commonly used items
pub use interface::NetworkInterface;
