//! Transport layer protocols implementation
//!
//! This module contains implementations for transport layer protocols:
//! - TCP: header codec and the virtual channel pool
//! - UDP: header codec and datagram construction

pub mod tcp;
pub mod udp;

// Re-export commonly used items
pub use tcp::{TcpChannels, TcpFlags, TcpHeader, TcpState, VirtualChannel};
pub use udp::UdpHeader;
