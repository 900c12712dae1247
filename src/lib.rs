//! A small TCP/IP stack for a teaching kernel
//!
//! This library drives an e1000-class adapter and answers on top of it:
//! - descriptor-ring driver with blocking, timed and non-blocking receive
//! - Ethernet framing and ARP resolution with a fixed cache
//! - IPv4 with ICMP echo replies
//! - a UDP echo service
//! - per-port TCP virtual channels feeding a one-line HTTP responder
//!
//! The whole stack lives in one [`NetworkInterface`]; drive it by calling
//! [`NetworkInterface::poll`] (or `listen`/`poll_timeout`) in a loop.

pub mod app;
pub mod config;
pub mod driver;
pub mod error;
pub mod iface;
pub mod network;
pub mod transport;

// Re-export commonly used types
pub use config::NetConfig;
pub use driver::{Clock, E1000, IdentityMap, MmioRegion, MonotonicClock, Registers, SimulatedE1000};
pub use error::{NetError, NetResult};
pub use iface::NetworkInterface;
pub use network::{ArpCache, EthHeader, EtherType, Ipv4Header, MacAddr};
pub use transport::{TcpFlags, TcpHeader, TcpState};
