//! Network interface abstraction
//!
//! [`NetworkInterface`] owns everything the stack mutates: the adapter and
//! its rings, the ARP cache, the TCP channel pool and the IP identifier
//! counter. Every operation takes `&mut self`, so calls are serialized by
//! construction. A kernel sharing the interface wraps it in its own lock.
//!
//! The per-protocol logic is implemented on this type in the sibling
//! modules (`ethernet`, `arp`, `ipv4`, `icmp`, `udp`, `tcp`).

use log::{info, warn};

use crate::config::NetConfig;
use crate::driver::clock::Clock;
use crate::driver::e1000::E1000;
use crate::driver::regs::Registers;
use crate::network::arp::ArpCache;
use crate::transport::tcp::TcpChannels;

/// Network interface for packet processing
pub struct NetworkInterface<R: Registers, C: Clock> {
    pub(crate) nic: E1000<R, C>,
    pub(crate) config: NetConfig,
    pub(crate) arp: ArpCache,
    pub(crate) tcp: TcpChannels,
    ip_id: u16,
}

impl<R: Registers, C: Clock> NetworkInterface<R, C> {
    /// Bring the stack up on an attached adapter
    ///
    /// The ARP cache starts with the configured host pinned and every TCP
    /// channel listens on its port.
    pub fn new(nic: E1000<R, C>, config: NetConfig) -> Self {
        let hw_mac = nic.mac_address();
        if hw_mac != config.mac {
            warn!(
                "iface: adapter reports MAC {:02x?}, sending as {:02x?}",
                hw_mac, config.mac
            );
        }
        info!("iface: up at {} (host {})", config.ip, config.host_ip);

        NetworkInterface {
            nic,
            arp: ArpCache::new(config.host_ip, config.host_mac),
            tcp: TcpChannels::new(config.ip, config.host_ip),
            config,
            ip_id: 0,
        }
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn arp_cache(&self) -> &ArpCache {
        &self.arp
    }

    pub fn tcp_channels(&self) -> &TcpChannels {
        &self.tcp
    }

    pub fn nic(&self) -> &E1000<R, C> {
        &self.nic
    }

    pub fn nic_mut(&mut self) -> &mut E1000<R, C> {
        &mut self.nic
    }

    /// Identifier for the next outgoing IP packet. Wraps at 16 bits.
    pub(crate) fn next_ip_id(&mut self) -> u16 {
        let id = self.ip_id;
        self.ip_id = self.ip_id.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::iface::harness::{interface, interface_with};
    use crate::network::arp::ArpEntryState;
    use crate::network::arp::ARP_TABLE_MAX_SIZE;
    use crate::transport::tcp::{TcpState, TCP_VC_NUM};

    #[test]
    fn test_interface_creation() {
        let iface = interface();
        assert_eq!(iface.config(), &NetConfig::default());

        let pinned = iface.arp_cache().entry(ARP_TABLE_MAX_SIZE - 1).unwrap();
        assert_eq!(pinned.state, ArpEntryState::Static);
        assert_eq!(pinned.ip, Ipv4Addr::new(10, 0, 2, 2));
        assert_eq!(iface.arp_cache().len(), 1);

        assert_eq!(iface.tcp_channels().len(), TCP_VC_NUM);
        assert_eq!(iface.tcp_channels().channel(0).unwrap().state(), TcpState::Listen);
    }

    #[test]
    fn test_ip_id_wraps() {
        let mut iface = interface();
        assert_eq!(iface.next_ip_id(), 0);
        assert_eq!(iface.next_ip_id(), 1);
        iface.ip_id = u16::MAX;
        assert_eq!(iface.next_ip_id(), u16::MAX);
        assert_eq!(iface.next_ip_id(), 0);
    }

    #[test]
    fn test_configured_addresses_are_used() {
        let config = NetConfig::default().with_ip(Ipv4Addr::new(192, 168, 7, 2));
        let iface = interface_with(config);
        let vc = iface.tcp_channels().channel(0).unwrap();
        assert_eq!(vc.host().ip, Ipv4Addr::new(192, 168, 7, 2));
        assert_eq!(vc.guest().ip, config.host_ip);
    }
}
