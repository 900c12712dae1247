//! Stack configuration
//!
//! Addresses and ports the stack is brought up with. The defaults match a
//! guest on a bridged `br0` interface.

use std::net::Ipv4Addr;

use crate::network::ethernet::MacAddr;

pub const DEFAULT_MAC: MacAddr = [0x10, 0x00, 0x00, 0x11, 0x11, 0x11];
pub const DEFAULT_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 15);
pub const DEFAULT_HOST_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 2);
pub const DEFAULT_HOST_MAC: MacAddr = [0xaa; 6];
pub const DEFAULT_UDP_SRC_PORT: u16 = 8081;
pub const DEFAULT_UDP_DST_PORT: u16 = 1234;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetConfig {
    /// Hardware address written into every outgoing frame.
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    /// The host on the other end of the link. Pinned in the ARP cache and
    /// used as the fixed UDP destination.
    pub host_ip: Ipv4Addr,
    pub host_mac: MacAddr,
    pub udp_src_port: u16,
    pub udp_dst_port: u16,
    /// Subtract the local port from outgoing TCP checksums.
    ///
    /// Segments produced this way fail verification on a standard peer. Turn it
    /// off to talk to real hosts.
    pub tcp_checksum_port_bias: bool,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            mac: DEFAULT_MAC,
            ip: DEFAULT_IP,
            host_ip: DEFAULT_HOST_IP,
            host_mac: DEFAULT_HOST_MAC,
            udp_src_port: DEFAULT_UDP_SRC_PORT,
            udp_dst_port: DEFAULT_UDP_DST_PORT,
            tcp_checksum_port_bias: true,
        }
    }
}

impl NetConfig {
    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac = mac;
        self
    }

    pub fn with_ip(mut self, ip: Ipv4Addr) -> Self {
        self.ip = ip;
        self
    }

    pub fn with_host(mut self, host_ip: Ipv4Addr, host_mac: MacAddr) -> Self {
        self.host_ip = host_ip;
        self.host_mac = host_mac;
        self
    }

    pub fn with_udp_ports(mut self, src: u16, dst: u16) -> Self {
        self.udp_src_port = src;
        self.udp_dst_port = dst;
        self
    }

    pub fn with_tcp_checksum_port_bias(mut self, enabled: bool) -> Self {
        self.tcp_checksum_port_bias = enabled;
        self
    }
}
