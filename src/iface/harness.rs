//! Frame builders and a simulated interface for the end-to-end tests

use std::net::Ipv4Addr;

use crate::config::{NetConfig, DEFAULT_HOST_IP, DEFAULT_HOST_MAC};
use crate::driver::clock::StepClock;
use crate::driver::e1000::{IdentityMap, E1000};
use crate::driver::sim::SimulatedE1000;
use crate::error::NetResult;
use crate::iface::NetworkInterface;
use crate::network::ethernet::{EthHeader, EtherType, MacAddr, ETH_HEADER_LEN};
use crate::network::ipv4::{Ipv4Header, IP_HEADER_LEN};
use crate::transport::tcp::{TcpFlags, TcpHeader};

pub type TestInterface = NetworkInterface<SimulatedE1000, StepClock>;

/// The host on the other end of the link, pinned in the ARP cache.
pub const PEER_IP: Ipv4Addr = DEFAULT_HOST_IP;
pub const PEER_MAC: MacAddr = DEFAULT_HOST_MAC;

pub fn interface() -> TestInterface {
    interface_with(NetConfig::default())
}

pub fn interface_with(config: NetConfig) -> TestInterface {
    // SAFETY: attached once with IdentityMap; the adapter stays in the driver.
    let sim = unsafe { SimulatedE1000::new(config.mac) };
    attach(sim, config)
}

/// An interface whose adapter only transmits on `complete_transmits`.
pub fn stalled_interface() -> TestInterface {
    let config = NetConfig::default();
    // SAFETY: as in `interface_with`.
    let sim = unsafe { SimulatedE1000::stalled(config.mac) };
    attach(sim, config)
}

fn attach(sim: SimulatedE1000, config: NetConfig) -> TestInterface {
    let nic = E1000::attach(sim, StepClock::new(1, 1000), &IdentityMap);
    NetworkInterface::new(nic, config)
}

pub fn frame(ethertype: EtherType, payload: &[u8]) -> Vec<u8> {
    let header = EthHeader {
        dst_mac: NetConfig::default().mac,
        src_mac: PEER_MAC,
        ethertype,
    };
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(payload);
    frame
}

pub fn ip_packet(protocol: u8, src: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let mut header = Ipv4Header::new(protocol, src, NetConfig::default().ip, payload.len() as u16);
    header.seal(7);
    let mut packet = header.to_bytes().to_vec();
    packet.extend_from_slice(payload);
    packet
}

pub fn segment(src_port: u16, dst_port: u16, seq: u32, ack: u32, flags: TcpFlags, payload: &[u8]) -> Vec<u8> {
    let mut segment = TcpHeader::new(src_port, dst_port, seq, ack, flags).to_bytes().to_vec();
    segment.extend_from_slice(payload);
    segment
}

/// Hand `frame` to the adapter and run one receive pass.
pub fn deliver(iface: &mut TestInterface, frame: &[u8]) -> NetResult<usize> {
    assert!(iface.nic_mut().registers_mut().inject(frame));
    iface.poll()
}

pub fn sent(iface: &mut TestInterface) -> Vec<Vec<u8>> {
    iface.nic_mut().registers_mut().drain_transmitted()
}

/// Split a transmitted frame into its Ethernet header, IP header and IP payload.
pub fn unwrap_ip(frame: &[u8]) -> (EthHeader, Ipv4Header, Vec<u8>) {
    let eth = EthHeader::from_bytes(frame).unwrap();
    let ip = Ipv4Header::from_bytes(&frame[ETH_HEADER_LEN..]).unwrap();
    let start = ETH_HEADER_LEN + IP_HEADER_LEN;
    let end = ETH_HEADER_LEN + ip.total_len as usize;
    (eth, ip, frame[start..end].to_vec())
}
