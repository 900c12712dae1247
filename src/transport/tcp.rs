//! TCP (Transmission Control Protocol) implementation
//!
//! This module provides the TCP header codec and the pool of virtual
//! channels. A virtual channel is a minimal per-port endpoint: it is bound to
//! one local port for its whole life and serves one peer at a time. Channels
//! are never torn down; a finished exchange puts the channel back in LISTEN.
//!
//! The state machine that drives the channels lives in `iface::tcp`.

use std::net::Ipv4Addr;

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder};

use crate::error::{NetError, NetResult};
use crate::network::checksum;
use crate::network::ipv4::{protocol, IP_DATA_LEN};

pub const TCP_HEADER_LEN: usize = 20;
pub const TCP_DATA_LEN: usize = IP_DATA_LEN - TCP_HEADER_LEN;
pub const TCP_WINDOW_SIZE: usize = TCP_DATA_LEN * 10;
pub const TCP_VC_NUM: usize = 64;

/// Port served by channel 0.
pub const HTTP_PORT: u16 = 80;
/// Channel `i > 0` serves `TCP_PORT_BASE + i`.
pub const TCP_PORT_BASE: u16 = 7999;

const PSEUDO_HEADER_LEN: usize = 12;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TcpFlags: u8 {
        const FIN = 0x01;
        const SYN = 0x02;
        const RST = 0x04;
        const PSH = 0x08;
        const ACK = 0x10;
        const URG = 0x20;
        const ECE = 0x40;
        const CWR = 0x80;
    }
}

/// TCP connection states as defined in RFC 793
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait1,
    Closing,
    FinWait2,
    TimeWait,
    CloseWait,
    LastAck,
}

/// TCP packet header structure
///
/// Represents the standard 20-byte TCP header as defined in RFC 793
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq_number: u32,
    pub ack_number: u32,
    pub data_offset: u8, // Data offset (4 bits) + Reserved (3 bits) + NS (1 bit)
    pub flags: TcpFlags,
    pub window_size: u16,
    pub checksum: u16,
    pub urgent_ptr: u16,
}

impl TcpHeader {
    /// Header for an outgoing segment without options
    pub fn new(src_port: u16, dst_port: u16, seq_number: u32, ack_number: u32, flags: TcpFlags) -> Self {
        TcpHeader {
            src_port,
            dst_port,
            seq_number,
            ack_number,
            data_offset: ((TCP_HEADER_LEN >> 2) as u8) << 4,
            flags,
            window_size: TCP_WINDOW_SIZE as u16,
            checksum: 0,
            urgent_ptr: 0,
        }
    }

    /// Parse TCP header from byte slice
    ///
    /// Returns None if the data is too short to contain a valid TCP header
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < TCP_HEADER_LEN {
            return None;
        }

        Some(TcpHeader {
            src_port: BigEndian::read_u16(&data[0..2]),
            dst_port: BigEndian::read_u16(&data[2..4]),
            seq_number: BigEndian::read_u32(&data[4..8]),
            ack_number: BigEndian::read_u32(&data[8..12]),
            data_offset: data[12],
            flags: TcpFlags::from_bits_retain(data[13]),
            window_size: BigEndian::read_u16(&data[14..16]),
            checksum: BigEndian::read_u16(&data[16..18]),
            urgent_ptr: BigEndian::read_u16(&data[18..20]),
        })
    }

    /// Convert TCP header to bytes
    pub fn to_bytes(&self) -> [u8; TCP_HEADER_LEN] {
        let mut bytes = [0u8; TCP_HEADER_LEN];
        BigEndian::write_u16(&mut bytes[0..2], self.src_port);
        BigEndian::write_u16(&mut bytes[2..4], self.dst_port);
        BigEndian::write_u32(&mut bytes[4..8], self.seq_number);
        BigEndian::write_u32(&mut bytes[8..12], self.ack_number);
        bytes[12] = self.data_offset;
        bytes[13] = self.flags.bits();
        BigEndian::write_u16(&mut bytes[14..16], self.window_size);
        BigEndian::write_u16(&mut bytes[16..18], self.checksum);
        BigEndian::write_u16(&mut bytes[18..20], self.urgent_ptr);
        bytes
    }

    /// Get the data offset (header length) in bytes
    pub fn header_len(&self) -> usize {
        ((self.data_offset >> 4) as usize) * 4
    }
}

/// Checksum of `segment` (header with a zero checksum field, then data)
/// under the IPv4 pseudo-header
pub fn segment_checksum(src: Ipv4Addr, dst: Ipv4Addr, segment: &[u8]) -> u16 {
    let segment = &segment[..segment.len().min(IP_DATA_LEN)];
    let mut buf = [0u8; PSEUDO_HEADER_LEN + IP_DATA_LEN];

    buf[0..4].copy_from_slice(&src.octets());
    buf[4..8].copy_from_slice(&dst.octets());
    buf[8] = 0;
    buf[9] = protocol::TCP;
    BigEndian::write_u16(&mut buf[10..12], segment.len() as u16);
    buf[PSEUDO_HEADER_LEN..PSEUDO_HEADER_LEN + segment.len()].copy_from_slice(segment);

    checksum(&buf[..PSEUDO_HEADER_LEN + segment.len()])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

/// One per-port TCP endpoint
#[derive(Debug)]
pub struct VirtualChannel {
    pub(crate) state: TcpState,
    pub(crate) host: Endpoint,
    pub(crate) guest: Endpoint,
    pub(crate) seq: u32,
    pub(crate) ack: u32,
    buffer: Box<[u8]>,
    data_len: usize,
}

impl VirtualChannel {
    fn new(host: Endpoint, guest: Endpoint) -> Self {
        VirtualChannel {
            state: TcpState::Listen,
            host,
            guest,
            seq: 0,
            ack: 0,
            buffer: vec![0u8; TCP_WINDOW_SIZE].into_boxed_slice(),
            data_len: 0,
        }
    }

    pub fn state(&self) -> TcpState {
        self.state
    }

    pub fn host(&self) -> Endpoint {
        self.host
    }

    pub fn guest(&self) -> Endpoint {
        self.guest
    }

    /// Next sequence number we send.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Next sequence number we expect from the peer.
    pub fn ack(&self) -> u32 {
        self.ack
    }

    /// Bytes received since the last push.
    pub fn received(&self) -> &[u8] {
        &self.buffer[..self.data_len]
    }

    /// An incoming segment must continue exactly where we are.
    pub fn check_ack_seq(&self, seq_number: u32, ack_number: u32) -> bool {
        seq_number == self.ack && ack_number == self.seq
    }

    /// Append payload to the receive buffer. The buffer is left unchanged
    /// when the payload does not fit.
    pub(crate) fn append(&mut self, payload: &[u8]) -> NetResult<()> {
        if self.data_len + payload.len() >= TCP_WINDOW_SIZE {
            return Err(NetError::BufferOverflow);
        }
        self.buffer[self.data_len..self.data_len + payload.len()].copy_from_slice(payload);
        self.data_len += payload.len();
        Ok(())
    }

    pub(crate) fn clear_buffer(&mut self) {
        self.data_len = 0;
    }

    /// Drop everything past the first `len` buffered bytes.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.data_len = self.data_len.min(len);
    }
}

/// The fixed pool of virtual channels
#[derive(Debug)]
pub struct TcpChannels {
    channels: Vec<VirtualChannel>,
    local_ip: Ipv4Addr,
    default_peer: Ipv4Addr,
}

impl TcpChannels {
    /// Bind every channel to its port, all in LISTEN
    pub fn new(local_ip: Ipv4Addr, default_peer: Ipv4Addr) -> Self {
        let channels = (0..TCP_VC_NUM)
            .map(|i| Self::bind(i, local_ip, default_peer))
            .collect();
        TcpChannels {
            channels,
            local_ip,
            default_peer,
        }
    }

    fn bind(index: usize, local_ip: Ipv4Addr, default_peer: Ipv4Addr) -> VirtualChannel {
        let (host_port, guest_port) = match index {
            0 => (HTTP_PORT, 8080),
            i => (TCP_PORT_BASE + i as u16, i as u16),
        };
        VirtualChannel::new(
            Endpoint {
                ip: local_ip,
                port: host_port,
            },
            Endpoint {
                ip: default_peer,
                port: guest_port,
            },
        )
    }

    /// Put channel `index` back to its initial binding in LISTEN
    pub(crate) fn reset(&mut self, index: usize) {
        if let Some(vc) = self.channels.get_mut(index) {
            *vc = Self::bind(index, self.local_ip, self.default_peer);
        }
    }

    /// Channel bound to local port `port`
    ///
    /// The peer address plays no part in the match, so a port serves one peer
    /// at a time.
    pub fn match_port(&self, port: u16) -> Option<usize> {
        self.channels.iter().position(|vc| vc.host.port == port)
    }

    pub fn channel(&self, index: usize) -> Option<&VirtualChannel> {
        self.channels.get(index)
    }

    pub(crate) fn channel_mut(&mut self, index: usize) -> Option<&mut VirtualChannel> {
        self.channels.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = TcpHeader::new(80, 51000, 1000, 2000, TcpFlags::SYN | TcpFlags::ACK);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], &[0, 80, 0xc7, 0x38]);
        assert_eq!(bytes[12], 0x50);
        assert_eq!(bytes[13], 0x12);
        assert_eq!(header.header_len(), 20);
        assert_eq!(TcpHeader::from_bytes(&bytes), Some(header));
        assert!(TcpHeader::from_bytes(&bytes[..19]).is_none());
    }

    #[test]
    fn test_checksum_verifies_with_pseudo_header() {
        let src = Ipv4Addr::new(10, 0, 2, 15);
        let dst = Ipv4Addr::new(10, 0, 2, 2);
        let mut segment = TcpHeader::new(80, 51000, 1, 2, TcpFlags::ACK).to_bytes().to_vec();
        segment.extend_from_slice(b"odd");
        let sum = segment_checksum(src, dst, &segment);
        segment[16..18].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(segment_checksum(src, dst, &segment), 0);
        assert_ne!(segment_checksum(dst, Ipv4Addr::new(10, 0, 2, 3), &segment), 0);
    }

    #[test]
    fn test_pool_binds_ports() {
        let pool = TcpChannels::new(Ipv4Addr::new(10, 0, 2, 15), Ipv4Addr::new(10, 0, 2, 2));
        assert_eq!(pool.len(), TCP_VC_NUM);
        assert_eq!(pool.match_port(80), Some(0));
        assert_eq!(pool.match_port(8000), Some(1));
        assert_eq!(pool.match_port(8062), Some(63));
        assert_eq!(pool.match_port(8063), None);
        assert_eq!(pool.match_port(22), None);

        let vc = pool.channel(1).unwrap();
        assert_eq!(vc.state(), TcpState::Listen);
        assert_eq!(vc.guest().port, 1);
        assert_eq!(vc.host().ip, Ipv4Addr::new(10, 0, 2, 15));
    }

    #[test]
    fn test_append_rejects_overflow_without_change() {
        let mut pool = TcpChannels::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST);
        let vc = pool.channel_mut(0).unwrap();
        vc.append(b"GET / ").unwrap();

        let big = vec![b'x'; TCP_WINDOW_SIZE - 6];
        assert_eq!(vc.append(&big), Err(NetError::BufferOverflow));
        assert_eq!(vc.received(), b"GET / ");

        vc.clear_buffer();
        assert!(vc.received().is_empty());
    }

    #[test]
    fn test_check_ack_seq() {
        let mut pool = TcpChannels::new(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST);
        let vc = pool.channel_mut(0).unwrap();
        vc.seq = 5;
        vc.ack = 9;
        assert!(vc.check_ack_seq(9, 5));
        assert!(!vc.check_ack_seq(5, 9));
        assert!(!vc.check_ack_seq(9, 6));
    }

    #[test]
    fn test_reset_restores_binding() {
        let mut pool = TcpChannels::new(Ipv4Addr::LOCALHOST, Ipv4Addr::new(10, 0, 2, 2));
        let vc = pool.channel_mut(3).unwrap();
        vc.state = TcpState::Closed;
        vc.guest.port = 4444;
        vc.append(b"left over").unwrap();

        pool.reset(3);
        let vc = pool.channel(3).unwrap();
        assert_eq!(vc.state(), TcpState::Listen);
        assert_eq!(vc.host().port, 8002);
        assert_eq!(vc.guest().port, 3);
        assert!(vc.received().is_empty());
    }
}
