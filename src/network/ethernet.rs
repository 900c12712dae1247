//! Ethernet II framing
//!
//! Only the 14-byte header is modelled: destination MAC, source MAC and
//! ethertype. The ethertype is the single field stored in network order.

use byteorder::{BigEndian, ByteOrder};

pub type MacAddr = [u8; 6];

pub const ETH_HEADER_LEN: usize = 14;
/// Largest frame we put on the wire, header included.
pub const ETH_MAX_PACKET_SIZE: usize = 1514;
pub const ETH_MAX_PAYLOAD: usize = ETH_MAX_PACKET_SIZE - ETH_HEADER_LEN;

pub const BROADCAST_MAC: MacAddr = [0xff; 6];
pub const ZERO_MAC: MacAddr = [0; 6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    Ipv4,
    Arp,
    Other(u16),
}

impl EtherType {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;

    pub fn from_u16(value: u16) -> Self {
        match value {
            Self::IPV4 => EtherType::Ipv4,
            Self::ARP => EtherType::Arp,
            other => EtherType::Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::Ipv4 => Self::IPV4,
            EtherType::Arp => Self::ARP,
            EtherType::Other(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthHeader {
    pub dst_mac: MacAddr,
    pub src_mac: MacAddr,
    pub ethertype: EtherType,
}

impl EthHeader {
    pub fn new(dst_mac: MacAddr, ethertype: EtherType) -> Self {
        EthHeader {
            dst_mac,
            src_mac: ZERO_MAC,
            ethertype,
        }
    }

    /// Parse the header at the start of a frame
    ///
    /// Returns None if the frame is shorter than the header
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < ETH_HEADER_LEN {
            return None;
        }

        let mut dst_mac = ZERO_MAC;
        let mut src_mac = ZERO_MAC;
        dst_mac.copy_from_slice(&data[0..6]);
        src_mac.copy_from_slice(&data[6..12]);

        Some(EthHeader {
            dst_mac,
            src_mac,
            ethertype: EtherType::from_u16(BigEndian::read_u16(&data[12..14])),
        })
    }

    pub fn to_bytes(&self) -> [u8; ETH_HEADER_LEN] {
        let mut bytes = [0u8; ETH_HEADER_LEN];
        bytes[0..6].copy_from_slice(&self.dst_mac);
        bytes[6..12].copy_from_slice(&self.src_mac);
        BigEndian::write_u16(&mut bytes[12..14], self.ethertype.to_u16());
        bytes
    }
}
