//! IPv4 protocol implementation
//!
//! This module provides IPv4 header parsing and serialization. Only the fixed
//! 20-byte header is supported: no options and no fragmentation.

use std::net::Ipv4Addr;

use crate::network::checksum;
use byteorder::{BigEndian, ByteOrder};

pub const IP_HEADER_LEN: usize = 20;
/// Version 4, header length 5 words.
pub const IP_VER_LEN: u8 = 0x45;
pub const IP_TTL: u8 = 64;
/// Largest payload that fits in one Ethernet frame.
pub const IP_DATA_LEN: usize = crate::network::ethernet::ETH_MAX_PAYLOAD - IP_HEADER_LEN;

/// IPv4 packet header structure
///
/// Represents the standard 20-byte IPv4 header as defined in RFC 791
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub ver_len: u8, // Version (4 bits) + Internet Header Length (4 bits)
    pub tos: u8,     // Type of Service
    pub total_len: u16,
    pub id: u16,
    pub flags_frag_offset: u16, // Flags and Fragment Offset
    pub ttl: u8,                // Time to Live
    pub protocol: u8,           // Next Protocol
    pub checksum: u16,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
}

impl Ipv4Header {
    /// Create an outgoing header carrying `payload_len` bytes
    ///
    /// The identifier and checksum are left zero; see [`Ipv4Header::seal`].
    pub fn new(protocol: u8, src_addr: Ipv4Addr, dst_addr: Ipv4Addr, payload_len: u16) -> Self {
        Ipv4Header {
            ver_len: IP_VER_LEN,
            tos: 0,
            total_len: IP_HEADER_LEN as u16 + payload_len,
            id: 0,
            flags_frag_offset: 0,
            ttl: IP_TTL,
            protocol,
            checksum: 0,
            src_addr,
            dst_addr,
        }
    }

    /// Parse IPv4 header from byte slice
    ///
    /// Returns None if the data is too short. The version is not checked here.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < IP_HEADER_LEN {
            return None;
        }

        Some(Ipv4Header {
            ver_len: data[0],
            tos: data[1],
            total_len: BigEndian::read_u16(&data[2..4]),
            id: BigEndian::read_u16(&data[4..6]),
            flags_frag_offset: BigEndian::read_u16(&data[6..8]),
            ttl: data[8],
            protocol: data[9],
            checksum: BigEndian::read_u16(&data[10..12]),
            src_addr: Ipv4Addr::from(BigEndian::read_u32(&data[12..16])),
            dst_addr: Ipv4Addr::from(BigEndian::read_u32(&data[16..20])),
        })
    }

    /// Convert IPv4 header to bytes
    ///
    /// Serializes the header to a 20-byte array ready for transmission
    pub fn to_bytes(&self) -> [u8; IP_HEADER_LEN] {
        let mut bytes = [0u8; IP_HEADER_LEN];
        bytes[0] = self.ver_len;
        bytes[1] = self.tos;
        BigEndian::write_u16(&mut bytes[2..4], self.total_len);
        BigEndian::write_u16(&mut bytes[4..6], self.id);
        BigEndian::write_u16(&mut bytes[6..8], self.flags_frag_offset);
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        BigEndian::write_u16(&mut bytes[10..12], self.checksum);
        bytes[12..16].copy_from_slice(&self.src_addr.octets());
        bytes[16..20].copy_from_slice(&self.dst_addr.octets());

        bytes
    }

    /// Calculate the header checksum with the checksum field treated as zero
    pub fn calculate_checksum(&self) -> u16 {
        let mut zeroed = *self;
        zeroed.checksum = 0;
        checksum(&zeroed.to_bytes())
    }

    /// Returns true if the stored checksum matches the header
    pub fn validate_checksum(&self) -> bool {
        self.calculate_checksum() == self.checksum
    }

    /// Stamp the identifier and fill in the checksum
    pub fn seal(&mut self, id: u16) {
        self.id = id;
        self.checksum = self.calculate_checksum();
    }

    /// Get payload length
    ///
    /// Returns the length of the payload (total length - header length)
    pub fn payload_len(&self) -> usize {
        (self.total_len as usize).saturating_sub(IP_HEADER_LEN)
    }
}

/// IPv4 protocol constants
pub mod protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}
