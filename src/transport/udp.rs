//! UDP (User Datagram Protocol) implementation
//!
//! This module provides UDP header parsing and datagram construction.

use byteorder::{BigEndian, ByteOrder};

use crate::network::ipv4::IP_DATA_LEN;

/// UDP header length in bytes
pub const UDP_HEADER_LEN: usize = 8;
pub const UDP_DATA_LEN: usize = IP_DATA_LEN - UDP_HEADER_LEN;

/// UDP packet header structure
///
/// Represents the standard 8-byte UDP header as defined in RFC 768
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16, // Length of UDP header and data
    pub checksum: u16,
}

impl UdpHeader {
    /// Parse UDP header from byte slice
    ///
    /// Returns None if the data is too short to contain a valid UDP header
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < UDP_HEADER_LEN {
            return None;
        }

        Some(UdpHeader {
            src_port: BigEndian::read_u16(&data[0..2]),
            dst_port: BigEndian::read_u16(&data[2..4]),
            length: BigEndian::read_u16(&data[4..6]),
            checksum: BigEndian::read_u16(&data[6..8]),
        })
    }

    /// Convert UDP header to bytes
    pub fn to_bytes(&self) -> [u8; UDP_HEADER_LEN] {
        let mut bytes = [0u8; UDP_HEADER_LEN];
        BigEndian::write_u16(&mut bytes[0..2], self.src_port);
        BigEndian::write_u16(&mut bytes[2..4], self.dst_port);
        BigEndian::write_u16(&mut bytes[4..6], self.length);
        BigEndian::write_u16(&mut bytes[6..8], self.checksum);
        bytes
    }

    /// Payload bytes of `datagram` as bounded by the length field
    pub fn payload<'a>(&self, datagram: &'a [u8]) -> &'a [u8] {
        let end = (self.length as usize).clamp(UDP_HEADER_LEN, datagram.len().max(UDP_HEADER_LEN));
        datagram.get(UDP_HEADER_LEN..end).unwrap_or(&[])
    }
}

/// Build a datagram with a zero checksum, which IPv4 allows.
///
/// Returns the number of bytes written to `out`.
pub fn write_datagram(src_port: u16, dst_port: u16, payload: &[u8], out: &mut [u8]) -> usize {
    let payload_len = payload.len().min(UDP_DATA_LEN).min(out.len().saturating_sub(UDP_HEADER_LEN));
    let total_len = UDP_HEADER_LEN + payload_len;

    let header = UdpHeader {
        src_port,
        dst_port,
        length: total_len as u16,
        checksum: 0,
    };

    out[..UDP_HEADER_LEN].copy_from_slice(&header.to_bytes());
    out[UDP_HEADER_LEN..total_len].copy_from_slice(&payload[..payload_len]);
    total_len
}
