//! ARP messages and the address cache
//!
//! The cache is a fixed table of [`ARP_TABLE_MAX_SIZE`] slots. The last slot
//! holds the static binding for the host side of the link; every other slot
//! starts free and is claimed by the first binding observed for an address.
//! Claimed slots are refreshed in place and never evicted, so once the table
//! is full new peers are simply not cached.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};

use crate::network::ethernet::{EtherType, MacAddr, ZERO_MAC};

pub const ARP_MESSAGE_LEN: usize = 28;
pub const ARP_TABLE_MAX_SIZE: usize = 32;

pub const ARP_HW_ETHERNET: u16 = 1;
pub const ARP_PROTO_IPV4: u16 = EtherType::IPV4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
    Other(u16),
}

impl ArpOp {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            other => ArpOp::Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            ArpOp::Request => 1,
            ArpOp::Reply => 2,
            ArpOp::Other(value) => value,
        }
    }
}

/// ARP message for Ethernet/IPv4 (RFC 826)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpMessage {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub op: ArpOp,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpMessage {
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpMessage {
            hardware_type: ARP_HW_ETHERNET,
            protocol_type: ARP_PROTO_IPV4,
            op: ArpOp::Request,
            sender_mac,
            sender_ip,
            target_mac: ZERO_MAC,
            target_ip,
        }
    }

    /// Turn a request into the reply `mac`/`ip` would send back.
    pub fn reply_from(&self, mac: MacAddr, ip: Ipv4Addr) -> Self {
        ArpMessage {
            hardware_type: self.hardware_type,
            protocol_type: self.protocol_type,
            op: ArpOp::Reply,
            sender_mac: mac,
            sender_ip: ip,
            target_mac: self.sender_mac,
            target_ip: self.sender_ip,
        }
    }

    /// Returns None if the data is too short to hold an Ethernet/IPv4 message
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < ARP_MESSAGE_LEN {
            return None;
        }

        let mut sender_mac = ZERO_MAC;
        let mut target_mac = ZERO_MAC;
        sender_mac.copy_from_slice(&data[8..14]);
        target_mac.copy_from_slice(&data[18..24]);

        Some(ArpMessage {
            hardware_type: BigEndian::read_u16(&data[0..2]),
            protocol_type: BigEndian::read_u16(&data[2..4]),
            op: ArpOp::from_u16(BigEndian::read_u16(&data[6..8])),
            sender_mac,
            sender_ip: Ipv4Addr::from(BigEndian::read_u32(&data[14..18])),
            target_mac,
            target_ip: Ipv4Addr::from(BigEndian::read_u32(&data[24..28])),
        })
    }

    pub fn to_bytes(&self) -> [u8; ARP_MESSAGE_LEN] {
        let mut bytes = [0u8; ARP_MESSAGE_LEN];
        BigEndian::write_u16(&mut bytes[0..2], self.hardware_type);
        BigEndian::write_u16(&mut bytes[2..4], self.protocol_type);
        bytes[4] = 6; // hardware address length
        bytes[5] = 4; // protocol address length
        BigEndian::write_u16(&mut bytes[6..8], self.op.to_u16());
        bytes[8..14].copy_from_slice(&self.sender_mac);
        bytes[14..18].copy_from_slice(&self.sender_ip.octets());
        bytes[18..24].copy_from_slice(&self.target_mac);
        bytes[24..28].copy_from_slice(&self.target_ip.octets());
        bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpEntryState {
    Free,
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub state: ArpEntryState,
}

impl ArpEntry {
    const FREE: ArpEntry = ArpEntry {
        ip: Ipv4Addr::UNSPECIFIED,
        mac: ZERO_MAC,
        state: ArpEntryState::Free,
    };
}

/// What [`ArpCache::observe`] did with a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    Inserted(usize),
    Refreshed(usize),
    /// The address belongs to the static slot, which is left alone.
    Pinned(usize),
    TableFull,
}

#[derive(Debug, Clone)]
pub struct ArpCache {
    entries: [ArpEntry; ARP_TABLE_MAX_SIZE],
}

impl ArpCache {
    /// Create a cache holding only the static binding for `ip`.
    pub fn new(static_ip: Ipv4Addr, static_mac: MacAddr) -> Self {
        let mut entries = [ArpEntry::FREE; ARP_TABLE_MAX_SIZE];
        entries[ARP_TABLE_MAX_SIZE - 1] = ArpEntry {
            ip: static_ip,
            mac: static_mac,
            state: ArpEntryState::Static,
        };
        ArpCache { entries }
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.entries
            .iter()
            .find(|entry| entry.state != ArpEntryState::Free && entry.ip == ip)
            .map(|entry| entry.mac)
    }

    /// Record that `ip` is reachable at `mac`.
    pub fn observe(&mut self, ip: Ipv4Addr, mac: MacAddr) -> Observed {
        let existing = self
            .entries
            .iter()
            .position(|entry| entry.state != ArpEntryState::Free && entry.ip == ip);

        if let Some(slot) = existing {
            let entry = &mut self.entries[slot];
            return match entry.state {
                ArpEntryState::Dynamic => {
                    entry.mac = mac;
                    Observed::Refreshed(slot)
                }
                _ => Observed::Pinned(slot),
            };
        }

        match self
            .entries
            .iter()
            .position(|entry| entry.state == ArpEntryState::Free)
        {
            Some(slot) => {
                self.entries[slot] = ArpEntry {
                    ip,
                    mac,
                    state: ArpEntryState::Dynamic,
                };
                Observed::Inserted(slot)
            }
            None => Observed::TableFull,
        }
    }

    pub fn entry(&self, slot: usize) -> Option<ArpEntry> {
        self.entries.get(slot).copied()
    }

    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.state != ArpEntryState::Free)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 2);
    const HOST_MAC: MacAddr = [0xaa; 6];

    fn peer(n: u8) -> (Ipv4Addr, MacAddr) {
        (Ipv4Addr::new(10, 0, 2, 100 + n), [0x52, 0x54, 0, 0, 0, n])
    }

    #[test]
    fn test_message_layout() {
        let msg = ArpMessage::request(
            [0x10, 0, 0, 0x11, 0x11, 0x11],
            Ipv4Addr::new(10, 0, 2, 15),
            HOST_IP,
        );
        let bytes = msg.to_bytes();
        assert_eq!(&bytes[0..8], &[0, 1, 0x08, 0x00, 6, 4, 0, 1]);
        assert_eq!(&bytes[14..18], &[10, 0, 2, 15]);
        assert_eq!(&bytes[18..24], &[0; 6]);
        assert_eq!(&bytes[24..28], &[10, 0, 2, 2]);
        assert_eq!(ArpMessage::from_bytes(&bytes), Some(msg));
        assert!(ArpMessage::from_bytes(&bytes[..27]).is_none());
    }

    #[test]
    fn test_reply_swaps_sender_and_target() {
        let (ip, mac) = peer(1);
        let request = ArpMessage::request(mac, ip, Ipv4Addr::new(10, 0, 2, 15));
        let reply = request.reply_from([1; 6], Ipv4Addr::new(10, 0, 2, 15));
        assert_eq!(reply.op, ArpOp::Reply);
        assert_eq!(reply.target_mac, mac);
        assert_eq!(reply.target_ip, ip);
        assert_eq!(reply.sender_mac, [1; 6]);
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        let cache = ArpCache::new(HOST_IP, HOST_MAC);
        assert_eq!(cache.lookup(peer(1).0), None);
        // Free slots must not answer for the unspecified address.
        assert_eq!(cache.lookup(Ipv4Addr::UNSPECIFIED), None);
        assert_eq!(cache.lookup(HOST_IP), Some(HOST_MAC));
    }

    #[test]
    fn test_observe_then_lookup() {
        let mut cache = ArpCache::new(HOST_IP, HOST_MAC);
        let (ip, mac) = peer(1);
        assert_eq!(cache.observe(ip, mac), Observed::Inserted(0));
        assert_eq!(cache.lookup(ip), Some(mac));

        assert_eq!(cache.observe(ip, [9; 6]), Observed::Refreshed(0));
        assert_eq!(cache.lookup(ip), Some([9; 6]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_static_entry_never_altered() {
        let mut cache = ArpCache::new(HOST_IP, HOST_MAC);
        assert_eq!(
            cache.observe(HOST_IP, [1; 6]),
            Observed::Pinned(ARP_TABLE_MAX_SIZE - 1)
        );
        assert_eq!(cache.lookup(HOST_IP), Some(HOST_MAC));
        // No duplicate dynamic entry was created for the host.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_table_drops_new_bindings() {
        let mut cache = ArpCache::new(HOST_IP, HOST_MAC);
        for n in 0..(ARP_TABLE_MAX_SIZE - 1) as u8 {
            let (ip, mac) = peer(n);
            assert_eq!(cache.observe(ip, mac), Observed::Inserted(n as usize));
        }
        let (ip, mac) = peer(120);
        assert_eq!(cache.observe(ip, mac), Observed::TableFull);
        assert_eq!(cache.lookup(ip), None);
        assert_eq!(cache.lookup(HOST_IP), Some(HOST_MAC));
        assert_eq!(cache.len(), ARP_TABLE_MAX_SIZE);
    }
}
