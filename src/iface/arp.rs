//! ARP request/reply handling on the interface

use std::net::Ipv4Addr;

use log::{debug, trace, warn};

use super::NetworkInterface;
use crate::driver::clock::Clock;
use crate::driver::regs::Registers;
use crate::error::{NetError, NetResult};
use crate::network::arp::{ArpMessage, ArpOp, Observed, ARP_HW_ETHERNET, ARP_PROTO_IPV4};
use crate::network::ethernet::{EthHeader, EtherType, BROADCAST_MAC};

impl<R: Registers, C: Clock> NetworkInterface<R, C> {
    /// Broadcast a request for the MAC of `target_ip`
    pub fn arp_request(&mut self, target_ip: Ipv4Addr) -> NetResult<()> {
        trace!("arp: who has {}?", target_ip);
        let request = ArpMessage::request(self.config.mac, self.config.ip, target_ip);
        self.eth_send(EthHeader::new(BROADCAST_MAC, EtherType::Arp), &request.to_bytes())
    }

    /// Answer `request` with our own binding, unicast to the asker
    pub fn arp_reply(&mut self, request: &ArpMessage) -> NetResult<()> {
        trace!("arp: telling {} we are {}", request.sender_ip, self.config.ip);
        let reply = request.reply_from(self.config.mac, self.config.ip);
        self.eth_send(EthHeader::new(reply.target_mac, EtherType::Arp), &reply.to_bytes())
    }

    /// Learn from an incoming ARP message and answer requests for our address
    ///
    /// Anything that is not a request for us is absorbed without a reply.
    pub fn arp_resolve(&mut self, data: &[u8]) -> NetResult<()> {
        trace!("arp: resolving");
        let message = ArpMessage::from_bytes(data).ok_or(NetError::Truncated)?;

        if message.hardware_type != ARP_HW_ETHERNET {
            warn!("arp: only Ethernet is supported");
            return Err(NetError::UnsupportedHardwareType(message.hardware_type));
        }
        if message.protocol_type != ARP_PROTO_IPV4 {
            warn!("arp: only IPv4 is supported");
            return Err(NetError::UnsupportedProtocolType(message.protocol_type));
        }

        match self.arp.observe(message.sender_ip, message.sender_mac) {
            Observed::Inserted(slot) => debug!("arp: learned {} in slot {}", message.sender_ip, slot),
            Observed::Refreshed(slot) => trace!("arp: refreshed slot {}", slot),
            Observed::Pinned(_) => trace!("arp: {} is static", message.sender_ip),
            Observed::TableFull => warn!("arp: table full, {} not recorded", message.sender_ip),
        }

        if message.target_ip != self.config.ip || message.op != ArpOp::Request {
            debug!("arp: keeping silent");
            return Ok(());
        }
        self.arp_reply(&message)
    }
}
