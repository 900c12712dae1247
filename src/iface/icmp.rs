use log::{debug, trace};

use super::NetworkInterface;
use crate::driver::clock::Clock;
use crate::driver::regs::Registers;
use crate::error::{NetError, NetResult};
use crate::network::icmp::{make_echo_reply, IcmpHeader};
use crate::network::ipv4::{protocol, Ipv4Header, IP_DATA_LEN};

impl<R: Registers, C: Clock> NetworkInterface<R, C> {
    /// Answer an echo request
    ///
    /// If the sender's MAC is unknown an ARP request goes out instead and the
    /// reply is dropped; the peer's next ping will find the binding.
    pub fn icmp_echo_reply(&mut self, ip: &Ipv4Header, message: &[u8]) -> NetResult<()> {
        trace!("icmp: processing message");

        let header = IcmpHeader::from_bytes(message).ok_or(NetError::Truncated)?;
        if !header.is_echo_request() {
            return Err(NetError::UnsupportedIcmpType(header.msg_type));
        }
        if header.msg_code != 0 {
            return Err(NetError::InvalidIcmpCode(header.msg_code));
        }

        if self.arp.lookup(ip.src_addr).is_none() {
            debug!("icmp: {} is a stranger, asking for its MAC", ip.src_addr);
            return self.arp_request(ip.src_addr);
        }

        let len = message.len().min(IP_DATA_LEN);
        let mut reply = [0u8; IP_DATA_LEN];
        reply[..len].copy_from_slice(&message[..len]);
        make_echo_reply(&mut reply[..len]);

        debug!(
            "icmp: echo reply to {} id {} seq {}",
            ip.src_addr,
            header.identifier(),
            header.sequence()
        );
        self.ip_send(protocol::ICMP, ip.src_addr, &reply[..len])
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::network::arp::{ArpMessage, ArpOp};
    use crate::network::checksum;
    use crate::network::ethernet::{EthHeader, EtherType, BROADCAST_MAC, ETH_HEADER_LEN};
    use crate::network::icmp::{ICMP_TYPE_ECHO_REPLY, ICMP_TYPE_ECHO_REQUEST};
    use crate::iface::harness::*;

    fn echo(msg_type: u8, code: u8) -> Vec<u8> {
        let mut message = vec![msg_type, code, 0, 0, 0xbe, 0xef, 0x00, 0x07];
        message.extend_from_slice(b"0123456789abcdef");
        let sum = checksum(&message);
        message[2..4].copy_from_slice(&sum.to_be_bytes());
        message
    }

    #[test]
    fn test_ping_from_known_host_is_answered() {
        let mut iface = interface();
        let request = echo(ICMP_TYPE_ECHO_REQUEST, 0);
        let packet = ip_packet(protocol::ICMP, PEER_IP, &request);
        assert!(deliver(&mut iface, &frame(EtherType::Ipv4, &packet)).is_ok());

        let out = sent(&mut iface);
        assert_eq!(out.len(), 1);
        let (eth, ip, reply) = unwrap_ip(&out[0]);
        assert_eq!(eth.dst_mac, PEER_MAC);
        assert_eq!(ip.protocol, protocol::ICMP);
        assert_eq!(ip.dst_addr, PEER_IP);

        assert_eq!(reply.len(), request.len());
        assert_eq!(reply[0], ICMP_TYPE_ECHO_REPLY);
        assert_eq!(reply[1], 0);
        assert_eq!(&reply[4..], &request[4..]);
        assert_eq!(checksum(&reply), 0);
    }

    #[test]
    fn test_ping_from_stranger_triggers_arp() {
        let mut iface = interface();
        let stranger = Ipv4Addr::new(10, 0, 2, 33);
        let packet = ip_packet(protocol::ICMP, stranger, &echo(ICMP_TYPE_ECHO_REQUEST, 0));
        assert!(deliver(&mut iface, &frame(EtherType::Ipv4, &packet)).is_ok());

        let out = sent(&mut iface);
        assert_eq!(out.len(), 1);
        let eth = EthHeader::from_bytes(&out[0]).unwrap();
        assert_eq!(eth.ethertype, EtherType::Arp);
        assert_eq!(eth.dst_mac, BROADCAST_MAC);
        let request = ArpMessage::from_bytes(&out[0][ETH_HEADER_LEN..]).unwrap();
        assert_eq!(request.op, ArpOp::Request);
        assert_eq!(request.target_ip, stranger);
    }

    #[test]
    fn test_other_types_are_rejected() {
        let mut iface = interface();
        let packet = ip_packet(protocol::ICMP, PEER_IP, &echo(ICMP_TYPE_ECHO_REPLY, 0));
        assert_eq!(
            deliver(&mut iface, &frame(EtherType::Ipv4, &packet)),
            Err(NetError::UnsupportedIcmpType(ICMP_TYPE_ECHO_REPLY))
        );

        let packet = ip_packet(protocol::ICMP, PEER_IP, &echo(ICMP_TYPE_ECHO_REQUEST, 3));
        assert_eq!(
            deliver(&mut iface, &frame(EtherType::Ipv4, &packet)),
            Err(NetError::InvalidIcmpCode(3))
        );
        assert!(sent(&mut iface).is_empty());
    }

    #[test]
    fn test_short_message_is_truncated() {
        let mut iface = interface();
        let packet = ip_packet(protocol::ICMP, PEER_IP, &[8, 0, 0, 0]);
        assert_eq!(deliver(&mut iface, &frame(EtherType::Ipv4, &packet)), Err(NetError::Truncated));
    }
}
