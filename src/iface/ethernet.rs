//! Ethernet framing on the interface
//!
//! `eth_send` and `eth_receive` are the only way traffic enters or leaves
//! the stack; everything above hands its packet down to `eth_send` and
//! everything below is dispatched from `eth_receive`.

use std::time::Duration;

use log::{debug, error, trace};

use super::NetworkInterface;
use crate::driver::clock::Clock;
use crate::driver::e1000::PACKET_BUFFER_SIZE;
use crate::driver::regs::Registers;
use crate::error::{NetError, NetResult};
use crate::network::ethernet::{
    EthHeader, EtherType, ETH_HEADER_LEN, ETH_MAX_PACKET_SIZE, ETH_MAX_PAYLOAD, ZERO_MAC,
};
use crate::network::ipv4::Ipv4Header;

impl<R: Registers, C: Clock> NetworkInterface<R, C> {
    /// Frame `payload` and queue it on the adapter
    ///
    /// The source MAC is always ours. For IPv4 payloads the destination MAC
    /// comes from the ARP cache, or is zero when the address is unresolved.
    pub fn eth_send(&mut self, mut header: EthHeader, payload: &[u8]) -> NetResult<()> {
        trace!("eth: sending {} byte {:?} frame", payload.len(), header.ethertype);

        if payload.len() > ETH_MAX_PAYLOAD {
            return Err(NetError::FrameTooLarge(payload.len()));
        }

        if header.ethertype == EtherType::Ipv4 {
            let ip = Ipv4Header::from_bytes(payload).ok_or(NetError::Truncated)?;
            header.dst_mac = match self.arp.lookup(ip.dst_addr) {
                Some(mac) => mac,
                None => {
                    debug!("eth: no ARP binding for {}", ip.dst_addr);
                    ZERO_MAC
                }
            };
        }
        header.src_mac = self.config.mac;

        let len = ETH_HEADER_LEN + payload.len();
        let mut frame = [0u8; ETH_MAX_PACKET_SIZE];
        frame[..ETH_HEADER_LEN].copy_from_slice(&header.to_bytes());
        frame[ETH_HEADER_LEN..len].copy_from_slice(payload);

        self.nic.transmit(&frame[..len]).map_err(|err| {
            error!("eth: transmit failed: {}", err);
            err
        })
    }

    /// Take one frame off the adapter and process it
    ///
    /// The frame payload is copied into `out`. Returns the frame length, or
    /// 0 if nothing was waiting. A malformed or unwanted frame is reported as
    /// an error; the caller just keeps polling.
    pub fn eth_receive(&mut self, out: &mut [u8]) -> NetResult<usize> {
        let mut frame = [0u8; PACKET_BUFFER_SIZE];
        let size = self.nic.receive(&mut frame);
        if size == 0 {
            return Ok(0);
        }
        trace!("eth: processing frame of {} bytes", size);

        let header = EthHeader::from_bytes(&frame[..size]).ok_or(NetError::Truncated)?;
        let payload = &frame[ETH_HEADER_LEN..size];
        let len = payload.len().min(out.len());
        out[..len].copy_from_slice(&payload[..len]);

        match header.ethertype {
            EtherType::Ipv4 => self.ip_receive(&out[..len])?,
            EtherType::Arp => self.arp_resolve(&out[..len])?,
            EtherType::Other(ethertype) => {
                debug!("eth: dropping frame with ethertype {:#06x}", ethertype);
                return Err(NetError::UnsupportedEtherType(ethertype));
            }
        }
        Ok(size)
    }

    /// Process one frame if any is waiting
    pub fn poll(&mut self) -> NetResult<usize> {
        let mut payload = [0u8; PACKET_BUFFER_SIZE];
        self.eth_receive(&mut payload)
    }

    /// Wait up to `timeout` for a frame, then process it
    pub fn poll_timeout(&mut self, timeout: Duration) -> NetResult<usize> {
        self.nic.timeout_listen(timeout)?;
        self.poll()
    }

    /// Block until a frame arrives, then process it
    pub fn listen(&mut self) -> NetResult<usize> {
        self.nic.listen();
        self.poll()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::config::NetConfig;
    use crate::iface::harness::*;
    use crate::network::ethernet::BROADCAST_MAC;
    use crate::network::ipv4::{protocol, IP_DATA_LEN};

    #[test]
    fn test_no_frame_is_zero() {
        let mut iface = interface();
        assert_eq!(iface.poll(), Ok(0));
        assert_eq!(iface.poll_timeout(Duration::from_millis(3)), Err(NetError::Timeout));
    }

    #[test]
    fn test_unsupported_ethertype() {
        let mut iface = interface();
        let frame = frame(EtherType::Other(0x86dd), &[0u8; 40]);
        assert_eq!(deliver(&mut iface, &frame), Err(NetError::UnsupportedEtherType(0x86dd)));
        assert!(sent(&mut iface).is_empty());
        // The failure does not wedge the ring.
        assert_eq!(iface.poll(), Ok(0));
    }

    #[test]
    fn test_runt_frame_is_truncated() {
        let mut iface = interface();
        assert_eq!(deliver(&mut iface, &[0xff; 10]), Err(NetError::Truncated));
    }

    #[test]
    fn test_send_fills_addresses_from_arp() {
        let mut iface = interface();
        let packet = ip_packet(protocol::UDP, NetConfig::default().ip, &[0u8; 8]);
        let mut packet_to_host = packet.clone();
        packet_to_host[16..20].copy_from_slice(&PEER_IP.octets());

        iface
            .eth_send(EthHeader::new(BROADCAST_MAC, EtherType::Ipv4), &packet_to_host)
            .unwrap();
        let frame = sent(&mut iface).remove(0);
        let header = EthHeader::from_bytes(&frame).unwrap();
        assert_eq!(header.dst_mac, PEER_MAC);
        assert_eq!(header.src_mac, NetConfig::default().mac);
        assert_eq!(header.ethertype, EtherType::Ipv4);
        assert_eq!(&frame[ETH_HEADER_LEN..], &packet_to_host[..]);
    }

    #[test]
    fn test_send_to_unresolved_ip_uses_zero_mac() {
        let mut iface = interface();
        let mut packet = ip_packet(protocol::UDP, NetConfig::default().ip, &[0u8; 8]);
        packet[16..20].copy_from_slice(&Ipv4Addr::new(10, 0, 2, 77).octets());

        iface.eth_send(EthHeader::new(BROADCAST_MAC, EtherType::Ipv4), &packet).unwrap();
        let frame = sent(&mut iface).remove(0);
        assert_eq!(EthHeader::from_bytes(&frame).unwrap().dst_mac, ZERO_MAC);
    }

    #[test]
    fn test_send_rejects_oversized_payload() {
        let mut iface = interface();
        let payload = vec![0u8; ETH_MAX_PAYLOAD + 1];
        assert_eq!(
            iface.eth_send(EthHeader::new(BROADCAST_MAC, EtherType::Arp), &payload),
            Err(NetError::FrameTooLarge(ETH_MAX_PAYLOAD + 1))
        );
        assert!(sent(&mut iface).is_empty());

        let largest = ip_packet(protocol::UDP, PEER_IP, &vec![0u8; IP_DATA_LEN]);
        assert_eq!(largest.len(), ETH_MAX_PAYLOAD);
        assert!(iface.eth_send(EthHeader::new(BROADCAST_MAC, EtherType::Ipv4), &largest).is_ok());
    }

    #[test]
    fn test_send_rejects_short_ip_payload() {
        let mut iface = interface();
        assert_eq!(
            iface.eth_send(EthHeader::new(BROADCAST_MAC, EtherType::Ipv4), &[0x45; 12]),
            Err(NetError::Truncated)
        );
    }
}
