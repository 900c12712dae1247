use std::net::Ipv4Addr;

use log::{debug, trace, warn};

use super::NetworkInterface;
use crate::driver::clock::Clock;
use crate::driver::regs::Registers;
use crate::error::{NetError, NetResult};
use crate::network::ethernet::{EthHeader, EtherType, ETH_MAX_PAYLOAD, ZERO_MAC};
use crate::network::ipv4::{protocol, Ipv4Header, IP_DATA_LEN, IP_HEADER_LEN, IP_VER_LEN};

impl<R: Registers, C: Clock> NetworkInterface<R, C> {
    /// Wrap `payload` in an IPv4 header from our address and send it to `dst`
    pub fn ip_send(&mut self, protocol: u8, dst: Ipv4Addr, payload: &[u8]) -> NetResult<()> {
        trace!("ip: sending {} bytes of protocol {} to {}", payload.len(), protocol, dst);

        if payload.len() > IP_DATA_LEN {
            return Err(NetError::FrameTooLarge(payload.len()));
        }

        let mut header = Ipv4Header::new(protocol, self.config.ip, dst, payload.len() as u16);
        let id = self.next_ip_id();
        header.seal(id);

        let len = IP_HEADER_LEN + payload.len();
        let mut packet = [0u8; ETH_MAX_PAYLOAD];
        packet[..IP_HEADER_LEN].copy_from_slice(&header.to_bytes());
        packet[IP_HEADER_LEN..len].copy_from_slice(payload);

        self.eth_send(EthHeader::new(ZERO_MAC, EtherType::Ipv4), &packet[..len])
    }

    /// Validate an incoming packet and dispatch it by protocol
    pub fn ip_receive(&mut self, packet: &[u8]) -> NetResult<()> {
        trace!("ip: processing packet");

        let header = Ipv4Header::from_bytes(packet).ok_or(NetError::Truncated)?;
        if header.ver_len != IP_VER_LEN {
            debug!("ip: unsupported version/length {:#04x}", header.ver_len);
            return Err(NetError::UnsupportedVersion(header.ver_len));
        }

        let computed = header.calculate_checksum();
        if computed != header.checksum {
            warn!(
                "ip: checksum mismatch: expected {:#06x}, got {:#06x}",
                computed, header.checksum
            );
            return Err(NetError::BadChecksum {
                received: header.checksum,
                computed,
            });
        }

        let total_len = header.total_len as usize;
        if total_len < IP_HEADER_LEN || total_len > packet.len() {
            warn!("ip: total length {} outside packet of {} bytes", total_len, packet.len());
            return Err(NetError::Truncated);
        }
        let payload = &packet[IP_HEADER_LEN..total_len];

        match header.protocol {
            protocol::TCP => self.tcp_receive(&header, payload),
            protocol::UDP => self.udp_receive(&header, payload),
            protocol::ICMP => self.icmp_echo_reply(&header, payload),
            other => {
                debug!("ip: ignoring unsupported protocol {}", other);
                Ok(())
            }
        }
    }
}
