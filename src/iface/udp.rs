//! UDP echo service
//!
//! Every datagram that arrives is logged and its payload sent back to the
//! configured host from the configured ports.

use std::fmt;

use log::{info, trace};

use super::NetworkInterface;
use crate::driver::clock::Clock;
use crate::driver::regs::Registers;
use crate::error::{NetError, NetResult};
use crate::network::ipv4::{protocol, Ipv4Header, IP_DATA_LEN};
use crate::transport::udp::{write_datagram, UdpHeader};

/// Lower-case hex dump without separators
struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}

impl<R: Registers, C: Clock> NetworkInterface<R, C> {
    /// Send `data` to the host
    pub fn udp_send(&mut self, data: &[u8]) -> NetResult<()> {
        trace!("udp: sending {} bytes", data.len());
        let mut datagram = [0u8; IP_DATA_LEN];
        let len = write_datagram(
            self.config.udp_src_port,
            self.config.udp_dst_port,
            data,
            &mut datagram,
        );
        let host = self.config.host_ip;
        self.ip_send(protocol::UDP, host, &datagram[..len])
    }

    pub fn udp_receive(&mut self, _ip: &Ipv4Header, datagram: &[u8]) -> NetResult<()> {
        trace!("udp: processing datagram");
        let header = UdpHeader::from_bytes(datagram).ok_or(NetError::Truncated)?;
        let payload = header.payload(datagram);
        info!("udp: port {}: {}", header.dst_port, Hex(payload));
        self.udp_send(payload)
    }
}
