//! TCP virtual-channel state machine
//!
//! Each segment is matched to a channel by destination port alone and moves
//! it around one loop:
//!
//! ```text
//! LISTEN --SYN--> SYN_RECEIVED --ACK--> ESTABLISHED --ACK|PSH--> CLOSE_WAIT
//!    ^                                                              |
//!    +------------------------------ACK|FIN-------------------------+
//! ```
//!
//! A pushed request is answered by the HTTP responder in a single
//! ACK|PSH|FIN segment. Any segment that does not fit the current state is
//! dropped without touching the channel.

use std::net::Ipv4Addr;

use byteorder::{BigEndian, ByteOrder};
use log::{error, info, trace, warn};

use super::NetworkInterface;
use crate::app::http::http_parse;
use crate::driver::clock::Clock;
use crate::driver::regs::Registers;
use crate::error::{NetError, NetResult};
use crate::network::ipv4::{protocol, Ipv4Header, IP_DATA_LEN};
use crate::transport::tcp::{
    segment_checksum, Endpoint, TcpFlags, TcpHeader, TcpState, VirtualChannel, TCP_DATA_LEN,
    TCP_HEADER_LEN,
};

impl<R: Registers, C: Clock> NetworkInterface<R, C> {
    /// Parse a segment out of an IP payload and process it
    pub fn tcp_receive(&mut self, ip: &Ipv4Header, segment: &[u8]) -> NetResult<()> {
        let header = TcpHeader::from_bytes(segment).ok_or_else(|| {
            warn!("tcp: IP packet too short for TCP header");
            NetError::Truncated
        })?;

        let offset = header.header_len();
        if offset < TCP_HEADER_LEN || offset > segment.len() {
            warn!("tcp: bad data offset {}", offset);
            return Err(NetError::Truncated);
        }
        self.tcp_process(&header, ip.src_addr, &segment[offset..])
    }

    /// Run one segment through the channel bound to its destination port
    pub fn tcp_process(&mut self, header: &TcpHeader, src_ip: Ipv4Addr, payload: &[u8]) -> NetResult<()> {
        trace!(
            "tcp: {}:{} -> :{} {:?} seq {} ack {} len {}",
            src_ip,
            header.src_port,
            header.dst_port,
            header.flags,
            header.seq_number,
            header.ack_number,
            payload.len()
        );

        let port = header.dst_port;
        let index = self.tcp.match_port(port).ok_or_else(|| {
            warn!("tcp: no virtual channel for port {}", port);
            NetError::NoChannel(port)
        })?;

        let result = self.tcp_step(index, header, src_ip, payload);
        if let Err(err) = &result {
            let state = self.tcp.channel(index).map(VirtualChannel::state);
            warn!("tcp: port {}: {} (state {:?})", port, err, state);
        }
        result
    }

    fn tcp_step(&mut self, index: usize, header: &TcpHeader, src_ip: Ipv4Addr, payload: &[u8]) -> NetResult<()> {
        let port = header.dst_port;
        let flags = header.flags;
        let state = self.vc(index, port)?.state;

        match state {
            TcpState::Closed => {
                info!("tcp: port {}: closed, rebinding", port);
                self.tcp.reset(index);
            }
            TcpState::Listen => {
                if !flags.contains(TcpFlags::SYN) || flags.contains(TcpFlags::ACK) {
                    return Err(NetError::MissingFlag {
                        state,
                        flag: TcpFlags::SYN,
                    });
                }

                let vc = self.vc_mut(index, port)?;
                vc.guest = Endpoint {
                    ip: src_ip,
                    port: header.src_port,
                };
                // Trivial initial sequence number: the peer's own.
                vc.seq = header.seq_number;
                vc.ack = header.seq_number.wrapping_add(1);

                self.tcp_answer(index, port, TcpFlags::SYN);

                let vc = self.vc_mut(index, port)?;
                vc.seq = vc.seq.wrapping_add(1);
                vc.state = TcpState::SynReceived;
                info!("tcp: port {}: SYN from {}:{}", port, src_ip, header.src_port);
            }
            TcpState::SynReceived => {
                self.tcp_expect(index, header, src_ip, TcpFlags::ACK)?;
                self.tcp_answer(index, port, TcpFlags::empty());
                self.vc_mut(index, port)?.state = TcpState::Established;
                info!("tcp: port {}: established", port);
            }
            TcpState::Established => {
                self.tcp_expect(index, header, src_ip, TcpFlags::ACK)?;

                let vc = self.vc_mut(index, port)?;
                let (buffered, ack) = (vc.received().len(), vc.ack);
                vc.append(payload)?;
                vc.ack = vc.ack.wrapping_add(payload.len() as u32);

                let answered = if flags.contains(TcpFlags::PSH) {
                    self.tcp_push(index, port)
                } else if !payload.is_empty() {
                    self.tcp_send_ack(port, TcpFlags::empty())
                } else {
                    Ok(())
                };
                if let Err(err) = answered {
                    // Forget the segment so the peer's retransmission lines up again.
                    let vc = self.vc_mut(index, port)?;
                    vc.truncate(buffered);
                    vc.ack = ack;
                    return Err(err);
                }
            }
            TcpState::CloseWait => {
                if !flags.contains(TcpFlags::ACK) {
                    return Err(NetError::MissingFlag {
                        state,
                        flag: TcpFlags::ACK,
                    });
                }
                if !flags.contains(TcpFlags::FIN) {
                    trace!("tcp: port {}: waiting for FIN", port);
                    return Ok(());
                }
                self.tcp_expect(index, header, src_ip, TcpFlags::ACK | TcpFlags::FIN)?;

                let vc = self.vc_mut(index, port)?;
                vc.ack = vc.ack.wrapping_add(1);
                self.tcp_answer(index, port, TcpFlags::empty());
                self.vc_mut(index, port)?.state = TcpState::Listen;
                info!("tcp: port {}: closed, listening again", port);
            }
            TcpState::LastAck => self.tcp_answer(index, port, TcpFlags::FIN),
            TcpState::SynSent
            | TcpState::FinWait1
            | TcpState::Closing
            | TcpState::FinWait2
            | TcpState::TimeWait => {
                warn!("tcp: port {}: unimplemented state {:?}", port, state);
            }
        }
        Ok(())
    }

    /// Answer the buffered request and start closing the channel
    fn tcp_push(&mut self, index: usize, port: u16) -> NetResult<()> {
        let mut reply = [0u8; TCP_DATA_LEN];
        let reply_len = http_parse(self.vc(index, port)?.received(), &mut reply);
        self.tcp_send(port, TcpFlags::ACK | TcpFlags::PSH | TcpFlags::FIN, &reply[..reply_len])?;

        let vc = self.vc_mut(index, port)?;
        // One more for the FIN.
        vc.seq = vc.seq.wrapping_add(reply_len as u32 + 1);
        vc.clear_buffer();
        vc.state = TcpState::CloseWait;
        info!("tcp: port {}: answered {} bytes, closing", port, reply_len);
        Ok(())
    }

    /// Check flags, peer and sequence numbers of a segment on an open channel
    fn tcp_expect(&self, index: usize, header: &TcpHeader, src_ip: Ipv4Addr, required: TcpFlags) -> NetResult<()> {
        let vc = self.vc(index, header.dst_port)?;
        if !header.flags.contains(required) {
            return Err(NetError::MissingFlag {
                state: vc.state,
                flag: required,
            });
        }
        if src_ip != vc.guest.ip {
            return Err(NetError::WrongPeer {
                expected: vc.guest.ip,
                got: src_ip,
            });
        }
        if !vc.check_ack_seq(header.seq_number, header.ack_number) {
            return Err(NetError::SequenceMismatch {
                seq: header.seq_number,
                ack: header.ack_number,
            });
        }
        Ok(())
    }

    /// Send `payload` on the channel bound to `port` with its current numbers
    pub fn tcp_send(&mut self, port: u16, flags: TcpFlags, payload: &[u8]) -> NetResult<()> {
        let index = self.tcp.match_port(port).ok_or(NetError::NoChannel(port))?;
        let vc = self.vc(index, port)?;
        let (host, guest) = (vc.host, vc.guest);

        let len = TCP_HEADER_LEN + payload.len().min(TCP_DATA_LEN);
        let mut segment = [0u8; IP_DATA_LEN];
        let header = TcpHeader::new(host.port, guest.port, vc.seq, vc.ack, flags);
        segment[..TCP_HEADER_LEN].copy_from_slice(&header.to_bytes());
        segment[TCP_HEADER_LEN..len].copy_from_slice(&payload[..len - TCP_HEADER_LEN]);

        let mut checksum = segment_checksum(host.ip, guest.ip, &segment[..len]);
        if self.config.tcp_checksum_port_bias {
            checksum = checksum.wrapping_sub(host.port);
        }
        BigEndian::write_u16(&mut segment[16..18], checksum);

        trace!(
            "tcp: sending {:?} seq {} ack {} len {} to {}:{}",
            flags,
            header.seq_number,
            header.ack_number,
            len - TCP_HEADER_LEN,
            guest.ip,
            guest.port
        );
        self.ip_send(protocol::TCP, guest.ip, &segment[..len])
    }

    /// Send an empty segment with ACK plus `flags`
    pub fn tcp_send_ack(&mut self, port: u16, flags: TcpFlags) -> NetResult<()> {
        self.tcp_send(port, flags | TcpFlags::ACK, &[])
    }

    /// Control segments are fire and forget; the peer retransmits if one is lost.
    fn tcp_answer(&mut self, index: usize, port: u16, flags: TcpFlags) {
        if let Err(err) = self.tcp_send_ack(port, flags) {
            let state = self.tcp.channel(index).map(VirtualChannel::state);
            error!("tcp: port {}: send failed in {:?}: {}", port, state, err);
        }
    }

    fn vc(&self, index: usize, port: u16) -> NetResult<&VirtualChannel> {
        self.tcp.channel(index).ok_or(NetError::NoChannel(port))
    }

    fn vc_mut(&mut self, index: usize, port: u16) -> NetResult<&mut VirtualChannel> {
        self.tcp.channel_mut(index).ok_or(NetError::NoChannel(port))
    }
}
