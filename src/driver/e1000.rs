//! Descriptor-ring driver for the e1000 family
//!
//! One transmit and one receive ring of [`NUM_DESCRIPTORS`] legacy
//! descriptors, each paired with a fixed packet buffer. The driver never
//! blocks except in [`E1000::listen`] and the two timed waits.
//!
//! Ring ownership follows the hardware convention:
//! - TX: the slot at TDT is free when its Done bit is set. Software fills it,
//!   clears Done and moves TDT forward; hardware sets Done once sent.
//! - RX: the next frame to consume sits at RDT + 1. Hardware sets Done and
//!   End-of-Packet; software copies the frame out, clears the status and
//!   hands the slot back by moving RDT onto it.

use std::mem::size_of;
use std::ptr::{addr_of, addr_of_mut};
use std::sync::atomic::{fence, Ordering};
use std::time::Duration;

use bitflags::bitflags;
use log::{info, trace, warn};
use static_assertions::const_assert_eq;

use crate::driver::clock::{poll_until, Clock};
use crate::driver::regs::{self, Registers};
use crate::error::{NetError, NetResult};
use crate::network::ethernet::MacAddr;

pub const NUM_DESCRIPTORS: usize = 32;
pub const PACKET_BUFFER_SIZE: usize = 2048;

bitflags! {
    /// Descriptor status byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescStatus: u8 {
        const DONE = 0x01;
        const END_OF_PACKET = 0x02;
    }

    /// Transmit descriptor command byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxCommand: u8 {
        const END_OF_PACKET = 0x01;
        const REPORT_STATUS = 0x08;
    }
}

/// Legacy transmit descriptor
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TxDescriptor {
    pub buf_addr: u64,
    pub length: u16,
    pub cso: u8,
    pub cmd: u8,
    pub status: u8,
    pub css: u8,
    pub special: u16,
}

/// Legacy receive descriptor
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RxDescriptor {
    pub buf_addr: u64,
    pub length: u16,
    pub checksum: u16,
    pub status: u8,
    pub errors: u8,
    pub special: u16,
}

const_assert_eq!(size_of::<TxDescriptor>(), 16);
const_assert_eq!(size_of::<RxDescriptor>(), 16);

// Ring base addresses must be 128-byte aligned.
#[repr(C, align(128))]
struct TxRing([TxDescriptor; NUM_DESCRIPTORS]);

#[repr(C, align(128))]
struct RxRing([RxDescriptor; NUM_DESCRIPTORS]);

type PacketBuffer = [u8; PACKET_BUFFER_SIZE];

/// Translates kernel virtual addresses into bus addresses for DMA
pub trait PhysTranslate {
    fn phys_addr(&self, virt: *const u8) -> u64;
}

/// Bus address == virtual address, as in the software adapter model.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMap;

impl PhysTranslate for IdentityMap {
    fn phys_addr(&self, virt: *const u8) -> u64 {
        virt as u64
    }
}

pub struct E1000<R: Registers, C: Clock> {
    regs: R,
    clock: C,
    tx_ring: Box<TxRing>,
    rx_ring: Box<RxRing>,
    tx_bufs: Box<[PacketBuffer]>,
    rx_bufs: Box<[PacketBuffer]>,
}

impl<R: Registers, C: Clock> E1000<R, C> {
    /// Program both rings into the adapter behind `regs`
    pub fn attach(regs: R, clock: C, dma: &dyn PhysTranslate) -> Self {
        let mut nic = E1000 {
            regs,
            clock,
            tx_ring: Box::new(TxRing([TxDescriptor::default(); NUM_DESCRIPTORS])),
            rx_ring: Box::new(RxRing([RxDescriptor::default(); NUM_DESCRIPTORS])),
            tx_bufs: vec![[0u8; PACKET_BUFFER_SIZE]; NUM_DESCRIPTORS].into_boxed_slice(),
            rx_bufs: vec![[0u8; PACKET_BUFFER_SIZE]; NUM_DESCRIPTORS].into_boxed_slice(),
        };

        let mac = nic.mac_address();
        info!(
            "e1000: MAC {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        );

        nic.regs.write(regs::MTA, 0);
        nic.transmit_init(dma);
        nic.receive_init(dma);

        info!("e1000: status {:#010x}", nic.regs.read(regs::STATUS));
        nic
    }

    fn transmit_init(&mut self, dma: &dyn PhysTranslate) {
        for (desc, buf) in self.tx_ring.0.iter_mut().zip(self.tx_bufs.iter()) {
            desc.buf_addr = dma.phys_addr(buf.as_ptr());
            desc.cmd = (TxCommand::REPORT_STATUS | TxCommand::END_OF_PACKET).bits();
            desc.status = DescStatus::DONE.bits();
        }

        let base = dma.phys_addr(self.tx_ring.0.as_ptr().cast());
        self.regs.write(regs::TDBAL, base as u32);
        self.regs.write(regs::TDBAH, (base >> 32) as u32);
        self.regs.write(regs::TDLEN, size_of::<TxRing>() as u32);
        self.regs.write(regs::TDH, 0);
        self.regs.write(regs::TDT, 0);
        self.regs.write(
            regs::TCTL,
            regs::TCTL_EN
                | regs::TCTL_PSP
                | (regs::TCTL_CT & (0x10 << 4))
                | (regs::TCTL_COLD & (0x40 << 12)),
        );
        self.regs.write(regs::TIPG, regs::TIPG_DEFAULT);

        self.dump_tx_desc(0);
    }

    fn receive_init(&mut self, dma: &dyn PhysTranslate) {
        for (desc, buf) in self.rx_ring.0.iter_mut().zip(self.rx_bufs.iter()) {
            desc.buf_addr = dma.phys_addr(buf.as_ptr());
            desc.status &= !DescStatus::DONE.bits();
        }

        let base = dma.phys_addr(self.rx_ring.0.as_ptr().cast());
        self.regs.write(regs::RDBAL, base as u32);
        self.regs.write(regs::RDBAH, (base >> 32) as u32);
        self.regs.write(regs::RDLEN, size_of::<RxRing>() as u32);
        self.regs.write(regs::RDH, 0);
        self.regs.write(regs::RDT, (NUM_DESCRIPTORS - 1) as u32);
        self.regs.write(regs::RCTL, regs::RCTL_EN | regs::RCTL_BAM | regs::RCTL_SECRC);

        self.dump_rx_desc(0);
    }

    /// Queue one frame, truncated to the slot size
    ///
    /// Fails with [`NetError::QueueFull`] if the hardware has not finished
    /// with the slot at the tail yet.
    pub fn transmit(&mut self, frame: &[u8]) -> NetResult<()> {
        let len = frame.len().min(PACKET_BUFFER_SIZE);
        let tail = self.tx_tail();

        if !self.tx_status(tail).contains(DescStatus::DONE) {
            warn!("e1000: transmit queue is full");
            return Err(NetError::QueueFull);
        }

        self.tx_bufs[tail][..len].copy_from_slice(&frame[..len]);
        let desc = addr_of_mut!(self.tx_ring.0[tail]);
        // SAFETY: `desc` points into the ring we own; the hardware only
        // reads this slot once TDT moves past it below.
        unsafe {
            addr_of_mut!((*desc).length).write_volatile(len as u16);
            let status = addr_of!((*desc).status).read_volatile();
            addr_of_mut!((*desc).status).write_volatile(status & !DescStatus::DONE.bits());
        }
        self.dump_tx_desc(tail);

        fence(Ordering::Release);
        self.regs.write(regs::TDT, ((tail + 1) % NUM_DESCRIPTORS) as u32);
        Ok(())
    }

    /// Copy the next received frame into `buf`
    ///
    /// Returns the number of bytes copied, or 0 if no complete frame is
    /// waiting.
    pub fn receive(&mut self, buf: &mut [u8]) -> usize {
        let next = self.rx_next();
        self.dump_rx_desc(next);

        let status = self.rx_status(next);
        if !status.contains(DescStatus::DONE) {
            trace!("e1000: receive queue is empty");
            return 0;
        }
        if !status.contains(DescStatus::END_OF_PACKET) {
            warn!("e1000: receive status is not EOP");
            return 0;
        }
        fence(Ordering::Acquire);

        let desc = addr_of_mut!(self.rx_ring.0[next]);
        // SAFETY: Done is set, so the hardware has handed this slot back.
        let length = unsafe { addr_of!((*desc).length).read_volatile() } as usize;
        let len = length.min(buf.len()).min(PACKET_BUFFER_SIZE);
        buf[..len].copy_from_slice(&self.rx_bufs[next][..len]);

        // SAFETY: as above; the slot is ours until RDT is moved onto it.
        unsafe { addr_of_mut!((*desc).status).write_volatile(0) };
        self.regs.write(regs::RDT, next as u32);
        len
    }

    /// True if a received frame is waiting.
    pub fn rx_ready(&self) -> bool {
        self.rx_status(self.rx_next()).contains(DescStatus::DONE)
    }

    /// True if the transmit slot at the tail is free.
    pub fn tx_ready(&self) -> bool {
        self.tx_status(self.tx_tail()).contains(DescStatus::DONE)
    }

    /// Spin until a frame arrives. Never gives up.
    pub fn listen(&self) {
        while !self.rx_ready() {
            std::hint::spin_loop();
        }
    }

    /// Wait up to `timeout` for a frame to arrive
    pub fn timeout_listen(&self, timeout: Duration) -> NetResult<()> {
        if poll_until(&self.clock, timeout, || self.rx_ready()) {
            Ok(())
        } else {
            trace!("e1000: receive timeout ({} ms)", timeout.as_millis());
            Err(NetError::Timeout)
        }
    }

    /// Wait up to `timeout` for the transmit slot at the tail to free up
    pub fn timeout_transmit(&self, timeout: Duration) -> NetResult<()> {
        if poll_until(&self.clock, timeout, || self.tx_ready()) {
            Ok(())
        } else {
            trace!("e1000: transmit timeout ({} ms)", timeout.as_millis());
            Err(NetError::Timeout)
        }
    }

    /// MAC address from the receive address registers
    pub fn mac_address(&self) -> MacAddr {
        regs::mac_from_receive_address(self.regs.read(regs::RAL), self.regs.read(regs::RAH))
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn tx_tail(&self) -> usize {
        self.regs.read(regs::TDT) as usize % NUM_DESCRIPTORS
    }

    fn rx_next(&self) -> usize {
        (self.regs.read(regs::RDT) as usize + 1) % NUM_DESCRIPTORS
    }

    fn tx_status(&self, index: usize) -> DescStatus {
        // SAFETY: reading a field of a descriptor we own; volatile because
        // the hardware writes it behind our back.
        let status = unsafe { addr_of!(self.tx_ring.0[index].status).read_volatile() };
        DescStatus::from_bits_retain(status)
    }

    fn rx_status(&self, index: usize) -> DescStatus {
        // SAFETY: as in `tx_status`.
        let status = unsafe { addr_of!(self.rx_ring.0[index].status).read_volatile() };
        DescStatus::from_bits_retain(status)
    }

    fn dump_tx_desc(&self, index: usize) {
        let desc = &self.tx_ring.0[index];
        trace!(
            "e1000: TX desc {:02}: buf_addr {:#x} length {} cmd {:#04x} status {:#04x}",
            index,
            desc.buf_addr,
            desc.length,
            desc.cmd,
            self.tx_status(index).bits()
        );
    }

    fn dump_rx_desc(&self, index: usize) {
        let desc = &self.rx_ring.0[index];
        trace!(
            "e1000: RX desc {:02}: buf_addr {:#x} length {} checksum {:#06x} status {:#04x} errors {:#04x}",
            index,
            desc.buf_addr,
            desc.length,
            desc.checksum,
            self.rx_status(index).bits(),
            desc.errors
        );
    }
}
