//! Software model of the adapter
//!
//! Implements [`Registers`] over a plain register file and plays the
//! hardware side of both rings: writes to TDT send every pending transmit
//! descriptor, and [`SimulatedE1000::inject`] delivers a frame the way the
//! adapter's receive DMA would.
//!
//! Descriptor and buffer addresses are dereferenced directly, so the driver
//! must be attached with [`IdentityMap`](crate::driver::e1000::IdentityMap).
//! That is why the constructors are `unsafe`.

use std::collections::VecDeque;
use std::ptr::{addr_of, addr_of_mut};

use log::{debug, trace};

use crate::driver::e1000::{DescStatus, RxDescriptor, TxDescriptor, PACKET_BUFFER_SIZE};
use crate::driver::regs::{self, Registers};
use crate::network::ethernet::MacAddr;

/// Link up, full duplex.
const STATUS_LINK_UP: u32 = 0x0000_0003;

pub struct SimulatedE1000 {
    regs: Vec<u32>,
    auto_transmit: bool,
    transmitted: VecDeque<Vec<u8>>,
}

impl SimulatedE1000 {
    /// An adapter that sends frames as soon as TDT moves
    ///
    /// # Safety
    ///
    /// The adapter walks whatever ring and buffer addresses are written to
    /// its TDBA/RDBA registers and descriptors. The caller must hand it to
    /// exactly one [`E1000::attach`](crate::driver::e1000::E1000::attach)
    /// with [`IdentityMap`](crate::driver::e1000::IdentityMap), must not
    /// program the ring base, length or descriptor registers by any other
    /// path, and must not move it out of that driver (for instance by
    /// swapping through `registers_mut`) while the driver's rings are live.
    pub unsafe fn new(mac: MacAddr) -> Self {
        let mut regs = vec![0u32; regs::WINDOW_SIZE / 4];
        regs[regs::STATUS / 4] = STATUS_LINK_UP;
        regs[regs::RAL / 4] = u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]);
        regs[regs::RAH / 4] = u32::from_le_bytes([mac[4], mac[5], 0, 0]) | regs::RAH_AV;

        SimulatedE1000 {
            regs,
            auto_transmit: true,
            transmitted: VecDeque::new(),
        }
    }

    /// An adapter that only sends when told to with [`Self::complete_transmits`]
    ///
    /// # Safety
    ///
    /// Same contract as [`Self::new`].
    pub unsafe fn stalled(mac: MacAddr) -> Self {
        SimulatedE1000 {
            auto_transmit: false,
            // SAFETY: the caller upholds the contract of `new`.
            ..unsafe { Self::new(mac) }
        }
    }

    /// Oldest frame sent and not yet taken
    pub fn take_transmitted(&mut self) -> Option<Vec<u8>> {
        self.transmitted.pop_front()
    }

    pub fn drain_transmitted(&mut self) -> Vec<Vec<u8>> {
        self.transmitted.drain(..).collect()
    }

    /// Send every pending descriptor starting at TDH
    ///
    /// A descriptor is pending while its Done bit is clear. Walking the
    /// status rather than stopping at TDT lets a completely filled ring
    /// (TDH == TDT) drain as well.
    pub fn complete_transmits(&mut self) {
        if self.reg(regs::TCTL) & regs::TCTL_EN == 0 {
            return;
        }
        let Some((base, count)) = self.ring(regs::TDBAL, regs::TDBAH, regs::TDLEN) else {
            return;
        };
        let base = base as *mut TxDescriptor;
        let mut head = self.reg(regs::TDH) as usize % count;

        for _ in 0..count {
            // SAFETY: per the contract of `new`, only the owning driver
            // programmed TDBAL/TDBAH/TDLEN, with the identity-mapped address
            // of a ring it still owns, and every buffer address in it with a
            // buffer of PACKET_BUFFER_SIZE bytes.
            unsafe {
                let desc = base.add(head);
                if addr_of!((*desc).status).read_volatile() & DescStatus::DONE.bits() != 0 {
                    break;
                }
                let addr = addr_of!((*desc).buf_addr).read_volatile() as *const u8;
                let len = (addr_of!((*desc).length).read_volatile() as usize).min(PACKET_BUFFER_SIZE);
                let frame = std::slice::from_raw_parts(addr, len).to_vec();
                trace!("sim: sent {} bytes from TX desc {}", len, head);
                self.transmitted.push_back(frame);

                let status = addr_of!((*desc).status).read_volatile();
                addr_of_mut!((*desc).status).write_volatile(status | DescStatus::DONE.bits());
            }
            head = (head + 1) % count;
        }
        self.regs[regs::TDH / 4] = head as u32;
    }

    /// Deliver a frame into the receive ring
    ///
    /// Returns false if receive is disabled or no descriptor is available.
    pub fn inject(&mut self, frame: &[u8]) -> bool {
        self.deliver(frame, DescStatus::DONE | DescStatus::END_OF_PACKET)
    }

    /// Deliver a frame whose descriptor lacks End-of-Packet
    pub fn inject_fragment(&mut self, frame: &[u8]) -> bool {
        self.deliver(frame, DescStatus::DONE)
    }

    fn deliver(&mut self, frame: &[u8], status: DescStatus) -> bool {
        if self.reg(regs::RCTL) & regs::RCTL_EN == 0 {
            debug!("sim: receive disabled, dropping frame");
            return false;
        }
        let Some((base, count)) = self.ring(regs::RDBAL, regs::RDBAH, regs::RDLEN) else {
            return false;
        };
        let head = self.reg(regs::RDH) as usize % count;
        let tail = self.reg(regs::RDT) as usize % count;
        if head == tail {
            debug!("sim: receive ring full, dropping frame");
            return false;
        }

        let len = frame.len().min(PACKET_BUFFER_SIZE);
        // SAFETY: as in `complete_transmits`, for the receive ring. The slot
        // at RDH belongs to the hardware side until Done is set.
        unsafe {
            let desc = (base as *mut RxDescriptor).add(head);
            let addr = addr_of!((*desc).buf_addr).read_volatile() as *mut u8;
            std::ptr::copy_nonoverlapping(frame.as_ptr(), addr, len);
            addr_of_mut!((*desc).length).write_volatile(len as u16);
            addr_of_mut!((*desc).errors).write_volatile(0);
            addr_of_mut!((*desc).status).write_volatile(status.bits());
        }
        trace!("sim: received {} bytes into RX desc {}", len, head);

        self.regs[regs::RDH / 4] = ((head + 1) % count) as u32;
        true
    }

    fn ring(&self, low: usize, high: usize, len: usize) -> Option<(usize, usize)> {
        let base = (self.reg(high) as u64) << 32 | self.reg(low) as u64;
        let count = self.reg(len) as usize / 16;
        if base == 0 || count == 0 {
            None
        } else {
            Some((base as usize, count))
        }
    }

    /// Offsets outside the window read as zero.
    fn reg(&self, offset: usize) -> u32 {
        self.regs.get(offset / 4).copied().unwrap_or(0)
    }
}

impl Registers for SimulatedE1000 {
    fn read(&self, offset: usize) -> u32 {
        self.reg(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        let Some(slot) = self.regs.get_mut(offset / 4) else {
            debug!("sim: write to {:#x} outside register window ignored", offset);
            return;
        };
        *slot = value;
        if offset == regs::TDT && self.auto_transmit {
            self.complete_transmits();
        }
    }
}
