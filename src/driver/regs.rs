//! Adapter register window
//!
//! Registers are 32-bit little-endian words at fixed byte offsets. The stack
//! reaches them through the [`Registers`] trait so the same driver runs on a
//! real mapped window ([`MmioRegion`]) or on the software model in
//! [`crate::driver::sim`].

use std::ptr::NonNull;

pub const CTRL: usize = 0x0000;
pub const STATUS: usize = 0x0008;
pub const RCTL: usize = 0x0100;
pub const TCTL: usize = 0x0400;
pub const TIPG: usize = 0x0410;
pub const RDBAL: usize = 0x2800;
pub const RDBAH: usize = 0x2804;
pub const RDLEN: usize = 0x2808;
pub const RDH: usize = 0x2810;
pub const RDT: usize = 0x2818;
pub const TDBAL: usize = 0x3800;
pub const TDBAH: usize = 0x3804;
pub const TDLEN: usize = 0x3808;
pub const TDH: usize = 0x3810;
pub const TDT: usize = 0x3818;
pub const MTA: usize = 0x5200;
pub const RAL: usize = 0x5400;
pub const RAH: usize = 0x5404;

/// Size of the register window we touch.
pub const WINDOW_SIZE: usize = 0x8000;

// Transmit control
pub const TCTL_EN: u32 = 0x0000_0002;
pub const TCTL_PSP: u32 = 0x0000_0008;
pub const TCTL_CT: u32 = 0x0000_0ff0;
pub const TCTL_COLD: u32 = 0x003f_f000;
/// Recommended inter-packet gap for IEEE 802.3.
pub const TIPG_DEFAULT: u32 = 0x0060_200a;

// Receive control
pub const RCTL_EN: u32 = 0x0000_0002;
pub const RCTL_BAM: u32 = 0x0000_8000;
pub const RCTL_SECRC: u32 = 0x0400_0000;

/// Address Valid bit in RAH.
pub const RAH_AV: u32 = 0x8000_0000;

pub trait Registers {
    fn read(&self, offset: usize) -> u32;
    fn write(&mut self, offset: usize, value: u32);
}

/// A mapped register window accessed with volatile loads and stores
pub struct MmioRegion {
    base: NonNull<u32>,
    len: usize,
}

impl MmioRegion {
    /// # Safety
    ///
    /// `base` must point to a mapping of at least `len` bytes of device
    /// registers that stays valid for the lifetime of the region and is not
    /// accessed through any other path.
    pub unsafe fn new(base: NonNull<u32>, len: usize) -> Self {
        MmioRegion { base, len }
    }

    fn slot(&self, offset: usize) -> *mut u32 {
        assert!(offset % 4 == 0 && offset + 4 <= self.len, "register {:#x} outside window", offset);
        // SAFETY: offset is in bounds of the mapping promised in `new`.
        unsafe { self.base.as_ptr().add(offset / 4) }
    }
}

impl Registers for MmioRegion {
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `slot` checked the offset against the mapped window.
        u32::from_le(unsafe { self.slot(offset).read_volatile() })
    }

    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: as above.
        unsafe { self.slot(offset).write_volatile(value.to_le()) }
    }
}

/// Decode the MAC address held in RAL/RAH
pub fn mac_from_receive_address(ral: u32, rah: u32) -> [u8; 6] {
    let low = ral.to_le_bytes();
    let high = rah.to_le_bytes();
    [low[0], low[1], low[2], low[3], high[0], high[1]]
}
