//! Network adapter driver
//!
//! - [`regs`]: register offsets and the [`Registers`] access trait
//! - [`clock`]: cycle counters for bounded waits
//! - [`e1000`]: transmit/receive descriptor rings
//! - [`sim`]: software adapter used by tests and the TAP demo

pub mod clock;
pub mod e1000;
pub mod regs;
pub mod sim;

// Re-export commonly used items
pub use clock::{Clock, MonotonicClock};
#[cfg(target_arch = "x86_64")]
pub use clock::TscClock;
pub use e1000::{IdentityMap, PhysTranslate, E1000, NUM_DESCRIPTORS, PACKET_BUFFER_SIZE};
pub use regs::{MmioRegion, Registers};
pub use sim::SimulatedE1000;
