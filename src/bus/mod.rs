//! The shared nibble bus.
//!
//! - `pins`: the physical ports and the per-cycle phase machine
//! - `arbiter`: ROM/RAM arbitration of the shared port
//! - `memory`: the backing stores the arbiter routes to

pub mod pins;
pub mod arbiter;
pub mod memory;

pub use pins::{BusInterface, CyclePhase, Pins};
pub use arbiter::{BusTransaction, MemoryArbiter, Response};
pub use memory::{MemoryError, Ram, Rom, RAM_ADDRESS_SPACE, ROM_ADDRESS_SPACE};

use thiserror::Error;

/// Faults on the shared bus.
///
/// Every one of these is fatal to the instruction in flight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("bus desync: fetch of reserved slot {address:#05x}")]
    Desync { address: u16 },

    #[error("fetch address {0:#x} exceeds the 12-bit ROM space")]
    AddressOverflow(u16),

    #[error("RAM write data {0:#x} does not fit in a nibble")]
    DataTooWide(u8),

    #[error("bus phase violation: {operation} during {phase:?}")]
    PhaseViolation { operation: &'static str, phase: CyclePhase },

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}
