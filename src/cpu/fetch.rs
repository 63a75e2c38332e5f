//! Instruction fetch unit.
//!
//! Owns the 12-bit program counter. An instruction takes three ROM fetch
//! cycles at `pc`, `pc + 1` and `pc + 2`; the fourth address of the slot is
//! padding and is never put on the bus.

use serde::{Serialize, Deserialize};

use crate::bus::BusTransaction;
use super::decode::assemble_nibbles;

/// Mask for the 12-bit program counter.
pub const PC_MASK: u16 = 0x0FFF;
/// ROM addresses per instruction slot.
pub const INSTRUCTION_STRIDE: u16 = 4;
/// Fetch cycles per instruction.
pub const FETCH_CYCLES: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FetchUnit {
    pc: u16,
    slot: u8,
    nibbles: [u8; 3],
}

impl FetchUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to address 0 with nothing latched.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The transaction this unit wants on the bus this cycle.
    pub fn request(&self) -> BusTransaction {
        BusTransaction::RomFetch { address: self.fetch_address() }
    }

    /// ROM address of the nibble currently being fetched.
    pub fn fetch_address(&self) -> u16 {
        (self.pc + u16::from(self.slot)) & PC_MASK
    }

    /// Capture one fetched nibble at the clock edge.
    ///
    /// Returns the assembled word once the third nibble lands, at which
    /// point the program counter has moved to the next slot.
    pub fn latch(&mut self, value: u8) -> Option<u16> {
        self.nibbles[self.slot as usize] = value & 0x0F;
        self.slot += 1;

        if self.slot < FETCH_CYCLES {
            return None;
        }

        self.slot = 0;
        self.pc = (self.pc + INSTRUCTION_STRIDE) & PC_MASK;
        Some(assemble_nibbles(self.nibbles))
    }

    /// Address of the instruction slot being fetched.
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Nibbles fetched into the current slot so far.
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// The latched nibbles. They hold their values until overwritten.
    pub fn nibbles(&self) -> [u8; 3] {
        self.nibbles
    }
}
