//! The processor core.
//!
//! - three 8-bit registers: A (accumulator), X and Y (index)
//! - 12-bit program counter stepping over 4-nibble instruction slots
//! - immediate and zero-indexed addressing

pub mod registers;
pub mod decode;
pub mod fetch;
pub mod execute;
pub mod machine;

pub use registers::{Register, Registers};
pub use decode::{AddrMode, DecodeError, Instruction, Opcode};
pub use fetch::FetchUnit;
pub use execute::{Cpu, CpuError, CpuState, Retired, Stage};
pub use machine::{Cycle, Machine, RunSummary};
