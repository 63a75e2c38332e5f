//! # nibbus
//!
//! A cycle-stepped simulator of a small microprocessor core that fetches
//! both instructions and data over one narrow, time-multiplexed bus.
//!
//! ROM and RAM share an 8-bit output port and an 8-bit bidirectional port.
//! A couple of control bits on the shared port decide, every cycle, whether
//! the core is fetching an instruction nibble from ROM or reading/writing a
//! RAM byte. Instructions arrive as three nibbles per 4-address slot.

pub mod bus;
pub mod cpu;
pub mod asm;
pub mod config;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use bus::{BusError, BusInterface, BusTransaction, MemoryArbiter, Pins, Ram, Rom};
pub use cpu::{Cpu, CpuError, CpuState, Instruction, Machine, Registers, Retired};
pub use asm::{assemble, disassemble, load_image, save_image, AssemblerError, RomImage};
pub use config::{ConfigError, MachineConfig, UnsupportedModePolicy};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
