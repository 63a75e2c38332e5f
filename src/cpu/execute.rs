//! Execution unit and sequencer.
//!
//! The core advances one bus cycle at a time. `drive` runs the
//! address-settle phase and `commit` runs the clock edge; whoever sits on
//! the other side of the bus supplies `shared_in` in between. A typical
//! instruction is three fetch cycles, plus the RAM read cycles when its
//! operand is zero-indexed.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::bus::{BusError, BusInterface, BusTransaction, MemoryError};
use crate::config::{MachineConfig, UnsupportedModePolicy};
use super::decode::{self, AddrMode, DecodeError, Instruction};
use super::fetch::FetchUnit;
use super::registers::Registers;

/// Core execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Held in reset, or waiting for the first edge after release.
    Reset,
    /// Fetching and executing.
    Running,
    /// A bus fault aborted the last instruction. Only reset recovers.
    Faulted,
}

/// What the sequencer is doing this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Fetching instruction nibbles.
    Fetch,
    /// Holding a RAM read for a zero-indexed operand.
    OperandRead {
        instruction: Instruction,
        pc: u16,
        remaining: u8,
    },
}

/// An instruction that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retired {
    /// Slot address the instruction was fetched from.
    pub pc: u16,
    pub instruction: Instruction,
    /// Operand after addressing-mode resolution.
    pub value: u8,
}

/// The core: register file, fetch unit and sequencer in one owned context.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Current execution state.
    pub state: CpuState,
    fetch: FetchUnit,
    stage: Stage,
    policy: UnsupportedModePolicy,
    ram_read_cycles: u8,
    /// Instructions retired since reset.
    retired: u64,
    last_retired: Option<Retired>,
}

impl Cpu {
    /// Create a core in reset with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&MachineConfig::default())
    }

    pub fn with_config(config: &MachineConfig) -> Self {
        Self {
            regs: Registers::new(),
            state: CpuState::Reset,
            fetch: FetchUnit::new(),
            stage: Stage::Fetch,
            policy: config.unsupported_mode,
            ram_read_cycles: config.ram_read_cycles.max(1),
            retired: 0,
            last_retired: None,
        }
    }

    /// Discard everything in flight and return to the reset state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.fetch.reset();
        self.stage = Stage::Fetch;
        self.state = CpuState::Reset;
        self.retired = 0;
        self.last_retired = None;
    }

    /// The transaction the core puts on the bus this cycle.
    pub fn request(&self) -> BusTransaction {
        match self.stage {
            Stage::Fetch => self.fetch.request(),
            Stage::OperandRead { instruction, .. } => {
                BusTransaction::RamRead { address: instruction.operand }
            }
        }
    }

    /// Address-settle phase: drive this cycle's outputs.
    ///
    /// Reset is sampled first, so a held reset clears a fault and keeps the
    /// outputs on address 0.
    pub fn drive(&mut self, bus: &mut BusInterface) -> Result<BusTransaction, CpuError> {
        if bus.pins().reset_active() {
            self.reset();
        }
        if self.state == CpuState::Faulted {
            return Err(CpuError::Faulted);
        }

        let transaction = self.request();
        bus.drive(&transaction).map_err(|e| self.fault(e.into()))?;
        Ok(transaction)
    }

    /// Clock edge: take the sampled input and advance the sequencer.
    ///
    /// Returns the instruction that retired on this edge, if any.
    pub fn commit(&mut self, bus: &mut BusInterface) -> Result<Option<Retired>, CpuError> {
        if bus.pins().reset_active() {
            self.reset();
        }
        if self.state == CpuState::Faulted {
            return Err(CpuError::Faulted);
        }

        let value = bus.advance_cycle().map_err(|e| self.fault(e.into()))?;

        if bus.pins().reset_active() {
            self.reset();
            return Ok(None);
        }

        if self.state == CpuState::Reset {
            // The first edge after release only brings the core out of reset.
            self.state = CpuState::Running;
            debug!("leaving reset");
            return Ok(None);
        }

        match self.stage {
            Stage::Fetch => {
                let pc = self.fetch.pc();
                match self.fetch.latch(value) {
                    Some(word) => self.dispatch(word, pc),
                    None => Ok(None),
                }
            }
            Stage::OperandRead { instruction, pc, remaining } => {
                if remaining > 1 {
                    self.stage = Stage::OperandRead { instruction, pc, remaining: remaining - 1 };
                    return Ok(None);
                }
                self.stage = Stage::Fetch;
                Ok(Some(self.execute(instruction, pc, value)))
            }
        }
    }

    /// Mark the core faulted. Returns the error for propagation.
    pub fn fault(&mut self, error: CpuError) -> CpuError {
        warn!(%error, pc = self.fetch.pc(), "core faulted");
        self.state = CpuState::Faulted;
        self.stage = Stage::Fetch;
        error
    }

    /// Resolve the addressing mode of a freshly fetched word.
    fn dispatch(&mut self, word: u16, pc: u16) -> Result<Option<Retired>, CpuError> {
        let instruction = decode::decode(u32::from(word)).map_err(|e| self.fault(e.into()))?;

        match instruction.mode {
            AddrMode::Immediate => Ok(Some(self.execute(instruction, pc, instruction.operand))),
            AddrMode::ZeroIndexed => {
                self.stage = Stage::OperandRead {
                    instruction,
                    pc,
                    remaining: self.ram_read_cycles,
                };
                Ok(None)
            }
            AddrMode::Unsupported(mode) => {
                warn!(pc, mode, policy = ?self.policy, "unsupported addressing mode");
                let retired = match self.policy {
                    UnsupportedModePolicy::Immediate => {
                        self.execute(instruction, pc, instruction.operand)
                    }
                    UnsupportedModePolicy::Nop => self.retire(instruction, pc, instruction.operand),
                };
                Ok(Some(retired))
            }
        }
    }

    /// Commit the resolved operand to the opcode's target register.
    fn execute(&mut self, instruction: Instruction, pc: u16, value: u8) -> Retired {
        if let Some(register) = instruction.opcode.target() {
            self.regs.set(register, value);
        }
        self.retire(instruction, pc, value)
    }

    fn retire(&mut self, instruction: Instruction, pc: u16, value: u8) -> Retired {
        let retired = Retired { pc, instruction, value };
        self.retired += 1;
        self.last_retired = Some(retired);
        debug!(
            pc,
            opcode = ?instruction.opcode,
            mode = ?instruction.mode,
            value,
            a = self.regs.a,
            x = self.regs.x,
            y = self.regs.y,
            "retired"
        );
        retired
    }

    /// Address of the instruction slot being fetched.
    pub fn pc(&self) -> u16 {
        self.fetch.pc()
    }

    /// The three latched fetch nibbles.
    pub fn fetch_nibbles(&self) -> [u8; 3] {
        self.fetch.nibbles()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Instructions retired since the last reset.
    pub fn retired_count(&self) -> u64 {
        self.retired
    }

    pub fn last_retired(&self) -> Option<Retired> {
        self.last_retired
    }

    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    pub fn is_faulted(&self) -> bool {
        self.state == CpuState::Faulted
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("pc", &self.fetch.pc())
            .field("stage", &self.stage)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("bus fault: {0}")]
    Bus(#[from] BusError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("core is faulted; assert reset to recover")]
    Faulted,

    #[error("core is disabled")]
    Disabled,

    #[error("no instruction retired within {0} cycles")]
    CycleLimit(u64),
}
