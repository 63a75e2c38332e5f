//! A complete machine: core, bus interface and memory arbiter on one clock.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::bus::{BusInterface, BusTransaction, MemoryArbiter, Pins, Ram, Rom};
use crate::bus::memory::MemoryError;
use crate::config::MachineConfig;
use super::decode::{encode, rom_slot, Instruction, SLOT_NIBBLES};
use super::execute::{Cpu, CpuError, Retired};

/// What happened on one clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    /// Transaction on the bus, or `None` when the core was not clocked.
    pub transaction: Option<BusTransaction>,
    /// Value sampled from `shared_in`.
    pub data: u8,
    /// Instruction that retired on this edge.
    pub retired: Option<Retired>,
}

impl Cycle {
    fn idle() -> Self {
        Self { transaction: None, data: 0, retired: None }
    }
}

/// Totals for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub instructions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub cpu: Cpu,
    pub bus: BusInterface,
    pub memory: MemoryArbiter,
    config: MachineConfig,
}

impl Machine {
    /// Build a machine with zeroed stores sized by `config`.
    pub fn new(config: MachineConfig) -> Result<Self, MemoryError> {
        let rom = Rom::new(config.rom_size)?;
        let ram = Ram::new(config.ram_size)?;
        Ok(Self::with_stores(config, rom, ram))
    }

    /// Build a machine around stores supplied by the host.
    pub fn with_stores(config: MachineConfig, rom: Rom, ram: Ram) -> Self {
        Self {
            cpu: Cpu::with_config(&config),
            bus: BusInterface::new(),
            memory: MemoryArbiter::new(rom, ram),
            config,
        }
    }

    /// Burn raw nibbles into ROM from address 0.
    pub fn load_rom(&mut self, nibbles: &[u8]) -> Result<(), CpuError> {
        self.memory.rom_mut().load(0, nibbles)?;
        Ok(())
    }

    /// Lay instruction words into ROM slots from address 0.
    pub fn load_program(&mut self, words: &[u16]) -> Result<(), CpuError> {
        let mut nibbles = Vec::with_capacity(words.len() * SLOT_NIBBLES);
        for &word in words {
            nibbles.extend_from_slice(&rom_slot(word)?);
        }
        self.load_rom(&nibbles)
    }

    /// Encode and load decoded instructions.
    pub fn load_instructions(&mut self, instructions: &[Instruction]) -> Result<(), CpuError> {
        let words: Vec<u16> = instructions.iter().map(encode).collect();
        self.load_program(&words)
    }

    /// Copy bytes into RAM from address 0.
    pub fn load_ram(&mut self, bytes: &[u8]) -> Result<(), CpuError> {
        self.memory.ram_mut().load(0, bytes)?;
        Ok(())
    }

    /// Drive the reset line. Asserting it discards the core state at once.
    pub fn set_reset(&mut self, active: bool) {
        self.bus.set_reset(active);
        if active {
            self.cpu.reset();
        }
        debug!(active, "reset line");
    }

    /// Assert and release reset. Fetch restarts at 0 after the next edge.
    pub fn reset(&mut self) {
        self.set_reset(true);
        self.set_reset(false);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.bus.set_enabled(enabled);
    }

    /// Run one full bus cycle.
    pub fn clock(&mut self) -> Result<Cycle, CpuError> {
        if !self.bus.pins().enabled {
            return Ok(Cycle::idle());
        }

        let transaction = self.cpu.drive(&mut self.bus)?;

        // While reset is held nothing answers and the port reads low.
        let data = if self.bus.pins().reset_active() {
            0
        } else {
            match self.memory.service(self.bus.pins()) {
                Ok(response) => response.data,
                Err(e) => {
                    self.bus.abort_cycle();
                    return Err(self.cpu.fault(e.into()));
                }
            }
        };

        if let Err(e) = self.bus.supply_input(data) {
            self.bus.abort_cycle();
            return Err(self.cpu.fault(e.into()));
        }

        let retired = self.cpu.commit(&mut self.bus)?;
        Ok(Cycle { transaction: Some(transaction), data, retired })
    }

    /// Clock until one instruction retires.
    pub fn step_instruction(&mut self) -> Result<Retired, CpuError> {
        if !self.bus.pins().enabled {
            return Err(CpuError::Disabled);
        }

        let limit = self.config.max_cycles;
        for _ in 0..limit {
            if let Some(retired) = self.clock()?.retired {
                return Ok(retired);
            }
        }
        Err(CpuError::CycleLimit(limit))
    }

    /// Clock `cycles` times.
    pub fn run(&mut self, cycles: u64) -> Result<RunSummary, CpuError> {
        let mut summary = RunSummary::default();
        for _ in 0..cycles {
            let cycle = self.clock()?;
            summary.cycles += 1;
            if cycle.retired.is_some() {
                summary.instructions += 1;
            }
        }
        Ok(summary)
    }

    /// Clock until `count` instructions retire or the cycle limit is hit.
    pub fn run_instructions(&mut self, count: u64) -> Result<RunSummary, CpuError> {
        let mut summary = RunSummary::default();
        while summary.instructions < count {
            if summary.cycles >= self.config.max_cycles {
                return Err(CpuError::CycleLimit(self.config.max_cycles));
            }
            let cycle = self.clock()?;
            summary.cycles += 1;
            if cycle.retired.is_some() {
                summary.instructions += 1;
            }
        }
        Ok(summary)
    }

    pub fn pins(&self) -> &Pins {
        self.bus.pins()
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::with_stores(MachineConfig::default(), Rom::default(), Ram::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusError;
    use crate::cpu::decode::Opcode;
    use crate::cpu::execute::CpuState;
    use crate::cpu::registers::{Register, Registers};
    use proptest::prelude::*;

    fn machine_with(instructions: &[Instruction], ram: &[u8]) -> Machine {
        let mut machine = Machine::default();
        machine.load_instructions(instructions).unwrap();
        machine.load_ram(ram).unwrap();
        machine
    }

    fn opcode_for(register: Register) -> Opcode {
        match register {
            Register::A => Opcode::Lda,
            Register::X => Opcode::Ldx,
            Register::Y => Opcode::Ldy,
        }
    }

    #[test]
    fn test_scenario_fetch_nibbles() {
        let rom = [4, 8, 12, 0, 1, 3, 5, 0, 9, 11, 13, 0, 2, 6, 10, 0];
        let mut machine = Machine::default();
        machine.load_rom(&rom).unwrap();

        machine.run(4).unwrap();
        assert_eq!(machine.cpu.fetch_nibbles(), [4, 8, 12]);
        machine.run(3).unwrap();
        assert_eq!(machine.cpu.fetch_nibbles(), [1, 3, 5]);
    }

    #[test]
    fn test_scenario_load_immediates() {
        let mut machine = machine_with(
            &[
                Instruction::immediate(Opcode::Lda, 1),
                Instruction::immediate(Opcode::Ldx, 2),
                Instruction::immediate(Opcode::Ldy, 3),
                Instruction::nop(),
            ],
            &[],
        );

        let summary = machine.run_instructions(4).unwrap();
        assert_eq!(summary, RunSummary { cycles: 13, instructions: 4 });
        assert_eq!(machine.cpu.regs, Registers { a: 1, x: 2, y: 3 });
    }

    #[test]
    fn test_scenario_zero_indexed_loads() {
        let mut machine = machine_with(
            &[
                Instruction::zero_indexed(Opcode::Ldy, 0),
                Instruction::zero_indexed(Opcode::Ldx, 1),
            ],
            &[4, 2],
        );

        let first = machine.step_instruction().unwrap();
        assert_eq!(first.value, 4);
        assert_eq!(machine.cpu.regs.y, 4);
        assert_eq!(machine.cpu.regs.x, 0);

        machine.step_instruction().unwrap();
        assert_eq!(machine.cpu.regs, Registers { a: 0, x: 2, y: 4 });
        assert_eq!(&machine.memory.ram().as_slice()[..2], &[4, 2]);
        assert_eq!(machine.bus.cycles(), 13);
    }

    #[test]
    fn test_bus_trace_for_memory_operand() {
        let mut machine = machine_with(&[Instruction::zero_indexed(Opcode::Lda, 9)], &[]);
        let trace: Vec<BusTransaction> = (0..7)
            .map(|_| machine.clock().unwrap().transaction.unwrap())
            .collect();

        assert_eq!(
            trace,
            [
                BusTransaction::RomFetch { address: 0 },
                BusTransaction::RomFetch { address: 0 },
                BusTransaction::RomFetch { address: 1 },
                BusTransaction::RomFetch { address: 2 },
                BusTransaction::RamRead { address: 9 },
                BusTransaction::RamRead { address: 9 },
                BusTransaction::RamRead { address: 9 },
            ]
        );
        assert_eq!(machine.clock().unwrap().transaction, Some(BusTransaction::RomFetch { address: 4 }));
    }

    #[test]
    fn test_ram_read_latency_is_configurable() {
        let config = MachineConfig { ram_read_cycles: 1, ..MachineConfig::default() };
        let mut machine = Machine::new(config).unwrap();
        machine
            .load_instructions(&[Instruction::zero_indexed(Opcode::Lda, 0)])
            .unwrap();
        machine.load_ram(&[0x77]).unwrap();

        let summary = machine.run_instructions(1).unwrap();
        assert_eq!(summary.cycles, 5);
        assert_eq!(machine.cpu.regs.a, 0x77);
    }

    #[test]
    fn test_rom_out_of_range_faults() {
        let config = MachineConfig { rom_size: 4, ..MachineConfig::default() };
        let mut machine = Machine::new(config).unwrap();
        machine
            .load_instructions(&[Instruction::immediate(Opcode::Lda, 3)])
            .unwrap();

        machine.step_instruction().unwrap();
        let err = machine.clock().unwrap_err();
        assert_eq!(
            err,
            CpuError::Bus(BusError::Memory(MemoryError::RomOutOfRange { address: 4, size: 4 }))
        );
        assert!(machine.cpu.is_faulted());
        assert_eq!(machine.clock().unwrap_err(), CpuError::Faulted);
        assert_eq!(machine.cpu.regs.a, 3);

        machine.reset();
        assert_eq!(machine.cpu.state, CpuState::Reset);
        assert!(machine.clock().is_ok());
    }

    #[test]
    fn test_ram_out_of_range_aborts_without_commit() {
        let config = MachineConfig { ram_size: 2, ..MachineConfig::default() };
        let mut machine = Machine::new(config).unwrap();
        machine
            .load_instructions(&[Instruction::zero_indexed(Opcode::Ldx, 8)])
            .unwrap();

        let err = machine.step_instruction().unwrap_err();
        assert!(matches!(err, CpuError::Bus(BusError::Memory(MemoryError::RamOutOfRange { .. }))));
        assert_eq!(machine.cpu.regs.x, 0);
        assert_eq!(machine.cpu.retired_count(), 0);
    }

    #[test]
    fn test_disabled_core_does_not_advance() {
        let mut machine = machine_with(&[Instruction::immediate(Opcode::Lda, 5)], &[]);
        machine.set_enabled(false);
        let summary = machine.run(20).unwrap();
        assert_eq!(summary.instructions, 0);
        assert_eq!(machine.bus.cycles(), 0);
        assert_eq!(machine.step_instruction(), Err(CpuError::Disabled));

        machine.set_enabled(true);
        machine.step_instruction().unwrap();
        assert_eq!(machine.cpu.regs.a, 5);
    }

    #[test]
    fn test_reset_mid_operand_read() {
        let mut machine = machine_with(
            &[
                Instruction::immediate(Opcode::Ldy, 6),
                Instruction::zero_indexed(Opcode::Lda, 0),
            ],
            &[0x99],
        );
        // wake + 3 fetches + 3 fetches + 1 of the RAM read cycles
        machine.run(8).unwrap();
        assert_eq!(machine.cpu.regs.y, 6);

        machine.set_reset(true);
        assert!(machine.cpu.regs.is_zero());
        machine.run(3).unwrap();
        machine.set_reset(false);

        let cycle = machine.clock().unwrap();
        assert_eq!(cycle.transaction, Some(BusTransaction::RomFetch { address: 0 }));
        assert!(cycle.retired.is_none());
        assert_eq!(machine.cpu.regs.a, 0);

        let retired = machine.step_instruction().unwrap();
        assert_eq!(retired.pc, 0);
        assert_eq!(machine.cpu.regs, Registers { a: 0, x: 0, y: 6 });
    }

    #[test]
    fn test_reset_pin_recovers_faulted_machine() {
        let config = MachineConfig { rom_size: 4, ..MachineConfig::default() };
        let mut machine = Machine::new(config).unwrap();
        machine
            .load_instructions(&[Instruction::immediate(Opcode::Ldx, 4)])
            .unwrap();
        machine.run_instructions(1).unwrap();
        assert!(machine.clock().is_err());
        assert!(machine.cpu.is_faulted());

        machine.bus.set_reset(true);
        let cycle = machine.clock().unwrap();
        assert_eq!(cycle.transaction, Some(BusTransaction::RomFetch { address: 0 }));
        assert_eq!(machine.cpu.state, CpuState::Reset);
        machine.bus.set_reset(false);

        machine.step_instruction().unwrap();
        assert_eq!(machine.cpu.regs.x, 4);
    }

    #[test]
    fn test_step_instruction_cycle_limit() {
        let config = MachineConfig { max_cycles: 10, ..MachineConfig::default() };
        let mut machine = Machine::new(config).unwrap();
        machine.set_reset(true);
        assert_eq!(machine.step_instruction(), Err(CpuError::CycleLimit(10)));
    }

    #[test]
    fn test_load_program_rejects_wide_operand() {
        let mut machine = Machine::default();
        let word = encode(&Instruction::immediate(Opcode::Lda, 0x10));
        assert!(matches!(machine.load_program(&[word]), Err(CpuError::Decode(_))));
    }

    fn arb_instruction() -> impl Strategy<Value = Instruction> {
        (0u8..32, 0u8..8, 0u8..16).prop_map(|(opcode, mode, operand)| {
            Instruction::new(
                Opcode::from_bits(opcode),
                crate::cpu::decode::AddrMode::from_bits(mode),
                operand,
            )
        })
    }

    fn arb_register() -> impl Strategy<Value = Register> {
        prop_oneof![Just(Register::A), Just(Register::X), Just(Register::Y)]
    }

    proptest! {
        #[test]
        fn prop_load_immediate_touches_only_target(
            register in arb_register(),
            value in 0u8..16,
            a in any::<u8>(),
            x in any::<u8>(),
            y in any::<u8>(),
        ) {
            let mut machine = machine_with(&[Instruction::immediate(opcode_for(register), value)], &[]);
            machine.clock().unwrap();
            machine.cpu.regs = Registers { a, x, y };

            machine.step_instruction().unwrap();

            let mut expected = Registers { a, x, y };
            expected.set(register, value);
            prop_assert_eq!(machine.cpu.regs, expected);
        }

        #[test]
        fn prop_zero_indexed_reads_ram_without_mutating(
            register in arb_register(),
            address in 0u8..16,
            ram in proptest::collection::vec(any::<u8>(), 256),
        ) {
            let mut machine = machine_with(&[Instruction::zero_indexed(opcode_for(register), address)], &ram);

            machine.step_instruction().unwrap();

            prop_assert_eq!(machine.cpu.regs.get(register), ram[address as usize]);
            prop_assert_eq!(machine.memory.ram().as_slice(), &ram[..]);
        }

        #[test]
        fn prop_fetch_never_requests_padding_slot(
            program in proptest::collection::vec(arb_instruction(), 1..32),
            cycles in 1u64..600,
        ) {
            let mut machine = machine_with(&program, &[]);
            for _ in 0..cycles {
                if let Some(BusTransaction::RomFetch { address }) = machine.clock().unwrap().transaction {
                    prop_assert_ne!(address & 3, 3);
                }
            }
        }

        #[test]
        fn prop_reset_is_idempotent(
            program in proptest::collection::vec(arb_instruction(), 1..16),
            ram in proptest::collection::vec(any::<u8>(), 256),
            before in 0u64..200,
            held in 0u64..5,
        ) {
            let mut machine = machine_with(&program, &ram);
            machine.run(before).unwrap();

            machine.set_reset(true);
            machine.run(held).unwrap();
            machine.set_reset(false);

            prop_assert_eq!(machine.cpu.pc(), 0);
            prop_assert!(machine.cpu.regs.is_zero());
            prop_assert_eq!(machine.cpu.state, CpuState::Reset);

            machine.clock().unwrap();
            let next = machine.clock().unwrap();
            prop_assert_eq!(next.transaction, Some(BusTransaction::RomFetch { address: 0 }));
        }
    }
}
