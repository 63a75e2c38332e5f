//! WebAssembly bindings for the nibbus simulator.
//!
//! JavaScript-friendly wrappers around `Machine`.

use serde::Serialize;
use wasm_bindgen::prelude::*;
use crate::{Machine, MachineConfig};
use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_word;
use crate::cpu::decode::encode;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[derive(Serialize)]
struct Snapshot {
    a: u8,
    x: u8,
    y: u8,
    pc: u16,
    state: String,
    cycles: u64,
    retired: u64,
    primary_out: u8,
    shared_out: u8,
    shared_in: u8,
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine,
    program: Vec<u16>,
    ram: Vec<u8>,
}

#[wasm_bindgen]
impl WasmMachine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            machine: Machine::default(),
            program: Vec::new(),
            ram: Vec::new(),
        }
    }

    /// Assemble and load a program. Returns the instruction count.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let words = assemble(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        self.program = words;
        self.reload()?;
        Ok(self.program.len())
    }

    /// Preload RAM from address 0.
    #[wasm_bindgen]
    pub fn load_ram(&mut self, bytes: &[u8]) -> Result<(), JsError> {
        self.ram = bytes.to_vec();
        self.reload()
    }

    /// Run one bus cycle. Returns the transaction text.
    #[wasm_bindgen]
    pub fn clock(&mut self) -> Result<String, JsError> {
        let cycle = self.machine.clock()
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(cycle.transaction.map(|t| t.to_string()).unwrap_or_default())
    }

    /// Run one instruction. Returns its disassembly.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let retired = self.machine.step_instruction()
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(disassemble_word(encode(&retired.instruction)))
    }

    /// Clock `cycles` times. Returns the number of instructions retired.
    #[wasm_bindgen]
    pub fn run(&mut self, cycles: u32) -> Result<u64, JsError> {
        let summary = self.machine.run(u64::from(cycles))
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(summary.instructions)
    }

    /// Pulse reset.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    #[wasm_bindgen]
    pub fn set_reset(&mut self, active: bool) {
        self.machine.set_reset(active);
    }

    #[wasm_bindgen]
    pub fn set_enabled(&mut self, enabled: bool) {
        self.machine.set_enabled(enabled);
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.machine.cpu.pc()
    }

    #[wasm_bindgen]
    pub fn ram_at(&self, address: u8) -> u8 {
        self.machine.memory.ram().read(address).unwrap_or(0)
    }

    /// Whole RAM contents as a typed array.
    #[wasm_bindgen]
    pub fn ram(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.machine.memory.ram().as_slice())
    }

    /// Registers, pins and counters as a JSON string.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        let cpu = &self.machine.cpu;
        let pins = self.machine.pins();
        let snapshot = Snapshot {
            a: cpu.regs.a,
            x: cpu.regs.x,
            y: cpu.regs.y,
            pc: cpu.pc(),
            state: format!("{:?}", cpu.state),
            cycles: self.machine.bus.cycles(),
            retired: cpu.retired_count(),
            primary_out: pins.primary_out,
            shared_out: pins.shared_out,
            shared_in: pins.shared_in,
        };
        serde_json::to_string(&snapshot).map_err(|e| JsError::new(&e.to_string()))
    }

    fn reload(&mut self) -> Result<(), JsError> {
        let mut machine = Machine::new(MachineConfig::default())
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        machine.load_program(&self.program)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        machine.load_ram(&self.ram)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        self.machine = machine;
        Ok(())
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return the instruction count.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<usize, JsError> {
    let words = assemble(source)
        .map_err(|e| JsError::new(&format!("{}", e)))?;
    Ok(words.len())
}

/// Disassemble a single instruction word.
#[wasm_bindgen]
pub fn wasm_disassemble(word: u16) -> String {
    disassemble_word(word)
}
