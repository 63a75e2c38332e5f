//! Disassembler for nibbus programs.
//!
//! Turns instruction words back into assembler text. Encodings without a
//! mnemonic are printed as `DW` so the listing reassembles to the same
//! words.

use crate::cpu::decode::{decode, encode, AddrMode, Instruction};
use crate::cpu::fetch::INSTRUCTION_STRIDE;

/// Disassemble a single instruction word to text.
pub fn disassemble_word(word: u16) -> String {
    match decode(u32::from(word)) {
        Ok(instr) => format_instruction(&instr),
        Err(_) => format!("DW 0x{:04X}", word),
    }
}

/// Disassemble a program, one line per ROM slot.
pub fn disassemble(words: &[u16]) -> String {
    let mut output = String::new();
    output.push_str("; nibbus disassembly\n");
    output.push_str("; -----------------\n\n");

    for (index, &word) in words.iter().enumerate() {
        let address = index as u32 * u32::from(INSTRUCTION_STRIDE);
        output.push_str(&format!(
            "{:03X}: {:<12} ; {:04X}\n",
            address,
            disassemble_word(word),
            word
        ));
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    let mnemonic = match instr.opcode.mnemonic() {
        Some(m) => m,
        None => return format!("DW 0x{:04X}", encode(instr)),
    };

    match (instr.mode, mnemonic) {
        (AddrMode::Immediate, "NOP") if instr.operand == 0 => "NOP".to_string(),
        (_, "NOP") | (AddrMode::Unsupported(_), _) => format!("DW 0x{:04X}", encode(instr)),
        (AddrMode::Immediate, m) => format!("{} #{}", m, instr.operand),
        (AddrMode::ZeroIndexed, m) => format!("{} {}", m, instr.operand),
    }
}
