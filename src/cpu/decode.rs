//! Instruction decoder.
//!
//! An instruction is a 16-bit word:
//!
//! ```text
//!   15           8 7         3 2    0
//!  [   operand    |  opcode   | mode ]
//! ```
//!
//! In ROM the word occupies one 4-nibble slot, low nibble first, with the
//! last nibble always zero. Only nibble 2 carries operand bits, so operands
//! stored in ROM are limited to 0-15.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use super::registers::Register;

/// Width of the mode field.
pub const MODE_BITS: u32 = 3;
/// Width of the opcode field.
pub const OPCODE_BITS: u32 = 5;
/// Bit offset of the operand field.
pub const OPERAND_SHIFT: u32 = 8;

const MODE_MASK: u16 = (1 << MODE_BITS) - 1;
const OPCODE_MASK: u16 = (1 << OPCODE_BITS) - 1;

/// Nibbles in one ROM instruction slot.
pub const SLOT_NIBBLES: usize = 4;

/// Operand addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddrMode {
    /// The operand is the value (mode 0).
    Immediate,
    /// The operand is a RAM address (mode 1).
    ZeroIndexed,
    /// Any other mode encoding. Carried through undecided.
    Unsupported(u8),
}

impl AddrMode {
    pub const IMMEDIATE: u8 = 0;
    pub const ZERO_INDEXED: u8 = 1;

    /// Decode the 3-bit mode field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & MODE_MASK as u8 {
            Self::IMMEDIATE => AddrMode::Immediate,
            Self::ZERO_INDEXED => AddrMode::ZeroIndexed,
            other => AddrMode::Unsupported(other),
        }
    }

    /// Encode back to the 3-bit field.
    pub fn bits(self) -> u8 {
        match self {
            AddrMode::Immediate => Self::IMMEDIATE,
            AddrMode::ZeroIndexed => Self::ZERO_INDEXED,
            AddrMode::Unsupported(bits) => bits & MODE_MASK as u8,
        }
    }
}

/// Operation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// No operation.
    Nop,
    /// Load accumulator: A := operand
    Lda,
    /// Load X: X := operand
    Ldx,
    /// Load Y: Y := operand
    Ldy,
    /// Unassigned opcode. Executes as a no-op.
    Reserved(u8),
}

impl Opcode {
    pub const NOP: u8 = 0x00;
    pub const LDA: u8 = 0x01;
    pub const LDX: u8 = 0x02;
    pub const LDY: u8 = 0x03;

    /// Decode the 5-bit opcode field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & OPCODE_MASK as u8 {
            Self::NOP => Opcode::Nop,
            Self::LDA => Opcode::Lda,
            Self::LDX => Opcode::Ldx,
            Self::LDY => Opcode::Ldy,
            other => Opcode::Reserved(other),
        }
    }

    /// Encode back to the 5-bit field.
    pub fn bits(self) -> u8 {
        match self {
            Opcode::Nop => Self::NOP,
            Opcode::Lda => Self::LDA,
            Opcode::Ldx => Self::LDX,
            Opcode::Ldy => Self::LDY,
            Opcode::Reserved(bits) => bits & OPCODE_MASK as u8,
        }
    }

    /// The register a load writes, if any.
    pub fn target(self) -> Option<Register> {
        match self {
            Opcode::Lda => Some(Register::A),
            Opcode::Ldx => Some(Register::X),
            Opcode::Ldy => Some(Register::Y),
            Opcode::Nop | Opcode::Reserved(_) => None,
        }
    }

    /// Assembler mnemonic for assigned opcodes.
    pub fn mnemonic(self) -> Option<&'static str> {
        match self {
            Opcode::Nop => Some("NOP"),
            Opcode::Lda => Some("LDA"),
            Opcode::Ldx => Some("LDX"),
            Opcode::Ldy => Some("LDY"),
            Opcode::Reserved(_) => None,
        }
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub mode: AddrMode,
    pub opcode: Opcode,
    pub operand: u8,
}

impl Instruction {
    pub fn new(opcode: Opcode, mode: AddrMode, operand: u8) -> Self {
        Self { mode, opcode, operand }
    }

    pub fn nop() -> Self {
        Self::new(Opcode::Nop, AddrMode::Immediate, 0)
    }

    /// Load `value` directly into the opcode's register.
    pub fn immediate(opcode: Opcode, value: u8) -> Self {
        Self::new(opcode, AddrMode::Immediate, value)
    }

    /// Load the RAM byte at `address` into the opcode's register.
    pub fn zero_indexed(opcode: Opcode, address: u8) -> Self {
        Self::new(opcode, AddrMode::ZeroIndexed, address)
    }
}

/// Split a word into its fields.
///
/// Takes a `u32` so callers assembling words from wider sources get the
/// width check rather than silent truncation.
pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
    let word = u16::try_from(word).map_err(|_| DecodeError::WordTooWide(word))?;

    Ok(Instruction {
        mode: AddrMode::from_bits((word & MODE_MASK) as u8),
        opcode: Opcode::from_bits(((word >> MODE_BITS) & OPCODE_MASK) as u8),
        operand: (word >> OPERAND_SHIFT) as u8,
    })
}

/// Pack an instruction into a word.
pub fn encode(instr: &Instruction) -> u16 {
    (u16::from(instr.operand) << OPERAND_SHIFT)
        | (u16::from(instr.opcode.bits()) << MODE_BITS)
        | u16::from(instr.mode.bits())
}

/// Assemble a word from the three fetched nibbles, low nibble first.
pub fn assemble_nibbles(nibbles: [u8; 3]) -> u16 {
    nibbles
        .iter()
        .enumerate()
        .fold(0u16, |word, (i, &n)| word | (u16::from(n & 0x0F) << (4 * i)))
}

/// Lay a word out as one ROM slot: `[n0, n1, n2, 0]`.
pub fn rom_slot(word: u16) -> Result<[u8; SLOT_NIBBLES], DecodeError> {
    if word > 0x0FFF {
        return Err(DecodeError::NotRepresentable(word));
    }
    Ok([
        (word & 0x0F) as u8,
        ((word >> 4) & 0x0F) as u8,
        ((word >> 8) & 0x0F) as u8,
        0,
    ])
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("instruction word {0:#x} is wider than 16 bits")]
    WordTooWide(u32),

    #[error("instruction word {0:#06x} does not fit in a ROM slot")]
    NotRepresentable(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fields() {
        // operand 0x0C, opcode 0x10, mode 4
        let instr = decode(0x0C84).unwrap();
        assert_eq!(instr.mode, AddrMode::Unsupported(4));
        assert_eq!(instr.opcode, Opcode::Reserved(0x10));
        assert_eq!(instr.operand, 0x0C);
    }

    #[test]
    fn test_decode_load_immediate() {
        let instr = decode(0x0108).unwrap();
        assert_eq!(instr, Instruction::immediate(Opcode::Lda, 1));
    }

    #[test]
    fn test_decode_zero_word_is_nop() {
        assert_eq!(decode(0).unwrap(), Instruction::nop());
    }

    #[test]
    fn test_decode_rejects_wide_word() {
        assert_eq!(decode(0x1_0000), Err(DecodeError::WordTooWide(0x1_0000)));
        assert!(decode(0xFFFF).is_ok());
    }

    #[test]
    fn test_encode_layout() {
        let instr = Instruction::zero_indexed(Opcode::Ldy, 0xAB);
        assert_eq!(encode(&instr), 0xAB19);
        assert_eq!(decode(u32::from(encode(&instr))).unwrap(), instr);
    }

    #[test]
    fn test_mode_and_opcode_tables() {
        for bits in 0..8u8 {
            assert_eq!(AddrMode::from_bits(bits).bits(), bits);
        }
        for bits in 0..32u8 {
            assert_eq!(Opcode::from_bits(bits).bits(), bits);
        }
        assert_eq!(Opcode::Lda.target(), Some(Register::A));
        assert_eq!(Opcode::Reserved(9).target(), None);
        assert_eq!(Opcode::Nop.target(), None);
    }

    #[test]
    fn test_assemble_nibbles() {
        assert_eq!(assemble_nibbles([4, 8, 12]), 0x0C84);
        assert_eq!(assemble_nibbles([1, 3, 5]), 0x0531);
    }

    #[test]
    fn test_rom_slot() {
        assert_eq!(rom_slot(0x0C84).unwrap(), [4, 8, 12, 0]);
        assert_eq!(rom_slot(0x1000), Err(DecodeError::NotRepresentable(0x1000)));
    }
}
