//! Assembler for nibbus programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//!     LDA #1          ; A := 1
//!     LDX 0x0A        ; X := RAM[0x0A]
//!     LDY $3          ; Y := RAM[3]
//!     NOP
//!     DW  0x0C84      ; Emit a raw instruction word
//! ```
//!
//! One line produces one instruction slot. Operands must fit in the single
//! operand nibble a ROM slot carries (0-15).

use crate::cpu::decode::{encode, AddrMode, Instruction, Opcode};
use thiserror::Error;

/// Largest operand a ROM slot can carry.
pub const MAX_OPERAND: u32 = 0x0F;
/// Largest raw word a ROM slot can carry.
pub const MAX_WORD: u32 = 0x0FFF;

/// Assemble source code to a list of instruction words.
pub fn assemble(source: &str) -> Result<Vec<u16>, AssemblerError> {
    let mut words = Vec::new();

    for (index, line) in source.lines().enumerate() {
        if let Some(word) = assemble_line(line, index + 1)? {
            words.push(word);
        }
    }

    Ok(words)
}

/// Assemble one source line. Blank and comment-only lines yield `None`.
fn assemble_line(line: &str, line_num: usize) -> Result<Option<u16>, AssemblerError> {
    let line = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    }
    .trim();

    if line.is_empty() {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let mnemonic = parts.next().unwrap_or_default().to_uppercase();
    let operand = parts.next();

    if let Some(extra) = parts.next() {
        return Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!("unexpected token '{}'", extra),
        });
    }

    let word = match mnemonic.as_str() {
        "DW" | "WORD" => {
            let text = operand.ok_or_else(|| AssemblerError::SyntaxError {
                line: line_num,
                message: "DW requires a value".into(),
            })?;
            let value = parse_value(text, line_num)?;
            if value > MAX_WORD {
                return Err(AssemblerError::ValueOutOfRange { line: line_num, value, max: MAX_WORD });
            }
            value as u16
        }
        "NOP" => {
            if operand.is_some() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: "NOP takes no operand".into(),
                });
            }
            encode(&Instruction::nop())
        }
        "LDA" | "LDX" | "LDY" => {
            let opcode = match mnemonic.as_str() {
                "LDA" => Opcode::Lda,
                "LDX" => Opcode::Ldx,
                _ => Opcode::Ldy,
            };
            let text = operand.ok_or_else(|| AssemblerError::SyntaxError {
                line: line_num,
                message: format!("{} requires an operand", mnemonic),
            })?;
            let (mode, operand) = parse_operand(text, line_num)?;
            encode(&Instruction::new(opcode, mode, operand))
        }
        _ => {
            return Err(AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic,
            })
        }
    };

    Ok(Some(word))
}

/// `#n` is immediate; a bare value is a zero-indexed RAM address.
fn parse_operand(text: &str, line_num: usize) -> Result<(AddrMode, u8), AssemblerError> {
    let (mode, value_text) = match text.strip_prefix('#') {
        Some(rest) => (AddrMode::Immediate, rest),
        None => (AddrMode::ZeroIndexed, text),
    };

    let value = parse_value(value_text, line_num)?;
    if value > MAX_OPERAND {
        return Err(AssemblerError::ValueOutOfRange { line: line_num, value, max: MAX_OPERAND });
    }

    Ok((mode, value as u8))
}

/// Decimal, `0x` hex or `$` hex.
fn parse_value(text: &str, line_num: usize) -> Result<u32, AssemblerError> {
    let text = text.trim();

    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if let Some(hex) = text.strip_prefix('$') {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse::<u32>()
    };

    parsed.map_err(|_| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("invalid number '{}'", text),
    })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("value out of range on line {line}: {value} (max {max})")]
    ValueOutOfRange { line: usize, value: u32, max: u32 },
}
