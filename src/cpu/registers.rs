//! Register file.
//!
//! Three 8-bit registers:
//! - A: accumulator
//! - X: index register
//! - Y: index register

use serde::{Serialize, Deserialize};

/// Names a register in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    A,
    X,
    Y,
}

impl Register {
    pub const ALL: [Register; 3] = [Register::A, Register::X, Register::Y];
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Register::A => "A",
            Register::X => "X",
            Register::Y => "Y",
        };
        f.write_str(name)
    }
}

/// The register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registers {
    /// A: accumulator
    pub a: u8,
    /// X: index register
    pub x: u8,
    /// Y: index register
    pub y: u8,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn get(&self, register: Register) -> u8 {
        match register {
            Register::A => self.a,
            Register::X => self.x,
            Register::Y => self.y,
        }
    }

    /// Commit `value` into one register, leaving the others untouched.
    pub fn set(&mut self, register: Register, value: u8) {
        match register {
            Register::A => self.a = value,
            Register::X => self.x = value,
            Register::Y => self.y = value,
        }
    }

    /// Whether every register holds its reset value.
    pub fn is_zero(&self) -> bool {
        self.a == 0 && self.x == 0 && self.y == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_touches_one_register() {
        let mut regs = Registers { a: 1, x: 2, y: 3 };
        regs.set(Register::X, 0xEE);
        assert_eq!(regs, Registers { a: 1, x: 0xEE, y: 3 });
        assert_eq!(regs.get(Register::X), 0xEE);
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers { a: 9, x: 8, y: 7 };
        assert!(!regs.is_zero());
        regs.reset();
        assert!(regs.is_zero());
    }

    #[test]
    fn test_register_names() {
        let names: Vec<String> = Register::ALL.iter().map(|r| r.to_string()).collect();
        assert_eq!(names, ["A", "X", "Y"]);
    }
}
