//! Assembler and disassembler for nibbus programs.
//!
//! This module provides:
//! - A line assembler (text → instruction words)
//! - A disassembler (instruction words → readable text)
//! - The `.nrom` ROM image format

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use image::{load_image, rom_layout, save_image, ImageError, RomImage};
