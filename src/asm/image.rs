//! ROM image file format.
//!
//! A `.nrom` file is plain text with one instruction slot per line:
//! - Four hex nibbles, low nibble first, separated by whitespace
//! - The fourth nibble is the padding slot and must be `0`
//! - Anything after `;` is a comment
//! - Blank lines are ignored

use std::path::Path;
use std::io::Write;

use crate::cpu::decode::{assemble_nibbles, rom_slot, SLOT_NIBBLES};
use crate::asm::disasm::disassemble_word;
use thiserror::Error;

/// A loaded ROM image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    /// The program, one word per slot.
    pub words: Vec<u16>,
    /// Original source lines (for debugging).
    pub source_lines: Vec<String>,
}

impl RomImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    /// Build an image from assembled words, annotating each with its disassembly.
    pub fn from_words(words: &[u16]) -> Self {
        let mut image = Self::new();
        for &word in words {
            image.push(word, &disassemble_word(word));
        }
        image
    }

    /// Add an instruction word.
    pub fn push(&mut self, word: u16, source: &str) {
        self.words.push(word);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of instruction slots.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The flat nibble layout that goes into ROM.
    pub fn nibbles(&self) -> Result<Vec<u8>, ImageError> {
        rom_layout(&self.words)
    }
}

impl Default for RomImage {
    fn default() -> Self {
        Self::new()
    }
}

/// Lay words into consecutive 4-nibble ROM slots.
pub fn rom_layout(words: &[u16]) -> Result<Vec<u8>, ImageError> {
    let mut nibbles = Vec::with_capacity(words.len() * SLOT_NIBBLES);
    for (slot, &word) in words.iter().enumerate() {
        let layout = rom_slot(word).map_err(|_| ImageError::WordTooWide { slot, word })?;
        nibbles.extend_from_slice(&layout);
    }
    Ok(nibbles)
}

/// Parse image text.
pub fn parse_image(text: &str) -> Result<RomImage, ImageError> {
    let mut image = RomImage::new();

    for (line_num, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        let data = match trimmed.find(';') {
            Some(idx) => &trimmed[..idx],
            None => trimmed,
        };

        if data.trim().is_empty() {
            continue;
        }

        let nibbles = data
            .split_whitespace()
            .map(|token| {
                u8::from_str_radix(token, 16)
                    .ok()
                    .filter(|&n| n <= 0x0F)
                    .ok_or_else(|| ImageError::ParseError {
                        line: line_num + 1,
                        message: format!("'{}' is not a hex nibble", token),
                    })
            })
            .collect::<Result<Vec<u8>, ImageError>>()?;

        if nibbles.len() != SLOT_NIBBLES {
            return Err(ImageError::ParseError {
                line: line_num + 1,
                message: format!("expected {} nibbles, found {}", SLOT_NIBBLES, nibbles.len()),
            });
        }
        if nibbles[3] != 0 {
            return Err(ImageError::ParseError {
                line: line_num + 1,
                message: "padding nibble must be 0".into(),
            });
        }

        image.push(assemble_nibbles([nibbles[0], nibbles[1], nibbles[2]]), trimmed);
    }

    Ok(image)
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RomImage, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    parse_image(&text)
}

/// Render an image as text.
pub fn render_image(image: &RomImage) -> Result<String, ImageError> {
    let nibbles = image.nibbles()?;
    let mut out = String::new();

    out.push_str("; nibbus ROM image\n");
    out.push_str(&format!("; {} instructions\n\n", image.len()));

    for (index, slot) in nibbles.chunks(SLOT_NIBBLES).enumerate() {
        let comment = image
            .source_lines
            .get(index)
            .map(String::as_str)
            .unwrap_or_default();
        out.push_str(&format!(
            "{:X} {:X} {:X} {:X} ; {:03X} {}\n",
            slot[0],
            slot[1],
            slot[2],
            slot[3],
            index * SLOT_NIBBLES,
            comment
        ));
    }

    Ok(out)
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &RomImage) -> Result<(), ImageError> {
    let text = render_image(image)?;
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    file.write_all(text.as_bytes())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    Ok(())
}

/// Errors that can occur during image operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("word {word:#06x} in slot {slot} does not fit in a ROM slot")]
    WordTooWide { slot: usize, word: u16 },
}
