//! Backing stores for the two address spaces behind the shared bus.
//!
//! ROM is nibble-addressed over a 12-bit address space and RAM is
//! byte-addressed over an 8-bit address space. The host decides how large
//! each store actually is; accesses beyond the declared size are faults,
//! never wraparound.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of addressable ROM nibbles (12-bit address space).
pub const ROM_ADDRESS_SPACE: usize = 4096;

/// Number of addressable RAM bytes (8-bit address space).
pub const RAM_ADDRESS_SPACE: usize = 256;

/// Instruction store: a read-only array of 4-bit values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rom {
    cells: Vec<u8>,
}

impl Rom {
    /// Create a zero-filled ROM with `size` nibbles.
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        if size > ROM_ADDRESS_SPACE {
            return Err(MemoryError::CapacityExceeded {
                store: "ROM",
                requested: size,
                limit: ROM_ADDRESS_SPACE,
            });
        }
        Ok(Self { cells: vec![0; size] })
    }

    /// Create a ROM holding exactly the given nibbles.
    pub fn from_nibbles(nibbles: &[u8]) -> Result<Self, MemoryError> {
        let mut rom = Self::new(nibbles.len())?;
        rom.load(0, nibbles)?;
        Ok(rom)
    }

    /// Read the nibble at `address`.
    #[inline]
    pub fn read(&self, address: u16) -> Result<u8, MemoryError> {
        self.cells
            .get(address as usize)
            .copied()
            .ok_or(MemoryError::RomOutOfRange { address, size: self.cells.len() })
    }

    /// Burn `nibbles` into the ROM starting at `start`.
    ///
    /// This is the host side of the store; the core itself never writes ROM.
    pub fn load(&mut self, start: usize, nibbles: &[u8]) -> Result<(), MemoryError> {
        if start + nibbles.len() > self.cells.len() {
            return Err(MemoryError::ProgramTooLarge {
                size: nibbles.len(),
                available: self.cells.len().saturating_sub(start),
            });
        }

        for (offset, &value) in nibbles.iter().enumerate() {
            if value > 0x0F {
                return Err(MemoryError::InvalidNibble { address: start + offset, value });
            }
            self.cells[start + offset] = value;
        }

        Ok(())
    }

    /// Number of nibbles backing this ROM.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the ROM has no backing cells at all.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The raw nibble contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for Rom {
    fn default() -> Self {
        Self { cells: vec![0; ROM_ADDRESS_SPACE] }
    }
}

impl std::fmt::Debug for Rom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&n| n != 0).count();
        f.debug_struct("Rom")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Data store: a read/write array of bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ram {
    cells: Vec<u8>,
}

impl Ram {
    /// Create a zero-filled RAM with `size` bytes.
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        if size > RAM_ADDRESS_SPACE {
            return Err(MemoryError::CapacityExceeded {
                store: "RAM",
                requested: size,
                limit: RAM_ADDRESS_SPACE,
            });
        }
        Ok(Self { cells: vec![0; size] })
    }

    /// Create a RAM initialised with the given bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MemoryError> {
        let mut ram = Self::new(bytes.len())?;
        ram.cells.copy_from_slice(bytes);
        Ok(ram)
    }

    /// Read the byte at `address`.
    #[inline]
    pub fn read(&self, address: u8) -> Result<u8, MemoryError> {
        self.cells
            .get(address as usize)
            .copied()
            .ok_or(MemoryError::RamOutOfRange { address, size: self.cells.len() })
    }

    /// Write the byte at `address`.
    #[inline]
    pub fn write(&mut self, address: u8, value: u8) -> Result<(), MemoryError> {
        let size = self.cells.len();
        let cell = self
            .cells
            .get_mut(address as usize)
            .ok_or(MemoryError::RamOutOfRange { address, size })?;
        *cell = value;
        Ok(())
    }

    /// Copy `bytes` into RAM starting at `start`.
    pub fn load(&mut self, start: usize, bytes: &[u8]) -> Result<(), MemoryError> {
        if start + bytes.len() > self.cells.len() {
            return Err(MemoryError::ProgramTooLarge {
                size: bytes.len(),
                available: self.cells.len().saturating_sub(start),
            });
        }
        self.cells[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Clear all cells to zero.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Number of bytes backing this RAM.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the RAM has no backing cells at all.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The raw byte contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }

    /// Dump a window of RAM (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = (start + count).min(self.cells.len());
        (start.min(end)..end).map(|i| (i, self.cells[i])).collect()
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self { cells: vec![0; RAM_ADDRESS_SPACE] }
    }
}

impl std::fmt::Debug for Ram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&b| b != 0).count();
        f.debug_struct("Ram")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Errors raised by the backing stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("ROM address {address:#05x} out of range (size {size})")]
    RomOutOfRange { address: u16, size: usize },

    #[error("RAM address {address:#04x} out of range (size {size})")]
    RamOutOfRange { address: u8, size: usize },

    #[error("{store} size {requested} exceeds its address space ({limit})")]
    CapacityExceeded { store: &'static str, requested: usize, limit: usize },

    #[error("image size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },

    #[error("value {value:#x} at ROM address {address} is not a nibble")]
    InvalidNibble { address: usize, value: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rom_read() {
        let rom = Rom::from_nibbles(&[4, 8, 12, 0]).unwrap();
        assert_eq!(rom.read(0).unwrap(), 4);
        assert_eq!(rom.read(2).unwrap(), 12);
        assert_eq!(rom.len(), 4);
    }

    #[test]
    fn test_rom_bounds() {
        let rom = Rom::new(16).unwrap();
        assert!(rom.read(15).is_ok());
        assert_eq!(
            rom.read(16),
            Err(MemoryError::RomOutOfRange { address: 16, size: 16 })
        );
    }

    #[test]
    fn test_rom_capacity() {
        assert!(Rom::new(ROM_ADDRESS_SPACE).is_ok());
        assert!(matches!(
            Rom::new(ROM_ADDRESS_SPACE + 1),
            Err(MemoryError::CapacityExceeded { store: "ROM", .. })
        ));
    }

    #[test]
    fn test_rom_rejects_wide_values() {
        let mut rom = Rom::new(8).unwrap();
        assert_eq!(
            rom.load(2, &[1, 0x10]),
            Err(MemoryError::InvalidNibble { address: 3, value: 0x10 })
        );
    }

    #[test]
    fn test_rom_load_too_large() {
        let mut rom = Rom::new(4).unwrap();
        assert_eq!(
            rom.load(2, &[1, 2, 3]),
            Err(MemoryError::ProgramTooLarge { size: 3, available: 2 })
        );
    }

    #[test]
    fn test_ram_read_write() {
        let mut ram = Ram::default();
        ram.write(0x42, 0xA5).unwrap();
        assert_eq!(ram.read(0x42).unwrap(), 0xA5);
        assert_eq!(ram.read(0x43).unwrap(), 0);
    }

    #[test]
    fn test_ram_bounds() {
        let mut ram = Ram::from_bytes(&[4, 2]).unwrap();
        assert_eq!(ram.read(1).unwrap(), 2);
        assert!(ram.read(2).is_err());
        assert!(ram.write(2, 1).is_err());
        assert_eq!(ram.as_slice(), &[4, 2]);
    }

    #[test]
    fn test_ram_dump_and_clear() {
        let mut ram = Ram::new(8).unwrap();
        ram.load(6, &[7, 9]).unwrap();
        assert_eq!(ram.dump(5, 10), vec![(5, 0), (6, 7), (7, 9)]);
        ram.clear();
        assert!(ram.as_slice().iter().all(|&b| b == 0));
    }
}
