//! Memory arbiter for the shared port.
//!
//! One pair of ports serves two address spaces and two directions. Each
//! cycle the arbiter re-reads the control bits of `shared_out`:
//!
//! ```text
//!   shared_out  7   6   5   4   3   2   1   0
//!   ROM fetch  [ addr low nibble ] [   0   ]      bits 5:4 != 11
//!   RAM write  [0] [0] [1] [1] [  data   ]
//!   RAM read   [0] [1] [1] [1] [   -    ]
//! ```
//!
//! A ROM address ending in `0b11` would alias the RAM select pattern, which
//! is why that slot is never fetched.

use serde::{Serialize, Deserialize};
use tracing::trace;

use super::memory::{Ram, Rom};
use super::pins::Pins;
use super::BusError;

/// Bits 5:4 of `shared_out` both set select RAM.
pub const RAM_SELECT: u8 = 0b0011_0000;
/// Bit 6 of `shared_out` selects a RAM read (clear means write).
pub const RAM_READ: u8 = 0b0100_0000;
/// Bit 7 is never set on a legal RAM cycle.
pub const RAM_RESERVED: u8 = 0b1000_0000;
/// Low nibble of `shared_out` carries RAM write data.
pub const DATA_MASK: u8 = 0x0F;
/// Highest address in the 12-bit ROM space.
pub const ROM_ADDRESS_MASK: u16 = 0x0FFF;

/// One decoded bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusTransaction {
    /// Fetch one nibble from ROM.
    RomFetch { address: u16 },
    /// Read one byte from RAM.
    RamRead { address: u8 },
    /// Store a nibble into a RAM byte.
    RamWrite { address: u8, data: u8 },
}

impl BusTransaction {
    /// Interpret the output ports as a transaction.
    pub fn decode(primary: u8, shared: u8) -> Result<Self, BusError> {
        if shared & RAM_SELECT == RAM_SELECT {
            if shared & RAM_RESERVED != 0 {
                return Err(BusError::Desync { address: rom_address(primary, shared) });
            }
            if shared & RAM_READ != 0 {
                Ok(BusTransaction::RamRead { address: primary })
            } else {
                Ok(BusTransaction::RamWrite { address: primary, data: shared & DATA_MASK })
            }
        } else {
            // Bits 5:4 are the low bits of the address here, so this never
            // lands on a reserved slot.
            let address = check_fetch_address(rom_address(primary, shared))?;
            Ok(BusTransaction::RomFetch { address })
        }
    }

    /// Pin levels `(primary_out, shared_out)` that carry this transaction.
    pub fn encode(&self) -> Result<(u8, u8), BusError> {
        match *self {
            BusTransaction::RomFetch { address } => {
                let address = check_fetch_address(address)?;
                Ok(((address >> 4) as u8, ((address & 0x0F) as u8) << 4))
            }
            BusTransaction::RamRead { address } => Ok((address, RAM_SELECT | RAM_READ)),
            BusTransaction::RamWrite { address, data } => {
                if data > DATA_MASK {
                    return Err(BusError::DataTooWide(data));
                }
                Ok((address, RAM_SELECT | data))
            }
        }
    }

    /// Whether this cycle touches the data store.
    pub fn is_ram(&self) -> bool {
        !matches!(self, BusTransaction::RomFetch { .. })
    }
}

impl std::fmt::Display for BusTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusTransaction::RomFetch { address } => write!(f, "ROM[{:03X}]", address),
            BusTransaction::RamRead { address } => write!(f, "RAM[{:02X}] read", address),
            BusTransaction::RamWrite { address, data } => {
                write!(f, "RAM[{:02X}] <- {:X}", address, data)
            }
        }
    }
}

/// Effective ROM address carried by the ports.
#[inline]
pub fn rom_address(primary: u8, shared: u8) -> u16 {
    u16::from(primary) * 16 + u16::from(shared >> 4)
}

/// Reject fetch addresses that fall on the reserved padding slot or outside
/// the 12-bit space.
pub fn check_fetch_address(address: u16) -> Result<u16, BusError> {
    if address > ROM_ADDRESS_MASK {
        return Err(BusError::AddressOverflow(address));
    }
    if address & 0b11 == 0b11 {
        return Err(BusError::Desync { address });
    }
    Ok(address)
}

/// The arbiter's answer for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub transaction: BusTransaction,
    /// Value placed on `shared_in`. Writes leave the port at zero.
    pub data: u8,
}

/// Routes each bus cycle to ROM or RAM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryArbiter {
    rom: Rom,
    ram: Ram,
}

impl MemoryArbiter {
    pub fn new(rom: Rom, ram: Ram) -> Self {
        Self { rom, ram }
    }

    /// Decode the current output pins and carry out the transaction.
    pub fn service(&mut self, pins: &Pins) -> Result<Response, BusError> {
        let transaction = BusTransaction::decode(pins.primary_out, pins.shared_out)?;
        let data = self.perform(transaction)?;
        Ok(Response { transaction, data })
    }

    /// Carry out an already decoded transaction.
    pub fn perform(&mut self, transaction: BusTransaction) -> Result<u8, BusError> {
        let data = match transaction {
            BusTransaction::RomFetch { address } => self.rom.read(check_fetch_address(address)?)?,
            BusTransaction::RamRead { address } => self.ram.read(address)?,
            BusTransaction::RamWrite { address, data } => {
                if data > DATA_MASK {
                    return Err(BusError::DataTooWide(data));
                }
                self.ram.write(address, data)?;
                0
            }
        };
        trace!(%transaction, data, "arbiter");
        Ok(data)
    }

    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    pub fn rom_mut(&mut self) -> &mut Rom {
        &mut self.rom
    }

    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.ram
    }
}

impl Default for MemoryArbiter {
    fn default() -> Self {
        Self::new(Rom::default(), Ram::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryError;

    fn pins(primary: u8, shared: u8) -> Pins {
        Pins { primary_out: primary, shared_out: shared, ..Pins::default() }
    }

    #[test]
    fn test_rom_address_from_pins() {
        assert_eq!(rom_address(0x00, 0x20), 2);
        assert_eq!(rom_address(0x12, 0x40), 0x124);
        assert_eq!(rom_address(0xFF, 0xE0), 0xFFE);
    }

    #[test]
    fn test_decode_rom_fetch() {
        assert_eq!(
            BusTransaction::decode(0x01, 0x10).unwrap(),
            BusTransaction::RomFetch { address: 0x11 }
        );
        assert_eq!(
            BusTransaction::decode(0x00, 0xE0).unwrap(),
            BusTransaction::RomFetch { address: 0x0E }
        );
    }

    #[test]
    fn test_decode_ram_cycles() {
        assert_eq!(
            BusTransaction::decode(0x42, 0x70).unwrap(),
            BusTransaction::RamRead { address: 0x42 }
        );
        assert_eq!(
            BusTransaction::decode(0x42, 0x3A).unwrap(),
            BusTransaction::RamWrite { address: 0x42, data: 0x0A }
        );
    }

    #[test]
    fn test_reserved_ram_encoding_is_desync() {
        // Low nibble 0xB or 0xF would be a fetch of a padding slot.
        assert_eq!(
            BusTransaction::decode(0x00, 0xB0),
            Err(BusError::Desync { address: 0x0B })
        );
        assert_eq!(
            BusTransaction::decode(0x01, 0xF0),
            Err(BusError::Desync { address: 0x1F })
        );
    }

    #[test]
    fn test_encode_rejects_padding_slot() {
        for address in [3u16, 7, 0xB, 0xF, 0x123, 0xFFF] {
            assert_eq!(
                BusTransaction::RomFetch { address }.encode(),
                Err(BusError::Desync { address })
            );
        }
        assert_eq!(
            BusTransaction::RomFetch { address: 0x1000 }.encode(),
            Err(BusError::AddressOverflow(0x1000))
        );
    }

    #[test]
    fn test_encode_decode_agree() {
        let cases = [
            BusTransaction::RomFetch { address: 0 },
            BusTransaction::RomFetch { address: 0x2A6 },
            BusTransaction::RamRead { address: 0xFF },
            BusTransaction::RamWrite { address: 7, data: 0xF },
        ];
        for transaction in cases {
            let (primary, shared) = transaction.encode().unwrap();
            assert_eq!(BusTransaction::decode(primary, shared).unwrap(), transaction);
        }
    }

    #[test]
    fn test_ram_write_data_must_be_nibble() {
        assert_eq!(
            BusTransaction::RamWrite { address: 0, data: 0x10 }.encode(),
            Err(BusError::DataTooWide(0x10))
        );
    }

    #[test]
    fn test_service_rom_fetch() {
        let rom = Rom::from_nibbles(&[4, 8, 12, 0, 1, 3, 5, 0]).unwrap();
        let mut arbiter = MemoryArbiter::new(rom, Ram::default());
        let response = arbiter.service(&pins(0x00, 0x50)).unwrap();
        assert_eq!(response.transaction, BusTransaction::RomFetch { address: 5 });
        assert_eq!(response.data, 3);
    }

    #[test]
    fn test_service_ram_read_and_write() {
        let mut arbiter = MemoryArbiter::new(Rom::default(), Ram::from_bytes(&[4, 2]).unwrap());
        assert_eq!(arbiter.service(&pins(1, 0x70)).unwrap().data, 2);

        let response = arbiter.service(&pins(0, 0x39)).unwrap();
        assert_eq!(response.data, 0);
        assert_eq!(arbiter.ram().as_slice(), &[9, 2]);
    }

    #[test]
    fn test_service_out_of_range() {
        let mut arbiter = MemoryArbiter::new(
            Rom::from_nibbles(&[1, 2, 3, 0]).unwrap(),
            Ram::from_bytes(&[4, 2]).unwrap(),
        );
        assert_eq!(
            arbiter.service(&pins(0, 0x40)),
            Err(BusError::Memory(MemoryError::RomOutOfRange { address: 4, size: 4 }))
        );
        assert_eq!(
            arbiter.service(&pins(2, 0x70)),
            Err(BusError::Memory(MemoryError::RamOutOfRange { address: 2, size: 2 }))
        );
    }
}
