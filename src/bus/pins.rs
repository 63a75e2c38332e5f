//! Pin-level view of the core.
//!
//! The core exposes an 8-bit output port, an 8-bit bidirectional port and
//! two control lines. Every bus cycle walks the same three phases:
//!
//! 1. `AddressSettle` - the core drives `primary_out` and `shared_out`.
//! 2. `DataSample` - the responding store drives `shared_in`.
//! 3. `Commit` - the clock edge hands the sampled value to the core.
//!
//! Calls made out of that order are rejected, so a harness cannot observe a
//! value before the edge that commits it.

use serde::{Serialize, Deserialize};
use tracing::trace;

use super::arbiter::BusTransaction;
use super::BusError;

/// Snapshot of every signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pins {
    /// ROM address high byte, or the full RAM address.
    pub primary_out: u8,
    /// Control bits and ROM address low nibble / RAM write data.
    pub shared_out: u8,
    /// Value driven back by the memory side.
    pub shared_in: u8,
    /// Reset line, active low.
    pub reset_n: bool,
    /// Enable line.
    pub enabled: bool,
}

impl Pins {
    /// Whether the core is being held in reset.
    #[inline]
    pub fn reset_active(&self) -> bool {
        !self.reset_n
    }
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            primary_out: 0,
            shared_out: 0,
            shared_in: 0,
            reset_n: true,
            enabled: true,
        }
    }
}

/// Where the bus is within the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    /// Outputs may be written.
    AddressSettle,
    /// Outputs are stable; the memory side may respond.
    DataSample,
    /// The response is captured and waiting for the clock edge.
    Commit,
}

/// The physical bus interface of the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusInterface {
    pins: Pins,
    phase: CyclePhase,
    cycles: u64,
}

impl BusInterface {
    /// Create an idle bus with reset released and the core enabled.
    pub fn new() -> Self {
        Self {
            pins: Pins::default(),
            phase: CyclePhase::AddressSettle,
            cycles: 0,
        }
    }

    /// Drive the output ports for this cycle.
    pub fn set_outputs(&mut self, primary: u8, shared: u8) -> Result<(), BusError> {
        self.expect_phase(CyclePhase::AddressSettle, "set_outputs")?;
        self.pins.primary_out = primary;
        self.pins.shared_out = shared;
        self.phase = CyclePhase::DataSample;
        Ok(())
    }

    /// Encode a transaction onto the output ports.
    pub fn drive(&mut self, transaction: &BusTransaction) -> Result<(), BusError> {
        let (primary, shared) = transaction.encode()?;
        self.set_outputs(primary, shared)
    }

    /// Memory side: place a response on `shared_in`.
    pub fn supply_input(&mut self, value: u8) -> Result<(), BusError> {
        self.expect_phase(CyclePhase::DataSample, "supply_input")?;
        self.pins.shared_in = value;
        self.phase = CyclePhase::Commit;
        Ok(())
    }

    /// The sampled input, visible once the response has been captured.
    pub fn read_input(&self) -> Result<u8, BusError> {
        self.expect_phase(CyclePhase::Commit, "read_input")?;
        Ok(self.pins.shared_in)
    }

    /// Clock edge: commit the sampled input and open the next cycle.
    pub fn advance_cycle(&mut self) -> Result<u8, BusError> {
        let value = self.read_input()?;
        self.phase = CyclePhase::AddressSettle;
        self.cycles += 1;
        trace!(
            cycle = self.cycles,
            primary = self.pins.primary_out,
            shared_out = self.pins.shared_out,
            shared_in = value,
            "clock edge"
        );
        Ok(value)
    }

    /// Drop whatever is in flight and reopen the cycle without an edge.
    pub fn abort_cycle(&mut self) {
        self.phase = CyclePhase::AddressSettle;
    }

    /// Drive the active-low reset line.
    pub fn set_reset(&mut self, active: bool) {
        self.pins.reset_n = !active;
    }

    /// Drive the enable line.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.pins.enabled = enabled;
    }

    /// Current signal levels.
    pub fn pins(&self) -> &Pins {
        &self.pins
    }

    /// Current phase within the cycle.
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Number of clock edges seen so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn expect_phase(&self, expected: CyclePhase, operation: &'static str) -> Result<(), BusError> {
        if self.phase != expected {
            return Err(BusError::PhaseViolation { operation, phase: self.phase });
        }
        Ok(())
    }
}

impl Default for BusInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let mut bus = BusInterface::new();
        bus.set_outputs(0x01, 0x20).unwrap();
        assert_eq!(bus.phase(), CyclePhase::DataSample);
        bus.supply_input(0x0C).unwrap();
        assert_eq!(bus.read_input().unwrap(), 0x0C);
        assert_eq!(bus.advance_cycle().unwrap(), 0x0C);
        assert_eq!(bus.phase(), CyclePhase::AddressSettle);
        assert_eq!(bus.cycles(), 1);
        assert_eq!(bus.pins().primary_out, 0x01);
        assert_eq!(bus.pins().shared_out, 0x20);
    }

    #[test]
    fn test_input_not_visible_before_sample() {
        let mut bus = BusInterface::new();
        assert!(bus.read_input().is_err());
        bus.set_outputs(0, 0).unwrap();
        assert!(matches!(
            bus.read_input(),
            Err(BusError::PhaseViolation { operation: "read_input", phase: CyclePhase::DataSample })
        ));
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let mut bus = BusInterface::new();
        assert!(bus.supply_input(1).is_err());
        assert!(bus.advance_cycle().is_err());
        bus.set_outputs(0, 0).unwrap();
        assert!(bus.set_outputs(1, 1).is_err());
        assert_eq!(bus.cycles(), 0);
    }

    #[test]
    fn test_abort_reopens_cycle() {
        let mut bus = BusInterface::new();
        bus.set_outputs(3, 0x70).unwrap();
        bus.abort_cycle();
        assert_eq!(bus.phase(), CyclePhase::AddressSettle);
        assert!(bus.set_outputs(0, 0).is_ok());
        assert_eq!(bus.cycles(), 0);
    }

    #[test]
    fn test_reset_line_is_active_low() {
        let mut bus = BusInterface::new();
        assert!(!bus.pins().reset_active());
        bus.set_reset(true);
        assert!(bus.pins().reset_active());
        assert!(!bus.pins().reset_n);
    }
}
