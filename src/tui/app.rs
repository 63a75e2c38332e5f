//! Debugger application state and logic.

use crate::Machine;
use crate::asm::disasm::disassemble_word;
use crate::cpu::decode::{assemble_nibbles, SLOT_NIBBLES};
use crate::cpu::fetch::{INSTRUCTION_STRIDE, PC_MASK};
use crate::cpu::machine::Cycle;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub machine: Machine,
    /// Breakpoints (by slot address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// RAM view scroll offset.
    pub ram_scroll: usize,
    /// The most recent bus cycle.
    pub last_cycle: Option<Cycle>,
}

impl DebuggerApp {
    /// Create a new debugger around a loaded machine.
    pub fn new(machine: Machine) -> Self {
        Self {
            machine,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. 'c' clock, 's' step, 'r' run, 'q' quit.".into(),
            ram_scroll: 0,
            last_cycle: None,
        }
    }

    /// Run a single bus cycle.
    pub fn clock(&mut self) {
        match self.machine.clock() {
            Ok(cycle) => {
                self.status = match (cycle.transaction, cycle.retired) {
                    (_, Some(retired)) => format!(
                        "{:03X}: {} retired",
                        retired.pc,
                        disassemble_word(crate::cpu::decode::encode(&retired.instruction))
                    ),
                    (Some(transaction), None) => format!("{} -> {:02X}", transaction, cycle.data),
                    (None, None) => "Core disabled".into(),
                };
                self.last_cycle = Some(cycle);
            }
            Err(e) => {
                self.status = format!("Fault: {}", e);
                self.running = false;
            }
        }
    }

    /// Clock until one instruction retires.
    pub fn step(&mut self) {
        match self.machine.step_instruction() {
            Ok(retired) => {
                let word = crate::cpu::decode::encode(&retired.instruction);
                self.status = format!("{:03X}: {}", retired.pc, disassemble_word(word));
            }
            Err(e) => {
                self.status = format!("Fault: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until fault or breakpoint.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if self.machine.cpu.is_faulted() {
            self.running = false;
            self.status = "Core faulted. Press 'x' to reset.".into();
            return;
        }

        self.step();

        let pc = self.machine.cpu.pc();
        if self.running && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at {:03X}", pc);
        }
    }

    /// Toggle breakpoint at the current fetch slot.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.cpu.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at {:03X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at {:03X}", pc);
        }
    }

    /// Pulse the reset line.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.running = false;
        self.last_cycle = None;
        self.status = "Reset. Ready.".into();
    }

    /// Toggle the enable line.
    pub fn toggle_enabled(&mut self) {
        let enabled = !self.machine.pins().enabled;
        self.machine.set_enabled(enabled);
        self.status = if enabled { "Core enabled".into() } else { "Core disabled".into() };
    }

    /// Disassembly of the ROM slots around the current PC.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let rom = self.machine.memory.rom();
        let pc = self.machine.cpu.pc();
        let slots = rom.len() / SLOT_NIBBLES;
        let current = pc as usize / SLOT_NIBBLES;
        let first = current.saturating_sub(lines / 2);

        (first..(first + lines).min(slots))
            .map(|slot| {
                let base = slot * SLOT_NIBBLES;
                let cells = &rom.as_slice()[base..base + SLOT_NIBBLES];
                let word = assemble_nibbles([cells[0], cells[1], cells[2]]);
                let address = (slot as u16 * INSTRUCTION_STRIDE) & PC_MASK;
                (address, disassemble_word(word), address == pc)
            })
            .collect()
    }
}

/// Run the debugger on a loaded machine.
pub fn run_debugger(machine: Machine) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(machine);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('c') => {
                            app.running = false;
                            app.clock();
                        }
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('e') => app.toggle_enabled(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            app.ram_scroll = app.ram_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            let ram_len = app.machine.memory.ram().len();
                            if app.ram_scroll + 1 < ram_len {
                                app.ram_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{Instruction, Opcode};

    fn app() -> DebuggerApp {
        let mut machine = Machine::default();
        machine
            .load_instructions(&[
                Instruction::immediate(Opcode::Lda, 1),
                Instruction::immediate(Opcode::Ldx, 2),
                Instruction::immediate(Opcode::Ldy, 3),
            ])
            .unwrap();
        DebuggerApp::new(machine)
    }

    #[test]
    fn test_step_and_breakpoint() {
        let mut app = app();
        app.breakpoints.insert(8);
        app.run();
        for _ in 0..5 {
            app.tick();
        }
        assert!(!app.running);
        assert_eq!(app.machine.cpu.pc(), 8);
        assert_eq!(app.machine.cpu.regs.x, 2);
        assert_eq!(app.machine.cpu.regs.y, 0);
    }

    #[test]
    fn test_disassembly_marks_pc() {
        let mut app = app();
        app.step();
        let listing = app.get_disassembly(4);
        assert_eq!(listing[0], (0, "LDA #1".to_string(), false));
        assert_eq!(listing[1], (4, "LDX #2".to_string(), true));
    }

    #[test]
    fn test_clock_reports_bus_cycle() {
        let mut app = app();
        app.clock();
        assert_eq!(app.status, "ROM[000] -> 08");
        app.reset();
        assert_eq!(app.machine.cpu.pc(), 0);
    }
}
