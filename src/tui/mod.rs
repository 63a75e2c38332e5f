//! TUI debugger for the nibbus core.
//!
//! Provides an interactive terminal-based debugger with:
//! - Single bus-cycle and single-instruction stepping
//! - Pin-level view of the shared bus
//! - Register, RAM and ROM disassembly views
//! - Breakpoints on instruction slots

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
