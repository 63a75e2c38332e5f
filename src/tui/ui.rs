//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::{CpuState, Stage};
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(60),
            Constraint::Percentage(40),
        ])
        .split(frame.area());

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(7),
            Constraint::Length(6),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_pins(frame, left_chunks[2], app);
    draw_status(frame, left_chunks[3], app);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(6),
        ])
        .split(chunks[1]);

    draw_ram(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw the ROM disassembly around the PC.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:03X}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" ROM ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw register state and sequencer stage.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let cpu = &app.machine.cpu;
    let regs = cpu.regs;
    let nibbles = cpu.fetch_nibbles();

    let stage = match cpu.stage() {
        Stage::Fetch => "fetch".to_string(),
        Stage::OperandRead { instruction, remaining, .. } => {
            format!("RAM[{:02X}] read, {} left", instruction.operand, remaining)
        }
    };

    let content = vec![
        Line::from(vec![
            Span::raw("A: "),
            Span::styled(format!("{:02X}", regs.a), Style::default().fg(Color::White)),
            Span::raw("   X: "),
            Span::styled(format!("{:02X}", regs.x), Style::default().fg(Color::White)),
            Span::raw("   Y: "),
            Span::styled(format!("{:02X}", regs.y), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:03X}", cpu.pc()), Style::default().fg(Color::Yellow)),
            Span::raw(format!(
                "   Latched: {:X} {:X} {:X}",
                nibbles[0], nibbles[1], nibbles[2]
            )),
        ]),
        Line::from(vec![
            Span::raw("Stage: "),
            Span::styled(stage, Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::raw("Retired: "),
            Span::styled(format!("{}", cpu.retired_count()), Style::default().fg(Color::Cyan)),
            Span::raw("   State: "),
            Span::styled(format!("{:?}", cpu.state), state_style(cpu.state)),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw the bus pins and the last transaction.
fn draw_pins(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let pins = app.machine.pins();
    let transaction = app
        .last_cycle
        .and_then(|c| c.transaction)
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".into());

    let content = vec![
        Line::from(format!(
            "primary_out: {:08b}   shared_out: {:08b}",
            pins.primary_out, pins.shared_out
        )),
        Line::from(format!(
            "shared_in:   {:08b}   reset_n: {}   ena: {}",
            pins.shared_in, pins.reset_n as u8, pins.enabled as u8
        )),
        Line::from(vec![
            Span::raw("Cycle "),
            Span::styled(format!("{}", app.machine.bus.cycles()), Style::default().fg(Color::Cyan)),
            Span::raw(": "),
            Span::styled(transaction, Style::default().fg(Color::Yellow)),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Bus ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)));

    frame.render_widget(paragraph, area);
}

/// Draw memory view.
fn draw_ram(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let ram = app.machine.memory.ram();
    let target = match app.machine.cpu.stage() {
        Stage::OperandRead { instruction, .. } => Some(instruction.operand as usize),
        Stage::Fetch => None,
    };

    let items: Vec<ListItem> = ram
        .dump(app.ram_scroll, visible_rows)
        .into_iter()
        .map(|(addr, value)| {
            let text = format!("{:02X}: {:02X} = {}", addr, value, value);

            let style = if Some(addr) == target {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if value != 0 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" RAM ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("c: Clock  s: Step  r: Run  p: Pause"),
        Line::from("b: Breakpoint  e: Enable  x: Reset"),
        Line::from("↑↓: Scroll RAM  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}

/// Color for a core state.
fn state_style(state: CpuState) -> Style {
    match state {
        CpuState::Running => Style::default().fg(Color::Green),
        CpuState::Reset => Style::default().fg(Color::Gray),
        CpuState::Faulted => Style::default().fg(Color::Red),
    }
}
