//! nibbus - CLI Entry Point
//!
//! Commands:
//! - `nibbus-emu run <program>` - Run an ASM or NROM program
//! - `nibbus-emu debug <program>` - Interactive debugger
//! - `nibbus-emu asm <source>` - Assemble to NROM
//! - `nibbus-emu disasm <image>` - Disassemble NROM
//! - `nibbus-emu test` - Built-in self-test

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nibbus-emu")]
#[command(version = "0.1.0")]
#[command(about = "Cycle-stepped simulator of a nibble-bus microprocessor core")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program from reset
    Run {
        /// Path to the .asm or .nrom file to execute
        program: String,
        /// JSON machine config
        #[arg(short, long)]
        config: Option<String>,
        /// Initial RAM contents, comma separated (e.g. "4,2" or "0x10,0xff")
        #[arg(long)]
        ram: Option<String>,
        /// Instructions to retire (default: program length)
        #[arg(short, long)]
        instructions: Option<u64>,
        /// Maximum number of bus cycles (default: from config)
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Print every bus cycle
        #[arg(short, long)]
        trace: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the .asm or .nrom file to debug
        program: String,
        /// JSON machine config
        #[arg(short, long)]
        config: Option<String>,
        /// Initial RAM contents, comma separated
        #[arg(long)]
        ram: Option<String>,
    },
    /// Assemble source to NROM
    Asm {
        /// Path to the source file
        source: String,
        /// Output NROM file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble NROM to readable text
    Disasm {
        /// Path to the NROM file
        image: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, config, ram, instructions, max_cycles, trace }) => {
            init_tracing(trace);
            run_program(&program, config.as_deref(), ram.as_deref(), instructions, max_cycles, trace);
        }
        Some(Commands::Debug { program, config, ram }) => {
            debug_program(&program, config.as_deref(), ram.as_deref());
        }
        Some(Commands::Asm { source, output }) => {
            init_tracing(false);
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            init_tracing(false);
            disassemble_file(&image);
        }
        Some(Commands::Test) => {
            init_tracing(false);
            run_self_test();
        }
        None => {
            println!("nibbus-emu v0.1.0");
            println!("A nibble-bus microprocessor core simulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Log to stderr. `--trace` turns on per-cycle output, otherwise `RUST_LOG`
/// decides and defaults to warnings only.
fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("nibbus=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

/// Load an .asm source or an .nrom image as instruction words.
fn load_words(path: &str) -> Vec<u16> {
    use nibbus::{assemble, load_image};

    if path.ends_with(".asm") {
        let source = std::fs::read_to_string(path)
            .unwrap_or_else(|e| fail(format!("Failed to read file: {}", e)));
        let words = assemble(&source)
            .unwrap_or_else(|e| fail(format!("Assembly error: {}", e)));
        println!("📝 Assembled {} instructions", words.len());
        words
    } else {
        let image = load_image(path)
            .unwrap_or_else(|e| fail(format!("Failed to load image: {}", e)));
        println!("📂 Loaded {} instructions", image.len());
        image.words
    }
}

fn parse_ram(list: &str) -> Vec<u8> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => s.parse::<u8>(),
            };
            parsed.unwrap_or_else(|_| fail(format!("Invalid RAM byte '{}'", s)))
        })
        .collect()
}

fn build_machine(program: &str, config: Option<&str>, ram: Option<&str>) -> (nibbus::Machine, usize) {
    use nibbus::{Machine, MachineConfig};

    let config = match config {
        Some(path) => MachineConfig::load(path)
            .unwrap_or_else(|e| fail(format!("Failed to load config: {}", e))),
        None => MachineConfig::default(),
    };

    let words = load_words(program);
    if words.is_empty() {
        fail("No instructions to execute");
    }

    let mut machine = Machine::new(config)
        .unwrap_or_else(|e| fail(format!("Failed to build machine: {}", e)));
    if let Err(e) = machine.load_program(&words) {
        fail(format!("Failed to load program: {}", e));
    }
    if let Some(list) = ram {
        if let Err(e) = machine.load_ram(&parse_ram(list)) {
            fail(format!("Failed to load RAM: {}", e));
        }
    }

    (machine, words.len())
}

fn run_program(
    path: &str,
    config: Option<&str>,
    ram: Option<&str>,
    instructions: Option<u64>,
    max_cycles: Option<u64>,
    trace: bool,
) {
    use nibbus::asm::disasm::format_instruction;

    println!("🔧 Running: {}", path);
    let (mut machine, program_len) = build_machine(path, config, ram);

    let target = instructions.unwrap_or(program_len as u64);
    let max_cycles = max_cycles.unwrap_or(machine.config().max_cycles);

    println!();
    println!("━━━ Execution ━━━");

    let mut cycles = 0u64;
    let mut retired = 0u64;
    while retired < target && cycles < max_cycles {
        match machine.clock() {
            Ok(cycle) => {
                cycles += 1;
                if trace {
                    if let Some(transaction) = cycle.transaction {
                        println!("{:>6}: {:<16} -> {:02X}", cycles, transaction.to_string(), cycle.data);
                    }
                }
                if let Some(r) = cycle.retired {
                    retired += 1;
                    println!(
                        "{:03X}: {:<8}  A={:02X} X={:02X} Y={:02X}",
                        r.pc,
                        format_instruction(&r.instruction),
                        machine.cpu.regs.a,
                        machine.cpu.regs.x,
                        machine.cpu.regs.y
                    );
                }
            }
            Err(e) => fail(format!("Fault at cycle {} (PC={:03X}): {}", cycles + 1, machine.cpu.pc(), e)),
        }
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles:       {}", cycles);
    println!("Instructions: {}", retired);
    println!("State:        {:?}", machine.cpu.state);
    println!("A: {:02X} ({})", machine.cpu.regs.a, machine.cpu.regs.a);
    println!("X: {:02X} ({})", machine.cpu.regs.x, machine.cpu.regs.x);
    println!("Y: {:02X} ({})", machine.cpu.regs.y, machine.cpu.regs.y);

    if retired < target {
        println!();
        println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, config: Option<&str>, ram: Option<&str>) {
    use nibbus::run_debugger;

    println!("🔍 Loading: {}", path);
    let (machine, _) = build_machine(path, config, ram);

    println!("🚀 Launching debugger...");
    if let Err(e) = run_debugger(machine) {
        fail(format!("Debugger error: {}", e));
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _config: Option<&str>, _ram: Option<&str>) {
    fail("Debugger not available: built without the `tui` feature");
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use nibbus::{assemble, save_image, RomImage};

    let out_path = output.unwrap_or_else(|| source_path.replace(".asm", ".nrom"));

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail(format!("Failed to read file: {}", e)));

    let words = assemble(&source)
        .unwrap_or_else(|e| fail(format!("Assembly error: {}", e)));

    println!("✓ Assembled {} instructions", words.len());

    if let Err(e) = save_image(&out_path, &RomImage::from_words(&words)) {
        fail(format!("Failed to save image: {}", e));
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(image_path: &str) {
    use nibbus::{disassemble, load_image};

    println!("📖 Disassembling: {}", image_path);
    println!();

    let image = load_image(image_path)
        .unwrap_or_else(|e| fail(format!("Failed to load image: {}", e)));

    println!("{}", disassemble(&image.words));
}

fn run_self_test() {
    use nibbus::{Machine, Registers};
    use nibbus::bus::BusTransaction;
    use nibbus::cpu::{Instruction, Opcode};

    println!("━━━ nibbus Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    // Fetch timing from reset
    let mut machine = Machine::default();
    let ok = machine.load_rom(&[4, 8, 12, 0, 1, 3, 5, 0, 9, 11, 13, 0, 2, 6, 10, 0]).is_ok()
        && machine.run(4).is_ok()
        && machine.cpu.fetch_nibbles() == [4, 8, 12]
        && machine.run(3).is_ok()
        && machine.cpu.fetch_nibbles() == [1, 3, 5];
    check("Fetch nibble assembly", ok);

    // Load immediates
    let mut machine = Machine::default();
    let ok = machine
        .load_instructions(&[
            Instruction::immediate(Opcode::Lda, 1),
            Instruction::immediate(Opcode::Ldx, 2),
            Instruction::immediate(Opcode::Ldy, 3),
            Instruction::nop(),
        ])
        .is_ok()
        && machine.run_instructions(4).is_ok()
        && machine.cpu.regs == Registers { a: 1, x: 2, y: 3 };
    check("Load immediate", ok);

    // Zero-indexed loads
    let mut machine = Machine::default();
    let ok = machine
        .load_instructions(&[
            Instruction::zero_indexed(Opcode::Ldy, 0),
            Instruction::zero_indexed(Opcode::Ldx, 1),
        ])
        .is_ok()
        && machine.load_ram(&[4, 2]).is_ok()
        && machine.run_instructions(2).is_ok()
        && machine.cpu.regs.y == 4
        && machine.cpu.regs.x == 2
        && machine.memory.ram().as_slice()[..2] == [4, 2];
    check("Zero-indexed load", ok);

    // Padding slot never fetched
    let mut machine = Machine::default();
    let ok = (0..400).all(|_| match machine.clock() {
        Ok(cycle) => !matches!(cycle.transaction, Some(BusTransaction::RomFetch { address }) if address & 3 == 3),
        Err(_) => false,
    });
    check("Fetch skips padding slot", ok);

    // Reset restarts from zero
    let mut machine = Machine::default();
    let loaded = machine.load_instructions(&[Instruction::immediate(Opcode::Lda, 9)]).is_ok()
        && machine.run(10).is_ok()
        && machine.cpu.regs.a == 9;
    machine.reset();
    let ok = loaded && machine.cpu.pc() == 0 && machine.cpu.regs.is_zero();
    check("Reset", ok);

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
