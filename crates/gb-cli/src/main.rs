//! GB CLI - Headless runner for the DMG emulator core

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gb_core::cartridge::NINTENDO_LOGO;
use gb_core::{Cartridge, GameBoy, RunConfig, StopReason};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// DMG Emulator CLI
#[derive(Parser, Debug)]
#[command(name = "gb-cli")]
#[command(about = "Run a Game Boy cartridge without a display", long_about = None)]
struct Args {
    /// Path to the cartridge image
    #[arg(value_name = "CARTRIDGE")]
    cartridge: PathBuf,

    /// Log every executed instruction
    #[arg(short, long)]
    trace: bool,

    /// Minimum level of the messages to log
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Do not log anything
    #[arg(short, long)]
    silent: bool,

    /// Print the result of blargg's test ROMs as it arrives on the serial port
    #[arg(short, long)]
    blargg: bool,

    /// Stop execution when encountering an infinite JR loop
    #[arg(short = 'x', long)]
    exit_infinite_loop: bool,

    /// Stop after this many instructions
    #[arg(short = 'n', long, value_name = "N")]
    max_instructions: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Args {
    /// Filter directive built from the flags; `--silent` wins over `--trace`
    fn filter(&self) -> String {
        if self.silent {
            "off".to_string()
        } else if self.trace {
            "gb_core=trace,gb_cli=trace".to_string()
        } else {
            self.log_level.directive().to_string()
        }
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            max_instructions: self.max_instructions,
            exit_on_infinite_loop: self.exit_infinite_loop,
        }
    }
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Render the 48x8 boot logo bitmap stored in the header.
///
/// Each byte holds two 4-pixel rows of a 4x4 tile; the first 24 bytes are
/// the upper tile row, the remaining 24 the lower one.
fn logo_art(logo: &[u8; 48]) -> Vec<String> {
    (0..8)
        .map(|y| {
            let base = (y / 2) % 2 + (y / 4) * 24;
            (0..12)
                .flat_map(|x| {
                    let byte = logo[base + 2 * x];
                    let nibble = if y % 2 == 1 { byte & 0x0F } else { byte >> 4 };
                    (0..4).rev().map(move |bit| if (nibble >> bit) & 1 == 1 { '*' } else { ' ' })
                })
                .collect()
        })
        .collect()
}

fn print_cartridge_info(path: &Path, cartridge: &Cartridge) {
    let header = cartridge.header();
    let logo = cartridge
        .rom()
        .get(0x0104..0x0134)
        .and_then(|bytes| <&[u8; 48]>::try_from(bytes).ok())
        .unwrap_or(&NINTENDO_LOGO);
    for line in logo_art(logo) {
        println!("{line}");
    }
    println!();
    println!("Cartridge information:");
    println!("  Path      : {}", path.display());
    println!("  Title     : {}", header.title);
    println!("  ROM Size  : {} KB", cartridge.rom().len() / 1024);
    println!("  RAM Size  : {} KB", cartridge.ram().len() / 1024);
    println!("  Type      : 0x{:02X} ({})", header.cartridge_type, header.chip);
    println!("  ROM Vers  : 0x{:02X}", header.version);
    if cartridge.is_multicart() {
        println!("  Multicart : YES ({} games)", cartridge.game_count());
    } else {
        println!("  Multicart : NO");
    }
    println!();
}

fn forward_serial(writer: &mut impl Write, output: &[u8]) -> io::Result<()> {
    writer.write_all(output)?;
    writer.flush()
}

fn run(args: &Args) -> Result<StopReason> {
    let image = fs::read(&args.cartridge)
        .with_context(|| format!("failed to read cartridge {}", args.cartridge.display()))?;

    let cartridge = Cartridge::load(&image).context("failed to load cartridge")?;
    print_cartridge_info(&args.cartridge, &cartridge);

    let mut system = GameBoy::new(cartridge, args.run_config());
    let result = if args.blargg {
        let mut stdout = io::stdout();
        let mut streaming = true;
        system.run_with(|gb| {
            let output = gb.bus_mut().serial_mut().take_output();
            if streaming && !output.is_empty() {
                if let Err(err) = forward_serial(&mut stdout, &output) {
                    warn!("serial output no longer forwarded: {err}");
                    streaming = false;
                }
            }
        })
    } else {
        system.run()
    };
    let reason = result.context("emulation stopped")?;

    info!(
        instructions = system.instructions(),
        cycles = system.cycles(),
        "run finished: {:?}",
        reason
    );
    Ok(reason)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match run(&args) {
        Ok(StopReason::InstructionLimit) => ExitCode::SUCCESS,
        Ok(StopReason::InfiniteLoop { pc }) => {
            info!("infinite loop at 0x{pc:04X}");
            ExitCode::SUCCESS
        }
        Ok(StopReason::Deadlock { pc }) => {
            info!("halted at 0x{pc:04X} with no interrupt enabled");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
