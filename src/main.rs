//! Oxidized-Gekko - Gekko/Broadway CPU core
//!
//! Loads a raw big-endian code image, runs it for a bounded number of
//! slices and prints the register file.
//!
//! Usage: `oxidized-gekko <image> [load-address] [slices]`

use anyhow::{bail, Context};
use og_core::config::Config;
use og_system::Session;

const DEFAULT_LOAD_ADDRESS: u32 = 0x8000_3100;
const DEFAULT_SLICES: u64 = 100;

fn parse_u32(text: &str) -> anyhow::Result<u32> {
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    value.with_context(|| format!("invalid number '{}'", text))
}

fn main() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    og_core::logging::init(&config);

    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        bail!("usage: {} <image> [load-address] [slices]", args[0]);
    };
    let load_address = match args.get(2) {
        Some(text) => parse_u32(text)?,
        None => DEFAULT_LOAD_ADDRESS,
    };
    let slices = match args.get(3) {
        Some(text) => text.parse().with_context(|| format!("invalid slice count '{}'", text))?,
        None => DEFAULT_SLICES,
    };

    tracing::info!("Starting Oxidized-Gekko");

    let image = std::fs::read(path).with_context(|| format!("failed to read {}", path))?;
    let mut session = Session::new(config);
    session
        .load_image(load_address, &image)
        .with_context(|| format!("failed to load image at 0x{:08x}", load_address))?;
    session.set_entry_point(load_address);

    for line in og_debug::disassemble_range(session.memory().as_ref(), load_address, 8) {
        tracing::debug!("0x{:08x}: {}", line.address, line);
    }

    session.start()?;
    let exit = session.run_slices(slices).context("execution failed")?;
    tracing::info!("Finished after {} slices: {:?}", session.slices_run(), exit);

    let state = session.cpu().state();
    println!("pc  = 0x{:08x}  lr  = 0x{:08x}  ctr = 0x{:08x}", state.pc, state.lr(), state.ctr());
    println!("msr = 0x{:08x}  cr  = 0x{:08x}  xer = 0x{:08x}", state.msr, state.cr.pack(), state.xer().bits());
    for row in 0..8 {
        let regs: Vec<String> = (0..4)
            .map(|col| {
                let reg = row * 4 + col;
                format!("r{:<2} = 0x{:08x}", reg, state.gpr[reg])
            })
            .collect();
        println!("{}", regs.join("  "));
    }

    if session.config().cpu.count_instructions {
        let profile = og_debug::Profiler::capture(session.cpu().interpreter());
        print!("{}", profile.report(10));
    }

    session.stop()?;
    Ok(())
}
