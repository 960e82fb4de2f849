use std::process::ExitCode;
use std::time::Instant;

use yeswan::{SystemType, WonderSwan};

const DEFAULT_FRAMES: u32 = 600;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(rom_path) = args.next() else {
        eprintln!("usage: headless <rom> [frames]");
        return ExitCode::FAILURE;
    };
    let frames = match args.next().map(|arg| arg.parse::<u32>()) {
        None => DEFAULT_FRAMES,
        Some(Ok(frames)) => frames,
        Some(Err(err)) => {
            eprintln!("invalid frame count: {err}");
            return ExitCode::FAILURE;
        }
    };

    let rom = match std::fs::read(&rom_path) {
        Ok(rom) => rom,
        Err(err) => {
            eprintln!("could not read {rom_path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let system = if rom_path.to_ascii_lowercase().ends_with(".wsc") {
        SystemType::WonderSwanColor
    } else {
        SystemType::WonderSwan
    };

    let mut swan = WonderSwan::new(system);
    if let Err(err) = swan.load_rom(rom) {
        eprintln!("{rom_path}: {err}");
        return ExitCode::FAILURE;
    }
    swan.reset();
    if log::log_enabled!(log::Level::Trace) {
        swan.set_trace_sink(Some(Box::new(|line: &str| log::trace!("{line}"))));
    }

    const FRAMES_PER_CHECK: u32 = 60;
    let mut now = Instant::now();
    for frame in 1..=frames {
        swan.run_frame();
        if frame % FRAMES_PER_CHECK == 0 {
            let elapsed = now.elapsed();
            println!(
                "Average over {FRAMES_PER_CHECK} frames: {:.2?}",
                elapsed / FRAMES_PER_CHECK
            );
            now = Instant::now();
        }
    }
    let reg = swan.cpu().registers();
    println!(
        "{} frames on {:?}, stopped at {:04X}:{:04X}",
        swan.frames_published(),
        system,
        reg.cs,
        reg.ip
    );
    ExitCode::SUCCESS
}
