//! # KILN Frame Demo
//!
//! Runs the headless frame loop and prints the HUD of the last frame plus a
//! statistics summary.
//!
//! ## Usage
//!
//! ```bash
//! frame_demo --frames 600 --config kiln.toml
//! RUST_LOG=kiln_core=debug frame_demo
//! ```

use std::process::ExitCode;

use kiln::{FrameLoop, FrameLoopConfig, FrameLoopResult};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FRAMES: u64 = 300;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kiln=info,kiln_core=info"));

    fmt().with_env_filter(filter).compact().try_init().ok();
}

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         KILN FRAME DEMO                                          ║");
    println!("║         POOL + ARENA + FRAME STRINGS                             ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    // Parse command line arguments (simple parsing, no external deps)
    let args: Vec<String> = std::env::args().collect();
    let mut frames = DEFAULT_FRAMES;
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--frames" | "-f" => {
                if i + 1 < args.len() {
                    frames = args[i + 1].parse().unwrap_or(DEFAULT_FRAMES);
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: frame_demo [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -f, --frames <N>           Frames to run (default: {DEFAULT_FRAMES})");
                println!("  -c, --config <PATH>        TOML config file (default: built-in)");
                println!("  -h, --help                 Show this help");
                return ExitCode::SUCCESS;
            }
            _ => {}
        }
        i += 1;
    }

    init_logging();

    match run(frames, config_path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "frame demo failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(frames: u64, config_path: Option<&str>) -> FrameLoopResult<()> {
    let config = match config_path {
        Some(path) => FrameLoopConfig::from_file(path)?,
        None => FrameLoopConfig::default(),
    };

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Frames:             {frames}");
    println!("│ Target FPS:         {}", config.target_fps);
    println!("│ Frame Arena:        {} B", config.memory.frame_arena_bytes);
    println!("│ Particle Pool:      {}", config.memory.pool_capacity);
    println!("│ Spawn Per Frame:    {}", config.spawn_per_frame);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let mut frame_loop = FrameLoop::new(config)?;
    if frames > 1 {
        frame_loop.run(frames - 1)?;
    }

    let mut hud = Vec::new();
    if frames > 0 {
        frame_loop.step_with(|line| hud.push(line.to_owned()))?;
    }

    println!("┌─ LAST FRAME HUD ─────────────────────────────────────────────────┐");
    for line in &hud {
        println!("│ {line}");
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    frame_loop.stats().print_summary();
    Ok(())
}
