//! trackscroll – scroll and middle-click emulation for trackballs.
//!
//! CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::Parser;

use trackscroll::logging::{TrackscrollLogger, resolve_level};
use trackscroll::manager::{ScrollManager, list_pointer_devices};

#[derive(Parser)]
#[command(
    name = "trackscroll",
    about = "Scroll and middle-click emulation for trackballs"
)]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// List pointer devices with auxiliary buttons and exit
    #[arg(short, long)]
    list_devices: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_devices {
        return list_pointer_devices();
    }

    // Parse config first (before logger init) so we can read the configured log level.
    let mut manager = match ScrollManager::new(cli.config.as_deref()) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let log_level = resolve_level(cli.verbose, manager.config_log_level());
    TrackscrollLogger::new(log_level, manager.config_log_file())
        .install()
        .expect("Failed to set logger");

    let running = manager.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::Relaxed);
    })
    .expect("Error setting Ctrl-C handler");

    if let Some(path) = &cli.config {
        log::info!("Loaded configuration from: {}", path.display());
    }

    match manager.start() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!(
                "\nTo find available pointer devices, run:\n\
                 \x20 trackscroll --list-devices"
            );
            ExitCode::from(e.exit_code())
        }
    }
}
