//! Spindle console player - main entry point
//!
//! Plays tracker modules from the command line. Commands are read one per
//! line from stdin; player events are reported on stdout.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use spindle_ap::audio::CpalDevice;
use spindle_ap::decoder::default_factory;
use spindle_ap::AppContext;
use spindle_common::config::ConfigSource;
use spindle_common::human_time::{format_length, format_mm_ss, format_position};
use spindle_common::{PlayerState, SpindleConfig, SpindleEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Volume change per `+` / `-`
const VOLUME_STEP: f32 = 0.1;

/// Command-line arguments for spindle
#[derive(Parser, Debug)]
#[command(name = "spindle")]
#[command(about = "Tracker module player")]
#[command(version)]
struct Args {
    /// Module files to add to the playlist
    files: Vec<PathBuf>,

    /// Configuration file
    #[arg(short, long, env = "SPINDLE_CONFIG")]
    config: Option<PathBuf>,

    /// Initial volume (0.0-1.0)
    #[arg(long)]
    volume: Option<f32>,

    /// Play the playlist in shuffled order
    #[arg(long)]
    shuffle: bool,

    /// Replay each module when it ends
    #[arg(long)]
    repeat: bool,

    /// tracing filter (overrides the configured level)
    #[arg(long, env = "SPINDLE_LOG")]
    log_level: Option<String>,

    /// Output device name (default device when omitted)
    #[arg(long)]
    device: Option<String>,

    /// Print output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) =
        SpindleConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting spindle {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if source == ConfigSource::BuiltIn {
        info!("No config file found, using built-in defaults");
    }

    if args.list_devices {
        for name in CpalDevice::list_devices().context("Failed to list output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    if let Some(volume) = args.volume {
        config.volume = volume;
    }
    config.shuffle |= args.shuffle;
    config.repeat |= args.repeat;
    let config = config.validate().context("Invalid configuration")?;

    let factory = default_factory()
        .ok_or_else(|| anyhow!("No synthesis backend compiled in; rebuild with --features openmpt"))?;

    let mut ctx = AppContext::new(config, Box::new(CpalDevice::new(args.device)), factory);
    let mut events = ctx.subscribe();

    for path in &args.files {
        if let Err(e) = ctx.add_path(path) {
            warn!("Skipping {}: {}", path.display(), e);
        }
    }
    if let Some(index) = ctx.playlist.next() {
        if let Err(e) = ctx.play_index(index) {
            println!("{}", e);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    report(&ctx, &event);
                    if let Err(e) = ctx.handle_event(&event) {
                        println!("{}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Event receiver lagged, {} events skipped", skipped),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !run_command(&mut ctx, line.trim()) {
                        break;
                    }
                }
                Ok(None) => {
                    info!("End of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    info!("Shutting down");
    drop(ctx);
    info!("Shutdown complete");
    Ok(())
}

/// Execute one console command; returns false to quit
fn run_command(ctx: &mut AppContext, line: &str) -> bool {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    let result = match command {
        "" => Ok(()),
        "q" | "quit" => return false,
        "p" => match ctx.player.state() {
            PlayerState::Playing | PlayerState::Paused => ctx.player.pause(),
            _ => ctx.player.play(),
        },
        "s" => {
            ctx.player.stop();
            Ok(())
        }
        "n" => ctx.next_song(),
        "b" => ctx.previous_song(),
        "f" => {
            ctx.player.next_position();
            Ok(())
        }
        "r" => {
            ctx.player.previous_position();
            Ok(())
        }
        "+" | "-" => {
            let step = if command == "+" { VOLUME_STEP } else { -VOLUME_STEP };
            ctx.player.set_volume(ctx.player.volume() + step);
            println!("Volume {:.0}%", ctx.player.volume() * 100.0);
            Ok(())
        }
        "seek" => {
            match arg.parse::<u64>() {
                Ok(seconds) if ctx.player.seek(seconds) => {}
                Ok(_) => println!("Nothing playing"),
                Err(_) => println!("Usage: seek <seconds>"),
            }
            Ok(())
        }
        "open" => ctx.open_path(Path::new(arg)).and_then(|_| ctx.player.play()),
        "i" => {
            match ctx.player.module_info() {
                Some(info) => match serde_json::to_string_pretty(info) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Failed to format module info: {}", e),
                },
                None => println!("No module loaded"),
            }
            Ok(())
        }
        "l" => {
            let current = ctx.playlist.current_index();
            for (index, item) in ctx.playlist.items().iter().enumerate() {
                let marker = if Some(index) == current { '>' } else { ' ' };
                println!("{} {:3} {:<40} {:>5} {}", marker, index + 1, item.title, item.time(), item.format);
            }
            Ok(())
        }
        "shuffle" => {
            let on = !ctx.playlist.is_shuffled();
            ctx.set_shuffle(on);
            println!("Shuffle {}", if on { "on" } else { "off" });
            Ok(())
        }
        "repeat" => {
            let on = !ctx.config.repeat;
            ctx.set_repeat(on);
            println!("Repeat {}", if on { "on" } else { "off" });
            Ok(())
        }
        _ => {
            println!("Commands: p s n b f r + - seek <secs> open <file> i l shuffle repeat q");
            Ok(())
        }
    };

    if let Err(e) = result {
        println!("{}", e);
    }
    true
}

/// Print player events for the user
fn report(ctx: &AppContext, event: &SpindleEvent) {
    match event {
        SpindleEvent::SongChanged { title, .. } => {
            let length = ctx
                .player
                .module_info()
                .map(|info| format_length(info.duration_seconds()))
                .unwrap_or_default();
            println!("Now playing: {} {}", title, length);
        }
        SpindleEvent::PlayerStateChanged { new_state, .. } => println!("[{}]", new_state),
        SpindleEvent::TimeChanged { seconds, .. } => {
            let patterns = ctx
                .player
                .module_info()
                .map(|info| info.length_in_patterns as usize)
                .unwrap_or(0);
            debug!(
                "{} {}",
                format_mm_ss(*seconds),
                format_position(ctx.player.position(), patterns)
            );
        }
        SpindleEvent::DeviceError { message, .. } => println!("Audio device error: {}", message),
        _ => {}
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
