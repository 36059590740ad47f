//! trackpoint-chords daemon
//!
//! Watches a TrackPoint and, once the pointer rests, turns chords of its three
//! buttons into held modifier keys. Moving the pointer gives the buttons back.

mod chord;
mod diff;
mod error;
mod event_loop;
mod input;
mod machine;
mod retry;
mod shutdown;
#[cfg(test)]
mod testing;
mod x11;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use trackpoint_chords_config::{LogLevel, DEFAULT_CONFIG_PATH};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::input::EvdevSource;
use crate::machine::Machine;

#[derive(Parser, Debug)]
#[command(name = "trackpoint-chordsd")]
#[command(about = "Turns TrackPoint button chords into modifier keys while the pointer rests")]
#[command(version)]
struct Args {
    /// Path to configuration file [default: ~/.config/trackpoint-chords/config.kdl]
    #[arg(short, long)]
    config: Option<String>,

    /// Device name to look for in /proc/bus/input/devices (overrides config)
    #[arg(short, long)]
    device: Option<String>,

    /// Event device to read, skips discovery (overrides config)
    #[arg(long, value_name = "PATH")]
    device_path: Option<PathBuf>,
}

/// Log filter that the config may still adjust after startup.
///
/// `RUST_LOG` takes precedence: when set, the configured level is ignored.
struct LogFilter(Option<reload::Handle<EnvFilter, Registry>>);

impl LogFilter {
    fn init() -> Self {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            return Self(None);
        }

        let (filter, handle) = reload::Layer::new(EnvFilter::new(LogLevel::default().as_filter()));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        Self(Some(handle))
    }

    fn apply(&self, level: LogLevel) {
        if let Some(handle) = &self.0 {
            if let Err(e) = handle.reload(EnvFilter::new(level.as_filter())) {
                tracing::warn!("Failed to apply log level {:?}: {}", level, e);
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let log_filter = LogFilter::init();
    let args = Args::parse();

    // Only an explicitly named config file has to exist
    let (config_path, required) = match &args.config {
        Some(path) => (path.as_str(), true),
        None => (DEFAULT_CONFIG_PATH, false),
    };
    let config_path: PathBuf = shellexpand::tilde(config_path).into_owned().into();

    tracing::info!("Loading configuration from {}", config_path.display());
    let mut config = trackpoint_chords_config::load_config(&config_path, required)
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
    log_filter.apply(config.global.log_level);

    if let Some(name) = args.device {
        config.device.name = name;
        config.device.path = None;
    }
    if let Some(path) = args.device_path {
        config.device.path = Some(path);
    }

    let device_path = match &config.device.path {
        Some(path) => path.clone(),
        None => trackpoint_chords_config::find_device(&config.device.name)?,
    };
    let mut source = EvdevSource::open(&device_path)?;

    let (keys, pointer) = x11::connect(&config.keys)?;
    let mut shutdown_flag = shutdown::listen()?;
    let mut machine = Machine::new(keys, pointer, &config.timing);

    tracing::info!(
        "trackpoint-chords daemon starting on {} (idle timeout {:?})",
        source.path().display(),
        config.timing.idle_timeout
    );

    let result = event_loop::run(
        &mut source,
        &mut machine,
        &mut shutdown_flag,
        config.timing.max_read_errors,
    )
    .await;

    // Release the device and the display before dying from the signal
    drop(machine);
    drop(source);

    if let Err(e) = result {
        tracing::error!("{}", e);
        return Err(e.into());
    }

    tracing::info!("Shut down cleanly");

    if let Some(signal) = shutdown_flag.pending() {
        shutdown::reraise(signal)?;
    }

    Ok(())
}
