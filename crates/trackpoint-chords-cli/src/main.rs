//! trackpoint-chords CLI
//!
//! Configuration and device inspection tool for trackpoint-chords.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use trackpoint_chords_config::{Config, ConfigError, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "trackpoint-chords")]
#[command(about = "Configuration and device tool for trackpoint-chords")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// List available input devices
    Devices {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which event device the daemon would read
    Resolve {
        /// Device name to search for (defaults to the configured one)
        pattern: Option<String>,
    },
}

/// One `/dev/input/event*` device as shown by `devices`
#[derive(Debug, Serialize)]
struct DeviceEntry {
    name: String,
    path: PathBuf,
    /// Reports BTN_LEFT, BTN_RIGHT and BTN_MIDDLE
    three_buttons: bool,
    /// Reports relative X/Y motion
    relative_motion: bool,
    /// The device the daemon would open with the current configuration
    matches_config: bool,
}

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    match cli.command {
        Commands::Validate => cmd_validate(&config_path),
        Commands::Devices { json } => cmd_devices(&config_path, json),
        Commands::Resolve { pattern } => cmd_resolve(&config_path, pattern),
    }
}

fn load(config_path: &Path, required: bool) -> miette::Result<Config> {
    trackpoint_chords_config::load_config(config_path, required)
        .map_err(|e: ConfigError| miette::Report::new(e))
}

fn cmd_validate(config_path: &Path) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = load(config_path, true)?;

    println!("Configuration is valid!");
    println!("  Device: {}", config.device.name);
    if let Some(path) = &config.device.path {
        println!("    Path: {}", path.display());
    }
    println!("  Idle timeout: {:?}", config.timing.idle_timeout);
    println!("  Retry backoff: {:?}", config.timing.retry_backoff);
    println!("  Max read errors: {}", config.timing.max_read_errors);
    println!("  Keys:");
    for (modifier, keysym) in [
        ("control", &config.keys.control),
        ("shift", &config.keys.shift),
        ("level3", &config.keys.level3),
        ("level5", &config.keys.level5),
    ] {
        println!("    {:<8} {} (0x{:04x})", modifier, keysym.name, keysym.value);
    }

    Ok(())
}

fn cmd_devices(config_path: &Path, json: bool) -> miette::Result<()> {
    let config = load(config_path, false)?;
    let listing = std::fs::read_to_string(trackpoint_chords_config::PROC_INPUT_DEVICES)
        .map_err(|e| tracing::debug!("Could not read device listing: {}", e))
        .ok();
    let configured = configured_device(&config, listing.as_deref());
    let entries = list_devices(configured.as_deref()).into_diagnostic()?;

    if json {
        let out = serde_json::to_string_pretty(&entries).into_diagnostic()?;
        println!("{}", out);
        return Ok(());
    }

    println!("Available input devices:\n");

    for entry in &entries {
        let kind = match (entry.three_buttons, entry.relative_motion) {
            (true, true) => "pointer",
            (false, true) => "motion only",
            (true, false) => "buttons only",
            (false, false) => "other",
        };
        let marker = if entry.matches_config { "  <- configured" } else { "" };

        println!("  {} [{}]{}", entry.name, kind, marker);
        println!("    Path: {}", entry.path.display());
        println!();
    }

    Ok(())
}

/// The event device the daemon would resolve, same rules as its startup.
fn configured_device(config: &Config, listing: Option<&str>) -> Option<PathBuf> {
    match &config.device.path {
        Some(path) => Some(path.clone()),
        None => trackpoint_chords_config::find_in_listing(listing?, &config.device.name),
    }
}

fn list_devices(configured: Option<&Path>) -> std::io::Result<Vec<DeviceEntry>> {
    let mut entries = Vec::new();

    for dir_entry in std::fs::read_dir("/dev/input")? {
        let path = dir_entry?.path();

        if !path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false)
        {
            continue;
        }

        match evdev::Device::open(&path) {
            Ok(device) => {
                let name = device.name().unwrap_or("Unknown").to_string();

                let three_buttons = device
                    .supported_keys()
                    .map(|keys| {
                        keys.contains(evdev::Key::BTN_LEFT)
                            && keys.contains(evdev::Key::BTN_RIGHT)
                            && keys.contains(evdev::Key::BTN_MIDDLE)
                    })
                    .unwrap_or(false);
                let relative_motion = device
                    .supported_relative_axes()
                    .map(|axes| {
                        axes.contains(evdev::RelativeAxisType::REL_X)
                            && axes.contains(evdev::RelativeAxisType::REL_Y)
                    })
                    .unwrap_or(false);

                entries.push(DeviceEntry {
                    matches_config: configured == Some(path.as_path()),
                    name,
                    path,
                    three_buttons,
                    relative_motion,
                });
            }
            Err(e) => {
                tracing::debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn cmd_resolve(config_path: &Path, pattern: Option<String>) -> miette::Result<()> {
    let config = load(config_path, false)?;

    if pattern.is_none() {
        if let Some(path) = &config.device.path {
            println!("{} (fixed in configuration)", path.display());
            return Ok(());
        }
    }

    let pattern = pattern.unwrap_or(config.device.name);
    let path = trackpoint_chords_config::find_device(&pattern).into_diagnostic()?;
    println!("'{}' -> {}", pattern, path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
N: Name=\"TPPS/2 Elan TrackPoint\"
P: Phys=isa0060/serio1/input0
H: Handlers=mouse1 event7

N: Name=\"Generic Mouse\"
P: Phys=usb-TrackPoint-dock/input0
H: Handlers=mouse2 event9
";

    #[test]
    fn test_configured_device_follows_listing() {
        let mut config = Config::default();
        config.device.name = "TrackPoint".to_string();

        assert_eq!(
            configured_device(&config, Some(LISTING)),
            Some(PathBuf::from("/dev/input/event7"))
        );
    }

    #[test]
    fn test_configured_device_matches_outside_name() {
        // The pattern only appears in the Phys line, not in the device name
        let mut config = Config::default();
        config.device.name = "TrackPoint-dock".to_string();

        assert_eq!(
            configured_device(&config, Some(LISTING)),
            Some(PathBuf::from("/dev/input/event9"))
        );
    }

    #[test]
    fn test_configured_device_fixed_path() {
        let mut config = Config::default();
        config.device.path = Some(PathBuf::from("/dev/input/event3"));

        assert_eq!(
            configured_device(&config, None),
            Some(PathBuf::from("/dev/input/event3"))
        );
    }

    #[test]
    fn test_configured_device_without_listing() {
        assert_eq!(configured_device(&Config::default(), None), None);
    }
}
