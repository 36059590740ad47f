//! Configuration data model

use std::path::PathBuf;
use std::time::Duration;

/// Default location of the configuration file (tilde is expanded by callers)
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/trackpoint-chords/config.kdl";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub global: GlobalConfig,
    pub device: DeviceConfig,
    pub timing: TimingConfig,
    pub keys: KeysConfig,
}

/// Global settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Which input device to watch
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Substring searched for in `/proc/bus/input/devices`
    pub name: String,
    /// Explicit event device, bypasses discovery when set
    pub path: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "TrackPoint".to_string(),
            path: None,
        }
    }
}

/// Timers and limits of the daemon's event loop
#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    /// How long the pointer must rest before buttons become modifiers
    pub idle_timeout: Duration,
    /// Pause between attempts when switching click mode fails
    pub retry_backoff: Duration,
    /// Consecutive device read errors tolerated before giving up
    pub max_read_errors: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(300),
            retry_backoff: Duration::from_secs(1),
            max_read_errors: 10,
        }
    }
}

/// A resolved keysym with the name it was configured as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keysym {
    pub name: String,
    pub value: u32,
}

impl Keysym {
    fn builtin(name: &str, value: u32) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Keysyms sent for each of the four modifiers
#[derive(Debug, Clone, PartialEq)]
pub struct KeysConfig {
    pub control: Keysym,
    pub shift: Keysym,
    pub level3: Keysym,
    pub level5: Keysym,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            control: Keysym::builtin("Control_L", 0xffe3),
            shift: Keysym::builtin("Shift_R", 0xffe2),
            level3: Keysym::builtin("ISO_Level3_Shift", 0xfe03),
            level5: Keysym::builtin("ISO_Level5_Shift", 0xfe11),
        }
    }
}
