//! Input device discovery
//!
//! The kernel lists every input device in `/proc/bus/input/devices` as a block
//! of `X: key=value` lines separated by blank lines. The daemon only needs the
//! `eventN` handler of the first block mentioning the configured name.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Kernel listing of input devices
pub const PROC_INPUT_DEVICES: &str = "/proc/bus/input/devices";

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("No input device matching '{pattern}' in /proc/bus/input/devices")]
    NotFound { pattern: String },

    #[error("Failed to read input device list: {0}")]
    Io(#[from] std::io::Error),
}

/// Find the event device whose listing block mentions `pattern`
pub fn find_device(pattern: &str) -> Result<PathBuf, DiscoveryError> {
    let listing = std::fs::read_to_string(PROC_INPUT_DEVICES)?;

    let path = find_in_listing(&listing, pattern).ok_or_else(|| DiscoveryError::NotFound {
        pattern: pattern.to_string(),
    })?;

    tracing::debug!("'{}' resolved to {}", pattern, path.display());
    Ok(path)
}

/// Search a `/proc/bus/input/devices` listing for `pattern`.
///
/// Blocks without an `eventN` handler are skipped even if they match.
pub fn find_in_listing(listing: &str, pattern: &str) -> Option<PathBuf> {
    if pattern.is_empty() {
        return None;
    }

    listing
        .split("\n\n")
        .filter(|block| block.contains(pattern))
        .find_map(event_handler)
        .map(|n| Path::new("/dev/input").join(format!("event{}", n)))
}

fn event_handler(block: &str) -> Option<u32> {
    block
        .lines()
        .filter_map(|line| line.strip_prefix("H: Handlers="))
        .flat_map(str::split_whitespace)
        .find_map(|handler| handler.strip_prefix("event")?.parse().ok())
}
