//! Daemon error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Failed to open input device {}: {source}", path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input device failed {attempts} times in a row, giving up: {source}")]
    InputFailed {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}
