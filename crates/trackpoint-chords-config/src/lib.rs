//! Configuration parsing for trackpoint-chords
//!
//! This crate handles parsing the KDL configuration file, resolving keysym
//! names, and locating the pointing device the daemon should watch.

mod discovery;
mod error;
mod keysym;
mod model;
mod parser;

pub use discovery::{find_device, find_in_listing, DiscoveryError, PROC_INPUT_DEVICES};
pub use error::ConfigError;
pub use keysym::keysym_from_name;
pub use model::*;
pub use parser::{load_config, parse_config, parse_config_str};
