//! KDL configuration parser

use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::keysym::keysym_from_name;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Load the configuration, falling back to defaults when an optional file is absent.
///
/// `required` is set when the user named the file explicitly; a missing file is
/// then an error instead of a silent fallback.
pub fn load_config(path: &Path, required: bool) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl carries an older miette, rebuild the span for ours
        let span = miette::SourceSpan::from((e.span.offset(), e.span.len()));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();
    let mut seen_device = false;

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "device" => {
                if seen_device {
                    return Err(ConfigError::Invalid {
                        message: "only one `device` node is supported".to_string(),
                    });
                }
                seen_device = true;
                config.device = parse_device(node)?;
            }
            "timing" => {
                config.timing = parse_timing(node)?;
            }
            "keys" => {
                config.keys = parse_keys(node, content)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "log-level" => {
                    if let Some(val) = first_string(child) {
                        global.log_level = val
                            .parse()
                            .map_err(|e| ConfigError::Invalid { message: e })?;
                    }
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn parse_device(node: &kdl::KdlNode) -> Result<DeviceConfig, ConfigError> {
    let name = first_string(node)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            field: "device name (e.g., `device \"TrackPoint\"`)".to_string(),
        })?;

    let mut device = DeviceConfig {
        name: name.to_string(),
        path: None,
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "path" => {
                    if let Some(val) = first_string(child) {
                        device.path = Some(shellexpand::tilde(val).into_owned().into());
                    }
                }
                name => {
                    tracing::warn!("Unknown device config option: {}", name);
                }
            }
        }
    }

    Ok(device)
}

fn parse_timing(node: &kdl::KdlNode) -> Result<TimingConfig, ConfigError> {
    let mut timing = TimingConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "idle-timeout-ms" => {
                    let ms = positive_int(child)?;
                    timing.idle_timeout = Duration::from_millis(ms);
                }
                "retry-backoff-ms" => {
                    let ms = positive_int(child)?;
                    timing.retry_backoff = Duration::from_millis(ms);
                }
                "max-read-errors" => {
                    let count = positive_int(child)?;
                    timing.max_read_errors =
                        u32::try_from(count).map_err(|_| ConfigError::Invalid {
                            message: format!("max-read-errors is too large: {}", count),
                        })?;
                }
                name => {
                    tracing::warn!("Unknown timing option: {}", name);
                }
            }
        }
    }

    Ok(timing)
}

fn parse_keys(node: &kdl::KdlNode, source: &str) -> Result<KeysConfig, ConfigError> {
    let mut keys = KeysConfig::default();
    let mut unknown = Vec::new();
    let mut first_unknown_span = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let slot = match child.name().value() {
                "control" => &mut keys.control,
                "shift" => &mut keys.shift,
                "level3" => &mut keys.level3,
                "level5" => &mut keys.level5,
                name => {
                    tracing::warn!("Unknown modifier in keys block: {}", name);
                    continue;
                }
            };

            let Some(entry) = child.entries().first() else {
                return Err(ConfigError::MissingField {
                    field: format!("keysym for `{}`", child.name().value()),
                });
            };
            let Some(name) = entry.value().as_string() else {
                return Err(ConfigError::Invalid {
                    message: format!("keysym for `{}` must be a string", child.name().value()),
                });
            };

            match keysym_from_name(name) {
                Some(value) => {
                    *slot = Keysym {
                        name: name.to_string(),
                        value,
                    };
                }
                None => {
                    if first_unknown_span.is_none() {
                        let span = entry.span();
                        first_unknown_span = Some(miette::SourceSpan::from((span.offset(), span.len())));
                    }
                    unknown.push(name.to_string());
                }
            }
        }
    }

    if let Some(span) = first_unknown_span {
        return Err(ConfigError::UnknownKeysym {
            src: source.to_string(),
            span,
            names: unknown,
        });
    }

    Ok(keys)
}

fn first_string(node: &kdl::KdlNode) -> Option<&str> {
    node.entries().first().and_then(|e| e.value().as_string())
}

fn positive_int(node: &kdl::KdlNode) -> Result<u64, ConfigError> {
    let field = node.name().value();
    let value = node
        .entries()
        .first()
        .ok_or_else(|| ConfigError::MissingField {
            field: format!("value for `{}`", field),
        })?
        .value()
        .as_i64()
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("{} must be an integer", field),
        })?;

    if value <= 0 {
        return Err(ConfigError::Invalid {
            message: format!("{} must be greater than zero, got {}", field, value),
        });
    }

    Ok(value as u64)
}
