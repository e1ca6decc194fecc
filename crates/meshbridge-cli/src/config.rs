//! Configuration – reads `~/.meshbridge/config.toml` and merges it with the
//! command line.
//!
//! Precedence, highest first: flags, `MESHBRIDGE_*` environment variables
//! (both via clap), the config file, built-in defaults.
//!
//! ```toml
//! name = "zwave"
//! url = "mqtt://127.0.0.1"
//! device = "/dev/ttyACM0"
//! verbosity = "info"
//! topology = "/etc/meshbridge/topology.toml"
//! clear_removed_values = false
//!
//! [nodes.3]
//! name = "Hall dimmer"
//! location = "Hall"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use meshbridge_core::MetadataOverrides;
use meshbridge_types::BridgeError;
use serde::Deserialize;

use crate::cli::{Args, Verbosity};

const DEFAULT_NAME: &str = "zwave";
const DEFAULT_URL: &str = "mqtt://127.0.0.1";
const DEFAULT_DEVICE: &str = "/dev/ttyACM0";

/// Contents of the config file.  Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub name: Option<String>,
    pub url: Option<String>,
    pub device: Option<String>,
    pub verbosity: Option<Verbosity>,
    pub topology: Option<PathBuf>,
    pub clear_removed_values: Option<bool>,
    #[serde(default)]
    pub nodes: MetadataOverrides,
}

/// Fully resolved settings.  Loaded once at startup; never changes.
#[derive(Debug, Clone)]
pub struct Settings {
    pub name: String,
    pub url: String,
    pub device: String,
    pub verbosity: Verbosity,
    pub topology: Option<PathBuf>,
    pub clear_removed_values: bool,
    pub nodes: MetadataOverrides,
}

impl Settings {
    /// Merge `args` over `file` over defaults and validate the result.
    pub fn resolve(args: Args, file: Option<FileConfig>) -> Result<Self, BridgeError> {
        let file = file.unwrap_or_default();
        let settings = Self {
            name: args
                .name
                .or(file.name)
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            url: args
                .url
                .or(file.url)
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            device: args
                .device
                .or(file.device)
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            verbosity: args.verbosity.or(file.verbosity).unwrap_or_default(),
            topology: args.topology.or(file.topology),
            clear_removed_values: args.clear_removed_values
                || file.clear_removed_values.unwrap_or(false),
            nodes: file.nodes,
        };
        validate_name(&settings.name)?;
        Ok(settings)
    }
}

/// The instance name is used verbatim as a topic level.
fn validate_name(name: &str) -> Result<(), BridgeError> {
    if name.is_empty() {
        return Err(BridgeError::Config("instance name must not be empty".to_string()));
    }
    if name.contains(['/', '+', '#']) {
        return Err(BridgeError::Config(format!(
            "instance name '{name}' must not contain '/', '+' or '#'"
        )));
    }
    Ok(())
}

/// Return the path to `~/.meshbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".meshbridge").join("config.toml")
}

/// Load the config file.  Returns `None` if it does not exist.
pub fn load_from(path: &Path) -> Result<Option<FileConfig>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Resolve settings from parsed arguments, reading the file named by
/// `--config` or the default location.  An explicitly named file must exist.
pub fn load(args: Args) -> Result<Settings, BridgeError> {
    let file = match &args.config {
        Some(path) => Some(load_from(path)?.ok_or_else(|| {
            BridgeError::Config(format!("config file {} does not exist", path.display()))
        })?),
        None => load_from(&config_path())?,
    };
    Settings::resolve(args, file)
}
