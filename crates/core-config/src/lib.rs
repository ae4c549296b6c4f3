//! Configuration loading and parsing.
//!
//! `vicmd.toml` holds the chord timeout (`[input]`), key mappings applied at
//! startup (`[[map]]`) and user commands defined at startup (`[[command]]`).
//! A missing file yields defaults; so does a file that fails to parse, with
//! a warning. Unknown fields are ignored.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Input mode a `[[map]]` entry applies to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MapMode {
    #[default]
    Normal,
    Visual,
    Cmdline,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MapEntry {
    #[serde(default)]
    pub mode: MapMode,
    pub lhs: String,
    pub rhs: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub map: Vec<MapEntry>,
    #[serde(default)]
    pub command: Vec<CommandEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "InputConfig::default_timeout")]
    pub timeout: bool,
    #[serde(default = "InputConfig::default_timeoutlen")] // milliseconds
    pub timeoutlen: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            timeoutlen: Self::default_timeoutlen(),
        }
    }
}

impl InputConfig {
    const fn default_timeout() -> bool {
        true
    }
    const fn default_timeoutlen() -> u32 {
        1000
    }
}

/// Config path: `./vicmd.toml` when present, else the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("vicmd.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("vicmd").join("vicmd.toml");
    }
    PathBuf::from("vicmd.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            info!(
                target: "config",
                path = %path.display(),
                maps = file.map.len(),
                commands = file.command.len(),
                "config_loaded"
            );
            Ok(Config {
                raw: Some(content),
                file,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// How long the host waits for the rest of a chord; `None` waits forever.
    pub fn chord_timeout(&self) -> Option<Duration> {
        let input = &self.file.input;
        input
            .timeout
            .then(|| Duration::from_millis(u64::from(input.timeoutlen)))
    }

    /// `[[map]]` entries for one mode, in file order.
    pub fn maps_for(&self, mode: MapMode) -> impl Iterator<Item = &MapEntry> {
        self.file.map.iter().filter(move |entry| entry.mode == mode)
    }
}
