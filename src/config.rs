//! `Config`: bind address, schema directory, buffer sizing, and listener
//! backlog, loaded from an optional TOML file with CLI flags layered on top.
//! Mirrors the serde-derived, `#[serde(default)]` idiom the teacher's sibling
//! config modules use.

use crate::net::buffer::DEFAULT_BUFFER_CAPACITY;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

fn default_bind() -> SocketAddr {
    "0.0.0.0:1883".parse().unwrap()
}

fn default_schemas_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_backlog() -> u32 {
    128
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_schemas_dir")]
    pub schemas_dir: PathBuf,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            schemas_dir: default_schemas_dir(),
            buffer_capacity: default_buffer_capacity(),
            backlog: default_backlog(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0:?}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file {0:?}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

impl Config {
    /// Loads a TOML config file, falling back to defaults for any field the
    /// file omits.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Applies CLI overrides on top of whatever was loaded from file (or
    /// defaults, if no file was given).
    pub fn apply_overrides(
        &mut self,
        bind: Option<SocketAddr>,
        schemas_dir: Option<PathBuf>,
    ) {
        if let Some(bind) = bind {
            self.bind = bind;
        }
        if let Some(schemas_dir) = schemas_dir {
            self.schemas_dir = schemas_dir;
        }
    }
}
