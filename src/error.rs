//! Top-level error type aggregating every subsystem error `main` can
//! encounter. Everything below connection scope (codec errors, decode/encode
//! errors) stays inside the session dispatch path and is logged rather than
//! surfaced here.

use crate::config::ConfigError;
use crate::net::server::ServerError;
use crate::schema::registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToriiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
