//! Configuration for debhub, read from a TOML file with environment overrides.

pub mod config;
pub mod error;

pub use config::{default_config_path, Config};
pub use error::{ConfigError, Result};
