//! Configuration management for the archiver
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use dspace_aip_archiver::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Harvesting from: {}", config.oai.url);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `ARCHIVER__<section>__<key>`
//!
//! Examples:
//! - `ARCHIVER__OAI__DAYS=7`
//! - `ARCHIVER__DSPACE__EPERSON=archivist@vt.edu`
//! - `ARCHIVER__STORAGE__PART_SIZE=16MB`
//!
//! S3 credentials are read only from `S3_ACCESS_KEY`/`S3_SECRET_KEY` (or the
//! AWS equivalents).
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/archiver.toml`.
//! This can be overridden using the `ARCHIVER_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

// Re-export public types
pub use crate::humanize::ByteSize;
pub use models::{
    AptrustConfig, Config, DatabaseConfig, DspaceConfig, LogFormat, LoggingConfig, NoidConfig,
    OaiConfig, PipelineConfig, StorageConfig, StorageProvider,
};
pub use sources::config_path;
pub use validation::ValidationError;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (bad noid template, missing eperson, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load using an explicit file path when one is given
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load without validation, for commands that only read part of it
    pub fn load_unchecked(path: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(sources::load(path)?)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Validate an already-built configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }
}
