use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "ARCHIVER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/archiver.toml";
const ENV_PREFIX: &str = "ARCHIVER";
const ENV_SEPARATOR: &str = "__";

/// Path of the TOML file: explicit argument, then `ARCHIVER_CONFIG`, then the default
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(config_path(explicit))?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets are never stored in TOML files, only in environment
fn load_secrets(config: &mut Config) {
    config.storage.access_key = env::var("S3_ACCESS_KEY")
        .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
        .ok();
    config.storage.secret_key = env::var("S3_SECRET_KEY")
        .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
        .ok();
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // ARCHIVER__DSPACE__EPERSON -> dspace.eperson
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageProvider;
    use crate::humanize::ByteSize;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.oai.metadata_prefix, "oai_dc");
        assert_eq!(config.database.path, PathBuf::from("dspace.db"));
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[oai]
url = "https://vtechworks.lib.vt.edu/oai/request"
days = 7

[dspace]
cli = "/dspace/bin/dspace"
eperson = "archivist@vt.edu"
export_dir = "/tmp/dspace-export"

[noid]
template = "vt.reedeedk"

[aptrust]
organization = "vt.edu"
group_id = "VTechWorks"
desc = "VTechWorks AIP"
bag_prefix = "vt.edu."

[storage]
provider = "s3"
bucket = "aptrust.receiving.test.vt.edu"
region = "us-east-1"
part_size = "16MB"

[pipeline]
checksums = ["md5", "sha256"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.oai.url, "https://vtechworks.lib.vt.edu/oai/request");
        assert_eq!(config.oai.days, 7);
        assert_eq!(config.dspace.eperson, "archivist@vt.edu");
        assert_eq!(config.noid.template, "vt.reedeedk");
        assert_eq!(config.aptrust.description, "VTechWorks AIP");
        assert_eq!(config.storage.provider, StorageProvider::S3);
        assert_eq!(config.storage.part_size, ByteSize::mib(16));
        assert_eq!(config.pipeline.checksums.len(), 2);
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = config_path(Some(Path::new("/etc/archiver.toml")));
        assert_eq!(path, PathBuf::from("/etc/archiver.toml"));
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[oai\nurl = ").unwrap();

        assert!(load_from_sources(config_path).is_err());
    }
}
