use crate::bag::ChecksumAlgorithm;
use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub oai: OaiConfig,
    #[serde(default)]
    pub dspace: DspaceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub noid: NoidConfig,
    #[serde(default)]
    pub aptrust: AptrustConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OAI-PMH endpoint and harvest window
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OaiConfig {
    #[serde(default = "default_oai_url")]
    pub url: String,
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    /// Harvest records changed within the last `days` days
    #[serde(default = "default_days")]
    pub days: u32,
    /// Resolver prefix stripped from `dc:identifier` to get the bare handle
    #[serde(default = "default_handle_prefix")]
    pub handle_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OaiConfig {
    fn default() -> Self {
        Self {
            url: default_oai_url(),
            metadata_prefix: default_metadata_prefix(),
            days: default_days(),
            handle_prefix: default_handle_prefix(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_oai_url() -> String {
    "http://localhost:8080/oai/request".to_string()
}

fn default_metadata_prefix() -> String {
    "oai_dc".to_string()
}

fn default_days() -> u32 {
    1
}

fn default_handle_prefix() -> String {
    "http://hdl.handle.net/".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// DSpace packager invocation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DspaceConfig {
    #[serde(default = "default_dspace_cli")]
    pub cli: PathBuf,
    /// Operator e-mail passed to `packager -e`
    #[serde(default)]
    pub eperson: String,
    /// Where AIP zips, working bags and tars are written
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for DspaceConfig {
    fn default() -> Self {
        Self {
            cli: default_dspace_cli(),
            eperson: String::new(),
            export_dir: default_export_dir(),
        }
    }
}

fn default_dspace_cli() -> PathBuf {
    PathBuf::from("/dspace/bin/dspace")
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("/tmp/dspace-export")
}

/// Handle ledger location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("dspace.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NoidConfig {
    #[serde(default = "default_noid_template")]
    pub template: String,
}

impl Default for NoidConfig {
    fn default() -> Self {
        Self {
            template: default_noid_template(),
        }
    }
}

fn default_noid_template() -> String {
    "reedeedk".to_string()
}

/// APTrust bag metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AptrustConfig {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(default = "default_access_level")]
    pub access_level: String,
    #[serde(default = "default_storage_option")]
    pub storage_option: String,
    /// Prepended to the noid to form the bag name, e.g. `vt.edu.`
    #[serde(default)]
    pub bag_prefix: String,
}

impl Default for AptrustConfig {
    fn default() -> Self {
        Self {
            organization: String::new(),
            group_id: String::new(),
            description: String::new(),
            access_level: default_access_level(),
            storage_option: default_storage_option(),
            bag_prefix: String::new(),
        }
    }
}

fn default_access_level() -> String {
    "Institution".to_string()
}

fn default_storage_option() -> String {
    "Standard".to_string()
}

/// Storage provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    #[default]
    Local,
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// Root directory for the `local` provider
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_part_size")]
    pub part_size: ByteSize,
    /// S3 access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// S3 secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            bucket: default_bucket(),
            endpoint: None,
            region: None,
            root: default_storage_root(),
            part_size: default_part_size(),
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_bucket() -> String {
    "aptrust-receiving".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/objects")
}

fn default_part_size() -> ByteSize {
    ByteSize::mib(8)
}

/// Per-run pipeline behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Keep zips, bag directories and tars after a successful upload
    #[serde(default)]
    pub keep_artifacts: bool,
    #[serde(default = "default_checksums")]
    pub checksums: Vec<ChecksumAlgorithm>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keep_artifacts: false,
            checksums: default_checksums(),
        }
    }
}

fn default_checksums() -> Vec<ChecksumAlgorithm> {
    vec![ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha256]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
