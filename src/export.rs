//! AIP export through the DSpace packager CLI

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to launch {cli}: {source}")]
    Spawn {
        cli: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Packager exited with {status} for {handle}: {stderr}")]
    Failed {
        handle: String,
        status: String,
        stderr: String,
    },

    #[error("Packager reported success but {} is missing", .0.display())]
    MissingPackage(PathBuf),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Produces an AIP zip for a handle at a given destination
#[async_trait]
pub trait AipExporter: Send + Sync {
    async fn export(&self, handle: &str, destination: &Path) -> Result<()>;
}

/// File name of the exported AIP: `10919/8147` -> `10919-8147.zip`
pub fn aip_file_name(handle: &str) -> String {
    format!("{}.zip", handle.replace('/', "-"))
}

/// Runs `<cli> packager -d -t AIP -e <eperson> -i <handle> <destination>`
#[derive(Debug, Clone)]
pub struct DspaceExporter {
    cli: PathBuf,
    eperson: String,
}

impl DspaceExporter {
    pub fn new(cli: impl Into<PathBuf>, eperson: impl Into<String>) -> Self {
        Self {
            cli: cli.into(),
            eperson: eperson.into(),
        }
    }

    pub fn command_args(&self, handle: &str, destination: &Path) -> Vec<OsString> {
        vec![
            "packager".into(),
            "-d".into(),
            "-t".into(),
            "AIP".into(),
            "-e".into(),
            self.eperson.clone().into(),
            "-i".into(),
            handle.into(),
            destination.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl AipExporter for DspaceExporter {
    async fn export(&self, handle: &str, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ExportError::Spawn {
                    cli: self.cli.display().to_string(),
                    source,
                })?;
        }

        debug!(handle, destination = %destination.display(), "Running DSpace packager");
        let output = Command::new(&self.cli)
            .args(self.command_args(handle, destination))
            .output()
            .await
            .map_err(|source| ExportError::Spawn {
                cli: self.cli.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExportError::Failed {
                handle: handle.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !tokio::fs::try_exists(destination).await.unwrap_or(false) {
            return Err(ExportError::MissingPackage(destination.to_path_buf()));
        }

        info!(handle, destination = %destination.display(), "AIP exported");
        Ok(())
    }
}
