//! Harvest → export → bag → upload driver
//!
//! Handles are processed one at a time. A failure in any stage is recorded
//! against its handle and the run moves on; only a harvest failure or a
//! ledger failure stops the run, since continuing without the ledger would
//! mint identifiers that are never recorded.

mod summary;

pub use summary::{HandleFailure, Processed, RunSummary};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bag::{BagError, ChecksumAlgorithm, aptrust_info, bag_name, bagit_info, make_bag};
use crate::config::{AptrustConfig, Config};
use crate::export::{AipExporter, ExportError, aip_file_name};
use crate::harvest::{
    HarvestError, HarvestWindow, OaiRecord, RecordSource, extract_handle, records_with_metadata,
};
use crate::ledger::{ResolveError, Resolver};
use crate::package::{self, PackageError};
use crate::storage::{ProgressTracker, StorageClient, StorageError};

/// Tag file carrying the APTrust title, description and access level
pub const APTRUST_INFO_FILE: &str = "aptrust-info.txt";

/// Errors that stop a whole run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Harvest failed: {0}")]
    Harvest(#[from] HarvestError),

    #[error("Handle ledger failed: {0}")]
    Ledger(ResolveError),

    #[error("Cannot create export directory {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors confined to a single handle
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Resolve failed: {0}")]
    Resolve(ResolveError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Packaging failed: {0}")]
    Package(#[from] PackageError),

    #[error("Bagging failed: {0}")]
    Bag(#[from] BagError),

    #[error("Upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Bagging task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<ResolveError> for PipelineError {
    fn from(err: ResolveError) -> Self {
        PipelineError::Resolve(err)
    }
}

pub type Result<T> = std::result::Result<T, RunError>;

/// What the pipeline needs from configuration
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub handle_prefix: String,
    pub export_dir: PathBuf,
    pub aptrust: AptrustConfig,
    pub checksums: Vec<ChecksumAlgorithm>,
    pub keep_artifacts: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            handle_prefix: config.oai.handle_prefix.clone(),
            export_dir: config.dspace.export_dir.clone(),
            aptrust: config.aptrust.clone(),
            checksums: config.pipeline.checksums.clone(),
            keep_artifacts: config.pipeline.keep_artifacts,
        }
    }
}

/// A harvested item ready for preservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub handle: String,
    pub title: String,
    pub description: String,
}

/// Turn harvested records into unique work items
///
/// Returns the items in harvest order plus the number of records skipped
/// (deleted, no metadata, no handle, or a repeated handle).
pub fn work_items(records: &[OaiRecord], handle_prefix: &str) -> (Vec<WorkItem>, usize) {
    let live = records_with_metadata(records);
    let mut skipped = records.len() - live.len();
    if skipped > 0 {
        debug!(skipped, "Skipping deleted records and records without metadata");
    }

    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for (header, dc) in live {
        let Some(handle) = extract_handle(&dc.identifiers, handle_prefix) else {
            warn!(identifier = %header.identifier, "No handle in record identifiers");
            skipped += 1;
            continue;
        };

        if !seen.insert(handle.clone()) {
            debug!(handle = %handle, "Handle repeated in harvest");
            skipped += 1;
            continue;
        }

        items.push(WorkItem {
            handle,
            title: dc.title().to_string(),
            description: dc.description().to_string(),
        });
    }

    (items, skipped)
}

/// Working files for one handle under the export directory
#[derive(Debug, Clone)]
struct Workspace {
    zip_path: PathBuf,
    bag_dir: PathBuf,
    tar_path: PathBuf,
    bag_name: String,
}

impl Workspace {
    fn new(export_dir: &Path, handle: &str, bag_name: String) -> Self {
        Self {
            zip_path: export_dir.join(aip_file_name(handle)),
            bag_dir: export_dir.join(&bag_name),
            tar_path: export_dir.join(format!("{bag_name}.tar")),
            bag_name,
        }
    }

    fn key(&self) -> String {
        format!("{}.tar", self.bag_name)
    }

    fn remove(&self) {
        for file in [&self.zip_path, &self.tar_path] {
            if let Err(err) = std::fs::remove_file(file) {
                warn!(path = %file.display(), error = %err, "Could not remove working file");
            }
        }
        if let Err(err) = std::fs::remove_dir_all(&self.bag_dir) {
            warn!(path = %self.bag_dir.display(), error = %err, "Could not remove bag directory");
        }
    }
}

/// Owns every collaborator for the length of a run
pub struct Pipeline {
    source: Box<dyn RecordSource>,
    exporter: Box<dyn AipExporter>,
    resolver: Resolver,
    storage: StorageClient,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn RecordSource>,
        exporter: Box<dyn AipExporter>,
        resolver: Resolver,
        storage: StorageClient,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            exporter,
            resolver,
            storage,
            settings,
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Harvest the window and preserve every handle found in it
    pub async fn run(&self, window: HarvestWindow) -> Result<RunSummary> {
        let from = window.from_param();
        info!(from = %from, "Starting harvest");

        let records = self.source.list_records(window.from).await?;
        let (items, skipped) = work_items(&records, &self.settings.handle_prefix);

        let mut summary = RunSummary::new(from);
        summary.harvested = records.len();
        summary.skipped = skipped;
        info!(
            harvested = summary.harvested,
            handles = items.len(),
            skipped,
            "Harvest complete"
        );

        tokio::fs::create_dir_all(&self.settings.export_dir)
            .await
            .map_err(|source| RunError::Workspace {
                path: self.settings.export_dir.clone(),
                source,
            })?;

        for item in &items {
            match self.process(item).await {
                Ok(processed) => {
                    info!(
                        handle = %processed.handle,
                        noid = %processed.noid,
                        key = %processed.key,
                        bytes = processed.bytes,
                        "Handle preserved"
                    );
                    summary.record_success(processed);
                }
                Err(PipelineError::Resolve(
                    err @ (ResolveError::Ledger(_) | ResolveError::Template(_)),
                )) => {
                    error!(handle = %item.handle, error = %err, "Ledger failure, stopping run");
                    return Err(RunError::Ledger(err));
                }
                Err(err) => {
                    error!(handle = %item.handle, error = %err, "Handle failed");
                    summary.record_failure(&item.handle, &err);
                }
            }
        }

        info!("{}", summary.headline());
        Ok(summary)
    }

    /// Every stage for one handle; `modify_date` moves only after the upload
    pub async fn process(&self, item: &WorkItem) -> std::result::Result<Processed, PipelineError> {
        let handle = item.handle.as_str();
        let noid = self.resolver.resolve_with_retry(handle)?;

        let workspace = Workspace::new(
            &self.settings.export_dir,
            handle,
            bag_name(&self.settings.aptrust, &noid),
        );

        self.exporter.export(handle, &workspace.zip_path).await?;

        let job = BagJob {
            workspace: workspace.clone(),
            noid: noid.clone(),
            aptrust: self.settings.aptrust.clone(),
            checksums: self.settings.checksums.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
        };
        let size = tokio::task::spawn_blocking(move || job.run()).await??;

        let key = workspace.key();
        let tracker = ProgressTracker::new(&key, size);
        let upload = self
            .storage
            .upload_file(&workspace.tar_path, &key, |bytes| {
                tracker.record(bytes);
            })
            .await?;

        self.resolver.mark_processed(handle)?;

        if self.settings.keep_artifacts {
            debug!(handle, path = %workspace.bag_dir.display(), "Keeping working files");
        } else {
            workspace.remove();
        }

        Ok(Processed {
            handle: handle.to_string(),
            noid,
            key,
            bytes: upload.size,
        })
    }

    /// Release the ledger
    pub fn close(self) -> std::result::Result<(), ResolveError> {
        self.resolver.close()
    }
}

/// Filesystem half of a handle: unpack, bag and tar
struct BagJob {
    workspace: Workspace,
    noid: String,
    aptrust: AptrustConfig,
    checksums: Vec<ChecksumAlgorithm>,
    title: String,
    description: String,
}

impl BagJob {
    /// Returns the size of the finished tar
    fn run(self) -> std::result::Result<u64, PipelineError> {
        let Workspace {
            zip_path,
            bag_dir,
            tar_path,
            bag_name,
        } = &self.workspace;

        // Left over from an earlier failed attempt
        if bag_dir.exists() {
            std::fs::remove_dir_all(bag_dir).map_err(BagError::from)?;
        }

        let files = package::unpack_aip(zip_path, bag_dir)?;
        debug!(noid = %self.noid, files, "Unpacked AIP");

        let info = bagit_info(&self.aptrust, &self.noid, (1, 1));
        let bag = make_bag(bag_dir, &info, &self.checksums)?;
        bag.add_tag_file(
            APTRUST_INFO_FILE,
            &aptrust_info(&self.aptrust, &self.title, &self.description),
        )?;

        let size = package::tar_bag(bag_dir, bag_name, tar_path)?;
        debug!(
            noid = %self.noid,
            payload_files = bag.payload_files,
            payload_bytes = bag.payload_bytes,
            size,
            "Bag written"
        );
        Ok(size)
    }
}
