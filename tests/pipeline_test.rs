use std::io::{Read, Write};
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use dspace_aip_archiver::config::Config;
use dspace_aip_archiver::export::{AipExporter, ExportError};
use dspace_aip_archiver::harvest::{
    self, DublinCore, HarvestError, HarvestWindow, OaiRecord, RecordHeader, RecordSource,
};
use dspace_aip_archiver::ledger::{HandleStore, Resolver};
use dspace_aip_archiver::pipeline::{Pipeline, PipelineSettings, RunError};
use dspace_aip_archiver::storage::StorageClient;

/// Config pointing every path at `root`
fn create_test_config(root: &Path) -> Config {
    let config_toml = format!(
        r#"
[dspace]
eperson = "archivist@vt.edu"
export_dir = "{export}"

[database]
path = "{db}"

[noid]
template = "zzzzzzzz"

[aptrust]
organization = "vt.edu"
group_id = "VTechWorks"
description = "VTechWorks AIP"
bag_prefix = "vt.edu."

[storage]
provider = "local"
bucket = "aptrust-receiving"
root = "{objects}"
part_size = "1KB"
"#,
        export = root.join("export").display(),
        db = root.join("dspace.db").display(),
        objects = root.join("objects").display(),
    );

    let config: Config = toml::from_str(&config_toml).expect("Failed to parse test config");
    config.validate().expect("Test config should be valid");
    config
}

fn record(handle: &str, title: &str) -> OaiRecord {
    OaiRecord {
        header: RecordHeader {
            identifier: format!("oai:vtechworks.lib.vt.edu:{handle}"),
            datestamp: "2024-03-09T12:00:00Z".to_string(),
            deleted: false,
        },
        metadata: Some(DublinCore {
            titles: vec![title.to_string()],
            descriptions: vec!["Line one\nline two".to_string()],
            identifiers: vec![format!("http://hdl.handle.net/{handle}")],
        }),
    }
}

struct FixedSource(Vec<OaiRecord>);

#[async_trait]
impl RecordSource for FixedSource {
    async fn list_records(&self, _from: NaiveDate) -> harvest::Result<Vec<OaiRecord>> {
        Ok(self.0.clone())
    }
}

struct DownSource;

#[async_trait]
impl RecordSource for DownSource {
    async fn list_records(&self, _from: NaiveDate) -> harvest::Result<Vec<OaiRecord>> {
        Err(HarvestError::Status(503))
    }
}

/// Stands in for the DSpace packager
struct FakePackager;

#[async_trait]
impl AipExporter for FakePackager {
    async fn export(&self, handle: &str, destination: &Path) -> Result<(), ExportError> {
        if handle.ends_with("/404") {
            return Err(ExportError::Failed {
                handle: handle.to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Cannot find item".to_string(),
            });
        }

        let file = std::fs::File::create(destination).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("mets.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<mets xmlns=\"http://www.loc.gov/METS/\"/>")
            .unwrap();
        zip.add_directory("bitstreams/", SimpleFileOptions::default())
            .unwrap();
        zip.start_file("bitstreams/report.pdf", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(&vec![7u8; 4096]).unwrap();
        zip.finish().unwrap();
        Ok(())
    }
}

fn build_pipeline(config: &Config, source: Box<dyn RecordSource>) -> Pipeline {
    let store = HandleStore::open(&config.database.path).expect("Failed to open store");
    let resolver = Resolver::with_template(store, &config.noid.template).unwrap();
    let storage = StorageClient::from_config(&config.storage).unwrap();

    Pipeline::new(
        source,
        Box::new(FakePackager),
        resolver,
        storage,
        PipelineSettings::from_config(config),
    )
}

fn tar_entries(path: &Path) -> Vec<String> {
    let mut archive = tar::Archive::new(std::fs::File::open(path).unwrap());
    archive
        .entries()
        .unwrap()
        .map(|entry| entry.unwrap().path().unwrap().display().to_string())
        .collect()
}

#[tokio::test]
async fn test_run_delivers_bags_to_storage() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let pipeline = build_pipeline(
        &config,
        Box::new(FixedSource(vec![
            record("10919/8147", "Annual Report"),
            record("10919/404", "Missing"),
        ])),
    );

    let summary = pipeline
        .run(HarvestWindow::since(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()))
        .await
        .unwrap();

    assert_eq!(summary.from, "2024-03-08");
    assert_eq!(summary.harvested, 2);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failures[0].handle, "10919/404");

    let processed = &summary.processed[0];
    let tar_path = temp_dir
        .path()
        .join("objects/aptrust-receiving")
        .join(&processed.key);
    assert_eq!(std::fs::metadata(&tar_path).unwrap().len(), processed.bytes);

    let bag_name = processed.key.trim_end_matches(".tar");
    let entries = tar_entries(&tar_path);
    for expected in [
        "bagit.txt",
        "bag-info.txt",
        "aptrust-info.txt",
        "manifest-md5.txt",
        "manifest-sha256.txt",
        "tagmanifest-md5.txt",
        "data/mets.xml",
        "data/bitstreams/report.pdf",
    ] {
        let path = format!("{bag_name}/{expected}");
        assert!(entries.contains(&path), "missing {path} in {entries:?}");
    }

    pipeline.close().unwrap();
}

#[tokio::test]
async fn test_bag_info_carries_noid() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(temp_dir.path());
    config.pipeline.keep_artifacts = true;
    let pipeline = build_pipeline(
        &config,
        Box::new(FixedSource(vec![record("10919/8147", "Annual Report")])),
    );

    let summary = pipeline.run(HarvestWindow::last_days(1)).await.unwrap();
    let noid = &summary.processed[0].noid;
    let bag_dir = config.dspace.export_dir.join(format!("vt.edu.{noid}"));

    let mut bag_info = String::new();
    std::fs::File::open(bag_dir.join("bag-info.txt"))
        .unwrap()
        .read_to_string(&mut bag_info)
        .unwrap();
    assert!(bag_info.contains(&format!("Internal-Sender-Identifier: {noid}")));
    assert!(bag_info.contains("Source-Organization: vt.edu"));
    assert!(bag_info.contains("Bag-Count: 1 of 1"));

    let aptrust = std::fs::read_to_string(bag_dir.join("aptrust-info.txt")).unwrap();
    assert!(aptrust.contains("Title: Annual Report"));
    assert!(aptrust.contains("Description: Line one line two"));
    assert!(aptrust.contains("Access: Institution"));
}

#[tokio::test]
async fn test_noids_are_stable_across_runs() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());

    let first = {
        let pipeline = build_pipeline(
            &config,
            Box::new(FixedSource(vec![record("10919/8147", "Annual Report")])),
        );
        let summary = pipeline.run(HarvestWindow::last_days(1)).await.unwrap();
        pipeline.close().unwrap();
        summary.processed[0].noid.clone()
    };

    let pipeline = build_pipeline(
        &config,
        Box::new(FixedSource(vec![record("10919/8147", "Annual Report")])),
    );
    let summary = pipeline.run(HarvestWindow::last_days(1)).await.unwrap();

    assert_eq!(summary.processed[0].noid, first);
    assert_eq!(pipeline.resolver().store().count().unwrap(), 1);
}

#[tokio::test]
async fn test_harvest_failure_aborts_run() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let pipeline = build_pipeline(&config, Box::new(DownSource));

    let result = pipeline.run(HarvestWindow::last_days(1)).await;
    assert!(matches!(
        result,
        Err(RunError::Harvest(HarvestError::Status(503)))
    ));
    assert_eq!(pipeline.resolver().store().count().unwrap(), 0);
}
