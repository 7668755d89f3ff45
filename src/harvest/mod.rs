//! OAI-PMH harvesting of new and changed repository records
//!
//! [`OaiClient`] walks `ListRecords` pages for a date window and returns
//! `oai_dc` records. The pipeline only needs each record's handle, title and
//! description, so everything else in the response is ignored.

mod oai;

pub use oai::{ListRecordsPage, OaiClient, parse_list_records};

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("OAI request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OAI endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Malformed OAI response: {0}")]
    Xml(String),

    #[error("OAI error {code}: {message}")]
    Oai { code: String, message: String },
}

pub type Result<T> = std::result::Result<T, HarvestError>;

/// OAI `<header>` fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordHeader {
    pub identifier: String,
    pub datestamp: String,
    pub deleted: bool,
}

/// The Dublin Core fields the archiver cares about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DublinCore {
    pub titles: Vec<String>,
    pub descriptions: Vec<String>,
    pub identifiers: Vec<String>,
}

impl DublinCore {
    pub fn title(&self) -> &str {
        self.titles.first().map(String::as_str).unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.descriptions.first().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OaiRecord {
    pub header: RecordHeader,
    pub metadata: Option<DublinCore>,
}

/// Source of harvested records for a date window
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn list_records(&self, from: NaiveDate) -> Result<Vec<OaiRecord>>;
}

/// Start of the harvest window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestWindow {
    pub from: NaiveDate,
}

impl HarvestWindow {
    /// Window covering the last `days` days, local time
    pub fn last_days(days: u32) -> Self {
        let today = Local::now().date_naive();
        let from = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(today);
        Self { from }
    }

    pub fn since(from: NaiveDate) -> Self {
        Self { from }
    }

    /// `YYYY-MM-DD`, the granularity every OAI endpoint must accept
    pub fn from_param(&self) -> String {
        self.from.format("%Y-%m-%d").to_string()
    }
}

/// Records that still carry metadata (deleted records do not), paired with it
pub fn records_with_metadata(records: &[OaiRecord]) -> Vec<(&RecordHeader, &DublinCore)> {
    records
        .iter()
        .filter(|r| !r.header.deleted)
        .filter_map(|r| r.metadata.as_ref().map(|dc| (&r.header, dc)))
        .collect()
}

/// Bare handle from a record's `dc:identifier` values
///
/// The last value containing the resolver prefix wins.
pub fn extract_handle<S: AsRef<str>>(identifiers: &[S], resolver_prefix: &str) -> Option<String> {
    identifiers
        .iter()
        .map(AsRef::as_ref)
        .filter(|value| value.contains(resolver_prefix))
        .last()
        .map(|value| value.replace(resolver_prefix, "").trim().to_string())
        .filter(|handle| !handle.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "http://hdl.handle.net/";

    #[test]
    fn test_extract_handle() {
        let identifiers = ["AR200304.pdf", "http://hdl.handle.net/10919/8147"];
        assert_eq!(
            extract_handle(&identifiers, PREFIX),
            Some("10919/8147".to_string())
        );
    }

    #[test]
    fn test_extract_handle_missing() {
        let identifiers = ["AR200304.pdf", "doi:10.1000/182"];
        assert_eq!(extract_handle(&identifiers, PREFIX), None);
        assert_eq!(extract_handle::<&str>(&[], PREFIX), None);
        assert_eq!(extract_handle(&["http://hdl.handle.net/"], PREFIX), None);
    }

    #[test]
    fn test_extract_handle_last_match_wins() {
        let identifiers = [
            "http://hdl.handle.net/10919/1",
            "http://hdl.handle.net/10919/2",
        ];
        assert_eq!(
            extract_handle(&identifiers, PREFIX),
            Some("10919/2".to_string())
        );
    }

    fn record(id: &str, metadata: bool, deleted: bool) -> OaiRecord {
        OaiRecord {
            header: RecordHeader {
                identifier: id.to_string(),
                datestamp: "2024-01-01".to_string(),
                deleted,
            },
            metadata: metadata.then(|| DublinCore {
                titles: vec![format!("title {id}")],
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_records_with_metadata() {
        let records = [record("1", true, false), record("2", true, false)];
        assert_eq!(records_with_metadata(&records).len(), 2);

        let records = [
            record("1", true, false),
            record("2", false, true),
            // Deleted but still carrying stale metadata
            record("3", true, true),
        ];
        let kept = records_with_metadata(&records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0.identifier, "1");
        assert_eq!(kept[0].1.title(), "title 1");

        assert!(records_with_metadata(&[]).is_empty());
    }

    #[test]
    fn test_window_param() {
        let window = HarvestWindow::since(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(window.from_param(), "2024-03-09");

        let window = HarvestWindow::last_days(1);
        assert!(window.from < Local::now().date_naive());
    }
}
