use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use tracing::{debug, info};

use super::{DublinCore, HarvestError, HarvestWindow, OaiRecord, RecordSource, Result};

const NO_RECORDS_MATCH: &str = "noRecordsMatch";

/// One `ListRecords` response
#[derive(Debug, Default)]
pub struct ListRecordsPage {
    pub records: Vec<OaiRecord>,
    pub resumption_token: Option<String>,
}

/// OAI-PMH client for `ListRecords` harvesting
pub struct OaiClient {
    client: Client,
    base_url: String,
    metadata_prefix: String,
}

impl OaiClient {
    pub fn new(base_url: &str, metadata_prefix: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dspace-aip-archiver/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('?').to_string(),
            metadata_prefix: metadata_prefix.to_string(),
        })
    }

    async fn fetch_page(&self, query: &[(&str, &str)]) -> Result<ListRecordsPage> {
        let response = self.client.get(&self.base_url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_list_records(&body)
    }
}

#[async_trait]
impl RecordSource for OaiClient {
    async fn list_records(&self, from: NaiveDate) -> Result<Vec<OaiRecord>> {
        let from = HarvestWindow::since(from).from_param();
        info!(url = %self.base_url, from = %from, "Harvesting OAI records");

        let mut page = self
            .fetch_page(&[
                ("verb", "ListRecords"),
                ("metadataPrefix", self.metadata_prefix.as_str()),
                ("from", from.as_str()),
            ])
            .await?;

        let mut records = std::mem::take(&mut page.records);
        let mut pages = 1;

        while let Some(token) = page.resumption_token.take() {
            debug!(token = %token, "Following resumption token");
            page = self
                .fetch_page(&[("verb", "ListRecords"), ("resumptionToken", token.as_str())])
                .await?;
            records.append(&mut page.records);
            pages += 1;
        }

        info!(records = records.len(), pages, "Harvest complete");
        Ok(records)
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| HarvestError::Xml(err.to_string()))?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|err| HarvestError::Xml(err.to_string()))
    })
    .transpose()
}

/// Parse a `ListRecords` response body
///
/// `noRecordsMatch` yields an empty page; any other OAI error is returned.
pub fn parse_list_records(xml: &str) -> Result<ListRecordsPage> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = ListRecordsPage::default();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<OaiRecord> = None;
    let mut text = String::new();
    let mut oai_error: Option<(String, String)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| HarvestError::Xml(err.to_string()))?;

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "record" => current = Some(OaiRecord::default()),
                    "header" => {
                        if let Some(record) = current.as_mut() {
                            record.header.deleted =
                                attribute(&e, "status")?.as_deref() == Some("deleted");
                        }
                    }
                    "dc" => {
                        if let Some(record) = current.as_mut() {
                            record.metadata = Some(DublinCore::default());
                        }
                    }
                    "error" => {
                        let code = attribute(&e, "code")?.unwrap_or_default();
                        oai_error = Some((code, String::new()));
                    }
                    _ => {}
                }
                path.push(name);
                text.clear();
            }
            Event::Empty(e) => {
                if local_name(&e) == "error" {
                    let code = attribute(&e, "code")?.unwrap_or_default();
                    oai_error = Some((code, String::new()));
                }
            }
            Event::Text(t) => {
                let value = t.unescape().map_err(|err| HarvestError::Xml(err.to_string()))?;
                text.push_str(&value);
            }
            Event::CData(c) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                let parent = path.last().map(String::as_str);
                let value = std::mem::take(&mut text).trim().to_string();

                match (name.as_str(), parent) {
                    ("record", _) => {
                        if let Some(record) = current.take() {
                            page.records.push(record);
                        }
                    }
                    ("identifier", Some("header")) => {
                        if let Some(record) = current.as_mut() {
                            record.header.identifier = value;
                        }
                    }
                    ("datestamp", Some("header")) => {
                        if let Some(record) = current.as_mut() {
                            record.header.datestamp = value;
                        }
                    }
                    (field, Some("dc")) => {
                        if let Some(dc) = current.as_mut().and_then(|r| r.metadata.as_mut()) {
                            match field {
                                "title" => dc.titles.push(value),
                                "description" => dc.descriptions.push(value),
                                "identifier" => dc.identifiers.push(value),
                                _ => {}
                            }
                        }
                    }
                    ("resumptionToken", _) => {
                        if !value.is_empty() {
                            page.resumption_token = Some(value);
                        }
                    }
                    ("error", _) => {
                        if let Some((_, message)) = oai_error.as_mut() {
                            *message = value;
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match oai_error {
        Some((code, _)) if code == NO_RECORDS_MATCH => Ok(ListRecordsPage::default()),
        Some((code, message)) => Err(HarvestError::Oai { code, message }),
        None => Ok(page),
    }
}
