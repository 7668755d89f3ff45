use serde::Serialize;

/// A handle that made it all the way to storage
#[derive(Debug, Clone, Serialize)]
pub struct Processed {
    pub handle: String,
    pub noid: String,
    pub key: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandleFailure {
    pub handle: String,
    pub error: String,
}

/// Outcome of one archiver run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub from: String,
    /// Records returned by the harvest, deleted ones included
    pub harvested: usize,
    /// Records without metadata or without a handle, plus duplicate handles
    pub skipped: usize,
    pub processed: Vec<Processed>,
    pub failures: Vec<HandleFailure>,
}

impl RunSummary {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> usize {
        self.processed.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.processed.iter().map(|p| p.bytes).sum()
    }

    pub fn record_success(&mut self, processed: Processed) {
        self.processed.push(processed);
    }

    pub fn record_failure(&mut self, handle: &str, error: impl ToString) {
        self.failures.push(HandleFailure {
            handle: handle.to_string(),
            error: error.to_string(),
        });
    }

    /// One-line human summary
    pub fn headline(&self) -> String {
        format!(
            "from {}: harvested {}, skipped {}, succeeded {}, failed {}, uploaded {} bytes",
            self.from,
            self.harvested,
            self.skipped,
            self.succeeded(),
            self.failed(),
            self.bytes_uploaded()
        )
    }
}
