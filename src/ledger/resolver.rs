use tracing::{debug, info, warn};

use crate::noid::{Mint, Minter};

use super::error::ResolveError;
use super::store::HandleStore;
use super::timestamp_now;

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Hands out a stable noid per handle, minting only on first sight
pub struct Resolver {
    store: HandleStore,
    minter: Box<dyn Mint + Send>,
}

impl Resolver {
    pub fn new(store: HandleStore, minter: Minter) -> Self {
        Self::with_minter(store, minter)
    }

    /// Resolver over any identifier source
    pub fn with_minter(store: HandleStore, minter: impl Mint + Send + 'static) -> Self {
        Self {
            store,
            minter: Box::new(minter),
        }
    }

    /// Build a resolver from a raw template, failing fast if it does not parse
    pub fn with_template(store: HandleStore, template: &str) -> Result<Self> {
        Ok(Self::new(store, Minter::new(template)?))
    }

    pub fn store(&self) -> &HandleStore {
        &self.store
    }

    /// Stored noid, or a freshly minted and recorded one
    pub fn resolve(&self, handle: &str) -> Result<String> {
        if let Some(noid) = self.store.lookup(handle)? {
            debug!(handle, noid, "Handle already known");
            return Ok(noid);
        }

        let noid = self.minter.mint();
        self.store.insert(handle, &noid, &timestamp_now())?;
        info!(handle, noid, "Minted noid for new handle");
        Ok(noid)
    }

    /// `resolve`, retried once if another writer won the insert race
    pub fn resolve_with_retry(&self, handle: &str) -> Result<String> {
        match self.resolve(handle) {
            Err(ResolveError::Conflict(_)) => {
                warn!(handle, "Insert lost to a concurrent writer, re-resolving");
                self.resolve(handle)
            }
            other => other,
        }
    }

    /// Refresh `modify_date` after a successful upload; false if the handle is unknown
    pub fn mark_processed(&self, handle: &str) -> Result<bool> {
        let Some(record) = self.store.get(handle)? else {
            debug!(handle, "mark_processed on unknown handle");
            return Ok(false);
        };

        let now = timestamp_now();
        // Fixed-width format, so string order is chronological order
        let modify_date = if record.modify_date > now {
            record.modify_date
        } else {
            now
        };

        let rows = self.store.update_modify_date(handle, &modify_date)?;
        Ok(rows > 0)
    }

    /// Close the underlying store
    pub fn close(mut self) -> Result<()> {
        self.store.close()?;
        Ok(())
    }
}
