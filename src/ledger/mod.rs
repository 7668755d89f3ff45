//! SQLite-backed handle ledger
//!
//! The ledger records which repository handles have been preserved, the noid
//! minted for each, and when each was last successfully processed:
//!
//! - `handle` (primary key) - hierarchical handle, e.g. `10919/8147`
//! - `noid` - minted once per handle, never rewritten
//! - `modify_date` - `YYYY-MM-DDTHH:MM:SS`, refreshed after each successful upload
//!
//! ## Concurrency
//!
//! Runs are sequential within a process. Two overlapping runs can race on a
//! new handle; the primary key rejects the second insert and the resolver
//! reports it as [`ResolveError::Conflict`]. Re-resolving picks up the winner.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dspace_aip_archiver::ledger::{HandleStore, Resolver};
//!
//! let store = HandleStore::open("dspace.db")?;
//! let resolver = Resolver::with_template(store, "vt.reedeedk")?;
//! let noid = resolver.resolve("10919/8147")?;
//! // ... export, bag, upload ...
//! resolver.mark_processed("10919/8147")?;
//! ```

pub mod error;
pub mod resolver;
pub mod store;

pub use error::{LedgerError, ResolveError, Result};
pub use resolver::Resolver;
pub use store::{DEFAULT_BUSY_TIMEOUT, HandleRecord, HandleStore};

/// Format used for `modify_date`
pub const MODIFY_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Current local time in `MODIFY_DATE_FORMAT`
pub fn timestamp_now() -> String {
    chrono::Local::now().format(MODIFY_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 19);
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, MODIFY_DATE_FORMAT).is_ok());
    }
}
