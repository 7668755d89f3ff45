pub mod bag;
pub mod config;
pub mod export;
pub mod harvest;
pub mod humanize;
pub mod ledger;
pub mod noid;
pub mod observability;
pub mod package;
pub mod pipeline;
pub mod storage;
