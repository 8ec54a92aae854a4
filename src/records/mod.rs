//! Records platform integration: REST client and the local per-site dataset cache.

pub mod cache;
pub mod client;

pub use cache::{CachedDataset, DatasetCache};
pub use client::{RecordsClient, RecordsError, SiteRecords};
