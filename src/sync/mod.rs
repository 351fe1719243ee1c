//! Upstream synchronization of external packages.
//!
//! Local packages are partitioned out before anything is fetched; only
//! entries whose provenance is external ever reach a [`Fetcher`].

pub mod engine;
pub mod fetch;

pub use engine::{EntryResult, SyncEngine, SyncOutcome, SyncReport};
pub use fetch::{DirFetcher, FetchedPackage, Fetcher, HttpFetcher, SourceFetcher};
