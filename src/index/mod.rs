//! Discovery and refresh pipeline for the theme registry.
//!
//! This module owns everything between the GitHub API and the merged
//! registry document: the paced HTTP client, the durable scan-state
//! store, and the collector that drives a full indexing pass.

mod collector;
mod github;
mod state;
mod state_lock;

pub use collector::{Collector, RunStats};
pub use github::{GitHubClient, Repository, SearchHit, TreeEntry};
pub use state::{ScanRecord, StateStore};
