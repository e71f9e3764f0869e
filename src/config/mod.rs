//! Configuration handling for the indexer.
//!
//! Configuration lives in a single JSON file (`indexer.config.json` by
//! default). Every field has a default, so an absent file yields a fully
//! usable configuration. Out-of-range numeric values are clamped and
//! reported as warnings rather than rejected; unknown keys and wrong-typed
//! values are hard errors.

mod config;

pub use config::{Config, DEFAULT_CONFIG_FILE, SortBy, SortOrder};
