//! Durable scan-state store backing incremental refresh.
//!
//! Every repository that has been fetched at least once has a record
//! here: the `updated_at` marker observed at discovery time, the moment
//! it was scanned, and the registry entry built from it (or the error
//! that prevented one). Records let later runs skip repositories whose
//! marker has not moved and whose scan is not yet stale.

use crate::Result;
use crate::index::state_lock::{StateLockGuard, acquire_state_lock};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

const LOG_TARGET: &str = "     state";

const SECONDS_PER_DAY: i64 = 86_400;

/// One scanned repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Canonical `owner/name` identifier.
    pub repo: String,

    /// `updated_at` marker captured when the repository was discovered.
    pub updated_at: String,

    /// Unix timestamp of the scan that produced this record.
    pub scanned_at: i64,

    /// Registry entry built by the scan, JSON-encoded.
    pub payload_json: String,

    /// Error message when the scan failed, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl ScanRecord {
    fn failed(&self) -> bool {
        self.parse_error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDoc {
    #[serde(default)]
    repos: BTreeMap<String, ScanRecord>,
}

/// On-disk record store, exclusively locked for the lifetime of the value.
///
/// The store is a single JSON document rewritten atomically on every
/// upsert, so a crash mid-run never leaves a partially written file
/// behind.
#[derive(Debug)]
pub struct StateStore {
    path: Utf8PathBuf,
    doc: StateDoc,
    _lock: StateLockGuard,
}

impl StateStore {
    /// Open (or create) the store at `db_path` and take the exclusive lock.
    pub async fn open(db_path: &Utf8Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create state directory '{parent}'"))?;
        }

        let lock = acquire_state_lock(db_path).await?;

        let doc = match fs::read_to_string(db_path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(doc) => doc,
                Err(e) => {
                    // A mangled store only costs a full rescan, so start over
                    log::warn!(target: LOG_TARGET, "Discarding unreadable state store at '{db_path}': {e}");
                    StateDoc::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateDoc::default(),
            Err(e) => {
                return Err(e).into_app_err_with(|| format!("unable to read state store '{db_path}'"));
            }
        };

        log::debug!(target: LOG_TARGET, "Opened state store at '{db_path}' with {} records", doc.repos.len());

        Ok(Self {
            path: db_path.to_owned(),
            doc,
            _lock: lock,
        })
    }

    /// Look up the record for a repository.
    pub fn record(&self, repo: &str) -> Option<&ScanRecord> {
        self.doc.repos.get(repo)
    }

    /// Decide whether a discovered repository needs a fresh metadata fetch.
    ///
    /// A repository is refreshed when it has never been scanned, when its
    /// previous scan failed, when discovery observed a different
    /// `updated_at` marker than the one on file, or when the record is
    /// older than `stale_after_days`.
    pub fn should_refresh(&self, repo: &str, discovered_marker: &str, stale_after_days: u32, now: DateTime<Utc>) -> bool {
        let Some(record) = self.record(repo) else {
            return true;
        };

        if record.failed() {
            return true;
        }

        if !discovered_marker.is_empty() && discovered_marker != record.updated_at {
            return true;
        }

        let ttl = i64::from(stale_after_days.max(1)) * SECONDS_PER_DAY;
        now.timestamp() - record.scanned_at >= ttl
    }

    /// Cached entry payload for a repository, if its last scan succeeded.
    pub fn payload(&self, repo: &str) -> Option<Map<String, Value>> {
        let record = self.record(repo)?;
        if record.failed() {
            return None;
        }

        match serde_json::from_str::<Value>(&record.payload_json) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// All cached entry payloads from successful scans, in repository order.
    pub fn successful_payloads(&self) -> Vec<Map<String, Value>> {
        self.doc
            .repos
            .values()
            .filter(|record| !record.failed())
            .filter_map(|record| match serde_json::from_str::<Value>(&record.payload_json) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            })
            .collect()
    }

    /// Record the outcome of a scan and flush the store to disk.
    pub fn upsert(
        &mut self,
        repo: &str,
        updated_at: &str,
        payload: &Map<String, Value>,
        parse_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let payload_json =
            serde_json::to_string(payload).into_app_err_with(|| format!("unable to encode payload for '{repo}'"))?;

        let record = ScanRecord {
            repo: repo.to_string(),
            updated_at: updated_at.to_string(),
            scanned_at: now.timestamp(),
            payload_json,
            parse_error: parse_error.map(str::to_string),
        };

        let _ = self.doc.repos.insert(repo.to_string(), record);
        self.save()
    }

    /// Number of records currently in the store.
    pub fn len(&self) -> usize {
        self.doc.repos.len()
    }

    /// True when the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.doc.repos.is_empty()
    }

    fn save(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_str().is_empty() => p,
            _ => Utf8Path::new("."),
        };

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .into_app_err_with(|| format!("unable to create temporary state file in '{parent}'"))?;

        // Pretty in debug builds for easier inspection, compact in release
        #[cfg(debug_assertions)]
        let bytes = serde_json::to_vec_pretty(&self.doc);
        #[cfg(not(debug_assertions))]
        let bytes = serde_json::to_vec(&self.doc);

        let bytes = bytes.into_app_err("unable to encode state store")?;

        temp.write_all(&bytes)
            .into_app_err_with(|| format!("unable to write state store '{}'", self.path))?;
        temp.as_file()
            .sync_all()
            .into_app_err_with(|| format!("unable to sync state store '{}'", self.path))?;
        let _ = temp
            .persist(&self.path)
            .into_app_err_with(|| format!("unable to replace state store '{}'", self.path))?;

        Ok(())
    }
}
