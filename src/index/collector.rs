//! Orchestration of a full index run.
//!
//! A run walks four phases: discover repositories by topic search, seed
//! the working set from previously scanned entries, refresh whatever the
//! state store considers out of date, then merge curated overrides and
//! write the sorted artifacts. One repository's failure is recorded and
//! skipped, never fatal; only discovery and persistence failures abort
//! the run.

use crate::Result;
use crate::config::Config;
use crate::index::{GitHubClient, Repository, StateStore};
use crate::registry::{self, Overrides, RegistryEntry};
use chrono::Utc;
use core::fmt;
use indicatif::{ProgressBar, ProgressStyle};
use ohno::{IntoAppError, app_err, bail};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const LOG_TARGET: &str = " collector";

/// Counters from one indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub discovered: usize,
    pub fetched: usize,
    pub cached: usize,
    pub errors: usize,
    pub written: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discovered={} fetched={} cached={} errors={} written={}",
            self.discovered, self.fetched, self.cached, self.errors, self.written
        )
    }
}

/// Drives discovery, refresh, merge and output for the theme registry.
#[derive(Debug)]
pub struct Collector {
    config: Config,
    client: GitHubClient,
    show_progress: bool,
}

impl Collector {
    /// Create a collector over a validated configuration.
    ///
    /// `api_base` overrides the hosting API endpoint and exists for tests
    /// that run against a local mock server.
    pub fn new(config: Config, token: Option<&str>, api_base: Option<&str>, show_progress: bool) -> Result<Self> {
        let client = GitHubClient::new(token, config.request_delay_ms, config.retry_limit, api_base)?;

        Ok(Self {
            config,
            client,
            show_progress,
        })
    }

    /// The effective configuration driving this collector.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run one full discovery, refresh, merge and output pass.
    ///
    /// The state store is opened for the duration of the run and released
    /// on every exit path, success or not.
    pub async fn run_once(&mut self) -> Result<RunStats> {
        let mut store = StateStore::open(&self.config.state_db_path).await?;
        let mut stats = RunStats::default();

        let discovered = self.discover().await?;
        stats.discovered = discovered.len();

        // Entries from earlier runs carry over, so one failed refresh
        // does not drop a theme from the output
        let mut working_set: BTreeMap<String, Value> = BTreeMap::new();
        for payload in store.successful_payloads() {
            if let Some(repo) = payload.get("repo").and_then(Value::as_str)
                && !repo.is_empty()
            {
                let repo = repo.to_string();
                let _ = working_set.insert(repo, Value::Object(payload));
            }
        }

        let progress = self.refresh_bar(discovered.len() as u64);

        for (repo, discovered_marker) in &discovered {
            progress.set_message(repo.clone());

            if !store.should_refresh(repo, discovered_marker, self.config.stale_after_days, Utc::now()) {
                if let Some(payload) = store.payload(repo) {
                    let _ = working_set.insert(repo.clone(), Value::Object(payload));
                    stats.cached += 1;
                }
                progress.inc(1);
                continue;
            }

            match self.refresh_repo(repo).await {
                Ok(entry) => {
                    let payload = entry_payload(&entry)?;
                    store.upsert(repo, &entry.updated_at, &payload, None, Utc::now())?;
                    let _ = working_set.insert(repo.clone(), Value::Object(payload));
                    stats.fetched += 1;
                }
                Err(e) => {
                    log::info!(target: LOG_TARGET, "Skipping '{repo}': {e}");
                    let mut placeholder = Map::new();
                    let _ = placeholder.insert("repo".to_string(), Value::String(repo.clone()));
                    store.upsert(repo, discovered_marker, &placeholder, Some(&e.to_string()), Utc::now())?;
                    stats.errors += 1;
                }
            }

            progress.inc(1);
        }

        progress.finish_and_clear();

        let curated = Overrides::load(&self.config.overrides_path)?;
        let mut entries = registry::apply_overrides(working_set.into_values().collect(), &curated);
        registry::sort_entries(&mut entries, self.config.sort_by, self.config.sort_order);

        registry::write_artifacts(&self.config.output_path, &self.config.manifest_path, &entries)?;
        stats.written = entries.len();

        log::info!(target: LOG_TARGET, "Run finished: {stats}");

        Ok(stats)
    }

    /// Page topic searches into one deduplicated identifier-to-marker map.
    ///
    /// The first marker seen for an identifier wins across pages and
    /// topics. Configured include-list repositories join with an empty
    /// marker, making them eligible for scanning but never force-refreshed
    /// by marker mismatch.
    async fn discover(&mut self) -> Result<BTreeMap<String, String>> {
        let mut discovered: BTreeMap<String, String> = BTreeMap::new();

        let topics = self.config.topics.clone();
        for topic in &topics {
            let mut page = 1_u32;
            loop {
                let (hits, has_more) = self.client.search_topic(topic, page, self.config.per_page).await?;
                if hits.is_empty() {
                    break;
                }

                for hit in hits {
                    let repo = normalize_repo(&hit.full_name);
                    if !repo.is_empty() && !discovered.contains_key(&repo) {
                        let _ = discovered.insert(repo, hit.updated_at);
                    }
                }

                page += 1;
                if self.config.max_pages_per_topic != 0 && page > self.config.max_pages_per_topic {
                    break;
                }
                if !has_more {
                    break;
                }
            }
        }

        for repo in &self.config.include_repos {
            let normalized = normalize_repo(repo);
            if !normalized.is_empty() && !discovered.contains_key(&normalized) {
                let _ = discovered.insert(normalized, String::new());
            }
        }

        log::debug!(target: LOG_TARGET, "Discovered {} repositories across {} topics", discovered.len(), topics.len());

        Ok(discovered)
    }

    /// Fetch, filter and synthesize one repository's registry entry.
    ///
    /// Filter rejections and missing metadata fail fast with a short
    /// reason; the caller records it and moves on.
    async fn refresh_repo(&mut self, repo: &str) -> Result<RegistryEntry> {
        let payload = match self.client.fetch_repository(repo).await? {
            Some(map) if !map.is_empty() => map,
            _ => bail!("repository metadata not found"),
        };

        let metadata = Repository::from_payload(payload)?;

        if let Some(stars) = metadata.stargazers_count
            && stars < self.config.min_stars
        {
            bail!("below min_stars ({stars} < {})", self.config.min_stars);
        }

        if self.config.skip_archived && metadata.archived {
            bail!("repository archived");
        }

        if self.config.skip_disabled && metadata.disabled {
            bail!("repository disabled");
        }

        let reference = match metadata.default_branch.as_deref() {
            Some(branch) if !branch.is_empty() => branch,
            _ => "HEAD",
        };

        let tree = self.client.fetch_tree(repo, reference).await?;
        let colors = registry::extract_colorschemes(&tree);

        registry::build_entry(&metadata, &colors)
    }

    fn refresh_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template("{prefix:>10.cyan.bold} [{bar:25}] {pos}/{len} {msg}")
                .expect("invalid progress template"),
        );
        bar.set_prefix("Refreshing");
        bar
    }
}

/// Canonicalize a repository identifier from search results or config.
fn normalize_repo(repo: &str) -> String {
    let trimmed = repo.trim();
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    trimmed.trim_matches('/').to_string()
}

fn entry_payload(entry: &RegistryEntry) -> Result<Map<String, Value>> {
    match serde_json::to_value(entry).into_app_err("unable to encode registry entry")? {
        Value::Object(map) => Ok(map),
        _ => Err(app_err!("registry entry did not encode as an object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_identifiers_are_canonicalized() {
        assert_eq!(normalize_repo("acme/rose.nvim"), "acme/rose.nvim");
        assert_eq!(normalize_repo("  acme/rose.nvim.git "), "acme/rose.nvim");
        assert_eq!(normalize_repo("/acme/rose.nvim/"), "acme/rose.nvim");
        assert_eq!(normalize_repo("acme/rose.nvim.git/"), "acme/rose.nvim.git");
        assert_eq!(normalize_repo("   "), "");
    }

    #[test]
    fn stats_render_as_one_summary_line() {
        let stats = RunStats {
            discovered: 5,
            fetched: 2,
            cached: 1,
            errors: 2,
            written: 3,
        };

        assert_eq!(stats.to_string(), "discovered=5 fetched=2 cached=1 errors=2 written=3");
    }
}
