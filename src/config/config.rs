use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;

/// Default configuration file consulted when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "indexer.config.json";

fn default_topics() -> Vec<String> {
    vec![
        "neovim-colorscheme".to_string(),
        "nvim-theme".to_string(),
        "vim-colorscheme".to_string(),
    ]
}

fn default_output_path() -> Utf8PathBuf {
    Utf8PathBuf::from("themes.json")
}

fn default_manifest_path() -> Utf8PathBuf {
    Utf8PathBuf::from("artifacts/latest.json")
}

fn default_overrides_path() -> Utf8PathBuf {
    Utf8PathBuf::from("overrides.json")
}

fn default_state_db_path() -> Utf8PathBuf {
    Utf8PathBuf::from(".state/indexer.db")
}

const fn default_per_page() -> u32 {
    100
}

const fn default_max_pages_per_topic() -> u32 {
    5
}

const fn default_request_delay_ms() -> u64 {
    250
}

const fn default_retry_limit() -> u32 {
    3
}

const fn default_scan_interval_seconds() -> u64 {
    1800
}

const fn default_stale_after_days() -> u32 {
    14
}

const fn default_true() -> bool {
    true
}

fn default_publish_remote() -> String {
    "origin".to_string()
}

fn default_publish_branch() -> String {
    "master".to_string()
}

fn default_publish_commit_message() -> String {
    "chore(registry): publish latest index artifacts".to_string()
}

/// Field the final registry is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Star count
    #[default]
    Stars,
    /// Upstream update marker
    UpdatedAt,
    /// Derived theme name, case-insensitive
    Name,
}

/// Direction the final registry is ordered in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    #[default]
    Desc,
}

/// Indexer configuration, loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// GitHub topics queried during discovery
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Repositories indexed even when no topic search returns them
    #[serde(default)]
    pub include_repos: Vec<String>,

    /// Where the registry artifact is written
    #[serde(default = "default_output_path")]
    pub output_path: Utf8PathBuf,

    /// Where the integrity manifest is written
    #[serde(default = "default_manifest_path")]
    pub manifest_path: Utf8PathBuf,

    /// Curated overrides/exclusions file
    #[serde(default = "default_overrides_path")]
    pub overrides_path: Utf8PathBuf,

    /// Durable per-repository scan state
    #[serde(default = "default_state_db_path")]
    pub state_db_path: Utf8PathBuf,

    /// Search page size, clamped to [1, 100]
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Pages fetched per topic, clamped to [0, 50]; 0 disables the cap
    #[serde(default = "default_max_pages_per_topic")]
    pub max_pages_per_topic: u32,

    /// Minimum spacing between outbound API requests
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Total attempts per request, clamped to [1, 10]
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Sleep between passes in watch mode, at least 60
    #[serde(default = "default_scan_interval_seconds")]
    pub scan_interval_seconds: u64,

    /// Age after which a cached record is refreshed regardless of markers
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: u32,

    /// Repositories below this star count are rejected
    #[serde(default)]
    pub min_stars: u64,

    /// Reject archived repositories
    #[serde(default = "default_true")]
    pub skip_archived: bool,

    /// Reject disabled repositories
    #[serde(default = "default_true")]
    pub skip_disabled: bool,

    /// Registry sort field
    #[serde(default)]
    pub sort_by: SortBy,

    /// Registry sort direction
    #[serde(default)]
    pub sort_order: SortOrder,

    /// Publish artifacts after every `run` invocation
    #[serde(default)]
    pub publish_enabled: bool,

    /// Git remote the artifacts are pushed to
    #[serde(default = "default_publish_remote")]
    pub publish_remote: String,

    /// Git branch the artifacts are pushed to
    #[serde(default = "default_publish_branch")]
    pub publish_branch: String,

    /// Commit message used when publishing
    #[serde(default = "default_publish_commit_message")]
    pub publish_commit_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topics: default_topics(),
            include_repos: Vec::new(),
            output_path: default_output_path(),
            manifest_path: default_manifest_path(),
            overrides_path: default_overrides_path(),
            state_db_path: default_state_db_path(),
            per_page: default_per_page(),
            max_pages_per_topic: default_max_pages_per_topic(),
            request_delay_ms: default_request_delay_ms(),
            retry_limit: default_retry_limit(),
            scan_interval_seconds: default_scan_interval_seconds(),
            stale_after_days: default_stale_after_days(),
            min_stars: 0,
            skip_archived: true,
            skip_disabled: true,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            publish_enabled: false,
            publish_remote: default_publish_remote(),
            publish_branch: default_publish_branch(),
            publish_commit_message: default_publish_commit_message(),
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(config_path: Option<&Utf8PathBuf>) -> Result<(Self, Vec<String>)> {
        let (final_path, text) = if let Some(path) = config_path {
            let text =
                fs::read_to_string(path).into_app_err_with(|| format!("reading indexer configuration from {path}"))?;
            (path.clone(), text)
        } else {
            let candidate = Utf8PathBuf::from(DEFAULT_CONFIG_FILE);
            match fs::read_to_string(&candidate) {
                Ok(text) => (candidate, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let mut config = Self::default();
                    let mut warnings = Vec::new();
                    config.validate(&mut warnings);
                    return Ok((config, warnings));
                }
                Err(e) => {
                    return Err(e).into_app_err_with(|| format!("reading indexer configuration from {candidate}"));
                }
            }
        };

        let mut config: Self =
            serde_json::from_str(&text).into_app_err_with(|| format!("parsing configuration from {final_path}"))?;

        let mut warnings = Vec::new();
        config.validate(&mut warnings);
        Ok((config, warnings))
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save(&self, output_path: &Utf8Path) -> Result<()> {
        let mut text = serde_json::to_string_pretty(self)
            .into_app_err_with(|| format!("serializing configuration for saving to {output_path}"))?;
        text.push('\n');
        fs::write(output_path, text).into_app_err_with(|| format!("writing configuration to {output_path}"))?;
        Ok(())
    }

    /// Normalize and clamp all fields, recording a warning for every adjustment.
    pub fn validate(&mut self, warnings: &mut Vec<String>) {
        normalize_list(&mut self.topics);
        if self.topics.is_empty() {
            warnings.push("topics is empty, falling back to the default topic list".to_string());
            self.topics = default_topics();
        }
        normalize_list(&mut self.include_repos);

        self.per_page = clamp_u32(warnings, "per_page", self.per_page, 1, 100);
        self.max_pages_per_topic = clamp_u32(warnings, "max_pages_per_topic", self.max_pages_per_topic, 0, 50);
        self.retry_limit = clamp_u32(warnings, "retry_limit", self.retry_limit, 1, 10);
        if self.scan_interval_seconds < 60 {
            warnings.push("scan_interval_seconds below 60, clamped to 60".to_string());
            self.scan_interval_seconds = 60;
        }
        self.stale_after_days = clamp_u32(warnings, "stale_after_days", self.stale_after_days, 1, u32::MAX);

        ensure_path(warnings, "output_path", &mut self.output_path, default_output_path);
        ensure_path(warnings, "manifest_path", &mut self.manifest_path, default_manifest_path);
        ensure_path(warnings, "overrides_path", &mut self.overrides_path, default_overrides_path);
        ensure_path(warnings, "state_db_path", &mut self.state_db_path, default_state_db_path);

        ensure_string(warnings, "publish_remote", &mut self.publish_remote, default_publish_remote);
        ensure_string(warnings, "publish_branch", &mut self.publish_branch, default_publish_branch);
        ensure_string(
            warnings,
            "publish_commit_message",
            &mut self.publish_commit_message,
            default_publish_commit_message,
        );
    }
}

/// Trim entries, drop blanks, and deduplicate while preserving first occurrence.
fn normalize_list(values: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    let mut normalized = Vec::with_capacity(values.len());
    for value in values.drain(..) {
        let trimmed = value.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    *values = normalized;
}

fn clamp_u32(warnings: &mut Vec<String>, name: &str, value: u32, min: u32, max: u32) -> u32 {
    if value < min {
        warnings.push(format!("{name} below minimum, clamped to {min}"));
        min
    } else if value > max {
        warnings.push(format!("{name} above maximum, clamped to {max}"));
        max
    } else {
        value
    }
}

fn ensure_path(warnings: &mut Vec<String>, name: &str, value: &mut Utf8PathBuf, fallback: fn() -> Utf8PathBuf) {
    if value.as_str().trim().is_empty() {
        let restored = fallback();
        warnings.push(format!("{name} is blank, falling back to {restored}"));
        *value = restored;
    }
}

fn ensure_string(warnings: &mut Vec<String>, name: &str, value: &mut String, fallback: fn() -> String) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        let restored = fallback();
        warnings.push(format!("{name} is blank, falling back to {restored:?}"));
        *value = restored;
    } else if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_no_file_exists() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = Utf8PathBuf::from_path_buf(dir.path().join("absent.json")).expect("utf8 path");

        let error = Config::load(Some(&missing)).expect_err("explicit missing path must fail");
        assert!(error.to_string().contains("absent.json"));

        let config = Config::default();
        assert_eq!(config.per_page, 100);
        assert_eq!(config.max_pages_per_topic, 5);
        assert_eq!(config.retry_limit, 3);
        assert_eq!(config.stale_after_days, 14);
        assert_eq!(config.sort_by, SortBy::Stars);
        assert_eq!(config.sort_order, SortOrder::Desc);
        assert_eq!(config.state_db_path, Utf8PathBuf::from(".state/indexer.db"));
        assert_eq!(
            config.topics,
            vec!["neovim-colorscheme", "nvim-theme", "vim-colorscheme"]
        );
    }

    #[test]
    fn loads_and_clamps_out_of_range_values() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("indexer.config.json")).expect("utf8 path");
        std::fs::write(
            &path,
            r#"{
                "topics": [" neovim-colorscheme ", "neovim-colorscheme", ""],
                "per_page": 500,
                "retry_limit": 0,
                "scan_interval_seconds": 5,
                "stale_after_days": 0,
                "max_pages_per_topic": 99,
                "sort_by": "name",
                "sort_order": "asc"
            }"#,
        )
        .expect("write config");

        let (config, warnings) = Config::load(Some(&path)).expect("load config");
        assert_eq!(config.topics, vec!["neovim-colorscheme"]);
        assert_eq!(config.per_page, 100);
        assert_eq!(config.retry_limit, 1);
        assert_eq!(config.scan_interval_seconds, 60);
        assert_eq!(config.stale_after_days, 1);
        assert_eq!(config.max_pages_per_topic, 50);
        assert_eq!(config.sort_by, SortBy::Name);
        assert_eq!(config.sort_order, SortOrder::Asc);
        assert_eq!(warnings.len(), 5);
    }

    #[test]
    fn rejects_unknown_keys_and_wrong_types() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("bad.json")).expect("utf8 path");

        std::fs::write(&path, r#"{"per_pge": 10}"#).expect("write config");
        assert!(Config::load(Some(&path)).is_err(), "unknown key must be rejected");

        std::fs::write(&path, r#"{"per_page": "ten"}"#).expect("write config");
        assert!(Config::load(Some(&path)).is_err(), "wrong-typed value must be rejected");

        std::fs::write(&path, r#"{"sort_by": "downloads"}"#).expect("write config");
        assert!(Config::load(Some(&path)).is_err(), "unrecognized sort field must be rejected");
    }

    #[test]
    fn empty_topics_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("indexer.config.json")).expect("utf8 path");
        std::fs::write(&path, r#"{"topics": ["  ", ""]}"#).expect("write config");

        let (config, warnings) = Config::load(Some(&path)).expect("load config");
        assert_eq!(config.topics, default_topics());
        assert!(warnings.iter().any(|w| w.contains("topics")));
    }

    #[test]
    fn save_round_trips_through_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("saved.json")).expect("utf8 path");

        let config = Config {
            min_stars: 25,
            publish_branch: "main".to_string(),
            ..Config::default()
        };
        config.save(&path).expect("save config");

        let (loaded, warnings) = Config::load(Some(&path)).expect("load config");
        assert!(warnings.is_empty());
        assert_eq!(loaded.min_stars, 25);
        assert_eq!(loaded.publish_branch, "main");
        assert_eq!(loaded.topics, config.topics);
    }
}
