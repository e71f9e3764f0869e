//! Paced GitHub REST client for topic search and repository metadata.
//!
//! All requests go through a single retry loop with exponential backoff
//! and primary rate-limit handling, and consecutive requests are spaced
//! by a configurable delay so a full index run stays well inside the
//! API quota.

use crate::Result;
use chrono::Utc;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::time::Instant;

const LOG_TARGET: &str = "    github";

const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BACKOFF_SECS: u64 = 60;
const RATE_LIMIT_FALLBACK_SECS: u64 = 60;

/// One repository returned by topic search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Canonical `owner/name` identifier.
    pub full_name: String,

    /// `updated_at` marker from the search result, empty when absent.
    pub updated_at: String,
}

/// Repository metadata, decoded tolerantly from a raw payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: Option<u64>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub default_branch: Option<String>,
}

impl Repository {
    /// Decode a raw metadata payload.
    ///
    /// Every field except the identifier tolerates absence; a payload
    /// whose fields carry alien types is rejected as a whole.
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(payload)).into_app_err("invalid repository payload")
    }
}

/// One entry of a recursive git tree listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    #[serde(default)]
    pub path: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreePayload {
    #[serde(default)]
    tree: Vec<TreeEntry>,
}

/// GitHub API client with request pacing and retries.
#[derive(Debug)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
    request_delay: Duration,
    retry_limit: u32,
    next_request_at: Option<Instant>,
}

impl GitHubClient {
    /// Create a client.
    ///
    /// `base_url` overrides the public API endpoint and exists for tests
    /// that point the client at a local mock server.
    pub fn new(token: Option<&str>, request_delay_ms: u64, retry_limit: u32, base_url: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let _ = headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("Bearer {t}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = Client::builder()
            .user_agent("theme-indexer")
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_API_BASE).trim_end_matches('/').to_string(),
            request_delay: Duration::from_millis(request_delay_ms),
            retry_limit: retry_limit.max(1),
            next_request_at: None,
        })
    }

    /// Search repositories carrying a topic, one page at a time.
    ///
    /// Returns the decoded hits plus a flag telling whether the page was
    /// full, meaning another page may exist. A missing result set counts
    /// as an empty final page.
    pub async fn search_topic(&mut self, topic: &str, page: u32, per_page: u32) -> Result<(Vec<SearchHit>, bool)> {
        let url = format!("{}/search/repositories", self.base_url);
        let query = [
            ("q", format!("topic:{topic} archived:false fork:false")),
            ("sort", "updated".to_string()),
            ("order", "desc".to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];

        let Some(value) = self.request_json(&url, &query).await? else {
            return Ok((Vec::new(), false));
        };

        let page_data: SearchPage =
            serde_json::from_value(value).into_app_err_with(|| format!("unexpected search payload for topic '{topic}'"))?;

        // Items missing an identifier still count toward page fullness
        let has_more = page_data.items.len() as u64 == u64::from(per_page);

        let hits = page_data
            .items
            .into_iter()
            .filter_map(|item| {
                item.full_name.map(|full_name| SearchHit {
                    full_name,
                    updated_at: item.updated_at.unwrap_or_default(),
                })
            })
            .collect();

        Ok((hits, has_more))
    }

    /// Fetch full metadata for a repository, `None` when it does not exist.
    pub async fn fetch_repository(&mut self, repo: &str) -> Result<Option<Map<String, Value>>> {
        let url = format!("{}/repos/{repo}", self.base_url);

        let Some(value) = self.request_json(&url, &[]).await? else {
            return Ok(None);
        };

        match value {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(app_err!("unexpected repository payload for '{repo}'")),
        }
    }

    /// List the recursive git tree of a repository at the given reference.
    ///
    /// A missing repository or reference yields an empty listing, and so
    /// does a response that does not carry a tree.
    pub async fn fetch_tree(&mut self, repo: &str, reference: &str) -> Result<Vec<TreeEntry>> {
        let url = format!("{}/repos/{repo}/git/trees/{reference}", self.base_url);
        let query = [("recursive", "1".to_string())];

        let Some(value) = self.request_json(&url, &query).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_value::<TreePayload>(value) {
            Ok(payload) => Ok(payload.tree),
            Err(error) => {
                log::warn!(target: LOG_TARGET, "Malformed tree payload for '{repo}', treating it as empty: {error}");
                Ok(Vec::new())
            }
        }
    }

    /// Issue one GET request with pacing, retries and rate-limit waits.
    ///
    /// `Ok(None)` means the resource does not exist (404) or came back
    /// with an empty body. Decode failures and transport errors are
    /// retried with exponential backoff; a primary rate limit pauses
    /// until the advertised reset without consuming an attempt.
    async fn request_json(&mut self, url: &str, query: &[(&str, String)]) -> Result<Option<Value>> {
        let mut attempt: u32 = 1;
        let mut last_error = String::new();

        while attempt <= self.retry_limit {
            self.pace().await;
            let outcome = self.client.get(url).query(query).send().await;
            self.next_request_at = Some(Instant::now() + self.request_delay);

            match outcome {
                Ok(response) => {
                    let status = response.status();

                    if let Some(wait) = rate_limit_wait(status, response.headers(), Utc::now().timestamp()) {
                        log::warn!(target: LOG_TARGET,
                            "Rate limited on '{url}', waiting {}s for the quota to reset", wait.as_secs());
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    if status == StatusCode::NOT_FOUND {
                        log::debug!(target: LOG_TARGET, "Resource at '{url}' not found (404)");
                        return Ok(None);
                    }

                    if status.is_success() {
                        match response.bytes().await {
                            Ok(bytes) if bytes.is_empty() => return Ok(None),
                            Ok(bytes) => match serde_json::from_slice(&bytes) {
                                Ok(value) => return Ok(Some(value)),
                                Err(e) => last_error = format!("malformed JSON from '{url}': {e}"),
                            },
                            Err(e) => last_error = format!("could not read response body from '{url}': {e}"),
                        }
                    } else {
                        last_error = format!("'{url}' returned HTTP {status}");
                    }
                }
                Err(e) => last_error = format!("request to '{url}' failed: {e}"),
            }

            if attempt < self.retry_limit {
                let delay = backoff_delay(attempt);
                log::debug!(target: LOG_TARGET, "Attempt {attempt} for '{url}' failed, retrying in {}s", delay.as_secs());
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }

        Err(app_err!("request to '{url}' failed after {} attempts: {last_error}", self.retry_limit))
    }

    /// Wait until the pacing clock allows the next request.
    ///
    /// The clock is armed after each response rather than before the
    /// request, so retry backoff and rate-limit waits are not shortened
    /// by time already spent.
    async fn pace(&mut self) {
        if let Some(at) = self.next_request_at {
            tokio::time::sleep_until(at).await;
        }
    }
}

/// Delay before retry number `attempt + 1`, doubling up to a ceiling.
fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(6);
    Duration::from_secs((1_u64 << exp).min(MAX_BACKOFF_SECS))
}

/// How long to pause when a response signals an exhausted primary quota.
///
/// GitHub reports the quota in `x-ratelimit-remaining` and the epoch of
/// the next window in `x-ratelimit-reset`. Only a 403 or 429 with zero
/// remaining quota and a reset header counts; anything else, including a
/// zero-quota response without a reset time, goes through normal retry.
fn rate_limit_wait(status: StatusCode, headers: &HeaderMap, now_epoch: i64) -> Option<Duration> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let remaining = headers.get("x-ratelimit-remaining").and_then(|v| v.to_str().ok());
    if remaining != Some("0") {
        return None;
    }

    let reset = headers.get("x-ratelimit-reset")?;

    let secs = match reset.to_str().ok().and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(reset) => u64::try_from((reset - now_epoch + 1).max(1)).unwrap_or(1),
        None => RATE_LIMIT_FALLBACK_SECS,
    };

    Some(Duration::from_secs(secs))
}
