//! A service that builds a searchable registry of Neovim and Vim color themes.
//!
//! # Overview
//!
//! `theme-indexer` discovers theme repositories on GitHub, inspects each one to work out
//! which colorschemes it ships, and writes the results as a deterministic JSON registry
//! plus an integrity manifest. Scan state persists between runs, so unchanged repositories
//! are served from the local store instead of being fetched again.
//!
//! # Installation
//!
//! ```bash
//! cargo install theme-indexer
//! ```
//!
//! # Quick Start
//!
//! Run a single indexing pass with the default configuration:
//!
//! ```bash
//! export GITHUB_TOKEN=ghp_xxxxxxxxxxxxxxxxxxxx
//! theme-indexer run
//! ```
//!
//! This writes `themes.json` and `artifacts/latest.json` in the current directory and
//! prints a one-line summary of the pass.
//!
//! # Commands
//!
//! ## Single Pass
//!
//! **Index once and exit:**
//! ```bash
//! theme-indexer run
//! ```
//!
//! **Index once, then commit and push the artifacts:**
//! ```bash
//! theme-indexer run --publish
//! ```
//!
//! ## Continuous Operation
//!
//! **Index on a fixed interval (default every 30 minutes):**
//! ```bash
//! theme-indexer watch
//! ```
//!
//! Watch mode never publishes; pair it with `run --publish` in a scheduler if you
//! want pushes. A failing pass stops the loop so a supervisor can restart it.
//!
//! ## Configuration Management
//!
//! **Generate a default configuration file:**
//! ```bash
//! theme-indexer init
//! theme-indexer init custom.config.json
//! ```
//!
//! **Validate a configuration file without scanning:**
//! ```bash
//! theme-indexer validate
//! theme-indexer validate --config custom.config.json
//! ```
//!
//! # Output Artifacts
//!
//! ## Registry (`themes.json`)
//!
//! A JSON array of theme entries, ASCII-escaped, two-space indented, sorted by the
//! configured field. Byte-identical output for identical input data. Each entry looks
//! like:
//!
//! ```json
//! {
//!   "archived": false,
//!   "colorscheme": "rose-pine",
//!   "description": "Soho vibes for Neovim",
//!   "disabled": false,
//!   "name": "rose-pine",
//!   "repo": "rose-pine/neovim",
//!   "stars": 2300,
//!   "topics": ["neovim-colorscheme"],
//!   "updated_at": "2026-08-20T07:12:45Z",
//!   "variants": [
//!     { "colorscheme": "rose-pine-dawn", "name": "rose-pine-dawn" },
//!     { "colorscheme": "rose-pine-moon", "name": "rose-pine-moon" }
//!   ]
//! }
//! ```
//!
//! `name` is derived from the repository name with common suffixes such as `.nvim` or
//! `-colorscheme` removed. `colorscheme` is the primary `:colorscheme` argument, picked
//! from the `colors/` directory of the repository; the remaining colors files become
//! `variants`.
//!
//! ## Manifest (`artifacts/latest.json`)
//!
//! Written after the registry on every pass:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "generated_at": "2026-08-25T12:00:00.000000+00:00",
//!   "entries": 412,
//!   "registry_path": "themes.json",
//!   "sha256": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! }
//! ```
//!
//! The `sha256` digest covers the exact registry bytes, letting consumers verify a
//! download before loading it.
//!
//! # Configuration
//!
//! ## Using Configuration Files
//!
//! **Specify a config file:**
//! ```bash
//! theme-indexer run --config indexer.config.json
//! ```
//!
//! Without `--config`, `indexer.config.json` in the current directory is used when it
//! exists; otherwise built-in defaults apply. All fields are optional.
//!
//! ## Configuration Reference
//!
//! ```json
//! {
//!   "topics": ["neovim-colorscheme", "nvim-theme", "vim-colorscheme"],
//!   "include_repos": ["folke/tokyonight.nvim"],
//!   "output_path": "themes.json",
//!   "manifest_path": "artifacts/latest.json",
//!   "overrides_path": "overrides.json",
//!   "state_db_path": ".state/indexer.db",
//!   "per_page": 100,
//!   "max_pages_per_topic": 5,
//!   "request_delay_ms": 250,
//!   "retry_limit": 3,
//!   "scan_interval_seconds": 1800,
//!   "stale_after_days": 14,
//!   "min_stars": 0,
//!   "skip_archived": true,
//!   "skip_disabled": true,
//!   "sort_by": "stars",
//!   "sort_order": "desc",
//!   "publish_enabled": false,
//!   "publish_remote": "origin",
//!   "publish_branch": "master",
//!   "publish_commit_message": "chore(registry): publish latest index artifacts"
//! }
//! ```
//!
//! - `topics`: GitHub topics searched during discovery
//! - `include_repos`: repositories indexed even when no topic search returns them
//! - `per_page`: search page size, clamped to 1..=100
//! - `max_pages_per_topic`: page cap per topic, clamped to 0..=50; 0 removes the cap
//! - `request_delay_ms`: minimum spacing between outbound API requests
//! - `retry_limit`: total attempts per request, clamped to 1..=10
//! - `scan_interval_seconds`: sleep between watch passes, at least 60
//! - `stale_after_days`: cached records older than this are refreshed even when the
//!   upstream update marker has not moved
//! - `min_stars`: repositories below this star count are rejected
//! - `sort_by`: one of `stars`, `updated_at`, `name`
//! - `sort_order`: `asc` or `desc`
//!
//! Out-of-range values are clamped with a warning rather than rejected; unknown keys
//! and wrong-typed values are errors. Use `theme-indexer validate` to check a file
//! before deploying it.
//!
//! # Curated Overrides
//!
//! The file named by `overrides_path` corrects entries after collection:
//!
//! ```json
//! {
//!   "excluded": ["spammer/fake-theme.nvim"],
//!   "overrides": [
//!     { "repo": "rose-pine/neovim", "description": "All natural pine" },
//!     { "repo": "acme/hand-added", "name": "hand-added", "colorscheme": "hand-added" }
//!   ]
//! }
//! ```
//!
//! - `excluded` drops entries by repository identifier
//! - `overrides` deep-merge onto the collected entry with the same `repo`: object
//!   fields merge key by key, everything else (arrays included) is replaced wholly.
//!   An override for a repository that was never collected introduces a new entry.
//!
//! A missing overrides file means no curation. A malformed one fails the pass.
//!
//! # Incremental Scanning
//!
//! Per-repository scan results persist in the state store (`state_db_path`). On later
//! passes a repository is only re-fetched when:
//!
//! - it has no stored record, or the stored record is an error
//! - the `updated_at` marker reported by the search differs from the stored one
//! - the stored record is older than `stale_after_days`
//!
//! Everything else is served from the store, so a steady-state pass costs one search
//! request per topic page and nothing per repository. Deleting the state store is
//! always safe; the next pass rebuilds it with a full rescan.
//!
//! # GitHub Integration
//!
//! 1. Create a personal access token at <https://github.com/settings/tokens>
//! 2. No special permissions needed (public repo access is sufficient)
//! 3. Provide the token via environment variable or command-line flag
//!
//! **Environment variable (recommended):**
//! ```bash
//! export GITHUB_TOKEN=ghp_xxxxxxxxxxxxxxxxxxxx
//! theme-indexer run
//! ```
//!
//! **Command-line flag:**
//! ```bash
//! theme-indexer run --github-token ghp_xxxxxxxxxxxxxxxxxxxx
//! ```
//!
//! Without a token the indexer still works but against the unauthenticated rate limit,
//! which a full scan will exhaust quickly.
//!
//! # Publishing
//!
//! With `--publish` (or `"publish_enabled": true`), a successful `run` stages the two
//! artifacts, commits them with `publish_commit_message`, and pushes to
//! `publish_remote`/`publish_branch`. When the working tree shows no artifact changes
//! the commit is skipped and the pass still succeeds.
//!
//! **Example scheduled workflow:**
//! ```yaml
//! name: Refresh Theme Registry
//!
//! on:
//!   schedule:
//!     - cron: "0 */6 * * *"
//!
//! jobs:
//!   index:
//!     runs-on: ubuntu-latest
//!     steps:
//!       - uses: actions/checkout@v3
//!       - uses: actions-rust-lang/setup-rust-toolchain@v1
//!
//!       - name: Install theme-indexer
//!         run: cargo install theme-indexer
//!
//!       - name: Rebuild and publish the registry
//!         env:
//!           GITHUB_TOKEN: ${{ secrets.GITHUB_TOKEN }}
//!         run: theme-indexer run --publish
//! ```
//!
//! # Diagnostics
//!
//! A progress bar tracks the refresh phase by default. Turn on logging to see
//! per-repository decisions instead:
//!
//! ```bash
//! theme-indexer run --log-level info
//! theme-indexer run --log-level debug
//! ```
//!
//! # Troubleshooting
//!
//! ## Rate Limiting
//!
//! The indexer honors GitHub's rate-limit headers, waiting out the reported reset
//! before retrying. If passes crawl:
//! - Provide a `GITHUB_TOKEN` (raises the limit from 60 to 5000 requests/hour)
//! - Raise `request_delay_ms` so steady-state traffic stays under the limit
//!
//! ## Missing Themes
//!
//! If an expected repository never shows up:
//! - Check it carries one of the configured `topics` on GitHub
//! - Add it to `include_repos` to index it regardless of topics
//! - Check `min_stars`, `skip_archived`, and `skip_disabled` are not rejecting it;
//!   rejected repositories are listed at `--log-level info`
//!
//! ## Stale Entries
//!
//! Entries refresh when the upstream marker moves or after `stale_after_days`. To
//! force a full rescan, delete the state store named by `state_db_path`.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use theme_indexer::Result;

mod commands;

use crate::commands::{InitArgs, RunArgs, ValidateArgs, WatchArgs, init_config, run_index, validate_config, watch_index};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "theme-indexer", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: IndexerSubcommand,
}

#[derive(Subcommand, Debug)]
enum IndexerSubcommand {
    /// Run a single indexing pass and write the registry artifacts
    Run(RunArgs),
    /// Run indexing passes on a fixed interval until interrupted
    Watch(WatchArgs),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    match &Cli::parse().command {
        IndexerSubcommand::Run(run_args) => run_index(run_args).await,
        IndexerSubcommand::Watch(watch_args) => watch_index(watch_args).await,
        IndexerSubcommand::Init(init_args) => init_config(init_args),
        IndexerSubcommand::Validate(validate_args) => validate_config(validate_args),
    }
}
