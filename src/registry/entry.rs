//! Synthesis of registry entries from repository metadata and file trees.
//!
//! A repository becomes an entry by deriving a human-facing theme name
//! from its identifier, listing the colorschemes its tree ships under
//! `colors/`, and electing one of them as the base. Everything here is
//! pure; the network lives in the index module.

use crate::Result;
use crate::index::{Repository, TreeEntry};
use ohno::bail;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Blob paths that define a colorscheme: `colors/<name>.vim` or `colors/<name>.lua`.
static COLORS_FILE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^colors/([^/]+)\.(vim|lua)$").expect("invalid regex"));

/// Packaging suffixes stripped from repository names, longest forms first
/// within each family. Each suffix is removed at most once.
const NAME_SUFFIXES: &[&str] = &[".nvim", ".vim", ".lua", "-nvim", "_nvim", "-vim", "_vim", "-colorscheme"];

/// Names too generic to identify a theme; the owner name is used instead.
const GENERIC_NAMES: &[&str] = &["", "nvim", "vim", "neovim", "theme", "colorscheme"];

/// A secondary colorscheme shipped alongside the base one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub colorscheme: String,
}

/// One theme in the published registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Derived human-facing theme name, never empty.
    pub name: String,

    /// Canonical `owner/name` repository identifier.
    pub repo: String,

    /// The colorscheme to load for this theme.
    pub colorscheme: String,

    pub description: String,
    pub stars: u64,
    pub topics: Vec<String>,
    pub updated_at: String,
    pub archived: bool,
    pub disabled: bool,

    /// Additional colorschemes, each distinct from the base.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<Variant>,
}

/// Strip packaging suffixes and separator padding from a repository name.
fn sanitize_repo_name(repo_name: &str) -> String {
    let mut candidate = repo_name.trim().to_lowercase();

    for suffix in NAME_SUFFIXES {
        if candidate.len() > suffix.len() && candidate.ends_with(suffix) {
            candidate.truncate(candidate.len() - suffix.len());
        }
    }

    candidate.trim_matches(['-', '_']).to_string()
}

/// Derive a theme name from an `owner/name` identifier.
///
/// The repository name is preferred; when it sanitizes to something
/// generic the owner name takes over, and `theme` is the fallback of
/// last resort.
fn normalize_theme_name(full_repo: &str) -> String {
    let (owner, repo_name) = full_repo.split_once('/').unwrap_or((full_repo, ""));

    let cleaned_repo = sanitize_repo_name(repo_name);
    if GENERIC_NAMES.contains(&cleaned_repo.as_str()) {
        let fallback = sanitize_repo_name(owner);
        if !fallback.is_empty() {
            return fallback;
        }
    }

    if !cleaned_repo.is_empty() {
        return cleaned_repo;
    }

    let fallback = sanitize_repo_name(owner);
    if fallback.is_empty() { "theme".to_string() } else { fallback }
}

/// Collect colorscheme names from a recursive tree listing.
///
/// Only blobs directly under `colors/` with a `.vim` or `.lua` extension
/// count. The result is deduplicated and lexicographically sorted.
pub fn extract_colorschemes(tree: &[TreeEntry]) -> Vec<String> {
    let mut colors = BTreeSet::new();

    for item in tree {
        if item.kind != "blob" {
            continue;
        }

        let Some(name) = COLORS_FILE.captures(&item.path).and_then(|caps| caps.get(1)) else {
            continue;
        };

        let colorscheme = name.as_str().trim();
        if !colorscheme.is_empty() {
            let _ = colors.insert(colorscheme.to_string());
        }
    }

    colors.into_iter().collect()
}

/// Elect the base colorscheme for a theme.
///
/// Preference order: a colorscheme matching the theme name in either
/// separator style, then the first one free of separators, then the
/// lexicographically first. An empty list falls back to the theme name
/// itself.
fn pick_base_colorscheme(theme_name: &str, colors: &[String]) -> String {
    let Some(first) = colors.first() else {
        return theme_name.to_string();
    };

    let preferred = [
        theme_name.to_string(),
        theme_name.replace('-', "_"),
        theme_name.replace('_', "-"),
    ];
    for candidate in colors {
        if preferred.contains(candidate) {
            return candidate.clone();
        }
    }

    for candidate in colors {
        if !candidate.contains('-') && !candidate.contains('_') {
            return candidate.clone();
        }
    }

    first.clone()
}

/// Assemble the registry entry for a repository.
///
/// Fails only when the payload lacks a usable `owner/name` identifier.
pub fn build_entry(repo: &Repository, colors: &[String]) -> Result<RegistryEntry> {
    if !repo.full_name.contains('/') {
        bail!("invalid repository payload");
    }

    let name = normalize_theme_name(&repo.full_name);
    let colorscheme = pick_base_colorscheme(&name, colors);

    let variants = colors
        .iter()
        .filter(|value| value.as_str() != colorscheme)
        .map(|value| Variant {
            name: value.clone(),
            colorscheme: value.clone(),
        })
        .collect();

    Ok(RegistryEntry {
        name,
        repo: repo.full_name.clone(),
        colorscheme,
        description: repo.description.clone().unwrap_or_default(),
        stars: repo.stargazers_count.unwrap_or(0),
        topics: repo.topics.iter().filter(|t| !t.is_empty()).cloned().collect(),
        updated_at: repo.updated_at.clone().unwrap_or_default(),
        archived: repo.archived,
        disabled: repo.disabled,
        variants,
    })
}
