//! Curated overrides and exclusions merged onto collected entries.

use crate::Result;
use camino::Utf8Path;
use ohno::IntoAppError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;

/// Hand-maintained corrections applied after collection.
///
/// Exclusions drop entries by repository identifier; overrides patch
/// individual fields of an entry, or introduce a whole new one.
#[derive(Debug, Default)]
pub struct Overrides {
    overrides: Vec<Map<String, Value>>,
    excluded: BTreeSet<String>,
}

impl Overrides {
    /// Load the overrides file. A missing file means no curation.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).into_app_err_with(|| format!("unable to read overrides file '{path}'")),
        };

        let value: Value =
            serde_json::from_str(&raw).into_app_err_with(|| format!("unable to parse overrides file '{path}'"))?;
        let Value::Object(doc) = value else {
            return Ok(Self::default());
        };

        let mut parsed = Self::default();

        if let Some(Value::Array(items)) = doc.get("overrides") {
            for item in items {
                if let Value::Object(map) = item {
                    parsed.overrides.push(map.clone());
                }
            }
        }

        if let Some(Value::Array(items)) = doc.get("excluded") {
            for item in items {
                if let Value::String(repo) = item
                    && !repo.is_empty()
                {
                    let _ = parsed.excluded.insert(repo.clone());
                }
            }
        }

        Ok(parsed)
    }
}

/// Apply exclusions, then overrides, to the collected entries.
///
/// Entries are keyed by their `repo` field; ones without a usable
/// identifier are dropped. Exclusions run first, so an override naming
/// an excluded repository re-introduces it built up from nothing. The
/// result comes back in identifier order.
pub fn apply_overrides(entries: Vec<Value>, curated: &Overrides) -> Vec<Value> {
    let mut by_repo: BTreeMap<String, Value> = BTreeMap::new();

    for entry in entries {
        let Some(repo) = entry.get("repo").and_then(Value::as_str) else {
            continue;
        };
        if repo.is_empty() {
            continue;
        }
        let repo = repo.to_string();
        let _ = by_repo.insert(repo, entry);
    }

    for repo in &curated.excluded {
        let _ = by_repo.remove(repo);
    }

    for patch in &curated.overrides {
        let Some(repo) = patch.get("repo").and_then(Value::as_str) else {
            continue;
        };
        if repo.is_empty() {
            continue;
        }

        let base = match by_repo.get(repo) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let merged = deep_merge(&base, patch);
        let _ = by_repo.insert(repo.to_string(), Value::Object(merged));
    }

    by_repo.into_values().collect()
}

/// Recursively merge `patch` onto `base`.
///
/// Object values merge key by key with patch values winning; any other
/// value, arrays included, replaces the prior one wholly.
fn deep_merge(base: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();

    for (key, value) in patch {
        let replacement = match (merged.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => Value::Object(deep_merge(existing, incoming)),
            _ => value.clone(),
        };
        let _ = merged.insert(key.clone(), replacement);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn write_overrides(dir: &tempfile::TempDir, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("overrides.json")).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn nested_objects_merge_and_scalars_replace() {
        let base = as_map(json!({"a": {"b": 1, "c": 2}, "stars": 5}));
        let patch = as_map(json!({"a": {"b": 9}, "stars": 7}));

        let merged = deep_merge(&base, &patch);
        assert_eq!(Value::Object(merged), json!({"a": {"b": 9, "c": 2}, "stars": 7}));
    }

    #[test]
    fn arrays_replace_wholly() {
        let base = as_map(json!({"topics": ["one", "two"]}));
        let patch = as_map(json!({"topics": ["three"]}));

        let merged = deep_merge(&base, &patch);
        assert_eq!(merged.get("topics"), Some(&json!(["three"])));
    }

    #[test]
    fn missing_file_means_no_curation() {
        let curated = Overrides::load(Utf8Path::new("/nonexistent/overrides.json")).unwrap();
        assert!(curated.overrides.is_empty());
        assert!(curated.excluded.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_overrides(&temp_dir, "{not json");

        let err = Overrides::load(&path).unwrap_err();
        assert!(err.to_string().contains("unable to parse"));
    }

    #[test]
    fn alien_shapes_are_ignored() {
        let temp_dir = tempfile::tempdir().unwrap();

        let path = write_overrides(&temp_dir, "[1, 2, 3]");
        let curated = Overrides::load(&path).unwrap();
        assert!(curated.overrides.is_empty());

        let path = write_overrides(
            &temp_dir,
            r#"{"overrides": ["junk", {"repo": "acme/kept.nvim"}], "excluded": [42, "", "acme/gone.nvim"]}"#,
        );
        let curated = Overrides::load(&path).unwrap();
        assert_eq!(curated.overrides.len(), 1);
        assert_eq!(curated.excluded.len(), 1);
        assert!(curated.excluded.contains("acme/gone.nvim"));
    }

    #[test]
    fn exclusions_run_before_overrides() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_overrides(
            &temp_dir,
            r#"{
                "overrides": [
                    {"repo": "acme/gone.nvim", "name": "revived"},
                    {"repo": "acme/extra.nvim", "name": "extra", "stars": 1}
                ],
                "excluded": ["acme/gone.nvim", "acme/dropped.nvim"]
            }"#,
        );
        let curated = Overrides::load(&path).unwrap();

        let entries = vec![
            json!({"repo": "acme/gone.nvim", "name": "gone", "stars": 10}),
            json!({"repo": "acme/dropped.nvim", "name": "dropped"}),
            json!({"repo": "acme/stays.nvim", "name": "stays"}),
            json!({"name": "no identifier"}),
        ];

        let merged = apply_overrides(entries, &curated);
        let repos: Vec<&str> = merged.iter().filter_map(|e| e.get("repo").and_then(Value::as_str)).collect();
        assert_eq!(repos, vec!["acme/extra.nvim", "acme/gone.nvim", "acme/stays.nvim"]);

        // The excluded entry came back from the override alone, without its old fields
        let revived = &merged[1];
        assert_eq!(revived.get("name"), Some(&json!("revived")));
        assert_eq!(revived.get("stars"), None);
    }

    #[test]
    fn override_patches_existing_entry() {
        let curated_dir = tempfile::tempdir().unwrap();
        let path = write_overrides(
            &curated_dir,
            r#"{"overrides": [{"repo": "acme/stays.nvim", "description": "curated"}]}"#,
        );
        let curated = Overrides::load(&path).unwrap();

        let entries = vec![json!({"repo": "acme/stays.nvim", "name": "stays", "description": "raw", "stars": 3})];
        let merged = apply_overrides(entries, &curated);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].get("description"), Some(&json!("curated")));
        assert_eq!(merged[0].get("stars"), Some(&json!(3)));
    }
}
