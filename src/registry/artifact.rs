//! Deterministic serialization of the registry and its manifest.
//!
//! Artifacts are rendered as two-space indented JSON with every
//! non-ASCII character escaped, so the byte stream is stable across
//! platforms and locales, then written atomically. The manifest records
//! a digest of the exact registry bytes for downstream verification.

use crate::Result;
use crate::config::{SortBy, SortOrder};
use camino::Utf8Path;
use chrono::{SecondsFormat, Utc};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::ser::{Formatter, PrettyFormatter};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};

const LOG_TARGET: &str = "  registry";

const SCHEMA_VERSION: u32 = 1;

/// Integrity manifest describing one written registry artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub generated_at: String,
    pub entries: u64,
    pub registry_path: String,
    pub sha256: String,
}

/// Sort entries in place by the configured key, stable on ties.
pub fn sort_entries(entries: &mut [Value], sort_by: SortBy, sort_order: SortOrder) {
    entries.sort_by(|a, b| {
        let ordering = match sort_by {
            SortBy::Name => name_key(a).cmp(&name_key(b)),
            SortBy::UpdatedAt => marker_key(a).cmp(marker_key(b)),
            SortBy::Stars => stars_key(a).cmp(&stars_key(b)),
        };
        match sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn name_key(entry: &Value) -> String {
    entry.get("name").and_then(Value::as_str).unwrap_or("").to_lowercase()
}

fn marker_key(entry: &Value) -> &str {
    entry.get("updated_at").and_then(Value::as_str).unwrap_or("")
}

fn stars_key(entry: &Value) -> u64 {
    entry.get("stars").and_then(Value::as_u64).unwrap_or(0)
}

/// Write the sorted registry and its manifest.
///
/// The registry goes out first; the manifest then carries the SHA-256 of
/// the precise bytes that landed in it.
pub fn write_artifacts(output_path: &Utf8Path, manifest_path: &Utf8Path, entries: &[Value]) -> Result<()> {
    let registry_bytes = to_ascii_json(&entries)?;
    write_atomic(output_path, &registry_bytes)?;

    let manifest = Manifest {
        schema_version: SCHEMA_VERSION,
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        entries: entries.len() as u64,
        registry_path: output_path.file_name().unwrap_or_default().to_string(),
        sha256: hex::encode(Sha256::digest(&registry_bytes)),
    };

    let manifest_bytes = to_ascii_json(&manifest)?;
    write_atomic(manifest_path, &manifest_bytes)?;

    log::debug!(target: LOG_TARGET,
        "Wrote {} entries to '{output_path}' with manifest '{manifest_path}'", entries.len());

    Ok(())
}

/// Serialize a value as indented, ASCII-only JSON with a trailing newline.
fn to_ascii_json<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize,
{
    let mut bytes = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, AsciiPrettyFormatter::new());
    value.serialize(&mut serializer).into_app_err("unable to serialize artifact")?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Replace the file at `path` with `bytes` in one step.
///
/// The bytes land in a temporary sibling first and are moved over the
/// target only after a sync, so readers never observe a torn artifact.
fn write_atomic(path: &Utf8Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{parent}'"))?;

    let mut temp =
        tempfile::NamedTempFile::new_in(parent).into_app_err_with(|| format!("unable to create temporary file in '{parent}'"))?;
    temp.write_all(bytes).into_app_err_with(|| format!("unable to write '{path}'"))?;
    temp.as_file().sync_all().into_app_err_with(|| format!("unable to sync '{path}'"))?;
    let _ = temp.persist(path).into_app_err_with(|| format!("unable to replace '{path}'"))?;

    Ok(())
}

/// Two-space indented JSON formatter that escapes all non-ASCII text.
///
/// Astral characters are written as UTF-16 surrogate pairs, matching the
/// common `\uXXXX`-only escape dialect.
struct AsciiPrettyFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl AsciiPrettyFormatter<'_> {
    fn new() -> Self {
        Self {
            inner: PrettyFormatter::new(),
        }
    }
}

impl Formatter for AsciiPrettyFormatter<'_> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;

        for (index, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }

            if let Some(run) = fragment.get(start..index)
                && !run.is_empty()
            {
                writer.write_all(run.as_bytes())?;
            }

            let mut units = [0_u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }

            start = index + ch.len_utf8();
        }

        if let Some(rest) = fragment.get(start..)
            && !rest.is_empty()
        {
            writer.write_all(rest.as_bytes())?;
        }

        Ok(())
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.inner.begin_array(writer)
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.inner.begin_object(writer)
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.inner.end_object_value(writer)
    }
}
