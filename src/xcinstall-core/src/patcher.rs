//! In-place patching of a plug-in's `Info.plist` compatibility list.
//!
//! The patcher never re-serializes the document. It computes a single
//! insertion point, seeks there, writes the new `<string>` entry and then
//! rewrites the original tail after it. Every byte outside the insertion is
//! preserved.
//!
//! Two strategies locate the insertion point:
//!
//! - [`PatchMode::Exact`] assumes the layout produced by Xcode's plist
//!   writer: the entry goes at a fixed distance past the
//!   `DVTPlugInCompatibilityUUIDs` marker, and presence is a whole-document
//!   substring check.
//! - [`PatchMode::Scoped`] walks the `<array>` that follows the key, checks
//!   membership against its `<string>` entries only, and matches the
//!   surrounding indentation and line endings.

use crate::identifier::CompatibilityIdentifier;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key naming the compatibility list in `Info.plist`.
pub const COMPATIBILITY_KEY: &str = "DVTPlugInCompatibilityUUIDs";

/// Marker plus key close tag and one separator byte, as written by Xcode.
const EXACT_KEY_SPAN: &str = "DVTPlugInCompatibilityUUIDs</key> ";

const KEY_OPEN: &str = "<key>";
const KEY_CLOSE: &str = "</key>";
const ARRAY_OPEN: &str = "<array>";
const ARRAY_EMPTY: &str = "<array/>";
const ARRAY_CLOSE: &str = "</array>";
const STRING_OPEN: &str = "<string>";
const STRING_EMPTY: &str = "<string/>";
const STRING_CLOSE: &str = "</string>";
const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to find DVTPlugInCompatibilityUUIDs in {path}")]
    MarkerNotFound { path: PathBuf },
    #[error("unexpected compatibility list layout in {path}: {reason}")]
    UnexpectedLayout { path: PathBuf, reason: String },
    #[error("failed to update {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// How the insertion point and membership are determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchMode {
    #[default]
    Exact,
    Scoped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// A new entry was written starting at `offset`.
    Inserted { offset: usize },
    /// The identifier was already listed; the file was not touched.
    AlreadyPresent,
}

#[derive(Debug, Clone, Default)]
pub struct MetadataPatcher {
    mode: PatchMode,
    backup: bool,
}

/// Bytes `[offset, offset + replaced)` are replaced by `text`.
#[derive(Debug, PartialEq, Eq)]
struct Insertion {
    offset: usize,
    replaced: usize,
    text: String,
}

impl MetadataPatcher {
    pub fn new(mode: PatchMode) -> Self {
        Self {
            mode,
            backup: false,
        }
    }

    /// Copy the original document to `<path>.bak` before the first write.
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Ensure `identifier` is listed in the document at `path`.
    ///
    /// Calling this twice with the same identifier leaves the file unchanged
    /// on the second call. On [`PatchError::MarkerNotFound`] and
    /// [`PatchError::UnexpectedLayout`] nothing has been written.
    pub fn ensure_identifier_present(
        &self,
        path: &Path,
        identifier: &CompatibilityIdentifier,
    ) -> Result<PatchOutcome, PatchError> {
        let document = fs::read(path).map_err(|source| PatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let marker = find(&document, COMPATIBILITY_KEY.as_bytes()).ok_or_else(|| {
            PatchError::MarkerNotFound {
                path: path.to_path_buf(),
            }
        })?;

        let planned = match self.mode {
            PatchMode::Exact => plan_exact(&document, marker, identifier),
            PatchMode::Scoped => plan_scoped(&document, identifier),
        }
        .map_err(|reason| PatchError::UnexpectedLayout {
            path: path.to_path_buf(),
            reason,
        })?;

        let Some(insertion) = planned else {
            tracing::info!(
                identifier = %identifier,
                path = %path.display(),
                "compatibility identifier already present"
            );
            return Ok(PatchOutcome::AlreadyPresent);
        };

        if self.backup {
            write_backup(path);
        }

        write_insertion(path, &document, &insertion)?;
        tracing::info!(
            identifier = %identifier,
            offset = insertion.offset,
            mode = ?self.mode,
            path = %path.display(),
            "added compatibility identifier to plug-in"
        );
        Ok(PatchOutcome::Inserted {
            offset: insertion.offset,
        })
    }
}

fn plan_exact(
    document: &[u8],
    marker: usize,
    identifier: &CompatibilityIdentifier,
) -> Result<Option<Insertion>, String> {
    let escaped = escape(identifier.as_str());
    if find(document, identifier.as_str().as_bytes()).is_some()
        || find(document, escaped.as_bytes()).is_some()
    {
        return Ok(None);
    }

    let offset = marker + EXACT_KEY_SPAN.len() + ARRAY_OPEN.len() + 1;
    if offset > document.len() {
        return Err(format!(
            "insertion offset {offset} is past the end of the document ({} bytes)",
            document.len()
        ));
    }

    // The insertion point must sit right after `<array>` or after `<array>`
    // and one whitespace byte; anywhere else would split a tag.
    let region = &document[marker + COMPATIBILITY_KEY.len()..offset];
    let array_end = match region.split_last() {
        _ if region.ends_with(ARRAY_OPEN.as_bytes()) => region.len(),
        Some((last, rest))
            if last.is_ascii_whitespace() && rest.ends_with(ARRAY_OPEN.as_bytes()) =>
        {
            rest.len()
        }
        _ => {
            return Err(format!(
                "{ARRAY_OPEN} does not end at insertion offset {offset}"
            ))
        }
    };
    if find(&region[..array_end - ARRAY_OPEN.len()], KEY_CLOSE.as_bytes()).is_none() {
        return Err(format!("{KEY_CLOSE} does not follow the key"));
    }

    Ok(Some(Insertion {
        offset,
        replaced: 0,
        text: format!("\n\t\t{STRING_OPEN}{escaped}{STRING_CLOSE}"),
    }))
}

fn plan_scoped(
    document: &[u8],
    identifier: &CompatibilityIdentifier,
) -> Result<Option<Insertion>, String> {
    let key = format!("{KEY_OPEN}{COMPATIBILITY_KEY}{KEY_CLOSE}");
    let key_pos = find(document, key.as_bytes())
        .ok_or_else(|| format!("{COMPATIBILITY_KEY} is not used as a <key>"))?;

    let array_pos = skip_whitespace(document, key_pos + key.len());
    let newline = if find(document, b"\r\n").is_some() {
        "\r\n"
    } else {
        "\n"
    };
    let array_indent = line_indent(document, array_pos);
    let entry = format!(
        "{STRING_OPEN}{}{STRING_CLOSE}",
        escape(identifier.as_str())
    );

    if document[array_pos..].starts_with(ARRAY_EMPTY.as_bytes()) {
        return Ok(Some(Insertion {
            offset: array_pos,
            replaced: ARRAY_EMPTY.len(),
            text: format!(
                "{ARRAY_OPEN}{newline}{array_indent}\t{entry}{newline}{array_indent}{ARRAY_CLOSE}"
            ),
        }));
    }

    if !document[array_pos..].starts_with(ARRAY_OPEN.as_bytes()) {
        return Err(format!("expected {ARRAY_OPEN} after the key"));
    }
    let content_start = array_pos + ARRAY_OPEN.len();

    let entries = array_entries(document, content_start)?;
    if entries.iter().any(|value| value == identifier.as_str()) {
        return Ok(None);
    }

    let first_entry = skip_whitespace(document, content_start);
    let indent = if entries.is_empty() {
        format!("{array_indent}\t")
    } else {
        line_indent(document, first_entry)
    };

    Ok(Some(Insertion {
        offset: content_start,
        replaced: 0,
        text: format!("{newline}{indent}{entry}"),
    }))
}

/// Unescaped `<string>` values between `start` and the closing `</array>`.
fn array_entries(document: &[u8], start: usize) -> Result<Vec<String>, String> {
    let mut entries = Vec::new();
    let mut pos = start;
    loop {
        pos = skip_whitespace(document, pos);
        let rest = &document[pos..];
        if rest.is_empty() {
            return Err(format!("unterminated {ARRAY_OPEN}"));
        } else if rest.starts_with(ARRAY_CLOSE.as_bytes()) {
            return Ok(entries);
        } else if rest.starts_with(STRING_EMPTY.as_bytes()) {
            entries.push(String::new());
            pos += STRING_EMPTY.len();
        } else if rest.starts_with(STRING_OPEN.as_bytes()) {
            let value_start = pos + STRING_OPEN.len();
            let len = find(&document[value_start..], STRING_CLOSE.as_bytes())
                .ok_or_else(|| format!("unterminated {STRING_OPEN}"))?;
            let raw = String::from_utf8_lossy(&document[value_start..value_start + len]);
            entries.push(unescape(&raw));
            pos = value_start + len + STRING_CLOSE.len();
        } else if rest.starts_with(COMMENT_OPEN.as_bytes()) {
            let len = find(rest, COMMENT_CLOSE.as_bytes())
                .ok_or_else(|| "unterminated comment".to_string())?;
            pos += len + COMMENT_CLOSE.len();
        } else {
            return Err(format!("unexpected content at byte {pos} inside {ARRAY_OPEN}"));
        }
    }
}

fn write_insertion(path: &Path, document: &[u8], insertion: &Insertion) -> Result<(), PatchError> {
    let io_err = |source: io::Error| PatchError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(io_err)?;
    file.seek(SeekFrom::Start(insertion.offset as u64))
        .map_err(io_err)?;
    file.write_all(insertion.text.as_bytes()).map_err(io_err)?;
    // The write above overwrote the tail; put it back after the new entry.
    file.write_all(&document[insertion.offset + insertion.replaced..])
        .map_err(io_err)?;
    let end = file.stream_position().map_err(io_err)?;
    file.set_len(end).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    Ok(())
}

fn write_backup(path: &Path) {
    let backup = backup_path(path);
    match fs::copy(path, &backup) {
        Ok(_) => tracing::debug!(backup = %backup.display(), "backed up Info.plist"),
        Err(e) => tracing::warn!(
            error = %e,
            backup = %backup.display(),
            "failed to back up Info.plist; continuing anyway"
        ),
    }
}

pub(crate) fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn skip_whitespace(document: &[u8], mut pos: usize) -> usize {
    while pos < document.len() && document[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Leading whitespace of the line containing `pos`.
fn line_indent(document: &[u8], pos: usize) -> String {
    let line_start = document[..pos]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    document[line_start..pos]
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t'))
        .map(|&b| b as char)
        .collect()
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
