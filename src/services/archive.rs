//! Archive validation and normalization.
//!
//! Turns the raw bytes of an uploaded ZIP archive into the list of files that
//! will be stored for an artifact. The archive is untrusted, so every entry
//! is screened before it is read:
//!
//! - platform metadata (`__MACOSX/`, `.DS_Store`, AppleDouble `._*` files, ...)
//!   is dropped silently
//! - entries with traversal segments, doubled or leading separators are
//!   skipped with a warning
//! - entries whose extension is not on the allow-list are skipped with a
//!   warning
//!
//! Entry count, raw size and decompressed size are capped. The decompressed
//! ceiling is enforced while reading, so a bomb is rejected as soon as it
//! crosses the limit rather than after it has been inflated.

use crate::{
    config::ArchiveLimits,
    errors::{ServiceError, ServiceResult},
    models::stored_file::StoredFile,
    services::content_type::{self, AssetCategory},
};
use bytes::Bytes;
use std::{
    collections::HashSet,
    io::{Cursor, Read},
};
use tracing::{debug, warn};
use zip::ZipArchive;

const INDEX_DOCUMENT: &str = "index.html";
const PLATFORM_METADATA_FILES: [&str; 3] = [".DS_Store", "Thumbs.db", "desktop.ini"];
const PLATFORM_METADATA_DIRS: [&str; 2] = ["__MACOSX", ".Trashes"];

/// Result of a successful validation.
#[derive(Debug)]
pub struct ValidatedArchive {
    /// Kept files, in archive order, paths already normalized.
    pub files: Vec<StoredFile>,
    /// Normalized path of the detected index document.
    pub entry_point: String,
    /// Sum of decompressed bytes across `files`.
    pub extracted_bytes: u64,
    /// Wrapper directory that was stripped from every path, if any.
    pub root_folder: Option<String>,
    /// Non-fatal findings: skipped entries and suspicious markup.
    pub warnings: Vec<String>,
}

/// Why an entry is left out before it is read.
#[derive(Debug, PartialEq, Eq)]
enum Screen {
    Keep,
    PlatformMetadata,
    UnsafePath,
    DisallowedType,
}

/// Validate `raw` against `limits` and extract its files.
///
/// This is CPU bound and synchronous; async callers should run it on the
/// blocking pool.
pub fn validate_archive(raw: &[u8], limits: &ArchiveLimits) -> ServiceResult<ValidatedArchive> {
    if raw.len() as u64 > limits.max_upload_bytes {
        return Err(ServiceError::validation(format!(
            "archive is {} bytes; the maximum upload size is {} bytes",
            raw.len(),
            limits.max_upload_bytes
        )));
    }

    let mut archive = ZipArchive::new(Cursor::new(raw))
        .map_err(|err| ServiceError::validation(format!("not a readable zip archive: {}", err)))?;

    if archive.len() == 0 {
        return Err(ServiceError::validation("archive is empty"));
    }
    if archive.len() > limits.max_entries {
        return Err(ServiceError::validation(format!(
            "archive has {} entries; the maximum is {}",
            archive.len(),
            limits.max_entries
        )));
    }

    let mut warnings = Vec::new();

    // First pass: names only, nothing is decompressed.
    let mut candidates: Vec<(usize, String)> = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|err| ServiceError::validation(format!("corrupt archive entry: {}", err)))?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().replace('\\', "/");
        match screen_entry(&path) {
            Screen::Keep => candidates.push((index, path)),
            Screen::PlatformMetadata => debug!(path = %path, "skipping platform metadata entry"),
            Screen::UnsafePath => {
                warn!(path = %path, "skipping entry with unsafe path");
                warnings.push(format!("skipped suspicious path: {}", path));
            }
            Screen::DisallowedType => {
                warn!(path = %path, "skipping entry with disallowed type");
                warnings.push(format!("skipped disallowed file type: {}", path));
            }
        }
    }

    let root_folder = detect_root_folder(candidates.iter().map(|(_, path)| path.as_str()));
    if let Some(root) = &root_folder {
        debug!(root = %root, "detected wrapper directory");
    }

    // Second pass: decompress kept entries under the running ceiling.
    let mut files = Vec::with_capacity(candidates.len());
    let mut seen = HashSet::new();
    let mut extracted_bytes: u64 = 0;
    for (index, original) in candidates {
        let path = strip_root(&original, root_folder.as_deref()).to_string();
        if path.is_empty() {
            continue;
        }
        if !seen.insert(path.clone()) {
            warnings.push(format!("skipped duplicate path: {}", path));
            continue;
        }

        let remaining = limits.max_extracted_bytes.saturating_sub(extracted_bytes);
        let mut entry = archive
            .by_index(index)
            .map_err(|err| ServiceError::validation(format!("cannot read `{}`: {}", original, err)))?;
        let mut buf = Vec::with_capacity(entry.size().min(remaining) as usize);
        entry
            .by_ref()
            .take(remaining.saturating_add(1))
            .read_to_end(&mut buf)
            .map_err(|err| ServiceError::validation(format!("cannot read `{}`: {}", original, err)))?;
        if buf.len() as u64 > remaining {
            return Err(ServiceError::validation(format!(
                "total extracted size exceeds the limit of {} bytes",
                limits.max_extracted_bytes
            )));
        }
        extracted_bytes += buf.len() as u64;

        let (category, content_type) = content_type::classify(&path)
            .ok_or_else(|| ServiceError::validation(format!("unclassified entry `{}`", path)))?;
        let data = if category == AssetCategory::Markup {
            let (text, suspicious) = normalize_markup(&buf);
            if suspicious {
                warn!(path = %path, "markup is missing doctype, html and head tags");
                warnings.push(format!("markup file missing doctype/html/head: {}", path));
            }
            Bytes::from(text.into_bytes())
        } else {
            Bytes::from(buf)
        };

        debug!(path = %path, size = data.len(), content_type, "extracted file");
        files.push(StoredFile {
            path,
            data,
            content_type,
        });
    }

    if files.is_empty() {
        return Err(ServiceError::validation("archive contains no valid files"));
    }

    let entry_point = find_entry_point(files.iter().map(|f| f.path.as_str())).ok_or_else(|| {
        ServiceError::Validation {
            message: "archive must contain an index.html at the root or in a subdirectory".into(),
            files: files.iter().map(|f| f.path.clone()).collect(),
        }
    })?;

    Ok(ValidatedArchive {
        files,
        entry_point,
        extracted_bytes,
        root_folder,
        warnings,
    })
}

fn screen_entry(path: &str) -> Screen {
    if is_platform_metadata(path) {
        return Screen::PlatformMetadata;
    }
    if !is_safe_relative_path(path) {
        return Screen::UnsafePath;
    }
    if content_type::classify(path).is_none() {
        return Screen::DisallowedType;
    }
    Screen::Keep
}

fn is_platform_metadata(path: &str) -> bool {
    let mut segments = path.split('/');
    let file_name = path.rsplit('/').next().unwrap_or(path);
    segments.any(|segment| PLATFORM_METADATA_DIRS.contains(&segment))
        || PLATFORM_METADATA_FILES.contains(&file_name)
        || file_name.starts_with("._")
}

/// A relative path with no empty, `.` or `..` segments and no control bytes.
pub fn is_safe_relative_path(path: &str) -> bool {
    if path.is_empty() || path.starts_with('/') || path.contains("//") {
        return false;
    }
    if path.bytes().any(|b| b.is_ascii_control()) {
        return false;
    }
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .all(|segment| segment != ".." && segment != ".")
}

/// Wrapper directory heuristic: the first segment of the first multi-segment
/// path, provided it contains no dot.
///
/// Only the first multi-segment path is consulted. Archives mixing prefixed
/// and unprefixed entries keep the unprefixed ones as they are.
fn detect_root_folder<'a>(paths: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let first = paths.into_iter().find(|path| path.contains('/'))?;
    let top = first.split('/').next()?;
    (!top.is_empty() && !top.contains('.')).then(|| top.to_string())
}

fn strip_root<'a>(path: &'a str, root: Option<&str>) -> &'a str {
    match root {
        Some(root) => path
            .strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path),
        None => path,
    }
}

/// Pick the index document closest to the root.
fn find_entry_point<'a>(paths: impl IntoIterator<Item = &'a str>) -> Option<String> {
    paths
        .into_iter()
        .filter(|path| is_index_document(path))
        .min_by_key(|path| path.matches('/').count())
        .map(str::to_string)
}

fn is_index_document(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower == INDEX_DOCUMENT || lower.ends_with("/index.html")
}

/// Re-encode markup as UTF-8 and report whether it looks like something
/// other than an HTML document.
fn normalize_markup(raw: &[u8]) -> (String, bool) {
    let text = String::from_utf8_lossy(raw).into_owned();
    let lower = text.to_ascii_lowercase();
    let suspicious =
        !lower.contains("<!doctype") && !lower.contains("<html") && !lower.contains("<head");
    (text, suspicious)
}
