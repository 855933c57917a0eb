//! Archive extraction into normalized `.xml` files.
//!
//! The container format is detected from the leading bytes only; remote file
//! extensions are not trusted. Extraction of one input is all-or-nothing:
//! files already written for that input are removed when a later entry fails.

use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::error::FetchError;

/// Extension every normalized output file carries.
pub const OUTPUT_EXTENSION: &str = "xml";

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Gzip,
    Raw,
}

#[must_use]
pub fn detect_format(bytes: &[u8]) -> ArchiveFormat {
    if bytes.starts_with(ZIP_LOCAL_HEADER) || bytes.starts_with(ZIP_EMPTY_ARCHIVE) {
        ArchiveFormat::Zip
    } else if bytes.starts_with(GZIP_MAGIC) {
        ArchiveFormat::Gzip
    } else {
        ArchiveFormat::Raw
    }
}

/// Extracts `bytes` into `out_dir`, creating it on demand, and returns the
/// written paths.
///
/// - Zip: every entry whose name ends in `.xml` is written under its own file
///   name. Two entries sharing a file name in different folders make the
///   archive corrupt.
/// - Gzip: the single stream is written as `suggested_name` with the
///   compressed extension replaced by `.xml`.
/// - Anything else is written verbatim as `suggested_name`, gaining `.xml`
///   when missing.
///
/// # Errors
///
/// - [`FetchError::UnsupportedFormat`] for empty input or a zip without XML
///   entries.
/// - [`FetchError::CorruptArchive`] when the zip or gzip stream cannot be read.
/// - [`FetchError::Write`] when the output cannot be written.
pub fn extract(bytes: &[u8], suggested_name: &str, out_dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    if bytes.is_empty() {
        return Err(FetchError::UnsupportedFormat {
            name: suggested_name.to_string(),
            reason: "empty payload".to_string(),
        });
    }

    let format = detect_format(bytes);
    let outputs = match format {
        ArchiveFormat::Zip => unpack_zip(bytes, suggested_name)?,
        ArchiveFormat::Gzip => vec![(normalized_name(suggested_name), gunzip(bytes, suggested_name)?)],
        ArchiveFormat::Raw => vec![(normalized_name(suggested_name), bytes.to_vec())],
    };

    fs::create_dir_all(out_dir).map_err(|source| FetchError::Write {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(outputs.len());
    for (name, content) in outputs {
        let path = out_dir.join(&name);
        if let Err(source) = fs::write(&path, &content) {
            remove_all(&written);
            return Err(FetchError::Write { path, source });
        }
        written.push(path);
    }

    tracing::debug!(
        file = suggested_name,
        format = ?format,
        outputs = written.len(),
        "archive extracted"
    );
    Ok(written)
}

/// Reads every XML entry into memory before anything touches the disk, so a
/// bad entry late in the archive leaves no partial output behind.
fn unpack_zip(bytes: &[u8], suggested_name: &str) -> Result<Vec<(String, Vec<u8>)>, FetchError> {
    let corrupt = |reason: String| FetchError::CorruptArchive {
        name: suggested_name.to_string(),
        reason,
    };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| corrupt(e.to_string()))?;
    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| corrupt(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let Some(file_name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        else {
            continue;
        };
        if !has_output_extension(&file_name) {
            continue;
        }
        if !seen.insert(file_name.clone()) {
            return Err(corrupt(format!("duplicate entry name {file_name}")));
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content).map_err(|e| corrupt(e.to_string()))?;
        entries.push((file_name, content));
    }

    if entries.is_empty() {
        return Err(FetchError::UnsupportedFormat {
            name: suggested_name.to_string(),
            reason: format!("zip archive has no .{OUTPUT_EXTENSION} entries"),
        });
    }
    Ok(entries)
}

fn gunzip(bytes: &[u8], suggested_name: &str) -> Result<Vec<u8>, FetchError> {
    let mut content = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut content)
        .map_err(|e| FetchError::CorruptArchive {
            name: suggested_name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(content)
}

fn has_output_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(OUTPUT_EXTENSION))
}

/// File name for a single-stream output: path components and compressed
/// extensions dropped, `.xml` appended when missing.
fn normalized_name(suggested_name: &str) -> String {
    let mut name = Path::new(suggested_name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .to_string();
    for compressed in [".gz", ".zip"] {
        if name.to_ascii_lowercase().ends_with(compressed) {
            name.truncate(name.len() - compressed.len());
        }
    }
    if name.is_empty() {
        name.push_str("download");
    }
    if !has_output_extension(&name) {
        name.push('.');
        name.push_str(OUTPUT_EXTENSION);
    }
    name
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial output");
        }
    }
}
