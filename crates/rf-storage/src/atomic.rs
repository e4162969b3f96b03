// SPDX-License-Identifier: MIT

//! Atomic JSON file writes: materialize into a sibling temp file, fsync,
//! then rename. Readers that find a corrupt file move it aside to `.bak`
//! and treat it as absent rather than failing the caller.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtomicIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write `value` to `path` atomically: serialize to `path.tmp`, fsync,
/// rename over `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AtomicIoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a JSON file, tolerating absence and corruption.
///
/// Returns `Ok(None)` if the file doesn't exist. A file that exists but
/// fails to parse is moved to `<path>.bak` and also treated as `None` —
/// callers must not abort the run over a corrupt state file.
pub fn read_json_tolerant<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AtomicIoError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    match serde_json::from_reader(reader) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            let bak = path.with_extension(extend_extension(path, "bak"));
            tracing::warn!(
                path = %path.display(),
                bak = %bak.display(),
                error = %err,
                "corrupt JSON file, moving aside and treating as absent"
            );
            fs::rename(path, &bak)?;
            Ok(None)
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    path.with_extension(extend_extension(path, "tmp"))
}

/// Append a suffix to the existing extension instead of replacing it, so
/// `state.json` becomes `state.json.tmp` rather than `state.tmp`.
fn extend_extension(path: &Path, suffix: &str) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.{suffix}"),
        None => suffix.to_string(),
    }
}
