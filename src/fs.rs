// Copyright 2026 danecert contributors
// SPDX-License-Identifier: Apache-2.0

//! Durable storage for issued artifacts.
//!
//! Writes are plain truncate-and-overwrite: re-issuing for a domain replaces
//! the previous files with no versioning, and a crash mid-write can leave a
//! corrupt file (accepted risk in this design).

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Write `contents` to `path`, creating parent directories as needed and
/// overwriting any existing file.
pub fn write(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent(path)?;

    fs::write(path, contents).map_err(|e| Error::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!("WRITE {}", path.display());
    Ok(())
}

/// Like [`write`], but the file is created owner-readable only (mode 0600 on
/// Unix). Used for private key material.
#[cfg(unix)]
pub fn write_secret(path: &Path, contents: &[u8]) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    ensure_parent(path)?;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| Error::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

    file.write_all(contents).map_err(|e| Error::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!("WRITE {}", path.display());
    Ok(())
}

#[cfg(not(unix))]
pub fn write_secret(path: &Path, contents: &[u8]) -> Result<()> {
    write(path, contents)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    Ok(())
}
