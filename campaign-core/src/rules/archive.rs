// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Rules archive extraction
//!
//! The rules bundle is a zip archive. Members are read into memory and
//! flattened to their file names; directory structure inside the archive
//! carries no meaning.

use std::io::{Cursor, Read};

use thiserror::Error;
use zip::ZipArchive;

/// A regular file extracted from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// File name without directories.
    pub name: String,
    pub data: Vec<u8>,
}

/// Extracts every regular file of a zip archive.
///
/// Fails if any member escapes the archive root or the total uncompressed
/// size exceeds `max_size`.
pub fn extract_members(bytes: &[u8], max_size: u64) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut members = Vec::with_capacity(archive.len());
    let mut total: u64 = 0;

    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }

        let raw_name = file.name().to_string();
        let name = file
            .enclosed_name()
            .and_then(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .ok_or_else(|| ArchiveError::UnsafePath(raw_name.clone()))?;

        let remaining = max_size.saturating_sub(total);
        let mut data = Vec::new();
        file.take(remaining.saturating_add(1)).read_to_end(&mut data)?;
        total += data.len() as u64;
        if total > max_size {
            return Err(ArchiveError::TooLarge { max: max_size });
        }

        members.push(ArchiveMember { name, data });
    }

    Ok(members)
}

/// Errors that can occur while extracting an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive member escapes the archive root: {0}")]
    UnsafePath(String),

    #[error("Archive content too large (max {max} bytes)")]
    TooLarge { max: u64 },
}
