// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Rules Module
//!
//! Downloads the rules bundle, caches its members and installs the parsed
//! rule set into the external matching engine.

pub mod archive;
mod downloader;
mod types;

pub use archive::{extract_members, ArchiveError, ArchiveMember};
pub use downloader::{RulesDownloader, RulesOutcome};
pub use types::{
    Rule, RuleConsequence, RuleSet, RulesEngine, FULLSCREEN_TEMPLATE, MESSAGE_CONSEQUENCE_TYPE,
};

use thiserror::Error;

use crate::cache::CacheError;
use crate::network::NetworkError;
use crate::storage::StorageError;

/// Rules download and installation errors.
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Rules URL is empty")]
    EmptyUrl,

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    #[error("Rules bundle too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Rules bundle has no rules definition")]
    MissingRules,

    #[error("Rules parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
