//! `manifest.json` for a run directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Bumped whenever the run directory layout changes incompatibly.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportManifest {
    pub schema_version: u32,
    pub run_id: Uuid,
    pub tool_version: String,
    /// When the pipeline produced the report.
    pub generated_at: DateTime<Utc>,
    /// When the files were written.
    pub written_at: DateTime<Utc>,
    /// Idea the campaign was built around.
    pub idea: String,
    pub social_gaps: Vec<usize>,
    pub files: Vec<FileEntry>,
}

/// Checksum record for one file in the run directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

impl FileEntry {
    pub fn for_content(filename: &str, content: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            sha256: sha256_hex(content),
            size_bytes: content.len(),
        }
    }
}

pub(crate) fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

impl ReportManifest {
    pub fn file(&self, filename: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.filename == filename)
    }
}
