//! Writes a run directory to disk and checks an existing one.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, instrument};

use campaignsmith_shared::{CampaignError, CampaignReport, Result};

use crate::manifest::{CURRENT_SCHEMA_VERSION, FileEntry, ReportManifest, sha256_hex};
use crate::render::render_markdown;

const REPORT_FILE: &str = "report.json";
const MARKDOWN_FILE: &str = "campaign.md";
const MANIFEST_FILE: &str = "manifest.json";

/// Where a report was written.
#[derive(Debug, Clone)]
pub struct ReportLocation {
    /// The run directory, `<output_root>/<run_id>`.
    pub dir: PathBuf,
    pub manifest: ReportManifest,
}

impl ReportLocation {
    pub fn report_path(&self) -> PathBuf {
        self.dir.join(REPORT_FILE)
    }

    pub fn markdown_path(&self) -> PathBuf {
        self.dir.join(MARKDOWN_FILE)
    }
}

/// Write `report.json`, `campaign.md` and `manifest.json` for one run.
///
/// Every file goes through a temp file and a rename, and the manifest is
/// written last, so a directory with a manifest is complete. Writing the
/// same report twice overwrites it.
#[instrument(skip_all, fields(run_id = %report.run_id, root = %output_root.display()))]
pub fn write_report(
    output_root: &Path,
    report: &CampaignReport,
    tool_version: &str,
) -> Result<ReportLocation> {
    let dir = output_root.join(report.run_id.to_string());
    std::fs::create_dir_all(&dir).map_err(|e| CampaignError::io(&dir, e))?;

    let report_json = serde_json::to_string_pretty(report)?;
    let markdown = render_markdown(report);

    let mut files = Vec::with_capacity(2);
    let outputs = [
        (REPORT_FILE, report_json.as_bytes()),
        (MARKDOWN_FILE, markdown.as_bytes()),
    ];
    for (filename, content) in outputs {
        write_atomic(&dir, filename, content)?;
        files.push(FileEntry::for_content(filename, content));
    }

    let manifest = ReportManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id: report.run_id,
        tool_version: tool_version.to_string(),
        generated_at: report.generated_at,
        written_at: Utc::now(),
        idea: report.idea.artifact().name.clone(),
        social_gaps: report.gaps(),
        files,
    };
    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    write_atomic(&dir, MANIFEST_FILE, manifest_json.as_bytes())?;

    info!(path = %dir.display(), files = manifest.files.len(), "report written");
    Ok(ReportLocation { dir, manifest })
}

/// Check that `dir` holds a complete run whose files match the manifest.
pub fn validate_report_dir(dir: &Path) -> Result<ReportManifest> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(CampaignError::validation("missing manifest.json"));
    }

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| CampaignError::io(&manifest_path, e))?;
    let manifest: ReportManifest = serde_json::from_str(&content)
        .map_err(|e| CampaignError::validation(format!("invalid manifest.json: {e}")))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(CampaignError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    for required in [REPORT_FILE, MARKDOWN_FILE] {
        let entry = manifest
            .file(required)
            .ok_or_else(|| CampaignError::validation(format!("manifest does not list {required}")))?;
        let path = dir.join(required);
        if !path.exists() {
            return Err(CampaignError::validation(format!("missing {required}")));
        }
        let bytes = std::fs::read(&path).map_err(|e| CampaignError::io(&path, e))?;
        if sha256_hex(&bytes) != entry.sha256 {
            return Err(CampaignError::validation(format!(
                "{required} does not match its manifest checksum"
            )));
        }
    }

    let report = std::fs::read_to_string(dir.join(REPORT_FILE))
        .map_err(|e| CampaignError::io(dir.join(REPORT_FILE), e))?;
    let value: serde_json::Value = serde_json::from_str(&report)
        .map_err(|e| CampaignError::validation(format!("invalid report.json: {e}")))?;
    if value.get("run_id").and_then(|v| v.as_str()) != Some(manifest.run_id.to_string().as_str()) {
        return Err(CampaignError::validation("report.json run_id does not match manifest"));
    }

    debug!(path = %dir.display(), "report directory valid");
    Ok(manifest)
}

/// Write to a dot-prefixed temp file, then rename over the target.
fn write_atomic(dir: &Path, filename: &str, content: &[u8]) -> Result<()> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));
    std::fs::write(&temp, content).map_err(|e| CampaignError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| CampaignError::io(&target, e))?;
    debug!(file = %filename, size = content.len(), "wrote file");
    Ok(())
}
