//! On-disk output for finished campaign runs.
//!
//! A run directory looks like:
//! ```text
//! <output_root>/<run_id>/
//! ├── report.json     full CampaignReport
//! ├── campaign.md     readable rendering
//! └── manifest.json   schema version + per-file checksums
//! ```

pub mod manifest;
pub mod render;
pub mod writer;

#[cfg(test)]
mod testing;

pub use manifest::{CURRENT_SCHEMA_VERSION, FileEntry, ReportManifest};
pub use render::render_markdown;
pub use writer::{ReportLocation, validate_report_dir, write_report};
