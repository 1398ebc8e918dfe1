//! Idempotent export of the contract document and docs regeneration.
//!
//! The persisted document is never mutated in place: a new rendering is
//! written to a temporary file and renamed over the old one, and only when
//! the content actually changed. Comparison is structural (both sides are
//! parsed back into values), so insignificant formatting differences do not
//! count as changes.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::process::Command;
use tracing::info;

use crate::error::ExportError;

/// Whether an export replaced the persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Changed,
    Unchanged,
}

/// Standard layout of the contract artifacts under a root directory.
#[derive(Debug, Clone)]
pub struct SpecPaths {
    pub spec_path: PathBuf,
    pub docs_path: PathBuf,
}

impl SpecPaths {
    pub fn under(root: &Path) -> Self {
        let base = root.join("asyncapi");
        Self {
            spec_path: base.join("spec").join("asyncapi.yml"),
            docs_path: base.join("docs"),
        }
    }
}

/// Persist the document at `spec_path`, replacing it only on change.
///
/// Returns [`ExportOutcome::Unchanged`] when the persisted document is
/// structurally equal to `document` (unless `force_rebuild` is set), leaving
/// the file bytes untouched.
pub fn export_spec(
    document: &Value,
    spec_path: &Path,
    force_rebuild: bool,
) -> Result<ExportOutcome, ExportError> {
    let rendered = serde_yaml::to_string(document)?;

    if let Some(parent) = spec_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !force_rebuild && spec_path.exists() {
        let existing = std::fs::read_to_string(spec_path)?;
        // An unparseable previous document counts as changed.
        if let Ok(previous) = serde_yaml::from_str::<Value>(&existing) {
            if previous == *document {
                info!(path = %spec_path.display(), "keeping the existing specification");
                return Ok(ExportOutcome::Unchanged);
            }
        }
    }

    let dir = spec_path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(rendered.as_bytes())?;
    tmp.persist(spec_path).map_err(|e| ExportError::Io(e.error))?;
    info!(path = %spec_path.display(), "new specification generated");
    Ok(ExportOutcome::Changed)
}

/// Regenerate the human-readable documentation from the persisted document.
///
/// Runs the AsyncAPI generator as an external process; a non-zero exit
/// status is returned as an error carrying the combined output. Callers
/// decide whether that failure is fatal.
pub async fn generate_docs(spec_path: &Path, docs_path: &Path) -> Result<(), ExportError> {
    let output = Command::new("npx")
        .arg("-y")
        .arg("-p")
        .arg("@asyncapi/generator")
        .arg("ag")
        .arg(spec_path)
        .arg("@asyncapi/html-template")
        .arg("-o")
        .arg(docs_path)
        .arg("--force-write")
        .output()
        .await?;

    if output.status.success() {
        info!(path = %docs_path.display(), "docs generated");
        Ok(())
    } else {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(ExportError::DocsGeneration {
            status: output.status.code(),
            output: combined,
        })
    }
}
