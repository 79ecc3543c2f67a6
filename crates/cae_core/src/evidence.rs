//! Evidence Manifest (§6.3): per-run artifact bookkeeping. DOM
//! snapshots and `state_signature` hashes are always persisted; full
//! HTML and screenshots are only kept on failure or for a critical
//! action (`submit | upload | confirm | payment | delete | send | sign
//! | finalize`). Redaction is applied to DOM/HTML before anything
//! touches disk.

use std::path::{Path, PathBuf};

use cae_ids::RunId;
use cae_security::redaction::{redact_dom_snapshot, RedactionPolicy};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const CRITICAL_ACTIONS: &[&str] = &["submit", "upload", "confirm", "payment", "delete", "send", "sign", "finalize"];

pub fn is_critical_action(action: &str) -> bool {
    CRITICAL_ACTIONS.contains(&action)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Dom,
    Html,
    Screenshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    pub kind: EvidenceKind,
    pub relative_path: String,
    pub sha256: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceManifest {
    pub run_id: Option<RunId>,
    pub artifacts: Vec<EvidenceArtifact>,
}

/// Writes evidence for one step under `runs/<run_id>/evidence/` and
/// accumulates the manifest in memory; callers persist the manifest
/// once, at run close, via `EvidenceWriter::flush_manifest`.
pub struct EvidenceWriter {
    run_dir: PathBuf,
    policy: RedactionPolicy,
    manifest: EvidenceManifest,
}

impl EvidenceWriter {
    pub fn new(runs_root: &Path, run_id: RunId) -> Self {
        let run_dir = runs_root.join(run_id.as_str());
        Self {
            run_dir,
            policy: RedactionPolicy::default(),
            manifest: EvidenceManifest { run_id: Some(run_id), artifacts: Vec::new() },
        }
    }

    fn evidence_dir(&self, sub: &str) -> PathBuf {
        self.run_dir.join("evidence").join(sub)
    }

    fn write_file(&mut self, kind: EvidenceKind, sub: &str, file_name: &str, bytes: &[u8]) -> Result<(), CoreError> {
        let dir = self.evidence_dir(sub);
        let path = dir.join(file_name);
        cae_repository::store::atomic_write(&path, bytes).map_err(CoreError::from)?;
        let relative_path = format!("evidence/{sub}/{file_name}");
        self.manifest.artifacts.push(EvidenceArtifact {
            kind,
            relative_path,
            sha256: cae_security::sha256_hex(bytes),
            size_bytes: bytes.len() as u64,
        });
        Ok(())
    }

    /// Always persisted: a partial DOM snapshot, redacted, for one side
    /// (`before`/`after`) of `step_n`.
    pub fn capture_dom(&mut self, step: u64, side: &str, snapshot: &serde_json::Value) -> Result<(), CoreError> {
        let redacted = redact_dom_snapshot(snapshot, &self.policy);
        let bytes = serde_json::to_vec_pretty(&redacted).map_err(|e| {
            cae_protocol::CaeError::new(
                cae_protocol::CaeErrorCode::EvidenceCaptureFailed,
                cae_protocol::Stage::Evidence,
                cae_protocol::Severity::Error,
                format!("failed to serialize dom snapshot: {e}"),
            )
        }).map_err(|e| CoreError::Domain(e, 422))?;
        self.write_file(EvidenceKind::Dom, "dom", &format!("step_{step}_{side}.json"), &bytes)
    }

    /// Only on failure or a critical action (§6.3): full redacted HTML.
    pub fn capture_html(&mut self, step: u64, html: &str) -> Result<(), CoreError> {
        let redacted = cae_security::redaction::redact_html(html);
        self.write_file(EvidenceKind::Html, "html", &format!("step_{step}_full.html"), redacted.as_bytes())
    }

    /// Only on failure or a critical action (§6.3): a screenshot plus
    /// its own sidecar `.sha256` file, per the on-disk layout.
    pub fn capture_screenshot(&mut self, step: u64, side: &str, png_bytes: &[u8]) -> Result<(), CoreError> {
        let file_name = format!("step_{step}_{side}.png");
        self.write_file(EvidenceKind::Screenshot, "shots", &file_name, png_bytes)?;
        let sha_path = self.evidence_dir("shots").join(format!("{file_name}.sha256"));
        cae_repository::store::atomic_write(&sha_path, cae_security::sha256_hex(png_bytes).as_bytes()).map_err(CoreError::from)
    }

    pub fn flush_manifest(&self) -> Result<(), CoreError> {
        cae_repository::store::atomic_write_json(&self.run_dir.join("evidence_manifest.json"), &self.manifest).map_err(CoreError::from)
    }

    pub fn manifest(&self) -> &EvidenceManifest {
        &self.manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn critical_action_list_matches_spec() {
        assert!(is_critical_action("submit"));
        assert!(is_critical_action("finalize"));
        assert!(!is_critical_action("click"));
    }

    #[test]
    fn dom_capture_appends_an_artifact_and_flush_persists_the_manifest() {
        let dir = tempdir().unwrap();
        let run_id = RunId::new();
        let mut writer = EvidenceWriter::new(dir.path(), run_id.clone());
        writer.capture_dom(1, "before", &serde_json::json!({"field": "value"})).unwrap();
        assert_eq!(writer.manifest().artifacts.len(), 1);
        writer.flush_manifest().unwrap();
        assert!(dir.path().join(run_id.as_str()).join("evidence_manifest.json").exists());
    }

    #[test]
    fn screenshot_capture_writes_a_sha256_sidecar() {
        let dir = tempdir().unwrap();
        let mut writer = EvidenceWriter::new(dir.path(), RunId::new());
        writer.capture_screenshot(2, "after", b"fake-png-bytes").unwrap();
        assert_eq!(writer.manifest().artifacts.len(), 1);
    }
}
