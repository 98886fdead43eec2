//! JSONL audit log of completed scans.
//!
//! One line per scan, appended. When the file passes the size limit it is
//! rotated to `.1`, `.1` to `.2`, and so on; at most [`MAX_ROTATIONS`]
//! rotated files are kept.

use anyhow::{Context, Result};
use chrono::Utc;
use privacy_scan::Report;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default size before rotation (50 MB).
pub const MAX_LOG_SIZE: u64 = 50 * 1024 * 1024;

/// Rotated files kept.
pub const MAX_ROTATIONS: u32 = 5;

/// One completed scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanAuditEvent {
    pub timestamp: String,
    pub scan_id: String,
    /// `cli` or `rest`.
    pub source: String,
    pub url: String,
    pub final_url: Option<String>,
    pub score: u32,
    pub violation_ids: Vec<String>,
    pub error_kind: Option<String>,
    pub duration_ms: u64,
}

impl ScanAuditEvent {
    pub fn from_report(report: &Report, source: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            scan_id: report.scan_id.clone(),
            source: source.to_string(),
            url: report.url.clone(),
            final_url: report.final_url.clone(),
            score: report.score,
            violation_ids: report.violations.iter().map(|v| v.id.clone()).collect(),
            error_kind: report.error.as_ref().map(|e| e.kind.clone()),
            duration_ms: report.duration_ms,
        }
    }
}

/// Append-only JSONL writer with size-based rotation.
pub struct AuditLogger {
    file: File,
    path: PathBuf,
    max_size: u64,
    current_size: u64,
}

impl AuditLogger {
    /// Open or create the log at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_max_size(path, MAX_LOG_SIZE)
    }

    pub fn with_max_size(path: &Path, max_size: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = open_append(path)?;
        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            max_size,
            current_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&mut self, event: &ScanAuditEvent) -> Result<()> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }

        let json = serde_json::to_string(event)?;
        writeln!(self.file, "{json}").context("failed to append audit event")?;
        self.current_size += json.len() as u64 + 1;
        Ok(())
    }

    /// Record a finished scan.
    pub fn log_report(&mut self, report: &Report, source: &str) -> Result<()> {
        self.log(&ScanAuditEvent::from_report(report, source))
    }

    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }
        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                let _ = std::fs::rename(&from, rotation_path(&self.path, i + 1));
            }
        }
        let _ = std::fs::rename(&self.path, rotation_path(&self.path, 1));

        self.file = open_append(&self.path).context("failed to reopen audit log after rotation")?;
        self.current_size = 0;
        tracing::debug!("rotated audit log {}", self.path.display());
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open audit log: {}", path.display()))
}

/// `audit.jsonl` → `audit.jsonl.<index>`.
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audit.jsonl")
    );
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(n: u32) -> ScanAuditEvent {
        ScanAuditEvent {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            scan_id: format!("scan-{n}"),
            source: "cli".to_string(),
            url: "https://example.com".to_string(),
            final_url: None,
            score: 90,
            violation_ids: vec!["missing_consent_banner".to_string()],
            error_kind: None,
            duration_ms: 10,
        }
    }

    #[test]
    fn test_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");
        let mut logger = AuditLogger::open(&path).unwrap();
        logger.log(&event(1)).unwrap();
        logger.log(&event(2)).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<ScanAuditEvent> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines, vec![event(1), event(2)]);
    }

    #[test]
    fn test_rotation_keeps_bounded_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut logger = AuditLogger::with_max_size(&path, 1).unwrap();

        for n in 0..(MAX_ROTATIONS + 3) {
            logger.log(&event(n)).unwrap();
        }

        assert!(rotation_path(&path, 1).exists());
        assert!(rotation_path(&path, MAX_ROTATIONS).exists());
        assert!(!rotation_path(&path, MAX_ROTATIONS + 1).exists());

        let current = std::fs::read_to_string(&path).unwrap();
        assert_eq!(current.lines().count(), 1);
        assert!(current.contains(&format!("scan-{}", MAX_ROTATIONS + 2)));
    }

    #[test]
    fn test_rotation_path() {
        let p = rotation_path(Path::new("/var/log/audit.jsonl"), 3);
        assert_eq!(p, PathBuf::from("/var/log/audit.jsonl.3"));
    }
}
