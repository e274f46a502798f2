//! Artifact storage backends.

use crate::error::AuditError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use twx_core::{AuditConfig, ExecutionReport, Specification};

/// Directory (under the store root) holding submitted specifications.
pub const SPECS_DIR: &str = "specs";

/// Directory (under the store root) holding execution reports.
pub const REPORTS_DIR: &str = "reports";

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";
const RUN_ID_PREFIX_LEN: usize = 8;

/// Persists what was asked and what happened.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store the submitted specification, unknown keys included (the JSON
    /// is re-serialized, so whitespace and key order may differ). Returns
    /// where it went, or `None` if the store discards artifacts.
    async fn save_specification(&self, spec: &Specification)
    -> Result<Option<PathBuf>, AuditError>;

    /// Store a report, whatever its terminal state.
    async fn save_report(&self, report: &ExecutionReport) -> Result<Option<PathBuf>, AuditError>;

    /// Stored reports, oldest first.
    async fn list_reports(&self) -> Result<Vec<PathBuf>, AuditError>;

    /// Load a stored report.
    async fn load_report(&self, path: &Path) -> Result<ExecutionReport, AuditError>;
}

/// Create the store described by `config`.
pub fn create_store(config: &AuditConfig) -> Box<dyn ArtifactStore> {
    if config.enabled {
        Box::new(FileArtifactStore::new(&config.directory))
    } else {
        tracing::debug!("audit artifacts disabled");
        Box::new(NullArtifactStore)
    }
}

/// Writes pretty-printed JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn specs_dir(&self) -> PathBuf {
        self.root.join(SPECS_DIR)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    async fn ensure_dir(dir: &Path) -> Result<(), AuditError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| AuditError::io(dir, e))
    }

    /// Write `content` to `dir/<stem>.json`, never replacing an existing file.
    async fn write_new(dir: &Path, stem: &str, content: &str) -> Result<PathBuf, AuditError> {
        Self::ensure_dir(dir).await?;

        let mut attempt = 0usize;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = dir.join(name);

            let opened = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match opened {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .await
                        .map_err(|e| AuditError::io(&path, e))?;
                    file.flush().await.map_err(|e| AuditError::io(&path, e))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(AuditError::io(&path, e)),
            }
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn report_stem(report: &ExecutionReport) -> String {
    let run_id = report.run_id.simple().to_string();
    let prefix = &run_id[..RUN_ID_PREFIX_LEN];
    format!("run_{}_{prefix}", timestamp(report.started_at))
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn save_specification(
        &self,
        spec: &Specification,
    ) -> Result<Option<PathBuf>, AuditError> {
        let dir = self.specs_dir();
        let json = serde_json::to_string_pretty(spec)
            .map_err(|e| AuditError::serialization(&dir, e))?;
        let stem = format!("spec_{}", timestamp(Utc::now()));
        let path = Self::write_new(&dir, &stem, &json).await?;

        tracing::info!(path = %path.display(), "specification saved");
        Ok(Some(path))
    }

    async fn save_report(&self, report: &ExecutionReport) -> Result<Option<PathBuf>, AuditError> {
        let dir = self.reports_dir();
        let json = report
            .to_json_pretty()
            .map_err(|e| AuditError::serialization(&dir, e))?;
        let path = Self::write_new(&dir, &report_stem(report), &json).await?;

        tracing::info!(
            run_id = %report.run_id,
            state = %report.state,
            path = %path.display(),
            "report saved"
        );
        Ok(Some(path))
    }

    async fn list_reports(&self) -> Result<Vec<PathBuf>, AuditError> {
        let dir = self.reports_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AuditError::io(&dir, e)),
        };

        let mut reports = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AuditError::io(&dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                reports.push(path);
            }
        }
        // File names start with a sortable UTC timestamp.
        reports.sort();
        Ok(reports)
    }

    async fn load_report(&self, path: &Path) -> Result<ExecutionReport, AuditError> {
        load_report_file(path).await
    }
}

/// Read a report file from any location.
pub async fn load_report_file(path: &Path) -> Result<ExecutionReport, AuditError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AuditError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| AuditError::serialization(path, e))
}

/// Discards everything. Used when audit artifacts are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullArtifactStore;

#[async_trait]
impl ArtifactStore for NullArtifactStore {
    async fn save_specification(
        &self,
        _spec: &Specification,
    ) -> Result<Option<PathBuf>, AuditError> {
        Ok(None)
    }

    async fn save_report(&self, _report: &ExecutionReport) -> Result<Option<PathBuf>, AuditError> {
        Ok(None)
    }

    async fn list_reports(&self) -> Result<Vec<PathBuf>, AuditError> {
        Ok(Vec::new())
    }

    async fn load_report(&self, path: &Path) -> Result<ExecutionReport, AuditError> {
        load_report_file(path).await
    }
}
