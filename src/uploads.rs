use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use axum::extract::multipart::{Field, Multipart, MultipartError};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;

pub const RESUME_FIELD: &str = "resume";
pub const RESUME_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
pub const DEFAULT_MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Resume file is required")]
    MissingFile,
    #[error("Resume filename is required")]
    MissingFilename,
    #[error("Only one resume file may be uploaded")]
    DuplicateField,
    #[error("Invalid file type '{filename}'. Allowed extensions: .pdf, .doc, .docx")]
    UnsupportedType { filename: String },
    #[error("Resume exceeds the maximum size of {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Resume file must not be empty")]
    EmptyFile,
    #[error("invalid multipart data: {0}")]
    Multipart(String),
    #[error("Failed to submit application")]
    Storage(#[source] anyhow::Error),
}

impl UploadError {
    fn multipart(err: MultipartError) -> Self {
        UploadError::Multipart(err.body_text())
    }
}

impl From<UploadError> for AppError {
    fn from(value: UploadError) -> Self {
        AppError::bad_request(value.to_string())
    }
}

/// Backing storage for saved resumes, addressed by generated filename.
#[async_trait]
pub trait ResumeStore: Send + Sync + 'static {
    /// Not cancellation safe: a save dropped midway may leave a file behind.
    async fn save(&self, filename: &str, contents: Bytes) -> Result<()>;

    async fn delete(&self, filename: &str) -> Result<()>;

    async fn exists(&self, filename: &str) -> Result<bool>;

    /// Used from `Drop`, where awaiting is not possible.
    fn delete_blocking(&self, filename: &str) -> Result<()>;
}

pub struct LocalResumeStore {
    root: PathBuf,
}

impl LocalResumeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create upload dir {}", self.root.display()))
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename.starts_with('.')
        {
            bail!("refusing to address resume with unsafe name '{filename}'");
        }
        Ok(self.root.join(filename))
    }
}

#[async_trait]
impl ResumeStore for LocalResumeStore {
    async fn save(&self, filename: &str, contents: Bytes) -> Result<()> {
        let path = self.path_for(filename)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to create {}", path.display()))?;

        let written = async {
            file.write_all(&contents).await?;
            file.sync_all().await
        }
        .await;

        if let Err(err) = written {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                warn!(error = %cleanup, path = %path.display(), "failed to remove partial resume");
            }
            return Err(err).with_context(|| format!("failed to write {}", path.display()));
        }

        Ok(())
    }

    async fn delete(&self, filename: &str) -> Result<()> {
        let path = self.path_for(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to delete {}", path.display())),
        }
    }

    async fn exists(&self, filename: &str) -> Result<bool> {
        let path = self.path_for(filename)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    fn delete_blocking(&self, filename: &str) -> Result<()> {
        let path = self.path_for(filename)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to delete {}", path.display())),
        }
    }
}

/// A resume that has been written to storage but not yet claimed by a
/// committed application.
///
/// Exactly one of [`PendingResume::keep`] or [`PendingResume::discard`]
/// settles it. A guard dropped while unsettled removes its file.
pub struct PendingResume {
    filename: String,
    original_name: String,
    size_bytes: usize,
    store: Arc<dyn ResumeStore>,
    settled: bool,
}

impl PendingResume {
    fn new(
        store: Arc<dyn ResumeStore>,
        filename: String,
        original_name: String,
        size_bytes: usize,
    ) -> Self {
        Self {
            filename,
            original_name,
            size_bytes,
            store,
            settled: false,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn keep(mut self) -> String {
        self.settled = true;
        std::mem::take(&mut self.filename)
    }

    pub async fn discard(mut self) {
        self.settled = true;
        match self.store.delete(&self.filename).await {
            Ok(()) => debug!(resume = %self.filename, "discarded uploaded resume"),
            Err(err) => {
                warn!(error = %err, resume = %self.filename, "failed to delete uploaded resume")
            }
        }
    }
}

impl Drop for PendingResume {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!(resume = %self.filename, "pending resume dropped before settling; removing");
        if let Err(err) = self.store.delete_blocking(&self.filename) {
            warn!(error = %err, resume = %self.filename, "failed to delete uploaded resume");
        }
    }
}

impl fmt::Debug for PendingResume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResume")
            .field("filename", &self.filename)
            .field("original_name", &self.original_name)
            .field("size_bytes", &self.size_bytes)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}

/// Validates the `resume` multipart field and writes it under a generated
/// name. Nothing reaches storage unless the extension and size checks pass.
#[derive(Clone)]
pub struct ResumeUploadGate {
    store: Arc<dyn ResumeStore>,
    max_bytes: usize,
}

impl ResumeUploadGate {
    pub fn new(store: Arc<dyn ResumeStore>, max_bytes: usize) -> Self {
        Self { store, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn accept(&self, multipart: &mut Multipart) -> Result<PendingResume, UploadError> {
        let mut upload: Option<(String, &'static str, Bytes)> = None;

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(UploadError::multipart)?
        {
            if field.name() != Some(RESUME_FIELD) {
                continue;
            }
            if upload.is_some() {
                return Err(UploadError::DuplicateField);
            }

            let original_name = field
                .file_name()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
                .ok_or(UploadError::MissingFilename)?;
            let extension = allowed_extension(&original_name).ok_or_else(|| {
                UploadError::UnsupportedType {
                    filename: original_name.clone(),
                }
            })?;
            let contents = read_limited(&mut field, self.max_bytes).await?;
            upload = Some((original_name, extension, contents));
        }

        let (original_name, extension, contents) = upload.ok_or(UploadError::MissingFile)?;
        if contents.is_empty() {
            return Err(UploadError::EmptyFile);
        }

        let pending = PendingResume::new(
            self.store.clone(),
            generate_filename(extension),
            original_name,
            contents.len(),
        );

        // The save runs on its own task so a dropped request cannot cut it
        // short. If nobody awaits the result, the task output is dropped and
        // the unsettled guard removes the file.
        let store = self.store.clone();
        let pending = tokio::spawn(async move {
            let saved = store.save(pending.filename(), contents).await;
            match saved {
                Ok(()) => Ok(pending),
                Err(err) => {
                    pending.discard().await;
                    Err(err)
                }
            }
        })
        .await
        .map_err(|err| UploadError::Storage(anyhow!("resume save task failed: {err}")))?
        .map_err(UploadError::Storage)?;

        debug!(
            resume = %pending.filename(),
            original_name = %pending.original_name(),
            size_bytes = pending.size_bytes(),
            "saved resume upload"
        );
        Ok(pending)
    }
}

async fn read_limited(field: &mut Field<'_>, limit: usize) -> Result<Bytes, UploadError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(UploadError::multipart)? {
        if buffer.len() + chunk.len() > limit {
            return Err(UploadError::TooLarge { limit });
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

/// Returns the canonical lowercase extension when `filename` is allowed.
pub fn allowed_extension(filename: &str) -> Option<&'static str> {
    let extension = Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    RESUME_EXTENSIONS
        .iter()
        .copied()
        .find(|allowed| *allowed == extension)
}

pub fn generate_filename(extension: &str) -> String {
    format!(
        "resume-{}-{}.{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        extension
    )
}
