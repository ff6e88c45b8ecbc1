//! Application submission: ties a saved resume to a transactional insert.
//!
//! After [`ApplicationSubmitter::submit`] returns, either the application row
//! is committed and its resume kept, or no row exists and the resume has been
//! deleted.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::{Application, ApplicationStatus, NewApplication};
use crate::store::{ApplicationStore, StoreError, SubmissionTx};
use crate::uploads::PendingResume;

pub const MSG_SUBMITTED: &str = "Application submitted successfully";
pub const MSG_POSTING_UNAVAILABLE: &str = "Job posting not found or not open";
pub const MSG_ALREADY_APPLIED: &str = "You have already applied for this job";
pub const MSG_SUBMISSION_FAILED: &str = "Failed to submit application";

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Job posting not found or not open")]
    PostingUnavailable,
    #[error("You have already applied for this job")]
    AlreadyApplied,
    #[error("Failed to submit application")]
    Store(#[source] StoreError),
}

impl From<StoreError> for SubmissionError {
    fn from(value: StoreError) -> Self {
        match value {
            // concurrent duplicate caught by the (seeker, posting) constraint
            StoreError::UniqueViolation(_) => SubmissionError::AlreadyApplied,
            other => SubmissionError::Store(other),
        }
    }
}

impl From<SubmissionError> for AppError {
    fn from(value: SubmissionError) -> Self {
        match value {
            SubmissionError::PostingUnavailable => AppError::new(
                axum::http::StatusCode::NOT_FOUND,
                MSG_POSTING_UNAVAILABLE,
            ),
            SubmissionError::AlreadyApplied => AppError::bad_request(MSG_ALREADY_APPLIED),
            SubmissionError::Store(_) => AppError::bad_request(MSG_SUBMISSION_FAILED),
        }
    }
}

#[derive(Clone)]
pub struct ApplicationSubmitter {
    store: Arc<dyn ApplicationStore>,
}

impl ApplicationSubmitter {
    pub fn new(store: Arc<dyn ApplicationStore>) -> Self {
        Self { store }
    }

    pub async fn submit(
        &self,
        job_seeker_id: i64,
        job_posting_id: i64,
        resume: PendingResume,
    ) -> Result<Application, SubmissionError> {
        let mut scope = SubmissionScope::open(self.store.as_ref(), resume).await?;
        let resume_filename = scope.resume_filename().to_owned();

        let result = record_application(
            scope.tx(),
            job_seeker_id,
            job_posting_id,
            resume_filename,
        )
        .await;

        match scope.finish(result).await {
            Ok(application) => {
                info!(
                    application_id = application.id,
                    job_seeker_id,
                    job_posting_id,
                    resume = %application.resume_filename,
                    "application submitted"
                );
                Ok(application)
            }
            Err(err) => {
                warn!(error = ?err, job_seeker_id, job_posting_id, "application submission failed");
                Err(err)
            }
        }
    }
}

async fn record_application(
    tx: &mut dyn SubmissionTx,
    job_seeker_id: i64,
    job_posting_id: i64,
    resume_filename: String,
) -> Result<Application, SubmissionError> {
    let posting = tx
        .find_open_posting(job_posting_id)
        .await?
        .ok_or(SubmissionError::PostingUnavailable)?;

    if tx
        .find_application(job_seeker_id, posting.id)
        .await?
        .is_some()
    {
        return Err(SubmissionError::AlreadyApplied);
    }

    let application = tx
        .insert_application(NewApplication {
            job_seeker_id,
            job_posting_id: posting.id,
            status: ApplicationStatus::New.as_str().to_string(),
            resume_filename,
            applied_at: Utc::now().naive_utc(),
        })
        .await?;

    Ok(application)
}

/// Owns the open transaction together with the saved resume so that every
/// exit path runs exactly one of commit-and-keep or rollback-and-delete.
///
/// Rollback and file deletion are two separate steps. A crash between them
/// can leave an orphaned file; cleanup is best effort.
struct SubmissionScope {
    tx: Box<dyn SubmissionTx>,
    resume: PendingResume,
}

impl SubmissionScope {
    async fn open(
        store: &dyn ApplicationStore,
        resume: PendingResume,
    ) -> Result<Self, SubmissionError> {
        match store.begin().await {
            Ok(tx) => Ok(Self { tx, resume }),
            Err(err) => {
                resume.discard().await;
                Err(err.into())
            }
        }
    }

    fn tx(&mut self) -> &mut dyn SubmissionTx {
        &mut *self.tx
    }

    fn resume_filename(&self) -> &str {
        self.resume.filename()
    }

    async fn finish<T>(
        self,
        result: Result<T, SubmissionError>,
    ) -> Result<T, SubmissionError> {
        let Self { tx, resume } = self;

        match result {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    resume.keep();
                    Ok(value)
                }
                Err(err) => {
                    resume.discard().await;
                    Err(err.into())
                }
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back submission transaction");
                }
                resume.discard().await;
                Err(err)
            }
        }
    }
}
