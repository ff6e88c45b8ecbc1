//! Transactional storage behind the application submission workflow.
//!
//! The orchestrator only sees [`ApplicationStore`] and [`SubmissionTx`], so the
//! Postgres-backed store used in production can be swapped for the in-memory
//! one in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Application, JobPosting, NewApplication};

pub mod memory;
pub mod postgres;

pub use memory::MemoryApplicationStore;
pub use postgres::PgApplicationStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("database error: {0}")]
    Query(diesel::result::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => StoreError::UniqueViolation(info.message().to_string()),
            other => StoreError::Query(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ApplicationStore: Send + Sync + 'static {
    async fn begin(&self) -> StoreResult<Box<dyn SubmissionTx>>;
}

/// One open transaction. Dropping it without calling `commit` rolls back.
#[async_trait]
pub trait SubmissionTx: Send {
    /// Looks up the posting only if its status is `Open`.
    async fn find_open_posting(&mut self, posting_id: i64) -> StoreResult<Option<JobPosting>>;

    async fn find_application(
        &mut self,
        job_seeker_id: i64,
        job_posting_id: i64,
    ) -> StoreResult<Option<Application>>;

    async fn insert_application(&mut self, application: NewApplication)
        -> StoreResult<Application>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
