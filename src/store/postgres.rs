use async_trait::async_trait;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::error;

use super::{ApplicationStore, StoreError, StoreResult, SubmissionTx};
use crate::db::{PgPool, PgPooledConnection};
use crate::models::{Application, JobPosting, NewApplication, PostingStatus};
use crate::schema::{applications, job_postings};

type PgTransactionManager = AnsiTransactionManager;

fn begin_transaction(conn: &mut PgConnection) -> QueryResult<()> {
    <PgTransactionManager as TransactionManager<PgConnection>>::begin_transaction(conn)
}

fn commit_transaction(conn: &mut PgConnection) -> QueryResult<()> {
    <PgTransactionManager as TransactionManager<PgConnection>>::commit_transaction(conn)
}

fn rollback_transaction(conn: &mut PgConnection) -> QueryResult<()> {
    <PgTransactionManager as TransactionManager<PgConnection>>::rollback_transaction(conn)
}

#[derive(Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn begin(&self) -> StoreResult<Box<dyn SubmissionTx>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|err| StoreError::Unavailable(format!("database pool error: {err}")))?;
        begin_transaction(&mut conn)?;
        Ok(Box::new(PgSubmissionTx { conn, open: true }))
    }
}

struct PgSubmissionTx {
    conn: PgPooledConnection,
    open: bool,
}

#[async_trait]
impl SubmissionTx for PgSubmissionTx {
    async fn find_open_posting(&mut self, posting_id: i64) -> StoreResult<Option<JobPosting>> {
        // FOR SHARE keeps the posting from being closed until this transaction ends.
        let posting = job_postings::table
            .filter(job_postings::id.eq(posting_id))
            .filter(job_postings::status.eq(PostingStatus::Open.as_str()))
            .for_share()
            .first::<JobPosting>(&mut *self.conn)
            .optional()?;
        Ok(posting)
    }

    async fn find_application(
        &mut self,
        job_seeker_id: i64,
        job_posting_id: i64,
    ) -> StoreResult<Option<Application>> {
        let existing = applications::table
            .filter(applications::job_seeker_id.eq(job_seeker_id))
            .filter(applications::job_posting_id.eq(job_posting_id))
            .first::<Application>(&mut *self.conn)
            .optional()?;
        Ok(existing)
    }

    async fn insert_application(
        &mut self,
        application: NewApplication,
    ) -> StoreResult<Application> {
        let inserted = diesel::insert_into(applications::table)
            .values(&application)
            .get_result::<Application>(&mut *self.conn)?;
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut tx = self;
        tx.open = false;
        // A failed COMMIT already ends the transaction on both sides.
        commit_transaction(&mut tx.conn)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let mut tx = self;
        tx.open = false;
        rollback_transaction(&mut tx.conn)?;
        Ok(())
    }
}

impl Drop for PgSubmissionTx {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(err) = rollback_transaction(&mut self.conn) {
            error!(error = %err, "failed to roll back abandoned submission transaction");
        }
    }
}
