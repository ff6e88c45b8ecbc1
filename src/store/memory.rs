use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{ApplicationStore, StoreError, StoreResult, SubmissionTx};
use crate::models::{Application, JobPosting, NewApplication, PostingStatus};

const UNIQUE_PAIR_MESSAGE: &str =
    "duplicate key value violates unique constraint \"applications_seeker_posting_key\"";

#[derive(Default)]
struct Tables {
    postings: BTreeMap<i64, JobPosting>,
    applications: Vec<Application>,
}

#[derive(Default)]
struct Faults {
    fail_next_begin: AtomicBool,
    fail_next_insert: AtomicBool,
    fail_next_commit: AtomicBool,
}

/// In-process store with the same visibility rules as the Postgres one:
/// writes are staged per transaction and the (seeker, posting) pair is
/// re-checked for uniqueness when a transaction commits.
#[derive(Clone, Default)]
pub struct MemoryApplicationStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
    next_id: Arc<AtomicI64>,
}

impl MemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn add_posting(
        &self,
        recruiter_id: i64,
        title: &str,
        status: PostingStatus,
    ) -> JobPosting {
        let now = Utc::now().naive_utc();
        let posting = JobPosting {
            id: self.allocate_id(),
            recruiter_id,
            title: title.to_string(),
            description: String::new(),
            location: None,
            status: status.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        let mut tables = self.tables.lock().await;
        tables.postings.insert(posting.id, posting.clone());
        posting
    }

    pub async fn set_posting_status(&self, posting_id: i64, status: PostingStatus) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.postings.get_mut(&posting_id) {
            Some(posting) => {
                posting.status = status.as_str().to_string();
                posting.updated_at = Utc::now().naive_utc();
                true
            }
            None => false,
        }
    }

    pub async fn applications(&self) -> Vec<Application> {
        self.tables.lock().await.applications.clone()
    }

    pub fn fail_next_begin(&self) {
        self.faults.fail_next_begin.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_insert(&self) {
        self.faults.fail_next_insert.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_commit(&self) {
        self.faults.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

fn trip(flag: &AtomicBool, what: &str) -> StoreResult<()> {
    if flag.swap(false, Ordering::SeqCst) {
        return Err(StoreError::Unavailable(format!("injected {what} failure")));
    }
    Ok(())
}

fn same_pair(application: &Application, job_seeker_id: i64, job_posting_id: i64) -> bool {
    application.job_seeker_id == job_seeker_id && application.job_posting_id == job_posting_id
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn begin(&self) -> StoreResult<Box<dyn SubmissionTx>> {
        trip(&self.faults.fail_next_begin, "begin")?;
        Ok(Box::new(MemorySubmissionTx {
            store: self.clone(),
            staged: Vec::new(),
        }))
    }
}

struct MemorySubmissionTx {
    store: MemoryApplicationStore,
    staged: Vec<Application>,
}

#[async_trait]
impl SubmissionTx for MemorySubmissionTx {
    async fn find_open_posting(&mut self, posting_id: i64) -> StoreResult<Option<JobPosting>> {
        let tables = self.store.tables.lock().await;
        let open = PostingStatus::Open.as_str();
        Ok(tables
            .postings
            .get(&posting_id)
            .filter(|posting| posting.status == open)
            .cloned())
    }

    async fn find_application(
        &mut self,
        job_seeker_id: i64,
        job_posting_id: i64,
    ) -> StoreResult<Option<Application>> {
        let tables = self.store.tables.lock().await;
        Ok(tables
            .applications
            .iter()
            .chain(self.staged.iter())
            .find(|application| same_pair(application, job_seeker_id, job_posting_id))
            .cloned())
    }

    async fn insert_application(
        &mut self,
        application: NewApplication,
    ) -> StoreResult<Application> {
        trip(&self.store.faults.fail_next_insert, "insert")?;

        let conflict = self.staged.iter().any(|staged| {
            same_pair(staged, application.job_seeker_id, application.job_posting_id)
        });
        if conflict {
            return Err(StoreError::UniqueViolation(UNIQUE_PAIR_MESSAGE.to_string()));
        }

        let row = Application {
            id: self.store.allocate_id(),
            job_seeker_id: application.job_seeker_id,
            job_posting_id: application.job_posting_id,
            status: application.status,
            resume_filename: application.resume_filename,
            applied_at: application.applied_at,
            updated_at: application.applied_at,
        };
        self.staged.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        trip(&self.store.faults.fail_next_commit, "commit")?;

        let mut tables = self.store.tables.lock().await;
        let conflict = self.staged.iter().any(|staged| {
            tables
                .applications
                .iter()
                .any(|row| same_pair(row, staged.job_seeker_id, staged.job_posting_id))
        });
        if conflict {
            return Err(StoreError::UniqueViolation(UNIQUE_PAIR_MESSAGE.to_string()));
        }
        tables.applications.extend(self.staged.iter().cloned());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
