use std::sync::Arc;

use crate::{
    applications::ApplicationSubmitter,
    auth::jwt::JwtService,
    config::AppConfig,
    db::{PgPool, PgPooledConnection},
    error::{AppError, AppResult},
    store::ApplicationStore,
    uploads::{ResumeStore, ResumeUploadGate},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub uploads: ResumeUploadGate,
    pub submitter: ApplicationSubmitter,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        jwt: JwtService,
        resumes: Arc<dyn ResumeStore>,
        applications: Arc<dyn ApplicationStore>,
    ) -> Self {
        let uploads = ResumeUploadGate::new(resumes, config.max_resume_bytes);
        Self {
            pool,
            config: Arc::new(config),
            jwt,
            uploads,
            submitter: ApplicationSubmitter::new(applications),
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
