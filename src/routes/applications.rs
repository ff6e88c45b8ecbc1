use axum::extract::{Json, Path, State};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{JobSeeker, Recruiter};
use crate::error::{AppError, AppResult};
use crate::models::{Application, ApplicationStatus, JobPosting};
use crate::schema::{applications, job_postings};
use crate::state::AppState;

use super::to_iso;

#[derive(Serialize)]
pub struct ApplicationResponse {
    pub id: i64,
    pub job_seeker_id: i64,
    pub job_posting_id: i64,
    pub status: String,
    pub resume_filename: String,
    pub applied_at: String,
    pub updated_at: String,
}

impl From<Application> for ApplicationResponse {
    fn from(application: Application) -> Self {
        Self {
            id: application.id,
            job_seeker_id: application.job_seeker_id,
            job_posting_id: application.job_posting_id,
            status: application.status,
            resume_filename: application.resume_filename,
            applied_at: to_iso(application.applied_at),
            updated_at: to_iso(application.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct SeekerApplicationResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub job_title: String,
    pub job_status: String,
}

#[derive(Deserialize)]
pub struct UpdateApplicationStatusRequest {
    pub status: String,
}

pub async fn list_my_applications(
    State(state): State<AppState>,
    JobSeeker(seeker): JobSeeker,
) -> AppResult<Json<Vec<SeekerApplicationResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<(Application, JobPosting)> = applications::table
        .inner_join(job_postings::table)
        .filter(applications::job_seeker_id.eq(seeker.user_id))
        .order(applications::applied_at.desc())
        .select((applications::all_columns, job_postings::all_columns))
        .load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|(application, posting)| SeekerApplicationResponse {
            application: ApplicationResponse::from(application),
            job_title: posting.title,
            job_status: posting.status,
        })
        .collect();

    Ok(Json(response))
}

pub async fn update_application_status(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
    Recruiter(user): Recruiter,
    Json(payload): Json<UpdateApplicationStatusRequest>,
) -> AppResult<Json<ApplicationResponse>> {
    let status: ApplicationStatus = payload.status.parse().map_err(AppError::bad_request)?;
    let mut conn = state.db()?;

    let updated = conn.transaction::<Application, AppError, _>(|conn| {
        let (application, posting): (Application, JobPosting) = applications::table
            .inner_join(job_postings::table)
            .filter(applications::id.eq(application_id))
            .select((applications::all_columns, job_postings::all_columns))
            .first(conn)?;
        if posting.recruiter_id != user.user_id {
            return Err(AppError::forbidden());
        }

        let updated = diesel::update(applications::table.find(application.id))
            .set((
                applications::status.eq(status.as_str()),
                applications::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(conn)?;
        Ok(updated)
    })?;

    info!(application_id, status = %status, recruiter_id = user.user_id, "updated application status");
    Ok(Json(ApplicationResponse::from(updated)))
}
