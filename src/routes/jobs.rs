use axum::extract::{Json, Multipart, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::applications::MSG_SUBMITTED;
use crate::auth::{JobSeeker, Recruiter};
use crate::error::{AppError, AppResult};
use crate::models::{Application, JobPosting, NewJobPosting, PostingStatus};
use crate::schema::{applications, job_postings};
use crate::state::AppState;

use super::applications::ApplicationResponse;
use super::to_iso;

const MAX_TITLE_LEN: usize = 255;

#[derive(Deserialize)]
pub struct CreatePostingRequest {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePostingStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct PostingResponse {
    pub id: i64,
    pub recruiter_id: i64,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<JobPosting> for PostingResponse {
    fn from(posting: JobPosting) -> Self {
        Self {
            id: posting.id,
            recruiter_id: posting.recruiter_id,
            title: posting.title,
            description: posting.description,
            location: posting.location,
            status: posting.status,
            created_at: to_iso(posting.created_at),
            updated_at: to_iso(posting.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn list_open_postings(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PostingResponse>>> {
    let mut conn = state.db()?;
    let postings: Vec<JobPosting> = job_postings::table
        .filter(job_postings::status.eq(PostingStatus::Open.as_str()))
        .order((job_postings::created_at.desc(), job_postings::id.desc()))
        .load(&mut conn)?;

    Ok(Json(postings.into_iter().map(PostingResponse::from).collect()))
}

pub async fn get_posting(
    State(state): State<AppState>,
    Path(posting_id): Path<i64>,
) -> AppResult<Json<PostingResponse>> {
    let mut conn = state.db()?;
    let posting: JobPosting = job_postings::table.find(posting_id).first(&mut conn)?;
    Ok(Json(PostingResponse::from(posting)))
}

pub async fn list_my_postings(
    State(state): State<AppState>,
    Recruiter(user): Recruiter,
) -> AppResult<Json<Vec<PostingResponse>>> {
    let mut conn = state.db()?;
    let postings: Vec<JobPosting> = job_postings::table
        .filter(job_postings::recruiter_id.eq(user.user_id))
        .order((job_postings::created_at.desc(), job_postings::id.desc()))
        .load(&mut conn)?;

    Ok(Json(postings.into_iter().map(PostingResponse::from).collect()))
}

pub async fn create_posting(
    State(state): State<AppState>,
    Recruiter(user): Recruiter,
    Json(payload): Json<CreatePostingRequest>,
) -> AppResult<(StatusCode, Json<PostingResponse>)> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::bad_request(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    let description = payload.description.trim();
    if description.is_empty() {
        return Err(AppError::bad_request("description must not be empty"));
    }
    let location = payload
        .location
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned);

    let new_posting = NewJobPosting {
        recruiter_id: user.user_id,
        title: title.to_string(),
        description: description.to_string(),
        location,
        status: PostingStatus::Open.as_str().to_string(),
    };

    let mut conn = state.db()?;
    let posting: JobPosting = diesel::insert_into(job_postings::table)
        .values(&new_posting)
        .get_result(&mut conn)?;

    info!(posting_id = posting.id, recruiter_id = user.user_id, "created job posting");
    Ok((StatusCode::CREATED, Json(PostingResponse::from(posting))))
}

pub async fn update_posting_status(
    State(state): State<AppState>,
    Path(posting_id): Path<i64>,
    Recruiter(user): Recruiter,
    Json(payload): Json<UpdatePostingStatusRequest>,
) -> AppResult<Json<PostingResponse>> {
    let status: PostingStatus = payload.status.parse().map_err(AppError::bad_request)?;
    let mut conn = state.db()?;

    let posting = conn.transaction::<JobPosting, AppError, _>(|conn| {
        let posting: JobPosting = job_postings::table
            .find(posting_id)
            .for_update()
            .first(conn)?;
        if posting.recruiter_id != user.user_id {
            return Err(AppError::forbidden());
        }
        if posting.status == status.as_str() {
            return Ok(posting);
        }

        let updated = diesel::update(job_postings::table.find(posting_id))
            .set((
                job_postings::status.eq(status.as_str()),
                job_postings::updated_at.eq(Utc::now().naive_utc()),
            ))
            .get_result(conn)?;
        Ok(updated)
    })?;

    info!(posting_id, status = %status, "updated job posting status");
    Ok(Json(PostingResponse::from(posting)))
}

pub async fn list_posting_applications(
    State(state): State<AppState>,
    Path(posting_id): Path<i64>,
    Recruiter(user): Recruiter,
) -> AppResult<Json<Vec<ApplicationResponse>>> {
    let mut conn = state.db()?;
    let posting: JobPosting = job_postings::table.find(posting_id).first(&mut conn)?;
    if posting.recruiter_id != user.user_id {
        return Err(AppError::forbidden());
    }

    let rows: Vec<Application> = applications::table
        .filter(applications::job_posting_id.eq(posting_id))
        .order(applications::applied_at.asc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(ApplicationResponse::from).collect()))
}

/// `POST /api/jobs/apply/:job_id` with a multipart `resume` field.
pub async fn apply_for_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    JobSeeker(seeker): JobSeeker,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let resume = state.uploads.accept(&mut multipart).await.map_err(|err| {
        error!(error = %err, job_posting_id = job_id, seeker_id = seeker.user_id, "resume upload rejected");
        AppError::from(err)
    })?;

    state
        .submitter
        .submit(seeker.user_id, job_id, resume)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: MSG_SUBMITTED.to_string(),
        }),
    ))
}
