use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod applications;
pub mod auth;
pub mod health;
pub mod jobs;

/// Room for multipart framing around the resume payload.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .filter_map(|value| match value.parse::<HeaderValue>() {
                Ok(header) => Some(header),
                Err(err) => {
                    tracing::warn!(origin = %value, error = %err, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let upload_limit = state.uploads.max_bytes() + MULTIPART_OVERHEAD_BYTES;

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let jobs_routes = Router::new()
        .route(
            "/",
            get(jobs::list_open_postings).post(jobs::create_posting),
        )
        .route("/mine", get(jobs::list_my_postings))
        .route(
            "/apply/:job_id",
            post(jobs::apply_for_job).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/:id", get(jobs::get_posting))
        .route("/:id/status", patch(jobs::update_posting_status))
        .route("/:id/applications", get(jobs::list_posting_applications));

    let protected_state = state.clone();
    let applications_routes = Router::new()
        .route("/mine", get(applications::list_my_applications))
        .route("/:id/status", patch(applications::update_application_status))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .nest("/api/jobs", jobs_routes)
        .nest("/api/applications", applications_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
