use std::env;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use jobboard::auth::jwt::JwtService;
use jobboard::auth::password::hash_password;
use jobboard::config::AppConfig;
use jobboard::db::{self, PgPool};
use jobboard::models::{Application, JobPosting, NewJobPosting, NewUser, PostingStatus};
use jobboard::routes;
use jobboard::state::AppState;
use jobboard::store::PgApplicationStore;
use jobboard::uploads::LocalResumeStore;
use once_cell::sync::Lazy;
use serde::Serialize;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestApp {
    pub state: AppState,
    router: Router,
    upload_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;
        let upload_dir = TempDir::new().context("failed to create upload dir")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            upload_dir: upload_dir.path().to_path_buf(),
            max_resume_bytes: 5 * 1024 * 1024,
            cors_allowed_origin: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let resumes = Arc::new(LocalResumeStore::new(upload_dir.path()));
        let applications = Arc::new(PgApplicationStore::new(pool.clone()));
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, jwt, resumes, applications);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            upload_dir,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(|conn| truncate_all(conn)).await
    }

    #[allow(dead_code)]
    pub fn uploaded_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.upload_dir.path())? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    pub async fn insert_user(&self, email: &str, password: &str, role: &str) -> Result<i64> {
        let email = email.to_string();
        let password = password.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let password_hash = hash_password(&password)?;
            let user = NewUser {
                email,
                password_hash,
                role,
            };
            let id = diesel::insert_into(jobboard::schema::users::table)
                .values(&user)
                .returning(jobboard::schema::users::id)
                .get_result::<i64>(conn)
                .context("failed to insert user")?;
            Ok(id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_posting(
        &self,
        recruiter_id: i64,
        title: &str,
        status: PostingStatus,
    ) -> Result<JobPosting> {
        let title = title.to_string();
        self.with_conn(move |conn| {
            let posting = NewJobPosting {
                recruiter_id,
                title,
                description: "Build and run things".to_string(),
                location: None,
                status: status.as_str().to_string(),
            };
            diesel::insert_into(jobboard::schema::job_postings::table)
                .values(&posting)
                .get_result::<JobPosting>(conn)
                .context("failed to insert job posting")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn applications(&self) -> Result<Vec<Application>> {
        self.with_conn(|conn| {
            use jobboard::schema::applications;
            applications::table
                .order(applications::id.asc())
                .load::<Application>(conn)
                .context("failed to load applications")
        })
        .await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/api/auth/login", &LoginPayload { email, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok(parsed.access_token)
    }

    /// Inserts a user with the given role and returns `(id, token)`.
    #[allow(dead_code)]
    pub async fn user_with_token(&self, email: &str, role: &str) -> Result<(i64, String)> {
        let password = "correct-horse";
        let id = self.insert_user(email, password, role).await?;
        let token = self.login_token(email, password).await?;
        Ok((id, token))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn apply(
        &self,
        job_id: i64,
        filename: &str,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"resume\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/jobs/apply/{job_id}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;

        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn execute_sql(&self, sql: &'static str) -> Result<()> {
        self.with_conn(move |conn| {
            conn.batch_execute(sql)
                .context("failed to execute test sql")?;
            Ok(())
        })
        .await
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn error_message(response: hyper::Response<Body>) -> Result<String> {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: String,
    }
    let body = body_to_vec(response.into_body()).await?;
    let parsed: ErrorBody = serde_json::from_slice(&body)?;
    Ok(parsed.error)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE applications, job_postings, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
