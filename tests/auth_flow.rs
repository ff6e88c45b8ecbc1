mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct AuthenticatedUser {
    user_id: i64,
    email: String,
    role: String,
}

#[derive(Deserialize)]
struct RegisteredUser {
    id: i64,
    email: String,
    role: String,
}

#[tokio::test]
async fn register_login_and_me_roundtrip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let registered = app
        .post_json(
            "/api/auth/register",
            &json!({
                "email": "  Alice@Example.com ",
                "password": "s3cret-pass",
                "role": "job_seeker"
            }),
            None,
        )
        .await?;
    assert_eq!(registered.status(), StatusCode::CREATED);
    let user: RegisteredUser = serde_json::from_slice(&body_to_vec(registered.into_body()).await?)?;
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.role, "job_seeker");

    let duplicate = app
        .post_json(
            "/api/auth/register",
            &json!({
                "email": "alice@example.com",
                "password": "another-pass",
                "role": "recruiter"
            }),
            None,
        )
        .await?;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let token = app.login_token("alice@example.com", "s3cret-pass").await?;

    let response = app.get("/api/auth/me", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let me: AuthenticatedUser = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(me.user_id, user.id);
    assert_eq!(me.email, "alice@example.com");
    assert_eq!(me.role, "job_seeker");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn rejects_bad_credentials_and_weak_passwords() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("bob@example.com", "right-password", "recruiter")
        .await?;

    let wrong = app
        .post_json(
            "/api/auth/login",
            &json!({ "email": "bob@example.com", "password": "wrong-password" }),
            None,
        )
        .await?;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let unknown = app
        .post_json(
            "/api/auth/login",
            &json!({ "email": "nobody@example.com", "password": "whatever" }),
            None,
        )
        .await?;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

    let weak = app
        .post_json(
            "/api/auth/register",
            &json!({ "email": "carol@example.com", "password": "short", "role": "recruiter" }),
            None,
        )
        .await?;
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);

    let anonymous = app.get("/api/applications/mine", None).await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    app.cleanup().await?;
    Ok(())
}
