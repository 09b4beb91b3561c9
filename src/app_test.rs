use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use uuid::Uuid;

use super::*;
use crate::config::HttpTimeouts;
use crate::navigator::OAuthRecovery;
use crate::supabase::test_helpers::spawn_mock;

const ADMIN_ID: &str = "7a1d9c52-0000-4e6b-9a55-00000000000a";
const USER_ID: &str = "7a1d9c52-0000-4e6b-9a55-00000000000b";

// =============================================================================
// Mock project
// =============================================================================

fn user_json(id: &str) -> Value {
    let email = if id == ADMIN_ID { "admin@example.com" } else { "traveler@example.com" };
    json!({ "id": id, "email": email, "aud": "authenticated", "user_metadata": {} })
}

fn token_json(id: &str) -> Value {
    json!({
        "access_token": format!("access-{id}"),
        "refresh_token": format!("refresh-{id}"),
        "token_type": "bearer",
        "expires_in": 3600,
        "user": user_json(id)
    })
}

fn bearer_user(headers: &HeaderMap) -> Option<&'static str> {
    let auth = headers.get("authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?;
    [ADMIN_ID, USER_ID]
        .into_iter()
        .find(|id| token == format!("access-{id}") || token == format!("oauth-{id}"))
}

async fn token_handler(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] != "correct-horse" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })),
        );
    }
    let id = if body["email"] == "admin@example.com" { ADMIN_ID } else { USER_ID };
    (StatusCode::OK, Json(token_json(id)))
}

async fn user_handler(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match bearer_user(&headers) {
        Some(id) => (StatusCode::OK, Json(user_json(id))),
        None => (StatusCode::UNAUTHORIZED, Json(json!({ "msg": "invalid JWT" }))),
    }
}

async fn profiles_handler(Query(query): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    match query.get("id").map(|f| f.trim_start_matches("eq.")) {
        Some(ADMIN_ID) => (StatusCode::OK, Json(json!({ "role": "Admin" }))),
        Some(USER_ID) => (StatusCode::OK, Json(json!({ "role": "User" }))),
        _ => (StatusCode::NOT_ACCEPTABLE, Json(json!({ "code": "PGRST116", "message": "no rows" }))),
    }
}

fn mock_router() -> Router {
    Router::new()
        .route("/auth/v1/token", post(token_handler))
        .route("/auth/v1/user", get(user_handler))
        .route("/auth/v1/logout", post(|| async { StatusCode::NO_CONTENT }))
        .route("/rest/v1/profiles", get(profiles_handler))
}

fn app_config(base_url: &str, session_file: Option<PathBuf>) -> (AppConfig, SupabaseConfig) {
    let project = SupabaseConfig {
        url: base_url.to_owned(),
        anon_key: "anon-key".into(),
        timeouts: HttpTimeouts { request_secs: 5, connect_secs: 2 },
    };
    let config = AppConfig {
        primary: project.clone(),
        secondary: None,
        role_cache_ttl: Duration::from_secs(30),
        oauth_recovery: OAuthRecovery::ClientSide,
        session_file,
        routes_file: None,
    };
    (config, project)
}

async fn start_at(initial: &str) -> App {
    let base = spawn_mock(mock_router()).await;
    let (config, project) = app_config(&base, None);
    App::start(&config, &project, initial).await.unwrap()
}

// =============================================================================
// Startup
// =============================================================================

#[tokio::test]
async fn cold_start_on_protected_page_lands_on_login() {
    let app = start_at("/dashboard").await;
    assert_eq!(app.location().await, Location::from_path("/"));
    app.shutdown().await;
}

#[tokio::test]
async fn oauth_error_redirect_is_scrubbed_on_start() {
    let app = start_at("http://localhost:5173/?error=server_error&error_description=Database+error").await;
    assert_eq!(app.location().await, Location::from_path("/"));
    app.shutdown().await;
}

#[tokio::test]
async fn oauth_fragment_signs_in_and_lands_on_dashboard() {
    let initial = format!("http://localhost:5173/#access_token=oauth-{USER_ID}&refresh_token=r&expires_in=3600&token_type=bearer");
    let app = start_at(&initial).await;

    assert_eq!(app.location().await, Location::from_path("/dashboard"));
    assert!(app.client().current_session().await.is_some());
    app.navigator()
        .with_history(|h| assert!(h.entries().iter().all(|l| !l.has_oauth_error_signature())))
        .await;
    app.shutdown().await;
}

#[tokio::test]
async fn stored_session_survives_restart() {
    let base = spawn_mock(mock_router()).await;
    let file = std::env::temp_dir().join(format!("wayfarer-app-{}.json", Uuid::new_v4()));
    let (config, project) = app_config(&base, Some(file.clone()));

    let app = App::start(&config, &project, "/").await.unwrap();
    app.sign_in("traveler@example.com", "correct-horse").await.unwrap();
    app.shutdown().await;

    let app = App::start(&config, &project, "/settings").await.unwrap();
    assert_eq!(app.location().await.path, "/settings");
    app.sign_out().await;
    assert_eq!(app.location().await.path, "/");
    app.shutdown().await;

    assert!(!file.exists());
}

// =============================================================================
// Sign-in flows
// =============================================================================

#[tokio::test]
async fn sign_in_moves_login_to_dashboard() {
    let app = start_at("/").await;
    let session = app.sign_in("traveler@example.com", "correct-horse").await.unwrap();
    assert_eq!(session.user.id.to_string(), USER_ID);
    assert_eq!(app.location().await.path, "/dashboard");
    app.shutdown().await;
}

#[tokio::test]
async fn rejected_credentials_stay_on_login() {
    let app = start_at("/").await;
    let err = app.sign_in("traveler@example.com", "wrong-horse").await.unwrap_err();
    assert!(matches!(err, AppError::Supabase(SupabaseError::ApiResponse { status: 400, .. })));
    assert_eq!(app.location().await.path, "/");
    app.shutdown().await;
}

#[tokio::test]
async fn short_password_never_leaves_process() {
    let app = start_at("/").await;
    let err = app.sign_in("traveler@example.com", "123").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials(_)));
    app.shutdown().await;
}

#[tokio::test]
async fn admin_route_by_role() {
    let app = start_at("/").await;
    app.sign_in("traveler@example.com", "correct-horse").await.unwrap();
    assert_eq!(app.visit("/destinations").await.unwrap().committed.path, "/dashboard");
    app.sign_out().await;

    app.sign_in("admin@example.com", "correct-horse").await.unwrap();
    assert_eq!(app.visit("/destinations").await.unwrap().committed.path, "/destinations");
    assert_eq!(app.whoami().await.unwrap().unwrap().id.to_string(), ADMIN_ID);
    app.shutdown().await;
}

#[tokio::test]
async fn sign_out_leaves_protected_page() {
    let app = start_at("/").await;
    app.sign_in("traveler@example.com", "correct-horse").await.unwrap();
    app.visit("/settings").await.unwrap();
    app.sign_out().await;
    assert_eq!(app.location().await.path, "/");
    assert!(app.whoami().await.unwrap().is_none());
    app.shutdown().await;
}
