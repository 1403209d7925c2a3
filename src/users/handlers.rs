use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use bytes::Bytes;
use tracing::{instrument, warn};

use crate::{
    error::ApiError,
    state::AppState,
    users::{
        dto::{RegisterRequest, RegistrationResponse},
        services::register_email,
    },
};

pub fn users_routes() -> Router<AppState> {
    Router::new().route("/", post(get_or_create_user))
}

/// POST / { "email": "..." }
/// Body is parsed as JSON whatever the Content-Type says.
#[instrument(skip(state, body))]
pub async fn get_or_create_user(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<RegistrationResponse>), ApiError> {
    let payload: RegisterRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid request body");
        ApiError::InvalidJson(e.to_string())
    })?;

    let reg = register_email(&state, payload.email).await?;
    let status = if reg.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(reg.into())))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request},
        response::Response,
    };
    use serde_json::{json, Value};
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        app::build_app,
        error::DbErrorKind,
        users::repo::fakes::{FailingUserRepo, MemoryUserRepo},
    };

    fn post_root(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("Content-Type", "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn send(app: &Router, body: Value) -> (StatusCode, Value) {
        let res = app
            .clone()
            .oneshot(post_root(body.to_string()))
            .await
            .unwrap();
        split(res).await
    }

    async fn split(res: Response) -> (StatusCode, Value) {
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn memory_app() -> (Router, Arc<MemoryUserRepo>) {
        let repo = Arc::new(MemoryUserRepo::default());
        let app = build_app(AppState::fake().with_users(repo.clone()));
        (app, repo)
    }

    #[tokio::test]
    async fn first_request_creates_then_repeats_return_same_user() {
        let (app, _) = memory_app();

        let (status, created) = send(&app, json!({ "email": "a@example.com" })).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "created");
        assert_eq!(created["user"]["id"], 1);
        assert_eq!(created["user"]["email"], "a@example.com");

        for _ in 0..3 {
            let (status, existing) = send(&app, json!({ "email": "a@example.com" })).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(existing["status"], "exists");
            assert_eq!(existing["user"], created["user"]);
        }
    }

    #[tokio::test]
    async fn created_at_round_trips() {
        let (app, _) = memory_app();
        let (_, created) = send(&app, json!({ "email": "ts@example.com" })).await;
        let (_, existing) = send(&app, json!({ "email": "ts@example.com" })).await;

        let parse = |v: &Value| {
            OffsetDateTime::parse(v["user"]["created_at"].as_str().unwrap(), &Rfc3339).unwrap()
        };
        assert_eq!(parse(&created), parse(&existing));
    }

    #[tokio::test]
    async fn new_emails_get_increasing_ids() {
        let (app, _) = memory_app();
        let mut last = 0;
        for i in 0..5 {
            let (status, body) = send(&app, json!({ "email": format!("u{i}@example.com") })).await;
            assert_eq!(status, StatusCode::CREATED);
            let id = body["user"]["id"].as_i64().unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[tokio::test]
    async fn missing_or_empty_email_is_rejected_without_writing() {
        let (app, repo) = memory_app();
        for body in [json!({}), json!({ "email": "" }), json!({ "email": null })] {
            let (status, err) = send(&app, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(err, json!({ "error": "email_required" }));
        }
        assert_eq!(repo.len(), 0);
    }

    #[tokio::test]
    async fn emails_match_exactly_without_trimming() {
        let (app, repo) = memory_app();

        let (status, plain) = send(&app, json!({ "email": "a@example.com" })).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, padded) = send(&app, json!({ "email": " a@example.com " })).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(padded["user"]["email"], " a@example.com ");
        assert_ne!(padded["user"]["id"], plain["user"]["id"]);

        let (status, spaces) = send(&app, json!({ "email": "   " })).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(spaces["user"]["email"], "   ");

        assert_eq!(repo.len(), 3);
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_json() {
        let (app, repo) = memory_app();
        for raw in ["not json", "", "[1,2]", r#"{"email": 42}"#] {
            let res = app.clone().oneshot(post_root(raw)).await.unwrap();
            let (status, err) = split(res).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {raw:?}");
            assert_eq!(err["error"], "invalid_json");
        }
        assert_eq!(repo.len(), 0);
    }

    #[tokio::test]
    async fn content_type_is_not_required() {
        let (app, _) = memory_app();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from(r#"{"email":"plain@example.com"}"#))
            .unwrap();
        let (status, _) = split(app.oneshot(req).await.unwrap()).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_email_create_once() {
        let (app, repo) = memory_app();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let app = app.clone();
            handles.push(tokio::spawn(async move {
                send(&app, json!({ "email": "race@example.com" })).await
            }));
        }

        let mut created = 0;
        let mut ids = Vec::new();
        for h in handles {
            let (status, body) = h.await.unwrap();
            if status == StatusCode::CREATED {
                created += 1;
            } else {
                assert_eq!(status, StatusCode::OK);
            }
            ids.push(body["user"]["id"].clone());
        }
        assert_eq!(created, 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn database_failure_is_500_with_redacted_details() {
        let state = AppState::fake().with_users(Arc::new(FailingUserRepo(DbErrorKind::Unavailable)));
        let (status, body) = send(&build_app(state), json!({ "email": "x@example.com" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "database_error");
        assert_eq!(body["kind"], "unavailable");
        assert_eq!(body["details"], "database is unavailable");
    }

    #[tokio::test]
    async fn database_failure_details_can_be_exposed() {
        let mut state = AppState::fake().with_users(Arc::new(FailingUserRepo(DbErrorKind::Query)));
        Arc::make_mut(&mut state.config).expose_db_errors = true;
        let (status, body) = send(&build_app(state), json!({ "email": "x@example.com" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"], "connection refused (os error 111)");
    }

    #[tokio::test]
    async fn other_routes_are_not_served() {
        let (app, _) = memory_app();
        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
