// Wire-contract tests over the real router. None of these need a live
// database: they cover the paths that settle before the store (CORS,
// method fallback, auth, validation) plus the store-failure 500s, using a
// pool pointed at an unreachable server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;
use uuid::Uuid;

use folio_api::config::AppConfig;
use folio_api::{router, AppState};
use folio_shared::types::auth::Claims;
use folio_shared::types::feed::FeedBus;

const TEST_SECRET: &str = "test-secret";

fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(folio_shared::middleware::init_metrics)
        .clone()
}

fn app() -> axum::Router {
    std::env::set_var("JWT_SECRET", TEST_SECRET);

    // Nothing listens here; pool checkout fails after a short timeout,
    // which is exactly the store-failure path.
    let manager = ConnectionManager::<PgConnection>::new("postgres://folio@127.0.0.1:1/folio");
    let db = Pool::builder()
        .max_size(1)
        .connection_timeout(Duration::from_millis(300))
        .build_unchecked(manager);

    let state = Arc::new(AppState {
        db,
        config: AppConfig {
            port: 0,
            database_url: "postgres://unused".into(),
            jwt_secret: TEST_SECRET.into(),
        },
        feed: FeedBus::new(),
        metrics_handle: metrics_handle(),
    });

    router(state)
}

fn bearer_for(user_id: Uuid) -> String {
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &Claims::new(user_id, 3600),
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn bare_options_answers_empty_200() {
    for path in ["/contact", "/notifications", "/portfolio-projects"] {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK, "OPTIONS {path}");
        assert!(resp.headers().contains_key("access-control-allow-origin"));

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty(), "OPTIONS {path} body not empty");
    }
}

#[tokio::test]
async fn preflight_allows_the_browser_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/notifications")
                .header(header::ORIGIN, "https://example.com")
                .header("Access-Control-Request-Method", "PATCH")
                .header("Access-Control-Request-Headers", "authorization")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let allow_headers = resp
        .headers()
        .get("access-control-allow-headers")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();
    assert!(allow_headers.contains("authorization"), "{allow_headers}");
}

#[tokio::test]
async fn unsupported_method_is_405() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/notifications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(resp).await["error"], "Method not allowed");
}

#[tokio::test]
async fn missing_bearer_is_401() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/notifications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("authorization"));
}

#[tokio::test]
async fn garbage_token_is_401() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/notifications")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn contact_missing_fields_is_400() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/contact")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name": "Ada"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await["error"],
        "Name, email, and message are required"
    );
}

#[tokio::test]
async fn store_failure_surfaces_the_operation_message() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/notifications")
                .header(header::AUTHORIZATION, bearer_for(Uuid::new_v4()))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title": "Hi", "message": "Test"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["error"], "Failed to create notification");
}

#[tokio::test]
async fn notifications_feed_needs_a_token_but_projects_feed_does_not() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/feed?table=notifications")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/feed?table=portfolio_projects")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
}

#[tokio::test]
async fn health_is_public() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "folio-api");
}
