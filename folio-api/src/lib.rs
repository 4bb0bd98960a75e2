use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;

use folio_shared::types::feed::FeedBus;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub struct AppState {
    pub db: DbPool,
    pub config: config::AppConfig,
    pub feed: FeedBus,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

/// Build the full application router, layers included.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route(
            "/contact",
            post(routes::contact::submit)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .route(
            "/notifications",
            get(routes::notifications::list)
                .post(routes::notifications::create)
                .patch(routes::notifications::update)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .route(
            "/portfolio-projects",
            get(routes::projects::list)
                .post(routes::projects::create)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .route(
            "/feed",
            get(routes::feed::subscribe)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .layer(axum::middleware::from_fn(
            folio_shared::middleware::metrics_middleware,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(AllowMethods::list([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::OPTIONS,
                ]))
                .allow_headers(AllowHeaders::list([
                    header::AUTHORIZATION,
                    HeaderName::from_static("x-client-info"),
                    HeaderName::from_static("apikey"),
                    header::CONTENT_TYPE,
                ])),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
