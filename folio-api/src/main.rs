use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::sync::Arc;

use folio_api::config::AppConfig;
use folio_api::AppState;
use folio_shared::types::feed::FeedBus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    folio_shared::middleware::init_tracing("folio-api");

    let config = AppConfig::load()?;
    let port = config.port;

    // Set JWT_SECRET env var for the auth extractor middleware
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let db = Pool::builder().max_size(10).build(manager)?;

    let metrics_handle = folio_shared::middleware::init_metrics();
    let feed = FeedBus::new();

    let state = Arc::new(AppState {
        db,
        config,
        feed,
        metrics_handle,
    });

    let app = folio_api::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "folio-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
