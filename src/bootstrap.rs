use anyhow::{Context, Result};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::{
    api::{storage::ObjectStorage, stripe::StripeClient},
    app_state::AppState,
    config, db,
};

pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Builds the process-wide state, attaches it to the router and serves
/// until shutdown.
pub async fn bootstrap(service_name: &str, app: Router<AppState>) -> Result<()> {
    let config = config::load()?;

    let db_pool = db::create_pool(&config.database.url).await?;
    let stripe = StripeClient::new(&config.stripe);
    let storage = ObjectStorage::connect(&config.storage).await;

    let state = AppState {
        db_pool,
        stripe,
        storage,
    };

    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.server.port))?;
    tracing::info!(
        "{service_name} listening on {}",
        listener.local_addr().context("Failed to read local addr")?
    );
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
