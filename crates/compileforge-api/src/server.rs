use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use compileforge_core::LifecycleManager;

use crate::routes::api_routes;
use crate::state::AppState;

pub fn build_router(lifecycle: Arc<LifecycleManager>) -> Router {
    let state = AppState::new(lifecycle);

    api_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(host: &str, port: u16, lifecycle: Arc<LifecycleManager>) -> anyhow::Result<()> {
    let router = build_router(lifecycle);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "compileforge api listening");
    axum::serve(listener, router).await?;
    Ok(())
}
