use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    serve, Json, Router,
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::constants::{MAX_RECIPES, MIN_RECIPES};
use crate::generation::{GenerationRequest, RecipeGenerator};

// Shared application state
#[derive(Clone)]
struct AppState {
    generator: Arc<dyn RecipeGenerator>,
}

#[derive(Debug, Deserialize)]
struct DebugRecipesParams {
    ingredients: String,
    #[serde(default = "default_count")]
    count: i64,
}

fn default_count() -> i64 {
    1
}

async fn health_handler() -> &'static str {
    "ok"
}

// Direct pass-through to the generator, for poking at the model by hand
async fn debug_recipes_handler(
    State(state): State<AppState>,
    Query(params): Query<DebugRecipesParams>,
) -> Response {
    // Out-of-range values, negatives included, land inside [1, 3]
    let count = params
        .count
        .clamp(i64::from(MIN_RECIPES), i64::from(MAX_RECIPES)) as u32;
    let request = GenerationRequest::new(params.ingredients, count);
    info!(count = request.count, "Debug recipe generation requested");

    match state.generator.generate(&request).await {
        Ok(recipes) => Json(recipes).into_response(),
        Err(e) => {
            error!("Debug recipe generation failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Builds the debug router; split out so tests can drive it without a socket.
pub fn router(generator: Arc<dyn RecipeGenerator>) -> Router {
    let state = AppState { generator };

    Router::new()
        .route("/health", get(health_handler))
        .route("/debug/recipes", get(debug_recipes_handler))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http())) // Add request logging
}

pub async fn start_web_server(
    port: u16,
    generator: Arc<dyn RecipeGenerator>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app = router(generator);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Debug server listening on http://{}", addr);

    // Bind using tokio::net::TcpListener
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .context("Debug server failed")?;

    info!("Debug server stopped");
    Ok(())
}
