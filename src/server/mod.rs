//! HTTP surface over the difficulty cache.
//!
//! # Endpoints
//! - `POST /rating`: request JSON, answers the star rating as a JSON number
//! - `POST /attributes`: request JSON, answers the attribute object
//! - `DELETE /cache?beatmap_md5=...`: drops in-process entries for a beatmap

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::signal;

use crate::cache::DifficultyCache;
use crate::difficulty::DifficultyAttributes;
use crate::error::DifficultyError;
use crate::request::DifficultyRequest;

impl IntoResponse for DifficultyError {
    fn into_response(self) -> Response {
        let status = match &self {
            DifficultyError::UnknownRuleset(_) => StatusCode::BAD_REQUEST,
            DifficultyError::Fetch(_) => StatusCode::BAD_GATEWAY,
            DifficultyError::Calculation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PurgeParams {
    beatmap_md5: String,
}

async fn rating(
    State(cache): State<Arc<DifficultyCache>>,
    Json(request): Json<DifficultyRequest>,
) -> Result<Json<f64>, DifficultyError> {
    let rating = cache.get_rating(&request).await?;
    Ok(Json(rating))
}

async fn attributes(
    State(cache): State<Arc<DifficultyCache>>,
    Json(request): Json<DifficultyRequest>,
) -> Result<Json<DifficultyAttributes>, DifficultyError> {
    let attributes = cache.get_attributes(&request).await?;
    Ok(Json(attributes.as_ref().clone()))
}

async fn purge(
    State(cache): State<Arc<DifficultyCache>>,
    Query(params): Query<PurgeParams>,
) -> StatusCode {
    cache.purge(&params.beatmap_md5);
    StatusCode::OK
}

pub fn build_router(cache: Arc<DifficultyCache>) -> Router {
    Router::new()
        .route("/rating", post(rating))
        .route("/attributes", post(attributes))
        .route("/cache", delete(purge))
        .with_state(cache)
}

/// Serves until Ctrl+C (or SIGTERM on unix).
pub async fn serve(listen_addr: &str, cache: Arc<DifficultyCache>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    log::info!("SERVER: Listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(cache))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("SERVER: Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("SERVER: Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("SERVER: Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("SERVER: Shutdown signal received");
}
