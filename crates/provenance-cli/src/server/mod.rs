//! Key-gated HTTP service
//!
//! | route              | guard   |
//! |--------------------|---------|
//! | `GET /health`      | none    |
//! | `/keys` (POST, GET, DELETE) | admin |
//! | `POST /upload`     | API key |
//! | `POST /train`      | API key |
//! | `POST /classify`   | API key |

mod auth;
mod error;
mod handlers;
mod state;

#[cfg(test)]
mod tests;

pub use auth::{authorize, AuthError, Authorized, Requirement};
pub use error::ApiError;
pub use state::AppState;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/keys",
            post(handlers::issue_key)
                .get(handlers::list_keys)
                .delete(handlers::revoke_key),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    let gated = Router::new()
        .route("/upload", post(handlers::upload_archive))
        .route("/train", post(handlers::train))
        .route("/classify", post(handlers::classify))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_key));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(admin)
        .merge(gated)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes()))
        .with_state(state)
}

pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", addr))?;
    log::info!("Listening on {}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("Failed to listen for shutdown signal: {}", e);
            }
            log::info!("Shutting down");
        })
        .await
        .context("serving HTTP router")?;
    Ok(())
}
