//! HTTP server for the GitHub App.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries and dispatches them
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::webhook_handler;

use crate::config::AppConfig;
use crate::github::GitHubClient;
use crate::routing::{HandlerLoader, Registry};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    registry: Arc<Registry<GitHubClient>>,
    loader: Arc<HandlerLoader<GitHubClient>>,

    /// Base client; each delivery gets a clone scoped to its installation.
    client: GitHubClient,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        registry: Arc<Registry<GitHubClient>>,
        loader: Arc<HandlerLoader<GitHubClient>>,
        client: GitHubClient,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                loader,
                client,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<Registry<GitHubClient>> {
        &self.inner.registry
    }

    pub fn loader(&self) -> &Arc<HandlerLoader<GitHubClient>> {
        &self.inner.loader
    }

    pub fn client(&self) -> &GitHubClient {
        &self.inner.client
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
