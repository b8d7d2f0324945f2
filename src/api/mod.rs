// API module - HTTP endpoints

pub mod certificates;
pub mod health;
pub mod verification;

use axum::{http::Method, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::services::chain_session::{ConnectivityError, SessionSettings, SharedChainSession};
use crate::services::orchestrator::BatchResolver;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: BatchResolver<SharedChainSession>,
    pub config: Config,
}

impl AppState {
    /// Builds state around a lazily connected chain session. No network call
    /// is made until the first request needs the node.
    pub fn from_config(config: Config) -> Result<Self, ConnectivityError> {
        let settings = SessionSettings::from_config(&config)?;
        let session = Arc::new(SharedChainSession::new(settings));
        let resolver =
            BatchResolver::new(session).with_block_interval(config.block_interval_seconds);

        Ok(Self { resolver, config })
    }

    pub fn session(&self) -> &SharedChainSession {
        self.resolver.session()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { axum::response::Redirect::to("/verify") }))
        .route("/health", get(health::health_check))
        .merge(verification::router())
        .merge(certificates::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
