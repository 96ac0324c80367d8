//! Whitelist HTTP server with axum router and graceful shutdown.

use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::WebError;
use super::handlers::{
    delete_entry, get_audit, get_check, get_events_sse, get_export, get_stats, get_whitelist,
    post_add, post_import, put_toggle, put_update, AppState,
};
use crate::config::WebConfig;
use crate::guard::WhitelistGuard;

/// HTTP server exposing the whitelist management API.
pub struct WebServer {
    /// Server configuration.
    config: WebConfig,
    /// Application state shared across handlers.
    state: AppState,
}

impl WebServer {
    /// Create a new server with default configuration.
    #[must_use]
    pub fn new(guard: WhitelistGuard) -> Self {
        Self {
            config: WebConfig::default(),
            state: AppState::new(guard),
        }
    }

    /// Set the server configuration (builder pattern).
    #[must_use]
    pub fn with_config(mut self, config: WebConfig) -> Self {
        self.config = config;
        self
    }

    /// Shut down when `cancel` is triggered.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.state = self.state.with_cancel(cancel);
        self
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        self.config.bind_addr()
    }

    /// Token that stops the server.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.state.cancel.clone()
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/api/whitelist", get(get_whitelist))
            .route("/api/stats", get(get_stats))
            .route("/api/whitelist/add", post(post_add))
            .route("/api/whitelist/update", put(put_update))
            .route("/api/whitelist/toggle", put(put_toggle))
            .route("/api/whitelist/delete", delete(delete_entry))
            .route("/api/whitelist/export", get(get_export))
            .route("/api/whitelist/import", post(post_import))
            .route("/api/check", get(get_check))
            .route("/api/audit", get(get_audit))
            .route("/api/events", get(get_events_sse))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the server, binding to the configured address.
    ///
    /// The server will run until the cancellation token is triggered,
    /// at which point it will perform a graceful shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> Result<(), WebError> {
        let address = self.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| WebError::Bind { address, source })?;
        self.run_on(listener).await
    }

    /// Serve on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn run_on(self, listener: TcpListener) -> Result<(), WebError> {
        let cancel = self.state.cancel.clone();
        let app = self.build_router();

        match listener.local_addr() {
            Ok(addr) => tracing::info!(address = %addr, "Starting whitelist API server"),
            Err(e) => tracing::warn!(error = %e, "Starting whitelist API server on unknown address"),
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("Whitelist API server shutting down gracefully");
            })
            .await
            .map_err(WebError::Server)
    }
}
