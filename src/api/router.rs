//! API router configuration.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    api_info, get_history, health, list_history, send_reminder, update_history,
    whatsapp_clear_session, whatsapp_qr, whatsapp_send, whatsapp_status, AppState,
};

/// Create the API router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let whatsapp_routes = Router::new()
        .route("/status", get(whatsapp_status))
        .route("/qr", get(whatsapp_qr))
        .route("/send", post(whatsapp_send))
        .route("/clear-session", post(whatsapp_clear_session));

    let history_routes = Router::new()
        .route("/", get(list_history))
        .route("/{id}", get(get_history).patch(update_history));

    let api = Router::new()
        .route("/", get(api_info))
        .route("/messages/send", post(send_reminder))
        .nest("/whatsapp", whatsapp_routes)
        .nest("/history", history_routes);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Stop accepting connections on Ctrl-C and drain in-flight requests.
    pub graceful_shutdown: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            graceful_shutdown: true,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 5000)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Start the API server with the given state.
pub async fn serve_with_state(config: ServerConfig, state: AppState) -> crate::Result<()> {
    let addr = config.bind_address();
    let router = create_router(state);

    tracing::info!("Starting wa-sender API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(crate::error::WaSenderError::Io)?;

    let server = axum::serve(listener, router);
    let result = if config.graceful_shutdown {
        server.with_graceful_shutdown(shutdown_signal()).await
    } else {
        server.await
    };

    result.map_err(|e| crate::error::WaSenderError::Io(std::io::Error::other(e.to_string())))?;

    Ok(())
}
