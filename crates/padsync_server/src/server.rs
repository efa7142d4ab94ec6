//! HTTP and WebSocket server.

use crate::api;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::gateway;
use crate::shutdown::ShutdownHandle;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use padsync_core::SyncEngine;
use padsync_crypto::PasswordCipher;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Room for multipart boundaries and headers on top of the file itself.
const BODY_OVERHEAD: usize = 64 * 1024;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) engine: Arc<SyncEngine>,
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) cipher: PasswordCipher,
    pub(crate) shutdown: ShutdownHandle,
}

/// The padsync server.
///
/// Owns one [`SyncEngine`] and exposes it over WebSocket, next to the
/// file and secure-save endpoints.
///
/// # Example
///
/// ```no_run
/// use padsync_server::{PadServer, ServerConfig};
///
/// # async fn run() -> padsync_server::ServerResult<()> {
/// let server = PadServer::new(ServerConfig::default());
/// let shutdown = server.shutdown_handle();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.trigger();
/// });
/// server.bind_and_serve().await
/// # }
/// ```
pub struct PadServer {
    state: AppState,
}

impl PadServer {
    /// Creates a server with a fresh engine.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_engine(config, Arc::new(SyncEngine::new()))
    }

    /// Creates a server around an existing engine.
    pub fn with_engine(config: ServerConfig, engine: Arc<SyncEngine>) -> Self {
        let cipher = PasswordCipher::new(config.kdf);
        Self {
            state: AppState {
                engine,
                config: Arc::new(config),
                cipher,
                shutdown: ShutdownHandle::new(),
            },
        }
    }

    /// Returns the sync engine.
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.state.engine
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Returns a handle that stops the server when triggered.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.state.shutdown.clone()
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        let body_limit = self.state.config.max_upload_bytes.saturating_add(BODY_OVERHEAD);

        Router::new()
            // Live editing
            .route("/ws", get(gateway::default_session))
            .route("/ws/:session_id", get(gateway::named_session))
            // Files
            .route("/api/open", post(api::open_file))
            .route("/api/secure/save", post(api::secure_save))
            .route("/api/secure/open", post(api::secure_open))
            // Misc
            .route("/api/login", post(api::login))
            .route("/success", get(api::landing))
            .route("/api/status", get(api::status))
            .route("/api/exit", post(api::exit))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn bind_and_serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.state.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves on `listener` until the shutdown handle fires.
    ///
    /// On shutdown the engine stops accepting edits and every open socket
    /// receives a close frame.
    pub async fn serve(self, listener: TcpListener) -> ServerResult<()> {
        let app = self.router();
        let engine = Arc::clone(&self.state.engine);
        let shutdown = self.state.shutdown.clone();

        info!(addr = %listener.local_addr()?, "padsync listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                let closed = engine.shutdown();
                info!(connections = closed, "disconnected collaborators");
            })
            .await?;

        info!("server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for PadServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PadServer")
            .field("config", &self.state.config)
            .field("engine", &self.state.engine)
            .finish()
    }
}
