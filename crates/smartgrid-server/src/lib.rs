//! SmartGrid Service - Axum transport for the ingestion session
//!
//! Exposes the session's StartSession / PushSample / EndSession operations
//! as a JSON API and streams session events to WebSocket clients. The
//! session itself lives on a dedicated thread and receives commands over a
//! channel, so pushes from any number of connections are applied one at a
//! time in arrival order.

pub mod api;
pub mod ws;

use axum::http::{header, HeaderValue};
use axum::Router;
use smartgrid_core::config::ServerSettings;
use smartgrid_core::persistence::SampleSink;
use smartgrid_core::session::{IngestionSession, SessionSnapshot};
use smartgrid_core::{Sample, SessionError, Thresholds};
use std::future::Future;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

/// Commands sent to the session thread
pub enum SessionCommand {
    Start {
        meta: String,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    Push {
        sample: Option<Sample>,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    End {
        reply: oneshot::Sender<Result<u64, SessionError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Errors returned through a [`SessionHandle`]
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Session thread died")]
    SessionThreadDied,
}

/// Handle to communicate with the session thread
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    thresholds: Thresholds,
}

impl SessionHandle {
    /// Move the session onto a dedicated thread and return a handle to it
    pub fn spawn<S: SampleSink + 'static>(mut session: IngestionSession<S>) -> anyhow::Result<Self> {
        let (tx, mut rx) = mpsc::channel::<SessionCommand>(32);
        let thresholds = session.thresholds();

        std::thread::Builder::new()
            .name("ingestion-session".into())
            .spawn(move || {
                while let Some(cmd) = rx.blocking_recv() {
                    match cmd {
                        SessionCommand::Start { meta, reply } => {
                            let result = session.start(&meta).map(|()| session.snapshot());
                            let _ = reply.send(result);
                        }
                        SessionCommand::Push { sample, reply } => {
                            let result = session.push_sample(sample).map(|()| session.snapshot());
                            let _ = reply.send(result);
                        }
                        SessionCommand::End { reply } => {
                            let _ = reply.send(session.end());
                        }
                        SessionCommand::Snapshot { reply } => {
                            let _ = reply.send(session.snapshot());
                        }
                    }
                }
                tracing::debug!("Session thread exiting, all handles dropped");
            })?;

        Ok(Self { tx, thresholds })
    }

    /// Thresholds the session was built with
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ServiceError::SessionThreadDied)?;
        rx.await.map_err(|_| ServiceError::SessionThreadDied)
    }

    pub async fn start(&self, meta: String) -> Result<SessionSnapshot, ServiceError> {
        Ok(self
            .call(|reply| SessionCommand::Start { meta, reply })
            .await??)
    }

    pub async fn push(&self, sample: Option<Sample>) -> Result<SessionSnapshot, ServiceError> {
        Ok(self
            .call(|reply| SessionCommand::Push { sample, reply })
            .await??)
    }

    /// End the session, returning the number of accepted samples
    pub async fn end(&self) -> Result<u64, ServiceError> {
        Ok(self.call(|reply| SessionCommand::End { reply }).await??)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, ServiceError> {
        self.call(|reply| SessionCommand::Snapshot { reply }).await
    }
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerSettings::default().into()
    }
}

impl From<ServerSettings> for ServerConfig {
    fn from(settings: ServerSettings) -> Self {
        Self {
            port: settings.port,
            bind_addr: settings.bind_addr,
        }
    }
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to the session thread
    pub session: SessionHandle,
    /// Serialized session events for WebSocket clients
    pub events_tx: broadcast::Sender<String>,
    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Wire the session to the event broadcast channel and start its thread
    pub fn new<S: SampleSink + 'static>(
        mut session: IngestionSession<S>,
        config: ServerConfig,
    ) -> anyhow::Result<Self> {
        let (events_tx, _) = broadcast::channel(256);
        session.subscribe(ws::BroadcastListener::new(events_tx.clone()));
        let session = SessionHandle::spawn(session)?;
        Ok(Self {
            session,
            events_tx,
            config,
        })
    }
}

/// Build the Axum router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", axum::routing::get(api::get_status))
        .route(
            "/api/v1/session/start",
            axum::routing::post(api::start_session),
        )
        .route(
            "/api/v1/session/sample",
            axum::routing::post(api::push_sample),
        )
        .route("/api/v1/session/end", axum::routing::post(api::end_session))
        .route("/api/v1/ws", axum::routing::get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start the web server on the configured address, stopping on Ctrl+C
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.bind_addr, state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "SmartGrid service listening");

    serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested");
    })
    .await
}
