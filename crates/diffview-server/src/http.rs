//! HTTP surface exposing stored artifacts by opaque id.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use diffview_error::ToolError;

use crate::store::ContentStore;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("address `{addr}` is already in use")]
    AddrInUse { addr: SocketAddr },
    #[error("failed to bind `{addr}`: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl ServeError {
    pub fn code(&self) -> &'static str {
        match self {
            ServeError::AddrInUse { .. } => "ADDRESS_IN_USE",
            ServeError::Bind { .. } => "BIND_FAILED",
        }
    }
}

impl From<ServeError> for ToolError {
    fn from(error: ServeError) -> Self {
        ToolError::http_server(error.code(), error.to_string())
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    #[serde(rename = "tempFiles")]
    temp_files: usize,
}

#[derive(Debug, Clone)]
pub struct ContentServer {
    store: Arc<ContentStore>,
    sweep_interval: Duration,
}

impl ContentServer {
    pub fn new(store: Arc<ContentStore>, sweep_interval: Duration) -> Self {
        Self {
            store,
            sweep_interval,
        }
    }

    /// Binds the listener, starts the serve loop and the eviction sweep.
    /// A port that is already taken surfaces as a typed error instead of
    /// tearing the process down.
    pub async fn start(&self, addr: SocketAddr) -> Result<RunningServer, ServeError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::AddrInUse => ServeError::AddrInUse { addr },
                _ => ServeError::Bind { addr, source },
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServeError::Bind { addr, source })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app = router(Arc::clone(&self.store));
        let serve_shutdown_rx = shutdown_rx.clone();
        let serve_task = tokio::spawn(async move {
            let serve_result = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_future(serve_shutdown_rx))
                .await;
            if let Err(err) = serve_result {
                warn!(error = %err, "content server exited with error");
            }
        });

        let sweep_task = tokio::spawn(sweep_loop(
            Arc::clone(&self.store),
            self.sweep_interval,
            shutdown_rx,
        ));

        info!(%local_addr, "content server listening");

        Ok(RunningServer {
            port: local_addr.port(),
            base_url: format!("http://{local_addr}"),
            store: Arc::clone(&self.store),
            shutdown_tx,
            serve_task: Some(serve_task),
            sweep_task: Some(sweep_task),
        })
    }
}

#[derive(Debug)]
pub struct RunningServer {
    port: u16,
    base_url: String,
    store: Arc<ContentStore>,
    shutdown_tx: watch::Sender<bool>,
    serve_task: Option<JoinHandle<()>>,
    sweep_task: Option<JoinHandle<()>>,
}

impl RunningServer {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, url_path: &str) -> String {
        format!("{}{url_path}", self.base_url)
    }

    /// Stops the sweep timer, shuts the listener down, and clears the
    /// store. Safe to call more than once.
    pub async fn dispose(&mut self) {
        let _ = self.shutdown_tx.send(true);

        for task in [self.serve_task.take(), self.sweep_task.take()]
            .into_iter()
            .flatten()
        {
            let abort_handle = task.abort_handle();
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                abort_handle.abort();
                warn!("server task did not stop in time");
            }
        }

        self.store.clear().await;
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.serve_task.take() {
            task.abort();
        }
        if let Some(task) = self.sweep_task.take() {
            task.abort();
        }
    }
}

fn router(store: Arc<ContentStore>) -> Router {
    Router::new()
        .route("/file/{id}", get(serve_file))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(store)
}

async fn serve_file(State(store): State<Arc<ContentStore>>, Path(id): Path<String>) -> Response {
    match store.get(&id).await {
        Some(content) => (
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            content,
        )
            .into_response(),
        None => not_found().await,
    }
}

async fn health(State(store): State<Arc<ContentStore>>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        temp_files: store.len().await,
    })
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Not Found",
    )
        .into_response()
}

async fn shutdown_future(mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        if shutdown_rx.changed().await.is_err() {
            break;
        }
    }
}

async fn sweep_loop(
    store: Arc<ContentStore>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick of a tokio interval fires immediately; consume it so
    // the sweep cadence starts one interval after boot.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = store.sweep().await;
                if removed > 0 {
                    info!(removed, "evicted expired artifacts");
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
