//! HTTP host for the story pipeline.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::config::ServerSettings;
use crate::engine::llm_client::CompletionClient;
use crate::engine::prompt_builder::PromptSpec;
use crate::engine::protocol::{status_for, ErrorBody};
use crate::engine::provider::StoryProvider;

pub struct ApiState<C> {
    pub provider: Arc<StoryProvider<C>>,
    pub prompt: Arc<PromptSpec>,
}

impl<C> ApiState<C> {
    pub fn new(provider: Arc<StoryProvider<C>>, prompt: PromptSpec) -> Self {
        Self {
            provider,
            prompt: Arc::new(prompt),
        }
    }
}

impl<C> Clone for ApiState<C> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            prompt: Arc::clone(&self.prompt),
        }
    }
}

pub fn create_router<C>(state: ApiState<C>) -> Router
where
    C: CompletionClient + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(health_check))
        .route("/generate", post(generate_story::<C>))
        .with_state(state)
}

/// Also answers HEAD, which is what endpoint probes send.
#[instrument(skip_all)]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Fetch and validate a fresh story. The provider blocks, so it runs on the
/// blocking pool.
#[instrument(skip_all)]
pub async fn generate_story<C>(State(state): State<ApiState<C>>) -> Response
where
    C: CompletionClient + Send + Sync + 'static,
{
    info!("Received /generate request");
    let provider = Arc::clone(&state.provider);
    let prompt = Arc::clone(&state.prompt);

    match tokio::task::spawn_blocking(move || provider.fetch_story(&prompt)).await {
        Ok(Ok(tree)) => (StatusCode::OK, Json(tree)).into_response(),
        Ok(Err(err)) => {
            warn!(error = %err, kind = ?err.kind(), "Story generation failed");
            let status =
                StatusCode::from_u16(status_for(&err)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(ErrorBody::from(&err))).into_response()
        }
        Err(join_err) => {
            warn!(error = %join_err, "Story generation task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("Server error", join_err.to_string())),
            )
                .into_response()
        }
    }
}

/// Bind the configured port, moving up one port at a time while it is busy.
pub async fn bind(settings: &ServerSettings) -> io::Result<TcpListener> {
    let mut last_err = None;
    for offset in 0..settings.port_attempts {
        let Some(port) = settings.port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((settings.host.as_str(), port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                info!(port, "Port is busy, trying the next one");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "no free port")))
}

pub async fn serve<C>(settings: &ServerSettings, state: ApiState<C>) -> io::Result<()>
where
    C: CompletionClient + Send + Sync + 'static,
{
    let listener = bind(settings).await?;
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, "Server running");
    info!("Open http://{addr}/ to check the service");

    axum::serve(listener, create_router(state)).await
}
